extern crate env_logger;
extern crate outliner;
extern crate outliner_remote;

use std::thread;

use outliner::prelude::*;
use outliner_remote::prelude::*;

const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

fn setup(params: RemoteParams) -> (Hierarchy, RemoteSync, Entity, Entity) {
    let mut hierarchy = Hierarchy::default();
    let sync = RemoteSync::attach(&mut hierarchy, params);
    let a = hierarchy.create("A", None).unwrap();
    let b = hierarchy.create("B", a).unwrap();
    sync.drain_outbound();
    (hierarchy, sync, a, b)
}

fn assert_near<T: Into<Vector3<f32>>>(lhs: Option<Vector3<f32>>, rhs: T) {
    let lhs = lhs.expect("entity not found");
    let rhs = rhs.into();
    assert!(
        (lhs - rhs).magnitude() < 1e-4,
        "{:?} is not close to {:?}",
        lhs,
        rhs
    );
}

fn position_edit(entity_index: u32, value: [f32; 3], relative: bool) -> RemoteEdit {
    RemoteEdit {
        entity_index,
        edit: TransformEdit::Position { value, relative },
    }
}

#[test]
fn structural_messages() {
    let mut hierarchy = Hierarchy::default();
    let sync = RemoteSync::attach(&mut hierarchy, RemoteParams::default());

    let a = hierarchy.create("A", None).unwrap();
    let b = hierarchy.create("B", a).unwrap();
    let d = hierarchy.create("D", None).unwrap();
    hierarchy.set_parent(b, d).unwrap();
    hierarchy.delete(d).unwrap();
    hierarchy.clear();

    assert_eq!(
        sync.drain_outbound(),
        [
            RemoteMessage::EntityCreated {
                entity_index: 0,
                sibling_index: 0,
                parent_index: NO_PARENT,
                position: [0.0, 0.0, 0.0],
                rotation: IDENTITY_ROTATION,
                scale: [1.0, 1.0, 1.0],
            },
            RemoteMessage::EntityCreated {
                entity_index: 1,
                sibling_index: 0,
                parent_index: 0,
                position: [0.0, 0.0, 0.0],
                rotation: IDENTITY_ROTATION,
                scale: [1.0, 1.0, 1.0],
            },
            RemoteMessage::EntityCreated {
                entity_index: 2,
                sibling_index: 1,
                parent_index: NO_PARENT,
                position: [0.0, 0.0, 0.0],
                rotation: IDENTITY_ROTATION,
                scale: [1.0, 1.0, 1.0],
            },
            RemoteMessage::EntityReparented {
                entity_old_index: 1,
                new_parent_old_index: 2,
                new_sibling_index: 0,
            },
            RemoteMessage::EntityDestroyed { entity_index: 1 },
            RemoteMessage::WorldCleared,
        ]
    );

    assert!(sync.drain_outbound().is_empty());
}

#[test]
fn local_edits_are_echoed() {
    let (mut hierarchy, sync, _, b) = setup(RemoteParams::default());

    hierarchy.set_local_position(b, [1.0, 2.0, 3.0]).unwrap();
    assert_eq!(
        sync.drain_outbound(),
        [RemoteMessage::EntityTransform {
            entity_index: 1,
            position: [1.0, 2.0, 3.0],
            rotation: IDENTITY_ROTATION,
            scale: [1.0, 1.0, 1.0],
        }]
    );
}

#[test]
fn apply_pending() {
    let (mut hierarchy, sync, a, b) = setup(RemoteParams::default());
    let inbox = sync.inbox();

    inbox.push(position_edit(1, [1.0, 0.0, 0.0], false));
    inbox.push(position_edit(1, [0.0, 1.0, 0.0], true));
    inbox.push(RemoteEdit {
        entity_index: 0,
        edit: TransformEdit::Scale {
            value: [2.0, 2.0, 2.0],
            relative: false,
        },
    });
    inbox.push(RemoteEdit {
        entity_index: 0,
        edit: TransformEdit::Scale {
            value: [1.0, 0.5, 1.0],
            relative: true,
        },
    });

    assert_eq!(inbox.len(), 4);
    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 4);
    assert!(inbox.is_empty());

    assert_near(hierarchy.local_position(b), [1.0, 1.0, 0.0]);
    assert_near(hierarchy.local_scale(a), [2.0, 1.0, 2.0]);
    assert_near(hierarchy.position(b), [2.0, 1.0, 0.0]);

    let messages = sync.drain_outbound();
    assert_eq!(messages.len(), 4);
    assert_eq!(
        messages[1],
        RemoteMessage::EntityTransform {
            entity_index: 1,
            position: [1.0, 1.0, 0.0],
            rotation: IDENTITY_ROTATION,
            scale: [1.0, 1.0, 1.0],
        }
    );
}

#[test]
fn rotation_and_trs() {
    let (mut hierarchy, sync, a, _) = setup(RemoteParams::default());
    let inbox = sync.inbox();

    // A quarter turn around y, twice.
    let h = ::std::f32::consts::FRAC_1_SQRT_2;
    let quarter = [0.0, h, 0.0, h];
    inbox.push(RemoteEdit {
        entity_index: 0,
        edit: TransformEdit::Rotation {
            value: quarter,
            relative: false,
        },
    });
    inbox.push(RemoteEdit {
        entity_index: 0,
        edit: TransformEdit::Rotation {
            value: quarter,
            relative: true,
        },
    });

    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 2);
    let forward = hierarchy.node(a).unwrap().forward();
    assert_near(Some(forward), [0.0, 0.0, -1.0]);

    inbox.push(RemoteEdit {
        entity_index: 0,
        edit: TransformEdit::Trs {
            position: [1.0, 2.0, 3.0],
            rotation: IDENTITY_ROTATION,
            scale: [3.0, 3.0, 3.0],
        },
    });

    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 1);
    let transform = hierarchy.local_transform(a).unwrap();
    assert_eq!(
        transform,
        Transform::new([1.0, 2.0, 3.0], Quaternion::one(), [3.0, 3.0, 3.0])
    );
}

#[test]
fn rejected_and_dropped_edits() {
    let _ = env_logger::try_init();

    let (mut hierarchy, sync, a, _) = setup(RemoteParams::default());
    let inbox = sync.inbox();

    hierarchy.set_local_scale(a, [2.0, 2.0, 2.0]).unwrap();
    sync.drain_outbound();

    inbox.push(position_edit(7, [1.0, 0.0, 0.0], false));
    inbox.push(RemoteEdit {
        entity_index: 0,
        edit: TransformEdit::Scale {
            value: [0.0, 1.0, 1.0],
            relative: true,
        },
    });

    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 0);
    assert_near(hierarchy.local_scale(a), [2.0, 2.0, 2.0]);
    assert_eq!(
        sync.drain_outbound(),
        [RemoteMessage::EntityTransform {
            entity_index: 0,
            position: [0.0, 0.0, 0.0],
            rotation: IDENTITY_ROTATION,
            scale: [2.0, 2.0, 2.0],
        }]
    );
}

#[test]
fn limits_and_cancel() {
    let params = RemoteParams {
        max_edits_per_apply: 2,
    };

    let (mut hierarchy, sync, _, b) = setup(params);
    let inbox = sync.inbox();

    for i in 0..5 {
        inbox.push(position_edit(1, [i as f32, 0.0, 0.0], false));
    }

    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 2);
    assert_eq!(inbox.len(), 3);
    assert_near(hierarchy.local_position(b), [1.0, 0.0, 0.0]);

    let removed = inbox.cancel(|v| match v.edit {
        TransformEdit::Position { value, .. } => value[0] > 3.0,
        _ => false,
    });

    assert_eq!(removed, 1);
    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 2);
    assert_near(hierarchy.local_position(b), [3.0, 0.0, 0.0]);

    inbox.push(position_edit(1, [9.0, 0.0, 0.0], false));
    assert_eq!(inbox.clear(), 1);
    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 0);
}

#[test]
fn codec() {
    let message = RemoteMessage::EntityReparented {
        entity_old_index: 3,
        new_parent_old_index: NO_PARENT,
        new_sibling_index: 2,
    };

    let bytes = encode_message(&message).unwrap();
    assert_eq!(decode_message(&bytes).unwrap(), message);
    assert!(decode_message(&bytes[..2]).is_err());

    let (mut hierarchy, sync, _, b) = setup(RemoteParams::default());
    hierarchy.set_local_position(b, [0.0, 0.0, 1.0]).unwrap();

    let outbound = sync.drain_outbound_bytes().unwrap();
    assert_eq!(outbound.len(), 1);
    match decode_message(&outbound[0]).unwrap() {
        RemoteMessage::EntityTransform { entity_index, .. } => assert_eq!(entity_index, 1),
        other => panic!("unexpected {:?}", other),
    }

    let edit = position_edit(1, [4.0, 0.0, 0.0], false);
    let bytes = encode_edit(&edit).unwrap();
    assert_eq!(decode_edit(&bytes).unwrap(), edit);

    let inbox = sync.inbox();
    inbox.push_bytes(&bytes).unwrap();
    assert!(inbox.push_bytes(&[]).is_err());
    assert_eq!(inbox.len(), 1);
}

#[test]
fn shared_inbox() {
    let (mut hierarchy, sync, _, b) = setup(RemoteParams::default());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let inbox = sync.inbox();
            thread::spawn(move || {
                for _ in 0..8 {
                    inbox.push(position_edit(1, [0.0, 1.0, 0.0], true));
                }
            })
        })
        .collect();

    for v in workers {
        v.join().unwrap();
    }

    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 32);
    assert_near(hierarchy.local_position(b), [0.0, 32.0, 0.0]);

    let messages = sync.detach(&mut hierarchy);
    assert_eq!(messages.len(), 32);

    let resumed = RemoteSync::attach(&mut hierarchy, RemoteParams::default());
    assert!(resumed.drain_outbound().is_empty());
    assert!(resumed.inbox().is_empty());
}

#[test]
fn degenerate_edits_are_echoed() {
    let _ = env_logger::try_init();

    let mut hierarchy = Hierarchy::new(HierarchyParams {
        min_scale: 0.0,
        capacity: 0,
    });

    let sync = RemoteSync::attach(&mut hierarchy, RemoteParams::default());
    let a = hierarchy.create("A", None).unwrap();
    sync.drain_outbound();

    let inbox = sync.inbox();
    inbox.push(RemoteEdit {
        entity_index: 0,
        edit: TransformEdit::Scale {
            value: [1.0, 0.0, 1.0],
            relative: false,
        },
    });
    inbox.push(RemoteEdit {
        entity_index: 0,
        edit: TransformEdit::Rotation {
            value: [0.0, 0.0, 0.0, 0.0],
            relative: false,
        },
    });

    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 0);

    let current = RemoteMessage::EntityTransform {
        entity_index: 0,
        position: [0.0, 0.0, 0.0],
        rotation: IDENTITY_ROTATION,
        scale: [1.0, 1.0, 1.0],
    };

    assert_eq!(sync.drain_outbound(), [current, current]);
    assert_near(hierarchy.local_scale(a), [1.0, 1.0, 1.0]);
    hierarchy.validate().unwrap();

    inbox.push(RemoteEdit {
        entity_index: 0,
        edit: TransformEdit::Rotation {
            value: [0.0, 2.0, 0.0, 0.0],
            relative: false,
        },
    });

    assert_eq!(sync.apply_pending(&mut hierarchy).unwrap(), 1);
    assert_eq!(
        sync.drain_outbound(),
        [RemoteMessage::EntityTransform {
            entity_index: 0,
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 1.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }]
    );
    assert_near(hierarchy.scale(a), [1.0, 1.0, 1.0]);
}

#[test]
fn loaded_world_is_announced_once() {
    let json = r#"{
        "Room": { "child_count": 1, "components": { "transform_": {
            "position_": [1.0, 2.0, 3.0],
            "rotation_": [0.0, 0.0, 0.0, 1.0],
            "scale_": [2.0, 2.0, 2.0]
        } } },
        "Lamp": { "child_count": 0 }
    }"#;

    let (mut hierarchy, sync, _, _) = setup(RemoteParams::default());
    outliner::serialization::load_str(&mut hierarchy, json).unwrap();

    assert_eq!(
        sync.drain_outbound(),
        [
            RemoteMessage::WorldCleared,
            RemoteMessage::EntityCreated {
                entity_index: 0,
                sibling_index: 0,
                parent_index: NO_PARENT,
                position: [1.0, 2.0, 3.0],
                rotation: IDENTITY_ROTATION,
                scale: [2.0, 2.0, 2.0],
            },
            RemoteMessage::EntityCreated {
                entity_index: 1,
                sibling_index: 0,
                parent_index: 0,
                position: [0.0, 0.0, 0.0],
                rotation: IDENTITY_ROTATION,
                scale: [1.0, 1.0, 1.0],
            },
        ]
    );
}
