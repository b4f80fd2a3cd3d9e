extern crate env_logger;
extern crate outliner;
extern crate serde_json;

use outliner::prelude::*;
use outliner::serialization::{self, format::WorldDocument};

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

fn sample() -> Hierarchy {
    let mut hierarchy = Hierarchy::default();
    let room = hierarchy.create("Room", None).unwrap();
    let lamp = hierarchy.create("Lamp", room).unwrap();
    let bulb = hierarchy.create("Bulb", lamp).unwrap();
    hierarchy.create("Desk", room).unwrap();
    hierarchy.create("Camera", None).unwrap();

    hierarchy.set_local_position(room, [1.0, 0.0, 0.0]).unwrap();
    hierarchy.set_local_position(lamp, [0.0, 2.0, 0.0]).unwrap();
    hierarchy.set_local_scale(bulb, [0.5, 0.5, 0.5]).unwrap();

    let euler = Euler::new(Deg(0.0), Deg(90.0), Deg(0.0));
    hierarchy.set_local_rotation(lamp, euler).unwrap();

    let mut components = serde_json::Map::new();
    components.insert("light_".into(), serde_json::json!({ "intensity_": 2.5 }));
    hierarchy.set_components(bulb, components).unwrap();

    hierarchy
}

fn outline(hierarchy: &Hierarchy) -> Vec<(String, Option<usize>, usize)> {
    hierarchy
        .iter()
        .map(|v| {
            let parent = hierarchy.parent(v).and_then(|p| hierarchy.index(p));
            let name = hierarchy.name(v).unwrap().to_owned();
            (name, parent, hierarchy.children(v).len())
        })
        .collect()
}

#[test]
fn single_entity() {
    let mut hierarchy = Hierarchy::default();
    hierarchy.create("A", None).unwrap();

    assert_eq!(
        serialization::to_string(&hierarchy).unwrap(),
        concat!(
            r#"{"A":{"child_count":0,"components":{"transform_":{"#,
            r#""position_":[0.0,0.0,0.0],"rotation_":[0.0,0.0,0.0,1.0],"scale_":[1.0,1.0,1.0]}}}}"#
        )
    );
}

#[test]
fn round_trip() {
    let hierarchy = sample();
    let json = serialization::to_string_pretty(&hierarchy).unwrap();
    let loaded = serialization::from_str(&json).unwrap();

    assert_eq!(outline(&loaded), outline(&hierarchy));
    assert!(!loaded.is_dirty());
    loaded.validate().unwrap();

    let bulb = loaded.find("Room/Lamp/Bulb").unwrap();
    assert_near(loaded.local_scale(bulb), [0.5, 0.5, 0.5]);
    assert_near(
        loaded.position(bulb),
        hierarchy.position(hierarchy.find("Room/Lamp/Bulb").unwrap()).unwrap(),
    );
    assert_eq!(
        loaded.components(bulb).unwrap()["light_"]["intensity_"],
        serde_json::json!(2.5)
    );

    let lamp = loaded.find("Room/Lamp").unwrap();
    let expected = hierarchy.local_rotation(hierarchy.find("Room/Lamp").unwrap());
    assert!(loaded.local_rotation(lamp).unwrap().dot(expected.unwrap()).abs() > 1.0 - 1e-4);

    let mut bytes = Vec::new();
    serialization::to_writer(&mut bytes, &hierarchy).unwrap();
    let loaded = serialization::from_reader(&bytes[..]).unwrap();
    assert_eq!(outline(&loaded), outline(&hierarchy));
}

#[test]
fn duplicated_names() {
    let json = r#"{
        "Cube": { "child_count": 1, "components": {} },
        "Cube": { "child_count": 0, "components": {} },
        "Cube": { "child_count": 0 }
    }"#;

    let document: WorldDocument = serde_json::from_str(json).unwrap();
    assert_eq!(document.entries.len(), 3);

    let hierarchy = serialization::from_str(json).unwrap();
    assert_eq!(hierarchy.object_count(), 3);
    assert_eq!(
        outline(&hierarchy),
        [
            ("Cube".to_owned(), None, 1),
            ("Cube".to_owned(), Some(0), 0),
            ("Cube".to_owned(), None, 0),
        ]
    );

    // Missing transforms fall back to the identity.
    let last = hierarchy.object_at_index(2).unwrap();
    assert_eq!(hierarchy.local_transform(last), Some(Transform::default()));
}

#[test]
fn stack_reconstruction() {
    let json = r#"{
        "A": { "child_count": 2 },
        "B": { "child_count": 1 },
        "C": { "child_count": 0 },
        "D": { "child_count": 0 },
        "E": { "child_count": 0 }
    }"#;

    let hierarchy = serialization::from_str(json).unwrap();
    assert_eq!(
        outline(&hierarchy),
        [
            ("A".to_owned(), None, 2),
            ("B".to_owned(), Some(0), 1),
            ("C".to_owned(), Some(1), 0),
            ("D".to_owned(), Some(0), 0),
            ("E".to_owned(), None, 0),
        ]
    );

    hierarchy.validate().unwrap();
}

#[test]
fn trailing_children_are_accepted() {
    let _ = env_logger::try_init();

    let json = r#"{ "A": { "child_count": 3 }, "B": { "child_count": 0 } }"#;
    let hierarchy = serialization::from_str(json).unwrap();
    assert_eq!(hierarchy.object_count(), 2);
    assert_eq!(hierarchy.children(hierarchy.object_at_index(0).unwrap()).len(), 1);
}

#[test]
fn malformed() {
    let _ = env_logger::try_init();

    let mut hierarchy = sample();
    let events = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = events.clone();
    hierarchy.attach(move |_: &Hierarchy, e: &HierarchyEvent| sink.borrow_mut().push(*e));

    let broken = [
        "",
        "[]",
        r#"{ "A": 1 }"#,
        r#"{ "A": { "child_count": -1 } }"#,
        r#"{ "A": { "child_count": 0, "components": { "transform_": { "position_": [0.0] } } } }"#,
        r#"{ "A": { "child_count": 0 }"#,
    ];

    for json in broken.iter() {
        match serialization::load_str(&mut hierarchy, json) {
            Err(Error::Json(_)) => {}
            other => panic!("unexpected {:?} for {}", other, json),
        }

        assert_eq!(hierarchy.object_count(), 0);
        assert!(hierarchy.roots().is_empty());
    }

    assert!(events.borrow().iter().all(|e| *e == HierarchyEvent::Cleared));
}

#[test]
fn degenerate_scale() {
    let json = r#"{
        "A": { "child_count": 1 },
        "B": { "child_count": 0, "components": { "transform_": {
            "position_": [0.0, 0.0, 0.0],
            "rotation_": [0.0, 0.0, 0.0, 1.0],
            "scale_": [1.0, 0.0, 1.0]
        } } }
    }"#;

    let mut hierarchy = sample();
    match serialization::load_str(&mut hierarchy, json) {
        Err(Error::Malformed(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(hierarchy.object_count(), 0);
    hierarchy.validate().unwrap();
}

#[test]
fn load_reports_created_entities_only() {
    let json = r#"{
        "A": { "child_count": 1, "components": { "transform_": {
            "position_": [1.0, 0.0, 0.0],
            "rotation_": [0.0, 0.0, 0.0, 1.0],
            "scale_": [1.0, 1.0, 1.0]
        } } },
        "B": { "child_count": 0, "components": { "transform_": {
            "position_": [0.0, 2.0, 0.0],
            "rotation_": [0.0, 3.0, 0.0, 0.0],
            "scale_": [1.0, 1.0, 1.0]
        } } }
    }"#;

    let mut hierarchy = Hierarchy::default();
    let events = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = events.clone();
    hierarchy.attach(move |h: &Hierarchy, e: &HierarchyEvent| {
        let position = match *e {
            HierarchyEvent::Created { entity, .. } => h.local_position(entity),
            _ => None,
        };
        sink.borrow_mut().push((*e, position));
    });

    serialization::load_str(&mut hierarchy, json).unwrap();

    let events = events.borrow();
    assert_eq!(events[0].0, HierarchyEvent::Cleared);
    assert!(events.iter().all(|&(e, _)| match e {
        HierarchyEvent::TransformChanged { .. } => false,
        _ => true,
    }));

    let created: Vec<_> = events
        .iter()
        .filter_map(|&(e, position)| match e {
            HierarchyEvent::Created { index, .. } => Some((index, position)),
            _ => None,
        })
        .collect();

    assert_eq!(created.len(), 2);
    assert_eq!(created[0].0, 0);
    assert_near(created[0].1, [1.0, 0.0, 0.0]);
    assert_eq!(created[1].0, 1);
    assert_near(created[1].1, [0.0, 2.0, 0.0]);

    let b = hierarchy.object_at_index(1).unwrap();
    let rotation = hierarchy.local_rotation(b).unwrap();
    assert!((rotation.magnitude() - 1.0).abs() < 1e-6);
    assert_near(hierarchy.position(b), [1.0, 2.0, 0.0]);
    assert!(!hierarchy.is_dirty());
}
