use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use outliner::errors::Error as HierarchyError;
use outliner::hierarchy::prelude::*;
use outliner::math::prelude::*;
use outliner::Entity;

use crate::errors::*;
use crate::messages::{self, RemoteEdit, RemoteMessage, TransformEdit, NO_PARENT};

/// Setup parameters of `RemoteSync`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteParams {
    /// The maximum number of inbound edits taken out of the queue by a single
    /// `apply_pending` call. Zero means no limit.
    pub max_edits_per_apply: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The queue of transform edits received from the remote engine.
///
/// It could be cloned and handed to transport threads, which push decoded
/// edits into it. The owner of the hierarchy drains it with
/// `RemoteSync::apply_pending`.
#[derive(Debug, Clone, Default)]
pub struct RemoteInbox {
    edits: Arc<Mutex<VecDeque<RemoteEdit>>>,
}

impl RemoteInbox {
    pub fn new() -> Self {
        Default::default()
    }

    /// Queues an edit.
    pub fn push(&self, edit: RemoteEdit) {
        lock(&self.edits).push_back(edit);
    }

    /// Decodes and queues an edit.
    pub fn push_bytes(&self, bytes: &[u8]) -> Result<()> {
        let edit = messages::decode_edit(bytes)?;
        self.push(edit);
        Ok(())
    }

    /// Abandons every queued edit that matches the predicate. Returns the
    /// number of edits removed.
    pub fn cancel<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&RemoteEdit) -> bool,
    {
        let mut edits = lock(&self.edits);
        let len = edits.len();
        edits.retain(|v| !predicate(v));
        len - edits.len()
    }

    /// Abandons every queued edit.
    pub fn clear(&self) -> usize {
        let mut edits = lock(&self.edits);
        let len = edits.len();
        edits.clear();
        len
    }

    #[inline]
    pub fn len(&self) -> usize {
        lock(&self.edits).len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        lock(&self.edits).is_empty()
    }

    fn pop(&self) -> Option<RemoteEdit> {
        lock(&self.edits).pop_front()
    }
}

/// Turns hierarchy events into outbound messages.
struct Outbound {
    messages: Arc<Mutex<Vec<RemoteMessage>>>,
}

impl HierarchyListener for Outbound {
    fn on_event(&mut self, hierarchy: &Hierarchy, event: &HierarchyEvent) {
        let message = match *event {
            HierarchyEvent::Created {
                entity,
                index,
                sibling_index,
                parent_index,
            } => {
                let transform = hierarchy.local_transform(entity).unwrap_or_default();
                let (position, rotation, scale) = messages::split(&transform);
                RemoteMessage::EntityCreated {
                    entity_index: index as u32,
                    sibling_index: sibling_index as u32,
                    parent_index: parent_index.map(|v| v as u32).unwrap_or(NO_PARENT),
                    position,
                    rotation,
                    scale,
                }
            }

            HierarchyEvent::Destroyed { index, .. } => RemoteMessage::EntityDestroyed {
                entity_index: index as u32,
            },

            HierarchyEvent::Reparented {
                old_index,
                new_parent_old_index,
                new_sibling_index,
                ..
            } => RemoteMessage::EntityReparented {
                entity_old_index: old_index as u32,
                new_parent_old_index: new_parent_old_index
                    .map(|v| v as u32)
                    .unwrap_or(NO_PARENT),
                new_sibling_index: new_sibling_index as u32,
            },

            HierarchyEvent::TransformChanged { entity } => match echo(hierarchy, entity) {
                Some(message) => message,
                None => return,
            },

            HierarchyEvent::Cleared => RemoteMessage::WorldCleared,
            HierarchyEvent::Changed { .. } => return,
        };

        lock(&self.messages).push(message);
    }
}

fn echo(hierarchy: &Hierarchy, ent: Entity) -> Option<RemoteMessage> {
    let index = hierarchy.index(ent)?;
    let transform = hierarchy.local_transform(ent)?;
    Some(RemoteMessage::transform(index as u32, &transform))
}

/// The bridge between a `Hierarchy` and a remote engine.
///
/// Once attached, every structural mutation and transform change of the
/// hierarchy is turned into a `RemoteMessage` and buffered until
/// `drain_outbound`. Transform edits coming from the remote engine are queued
/// in the `RemoteInbox` and applied by `apply_pending`, each of them answered
/// with the corrected transform.
pub struct RemoteSync {
    listener: HierarchyListenerHandle,
    outbox: Arc<Mutex<Vec<RemoteMessage>>>,
    inbox: RemoteInbox,
    params: RemoteParams,
}

impl RemoteSync {
    /// Attaches a new adapter to the hierarchy.
    pub fn attach(hierarchy: &mut Hierarchy, params: RemoteParams) -> Self {
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let listener = hierarchy.attach(Outbound {
            messages: outbox.clone(),
        });

        info!("[RemoteSync] attached to hierarchy.");

        RemoteSync {
            listener,
            outbox,
            inbox: RemoteInbox::new(),
            params,
        }
    }

    /// Detaches the adapter from the hierarchy. Messages still buffered are
    /// returned.
    pub fn detach(self, hierarchy: &mut Hierarchy) -> Vec<RemoteMessage> {
        hierarchy.detach(self.listener);
        info!("[RemoteSync] detached from hierarchy.");
        self.drain_outbound()
    }

    /// Returns a handle to the inbound edit queue.
    #[inline]
    pub fn inbox(&self) -> RemoteInbox {
        self.inbox.clone()
    }

    #[inline]
    pub fn params(&self) -> RemoteParams {
        self.params
    }

    /// Takes the buffered outbound messages, in the order they were raised.
    pub fn drain_outbound(&self) -> Vec<RemoteMessage> {
        ::std::mem::replace(&mut *lock(&self.outbox), Vec::new())
    }

    /// Takes the buffered outbound messages, encoded.
    pub fn drain_outbound_bytes(&self) -> Result<Vec<Vec<u8>>> {
        self.drain_outbound()
            .iter()
            .map(messages::encode_message)
            .collect()
    }

    /// Applies queued edits one at a time, in the order they were received.
    ///
    /// Edits addressing an index out of the flat sequence are dropped. Edits
    /// rejected by the hierarchy, like a degenerate scale or a zero rotation,
    /// are answered with the current unchanged transform. Accepted rotations
    /// are normalized, and the echo carries the normalized value. Returns the number of edits that took
    /// effect.
    pub fn apply_pending(&self, hierarchy: &mut Hierarchy) -> Result<usize> {
        let mut taken = 0;
        let mut applied = 0;

        while self.params.max_edits_per_apply == 0 || taken < self.params.max_edits_per_apply {
            let edit = match self.inbox.pop() {
                Some(edit) => edit,
                None => break,
            };

            taken += 1;

            let ent = match hierarchy.object_at_index(edit.entity_index as usize) {
                Some(ent) => ent,
                None => {
                    warn!(
                        "[RemoteSync] dropped edit of entity at {}, which is out of range.",
                        edit.entity_index
                    );
                    continue;
                }
            };

            match apply(hierarchy, ent, edit.edit) {
                Ok(()) => applied += 1,
                Err(err @ HierarchyError::DegenerateScale { .. })
                | Err(err @ HierarchyError::DegenerateRotation { .. })
                | Err(err @ HierarchyError::SingularTransform(_)) => {
                    warn!("[RemoteSync] rejected edit of {}. {}", ent, err);
                    if let Some(message) = echo(hierarchy, ent) {
                        lock(&self.outbox).push(message);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(applied)
    }
}

fn apply(hierarchy: &mut Hierarchy, ent: Entity, edit: TransformEdit) -> ::outliner::errors::Result<()> {
    match edit {
        TransformEdit::Position { value, relative } => {
            if relative {
                hierarchy.translate(ent, value)
            } else {
                hierarchy.set_local_position(ent, value)
            }
        }

        TransformEdit::Rotation { value, relative } => {
            let rotation = messages::quaternion(value);
            if relative {
                hierarchy.rotate(ent, rotation)
            } else {
                hierarchy.set_local_rotation(ent, rotation)
            }
        }

        TransformEdit::Scale { value, relative } => {
            let mut scale = Vector3::from(value);
            if relative {
                let current = hierarchy
                    .local_scale(ent)
                    .ok_or(HierarchyError::NotFound(ent))?;
                scale = current.mul_element_wise(scale);
            }

            hierarchy.set_local_scale(ent, scale)
        }

        TransformEdit::Trs {
            position,
            rotation,
            scale,
        } => hierarchy.set_local_transform(ent, messages::compose(position, rotation, scale)),
    }
}
