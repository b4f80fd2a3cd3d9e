//! Message shapes exchanged with the remote engine.
//!
//! Entities are addressed by their position in the flat sequence. Indices are
//! `u32`, `NO_PARENT` stands for "no parent", and every transform is in local
//! space with rotations stored as `[x, y, z, w]`.

use outliner::math::{Quaternion, Vector3};
use outliner::spatial::prelude::Transform;

use crate::errors::*;

/// The parent index of entities placed at the root.
pub const NO_PARENT: u32 = ::std::u32::MAX;

/// Structural messages sent to the remote engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RemoteMessage {
    EntityCreated {
        entity_index: u32,
        sibling_index: u32,
        parent_index: u32,
        position: [f32; 3],
        rotation: [f32; 4],
        scale: [f32; 3],
    },
    EntityDestroyed {
        entity_index: u32,
    },
    /// Both `*_old_index` values were taken before the move.
    EntityReparented {
        entity_old_index: u32,
        new_parent_old_index: u32,
        new_sibling_index: u32,
    },
    /// The current local transform of an entity. Sent after every transform
    /// change, including the ones requested remotely.
    EntityTransform {
        entity_index: u32,
        position: [f32; 3],
        rotation: [f32; 4],
        scale: [f32; 3],
    },
    WorldCleared,
}

impl RemoteMessage {
    pub(crate) fn transform(entity_index: u32, transform: &Transform) -> Self {
        let (position, rotation, scale) = split(transform);
        RemoteMessage::EntityTransform {
            entity_index,
            position,
            rotation,
            scale,
        }
    }
}

/// A change to the local transform of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransformEdit {
    /// Sets the position, or adds to it when `relative`.
    Position { value: [f32; 3], relative: bool },
    /// Sets the rotation, or rotates on top of it when `relative`.
    Rotation { value: [f32; 4], relative: bool },
    /// Sets the scale, or multiplies it per axis when `relative`.
    Scale { value: [f32; 3], relative: bool },
    /// Overwrites position, rotation and scale at once.
    Trs {
        position: [f32; 3],
        rotation: [f32; 4],
        scale: [f32; 3],
    },
}

/// A transform edit requested by the remote engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemoteEdit {
    pub entity_index: u32,
    pub edit: TransformEdit,
}

pub(crate) fn split(transform: &Transform) -> ([f32; 3], [f32; 4], [f32; 3]) {
    let q = transform.rotation;
    (
        transform.position.into(),
        [q.v.x, q.v.y, q.v.z, q.s],
        transform.scale.into(),
    )
}

pub(crate) fn quaternion(v: [f32; 4]) -> Quaternion<f32> {
    Quaternion::new(v[3], v[0], v[1], v[2])
}

pub(crate) fn compose(position: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Transform {
    Transform::new(
        Vector3::from(position),
        quaternion(rotation),
        Vector3::from(scale),
    )
}

/// Encodes an outbound message into bytes.
pub fn encode_message(message: &RemoteMessage) -> Result<Vec<u8>> {
    Ok(bincode::serialize(message)?)
}

/// Decodes an outbound message from bytes.
pub fn decode_message(bytes: &[u8]) -> Result<RemoteMessage> {
    Ok(bincode::deserialize(bytes)?)
}

/// Encodes an inbound transform edit into bytes.
pub fn encode_edit(edit: &RemoteEdit) -> Result<Vec<u8>> {
    Ok(bincode::serialize(edit)?)
}

/// Decodes an inbound transform edit from bytes.
pub fn decode_edit(bytes: &[u8]) -> Result<RemoteEdit> {
    Ok(bincode::deserialize(bytes)?)
}
