use crate::math::prelude::*;

use super::transform::Transform;

/// `TransformNode` caches the local and world space state of one entity: its
/// TRS in both spaces and the three matrices derived from them.
///
/// The world space members are only ever written by the scene graph while it
/// rebuilds a subtree, so `local_to_world` always equals the parent's
/// `local_to_world * local_to_parent`, `world_to_local` is its inverse and
/// `world` is its decomposition.
#[derive(Debug, Clone, Copy)]
pub struct TransformNode {
    local: Transform,
    world: Transform,
    local_to_parent: Matrix4<f32>,
    local_to_world: Matrix4<f32>,
    world_to_local: Matrix4<f32>,
}

impl Default for TransformNode {
    fn default() -> Self {
        TransformNode {
            local: Transform::default(),
            world: Transform::default(),
            local_to_parent: Matrix4::identity(),
            local_to_world: Matrix4::identity(),
            world_to_local: Matrix4::identity(),
        }
    }
}

impl TransformNode {
    /// Gets the transform in local space.
    #[inline]
    pub fn local(&self) -> &Transform {
        &self.local
    }

    /// Gets the transform in world space.
    #[inline]
    pub fn world(&self) -> &Transform {
        &self.world
    }

    #[inline]
    pub fn local_to_parent(&self) -> &Matrix4<f32> {
        &self.local_to_parent
    }

    #[inline]
    pub fn local_to_world(&self) -> &Matrix4<f32> {
        &self.local_to_world
    }

    #[inline]
    pub fn world_to_local(&self) -> &Matrix4<f32> {
        &self.world_to_local
    }

    /// Returns the forward (+z) axis in world space, scaled by the world scale.
    #[inline]
    pub fn forward(&self) -> Vector3<f32> {
        self.local_to_world.z.truncate()
    }

    /// Returns the right (+x) axis in world space, scaled by the world scale.
    #[inline]
    pub fn right(&self) -> Vector3<f32> {
        self.local_to_world.x.truncate()
    }

    /// Returns the up (+y) axis in world space, scaled by the world scale.
    #[inline]
    pub fn up(&self) -> Vector3<f32> {
        self.local_to_world.y.truncate()
    }

    /// Returns the forward (+z) axis in parent space.
    #[inline]
    pub fn local_forward(&self) -> Vector3<f32> {
        self.local_to_parent.z.truncate()
    }

    /// Returns the right (+x) axis in parent space.
    #[inline]
    pub fn local_right(&self) -> Vector3<f32> {
        self.local_to_parent.x.truncate()
    }

    /// Returns the up (+y) axis in parent space.
    #[inline]
    pub fn local_up(&self) -> Vector3<f32> {
        self.local_to_parent.y.truncate()
    }

    /// Rotation in world space as euler angles, applied in x, y, z order.
    #[inline]
    pub fn euler_angles(&self) -> Euler<Deg<f32>> {
        self.world.euler_angles()
    }

    /// Rotation in local space as euler angles, applied in x, y, z order.
    #[inline]
    pub fn local_euler_angles(&self) -> Euler<Deg<f32>> {
        self.local.euler_angles()
    }

    pub(crate) fn set_local(&mut self, local: Transform) {
        self.local = local;
        self.local_to_parent = local.matrix();
    }

    pub(crate) fn set_local_to_parent(&mut self, m: Matrix4<f32>) {
        self.local = Transform::from_matrix(&m);
        self.local_to_parent = m;
    }

    /// Stores a world space state already checked for invertibility by the
    /// scene graph.
    pub(crate) fn set_world(&mut self, local_to_world: Matrix4<f32>, world_to_local: Matrix4<f32>) {
        self.local_to_world = local_to_world;
        self.world_to_local = world_to_local;
        self.world = Transform::from_matrix(&local_to_world);
    }
}
