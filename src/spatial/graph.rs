use smallvec::SmallVec;

use crate::errors::*;
use crate::math::prelude::*;
use crate::utils::prelude::HandleLike;
use crate::Entity;

use super::node::TransformNode;
use super::transform::{self, Transform};

/// Rotations shorter than this can not be normalized.
const MIN_ROTATION_MAGNITUDE: f32 = 1e-6;

#[derive(Debug, Clone)]
struct Slot {
    ent: Entity,
    parent: Option<Entity>,
    children: SmallVec<[Entity; 4]>,
    transform: TransformNode,
}

/// A scene graph that stores and propagates the position, rotation and scale of
/// objects. It keeps the tree relationships between nodes, so properties of a
/// transformation could be accessed in both local and world space.
///
/// Nodes are addressed by `Entity` and stored in slots indexed by the handle
/// index. Every local change rebuilds the world space state of the whole
/// subtree right away, so reads never recompute anything.
pub struct SceneGraph {
    slots: Vec<Option<Slot>>,
    len: usize,
    min_scale: f32,
    rebuilt: Vec<Entity>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        SceneGraph::new(1e-5)
    }
}

impl SceneGraph {
    /// Creates a scene graph rejecting scale components below `min_scale`.
    pub fn new(min_scale: f32) -> Self {
        SceneGraph {
            slots: Vec::new(),
            len: 0,
            min_scale,
            rebuilt: Vec::new(),
        }
    }

    pub fn with_capacity(min_scale: f32, capacity: usize) -> Self {
        SceneGraph {
            slots: Vec::with_capacity(capacity),
            len: 0,
            min_scale,
            rebuilt: Vec::new(),
        }
    }

    /// Adds a root node with the identity transform. Returns false if `ent`
    /// already has a node.
    pub fn add(&mut self, ent: Entity) -> bool {
        if self.contains(ent) {
            return false;
        }

        let index = ent.index() as usize;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }

        self.slots[index] = Some(Slot {
            ent,
            parent: None,
            children: SmallVec::new(),
            transform: TransformNode::default(),
        });

        self.len += 1;
        true
    }

    /// Removes a node and all of its descendants. Returns the removed nodes in
    /// tree order, or None if `ent` has no node.
    pub fn remove(&mut self, ent: Entity) -> Option<Vec<Entity>> {
        let parent = self.slot(ent)?.parent;
        if let Some(parent) = parent {
            self.unlink(parent, ent);
        }

        let removes: Vec<_> = self.descendants(ent).collect();
        for &v in &removes {
            self.slots[v.index() as usize] = None;
        }

        self.len -= removes.len();
        Some(removes)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.rebuilt.clear();
        self.len = 0;
    }

    #[inline]
    pub fn contains(&self, ent: Entity) -> bool {
        self.slot(ent).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn min_scale(&self) -> f32 {
        self.min_scale
    }

    /// Takes the nodes whose world space state was rebuilt since the last call,
    /// in rebuild order.
    pub fn take_rebuilt(&mut self) -> Vec<Entity> {
        ::std::mem::replace(&mut self.rebuilt, Vec::new())
    }

    #[inline]
    fn slot(&self, ent: Entity) -> Option<&Slot> {
        self.slots
            .get(ent.index() as usize)
            .and_then(|v| v.as_ref())
            .filter(|v| v.ent == ent)
    }

    #[inline]
    fn slot_mut(&mut self, ent: Entity) -> Option<&mut Slot> {
        self.slots
            .get_mut(ent.index() as usize)
            .and_then(|v| v.as_mut())
            .filter(|v| v.ent == ent)
    }

    #[inline]
    fn slot_or_err(&self, ent: Entity) -> Result<&Slot> {
        self.slot(ent).ok_or(Error::NotFound(ent))
    }

    fn unlink(&mut self, parent: Entity, child: Entity) {
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.retain(|v| *v != child);
        }
    }
}

impl SceneGraph {
    /// Gets the parent node.
    #[inline]
    pub fn parent(&self, ent: Entity) -> Option<Entity> {
        self.slot(ent).and_then(|v| v.parent)
    }

    /// Gets the children of this node, in attach order.
    #[inline]
    pub fn children(&self, ent: Entity) -> &[Entity] {
        self.slot(ent).map(|v| &v.children[..]).unwrap_or(&[])
    }

    /// Returns true if this is the leaf of a hierarchy, aka. has no child.
    #[inline]
    pub fn is_leaf(&self, ent: Entity) -> bool {
        self.slot(ent).map(|v| v.children.is_empty()).unwrap_or(false)
    }

    /// Returns true if this is the root of a hierarchy, aka. has no parent.
    #[inline]
    pub fn is_root(&self, ent: Entity) -> bool {
        self.slot(ent).map(|v| v.parent.is_none()).unwrap_or(false)
    }

    /// Returns an iterator over the ancestors of `ent`, nearest first.
    #[inline]
    pub fn ancestors(&self, ent: Entity) -> Ancestors {
        Ancestors {
            cursor: self.parent(ent),
            scene: self,
        }
    }

    /// Returns true if `rhs` is one of the ancestors of `lhs`.
    #[inline]
    pub fn is_ancestor(&self, lhs: Entity, rhs: Entity) -> bool {
        self.ancestors(lhs).any(|v| v == rhs)
    }

    /// Returns an iterator over `ent` and its descendants in pre-order.
    #[inline]
    pub fn descendants(&self, ent: Entity) -> Descendants {
        let mut stack = Vec::new();
        if self.contains(ent) {
            stack.push(ent);
        }

        Descendants { stack, scene: self }
    }

    /// Gets the cached transformation state of `ent`.
    #[inline]
    pub fn node(&self, ent: Entity) -> Option<&TransformNode> {
        self.slot(ent).map(|v| &v.transform)
    }
}

/// An iterator over the ancestors of a node.
pub struct Ancestors<'a> {
    scene: &'a SceneGraph,
    cursor: Option<Entity>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = Entity;

    fn next(&mut self) -> Option<Self::Item> {
        let ent = self.cursor?;
        self.cursor = self.scene.parent(ent);
        Some(ent)
    }
}

/// An iterator over a node and its descendants, in pre-order.
pub struct Descendants<'a> {
    scene: &'a SceneGraph,
    stack: Vec<Entity>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = Entity;

    fn next(&mut self) -> Option<Self::Item> {
        let ent = self.stack.pop()?;
        self.stack
            .extend(self.scene.children(ent).iter().rev().cloned());
        Some(ent)
    }
}

/// World space matrices of one node, computed ahead of a commit.
type World = (Entity, Matrix4<f32>, Matrix4<f32>);

impl SceneGraph {
    /// Moves `child` under `parent`, or to the root when `parent` is None. The
    /// world space pose of `child` is kept, its local transform is recomputed.
    ///
    /// Parenting a node to itself, or to its current parent, does nothing.
    /// Parenting a node to one of its own descendants fails with
    /// `Error::CyclicParent`.
    #[inline]
    pub fn set_parent<T>(&mut self, child: Entity, parent: T) -> Result<()>
    where
        T: Into<Option<Entity>>,
    {
        self.set_parent_with(child, parent, true)
    }

    /// Moves `child` under `parent`. With `keep_world_pose` the local transform
    /// is recomputed so the world pose stays, otherwise the local transform
    /// stays and the world pose follows the new parent.
    ///
    /// Nothing is modified if the move fails.
    pub fn set_parent_with<T>(&mut self, child: Entity, parent: T, keep_world_pose: bool) -> Result<()>
    where
        T: Into<Option<Entity>>,
    {
        let parent = parent.into();
        let (old_parent, local_to_world, local_to_parent) = {
            let slot = self.slot_or_err(child)?;
            (
                slot.parent,
                *slot.transform.local_to_world(),
                *slot.transform.local_to_parent(),
            )
        };

        if parent == Some(child) || parent == old_parent {
            return Ok(());
        }

        let (parent_to_world, world_to_parent) = match parent {
            Some(parent) => {
                let node = self.slot_or_err(parent)?.transform;
                if self.is_ancestor(parent, child) {
                    return Err(Error::CyclicParent { child, parent });
                }

                (*node.local_to_world(), *node.world_to_local())
            }
            None => (Matrix4::identity(), Matrix4::identity()),
        };

        let local_to_parent = if keep_world_pose {
            world_to_parent * local_to_world
        } else {
            local_to_parent
        };

        let worlds = self.compose(child, parent_to_world * local_to_parent)?;

        if let Some(old_parent) = old_parent {
            self.unlink(old_parent, child);
        }

        if let Some(parent) = parent {
            if let Some(slot) = self.slot_mut(parent) {
                slot.children.push(child);
            }
        }

        if let Some(slot) = self.slot_mut(child) {
            slot.parent = parent;
            if keep_world_pose {
                slot.transform.set_local_to_parent(local_to_parent);
            }
        }

        self.commit(worlds);
        Ok(())
    }

    /// Attaches `child` under `parent`, keeping its world pose.
    #[inline]
    pub fn attach_child(&mut self, parent: Entity, child: Entity) -> Result<()> {
        self.set_parent(child, parent)
    }

    /// Detaches `child` from `parent` to the root, keeping its world pose. Does
    /// nothing if `parent` is not the parent of `child`.
    pub fn detach_child(&mut self, parent: Entity, child: Entity) -> Result<()> {
        if self.slot_or_err(child)?.parent == Some(parent) {
            self.set_parent(child, None)
        } else {
            Ok(())
        }
    }

    /// Recomputes the world space state of `ent` and all of its descendants.
    /// If any of them turns out singular, nothing is written.
    pub fn rebuild(&mut self, ent: Entity) -> Result<()> {
        let local_to_parent = *self.slot_or_err(ent)?.transform.local_to_parent();
        let worlds = self.compose(ent, self.parent_to_world(ent) * local_to_parent)?;
        self.commit(worlds);
        Ok(())
    }

    fn parent_to_world(&self, ent: Entity) -> Matrix4<f32> {
        self.parent(ent)
            .and_then(|p| self.node(p))
            .map(|p| *p.local_to_world())
            .unwrap_or_else(Matrix4::identity)
    }

    /// Computes the world space state of the subtree of `ent` in pre-order,
    /// given the new `local_to_world` of `ent` itself.
    fn compose(&self, ent: Entity, local_to_world: Matrix4<f32>) -> Result<Vec<World>> {
        let mut worlds = Vec::new();
        let mut stack = vec![(ent, local_to_world)];

        while let Some((v, local_to_world)) = stack.pop() {
            let world_to_local = local_to_world
                .invert()
                .ok_or(Error::SingularTransform(v))?;

            for &child in self.children(v).iter().rev() {
                if let Some(node) = self.node(child) {
                    stack.push((child, local_to_world * *node.local_to_parent()));
                }
            }

            worlds.push((v, local_to_world, world_to_local));
        }

        Ok(worlds)
    }

    fn commit(&mut self, worlds: Vec<World>) {
        for (v, local_to_world, world_to_local) in worlds {
            if let Some(slot) = self.slot_mut(v) {
                slot.transform.set_world(local_to_world, world_to_local);
            }

            self.rebuilt.push(v);
        }
    }
}

impl SceneGraph {
    /// Gets the transform in world space.
    #[inline]
    pub fn transform(&self, ent: Entity) -> Option<Transform> {
        self.node(ent).map(|v| *v.world())
    }

    /// Gets the transform in local space.
    #[inline]
    pub fn local_transform(&self, ent: Entity) -> Option<Transform> {
        self.node(ent).map(|v| *v.local())
    }

    /// Sets the transform in local space and rebuilds the subtree. The
    /// rotation is normalized.
    ///
    /// Fails with `Error::DegenerateScale` or `Error::DegenerateRotation`
    /// before anything is written, and with `Error::SingularTransform` if the
    /// subtree can not be rebuilt. The node is left untouched in every case.
    pub fn set_local_transform(&mut self, ent: Entity, transform: Transform) -> Result<()> {
        let mut transform = transform;
        if transform.is_degenerate(self.min_scale) {
            return Err(Error::DegenerateScale {
                scale: transform.scale.into(),
                min: self.min_scale,
            });
        }

        let magnitude = transform.rotation.magnitude();
        if !(magnitude > MIN_ROTATION_MAGNITUDE) || !magnitude.is_finite() {
            let q = transform.rotation;
            return Err(Error::DegenerateRotation {
                rotation: [q.v.x, q.v.y, q.v.z, q.s],
            });
        }

        transform.rotation = transform.rotation / magnitude;

        self.slot_or_err(ent)?;
        let worlds = self.compose(ent, self.parent_to_world(ent) * transform.matrix())?;

        if let Some(slot) = self.slot_mut(ent) {
            slot.transform.set_local(transform);
        }

        self.commit(worlds);
        Ok(())
    }

    /// Gets position of the transform in world space.
    #[inline]
    pub fn position(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.node(ent).map(|v| v.world().position)
    }

    /// Sets position of the transform in world space.
    pub fn set_position<T>(&mut self, ent: Entity, position: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let mut local = self.local_transform(ent).ok_or(Error::NotFound(ent))?;
        local.position = match self.parent(ent).and_then(|p| self.node(p)) {
            Some(parent) => transform::transform_point(parent.world_to_local(), position.into()),
            None => position.into(),
        };

        self.set_local_transform(ent, local)
    }

    /// Gets position of the transform in local space.
    #[inline]
    pub fn local_position(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.node(ent).map(|v| v.local().position)
    }

    /// Sets position of the transform in local space.
    pub fn set_local_position<T>(&mut self, ent: Entity, position: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let mut local = self.local_transform(ent).ok_or(Error::NotFound(ent))?;
        local.position = position.into();
        self.set_local_transform(ent, local)
    }

    /// Moves the transform in the direction and distance of translation, in
    /// local space.
    pub fn translate<T>(&mut self, ent: Entity, translation: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let mut local = self.local_transform(ent).ok_or(Error::NotFound(ent))?;
        local.position += translation.into();
        self.set_local_transform(ent, local)
    }
}

impl SceneGraph {
    /// Gets rotation of the transform in world space.
    #[inline]
    pub fn rotation(&self, ent: Entity) -> Option<Quaternion<f32>> {
        self.node(ent).map(|v| v.world().rotation)
    }

    /// Sets rotation of the transform in world space.
    pub fn set_rotation<T>(&mut self, ent: Entity, rotation: T) -> Result<()>
    where
        T: Into<Quaternion<f32>>,
    {
        let mut local = self.local_transform(ent).ok_or(Error::NotFound(ent))?;
        local.rotation = match self.parent(ent).and_then(|p| self.node(p)) {
            Some(parent) => parent.world().rotation.invert() * rotation.into(),
            None => rotation.into(),
        };

        self.set_local_transform(ent, local)
    }

    /// Gets rotation of the transform in local space.
    #[inline]
    pub fn local_rotation(&self, ent: Entity) -> Option<Quaternion<f32>> {
        self.node(ent).map(|v| v.local().rotation)
    }

    /// Sets rotation of the transform in local space.
    pub fn set_local_rotation<T>(&mut self, ent: Entity, rotation: T) -> Result<()>
    where
        T: Into<Quaternion<f32>>,
    {
        let mut local = self.local_transform(ent).ok_or(Error::NotFound(ent))?;
        local.rotation = rotation.into();
        self.set_local_transform(ent, local)
    }

    /// Applies a rotation on top of the local rotation.
    pub fn rotate<T>(&mut self, ent: Entity, rotation: T) -> Result<()>
    where
        T: Into<Quaternion<f32>>,
    {
        let mut local = self.local_transform(ent).ok_or(Error::NotFound(ent))?;
        local.rotation = rotation.into() * local.rotation;
        self.set_local_transform(ent, local)
    }
}

impl SceneGraph {
    /// Gets scale of the transform in world space.
    #[inline]
    pub fn scale(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.node(ent).map(|v| v.world().scale)
    }

    /// Sets scale of the transform in world space. The parent's world scale is
    /// divided out per axis.
    pub fn set_scale<T>(&mut self, ent: Entity, scale: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let mut local = self.local_transform(ent).ok_or(Error::NotFound(ent))?;
        local.scale = match self.parent(ent).and_then(|p| self.node(p)) {
            Some(parent) => scale.into().div_element_wise(parent.world().scale),
            None => scale.into(),
        };

        self.set_local_transform(ent, local)
    }

    /// Gets scale of the transform in local space.
    #[inline]
    pub fn local_scale(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.node(ent).map(|v| v.local().scale)
    }

    /// Sets scale of the transform in local space.
    pub fn set_local_scale<T>(&mut self, ent: Entity, scale: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let mut local = self.local_transform(ent).ok_or(Error::NotFound(ent))?;
        local.scale = scale.into();
        self.set_local_transform(ent, local)
    }
}
