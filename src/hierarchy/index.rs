use std::collections::HashMap;

use inlinable_string::InlinableString;
use serde_json::{Map, Value};

use crate::errors::*;
use crate::math::prelude::*;
use crate::settings::HierarchyParams;
use crate::spatial::prelude::{SceneGraph, Transform, TransformNode};
use crate::utils::prelude::ObjectPool;
use crate::Entity;

use super::events::{HierarchyEvent, HierarchyListener, HierarchyListenerHandle};
use super::proxy::{EntityProxy, EntityRef};

/// The entity tree of an open world, kept in two shapes at once.
///
/// The *flat sequence* orders every attached entity so that the heirs of an
/// entity at position `i` with `h` heirs occupy exactly `[i + 1, i + h]`.
/// Neighbours in the sequence are linked through `previous`/`next`. On top of
/// that each entity keeps its ordered children for display, and the roots are
/// kept in display order as well.
///
/// Every mutator keeps both shapes, the scene graph and the `previous`/`next`
/// links consistent, and notifies the attached listeners before returning.
pub struct Hierarchy {
    proxies: ObjectPool<Entity, EntityProxy>,
    sequence: Vec<Entity>,
    roots: Vec<Entity>,
    graph: SceneGraph,
    dirty: bool,
    listeners: ObjectPool<HierarchyListenerHandle, Box<dyn HierarchyListener>>,
    events: Vec<HierarchyEvent>,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Hierarchy::new(HierarchyParams::default())
    }
}

impl Hierarchy {
    pub fn new(params: HierarchyParams) -> Self {
        Hierarchy {
            proxies: ObjectPool::with_capacity(params.capacity),
            sequence: Vec::with_capacity(params.capacity),
            roots: Vec::new(),
            graph: SceneGraph::with_capacity(params.min_scale, params.capacity),
            dirty: false,
            listeners: ObjectPool::new(),
            events: Vec::new(),
        }
    }

    /// Attaches a listener, which will be told about every following mutation.
    pub fn attach<T>(&mut self, listener: T) -> HierarchyListenerHandle
    where
        T: HierarchyListener + 'static,
    {
        self.listeners.create(Box::new(listener))
    }

    /// Detaches a listener. Returns false if it was not attached.
    pub fn detach(&mut self, handle: HierarchyListenerHandle) -> bool {
        self.listeners.free(handle).is_some()
    }

    /// Delivers the queued events, in order, to every listener.
    fn flush(&mut self) {
        if self.events.is_empty() {
            return;
        }

        let events = ::std::mem::replace(&mut self.events, Vec::new());
        let mut listeners = ::std::mem::replace(&mut self.listeners, ObjectPool::new());
        for event in &events {
            for v in listeners.values_mut() {
                v.on_event(self, event);
            }
        }

        self.listeners = listeners;
    }
}

impl Hierarchy {
    /// Allocates a detached entity. It owns a transform node and could be
    /// given components, but it is not part of the flat sequence until it is
    /// passed to `add`.
    pub fn spawn<T: AsRef<str>>(&mut self, name: T) -> Entity {
        let ent = self.proxies.create(EntityProxy::new(name.as_ref()));
        self.graph.add(ent);
        ent
    }

    /// Creates a new entity as the last child of `parent`, or as the last root.
    pub fn create<T1, T2>(&mut self, name: T1, parent: T2) -> Result<Entity>
    where
        T1: AsRef<str>,
        T2: Into<Option<Entity>>,
    {
        let parent = parent.into();
        if let Some(parent) = parent {
            self.attached_proxy(parent)?;
        }

        let ent = self.spawn(name);
        self.add(ent, parent)
    }

    /// Splices a spawned entity into the flat sequence, right after the last
    /// heir of `parent`, or at the end if it becomes a root. The transform
    /// node is attached under the parent's and keeps its local transform, so a
    /// spawned entity could be given its transform before it is added.
    ///
    /// Adding an entity that is already in the flat sequence does nothing.
    pub fn add<T>(&mut self, ent: Entity, parent: T) -> Result<Entity>
    where
        T: Into<Option<Entity>>,
    {
        let parent = parent.into();
        if self.proxy_or_err(ent)?.attached {
            warn!("[Hierarchy] {} is already in the flat sequence, ignored.", ent);
            return Ok(ent);
        }

        let (position, parent_index) = match parent {
            Some(parent) => {
                self.attached_proxy(parent)?;
                let v = self.get(parent).ok_or(Error::NotFound(parent))?;
                let index = v.index().ok_or(Error::Detached(parent))?;
                (index + v.num_heirs() + 1, Some(index))
            }
            None => (self.sequence.len(), None),
        };

        self.graph.set_parent_with(ent, parent, false)?;
        self.insert_range(position, &[ent])?;

        let sibling_index = self.push_child(parent, ent);

        if let Some(proxy) = self.proxy_mut(ent) {
            proxy.attached = true;
            proxy.parent = parent;
        }

        self.dirty = true;
        self.events.push(HierarchyEvent::Created {
            entity: ent,
            index: position,
            sibling_index,
            parent_index,
        });

        self.mark_rebuilt();
        self.flush();
        Ok(ent)
    }

    /// Removes an entity and its whole subtree. Returns the removed entities
    /// in flat sequence order.
    pub fn delete(&mut self, ent: Entity) -> Result<Vec<Entity>> {
        let (attached, parent) = {
            let proxy = self.proxy_or_err(ent)?;
            (proxy.attached, proxy.parent)
        };

        if !attached {
            self.graph.remove(ent);
            self.proxies.free(ent);
            return Ok(vec![ent]);
        }

        let (index, heirs) = {
            let v = self.get(ent).ok_or(Error::NotFound(ent))?;
            (v.index().ok_or(Error::Detached(ent))?, v.num_heirs())
        };

        let removes = self.remove_range(index, index + heirs + 1)?;
        self.unlink(ent, parent);
        self.graph.remove(ent);
        for &v in &removes {
            self.proxies.free(v);
        }

        self.dirty = true;
        self.events.push(HierarchyEvent::Destroyed {
            entity: ent,
            index,
            count: removes.len(),
        });

        self.flush();
        Ok(removes)
    }

    /// Moves `target` and its heirs to become the last child of `parent`, or
    /// the last root when `parent` is None. The world pose of `target` is kept.
    ///
    /// Parenting an entity to itself or to its current parent does nothing.
    /// Parenting an entity to one of its heirs fails with `Error::CyclicParent`.
    /// On any failure the hierarchy is left untouched and no event is raised.
    pub fn set_parent<T>(&mut self, target: Entity, parent: T) -> Result<()>
    where
        T: Into<Option<Entity>>,
    {
        let parent = parent.into();
        let old_parent = self.attached_proxy(target)?.parent;
        if let Some(parent) = parent {
            self.attached_proxy(parent)?;
        }

        if parent == Some(target) || parent == old_parent {
            return Ok(());
        }

        if let Some(parent) = parent {
            if self.is_ancestor(parent, target) {
                return Err(Error::CyclicParent {
                    child: target,
                    parent,
                });
            }
        }

        let (old_index, heirs) = {
            let v = self.get(target).ok_or(Error::NotFound(target))?;
            (v.index().ok_or(Error::Detached(target))?, v.num_heirs())
        };

        let new_parent_old_index = parent.and_then(|v| self.index(v));

        // The scene graph either moves the whole subtree or nothing, so it
        // goes first.
        self.graph.set_parent(target, parent)?;

        let block = self.remove_range(old_index, old_index + heirs + 1)?;
        self.unlink(target, old_parent);

        let position = match parent {
            Some(parent) => {
                let v = self.get(parent).ok_or(Error::NotFound(parent))?;
                v.index().ok_or(Error::Detached(parent))? + v.num_heirs() + 1
            }
            None => self.sequence.len(),
        };

        self.insert_range(position, &block)?;

        let new_sibling_index = self.push_child(parent, target);

        if let Some(proxy) = self.proxy_mut(target) {
            proxy.parent = parent;
        }

        self.dirty = true;
        self.events.push(HierarchyEvent::Reparented {
            entity: target,
            old_index,
            new_parent_old_index,
            new_sibling_index,
        });

        self.mark_rebuilt();
        self.flush();
        Ok(())
    }

    /// Removes every entity.
    pub fn clear(&mut self) {
        self.proxies.clear();
        self.sequence.clear();
        self.roots.clear();
        self.graph.clear();
        self.dirty = true;

        info!("[Hierarchy] cleared.");
        self.events.push(HierarchyEvent::Cleared);
        self.flush();
    }
}

impl Hierarchy {
    /// Splices `block` into the flat sequence at `position` and links the
    /// neighbours on both sides of it.
    pub(crate) fn insert_range(&mut self, position: usize, block: &[Entity]) -> Result<()> {
        if position > self.sequence.len() {
            return Err(Error::InvalidRange {
                left: position,
                right: self.sequence.len(),
            });
        }

        self.sequence
            .splice(position..position, block.iter().cloned());

        for i in position..=position + block.len() {
            self.make_neighbours_safe(i.checked_sub(1), i)?;
        }

        Ok(())
    }

    /// Cuts `[start, end)` out of the flat sequence and links the entities on
    /// both sides of the gap. Returns the removed entities.
    pub(crate) fn remove_range(&mut self, start: usize, end: usize) -> Result<Vec<Entity>> {
        if start > end || end > self.sequence.len() {
            return Err(Error::InvalidRange {
                left: start,
                right: end,
            });
        }

        let removes: Vec<_> = self.sequence.drain(start..end).collect();
        self.make_neighbours_safe(start.checked_sub(1), start)?;
        Ok(removes)
    }

    /// Links the entities at positions `left` and `right` as neighbours. A
    /// position outside the sequence, or a `left` of None, stands for the
    /// start or the end of the sequence.
    pub(crate) fn make_neighbours_safe(&mut self, left: Option<usize>, right: usize) -> Result<()> {
        if let Some(left) = left {
            if left > right {
                return Err(Error::InvalidRange { left, right });
            }
        }

        let lhs = left.and_then(|v| self.sequence.get(v)).cloned();
        let rhs = self.sequence.get(right).cloned();

        if let Some(lhs) = lhs {
            if let Some(proxy) = self.proxies.get_mut(lhs) {
                proxy.next = rhs;
            }
        }

        if let Some(rhs) = rhs {
            if let Some(proxy) = self.proxies.get_mut(rhs) {
                proxy.prev = lhs;
            }
        }

        Ok(())
    }

    /// Appends `ent` to the children of `parent`, or to the roots. Returns its
    /// sibling index.
    fn push_child(&mut self, parent: Option<Entity>, ent: Entity) -> usize {
        if let Some(parent) = parent {
            if let Some(proxy) = self.proxies.get_mut(parent) {
                proxy.children.push(ent);
                return proxy.children.len() - 1;
            }
        }

        self.roots.push(ent);
        self.roots.len() - 1
    }

    fn unlink(&mut self, ent: Entity, parent: Option<Entity>) {
        if let Some(parent) = parent {
            if let Some(proxy) = self.proxies.get_mut(parent) {
                proxy.children.retain(|v| *v != ent);
                return;
            }
        }

        self.roots.retain(|v| *v != ent);
    }

    /// Flags every entity the scene graph rebuilt as changed.
    fn mark_rebuilt(&mut self) {
        for ent in self.graph.take_rebuilt() {
            self.mark_changed(ent);
        }
    }

    fn mark_changed(&mut self, ent: Entity) {
        let attached = match self.proxy_mut(ent) {
            Some(proxy) => {
                if proxy.changed {
                    return;
                }

                proxy.changed = true;
                proxy.attached
            }
            None => return,
        };

        if attached {
            self.dirty = true;
            self.events.push(HierarchyEvent::Changed { entity: ent });
        }
    }

    #[inline]
    pub(crate) fn proxy(&self, ent: Entity) -> Option<&EntityProxy> {
        self.proxies.get(ent)
    }

    #[inline]
    fn proxy_mut(&mut self, ent: Entity) -> Option<&mut EntityProxy> {
        self.proxies.get_mut(ent)
    }

    #[inline]
    fn proxy_or_err(&self, ent: Entity) -> Result<&EntityProxy> {
        self.proxies.get(ent).ok_or(Error::NotFound(ent))
    }

    fn attached_proxy(&self, ent: Entity) -> Result<&EntityProxy> {
        let proxy = self.proxy_or_err(ent)?;
        if proxy.attached {
            Ok(proxy)
        } else {
            Err(Error::Detached(ent))
        }
    }
}

impl Hierarchy {
    /// Returns a view of `ent` for hierarchy relative queries.
    #[inline]
    pub fn get(&self, ent: Entity) -> Option<EntityRef> {
        self.proxies
            .get(ent)
            .map(|proxy| EntityRef::new(self, ent, proxy))
    }

    /// Checks if `ent` was created by this hierarchy and has not been deleted.
    #[inline]
    pub fn contains(&self, ent: Entity) -> bool {
        self.proxies.contains(ent)
    }

    /// Checks if `ent` is part of the flat sequence.
    #[inline]
    pub fn is_attached(&self, ent: Entity) -> bool {
        self.proxy(ent).map(|v| v.attached).unwrap_or(false)
    }

    /// Number of entities in the flat sequence.
    #[inline]
    pub fn object_count(&self) -> usize {
        self.sequence.len()
    }

    /// The entity at `index` of the flat sequence.
    #[inline]
    pub fn object_at_index(&self, index: usize) -> Option<Entity> {
        self.sequence.get(index).cloned()
    }

    /// Position of `ent` in the flat sequence.
    #[inline]
    pub fn index(&self, ent: Entity) -> Option<usize> {
        self.get(ent).and_then(|v| v.index())
    }

    /// Returns an iterator over the flat sequence.
    #[inline]
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = Entity> + 'a {
        self.sequence.iter().cloned()
    }

    /// Entities without a parent, in display order.
    #[inline]
    pub fn roots(&self) -> &[Entity] {
        &self.roots
    }

    #[inline]
    pub fn parent(&self, ent: Entity) -> Option<Entity> {
        self.proxy(ent).and_then(|v| v.parent)
    }

    /// Children of `ent` in display order.
    #[inline]
    pub fn children(&self, ent: Entity) -> &[Entity] {
        self.proxy(ent).map(|v| &v.children[..]).unwrap_or(&[])
    }

    /// Returns true if `rhs` is one of the ancestors of `lhs`.
    pub fn is_ancestor(&self, lhs: Entity, rhs: Entity) -> bool {
        let mut cursor = self.parent(lhs);
        while let Some(v) = cursor {
            if v == rhs {
                return true;
            }

            cursor = self.parent(v);
        }

        false
    }

    #[inline]
    pub fn name(&self, ent: Entity) -> Option<&str> {
        self.proxy(ent).map(|v| v.name.as_ref())
    }

    /// Renames `ent` and flags it as changed.
    pub fn set_name<T: AsRef<str>>(&mut self, ent: Entity, name: T) -> Result<()> {
        let name = InlinableString::from(name.as_ref());
        self.proxy_mut(ent).ok_or(Error::NotFound(ent))?.name = name;
        self.mark_changed(ent);
        self.flush();
        Ok(())
    }

    /// Components other than the transform, kept as opaque JSON.
    #[inline]
    pub fn components(&self, ent: Entity) -> Option<&Map<String, Value>> {
        self.proxy(ent).map(|v| &v.components)
    }

    /// Replaces the opaque components of `ent` and flags it as changed.
    pub fn set_components(&mut self, ent: Entity, components: Map<String, Value>) -> Result<()> {
        self.proxy_mut(ent).ok_or(Error::NotFound(ent))?.components = components;
        self.mark_changed(ent);
        self.flush();
        Ok(())
    }

    /// Returns true if anything changed since the last `mark_saved`.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn is_changed(&self, ent: Entity) -> bool {
        self.proxy(ent).map(|v| v.changed).unwrap_or(false)
    }

    /// Sets the changed flag of `ent`. Only the transition from false to true
    /// is reported to listeners.
    pub fn set_changed(&mut self, ent: Entity, changed: bool) -> Result<()> {
        if changed {
            self.proxy_or_err(ent)?;
            self.mark_changed(ent);
            self.flush();
        } else {
            self.proxy_mut(ent).ok_or(Error::NotFound(ent))?.changed = false;
        }

        Ok(())
    }

    /// Clears the dirty flag and every changed flag, without notifying anyone.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
        for v in self.proxies.values_mut() {
            v.changed = false;
        }
    }

    /// Finds an entity by name. If name contains a '/' character, it traverses
    /// the hierarchy like a path name, starting from the roots.
    pub fn find<N: AsRef<str>>(&self, name: N) -> Option<Entity> {
        let mut components = name.as_ref().split('/').filter(|v| !v.is_empty());
        let first = components.next()?;

        self.roots
            .iter()
            .filter(|&&v| self.name(v) == Some(first))
            .filter_map(|&v| self.walk(v, components.clone()))
            .next()
    }

    /// Finds an entity by a '/' separated path relative to `root`.
    pub fn find_from<N: AsRef<str>>(&self, root: Entity, name: N) -> Option<Entity> {
        if !self.contains(root) {
            return None;
        }

        self.walk(root, name.as_ref().split('/').filter(|v| !v.is_empty()))
    }

    fn walk<'a, I>(&self, root: Entity, components: I) -> Option<Entity>
    where
        I: Iterator<Item = &'a str>,
    {
        let mut cursor = root;
        for component in components {
            cursor = self
                .children(cursor)
                .iter()
                .cloned()
                .find(|&v| self.name(v) == Some(component))?;
        }

        Some(cursor)
    }
}

impl Hierarchy {
    /// The scene graph holding the transform nodes of every entity.
    #[inline]
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// The cached transformation state of `ent`.
    #[inline]
    pub fn node(&self, ent: Entity) -> Option<&TransformNode> {
        self.graph.node(ent)
    }

    /// Runs a transform edit on the scene graph, then flags every rebuilt
    /// entity as changed and notifies listeners.
    fn edit<F>(&mut self, ent: Entity, func: F) -> Result<()>
    where
        F: FnOnce(&mut SceneGraph) -> Result<()>,
    {
        let attached = self.proxy_or_err(ent)?.attached;
        let result = func(&mut self.graph);

        if result.is_ok() && attached {
            self.events
                .push(HierarchyEvent::TransformChanged { entity: ent });
        }

        self.mark_rebuilt();
        self.flush();
        result
    }

    /// Gets the transform in local space.
    #[inline]
    pub fn local_transform(&self, ent: Entity) -> Option<Transform> {
        self.graph.local_transform(ent)
    }

    /// Gets the transform in world space.
    #[inline]
    pub fn transform(&self, ent: Entity) -> Option<Transform> {
        self.graph.transform(ent)
    }

    /// Overwrites the local position, rotation and scale at once.
    pub fn set_local_transform(&mut self, ent: Entity, transform: Transform) -> Result<()> {
        self.edit(ent, |graph| graph.set_local_transform(ent, transform))
    }

    #[inline]
    pub fn position(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.graph.position(ent)
    }

    pub fn set_position<T>(&mut self, ent: Entity, position: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let position = position.into();
        self.edit(ent, |graph| graph.set_position(ent, position))
    }

    #[inline]
    pub fn local_position(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.graph.local_position(ent)
    }

    pub fn set_local_position<T>(&mut self, ent: Entity, position: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let position = position.into();
        self.edit(ent, |graph| graph.set_local_position(ent, position))
    }

    pub fn translate<T>(&mut self, ent: Entity, translation: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let translation = translation.into();
        self.edit(ent, |graph| graph.translate(ent, translation))
    }

    #[inline]
    pub fn rotation(&self, ent: Entity) -> Option<Quaternion<f32>> {
        self.graph.rotation(ent)
    }

    pub fn set_rotation<T>(&mut self, ent: Entity, rotation: T) -> Result<()>
    where
        T: Into<Quaternion<f32>>,
    {
        let rotation = rotation.into();
        self.edit(ent, |graph| graph.set_rotation(ent, rotation))
    }

    #[inline]
    pub fn local_rotation(&self, ent: Entity) -> Option<Quaternion<f32>> {
        self.graph.local_rotation(ent)
    }

    pub fn set_local_rotation<T>(&mut self, ent: Entity, rotation: T) -> Result<()>
    where
        T: Into<Quaternion<f32>>,
    {
        let rotation = rotation.into();
        self.edit(ent, |graph| graph.set_local_rotation(ent, rotation))
    }

    pub fn rotate<T>(&mut self, ent: Entity, rotation: T) -> Result<()>
    where
        T: Into<Quaternion<f32>>,
    {
        let rotation = rotation.into();
        self.edit(ent, |graph| graph.rotate(ent, rotation))
    }

    #[inline]
    pub fn scale(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.graph.scale(ent)
    }

    pub fn set_scale<T>(&mut self, ent: Entity, scale: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let scale = scale.into();
        self.edit(ent, |graph| graph.set_scale(ent, scale))
    }

    #[inline]
    pub fn local_scale(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.graph.local_scale(ent)
    }

    pub fn set_local_scale<T>(&mut self, ent: Entity, scale: T) -> Result<()>
    where
        T: Into<Vector3<f32>>,
    {
        let scale = scale.into();
        self.edit(ent, |graph| graph.set_local_scale(ent, scale))
    }
}

impl Hierarchy {
    /// Checks the contiguous subtree invariant, the `previous`/`next` links,
    /// the walked positions and the agreement between the tree view and the
    /// scene graph.
    pub fn validate(&self) -> Result<()> {
        let mut subtrees = HashMap::with_capacity(self.sequence.len());
        for &ent in self.sequence.iter().rev() {
            let size = self
                .children(ent)
                .iter()
                .map(|c| subtrees.get(c).cloned().unwrap_or(0))
                .sum::<usize>();
            subtrees.insert(ent, size + 1);
        }

        let sizes: Vec<usize> = self
            .sequence
            .iter()
            .map(|v| subtrees.get(v).cloned().unwrap_or(1))
            .collect();

        let mut cursor = 0;
        for &root in &self.roots {
            if self.sequence.get(cursor) != Some(&root) {
                return Err(Error::Corrupted(format!(
                    "root {} is not at position {}.",
                    root, cursor
                )));
            }

            cursor += sizes[cursor];
        }

        if cursor != self.sequence.len() {
            return Err(Error::Corrupted(format!(
                "roots cover {} of {} entities.",
                cursor,
                self.sequence.len()
            )));
        }

        for (i, &ent) in self.sequence.iter().enumerate() {
            let proxy = self
                .proxy(ent)
                .ok_or_else(|| Error::Corrupted(format!("{} at {} is dead.", ent, i)))?;

            if !proxy.attached {
                return Err(Error::Corrupted(format!("{} at {} is detached.", ent, i)));
            }

            let prev = i.checked_sub(1).and_then(|v| self.sequence.get(v)).cloned();
            let next = self.sequence.get(i + 1).cloned();
            if proxy.prev != prev || proxy.next != next {
                return Err(Error::Corrupted(format!("{} at {} is mislinked.", ent, i)));
            }

            if self.index(ent) != Some(i) {
                return Err(Error::Corrupted(format!("{} walks to a wrong index.", ent)));
            }

            if self.get(ent).map(|v| v.num_heirs()) != Some(sizes[i] - 1) {
                return Err(Error::Corrupted(format!("{} has wrong heirs.", ent)));
            }

            if self.graph.parent(ent) != proxy.parent {
                return Err(Error::Corrupted(format!(
                    "{} has a different parent in the scene graph.",
                    ent
                )));
            }

            let mut expected = i + 1;
            for &child in &proxy.children {
                if self.sequence.get(expected) != Some(&child) || self.parent(child) != Some(ent)
                {
                    return Err(Error::Corrupted(format!(
                        "child {} of {} is not at position {}.",
                        child, ent, expected
                    )));
                }

                expected += sizes[expected];
            }

            if expected != i + sizes[i] {
                return Err(Error::Corrupted(format!("subtree of {} is torn.", ent)));
            }
        }

        Ok(())
    }
}
