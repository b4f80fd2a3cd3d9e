use inlinable_string::InlinableString;
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::spatial::prelude::TransformNode;
use crate::Entity;

use super::index::Hierarchy;

/// The per-entity record of a `Hierarchy`: display name, changed flag, tree
/// view links and the neighbours in the flat sequence.
///
/// Every link is written by the owning `Hierarchy` only. The transform node
/// of the entity lives in the hierarchy's scene graph under the same handle.
#[derive(Debug, Clone)]
pub struct EntityProxy {
    pub(crate) name: InlinableString,
    pub(crate) changed: bool,
    pub(crate) attached: bool,
    pub(crate) parent: Option<Entity>,
    pub(crate) children: SmallVec<[Entity; 4]>,
    pub(crate) prev: Option<Entity>,
    pub(crate) next: Option<Entity>,
    pub(crate) components: Map<String, Value>,
}

impl EntityProxy {
    pub(crate) fn new<T: Into<InlinableString>>(name: T) -> Self {
        EntityProxy {
            name: name.into(),
            changed: false,
            attached: false,
            parent: None,
            children: SmallVec::new(),
            prev: None,
            next: None,
            components: Map::new(),
        }
    }
}

/// A borrowed view of one entity, answering hierarchy relative queries.
///
/// Positions are found by walking the `previous` links back to the start of
/// the flat sequence, which is linear in the position. Avoid calling them in
/// loops over large hierarchies.
#[derive(Clone, Copy)]
pub struct EntityRef<'a> {
    hierarchy: &'a Hierarchy,
    entity: Entity,
    proxy: &'a EntityProxy,
}

impl<'a> EntityRef<'a> {
    pub(crate) fn new(hierarchy: &'a Hierarchy, entity: Entity, proxy: &'a EntityProxy) -> Self {
        EntityRef {
            hierarchy,
            entity,
            proxy,
        }
    }

    #[inline]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    #[inline]
    pub fn name(&self) -> &'a str {
        self.proxy.name.as_ref()
    }

    #[inline]
    pub fn is_changed(&self) -> bool {
        self.proxy.changed
    }

    /// Returns false while the entity has been spawned but not added yet.
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.proxy.attached
    }

    #[inline]
    pub fn parent(&self) -> Option<Entity> {
        self.proxy.parent
    }

    /// Children in display order.
    #[inline]
    pub fn children(&self) -> &'a [Entity] {
        &self.proxy.children[..]
    }

    #[inline]
    pub fn previous(&self) -> Option<Entity> {
        self.proxy.prev
    }

    #[inline]
    pub fn next(&self) -> Option<Entity> {
        self.proxy.next
    }

    /// Components other than the transform, kept as opaque JSON.
    #[inline]
    pub fn components(&self) -> &'a Map<String, Value> {
        &self.proxy.components
    }

    #[inline]
    pub fn transform(&self) -> Option<&'a TransformNode> {
        self.hierarchy.graph().node(self.entity)
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        !self.proxy.children.is_empty()
    }

    #[inline]
    pub fn last_child(&self) -> Option<Entity> {
        self.proxy.children.last().cloned()
    }

    /// Position in the flat sequence, or None if not attached.
    pub fn index(&self) -> Option<usize> {
        if !self.proxy.attached {
            return None;
        }

        let mut index = 0;
        let mut cursor = self.proxy.prev;
        while let Some(v) = cursor {
            index += 1;
            cursor = self.hierarchy.proxy(v).and_then(|p| p.prev);
        }

        Some(index)
    }

    /// Position among the children of the parent, or among the roots.
    pub fn sibling_index(&self) -> Option<usize> {
        if !self.proxy.attached {
            return None;
        }

        let mut index = 0;
        let mut cursor = self.proxy.prev;
        while let Some(v) = cursor {
            if Some(v) == self.proxy.parent {
                break;
            }

            let proxy = self.hierarchy.proxy(v)?;
            if proxy.parent == self.proxy.parent {
                index += 1;
            }

            cursor = proxy.prev;
        }

        Some(index)
    }

    /// The last entity of the subtree, reached by following last children down.
    /// An entity without children is its own last heir.
    pub fn last_heir(&self) -> Entity {
        let mut cursor = self.entity;
        while let Some(&last) = self
            .hierarchy
            .proxy(cursor)
            .and_then(|v| v.children.last())
        {
            cursor = last;
        }

        cursor
    }

    /// Number of direct and indirect descendants.
    pub fn num_heirs(&self) -> usize {
        if !self.has_children() {
            return 0;
        }

        let last = self.hierarchy.index(self.last_heir());
        match (last, self.index()) {
            (Some(last), Some(index)) => last - index,
            _ => 0,
        }
    }

    /// The sibling displayed right after this entity.
    pub fn next_sibling(&self) -> Option<Entity> {
        let siblings = match self.proxy.parent {
            Some(parent) => self.hierarchy.children(parent),
            None => self.hierarchy.roots(),
        };

        siblings
            .iter()
            .position(|&v| v == self.entity)
            .and_then(|i| siblings.get(i + 1))
            .cloned()
    }
}
