use crate::Entity;

use super::index::Hierarchy;

impl_handle!(HierarchyListenerHandle);

/// Everything observers of a `Hierarchy` get told about.
///
/// Structural events carry flat sequence positions. Positions named `old_*`
/// were taken before the mutation, all others after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyEvent {
    /// An entity joined the flat sequence, through `create` or `add`.
    Created {
        entity: Entity,
        index: usize,
        sibling_index: usize,
        parent_index: Option<usize>,
    },
    /// An entity and its `count - 1` heirs left the flat sequence, which
    /// occupied `[index, index + count)`.
    Destroyed {
        entity: Entity,
        index: usize,
        count: usize,
    },
    /// An entity and its heirs moved under a new parent.
    Reparented {
        entity: Entity,
        old_index: usize,
        new_parent_old_index: Option<usize>,
        new_sibling_index: usize,
    },
    /// The local transform of an entity was set. Its heirs were rebuilt too,
    /// but they are not reported.
    TransformChanged { entity: Entity },
    /// The changed flag of an entity went from false to true.
    Changed { entity: Entity },
    /// Every entity was removed at once.
    Cleared,
}

/// Observers of a `Hierarchy`.
///
/// Events are delivered synchronously and in order once the mutation that
/// raised them has completed, before the mutator returns.
pub trait HierarchyListener {
    fn on_event(&mut self, hierarchy: &Hierarchy, event: &HierarchyEvent);
}

impl<F> HierarchyListener for F
where
    F: FnMut(&Hierarchy, &HierarchyEvent),
{
    fn on_event(&mut self, hierarchy: &Hierarchy, event: &HierarchyEvent) {
        self(hierarchy, event)
    }
}
