//! The hierarchy index: a flat, order invariant sequence of entities kept in
//! sync with the tree view used for display.
//!
//! For an entity at flat position `i` with `h` heirs, the heirs occupy the
//! positions `[i + 1, i + h]` exactly. Every `Hierarchy` mutator keeps that
//! invariant, and reports what it did to the attached listeners.

pub mod events;
pub mod index;
pub mod proxy;

pub mod prelude {
    pub use super::events::{HierarchyEvent, HierarchyListener, HierarchyListenerHandle};
    pub use super::index::Hierarchy;
    pub use super::proxy::EntityRef;
}
