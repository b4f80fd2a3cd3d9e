//! # Outliner
//!
//! The scene hierarchy index an editor uses to mirror and manipulate the entity
//! tree of a running engine. It keeps a flat sequence of entities, where every
//! subtree occupies a contiguous range, in sync with a tree view, and
//! propagates affine transforms through parent and child relationships.
//!
//! ```rust
//! use outliner::prelude::*;
//!
//! let mut hierarchy = Hierarchy::default();
//! let a = hierarchy.create("A", None).unwrap();
//! let b = hierarchy.create("B", a).unwrap();
//!
//! hierarchy.set_local_position(a, [1.0, 0.0, 0.0]).unwrap();
//! assert_eq!(hierarchy.index(b), Some(1));
//! assert_eq!(hierarchy.position(b), Some(Vector3::new(1.0, 0.0, 0.0)));
//! ```

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

extern crate cgmath;
extern crate inlinable_string;
extern crate serde_json;
extern crate smallvec;

#[macro_use]
pub mod utils;
pub mod errors;
pub mod hierarchy;
pub mod math;
pub mod serialization;
pub mod settings;
pub mod spatial;

impl_handle!(Entity);

pub mod prelude {
    pub use super::errors::{Error, Result};
    pub use super::hierarchy::prelude::*;
    pub use super::math::prelude::*;
    pub use super::settings::{HierarchyParams, Settings};
    pub use super::spatial::prelude::*;
    pub use super::Entity;
}
