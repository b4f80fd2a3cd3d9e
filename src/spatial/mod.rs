//! Transform nodes and the scene graph that propagates them.

pub mod graph;
pub mod node;
pub mod transform;

pub mod prelude {
    pub use super::graph::SceneGraph;
    pub use super::node::TransformNode;
    pub use super::transform::Transform;
}
