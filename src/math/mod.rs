//! This module re-exports the `cgmath` types used by the scene graph.

pub use cgmath::{Deg, Euler, Matrix3, Matrix4, Quaternion, Rad, Vector3, Vector4};

pub mod prelude {
    pub use super::{Deg, Euler, Matrix3, Matrix4, Quaternion, Rad, Vector3, Vector4};
    pub use cgmath::{ElementWise, InnerSpace, Matrix, One, Rotation, SquareMatrix, Zero};
}
