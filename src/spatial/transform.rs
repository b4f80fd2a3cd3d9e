use crate::math::prelude::*;

const DECOMPOSE_EPSILON: f32 = 1e-12;

/// `Transform` stores the position, rotation and scale of an object. We use a
/// left handed, y-up coordinate system. Scale is per axis.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    pub fn new<T1, T2, T3>(position: T1, rotation: T2, scale: T3) -> Self
    where
        T1: Into<Vector3<f32>>,
        T2: Into<Quaternion<f32>>,
        T3: Into<Vector3<f32>>,
    {
        Transform {
            position: position.into(),
            rotation: rotation.into(),
            scale: scale.into(),
        }
    }

    /// Returns the matrix representation. Scale is applied first, then
    /// rotation, then translation: M = T * R * S.
    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Decomposes an affine matrix into translation, rotation and scale.
    ///
    /// Shear can not be represented and is dropped. A negative determinant is
    /// folded into the x axis scale.
    pub fn from_matrix(m: &Matrix4<f32>) -> Self {
        let position = m.w.truncate();
        let axes = [m.x.truncate(), m.y.truncate(), m.z.truncate()];
        let mut scale = Vector3::new(
            axes[0].magnitude(),
            axes[1].magnitude(),
            axes[2].magnitude(),
        );

        if Matrix3::from_cols(axes[0], axes[1], axes[2]).determinant() < 0.0 {
            scale.x = -scale.x;
        }

        let mut basis = [Vector3::unit_x(), Vector3::unit_y(), Vector3::unit_z()];
        for i in 0..3 {
            if scale[i].abs() > DECOMPOSE_EPSILON {
                basis[i] = axes[i] / scale[i];
            }
        }

        let rotation =
            Quaternion::from(Matrix3::from_cols(basis[0], basis[1], basis[2])).normalize();

        Transform {
            position,
            rotation,
            scale,
        }
    }

    /// Returns true if any scale component is smaller than `min` in magnitude.
    #[inline]
    pub fn is_degenerate(&self, min: f32) -> bool {
        self.scale.x.abs() < min || self.scale.y.abs() < min || self.scale.z.abs() < min
    }

    /// Returns the rotation as euler angles, applied in x, y, z order.
    #[inline]
    pub fn euler_angles(&self) -> Euler<Deg<f32>> {
        let euler: Euler<Rad<f32>> = Euler::from(self.rotation);
        Euler::new(Deg::from(euler.x), Deg::from(euler.y), Deg::from(euler.z))
    }

    /// Sets the rotation from euler angles, applied in x, y, z order.
    #[inline]
    pub fn set_euler_angles(&mut self, euler: Euler<Deg<f32>>) {
        self.rotation = Quaternion::from(euler);
    }

    /// Transforms direction from local space to transform's space.
    ///
    /// This operation is not affected by scale or position of the transform. The returned
    /// vector has the same length as direction.
    #[inline]
    pub fn transform_direction<T>(&self, v: T) -> Vector3<f32>
    where
        T: Into<Vector3<f32>>,
    {
        self.rotation * v.into()
    }

    /// Transforms vector from local space to transform's space. It is affected by
    /// scale but not by position.
    #[inline]
    pub fn transform_vector<T>(&self, v: T) -> Vector3<f32>
    where
        T: Into<Vector3<f32>>,
    {
        self.rotation * v.into().mul_element_wise(self.scale)
    }

    /// Transforms points from local space to transform's space.
    #[inline]
    pub fn transform_point<T>(&self, v: T) -> Vector3<f32>
    where
        T: Into<Vector3<f32>>,
    {
        self.transform_vector(v) + self.position
    }
}

/// Applies `m` to the point `v`.
#[inline]
pub(crate) fn transform_point(m: &Matrix4<f32>, v: Vector3<f32>) -> Vector3<f32> {
    (*m * v.extend(1.0)).truncate()
}
