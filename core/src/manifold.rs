//! Manifold elements of the composite filter state
//!
//! Every stochastic field of the state is either Euclidean or lives on a manifold with a
//! smaller tangent dimension than its stored representation. The covariance is always
//! expressed in the tangent space, so each element type provides a retraction (`boxplus`)
//! and its local inverse (`boxminus`) with the usual properties:
//!
//! - `x.boxplus(0) == x`
//! - `x.boxplus(y.boxminus(x)) ≈ y`
//! - `x.boxplus(d).boxminus(x) ≈ d` for small `d`
//!
//! Attitudes are stored as unit quaternions (3 tangent DOF) and landmark bearings as
//! [NormalVector] (2 tangent DOF).

use std::f64::consts::PI;

use nalgebra::{Matrix3x2, UnitQuaternion, Vector2, Vector3};

/// Retraction and local coordinates of a state element.
pub trait ManifoldElement: Clone {
    /// Dimension of the tangent space, i.e. the number of covariance rows the element owns.
    const TANGENT_DIM: usize;
    /// Apply a tangent increment of length [ManifoldElement::TANGENT_DIM].
    fn boxplus(&self, delta: &[f64]) -> Self;
    /// Tangent vector at `reference` that moves `reference` onto `self`.
    fn boxminus(&self, reference: &Self, out: &mut [f64]);
}

impl ManifoldElement for f64 {
    const TANGENT_DIM: usize = 1;
    fn boxplus(&self, delta: &[f64]) -> Self {
        assert_eq!(delta.len(), 1, "scalar increment must have length 1");
        self + delta[0]
    }
    fn boxminus(&self, reference: &Self, out: &mut [f64]) {
        out[0] = self - reference;
    }
}

impl ManifoldElement for Vector3<f64> {
    const TANGENT_DIM: usize = 3;
    fn boxplus(&self, delta: &[f64]) -> Self {
        self + Vector3::from_column_slice(delta)
    }
    fn boxminus(&self, reference: &Self, out: &mut [f64]) {
        out.copy_from_slice((self - reference).as_slice());
    }
}

impl ManifoldElement for UnitQuaternion<f64> {
    const TANGENT_DIM: usize = 3;
    fn boxplus(&self, delta: &[f64]) -> Self {
        UnitQuaternion::from_scaled_axis(Vector3::from_column_slice(delta)) * self
    }
    fn boxminus(&self, reference: &Self, out: &mut [f64]) {
        let rotation_vector = (self * reference.inverse()).scaled_axis();
        out.copy_from_slice(rotation_vector.as_slice());
    }
}

/// Shortest rotation taking the direction of `from` onto the direction of `to`.
///
/// Antiparallel inputs have no unique shortest rotation; a half turn about an axis
/// perpendicular to `from` is returned instead.
pub fn rotation_onto(from: &Vector3<f64>, to: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::rotation_between(from, to).unwrap_or_else(|| {
        let mut axis = from.cross(&Vector3::x());
        if axis.norm() < 1e-9 {
            axis = from.cross(&Vector3::y());
        }
        UnitQuaternion::from_scaled_axis(axis.normalize() * PI)
    })
}

/// Unit vector with a 2-DOF minimal parameterization, used for landmark bearings.
///
/// The direction is stored as the rotation `q` that takes the camera z axis onto it, so the
/// vector is `q · e_z` and the tangent space is spanned by `q · e_x` and `q · e_y`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalVector {
    q: UnitQuaternion<f64>,
}
impl Default for NormalVector {
    fn default() -> Self {
        NormalVector::identity()
    }
}
impl NormalVector {
    /// The default direction, `e_z`.
    pub fn identity() -> NormalVector {
        NormalVector {
            q: UnitQuaternion::identity(),
        }
    }
    /// Create a bearing from any non-zero vector; the magnitude is discarded.
    /// A zero vector yields [NormalVector::identity].
    pub fn from_vector(vector: &Vector3<f64>) -> NormalVector {
        if vector.norm() <= f64::EPSILON {
            return NormalVector::identity();
        }
        NormalVector {
            q: rotation_onto(&Vector3::z(), vector),
        }
    }
    pub fn set_from_vector(&mut self, vector: &Vector3<f64>) {
        *self = NormalVector::from_vector(vector);
    }
    pub fn set_identity(&mut self) {
        self.q = UnitQuaternion::identity();
    }
    /// Expand to the 3-D unit vector.
    pub fn get_vec(&self) -> Vector3<f64> {
        self.q * Vector3::z()
    }
    /// Orthonormal basis of the tangent plane, one basis vector per column.
    pub fn tangent_basis(&self) -> Matrix3x2<f64> {
        Matrix3x2::from_columns(&[self.q * Vector3::x(), self.q * Vector3::y()])
    }
    pub fn rotation(&self) -> &UnitQuaternion<f64> {
        &self.q
    }
}

impl ManifoldElement for NormalVector {
    const TANGENT_DIM: usize = 2;
    fn boxplus(&self, delta: &[f64]) -> Self {
        let rotation_vector = self.tangent_basis() * Vector2::from_column_slice(delta);
        NormalVector {
            q: UnitQuaternion::from_scaled_axis(rotation_vector) * self.q,
        }
    }
    fn boxminus(&self, reference: &Self, out: &mut [f64]) {
        let m0 = reference.get_vec();
        let m1 = self.get_vec();
        let cross = m0.cross(&m1);
        let sin_angle = cross.norm();
        let cos_angle = m0.dot(&m1);
        let basis = reference.tangent_basis();
        let rotation_vector = if sin_angle > 1e-12 {
            cross * (sin_angle.atan2(cos_angle) / sin_angle)
        } else if cos_angle > 0.0 {
            Vector3::zeros()
        } else {
            basis.column(0) * PI
        };
        out.copy_from_slice((basis.transpose() * rotation_vector).as_slice());
    }
}
