//! Composite manifold state of the visual-inertial filter
//!
//! [State] packs the Euclidean and non-Euclidean quantities estimated by the filter into one
//! container whose stochastic fields are addressed through a fixed [StateLayout]:
//!
//! - `WrWM`: position of the body (IMU) frame, pointing from the world origin, expressed in world coordinates
//! - `MvM`: velocity of the body frame, expressed in body coordinates
//! - accelerometer and gyroscope additive biases
//! - `qWM`: attitude, rotating body coordinates into world coordinates
//! - per camera `MrMC` (body to camera offset, body coordinates) and `qCM` (body to camera rotation)
//! - per landmark slot a depth parameter (see [crate::depth]) and a unit bearing in camera coordinates
//!
//! Everything else the filter needs to carry between steps lives in [StateAuxiliary]. The auxiliary
//! block has no covariance entries and must never be treated as estimated.
//!
//! Rotations follow the nalgebra convention, i.e. `qWM * v_M` expresses the body vector `v_M` in
//! world coordinates and `qCW = qCM * qWM⁻¹` maps world coordinates to camera coordinates.

use std::fmt::{self, Display};

use nalgebra::{DVector, Matrix2, Matrix3, UnitQuaternion, Vector2, Vector3};

use crate::depth::{DepthMap, DepthType};
use crate::layout::{Field, StateLayout};
use crate::manifold::{ManifoldElement, NormalVector};

/// Depth parameter written into a landmark slot that is not in use.
pub const SENTINEL_DEPTH_PARAMETER: f64 = 1.0;

/// Offsets of the two bearing-space corners of a landmark's patch.
pub type BearingCorners = [Vector2<f64>; 2];

/// Storage location the camera extrinsics are read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtrinsicsSource {
    /// Extrinsics are estimated online and read from the stochastic state.
    Estimated,
    /// Extrinsics are fixed and read from the auxiliary fallback copies.
    Fallback,
}

/// Non-stochastic data carried along with the filter state.
#[derive(Clone, Debug)]
pub struct StateAuxiliary {
    /// Estimated angular rate of the body w.r.t. world, in body coordinates
    pub angular_rate_estimate: Vector3<f64>,
    /// Last measured angular rate of the body
    pub angular_rate_measurement: Vector3<f64>,
    /// Covariance of the angular rate measurement
    pub angular_rate_covariance: Matrix3<f64>,
    /// Reduced intensity Jacobian of each landmark patch, used for multilevel patch alignment
    pub reduced_jacobians: Vec<Matrix2<f64>>,
    /// Reduced intensity residual of each landmark patch
    pub reduced_residuals: Vec<Vector2<f64>>,
    /// Raw bearing measurement of each landmark
    pub bearing_measurements: Vec<NormalVector>,
    /// Patch corner offsets of each landmark
    pub bearing_corners: Vec<BearingCorners>,
    /// Camera that owns each landmark
    pub camera_ids: Vec<usize>,
    /// Fixed body to camera rotation, used when extrinsics are not estimated
    pub fallback_camera_rotations: Vec<UnitQuaternion<f64>>,
    /// Fixed body to camera offset, used when extrinsics are not estimated
    pub fallback_camera_offsets: Vec<Vector3<f64>>,
    /// Estimate the camera-IMU extrinsics online
    pub do_ve_calibration: bool,
    /// Active depth parameterization
    pub depth_map: DepthMap,
    pub active_feature: usize,
    pub active_camera_counter: usize,
}
impl StateAuxiliary {
    pub fn new(n_max: usize, n_cam: usize) -> StateAuxiliary {
        StateAuxiliary {
            angular_rate_estimate: Vector3::zeros(),
            angular_rate_measurement: Vector3::zeros(),
            angular_rate_covariance: Matrix3::identity(),
            reduced_jacobians: vec![Matrix2::identity(); n_max],
            reduced_residuals: vec![Vector2::zeros(); n_max],
            bearing_measurements: vec![NormalVector::identity(); n_max],
            bearing_corners: vec![[Vector2::zeros(), Vector2::zeros()]; n_max],
            camera_ids: vec![0; n_max],
            fallback_camera_rotations: vec![UnitQuaternion::identity(); n_cam],
            fallback_camera_offsets: vec![Vector3::zeros(); n_cam],
            do_ve_calibration: true,
            depth_map: DepthMap::new(DepthType::Inverse),
            active_feature: 0,
            active_camera_counter: 0,
        }
    }
    /// Where camera extrinsics are currently read from. Evaluated on every call.
    pub fn extrinsics_source(&self) -> ExtrinsicsSource {
        if self.do_ve_calibration {
            ExtrinsicsSource::Estimated
        } else {
            ExtrinsicsSource::Fallback
        }
    }
}

/// The manifold-valued filter state.
#[derive(Clone, Debug)]
pub struct State {
    layout: StateLayout,
    /// WrWM, body position in world coordinates
    pub position: Vector3<f64>,
    /// MvM, body velocity in body coordinates
    pub velocity: Vector3<f64>,
    pub accelerometer_bias: Vector3<f64>,
    pub gyroscope_bias: Vector3<f64>,
    /// qWM, body to world rotation
    pub attitude: UnitQuaternion<f64>,
    extrinsic_translations: Vec<Vector3<f64>>,
    extrinsic_rotations: Vec<UnitQuaternion<f64>>,
    depth_parameters: Vec<f64>,
    bearings: Vec<NormalVector>,
    pub aux: StateAuxiliary,
}
impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (roll, pitch, yaw) = self.attitude.euler_angles();
        write!(
            f,
            "State {{ WrWM: [{:.3}, {:.3}, {:.3}] m, MvM: [{:.3}, {:.3}, {:.3}] m/s, qWM: [{:.2}, {:.2}, {:.2}] deg, slots: {}, cameras: {} }}",
            self.position[0],
            self.position[1],
            self.position[2],
            self.velocity[0],
            self.velocity[1],
            self.velocity[2],
            roll.to_degrees(),
            pitch.to_degrees(),
            yaw.to_degrees(),
            self.layout.n_max(),
            self.layout.n_cam()
        )
    }
}
impl State {
    /// Create a state with zero position, velocity and biases, identity rotations and every
    /// landmark slot holding the free-slot sentinel.
    pub fn new(n_max: usize, n_cam: usize) -> State {
        State {
            layout: StateLayout::new(n_max, n_cam),
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            accelerometer_bias: Vector3::zeros(),
            gyroscope_bias: Vector3::zeros(),
            attitude: UnitQuaternion::identity(),
            extrinsic_translations: vec![Vector3::zeros(); n_cam],
            extrinsic_rotations: vec![UnitQuaternion::identity(); n_cam],
            depth_parameters: vec![SENTINEL_DEPTH_PARAMETER; n_max],
            bearings: vec![NormalVector::identity(); n_max],
            aux: StateAuxiliary::new(n_max, n_cam),
        }
    }
    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }
    /// Total tangent dimension of the stochastic part.
    pub fn dimension(&self) -> usize {
        self.layout.dimension()
    }

    fn check_slot(&self, i: usize) {
        assert!(
            i < self.layout.n_max(),
            "feature index {} out of range (capacity {})",
            i,
            self.layout.n_max()
        );
    }
    fn check_camera(&self, cam_id: usize) {
        assert!(
            cam_id < self.layout.n_cam(),
            "camera index {} out of range ({} cameras)",
            cam_id,
            self.layout.n_cam()
        );
    }

    /// WrWM: vector from the world origin to the body frame, in world coordinates.
    pub fn get_position(&self) -> Vector3<f64> {
        self.position
    }
    /// MvM: absolute velocity of the body frame, in body coordinates.
    pub fn get_velocity(&self) -> Vector3<f64> {
        self.velocity
    }
    pub fn get_accelerometer_bias(&self) -> Vector3<f64> {
        self.accelerometer_bias
    }
    pub fn get_gyroscope_bias(&self) -> Vector3<f64> {
        self.gyroscope_bias
    }
    /// qWM: rotation from body to world coordinates.
    pub fn get_attitude(&self) -> UnitQuaternion<f64> {
        self.attitude
    }
    /// CfP: unit bearing of landmark `i` in camera coordinates.
    pub fn get_bearing(&self, i: usize) -> Vector3<f64> {
        self.check_slot(i);
        self.bearings[i].get_vec()
    }
    /// qCM: rotation from body to camera coordinates.
    ///
    /// Read from the stochastic state when extrinsics calibration is enabled, otherwise from
    /// the fixed copy in the auxiliary block.
    pub fn get_camera_rotation(&self, cam_id: usize) -> UnitQuaternion<f64> {
        self.check_camera(cam_id);
        match self.aux.extrinsics_source() {
            ExtrinsicsSource::Estimated => self.extrinsic_rotations[cam_id],
            ExtrinsicsSource::Fallback => self.aux.fallback_camera_rotations[cam_id],
        }
    }
    /// MrMC: vector from the body to the camera frame, in body coordinates. Same source
    /// selection as [State::get_camera_rotation].
    pub fn get_camera_offset(&self, cam_id: usize) -> Vector3<f64> {
        self.check_camera(cam_id);
        match self.aux.extrinsics_source() {
            ExtrinsicsSource::Estimated => self.extrinsic_translations[cam_id],
            ExtrinsicsSource::Fallback => self.aux.fallback_camera_offsets[cam_id],
        }
    }
    /// WrWC: camera position in world coordinates, `WrWM + qWM · MrMC`.
    pub fn get_camera_position(&self, cam_id: usize) -> Vector3<f64> {
        self.position + self.attitude * self.get_camera_offset(cam_id)
    }
    /// qCW: rotation from world to camera coordinates, `qCM ⊗ qWM⁻¹`.
    pub fn get_world_to_camera(&self, cam_id: usize) -> UnitQuaternion<f64> {
        self.get_camera_rotation(cam_id) * self.attitude.inverse()
    }
    /// Metric depth of landmark `i` under the active depth parameterization.
    pub fn get_depth(&self, i: usize) -> f64 {
        self.check_slot(i);
        self.aux.depth_map.map(self.depth_parameters[i]).depth
    }

    /// Stored depth parameter of landmark `i`.
    pub fn depth_parameter(&self, i: usize) -> f64 {
        self.check_slot(i);
        self.depth_parameters[i]
    }
    pub fn set_depth_parameter(&mut self, i: usize, p: f64) {
        self.check_slot(i);
        self.depth_parameters[i] = p;
    }
    pub fn bearing(&self, i: usize) -> &NormalVector {
        self.check_slot(i);
        &self.bearings[i]
    }
    pub fn set_bearing(&mut self, i: usize, bearing: NormalVector) {
        self.check_slot(i);
        self.bearings[i] = bearing;
    }
    /// Estimated (stochastic) body to camera offset, regardless of the calibration flag.
    pub fn extrinsic_translation(&self, cam_id: usize) -> Vector3<f64> {
        self.check_camera(cam_id);
        self.extrinsic_translations[cam_id]
    }
    pub fn set_extrinsic_translation(&mut self, cam_id: usize, translation: Vector3<f64>) {
        self.check_camera(cam_id);
        self.extrinsic_translations[cam_id] = translation;
    }
    /// Estimated (stochastic) body to camera rotation, regardless of the calibration flag.
    pub fn extrinsic_rotation(&self, cam_id: usize) -> UnitQuaternion<f64> {
        self.check_camera(cam_id);
        self.extrinsic_rotations[cam_id]
    }
    pub fn set_extrinsic_rotation(&mut self, cam_id: usize, rotation: UnitQuaternion<f64>) {
        self.check_camera(cam_id);
        self.extrinsic_rotations[cam_id] = rotation;
    }

    /// Retract a tangent increment of dimension D onto the state. The auxiliary block is
    /// carried over unchanged.
    pub fn boxplus(&self, delta: &DVector<f64>) -> State {
        assert_eq!(
            delta.len(),
            self.dimension(),
            "state increment must match the tangent dimension"
        );
        let delta = delta.as_slice();
        let mut out = self.clone();
        for field in self.layout.fields() {
            let dx = &delta[self.layout.range(field)];
            match field {
                Field::Position => out.position = self.position.boxplus(dx),
                Field::Velocity => out.velocity = self.velocity.boxplus(dx),
                Field::AccelerometerBias => {
                    out.accelerometer_bias = self.accelerometer_bias.boxplus(dx)
                }
                Field::GyroscopeBias => out.gyroscope_bias = self.gyroscope_bias.boxplus(dx),
                Field::Attitude => out.attitude = self.attitude.boxplus(dx),
                Field::ExtrinsicTranslation(c) => {
                    out.extrinsic_translations[c] = self.extrinsic_translations[c].boxplus(dx)
                }
                Field::ExtrinsicRotation(c) => {
                    out.extrinsic_rotations[c] = self.extrinsic_rotations[c].boxplus(dx)
                }
                Field::Depth(i) => out.depth_parameters[i] = self.depth_parameters[i].boxplus(dx),
                Field::Bearing(i) => out.bearings[i] = self.bearings[i].boxplus(dx),
            }
        }
        out
    }
    /// Tangent vector at `reference` that retracts onto `self`.
    pub fn boxminus(&self, reference: &State) -> DVector<f64> {
        assert_eq!(
            self.layout, reference.layout,
            "states must share the same layout"
        );
        let mut out = DVector::zeros(self.dimension());
        let out_slice = out.as_mut_slice();
        for field in self.layout.fields() {
            let dx = &mut out_slice[self.layout.range(field)];
            match field {
                Field::Position => self.position.boxminus(&reference.position, dx),
                Field::Velocity => self.velocity.boxminus(&reference.velocity, dx),
                Field::AccelerometerBias => self
                    .accelerometer_bias
                    .boxminus(&reference.accelerometer_bias, dx),
                Field::GyroscopeBias => self
                    .gyroscope_bias
                    .boxminus(&reference.gyroscope_bias, dx),
                Field::Attitude => self.attitude.boxminus(&reference.attitude, dx),
                Field::ExtrinsicTranslation(c) => self.extrinsic_translations[c]
                    .boxminus(&reference.extrinsic_translations[c], dx),
                Field::ExtrinsicRotation(c) => self.extrinsic_rotations[c]
                    .boxminus(&reference.extrinsic_rotations[c], dx),
                Field::Depth(i) => self.depth_parameters[i]
                    .boxminus(&reference.depth_parameters[i], dx),
                Field::Bearing(i) => self.bearings[i].boxminus(&reference.bearings[i], dx),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn assert_vec_eq(a: &Vector3<f64>, b: &Vector3<f64>) {
        for k in 0..3 {
            assert_approx_eq!(a[k], b[k], 1e-9);
        }
    }

    #[test]
    fn new_state_defaults() {
        let state = State::new(4, 2);
        assert_eq!(state.dimension(), 15 + 12 + 12);
        assert_eq!(state.get_position(), Vector3::zeros());
        assert_eq!(state.get_attitude(), UnitQuaternion::identity());
        assert!(state.aux.do_ve_calibration);
        assert_eq!(state.aux.depth_map.get_type(), DepthType::Inverse);
        for i in 0..4 {
            assert_eq!(state.depth_parameter(i), SENTINEL_DEPTH_PARAMETER);
            assert_vec_eq(&state.get_bearing(i), &Vector3::z());
        }
    }

    #[test]
    fn extrinsics_follow_calibration_flag() {
        let mut state = State::new(2, 2);
        let estimated_rotation = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        let fallback_rotation = UnitQuaternion::from_euler_angles(-0.4, 0.0, 1.0);
        state.set_extrinsic_rotation(1, estimated_rotation);
        state.set_extrinsic_translation(1, Vector3::new(1.0, 2.0, 3.0));
        state.aux.fallback_camera_rotations[1] = fallback_rotation;
        state.aux.fallback_camera_offsets[1] = Vector3::new(-1.0, -2.0, -3.0);

        assert_eq!(state.get_camera_rotation(1), estimated_rotation);
        assert_eq!(state.get_camera_offset(1), Vector3::new(1.0, 2.0, 3.0));

        state.aux.do_ve_calibration = false;
        assert_eq!(state.get_camera_rotation(1), fallback_rotation);
        assert_eq!(state.get_camera_offset(1), Vector3::new(-1.0, -2.0, -3.0));

        state.aux.do_ve_calibration = true;
        assert_eq!(state.get_camera_rotation(1), estimated_rotation);
    }

    #[test]
    fn camera_position_composes_pose_and_offset() {
        let mut state = State::new(1, 1);
        state.position = Vector3::new(1.0, 0.0, 0.0);
        state.set_extrinsic_translation(0, Vector3::new(0.0, 0.0, 1.0));
        assert_vec_eq(&state.get_camera_position(0), &Vector3::new(1.0, 0.0, 1.0));

        state.attitude = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::FRAC_PI_2);
        assert_vec_eq(&state.get_camera_position(0), &Vector3::new(1.0, -1.0, 0.0));
    }

    #[test]
    fn world_to_camera_matches_camera_position() {
        let mut state = State::new(1, 1);
        state.position = Vector3::new(0.5, -1.0, 2.0);
        state.attitude = UnitQuaternion::from_euler_angles(0.3, -0.2, 0.9);
        state.set_extrinsic_translation(0, Vector3::new(0.1, 0.05, -0.02));
        state.set_extrinsic_rotation(0, UnitQuaternion::from_euler_angles(-1.5, 0.0, 0.1));

        // A point one metre in front of the camera lands on the camera z axis.
        let q_cw = state.get_world_to_camera(0);
        let camera_z_in_world = q_cw.inverse() * Vector3::z();
        let point = state.get_camera_position(0) + camera_z_in_world;
        let in_camera = q_cw * (point - state.get_camera_position(0));
        assert_vec_eq(&in_camera, &Vector3::z());

        let body_point = state.attitude.inverse() * (point - state.position);
        let via_body = state.get_camera_rotation(0) * (body_point - state.get_camera_offset(0));
        assert_vec_eq(&via_body, &in_camera);
    }

    #[test]
    fn depth_uses_active_parameterization() {
        let mut state = State::new(2, 1);
        state.set_depth_parameter(1, 0.25);
        assert_approx_eq!(state.get_depth(1), 4.0);
        state.aux.depth_map.set_type(DepthType::Regular);
        assert_approx_eq!(state.get_depth(1), 0.25);
        state.aux.depth_map.set_type(DepthType::Log);
        assert_approx_eq!(state.get_depth(1), 0.25_f64.exp());
    }

    #[test]
    fn boxplus_then_boxminus_recovers_increment() {
        let mut state = State::new(3, 2);
        state.attitude = UnitQuaternion::from_euler_angles(0.2, 0.1, -0.3);
        state.set_bearing(2, NormalVector::from_vector(&Vector3::new(0.3, -0.1, 1.0)));
        let delta = DVector::from_fn(state.dimension(), |i, _| 0.001 * (i as f64 + 1.0));
        let moved = state.boxplus(&delta);
        let back = moved.boxminus(&state);
        for k in 0..delta.len() {
            assert_approx_eq!(back[k], delta[k], 1e-9);
        }
        assert_approx_eq!(moved.position[0], 0.001);
        assert_approx_eq!(moved.depth_parameter(0), SENTINEL_DEPTH_PARAMETER + 0.001 * 28.0);
    }

    #[test]
    fn boxplus_leaves_auxiliary_untouched() {
        let mut state = State::new(1, 1);
        state.aux.active_feature = 7;
        state.aux.do_ve_calibration = false;
        let moved = state.boxplus(&DVector::from_element(state.dimension(), 0.01));
        assert_eq!(moved.aux.active_feature, 7);
        assert!(!moved.aux.do_ve_calibration);
    }

    #[test]
    #[should_panic]
    fn bearing_past_capacity_panics() {
        State::new(2, 1).get_bearing(2);
    }

    #[test]
    #[should_panic]
    fn camera_past_capacity_panics() {
        State::new(2, 1).get_camera_rotation(1);
    }
}
