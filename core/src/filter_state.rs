//! Filter state: the manifold state together with its covariance
//!
//! [FilterState] is the unit the filter loop mutates. Besides the state estimate it owns the
//! `D×D` tangent-space covariance and a few bookkeeping values of the image pipeline. Landmark
//! slots are a fixed-capacity arena: [FilterState::initialize_feature_state] admits a landmark
//! into slot `i` and [FilterState::remove_feature] evicts it again. Both rewrite the state
//! entries and the covariance of the slot within a single `&mut self` call, so no reader can
//! observe the state and covariance out of step (see [crate::shared] for cross-thread access).
//!
//! A free slot is recognizable from its covariance alone: the (depth, bearing) diagonal block
//! is the 3×3 identity and all of its cross terms are zero.

use log::{debug, info};
use nalgebra::{DMatrix, Matrix3, UnitQuaternion, Vector3};

use crate::config::FilterConfig;
use crate::error::ConfigError;
use crate::layout::{Field, FieldGroupId};
use crate::linalg::{extract_block, symmetrize, write_block, zero_cross_covariance};
use crate::manifold::{NormalVector, rotation_onto};
use crate::state::{SENTINEL_DEPTH_PARAMETER, State};

/// Specific force magnitudes at or below this are treated as free fall.
pub const MIN_SPECIFIC_FORCE: f64 = 1e-6;

#[derive(Clone, Debug)]
pub struct FilterState {
    pub state: State,
    cov: DMatrix<f64>,
    /// Timestamp of the last processed image [s]
    pub image_time: f64,
    /// Number of processed images
    pub image_counter: usize,
    /// Merge consecutive prediction steps between two images
    pub use_prediction_merge: bool,
}
impl FilterState {
    /// Default state for `n_max` landmark slots and `n_cam` cameras with identity covariance.
    pub fn new(n_max: usize, n_cam: usize) -> FilterState {
        let state = State::new(n_max, n_cam);
        let dimension = state.dimension();
        FilterState {
            state,
            cov: DMatrix::identity(dimension, dimension),
            image_time: 0.0,
            image_counter: 0,
            use_prediction_merge: true,
        }
    }
    /// Build a filter state from a validated configuration.
    ///
    /// The configured extrinsics seed both the estimated and the fallback copies. Initial
    /// variances are applied to every block except the landmark slots, which start free.
    pub fn from_config(config: &FilterConfig) -> Result<FilterState, ConfigError> {
        config.validate()?;
        let mut filter_state = FilterState::new(config.max_features, config.num_cameras);
        let state = &mut filter_state.state;
        state.aux.depth_map.set_type_from_int(config.depth_type);
        state.aux.do_ve_calibration = config.do_ve_calibration;
        for cam_id in 0..config.num_cameras {
            let extrinsics = config.camera_extrinsics(cam_id);
            let translation = extrinsics.get_translation();
            let rotation = extrinsics.get_rotation();
            state.set_extrinsic_translation(cam_id, translation);
            state.set_extrinsic_rotation(cam_id, rotation);
            state.aux.fallback_camera_offsets[cam_id] = translation;
            state.aux.fallback_camera_rotations[cam_id] = rotation;
        }
        for group in state.layout().groups() {
            if matches!(group.id, FieldGroupId::Depth | FieldGroupId::Bearing) {
                continue;
            }
            let variance = config.initial_covariance.get(group.id);
            for k in group.offset..group.offset + group.dimension() {
                filter_state.cov[(k, k)] = variance;
            }
        }
        info!(
            "Filter state configured: {} slots, {} cameras, {} depth, extrinsics calibration {}",
            config.max_features,
            config.num_cameras,
            filter_state.state.aux.depth_map.get_type(),
            if config.do_ve_calibration { "on" } else { "off" }
        );
        Ok(filter_state)
    }

    pub fn get_covariance(&self) -> &DMatrix<f64> {
        &self.cov
    }
    /// Mutable access for the predict/update engine. Callers keep the matrix `D×D`.
    pub fn covariance_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.cov
    }
    /// Copy of the covariance block between fields `a` (rows) and `b` (columns).
    pub fn covariance_block(&self, a: Field, b: Field) -> DMatrix<f64> {
        let layout = self.state.layout();
        let rows = layout.range(a);
        let cols = layout.range(b);
        self.cov
            .view((rows.start, cols.start), (rows.len(), cols.len()))
            .clone_owned()
    }
    /// Covariance indices of landmark slot `i`, ordered (depth, bearing x, bearing y).
    pub fn feature_indices(&self, i: usize) -> [usize; 3] {
        let (depth, bearing) = self.state.layout().feature_indices(i);
        [depth, bearing, bearing + 1]
    }
    /// The (depth, bearing) diagonal covariance block of landmark slot `i`.
    pub fn feature_covariance(&self, i: usize) -> Matrix3<f64> {
        let indices = self.feature_indices(i);
        let block = extract_block(&self.cov, &indices, &indices);
        Matrix3::from_fn(|r, c| block[(r, c)])
    }
    /// Replace the covariance by its symmetric part.
    pub fn symmetrize_covariance(&mut self) {
        self.cov = symmetrize(&self.cov);
    }

    /// Initialize the body pose from an external pose estimate.
    ///
    /// # Arguments
    /// * `position` - WrWM, body position in world coordinates
    /// * `world_to_body` - qMW, rotation from world to body coordinates
    pub fn init_with_imu_pose(&mut self, position: Vector3<f64>, world_to_body: UnitQuaternion<f64>) {
        self.state.position = position;
        self.state.attitude = world_to_body.inverse();
        info!("Initialized pose: {}", self.state);
    }
    /// Level the attitude from a static accelerometer sample.
    ///
    /// At rest the accelerometer measures the reaction to gravity, so the measured specific
    /// force direction is rotated onto world +z. Yaw is unobservable and left at the shortest
    /// rotation. A sample too small to define a direction leaves the attitude at identity.
    pub fn init_with_accelerometer(&mut self, specific_force: &Vector3<f64>) {
        self.state.attitude = if specific_force.norm() > MIN_SPECIFIC_FORCE {
            rotation_onto(specific_force, &Vector3::z())
        } else {
            UnitQuaternion::identity()
        };
        info!(
            "Initialized attitude from accelerometer [{:.4}, {:.4}, {:.4}]: {}",
            specific_force[0], specific_force[1], specific_force[2], self.state
        );
    }

    /// Admit a landmark into slot `i`.
    ///
    /// Writes the depth parameter and the bearing direction (magnitude discarded), decouples the
    /// slot from the rest of the state and installs `init_cov` as its (depth, bearing) block
    /// exactly as given. The slot's previous content is overwritten.
    ///
    /// # Panics
    /// If `i` is outside the configured slot capacity.
    pub fn initialize_feature_state(
        &mut self,
        i: usize,
        bearing: &Vector3<f64>,
        depth_parameter: f64,
        init_cov: &Matrix3<f64>,
    ) {
        self.state.set_depth_parameter(i, depth_parameter);
        self.state.set_bearing(i, NormalVector::from_vector(bearing));
        let block = DMatrix::from_fn(3, 3, |r, c| init_cov[(r, c)]);
        self.reset_feature_covariance(i, &block);
        let direction = self.state.get_bearing(i);
        debug!(
            "Initialized feature {} with depth parameter {:.4}, bearing [{:.4}, {:.4}, {:.4}]",
            i, depth_parameter, direction[0], direction[1], direction[2]
        );
    }
    /// Evict the landmark in slot `i`, leaving the free-slot sentinels behind.
    ///
    /// # Panics
    /// If `i` is outside the configured slot capacity.
    pub fn remove_feature(&mut self, i: usize) {
        self.state.set_depth_parameter(i, SENTINEL_DEPTH_PARAMETER);
        self.state.set_bearing(i, NormalVector::identity());
        self.reset_feature_covariance(i, &DMatrix::identity(3, 3));
        debug!("Removed feature {}", i);
    }
    /// Whether slot `i` carries the free-slot covariance sentinel.
    pub fn is_slot_free(&self, i: usize) -> bool {
        let indices = self.feature_indices(i);
        if self.feature_covariance(i) != Matrix3::identity() {
            return false;
        }
        (0..self.cov.nrows())
            .filter(|k| !indices.contains(k))
            .all(|k| indices.iter().all(|&j| self.cov[(j, k)] == 0.0 && self.cov[(k, j)] == 0.0))
    }

    fn reset_feature_covariance(&mut self, i: usize, block: &DMatrix<f64>) {
        let indices = self.feature_indices(i);
        zero_cross_covariance(&mut self.cov, &indices);
        write_block(&mut self.cov, &indices, block);
    }
}
