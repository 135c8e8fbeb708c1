//! State layer of a visual-inertial extended Kalman filter
//!
//! This crate provides the state containers that a robot-centric visual-inertial EKF operates on: the
//! composite manifold state (body pose, velocity, IMU biases, camera-IMU extrinsics and a fixed number
//! of landmark slots), the covariance that goes with it, the inputs of the predict step, and the
//! parameterizations used for landmark depth. It does not implement the predict/update recursion,
//! image processing or patch tracking; those are expected to live in the filter that consumes this
//! crate and works against the index layout exposed here.
//!
//! This crate is primarily built off of [`nalgebra`](https://crates.io/crates/nalgebra), which provides
//! the dense matrices, vectors and unit quaternions used throughout. Configuration is handled with
//! [`serde`](https://crates.io/crates/serde) and logging with the [`log`](https://crates.io/crates/log)
//! facade. In general, variables are named according to the quantity they represent and not the symbol
//! used in the literature, with the frame-annotated names (`WrWM`, `qCM`, ...) kept in the documentation
//! of the corresponding accessor.
//!
//! ## Crate overview
//!
//! - [config]: Filter configuration and its JSON/YAML/TOML file I/O.
//! - [depth]: The four landmark depth parameterizations and their derivatives.
//! - [error]: Configuration errors.
//! - [filter_state]: State plus covariance, pose initialization and landmark slot maintenance.
//! - [layout]: Covariance index layout of the composite state.
//! - [linalg]: Covariance surgery helpers.
//! - [manifold]: Retraction and local coordinates of quaternions and unit bearings.
//! - [prediction]: IMU sample and process noise containers of the predict step.
//! - [shared]: Lock-protected filter state for observers on other threads.
//! - [state]: The composite manifold state and its derived quantities.
//!
//! ## Frames and state definition
//!
//! Three kinds of frames appear in the state: the world frame `W` (gravity along -z), the body frame `M`
//! (coincident with the IMU) and one frame `C` per camera. The stochastic part of the state is
//!
//! $$
//! x = [{}_W r_{WM}, {}_M v_M, b_a, b_\omega, q_{WM}, {}_M r_{MC_j}, q_{C_jM}, p_i, n_i]
//! $$
//!
//! for cameras `j` and landmark slots `i`, where $p_i$ is the depth parameter and $n_i$ the unit bearing
//! of landmark `i` in the coordinates of the camera that observes it. Rotations follow the nalgebra
//! convention: `qWM * v_M` expresses a body vector in world coordinates. Non-Euclidean fields are
//! perturbed in their tangent space, so the covariance has dimension `15 + 6 n_cam + 3 n_max`.
//!
//! ## Landmark slots
//!
//! The number of landmark slots is fixed when the state is built, because the dimension of the
//! covariance must stay constant for the filter algebra. A slot is either in use or free; a free slot
//! holds the sentinel depth parameter `1.0`, the default bearing `e_z`, no cross covariance and the
//! identity as its (depth, bearing) covariance block.
pub mod config;
pub mod depth;
pub mod error;
pub mod filter_state;
pub mod layout;
pub mod linalg;
pub mod manifold;
pub mod prediction;
pub mod shared;
pub mod state;

use nalgebra::DVector;

use std::any::Any;

pub use crate::config::{BlockVariances, CameraExtrinsics, FilterConfig};
pub use crate::depth::{DepthMap, DepthMapping, DepthType};
pub use crate::error::ConfigError;
pub use crate::filter_state::FilterState;
pub use crate::layout::{Field, FieldGroupId, StateLayout};
pub use crate::manifold::{ManifoldElement, NormalVector};
pub use crate::prediction::{PredictionMeasurement, PredictionNoise};
pub use crate::shared::SharedFilterState;
pub use crate::state::{State, StateAuxiliary};

/// Generic input model trait for the predict step of a filter
///
/// This trait defines the interface for control inputs that drive the process model, such as IMU
/// samples. Implementations expose the input as a flat vector so that a generic filter can build
/// its process Jacobians without knowing the concrete type.
///
/// # Methods
/// - `get_dimension()`: Returns the dimension of the input vector.
/// - `get_vector()`: Returns the input as a vector.
///
/// # Downcasting
/// `as_any()` allows type-safe downcasting of trait objects.
pub trait InputModel {
    /// Downcast helper method to allow for type-safe downcasting
    fn as_any(&self) -> &dyn Any;
    /// Get the dimension of the input vector
    fn get_dimension(&self) -> usize;
    /// Get the input as a vector
    fn get_vector(&self) -> DVector<f64>;
}
