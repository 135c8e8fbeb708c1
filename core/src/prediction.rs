//! Prediction inputs: the IMU sample and the process noise containers
//!
//! The predict step of the filter is driven by one [PredictionMeasurement] (an IMU sample)
//! and perturbed by [PredictionNoise], which mirrors the stochastic block structure of the
//! state in tangent space. Neither container has an auxiliary block.

use std::any::Any;
use std::fmt::{self, Display};

use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Vector3};

use crate::InputModel;
use crate::config::BlockVariances;
use crate::layout::{Field, StateLayout};

/// One IMU sample in body coordinates.
///
/// Specific force is the raw accelerometer output (gravity not compensated) and angular rate
/// the raw gyroscope output. Biases are estimated by the filter and not removed here.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PredictionMeasurement {
    /// Specific force in m/s^2, body frame x, y, z axis
    pub accel: Vector3<f64>,
    /// Angular rate in rad/s, body frame x, y, z axis
    pub gyro: Vector3<f64>,
}
impl PredictionMeasurement {
    pub fn new(accel: Vector3<f64>, gyro: Vector3<f64>) -> PredictionMeasurement {
        PredictionMeasurement { accel, gyro }
    }
}
impl Display for PredictionMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PredictionMeasurement {{ accel: [{:.4}, {:.4}, {:.4}], gyro: [{:.4}, {:.4}, {:.4}] }}",
            self.accel[0], self.accel[1], self.accel[2], self.gyro[0], self.gyro[1], self.gyro[2]
        )
    }
}
impl From<Vec<f64>> for PredictionMeasurement {
    /// Builds a measurement from `[ax, ay, az, gx, gy, gz]`.
    fn from(vec: Vec<f64>) -> Self {
        if vec.len() != 6 {
            panic!(
                "PredictionMeasurement must be initialized with a vector of length 6 (3 for accel, 3 for gyro)"
            );
        }
        PredictionMeasurement {
            accel: Vector3::new(vec[0], vec[1], vec[2]),
            gyro: Vector3::new(vec[3], vec[4], vec[5]),
        }
    }
}
impl From<PredictionMeasurement> for Vec<f64> {
    fn from(data: PredictionMeasurement) -> Self {
        data.accel.iter().chain(data.gyro.iter()).cloned().collect()
    }
}
impl InputModel for PredictionMeasurement {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn get_dimension(&self) -> usize {
        6
    }
    fn get_vector(&self) -> DVector<f64> {
        DVector::from_vec(self.accel.iter().chain(self.gyro.iter()).cloned().collect())
    }
}

/// Zero-mean driving noise of the predict step, one block per stochastic state block.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionNoise {
    layout: StateLayout,
    values: DVector<f64>,
}
impl PredictionNoise {
    pub fn zeros(n_max: usize, n_cam: usize) -> PredictionNoise {
        let layout = StateLayout::prediction_noise(n_max, n_cam);
        let values = DVector::zeros(layout.dimension());
        PredictionNoise { layout, values }
    }
    /// Wrap an existing noise vector of the full tangent dimension.
    pub fn from_vector(n_max: usize, n_cam: usize, values: DVector<f64>) -> PredictionNoise {
        let layout = StateLayout::prediction_noise(n_max, n_cam);
        assert_eq!(
            values.len(),
            layout.dimension(),
            "noise vector must match the tangent dimension"
        );
        PredictionNoise { layout, values }
    }
    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }
    pub fn dimension(&self) -> usize {
        self.layout.dimension()
    }
    pub fn as_vector(&self) -> &DVector<f64> {
        &self.values
    }
    /// Noise block of a single field.
    pub fn field(&self, field: Field) -> DVectorView<'_, f64> {
        let range = self.layout.range(field);
        self.values.rows(range.start, range.len())
    }
    pub fn field_mut(&mut self, field: Field) -> DVectorViewMut<'_, f64> {
        let range = self.layout.range(field);
        self.values.rows_mut(range.start, range.len())
    }
    /// Diagonal process noise covariance built from per-block variances.
    pub fn covariance(&self, variances: &BlockVariances) -> DMatrix<f64> {
        let mut diagonal = DVector::zeros(self.dimension());
        for group in self.layout.groups() {
            diagonal
                .rows_mut(group.offset, group.dimension())
                .fill(variances.get(group.id));
        }
        DMatrix::from_diagonal(&diagonal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FieldGroupId;

    #[test]
    fn measurement_vector_conversions() {
        let meas = PredictionMeasurement::from(vec![0.1, 0.2, 9.8, 0.01, 0.02, 0.03]);
        assert_eq!(meas.accel, Vector3::new(0.1, 0.2, 9.8));
        assert_eq!(meas.gyro, Vector3::new(0.01, 0.02, 0.03));
        assert_eq!(meas.get_dimension(), 6);
        assert_eq!(meas.get_vector()[2], 9.8);
        let back: Vec<f64> = meas.into();
        assert_eq!(back, vec![0.1, 0.2, 9.8, 0.01, 0.02, 0.03]);
        assert!(meas.as_any().downcast_ref::<PredictionMeasurement>().is_some());
    }

    #[test]
    #[should_panic]
    fn measurement_from_short_vector_panics() {
        let _ = PredictionMeasurement::from(vec![1.0, 2.0]);
    }

    #[test]
    fn measurement_display() {
        let meas = PredictionMeasurement::new(Vector3::new(0.0, 0.0, 9.81), Vector3::zeros());
        assert!(format!("{}", meas).contains("9.8100"));
    }

    #[test]
    fn noise_mirrors_state_dimension() {
        let noise = PredictionNoise::zeros(5, 2);
        assert_eq!(noise.dimension(), StateLayout::new(5, 2).dimension());
        assert_eq!(noise.field(Field::Attitude).len(), 3);
        assert_eq!(noise.field(Field::Bearing(4)).len(), 2);
        assert_eq!(noise.field(Field::Depth(4)).len(), 1);
    }

    #[test]
    fn noise_field_views_write_through() {
        let mut noise = PredictionNoise::zeros(2, 1);
        noise.field_mut(Field::Bearing(1)).fill(0.5);
        let offset = noise.layout().offset(Field::Bearing(1));
        assert_eq!(noise.as_vector()[offset], 0.5);
        assert_eq!(noise.as_vector()[offset + 1], 0.5);
        assert_eq!(noise.as_vector().sum(), 1.0);
    }

    #[test]
    fn covariance_fills_each_block() {
        let noise = PredictionNoise::zeros(2, 1);
        let variances = BlockVariances {
            pos: 1.0,
            vel: 2.0,
            acb: 3.0,
            gyb: 4.0,
            att: 5.0,
            vep: 6.0,
            vea: 7.0,
            dep: 8.0,
            nor: 9.0,
        };
        let q = noise.covariance(&variances);
        let layout = noise.layout();
        for group in layout.groups() {
            for k in group.offset..group.offset + group.dimension() {
                assert_eq!(q[(k, k)], variances.get(group.id));
            }
        }
        assert_eq!(q[(0, 1)], 0.0);
        assert_eq!(q[(layout.offset(Field::Bearing(1)), layout.offset(Field::Bearing(1)))], 9.0);
        assert_eq!(variances.get(FieldGroupId::Velocity), 2.0);
    }
}
