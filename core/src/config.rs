//! Filter configuration
//!
//! A [FilterConfig] fixes everything about the state that has to be known before the filter
//! starts: slot and camera capacity, depth parameterization, whether camera extrinsics are
//! estimated online, the fixed extrinsics used otherwise, and per-block variances for the
//! initial covariance and the process noise. Configurations can be read from and written to
//! JSON, YAML or TOML files.
//!
//! ## Examples
//!
//! ```
//! use vio_state::config::FilterConfig;
//!
//! let mut config = FilterConfig::default();
//! config.max_features = 12;
//! config.depth_type = 2; // logarithmic depth
//! assert!(config.validate().is_ok());
//! ```

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::FieldGroupId;

fn default_max_features() -> usize {
    25
}
fn default_num_cameras() -> usize {
    1
}
fn default_depth_type() -> i32 {
    1
}
fn default_true() -> bool {
    true
}

/// Fixed body to camera transform of one camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraExtrinsics {
    /// MrMC, body to camera offset in body coordinates [m]
    pub translation: [f64; 3],
    /// qCM as `[w, x, y, z]`; normalized on use
    pub rotation: [f64; 4],
}
impl Default for CameraExtrinsics {
    fn default() -> Self {
        CameraExtrinsics {
            translation: [0.0; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }
}
impl CameraExtrinsics {
    pub fn get_translation(&self) -> Vector3<f64> {
        Vector3::from(self.translation)
    }
    pub fn get_rotation(&self) -> UnitQuaternion<f64> {
        let [w, x, y, z] = self.rotation;
        UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z))
    }
}

/// One variance per state block, applied to every diagonal entry of that block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockVariances {
    pub pos: f64,
    pub vel: f64,
    pub acb: f64,
    pub gyb: f64,
    pub att: f64,
    pub vep: f64,
    pub vea: f64,
    pub dep: f64,
    pub nor: f64,
}
impl BlockVariances {
    /// Every block set to the same variance.
    pub fn uniform(value: f64) -> BlockVariances {
        BlockVariances {
            pos: value,
            vel: value,
            acb: value,
            gyb: value,
            att: value,
            vep: value,
            vea: value,
            dep: value,
            nor: value,
        }
    }
    pub fn get(&self, group: FieldGroupId) -> f64 {
        match group {
            FieldGroupId::Position => self.pos,
            FieldGroupId::Velocity => self.vel,
            FieldGroupId::AccelerometerBias => self.acb,
            FieldGroupId::GyroscopeBias => self.gyb,
            FieldGroupId::Attitude => self.att,
            FieldGroupId::ExtrinsicTranslation => self.vep,
            FieldGroupId::ExtrinsicRotation => self.vea,
            FieldGroupId::Depth => self.dep,
            FieldGroupId::Bearing => self.nor,
        }
    }
    fn validate(&self) -> Result<(), ConfigError> {
        for group in FieldGroupId::ALL {
            let value = self.get(group);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidVariance {
                    block: group.name(),
                    value,
                });
            }
        }
        Ok(())
    }
}
impl Default for BlockVariances {
    fn default() -> Self {
        BlockVariances::uniform(1.0)
    }
}

/// Default process noise, roughly tuned for a consumer-grade MEMS IMU.
fn default_process_noise() -> BlockVariances {
    BlockVariances {
        pos: 1e-4,
        vel: 4e-6,
        acb: 1e-8,
        gyb: 3.8e-7,
        att: 7.6e-7,
        vep: 1e-8,
        vea: 1e-8,
        dep: 1e-4,
        nor: 1e-5,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Number of landmark slots, n_max
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    /// Number of cameras, n_cam
    #[serde(default = "default_num_cameras")]
    pub num_cameras: usize,
    /// Depth parameterization selector: 0 regular, 1 inverse, 2 log, 3 hyperbolic.
    ///
    /// Kept as a raw integer; an invalid selector is corrected to regular depth when the
    /// filter state is built rather than rejected.
    #[serde(default = "default_depth_type")]
    pub depth_type: i32,
    /// Estimate the camera-IMU extrinsics online
    #[serde(default = "default_true")]
    pub do_ve_calibration: bool,
    /// Fixed extrinsics per camera. Empty means identity for every camera.
    #[serde(default)]
    pub extrinsics: Vec<CameraExtrinsics>,
    /// Initial covariance, per block
    #[serde(default)]
    pub initial_covariance: BlockVariances,
    /// Process noise covariance, per block
    #[serde(default = "default_process_noise")]
    pub process_noise: BlockVariances,
}
impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            max_features: default_max_features(),
            num_cameras: default_num_cameras(),
            depth_type: default_depth_type(),
            do_ve_calibration: true,
            extrinsics: Vec::new(),
            initial_covariance: BlockVariances::default(),
            process_noise: default_process_noise(),
        }
    }
}
impl FilterConfig {
    /// Check that the configuration describes a consistent state layout.
    ///
    /// The depth selector is deliberately not checked here, see [FilterConfig::depth_type].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cameras == 0 {
            return Err(ConfigError::NoCameras(self.num_cameras));
        }
        if self.max_features == 0 {
            return Err(ConfigError::NoFeatureSlots(self.max_features));
        }
        if !self.extrinsics.is_empty() && self.extrinsics.len() != self.num_cameras {
            return Err(ConfigError::ExtrinsicsCount {
                expected: self.num_cameras,
                found: self.extrinsics.len(),
            });
        }
        for (cam_id, extrinsics) in self.extrinsics.iter().enumerate() {
            let norm = extrinsics.rotation.iter().map(|c| c * c).sum::<f64>().sqrt();
            if !(norm > f64::EPSILON && norm.is_finite()) {
                return Err(ConfigError::DegenerateRotation(cam_id));
            }
        }
        self.initial_covariance.validate()?;
        self.process_noise.validate()?;
        Ok(())
    }
    /// Fixed extrinsics of camera `cam_id`, identity when none are configured.
    pub fn camera_extrinsics(&self, cam_id: usize) -> CameraExtrinsics {
        self.extrinsics.get(cam_id).cloned().unwrap_or_default()
    }

    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }
    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(io::Error::other)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FilterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_features, 25);
        assert_eq!(config.depth_type, 1);
        assert!(config.do_ve_calibration);
    }

    #[test]
    fn rejects_zero_cameras_and_slots() {
        let mut config = FilterConfig::default();
        config.num_cameras = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoCameras(0)));
        let mut config = FilterConfig::default();
        config.max_features = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoFeatureSlots(0)));
    }

    #[test]
    fn rejects_mismatched_extrinsics() {
        let mut config = FilterConfig::default();
        config.num_cameras = 2;
        config.extrinsics = vec![CameraExtrinsics::default()];
        assert_eq!(
            config.validate(),
            Err(ConfigError::ExtrinsicsCount {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn rejects_degenerate_rotation() {
        let mut config = FilterConfig::default();
        config.extrinsics = vec![CameraExtrinsics {
            translation: [0.0; 3],
            rotation: [0.0; 4],
        }];
        assert_eq!(config.validate(), Err(ConfigError::DegenerateRotation(0)));
    }

    #[test]
    fn rejects_negative_variance() {
        let mut config = FilterConfig::default();
        config.process_noise.nor = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidVariance { block: "nor", .. })
        ));
        let mut config = FilterConfig::default();
        config.initial_covariance.att = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_depth_selector_is_not_a_validation_error() {
        let mut config = FilterConfig::default();
        config.depth_type = 99;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn extrinsics_rotation_is_normalized() {
        let extrinsics = CameraExtrinsics {
            translation: [0.1, 0.0, -0.05],
            rotation: [2.0, 0.0, 0.0, 0.0],
        };
        assert_eq!(extrinsics.get_rotation(), UnitQuaternion::identity());
        assert_eq!(extrinsics.get_translation(), Vector3::new(0.1, 0.0, -0.05));
        let config = FilterConfig::default();
        assert_eq!(config.camera_extrinsics(0), CameraExtrinsics::default());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: FilterConfig = serde_json::from_str(r#"{ "max_features": 8 }"#).unwrap();
        assert_eq!(config.max_features, 8);
        assert_eq!(config.num_cameras, 1);
        assert_eq!(config.depth_type, 1);
        assert!(config.do_ve_calibration);
        assert_eq!(config.initial_covariance, BlockVariances::uniform(1.0));
    }
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_cfg() -> FilterConfig {
        FilterConfig {
            max_features: 10,
            num_cameras: 2,
            depth_type: 3,
            do_ve_calibration: false,
            extrinsics: vec![
                CameraExtrinsics {
                    translation: [0.1, 0.0, 0.0],
                    rotation: [1.0, 0.0, 0.0, 0.0],
                },
                CameraExtrinsics {
                    translation: [-0.1, 0.0, 0.0],
                    rotation: [0.0, 1.0, 0.0, 0.0],
                },
            ],
            initial_covariance: BlockVariances::uniform(0.5),
            process_noise: default_process_noise(),
        }
    }

    #[test]
    fn json_roundtrip() {
        let cfg = sample_cfg();
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("json");
        cfg.to_json(&path).unwrap();
        let loaded = FilterConfig::from_json(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn yaml_roundtrip() {
        let cfg = sample_cfg();
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("yaml");
        cfg.to_yaml(&path).unwrap();
        let loaded = FilterConfig::from_yaml(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = sample_cfg();
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("toml");
        cfg.to_toml(&path).unwrap();
        let loaded = FilterConfig::from_toml(&path).unwrap();
        assert_eq!(cfg.extrinsics, loaded.extrinsics);
        assert_eq!(cfg.depth_type, loaded.depth_type);
    }

    #[test]
    fn generic_dispatch_roundtrip() {
        let cfg = sample_cfg();
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("yml");
        cfg.to_file(&path).unwrap();
        let loaded = FilterConfig::from_file(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn unsupported_extension_error() {
        let cfg = sample_cfg();
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("txt");

        let result = cfg.to_file(&path);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidInput);

        let result = FilterConfig::from_file(&path);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidInput);
    }
}
