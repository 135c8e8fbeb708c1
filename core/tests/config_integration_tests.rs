//! Integration tests for building a filter state from configuration files
use std::io::Write;

use nalgebra::{UnitQuaternion, Vector3};
use tempfile::NamedTempFile;

use vio_state::{ConfigError, DepthType, Field, FilterConfig, FilterState};

fn write_temp(contents: &str, extension: &str) -> (NamedTempFile, std::path::PathBuf) {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().with_extension(extension);
    let mut handle = std::fs::File::create(&path).unwrap();
    handle.write_all(contents.as_bytes()).unwrap();
    (file, path)
}

#[test]
fn toml_config_builds_two_camera_state() {
    let (_guard, path) = write_temp(
        r#"
max_features = 8
num_cameras = 2
depth_type = 3
do_ve_calibration = false

[[extrinsics]]
translation = [0.05, 0.0, 0.0]
rotation = [1.0, 0.0, 0.0, 0.0]

[[extrinsics]]
translation = [-0.05, 0.0, 0.0]
rotation = [0.7071067811865476, 0.0, 0.7071067811865476, 0.0]

[initial_covariance]
pos = 1e-4
vel = 1e-2
acb = 1e-3
gyb = 1e-4
att = 1e-3
vep = 1e-4
vea = 1e-4
dep = 1.0
nor = 1.0
"#,
        "toml",
    );
    let config = FilterConfig::from_file(&path).unwrap();
    let filter_state = FilterState::from_config(&config).unwrap();
    let state = &filter_state.state;

    assert_eq!(state.dimension(), 15 + 12 + 24);
    assert_eq!(state.aux.depth_map.get_type(), DepthType::Hyperbolic);
    assert_eq!(state.get_camera_offset(1), Vector3::new(-0.05, 0.0, 0.0));
    let expected = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
    assert!(state.get_camera_rotation(1).angle_to(&expected) < 1e-6);

    let vel = state.layout().offset(Field::Velocity);
    assert_eq!(filter_state.get_covariance()[(vel, vel)], 1e-2);
    // process noise was omitted and falls back to defaults
    assert_eq!(config.process_noise, FilterConfig::default().process_noise);
    for i in 0..8 {
        assert!(filter_state.is_slot_free(i));
    }
}

#[test]
fn yaml_config_with_invalid_depth_type_falls_back_to_regular() {
    let (_guard, path) = write_temp("max_features: 3\ndepth_type: 42\n", "yaml");
    let config = FilterConfig::from_file(&path).unwrap();
    let filter_state = FilterState::from_config(&config).unwrap();
    assert_eq!(filter_state.state.aux.depth_map.get_type(), DepthType::Regular);
    assert_eq!(filter_state.state.layout().n_max(), 3);
}

#[test]
fn json_config_with_wrong_extrinsics_count_is_rejected() {
    let (_guard, path) = write_temp(
        r#"{ "num_cameras": 2, "extrinsics": [ { "translation": [0, 0, 0], "rotation": [1, 0, 0, 0] } ] }"#,
        "json",
    );
    let config = FilterConfig::from_file(&path).unwrap();
    assert_eq!(
        FilterState::from_config(&config).err(),
        Some(ConfigError::ExtrinsicsCount {
            expected: 2,
            found: 1
        })
    );
}

#[test]
fn malformed_file_is_an_io_error() {
    let (_guard, path) = write_temp("max_features = [", "toml");
    assert!(FilterConfig::from_file(&path).is_err());
}

#[test]
fn written_default_config_reloads() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().with_extension("json");
    FilterConfig::default().to_file(&path).unwrap();
    let reloaded = FilterConfig::from_file(&path).unwrap();
    assert_eq!(reloaded, FilterConfig::default());
}
