use std::io::Write;
use std::path::Path;

use ascent_guidance::config::ConfigError;
use ascent_guidance::{MissionConfig, StageId};

#[test]
fn bundled_kerbin_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/kerbin_orbit.toml");
    let cfg = MissionConfig::load(&path).unwrap();
    let defaults = MissionConfig::default();

    assert_eq!(cfg.staging.stages.len(), defaults.staging.stages.len());
    for (a, b) in cfg.staging.stages.iter().zip(&defaults.staging.stages) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.propellant_cutoff, b.propellant_cutoff);
        assert_eq!(a.altitude_ceiling, b.altitude_ceiling);
        assert_eq!(a.post_separation_throttle, b.post_separation_throttle);
    }
    assert_eq!(cfg.guard.target_altitude, defaults.guard.target_altitude);
    assert_eq!(cfg.maneuver.coast_altitude, defaults.maneuver.coast_altitude);
    assert_eq!(cfg.control.countdown, defaults.control.countdown);
    assert_eq!(cfg.maneuver.command_timeout, defaults.maneuver.command_timeout);
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[guard]
target_altitude = 100000.0

[[staging.stages]]
id = 4
name = "Lifter"
altitude_ceiling = 50000.0

[[staging.stages]]
id = 2
name = "Orbiter"
propellant_cutoff = false
"#
    )
    .unwrap();

    let cfg = MissionConfig::load(file.path()).unwrap();
    assert_eq!(cfg.guard.target_altitude, 100_000.0);
    assert_eq!(cfg.staging.stages[0].id, StageId(4));
    assert_eq!(cfg.staging.stages[0].altitude_ceiling, Some(50_000.0));
    assert!(!cfg.staging.stages[1].propellant_cutoff);
    assert_eq!(cfg.control.tick, 0.1);
}

#[test]
fn invalid_values_are_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[control]\nlaunch_throttle = 1.5").unwrap();
    let err = MissionConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
}

#[test]
fn infinite_durations_are_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[maneuver]\nwarp_timeout = inf").unwrap();
    let err = MissionConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = MissionConfig::from_toml_str("[guard\ntarget_altitude = ").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = MissionConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
