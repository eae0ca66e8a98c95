//! Loading and validating the TOML configuration.

use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use rootwatch::config::{load_and_validate, DetectionConfig};
use rootwatch::errors::RootwatchError;
use rootwatch::types::Category;
use rootwatch_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn full_config_parses_and_validates() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let path = dir.path().join("Rootwatch.toml");
    fs::write(
        &path,
        r#"
[detection]
grace_window_secs = 30
write_exemption_secs = 2

[[watch]]
pattern = "**/*.cfg"
category = "restart"
exclude = ["**/tmp/**"]

[[watch]]
pattern = "**/*.env"
category = "env"
"#,
    )?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.grace_window, Duration::from_secs(30));
    assert_eq!(cfg.write_exemption_ttl, Duration::from_secs(2));
    assert_eq!(cfg.watch.len(), 2);
    assert_eq!(cfg.watch[0].category, Category::restart());
    assert_eq!(cfg.watch[0].exclude, vec!["**/tmp/**".to_string()]);
    assert_eq!(cfg.watch[1].category, Category::new("env"));

    Ok(())
}

#[test]
fn empty_config_applies_defaults() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let path = dir.path().join("Rootwatch.toml");
    fs::write(&path, "")?;

    let cfg = load_and_validate(&path)?;
    let defaults = DetectionConfig::default();

    assert_eq!(cfg.grace_window, defaults.grace_window);
    assert_eq!(cfg.write_exemption_ttl, defaults.write_exemption_ttl);
    assert!(cfg.watch.is_empty());

    Ok(())
}

#[test]
fn invalid_glob_is_a_config_error() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let path = dir.path().join("Rootwatch.toml");
    fs::write(
        &path,
        r#"
[[watch]]
pattern = "src/[broken"
category = "restart"
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, RootwatchError::ConfigError(_)));

    Ok(())
}

#[test]
fn zero_durations_are_rejected() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let path = dir.path().join("Rootwatch.toml");
    fs::write(
        &path,
        r#"
[detection]
grace_window_secs = 0
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, RootwatchError::ConfigError(_)));

    Ok(())
}

#[test]
fn empty_category_is_rejected() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let path = dir.path().join("Rootwatch.toml");
    fs::write(
        &path,
        r#"
[[watch]]
pattern = "**/*.cfg"
category = "  "
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, RootwatchError::ConfigError(_)));

    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    init_tracing();

    let err = load_and_validate("/definitely/not/here/Rootwatch.toml").unwrap_err();
    assert!(matches!(err, RootwatchError::IoError(_)));
}
