//! Tests for loading and saving [`Calibrations`].

use std::{env, fs, path::PathBuf};

use rstest::*;

use scpirs::{Calibrations, ScpiError};

/// A path in the temporary directory that is unique for this test and process.
fn tmp_path(name: &str) -> PathBuf {
    let path = env::temp_dir().join(format!("scpirs-{}-{name}.json", std::process::id()));
    let _ = fs::remove_file(&path);
    path
}

#[rstest]
fn test_load_or_default_writes_defaults() {
    let path = tmp_path("defaults");

    let cal = Calibrations::load_or_default(&path).unwrap();
    assert_eq!(cal, Calibrations::default());
    assert!(path.exists());

    let reloaded = Calibrations::load(&path).unwrap();
    assert_eq!(reloaded, cal);
    fs::remove_file(&path).unwrap();
}

#[rstest]
fn test_save_and_load() {
    let path = tmp_path("save");

    let mut cal = Calibrations::default();
    cal.add_polynomial("doble", vec![2.0, 0.0]).unwrap();
    cal.save(&path).unwrap();

    let cal = Calibrations::load_or_default(&path).unwrap();
    assert_eq!(cal.evaluate("doble", 42.0).unwrap(), 84.0);
    assert_eq!(cal.get_polynomial("doble"), Some([2.0, 0.0].as_slice()));
    fs::remove_file(&path).unwrap();
}

#[rstest]
fn test_file_format() {
    let path = tmp_path("format");
    fs::write(&path, r#"{"offset": [1.0, -0.25]}"#).unwrap();

    let cal = Calibrations::load(&path).unwrap();
    assert_eq!(cal.evaluate("offset", 2.0).unwrap(), 1.75);
    assert!(cal.evaluate("equ", 2.0).is_err());
    fs::remove_file(&path).unwrap();
}

#[rstest]
fn test_load_invalid() {
    let path = tmp_path("invalid");
    fs::write(&path, "not json").unwrap();
    assert!(matches!(
        Calibrations::load(&path),
        Err(ScpiError::Json(_))
    ));
    fs::remove_file(&path).unwrap();
}

#[rstest]
fn test_load_missing() {
    let path = tmp_path("missing");
    assert!(matches!(Calibrations::load(&path), Err(ScpiError::Io(_))));
}
