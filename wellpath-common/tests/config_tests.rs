//! Configuration loading and graceful degradation
//!
//! Tests that manipulate WELLPATH_ROOT are marked #[serial] so they do not
//! race each other on the process environment.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;
use wellpath_common::config::{
    load_toml_config, write_toml_config, CompiledDefaults, DiscountTier, EngineThresholds,
    RootFolderInitializer, RootFolderResolver, TomlConfig, ROOT_ENV_VAR,
};
use wellpath_common::Error;

#[test]
fn test_compiled_defaults_end_in_wellpath() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(defaults.root_folder.to_string_lossy().contains("wellpath"));
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_ENV_VAR);

    let root_folder = RootFolderResolver::new().resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_beats_toml() {
    env::set_var(ROOT_ENV_VAR, "/tmp/wellpath-env-root");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/wellpath-toml-root")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new().with_toml_config(&config).resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/wellpath-env-root"));

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_cli_arg_has_highest_priority() {
    env::set_var(ROOT_ENV_VAR, "/tmp/wellpath-env-root");

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/wellpath-cli-root")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/wellpath-cli-root"));

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_falls_back_to_toml_root() {
    env::remove_var(ROOT_ENV_VAR);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/wellpath-toml-root")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new().with_toml_config(&config).resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/wellpath-toml-root"));
}

#[test]
fn test_initializer_creates_missing_root_folder() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("wellpath");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join("wellpath.db"));
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();

    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.engine.match_acceptance_score, 30.0);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_engine_table_keeps_other_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wellpath.toml");
    std::fs::write(
        &path,
        r#"
[engine]
match_acceptance_score = 45.0
reference_currency = "EUR"
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.engine.match_acceptance_score, 45.0);
    assert_eq!(config.engine.reference_currency, "EUR");
    assert_eq!(config.engine.min_suitability, 20);
    assert_eq!(config.engine.discount_tiers.len(), 3);
}

#[test]
fn test_malformed_config_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wellpath.toml");
    std::fs::write(&path, "engine = [not toml").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_out_of_range_threshold_rejected_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wellpath.toml");
    std::fs::write(&path, "[engine]\nmatch_acceptance_score = 130.0\n").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}

#[test]
fn test_validate_rejects_unsorted_discount_tiers() {
    let thresholds = EngineThresholds {
        discount_tiers: vec![
            DiscountTier { min_items: 6, percentage: 15 },
            DiscountTier { min_items: 3, percentage: 10 },
        ],
        ..Default::default()
    };

    assert!(thresholds.validate().is_err());
    assert!(EngineThresholds::default().validate().is_ok());
}

#[test]
fn test_validate_rejects_inverted_tier_cutoffs() {
    let thresholds = EngineThresholds {
        immediate_min_combined: 30.0,
        foundation_min_combined: 60.0,
        ..Default::default()
    };

    assert!(thresholds.validate().is_err());
}

#[test]
fn test_write_then_load_preserves_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("conf").join("wellpath.toml");

    let mut config = TomlConfig::default();
    config.root_folder = Some(PathBuf::from("/srv/wellpath"));
    config.logging.level = "debug".to_string();
    config.engine.low_deduction = 20;

    write_toml_config(&config, &path).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());
    assert_eq!(load_toml_config(&path).unwrap(), config);
}
