//! Configuration and root folder resolution tests
//!
//! Tests that touch SONGTRACKER_ROOT_FOLDER are marked #[serial] so they do
//! not race on the process environment.

use serial_test::serial;
use songtracker_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, ServiceConfig, TomlConfig,
    ROOT_FOLDER_ENV,
};
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("songtracker"));
    assert_eq!(defaults.port, 3000);
    assert_eq!(defaults.session_ttl_hours, 24);
    assert_eq!(defaults.backup_interval_hours, 24);
    assert_eq!(defaults.backup_max_age_days, 7);
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::with_config(TomlConfig::default());
    let root_folder = resolver.resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/songtracker-test-env");

    let resolver = RootFolderResolver::with_config(TomlConfig::default());
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/songtracker-test-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/songtracker-from-env");

    let resolver = RootFolderResolver::with_config(TomlConfig::default())
        .cli_arg(Some(PathBuf::from("/tmp/songtracker-from-cli")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/songtracker-from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/songtracker-env-wins");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/songtracker-toml")),
        ..Default::default()
    };
    let resolver = RootFolderResolver::with_config(toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/songtracker-env-wins"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_root_folder_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/songtracker-toml")),
        ..Default::default()
    };
    let resolver = RootFolderResolver::with_config(toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/songtracker-toml"));
}

#[test]
fn test_toml_config_parses_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = 8080\nsecure_cookies = true\n").unwrap();

    let toml = TomlConfig::from_path(&path).unwrap();
    assert_eq!(toml.port, Some(8080));
    assert_eq!(toml.secure_cookies, Some(true));
    assert!(toml.root_folder.is_none());

    let config = ServiceConfig::from_toml(PathBuf::from("/tmp/x"), &toml);
    assert_eq!(config.port, 8080);
    assert!(config.secure_cookies);
    assert_eq!(config.session_ttl_hours, 24);
}

#[test]
fn test_toml_config_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    assert!(TomlConfig::from_path(&path).is_err());
}

#[test]
fn test_initializer_creates_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(initializer.backup_dir().is_dir());
    assert_eq!(initializer.database_path(), root.join("songtracker.db"));
}
