//! Configuration loading and root folder resolution
//!
//! Tests that touch `UMP_ROOT_FOLDER` or `UMP_CONFIG` are marked #[serial] so
//! they do not race on the process environment.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use ump_common::config::{
    load_toml_config, resolve_root_folder, RootFolderInitializer, TomlConfig, CONFIG_FILE_ENV,
    ROOT_FOLDER_ENV,
};
use ump_common::Error;

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ump-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/ump-from-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(Some("/tmp/ump-from-cli"), &config);
    assert_eq!(root, PathBuf::from("/tmp/ump-from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ump-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/ump-from-toml")),
        ..Default::default()
    };

    assert_eq!(
        resolve_root_folder(None, &config),
        PathBuf::from("/tmp/ump-from-env")
    );

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/ump-from-toml")),
        ..Default::default()
    };
    assert_eq!(
        resolve_root_folder(None, &config),
        PathBuf::from("/tmp/ump-from-toml")
    );

    let fallback = resolve_root_folder(None, &TomlConfig::default());
    assert!(!fallback.as_os_str().is_empty());
    assert!(fallback.to_string_lossy().contains("ump"));
}

#[test]
#[serial]
fn test_explicit_config_file_is_loaded() {
    env::remove_var(CONFIG_FILE_ENV);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/ump"
login_url = "/accounts/login"

[logging]
level = "debug"

[jwplatform]
embed_player_key = "So5taiQuig"
"#,
    )
    .unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/ump")));
    assert_eq!(config.login_url(), "/accounts/login");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.jwplatform.embed_player_key, "So5taiQuig");
    assert_eq!(config.server.port, 5730);
}

#[test]
#[serial]
fn test_config_file_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("env-config.toml");
    std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

    env::set_var(CONFIG_FILE_ENV, &path);
    let config = load_toml_config(None).unwrap();
    env::remove_var(CONFIG_FILE_ENV);

    assert_eq!(config.server.port, 9000);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    env::remove_var(CONFIG_FILE_ENV);
    let dir = tempfile::tempdir().unwrap();
    let err = load_toml_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
#[serial]
fn test_malformed_explicit_file_is_error() {
    env::remove_var(CONFIG_FILE_ENV);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[server\nport = \"many\"").unwrap();

    assert!(matches!(
        load_toml_config(Some(&path)).unwrap_err(),
        Error::Config(_)
    ));
}

#[test]
fn test_initializer_creates_folder() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("ump");

    let init = RootFolderInitializer::new(root.clone());
    init.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(init.database_path(), root.join("ump.db"));

    // Second call is a no-op
    init.ensure_directory_exists().unwrap();
}
