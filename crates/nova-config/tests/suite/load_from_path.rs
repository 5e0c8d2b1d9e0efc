use nova_config::{ConfigError, NovaConfig};

#[test]
fn loads_backend_settings_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nova.toml");
    std::fs::write(
        &path,
        r#"
[logging]
level = "debug"
json = true

[jdwp]
first_id = 1001
sweep_threshold = 8
io_retry_limit = 5
"#,
    )
    .expect("write config");

    let config = NovaConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
    assert!(config.logging.stderr);
    assert_eq!(config.jdwp.first_id, 1001);
    assert_eq!(config.jdwp.sweep_threshold, 8);
    assert_eq!(config.jdwp.io_retry_limit, 5);
    assert_eq!(config.jdwp.string_encoding, "UTF-8");
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");

    let err = NovaConfig::load_from_path(&path).expect_err("missing file");
    match err {
        ConfigError::Io { path: reported, .. } => assert!(reported.ends_with("absent.toml")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = NovaConfig::load_from_str("[jdwp\nfirst_id = 3").expect_err("malformed");
    assert!(matches!(err, ConfigError::Toml(_)));
}
