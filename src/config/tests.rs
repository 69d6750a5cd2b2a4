use super::settings::Settings;
use super::{Framing, load_config_from};
use serial_test::serial;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 9090);
    assert_eq!(settings.server.accept_poll(), Duration::from_secs(1));
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.broker.framing, Framing::Line);
    assert_eq!(settings.broker.read_buffer_bytes, 1024);
    assert_eq!(settings.broker.max_line_bytes, 65536);
    assert_eq!(settings.broker.write_timeout(), Duration::from_secs(1));
    assert_eq!(settings.broker.drain_timeout(), Duration::from_secs(2));
}

#[test]
fn test_write_timeout_floor() {
    let mut settings = Settings::default();
    settings.broker.write_timeout_ms = 0;
    assert_eq!(settings.broker.write_timeout(), Duration::from_millis(1));
}

#[test]
fn test_server_addr_and_poll_floor() {
    let mut settings = Settings::default();
    settings.server.host = "127.0.0.1".to_string();
    settings.server.accept_poll_ms = 0;
    assert_eq!(settings.server.addr(), "127.0.0.1:9090");
    assert_eq!(settings.server.accept_poll(), Duration::from_millis(1));
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let name = tmp.path().join("absent");

    let cfg = load_config_from(name.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg, Settings::default());
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("popq.toml");
    let toml = r#"
        [server]
        host = "127.0.0.1"
        port = 9100

        [broker]
        framing = "read"
        max_connections = 10
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 9100);
    assert_eq!(cfg.server.accept_poll_ms, 1000);
    assert_eq!(cfg.broker.framing, Framing::Read);
    assert_eq!(cfg.broker.max_connections, 10);
    assert_eq!(cfg.broker.read_buffer_bytes, 1024);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("popq.toml");
    fs::write(&path, "[server]\nport = 9100\n").expect("write config file");

    temp_env::with_vars(
        [
            ("POPQ_SERVER__PORT", Some("9200")),
            ("POPQ_SERVER__ACCEPT_POLL_MS", Some("50")),
            ("POPQ_BROKER__DRAIN_TIMEOUT_MS", Some("10")),
            ("POPQ_BROKER__WRITE_TIMEOUT_MS", Some("250")),
            ("POPQ_BROKER__MAX_LINE_BYTES", Some("4096")),
        ],
        || {
            let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
            assert_eq!(cfg.server.port, 9200);
            assert_eq!(cfg.server.accept_poll_ms, 50);
            assert_eq!(cfg.broker.drain_timeout_ms, 10);
            assert_eq!(cfg.broker.write_timeout_ms, 250);
            assert_eq!(cfg.broker.max_line_bytes, 4096);
            assert_eq!(cfg.broker.framing, Framing::Line);
        },
    );
}
