use std::path::PathBuf;
use std::time::Duration;
use mediafront::cli::Args;
use mediafront::config::{Config, FileConfig, DEFAULT_MAX_REQUEST_BODY};
use mediafront::server::EngineKind;

fn make_args(port: Option<u16>, name: Option<String>) -> Args {
    Args {
        paths: vec![PathBuf::from("/tmp")],
        port,
        name,
        config: None,
        hostname: None,
        network_interface: None,
        engine_v2: false,
        ip_filter: None,
        web_control: false,
    }
}

#[test]
fn test_defaults_when_nothing_set() {
    let config = Config::resolve(None, &make_args(None, None));
    assert_eq!(config.port, 5001);
    assert!(
        config.name == "mediafront" || config.name.starts_with("mediafront@"),
        "expected default name to be 'mediafront' or 'mediafront@<hostname>', got: {}",
        config.name
    );
    assert_eq!(config.engine, EngineKind::Blocking);
    assert_eq!(config.max_request_body, DEFAULT_MAX_REQUEST_BODY);
    assert!(config.hostname.is_none());
    assert!(!config.web_control);
}

#[test]
fn test_cli_flag_overrides_default() {
    let config = Config::resolve(None, &make_args(Some(9000), None));
    assert_eq!(config.port, 9000);
}

#[test]
fn test_toml_overrides_default() {
    let file = FileConfig { port: Some(7777), ..FileConfig::default() };
    let config = Config::resolve(Some(file), &make_args(None, None));
    assert_eq!(config.port, 7777);
}

#[test]
fn test_cli_overrides_toml() {
    let file = FileConfig {
        port: Some(7777),
        hostname: Some("media.lan".into()),
        ..FileConfig::default()
    };
    let mut args = make_args(Some(9000), None);
    args.hostname = Some("override.lan".into());
    let config = Config::resolve(Some(file), &args);
    assert_eq!(config.port, 9000); // CLI wins
    assert_eq!(config.hostname.as_deref(), Some("override.lan"));
}

#[test]
fn test_engine_v2_from_either_source() {
    let mut args = make_args(None, None);
    args.engine_v2 = true;
    assert_eq!(Config::resolve(None, &args).engine, EngineKind::Evented);

    let file = FileConfig { engine_v2: Some(true), ..FileConfig::default() };
    assert_eq!(Config::resolve(Some(file), &make_args(None, None)).engine, EngineKind::Evented);
}

#[test]
fn test_toml_parse() {
    let toml_str = r#"
port = 9000
name = "Living Room"
network_interface = "eth0"
ip_filter = "192.168.1.*"
max_request_body = 1024
shutdown_grace_secs = 2
"#;
    let parsed: FileConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(parsed.port, Some(9000));
    assert_eq!(parsed.name.as_deref(), Some("Living Room"));
    let config = Config::resolve(Some(parsed), &make_args(None, None));
    assert_eq!(config.network_interface.as_deref(), Some("eth0"));
    assert_eq!(config.max_request_body, 1024);
    assert_eq!(config.shutdown_grace, Duration::from_secs(2));
}

#[test]
fn test_toml_unknown_fields_ignored() {
    // Future keys must not break parsing
    let toml_str = "port = 9000\nunknown_future_key = true\n";
    let parsed: Result<FileConfig, _> = toml::from_str(toml_str);
    assert!(parsed.is_ok());
}

#[test]
fn test_zero_worker_threads_falls_back_to_default() {
    let file = FileConfig { worker_threads: Some(0), ..FileConfig::default() };
    let config = Config::resolve(Some(file), &make_args(None, None));
    assert!(config.worker_threads >= 1);
}

#[test]
fn test_server_config_carries_ip_filter() {
    let mut args = make_args(None, None);
    args.ip_filter = Some("10.0.0.1".into());
    let server = Config::resolve(None, &args).server_config();
    assert!(server.ip_filter.allowed("10.0.0.1".parse().unwrap()));
    assert!(!server.ip_filter.allowed("10.0.0.2".parse().unwrap()));
}
