use super::*;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.url, "ws://localhost:8080");
    assert_eq!(settings.broker.topic, "/test");
    assert_eq!(settings.broker.qos, 1);
    assert_eq!(settings.broker.wait_timeout_ms, 60_000);
    assert_eq!(settings.load.topic_count, 10);
    assert_eq!(settings.load.count, 100);
    assert_eq!(settings.load.size, 0);
    assert_eq!(settings.load.message_interval_ms, 1000);
    assert_eq!(settings.load.subscriber_timeout_secs, 15);
    assert_eq!(settings.remote.port, 22);
    assert_eq!(settings.output.format, OutputFormat::Text);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_validate_rejects_zero_counts() {
    let mut settings = Settings::default();
    settings.load.publishers = 0;
    assert!(matches!(
        settings.validate(),
        Err(BenchError::InvalidArgument(_))
    ));

    let mut settings = Settings::default();
    settings.load.count = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.load.topic_count = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.load.subscribers = 0;
    assert!(settings.validate().is_err());
}

#[test]
fn test_validate_requires_cert_and_key_together() {
    let mut settings = Settings::default();
    settings.broker.client_cert = Some(PathBuf::from("client.pem"));
    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("private client key"));

    settings.broker.client_cert = None;
    settings.broker.client_key = Some(PathBuf::from("client.key"));
    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("certificate path"));

    settings.broker.client_cert = Some(PathBuf::from("client.pem"));
    assert!(settings.validate().is_ok());
}

#[test]
fn test_stagger_divides_ramp_up_by_fleet_size() {
    let mut settings = Settings::default();
    settings.load.ramp_up_secs = 10;
    assert_eq!(settings.load.stagger(4).as_millis(), 2500);
    settings.load.ramp_up_secs = 0;
    assert!(settings.load.stagger(4).is_zero());
}

#[test]
fn test_partial_merge_keeps_defaults_for_missing_values() {
    let partial = PartialSettings {
        load: Some(PartialLoadSettings {
            count: Some(7),
            seed: Some(42),
            ..Default::default()
        }),
        ..Default::default()
    };
    let merged = partial.merge(Settings::default());
    assert_eq!(merged.load.count, 7);
    assert_eq!(merged.load.seed, Some(42));
    assert_eq!(merged.load.publishers, 1);
    assert_eq!(merged.broker.topic, "/test");
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [broker]
        url = "ws://10.0.0.5:9000"
        qos = 0

        [load]
        topic_count = 2
        publishers = 3
        message_interval_ms = 0

        [output]
        format = "json"
        quiet = true
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.broker.url, "ws://10.0.0.5:9000");
    assert_eq!(cfg.broker.qos, 0);
    assert_eq!(cfg.load.topic_count, 2);
    assert_eq!(cfg.load.publishers, 3);
    assert_eq!(cfg.load.message_interval_ms, 0);
    assert_eq!(cfg.load.count, 100);
    assert_eq!(cfg.output.format, OutputFormat::Json);
    assert!(cfg.output.quiet);
}

#[test]
#[serial]
fn test_load_config_reads_prefixed_environment() {
    temp_env::with_vars(
        [
            ("POPBENCH_LOAD__COUNT", Some("250")),
            ("POPBENCH_BROKER__TOPIC", Some("/bench")),
        ],
        || {
            let cfg = load_config_from("does/not/exist").expect("load_config failed");
            assert_eq!(cfg.load.count, 250);
            assert_eq!(cfg.broker.topic, "/bench");
        },
    );
}
