use std::path::PathBuf;

use clap::Parser;

use super::Cli;
use crate::config::{OutputFormat, Settings};

#[test]
fn test_flags_override_settings() {
    let cli = Cli::try_parse_from([
        "popbench",
        "--broker",
        "wss://broker:443",
        "--topic-count",
        "3",
        "--publishers",
        "2",
        "--message-interval",
        "0",
        "--format",
        "json",
        "--quiet",
        "--client-cert",
        "c.pem",
        "--client-key",
        "k.pem",
    ])
    .unwrap();

    let mut settings = Settings::default();
    cli.apply(&mut settings);

    assert_eq!(settings.broker.url, "wss://broker:443");
    assert_eq!(settings.load.topic_count, 3);
    assert_eq!(settings.load.publishers, 2);
    assert_eq!(settings.load.message_interval_ms, 0);
    assert_eq!(settings.output.format, OutputFormat::Json);
    assert!(settings.output.quiet);
    assert_eq!(settings.broker.client_cert, Some(PathBuf::from("c.pem")));
    assert_eq!(settings.broker.client_key, Some(PathBuf::from("k.pem")));
}

#[test]
fn test_absent_flags_keep_settings() {
    let cli = Cli::try_parse_from(["popbench"]).unwrap();
    let mut settings = Settings::default();
    settings.load.count = 42;
    cli.apply(&mut settings);

    assert_eq!(settings.load.count, 42);
    assert_eq!(settings.broker.topic, "/test");
    assert!(!settings.broker.insecure);
}

#[test]
fn test_qos_out_of_range_is_rejected() {
    assert!(Cli::try_parse_from(["popbench", "--qos", "3"]).is_err());
}

#[test]
fn test_unknown_format_is_rejected() {
    assert!(Cli::try_parse_from(["popbench", "--format", "xml"]).is_err());
}
