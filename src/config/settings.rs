use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for one benchmark run.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub load: LoadSettings,
    pub remote: RemoteSettings,
    pub output: OutputSettings,
}

/// Where to connect and how to talk to the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub url: String,
    /// Base topic; each fleet uses `<topic>-<n>`.
    pub topic: String,
    pub username: String,
    pub password: String,
    pub qos: u8,
    /// How long a publish may wait for its acknowledgement.
    pub wait_timeout_ms: u64,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub ca_cert: Option<PathBuf>,
    pub insecure: bool,
}

/// Shape of the generated load.
#[derive(Debug, Deserialize, Clone)]
pub struct LoadSettings {
    pub topic_count: usize,
    pub publishers: usize,
    pub subscribers: usize,
    /// Messages per publisher.
    pub count: usize,
    /// Fixed payload size in bytes; 0 draws a random size per message.
    pub size: usize,
    /// Optional text carried after the timestamp prefix.
    pub payload: String,
    pub message_interval_ms: u64,
    pub ramp_up_secs: u64,
    pub subscriber_timeout_secs: u64,
    pub start_delay_ms: u64,
    /// Overrides the seed derived from the publisher id.
    pub seed: Option<u64>,
}

/// Credentials for sampling resource usage on the broker host.
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteSettings {
    pub user: String,
    pub password: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl LoadSettings {
    pub fn message_interval(&self) -> Duration {
        Duration::from_millis(self.message_interval_ms)
    }

    pub fn subscriber_timeout(&self) -> Duration {
        Duration::from_secs(self.subscriber_timeout_secs)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    /// Delay between two spawns of the same role.
    pub fn stagger(&self, fleet_size: usize) -> Duration {
        Duration::from_secs_f64(self.ramp_up_secs as f64 / fleet_size.max(1) as f64)
    }

    /// Messages each subscriber on a topic should see.
    pub fn expected_per_subscriber(&self) -> usize {
        self.publishers * self.count
    }
}

impl BrokerSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn topic_for(&self, index: usize) -> String {
        format!("{}-{}", self.topic, index)
    }
}

/// Partial configuration loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub load: Option<PartialLoadSettings>,
    pub remote: Option<PartialRemoteSettings>,
    pub output: Option<PartialOutputSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub url: Option<String>,
    pub topic: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: Option<u8>,
    pub wait_timeout_ms: Option<u64>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub ca_cert: Option<PathBuf>,
    pub insecure: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoadSettings {
    pub topic_count: Option<usize>,
    pub publishers: Option<usize>,
    pub subscribers: Option<usize>,
    pub count: Option<usize>,
    pub size: Option<usize>,
    pub payload: Option<String>,
    pub message_interval_ms: Option<u64>,
    pub ramp_up_secs: Option<u64>,
    pub subscriber_timeout_secs: Option<u64>,
    pub start_delay_ms: Option<u64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRemoteSettings {
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialOutputSettings {
    pub format: Option<OutputFormat>,
    pub quiet: Option<bool>,
}

impl PartialBrokerSettings {
    pub fn merge(self, base: BrokerSettings) -> BrokerSettings {
        BrokerSettings {
            url: self.url.unwrap_or(base.url),
            topic: self.topic.unwrap_or(base.topic),
            username: self.username.unwrap_or(base.username),
            password: self.password.unwrap_or(base.password),
            qos: self.qos.unwrap_or(base.qos),
            wait_timeout_ms: self.wait_timeout_ms.unwrap_or(base.wait_timeout_ms),
            client_cert: self.client_cert.or(base.client_cert),
            client_key: self.client_key.or(base.client_key),
            ca_cert: self.ca_cert.or(base.ca_cert),
            insecure: self.insecure.unwrap_or(base.insecure),
        }
    }
}

impl PartialLoadSettings {
    pub fn merge(self, base: LoadSettings) -> LoadSettings {
        LoadSettings {
            topic_count: self.topic_count.unwrap_or(base.topic_count),
            publishers: self.publishers.unwrap_or(base.publishers),
            subscribers: self.subscribers.unwrap_or(base.subscribers),
            count: self.count.unwrap_or(base.count),
            size: self.size.unwrap_or(base.size),
            payload: self.payload.unwrap_or(base.payload),
            message_interval_ms: self.message_interval_ms.unwrap_or(base.message_interval_ms),
            ramp_up_secs: self.ramp_up_secs.unwrap_or(base.ramp_up_secs),
            subscriber_timeout_secs: self
                .subscriber_timeout_secs
                .unwrap_or(base.subscriber_timeout_secs),
            start_delay_ms: self.start_delay_ms.unwrap_or(base.start_delay_ms),
            seed: self.seed.or(base.seed),
        }
    }
}

impl PartialRemoteSettings {
    pub fn merge(self, base: RemoteSettings) -> RemoteSettings {
        RemoteSettings {
            user: self.user.unwrap_or(base.user),
            password: self.password.unwrap_or(base.password),
            port: self.port.unwrap_or(base.port),
        }
    }
}

impl PartialOutputSettings {
    pub fn merge(self, base: OutputSettings) -> OutputSettings {
        OutputSettings {
            format: self.format.unwrap_or(base.format),
            quiet: self.quiet.unwrap_or(base.quiet),
        }
    }
}

impl PartialSettings {
    /// Overlay every value present here onto `base`.
    pub fn merge(self, base: Settings) -> Settings {
        Settings {
            broker: self.broker.unwrap_or_default().merge(base.broker),
            load: self.load.unwrap_or_default().merge(base.load),
            remote: self.remote.unwrap_or_default().merge(base.remote),
            output: self.output.unwrap_or_default().merge(base.output),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                url: "ws://localhost:8080".to_string(),
                topic: "/test".to_string(),
                username: String::new(),
                password: String::new(),
                qos: 1,
                wait_timeout_ms: 60_000,
                client_cert: None,
                client_key: None,
                ca_cert: None,
                insecure: false,
            },
            load: LoadSettings {
                topic_count: 10,
                publishers: 1,
                subscribers: 1,
                count: 100,
                size: 0,
                payload: String::new(),
                message_interval_ms: 1000,
                ramp_up_secs: 0,
                subscriber_timeout_secs: 15,
                start_delay_ms: 5000,
                seed: None,
            },
            remote: RemoteSettings {
                user: String::new(),
                password: String::new(),
                port: 22,
            },
            output: OutputSettings {
                format: OutputFormat::Text,
                quiet: false,
            },
        }
    }
}
