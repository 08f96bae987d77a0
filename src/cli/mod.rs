//! Command line for `popbench`.
//!
//! Every flag is optional; a flag that is given overrides the value loaded
//! from `config/default.*` and the `POPBENCH_*` environment.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{OutputFormat, Settings};

#[derive(Debug, Default, Parser)]
#[command(name = "popbench", version, about = "Load and latency benchmark for pub/sub brokers")]
pub struct Cli {
    /// Broker endpoint as scheme://host:port (ws, wss or memory)
    #[arg(long)]
    pub broker: Option<String>,

    /// Base topic; topic n is `<topic>-<n>`
    #[arg(long)]
    pub topic: Option<String>,

    /// Text carried after the timestamp; empty means sized by --size
    #[arg(long)]
    pub payload: Option<String>,

    /// Broker username (empty if auth is disabled)
    #[arg(long)]
    pub username: Option<String>,

    /// Broker password (empty if auth is disabled)
    #[arg(long)]
    pub password: Option<String>,

    /// QoS for published messages
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: Option<u8>,

    /// Publish acknowledgement timeout in milliseconds
    #[arg(long)]
    pub wait: Option<u64>,

    /// Payload size in bytes; 0 picks a random size per message
    #[arg(long)]
    pub size: Option<usize>,

    /// Messages per publisher
    #[arg(long)]
    pub count: Option<usize>,

    #[arg(long = "topic-count")]
    pub topic_count: Option<usize>,

    /// Publishers per topic
    #[arg(long)]
    pub publishers: Option<usize>,

    /// Subscribers per topic
    #[arg(long)]
    pub subscribers: Option<usize>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Only log warnings and errors while running
    #[arg(long)]
    pub quiet: bool,

    /// Client certificate in PEM format
    #[arg(long = "client-cert")]
    pub client_cert: Option<PathBuf>,

    /// Client private key in PEM format
    #[arg(long = "client-key")]
    pub client_key: Option<PathBuf>,

    /// Broker CA certificate in PEM format
    #[arg(long = "broker-ca-cert")]
    pub broker_ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Seconds over which each role's workers are started
    #[arg(long = "ramp-up-time")]
    pub ramp_up_time: Option<u64>,

    /// Milliseconds between two publishes; 0 publishes back to back
    #[arg(long = "message-interval")]
    pub message_interval: Option<u64>,

    /// Milliseconds to wait before starting any worker
    #[arg(long = "start-delay")]
    pub start_delay: Option<u64>,

    /// Seed for random payload sizes instead of the worker id
    #[arg(long)]
    pub seed: Option<u64>,

    /// User on the broker host, for remote resource sampling over ssh.
    /// Needs `sshpass` and `ssh` on this machine's PATH.
    #[arg(long = "remote-user")]
    pub remote_user: Option<String>,

    #[arg(long = "remote-pwd", env = "POPBENCH_REMOTE_PWD", hide_env_values = true)]
    pub remote_pwd: Option<String>,

    #[arg(long = "remote-port")]
    pub remote_port: Option<u16>,
}

impl Cli {
    /// Overlay the flags that were given onto `settings`.
    pub fn apply(self, settings: &mut Settings) {
        let broker = &mut settings.broker;
        set(&mut broker.url, self.broker);
        set(&mut broker.topic, self.topic);
        set(&mut broker.username, self.username);
        set(&mut broker.password, self.password);
        set(&mut broker.qos, self.qos);
        set(&mut broker.wait_timeout_ms, self.wait);
        if self.client_cert.is_some() {
            broker.client_cert = self.client_cert;
        }
        if self.client_key.is_some() {
            broker.client_key = self.client_key;
        }
        if self.broker_ca_cert.is_some() {
            broker.ca_cert = self.broker_ca_cert;
        }
        broker.insecure |= self.insecure;

        let load = &mut settings.load;
        set(&mut load.payload, self.payload);
        set(&mut load.size, self.size);
        set(&mut load.count, self.count);
        set(&mut load.topic_count, self.topic_count);
        set(&mut load.publishers, self.publishers);
        set(&mut load.subscribers, self.subscribers);
        set(&mut load.ramp_up_secs, self.ramp_up_time);
        set(&mut load.message_interval_ms, self.message_interval);
        set(&mut load.start_delay_ms, self.start_delay);
        if self.seed.is_some() {
            load.seed = self.seed;
        }

        let remote = &mut settings.remote;
        set(&mut remote.user, self.remote_user);
        set(&mut remote.password, self.remote_pwd);
        set(&mut remote.port, self.remote_port);

        set(&mut settings.output.format, self.format);
        settings.output.quiet |= self.quiet;
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[cfg(test)]
mod tests;
