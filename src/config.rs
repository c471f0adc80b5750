// src/config.rs

//! Manages server configuration: loading, defaults, and the handful of
//! paths the daemon touches at runtime.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Server configuration, loaded from a TOML file with every field
/// defaulted, then overridden by command-line flags.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// OVSDB client socket URI, e.g. `unix:/var/run/openvswitch/db.sock`.
    #[serde(default = "default_db_uri")]
    pub db_uri: String,

    /// Rendezvous socket between the server and its agents.
    #[serde(default = "default_sock_path")]
    pub sock_path: String,

    /// Permission bits of the rendezvous socket, octal.
    #[serde(default = "default_sock_mode")]
    pub sock_mode: String,

    /// Optional group to chown the rendezvous socket to.
    #[serde(default)]
    pub sock_group: Option<String>,

    /// Data directory: startup datastore, schemas, transport datastore.
    #[serde(default = "default_datadir")]
    pub datadir: String,

    /// Configuration directory holding the sshd_config template.
    #[serde(default = "default_confdir")]
    pub confdir: String,

    /// Run directory of the switch, where the per-bridge management
    /// sockets live.
    #[serde(default = "default_rundir")]
    pub rundir: String,

    /// The SSH daemon executable spawned for the NETCONF transport.
    #[serde(default = "default_sshd_exec")]
    pub sshd_exec: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How many agent connections the server accepts at once.
    #[serde(default = "default_agent_limit")]
    pub agent_limit: usize,
}

fn default_db_uri() -> String {
    "unix:/var/run/openvswitch/db.sock".to_string()
}
fn default_sock_path() -> String {
    "/var/run/ofcd.sock".to_string()
}
fn default_sock_mode() -> String {
    "0600".to_string()
}
fn default_datadir() -> String {
    "/usr/local/etc/ofcd".to_string()
}
fn default_confdir() -> String {
    "/usr/local/etc/ofcd".to_string()
}
fn default_rundir() -> String {
    "/var/run/openvswitch".to_string()
}
fn default_sshd_exec() -> String {
    "/usr/sbin/sshd".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_agent_limit() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str("").expect("empty config deserializes via defaults")
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        Ok(config)
    }

    /// The socket permission bits, parsed from the octal string.
    pub fn sock_mode_bits(&self) -> u32 {
        u32::from_str_radix(self.sock_mode.trim_start_matches("0o"), 8).unwrap_or(0o600)
    }
}
