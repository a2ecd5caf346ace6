// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol constants and server configuration.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: protocol constants (UA TCP version, minimum buffer
//!   sizes, well-known URIs, default port).
//! - **Level 2 (Runtime)**: [`ServerConfig`], a plain struct with defaults
//!   for every limit. With the `config-loaders` feature it can be read from
//!   YAML:
//!
//! ```yaml
//! application_uri: urn:example:server
//! port: 4840
//! channel:
//!   max_channels: 10
//! subscription:
//!   min_publishing_interval_ms: 50.0
//! execution:
//!   multi_threaded:
//!     workers: 4
//! users:
//!   - username: operator
//!     password: secret
//! ```

use crate::error::{Error, Result};
use std::time::Duration;

// =======================================================================
// UA TCP / UA Secure Conversation (Part 6 Sec.7)
// =======================================================================

/// UA TCP protocol version spoken by this stack.
pub const PROTOCOL_VERSION: u32 = 0;

/// Smallest receive/send buffer a peer may announce in HEL/ACK.
pub const MIN_BUFFER_SIZE: u32 = 8192;

/// Smallest valid message: 8-byte header plus the shortest body.
pub const MIN_MESSAGE_SIZE: usize = 16;

/// IANA registered OPC UA port.
pub const DEFAULT_PORT: u16 = 4840;

/// Lower bound of any repeated job interval.
pub const MIN_JOB_INTERVAL: Duration = Duration::from_millis(5);

/// Security policy `None`, the only policy supported.
pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

pub const TRANSPORT_PROFILE_URI: &str =
    "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary";

/// Policy ids announced in endpoint descriptions.
pub const ANONYMOUS_POLICY_ID: &str = "anonymous";
pub const USERNAME_POLICY_ID: &str = "username_basic";

// =======================================================================
// Runtime configuration
// =======================================================================

/// Buffer sizes offered in ACK. Effective values are the minimum of these
/// and what the client announced in HEL. 0 means unlimited for the last two.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct TransportLimits {
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 16 * 1024 * 1024,
            max_chunk_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ChannelLimits {
    pub max_channels: usize,
    pub min_token_lifetime_ms: u32,
    pub max_token_lifetime_ms: u32,
    /// Reject inbound sequence numbers that do not increase by exactly one.
    pub strict_sequence_numbers: bool,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            max_channels: 100,
            min_token_lifetime_ms: 10_000,
            max_token_lifetime_ms: 3_600_000,
            strict_sequence_numbers: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub min_session_timeout_ms: f64,
    pub max_session_timeout_ms: f64,
    pub max_continuation_points: usize,
    /// Server-side cap on references per Browse result; 0 means none.
    pub max_references_per_node: u32,
    /// Upper bound on items in one batched request.
    pub max_nodes_per_request: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            min_session_timeout_ms: 10.0,
            max_session_timeout_ms: 3_600_000.0,
            max_continuation_points: 5,
            max_references_per_node: 0,
            max_nodes_per_request: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SubscriptionLimits {
    pub max_subscriptions_per_session: usize,
    pub min_publishing_interval_ms: f64,
    pub max_publishing_interval_ms: f64,
    pub min_keep_alive_count: u32,
    pub max_keep_alive_count: u32,
    pub max_lifetime_count: u32,
    /// Server cap applied when the client asks for 0 (no limit).
    pub max_notifications_per_publish: u32,
    pub max_publish_requests_per_session: usize,
    pub max_retransmission_queue_size: usize,
    pub max_monitored_items_per_subscription: usize,
    pub min_sampling_interval_ms: f64,
    pub max_sampling_interval_ms: f64,
    pub max_queue_size: u32,
}

impl Default for SubscriptionLimits {
    fn default() -> Self {
        Self {
            max_subscriptions_per_session: 100,
            min_publishing_interval_ms: 10.0,
            max_publishing_interval_ms: 3_600_000.0,
            min_keep_alive_count: 1,
            max_keep_alive_count: 100_000,
            max_lifetime_count: 150_000,
            max_notifications_per_publish: 1_000,
            max_publish_requests_per_session: 10,
            max_retransmission_queue_size: 10,
            max_monitored_items_per_subscription: 10_000,
            min_sampling_interval_ms: 5.0,
            max_sampling_interval_ms: 3_600_000.0,
            max_queue_size: 100,
        }
    }
}

/// How request bodies are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ExecutionMode {
    /// Everything runs on the thread driving the server.
    #[default]
    SingleThreaded,
    /// Request bodies are decoded on a worker pool; processing order is unchanged.
    MultiThreaded { workers: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
pub struct UserCredential {
    pub username: String,
    pub password: String,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ServerConfig {
    pub application_uri: String,
    pub product_uri: String,
    pub application_name: String,
    pub manufacturer_name: String,
    pub software_version: String,
    /// Host name announced in endpoint URLs.
    pub host: String,
    pub bind_address: String,
    pub port: u16,
    pub transport: TransportLimits,
    pub channel: ChannelLimits,
    pub session: SessionLimits,
    pub subscription: SubscriptionLimits,
    pub execution: ExecutionMode,
    pub allow_anonymous: bool,
    pub users: Vec<UserCredential>,
    /// Period of the channel/session sweep job.
    pub housekeeping_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_uri: "urn:opcua-stack:server".to_string(),
            product_uri: "https://git.hdds.io/hdds/opcua-stack".to_string(),
            application_name: "opcua-stack server".to_string(),
            manufacturer_name: "naskel.com".to_string(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            host: "localhost".to_string(),
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            transport: TransportLimits::default(),
            channel: ChannelLimits::default(),
            session: SessionLimits::default(),
            subscription: SubscriptionLimits::default(),
            execution: ExecutionMode::default(),
            allow_anonymous: true,
            users: Vec::new(),
            housekeeping_interval_ms: 1_000,
        }
    }
}

impl ServerConfig {
    /// `opc.tcp://host:port` as announced to clients.
    pub fn endpoint_url(&self) -> String {
        format!("opc.tcp://{}:{}", self.host, self.port)
    }

    /// Check limits for consistency.
    pub fn validate(&self) -> Result<()> {
        let t = &self.transport;
        if t.receive_buffer_size < MIN_BUFFER_SIZE || t.send_buffer_size < MIN_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "transport buffers must be at least {} bytes",
                MIN_BUFFER_SIZE
            )));
        }
        if self.channel.max_channels == 0 {
            return Err(Error::Config("max_channels must be > 0".to_string()));
        }
        if self.channel.min_token_lifetime_ms > self.channel.max_token_lifetime_ms {
            return Err(Error::Config(
                "min_token_lifetime_ms exceeds max_token_lifetime_ms".to_string(),
            ));
        }
        let s = &self.session;
        if s.max_sessions == 0 {
            return Err(Error::Config("max_sessions must be > 0".to_string()));
        }
        if s.min_session_timeout_ms > s.max_session_timeout_ms {
            return Err(Error::Config(
                "min_session_timeout_ms exceeds max_session_timeout_ms".to_string(),
            ));
        }
        let sub = &self.subscription;
        let intervals = [
            sub.min_publishing_interval_ms,
            sub.max_publishing_interval_ms,
            sub.min_sampling_interval_ms,
            sub.max_sampling_interval_ms,
        ];
        if intervals.iter().any(|ms| !ms.is_finite()) {
            return Err(Error::Config(
                "subscription intervals must be finite".to_string(),
            ));
        }
        if sub.min_publishing_interval_ms > sub.max_publishing_interval_ms
            || sub.min_sampling_interval_ms > sub.max_sampling_interval_ms
            || sub.min_keep_alive_count > sub.max_keep_alive_count
        {
            return Err(Error::Config(
                "subscription limits have min above max".to_string(),
            ));
        }
        if (sub.min_publishing_interval_ms as u128) < MIN_JOB_INTERVAL.as_millis()
            || (sub.min_sampling_interval_ms as u128) < MIN_JOB_INTERVAL.as_millis()
        {
            return Err(Error::Config(format!(
                "intervals below {} ms are not supported",
                MIN_JOB_INTERVAL.as_millis()
            )));
        }
        if sub.max_queue_size == 0 || sub.max_retransmission_queue_size == 0 {
            return Err(Error::Config("queue sizes must be > 0".to_string()));
        }
        if let ExecutionMode::MultiThreaded { workers: 0 } = self.execution {
            return Err(Error::Config("worker count must be > 0".to_string()));
        }
        if !self.allow_anonymous && self.users.is_empty() {
            return Err(Error::Config(
                "no identity policy left: anonymous disabled and no users".to_string(),
            ));
        }
        Ok(())
    }

    /// Password check for the username/password identity policy.
    pub fn check_user(&self, username: &str, password: &[u8]) -> bool {
        self.users
            .iter()
            .any(|u| u.username == username && u.password.as_bytes() == password)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_millis(self.housekeeping_interval_ms).max(MIN_JOB_INTERVAL)
    }
}

#[cfg(feature = "config-loaders")]
impl ServerConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ServerConfig = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigFileNotFound(path.display().to_string()));
        }
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize YAML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.endpoint_url(), "opc.tcp://localhost:4840");
    }

    #[test]
    fn test_rejects_small_buffers() {
        let mut config = ServerConfig::default();
        config.transport.receive_buffer_size = 1024;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_infinite_intervals() {
        let mut config = ServerConfig::default();
        config.subscription.max_sampling_interval_ms = f64::INFINITY;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let config = ServerConfig {
            execution: ExecutionMode::MultiThreaded { workers: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_check_user() {
        let config = ServerConfig {
            users: vec![UserCredential {
                username: "op".into(),
                password: "pw".into(),
            }],
            ..Default::default()
        };
        assert!(config.check_user("op", b"pw"));
        assert!(!config.check_user("op", b"nope"));
        assert!(!config.check_user("other", b"pw"));
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_yaml_partial_document() {
        let yaml = r#"
application_uri: urn:test
port: 4841
channel:
  max_channels: 3
execution:
  multi_threaded:
    workers: 2
users:
  - username: operator
    password: secret
"#;
        let config = ServerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.application_uri, "urn:test");
        assert_eq!(config.port, 4841);
        assert_eq!(config.channel.max_channels, 3);
        assert_eq!(config.channel.max_token_lifetime_ms, 3_600_000);
        assert_eq!(config.execution, ExecutionMode::MultiThreaded { workers: 2 });
        assert!(config.check_user("operator", b"secret"));
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_yaml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.yaml");
        let config = ServerConfig {
            port: 4999,
            ..Default::default()
        };
        std::fs::write(&path, config.to_yaml_string().unwrap()).unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap(), config);
        assert!(matches!(
            ServerConfig::load(dir.path().join("missing.yaml")),
            Err(Error::ConfigFileNotFound(_))
        ));
    }
}
