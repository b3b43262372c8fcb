//! System configuration with sensible defaults.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::mailbox::OverflowPolicy;
use crate::supervisor::SupervisionStrategy;
use crate::util::serde_helpers::duration_millis;
use crate::util::LOCAL_NODE;

/// Default capacity for actor mailboxes.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Default deadline for ask replies (5 seconds).
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default budget for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default ttl for directory records and cache entries (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(300_000);

/// Default bound on the directory cache.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 10_000;

/// Default interval for the directory/correlation sweeper (1 minute).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_millis(60_000);

/// Default restart budget per child within the restart window.
pub const DEFAULT_MAX_RESTARTS: u32 = 3;

/// Default sliding window for restart throttling (1 minute).
pub const DEFAULT_RESTART_WINDOW: Duration = Duration::from_millis(60_000);

/// Default delay before a restarted child comes back (1 second).
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(1000);

/// Directory section of the system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Ttl for registry records and cache entries.
    #[serde(with = "duration_millis")]
    pub cache_ttl: Duration,

    /// Upper bound on cache entries; least-recently-accessed evict first.
    pub max_cache_size: usize,

    /// Interval of the scheduler-driven expiry sweep.
    #[serde(with = "duration_millis")]
    pub cleanup_interval: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

/// Supervision section of the system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisionConfig {
    /// Strategy of the root supervisor.
    pub strategy: SupervisionStrategy,

    /// Restarts allowed per child within the window before a forced stop.
    pub max_restarts: u32,

    /// Sliding window for restart throttling.
    #[serde(with = "duration_millis")]
    pub restart_window: Duration,

    /// Delay before a restarted child starts again.
    #[serde(with = "duration_millis")]
    pub restart_delay: Duration,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            strategy: SupervisionStrategy::Restart,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_window: DEFAULT_RESTART_WINDOW,
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }
}

/// System-wide configuration.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use lattice_rt::system::SystemConfig;
///
/// let config = SystemConfig::default();
/// assert_eq!(config.mailbox_capacity, 1024);
///
/// let config = SystemConfig::builder()
///     .with_node_address("node-a")
///     .with_mailbox_capacity(256)
///     .with_ask_timeout(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// assert_eq!(config.node_address, "node-a");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Node name stamped into spawned addresses; `"local"` means unset.
    pub node_address: String,

    /// Default mailbox capacity for spawns that do not override it.
    pub mailbox_capacity: usize,

    /// Default overflow policy for spawns that do not override it.
    pub mailbox_overflow: OverflowPolicy,

    /// Default ask deadline.
    #[serde(with = "duration_millis")]
    pub ask_timeout: Duration,

    /// Budget for graceful shutdown of all actors.
    #[serde(with = "duration_millis")]
    pub shutdown_timeout: Duration,

    /// Directory settings.
    pub directory: DirectoryConfig,

    /// Supervision settings (applied to the root supervisor and to nodes
    /// created without explicit settings).
    pub supervision: SupervisionConfig,

    /// Development mode: enables diagnostics such as the missing-reply
    /// warning for correlated messages.
    pub dev_mode: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            node_address: LOCAL_NODE.to_string(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            mailbox_overflow: OverflowPolicy::DropNewest,
            ask_timeout: DEFAULT_ASK_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            directory: DirectoryConfig::default(),
            supervision: SupervisionConfig::default(),
            dev_mode: false,
        }
    }
}

impl SystemConfig {
    /// Create a configuration builder.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.node_address.is_empty() {
            return Err("node_address must not be empty".to_string());
        }
        if self.node_address.contains('/') {
            return Err("node_address must not contain '/'".to_string());
        }
        if self.mailbox_capacity == 0 {
            return Err("mailbox_capacity must be > 0".to_string());
        }
        if self.ask_timeout.is_zero() {
            return Err("ask_timeout must be > 0".to_string());
        }
        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be > 0".to_string());
        }
        if self.directory.max_cache_size == 0 {
            return Err("directory.max_cache_size must be > 0".to_string());
        }
        if self.directory.cleanup_interval.is_zero() {
            return Err("directory.cleanup_interval must be > 0".to_string());
        }
        Ok(())
    }
}

/// Fluent builder for [`SystemConfig`].
#[derive(Debug, Default)]
pub struct SystemConfigBuilder {
    config: SystemConfig,
}

impl SystemConfigBuilder {
    /// Set the node name stamped into spawned addresses.
    pub fn with_node_address(mut self, node_address: impl Into<String>) -> Self {
        self.config.node_address = node_address.into();
        self
    }

    /// Set the default mailbox capacity.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.mailbox_capacity = capacity;
        self
    }

    /// Set the default mailbox overflow policy.
    pub fn with_mailbox_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.config.mailbox_overflow = policy;
        self
    }

    /// Set the default ask deadline.
    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.config.ask_timeout = timeout;
        self
    }

    /// Set the graceful-shutdown budget.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Replace the directory section.
    pub fn with_directory(mut self, directory: DirectoryConfig) -> Self {
        self.config.directory = directory;
        self
    }

    /// Replace the supervision section.
    pub fn with_supervision(mut self, supervision: SupervisionConfig) -> Self {
        self.config.supervision = supervision;
        self
    }

    /// Enable development-mode diagnostics.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.dev_mode = dev_mode;
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<SystemConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}
