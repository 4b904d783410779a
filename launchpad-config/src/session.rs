//! Configuration for session creation, mounts, ports and refreshes.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use anyhow::bail;
use bon::Builder;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

/// The default timeout for a single session creation call (in milliseconds).
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// The default image architecture.
const DEFAULT_ARCHITECTURE: &str = "x86_64";

/// The default number of sessions that can be launched at once.
const DEFAULT_MAX_SESSIONS_PER_LAUNCH: u32 = 3;

/// The default prefix for generated session names.
const DEFAULT_NAME_PREFIX: &str = "sess";

/// The characters a generated name prefix may contain.
static NAME_PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: this is checked statically with tests to always unwrap.
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").unwrap()
});

/// Session creation defaults.
#[derive(Builder, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
#[builder(builder_type = Builder)]
pub struct Session {
    /// The timeout handed to the broker for each creation call.
    #[builder(default = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// The architecture used when an image does not declare one.
    #[builder(into, default = DEFAULT_ARCHITECTURE.to_string())]
    architecture: String,

    /// The maximum number of sessions launched from a single submission.
    #[builder(default = DEFAULT_MAX_SESSIONS_PER_LAUNCH)]
    max_sessions_per_launch: u32,

    /// The prefix used for generated session names.
    #[builder(into, default = DEFAULT_NAME_PREFIX.to_string())]
    name_prefix: String,

    /// Whether users may set resource values by hand.
    ///
    /// When disabled, resources can only be chosen through presets.
    #[builder(default = true)]
    allow_custom_resource_allocation: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            architecture: DEFAULT_ARCHITECTURE.to_string(),
            max_sessions_per_launch: DEFAULT_MAX_SESSIONS_PER_LAUNCH,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            allow_custom_resource_allocation: true,
        }
    }
}

impl Session {
    /// Gets the creation timeout in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Gets the default architecture.
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Gets the maximum number of sessions per launch.
    pub fn max_sessions_per_launch(&self) -> u32 {
        self.max_sessions_per_launch
    }

    /// Gets the generated name prefix.
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Whether users may set resource values by hand.
    pub fn allow_custom_resource_allocation(&self) -> bool {
        self.allow_custom_resource_allocation
    }

    /// Validates the session defaults.
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions_per_launch == 0 {
            bail!("`max-sessions-per-launch` must be at least 1");
        }

        if self.name_prefix.is_empty() {
            bail!("`name-prefix` must not be empty");
        }

        if !NAME_PREFIX_PATTERN.is_match(&self.name_prefix) {
            bail!(
                "`name-prefix` must start with a letter or a digit and only contain letters, \
                 digits, `.`, `_` and `-` (found `{}`)",
                self.name_prefix
            );
        }

        Ok(())
    }
}

/// The default maximum number of pre-open ports.
const DEFAULT_MAX_PORTS: usize = 10;

/// Pre-open port settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Ports {
    /// The maximum number of pre-open ports per session.
    max_count: usize,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_PORTS,
        }
    }
}

impl Ports {
    /// Creates port settings with the given maximum count.
    pub fn new(max_count: usize) -> Self {
        Self { max_count }
    }

    /// Gets the maximum number of pre-open ports.
    pub fn max_count(&self) -> usize {
        self.max_count
    }
}

/// The default directory folders are mounted under.
const DEFAULT_MOUNT_HOME: &str = "/home/work";

/// Mount settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Mounts {
    /// The directory relative aliases and unaliased folders resolve under.
    home: String,
}

impl Default for Mounts {
    fn default() -> Self {
        Self {
            home: DEFAULT_MOUNT_HOME.to_string(),
        }
    }
}

impl Mounts {
    /// Creates mount settings rooted at `home`.
    pub fn new(home: impl Into<String>) -> Self {
        Self { home: home.into() }
    }

    /// Gets the mount home directory.
    pub fn home(&self) -> &str {
        &self.home
    }
}

/// The default number of seconds between background resource refreshes.
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

/// Background refresh settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Refresh {
    /// The number of seconds between resource policy refreshes.
    interval_secs: u64,
}

impl Default for Refresh {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl Refresh {
    /// Creates refresh settings with the given interval.
    pub fn new(interval_secs: u64) -> Self {
        Self { interval_secs }
    }

    /// Gets the refresh interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validates the refresh settings.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("`refresh.interval-secs` must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_prefix_rules() {
        for prefix in ["sess", "my.sess", "a", "9_lives-"] {
            let session = Session::builder().name_prefix(prefix).build();
            assert!(session.validate().is_ok(), "`{prefix}` should be accepted");
        }

        for prefix in ["my sess", "-x", ".hidden", "sess/1", "séance"] {
            let session = Session::builder().name_prefix(prefix).build();
            assert!(session.validate().is_err(), "`{prefix}` should be rejected");
        }
    }

    #[test]
    fn custom_resource_allocation_is_allowed_by_default() {
        assert!(Session::default().allow_custom_resource_allocation());
        assert!(
            !Session::builder()
                .allow_custom_resource_allocation(false)
                .build()
                .allow_custom_resource_allocation()
        );
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        let err = Refresh::new(0).validate().unwrap_err();
        assert_eq!(err.to_string(), "`refresh.interval-secs` must be at least 1");
        Refresh::new(1).validate().unwrap();
    }
}
