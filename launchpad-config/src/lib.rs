//! Configuration used within Launchpad.
//!
//! A few notes on the structure of this crate.
//!
//! * Configuration objects are typically considered immutable and are only able
//!   to be constructed programmatically through the use of one of the builders
//!   or loaded from TOML sources.
//! * Every section has sensible defaults, so an empty file is a valid
//!   configuration.

use std::path::Path;

use anyhow::bail;
use bon::Builder;
use figment::Figment;
use figment::providers::Format;
use figment::providers::Toml;
use serde::Deserialize;
use serde::Serialize;

pub mod ceilings;
pub mod session;

pub use ceilings::Ceilings;
pub use session::Mounts;
pub use session::Ports;
pub use session::Refresh;
pub use session::Session;

/// The file name used when looking for configuration files for Launchpad.
pub const FILE_NAME: &str = "launchpad.toml";

/// The environment variable pointing at an extra configuration file.
pub const CONFIG_ENV_VAR: &str = "LAUNCHPAD_CONFIG";

/// A global configuration object for Launchpad.
///
/// When loading, the default sources that are automatically included are:
///
/// * `<CONFIG DIR>/launchpad/launchpad.toml`.
/// * `<CWD>/launchpad.toml`.
/// * If the environment variable is present, the file pointed to by
///   `LAUNCHPAD_CONFIG`.
///
/// Notably, a configuration object may not be valid. You'll need to use the
/// [`validate()`](Config::validate) method to ensure the config is valid.
#[derive(Builder, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[builder(builder_type = Builder)]
pub struct Config {
    /// The platform-wide hard ceilings.
    #[serde(default)]
    #[builder(default)]
    ceilings: Ceilings,

    /// The pre-open port settings.
    #[serde(default)]
    #[builder(default)]
    ports: Ports,

    /// The mount settings.
    #[serde(default)]
    #[builder(default)]
    mounts: Mounts,

    /// The session creation defaults.
    #[serde(default)]
    #[builder(default)]
    session: Session,

    /// The background refresh settings.
    #[serde(default)]
    #[builder(default)]
    refresh: Refresh,
}

impl Config {
    /// Validates the configuration object.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.ceilings.validate()?;
        self.session.validate()?;
        self.refresh.validate()?;

        if self.ports.max_count() == 0 {
            bail!("`ports.max-count` must be at least 1");
        }

        if !self.mounts.home().starts_with('/') {
            bail!(
                "`mounts.home` must be an absolute path (found `{}`)",
                self.mounts.home()
            );
        }

        Ok(())
    }

    /// Gets the hard ceilings.
    pub fn ceilings(&self) -> &Ceilings {
        &self.ceilings
    }

    /// Gets the pre-open port settings.
    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    /// Gets the mount settings.
    pub fn mounts(&self) -> &Mounts {
        &self.mounts
    }

    /// Gets the session creation defaults.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Gets the background refresh settings.
    pub fn refresh(&self) -> &Refresh {
        &self.refresh
    }

    /// Gets a builder with the default sources preloaded.
    pub fn default_sources() -> Figment {
        let mut builder = Figment::new();

        if let Some(config_home) = dirs::config_dir() {
            builder = builder.admerge(Toml::file(config_home.join("launchpad").join(FILE_NAME)));
        }

        if let Ok(mut path) = std::env::current_dir() {
            path.push(FILE_NAME);
            builder = builder.admerge(Toml::file(path));
        }

        if let Ok(config_file) = std::env::var(CONFIG_ENV_VAR) {
            tracing::debug!("loading additional configuration from `{config_file}`");
            builder = builder.admerge(Toml::file(config_file));
        }

        builder
    }

    /// Loads a [`Config`] from the default set of sources.
    pub fn load() -> figment::Result<Self> {
        Self::default_sources().extract()
    }

    /// Loads the global configuration from a set of sources.
    ///
    /// The default set of sources are loaded first (see the docs for [`Config`]
    /// for the listed default sources). After that, any sources provided in the
    /// `paths` argument is searched.
    pub fn load_with_paths<I, S>(paths: I) -> figment::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        let mut builder = Self::default_sources();

        for path in paths {
            builder = builder.admerge(Toml::file(path.as_ref()));
        }

        builder.extract()
    }

    /// Loads a config from a test fixture.
    #[cfg(test)]
    pub fn fixture(path: impl AsRef<Path>) -> figment::Result<Self> {
        use std::path::PathBuf;

        let mut full_path = PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/test/fixtures/config/",
        ));

        full_path.push(path);

        Figment::new().admerge(Toml::file(full_path)).extract()
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn loading_file_holds_valid_fields() {
        let config = Config::fixture("example.toml").unwrap();
        config.validate().unwrap();

        assert_eq!(config.ceilings().cpu(), 32.0);
        assert_eq!(config.ceilings().accelerator("cuda.shares"), Some(4.0));
        assert_eq!(config.ports().max_count(), 5);
        assert_eq!(config.session().architecture(), "aarch64");
        assert_eq!(config.session().timeout_ms(), 60_000);
        assert_eq!(config.mounts().home(), "/home/work");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::fixture("empty.toml").unwrap();
        config.validate().unwrap();
        assert_eq!(config.ports().max_count(), 10);
        assert_eq!(config.session().max_sessions_per_launch(), 3);
        assert_eq!(config.refresh().interval().as_secs(), 30);
        assert_eq!(config.ceilings().shmem(), 2.0);
    }

    #[test]
    fn relative_mount_home() {
        let config = Config::fixture("relative_home.toml").unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "`mounts.home` must be an absolute path (found `work`)"
        );
    }

    #[test]
    fn zero_refresh_interval() {
        let config = Config::fixture("zero_refresh.toml").unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "`refresh.interval-secs` must be at least 1");
    }

    #[test]
    fn invalid_name_prefix() {
        let config = Config::fixture("invalid_prefix.toml").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("found `my sess`"), "{err}");
    }

    #[test]
    fn presets_only_switch() {
        let config = Config::fixture("presets_only.toml").unwrap();
        config.validate().unwrap();
        assert!(!config.session().allow_custom_resource_allocation());
        assert!(Config::default().session().allow_custom_resource_allocation());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::fixture("unknown_field.toml").is_err());
    }

    #[test]
    fn environment_variable_adds_a_source() {
        Jail::expect_with(|jail| {
            jail.create_file("extra.toml", "[ports]\nmax-count = 2\n")?;
            jail.set_env(CONFIG_ENV_VAR, "extra.toml");

            let config = Config::load()?;
            assert_eq!(config.ports().max_count(), 2);
            Ok(())
        });
    }
}
