//! TOML configuration for the CLI.
//!
//! Every section is optional; an absent file means "replay everything,
//! lenient, no pauses".

use protoreplay_core::{CoreError, CoreResult};
use protoreplay_replay::{DelayHooks, MethodFilter, ReplayConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Engine settings
    pub replay: ReplayConfig,
    /// Which recorded pairs to replay
    pub filter: FilterConfig,
    /// Pauses around sends
    pub hooks: HooksConfig,
}

/// Built-in filter starting points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreset {
    /// Replay everything
    #[default]
    None,
    /// `MethodFilter::quiet`
    Quiet,
}

/// `[filter]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Preset the lists below extend
    pub preset: FilterPreset,
    /// Extra deny prefixes
    pub deny_prefixes: Vec<String>,
    /// Extra exact-name exceptions
    pub allow: Vec<String>,
}

/// `[hooks]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HooksConfig {
    /// Pause after every response, in milliseconds
    pub after_each_delay_ms: u64,
    /// Per-method pauses before sending
    pub pause: Vec<PauseConfig>,
}

/// One `[[hooks.pause]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PauseConfig {
    /// Exact method name
    pub method: String,
    /// Pause length in milliseconds
    pub delay_ms: u64,
}

impl CliConfig {
    /// Parse configuration text
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` on malformed TOML, unknown keys or
    /// an empty pause method
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(text).map_err(|err| CoreError::Config {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the file cannot be read, otherwise as
    /// [`CliConfig::from_toml_str`]
    pub async fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> CoreResult<()> {
        if let Some(pause) = self.hooks.pause.iter().find(|p| p.method.is_empty()) {
            return Err(CoreError::Config {
                reason: format!("hooks.pause entry with empty method ({} ms)", pause.delay_ms),
            });
        }
        Ok(())
    }

    /// Filter described by `[filter]`
    #[must_use]
    pub fn method_filter(&self) -> MethodFilter {
        let base = match self.filter.preset {
            FilterPreset::None => MethodFilter::new(),
            FilterPreset::Quiet => MethodFilter::quiet(),
        };
        let base = self
            .filter
            .deny_prefixes
            .iter()
            .fold(base, |filter, prefix| filter.deny_prefix(prefix.clone()));
        self.filter
            .allow
            .iter()
            .fold(base, |filter, method| filter.allow(method.clone()))
    }

    /// Pauses described by `[hooks]`
    #[must_use]
    pub fn delay_hooks(&self) -> DelayHooks {
        let hooks = DelayHooks::new()
            .pause_after_each(Duration::from_millis(self.hooks.after_each_delay_ms));
        self.hooks.pause.iter().fold(hooks, |hooks, pause| {
            hooks.pause_before(pause.method.clone(), Duration::from_millis(pause.delay_ms))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoreplay_replay::UnresolvedPolicy;
    use std::io::Write;

    const FULL: &str = r#"
[replay]
unresolved = "strict"
watch_events = ["ServiceWorker.workerRegistrationUpdated"]

[filter]
preset = "quiet"
deny_prefixes = ["Fetch."]
allow = ["Fetch.enable"]

[hooks]
after_each_delay_ms = 50

[[hooks.pause]]
method = "Page.getInstallabilityErrors"
delay_ms = 10000
"#;

    #[test]
    fn test_empty_config_is_default() {
        let config = CliConfig::from_toml_str("").unwrap();
        assert_eq!(config, CliConfig::default());
        assert!(config.method_filter().accepts("Debugger.enable"));
    }

    #[test]
    fn test_full_config() {
        let config = CliConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.replay.unresolved, UnresolvedPolicy::Strict);
        assert_eq!(config.replay.watch_events.len(), 1);

        let filter = config.method_filter();
        assert!(!filter.accepts("Debugger.enable"));
        assert!(!filter.accepts("Fetch.continueRequest"));
        assert!(filter.accepts("Fetch.enable"));
        assert!(filter.accepts("Network.enable"));

        let hooks = config.delay_hooks();
        assert_eq!(
            hooks.delay_before("Page.getInstallabilityErrors"),
            Some(Duration::from_secs(10))
        );
        assert_eq!(hooks.delay_before("Page.enable"), None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = CliConfig::from_toml_str("[filter]\ndeny = [\"Log.\"]\n").unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn test_empty_pause_method_rejected() {
        let err = CliConfig::from_toml_str("[[hooks.pause]]\nmethod = \"\"\ndelay_ms = 5\n")
            .unwrap_err();
        assert!(err.to_string().contains("empty method"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = CliConfig::load(file.path()).await.unwrap();
        assert_eq!(config.filter.preset, FilterPreset::Quiet);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(dir.path().join("absent.toml")).await.unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
