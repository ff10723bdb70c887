// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound},
    reporter::ExecutionSinkOptions,
    runner::RunOptions,
};
use camino::{Utf8Path, Utf8PathBuf};
use cascade_metadata::ExplicitOption;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};
use tracing::{debug, warn};

/// Overall configuration for cascade.
///
/// This is the root data structure for cascade configuration. Most runner settings are part of a
/// profile: see [`RunnerProfile`] for individual settings.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    config_file: Utf8PathBuf,
    inner: RunnerConfigImpl,
}

impl RunnerConfig {
    /// The default location of the config within the project root: `.config/cascade.toml`.
    pub const CONFIG_PATH: &'static str = ".config/cascade.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the cascade config from the given file, or if not specified from
    /// `.config/cascade.toml` in the given directory.
    ///
    /// If the file isn't specified and the directory doesn't have `.config/cascade.toml`, uses the
    /// default config options. Unknown keys are logged and otherwise ignored.
    pub fn from_sources(
        root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let root = root.into();
        let (config_file, source) = match config_file {
            Some(file) => (
                file.to_owned(),
                File::new(file.as_str(), FileFormat::Toml),
            ),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };
        debug!(%config_file, "reading cascade config");

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        if !unknown.is_empty() {
            let keys = unknown.into_iter().collect::<Vec<_>>().join(", ");
            warn!("ignoring unknown configuration keys in config file {config_file}: {keys}");
        }

        let inner = deserialized
            .into_config_impl()
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        Ok(Self { config_file, inner })
    }

    /// Returns the config file this configuration was read from.
    ///
    /// The file isn't required to exist: if it doesn't, the default config is used.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the names of all known profiles: `default` first, then the rest in sorted order.
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(Self::DEFAULT_PROFILE).chain(
            self.inner
                .other_profiles
                .keys()
                .map(|name| name.as_str())
                .filter(|name| *name != Self::DEFAULT_PROFILE),
        )
    }

    /// Returns the profile with the given name.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<RunnerProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = match name {
            Self::DEFAULT_PROFILE => None,
            other => Some(
                self.inner
                    .other_profiles
                    .get(other)
                    .ok_or_else(|| ProfileNotFound::new(name, self.profile_names()))?,
            ),
        };

        Ok(RunnerProfile {
            name: name.to_owned(),
            default_profile: &self.inner.default_profile,
            custom_profile,
        })
    }

    // ---
    // Helper methods
    // ---

    #[cfg(test)]
    pub(crate) fn default_config(root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        let (deserialized, _) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        Self {
            config_file: root.join(Self::CONFIG_PATH),
            inner: deserialized
                .into_config_impl()
                .expect("default config sets every default key"),
        }
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(RunnerConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: RunnerConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // The config crate also reports the key; drop it in favor of the full path.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// A configuration profile for cascade. Contains most configuration used by the runner.
///
/// Returned by [`RunnerConfig::profile`].
#[derive(Clone, Debug)]
pub struct RunnerProfile<'cfg> {
    name: String,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl RunnerProfile<'_> {
    /// Returns the name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns which tests run with respect to their explicit flag.
    pub fn explicit(&self) -> ExplicitOption {
        self.custom_profile
            .and_then(|profile| profile.explicit)
            .unwrap_or(self.default_profile.explicit)
    }

    /// Returns the timeout for tests that don't set their own, or `None` if there's no timeout.
    pub fn default_timeout(&self) -> Option<Duration> {
        let timeout = self
            .custom_profile
            .and_then(|profile| profile.default_timeout)
            .unwrap_or(self.default_profile.default_timeout);
        (!timeout.is_zero()).then_some(timeout)
    }

    /// Returns true if skipped tests should be reported as failed.
    pub fn fail_skips(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.fail_skips)
            .unwrap_or(self.default_profile.fail_skips)
    }

    /// Returns true if passing tests that added warnings should be reported as failed.
    pub fn fail_warn(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.fail_warn)
            .unwrap_or(self.default_profile.fail_warn)
    }

    /// Returns true if the run should be cancelled after the first failing test.
    pub fn stop_on_fail(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.stop_on_fail)
            .unwrap_or(self.default_profile.stop_on_fail)
    }

    /// Returns the time after which a running test is reported as long-running, or `None` if
    /// detection is disabled.
    pub fn long_running_test_time(&self) -> Option<Duration> {
        let time = self
            .custom_profile
            .and_then(|profile| profile.long_running_test_time)
            .unwrap_or(self.default_profile.long_running_test_time);
        (!time.is_zero()).then_some(time)
    }

    /// Returns the runner options for this profile.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            explicit: self.explicit(),
            default_timeout: self.default_timeout(),
        }
    }

    /// Returns the execution sink options for this profile.
    ///
    /// Callbacks aren't configurable, and are left unset.
    pub fn execution_sink_options(&self) -> ExecutionSinkOptions {
        ExecutionSinkOptions {
            fail_skips: self.fail_skips(),
            fail_warn: self.fail_warn(),
            stop_on_fail: self.stop_on_fail(),
            long_running_test_time: self.long_running_test_time(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug)]
struct RunnerConfigImpl {
    default_profile: DefaultProfileImpl,
    other_profiles: BTreeMap<String, CustomProfileImpl>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunnerConfigDeserialize {
    #[serde(rename = "profile")]
    profiles: BTreeMap<String, CustomProfileImpl>,
}

impl RunnerConfigDeserialize {
    fn into_config_impl(mut self) -> Result<RunnerConfigImpl, ConfigParseErrorKind> {
        let default_profile = self
            .profiles
            .remove(RunnerConfig::DEFAULT_PROFILE)
            .ok_or(ConfigParseErrorKind::MissingDefaultKey { key: "profile" })?;
        Ok(RunnerConfigImpl {
            default_profile: DefaultProfileImpl::new(default_profile)?,
            other_profiles: self.profiles,
        })
    }
}

#[derive(Clone, Debug)]
struct DefaultProfileImpl {
    explicit: ExplicitOption,
    default_timeout: Duration,
    fail_skips: bool,
    fail_warn: bool,
    stop_on_fail: bool,
    long_running_test_time: Duration,
}

impl DefaultProfileImpl {
    fn new(p: CustomProfileImpl) -> Result<Self, ConfigParseErrorKind> {
        fn required<T>(value: Option<T>, key: &'static str) -> Result<T, ConfigParseErrorKind> {
            value.ok_or(ConfigParseErrorKind::MissingDefaultKey { key })
        }

        Ok(Self {
            explicit: required(p.explicit, "explicit")?,
            default_timeout: required(p.default_timeout, "default-timeout")?,
            fail_skips: required(p.fail_skips, "fail-skips")?,
            fail_warn: required(p.fail_warn, "fail-warn")?,
            stop_on_fail: required(p.stop_on_fail, "stop-on-fail")?,
            long_running_test_time: required(
                p.long_running_test_time,
                "long-running-test-time",
            )?,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default)]
    explicit: Option<ExplicitOption>,
    #[serde(default, with = "humantime_serde")]
    default_timeout: Option<Duration>,
    #[serde(default)]
    fail_skips: Option<bool>,
    #[serde(default)]
    fail_warn: Option<bool>,
    #[serde(default)]
    stop_on_fail: Option<bool>,
    #[serde(default, with = "humantime_serde")]
    long_running_test_time: Option<Duration>,
}
