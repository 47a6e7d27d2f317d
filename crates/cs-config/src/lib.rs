//! Policy and shell configuration loaded once at startup.
//!
//! The configuration is immutable for the lifetime of the process; changing
//! the whitelist requires a restart.

mod loader;

pub use loader::ConfigSource;
pub use loader::LoadedConfig;
pub use loader::CONFIG_ENV_VAR;
pub use loader::discover;
pub use loader::load;
pub use loader::load_from_path;
pub use loader::parse_str;

use cs_core::ShellError;
use cs_core::ShellResult;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use url::Url;

const DEFAULT_HOME_URL: &str = "https://op.sdutacm.cn/";
const DEFAULT_MAIN_DOMAIN: &str = "op.sdutacm.cn";
const DEFAULT_POPUP_WHITELIST: &[&str] = &[
    "rl.algoux.cn",
    "rl.algoux.org",
    "rank.ac",
    "acm.sdut.edu.cn",
];
const DEFAULT_BLOCKED_DOMAINS: &[&str] = &["oj.sdutacm.cn"];
const DEFAULT_EXTERNAL_DOMAINS: &[&str] = &["github.com"];
const DEFAULT_USER_AGENT_PRODUCT: &str = "SDUTOJCompetitionSideClient";
const MAX_DIALOG_DEBOUNCE_MS: u64 = 60_000;

/// Complete on-disk configuration: domain policy plus shell behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub policy: PolicyConfig,
    pub shell: ShellSettings,
}

impl AppConfig {
    /// Normalizes domain entries and checks every field.
    pub fn validated(mut self) -> ShellResult<Self> {
        self.policy = self.policy.normalized()?;
        self.policy.validate()?;
        self.shell.validate()?;
        Ok(self)
    }
}

/// Domain sets that drive every navigation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub home_url: String,
    pub main_domain: String,
    pub popup_whitelist: BTreeSet<String>,
    pub blocked_domains: BTreeSet<String>,
    pub external_domains: BTreeSet<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            home_url: DEFAULT_HOME_URL.to_owned(),
            main_domain: DEFAULT_MAIN_DOMAIN.to_owned(),
            popup_whitelist: owned_set(DEFAULT_POPUP_WHITELIST),
            blocked_domains: owned_set(DEFAULT_BLOCKED_DOMAINS),
            external_domains: owned_set(DEFAULT_EXTERNAL_DOMAINS),
        }
    }
}

impl PolicyConfig {
    /// Returns a copy with every domain entry normalized.
    ///
    /// Entries that normalize to an empty string are rejected rather than
    /// dropped, since an empty entry would otherwise match nothing silently.
    pub fn normalized(self) -> ShellResult<Self> {
        let main_domain = normalize_domain(&self.main_domain);
        if main_domain.is_empty() {
            return Err(ShellError::new(
                "config.main_domain_empty",
                "policy.main_domain must not be empty",
            ));
        }

        Ok(Self {
            home_url: self.home_url.trim().to_owned(),
            main_domain,
            popup_whitelist: normalize_set("popup_whitelist", self.popup_whitelist)?,
            blocked_domains: normalize_set("blocked_domains", self.blocked_domains)?,
            external_domains: normalize_set("external_domains", self.external_domains)?,
        })
    }

    pub fn validate(&self) -> ShellResult<()> {
        let parsed = Url::parse(&self.home_url).map_err(|error| {
            ShellError::new(
                "config.home_url_invalid",
                format!("policy.home_url `{}` is not a valid URL: {error}", self.home_url),
            )
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ShellError::new(
                "config.home_url_scheme",
                format!(
                    "policy.home_url must use http or https, got `{}`",
                    parsed.scheme()
                ),
            ));
        }

        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ShellError::new(
                "config.home_url_host_missing",
                "policy.home_url must include a host",
            ));
        }

        Ok(())
    }
}

/// Window size in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowDimensions {
    pub width: u32,
    pub height: u32,
}

/// Timings, window defaults and decorative assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellSettings {
    pub dialog_debounce_ms: u64,
    pub fallback_delay_ms: u64,
    pub probe_timeout_ms: u64,
    pub show_timeout_ms: u64,
    pub toolbar_refresh_delay_ms: u64,
    pub primary_window: WindowDimensions,
    pub auxiliary_window: WindowDimensions,
    pub user_agent_product: String,
    pub window_icon: Option<std::path::PathBuf>,
    pub toolbar_icons: Option<std::path::PathBuf>,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            dialog_debounce_ms: 1_000,
            fallback_delay_ms: 30,
            probe_timeout_ms: 8_000,
            show_timeout_ms: 3_000,
            toolbar_refresh_delay_ms: 100,
            primary_window: WindowDimensions {
                width: 1000,
                height: 800,
            },
            auxiliary_window: WindowDimensions {
                width: 1280,
                height: 800,
            },
            user_agent_product: DEFAULT_USER_AGENT_PRODUCT.to_owned(),
            window_icon: None,
            toolbar_icons: None,
        }
    }
}

impl ShellSettings {
    pub fn validate(&self) -> ShellResult<()> {
        for (name, value) in [
            ("dialog_debounce_ms", self.dialog_debounce_ms),
            ("fallback_delay_ms", self.fallback_delay_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("show_timeout_ms", self.show_timeout_ms),
            ("toolbar_refresh_delay_ms", self.toolbar_refresh_delay_ms),
        ] {
            if value == 0 {
                return Err(ShellError::new(
                    "config.timing_zero",
                    format!("shell.{name} must be greater than zero"),
                ));
            }
        }

        if self.dialog_debounce_ms > MAX_DIALOG_DEBOUNCE_MS {
            return Err(ShellError::new(
                "config.debounce_too_large",
                format!(
                    "shell.dialog_debounce_ms exceeds hard limit ({} > {MAX_DIALOG_DEBOUNCE_MS})",
                    self.dialog_debounce_ms
                ),
            ));
        }

        for (name, size) in [
            ("primary_window", self.primary_window),
            ("auxiliary_window", self.auxiliary_window),
        ] {
            if size.width == 0 || size.height == 0 {
                return Err(ShellError::new(
                    "config.window_size_invalid",
                    format!("shell.{name} must have a non-zero width and height"),
                ));
            }
        }

        if self.user_agent_product.trim().is_empty()
            || self.user_agent_product.chars().any(char::is_whitespace)
        {
            return Err(ShellError::new(
                "config.user_agent_product_invalid",
                "shell.user_agent_product must be a single non-empty token",
            ));
        }

        Ok(())
    }

    pub fn dialog_debounce(&self) -> Duration {
        Duration::from_millis(self.dialog_debounce_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn show_timeout(&self) -> Duration {
        Duration::from_millis(self.show_timeout_ms)
    }

    pub fn toolbar_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.toolbar_refresh_delay_ms)
    }
}

/// Lower-cases a host or domain entry and strips surrounding whitespace and
/// the trailing root dot.
pub fn normalize_domain(raw: &str) -> String {
    raw.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn normalize_set(field: &str, entries: BTreeSet<String>) -> ShellResult<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    for entry in entries {
        let normalized = normalize_domain(&entry);
        if normalized.is_empty() {
            return Err(ShellError::new(
                "config.domain_entry_empty",
                format!("policy.{field} contains an empty domain entry"),
            ));
        }
        out.insert(normalized);
    }
    Ok(out)
}

fn owned_set(entries: &[&str]) -> BTreeSet<String> {
    entries.iter().map(|entry| (*entry).to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use super::PolicyConfig;
    use super::ShellSettings;
    use super::normalize_domain;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    #[test]
    fn defaults_match_competition_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.policy.home_url, "https://op.sdutacm.cn/");
        assert_eq!(config.policy.main_domain, "op.sdutacm.cn");
        assert!(config.policy.popup_whitelist.contains("rank.ac"));
        assert!(config.policy.blocked_domains.contains("oj.sdutacm.cn"));
        assert_eq!(config.shell.dialog_debounce_ms, 1_000);
        assert!(config.validated().is_ok());
    }

    #[test]
    fn normalizes_domain_entries() {
        assert_eq!(normalize_domain("  Rank.AC. "), "rank.ac");

        let policy = PolicyConfig {
            main_domain: "OP.sdutacm.cn.".to_owned(),
            popup_whitelist: BTreeSet::from(["Rank.ac".to_owned(), "rank.ac.".to_owned()]),
            ..PolicyConfig::default()
        };
        let normalized = policy.normalized();
        assert!(normalized.is_ok());
        let normalized = normalized.unwrap_or_else(|_| unreachable!());
        assert_eq!(normalized.main_domain, "op.sdutacm.cn");
        assert_eq!(
            normalized.popup_whitelist,
            BTreeSet::from(["rank.ac".to_owned()])
        );
    }

    #[test]
    fn rejects_empty_domain_entry() {
        let policy = PolicyConfig {
            blocked_domains: BTreeSet::from([" . ".to_owned()]),
            ..PolicyConfig::default()
        };
        let error = policy.normalized().err();
        assert_eq!(error.map(|error| error.code), Some("config.domain_entry_empty"));
    }

    #[test]
    fn rejects_non_http_home_url() {
        let policy = PolicyConfig {
            home_url: "file:///etc/passwd".to_owned(),
            ..PolicyConfig::default()
        };
        let error = policy.validate().err();
        assert_eq!(error.map(|error| error.code), Some("config.home_url_scheme"));
    }

    #[test]
    fn rejects_zero_timings_and_oversized_debounce() {
        let zero = ShellSettings {
            probe_timeout_ms: 0,
            ..ShellSettings::default()
        };
        assert_eq!(
            zero.validate().err().map(|error| error.code),
            Some("config.timing_zero")
        );

        let huge = ShellSettings {
            dialog_debounce_ms: 120_000,
            ..ShellSettings::default()
        };
        assert_eq!(
            huge.validate().err().map(|error| error.code),
            Some("config.debounce_too_large")
        );
    }

    #[test]
    fn rejects_user_agent_product_with_spaces() {
        let settings = ShellSettings {
            user_agent_product: "Contest Shell".to_owned(),
            ..ShellSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
