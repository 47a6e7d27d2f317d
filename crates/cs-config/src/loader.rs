//! Config file discovery and parsing.
//!
//! Discovery order:
//! 1. explicit path (command line)
//! 2. `CONTEST_SHELL_CONFIG`
//! 3. `<platform config dir>/config.toml`
//! 4. built-in defaults

use crate::AppConfig;
use cs_core::ShellError;
use cs_core::ShellResult;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::info;

/// Environment variable that points at a config file.
pub const CONFIG_ENV_VAR: &str = "CONTEST_SHELL_CONFIG";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Environment(PathBuf),
    UserConfigDir(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(path) | Self::Environment(path) | Self::UserConfigDir(path) => {
                Some(path)
            }
            Self::Defaults => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Explicit(_) => "command line",
            Self::Environment(_) => CONFIG_ENV_VAR,
            Self::UserConfigDir(_) => "user config directory",
            Self::Defaults => "built-in defaults",
        }
    }
}

/// Validated configuration plus its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub source: ConfigSource,
}

/// Loads configuration following the discovery order.
pub fn load(explicit: Option<&Path>) -> ShellResult<LoadedConfig> {
    let user_file = directories::ProjectDirs::from("cn", "sdutacm", "contest-shell")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME));
    let source = discover(explicit, std::env::var_os(CONFIG_ENV_VAR), user_file);

    let config = match source.path() {
        Some(path) => load_from_path(path)?,
        None => AppConfig::default().validated()?,
    };

    info!(source = source.label(), path = ?source.path(), "configuration loaded");
    Ok(LoadedConfig { config, source })
}

/// Picks the config source without touching file contents.
///
/// Explicit and environment paths are returned even when they do not exist,
/// so the caller reports the missing file instead of silently using defaults.
/// A missing file in the user config directory is skipped.
pub fn discover(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    user_file: Option<PathBuf>,
) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    if let Some(value) = env_value.filter(|value| !value.is_empty()) {
        return ConfigSource::Environment(PathBuf::from(value));
    }

    match user_file {
        Some(path) if path.is_file() => ConfigSource::UserConfigDir(path),
        Some(path) => {
            debug!(path = %path.display(), "no user config file; using defaults");
            ConfigSource::Defaults
        }
        None => ConfigSource::Defaults,
    }
}

/// Reads, parses and validates one config file.
pub fn load_from_path(path: &Path) -> ShellResult<AppConfig> {
    let text = fs::read_to_string(path).map_err(|error| {
        ShellError::new(
            "config.read_failed",
            format!("failed to read config file `{}`: {error}", path.display()),
        )
    })?;
    parse_str(&text, &path.display().to_string())
}

/// Parses and validates config text; `origin` is used in error messages.
pub fn parse_str(text: &str, origin: &str) -> ShellResult<AppConfig> {
    let parsed: AppConfig = toml::from_str(text).map_err(|error| {
        ShellError::new(
            "config.parse_failed",
            format!("failed to parse config `{origin}`: {error}"),
        )
    })?;
    parsed.validated()
}

#[cfg(test)]
mod tests {
    use super::ConfigSource;
    use super::discover;
    use super::load_from_path;
    use super::parse_str;
    use pretty_assertions::assert_eq;
    use std::ffi::OsString;
    use std::io::Write;
    use std::path::Path;

    #[test]
    fn explicit_path_wins_over_environment() {
        let source = discover(
            Some(Path::new("/tmp/explicit.toml")),
            Some(OsString::from("/tmp/env.toml")),
            None,
        );
        assert_eq!(source, ConfigSource::Explicit("/tmp/explicit.toml".into()));
    }

    #[test]
    fn empty_environment_value_is_ignored() {
        let source = discover(None, Some(OsString::new()), None);
        assert_eq!(source, ConfigSource::Defaults);
    }

    #[test]
    fn missing_user_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir();
        assert!(dir.is_ok());
        let dir = dir.unwrap_or_else(|_| unreachable!());
        let source = discover(None, None, Some(dir.path().join("config.toml")));
        assert_eq!(source, ConfigSource::Defaults);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let parsed = parse_str(
            r#"
[policy]
main_domain = "Contest.Example.org"
popup_whitelist = ["rank.ac"]

[shell]
probe_timeout_ms = 5000
"#,
            "inline",
        );
        assert!(parsed.is_ok());
        let parsed = parsed.unwrap_or_else(|_| unreachable!());
        assert_eq!(parsed.policy.main_domain, "contest.example.org");
        assert_eq!(parsed.policy.home_url, "https://op.sdutacm.cn/");
        assert_eq!(parsed.shell.probe_timeout_ms, 5000);
        assert_eq!(parsed.shell.dialog_debounce_ms, 1000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed = parse_str("[policy]\nwhitelist = []\n", "inline");
        assert_eq!(parsed.err().map(|error| error.code), Some("config.parse_failed"));
    }

    #[test]
    fn loads_file_from_disk() {
        let file = tempfile::NamedTempFile::new();
        assert!(file.is_ok());
        let mut file = file.unwrap_or_else(|_| unreachable!());
        let written = writeln!(
            file,
            "[policy]\nhome_url = \"https://contest.example.org/\"\nmain_domain = \"contest.example.org\""
        );
        assert!(written.is_ok());

        let loaded = load_from_path(file.path());
        assert!(loaded.is_ok());
        let loaded = loaded.unwrap_or_else(|_| unreachable!());
        assert_eq!(loaded.policy.home_url, "https://contest.example.org/");
    }

    #[test]
    fn missing_file_reports_read_failure() {
        let loaded = load_from_path(Path::new("/nonexistent/contest-shell.toml"));
        assert_eq!(loaded.err().map(|error| error.code), Some("config.read_failed"));
    }
}
