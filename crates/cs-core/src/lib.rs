//! Shared primitives used across contest-shell crates.

/// Result alias used across the workspace.
pub type ShellResult<T> = Result<T, ShellError>;

/// Top-level error type carrying a stable dotted code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ShellError {
    pub code: &'static str,
    pub message: String,
}

impl ShellError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Role a window plays in the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WindowRole {
    /// The single main window tied to the organization's main domain.
    Primary,
    /// Secondary window opened for whitelisted third-party domains.
    Auxiliary,
}

impl WindowRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Auxiliary => "auxiliary",
        }
    }

    pub fn is_primary(self) -> bool {
        matches!(self, Self::Primary)
    }
}

/// Distinguishes an outright blocked navigation from a blocked redirect chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Default,
    Redirect,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Redirect => "redirect",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BlockKind;
    use super::ShellError;
    use super::WindowRole;

    #[test]
    fn error_display_includes_code() {
        let error = ShellError::new("config.parse_failed", "bad toml");
        assert_eq!(error.to_string(), "config.parse_failed: bad toml");
    }

    #[test]
    fn role_and_kind_labels() {
        assert_eq!(WindowRole::Primary.as_str(), "primary");
        assert!(!WindowRole::Auxiliary.is_primary());
        assert_eq!(BlockKind::Redirect.as_str(), "redirect");
    }
}
