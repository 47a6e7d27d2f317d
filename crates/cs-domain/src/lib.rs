//! Domain classification against the configured domain sets.

mod host;

pub use host::hostname_of;
pub use host::same_host;

use cs_config::PolicyConfig;
use cs_core::WindowRole;

/// Why a hostname was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    InvalidDomain,
    ExplicitlyBlocked,
    NotInPrimaryAllowlist,
    NotInPopupWhitelist,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidDomain => "invalid domain",
            Self::ExplicitlyBlocked => "explicitly blocked",
            Self::NotInPrimaryAllowlist => "not in primary-window allowlist",
            Self::NotInPopupWhitelist => "not in popup whitelist",
        }
    }
}

/// Accept/reject result for one hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub allowed: bool,
    pub reason: Option<RejectReason>,
}

impl Classification {
    const ALLOWED: Self = Self {
        allowed: true,
        reason: None,
    };

    fn rejected(reason: RejectReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Returns true if `host` equals `domain` or is one of its subdomains.
///
/// Only an exact match or a dot-separated suffix counts, so
/// `evil-op.sdutacm.cn` never matches `op.sdutacm.cn`.
pub fn matches_domain(host: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }

    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Returns true if `host` matches any entry of `domains`.
pub fn matches_any<'a>(host: &str, domains: impl IntoIterator<Item = &'a String>) -> bool {
    domains
        .into_iter()
        .any(|domain| matches_domain(host, domain))
}

/// Classifies a hostname for a window of the given role.
///
/// The blocklist is checked first and wins over every allow rule.
pub fn classify(hostname: Option<&str>, config: &PolicyConfig, role: WindowRole) -> Classification {
    let Some(host) = hostname.filter(|host| !host.is_empty()) else {
        return Classification::rejected(RejectReason::InvalidDomain);
    };

    if matches_any(host, &config.blocked_domains) {
        return Classification::rejected(RejectReason::ExplicitlyBlocked);
    }

    match role {
        WindowRole::Primary => {
            if matches_domain(host, &config.main_domain)
                || matches_any(host, &config.popup_whitelist)
            {
                Classification::ALLOWED
            } else {
                Classification::rejected(RejectReason::NotInPrimaryAllowlist)
            }
        }
        WindowRole::Auxiliary => {
            if config.popup_whitelist.is_empty() || matches_any(host, &config.popup_whitelist) {
                Classification::ALLOWED
            } else {
                Classification::rejected(RejectReason::NotInPopupWhitelist)
            }
        }
    }
}

/// Classifies the hostname of a full URL.
pub fn classify_url(url: &str, config: &PolicyConfig, role: WindowRole) -> Classification {
    classify(hostname_of(url).as_deref(), config, role)
}

/// True if `host` belongs to the configured main domain subtree.
pub fn is_main_domain(host: &str, config: &PolicyConfig) -> bool {
    matches_domain(host, &config.main_domain)
}

/// True if `host` is on the popup whitelist but outside the main domain.
pub fn is_foreign_whitelisted(host: &str, config: &PolicyConfig) -> bool {
    !is_main_domain(host, config) && matches_any(host, &config.popup_whitelist)
}

/// True if `host` should be handed to the OS browser.
pub fn is_external(host: &str, config: &PolicyConfig) -> bool {
    matches_any(host, &config.external_domains)
}

#[cfg(test)]
mod tests {
    use super::RejectReason;
    use super::classify;
    use super::classify_url;
    use super::is_external;
    use super::is_foreign_whitelisted;
    use super::matches_domain;
    use cs_config::PolicyConfig;
    use cs_core::WindowRole;
    use std::collections::BTreeSet;

    fn contest_config() -> PolicyConfig {
        PolicyConfig {
            home_url: "https://op.sdutacm.cn/".to_owned(),
            main_domain: "op.sdutacm.cn".to_owned(),
            popup_whitelist: BTreeSet::from(["rank.ac".to_owned()]),
            blocked_domains: BTreeSet::from(["oj.sdutacm.cn".to_owned()]),
            external_domains: BTreeSet::from(["github.com".to_owned()]),
        }
    }

    #[test]
    fn subdomain_matching_requires_dot_boundary() {
        assert!(matches_domain("op.sdutacm.cn", "op.sdutacm.cn"));
        assert!(matches_domain("sub.op.sdutacm.cn", "op.sdutacm.cn"));
        assert!(!matches_domain("evil-op.sdutacm.cn", "op.sdutacm.cn"));
        assert!(!matches_domain("opsdutacm.cn", "op.sdutacm.cn"));
        assert!(!matches_domain("evilop.sdutacm.cn.attacker.com", "op.sdutacm.cn"));
        assert!(!matches_domain("op.sdutacm.cn", ""));
    }

    #[test]
    fn blocklist_wins_over_main_domain() {
        let mut config = contest_config();
        config.blocked_domains.insert("admin.op.sdutacm.cn".to_owned());

        let result = classify(Some("admin.op.sdutacm.cn"), &config, WindowRole::Primary);
        assert!(!result.allowed);
        assert_eq!(result.reason, Some(RejectReason::ExplicitlyBlocked));

        let result = classify(Some("x.admin.op.sdutacm.cn"), &config, WindowRole::Auxiliary);
        assert_eq!(result.reason, Some(RejectReason::ExplicitlyBlocked));
    }

    #[test]
    fn primary_and_auxiliary_roles_are_asymmetric() {
        let config = contest_config();
        assert!(classify(Some("rank.ac"), &config, WindowRole::Primary).allowed);
        assert!(classify(Some("rank.ac"), &config, WindowRole::Auxiliary).allowed);
        assert!(classify(Some("op.sdutacm.cn"), &config, WindowRole::Primary).allowed);

        let random = classify(Some("random.com"), &config, WindowRole::Auxiliary);
        assert!(!random.allowed);
        assert_eq!(random.reason, Some(RejectReason::NotInPopupWhitelist));

        let random = classify(Some("random.com"), &config, WindowRole::Primary);
        assert_eq!(random.reason, Some(RejectReason::NotInPrimaryAllowlist));
    }

    #[test]
    fn empty_whitelist_leaves_auxiliary_unrestricted() {
        let mut config = contest_config();
        config.popup_whitelist.clear();
        assert!(classify(Some("random.com"), &config, WindowRole::Auxiliary).allowed);
        assert!(!classify(Some("random.com"), &config, WindowRole::Primary).allowed);
        assert!(!classify(Some("oj.sdutacm.cn"), &config, WindowRole::Auxiliary).allowed);
    }

    #[test]
    fn missing_or_unparseable_host_is_invalid() {
        let config = contest_config();
        let result = classify(None, &config, WindowRole::Primary);
        assert_eq!(result.reason, Some(RejectReason::InvalidDomain));
        assert_eq!(RejectReason::InvalidDomain.as_str(), "invalid domain");

        let result = classify_url("not a url", &config, WindowRole::Primary);
        assert_eq!(result.reason, Some(RejectReason::InvalidDomain));
    }

    #[test]
    fn url_classification_is_case_insensitive() {
        let config = contest_config();
        assert!(classify_url("https://RANK.ac/contest/1", &config, WindowRole::Auxiliary).allowed);
    }

    #[test]
    fn foreign_and_external_helpers() {
        let config = contest_config();
        assert!(is_foreign_whitelisted("rank.ac", &config));
        assert!(!is_foreign_whitelisted("op.sdutacm.cn", &config));
        assert!(is_external("github.com", &config));
        assert!(is_external("gist.github.com", &config));
        assert!(!is_external("notgithub.com", &config));
    }
}
