//! Security profile policy
//!
//! Profiles only ever move upwards (`None` → `Basic` → `BasicTls`) unless an
//! administrator resets them. Each step up has preconditions on the secrets
//! already present in the store.

use std::fmt;

use super::error::SecurityError;

/// Authentication / transport-security mode of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SecurityProfile {
    /// Plain connection, no credentials.
    #[default]
    None,
    /// HTTP Basic credentials over a plain connection.
    Basic,
    /// HTTP Basic credentials over TLS.
    BasicTls,
}

impl SecurityProfile {
    pub fn level(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Basic => 1,
            Self::BasicTls => 2,
        }
    }

    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::None),
            1 => Some(Self::Basic),
            2 => Some(Self::BasicTls),
            _ => None,
        }
    }

    /// Parse a configuration value such as `"1"`.
    pub fn parse(raw: &str) -> Result<Self, SecurityError> {
        raw.trim()
            .parse::<i64>()
            .ok()
            .and_then(Self::from_level)
            .ok_or_else(|| SecurityError::InvalidProfile(raw.to_string()))
    }
}

impl fmt::Display for SecurityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Snapshot of everything a transition check needs, read in one store view.
#[derive(Debug, Clone, Default)]
pub struct SecurityState {
    pub current: SecurityProfile,
    pub authorization_key: Option<String>,
    pub root_certificate: Option<String>,
    pub central_system_url: String,
}

impl SecurityState {
    fn has_authorization_key(&self) -> bool {
        self.authorization_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }
}

/// An accepted profile change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileTransition {
    pub from: SecurityProfile,
    pub to: SecurityProfile,
    pub requires_reconnect: bool,
}

/// Check whether `requested` may replace the current profile.
///
/// Rules are evaluated in order and the first failure wins. A trust anchor
/// counts as available if one is installed in the store or
/// `default_trust_anchor` is set.
pub fn validate_transition(
    state: &SecurityState,
    requested: SecurityProfile,
    default_trust_anchor: bool,
) -> Result<ProfileTransition, SecurityError> {
    if requested < state.current {
        return Err(SecurityError::Downgrade {
            current: state.current,
            requested,
        });
    }

    let requires_reconnect = match requested {
        SecurityProfile::None => false,
        SecurityProfile::Basic => {
            if !state.has_authorization_key() {
                return Err(SecurityError::MissingAuthorizationKey);
            }
            true
        }
        SecurityProfile::BasicTls => {
            if !is_secure_url(&state.central_system_url) {
                return Err(SecurityError::InsecureUrl(state.central_system_url.clone()));
            }
            if !state.has_authorization_key() {
                return Err(SecurityError::MissingAuthorizationKey);
            }
            let anchor = state
                .root_certificate
                .as_deref()
                .is_some_and(|pem| !pem.is_empty());
            if !anchor && !default_trust_anchor {
                return Err(SecurityError::MissingTrustAnchor);
            }
            requested != state.current
        }
    };

    Ok(ProfileTransition {
        from: state.current,
        to: requested,
        requires_reconnect,
    })
}

pub fn is_secure_url(url: &str) -> bool {
    url.len() >= 6 && url[..6].eq_ignore_ascii_case("wss://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(current: SecurityProfile, key: Option<&str>, url: &str) -> SecurityState {
        SecurityState {
            current,
            authorization_key: key.map(str::to_string),
            root_certificate: None,
            central_system_url: url.to_string(),
        }
    }

    #[test]
    fn parses_levels() {
        assert_eq!(SecurityProfile::parse("0").unwrap(), SecurityProfile::None);
        assert_eq!(SecurityProfile::parse(" 2 ").unwrap(), SecurityProfile::BasicTls);
        assert!(matches!(
            SecurityProfile::parse("3"),
            Err(SecurityError::InvalidProfile(_))
        ));
        assert!(SecurityProfile::parse("basic").is_err());
    }

    #[test]
    fn same_profile_none_is_accepted_without_reconnect() {
        let t = validate_transition(
            &state(SecurityProfile::None, None, "ws://cs"),
            SecurityProfile::None,
            false,
        )
        .unwrap();
        assert!(!t.requires_reconnect);
    }

    #[test]
    fn downgrade_is_rejected() {
        let err = validate_transition(
            &state(SecurityProfile::Basic, Some("k"), "ws://cs"),
            SecurityProfile::None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, SecurityError::Downgrade { .. }));

        let err = validate_transition(
            &state(SecurityProfile::BasicTls, Some("k"), "wss://cs"),
            SecurityProfile::Basic,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, SecurityError::Downgrade { .. }));
    }

    #[test]
    fn basic_requires_non_empty_key() {
        for key in [None, Some("")] {
            let err = validate_transition(
                &state(SecurityProfile::None, key, "ws://cs"),
                SecurityProfile::Basic,
                false,
            )
            .unwrap_err();
            assert_eq!(err, SecurityError::MissingAuthorizationKey);
        }

        let t = validate_transition(
            &state(SecurityProfile::None, Some("secret"), "ws://cs"),
            SecurityProfile::Basic,
            false,
        )
        .unwrap();
        assert!(t.requires_reconnect);
    }

    #[test]
    fn tls_checks_scheme_then_key_then_anchor() {
        let err = validate_transition(
            &state(SecurityProfile::Basic, None, "ws://cs"),
            SecurityProfile::BasicTls,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, SecurityError::InsecureUrl(_)));

        let err = validate_transition(
            &state(SecurityProfile::Basic, None, "wss://cs"),
            SecurityProfile::BasicTls,
            true,
        )
        .unwrap_err();
        assert_eq!(err, SecurityError::MissingAuthorizationKey);

        let err = validate_transition(
            &state(SecurityProfile::Basic, Some("k"), "wss://cs"),
            SecurityProfile::BasicTls,
            false,
        )
        .unwrap_err();
        assert_eq!(err, SecurityError::MissingTrustAnchor);

        let t = validate_transition(
            &state(SecurityProfile::Basic, Some("k"), "WSS://cs"),
            SecurityProfile::BasicTls,
            true,
        )
        .unwrap();
        assert!(t.requires_reconnect);
    }

    #[test]
    fn installed_root_certificate_counts_as_anchor() {
        let mut s = state(SecurityProfile::None, Some("k"), "wss://cs");
        s.root_certificate = Some("-----BEGIN CERTIFICATE-----".into());
        assert!(validate_transition(&s, SecurityProfile::BasicTls, false).is_ok());
    }
}
