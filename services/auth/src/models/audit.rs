//! Audit trail entries

use std::fmt;

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest value accepted by the `ip_address` column
const MAX_IP_LEN: usize = 45;

/// Authentication action recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Login,
    Logout,
    Refresh,
    Revoke,
}

impl AuditAction {
    /// Value stored in the `action` column
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::Refresh => "refresh",
            AuditAction::Revoke => "revoke",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: i64,
    pub action: AuditAction,
    pub token_jti: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request metadata attached to audit entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Extract client address and user agent from request headers
    ///
    /// The address comes from the first `X-Forwarded-For` hop, falling back
    /// to `X-Real-IP`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let ip_address = header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .or_else(|| header("x-real-ip"))
            .filter(|ip| ip.len() <= MAX_IP_LEN)
            .map(str::to_string);

        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            ip_address,
            user_agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        headers.insert(USER_AGENT, HeaderValue::from_static("python-requests/2.31"));

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(ctx.user_agent.as_deref(), Some("python-requests/2.31"));
    }

    #[test]
    fn real_ip_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.ip_address.as_deref(), Some("198.51.100.4"));
        assert_eq!(ctx.user_agent, None);
    }

    #[test]
    fn missing_headers_give_empty_context() {
        assert_eq!(
            RequestContext::from_headers(&HeaderMap::new()),
            RequestContext::default()
        );
    }

    #[test]
    fn action_column_values() {
        assert_eq!(AuditAction::Login.as_str(), "login");
        assert_eq!(AuditAction::Revoke.to_string(), "revoke");
    }
}
