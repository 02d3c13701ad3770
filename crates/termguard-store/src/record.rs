//! The persisted authorization record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Authorization record, persisted as JSON.
///
/// `blocked_ids` is not enforced disjoint from `authorized_ids`: the blocked
/// check runs first, so an identity present in both stays locked until the
/// file is edited by hand. `failure_counts` is transient per process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRecord {
    /// Bot API token, consumed by the channel layer.
    pub token: String,
    /// Owner handle, compared case-insensitively against sender usernames.
    pub owner_username: String,
    /// Identities allowed to issue commands.
    #[serde(default)]
    pub authorized_ids: Vec<i64>,
    /// Identities locked out until manual intervention.
    #[serde(default)]
    pub blocked_ids: Vec<i64>,
    /// Failed attempts before an identity is locked out.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Chat that receives resource alerts; monitoring is off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_chat_id: Option<i64>,
    /// Allow-list of command names; when present, only these may run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_commands: Option<Vec<String>>,
    /// Deny-list of command names, checked before the allow-list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_commands: Option<Vec<String>>,
    /// Per-identity failed attempt counters, never written to disk.
    #[serde(skip)]
    pub failure_counts: HashMap<i64, u32>,
}

impl AuthRecord {
    /// Validate the loaded record. A record that fails here is a fatal
    /// configuration error; the process must not start without a valid
    /// token and owner.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token.trim().is_empty() {
            return Err(anyhow::anyhow!("token must not be empty"));
        }
        if self.owner_username.trim().is_empty() {
            return Err(anyhow::anyhow!("owner_username must not be empty"));
        }
        if self.max_attempts < 1 {
            return Err(anyhow::anyhow!("max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Whether `display_name` identifies the owner (case-insensitive).
    pub fn is_owner(&self, display_name: Option<&str>) -> bool {
        display_name
            .map(|name| name.eq_ignore_ascii_case(&self.owner_username))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AuthRecord {
        AuthRecord {
            token: "123:ABC".to_string(),
            owner_username: "Admin".to_string(),
            authorized_ids: vec![42],
            blocked_ids: vec![],
            max_attempts: 3,
            alert_chat_id: None,
            allowed_commands: None,
            blocked_commands: None,
            failure_counts: HashMap::new(),
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(record().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_token() {
        let mut rec = record();
        rec.token = "  ".to_string();
        assert!(rec.validate().is_err());
    }

    #[test]
    fn test_validate_empty_owner() {
        let mut rec = record();
        rec.owner_username = String::new();
        assert!(rec.validate().is_err());
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut rec = record();
        rec.max_attempts = 0;
        assert!(rec.validate().is_err());
    }

    #[test]
    fn test_is_owner_case_insensitive() {
        let rec = record();
        assert!(rec.is_owner(Some("admin")));
        assert!(rec.is_owner(Some("ADMIN")));
        assert!(!rec.is_owner(Some("intruder")));
        assert!(!rec.is_owner(None));
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let rec: AuthRecord = serde_json::from_str(
            r#"{"token": "t", "owner_username": "o", "authorized_ids": [1, 2]}"#,
        )
        .unwrap();
        assert_eq!(rec.max_attempts, 3);
        assert!(rec.blocked_ids.is_empty());
        assert!(rec.allowed_commands.is_none());
        assert!(rec.failure_counts.is_empty());
    }

    #[test]
    fn test_failure_counts_not_serialized() {
        let mut rec = record();
        rec.failure_counts.insert(7, 2);
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("failure_counts"));
    }
}
