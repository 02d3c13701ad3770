//! Optional allow/deny command policy.

use std::collections::HashSet;

/// Allow/deny lists evaluated against a command's first whitespace token.
///
/// Evaluation order is fixed: deny first, then allow-if-present. Both lists
/// absent means everything passes.
#[derive(Debug, Clone, Default)]
pub struct CommandPolicy {
    allow: Option<HashSet<String>>,
    deny: Option<HashSet<String>>,
}

impl CommandPolicy {
    /// Build a policy from the record's optional lists.
    pub fn from_lists(allow: Option<&[String]>, deny: Option<&[String]>) -> Self {
        let to_set = |list: &[String]| list.iter().cloned().collect::<HashSet<_>>();
        Self {
            allow: allow.map(to_set),
            deny: deny.map(to_set),
        }
    }

    /// Whether `command` may run. Returns the rejection reason otherwise.
    pub fn evaluate(&self, command: &str) -> std::result::Result<(), String> {
        let Some(base) = command.split_whitespace().next() else {
            return Err("empty command".to_string());
        };

        if let Some(deny) = &self.deny
            && deny.contains(base)
        {
            return Err(format!("command '{base}' is blocked"));
        }

        if let Some(allow) = &self.allow
            && !allow.contains(base)
        {
            return Err(format!("command '{base}' is not in the allow-list"));
        }

        Ok(())
    }
}
