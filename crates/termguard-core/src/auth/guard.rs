//! Per-request authorization decisions.

use std::sync::Arc;
use tracing::{info, warn};

use termguard_store::AuthStore;

use crate::error::{CoreError, Result};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The requester may proceed.
    Authorized,
    /// Unknown identity; `remaining` attempts left before lockout.
    Unauthorized { remaining: u32 },
    /// Identity is locked out until the record is edited by hand.
    Locked,
}

/// Decides, for each inbound request, whether the requester may proceed.
///
/// All mutations of the shared record happen under the store's mutex and are
/// persisted synchronously before the decision is returned. A crash between
/// mutation and persistence can under-count failures by one; it can never
/// over-count.
pub struct AuthGuard {
    store: Arc<AuthStore>,
}

impl AuthGuard {
    pub fn new(store: Arc<AuthStore>) -> Self {
        Self { store }
    }

    /// Check whether `identity` may proceed.
    ///
    /// `display_name` is the mutable human handle, compared case-insensitively
    /// against the owner's configured username. The stable numeric identity is
    /// what gets counted and locked.
    pub fn check(&self, identity: i64, display_name: Option<&str>) -> Result<AccessDecision> {
        let mut record = self.store.record();

        // Blocked identities are rejected before anything else; no counter
        // moves, so repeated calls from a locked identity are idempotent.
        if record.blocked_ids.contains(&identity) {
            return Ok(AccessDecision::Locked);
        }

        let is_owner = record.is_owner(display_name);
        if is_owner || record.authorized_ids.contains(&identity) {
            // Owner login is a master reset: every identity's failure
            // counter goes back to zero.
            if is_owner && !record.failure_counts.is_empty() {
                record.failure_counts.clear();
                self.store
                    .persist(&record)
                    .map_err(|e| CoreError::Persistence(e.to_string()))?;
                info!("Owner authenticated; all failure counters reset");
            }
            return Ok(AccessDecision::Authorized);
        }

        let count = record.failure_counts.entry(identity).or_insert(0);
        *count += 1;
        let count = *count;
        let threshold = record.max_attempts;

        if count >= threshold {
            record.blocked_ids.push(identity);
            self.store
                .persist(&record)
                .map_err(|e| CoreError::Persistence(e.to_string()))?;
            warn!(identity, "Identity locked out after {count} failed attempts");
            Ok(AccessDecision::Locked)
        } else {
            self.store
                .persist(&record)
                .map_err(|e| CoreError::Persistence(e.to_string()))?;
            warn!(identity, "Unauthorized attempt {count}/{threshold}");
            Ok(AccessDecision::Unauthorized {
                remaining: threshold - count,
            })
        }
    }
}
