//! TermGuard Store - Persisted authorization record
//!
//! This crate owns the single source of truth for who may talk to the bot:
//! the owner identity, authorized and blocked identities, the lockout
//! threshold, and the optional command policy lists. The record is a JSON
//! file compatible with the installer's `config.json`, restricted to
//! owner read/write.
//!
//! All read-modify-write sequences go through [`AuthStore::record`], which
//! hands out a mutex guard; concurrent file rewrites from multiple execution
//! contexts are not possible by construction.

pub mod paths;
pub mod record;
pub mod store;

pub use record::AuthRecord;
pub use store::AuthStore;
