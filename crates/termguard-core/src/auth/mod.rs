//! Authorization guard and lockout state machine.

mod guard;

pub use guard::{AccessDecision, AuthGuard};
