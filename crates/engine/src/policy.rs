//! Switches governing category learning and the kind guard.

use serde::Deserialize;

/// What to do when a resolved category's kind contradicts the transaction
/// kind (an income-only category on an expense, or vice versa).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchAction {
    /// Fail the resolution with `CategoryTypeMismatch`.
    Reject,
    /// Log a warning and keep the category.
    #[default]
    Warn,
}

/// Configuration for the category resolution engine.
///
/// `sign_learning` selects where an explicit hint is remembered on the
/// merchant: the per-kind slot when enabled, the legacy single slot when not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CategorizationPolicy {
    pub sign_learning: bool,
    pub mismatch: MismatchAction,
}

impl Default for CategorizationPolicy {
    fn default() -> Self {
        Self {
            sign_learning: true,
            mismatch: MismatchAction::Warn,
        }
    }
}
