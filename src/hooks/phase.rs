//! Lifecycle phases a hook can be attached to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Points in the test-suite lifecycle where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// Once, before the first transaction
    BeforeAll,
    /// Once, after the last transaction
    AfterAll,
    /// Before every transaction is validated
    BeforeEachValidation,
    /// Before every transaction is executed
    BeforeEach,
    /// After every transaction
    AfterEach,
    /// Before validation of one named transaction
    BeforeNamedValidation,
    /// Before execution of one named transaction
    BeforeNamed,
    /// After one named transaction
    AfterNamed,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::BeforeAll => write!(f, "before_all"),
            HookPhase::AfterAll => write!(f, "after_all"),
            HookPhase::BeforeEachValidation => write!(f, "before_each_validation"),
            HookPhase::BeforeEach => write!(f, "before_each"),
            HookPhase::AfterEach => write!(f, "after_each"),
            HookPhase::BeforeNamedValidation => write!(f, "before_named_validation"),
            HookPhase::BeforeNamed => write!(f, "before_named"),
            HookPhase::AfterNamed => write!(f, "after_named"),
        }
    }
}

impl HookPhase {
    /// Whether hooks in this phase are scoped to an exact transaction name.
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            HookPhase::BeforeNamedValidation | HookPhase::BeforeNamed | HookPhase::AfterNamed
        )
    }

    /// Whether hooks in this phase receive the whole transaction sequence.
    pub fn is_suite(&self) -> bool {
        matches!(self, HookPhase::BeforeAll | HookPhase::AfterAll)
    }

    /// Get all phases
    pub fn all() -> &'static [HookPhase] {
        &[
            HookPhase::BeforeAll,
            HookPhase::AfterAll,
            HookPhase::BeforeEachValidation,
            HookPhase::BeforeEach,
            HookPhase::AfterEach,
            HookPhase::BeforeNamedValidation,
            HookPhase::BeforeNamed,
            HookPhase::AfterNamed,
        ]
    }
}
