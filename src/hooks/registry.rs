//! Append-only store of registered hooks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::phase::HookPhase;

/// One API test transaction, as sent by the test runner.
pub type Transaction = Map<String, Value>;

/// Callback for `before_all`/`after_all`, receiving the whole sequence.
pub type SuiteHook = Arc<dyn Fn(&mut Vec<Transaction>) -> anyhow::Result<()> + Send + Sync>;

/// Callback for per-transaction phases.
pub type TransactionHook = Arc<dyn Fn(&mut Transaction) -> anyhow::Result<()> + Send + Sync>;

/// A hook body, shaped by the payload it receives.
#[derive(Clone)]
pub enum Callback {
    Suite(SuiteHook),
    Transaction(TransactionHook),
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Suite(_) => write!(f, "Callback::Suite(..)"),
            Callback::Transaction(_) => write!(f, "Callback::Transaction(..)"),
        }
    }
}

impl Callback {
    /// Wrap a closure operating on the transaction sequence.
    pub fn suite<F>(hook: F) -> Self
    where
        F: Fn(&mut Vec<Transaction>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Callback::Suite(Arc::new(hook))
    }

    /// Wrap a closure operating on a single transaction.
    pub fn transaction<F>(hook: F) -> Self
    where
        F: Fn(&mut Transaction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Callback::Transaction(Arc::new(hook))
    }

    fn fits(&self, phase: HookPhase) -> bool {
        match self {
            Callback::Suite(_) => phase.is_suite(),
            Callback::Transaction(_) => !phase.is_suite(),
        }
    }
}

/// A registered callback plus its scope.
#[derive(Debug, Clone)]
pub struct HookDescriptor {
    pub phase: HookPhase,
    /// Exact transaction name, only meaningful for named phases
    pub name_filter: Option<String>,
    pub callback: Callback,
    /// Human-readable identifier used in log lines
    pub label: String,
}

impl HookDescriptor {
    /// Create a descriptor labelled after its phase.
    pub fn new(phase: HookPhase, callback: Callback) -> Self {
        Self {
            phase,
            name_filter: None,
            callback,
            label: phase.to_string(),
        }
    }

    /// Scope the descriptor to one transaction name.
    pub fn with_name_filter(mut self, name: impl Into<String>) -> Self {
        self.name_filter = Some(name.into());
        self
    }

    /// Replace the log label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn matches(&self, transaction_name: Option<&str>) -> bool {
        if !self.phase.is_named() {
            return true;
        }
        match (self.name_filter.as_deref(), transaction_name) {
            (Some(filter), Some(name)) => filter == name,
            _ => false,
        }
    }
}

/// Registry of hooks keyed by phase, kept in registration order.
///
/// Populated before serving starts and only read afterwards, so it is shared
/// as a plain `Arc<HookRegistry>` without locking.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: HashMap<HookPhase, Vec<HookDescriptor>>,
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook for `phase`, optionally scoped to one transaction name.
    ///
    /// Registering the same callback twice makes it fire twice.
    pub fn register(
        &mut self,
        phase: HookPhase,
        callback: Callback,
        name_filter: Option<String>,
    ) -> &mut Self {
        let mut descriptor = HookDescriptor::new(phase, callback);
        if let Some(name) = name_filter {
            descriptor = descriptor.with_name_filter(name);
        }
        self.add(descriptor)
    }

    /// Append a fully built descriptor.
    pub fn add(&mut self, mut descriptor: HookDescriptor) -> &mut Self {
        if !descriptor.callback.fits(descriptor.phase) {
            tracing::warn!(
                hook = %descriptor.label,
                phase = %descriptor.phase,
                "Callback shape does not match phase, it will never run"
            );
        }
        if descriptor.phase.is_named() && descriptor.name_filter.is_none() {
            tracing::warn!(
                hook = %descriptor.label,
                phase = %descriptor.phase,
                "Named-phase hook registered without a transaction name, it will never run"
            );
        }

        let entries = self.hooks.entry(descriptor.phase).or_default();
        let position = entries.len() + 1;
        if descriptor.label == descriptor.phase.to_string() {
            descriptor.label = format!("{}#{position}", descriptor.phase);
        }
        entries.push(descriptor);
        self
    }

    /// Hooks for `phase` in registration order.
    ///
    /// For named phases only hooks whose name filter equals
    /// `transaction_name` exactly are returned.
    pub fn resolve(&self, phase: HookPhase, transaction_name: Option<&str>) -> Vec<&HookDescriptor> {
        self.hooks
            .get(&phase)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|d| d.matches(transaction_name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of hooks registered for `phase`, across all names.
    pub fn count(&self, phase: HookPhase) -> usize {
        self.hooks.get(&phase).map_or(0, Vec::len)
    }

    /// Total number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn before_all<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Vec<Transaction>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookPhase::BeforeAll, Callback::suite(hook), None)
    }

    pub fn after_all<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Vec<Transaction>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookPhase::AfterAll, Callback::suite(hook), None)
    }

    pub fn before_each<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Transaction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookPhase::BeforeEach, Callback::transaction(hook), None)
    }

    pub fn before_each_validation<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Transaction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(
            HookPhase::BeforeEachValidation,
            Callback::transaction(hook),
            None,
        )
    }

    pub fn after_each<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Transaction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookPhase::AfterEach, Callback::transaction(hook), None)
    }

    /// Run `hook` before validation of the transaction called `name`.
    pub fn before_validation<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(&mut Transaction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(
            HookPhase::BeforeNamedValidation,
            Callback::transaction(hook),
            Some(name.into()),
        )
    }

    /// Run `hook` before the transaction called `name`.
    pub fn before<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(&mut Transaction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(
            HookPhase::BeforeNamed,
            Callback::transaction(hook),
            Some(name.into()),
        )
    }

    /// Run `hook` after the transaction called `name`.
    pub fn after<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(&mut Transaction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(
            HookPhase::AfterNamed,
            Callback::transaction(hook),
            Some(name.into()),
        )
    }
}
