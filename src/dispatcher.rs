//! Routes decoded protocol events to hook chains.
//!
//! "Before" events run generic hooks first and named hooks second. `afterEach`
//! reverses that: named hooks run first and the generic teardown runs last.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::error::ProtocolError;
use crate::hooks::{Callback, HookDescriptor, HookPhase, HookRegistry, Transaction};
use crate::server::Envelope;
use crate::utils::value_kind;

/// Lifecycle events the test runner sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    BeforeAll,
    AfterAll,
    BeforeEachValidation,
    BeforeEach,
    AfterEach,
}

impl Event {
    /// Parse a wire event name. Unknown names return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "beforeAll" => Some(Event::BeforeAll),
            "afterAll" => Some(Event::AfterAll),
            "beforeEachValidation" => Some(Event::BeforeEachValidation),
            "beforeEach" => Some(Event::BeforeEach),
            "afterEach" => Some(Event::AfterEach),
            _ => None,
        }
    }

    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BeforeAll => "beforeAll",
            Event::AfterAll => "afterAll",
            Event::BeforeEachValidation => "beforeEachValidation",
            Event::BeforeEach => "beforeEach",
            Event::AfterEach => "afterEach",
        }
    }

    /// Whether the payload is the whole transaction sequence.
    pub fn is_suite(&self) -> bool {
        matches!(self, Event::BeforeAll | Event::AfterAll)
    }

    /// Phases whose hooks make up this event's chain, in firing order.
    pub fn phases(&self) -> &'static [HookPhase] {
        match self {
            Event::BeforeAll => &[HookPhase::BeforeAll],
            Event::AfterAll => &[HookPhase::AfterAll],
            Event::BeforeEachValidation => &[
                HookPhase::BeforeEachValidation,
                HookPhase::BeforeNamedValidation,
            ],
            Event::BeforeEach => &[HookPhase::BeforeEach, HookPhase::BeforeNamed],
            Event::AfterEach => &[HookPhase::AfterNamed, HookPhase::AfterEach],
        }
    }
}

/// Counts of hook invocations for one dispatched envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failed: usize,
}

/// Runs hook chains from a shared, read-only registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HookRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// Run the chain for `envelope.event`, mutating `envelope.data` in place.
    ///
    /// Unrecognized events leave the envelope untouched. A payload of the
    /// wrong shape for a recognized event is a protocol error. Hook failures
    /// are logged and counted but never returned.
    pub fn dispatch(&self, envelope: &mut Envelope) -> Result<DispatchReport, ProtocolError> {
        let Some(event) = Event::parse(&envelope.event) else {
            tracing::debug!(event = %envelope.event, "Unrecognized event, echoing payload");
            return Ok(DispatchReport::default());
        };

        tracing::debug!(event = event.as_str(), "Dispatching event");

        if event.is_suite() {
            let mut transactions = take_sequence(event, &mut envelope.data)?;
            let report = self.run_suite(event, &mut transactions);
            envelope.data = Value::Array(transactions.into_iter().map(Value::Object).collect());
            Ok(report)
        } else {
            let mut transaction = take_record(event, &mut envelope.data)?;
            let report = self.run_transaction(event, &mut transaction);
            envelope.data = Value::Object(transaction);
            Ok(report)
        }
    }

    fn run_suite(&self, event: Event, transactions: &mut Vec<Transaction>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for phase in event.phases() {
            for descriptor in self.registry.resolve(*phase, None) {
                let Callback::Suite(hook) = &descriptor.callback else {
                    continue;
                };
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook(transactions)));
                record_outcome(descriptor, outcome, &mut report);
            }
        }
        report
    }

    fn run_transaction(&self, event: Event, transaction: &mut Transaction) -> DispatchReport {
        let mut report = DispatchReport::default();
        for phase in event.phases() {
            // Read per segment: a generic hook may rename the transaction
            // before the named segment is resolved.
            let name = transaction_name(transaction);
            for descriptor in self.registry.resolve(*phase, name.as_deref()) {
                let Callback::Transaction(hook) = &descriptor.callback else {
                    continue;
                };
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook(transaction)));
                record_outcome(descriptor, outcome, &mut report);
            }
        }
        report
    }
}

fn transaction_name(transaction: &Transaction) -> Option<String> {
    transaction
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn take_sequence(event: Event, data: &mut Value) -> Result<Vec<Transaction>, ProtocolError> {
    let items = match std::mem::take(data) {
        Value::Array(items) => items,
        other => {
            return Err(shape_error(
                event,
                format!("expected an array of transactions, got {}", value_kind(&other)),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(transaction) => Ok(transaction),
            other => Err(shape_error(
                event,
                format!("item {index} is {}, expected an object", value_kind(&other)),
            )),
        })
        .collect()
}

fn take_record(event: Event, data: &mut Value) -> Result<Transaction, ProtocolError> {
    match std::mem::take(data) {
        Value::Object(transaction) => Ok(transaction),
        other => Err(shape_error(
            event,
            format!("expected a transaction object, got {}", value_kind(&other)),
        )),
    }
}

fn shape_error(event: Event, reason: String) -> ProtocolError {
    ProtocolError::Shape {
        event: event.as_str().to_string(),
        reason,
    }
}

fn record_outcome(
    descriptor: &HookDescriptor,
    outcome: std::thread::Result<anyhow::Result<()>>,
    report: &mut DispatchReport,
) {
    report.invoked += 1;
    match outcome {
        Ok(Ok(())) => {
            tracing::debug!(hook = %descriptor.label, "Hook completed");
        }
        Ok(Err(err)) => {
            report.failed += 1;
            tracing::warn!(hook = %descriptor.label, "Hook failed: {err:#}");
        }
        Err(payload) => {
            report.failed += 1;
            tracing::warn!(
                hook = %descriptor.label,
                "Hook panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
