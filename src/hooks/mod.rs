//! Hook registration.
//!
//! Hooks are attached to a [`HookPhase`]. Generic phases (`before_each`,
//! `after_each`, ...) fire for every transaction; named phases fire only for
//! the transaction whose `name` equals the registered filter exactly.
//!
//! ## Registration order
//!
//! Within a phase, hooks fire in the order they were registered. The relative
//! order of generic and named hooks is decided by the dispatcher.

mod phase;
mod registry;


pub use phase::HookPhase;
pub use registry::{Callback, HookDescriptor, HookRegistry, SuiteHook, Transaction, TransactionHook};
