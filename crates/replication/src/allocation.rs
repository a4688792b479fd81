//! Per-pass allocation context.

use std::cell::Cell;
use std::fmt;
use std::time::Duration;

use corelib::RoutingTable;

use crate::decider::AllocationPolicy;

/// Immutable inputs of one allocation pass.
///
/// The routing snapshot is borrowed for the whole pass, so nothing can
/// mutate it while a decision or a recovery scan is running.
pub struct RoutingAllocation<'a> {
    routing: &'a RoutingTable,
    policy: &'a dyn AllocationPolicy,
    current_time: Duration,
    debug_decision: bool,
    has_pending_async_fetch: Cell<bool>,
}

impl<'a> RoutingAllocation<'a> {
    pub fn new(routing: &'a RoutingTable, policy: &'a dyn AllocationPolicy, current_time: Duration) -> Self {
        Self {
            routing,
            policy,
            current_time,
            debug_decision: false,
            has_pending_async_fetch: Cell::new(false),
        }
    }

    /// Build per-node explanations alongside every verdict.
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.debug_decision = explain;
        self
    }

    pub fn routing(&self) -> &'a RoutingTable {
        self.routing
    }

    pub fn policy(&self) -> &'a dyn AllocationPolicy {
        self.policy
    }

    pub fn current_time(&self) -> Duration {
        self.current_time
    }

    pub fn explain(&self) -> bool {
        self.debug_decision
    }

    /// Record that some shard is waiting on a store fetch.
    pub fn set_has_pending_async_fetch(&self) {
        self.has_pending_async_fetch.set(true);
    }

    pub fn has_pending_async_fetch(&self) -> bool {
        self.has_pending_async_fetch.get()
    }
}

impl fmt::Debug for RoutingAllocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingAllocation")
            .field("policy", &self.policy.name())
            .field("current_time", &self.current_time)
            .field("explain", &self.debug_decision)
            .field("has_pending_async_fetch", &self.has_pending_async_fetch.get())
            .finish()
    }
}
