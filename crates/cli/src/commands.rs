//! CLI commands.

use clap::Subcommand;
use corelib::ShardId;
use replication::{AllocateUnassignedDecision, CancellationAction, ReplicaShardAllocator, RoutingAllocation};
use serde::Serialize;
use tracing::info;

use crate::scenario::Scenario;

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Decide where each unassigned replica goes
    Decide {
        /// Only decide this shard, given as `index:id`
        #[arg(long, value_parser = parse_shard_id)]
        shard: Option<ShardId>,
    },
    /// Cancel recoveries a no-op recovery elsewhere would beat
    Reconcile,
}

/// Verdict for one unassigned copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardDecision {
    pub shard: ShardId,
    pub primary: bool,
    pub explanation: String,
    #[serde(flatten)]
    pub decision: AllocateUnassignedDecision,
}

/// An applied cancellation with its operator message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cancellation {
    #[serde(flatten)]
    pub action: CancellationAction,
    pub message: String,
}

/// Result of command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandResult {
    Decisions(Vec<ShardDecision>),
    Cancellations(Vec<Cancellation>),
}

impl Command {
    pub fn execute(&self, scenario: Scenario, explain: bool) -> anyhow::Result<CommandResult> {
        match self {
            Command::Decide { shard } => decide(scenario, shard.as_ref(), explain),
            Command::Reconcile => reconcile(scenario),
        }
    }
}

fn decide(scenario: Scenario, only: Option<&ShardId>, explain: bool) -> anyhow::Result<CommandResult> {
    let mut allocator = ReplicaShardAllocator::new(scenario.store_fetch());
    let allocation =
        RoutingAllocation::new(&scenario.routing, &scenario.policy, scenario.current_time()).with_explain(explain);

    let mut decisions = Vec::new();
    for shard in scenario.routing.unassigned() {
        if only.is_some_and(|only| *only != shard.shard_id) {
            continue;
        }
        let decision = allocator.make_allocation_decision(shard, &allocation)?;
        info!(shard = %shard.shard_id, verdict = decision.verdict.label(), "decided");
        decisions.push(ShardDecision {
            shard: shard.shard_id.clone(),
            primary: shard.primary,
            explanation: decision.explanation(),
            decision,
        });
    }
    if allocation.has_pending_async_fetch() {
        info!("some store fetches are still running");
    }
    Ok(CommandResult::Decisions(decisions))
}

fn reconcile(scenario: Scenario) -> anyhow::Result<CommandResult> {
    let mut allocator = ReplicaShardAllocator::new(scenario.store_fetch());
    let now = scenario.current_time();
    let Scenario {
        mut routing, policy, ..
    } = scenario;

    let applied = allocator.process_existing_recoveries(&mut routing, &policy, now, |_| true)?;
    info!(cancelled = applied.len(), "reconciled recoveries");

    Ok(CommandResult::Cancellations(
        applied
            .into_iter()
            .map(|action| Cancellation {
                message: action.message(),
                action,
            })
            .collect(),
    ))
}

/// Parse `index:id`. The index name may itself contain colons.
pub fn parse_shard_id(raw: &str) -> Result<ShardId, String> {
    let (index, id) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected index:id, got {:?}", raw))?;
    if index.is_empty() {
        return Err(format!("missing index name in {:?}", raw));
    }
    let id = id.parse().map_err(|e| format!("invalid shard number {:?}: {}", id, e))?;
    Ok(ShardId::new(index, id))
}
