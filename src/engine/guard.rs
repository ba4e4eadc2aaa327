// src/engine/guard.rs

use std::collections::HashMap;

use tracing::debug;

use crate::engine::TaskName;
use crate::types::TriggerWhileRunningBehaviour;

/// What the guard decided for a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// The task was idle; run it now.
    Dispatch,
    /// The task is running; one re-run is now pending.
    Queued,
    /// The task is running and a re-run was already pending.
    Coalesced,
    /// The task is running and the behaviour is `ignore`.
    Dropped,
}

/// Re-entrancy guard keyed by task name.
///
/// Invariant: a task is dispatched only when it is not in flight, so there is
/// never more than one execution per task name. With `Queue`, any number of
/// triggers during a run collapse into exactly one follow-up run.
#[derive(Debug)]
pub struct RerunGuard {
    behaviour: TriggerWhileRunningBehaviour,
    /// In-flight tasks -> whether a re-run is pending.
    in_flight: HashMap<TaskName, bool>,
}

impl RerunGuard {
    pub fn new(behaviour: TriggerWhileRunningBehaviour) -> Self {
        Self {
            behaviour,
            in_flight: HashMap::new(),
        }
    }

    pub fn on_trigger(&mut self, task: &str) -> TriggerDecision {
        if !self.in_flight.contains_key(task) {
            self.in_flight.insert(task.to_string(), false);
            return TriggerDecision::Dispatch;
        }

        let behaviour = self.behaviour;
        let pending = self.in_flight.entry(task.to_string()).or_insert(false);
        let decision = match (behaviour, *pending) {
            (TriggerWhileRunningBehaviour::Ignore, _) => TriggerDecision::Dropped,
            (TriggerWhileRunningBehaviour::Queue, true) => TriggerDecision::Coalesced,
            (TriggerWhileRunningBehaviour::Queue, false) => {
                *pending = true;
                TriggerDecision::Queued
            }
        };
        debug!(task = %task, ?decision, "trigger while task in flight");
        decision
    }

    /// Record completion. Returns true if a pending re-run should start now;
    /// the task then stays in flight.
    pub fn on_completion(&mut self, task: &str) -> bool {
        match self.in_flight.get_mut(task) {
            Some(pending) if *pending => {
                *pending = false;
                true
            }
            Some(_) => {
                self.in_flight.remove(task);
                false
            }
            None => false,
        }
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.in_flight.contains_key(task)
    }

    pub fn has_pending(&self, task: &str) -> bool {
        self.in_flight.get(task).copied().unwrap_or(false)
    }

    /// True when nothing is running or pending.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }
}
