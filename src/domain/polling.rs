//! Polling of running strategy executions.
//!
//! Every watch is tied to a [`Generation`]. Selecting another execution
//! advances the shared [`GenerationCounter`]; a loop holding an older
//! generation stops before its next tick and drops any reply that arrives
//! after the switch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::domain::error::StratifyError;
use crate::domain::execution::StrategyExecution;
use crate::ports::api_port::StratifyApi;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

/// Shared source of generation tokens.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidates every outstanding token and returns a fresh one.
    pub fn advance(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

#[derive(Debug)]
pub enum PollOutcome {
    /// The execution stopped running; holds its final state.
    Finished(StrategyExecution),
    /// Another execution was selected.
    Superseded,
    Failed(StratifyError),
}

pub struct ExecutionPoller {
    api: Arc<dyn StratifyApi>,
    generations: GenerationCounter,
    interval: Duration,
}

impl ExecutionPoller {
    pub fn new(api: Arc<dyn StratifyApi>, generations: GenerationCounter) -> Self {
        Self {
            api,
            generations,
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn generations(&self) -> &GenerationCounter {
        &self.generations
    }

    /// Refreshes `execution_id` every interval while it runs, passing each
    /// fresh copy to `apply`. Replies that arrive after `generation` was
    /// superseded are never applied.
    pub async fn watch<F>(&self, execution_id: u64, generation: Generation, mut apply: F) -> PollOutcome
    where
        F: FnMut(StrategyExecution),
    {
        info!(execution_id, "watching execution");
        let mut tick: u64 = 0;
        loop {
            if !self.generations.is_current(generation) {
                debug!(execution_id, "poll superseded before tick");
                return PollOutcome::Superseded;
            }
            sleep(self.interval).await;
            if !self.generations.is_current(generation) {
                debug!(execution_id, "poll superseded while waiting");
                return PollOutcome::Superseded;
            }

            tick += 1;
            let reply = self.api.execution(execution_id).await;
            if !self.generations.is_current(generation) {
                debug!(execution_id, tick, "discarding stale execution reply");
                return PollOutcome::Superseded;
            }
            let execution = match reply {
                Ok(execution) => execution,
                Err(err) => {
                    warn!(execution_id, tick, error = %err, "execution poll failed");
                    return PollOutcome::Failed(err);
                }
            };

            debug!(execution_id, tick, running = execution.running, "execution polled");
            let running = execution.running;
            apply(execution.clone());
            if !running {
                info!(execution_id, ticks = tick, "execution finished");
                return PollOutcome::Finished(execution);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_invalidates_older_tokens() {
        let counter = GenerationCounter::new();
        let first = counter.advance();
        assert!(counter.is_current(first));
        let second = counter.advance();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn clones_share_the_counter() {
        let counter = GenerationCounter::new();
        let shared = counter.clone();
        let token = counter.advance();
        assert_eq!(shared.current(), token);
        shared.advance();
        assert!(!counter.is_current(token));
    }
}
