use log::debug;
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};

/// How a blocked barrier wait was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The awaited condition held.
    Released,
    /// The global finished flag was set; the caller should wind down.
    Finished,
}

impl WaitOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, WaitOutcome::Finished)
    }
}

#[derive(Debug)]
struct RoundState {
    /// Current round generation; 0 until the first `start_round`.
    round: u64,
    /// Agents that called `agent_done` this generation.
    agents_done: usize,
    /// Whether the engine reported quiescence this generation.
    quiescent: bool,
    /// Agents currently registered and expected to finish each round.
    active: usize,
}

/// Phase synchronizer gating round start and finish for all agent tasks,
/// the matching engine, and the round driver.
///
/// Rounds are published on a monotonically increasing `watch` channel, so a
/// straggling waiter from a previous round compares generations rather than
/// latch object identity - no round transition can be observed out of
/// order, and the per-round latches are re-armed under the same lock that
/// waiters read them through.
#[derive(Debug)]
pub struct RoundBarrier {
    /// Agents that must register before the first round may start.
    expected: usize,
    state: Mutex<RoundState>,
    round_tx: watch::Sender<u64>,
    registered_tx: watch::Sender<usize>,
    /// Woken whenever `agents_done`, `quiescent`, or `active` changes.
    progress: Notify,
    finished_tx: watch::Sender<bool>,
}

impl RoundBarrier {
    pub fn new(expected: usize) -> Self {
        let (round_tx, _) = watch::channel(0);
        let (registered_tx, _) = watch::channel(0);
        let (finished_tx, _) = watch::channel(false);

        Self {
            expected,
            state: Mutex::new(RoundState {
                round: 0,
                agents_done: 0,
                quiescent: false,
                active: 0,
            }),
            round_tx,
            registered_tx,
            progress: Notify::new(),
            finished_tx,
        }
    }

    /// One-time registration of an agent task.
    pub fn register(&self) {
        self.state.lock().active += 1;
        self.registered_tx.send_modify(|n| *n += 1);
    }

    /// Remove a departed agent from the active set so the current and all
    /// future rounds stop waiting on it.
    pub fn deregister(&self) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        drop(state);
        self.progress.notify_waiters();
    }

    /// Block until every expected agent has registered.
    pub async fn wait_all_registered(&self) -> WaitOutcome {
        let mut rx = self.registered_tx.subscribe();
        let expected = self.expected;
        tokio::select! {
            _ = self.finished() => WaitOutcome::Finished,
            res = rx.wait_for(|&n| n >= expected) => match res {
                Ok(_) => WaitOutcome::Released,
                Err(_) => WaitOutcome::Finished,
            },
        }
    }

    /// Re-arm the per-round latches for generation `round` and release all
    /// agents waiting to begin it. Orchestrator only.
    pub fn start_round(&self, round: u64) {
        {
            let mut state = self.state.lock();
            state.round = round;
            state.agents_done = 0;
            state.quiescent = false;
        }
        debug!("round {round} started");
        let _ = self.round_tx.send(round);
    }

    /// Block an agent until round `round` (or a later one) has started.
    pub async fn wait_round_started(&self, round: u64) -> WaitOutcome {
        let mut rx = self.round_tx.subscribe();
        tokio::select! {
            _ = self.finished() => WaitOutcome::Finished,
            res = rx.wait_for(|&r| r >= round) => match res {
                Ok(_) => WaitOutcome::Released,
                Err(_) => WaitOutcome::Finished,
            },
        }
    }

    /// Called exactly once per agent when its round's activities complete.
    pub fn agent_done(&self) {
        self.state.lock().agents_done += 1;
        self.progress.notify_waiters();
    }

    /// Called by the engine when it observed no new orders for a full poll
    /// window. Idempotent within a round.
    pub fn market_quiescent(&self) {
        self.state.lock().quiescent = true;
        self.progress.notify_waiters();
    }

    /// Block the orchestrator until every active agent has finished the
    /// current round and the market has gone quiescent.
    pub async fn advance_when_ready(&self) -> WaitOutcome {
        loop {
            let notified = self.progress.notified();
            {
                let state = self.state.lock();
                if state.agents_done >= state.active && state.quiescent {
                    debug!("round {} complete", state.round);
                    return WaitOutcome::Released;
                }
            }
            tokio::select! {
                _ = self.finished() => return WaitOutcome::Finished,
                _ = notified => {}
            }
        }
    }

    /// Set the global finished flag: every blocked wait returns promptly.
    pub fn finish(&self) {
        let _ = self.finished_tx.send(true);
        self.progress.notify_waiters();
    }

    pub fn is_finished(&self) -> bool {
        *self.finished_tx.borrow()
    }

    async fn finished(&self) {
        let mut rx = self.finished_tx.subscribe();
        // The sender lives in `self`, so this wait only ever resolves on a
        // genuine finish.
        let _ = rx.wait_for(|&finished| finished).await;
    }
}
