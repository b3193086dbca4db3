//! Agent Runner - per-agent round loop and lifecycle.

use std::sync::Arc;

use log::{Level, debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use agora_core::{Activity, ActivityKind, AgentAccount, Journal, Units};
use agora_sync::RoundBarrier;

use crate::actions::{TradeError, Trader};

/// Task body for one agent: registers with the barrier, then executes its
/// configured activity list once per round until shutdown.
pub struct AgentRunner {
    account: Arc<AgentAccount>,
    /// Execution order is priority order; never re-ordered here.
    activities: Vec<Activity>,
    trader: Trader,
    barrier: Arc<RoundBarrier>,
    journal: Arc<Journal>,
    rng: StdRng,
}

impl AgentRunner {
    pub fn new(
        account: Arc<AgentAccount>,
        activities: Vec<Activity>,
        trader: Trader,
        barrier: Arc<RoundBarrier>,
        journal: Arc<Journal>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            account,
            activities,
            trader,
            barrier,
            journal,
            rng,
        }
    }

    /// Run until the finished flag is set.
    ///
    /// A shutdown observed at any wait is a clean exit. An error outside of
    /// shutdown is an agent departure: the agent leaves the barrier's
    /// active set, notes it in the journal, and escalates the error to the
    /// orchestrator instead of swallowing it.
    pub async fn run(mut self) -> Result<(), TradeError> {
        self.barrier.register();
        debug!("agent {} registered", self.account.name);

        let mut round: u64 = 1;
        loop {
            if self.barrier.wait_round_started(round).await.is_finished() {
                break;
            }

            if let Err(err) = self.play_round().await {
                if self.barrier.is_finished() {
                    break;
                }
                warn!("agent {} departed: {err}", self.account.name);
                self.journal.append(
                    Level::Warn,
                    format!("{} left before the game finished", self.account.name),
                );
                self.barrier.deregister();
                return Err(err);
            }

            self.barrier.agent_done();
            round += 1;
        }

        debug!("agent {} finished", self.account.name);
        Ok(())
    }

    async fn play_round(&mut self) -> Result<(), TradeError> {
        for i in 0..self.activities.len() {
            let activity = self.activities[i];
            let quantity = self.draw_quantity(&activity);
            match activity.kind {
                ActivityKind::Buy => {
                    self.trader.buy(activity.product, quantity)?;
                }
                ActivityKind::Sell => {
                    self.trader.sell(activity.product, quantity).await?;
                }
                ActivityKind::Build => {
                    self.trader.build(activity.product, quantity).await?;
                }
                ActivityKind::Consume => self.trader.consume(activity.product, quantity).await?,
            }
        }
        Ok(())
    }

    /// One uniform draw from `[min, max)`; an empty range yields `min`.
    fn draw_quantity(&mut self, activity: &Activity) -> Units {
        if activity.max_quantity <= activity.min_quantity {
            activity.min_quantity
        } else {
            self.rng
                .gen_range(activity.min_quantity..activity.max_quantity)
        }
    }
}
