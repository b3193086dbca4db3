//! Simulation - full economy orchestration
//!
//! Ties together all components:
//! - Matching engine task
//! - One task per agent
//! - Round barrier driving the lockstep
//! - Journal flushing per round

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rust_decimal::Decimal;

use agora_core::{
    AgentAccount, AgentId, Catalog, Journal, ProductId, Role, TradeHistory, Units,
};
use agora_market::{MatchingEngine, Trade};
use agora_sync::RoundBarrier;

use crate::actions::Trader;
use crate::agent::AgentRunner;
use crate::config::AgentSpec;

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of rounds to run
    pub rounds: u64,
    /// Engine poll interval: one idle window of this length signals
    /// quiescence
    pub poll_interval: Duration,
    /// Fixed timeout for every bounded order wait in the resolver
    pub wait_timeout: Duration,
    /// Base seed for the agents' quantity draws; `None` for entropy
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rounds: 200,
            poll_interval: Duration::from_millis(100),
            wait_timeout: Duration::from_millis(100),
            seed: None,
        }
    }
}

/// Final state of one agent after the run.
#[derive(Debug, Clone)]
pub struct AgentSummary {
    pub name: String,
    pub role: Role,
    pub balance: Decimal,
    pub stock: HashMap<ProductId, Units>,
}

/// Simulation results
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Rounds actually completed
    pub rounds_run: u64,
    /// Every executed trade, in execution order
    pub trades: Vec<Trade>,
    /// Final per-agent balances and holdings
    pub agents: Vec<AgentSummary>,
    /// Agents that departed with an error before the run ended
    pub departures: Vec<String>,
}

impl SimulationReport {
    pub fn total_trades(&self) -> usize {
        self.trades.len()
    }
}

/// Full economy simulation: catalog + agent specs + config in, report out.
pub struct Simulation {
    catalog: Arc<Catalog>,
    specs: Vec<AgentSpec>,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(catalog: Catalog, specs: Vec<AgentSpec>, config: SimulationConfig) -> Self {
        Self {
            catalog: Arc::new(catalog),
            specs,
            config,
        }
    }

    /// Run the configured number of rounds and tear everything down.
    pub async fn run(self) -> SimulationReport {
        let journal = Arc::new(Journal::new());
        let history = Arc::new(TradeHistory::new());
        let engine = Arc::new(MatchingEngine::new(
            Arc::clone(&self.catalog),
            Arc::clone(&journal),
            Arc::clone(&history),
            self.config.poll_interval,
        ));
        let barrier = Arc::new(RoundBarrier::new(self.specs.len()));

        let engine_task = tokio::spawn(Arc::clone(&engine).run(Arc::clone(&barrier)));

        let mut accounts: Vec<Arc<AgentAccount>> = Vec::with_capacity(self.specs.len());
        let mut agent_tasks = Vec::with_capacity(self.specs.len());
        for (idx, spec) in self.specs.iter().enumerate() {
            let account = Arc::new(AgentAccount::new(
                idx as AgentId,
                spec.name.clone(),
                spec.role,
                spec.price_tolerance,
            ));
            accounts.push(Arc::clone(&account));

            let trader = Trader::new(
                Arc::clone(&account),
                Arc::clone(&self.catalog),
                Arc::clone(&engine),
                Arc::clone(&history),
                Arc::clone(&journal),
                self.config.wait_timeout,
            );
            let runner = AgentRunner::new(
                account,
                spec.activities.clone(),
                trader,
                Arc::clone(&barrier),
                Arc::clone(&journal),
                self.config.seed.map(|seed| seed.wrapping_add(idx as u64)),
            );
            agent_tasks.push((spec.name.clone(), tokio::spawn(runner.run())));
        }

        info!("waiting for {} agents to load", self.specs.len());
        barrier.wait_all_registered().await;
        info!("all agents loaded");

        let mut rounds_run = 0;
        for round in 1..=self.config.rounds {
            journal.set_round(round);
            barrier.start_round(round);
            if barrier.advance_when_ready().await.is_finished() {
                break;
            }
            rounds_run = round;
            flush_journal(&journal, round);
        }

        info!("simulation finished after {rounds_run} rounds");
        barrier.finish();

        let mut departures = Vec::new();
        for (name, task) in agent_tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!("agent {name} departed with error: {err}");
                    departures.push(name);
                }
                Err(err) => {
                    warn!("agent task {name} failed to join: {err}");
                    departures.push(name);
                }
            }
        }
        if let Err(err) = engine_task.await {
            warn!("engine task failed to join: {err}");
        }

        let agents = accounts
            .iter()
            .map(|account| AgentSummary {
                name: account.name.clone(),
                role: account.role,
                balance: account.wallet.balance(),
                stock: account.stock.quantities(),
            })
            .collect();

        SimulationReport {
            rounds_run,
            trades: engine.trades(),
            agents,
            departures,
        }
    }
}

/// Emit the round's journal through the logger, grouped and tagged.
fn flush_journal(journal: &Journal, round: u64) {
    for entry in journal.entries(round) {
        log::log!(entry.level, "round {round}: {}", entry.message);
    }
}
