//! Agora Runner - Multi-Agent Commodity Economy Simulation
//!
//! Orchestrates the full economy with one task per agent plus a matching
//! engine task, all marching in lockstep rounds:
//!
//! ```text
//!  ┌──────────────┐   activities    ┌─────────────────┐
//!  │ AgentRunner  │──buy/sell/──────▶│    Trader       │
//!  │ (one task    │  build/consume  │ (resolver verbs)│
//!  │  per agent)  │                 └────────┬────────┘
//!  └──────┬───────┘                          │ orders
//!         │ register/done                    ▼
//!  ┌──────▼───────┐   quiescence    ┌─────────────────┐
//!  │ RoundBarrier │◀────────────────│ MatchingEngine  │
//!  └──────▲───────┘                 │ (one task)      │
//!         │ start/advance           └─────────────────┘
//!  ┌──────┴───────┐
//!  │  Simulation  │  (round driver)
//!  └──────────────┘
//! ```
//!
//! The JSON config feeds ([`config`]) resolve into an immutable catalog and
//! agent specs before any task starts; load errors are fatal up front.

pub mod actions;
pub mod agent;
pub mod config;
pub mod simulation;

// Re-export main types
pub use actions::{TradeError, Trader};
pub use agent::AgentRunner;
pub use config::{AgentSpec, ConfigError, load_agents, load_catalog};
pub use simulation::{AgentSummary, Simulation, SimulationConfig, SimulationReport};
