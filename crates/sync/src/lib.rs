//! Agora Round Synchronization
//!
//! A generation-counted barrier coordinating the per-round lockstep of
//! agent tasks, the matching engine, and the orchestrator:
//!
//! ```text
//!  orchestrator          agents (xN)           engine
//!  ------------          -----------           ------
//!  wait_all_registered   register
//!  start_round(r)   ---> wait_round_started(r)
//!                        ...activities...      ...matching...
//!                        agent_done
//!  advance_when_ready <------------------ market_quiescent
//!  start_round(r+1) ...
//! ```
//!
//! A single global finished flag converts every blocked wait into a prompt
//! cooperative return once shutdown begins.

pub mod barrier;

pub use barrier::{RoundBarrier, WaitOutcome};
