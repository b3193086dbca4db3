//! Agora Market
//!
//! Per-product order books and the continuous matching engine.
//!
//! Agents submit limit orders through [`MatchingEngine::submit`] and receive
//! an [`OrderHandle`] to wait (bounded) for completion. The engine task
//! matches crossing orders in the background, settles trades at each side's
//! own limit price, and signals round quiescence to the barrier once a full
//! poll window passes without new orders.

pub mod book;
pub mod engine;
pub mod order;

pub use book::ProductBook;
pub use engine::{MatchingEngine, Trade};
pub use order::{FillOutcome, Order, OrderHandle, OrderId, Side};
