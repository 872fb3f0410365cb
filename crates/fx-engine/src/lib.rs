//! Decision engine: drives strategies from the quote feed and keeps the
//! trade audit log.

mod decision_loop;

pub use decision_loop::{CycleOutcome, DecisionLoop, DecisionLoopConfig, LoopStats, ShutdownHandle};
