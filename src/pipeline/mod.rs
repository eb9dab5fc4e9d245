//! Pipeline stages for the upgrade watcher.
//!
//! - `JobRunner`: search each pending job and locate its flight
//! - `UpgradeEvaluator`: classify located flights and alert on upgrades
//! - `Pipeline`: one full pass, runner then evaluator then snapshot
//! - `Scheduler`: repeat passes on a fixed interval

mod evaluate;
mod pass;
mod runner;
mod scheduler;

#[cfg(test)]
mod testing;

pub use evaluate::{Evaluation, UpgradeEvaluator};
pub use pass::{PassReport, Pipeline};
pub use runner::{JobRunner, select_flight};
pub use scheduler::{Scheduler, SchedulerExit};
