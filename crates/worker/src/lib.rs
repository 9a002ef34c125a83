//! Wiring for the pricing pipeline worker: pick stores and consumers from the
//! configuration and run the configured task.

pub mod pipeline;

pub use pipeline::{build_publisher, run_task, TaskSummary};
