//! C6: Job Queue & Scheduler — one ordered queue, at most one running job,
//! gentle/force prioritization, and `force`-preemption auto-resumption
//! (spec.md §4.6).

mod scheduler;
mod state;

pub use scheduler::{JobQueue, QueueStatus};
