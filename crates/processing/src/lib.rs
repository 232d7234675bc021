pub mod error;
pub mod normalize;
pub mod reconciler;
pub mod worker;

pub use error::{ReconcileError, WorkerError};
pub use normalize::normalize_text;
pub use reconciler::{FailReason, Outcome, Reconciler, SkipReason};
pub use worker::BatchWorker;
