pub mod config;
pub mod error;
pub mod progress;
pub mod supervisor;

pub use config::{EnvLoader, ExecutionMode, RuntimeConfig};
pub use error::SupervisorError;
pub use progress::{FeedProgress, OverallProgress, ProgressService};
pub use supervisor::Supervisor;
