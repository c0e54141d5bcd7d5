pub mod scheduler;
pub mod snapshot;
