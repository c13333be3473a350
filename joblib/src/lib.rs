pub mod error;
pub mod events;
mod job;
mod launcher;
pub mod registry;
pub mod types;

pub use events::{JobEvent, LogEntry, LogSink};
pub use launcher::JobLauncher;
pub use registry::{JobSnapshot, JobState};
