pub mod config;
pub mod daemon;
pub mod maintenance;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod shutdown;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use daemon::{Daemon, DaemonOutcome, DaemonSettings};
pub use pipeline::{PipelineError, Sink, Source};
