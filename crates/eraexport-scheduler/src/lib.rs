//! eraexport-scheduler — runs the era-scanner and head-subscription export
//! policies on top of `eraexport-core`.

pub mod builder;
pub mod catchup;
pub mod error;
pub mod export;
pub mod head;
pub mod historic;
pub mod scheduler;
pub mod tracing_setup;

pub use builder::SchedulerBuilder;
pub use catchup::{CatchupOptions, CatchupPolicy, EraScanner};
pub use error::{SchedulerError, Shutdown};
pub use export::Exporter;
pub use head::{HeadOptions, HeadPolicy, WriteLock};
pub use scheduler::{start, Collaborators, Mode, Scheduler};
pub use tracing_setup::init_tracing;
