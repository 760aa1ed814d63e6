pub mod api;
pub mod config;
pub mod fetch;
pub mod input;
pub mod ledger;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod record;
pub mod retry;
pub mod shutdown;
pub mod store;
pub mod submit;
pub mod task;
pub mod testing;

pub use api::{ApiError, DataForSeoClient, Fetcher, Submitter};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use fetch::{FetchStrategy, FetchSummary, ResultFetcher};
pub use ledger::{ErrorRecord, FailureCategory, FailureReporter, Issue, LedgerHandle};
pub use pipeline::{Pipeline, PipelineError, RunSummary};
pub use progress::{ProgressCursor, ProgressTracker};
pub use record::{ArtifactPath, NormalizedRecord, RawRow};
pub use reconcile::ReconcileSummary;
pub use retry::{RetrySummary, ThinScan};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use store::MergeSummary;
pub use task::{FetchProfile, TaskBuilder, TaskDescriptor};
