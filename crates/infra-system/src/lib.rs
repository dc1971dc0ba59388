// Plot Palette Infrastructure - System Adapters
// Implements: ComputeRuntime, ModelClient, SeedDataSource

pub mod compute_runtime;
pub mod model_client;
pub mod seed_data_source;

pub use compute_runtime::TokioComputeRuntime;
pub use model_client::{HttpModelClient, TierEndpoint};
pub use seed_data_source::FileSeedDataSource;
