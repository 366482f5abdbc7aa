pub mod cluster;
pub mod cross_batch;
pub mod matchers;
pub mod registry;

pub use cluster::{MentionCluster, WithinBatchResolver};
pub use cross_batch::CrossBatchResolver;
pub use registry::{EntityRegistry, ScoredCandidate};
