pub mod analysis; // Remote model calls + response recovery
pub mod ids;
pub mod processor; // Sequential claim pipeline
pub mod stats;
pub mod store; // Claim history snapshot

pub use processor::{BatchReport, ClaimPipeline, LogObserver, TransitionObserver};
pub use stats::{average_risk, ClaimStats};
pub use store::ClaimStore;
