//! Batch track analysis for autodj - bounded worker pool with progress events

mod pool;

pub use pool::{
    AnalysisJob, AnalysisPool, BatchError, BatchProgress, BatchResult, JobOutcome, PoolConfig,
};
