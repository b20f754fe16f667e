//! Aggregation of polygenic scores computed at several thresholds into a
//! single leading-component score per individual.

pub mod error;
pub mod logging;
pub mod types;

pub mod io;
pub mod matrix;
pub mod parallel;
pub mod qc;
pub mod report;
pub mod schema;

pub mod aggregate;
pub mod batch;
pub mod decompose;
pub mod missing;

pub use aggregate::{ScoreAggregator, aggregate, aggregate_aligned};
pub use error::AggregateError;
pub use types::{
    AggregateConfig, AggregateDiagnostics, AggregateOutput, AlignedOutput, DecompositionResult,
    ScoreMatrix,
};
