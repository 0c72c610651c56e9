//! Compilation of search requests into aggregation pipelines.

mod compiler;
pub mod paths;
pub mod stages;

pub use compiler::{build_pipeline, PipelineInput};
