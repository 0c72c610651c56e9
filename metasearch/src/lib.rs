//! Faceted metadata search over denormalized JSON resources.
//!
//! Searches compile into a single aggregation pipeline that returns hits, the
//! total count and facet distributions in one round trip.

pub mod api;
pub mod collection;
pub mod config;
pub mod error;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod store;

pub use collection::QueryHandler;
pub use config::Config;
pub use error::{AggregationContext, AggregationError, Error, Result};
