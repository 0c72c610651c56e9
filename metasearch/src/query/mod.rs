//! Search request and result models.

mod results;
mod types;

pub use results::{Facet, FacetOption, QueryResults};
pub use types::{Filter, Resource, SearchRequest, SortOrder, SortingParameter};
