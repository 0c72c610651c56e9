mod handler;

pub use handler::{effective_selected_fields, effective_sorting_parameters, QueryHandler};
