mod loader;
mod types;

pub use loader::ClassLoader;
pub use types::{
    derive_display_name, ClassDefinition, FieldLabel, SearchableClass, SearchableClasses,
    ID_FIELD,
};
