//! REST front for dimension selection
//!
//! Form posts from the dimension pages land here and are answered with a
//! 303 to the next page; reads are answered with JSON.

pub mod error;
pub mod selection_routes;

pub use error::AppError;
pub use selection_routes::{create_selection_router, DynSelector, SelectionState};
