pub mod models;
pub mod schema;
pub mod types;

pub use models::*;
pub use types::*;
