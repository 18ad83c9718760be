pub mod fixture;
pub mod loader;
pub mod mem;
pub mod saved;
pub mod traits;

pub use fixture::{fixture_items, FIXTURE_SOURCE};
pub use loader::{load_items, parse_items, LoadError};
pub use mem::{ItemCollection, LoadOrigin, LoadSummary};
pub use saved::InMemorySavedQueries;
pub use traits::*;
