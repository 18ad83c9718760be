pub mod catalog;
pub mod errors;
pub mod eval;
pub mod model;
pub mod preview;
pub mod query;
pub mod util;

pub use catalog::*;
pub use errors::*;
pub use eval::*;
pub use model::*;
pub use query::*;
