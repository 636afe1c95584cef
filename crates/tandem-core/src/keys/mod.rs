pub mod transaction;
pub mod vault;

pub use transaction::*;
pub use vault::*;
