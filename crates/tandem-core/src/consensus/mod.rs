pub mod extra;
pub mod seal;

pub use extra::*;
pub use seal::*;
