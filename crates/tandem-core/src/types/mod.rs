pub mod block;
pub mod execution;
pub mod state;
pub mod validator;

pub use block::*;
pub use execution::*;
pub use state::*;
pub use validator::*;
