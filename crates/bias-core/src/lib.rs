pub mod breaker;
pub mod error;
pub mod factors;
pub mod signals;
pub mod traits;
pub mod types;

pub use breaker::*;
pub use error::*;
pub use factors::*;
pub use signals::*;
pub use traits::*;
pub use types::*;
