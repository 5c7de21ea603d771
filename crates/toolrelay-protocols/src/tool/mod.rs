//! Tool protocol definitions.
//!
//! Tools are the capabilities a tool server exposes to the agent loop.

mod call;
mod definition;
mod result;
mod traits;

pub use call::*;
pub use definition::*;
pub use result::*;
pub use traits::*;
