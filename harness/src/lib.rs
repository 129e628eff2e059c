mod adapter;
mod error;
mod harness;
mod options;
mod result;

pub use adapter::*;
pub use error::*;
pub use harness::*;
pub use options::*;
pub use result::*;
