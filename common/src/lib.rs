pub mod config;
pub mod env;
pub mod rng;
pub mod runtime;

pub use config::*;
pub use env::*;
pub use rng::*;
pub use runtime::*;
