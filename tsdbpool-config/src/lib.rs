//! Configuration for the tsdbpool connection pool.

pub mod backends;
pub mod core;
pub mod error;
pub mod general;
pub mod networking;
pub mod util;

pub use backends::Backend;
pub use core::Config;
pub use error::Error;
pub use general::{General, Validation};
pub use networking::Tcp;
