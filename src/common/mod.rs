//! Common traits and helpers used across the echobin library

pub mod test_utils;
pub mod traits;

pub use test_utils::{TestServer, spawn_test_server};
pub use traits::ServerTrait;
