// Library exports for integration tests and the binary.

pub mod error;
pub mod matching;
pub mod model;
pub mod request;
pub mod resolver;
pub mod scripting;
pub mod server;
pub mod store;
pub mod template;
pub mod ws;
