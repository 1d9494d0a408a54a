//! HTTP echo and diagnostics service
//!
//! Requests flow through the [`codec`] (framing and introspection), the
//! [`router`] (route table and path parameters), a [`synth`] synthesizer and
//! back out through the [`server`] runtime.

pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod synth;

#[cfg(test)]
mod tests;

pub use client::{ClientResponse, HttpClient};
pub use codec::HttpCodec;
pub use config::HttpConfig;
pub use dispatch::Dispatcher;
pub use error::HttpError;
pub use request::{Headers, IncomingRequest, QueryParams};
pub use response::OutgoingResponse;
pub use router::{RouteMatch, Router};
pub use server::HttpServer;
pub use synth::{Entropy, Synthesizer};
