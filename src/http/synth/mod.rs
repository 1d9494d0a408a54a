//! Response synthesizers
//!
//! One variant per diagnostic capability. Every variant is driven through
//! [`Synthesizer::respond`], which turns a request into a response without
//! touching any state shared with other requests, apart from the injected
//! random source.

mod dynamic;
mod echo;
mod formats;
mod status;

use super::error::HttpError;
use super::request::IncomingRequest;
use super::response::OutgoingResponse;
use http::StatusCode;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// A routed capability with its validated path arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesizer {
    EchoGet,
    EchoBody,
    StatusCode(StatusCode),
    HeadersReflect,
    IpReport,
    UserAgentReport,
    DelayedEcho { requested: f64, delay: Duration },
    UuidGen,
    Base64Decode(String),
    Base64Encode,
    RandomBytes(usize),
    FixedJson,
    FixedHtml,
    FixedXml,
    FixedRobots,
}

impl Synthesizer {
    /// Produces the response for `req`
    ///
    /// Only `DelayedEcho` suspends; dropping the returned future cancels its
    /// timer.
    pub async fn respond(
        &self,
        req: &IncomingRequest,
        entropy: &Entropy,
    ) -> Result<OutgoingResponse, HttpError> {
        match self {
            Synthesizer::EchoGet => Ok(echo::echo_get(req)),
            Synthesizer::EchoBody => Ok(echo::echo_body(req)),
            Synthesizer::StatusCode(code) => Ok(status::status_code(*code)),
            Synthesizer::HeadersReflect => Ok(echo::headers(req)),
            Synthesizer::IpReport => Ok(echo::ip(req)),
            Synthesizer::UserAgentReport => Ok(echo::user_agent(req)),
            Synthesizer::DelayedEcho { requested, delay } => {
                Ok(dynamic::delayed_echo(req, *requested, *delay).await)
            }
            Synthesizer::UuidGen => Ok(dynamic::uuid(entropy)),
            Synthesizer::Base64Decode(payload) => dynamic::base64_decode(payload),
            Synthesizer::Base64Encode => dynamic::base64_encode(req),
            Synthesizer::RandomBytes(n) => Ok(dynamic::random_bytes(*n, entropy)),
            Synthesizer::FixedJson => Ok(formats::json()),
            Synthesizer::FixedHtml => Ok(formats::html()),
            Synthesizer::FixedXml => Ok(formats::xml()),
            Synthesizer::FixedRobots => Ok(formats::robots_txt()),
        }
    }
}

/// Process-wide random source for uuids and random bytes
///
/// Seeded from the OS by default; tests use [`Entropy::seeded`] for
/// reproducible output.
#[derive(Debug)]
pub struct Entropy {
    rng: Mutex<StdRng>,
}

impl Entropy {
    pub fn from_os() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn fill(&self, dest: &mut [u8]) {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fill_bytes(dest);
    }

    /// A fresh version 4 UUID
    pub fn uuid_v4(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.fill(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

impl Default for Entropy {
    fn default() -> Self {
        Self::from_os()
    }
}
