use super::error::HttpError;
use super::synth::Synthesizer;
use http::{Method, StatusCode};
use std::time::Duration;

/// Largest body `/bytes/{n}` will produce
pub const MAX_RANDOM_BYTES: usize = 100 * 1024;

/// Capabilities reachable through the route table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    EchoGet,
    EchoBody,
    StatusCode,
    HeadersReflect,
    IpReport,
    UserAgentReport,
    DelayedEcho,
    UuidGen,
    Base64Decode,
    Base64Encode,
    RandomBytes,
    FixedJson,
    FixedHtml,
    FixedXml,
    FixedRobots,
}

struct Route {
    method: &'static str,
    pattern: &'static str,
    endpoint: Endpoint,
}

const fn route(method: &'static str, pattern: &'static str, endpoint: Endpoint) -> Route {
    Route {
        method,
        pattern,
        endpoint,
    }
}

// Patterns are exact: literal segments must match byte for byte and a
// `{name}` segment captures exactly one non-empty segment.
const ROUTES: &[Route] = &[
    route("GET", "/get", Endpoint::EchoGet),
    route("POST", "/post", Endpoint::EchoBody),
    route("PUT", "/put", Endpoint::EchoBody),
    route("PATCH", "/patch", Endpoint::EchoBody),
    route("DELETE", "/delete", Endpoint::EchoGet),
    route("GET", "/status/{code}", Endpoint::StatusCode),
    route("POST", "/status/{code}", Endpoint::StatusCode),
    route("PUT", "/status/{code}", Endpoint::StatusCode),
    route("PATCH", "/status/{code}", Endpoint::StatusCode),
    route("DELETE", "/status/{code}", Endpoint::StatusCode),
    route("GET", "/headers", Endpoint::HeadersReflect),
    route("GET", "/ip", Endpoint::IpReport),
    route("GET", "/user-agent", Endpoint::UserAgentReport),
    route("GET", "/delay/{seconds}", Endpoint::DelayedEcho),
    route("GET", "/uuid", Endpoint::UuidGen),
    route("GET", "/base64/{payload}", Endpoint::Base64Decode),
    route("POST", "/base64/encode", Endpoint::Base64Encode),
    route("GET", "/bytes/{n}", Endpoint::RandomBytes),
    route("GET", "/json", Endpoint::FixedJson),
    route("GET", "/html", Endpoint::FixedHtml),
    route("GET", "/xml", Endpoint::FixedXml),
    route("GET", "/robots.txt", Endpoint::FixedRobots),
];

/// Outcome of routing: the synthesizer to run and the raw path parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub synthesizer: Synthesizer,
    pub params: Vec<(&'static str, String)>,
}

/// Maps `(method, path)` onto the fixed route table
#[derive(Debug, Clone)]
pub struct Router {
    max_delay: Duration,
}

impl Router {
    pub fn new(max_delay: Duration) -> Self {
        Self { max_delay }
    }

    /// Finds the route for `method` and the still percent-encoded `path`
    ///
    /// Path parameters are validated here so that synthesizers only ever see
    /// typed, in-range arguments.
    pub fn route(&self, method: &Method, path: &str) -> Result<RouteMatch, HttpError> {
        let segments: Vec<&str> = match path.strip_prefix('/') {
            Some(rest) => rest.split('/').collect(),
            None => return Err(HttpError::NotFound),
        };

        let (endpoint, params) = ROUTES
            .iter()
            .filter(|route| route.method == method.as_str())
            .find_map(|route| match_pattern(route.pattern, &segments).map(|p| (route.endpoint, p)))
            .ok_or(HttpError::NotFound)?;

        let synthesizer = self.bind(endpoint, &params)?;
        Ok(RouteMatch {
            synthesizer,
            params,
        })
    }

    fn bind(
        &self,
        endpoint: Endpoint,
        params: &[(&'static str, String)],
    ) -> Result<Synthesizer, HttpError> {
        let param = |name: &str| {
            params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str())
                .unwrap_or_default()
        };

        Ok(match endpoint {
            Endpoint::EchoGet => Synthesizer::EchoGet,
            Endpoint::EchoBody => Synthesizer::EchoBody,
            Endpoint::StatusCode => Synthesizer::StatusCode(parse_status(param("code"))?),
            Endpoint::HeadersReflect => Synthesizer::HeadersReflect,
            Endpoint::IpReport => Synthesizer::IpReport,
            Endpoint::UserAgentReport => Synthesizer::UserAgentReport,
            Endpoint::DelayedEcho => {
                let requested = parse_seconds(param("seconds"))?;
                let delay = Duration::try_from_secs_f64(requested)
                    .unwrap_or(Duration::MAX)
                    .min(self.max_delay);
                Synthesizer::DelayedEcho { requested, delay }
            }
            Endpoint::UuidGen => Synthesizer::UuidGen,
            Endpoint::Base64Decode => Synthesizer::Base64Decode(param("payload").to_string()),
            Endpoint::Base64Encode => Synthesizer::Base64Encode,
            Endpoint::RandomBytes => Synthesizer::RandomBytes(parse_byte_count(param("n"))?),
            Endpoint::FixedJson => Synthesizer::FixedJson,
            Endpoint::FixedHtml => Synthesizer::FixedHtml,
            Endpoint::FixedXml => Synthesizer::FixedXml,
            Endpoint::FixedRobots => Synthesizer::FixedRobots,
        })
    }
}

fn match_pattern(pattern: &str, segments: &[&str]) -> Option<Vec<(&'static str, String)>> {
    let expected: Vec<&str> = pattern.trim_start_matches('/').split('/').collect();
    if expected.len() != segments.len() {
        return None;
    }

    let mut params = Vec::new();
    for (want, got) in expected.iter().zip(segments) {
        match want.strip_prefix('{').and_then(|w| w.strip_suffix('}')) {
            Some(name) => {
                if got.is_empty() {
                    return None;
                }
                params.push((param_name(name), decode_segment(got)));
            }
            None if want == got => {}
            None => return None,
        }
    }
    Some(params)
}

/// Parameter names are interned from the static route table
fn param_name(name: &str) -> &'static str {
    match name {
        "code" => "code",
        "seconds" => "seconds",
        "payload" => "payload",
        "n" => "n",
        _ => "param",
    }
}

fn decode_segment(segment: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned()
}

/// Accepts `404` or a comma-separated list such as `500,503`, first entry wins
fn parse_status(raw: &str) -> Result<StatusCode, HttpError> {
    let first = raw.split(',').next().unwrap_or_default().trim();
    let code: u16 = first
        .parse()
        .map_err(|_| {
            HttpError::InvalidParameter(format!("status code must be an integer, got {first:?}"))
        })?;
    if !(100..=599).contains(&code) {
        return Err(HttpError::InvalidParameter(format!(
            "status code must be between 100 and 599, got {code}"
        )));
    }
    StatusCode::from_u16(code)
        .map_err(|e| HttpError::InvalidParameter(format!("invalid status code {code}: {e}")))
}

fn parse_seconds(raw: &str) -> Result<f64, HttpError> {
    let seconds: f64 = raw
        .parse()
        .map_err(|_| {
            HttpError::InvalidParameter(format!("delay must be a number of seconds, got {raw:?}"))
        })?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(HttpError::InvalidParameter(format!(
            "delay must be a non-negative number of seconds, got {raw:?}"
        )));
    }
    Ok(seconds)
}

fn parse_byte_count(raw: &str) -> Result<usize, HttpError> {
    match raw.parse::<usize>() {
        Ok(n) if (1..=MAX_RANDOM_BYTES).contains(&n) => Ok(n),
        _ => Err(HttpError::InvalidParameter(format!(
            "n must be an integer between 1 and {MAX_RANDOM_BYTES}, got {raw:?}"
        ))),
    }
}
