use bytes::Bytes;
use http::{Method, Version};
use serde_json::{Map, Value};
use std::net::SocketAddr;

/// Request headers in the order and spelling they were received
///
/// Lookup is case-insensitive; the JSON view keeps the original names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value for `name`, compared case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All values for `name`, compared case-insensitively
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether a comma-separated header such as `Connection` lists `token`
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .flat_map(|value| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    }

    /// JSON object of every header, case preserved
    ///
    /// Repeated headers with identical spelling are joined with `", "`.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (name, value) in &self.0 {
            match object.get_mut(name) {
                Some(Value::String(existing)) => {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
                _ => {
                    object.insert(name.clone(), Value::String(value.clone()));
                }
            }
        }
        Value::Object(object)
    }
}

/// Decoded `key=value` pairs, duplicates kept in submission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parses an `application/x-www-form-urlencoded` string
    ///
    /// Pairs are split on `&` then `=`, percent escapes and `+` are decoded,
    /// and a key without `=` maps to the empty string.
    pub fn parse(input: &[u8]) -> Self {
        Self(
            url::form_urlencoded::parse(input)
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    /// JSON object: single values as strings, repeated keys as arrays
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (key, value) in &self.0 {
            let value = Value::String(value.clone());
            match object.get_mut(key) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    object.insert(key.clone(), value);
                }
            }
        }
        Value::Object(object)
    }
}

/// A fully received HTTP request
///
/// Built once by the codec and only read afterwards; it lives for a single
/// request/response cycle.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    method: Method,
    version: Version,
    target: String,
    headers: Headers,
    body: Bytes,
    query: QueryParams,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl IncomingRequest {
    pub fn new(
        method: Method,
        version: Version,
        target: impl Into<String>,
        headers: Headers,
        body: Bytes,
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
    ) -> Self {
        let target = target.into();
        let query = match target.split_once('?') {
            Some((_, query)) => QueryParams::parse(query.as_bytes()),
            None => QueryParams::default(),
        };
        Self {
            method,
            version,
            target,
            headers,
            body,
            query,
            remote_addr,
            local_addr,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path portion of the target, still percent-encoded
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Client IP address as reported in `origin` fields
    pub fn origin(&self) -> String {
        self.remote_addr.ip().to_string()
    }

    /// Absolute URL the client asked for
    pub fn url(&self) -> String {
        match self.headers.get("host") {
            Some(host) if !host.is_empty() => format!("http://{host}{}", self.target),
            _ => format!("http://{}{}", self.local_addr, self.target),
        }
    }

    /// Whether the connection should stay open after answering this request
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_token("connection", "close") {
            return false;
        }
        match self.version {
            Version::HTTP_10 | Version::HTTP_09 => {
                self.headers.has_token("connection", "keep-alive")
            }
            _ => true,
        }
    }
}
