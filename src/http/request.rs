use std::{borrow::Cow, collections::HashMap, sync::OnceLock};

use serde_json::Value;

use super::{Method, Version};
use crate::error::Result;

/// A framed HTTP request. Built once per connection by the parser and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Percent-decoded path without the query string; leading slash and
    /// no trailing slash except for the root.
    pub path: String,
    pub version: Version,
    /// Header names as received. Duplicates keep the last value.
    pub headers: HashMap<String, String>,
    /// Distinct header names in the order they first arrived.
    header_order: Vec<String>,
    /// Decoded query parameters. Duplicates keep the first value.
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
    json: OnceLock<Option<Value>>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Request {
            method,
            path: path.into(),
            version: Version::HTTP1_1,
            headers: HashMap::new(),
            header_order: Vec::new(),
            query: HashMap::new(),
            body: Vec::new(),
            json: OnceLock::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    /// Stores a header, replacing an earlier value under the exact same name.
    pub fn insert_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !self.headers.contains_key(&name) {
            self.header_order.push(name.clone());
        }
        self.headers.insert(name, value.into());
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(key.into()).or_insert_with(|| value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.json = OnceLock::new();
        self
    }

    /// Case-insensitive header lookup.
    ///
    /// When several spellings of `name` were received (`Content-Length` and
    /// `content-length`), the one that arrived first wins. Entries added
    /// straight to `headers` fall back to the smallest matching name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_order
            .iter()
            .filter(|key| key.eq_ignore_ascii_case(name))
            .find_map(|key| self.headers.get(key))
            .or_else(|| {
                self.headers
                    .iter()
                    .filter(|(key, _)| key.eq_ignore_ascii_case(name))
                    .min_by(|a, b| a.0.cmp(b.0))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    pub fn query_param(&self, key: &str) -> Option<&String> {
        self.query.get(key)
    }

    /// The body as text, failing if it is not valid UTF-8.
    pub fn text(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.body)?)
    }

    /// The body as text with invalid sequences replaced.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The body decoded as JSON, or `None` if it does not parse.
    /// Decoding happens on first access and is cached.
    pub fn json(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| serde_json::from_slice(&self.body).ok())
            .as_ref()
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.path == other.path
            && self.version == other.version
            && self.headers == other.headers
            && self.query == other.query
            && self.body == other.body
    }
}
