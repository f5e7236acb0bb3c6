use serde_json::{Value, json};

use super::{StatusCode, Version};

const DEFAULT_CONTENT_TYPE: &str = "text/plain";
const JSON_CONTENT_TYPE: &str = "application/json";

/// The shapes a response body can take.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A structured value, serialized as JSON.
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    /// Stringifies any displayable value into a text body.
    pub fn display(value: impl std::fmt::Display) -> Self {
        Body::Text(value.to_string())
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            Body::Json(value) => value.to_string().into_bytes(),
            Body::Text(text) => text.as_bytes().to_vec(),
            Body::Bytes(bytes) => bytes.clone(),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Text(String::new())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub version: Version,
    pub status_code: StatusCode,
    /// Headers in insertion order; names compare case-insensitively.
    pub headers: Vec<(String, String)>,
    /// Used when no `Content-Type` header is set and the body is not JSON.
    pub content_type: String,
    pub body: Body,
}

impl Response {
    /// Creates a new `Response`.
    ///
    /// # Arguments
    ///
    /// * `status_code` - The HTTP status code.
    ///
    /// # Returns
    ///
    /// A response with an empty text body and the default `Server` and
    /// `Date` headers.
    pub fn new(status_code: StatusCode) -> Response {
        let headers = vec![
            (
                "Server".to_string(),
                concat!("looplite/", env!("CARGO_PKG_VERSION")).to_string(),
            ),
            (
                "Date".to_string(),
                chrono::Utc::now()
                    .format("%a, %d %b %Y %H:%M:%S GMT")
                    .to_string(),
            ),
        ];

        Response {
            version: Version::HTTP1_1,
            status_code,
            headers,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body: Body::default(),
        }
    }

    pub fn from_json(status_code: StatusCode, value: Value) -> Response {
        Response::new(status_code).with_body(value)
    }

    pub fn text(status_code: StatusCode, text: impl Into<String>) -> Response {
        Response::new(status_code).with_body(Body::Text(text.into()))
    }

    pub fn bytes(status_code: StatusCode, bytes: impl Into<Vec<u8>>) -> Response {
        Response::new(status_code).with_body(Body::Bytes(bytes.into()))
    }

    pub fn not_found() -> Response {
        Response::from_json(StatusCode::NOT_FOUND, json!({"error": "Not Found"}))
    }

    /// The generic 500. Carries no detail about the underlying failure.
    pub fn internal_error() -> Response {
        Response::from_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "Internal Server Error"}),
        )
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    /// Sets a header, replacing any existing header of the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The body decoded as JSON, or `None` if it does not parse.
    pub fn json(&self) -> Option<Value> {
        match &self.body {
            Body::Json(value) => Some(value.clone()),
            Body::Text(text) => serde_json::from_str(text).ok(),
            Body::Bytes(bytes) => serde_json::from_slice(bytes).ok(),
        }
    }

    /// Converts the response to the bytes sent over the wire.
    ///
    /// # Returns
    ///
    /// The status line, headers, blank line and body. `Content-Type` is
    /// filled in when absent (`application/json` for JSON bodies, otherwise
    /// `content_type`). `Content-Length` is always recomputed from the
    /// encoded body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body.encode();

        let mut headers: Vec<(&str, String)> = self
            .headers
            .iter()
            .filter(|(key, _)| !key.eq_ignore_ascii_case("Content-Length"))
            .map(|(key, value)| (key.as_str(), value.clone()))
            .collect();

        if self.header("Content-Type").is_none() {
            let content_type = match self.body {
                Body::Json(_) => JSON_CONTENT_TYPE,
                _ => self.content_type.as_str(),
            };
            headers.push(("Content-Type", content_type.to_string()));
        }
        headers.push(("Content-Length", body.len().to_string()));

        let mut response = Vec::with_capacity(body.len() + 128);

        let status_line = format!(
            "{} {} {}\r\n",
            self.version,
            self.status_code.as_u16(),
            self.status_code.reason_phrase()
        );
        response.extend_from_slice(status_line.as_bytes());

        for (key, value) in headers {
            response.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
        }

        response.extend_from_slice(b"\r\n");
        response.extend_from_slice(&body);

        response
    }
}

/// Values a handler may return. A `Response` passes through unchanged;
/// anything else becomes the body of a 200.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for Body {
    fn into_response(self) -> Response {
        Response::new(StatusCode::OK).with_body(self)
    }
}

impl IntoResponse for Value {
    fn into_response(self) -> Response {
        Body::Json(self).into_response()
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Body::Text(self).into_response()
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Body::from(self).into_response()
    }
}

impl IntoResponse for Vec<u8> {
    fn into_response(self) -> Response {
        Body::Bytes(self).into_response()
    }
}
