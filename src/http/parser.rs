use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncReadExt};
use url::form_urlencoded;

use super::{Method, Request, Version};
use crate::error::{Error, Result};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Bounds applied while reading a request off a stream.
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    /// Size of each read while waiting for the header block.
    pub read_chunk_size: usize,
    /// Largest header block accepted before giving up on the connection.
    pub max_header_bytes: usize,
    /// Largest `Content-Length` accepted.
    pub max_body_bytes: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        FrameLimits {
            read_chunk_size: 1024,
            max_header_bytes: 1024 * 1024,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Reads one request from `reader`.
///
/// Reads in chunks until the blank line ending the header block shows up,
/// then, if `Content-Length` asks for more body than was already buffered,
/// keeps reading until exactly that many body bytes have arrived.
///
/// # Arguments
///
/// * `reader` - The connection's read half.
/// * `limits` - Chunk size and the header and body caps.
///
/// # Returns
///
/// The framed request, with its body cut to `Content-Length` when one was sent.
///
/// # Errors
///
/// * `MalformedRequest` if the stream ends before the header block is
///   complete, the request line is not `METHOD target VERSION`, or
///   `Content-Length` is not a number.
/// * `HeaderTooLarge` if no terminator appears within `max_header_bytes`.
/// * `BodyTooLarge` if `Content-Length` exceeds `max_body_bytes`.
/// * `IncompleteBody` if the stream ends before the declared body length.
pub async fn read_request<R>(reader: &mut R, limits: FrameLimits) -> Result<Request>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = vec![0u8; limits.read_chunk_size.max(1)];
    let mut scan_from = 0;

    let header_end = loop {
        if let Some(pos) = find_terminator(&buffer[scan_from..]) {
            break scan_from + pos;
        }
        if buffer.len() > limits.max_header_bytes {
            return Err(Error::HeaderTooLarge {
                limit: limits.max_header_bytes,
            });
        }
        // The terminator may straddle two reads.
        scan_from = buffer.len().saturating_sub(HEADER_TERMINATOR.len() - 1);

        let bytes_read = reader.read(&mut chunk).await?;
        if bytes_read == 0 {
            let reason = if buffer.is_empty() {
                "connection closed before any data"
            } else {
                "connection closed before end of headers"
            };
            return Err(Error::MalformedRequest(reason.to_string()));
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);
    };

    let mut body = buffer.split_off(header_end + HEADER_TERMINATOR.len());
    buffer.truncate(header_end);

    let (mut request, content_length) = parse_head(&buffer)?;

    if let Some(expected) = content_length {
        if expected > limits.max_body_bytes {
            return Err(Error::BodyTooLarge {
                limit: limits.max_body_bytes,
            });
        }
        while body.len() < expected {
            let want = (expected - body.len()).min(chunk.len());
            let bytes_read = reader.read(&mut chunk[..want]).await?;
            if bytes_read == 0 {
                return Err(Error::IncompleteBody {
                    expected,
                    received: body.len(),
                });
            }
            body.extend_from_slice(&chunk[..bytes_read]);
        }
        body.truncate(expected);
    }

    request = request.with_body(body);
    tracing::debug!(
        method = %request.method,
        path = %request.path,
        body_len = request.body.len(),
        "Framed request"
    );
    Ok(request)
}

/// Parses a fully buffered request.
///
/// # Arguments
///
/// * `raw` - The raw bytes of one request.
///
/// # Returns
///
/// The parsed request. Without a `\r\n\r\n` terminator the whole input is
/// treated as the header block. A body longer than `Content-Length` is cut
/// to the declared length; a shorter one is an `IncompleteBody` error.
pub fn parse(raw: &[u8]) -> Result<Request> {
    let (head, body) = match find_terminator(raw) {
        Some(pos) => (&raw[..pos], &raw[pos + HEADER_TERMINATOR.len()..]),
        None => (raw, &raw[raw.len()..]),
    };

    let (request, content_length) = parse_head(head)?;
    let body = match content_length {
        Some(expected) if body.len() < expected => {
            return Err(Error::IncompleteBody {
                expected,
                received: body.len(),
            });
        }
        Some(expected) => &body[..expected],
        None => body,
    };

    Ok(request.with_body(body.to_vec()))
}

fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

/// Parses the request line and the header lines, returning the request and
/// the body length announced by the first `Content-Length` line.
fn parse_head(head: &[u8]) -> Result<(Request, Option<usize>)> {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.lines();
    let request_line = lines.next().unwrap_or_default();

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    let &[method, target, version] = parts.as_slice() else {
        return Err(Error::MalformedRequest(format!(
            "invalid request line `{}`",
            request_line
        )));
    };

    let (path, query) = parse_target(target);

    let mut request = Request::new(Method::from(method), path);
    request.version = Version::from(version);
    request.query = query;

    let mut content_length = None;

    // Lines without ": " are not headers and are skipped.
    for line in lines {
        let Some((key, value)) = line.split_once(": ") else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if content_length.is_none() && key.eq_ignore_ascii_case("Content-Length") {
            let length = value.parse::<usize>().map_err(|_| {
                Error::MalformedRequest(format!("invalid Content-Length `{}`", value))
            })?;
            content_length = Some(length);
        }
        request.insert_header(key, value);
    }

    Ok((request, content_length))
}

/// Splits a request-target into a decoded, normalized path and its query
/// parameters.
///
/// # Arguments
///
/// * `target` - The request-target from the request line, in origin form
///   (`/a?b=c`) or absolute form (`http://host/a?b=c`).
///
/// # Returns
///
/// The path with scheme, authority and fragment stripped, percent escapes
/// decoded and slashes normalized, plus the decoded query parameters.
pub fn parse_target(target: &str) -> (String, HashMap<String, String>) {
    let mut rest = target;
    if !rest.starts_with('/') {
        if let Some(idx) = rest.find("://") {
            let authority_and_path = &rest[idx + 3..];
            rest = authority_and_path
                .find(['/', '?'])
                .map_or("", |pos| &authority_and_path[pos..]);
        }
    }

    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    let (raw_path, raw_query) = rest.split_once('?').unwrap_or((rest, ""));

    // `+` is literal in a path; malformed escapes are kept as-is.
    let decoded = urlencoding::decode_binary(raw_path.as_bytes());
    let path = normalize_path(&String::from_utf8_lossy(&decoded));
    (path, parse_query(raw_query))
}

/// Decodes `application/x-www-form-urlencoded` pairs.
///
/// The first value of a repeated key wins. Pairs with an empty key or an
/// empty value (including those with no `=`) are dropped.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key.is_empty() || value.is_empty() {
            continue;
        }
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

/// Leading slash, no trailing slash except for the root.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
