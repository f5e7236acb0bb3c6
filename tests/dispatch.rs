use std::sync::Arc;

use looplite::{
    Dispatcher, Error, Handler, Method, Response, Router, Server, ServerConfig, StatusCode,
    http::parser::FrameLimits,
};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, duplex},
    net::{TcpListener, TcpStream},
};

fn router() -> Router {
    let mut router = Router::new();
    router
        .get(
            "/user/<id>",
            Handler::new(["id", "verbose"], |args| async move {
                Ok(json!({
                    "id": args.str("id")?,
                    "verbose": args.opt_str("verbose"),
                }))
            }),
        )
        .unwrap()
        .post(
            "/items",
            Handler::new(["name"], |args| async move {
                Ok(json!({"name": args.value("name")?}))
            }),
        )
        .unwrap()
        .register(
            "/echo",
            Handler::new(["request"], |args| async move {
                let request = args.request()?;
                Ok(Response::bytes(StatusCode::OK, request.body.clone())
                    .with_content_type("application/octet-stream"))
            }),
            &[Method::Post, Method::Put],
        )
        .unwrap()
        .get(
            "/boom",
            Handler::new(Vec::<String>::new(), |_args| async move {
                Err::<Value, _>(Error::handler("stack trace: secret.rs:42"))
            }),
        )
        .unwrap();
    router
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(router()), FrameLimits::default())
}

struct Reply {
    status_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn parse(raw: &[u8]) -> Reply {
        let split = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response has a header terminator");
        let head = String::from_utf8(raw[..split].to_vec()).unwrap();
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap().to_string();
        let headers = lines
            .map(|line| {
                let (k, v) = line.split_once(": ").unwrap();
                (k.to_string(), v.to_string())
            })
            .collect();
        Reply {
            status_line,
            headers,
            body: raw[split + 4..].to_vec(),
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Writes `raw` to a fresh connection and returns everything written back.
async fn exchange(raw: &[u8]) -> (looplite::Result<()>, Vec<u8>) {
    let (mut client, server) = duplex(64 * 1024);
    let dispatcher = dispatcher();
    let task = tokio::spawn(async move { dispatcher.handle(server).await });

    client.write_all(raw).await.unwrap();
    client.shutdown().await.unwrap();

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    (task.await.unwrap(), out)
}

#[tokio::test]
async fn test_get_with_path_and_query() {
    let (result, out) = exchange(b"GET /user/7?verbose=true HTTP/1.1\r\nHost: test\r\n\r\n").await;
    assert!(result.is_ok());

    let reply = Reply::parse(&out);
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.header("Content-Type"), Some("application/json"));
    assert_eq!(reply.json(), json!({"id": "7", "verbose": "true"}));
}

#[tokio::test]
async fn test_post_json_body() {
    let raw = b"POST /items HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 14\r\n\r\n{\"name\":\"pen\"}";
    let (_, out) = exchange(raw).await;

    let reply = Reply::parse(&out);
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.json(), json!({"name": "pen"}));
}

#[tokio::test]
async fn test_unmatched_route() {
    let (result, out) = exchange(b"DELETE /missing HTTP/1.1\r\n\r\n").await;
    assert!(result.is_ok());

    let reply = Reply::parse(&out);
    assert_eq!(reply.status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(reply.body, br#"{"error":"Not Found"}"#);
}

#[tokio::test]
async fn test_handler_failure() {
    let (_, out) = exchange(b"GET /boom HTTP/1.1\r\n\r\n").await;

    let reply = Reply::parse(&out);
    assert_eq!(reply.status_line, "HTTP/1.1 500 Internal Server Error");
    assert_eq!(reply.json(), json!({"error": "Internal Server Error"}));
    assert!(!String::from_utf8_lossy(&out).contains("secret.rs"));
}

#[tokio::test]
async fn test_content_length_matches_body() {
    let payload = "héllo wörld".as_bytes();
    let mut raw = format!("PUT /echo HTTP/1.1\r\nContent-Length: {}\r\n\r\n", payload.len()).into_bytes();
    raw.extend_from_slice(payload);

    let (_, out) = exchange(&raw).await;
    let reply = Reply::parse(&out);
    let declared: usize = reply.header("Content-Length").unwrap().parse().unwrap();

    assert_eq!(declared, reply.body.len());
    assert_eq!(reply.body, payload);
    assert_eq!(reply.header("Content-Type"), Some("application/octet-stream"));
}

#[tokio::test]
async fn test_framing_error_writes_nothing() {
    let (result, out) = exchange(b"GARBAGE\r\n\r\n").await;
    assert!(matches!(result, Err(Error::MalformedRequest(_))));
    assert!(out.is_empty());

    let (result, out) = exchange(b"GET /user/1 HTTP/1.1\r\nHost: x").await;
    assert!(matches!(result, Err(Error::MalformedRequest(_))));
    assert!(out.is_empty());

    let (result, out) = exchange(b"POST /items HTTP/1.1\r\nContent-Length: 50\r\n\r\n{}").await;
    assert!(matches!(result, Err(Error::IncompleteBody { .. })));
    assert!(out.is_empty());

    let (result, out) =
        exchange(b"POST /items HTTP/1.1\r\nContent-Length: 2097152\r\n\r\n{}").await;
    assert!(matches!(result, Err(Error::BodyTooLarge { .. })));
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_server_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let server = Server::new(ServerConfig::default(), router());
    tokio::spawn(async move { server.serve(listener).await });

    for id in ["1", "2"] {
        let mut stream = TcpStream::connect(address).await.unwrap();
        stream
            .write_all(format!("GET /user/{} HTTP/1.1\r\nHost: local\r\n\r\n", id).as_bytes())
            .await
            .unwrap();

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();

        let reply = Reply::parse(&out);
        assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
        assert_eq!(reply.json(), json!({"id": id, "verbose": null}));
    }
}
