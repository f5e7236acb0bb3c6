use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::{
    binder::bind,
    error::{Error, Result},
    http::{
        Request, Response,
        parser::{FrameLimits, read_request},
    },
    router::Router,
};

/// Turns one connection into one response: frame, route, bind, invoke,
/// serialize, write, close.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    limits: FrameLimits,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, limits: FrameLimits) -> Self {
        Dispatcher { router, limits }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serves a single request on `stream` and shuts it down.
    ///
    /// If no request can be framed, nothing is written and the framing
    /// error is returned; the caller drops the connection.
    pub async fn handle<S>(&self, mut stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = match read_request(&mut stream, self.limits).await {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping connection without a response");
                return Err(e);
            }
        };

        let response = self.dispatch(request).await;

        stream.write_all(&response.to_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }

    /// Routes `request` and runs its handler. Never fails: a routing miss
    /// becomes a 404, and a handler error or panic becomes a generic 500
    /// whose body carries none of the failure's detail.
    pub async fn dispatch(&self, request: Request) -> Response {
        tracing::info!(method = %request.method, path = %request.path, "Received request");

        let Some(matched) = self.router.resolve(&request.method, &request.path) else {
            let miss = Error::RouteNotFound {
                method: request.method.to_string(),
                path: request.path.clone(),
            };
            tracing::warn!(error = %miss, "No route matched");
            return Response::not_found();
        };

        let handler = matched.handler().clone();
        let request = Arc::new(request);
        let args = bind(handler.params(), &request, &matched.params);

        // Calling the handler inside the future keeps a panic in its
        // synchronous part under `catch_unwind` too.
        let invocation = async move { handler.call(args).await };
        let response = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(
                    method = %request.method,
                    path = %request.path,
                    error = %e,
                    "Handler failed"
                );
                Response::internal_error()
            }
            Err(panic) => {
                tracing::error!(
                    method = %request.method,
                    path = %request.path,
                    panic = panic_message(&*panic),
                    "Handler panicked"
                );
                Response::internal_error()
            }
        };

        tracing::debug!(status = response.status_code.as_u16(), "Response ready");
        response
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        handler::Handler,
        http::{Body, Method, StatusCode},
    };

    fn dispatcher() -> Dispatcher {
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
            .get(
                "/fail",
                Handler::new(["request"], |_args| async move {
                    Err::<Response, _>(Error::handler("database password is hunter2"))
                }),
            )
            .unwrap()
            .get(
                "/panic",
                Handler::new(Vec::<String>::new(), |_args| async move {
                    if true {
                        panic!("secret panic detail");
                    }
                    Ok("unreachable")
                }),
            )
            .unwrap()
            .get(
                "/needs/<id>",
                Handler::new(["id", "token"], |args| async move {
                    Ok(format!("{}:{}", args.str("id")?, args.str("token")?))
                }),
            )
            .unwrap();
        Dispatcher::new(Arc::new(router), FrameLimits::default())
    }

    #[tokio::test]
    async fn test_dispatch_binds_path_and_query() {
        let request = Request::new(Method::Get, "/user/7").with_query("verbose", "true");
        let response = dispatcher().dispatch(request).await;

        assert_eq!(response.status_code, StatusCode::OK);
        assert_eq!(response.body, Body::Json(json!({"id": "7", "verbose": "true"})));
    }

    #[tokio::test]
    async fn test_dispatch_not_found() {
        let response = dispatcher()
            .dispatch(Request::new(Method::Delete, "/missing"))
            .await;

        assert_eq!(response.status_code, StatusCode::NOT_FOUND);
        assert_eq!(response.body, Body::Json(json!({"error": "Not Found"})));
    }

    #[tokio::test]
    async fn test_handler_error_is_hidden() {
        let response = dispatcher().dispatch(Request::new(Method::Get, "/fail")).await;
        let bytes = response.to_bytes();

        assert_eq!(response.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(bytes.ends_with(br#"{"error":"Internal Server Error"}"#));
        assert!(!String::from_utf8_lossy(&bytes).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_handler_panic_is_hidden() {
        let response = dispatcher().dispatch(Request::new(Method::Get, "/panic")).await;
        let bytes = response.to_bytes();

        assert_eq!(response.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!String::from_utf8_lossy(&bytes).contains("secret panic detail"));
    }

    #[tokio::test]
    async fn test_missing_argument_is_500() {
        let response = dispatcher()
            .dispatch(Request::new(Method::Get, "/needs/1"))
            .await;
        assert_eq!(response.status_code, StatusCode::INTERNAL_SERVER_ERROR);

        let response = dispatcher()
            .dispatch(Request::new(Method::Get, "/needs/1").with_query("token", "t"))
            .await;
        assert_eq!(response.status_code, StatusCode::OK);
        assert_eq!(response.body, Body::Text("1:t".to_string()));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7);
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }
}
