use std::{fmt, sync::Arc};

use futures::future::{BoxFuture, FutureExt};

use crate::{
    binder::BoundArgs,
    error::Result,
    http::{IntoResponse, Response},
};

type HandlerFn = dyn Fn(BoundArgs) -> BoxFuture<'static, Result<Response>> + Send + Sync;

/// A route handler: the parameter names it declares plus the async
/// function that receives the arguments bound to those names.
///
/// ```ignore
/// let handler = Handler::new(["id", "request"], |args| async move {
///     let id = args.str("id")?.to_string();
///     Ok(json!({ "id": id }))
/// });
/// ```
#[derive(Clone)]
pub struct Handler {
    params: Arc<[String]>,
    call: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<P, F, Fut, T>(params: P, f: F) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: IntoResponse + 'static,
    {
        let call: Arc<HandlerFn> = Arc::new(move |args: BoundArgs| {
            let future = f(args);
            async move { future.await.map(IntoResponse::into_response) }.boxed()
        });

        Handler {
            params: params.into_iter().map(Into::<String>::into).collect(),
            call,
        }
    }

    /// Declared parameter names, in declaration order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn call(&self, args: BoundArgs) -> BoxFuture<'static, Result<Response>> {
        (self.call)(args)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
