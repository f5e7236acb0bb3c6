//! A small HTTP/1.1 request-dispatch engine.
//!
//! One request per connection: bytes are framed into a [`Request`], matched
//! against a [`Router`], the handler's declared parameters are bound from
//! path variables, query parameters and JSON body fields, and the handler's
//! result is written back as a [`Response`].

pub mod binder;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod http;
pub mod router;
pub mod server;

pub use binder::{Arg, BoundArgs, REQUEST_PARAM};
pub use config::ServerConfig;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use handler::Handler;
pub use http::{Body, IntoResponse, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::Server;
