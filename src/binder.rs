use std::{collections::HashMap, fmt::Display, str::FromStr, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{Error, Result},
    http::Request,
};

/// Parameter name that receives the request itself.
pub const REQUEST_PARAM: &str = "request";

/// A single bound argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Request(Arc<Request>),
    Value(Value),
}

/// Arguments bound for one handler call, keyed by parameter name.
///
/// Path and query values arrive as JSON strings; body fields keep whatever
/// JSON type they had. Nothing is coerced unless the handler asks for it
/// through [`BoundArgs::parse`] or [`BoundArgs::deserialize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    args: HashMap<String, Arg>,
}

impl BoundArgs {
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.args.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, arg: Arg) {
        self.args.insert(name.into(), arg);
    }

    pub fn value(&self, name: &str) -> Result<&Value> {
        match self.args.get(name) {
            Some(Arg::Value(value)) => Ok(value),
            Some(Arg::Request(_)) => Err(invalid(name, "bound to the request, not a value")),
            None => Err(Error::MissingArgument(name.to_string())),
        }
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        self.value(name)?
            .as_str()
            .ok_or_else(|| invalid(name, "expected a string"))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        match self.args.get(name) {
            Some(Arg::Value(Value::String(s))) => Some(s),
            _ => None,
        }
    }

    /// Parses the argument with `FromStr`. Non-string JSON scalars are
    /// parsed from their JSON text, so `7` and `"7"` both yield `7u32`.
    pub fn parse<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.value(name)?;
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(_) | Value::Bool(_) => value.to_string(),
            _ => return Err(invalid(name, "expected a scalar")),
        };
        text.parse::<T>().map_err(|e| invalid(name, e))
    }

    pub fn deserialize<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        serde_json::from_value(self.value(name)?.clone()).map_err(|e| invalid(name, e))
    }

    /// The injected request, present when the handler declares `request`.
    pub fn request(&self) -> Result<&Request> {
        match self.args.get(REQUEST_PARAM) {
            Some(Arg::Request(request)) => Ok(request),
            Some(Arg::Value(_)) => Err(invalid(REQUEST_PARAM, "not the request")),
            None => Err(Error::MissingArgument(REQUEST_PARAM.to_string())),
        }
    }
}

fn invalid(name: &str, reason: impl Display) -> Error {
    Error::InvalidArgument {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Binds `params` from the request.
///
/// Sources are consulted in order, and a name filled by an earlier source is
/// never overwritten by a later one:
///
/// 1. `request`, which receives the request itself
/// 2. path variables
/// 3. query parameters
/// 4. fields of a JSON object body (any other body counts as empty)
///
/// Names no source provides stay unbound.
pub fn bind(
    params: &[String],
    request: &Arc<Request>,
    path_params: &HashMap<String, String>,
) -> BoundArgs {
    let mut bound = BoundArgs::default();

    if params.iter().any(|name| name == REQUEST_PARAM) {
        bound.insert(REQUEST_PARAM, Arg::Request(Arc::clone(request)));
    }

    for name in params {
        if bound.contains(name) {
            continue;
        }
        if let Some(value) = path_params.get(name) {
            bound.insert(name.as_str(), Arg::Value(Value::String(value.clone())));
        }
    }

    for name in params {
        if bound.contains(name) {
            continue;
        }
        if let Some(value) = request.query_param(name) {
            bound.insert(name.as_str(), Arg::Value(Value::String(value.clone())));
        }
    }

    if let Some(Value::Object(fields)) = request.json() {
        for name in params {
            if bound.contains(name) {
                continue;
            }
            if let Some(value) = fields.get(name) {
                bound.insert(name.as_str(), Arg::Value(value.clone()));
            }
        }
    }

    bound
}
