//! Request and response messages exchanged on a stream.
//!
//! Each stream carries exactly one [`Request`] followed by one [`Response`].
//! Both travel inside a [`Message`] so a single [`crate::core::codec::Codec`]
//! object can frame either direction.

use serde::{Deserialize, Serialize};

use crate::core::value::Value;
use crate::error::{Result, RpcError};

/// Separator between service and method name.
pub const SERVICE_METHOD_SEPARATOR: char = '.';

/// A call naming `"Service.Method"` plus positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub service_method: String,
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(service_method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            service_method: service_method.into(),
            args,
        }
    }

    /// Split on the first `.` into `(service, method)`, both non-empty.
    pub fn split_service_method(&self) -> Result<(&str, &str)> {
        split_service_method(&self.service_method)
    }
}

/// Split `"Service.Method"` on the first separator.
pub fn split_service_method(service_method: &str) -> Result<(&str, &str)> {
    match service_method.split_once(SERVICE_METHOD_SEPARATOR) {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {
            Ok((service, method))
        }
        _ => Err(RpcError::InvalidServiceMethod(service_method.to_string())),
    }
}

/// Error payload carried by a failed response. Only the message text survives
/// the trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub message: String,
}

/// Outcome of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok(Value),
    Err(RemoteError),
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Err(RemoteError {
            message: message.into(),
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Convert into the caller's view: a value or [`RpcError::Remote`].
    pub fn into_result(self) -> Result<Value> {
        match self {
            Response::Ok(value) => Ok(value),
            Response::Err(err) => Err(RpcError::Remote(err.message)),
        }
    }
}

impl From<Result<Value>> for Response {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Response::Ok(value),
            Err(err) => Response::error(err.to_string()),
        }
    }
}

/// Unit of serialization on a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn into_request(self) -> Result<Request> {
        match self {
            Message::Request(req) => Ok(req),
            Message::Response(_) => Err(RpcError::UnexpectedMessage),
        }
    }

    /// True unless some carried float is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            Message::Request(req) => req.args.iter().all(Value::is_finite),
            Message::Response(Response::Ok(value)) => value.is_finite(),
            Message::Response(Response::Err(_)) => true,
        }
    }

    pub fn into_response(self) -> Result<Response> {
        match self {
            Message::Response(resp) => Ok(resp),
            Message::Request(_) => Err(RpcError::UnexpectedMessage),
        }
    }
}
