// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// APIError is the reconciler-facing form of a failed request to the API server.
/// Only the reason is kept; the full kube-rs error is logged where it is translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum APIError {
    #[error("object not found")]
    ObjectNotFound,
    #[error("object already exists")]
    ObjectAlreadyExists,
    #[error("bad request")]
    BadRequest,
    #[error("conflict")]
    Conflict,
    #[error("invalid object")]
    Invalid,
    #[error("internal error")]
    InternalError,
    #[error("timeout")]
    Timeout,
    #[error("server timeout")]
    ServerTimeout,
    #[error("other error")]
    Other,
}

impl APIError {
    // TODO: match more error types, e.g., Forbidden and TooManyRequests.
    pub fn from_kube(error: &kube_client::Error) -> APIError {
        match error {
            kube_client::Error::Api(kube_core::ErrorResponse { reason, .. }) => match reason.as_str() {
                "NotFound" => APIError::ObjectNotFound,
                "AlreadyExists" => APIError::ObjectAlreadyExists,
                "BadRequest" => APIError::BadRequest,
                "Conflict" => APIError::Conflict,
                "Invalid" => APIError::Invalid,
                "InternalError" => APIError::InternalError,
                "Timeout" => APIError::Timeout,
                "ServerTimeout" => APIError::ServerTimeout,
                _ => APIError::Other,
            },
            _ => APIError::Other,
        }
    }

    pub fn is_object_not_found(&self) -> bool {
        matches!(self, APIError::ObjectNotFound)
    }
}
