use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::hooks::{PROXY_STATUS_FAILED, PROXY_STATUS_HEADER};

/// One variant per `Proxy.<Kind>` error code the dispatcher can emit (spec §7).
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("there was an internal error occurred")]
    Internal { detail: String },
    #[error("the cloud account is not found in the config")]
    CloudAccountNotFound { detail: String },
    #[error("the proxy credential provided does not match the configuration")]
    ValidateCredentialErr { detail: String },
    #[error("there was an internal error occurred during validating")]
    ValidateCredentialInternalErr { detail: String },
    #[error("there was an internal error occurred during resigning")]
    ResignInternalErr { detail: String },
    #[error("there was an internal error occurred during reforming the request")]
    ReformRequestInternalErr { detail: String },
    #[error("there was a network error occurred during requesting")]
    NetworkErr { detail: String },
}

impl ProxyError {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal { detail: detail.into() }
    }

    pub fn cloud_account_not_found(detail: impl Into<String>) -> Self {
        Self::CloudAccountNotFound { detail: detail.into() }
    }

    pub fn validate_credential_err(detail: impl Into<String>) -> Self {
        Self::ValidateCredentialErr { detail: detail.into() }
    }

    pub fn validate_credential_internal_err(detail: impl Into<String>) -> Self {
        Self::ValidateCredentialInternalErr { detail: detail.into() }
    }

    pub fn resign_internal_err(detail: impl Into<String>) -> Self {
        Self::ResignInternalErr { detail: detail.into() }
    }

    pub fn reform_request_internal_err(detail: impl Into<String>) -> Self {
        Self::ReformRequestInternalErr { detail: detail.into() }
    }

    pub fn network_err(detail: impl Into<String>) -> Self {
        Self::NetworkErr { detail: detail.into() }
    }

    /// The `Proxy.<Kind>` text code carried in the JSON error body and
    /// `X-Exception-TextCode` header.
    pub fn text_code(&self) -> &'static str {
        match self {
            Self::Internal { .. } => "Proxy.InternalError",
            Self::CloudAccountNotFound { .. } => "Proxy.CloudAccountNotFound",
            Self::ValidateCredentialErr { .. } => "Proxy.ValidateCredentialErr",
            Self::ValidateCredentialInternalErr { .. } => "Proxy.ValidateCredentialInternalErr",
            Self::ResignInternalErr { .. } => "Proxy.ResignInternalErr",
            Self::ReformRequestInternalErr { .. } => "Proxy.ReformRequestInternalErr",
            Self::NetworkErr { .. } => "Proxy.NetworkErr",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Internal { detail }
            | Self::CloudAccountNotFound { detail }
            | Self::ValidateCredentialErr { detail }
            | Self::ValidateCredentialInternalErr { detail }
            | Self::ResignInternalErr { detail }
            | Self::ReformRequestInternalErr { detail }
            | Self::NetworkErr { detail } => detail,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Internal { .. }
            | Self::ValidateCredentialInternalErr { .. }
            | Self::ResignInternalErr { .. }
            | Self::ReformRequestInternalErr { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CloudAccountNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ValidateCredentialErr { .. } => StatusCode::UNAUTHORIZED,
            Self::NetworkErr { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorObj {
    #[serde(rename = "Code")]
    pub code: &'static str,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Detail", skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct ResponseMetadata {
    #[serde(rename = "Error")]
    pub error: ErrorObj,
    #[serde(rename = "RequestId")]
    pub request_id: String,
    #[serde(rename = "Version")]
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ProxyErrorBody {
    #[serde(rename = "ResponseMetadata")]
    pub response_metadata: ResponseMetadata,
}

/// Single translation point from `ProxyError` to the wire JSON body plus
/// the response headers a failed request always carries.
pub fn error_response(err: &ProxyError, request_id: &str, version: &str) -> Response {
    let body = ProxyErrorBody {
        response_metadata: ResponseMetadata {
            error: ErrorObj {
                code: err.text_code(),
                message: err.to_string(),
                detail: err.detail().to_string(),
            },
            request_id: request_id.to_string(),
            version: version.to_string(),
        },
    };
    (
        err.status_code(),
        [
            (PROXY_STATUS_HEADER, PROXY_STATUS_FAILED),
            ("X-Mcdn-Proxy-Version", version),
            ("X-Exception-TextCode", err.text_code()),
            ("X-Proxy-Exception", "true"),
        ],
        axum::Json(body),
    )
        .into_response()
}

pub type Result<T> = std::result::Result<T, ProxyError>;
