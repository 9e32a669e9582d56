//! HTTP method vocabulary for outbound dispatch.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// An HTTP method usable on an outbound call.
///
/// API connections may use any variant; webhook deliveries are restricted
/// to the body-carrying subset (see [`HttpMethod::allowed_for_webhook`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Return the wire-format string for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Parse from a wire-format string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(CoreError::Validation(format!(
                "Invalid HTTP method: '{s}'. Must be one of: GET, POST, PUT, PATCH, DELETE"
            ))),
        }
    }

    /// Whether this method may be used for a webhook delivery.
    pub fn allowed_for_webhook(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
