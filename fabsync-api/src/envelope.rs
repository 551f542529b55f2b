//! Structured response envelope wrapping every control-plane reply.

use serde::Deserialize;

use crate::error::{RemoteError, Result};

/// Envelope metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMeta {
    #[serde(default)]
    pub status_code: u16,
}

/// Success/failure envelope carried by every API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub meta: EnvelopeMeta,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, turning a failure envelope into an error.
    pub fn into_data(self) -> Result<T> {
        if !self.is_success {
            return Err(RemoteError::Api {
                status: self.meta.status_code,
                message: self.message,
            });
        }
        self.data
            .ok_or_else(|| RemoteError::Decode("success envelope without data".into()))
    }

    /// Check the envelope status, discarding the payload.
    pub fn into_result(self) -> Result<()> {
        if self.is_success {
            Ok(())
        } else {
            Err(RemoteError::Api {
                status: self.meta.status_code,
                message: self.message,
            })
        }
    }
}

/// Reply payload of Add calls: the identifier the control plane assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct AddReply {
    pub id: i64,
}
