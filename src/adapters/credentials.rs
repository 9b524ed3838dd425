use std::env;

use serde::{Deserialize, Serialize};

use crate::extraction::error::{ExtractionError, credential_error, invalid_request};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialRef {
    Env {
        var: String,
    },
    InlineToken {
        token: String,
    },
    #[default]
    None,
}

impl CredentialRef {
    /// `Authorization` header value, looked up at call time so configurations
    /// with missing keys still load and run in mock mode.
    pub fn resolve(&self, backend_id: &str) -> Result<Option<String>, ExtractionError> {
        match self {
            CredentialRef::Env { var } => {
                let token = env::var(var).map_err(|_| {
                    credential_error(format!(
                        "missing credential environment variable {} for backend {}",
                        var, backend_id
                    ))
                })?;
                Ok(Some(format!("Bearer {}", token)))
            }
            CredentialRef::InlineToken { token } => {
                if token.trim().is_empty() {
                    return Err(invalid_request("inline credential token cannot be empty"));
                }
                Ok(Some(format!("Bearer {}", token)))
            }
            CredentialRef::None => Ok(None),
        }
    }
}
