use serde::{Deserialize, Serialize};
use std::fmt::Display;

const LEGACY_OK: &str = "OK";
const LEGACY_ERROR_PREFIX: &str = "NOK|";

/// Outcome shared by selection and every dispatch path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub ok: bool,
    pub message: String,
}

impl DispatchResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    /// `"OK"` or `"NOK|<message>"`.
    pub fn to_legacy(&self) -> String {
        if self.ok {
            LEGACY_OK.to_string()
        } else {
            format!("{}{}", LEGACY_ERROR_PREFIX, self.message)
        }
    }

    /// Anything not prefixed with `NOK|` counts as success, as it did for
    /// the clients of the string protocol.
    pub fn from_legacy(encoded: &str) -> Self {
        match encoded.strip_prefix(LEGACY_ERROR_PREFIX) {
            Some(message) => Self::failure(message),
            None if encoded == LEGACY_OK => Self::success(""),
            None => Self::success(encoded),
        }
    }
}

impl<T, E: Display> From<Result<T, E>> for DispatchResult {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::success(""),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

/// JSON body every HTTP route answers with: `{"response": "...", "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub response: String,
    pub error: String,
}

impl ResponseBody {
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            error: String::new(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            response: String::new(),
            error: error.into(),
        }
    }
}

impl From<DispatchResult> for ResponseBody {
    fn from(result: DispatchResult) -> Self {
        if result.ok {
            Self::ok(LEGACY_OK)
        } else {
            Self::error(result.message)
        }
    }
}
