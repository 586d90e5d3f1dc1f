//! Response envelope shared by every backend operation.

use serde::{Deserialize, Serialize};

/// `{ success, data?, error? }` as returned by the backend.
///
/// A completed call may still report `success: false`; interpreting the flag
/// is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Successful response without a payload.
    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn failed_envelope_omits_data() {
        let response = ApiResponse::<u32>::failure("Series not found");
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value, json!({ "success": false, "error": "Series not found" }));
    }

    #[test]
    fn missing_fields_deserialize_as_none() {
        let response: ApiResponse<Vec<String>> =
            serde_json::from_value(json!({ "success": true })).expect("deserialize");
        assert!(response.is_success());
        assert_eq!(response.data, None);
        assert_eq!(response.error, None);
    }
}
