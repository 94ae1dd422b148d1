use serde::Deserialize;

/// PostgREST code for "JSON object requested, multiple (or no) rows returned".
pub const NOT_FOUND_CODE: &str = "PGRST116";

/// Any failure reported by the hosted service or met on the way to it:
/// auth, validation, not-found, transport. Deliberately not subdivided;
/// `status` and `code` are carried for display and logging only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
    pub status: Option<u16>,
    pub code: Option<String>,
}

/// Error body shape returned by PostgREST.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    code: Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    pub fn not_found(table: &str, id: impl std::fmt::Display) -> Self {
        Self {
            message: format!("No row in {} with id {}", table, id),
            status: Some(404),
            code: Some(NOT_FOUND_CODE.to_string()),
        }
    }

    /// Builds an error from a non-2xx response, preferring the `message`
    /// field of a PostgREST error body over the raw text.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self {
                message: parsed.message,
                status: Some(status),
                code: parsed.code,
            },
            Err(_) => Self {
                message: if body.trim().is_empty() {
                    format!("Request failed with status {}", status)
                } else {
                    body.trim().to_string()
                },
                status: Some(status),
                code: None,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404) || self.code.as_deref() == Some(NOT_FOUND_CODE)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
            code: None,
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("Malformed row: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgrest_body_message_wins() {
        let body = r#"{"code":"23502","details":null,"hint":null,"message":"null value in column \"title\" violates not-null constraint"}"#;
        let err = BackendError::from_response(400, body);
        assert_eq!(err.message, "null value in column \"title\" violates not-null constraint");
        assert_eq!(err.status, Some(400));
        assert_eq!(err.code.as_deref(), Some("23502"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn plain_text_body_is_kept() {
        let err = BackendError::from_response(502, "bad gateway\n");
        assert_eq!(err.to_string(), "bad gateway");
    }

    #[test]
    fn empty_body_falls_back_to_status() {
        let err = BackendError::from_response(500, "");
        assert_eq!(err.to_string(), "Request failed with status 500");
    }

    #[test]
    fn single_row_miss_is_not_found() {
        let body = r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;
        assert!(BackendError::from_response(406, body).is_not_found());
    }
}
