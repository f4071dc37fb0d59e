//! Human-readable messages from admin API error bodies
//!
//! The backend is not consistent about where it puts the message, so the
//! candidates are tried in a fixed order.

use serde_json::Value;

type Extractor = fn(&Value) -> Option<&str>;

/// Candidate locations, highest priority first
const EXTRACTORS: &[Extractor] = &[top_level_message, top_level_error, nested_error_message];

fn top_level_message(body: &Value) -> Option<&str> {
    body.get("message")?.as_str()
}

fn top_level_error(body: &Value) -> Option<&str> {
    body.get("error")?.as_str()
}

fn nested_error_message(body: &Value) -> Option<&str> {
    body.get("error")?.get("message")?.as_str()
}

/// First non-empty message found in a JSON error body
pub fn extract_message(body: &Value) -> Option<&str> {
    EXTRACTORS
        .iter()
        .find_map(|extract| extract(body).map(str::trim).filter(|m| !m.is_empty()))
}

/// Message for a failed response with the given status and raw body
pub fn server_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(extract_message)
        .map_or_else(|| fallback_message(status), str::to_owned)
}

/// Generic message when the body carries none
pub fn fallback_message(status: u16) -> String {
    format!("Request failed with status code {status}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn priority_order() {
        let body = json!({"message": "top", "error": "second"});
        assert_eq!(extract_message(&body), Some("top"));

        let body = json!({"error": "second"});
        assert_eq!(extract_message(&body), Some("second"));

        let body = json!({"error": {"message": "nested", "code": 7}});
        assert_eq!(extract_message(&body), Some("nested"));
    }

    #[test]
    fn empty_candidates_are_skipped() {
        let body = json!({"message": "  ", "error": {"message": "nested"}});
        assert_eq!(extract_message(&body), Some("nested"));
    }

    #[test]
    fn non_json_and_empty_bodies_fall_back() {
        assert_eq!(server_message(502, "<html>Bad Gateway</html>"), "Request failed with status code 502");
        assert_eq!(server_message(403, ""), "Request failed with status code 403");
        assert_eq!(server_message(400, "{\"detail\": 1}"), "Request failed with status code 400");
        assert_eq!(server_message(403, "{\"error\": \"Forbidden\"}"), "Forbidden");
    }
}
