//! Session identifiers shared by the runtime host and the test clients.

/// Header carrying the caller's session id on invocations and WebSocket upgrades.
pub const SESSION_HEADER: &str = "x-amzn-bedrock-agentcore-runtime-session-id";

/// Generate a host-assigned session id for callers that did not supply one.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trim a caller-supplied session id, rejecting empty values.
pub fn normalize_session_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_ids_are_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }

    #[test]
    fn test_normalize_session_id() {
        assert_eq!(normalize_session_id("  abc "), Some("abc".into()));
        assert_eq!(normalize_session_id("   "), None);
    }
}
