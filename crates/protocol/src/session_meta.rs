//! Session metadata
//!
//! Sparse mirror of the game server's `/session` response. Only
//! `session_uuid` participates in agent logic; the remaining fields are
//! surfaced for logging and forwarded opaquely.

use serde::Deserialize;

/// Parsed `/session` probe response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionMeta {
    /// Server-generated match identifier; empty means no active match.
    #[serde(rename = "sessionid", default)]
    pub session_uuid: String,

    #[serde(default)]
    pub game_status: String,

    #[serde(default)]
    pub match_type: String,

    #[serde(default)]
    pub map_name: String,

    #[serde(rename = "private_match", default)]
    pub is_private_match: bool,
}

impl SessionMeta {
    /// Whether this response identifies a live match.
    pub fn is_active(&self) -> bool {
        !self.session_uuid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let body = r#"{
            "sessionid": "7B1C-99",
            "game_status": "playing",
            "match_type": "Echo_Arena",
            "map_name": "mpl_arena_a",
            "private_match": true,
            "unmodeled_field": [1, 2, 3]
        }"#;
        let meta: SessionMeta = serde_json::from_str(body).unwrap();
        assert_eq!(meta.session_uuid, "7B1C-99");
        assert_eq!(meta.match_type, "Echo_Arena");
        assert!(meta.is_private_match);
        assert!(meta.is_active());
    }

    #[test]
    fn test_parse_sparse_response() {
        let meta: SessionMeta = serde_json::from_str("{}").unwrap();
        assert!(!meta.is_active());
        assert_eq!(meta.game_status, "");
    }
}
