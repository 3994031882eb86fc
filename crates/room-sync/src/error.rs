//! Error types for the save queue and its network collaborator.

use room_core::ItemId;
use thiserror::Error;

pub const NOT_FOUND: u16 = 404;
pub const CONFLICT: u16 = 409;
pub const PRECONDITION_FAILED: u16 = 412;

/// Error reported by a `SceneApi` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

/// How the save queue reacts to a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The document version moved under us: re-queue and resync.
    Conflict,
    /// The batch names an item the server has no record of: drop its ops.
    StaleReference(ItemId),
    /// Anything else: re-queue and wait for the next trigger.
    Other,
}

impl ApiError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ApiError::Http {
            status,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::http(PRECONDITION_FAILED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(NOT_FOUND, message)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn classify(&self) -> Failure {
        match self {
            ApiError::Http { status, .. } if *status == PRECONDITION_FAILED || *status == CONFLICT => {
                Failure::Conflict
            }
            ApiError::Http { status, message } if *status == NOT_FOUND => {
                match missing_item_id(message) {
                    Some(id) => Failure::StaleReference(id),
                    None => Failure::Other,
                }
            }
            _ => Failure::Other,
        }
    }
}

/// Nouns the API puts in front of "not found" that are not ids themselves.
const GENERIC_NOUNS: &[&str] = &["item", "light", "object", "entity", "resource", "scene"];

/// Words that sit between an id and "not found" (`Item chair-1 was not found`).
const FILLER: &[&str] = &["was", "is", "were", "been", "has", "could", "be"];

/// Pull the missing item id out of a 404 message.
///
/// Accepts `Item not found: chair-1`, `Item 'chair-1' not found`,
/// `Item chair-1 was not found` and `Light lamp-3 not found`. Returns `None`
/// when no id can be identified. The caller still has to check the id
/// against what it actually sent.
pub fn missing_item_id(message: &str) -> Option<ItemId> {
    let lower = message.to_ascii_lowercase();
    let at = lower.find("not found")?;

    if let Some(quoted) = quoted_segment(message) {
        return id_candidate(quoted);
    }

    let after = message[at + "not found".len()..].trim_start();
    if let Some(rest) = after.strip_prefix(':') {
        let token = rest
            .split_whitespace()
            .next()
            .map(|t| t.trim_end_matches(['.', ',', ';']))
            .unwrap_or("");
        if !token.is_empty() {
            return id_candidate(token);
        }
    }

    let before = message[..at]
        .split_whitespace()
        .rev()
        .find(|w| !FILLER.contains(&w.to_ascii_lowercase().as_str()))?;
    id_candidate(before)
}

fn id_candidate(word: &str) -> Option<ItemId> {
    if GENERIC_NOUNS.contains(&word.to_ascii_lowercase().as_str()) {
        return None;
    }
    Some(ItemId::intern(word))
}

fn quoted_segment(message: &str) -> Option<&str> {
    for quote in ['\'', '"', '`'] {
        if let Some(start) = message.find(quote) {
            let rest = &message[start + 1..];
            if let Some(end) = rest.find(quote)
                && end > 0
            {
                return Some(&rest[..end]);
            }
        }
    }
    None
}

/// Error surfaced by the save queue to explicit callers.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no active scene")]
    NoActiveScene,
}
