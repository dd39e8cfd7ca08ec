use sha2::{Digest, Sha256};

/// Trimmed and lowercased. Keys for extraction memoization and request coalescing.
pub fn normalize_key_text(text: &str) -> String {
	text.trim().to_lowercase()
}

/// Lowercased with runs of whitespace collapsed to one space. Keys for stored search results.
pub fn normalize_search_text(text: &str) -> String {
	text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex-encoded SHA-256 of already normalized text.
pub fn content_key(normalized: &str) -> String {
	format!("{:x}", Sha256::digest(normalized.as_bytes()))
}
