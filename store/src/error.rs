use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Transient lock conflict. Absorbed by [`crate::RetryPolicy`] and never
    /// surfaced past it.
    #[error("contention: {0}")]
    Contention(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{op} gave up after {attempts} contended attempts")]
    RetriesExhausted { op: &'static str, attempts: u32 },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}

impl StoreError {
    /// Definitive outcomes end a retry loop and go straight back to the caller.
    pub fn is_definitive(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::AlreadyExists(_))
    }

    pub fn is_contention(&self) -> bool {
        matches!(self, StoreError::Contention(_))
    }
}

/// Render a key for log lines and error messages.
///
/// Printable UTF-8 keys are shown as-is, anything else as hex.
pub fn describe_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) if s.chars().all(|c| !c.is_control()) => format!("'{s}'"),
        _ => {
            let mut out = String::with_capacity(2 + key.len() * 2);
            out.push_str("0x");
            for b in key {
                out.push_str(&format!("{b:02x}"));
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_key_prints_text_and_hex() {
        assert_eq!(describe_key(b"key1"), "'key1'");
        assert_eq!(describe_key(&[0x00, 0xff]), "0x00ff");
    }

    #[test]
    fn only_not_found_and_exists_are_definitive() {
        assert!(StoreError::NotFound("k".into()).is_definitive());
        assert!(StoreError::AlreadyExists("k".into()).is_definitive());
        assert!(!StoreError::Contention("k".into()).is_definitive());
        assert!(!StoreError::Backend("k".into()).is_definitive());
    }
}
