//! Caller-supplied credentials.
//!
//! Keys arrive with each upload (and optionally with each question) and live only as long as
//! the session that captured them. [`ApiKey`] never prints its value through `Debug` or
//! `Display`, so keys can travel through structured logs and error messages without leaking.

use std::fmt;

/// Secret API key for a remote provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key, trimming surrounding whitespace.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self(value.trim().to_string())
    }

    /// Wrap the value only when it is non-blank.
    pub fn non_blank(value: Option<String>) -> Option<Self> {
        value
            .filter(|raw| !raw.trim().is_empty())
            .map(Self::new)
    }

    /// Raw key for use in request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Keys and index name supplied with an upload.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    /// Key for the embedding and chat model provider.
    pub llm_key: ApiKey,
    /// Key for the vector index service.
    pub index_key: ApiKey,
    /// Name of the remote vector index receiving the chunks.
    pub index_name: String,
}
