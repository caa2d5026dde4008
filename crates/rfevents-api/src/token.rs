// ── Plugin session token cache ──
//
// One token per plugin ID, shared by every caller of the gateway.
// `get` and `store` are the only access points.

use dashmap::DashMap;
use secrecy::SecretString;

#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: DashMap<String, SecretString>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, plugin_id: &str) -> Option<SecretString> {
        self.tokens.get(plugin_id).map(|t| t.value().clone())
    }

    pub fn store(&self, plugin_id: &str, token: SecretString) {
        self.tokens.insert(plugin_id.to_owned(), token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
