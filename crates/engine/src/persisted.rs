//! Persisted query store, keyed by the SHA-256 of the query text.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

/// Known queries for one schema. Hash lookups ignore case.
#[derive(Debug, Clone, Default)]
pub struct PersistedQueries {
    by_hash: HashMap<String, String>,
}

impl PersistedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `query` under `hash`.
    pub fn insert(&mut self, hash: impl AsRef<str>, query: impl Into<String>) {
        self.by_hash
            .insert(hash.as_ref().to_ascii_lowercase(), query.into());
    }

    /// Store each query under its own hash.
    pub fn from_queries<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self::new();
        for query in queries {
            let query = query.into();
            store.insert(Self::hash(&query), query);
        }
        store
    }

    pub fn get(&self, hash: &str) -> Option<&str> {
        self.by_hash
            .get(&hash.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Lowercase hex SHA-256 of `query`.
    pub fn hash(query: &str) -> String {
        hex::encode(Sha256::digest(query.as_bytes()))
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for PersistedQueries {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut store = Self::new();
        for (hash, query) in iter {
            store.insert(hash, query);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD: &str = "{ add(x: 1, y: 2) }";
    const ADD_HASH: &str = "bf61a23d73ba6e5f2de29ca4eeebba098fc577ea134ca6acde99e1c5d25d98cd";

    #[test]
    fn hash_is_lowercase_sha256() {
        assert_eq!(PersistedQueries::hash(ADD), ADD_HASH);
    }

    #[test]
    fn lookup_ignores_case() {
        let store: PersistedQueries =
            [("BF61A23D73BA6E5F2DE29CA4EEEBBA098FC577EA134CA6ACDE99E1C5D25D98CD", ADD)]
                .into_iter()
                .collect();
        assert_eq!(store.get(ADD_HASH), Some(ADD));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn from_queries_hashes_each_entry() {
        let store = PersistedQueries::from_queries([ADD]);
        assert_eq!(store.get(ADD_HASH), Some(ADD));
        assert!(store.get("deadbeef").is_none());
    }
}
