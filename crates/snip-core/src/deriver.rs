use crate::short_key::ShortKey;
use xxhash_rust::xxh32::xxh32;

/// Derives the short key for an original URL.
///
/// Implementations must be pure: the same input yields the same key across
/// process restarts and storage backends, because keys double as idempotence
/// tokens for repeated submissions of the same URL.
pub trait Deriver: Send + Sync + 'static {
    fn derive(&self, original_url: &str) -> ShortKey;
}

/// Derives keys from the 32-bit xxHash of the URL bytes, rendered in decimal.
///
/// Collisions are not avoided. Two different URLs that hash to the same value
/// map to the same key, and the second one to be stored is rejected by the
/// store as a conflict.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh32Deriver {
    seed: u32,
}

impl Xxh32Deriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changing the seed changes every derived key; stores populated with one
    /// seed are not addressable with another.
    pub fn with_seed(seed: u32) -> Self {
        Self { seed }
    }
}

impl Deriver for Xxh32Deriver {
    fn derive(&self, original_url: &str) -> ShortKey {
        ShortKey::new(xxh32(original_url.as_bytes(), self.seed).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn derive_is_deterministic() {
        let deriver = Xxh32Deriver::new();
        let first = deriver.derive("https://example.com/a");
        let second = deriver.derive("https://example.com/a");
        assert_eq!(first, second);

        // a fresh instance behaves like a restarted process
        assert_eq!(Xxh32Deriver::new().derive("https://example.com/a"), first);
    }

    #[test]
    fn distinct_urls_get_distinct_keys() {
        let deriver = Xxh32Deriver::new();
        assert_ne!(
            deriver.derive("https://example.com/a"),
            deriver.derive("https://example.com/b")
        );

        let keys: HashSet<ShortKey> = (0..1_000)
            .map(|i| deriver.derive(&format!("https://example.com/page/{i}")))
            .collect();
        assert_eq!(keys.len(), 1_000);
    }

    #[test]
    fn keys_are_decimal() {
        let key = Xxh32Deriver::new().derive("https://example.com");
        assert!(!key.as_str().is_empty());
        assert!(key.as_str().chars().all(|c| c.is_ascii_digit()));
        assert!(key.as_str().parse::<u32>().is_ok());
    }

    #[test]
    fn empty_input_matches_reference_vector() {
        // XXH32("", seed = 0) == 0x02CC5D05
        assert_eq!(Xxh32Deriver::new().derive("").as_str(), "46947589");
    }

    #[test]
    fn seed_changes_keys() {
        let url = "https://example.com/a";
        assert_ne!(
            Xxh32Deriver::with_seed(1).derive(url),
            Xxh32Deriver::new().derive(url)
        );
    }

    #[test]
    fn deriver_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Xxh32Deriver>();
    }
}
