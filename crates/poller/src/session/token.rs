//! Rotating request signature token.
//!
//! Every storefront request carries a `tid` header of the form
//! `{timestamp}:{nonce}:{digest}` where the digest is the hex SHA-256 of
//! `{store_id}:{timestamp}:{nonce}:{previous token}`. Chaining on the
//! previous token means tokens cannot be precomputed out of order; the
//! first token in a session hashes an empty previous value.

use sha2::{Digest, Sha256};

/// Exclusive upper bound for the per-token nonce.
const NONCE_SPACE: u32 = 1000;

/// Chained signature tokens for one storefront session.
#[derive(Debug, Clone)]
pub struct TokenChain {
    store_id: String,
    previous: String,
}

impl TokenChain {
    /// Start a fresh chain for the given store.
    #[must_use]
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            previous: String::new(),
        }
    }

    /// Mint the next token in the chain.
    pub fn mint(&mut self) -> String {
        use rand::Rng;

        let timestamp = chrono::Utc::now().timestamp_millis();
        let nonce = rand::rng().random_range(0..NONCE_SPACE);
        self.mint_at(timestamp, nonce)
    }

    /// Mint a token for an explicit timestamp and nonce.
    ///
    /// Split out from [`Self::mint`] so the derivation is testable.
    fn mint_at(&mut self, timestamp: i64, nonce: u32) -> String {
        let digest = Sha256::digest(format!(
            "{}:{timestamp}:{nonce}:{}",
            self.store_id, self.previous
        ));
        let token = format!("{timestamp}:{nonce}:{}", hex::encode(digest));
        self.previous.clone_from(&token);
        token
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STORE_ID: &str = "62fa94df8c13af2e242eba16";

    fn digest_hex(input: &str) -> String {
        hex::encode(Sha256::digest(input))
    }

    #[test]
    fn test_token_has_three_segments() {
        let mut chain = TokenChain::new(STORE_ID);
        let token = chain.mint();

        let segments: Vec<&str> = token.splitn(3, ':').collect();
        assert_eq!(segments.len(), 3);

        let timestamp: i64 = segments[0].parse().unwrap();
        assert!(timestamp > 0);

        let nonce: u32 = segments[1].parse().unwrap();
        assert!(nonce < NONCE_SPACE);

        assert_eq!(segments[2].len(), 64);
        assert!(segments[2].bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_first_token_hashes_empty_previous() {
        let mut chain = TokenChain::new(STORE_ID);
        let token = chain.mint_at(1_700_000_000_000, 7);

        let expected = digest_hex(&format!("{STORE_ID}:1700000000000:7:"));
        assert_eq!(token, format!("1700000000000:7:{expected}"));
    }

    #[test]
    fn test_tokens_chain_on_previous() {
        let mut chain = TokenChain::new(STORE_ID);
        let first = chain.mint_at(1_700_000_000_000, 7);
        let second = chain.mint_at(1_700_000_000_500, 13);

        let expected = digest_hex(&format!("{STORE_ID}:1700000000500:13:{first}"));
        assert_eq!(second, format!("1700000000500:13:{expected}"));
    }

    #[test]
    fn test_chains_differ_per_store() {
        let mut a = TokenChain::new("store-a");
        let mut b = TokenChain::new("store-b");
        assert_ne!(a.mint_at(1, 1), b.mint_at(1, 1));
    }
}
