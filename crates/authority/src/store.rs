use std::time::Duration;

use ahash::{HashMap, HashMapExt};
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::Rng;

/// Random bytes behind each token string. 128 bits, comfortably above the
/// guessing floor for a credential that claims the bound address.
const TOKEN_BYTES: usize = 16;

/// Issuance record for one authentication URL.
///
/// Keyed by the token string in the store. A token is single use: consuming
/// it removes the record and promotes it to an [`AuthenticationState`].
#[derive(Debug, Clone)]
pub struct AuthenticationToken {
    pub participant_address: String,
    /// Room name exactly as requested, domain suffix included.
    pub room_name: String,
    /// Monotonic issuance timestamp.
    pub created: Duration,
}

/// The proven binding of a participant address to an external identity.
///
/// Keyed by the participant address in the store, which is what makes the
/// binding unique per address.
#[derive(Debug, Clone)]
pub struct AuthenticationState {
    /// Room name carried over from the consumed token.
    pub room_name: String,
    /// Subject assertion returned by the identity provider.
    pub identity: String,
    /// Monotonic binding timestamp.
    pub authenticated_at: Duration,
}

/// The token and state tables.
///
/// Both tables share one mutex owned by the authority; every method here
/// assumes the caller already holds it.
#[derive(Default)]
pub(crate) struct Store {
    tokens: HashMap<String, AuthenticationToken>,
    states: HashMap<String, AuthenticationState>,
}

impl Store {
    pub fn insert_token(&mut self, token: String, record: AuthenticationToken) {
        self.tokens.insert(token, record);
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    /// Consumes a token. Absent means never issued, already consumed, or
    /// already evicted; the caller cannot tell these apart and does not
    /// need to.
    pub fn take_token(&mut self, token: &str) -> Option<AuthenticationToken> {
        self.tokens.remove(token)
    }

    pub fn remove_token(&mut self, token: &str) -> Option<AuthenticationToken> {
        self.tokens.remove(token)
    }

    pub fn token_created(&self, token: &str) -> Option<Duration> {
        self.tokens.get(token).map(|record| record.created)
    }

    /// Binds an address to an identity, overwriting any previous binding
    /// for the same address.
    pub fn bind(
        &mut self,
        participant_address: String,
        state: AuthenticationState,
    ) -> Option<AuthenticationState> {
        self.states.insert(participant_address, state)
    }

    pub fn state(&self, participant_address: &str) -> Option<&AuthenticationState> {
        self.states.get(participant_address)
    }

    pub fn remove_state(&mut self, participant_address: &str) -> Option<AuthenticationState> {
        self.states.remove(participant_address)
    }

    /// Token keys belonging to a room, copied out so the caller can remove
    /// while it walks.
    pub fn room_tokens(&self, room_name: &str) -> Vec<String> {
        self.tokens
            .iter()
            .filter(|(_, record)| record.room_name == room_name)
            .map(|(token, _)| token.clone())
            .collect()
    }

    /// State keys (participant addresses) belonging to a room, copied out
    /// so the caller can remove while it walks.
    pub fn room_states(&self, room_name: &str) -> Vec<String> {
        self.states
            .iter()
            .filter(|(_, state)| state.room_name == room_name)
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Issuance timestamps of every live token, for the expiry sweep.
    pub fn token_snapshot(&self) -> Vec<(String, Duration)> {
        self.tokens
            .iter()
            .map(|(token, record)| (token.clone(), record.created))
            .collect()
    }

    /// Binding timestamps of every live state, for the expiry sweep.
    pub fn state_snapshot(&self) -> Vec<(String, String, Duration)> {
        self.states
            .iter()
            .map(|(address, state)| {
                (
                    address.clone(),
                    state.room_name.clone(),
                    state.authenticated_at,
                )
            })
            .collect()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.states.clear();
    }
}

/// Generate a fresh token string from CSPRNG bytes, URL-safe so it can ride
/// in a query parameter without escaping.
pub(crate) fn make_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);

    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}
