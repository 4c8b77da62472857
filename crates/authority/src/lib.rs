//! External-authentication authority for a conference focus service.
//!
//! Participants prove their right to create a conference room through a
//! web-based identity provider: the authority issues a URL carrying a fresh
//! single-use token, the participant authenticates in the browser, and the
//! redirect handler brings the token back together with the asserted
//! identity. A successful round trip binds the participant address to that
//! identity for as long as the room lives.
//!
//! The authority owns exactly two tables, pending tokens and active
//! authentication states, guarded together by one mutex, and a background
//! timer that bounds the lifetime of anything the browser round trip never
//! completes.

pub mod clock;

mod authority;
mod error;
mod store;
mod template;

use std::sync::Arc;

pub use self::{
    authority::{
        Authority, AuthorityOptions, DEFAULT_EXPIRY_POLL_INTERVAL, DEFAULT_PRE_AUTH_LIFETIME,
        DEFAULT_TOKEN_LIFETIME,
    },
    error::ConfigError,
    store::{AuthenticationState, AuthenticationToken},
};

/// Opaque handle to a live conference. The authority only ever tests for
/// presence; the focus manager decides what the number means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConferenceId(pub u64);

/// The conference allocator, as seen from the authority.
///
/// The authority asks it whether a room currently has a conference (states
/// anchored to a live room never expire) and registers itself to hear about
/// conference teardown.
pub trait FocusManager: Send + Sync {
    /// Handle of the conference currently allocated for the room, if any.
    fn get_conference(&self, room_name: &str) -> Option<ConferenceId>;

    /// Installs the listener told about conference teardown, replacing any
    /// previous one. `None` de-registers.
    fn set_focus_allocation_listener(&self, listener: Option<Arc<dyn FocusAllocationListener>>);
}

/// Conference-teardown notifications. Implemented by [`Authority`] and
/// installed on the focus manager by [`Authority::start`].
pub trait FocusAllocationListener: Send + Sync {
    fn on_focus_destroyed(&self, room_name: &str);
}

/// Receives a notification whenever a participant address becomes bound to
/// an external identity.
///
/// Listeners run after the authority has released its internal lock and
/// must not call back into operations that mutate its tables.
pub trait IdentityBindListener: Send + Sync {
    fn on_user_authenticated(&self, participant_address: &str, identity: &str);
}
