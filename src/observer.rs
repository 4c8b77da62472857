use std::sync::atomic::{AtomicUsize, Ordering};

use authority::IdentityBindListener;

/// The identity-bind listener shipped with the embedding layer: announces
/// every binding in the service log and keeps a running total.
#[derive(Debug, Default)]
pub struct Observer {
    authenticated: AtomicUsize,
}

impl Observer {
    /// Number of successful identity bindings seen so far.
    pub fn authenticated(&self) -> usize {
        self.authenticated.load(Ordering::Relaxed)
    }
}

impl IdentityBindListener for Observer {
    fn on_user_authenticated(&self, participant_address: &str, identity: &str) {
        let total = self.authenticated.fetch_add(1, Ordering::Relaxed) + 1;

        log::info!(
            "user authenticated: address={participant_address}, identity={identity}, total={total}"
        );
    }
}
