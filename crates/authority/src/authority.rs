use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Weak},
    thread::{self, JoinHandle},
    time::Duration,
};

use ahash::{HashSet, HashSetExt};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::{
    FocusAllocationListener, FocusManager, IdentityBindListener,
    clock::{Clock, MonotonicClock},
    error::ConfigError,
    store::{self, AuthenticationState, AuthenticationToken, Store},
    template::UrlTemplate,
};

/// Maximum time an unredeemed token lives.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60);

/// Maximum time an authentication state lives while its room has not been
/// created.
pub const DEFAULT_PRE_AUTH_LIFETIME: Duration = Duration::from_secs(30);

/// How often the background sweep looks for expired entries.
pub const DEFAULT_EXPIRY_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct AuthorityOptions {
    /// Identity-provider URL with exactly one `%s` slot for the token.
    pub url_template: String,
    /// Room local parts anyone may create without authenticating.
    pub reserved_rooms: Vec<String>,
    pub token_lifetime: Duration,
    pub pre_auth_lifetime: Duration,
    pub expiry_poll_interval: Duration,
    /// Monotonic time source. Tests inject a hand-advanced clock here.
    pub clock: Arc<dyn Clock>,
}

impl AuthorityOptions {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            reserved_rooms: Vec::new(),
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            pre_auth_lifetime: DEFAULT_PRE_AUTH_LIFETIME,
            expiry_poll_interval: DEFAULT_EXPIRY_POLL_INTERVAL,
            clock: Arc::new(MonotonicClock::default()),
        }
    }
}

/// The external-authentication authority.
///
/// Issues identity-provider URLs, consumes the tokens the redirect handler
/// brings back, answers the focus manager's policy queries, and bounds the
/// lifetime of everything the browser round trip never completes.
///
/// ```
/// use focus_auth_authority::{Authority, AuthorityOptions};
///
/// let authority =
///     Authority::new(AuthorityOptions::new("https://idp.example.net/auth?token=%s")).unwrap();
///
/// let url = authority.issue_url("room1@conf.example.net/alice", "room1");
/// let token = url.rsplit_once("token=").map(|(_, t)| t.to_string()).unwrap();
///
/// assert!(authority.authenticate(&token, "alice@example.net"));
/// assert!(authority.is_user_authenticated("room1@conf.example.net/alice", "room1"));
/// assert!(!authority.is_user_authenticated("room1@conf.example.net/alice", "room2"));
/// ```
pub struct Authority {
    template: UrlTemplate,
    reserved_rooms: HashSet<String>,
    token_lifetime: Duration,
    pre_auth_lifetime: Duration,
    expiry_poll_interval: Duration,
    clock: Arc<dyn Clock>,
    // The one mutex guarding both tables. Everything the redirect handler,
    // the focus manager and the expiry sweep can observe commits under it.
    store: Mutex<Store>,
    listeners: RwLock<Vec<Arc<dyn IdentityBindListener>>>,
    // Doubles as the started flag: `stop` takes it and in-flight expiry
    // ticks become no-ops.
    focus: RwLock<Option<Arc<dyn FocusManager>>>,
    expiry: Mutex<Option<ExpiryLoop>>,
}

impl Authority {
    /// Validates the URL template and builds a stopped authority.
    pub fn new(options: AuthorityOptions) -> Result<Arc<Self>, ConfigError> {
        let template = UrlTemplate::parse(&options.url_template)?;

        let mut reserved_rooms = HashSet::with_capacity(options.reserved_rooms.len());
        for room in &options.reserved_rooms {
            let name = local_part(room).trim();
            if !name.is_empty() {
                reserved_rooms.insert(name.to_string());
            }
        }

        Ok(Arc::new(Self {
            template,
            reserved_rooms,
            token_lifetime: options.token_lifetime,
            pre_auth_lifetime: options.pre_auth_lifetime,
            expiry_poll_interval: options.expiry_poll_interval,
            clock: options.clock,
            store: Mutex::new(Store::default()),
            listeners: RwLock::new(Vec::new()),
            focus: RwLock::new(None),
            expiry: Mutex::new(None),
        }))
    }

    /// Issues a fresh single-use token for `(participant_address,
    /// room_name)` and returns the identity-provider URL carrying it.
    pub fn issue_url(&self, participant_address: &str, room_name: &str) -> String {
        let token = {
            let mut store = self.store.lock();

            // A duplicate key would hand one participant's address to
            // another token holder, so regenerate on the (practically
            // impossible) collision with a live token.
            let mut token = store::make_token();
            while store.has_token(&token) {
                token = store::make_token();
            }

            store.insert_token(
                token.clone(),
                AuthenticationToken {
                    participant_address: participant_address.to_string(),
                    room_name: room_name.to_string(),
                    created: self.clock.now(),
                },
            );

            token
        };

        log::info!("issued authentication url: address={participant_address}, room={room_name}");

        self.template.render(&token)
    }

    /// Consumes a token brought back by the redirect handler and binds the
    /// owning participant address to `identity`.
    ///
    /// Token removal and state insertion commit under one lock hold, so no
    /// observer sees the token gone without the state present. Listeners
    /// are notified after the lock is released, on every successful call,
    /// including one that overwrites an earlier binding.
    pub fn authenticate(&self, token: &str, identity: &str) -> bool {
        if identity.is_empty() {
            log::warn!("rejected authentication with an empty identity");
            return false;
        }

        let participant_address = {
            let mut store = self.store.lock();

            let Some(record) = store.take_token(token) else {
                log::error!("rejected unknown authentication token");
                return false;
            };

            store.bind(
                record.participant_address.clone(),
                AuthenticationState {
                    room_name: record.room_name,
                    identity: identity.to_string(),
                    authenticated_at: self.clock.now(),
                },
            );

            record.participant_address
        };

        log::info!("user authenticated: address={participant_address}, identity={identity}");
        self.notify_user_authenticated(&participant_address, identity);

        true
    }

    /// Whether `participant_address` may create `room_name`.
    ///
    /// True when the trimmed local part of the room is reserved, or when
    /// any authentication state exists for the address. The state's own
    /// room is deliberately not consulted: a proven identity may create
    /// whichever room it then claims.
    pub fn is_allowed_to_create_room(&self, participant_address: &str, room_name: &str) -> bool {
        if participant_address.is_empty() {
            log::warn!("room-create check with an empty participant address");
            return false;
        }

        if self.reserved_rooms.contains(local_part(room_name).trim()) {
            return true;
        }

        self.store.lock().state(participant_address).is_some()
    }

    /// Whether `participant_address` is authenticated within `room_name`.
    ///
    /// A state bound to one room does not authenticate its holder in any
    /// other.
    pub fn is_user_authenticated(&self, participant_address: &str, room_name: &str) -> bool {
        if participant_address.is_empty() {
            log::warn!("membership check with an empty participant address");
            return false;
        }

        self.store
            .lock()
            .state(participant_address)
            .is_some_and(|state| state.room_name == room_name)
    }

    /// This authority delegates to an external identity provider.
    pub fn is_external(&self) -> bool {
        true
    }

    /// The external identity currently bound to the address, if any.
    pub fn authenticated_identity(&self, participant_address: &str) -> Option<String> {
        self.store
            .lock()
            .state(participant_address)
            .map(|state| state.identity.clone())
    }

    /// Number of live (unredeemed, unexpired) tokens.
    pub fn token_count(&self) -> usize {
        self.store.lock().token_count()
    }

    /// Number of live authentication states.
    pub fn state_count(&self) -> usize {
        self.store.lock().state_count()
    }

    pub fn add_identity_bind_listener(&self, listener: Arc<dyn IdentityBindListener>) {
        self.listeners.write().push(listener);
    }

    pub fn remove_identity_bind_listener(&self, listener: &Arc<dyn IdentityBindListener>) {
        self.listeners
            .write()
            .retain(|it| !Arc::ptr_eq(it, listener));
    }

    /// Registers with the focus manager and spawns the expiry timer.
    ///
    /// Idempotent: calling it while running only refreshes the focus
    /// manager reference.
    pub fn start(self: &Arc<Self>, focus: Arc<dyn FocusManager>) {
        let listener: Arc<dyn FocusAllocationListener> = self.clone();
        focus.set_focus_allocation_listener(Some(listener));
        *self.focus.write() = Some(focus);

        let mut expiry = self.expiry.lock();
        if expiry.is_none() {
            let signal = Arc::new(ShutdownSignal::default());
            let handle =
                spawn_expiry_loop(Arc::downgrade(self), signal.clone(), self.expiry_poll_interval);

            *expiry = Some(ExpiryLoop { signal, handle });
        }
    }

    /// De-registers from the focus manager, drains the expiry timer and
    /// releases every pending token and state. Idempotent.
    pub fn stop(&self) {
        // Clearing the focus reference first makes any in-flight expiry
        // tick a no-op before the timer is joined. The guard is released
        // before calling out to the focus manager.
        let focus = self.focus.write().take();
        if let Some(focus) = focus {
            focus.set_focus_allocation_listener(None);
        }

        let expiry = self.expiry.lock().take();
        if let Some(expiry) = expiry {
            expiry.signal.stop();
            let _ = expiry.handle.join();
        }

        self.store.lock().clear();
    }

    /// Runs one expiry sweep: evicts tokens older than the token lifetime
    /// and states past the pre-authentication deadline whose room still
    /// does not exist. States anchored to a live room are never evicted
    /// here; only [`FocusAllocationListener::on_focus_destroyed`] releases
    /// them.
    ///
    /// Driven by the background timer; public so a sweep can be forced,
    /// which is how the deterministic-clock tests exercise expiry.
    pub fn run_expiry_pass(&self) {
        let Some(focus) = self.focus.read().clone() else {
            return;
        };

        let now = self.clock.now();

        // Snapshot under the lock, compare outside, re-check on removal: a
        // token consumed between the two steps must survive.
        let tokens = self.store.lock().token_snapshot();
        for (token, created) in tokens {
            if now.saturating_sub(created) <= self.token_lifetime {
                continue;
            }

            let mut store = self.store.lock();
            if store.token_created(&token) == Some(created) {
                store.remove_token(&token);
                log::info!("expired unredeemed authentication token");
            }
        }

        // The focus manager is consulted outside the store lock; holding it
        // across the call could cycle with the conference subsystem's own
        // locks.
        let states = self.store.lock().state_snapshot();
        for (address, room_name, authenticated_at) in states {
            if focus.get_conference(&room_name).is_some() {
                continue;
            }

            if now.saturating_sub(authenticated_at) <= self.pre_auth_lifetime {
                continue;
            }

            let mut store = self.store.lock();
            let unchanged = store
                .state(&address)
                .is_some_and(|state| state.authenticated_at == authenticated_at);

            if unchanged {
                store.remove_state(&address);
                log::info!("expired pre-authentication: address={address}, room={room_name}");
            }
        }
    }

    fn notify_user_authenticated(&self, participant_address: &str, identity: &str) {
        let listeners = self.listeners.read().clone();

        for listener in listeners {
            // One faulty listener must not starve the rest.
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener.on_user_authenticated(participant_address, identity);
            }));

            if outcome.is_err() {
                log::error!("identity-bind listener panicked: address={participant_address}");
            }
        }
    }
}

impl FocusAllocationListener for Authority {
    /// Drops every token and state that belonged to the destroyed room.
    /// Both removals commit under one lock hold, so once this returns no
    /// membership check for the room can succeed.
    fn on_focus_destroyed(&self, room_name: &str) {
        let mut store = self.store.lock();

        for token in store.room_tokens(room_name) {
            store.remove_token(&token);
            log::info!("discarded pending token of destroyed room: room={room_name}");
        }

        for address in store.room_states(room_name) {
            store.remove_state(&address);
            log::info!(
                "discarded authentication state of destroyed room: address={address}, room={room_name}"
            );
        }
    }
}

struct ExpiryLoop {
    signal: Arc<ShutdownSignal>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct ShutdownSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl ShutdownSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    /// Sleeps one poll interval, or less if shutdown is signalled. Returns
    /// whether shutdown was signalled.
    fn wait(&self, interval: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            let _ = self.wake.wait_for(&mut stopped, interval);
        }

        *stopped
    }
}

/// Background thread that silently sweeps expired tokens and stale
/// pre-authentications for as long as the authority is alive and started.
fn spawn_expiry_loop(
    authority: Weak<Authority>,
    signal: Arc<ShutdownSignal>,
    interval: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            if signal.wait(interval) {
                break;
            }

            let Some(authority) = authority.upgrade() else {
                break;
            };

            authority.run_expiry_pass();
        }
    })
}

/// Room names may carry a domain suffix; only the local part matters for
/// reservation checks.
fn local_part(room_name: &str) -> &str {
    match room_name.find('@') {
        Some(at) => &room_name[..at],
        None => room_name,
    }
}
