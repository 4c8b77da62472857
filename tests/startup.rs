use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use focus_auth::{
    ConferenceId, FocusAllocationListener, FocusManager, IdentityBindListener, config::Config,
    startup,
};

#[derive(Default)]
struct StubFocus {
    conferences: Mutex<HashSet<String>>,
    listener: Mutex<Option<Arc<dyn FocusAllocationListener>>>,
}

impl FocusManager for StubFocus {
    fn get_conference(&self, room_name: &str) -> Option<ConferenceId> {
        self.conferences
            .lock()
            .unwrap()
            .contains(room_name)
            .then_some(ConferenceId(1))
    }

    fn set_focus_allocation_listener(&self, listener: Option<Arc<dyn FocusAllocationListener>>) {
        *self.listener.lock().unwrap() = listener;
    }
}

#[derive(Default)]
struct RecordingListener {
    bindings: Mutex<Vec<(String, String)>>,
}

impl IdentityBindListener for RecordingListener {
    fn on_user_authenticated(&self, participant_address: &str, identity: &str) {
        self.bindings
            .lock()
            .unwrap()
            .push((participant_address.to_string(), identity.to_string()));
    }
}

const CONFIG: &str = concat!(
    "[auth]\n",
    "url_template = \"https://idp.example.net/auth?token=%s\"\n",
    "reserved_rooms = \"lobby\"\n",
    "token_lifetime_ms = 60000\n",
    "pre_auth_lifetime_ms = 30000\n",
    "expiry_poll_interval_ms = 10000\n",
);

#[test]
fn startup_wires_the_authority_end_to_end() -> Result<()> {
    let config: Config = CONFIG.parse()?;
    let focus = Arc::new(StubFocus::default());

    let authority = startup(Arc::new(config), focus.clone())?;
    assert!(focus.listener.lock().unwrap().is_some());

    let listener = Arc::new(RecordingListener::default());
    authority.add_identity_bind_listener(listener.clone());

    let url = authority.issue_url("room1@conf.example.net/alice", "room1");
    assert!(url.starts_with("https://idp.example.net/auth?token="));

    let token = url.rsplit_once("token=").map(|(_, t)| t.to_string()).unwrap();
    assert!(authority.authenticate(&token, "alice@idp"));

    assert!(authority.is_user_authenticated("room1@conf.example.net/alice", "room1"));
    assert!(authority.is_allowed_to_create_room("anyone", "lobby"));
    assert_eq!(listener.bindings.lock().unwrap().len(), 1);

    authority.stop();
    assert!(focus.listener.lock().unwrap().is_none());

    Ok(())
}

#[test]
fn startup_rejects_a_template_without_a_token_slot() -> Result<()> {
    let config: Config = concat!("[auth]\n", "url_template = \"https://idp/auth\"\n").parse()?;
    let focus = Arc::new(StubFocus::default());

    assert!(startup(Arc::new(config), focus).is_err());

    Ok(())
}

#[test]
fn config_round_trips_through_a_file() -> Result<()> {
    let path = std::env::temp_dir().join(format!("focus-auth-config-{}.toml", std::process::id()));
    std::fs::write(&path, CONFIG)?;

    let config = Config::from_file(&path);
    std::fs::remove_file(&path)?;

    let config = config?;
    assert_eq!(config.auth.token_lifetime_ms, 60_000);
    assert_eq!(config.auth.reserved_room_names(), vec!["lobby".to_string()]);

    Ok(())
}

#[test]
fn configured_timeouts_govern_expiry() -> Result<()> {
    let config: Config = concat!(
        "[auth]\n",
        "url_template = \"https://idp/a?t=%s\"\n",
        "token_lifetime_ms = 40\n",
        "pre_auth_lifetime_ms = 40\n",
        "expiry_poll_interval_ms = 20\n",
    )
    .parse()?;

    let focus = Arc::new(StubFocus::default());
    let authority = startup(Arc::new(config), focus)?;

    authority.issue_url("u1@x", "room1");

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while authority.token_count() != 0 {
        assert!(std::time::Instant::now() < deadline, "token was never swept");
        std::thread::sleep(Duration::from_millis(10));
    }

    authority.stop();

    Ok(())
}
