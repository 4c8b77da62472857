pub mod config;
pub mod observer;

use std::{sync::Arc, time::Duration};

use self::{config::Config, observer::Observer};

pub use authority::{
    Authority, AuthorityOptions, ConferenceId, ConfigError, FocusAllocationListener, FocusManager,
    IdentityBindListener, clock,
};

/// Builds and starts the authentication authority from loaded
/// configuration, wired to the given focus manager.
///
/// Opened up as a function (rather than buried in a binary) so that the
/// embedding conference-focus service and the integration tests construct
/// the subsystem the same way.
pub fn startup(
    config: Arc<Config>,
    focus: Arc<dyn FocusManager>,
) -> anyhow::Result<Arc<Authority>> {
    let mut options = AuthorityOptions::new(config.auth.url_template.as_str());
    options.reserved_rooms = config.auth.reserved_room_names();
    options.token_lifetime = Duration::from_millis(config.auth.token_lifetime_ms);
    options.pre_auth_lifetime = Duration::from_millis(config.auth.pre_auth_lifetime_ms);
    options.expiry_poll_interval = Duration::from_millis(config.auth.expiry_poll_interval_ms);

    let authority = Authority::new(options)?;
    authority.add_identity_bind_listener(Arc::new(Observer::default()));
    authority.start(focus);

    Ok(authority)
}
