use thiserror::Error;

/// Construction-time configuration errors.
///
/// All of these are fatal: the authority refuses to come up rather than
/// issue URLs the identity provider cannot honour.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("authentication url template is empty")]
    EmptyUrlTemplate,

    #[error("authentication url template has no `%s` token slot")]
    MissingTokenSlot,

    #[error("authentication url template has more than one `%s` token slot")]
    ExtraTokenSlot,
}
