use thiserror::Error;

/// Failures the embed surfaces to the user.
///
/// Best-effort message sends and cleanup failures never become an
/// `EmbedError`; those are logged and dropped where they happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedError {
    /// The host cannot render the build at all (no WebGL). Fatal for the mount.
    #[error("{0}")]
    Unsupported(String),

    /// The loader script failed to load or never exposed its factory.
    #[error("{0}")]
    ScriptLoad(String),

    /// The factory call rejected or threw.
    #[error("{0}")]
    Instantiate(String),
}

impl EmbedError {
    /// Whether a restart can be expected to clear this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EmbedError::Unsupported(_))
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}
