/// Result alias that carries the custom [`AnimationError`] type.
pub type Result<T> = std::result::Result<T, AnimationError>;

/// Common error type for the core crate.
///
/// Every variant is recoverable: the control surface reports it to the
/// operator and carries on.
#[derive(Debug, thiserror::Error)]
pub enum AnimationError {
    /// The requested mode is not registered in the renderer set.
    #[error("unknown mode `{0}`")]
    UnknownMode(String),
    /// Frame delays must be finite numbers.
    #[error("invalid speed `{0}`")]
    InvalidSpeed(String),
    #[error("invalid colour index `{0}`")]
    InvalidColorIndex(String),
    #[error("invalid colour mode `{0}` (expected cycle, random or single)")]
    InvalidColorPolicy(String),
    #[error("invalid auto-cycle interval `{0}`")]
    InvalidInterval(String),
    #[error("preset name is empty")]
    EmptyPresetName,
    #[error("preset `{0}` not found")]
    PresetNotFound(String),
    /// A frame generator failed; the render task treats this as a stop.
    #[error("render failure in `{mode}`: {reason}")]
    Render { mode: String, reason: String },
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Preset file could not be encoded or decoded.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl AnimationError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Failure raised by a frame generator.
    pub fn render(mode: &str, reason: impl Into<String>) -> Self {
        Self::Render {
            mode: mode.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for AnimationError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for AnimationError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
