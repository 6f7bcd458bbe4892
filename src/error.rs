use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrowError {
    #[error("no device acknowledged the handshake (tried {tried} candidate(s))")]
    DeviceNotFound { tried: usize },

    #[error("malformed reading {line:?}: {reason}")]
    MalformedReading { line: String, reason: String },

    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    InvalidInput { expected: usize, actual: usize },

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("design matrix for action {action} is not positive definite")]
    NumericDegeneracy { action: usize },

    #[error("action index {0} out of range")]
    InvalidAction(usize),

    #[error("timed out waiting for device on {0}")]
    DeviceTimeout(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("device lost: {0}")]
    DeviceLost(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("interaction log error: {0}")]
    Log(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GrowError {
    pub fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedReading {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors that only invalidate the in-flight control cycle.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedReading { .. } | Self::DeviceTimeout(_) | Self::Device(_)
        )
    }

    /// Short machine-readable code used in robot output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DeviceNotFound { .. } => "device_not_found",
            Self::MalformedReading { .. } => "malformed_reading",
            Self::InvalidInput { .. } | Self::NonFinite(_) => "invalid_input",
            Self::NumericDegeneracy { .. } => "numeric_degeneracy",
            Self::InvalidAction(_) => "invalid_action",
            Self::DeviceTimeout(_) => "device_timeout",
            Self::Device(_) => "device_error",
            Self::DeviceLost(_) => "device_lost",
            Self::Config(_) | Self::MissingConfig(_) => "config_error",
            Self::Log(_) | Self::Csv(_) => "log_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }
}

impl From<serialport::Error> for GrowError {
    fn from(err: serialport::Error) -> Self {
        Self::Device(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GrowError>;
