//! Error type shared by the window core and its configuration layer

/// Errors raised by hitwindow operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitError {
    /// A caller passed an argument outside the operation's domain
    InvalidArgument(String),
    /// The configuration file could not be read or parsed
    Config(String),
}

impl HitError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        HitError::InvalidArgument(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, HitError::InvalidArgument(_))
    }
}

impl std::fmt::Display for HitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HitError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            HitError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for HitError {}

/// Metric names, label names and label cardinality are all caller input
impl From<prometheus::Error> for HitError {
    fn from(e: prometheus::Error) -> Self {
        HitError::InvalidArgument(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HitError>;
