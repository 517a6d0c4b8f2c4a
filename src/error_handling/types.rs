use sea_orm::DbErr;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Why a report line was refused.
///
/// `MalformedShape` is a protocol error (the line does not look like a report at all);
/// `BadOffset` and `BadTimestamp` are validation errors on an otherwise well-shaped line.
/// The `Display` text is exactly what the client receives as its reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    MalformedShape,
    BadOffset,
    BadTimestamp,
}

impl RejectionReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::MalformedShape => {
                "Malformed report, expected: <city>,UTC<+/-offset>,<yyyy-M-d H:mm:ss>"
            }
            RejectionReason::BadOffset => "Invalid timezone offset, must be between UTC-12 and UTC+12",
            RejectionReason::BadTimestamp => "Invalid date-time, not a real calendar date and time",
        }
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, RejectionReason::BadOffset | RejectionReason::BadTimestamp)
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for RejectionReason {}

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Store(DbErr),
    NotFound(PathBuf),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "Storage IO failure: {}", e),
            StorageError::Store(e) => write!(f, "Structured store failure: {}", e),
            StorageError::NotFound(p) => write!(f, "File not found: {}", p.display()),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<DbErr> for StorageError {
    fn from(err: DbErr) -> Self {
        StorageError::Store(err)
    }
}

#[derive(Debug)]
pub enum NetworkError {
    BindFailed(SocketAddr, std::io::Error),
    Transport(std::io::Error),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::BindFailed(addr, e) => write!(f, "Bind failed on {}: {}", addr, e),
            NetworkError::Transport(e) => write!(f, "Transport failure: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Transport(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    NetworkError(NetworkError),
    StorageError(StorageError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::NetworkError(e) => write!(f, "Network error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<NetworkError> for ControllerError {
    fn from(err: NetworkError) -> Self {
        ControllerError::NetworkError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}
