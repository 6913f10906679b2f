//! Error types for the fvpn VPN CLI tool
//!
//! This module defines all error types used throughout the application,
//! providing consistent error handling and user-friendly error messages.

use thiserror::Error;

/// Main error type for the fvpn application
#[derive(Error, Debug)]
pub enum FvpnError {
    /// Errors related to profile loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to keyring operations
    #[error("Keyring error: {0}")]
    Keyring(#[from] KeyringError),

    /// Errors related to the connection orchestrator
    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    /// Errors while staging a per-attempt config artifact
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Profile configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load profile file: {path}")]
    LoadFailed { path: String },

    #[error("Profile not found: {name}")]
    ProfileNotFound { name: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// System keyring operation errors
#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("Keyring service unavailable")]
    ServiceUnavailable,

    #[error("Failed to store credential in keyring")]
    StoreFailed,

    #[error("Password not found in keyring")]
    PasswordNotFound,
}

/// Terminal failures surfaced by the failover sequencer
///
/// A non-zero exit from one gateway is not itself terminal (it is retried
/// via failover); only these outcomes end a connection sequence with an
/// error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The VPN client could not be started at all. Not gateway-specific,
    /// so it never advances the failover queue.
    #[error("failed to launch VPN client: {0}")]
    Launch(#[from] LaunchError),

    /// Credential staging failed before a process was even started.
    #[error("could not stage connection config: {reason}")]
    Staging { reason: String },

    /// Every gateway in the queue rejected the connection.
    #[error("all {attempts} gateways rejected the connection")]
    QueueExhausted { attempts: usize },
}

/// Failures to start the external VPN client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("VPN client binary not found: {binary}")]
    BinaryNotFound { binary: String },

    #[error("failed to spawn VPN client: {reason}")]
    SpawnFailed { reason: String },
}

/// Errors while writing or erasing a staged config artifact
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("no writable temporary location: {0}")]
    NoWritableLocation(std::io::Error),

    #[error("failed to write staged config: {0}")]
    WriteFailed(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, FvpnError>;
