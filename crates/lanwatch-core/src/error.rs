use thiserror::Error;

/// Errors raised when building core types from untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Invalid IPv4 address: {0}")]
    InvalidIp(String),
}
