//! Error taxonomy.
//!
//! Transport errors are fatal and end the reactor. Decode errors are
//! recoverable: the offending write is dropped and state is kept. Notify
//! errors are best effort and only logged.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::ConfigError;

/// Recoverable protocol anomaly on the operator link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("undefined operator state code {code} in command byte {byte:#04x}")]
    UndefinedStateCode { code: u8, byte: u8 },

    #[error("empty command write")]
    EmptyWrite,
}

/// Vehicle bus failure. The bus link is a precondition for safe operation,
/// so none of these are retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open bus transport on {addr}: {source}")]
    Open {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("bus i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bus frame of {got} bytes, expected {expected}")]
    FrameLength { got: usize, expected: usize },

    #[error("malformed bus frame {id:#05x}: {reason}")]
    Malformed { id: u32, reason: &'static str },
}

/// Best-effort notification delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("no wireless client subscribed to notifications")]
    NoSubscribers,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("wireless link error: {0}")]
    Wireless(#[source] std::io::Error),
}

impl GatewayError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            GatewayError::Transport(_) | GatewayError::Wireless(_) => 1,
            GatewayError::Config(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::UndefinedStateCode { code: 7, byte: 0xE3 };
        let text = err.to_string();
        assert!(text.contains('7'));
        assert!(text.contains("0xe3"));
    }

    #[test]
    fn test_exit_codes() {
        let transport = GatewayError::from(TransportError::FrameLength { got: 3, expected: 16 });
        assert_eq!(transport.exit_code(), 1);

        let config = GatewayError::from(ConfigError::invalid("timers.governor_period_ms", "must be non-zero"));
        assert_eq!(config.exit_code(), 2);
    }
}
