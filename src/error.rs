//! Error types and the stable result-code space.
//!
//! Every engine operation either returns [`UspError`] synchronously or
//! reports one through the registered error callback. Each variant maps to
//! a stable 32-bit result code so callers can branch on category rather
//! than on message text.

use thiserror::Error;

/// The success result code. Every error code is nonzero.
pub const USP_SUCCESS: u32 = 0;

/// Base value for all error codes; the low 12 bits carry the subcode.
const ERRCODE_BASE: u32 = 0x800f_6000;

const fn errcode(subcode: u32) -> u32 {
    ERRCODE_BASE | (subcode & 0x0fff)
}

/// Coarse error category, derived from the subcode nibble.
///
/// Callers that only care about "can I retry" vs "is the session gone"
/// branch on this instead of matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Session lifecycle and argument errors local to a call.
    Session,
    /// Errors on the audio write path.
    Write,
    /// Network and protocol-level transport errors.
    Transport,
    /// Functionality the engine does not provide.
    Unsupported,
}

/// Error type for all engine operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UspError {
    /// The session has not been initialized yet.
    #[error("session is not initialized")]
    Uninitialized,

    /// `initialize` was called on a slot that is already active.
    #[error("session is already initialized")]
    AlreadyInitialized,

    /// Session setup failed before the session became active.
    #[error("initialization failed: {0}")]
    InitializationFailure(String),

    /// The handle is unknown or has been terminated.
    #[error("invalid handle")]
    InvalidHandle,

    /// A caller-supplied argument is invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Inbound data could not be decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Writing audio to the transport failed.
    #[error("write failed: {0}")]
    WriteError(String),

    /// A generic transport-level failure.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The service rejected the supplied credentials.
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// No network connection to the service.
    #[error("no connection to the service")]
    NoConnection,

    /// A network operation timed out.
    #[error("connection timed out")]
    ConnectionTimeout,

    /// The requested functionality is not implemented.
    #[error("not implemented")]
    NotImplemented,
}

impl UspError {
    /// The stable 32-bit result code for this error.
    pub fn code(&self) -> u32 {
        match self {
            UspError::Uninitialized => errcode(0x001),
            UspError::AlreadyInitialized => errcode(0x002),
            UspError::InitializationFailure(_) => errcode(0x003),
            UspError::InvalidHandle => errcode(0x004),
            UspError::InvalidParameter(_) => errcode(0x005),
            UspError::InvalidData(_) => errcode(0x006),
            UspError::WriteError(_) => errcode(0x010),
            UspError::TransportError(_) => errcode(0x020),
            UspError::AuthError(_) => errcode(0x021),
            UspError::NoConnection => errcode(0x022),
            UspError::ConnectionTimeout => errcode(0x023),
            UspError::NotImplemented => errcode(0xfff),
        }
    }

    /// The category nibble of this error's code.
    pub fn category(&self) -> ErrorCategory {
        let subcode = self.code() & 0x0fff;
        if subcode == 0xfff {
            return ErrorCategory::Unsupported;
        }
        match (subcode >> 4) & 0xf {
            0x0 => ErrorCategory::Session,
            0x1 => ErrorCategory::Write,
            _ => ErrorCategory::Transport,
        }
    }

    /// True for errors raised by the transport layer.
    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }
}

/// Result alias used across the crate.
pub type UspResult<T> = Result<T, UspError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(UspError::Uninitialized.code(), 0x800f_6001);
        assert_eq!(UspError::AlreadyInitialized.code(), 0x800f_6002);
        assert_eq!(
            UspError::InitializationFailure("x".into()).code(),
            0x800f_6003
        );
        assert_eq!(UspError::InvalidHandle.code(), 0x800f_6004);
        assert_eq!(UspError::InvalidParameter("x".into()).code(), 0x800f_6005);
        assert_eq!(UspError::InvalidData("x".into()).code(), 0x800f_6006);
        assert_eq!(UspError::WriteError("x".into()).code(), 0x800f_6010);
        assert_eq!(UspError::TransportError("x".into()).code(), 0x800f_6020);
        assert_eq!(UspError::AuthError("x".into()).code(), 0x800f_6021);
        assert_eq!(UspError::NoConnection.code(), 0x800f_6022);
        assert_eq!(UspError::ConnectionTimeout.code(), 0x800f_6023);
        assert_eq!(UspError::NotImplemented.code(), 0x800f_6fff);
    }

    #[test]
    fn test_success_is_zero_and_disjoint() {
        assert_eq!(USP_SUCCESS, 0);
        assert_ne!(UspError::Uninitialized.code(), USP_SUCCESS);
        assert_ne!(UspError::NoConnection.code(), USP_SUCCESS);
    }

    #[test]
    fn test_categories() {
        assert_eq!(UspError::Uninitialized.category(), ErrorCategory::Session);
        assert_eq!(
            UspError::InvalidParameter("x".into()).category(),
            ErrorCategory::Session
        );
        assert_eq!(
            UspError::WriteError("x".into()).category(),
            ErrorCategory::Write
        );
        assert_eq!(
            UspError::TransportError("x".into()).category(),
            ErrorCategory::Transport
        );
        assert_eq!(UspError::NoConnection.category(), ErrorCategory::Transport);
        assert_eq!(
            UspError::ConnectionTimeout.category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            UspError::NotImplemented.category(),
            ErrorCategory::Unsupported
        );
    }

    #[test]
    fn test_transport_predicate() {
        assert!(UspError::NoConnection.is_transport());
        assert!(UspError::AuthError("denied".into()).is_transport());
        assert!(!UspError::InvalidHandle.is_transport());
        assert!(!UspError::WriteError("x".into()).is_transport());
    }

    #[test]
    fn test_display_messages() {
        let err = UspError::AuthError("key rejected".to_string());
        assert_eq!(err.to_string(), "authentication failed: key rejected");
        assert_eq!(UspError::InvalidHandle.to_string(), "invalid handle");
    }
}
