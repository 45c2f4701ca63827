use std::fmt;

/// Reasons a gateway handshake can fail. Every variant ends the connection
/// before it is ever registered.
#[derive(Debug)]
pub enum AuthError {
    /// First frame was not a JSON `auth` envelope.
    Malformed,
    /// `auth` envelope without a usable credential.
    MissingToken,
    /// Credential unknown or rejected by the verifier.
    InvalidToken,
    /// Credential known but past its expiry.
    Expired,
    /// No auth frame arrived within the configured handshake window.
    TimedOut,
    /// Peer went away before sending an auth frame.
    Disconnected,
    /// Backing store failed while verifying.
    Database(sqlx::Error),
}

impl AuthError {
    /// Human-readable reason carried in the `auth_error` envelope.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Malformed => "expected an auth message",
            AuthError::MissingToken => "missing token",
            AuthError::InvalidToken => "Invalid token",
            AuthError::Expired => "token expired",
            AuthError::TimedOut => "authentication timed out",
            AuthError::Disconnected => "connection closed",
            AuthError::Database(e) => {
                tracing::error!("token lookup failed: {e}");
                "authentication unavailable"
            }
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Database(e) => write!(f, "database error: {e}"),
            AuthError::Malformed => f.write_str("malformed auth frame"),
            AuthError::MissingToken => f.write_str("missing token"),
            AuthError::InvalidToken => f.write_str("invalid token"),
            AuthError::Expired => f.write_str("expired token"),
            AuthError::TimedOut => f.write_str("handshake timed out"),
            AuthError::Disconnected => f.write_str("peer disconnected during handshake"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Database(e)
    }
}

/// A registered handle could not accept an outbound frame: its gateway has
/// already torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryError;

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection is closed")
    }
}

impl std::error::Error for DeliveryError {}
