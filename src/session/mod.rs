//! Session lifecycle for the Streamable HTTP transport
//!
//! A session starts with an `initialize` request that carries no `mcp-session-id`
//! header. It becomes routable once its transport reports a completed handshake and
//! stops being routable when the transport reports closure.

pub mod channel;
pub mod registry;
pub mod transport;

use std::fmt;

use uuid::Uuid;

pub use channel::NotificationChannel;
pub use registry::SessionRegistry;
pub use transport::{SessionEvent, SessionTransport, TransportReply};

pub const SESSION_HEADER: &str = "mcp-session-id";

/// What a request's `mcp-session-id` header says about its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionHeader {
    /// No header, or only whitespace.
    Absent,
    /// A header whose bytes are not readable as text.
    Unreadable,
    Present(SessionId),
}

impl SessionHeader {
    pub fn read(headers: &axum::http::HeaderMap) -> Self {
        let Some(raw) = headers.get(SESSION_HEADER) else {
            return Self::Absent;
        };
        let Ok(text) = raw.to_str() else {
            return Self::Unreadable;
        };

        match text.trim() {
            "" => Self::Absent,
            id => Self::Present(SessionId(id.to_string())),
        }
    }

    pub fn session_id(self) -> Option<SessionId> {
        match self {
            Self::Present(id) => Some(id),
            Self::Absent | Self::Unreadable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[cfg(test)]
    pub fn from_raw(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
