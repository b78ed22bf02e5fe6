use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ──────────────────── Event Kinds ────────────────────

/// Well-known inbound event kinds.
///
/// Hooks are keyed by an open string so plugins can also subscribe to
/// server numerics ("001", "372", ...) or anything else the connection
/// layer hands over.
pub mod kinds {
    pub const PRIVMSG: &str = "PRIVMSG";
    pub const NOTICE: &str = "NOTICE";
    pub const JOIN: &str = "JOIN";
    pub const PART: &str = "PART";
    pub const QUIT: &str = "QUIT";
    pub const NICK: &str = "NICK";
    pub const KICK: &str = "KICK";
    pub const TOPIC: &str = "TOPIC";
    pub const MODE: &str = "MODE";
    pub const INVITE: &str = "INVITE";
}

// ──────────────────── Events ────────────────────

/// One inbound protocol event, as handed over by the connection layer.
///
/// The hook runtime only interprets `kind`; every other field is opaque
/// payload passed through to the hooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    /// Event kind (IRC command name or numeric).
    pub kind: String,
    /// Nick of the sender.
    #[serde(default)]
    pub nick: String,
    /// Username portion of the sender prefix.
    #[serde(default)]
    pub user: String,
    /// Ident reported by the sender's client.
    #[serde(default)]
    pub ident: String,
    /// Full sender mask (`nick!user@host`).
    #[serde(default)]
    pub mask: String,
    /// Channel the event happened in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Message text, if any.
    #[serde(default)]
    pub message: String,
    /// Raw protocol line the event was parsed from.
    #[serde(default)]
    pub raw: String,
    /// Whether the message was a CTCP ACTION (`/me`).
    #[serde(default)]
    pub is_action: bool,
    /// Arrival timestamp (unix millis).
    #[serde(default)]
    pub timestamp: i64,
}

impl Event {
    /// Create an event of the given kind with the current timestamp.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: now_millis(),
            ..Self::default()
        }
    }

    /// Convenience constructor for a channel PRIVMSG.
    pub fn privmsg(
        nick: impl Into<String>,
        channel: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let nick = nick.into();
        let channel = channel.into();
        let message = message.into();
        Self {
            mask: format!("{nick}!{nick}@unknown"),
            user: nick.clone(),
            ident: nick.clone(),
            raw: format!(":{nick} PRIVMSG {channel} :{message}"),
            nick,
            channel: Some(channel),
            message,
            ..Self::new(kinds::PRIVMSG)
        }
    }

    /// Convenience constructor for a JOIN.
    pub fn join(nick: impl Into<String>, channel: impl Into<String>) -> Self {
        let nick = nick.into();
        let channel = channel.into();
        Self {
            mask: format!("{nick}!{nick}@unknown"),
            raw: format!(":{nick} JOIN {channel}"),
            nick,
            channel: Some(channel),
            ..Self::new(kinds::JOIN)
        }
    }

    /// Where a reply to this event should go: the channel when present,
    /// otherwise back to the sender.
    pub fn reply_target(&self) -> &str {
        self.channel.as_deref().unwrap_or(&self.nick)
    }
}

/// Current unix time in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ──────────────────── HTTP Route Payloads ────────────────────

/// A decoded HTTP request handed to a plugin route handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    /// HTTP method, uppercase.
    pub method: String,
    /// Request path, without the query string.
    pub path: String,
    /// Decoded query-string parameters.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, String>,
}

impl RouteRequest {
    /// Build a GET request for the given path.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            params: HashMap::new(),
        }
    }

    /// Add a query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// The response a plugin route handler produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header value.
    pub content_type: String,
    /// Response body.
    pub body: String,
}

/// Literal body served for unmatched requests.
pub const NOT_FOUND_BODY: &str = "404 Not found";

impl RouteResponse {
    /// A 200 text/plain response.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: body.into(),
        }
    }

    /// The fixed fallback response for unmatched requests.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: NOT_FOUND_BODY.to_string(),
        }
    }
}
