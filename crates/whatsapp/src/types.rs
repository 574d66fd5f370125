//! Wire protocol between the session and the WhatsApp sidecar.
//!
//! Both directions are JSON text frames tagged by `type`. The sidecar
//! listens on `127.0.0.1:<port>`; the session is its only client.
//!
//! Session to sidecar:
//!
//! | `type` | fields | reply |
//! |---|---|---|
//! | `login` | `account_id`, `auth_dir` | `qr`/`authenticated`/`connected`, or `connected` at once if already logged in |
//! | `send_text` | `request_id`, `account_id`, `to`, `text` | `send_result` with the same `request_id` |
//!
//! Sidecar to session: `qr`, `authenticated`, `auth_failure`, `connected`,
//! `reconnecting`, `disconnected`, `logged_out`, `inbound_message`,
//! `send_result`, `status_response` and `error`, with the fields of
//! [`SidecarMessage`]. Unknown types are ignored. The bundled
//! implementation lives in `sidecar/whatsapp-baileys`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Frames sent to the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Start (or resume) the WhatsApp Web login for an account.
    Login {
        account_id: String,
        auth_dir: PathBuf,
    },
    /// Deliver a text message; answered by [`SidecarMessage::SendResult`].
    SendText {
        request_id: String,
        account_id: String,
        to: String,
        text: String,
    },
}

/// Frames received from the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    /// A login QR code is waiting to be scanned.
    Qr { account_id: String, qr: String },
    /// Credentials were accepted; `Connected` follows once the session syncs.
    Authenticated { account_id: String },
    AuthFailure { account_id: String, reason: String },
    Connected {
        account_id: String,
        #[serde(default)]
        phone_number: Option<String>,
    },
    /// The sidecar lost WhatsApp and is reconnecting on its own.
    Reconnecting { account_id: String },
    Disconnected { account_id: String, reason: String },
    LoggedOut { account_id: String },
    InboundMessage {
        account_id: String,
        message_id: String,
        /// Chat the message belongs to (the group for group messages).
        chat_jid: String,
        sender_jid: String,
        #[serde(default)]
        sender_name: Option<String>,
        #[serde(default)]
        is_group: bool,
        #[serde(default)]
        group_name: Option<String>,
        #[serde(default)]
        body: String,
        /// Sent by this account from another device.
        #[serde(default)]
        from_me: bool,
        /// Unix seconds.
        #[serde(default)]
        timestamp: Option<i64>,
    },
    SendResult {
        request_id: String,
        success: bool,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    StatusResponse {
        account_id: String,
        connected: bool,
        #[serde(default)]
        phone_number: Option<String>,
    },
    Error {
        #[serde(default)]
        account_id: Option<String>,
        error: String,
    },
    #[serde(other)]
    Unknown,
}

impl SidecarMessage {
    /// Account the frame refers to, when it names one.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::Qr { account_id, .. }
            | Self::Authenticated { account_id }
            | Self::AuthFailure { account_id, .. }
            | Self::Connected { account_id, .. }
            | Self::Reconnecting { account_id }
            | Self::Disconnected { account_id, .. }
            | Self::LoggedOut { account_id }
            | Self::InboundMessage { account_id, .. }
            | Self::StatusResponse { account_id, .. } => Some(account_id),
            Self::Error { account_id, .. } => account_id.as_deref(),
            Self::SendResult { .. } | Self::Unknown => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_text_is_tagged() {
        let msg = GatewayMessage::SendText {
            request_id: "r1".into(),
            account_id: "default".into(),
            to: "123@c.us".into(),
            text: "hi".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "send_text");
        assert_eq!(json["to"], "123@c.us");
    }

    #[test]
    fn inbound_message_defaults_optional_fields() {
        let msg: SidecarMessage = serde_json::from_str(
            r#"{"type":"inbound_message","account_id":"default","message_id":"m1",
                "chat_jid":"123@c.us","sender_jid":"123@c.us","body":"!chatgpt hi"}"#,
        )
        .unwrap();
        match msg {
            SidecarMessage::InboundMessage {
                is_group,
                from_me,
                timestamp,
                group_name,
                ..
            } => {
                assert!(!is_group);
                assert!(!from_me);
                assert!(timestamp.is_none());
                assert!(group_name.is_none());
            },
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_frame_type_is_tolerated() {
        let msg: SidecarMessage =
            serde_json::from_str(r#"{"type":"presence_update","account_id":"x"}"#).unwrap();
        assert_eq!(msg, SidecarMessage::Unknown);
        assert_eq!(msg.account_id(), None);
    }
}
