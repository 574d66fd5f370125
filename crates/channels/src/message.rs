use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// One chat message delivered by the messaging network.
///
/// Created by the session when the network delivers it and consumed once by
/// the dispatcher; nothing keeps it after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Chat or contact the reply goes back to.
    pub sender_id: String,
    pub body: String,
    pub is_group_chat: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// A direct (non-group) message received now.
    pub fn direct(sender_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            body: body.into(),
            is_group_chat: false,
            group_name: None,
            received_at: Utc::now(),
        }
    }

    /// Mark the message as coming from a group chat.
    pub fn in_group(mut self, group_name: Option<String>) -> Self {
        self.is_group_chat = true;
        self.group_name = group_name;
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_message_has_no_group() {
        let msg = InboundMessage::direct("123@c.us", "hello");
        assert!(!msg.is_group_chat);
        assert!(msg.group_name.is_none());
    }

    #[test]
    fn group_name_is_omitted_from_json_for_direct_messages() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let msg = InboundMessage::direct("123@c.us", "hi").with_received_at(ts);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("group_name").is_none());
        assert_eq!(json["received_at"], "2023-11-14T22:13:20Z");

        let group = msg.in_group(Some("family".into()));
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["group_name"], "family");
        assert_eq!(json["is_group_chat"], true);
    }
}
