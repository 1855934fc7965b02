use serde::{Deserialize, Serialize};

/// Which side of a thread wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    User,
    Correspondent,
}

impl MessageSender {
    pub fn from_sent_by_user(sent_by_user: bool) -> Self {
        if sent_by_user {
            MessageSender::User
        } else {
            MessageSender::Correspondent
        }
    }

    pub fn is_user(&self) -> bool {
        *self == MessageSender::User
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Gift,
    Contact,
}

impl AsRef<str> for MessageKind {
    fn as_ref(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Gift => "gift",
            MessageKind::Contact => "contact",
        }
    }
}

impl TryFrom<String> for MessageKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_ref() {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "gift" => Ok(MessageKind::Gift),
            "contact" => Ok(MessageKind::Contact),
            other => Err(format!("`{other}` is not a valid variant of MessageKind")),
        }
    }
}
