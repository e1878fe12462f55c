//! Incoming updates.
//!
//! An [`Update`] carries a strictly increasing `update_id` and exactly one
//! payload. On the wire the payload is one optional field out of many; here it
//! is the [`UpdateKind`] sum type, with [`UpdateType`] as its fieldless tag.
//!
//! ```text
//! {"update_id": 100, "message": {...}}
//!        │                │
//!        ▼                ▼
//! Update { update_id: 100, kind: UpdateKind::Message(..) }   update_type() == UpdateType::Message
//! ```
//!
//! Payloads this crate does not model (inline queries, newer API additions)
//! decode to [`UpdateKind::Unknown`] instead of failing, so a single odd update
//! never poisons a whole `getUpdates` batch.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::chat::{Chat, ChatMemberUpdated, User};
use super::message::{CallbackQuery, Message, Poll, PollAnswer};
use super::payment::{PreCheckoutQuery, ShippingQuery};

// =============================================================================
// UpdateType
// =============================================================================

/// Discriminant of an [`UpdateKind`].
///
/// Serializes to the wire field name, which is also the value `allowed_updates` expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    CallbackQuery,
    ShippingQuery,
    PreCheckoutQuery,
    Poll,
    PollAnswer,
    MyChatMember,
    ChatMember,
    /// Anything not listed above.
    Unknown,
}

impl UpdateType {
    /// Every modelled type, in the order payload fields are probed.
    pub const KNOWN: [UpdateType; 11] = [
        Self::Message,
        Self::EditedMessage,
        Self::ChannelPost,
        Self::EditedChannelPost,
        Self::CallbackQuery,
        Self::ShippingQuery,
        Self::PreCheckoutQuery,
        Self::Poll,
        Self::PollAnswer,
        Self::MyChatMember,
        Self::ChatMember,
    ];

    /// The wire field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::CallbackQuery => "callback_query",
            Self::ShippingQuery => "shipping_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
            Self::Poll => "poll",
            Self::PollAnswer => "poll_answer",
            Self::MyChatMember => "my_chat_member",
            Self::ChatMember => "chat_member",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised update type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownUpdateType(pub String);

impl fmt::Display for UnknownUpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown update type '{}'", self.0)
    }
}

impl std::error::Error for UnknownUpdateType {}

impl FromStr for UpdateType {
    type Err = UnknownUpdateType;

    /// Parses a wire field name such as `callback_query`.
    ///
    /// `unknown` is not accepted: it names the absence of a type, not a selector.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::KNOWN
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| UnknownUpdateType(s.to_string()))
    }
}

// =============================================================================
// UpdateKind
// =============================================================================

/// The single payload of an [`Update`].
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    CallbackQuery(CallbackQuery),
    ShippingQuery(ShippingQuery),
    PreCheckoutQuery(PreCheckoutQuery),
    Poll(Poll),
    PollAnswer(PollAnswer),
    MyChatMember(ChatMemberUpdated),
    ChatMember(ChatMemberUpdated),
    /// Raw fields (minus `update_id`) of an update with no modelled payload.
    Unknown(Value),
}

impl UpdateKind {
    /// The tag of this payload.
    pub fn update_type(&self) -> UpdateType {
        match self {
            Self::Message(_) => UpdateType::Message,
            Self::EditedMessage(_) => UpdateType::EditedMessage,
            Self::ChannelPost(_) => UpdateType::ChannelPost,
            Self::EditedChannelPost(_) => UpdateType::EditedChannelPost,
            Self::CallbackQuery(_) => UpdateType::CallbackQuery,
            Self::ShippingQuery(_) => UpdateType::ShippingQuery,
            Self::PreCheckoutQuery(_) => UpdateType::PreCheckoutQuery,
            Self::Poll(_) => UpdateType::Poll,
            Self::PollAnswer(_) => UpdateType::PollAnswer,
            Self::MyChatMember(_) => UpdateType::MyChatMember,
            Self::ChatMember(_) => UpdateType::ChatMember,
            Self::Unknown(_) => UpdateType::Unknown,
        }
    }

    /// Picks the payload out of the remaining update fields.
    ///
    /// Fields are probed in [`UpdateType::KNOWN`] order and the first present
    /// one wins. A modelled field whose payload does not decode is kept raw.
    fn from_fields(mut fields: Map<String, Value>) -> Self {
        for ty in UpdateType::KNOWN {
            let Some(payload) = fields.remove(ty.as_str()) else {
                continue;
            };
            if payload.is_null() {
                continue;
            }
            match Self::decode(ty, &payload) {
                Ok(kind) => return kind,
                Err(e) => {
                    debug!(update_type = %ty, error = %e, "Undecodable payload kept as unknown");
                    fields.insert(ty.as_str().to_string(), payload);
                    return Self::Unknown(Value::Object(fields));
                }
            }
        }
        Self::Unknown(Value::Object(fields))
    }

    fn decode(ty: UpdateType, payload: &Value) -> Result<Self, serde_json::Error> {
        fn get<T: DeserializeOwned>(payload: &Value) -> Result<T, serde_json::Error> {
            T::deserialize(payload)
        }

        Ok(match ty {
            UpdateType::Message => Self::Message(get(payload)?),
            UpdateType::EditedMessage => Self::EditedMessage(get(payload)?),
            UpdateType::ChannelPost => Self::ChannelPost(get(payload)?),
            UpdateType::EditedChannelPost => Self::EditedChannelPost(get(payload)?),
            UpdateType::CallbackQuery => Self::CallbackQuery(get(payload)?),
            UpdateType::ShippingQuery => Self::ShippingQuery(get(payload)?),
            UpdateType::PreCheckoutQuery => Self::PreCheckoutQuery(get(payload)?),
            UpdateType::Poll => Self::Poll(get(payload)?),
            UpdateType::PollAnswer => Self::PollAnswer(get(payload)?),
            UpdateType::MyChatMember => Self::MyChatMember(get(payload)?),
            UpdateType::ChatMember => Self::ChatMember(get(payload)?),
            UpdateType::Unknown => Self::Unknown(payload.clone()),
        })
    }

    fn payload_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Message(m)
            | Self::EditedMessage(m)
            | Self::ChannelPost(m)
            | Self::EditedChannelPost(m) => serde_json::to_value(m),
            Self::CallbackQuery(q) => serde_json::to_value(q),
            Self::ShippingQuery(q) => serde_json::to_value(q),
            Self::PreCheckoutQuery(q) => serde_json::to_value(q),
            Self::Poll(p) => serde_json::to_value(p),
            Self::PollAnswer(a) => serde_json::to_value(a),
            Self::MyChatMember(c) | Self::ChatMember(c) => serde_json::to_value(c),
            Self::Unknown(v) => Ok(v.clone()),
        }
    }
}

// =============================================================================
// Update
// =============================================================================

/// One event delivered by `getUpdates`.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Strictly increasing, possibly with gaps.
    pub update_id: i64,
    pub kind: UpdateKind,
}

impl Update {
    pub fn new(update_id: i64, kind: UpdateKind) -> Self {
        Self { update_id, kind }
    }

    /// The tag of this update's payload.
    pub fn update_type(&self) -> UpdateType {
        self.kind.update_type()
    }

    /// Whether the payload is of type `ty`.
    pub fn is(&self, ty: UpdateType) -> bool {
        self.update_type() == ty
    }

    /// The payload of a `message` update.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m) => Some(m),
            _ => None,
        }
    }

    /// The payload of a `callback_query` update.
    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match &self.kind {
            UpdateKind::CallbackQuery(q) => Some(q),
            _ => None,
        }
    }

    /// The message this update is about: new or edited, post or callback origin.
    pub fn effective_message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => Some(m),
            UpdateKind::CallbackQuery(q) => q.message.as_deref(),
            _ => None,
        }
    }

    /// The user who caused this update, when there is one.
    pub fn effective_user(&self) -> Option<&User> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => m.from.as_ref(),
            UpdateKind::CallbackQuery(q) => Some(&q.from),
            UpdateKind::ShippingQuery(q) => Some(&q.from),
            UpdateKind::PreCheckoutQuery(q) => Some(&q.from),
            UpdateKind::PollAnswer(a) => Some(&a.user),
            UpdateKind::MyChatMember(c) | UpdateKind::ChatMember(c) => Some(&c.from),
            UpdateKind::Poll(_) | UpdateKind::Unknown(_) => None,
        }
    }

    /// The chat this update happened in, when there is one.
    pub fn effective_chat(&self) -> Option<&Chat> {
        match &self.kind {
            UpdateKind::MyChatMember(c) | UpdateKind::ChatMember(c) => Some(&c.chat),
            _ => self.effective_message().map(|m| m.chat.as_ref()),
        }
    }
}

impl<'de> Deserialize<'de> for Update {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let update_id = fields
            .remove("update_id")
            .ok_or_else(|| de::Error::missing_field("update_id"))?
            .as_i64()
            .ok_or_else(|| de::Error::custom("update_id is not an integer"))?;

        Ok(Self {
            update_id,
            kind: UpdateKind::from_fields(fields),
        })
    }
}

impl Serialize for Update {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("update_id", &self.update_id)?;
        match &self.kind {
            UpdateKind::Unknown(Value::Object(fields)) => {
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
            }
            UpdateKind::Unknown(_) => {}
            kind => {
                let payload = kind.payload_value().map_err(serde::ser::Error::custom)?;
                map.serialize_entry(kind.update_type().as_str(), &payload)?;
            }
        }
        map.end()
    }
}

// =============================================================================
// WebhookInfo
// =============================================================================

/// Current webhook status, as returned by `getWebhookInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookInfo {
    /// Empty when no webhook is set.
    pub url: String,
    pub has_custom_certificate: bool,
    pub pending_update_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> Value {
        json!({"id": 7, "is_bot": false, "first_name": "Ada"})
    }

    fn message(id: i64, text: &str) -> Value {
        json!({
            "message_id": id,
            "from": user(),
            "date": 1700000000,
            "chat": {"id": 7, "type": "private"},
            "text": text
        })
    }

    #[test]
    fn message_update_decodes_to_message_kind() {
        let update: Update =
            serde_json::from_value(json!({"update_id": 100, "message": message(1, "hi")})).unwrap();

        assert_eq!(update.update_id, 100);
        assert_eq!(update.update_type(), UpdateType::Message);
        assert_eq!(update.message().unwrap().text.as_deref(), Some("hi"));
        assert_eq!(update.effective_user().unwrap().id, 7);
        assert_eq!(update.effective_chat().unwrap().id, 7);
    }

    #[test]
    fn callback_query_update_exposes_origin_message() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 5,
            "callback_query": {
                "id": "q1",
                "from": user(),
                "message": message(9, "menu"),
                "chat_instance": "ci",
                "data": "/back"
            }
        }))
        .unwrap();

        assert!(update.is(UpdateType::CallbackQuery));
        assert!(update.message().is_none());
        assert_eq!(update.effective_message().unwrap().message_id, 9);
        assert_eq!(update.callback_query().unwrap().data.as_deref(), Some("/back"));
    }

    #[test]
    fn unmodelled_payload_becomes_unknown() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 3,
            "inline_query": {"id": "iq", "query": "rust"}
        }))
        .unwrap();

        assert_eq!(update.update_type(), UpdateType::Unknown);
        match &update.kind {
            UpdateKind::Unknown(raw) => assert_eq!(raw["inline_query"]["query"], "rust"),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn undecodable_known_payload_is_kept_raw() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 4,
            "message": {"message_id": "not a number"}
        }))
        .unwrap();

        assert_eq!(update.update_id, 4);
        assert_eq!(update.update_type(), UpdateType::Unknown);
    }

    #[test]
    fn missing_update_id_is_an_error() {
        let result: Result<Update, _> = serde_json::from_value(json!({"message": message(1, "x")}));
        assert!(result.is_err());
    }

    #[test]
    fn batch_with_an_unknown_update_still_decodes() {
        let batch: Vec<Update> = serde_json::from_value(json!([
            {"update_id": 1, "message": message(1, "a")},
            {"update_id": 2, "chat_join_request": {}},
            {"update_id": 3, "edited_message": message(1, "b")}
        ]))
        .unwrap();

        let types: Vec<_> = batch.iter().map(Update::update_type).collect();
        assert_eq!(
            types,
            vec![UpdateType::Message, UpdateType::Unknown, UpdateType::EditedMessage]
        );
    }

    #[test]
    fn update_serializes_back_to_wire_shape() {
        let raw = json!({"update_id": 100, "message": message(1, "hi")});
        let update: Update = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&update).unwrap(), raw);
    }

    #[test]
    fn update_type_names_parse() {
        assert_eq!("poll_answer".parse::<UpdateType>(), Ok(UpdateType::PollAnswer));
        assert!("unknown".parse::<UpdateType>().is_err());
        assert!("Message".parse::<UpdateType>().is_err());
        assert_eq!(
            serde_json::to_value(UpdateType::EditedChannelPost).unwrap(),
            json!("edited_channel_post")
        );
    }
}
