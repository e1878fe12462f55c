//! Wire types of the Bot API.
//!
//! Field names match the service's JSON keys; `type` fields are exposed as
//! `kind`. Optional fields are omitted when serializing.

mod chat;
mod markup;
mod media;
mod message;
mod payment;
mod update;

pub use chat::{
    BotCommand, Chat, ChatId, ChatInviteLink, ChatLocation, ChatMember, ChatMemberUpdated,
    ChatPermissions, ChatPhoto, User,
};
pub use markup::{
    CallbackGame, ForceReply, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton,
    KeyboardButtonPollType, LoginUrl, ReplyKeyboardMarkup, ReplyKeyboardRemove, ReplyMarkup,
    inline_row,
};
pub use media::{
    Animation, Audio, Document, File, InputMedia, InputMediaAnimation, InputMediaAudio,
    InputMediaDocument, InputMediaPhoto, InputMediaVideo, MaskPosition, PhotoSize, Sticker,
    UserProfilePhotos, Video, VideoNote, Voice,
};
pub use message::{
    CallbackQuery, Contact, Dice, Game, Location, Message, MessageEntity, MessageId, Poll,
    PollAnswer, PollOption, ProximityAlertTriggered, Venue,
};
pub use payment::{
    Invoice, LabeledPrice, OrderInfo, PreCheckoutQuery, ShippingAddress, ShippingOption,
    ShippingQuery, SuccessfulPayment,
};
pub use update::{UnknownUpdateType, Update, UpdateKind, UpdateType, WebhookInfo};
