//! The typed Bot API client.
//!
//! [`Bot`] wraps a shared [`ApiCaller`] and exposes one async method per
//! remote method. Each wrapper is a straight pass-through: serialize the
//! parameter record, call, decode the result.
//!
//! ```rust,ignore
//! let bot = Bot::new(HttpApiCaller::new(HttpClientConfig::new(token))?);
//! let me = bot.login().await?;
//! bot.send_message(&SendMessageParams::new(chat_id, "<b>hi</b>")).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::model::{
    Chat, ChatId, ChatMember, File, Message, MessageId, Update, User, UserProfilePhotos,
    WebhookInfo,
};
use crate::params::{
    AnswerCallbackQueryParams, BanChatMemberParams, ChatAction, CopyMessageParams,
    DeleteMessageParams, DeleteWebhookParams, EditMessageCaptionParams, EditMessageMediaParams,
    EditMessageReplyMarkupParams, EditMessageTextParams, EditedMessage, ForwardMessageParams,
    GetFileParams, GetUpdatesParams, GetUserProfilePhotosParams, PromoteChatMemberParams,
    RestrictChatMemberParams, SendAnimationParams, SendAudioParams, SendChatActionParams,
    SendContactParams, SendDiceParams, SendDocumentParams, SendLocationParams,
    SendMediaGroupParams, SendMessageParams, SendPhotoParams, SendPollParams, SendVenueParams,
    SendVideoNoteParams, SendVideoParams, SendVoiceParams, SetWebhookParams,
    UnbanChatMemberParams,
};
use telebind_core::{ApiCaller, ApiResult, BoxedCaller, request};

// =============================================================================
// Bot
// =============================================================================

/// A cheaply cloneable handle to the Bot API.
///
/// Constructing a `Bot` performs no I/O and emits no log output; call
/// [`Bot::login`] to verify the token.
#[derive(Clone)]
pub struct Bot {
    caller: BoxedCaller,
}

impl Bot {
    /// Creates a client over `caller`.
    pub fn new(caller: impl ApiCaller + 'static) -> Self {
        Self {
            caller: Arc::new(caller),
        }
    }

    /// Creates a client over an already shared caller.
    pub fn from_caller(caller: BoxedCaller) -> Self {
        Self { caller }
    }

    /// The underlying caller, for methods without a typed wrapper.
    pub fn caller(&self) -> &BoxedCaller {
        &self.caller
    }

    /// Calls `getMe` and logs the bot's identity.
    pub async fn login(&self) -> ApiResult<User> {
        let me = self.get_me().await?;
        info!(
            username = me.username.as_deref().unwrap_or_default(),
            id = me.id,
            "Logged in as {}",
            me.display_name()
        );
        Ok(me)
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot").finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatIdParams<'a> {
    chat_id: &'a ChatId,
}

macro_rules! impl_api {
    // Parameterless method
    ($(#[$meta:meta])* $name:ident => $method:literal -> $ret:ty $(,)?) => {
        $(#[$meta])*
        pub async fn $name(&self) -> ApiResult<$ret> {
            request::<(), $ret>(&*self.caller, $method, None).await
        }
    };
    // Method taking a parameter record
    ($(#[$meta:meta])* $name:ident => $method:literal($params:ty) -> $ret:ty $(,)?) => {
        $(#[$meta])*
        pub async fn $name(&self, params: &$params) -> ApiResult<$ret> {
            request(&*self.caller, $method, Some(params)).await
        }
    };
}

// =============================================================================
// Updates and webhooks
// =============================================================================

impl Bot {
    impl_api!(
        /// Long-polls for new updates, oldest first.
        get_updates => "getUpdates"(GetUpdatesParams) -> Vec<Update>
    );

    impl_api!(
        /// Registers a webhook; `getUpdates` stops working while one is set.
        set_webhook => "setWebhook"(SetWebhookParams) -> bool
    );

    impl_api!(delete_webhook => "deleteWebhook"(DeleteWebhookParams) -> bool);

    impl_api!(get_webhook_info => "getWebhookInfo" -> WebhookInfo);
}

// =============================================================================
// Account
// =============================================================================

impl Bot {
    impl_api!(
        /// Returns the bot's own user.
        get_me => "getMe" -> User
    );

    impl_api!(
        /// Logs out from the cloud Bot API server.
        log_out => "logOut" -> bool
    );

    impl_api!(
        /// Closes the bot instance before moving it to another local server.
        close => "close" -> bool
    );
}

// =============================================================================
// Sending
// =============================================================================

impl Bot {
    impl_api!(send_message => "sendMessage"(SendMessageParams) -> Message);

    impl_api!(forward_message => "forwardMessage"(ForwardMessageParams) -> Message);

    impl_api!(
        /// Copies a message without a link to the original.
        copy_message => "copyMessage"(CopyMessageParams) -> MessageId
    );

    impl_api!(send_photo => "sendPhoto"(SendPhotoParams) -> Message);

    impl_api!(send_audio => "sendAudio"(SendAudioParams) -> Message);

    impl_api!(send_document => "sendDocument"(SendDocumentParams) -> Message);

    impl_api!(send_video => "sendVideo"(SendVideoParams) -> Message);

    impl_api!(send_animation => "sendAnimation"(SendAnimationParams) -> Message);

    impl_api!(send_voice => "sendVoice"(SendVoiceParams) -> Message);

    impl_api!(send_video_note => "sendVideoNote"(SendVideoNoteParams) -> Message);

    impl_api!(
        /// Sends an album; returns the sent messages in order.
        send_media_group => "sendMediaGroup"(SendMediaGroupParams) -> Vec<Message>
    );

    impl_api!(send_location => "sendLocation"(SendLocationParams) -> Message);

    impl_api!(send_venue => "sendVenue"(SendVenueParams) -> Message);

    impl_api!(send_contact => "sendContact"(SendContactParams) -> Message);

    impl_api!(send_poll => "sendPoll"(SendPollParams) -> Message);

    impl_api!(send_dice => "sendDice"(SendDiceParams) -> Message);

    /// Shows `action` in the chat header for up to five seconds.
    pub async fn send_chat_action(
        &self,
        chat_id: impl Into<ChatId>,
        action: ChatAction,
    ) -> ApiResult<bool> {
        let params = SendChatActionParams {
            chat_id: chat_id.into(),
            action,
        };
        request(&*self.caller, "sendChatAction", Some(&params)).await
    }
}

// =============================================================================
// Files and profiles
// =============================================================================

impl Bot {
    impl_api!(
        get_user_profile_photos => "getUserProfilePhotos"(GetUserProfilePhotosParams) -> UserProfilePhotos
    );

    /// Resolves a `file_id` to a downloadable [`File`].
    pub async fn get_file(&self, file_id: impl Into<String>) -> ApiResult<File> {
        let params = GetFileParams {
            file_id: file_id.into(),
        };
        request(&*self.caller, "getFile", Some(&params)).await
    }
}

// =============================================================================
// Chats and members
// =============================================================================

impl Bot {
    impl_api!(ban_chat_member => "banChatMember"(BanChatMemberParams) -> bool);

    impl_api!(unban_chat_member => "unbanChatMember"(UnbanChatMemberParams) -> bool);

    impl_api!(restrict_chat_member => "restrictChatMember"(RestrictChatMemberParams) -> bool);

    impl_api!(promote_chat_member => "promoteChatMember"(PromoteChatMemberParams) -> bool);

    pub async fn get_chat(&self, chat_id: impl Into<ChatId>) -> ApiResult<Chat> {
        self.chat_scoped("getChat", chat_id.into()).await
    }

    /// Administrators of a group, excluding other bots.
    pub async fn get_chat_administrators(
        &self,
        chat_id: impl Into<ChatId>,
    ) -> ApiResult<Vec<ChatMember>> {
        self.chat_scoped("getChatAdministrators", chat_id.into())
            .await
    }

    pub async fn get_chat_member_count(&self, chat_id: impl Into<ChatId>) -> ApiResult<i64> {
        self.chat_scoped("getChatMemberCount", chat_id.into()).await
    }

    async fn chat_scoped<R>(&self, method: &str, chat_id: ChatId) -> ApiResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let params = ChatIdParams { chat_id: &chat_id };
        request(&*self.caller, method, Some(&params)).await
    }
}

// =============================================================================
// Callback queries and editing
// =============================================================================

impl Bot {
    impl_api!(
        answer_callback_query => "answerCallbackQuery"(AnswerCallbackQueryParams) -> bool
    );

    impl_api!(edit_message_text => "editMessageText"(EditMessageTextParams) -> EditedMessage);

    impl_api!(
        edit_message_caption => "editMessageCaption"(EditMessageCaptionParams) -> EditedMessage
    );

    impl_api!(
        edit_message_media => "editMessageMedia"(EditMessageMediaParams) -> EditedMessage
    );

    impl_api!(
        edit_message_reply_markup => "editMessageReplyMarkup"(EditMessageReplyMarkupParams) -> EditedMessage
    );

    impl_api!(
        /// Deletes a message; bots can only delete messages less than 48 hours old.
        delete_message => "deleteMessage"(DeleteMessageParams) -> bool
    );
}
