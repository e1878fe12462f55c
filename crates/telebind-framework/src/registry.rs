//! The ordered list of `(filter, handler)` registrations.
//!
//! Registration happens during setup; once the registry is handed to an
//! [`UpdateDispatcher`](crate::UpdateDispatcher) it is shared behind an `Arc`
//! and never mutated again.
//!
//! ```rust,ignore
//! let mut registry = HandlerRegistry::new();
//! registry
//!     .on_message(handle_message)
//!     .on_callback_query(handle_callback)
//!     .add(log_everything);
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::filter::UpdateFilter;
use crate::handler::{BoxedHandler, Handler};
use telebind_api::{Update, UpdateType};

/// One registered handler.
#[derive(Clone)]
pub struct Registration {
    name: String,
    filter: UpdateFilter,
    handler: BoxedHandler,
}

impl Registration {
    /// Label used in logs and failure reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> UpdateFilter {
        self.filter
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Handlers in registration order.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    entries: Vec<Registration>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an unconditional handler.
    pub fn add(&mut self, handler: impl Handler) -> &mut Self {
        self.register(UpdateFilter::Any, None, Arc::new(handler))
    }

    /// Registers a handler for one update variant.
    ///
    /// # Panics
    ///
    /// If `ty` is [`UpdateType::Unknown`], which no handler can select.
    pub fn on(&mut self, ty: UpdateType, handler: impl Handler) -> &mut Self {
        self.register(UpdateFilter::Kind(ty), None, Arc::new(handler))
    }

    /// Registers a handler under an explicit name.
    ///
    /// # Panics
    ///
    /// If `filter` selects [`UpdateType::Unknown`].
    pub fn named(
        &mut self,
        name: impl Into<String>,
        filter: impl Into<UpdateFilter>,
        handler: impl Handler,
    ) -> &mut Self {
        self.register(filter.into(), Some(name.into()), Arc::new(handler))
    }

    /// Registers a handler selected by wire name, e.g. `"callback_query"`.
    ///
    /// # Panics
    ///
    /// If `type_name` is not a known update type. A bad selector is a
    /// programming error and must surface at startup, not as silently
    /// unmatched updates.
    pub fn on_type_name(&mut self, type_name: &str, handler: impl Handler) -> &mut Self {
        let ty: UpdateType = match type_name.parse() {
            Ok(ty) => ty,
            Err(e) => panic!("invalid handler selector: {e}"),
        };
        self.on(ty, handler)
    }

    pub fn on_message(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::Message, handler)
    }

    pub fn on_edited_message(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::EditedMessage, handler)
    }

    pub fn on_channel_post(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::ChannelPost, handler)
    }

    pub fn on_edited_channel_post(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::EditedChannelPost, handler)
    }

    pub fn on_callback_query(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::CallbackQuery, handler)
    }

    pub fn on_shipping_query(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::ShippingQuery, handler)
    }

    pub fn on_pre_checkout_query(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::PreCheckoutQuery, handler)
    }

    pub fn on_poll(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::Poll, handler)
    }

    pub fn on_poll_answer(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::PollAnswer, handler)
    }

    pub fn on_my_chat_member(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::MyChatMember, handler)
    }

    pub fn on_chat_member(&mut self, handler: impl Handler) -> &mut Self {
        self.on(UpdateType::ChatMember, handler)
    }

    fn register(
        &mut self,
        filter: UpdateFilter,
        name: Option<String>,
        handler: BoxedHandler,
    ) -> &mut Self {
        if filter == UpdateFilter::Kind(UpdateType::Unknown) {
            panic!("invalid handler selector: unknown updates only reach unconditional handlers");
        }
        let name = name.unwrap_or_else(|| format!("{filter}#{}", self.entries.len()));
        debug!(handler = %name, filter = %filter, "Registered handler");
        self.entries.push(Registration {
            name,
            filter,
            handler,
        });
        self
    }

    /// Registrations whose filter matches `update`, in registration order.
    pub fn matching<'a>(&'a self, update: &'a Update) -> impl Iterator<Item = &'a Registration> {
        self.entries.iter().filter(|r| r.filter.matches(update))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The update types to request from `getUpdates`.
    ///
    /// Every known type when an unconditional handler exists or nothing is
    /// registered, otherwise the distinct filtered types in registration
    /// order. The list is always explicit: an omitted `allowed_updates`
    /// makes the server reuse whatever the previous client asked for.
    pub fn allowed_updates(&self) -> Vec<UpdateType> {
        let mut types = Vec::new();
        for entry in &self.entries {
            match entry.filter.kind() {
                None => return UpdateType::KNOWN.to_vec(),
                Some(ty) if !types.contains(&ty) => types.push(ty),
                Some(_) => {}
            }
        }
        if types.is_empty() {
            return UpdateType::KNOWN.to_vec();
        }
        types
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use telebind_api::{Bot, UpdateKind};

    async fn noop(_bot: Bot, _update: Arc<Update>) {}

    fn callback_update() -> Update {
        serde_json::from_value(json!({
            "update_id": 10,
            "callback_query": {
                "id": "q",
                "from": {"id": 1, "is_bot": false, "first_name": "Ada"},
                "chat_instance": "c",
                "data": "/back"
            }
        }))
        .unwrap()
    }

    #[test]
    fn matching_preserves_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry
            .add(noop)
            .on_message(noop)
            .on_callback_query(noop)
            .named("late", UpdateFilter::Any, noop);

        let update = callback_update();
        let names: Vec<_> = registry.matching(&update).map(Registration::name).collect();

        assert_eq!(names, ["any#0", "callback_query#2", "late"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn type_name_selector_resolves_wire_names() {
        let mut registry = HandlerRegistry::new();
        registry.on_type_name("callback_query", noop);

        assert_eq!(
            registry.iter().next().unwrap().filter(),
            UpdateFilter::Kind(UpdateType::CallbackQuery)
        );
    }

    #[test]
    #[should_panic(expected = "invalid handler selector")]
    fn unknown_type_name_panics() {
        HandlerRegistry::new().on_type_name("callbackquery", noop);
    }

    #[test]
    #[should_panic(expected = "invalid handler selector")]
    fn unknown_is_not_a_selector() {
        HandlerRegistry::new().on_type_name("unknown", noop);
    }

    #[test]
    fn unknown_updates_only_reach_unconditional_handlers() {
        let mut registry = HandlerRegistry::new();
        registry.on_message(noop).add(noop);

        let update = Update::new(1, UpdateKind::Unknown(json!({"inline_query": {}})));
        let names: Vec<_> = registry.matching(&update).map(Registration::name).collect();
        assert_eq!(names, ["any#1"]);
    }

    #[test]
    fn allowed_updates_collects_filtered_types() {
        let mut registry = HandlerRegistry::new();
        assert_eq!(registry.allowed_updates(), UpdateType::KNOWN);

        registry
            .on_message(noop)
            .on_callback_query(noop)
            .on_message(noop);
        assert_eq!(
            registry.allowed_updates(),
            [UpdateType::Message, UpdateType::CallbackQuery]
        );
    }

    #[test]
    fn unconditional_handler_requests_every_known_type() {
        let mut registry = HandlerRegistry::new();
        registry.on_chat_member(noop).add(noop);

        let types = registry.allowed_updates();
        assert_eq!(types, UpdateType::KNOWN);
        assert!(types.contains(&UpdateType::ChatMember));
        assert!(!types.contains(&UpdateType::Unknown));
    }

    #[test]
    #[should_panic(expected = "invalid handler selector")]
    fn on_rejects_the_unknown_type() {
        HandlerRegistry::new().on(UpdateType::Unknown, noop);
    }

    #[test]
    #[should_panic(expected = "invalid handler selector")]
    fn named_rejects_the_unknown_type() {
        HandlerRegistry::new().named("dead", UpdateType::Unknown, noop);
    }
}
