//! Telegram bot handlers.

use crate::callback::CallbackAction;
use crate::db::{Database, DbError};
use crate::notifier::AlertSender;
use crate::wizard::{self, Stage, StagedWatch, ThresholdOutcome, TypeOutcome, WizardSessions};
use async_trait::async_trait;
use pricewatch_core::{format_price, ComparisonType, Slot, Watch};
use pricewatch_feeds::PriceSource;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::{ApiError, RequestError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] RequestError),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and show your alerts")]
    Start,
    #[command(description = "Show your alert slots")]
    Notif,
    #[command(description = "Show help")]
    Help,
}

const WELCOME_TEXT: &str = "👋 <b>Welcome!</b>\n\
    This bot notifies you when the token reaches a price you set.\n\
    You have three alert slots. Each alert fires once and then switches off.\n\n\
    ❗️ The bot is in testing, errors are possible.";

const SETTINGS_TEXT: &str = "Notification settings:";
const PRICE_PROMPT: &str = "Enter the price for the alert:";
const INVALID_NUMBER_TEXT: &str = "Invalid value. Please enter a number.";

/// Reply to text typed into a wizard.
#[derive(Debug, Clone, PartialEq)]
enum TextReply {
    Text(String),
    Staged(StagedWatch),
}

/// Id of the user who sent a message. Replies still go to the message's chat.
fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|user| user.id.0 as i64)
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    db: Database,
    sessions: WizardSessions,
    price_source: Arc<dyn PriceSource>,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str, db: Database, price_source: Arc<dyn PriceSource>) -> Self {
        let bot = Bot::new(token);
        Self {
            bot,
            db,
            sessions: WizardSessions::new(),
            price_source,
        }
    }

    /// Run the bot update handler until Ctrl-C.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();

        let commands = {
            let this = Arc::clone(&self);
            Update::filter_message().filter_command::<Command>().endpoint(
                move |bot: Bot, msg: Message, cmd: Command| {
                    let this = Arc::clone(&this);
                    async move { this.handle_command(bot, msg, cmd).await }
                },
            )
        };

        let text = {
            let this = Arc::clone(&self);
            Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
                let this = Arc::clone(&this);
                async move { this.handle_text(bot, msg).await }
            })
        };

        let callbacks = {
            let this = Arc::clone(&self);
            Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
                let this = Arc::clone(&this);
                async move { this.handle_callback(bot, q).await }
            })
        };

        let handler = dptree::entry()
            .branch(commands)
            .branch(text)
            .branch(callbacks);

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn settings_keyboard(&self, user_id: i64) -> Result<InlineKeyboardMarkup, TelegramError> {
        self.db.ensure_user(user_id).await?;
        let watches = self.db.list_watches(user_id).await?;
        Ok(notifications_keyboard(&watches))
    }

    async fn handle_command(
        &self,
        bot: Bot,
        msg: Message,
        cmd: Command,
    ) -> Result<(), TelegramError> {
        let Some(user_id) = sender_id(&msg) else {
            debug!(chat_id = msg.chat.id.0, "Ignoring command without sender");
            return Ok(());
        };

        match cmd {
            Command::Start => {
                info!(user_id, "User started the bot");
                let keyboard = self.settings_keyboard(user_id).await?;
                bot.send_message(msg.chat.id, WELCOME_TEXT)
                    .parse_mode(ParseMode::Html)
                    .await?;
                bot.send_message(msg.chat.id, SETTINGS_TEXT)
                    .reply_markup(keyboard)
                    .await?;
            }

            Command::Notif => {
                let keyboard = self.settings_keyboard(user_id).await?;
                bot.send_message(msg.chat.id, SETTINGS_TEXT)
                    .reply_markup(keyboard)
                    .await?;
            }

            Command::Help => {
                bot.send_message(msg.chat.id, Command::descriptions().to_string())
                    .await?;
            }
        }

        Ok(())
    }

    /// Free text only matters while a wizard is in flight.
    async fn handle_text(&self, bot: Bot, msg: Message) -> Result<(), TelegramError> {
        let Some(text) = msg.text() else {
            return Ok(());
        };
        let Some(user_id) = sender_id(&msg) else {
            return Ok(());
        };

        match self.process_text(user_id, text).await {
            Some(TextReply::Staged(staged)) => {
                bot.send_message(
                    msg.chat.id,
                    format!(
                        "Type: {} and threshold: {}.\nPress «Save» to confirm.",
                        staged.kind.label(),
                        staged.threshold
                    ),
                )
                .reply_markup(save_keyboard(staged.slot))
                .await?;
            }
            Some(TextReply::Text(reply)) => {
                bot.send_message(msg.chat.id, reply).await?;
            }
            None => {}
        }

        Ok(())
    }

    /// Advance the sender's wizard with typed text.
    async fn process_text(&self, user_id: i64, text: &str) -> Option<TextReply> {
        let Some(setup) = self.sessions.pending(user_id) else {
            debug!(user_id, "Ignoring text outside of a wizard");
            return None;
        };

        let reply = match setup.stage {
            Stage::AwaitingType => match self.sessions.submit_type_text(user_id, text) {
                TypeOutcome::Accepted { slot, kind } => {
                    debug!(user_id, slot = %slot, kind = %kind, "Type chosen");
                    PRICE_PROMPT.to_string()
                }
                TypeOutcome::Invalid => "Unknown type. Enter: above, below or equal.".to_string(),
                TypeOutcome::NotAwaiting => return None,
            },

            Stage::AwaitingThreshold => {
                if wizard::parse_threshold(text).is_none() {
                    return Some(TextReply::Text(INVALID_NUMBER_TEXT.to_string()));
                }

                let current_price = self.price_source.fetch_price().await.ok();
                match self.sessions.submit_threshold(user_id, text, current_price) {
                    ThresholdOutcome::Staged(staged) => {
                        info!(
                            user_id,
                            slot = %staged.slot,
                            kind = %staged.kind,
                            threshold = staged.threshold,
                            "Draft staged"
                        );
                        return Some(TextReply::Staged(staged));
                    }
                    ThresholdOutcome::InvalidNumber => INVALID_NUMBER_TEXT.to_string(),
                    ThresholdOutcome::TooFarFromPrice { current_price } => format!(
                        "❗️ The value is too far from the current price: {}. Please enter a value closer to the current price.",
                        format_price(current_price)
                    ),
                    ThresholdOutcome::AlreadySatisfied { current_price } => format!(
                        "❗️ The current price already matches: {}. Settings not saved.",
                        format_price(current_price)
                    ),
                    ThresholdOutcome::NotAwaiting => return None,
                }
            }
        };

        Some(TextReply::Text(reply))
    }

    /// Disable a slot and drop any wizard state for it.
    async fn delete_slot(&self, user_id: i64, slot: Slot) -> Result<bool, DbError> {
        self.db.ensure_user(user_id).await?;
        let was_armed = self.db.clear_watch(user_id, slot).await?;
        self.sessions.cancel_slot(user_id, slot);
        info!(user_id, slot = %slot, was_armed, "Slot deleted");
        Ok(was_armed)
    }

    /// Persist the staged draft of a slot, if one is complete.
    async fn save_slot(&self, user_id: i64, slot: Slot) -> Result<Option<StagedWatch>, DbError> {
        let Some(staged) = self.sessions.take_draft(user_id, slot) else {
            return Ok(None);
        };

        self.db
            .set_watch(user_id, staged.slot, staged.kind, staged.threshold)
            .await?;
        info!(
            user_id,
            slot = %staged.slot,
            kind = %staged.kind,
            threshold = staged.threshold,
            "Watch saved"
        );
        Ok(Some(staged))
    }

    async fn handle_callback(&self, bot: Bot, q: CallbackQuery) -> Result<(), TelegramError> {
        let user_id = q.from.id.0 as i64;

        let action = match q.data.as_deref().map(str::parse::<CallbackAction>) {
            Some(Ok(action)) => action,
            Some(Err(e)) => {
                warn!(user_id, error = %e, "Ignoring callback");
                bot.answer_callback_query(q.id.clone()).await?;
                return Ok(());
            }
            None => {
                bot.answer_callback_query(q.id.clone()).await?;
                return Ok(());
            }
        };
        debug!(user_id, action = %action, "Callback received");

        match action {
            CallbackAction::ConfigSlot(slot) => {
                self.sessions.open_slot(user_id, slot);
                let text = format!("<b>Slot {} settings:</b>\nChoose the alert type below:", slot);
                self.show(&bot, &q, user_id, text, slot_config_keyboard(slot))
                    .await?;
                bot.answer_callback_query(q.id.clone()).await?;
            }

            CallbackAction::SetType(slot, kind) => {
                self.sessions.choose_type(user_id, slot, kind);
                bot.answer_callback_query(q.id.clone())
                    .text(format!("Type selected: {}", kind.label()))
                    .await?;
                let chat_id = q
                    .regular_message()
                    .map(|message| message.chat.id)
                    .unwrap_or(ChatId(user_id));
                bot.send_message(chat_id, PRICE_PROMPT).await?;
            }

            CallbackAction::Delete(slot) => {
                self.delete_slot(user_id, slot).await?;

                bot.answer_callback_query(q.id.clone())
                    .text("Slot deleted")
                    .await?;
                let keyboard = self.settings_keyboard(user_id).await?;
                self.show(&bot, &q, user_id, SETTINGS_TEXT.to_string(), keyboard)
                    .await?;
            }

            CallbackAction::Save(slot) => {
                if self.save_slot(user_id, slot).await?.is_none() {
                    bot.answer_callback_query(q.id.clone())
                        .text("Nothing to save")
                        .await?;
                    return Ok(());
                }

                bot.answer_callback_query(q.id.clone())
                    .text("Settings saved")
                    .await?;
                let keyboard = self.settings_keyboard(user_id).await?;
                self.show(&bot, &q, user_id, SETTINGS_TEXT.to_string(), keyboard)
                    .await?;
            }
        }

        Ok(())
    }

    /// Replace the message the button belongs to, or send a new one.
    async fn show(
        &self,
        bot: &Bot,
        q: &CallbackQuery,
        user_id: i64,
        text: String,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<(), TelegramError> {
        let result = match q.regular_message() {
            Some(message) => bot
                .edit_message_text(message.chat.id, message.id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await
                .map(|_| ()),
            None => bot
                .send_message(ChatId(user_id), text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await
                .map(|_| ()),
        };

        match result {
            Ok(()) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AlertSender for TelegramBot {
    async fn send_alert(&self, user_id: i64, message: &str) -> Result<(), TelegramError> {
        self.bot
            .send_message(ChatId(user_id), message)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

/// One button per slot with its current watch.
pub fn notifications_keyboard(watches: &[Watch]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = watches
        .iter()
        .map(|watch| {
            vec![InlineKeyboardButton::callback(
                watch.summary_label(),
                CallbackAction::ConfigSlot(watch.slot).to_string(),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Type buttons for a slot, then Delete.
pub fn slot_config_keyboard(slot: Slot) -> InlineKeyboardMarkup {
    let types: Vec<InlineKeyboardButton> = ComparisonType::SELECTABLE
        .iter()
        .map(|kind| {
            InlineKeyboardButton::callback(
                kind.label(),
                CallbackAction::SetType(slot, *kind).to_string(),
            )
        })
        .collect();

    InlineKeyboardMarkup::new(vec![
        types,
        vec![InlineKeyboardButton::callback(
            "Delete",
            CallbackAction::Delete(slot).to_string(),
        )],
    ])
}

/// Confirmation button for a staged draft.
pub fn save_keyboard(slot: Slot) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Save",
        CallbackAction::Save(slot).to_string(),
    )]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pricewatch_feeds::FeedError;
    use teloxide::types::InlineKeyboardButtonKind;

    struct FixedPrice(Option<f64>);

    #[async_trait]
    impl PriceSource for FixedPrice {
        async fn fetch_price(&self) -> Result<f64, FeedError> {
            self.0.ok_or(FeedError::Timeout("offline".to_string()))
        }
    }

    fn slot(n: i64) -> Slot {
        Slot::new(n).unwrap()
    }

    async fn test_bot(price: Option<f64>) -> TelegramBot {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        TelegramBot::new("123456:TEST", db, Arc::new(FixedPrice(price)))
    }

    fn group_message(user_id: i64, text: &str) -> Message {
        serde_json::from_value(serde_json::json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": {"id": -100, "type": "group", "title": "Watchers"},
            "from": {"id": user_id, "is_bot": false, "first_name": "Sam"},
            "text": text
        }))
        .unwrap()
    }

    fn channel_post(text: &str) -> Message {
        serde_json::from_value(serde_json::json!({
            "message_id": 11,
            "date": 1_700_000_000,
            "chat": {"id": -1001, "type": "channel", "title": "News"},
            "text": text
        }))
        .unwrap()
    }

    #[test]
    fn test_sender_id_uses_user_not_chat() {
        let msg = group_message(42, "above");
        assert_eq!(msg.chat.id.0, -100);
        assert_eq!(sender_id(&msg), Some(42));
        assert_eq!(sender_id(&channel_post("above")), None);
    }

    #[tokio::test]
    async fn test_group_message_advances_sender_wizard() {
        let bot = test_bot(Some(10.0)).await;
        bot.sessions.open_slot(42, slot(1));

        let msg = group_message(42, "above");
        let user_id = sender_id(&msg).unwrap();
        let reply = bot.process_text(user_id, msg.text().unwrap()).await;

        assert_eq!(reply, Some(TextReply::Text(PRICE_PROMPT.to_string())));
        assert_eq!(
            bot.sessions.pending(42).map(|p| p.stage),
            Some(Stage::AwaitingThreshold)
        );
        assert_eq!(bot.sessions.pending(-100), None);
    }

    #[tokio::test]
    async fn test_text_outside_wizard_is_ignored() {
        let bot = test_bot(Some(10.0)).await;
        assert_eq!(bot.process_text(42, "above").await, None);
    }

    #[tokio::test]
    async fn test_invalid_threshold_reprompts() {
        let bot = test_bot(Some(10.0)).await;
        bot.sessions.open_slot(42, slot(1));
        bot.sessions.choose_type(42, slot(1), ComparisonType::Above);

        let reply = bot.process_text(42, "ten").await;
        assert_eq!(reply, Some(TextReply::Text(INVALID_NUMBER_TEXT.to_string())));
        assert_eq!(
            bot.sessions.pending(42).map(|p| p.stage),
            Some(Stage::AwaitingThreshold)
        );
    }

    #[tokio::test]
    async fn test_stage_then_save_persists_watch() {
        let bot = test_bot(Some(10.0)).await;
        bot.sessions.open_slot(7, slot(2));
        bot.sessions.choose_type(7, slot(2), ComparisonType::Above);

        let staged = StagedWatch {
            slot: slot(2),
            kind: ComparisonType::Above,
            threshold: 12.0,
        };
        assert_eq!(
            bot.process_text(7, "12").await,
            Some(TextReply::Staged(staged))
        );
        // Staged only, not persisted yet
        assert!(bot.db.armed_watches().await.unwrap().is_empty());

        assert_eq!(bot.save_slot(7, slot(2)).await.unwrap(), Some(staged));
        let watch = bot.db.get_watch(7, slot(2)).await.unwrap().unwrap();
        assert_eq!(watch.kind, ComparisonType::Above);
        assert_eq!(watch.threshold, 12.0);

        // The draft was consumed
        assert_eq!(bot.save_slot(7, slot(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_already_satisfied_threshold_is_not_saved() {
        let bot = test_bot(Some(100.0)).await;
        bot.sessions.open_slot(7, slot(1));
        bot.sessions.choose_type(7, slot(1), ComparisonType::Equal);

        let reply = bot.process_text(7, "100").await;
        assert!(matches!(reply, Some(TextReply::Text(_))));
        assert_eq!(bot.save_slot(7, slot(1)).await.unwrap(), None);
        assert!(bot.db.armed_watches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_clears_row_and_wizard() {
        let bot = test_bot(Some(10.0)).await;
        bot.db
            .set_watch(5, slot(3), ComparisonType::Below, 8.0)
            .await
            .unwrap();
        bot.sessions.open_slot(5, slot(3));
        bot.sessions.choose_type(5, slot(3), ComparisonType::Above);

        assert!(bot.delete_slot(5, slot(3)).await.unwrap());
        assert_eq!(
            bot.db.get_watch(5, slot(3)).await.unwrap(),
            Some(Watch::empty(5, slot(3)))
        );
        assert_eq!(bot.sessions.pending(5), None);
        assert_eq!(bot.save_slot(5, slot(3)).await.unwrap(), None);
        assert_eq!(bot.db.list_watches(5).await.unwrap().len(), 3);

        // Second delete is a no-op
        assert!(!bot.delete_slot(5, slot(3)).await.unwrap());
        assert_eq!(
            bot.db.get_watch(5, slot(3)).await.unwrap(),
            Some(Watch::empty(5, slot(3)))
        );
    }

    fn callback_data(button: &InlineKeyboardButton) -> &str {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => data,
            _ => panic!("not a callback button"),
        }
    }

    #[test]
    fn test_notifications_keyboard() {
        let mut watches: Vec<Watch> = Slot::ALL.iter().map(|s| Watch::empty(9, *s)).collect();
        watches[1].kind = ComparisonType::Above;
        watches[1].threshold = 2.5;

        let keyboard = notifications_keyboard(&watches);
        assert_eq!(keyboard.inline_keyboard.len(), 3);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Slot 1: None");
        assert_eq!(keyboard.inline_keyboard[1][0].text, "Slot 2: (Above) 2.5");
        assert_eq!(callback_data(&keyboard.inline_keyboard[2][0]), "config_slot:3");
    }

    #[test]
    fn test_slot_config_keyboard() {
        let keyboard = slot_config_keyboard(slot(2));
        assert_eq!(keyboard.inline_keyboard.len(), 2);

        let types: Vec<&str> = keyboard.inline_keyboard[0]
            .iter()
            .map(callback_data)
            .collect();
        assert_eq!(types, vec!["type:2:above", "type:2:below", "type:2:equal"]);
        assert_eq!(callback_data(&keyboard.inline_keyboard[1][0]), "delete:2");
    }

    #[test]
    fn test_save_keyboard() {
        let keyboard = save_keyboard(slot(1));
        assert_eq!(callback_data(&keyboard.inline_keyboard[0][0]), "save_config:1");
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/start", "pricewatch_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/notif", "pricewatch_bot").unwrap(), Command::Notif);
        assert!(Command::parse("/launch", "pricewatch_bot").is_err());
    }
}
