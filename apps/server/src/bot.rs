//! Telegram bot handlers.

use crate::menu::{self, Callback, Screen};
use bankwatch_core::{
    escape_html, ChatProvider, NewAccount, NewChat, NewNotificationSetting, ValidationError,
    NEW_ACCOUNT_SCHEMA, NEW_NOTIFICATION_SCHEMA,
};
use bankwatch_engine::{AlertEvent, AlertHandle, EngineError, ReplyTracker, Scheduler};
use bankwatch_ledger::{Database, LedgerError};
use bankwatch_notify::{split_message, TELEGRAM_MAX_MESSAGE_CHARS};
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, UserId};
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum BotError {
    #[error("{0} not found.")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("This command is only available in the management chat.")]
    Unauthorized,
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),
}

impl From<LedgerError> for BotError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Validation(v) => BotError::Validation(v),
            other => BotError::Engine(EngineError::Ledger(other)),
        }
    }
}

impl BotError {
    /// Errors the user caused, answered in the chat instead of logged.
    fn is_user_facing(&self) -> bool {
        matches!(
            self,
            BotError::NotFound(_) | BotError::Validation(_) | BotError::Unauthorized
        )
    }

    fn reply_text(&self) -> String {
        match self {
            BotError::Validation(v) => format!(
                "{}\n\nExpected:\n<pre>{}</pre>",
                escape_html(&v.message),
                escape_html(v.schema)
            ),
            other => escape_html(&other.to_string()),
        }
    }
}

/// Bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Open the configuration menu (management chat only)")]
    Configure,
    #[command(description = "List notifications nobody replied to")]
    Unanswered,
    #[command(description = "Show balances of the accounts linked to this chat")]
    Balances,
    #[command(description = "Add an account. Usage: /addaccount {json}")]
    AddAccount(String),
    #[command(description = "Edit an account. Usage: /editaccount <account_id> {json}")]
    EditAccount(String),
    #[command(description = "Link an account to a chat. Usage: /link <chat_id> <account_id>")]
    Link(String),
    #[command(description = "Add a notification. Usage: /addnotification <account_chat_id> {json}")]
    AddNotification(String),
    #[command(description = "Show help")]
    Help,
}

impl Command {
    /// Commands restricted to the management chat.
    fn management_action(&self) -> Option<&'static str> {
        match self {
            Command::Configure => Some("/configure"),
            Command::AddAccount(_) => Some("/addaccount"),
            Command::EditAccount(_) => Some("/editaccount"),
            Command::Link(_) => Some("/link"),
            Command::AddNotification(_) => Some("/addnotification"),
            Command::Unanswered | Command::Balances | Command::Help => None,
        }
    }
}

const LINK_USAGE: &str = "/link <chat_id> <account_id>";
const EDIT_ACCOUNT_USAGE: &str = "/editaccount <account_id> {json}";
const ADD_NOTIFICATION_USAGE: &str = "/addnotification <account_chat_id> {json}";

/// `<id> <rest>` where rest is non-empty.
fn split_id(
    args: &str,
    usage: &'static str,
    schema: &'static str,
) -> Result<(i64, String), BotError> {
    let args = args.trim();
    let (id, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    let id = id.parse::<i64>().map_err(|_| {
        ValidationError::new(format!("Expected a numeric id. Usage: {usage}"), schema)
    })?;
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(ValidationError::new(format!("Missing argument. Usage: {usage}"), schema).into());
    }
    Ok((id, rest.to_string()))
}

fn parse_link(args: &str) -> Result<(i64, i64), BotError> {
    let (chat_id, account_id) = split_id(args, LINK_USAGE, LINK_USAGE)?;
    let account_id = account_id.parse::<i64>().map_err(|_| {
        ValidationError::new(
            format!("Expected a numeric account id. Usage: {LINK_USAGE}"),
            LINK_USAGE,
        )
    })?;
    Ok((chat_id, account_id))
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    db: Database,
    scheduler: Arc<Scheduler>,
    replies: ReplyTracker,
    alerts: AlertHandle,
    management_chat_id: ChatId,
}

impl TelegramBot {
    pub fn new(
        bot: Bot,
        db: Database,
        scheduler: Arc<Scheduler>,
        alerts: AlertHandle,
        management_chat_id: i64,
    ) -> Self {
        Self {
            bot,
            replies: ReplyTracker::new(db.clone()),
            db,
            scheduler,
            alerts,
            management_chat_id: ChatId(management_chat_id),
        }
    }

    /// Run the bot until Ctrl-C.
    pub async fn run(self: Arc<Self>) -> Result<(), BotError> {
        let bot = self.bot.clone();
        let me = bot.get_me().await?;
        let bot_id = me.id;
        info!(username = %me.username(), "Telegram bot started");

        let commands = Arc::clone(&self);
        let joins = Arc::clone(&self);
        let replies = Arc::clone(&self);
        let callbacks = Arc::clone(&self);

        let handler = dptree::entry()
            .branch(
                Update::filter_message().filter_command::<Command>().endpoint(
                    move |bot: Bot, msg: Message, cmd: Command| {
                        let this = Arc::clone(&commands);
                        async move { this.handle_command(bot, msg, cmd).await }
                    },
                ),
            )
            .branch(
                Update::filter_message()
                    .filter(move |msg: Message| added_to_chat(&msg, bot_id))
                    .endpoint(move |bot: Bot, msg: Message| {
                        let this = Arc::clone(&joins);
                        async move { this.handle_joined(bot, msg).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.reply_to_message().is_some())
                    .endpoint(move |msg: Message| {
                        let this = Arc::clone(&replies);
                        async move { this.handle_reply(msg).await }
                    }),
            )
            .branch(Update::filter_callback_query().endpoint(
                move |bot: Bot, q: CallbackQuery| {
                    let this = Arc::clone(&callbacks);
                    async move { this.handle_callback(bot, q).await }
                },
            ));

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
        Ok(())
    }

    async fn send_chunks(&self, bot: &Bot, chat_id: ChatId, text: &str) -> Result<(), BotError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_CHARS) {
            bot.send_message(chat_id, chunk)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Ok(())
    }

    /// Report user errors in the chat; propagate the rest.
    async fn respond(
        &self,
        bot: &Bot,
        chat_id: ChatId,
        result: Result<Screen, BotError>,
    ) -> Result<(), BotError> {
        match result {
            Ok(screen) => self.show(bot, chat_id, screen).await,
            Err(e) if e.is_user_facing() => {
                debug!(chat_id = chat_id.0, error = %e, "Rejected bot request");
                bot.send_message(chat_id, e.reply_text())
                    .parse_mode(ParseMode::Html)
                    .await?;
                Ok(())
            }
            Err(e) => {
                error!(chat_id = chat_id.0, error = %e, "Bot request failed");
                bot.send_message(chat_id, "Something went wrong, the operators were notified.")
                    .await?;
                Err(e)
            }
        }
    }

    async fn show(&self, bot: &Bot, chat_id: ChatId, screen: Screen) -> Result<(), BotError> {
        match screen.keyboard {
            Some(keyboard) => {
                bot.send_message(chat_id, screen.text)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboard)
                    .await?;
                Ok(())
            }
            None => self.send_chunks(bot, chat_id, &screen.text).await,
        }
    }

    async fn require_management(&self, msg: &Message, action: &str) -> Result<(), BotError> {
        if msg.chat.id == self.management_chat_id {
            return Ok(());
        }
        let user = msg
            .from
            .as_ref()
            .map(|u| u.username.clone().unwrap_or_else(|| u.full_name()))
            .unwrap_or_else(|| "unknown".to_string());
        warn!(chat_id = msg.chat.id.0, user = %user, action, "Unauthorized management request");
        self.alerts
            .send(AlertEvent::Unauthorized {
                external_chat_id: msg.chat.id.to_string(),
                user,
                command: action.to_string(),
            })
            .await;
        Err(BotError::Unauthorized)
    }

    async fn handle_command(&self, bot: Bot, msg: Message, cmd: Command) -> Result<(), BotError> {
        let chat_id = msg.chat.id;
        if let Some(action) = cmd.management_action() {
            if let Err(e) = self.require_management(&msg, action).await {
                return self.respond(&bot, chat_id, Err(e)).await;
            }
        }

        let result = match cmd {
            Command::Configure => Ok(menu::main_menu()),
            Command::Unanswered => self
                .scheduler
                .unanswered_text(&chat_id.to_string())
                .await
                .map(Screen::text)
                .map_err(BotError::from),
            Command::Balances => self.balances(chat_id).await,
            Command::AddAccount(json) => self.add_account(&json).await,
            Command::EditAccount(args) => self.edit_account(&args).await,
            Command::Link(args) => self.link(&args).await,
            Command::AddNotification(args) => self.add_notification(&args).await,
            Command::Help => Ok(Screen::text(Command::descriptions().to_string())),
        };
        self.respond(&bot, chat_id, result).await
    }

    async fn balances(&self, chat_id: ChatId) -> Result<Screen, BotError> {
        let chat = self
            .db
            .get_chat_by_external_id(ChatProvider::Telegram, &chat_id.to_string())
            .await?
            .ok_or_else(|| BotError::NotFound(format!("Chat {}", chat_id)))?;
        let text = self.scheduler.balances_text(chat.id, Utc::now()).await?;
        Ok(Screen::text(text))
    }

    async fn add_account(&self, json: &str) -> Result<Screen, BotError> {
        let new = NewAccount::from_json(json.trim())?;
        let account = self.db.create_account(&new).await?;
        info!(account_id = account.id, provider = %account.provider, "Account added");
        Ok(menu::account_view(&account))
    }

    async fn edit_account(&self, args: &str) -> Result<Screen, BotError> {
        let (id, json) = split_id(args, EDIT_ACCOUNT_USAGE, NEW_ACCOUNT_SCHEMA)?;
        let new = NewAccount::from_json(&json)?;
        let account = self
            .db
            .update_account(id, &new)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("Account {}", id)))?;
        info!(account_id = account.id, "Account updated");
        Ok(menu::account_view(&account))
    }

    async fn link(&self, args: &str) -> Result<Screen, BotError> {
        let (chat_id, account_id) = parse_link(args)?;
        let account = self
            .db
            .get_account(account_id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("Account {}", account_id)))?;
        let chat = self
            .db
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("Chat {}", chat_id)))?;
        let link = self.db.link_account_chat(account.id, chat.id).await?;
        info!(account_id, chat_id, link_id = link.id, "Account linked to chat");
        Ok(Screen::text(format!(
            "Added account {} to chat {}.",
            escape_html(&account.name),
            escape_html(&chat.name)
        )))
    }

    async fn add_notification(&self, args: &str) -> Result<Screen, BotError> {
        let (account_chat_id, json) = split_id(args, ADD_NOTIFICATION_USAGE, NEW_NOTIFICATION_SCHEMA)?;
        let new = NewNotificationSetting::from_json(&json)?;
        self.db
            .get_account_chat(account_chat_id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("Account chat {}", account_chat_id)))?;
        let setting = self
            .db
            .create_notification_setting(account_chat_id, &new)
            .await?;
        info!(setting_id = setting.id, account_chat_id, notification_type = %setting.notification_type, "Notification added");
        let settings = self.db.list_notification_settings(account_chat_id).await?;
        Ok(menu::notifications_list(account_chat_id, &settings))
    }

    async fn handle_callback(&self, bot: Bot, q: CallbackQuery) -> Result<(), BotError> {
        bot.answer_callback_query(q.id.clone()).await?;

        let Some(message) = q.message.as_ref() else {
            return Ok(());
        };
        let chat_id = message.chat().id;
        if chat_id != self.management_chat_id {
            let user = q.from.username.clone().unwrap_or_else(|| q.from.full_name());
            self.alerts
                .send(AlertEvent::Unauthorized {
                    external_chat_id: chat_id.to_string(),
                    user,
                    command: q.data.clone().unwrap_or_default(),
                })
                .await;
            return self.respond(&bot, chat_id, Err(BotError::Unauthorized)).await;
        }

        let result = match q.data.as_deref().and_then(Callback::parse) {
            Some(callback) => self.route(callback).await,
            None => Ok(Screen::text("Unknown command.")),
        };
        self.respond(&bot, chat_id, result).await
    }

    async fn route(&self, callback: Callback) -> Result<Screen, BotError> {
        debug!(?callback, "Menu callback");
        match callback {
            Callback::Configure => Ok(menu::main_menu()),
            Callback::AccountSettings => Ok(menu::account_settings()),
            Callback::AddAccount => Ok(menu::add_account_prompt()),
            Callback::ListAccounts => Ok(menu::accounts_list(&self.db.list_accounts().await?)),
            Callback::ShowAccount(id) => {
                let account = self
                    .db
                    .get_account(id)
                    .await?
                    .ok_or_else(|| BotError::NotFound(format!("Account {}", id)))?;
                Ok(menu::account_view(&account))
            }
            Callback::EditAccount(id) => Ok(menu::edit_account_prompt(id)),
            Callback::DeleteAccount(id) => {
                if !self.db.delete_account(id).await? {
                    return Err(BotError::NotFound(format!("Account {}", id)));
                }
                info!(account_id = id, "Account deleted");
                Ok(menu::accounts_list(&self.db.list_accounts().await?))
            }
            Callback::ChatList => Ok(menu::chats_list(&self.db.list_chats(None, None).await?)),
            Callback::ShowChat(id) => {
                let chat = self
                    .db
                    .get_chat(id)
                    .await?
                    .ok_or_else(|| BotError::NotFound(format!("Chat {}", id)))?;
                Ok(menu::chat_view(&chat))
            }
            Callback::AddAccountToChat(id) => {
                Ok(menu::link_prompt(id, &self.db.list_accounts().await?))
            }
            Callback::ViewAccounts(id) => Ok(menu::chat_accounts(
                id,
                &self.db.list_account_chats_for_chat(id).await?,
            )),
            Callback::ShowAccountChat(id) => {
                let details = self
                    .db
                    .get_account_chat(id)
                    .await?
                    .ok_or_else(|| BotError::NotFound(format!("Account chat {}", id)))?;
                Ok(menu::account_chat_view(&details))
            }
            Callback::DeleteAccountChat(id) => {
                let details = self
                    .db
                    .get_account_chat(id)
                    .await?
                    .ok_or_else(|| BotError::NotFound(format!("Account chat {}", id)))?;
                self.db.delete_account_chat(id).await?;
                info!(account_chat_id = id, "Account unlinked from chat");
                Ok(menu::chat_accounts(
                    details.chat.id,
                    &self.db.list_account_chats_for_chat(details.chat.id).await?,
                ))
            }
            Callback::AddNotification(id) => Ok(menu::add_notification_prompt(id)),
            Callback::ViewNotifications(id) => Ok(menu::notifications_list(
                id,
                &self.db.list_notification_settings(id).await?,
            )),
            Callback::DeleteNotification(id) => {
                let setting = self
                    .db
                    .get_notification_setting(id)
                    .await?
                    .ok_or_else(|| BotError::NotFound(format!("Notification {}", id)))?;
                self.db.delete_notification_setting(id).await?;
                info!(setting_id = id, "Notification deleted");
                Ok(menu::notifications_list(
                    setting.account_chat_id,
                    &self.db.list_notification_settings(setting.account_chat_id).await?,
                ))
            }
        }
    }

    async fn handle_joined(&self, bot: Bot, msg: Message) -> Result<(), BotError> {
        let chat = self
            .db
            .create_or_get_chat(&NewChat {
                name: msg.chat.title().unwrap_or("Unnamed chat").to_string(),
                provider: ChatProvider::Telegram,
                external_id: msg.chat.id.to_string(),
            })
            .await?;
        info!(chat_id = chat.id, external_id = %chat.external_id, "Bot added to chat");
        bot.send_message(
            msg.chat.id,
            format!("This chat's id: <code>{}</code>", chat.external_id),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        Ok(())
    }

    async fn handle_reply(&self, msg: Message) -> Result<(), BotError> {
        let reply_to = msg.reply_to_message().map(|m| m.id.0.to_string());
        self.replies
            .on_message(&msg.chat.id.to_string(), reply_to.as_deref())
            .await?;
        Ok(())
    }
}

fn added_to_chat(msg: &Message, bot_id: UserId) -> bool {
    msg.new_chat_members()
        .map(|members| members.iter().any(|m| m.id == bot_id))
        .unwrap_or(false)
}
