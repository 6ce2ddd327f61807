//! Inline `/configure` menu.
//!
//! Buttons carry `<action>` or `<action>_<id>` tokens. [`Callback::parse`]
//! routes a token back to its action; the screen builders render the text
//! and keyboard for each step.

use bankwatch_core::{
    currency_label, escape_html, Account, AccountChatDetails, Chat, NotificationSetting,
    NEW_ACCOUNT_SCHEMA, NEW_NOTIFICATION_SCHEMA,
};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    Configure,
    AccountSettings,
    AddAccount,
    ListAccounts,
    ShowAccount(i64),
    EditAccount(i64),
    DeleteAccount(i64),
    ChatList,
    ShowChat(i64),
    AddAccountToChat(i64),
    ViewAccounts(i64),
    ShowAccountChat(i64),
    DeleteAccountChat(i64),
    AddNotification(i64),
    ViewNotifications(i64),
    DeleteNotification(i64),
}

const EXACT: &[(&str, Callback)] = &[
    ("configure", Callback::Configure),
    ("account_settings", Callback::AccountSettings),
    ("add_account", Callback::AddAccount),
    ("list_accounts", Callback::ListAccounts),
    ("chat_list", Callback::ChatList),
];

const PREFIXED: &[(&str, fn(i64) -> Callback)] = &[
    ("show_account_", Callback::ShowAccount),
    ("edit_account_", Callback::EditAccount),
    ("delete_account_", Callback::DeleteAccount),
    ("show_chat_", Callback::ShowChat),
    ("add_account_", Callback::AddAccountToChat),
    ("view_accounts_", Callback::ViewAccounts),
    ("show_accountchat_", Callback::ShowAccountChat),
    ("delete_accountchat_", Callback::DeleteAccountChat),
    ("add_notification_", Callback::AddNotification),
    ("view_notifications_", Callback::ViewNotifications),
    ("delete_notification_", Callback::DeleteNotification),
];

impl Callback {
    /// `None` for anything that is not a known token with a numeric id.
    pub fn parse(data: &str) -> Option<Self> {
        if let Some((_, callback)) = EXACT.iter().find(|(token, _)| *token == data) {
            return Some(*callback);
        }
        PREFIXED.iter().find_map(|(prefix, build)| {
            data.strip_prefix(prefix)
                .and_then(|id| id.parse::<i64>().ok())
                .map(build)
        })
    }

    pub fn token(self) -> String {
        match self {
            Callback::Configure => "configure".to_string(),
            Callback::AccountSettings => "account_settings".to_string(),
            Callback::AddAccount => "add_account".to_string(),
            Callback::ListAccounts => "list_accounts".to_string(),
            Callback::ChatList => "chat_list".to_string(),
            Callback::ShowAccount(id) => format!("show_account_{id}"),
            Callback::EditAccount(id) => format!("edit_account_{id}"),
            Callback::DeleteAccount(id) => format!("delete_account_{id}"),
            Callback::ShowChat(id) => format!("show_chat_{id}"),
            Callback::AddAccountToChat(id) => format!("add_account_{id}"),
            Callback::ViewAccounts(id) => format!("view_accounts_{id}"),
            Callback::ShowAccountChat(id) => format!("show_accountchat_{id}"),
            Callback::DeleteAccountChat(id) => format!("delete_accountchat_{id}"),
            Callback::AddNotification(id) => format!("add_notification_{id}"),
            Callback::ViewNotifications(id) => format!("view_notifications_{id}"),
            Callback::DeleteNotification(id) => format!("delete_notification_{id}"),
        }
    }
}

/// Text plus optional keyboard for one menu step.
#[derive(Debug, Clone)]
pub struct Screen {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Screen {
    fn new(text: impl Into<String>, rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(InlineKeyboardMarkup::new(rows)),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }
}

fn button(label: impl Into<String>, callback: Callback) -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::callback(label, callback.token())]
}

fn schema_block(schema: &str) -> String {
    format!("<pre>{}</pre>", escape_html(schema))
}

pub fn main_menu() -> Screen {
    Screen::new(
        "Configure your bot settings here.",
        vec![
            button("Account Settings", Callback::AccountSettings),
            button("Chat List", Callback::ChatList),
        ],
    )
}

pub fn account_settings() -> Screen {
    Screen::new(
        "Account settings:",
        vec![
            button("➕ Add account", Callback::AddAccount),
            button("📋 List accounts", Callback::ListAccounts),
            button("⬅️ Back", Callback::Configure),
        ],
    )
}

pub fn accounts_list(accounts: &[Account]) -> Screen {
    let mut rows: Vec<_> = accounts
        .iter()
        .map(|a| button(format!("{} ({})", a.name, a.provider), Callback::ShowAccount(a.id)))
        .collect();
    rows.push(button("⬅️ Back", Callback::AccountSettings));
    let text = if accounts.is_empty() {
        "No accounts yet."
    } else {
        "Accounts:"
    };
    Screen::new(text, rows)
}

pub fn account_view(account: &Account) -> Screen {
    let configuration = serde_json::to_string_pretty(&account.configuration)
        .unwrap_or_else(|_| account.configuration.to_string());
    let text = format!(
        "Viewing account:\n\n<b>Id</b>: {}\n<b>Name</b>: {}\n<b>Provider</b>: {}\n<b>Interval</b>: {} s\n<b>Currency</b>: {}\n<b>Configuration</b>:\n<pre>{}</pre>",
        account.id,
        escape_html(&account.name),
        account.provider,
        account.interval_seconds,
        currency_label(account.currency),
        escape_html(&configuration),
    );
    Screen::new(
        text,
        vec![
            button("📝 Edit", Callback::EditAccount(account.id)),
            button("🗑 Delete", Callback::DeleteAccount(account.id)),
            button("⬅️ Back", Callback::ListAccounts),
        ],
    )
}

pub fn add_account_prompt() -> Screen {
    Screen::text(format!(
        "Send the account as JSON:\n<code>/addaccount {{json}}</code>\n\n{}",
        schema_block(NEW_ACCOUNT_SCHEMA)
    ))
}

pub fn edit_account_prompt(account_id: i64) -> Screen {
    Screen::text(format!(
        "Send the new account JSON:\n<code>/editaccount {} {{json}}</code>\n\n{}",
        account_id,
        schema_block(NEW_ACCOUNT_SCHEMA)
    ))
}

pub fn chats_list(chats: &[Chat]) -> Screen {
    let mut rows: Vec<_> = chats
        .iter()
        .map(|c| button(c.name.clone(), Callback::ShowChat(c.id)))
        .collect();
    rows.push(button("⬅️ Back", Callback::Configure));
    let text = if chats.is_empty() {
        "No chats yet. Add the bot to a group to register it."
    } else {
        "Chats:"
    };
    Screen::new(text, rows)
}

pub fn chat_view(chat: &Chat) -> Screen {
    let text = format!(
        "Viewing chat:\n\n<b>Id</b>: {}\n<b>Name</b>: {}\n<b>Provider</b>: {}\n<b>External id</b>: <code>{}</code>",
        chat.id,
        escape_html(&chat.name),
        chat.provider,
        escape_html(&chat.external_id),
    );
    Screen::new(
        text,
        vec![
            button("➕ Add account", Callback::AddAccountToChat(chat.id)),
            button("📋 Accounts", Callback::ViewAccounts(chat.id)),
            button("⬅️ Back", Callback::ChatList),
        ],
    )
}

pub fn link_prompt(chat_id: i64, accounts: &[Account]) -> Screen {
    let listing: Vec<String> = accounts
        .iter()
        .map(|a| format!("{} - {}", a.id, escape_html(&a.name)))
        .collect();
    Screen::text(format!(
        "Link an account to chat {}:\n<code>/link {} &lt;account_id&gt;</code>\n\n{}",
        chat_id,
        chat_id,
        listing.join("\n")
    ))
}

pub fn chat_accounts(chat_id: i64, links: &[AccountChatDetails]) -> Screen {
    let mut rows: Vec<_> = links
        .iter()
        .map(|l| button(l.account.name.clone(), Callback::ShowAccountChat(l.link.id)))
        .collect();
    rows.push(button("⬅️ Back", Callback::ShowChat(chat_id)));
    let text = if links.is_empty() {
        "No accounts linked to this chat."
    } else {
        "Linked accounts:"
    };
    Screen::new(text, rows)
}

pub fn account_chat_view(details: &AccountChatDetails) -> Screen {
    let id = details.link.id;
    Screen::new(
        format!(
            "Viewing account chat:\n\n{} - {}",
            escape_html(&details.account.name),
            escape_html(&details.chat.name)
        ),
        vec![
            button("🔔 Add notification", Callback::AddNotification(id)),
            button("📋 Notifications", Callback::ViewNotifications(id)),
            button("🗑 Unlink", Callback::DeleteAccountChat(id)),
            button("⬅️ Back", Callback::ViewAccounts(details.chat.id)),
        ],
    )
}

pub fn add_notification_prompt(account_chat_id: i64) -> Screen {
    Screen::text(format!(
        "Send the notification as JSON:\n<code>/addnotification {} {{json}}</code>\n\n{}",
        account_chat_id,
        schema_block(NEW_NOTIFICATION_SCHEMA)
    ))
}

pub fn notifications_list(account_chat_id: i64, settings: &[NotificationSetting]) -> Screen {
    let mut rows: Vec<_> = settings
        .iter()
        .map(|s| {
            let label = match &s.schedule {
                Some(schedule) => format!("🗑 {} ({})", s.notification_type, schedule),
                None => format!("🗑 {}", s.notification_type),
            };
            button(label, Callback::DeleteNotification(s.id))
        })
        .collect();
    rows.push(button("⬅️ Back", Callback::ShowAccountChat(account_chat_id)));
    let text = if settings.is_empty() {
        "No notifications configured."
    } else {
        "Notifications (tap to delete):"
    };
    Screen::new(text, rows)
}
