//! Notification message rendering (Telegram HTML).

use crate::{
    amount_with_sign, amount_with_spaces, currency_label, escape_html, Balance, Transaction,
    UnansweredNotification,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Sent in place of a balance summary when the provider has no data.
pub const NO_BALANCE_DATA: &str = "No balance data available";

const TIME_FORMAT: &str = "%Y-%m-%d | %H:%M";

fn local_time(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format(TIME_FORMAT).to_string()
}

/// Message for a single new transaction.
pub fn transaction_message(account_name: &str, transaction: &Transaction, tz: Tz) -> String {
    format!(
        "{}: <b>{} {}</b>\n\nComment: {}\n\n<b>{}</b>",
        escape_html(account_name),
        amount_with_sign(transaction.amount),
        currency_label(transaction.currency),
        escape_html(&transaction.description),
        local_time(transaction.at_time, tz),
    )
}

/// Day-over-day balance summary.
///
/// `fallback_currency` is used when the snapshot does not carry one.
pub fn balance_message(
    account_name: &str,
    balance: &Balance,
    fallback_currency: u16,
    tz: Tz,
    now: DateTime<Utc>,
) -> String {
    let currency = currency_label(balance.currency.unwrap_or(fallback_currency));
    let at_time = balance.at_time.unwrap_or(now);

    let mut msg = format!(
        "{}\n\nStart of day: <b>{} {}</b>\nEnd of day: <b>{} {}</b>\n",
        escape_html(account_name),
        amount_with_spaces(balance.start_balance),
        currency,
        amount_with_spaces(balance.end_balance),
        currency,
    );

    if let Some(deposited) = balance.deposited {
        msg.push_str(&format!(
            "Deposited: <b>{} {}</b>\n",
            amount_with_spaces(deposited),
            currency
        ));
    }
    if let Some(withdrawn) = balance.withdrawn {
        msg.push_str(&format!(
            "Withdrawn: <b>{} {}</b>\n",
            amount_with_spaces(withdrawn),
            currency
        ));
    }

    msg.push_str(&format!(
        "\nNet: <b>{} {}</b>\n<b>{}</b>",
        amount_with_sign(balance.net_change()),
        currency,
        local_time(at_time, tz),
    ));
    msg
}

/// Liveness line for ACTIVE settings.
pub fn active_message(account_name: &str) -> String {
    format!("{}: <b>Active</b>", escape_html(account_name))
}

/// Link to a message in a Telegram supergroup.
pub fn message_link(external_chat_id: &str, external_message_id: &str) -> String {
    let chat = external_chat_id
        .strip_prefix("-100")
        .unwrap_or(external_chat_id.trim_start_matches('-'));
    format!("https://t.me/c/{}/{}", chat, external_message_id)
}

/// List of notifications nobody has replied to yet.
pub fn unanswered_message(items: &[UnansweredNotification], tz: Tz) -> String {
    let mut msg = String::from("Unanswered messages:\n\n");
    if items.is_empty() {
        msg.push_str("None");
        return msg;
    }

    let lines: Vec<String> = items
        .iter()
        .map(|item| {
            format!(
                "<a href='{}'>{}: {} {} | {}</a>",
                message_link(
                    &item.notification.external_chat_id,
                    &item.notification.external_message_id
                ),
                escape_html(&item.account_name),
                amount_with_sign(item.amount),
                currency_label(item.currency),
                local_time(item.at_time, tz),
            )
        })
        .collect();
    msg.push_str(&lines.join("\n"));
    msg
}

/// Summary of every account's balance for the `/balances` command.
pub fn balances_overview(
    entries: &[(String, u16, Option<Balance>)],
    tz: Tz,
    now: DateTime<Utc>,
) -> String {
    let mut msg = String::from("Balances:\n\n");
    for (name, currency, balance) in entries {
        match balance {
            Some(balance) => {
                msg.push_str(&balance_message(name, balance, *currency, tz, now));
                msg.push_str("\n--------------------------\n");
            }
            None => msg.push_str(&format!("{} ({})\n\n", NO_BALANCE_DATA, escape_html(name))),
        }
    }
    msg.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SentNotification, TransactionType};
    use chrono::TimeZone;
    use chrono_tz::Europe::Kyiv;
    use rust_decimal_macros::dec;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_balance_message() {
        let balance = Balance {
            currency: Some(980),
            start_balance: dec!(1000.00),
            end_balance: dec!(1250.50),
            deposited: Some(dec!(300.00)),
            withdrawn: Some(dec!(49.50)),
            at_time: Some(at()),
        };
        let msg = balance_message("Main", &balance, 840, Kyiv, at());

        assert!(msg.contains("Start of day: <b>1 000.00 UAH</b>"));
        assert!(msg.contains("End of day: <b>1 250.50 UAH</b>"));
        assert!(msg.contains("Deposited: <b>300.00 UAH</b>"));
        assert!(msg.contains("Withdrawn: <b>49.50 UAH</b>"));
        assert!(msg.contains("+250.50 UAH"));
        assert!(msg.contains("2024-05-10 | 18:30"));
    }

    #[test]
    fn test_balance_message_without_turnover() {
        let balance = Balance {
            currency: None,
            start_balance: dec!(500),
            end_balance: dec!(400),
            deposited: None,
            withdrawn: None,
            at_time: None,
        };
        let msg = balance_message("Main", &balance, 840, Kyiv, at());
        assert!(!msg.contains("Deposited"));
        assert!(!msg.contains("Withdrawn"));
        assert!(msg.contains("-100.00 USD"));
    }

    #[test]
    fn test_transaction_message() {
        let tx = Transaction {
            id: 1,
            account_id: 1,
            unique_id: "u1".to_string(),
            transaction_type: TransactionType::Deposit,
            amount: dec!(1500),
            currency: 980,
            description: "Invoice <42>".to_string(),
            at_time: at(),
            created_at: at(),
        };
        let msg = transaction_message("Shop", &tx, Kyiv);
        assert_eq!(
            msg,
            "Shop: <b>+1 500.00 UAH</b>\n\nComment: Invoice &lt;42&gt;\n\n<b>2024-05-10 | 18:30</b>"
        );
    }

    #[test]
    fn test_message_link() {
        assert_eq!(
            message_link("-1001234567890", "42"),
            "https://t.me/c/1234567890/42"
        );
    }

    #[test]
    fn test_unanswered_message() {
        let item = UnansweredNotification {
            notification: SentNotification {
                id: 1,
                transaction_id: 1,
                account_chat_id: 1,
                external_chat_id: "-100555".to_string(),
                external_message_id: "9".to_string(),
                is_replied: false,
                created_at: at(),
                updated_at: at(),
            },
            account_name: "Main".to_string(),
            amount: dec!(-20),
            currency: 980,
            at_time: at(),
        };
        let msg = unanswered_message(&[item], Kyiv);
        assert!(msg.contains("<a href='https://t.me/c/555/9'>Main: -20.00 UAH | 2024-05-10 | 18:30</a>"));
        assert!(unanswered_message(&[], Kyiv).ends_with("None"));
    }

    #[test]
    fn test_balances_overview_marks_missing() {
        let msg = balances_overview(&[("Cash".to_string(), 980, None)], Kyiv, at());
        assert!(msg.contains("No balance data available (Cash)"));
    }
}
