use async_trait::async_trait;
use std::fmt::Write;
use thiserror::Error;
use tracing::debug;

use crate::reading::{DetailSection, Reading};
use crate::telegram::{ApiError, TelegramClient};

/// Telegram's legacy Markdown: `*bold*` and `` `code` `` spans.
pub const PARSE_MODE: &str = "Markdown";

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Telegram(#[from] ApiError),
    #[error("refusing to send an empty message")]
    EmptyMessage,
}

/// Delivers a formatted alert to the single configured destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), SendError>;
}

pub struct TelegramNotifier {
    client: TelegramClient,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, chat_id: String) -> Self {
        Self { client, chat_id }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<(), SendError> {
        if text.trim().is_empty() {
            return Err(SendError::EmptyMessage);
        }
        let msg = self
            .client
            .send_message(&self.chat_id, text, Some(PARSE_MODE))
            .await?;
        debug!(chat_id = %self.chat_id, message_id = msg.message_id, "Telegram alert sent");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// None when the values are equal.
    pub fn between(previous: i64, current: i64) -> Option<Self> {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => Some(Direction::Up),
            std::cmp::Ordering::Less => Some(Direction::Down),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Direction::Up => "🔺",
            Direction::Down => "🔻",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// Render the change alert for `previous` -> `current`.
pub fn format_alert(previous: &Reading, current: &Reading) -> String {
    // Widened so extreme values cannot overflow.
    let delta = i128::from(current.value) - i128::from(previous.value);
    let marker = Direction::between(previous.value, current.value)
        .map(Direction::marker)
        .unwrap_or("⏺");

    let mut msg = format!(
        "🚨 *Risk Level Update*\n\nCurrent Level: `{}%` {} ({:+}%)\nPrevious Level: `{}%`",
        current.value, marker, delta, previous.value,
    );
    for section in &current.details {
        write_section(&mut msg, section);
    }
    msg
}

fn write_section(msg: &mut String, section: &DetailSection) {
    // Writing into a String cannot fail.
    let _ = write!(msg, "\n\n*{}*", escape_markdown(&title_case(&section.name)));
    for (key, value) in &section.fields {
        let _ = write!(
            msg,
            "\n{}: {}",
            escape_markdown(&key.replace('_', " ")),
            escape_markdown(value)
        );
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Escape the characters legacy Markdown treats as entity delimiters.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_increase_alert() {
        let msg = format_alert(&Reading::new(40), &Reading::new(55));
        assert_eq!(
            msg,
            "🚨 *Risk Level Update*\n\nCurrent Level: `55%` 🔺 (+15%)\nPrevious Level: `40%`"
        );
    }

    #[test]
    fn test_decrease_alert() {
        let msg = format_alert(&Reading::new(55), &Reading::new(30));
        assert!(msg.contains("Current Level: `30%` 🔻 (-25%)"));
        assert!(msg.contains("Previous Level: `55%`"));
        assert!(!msg.contains("🔺"));
    }

    #[test]
    fn test_extreme_values_keep_exact_delta() {
        let msg = format_alert(&Reading::new(-1), &Reading::new(i64::MAX));
        assert!(msg.contains("(+9223372036854775808%)"), "{}", msg);
        let msg = format_alert(&Reading::new(i64::MAX), &Reading::new(i64::MIN));
        assert!(msg.contains("(-18446744073709551615%)"), "{}", msg);
        assert!(msg.contains("🔻"));
    }

    #[test]
    fn test_alert_includes_details() {
        let current = Reading::new(70).with_details(vec![
            DetailSection {
                name: "news".to_string(),
                fields: vec![("headline".to_string(), "Strike *imminent*".to_string())],
            },
            DetailSection {
                name: "weather".to_string(),
                fields: vec![("wind_kts".to_string(), "12".to_string())],
            },
        ]);
        let msg = format_alert(&Reading::new(60), &current);
        assert!(msg.contains("\n\n*News*\nheadline: Strike \\*imminent\\*"));
        assert!(msg.contains("\n\n*Weather*\nwind kts: 12"));
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a_b*c`d[e]"), "a\\_b\\*c\\`d\\[e]");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn test_direction_between() {
        assert_eq!(Direction::between(1, 2), Some(Direction::Up));
        assert_eq!(Direction::between(2, 1), Some(Direction::Down));
        assert_eq!(Direction::between(3, 3), None);
        assert_eq!(Direction::Up.to_string(), "UP");
        assert_eq!(Direction::Down.to_string(), "DOWN");
    }

    #[tokio::test]
    async fn test_empty_message_not_sent() {
        let client = TelegramClient::new("http://127.0.0.1:9", "t").unwrap();
        let notifier = TelegramNotifier::new(client, "1".to_string());
        assert!(matches!(notifier.notify("  \n").await, Err(SendError::EmptyMessage)));
    }

    proptest! {
        #[test]
        fn proptest_delta_and_marker_match(prev in -1000i64..1000, cur in -1000i64..1000) {
            prop_assume!(prev != cur);
            let msg = format_alert(&Reading::new(prev), &Reading::new(cur));
            let delta = cur - prev;
            let expected_delta = format!("({:+}%)", delta);
            let expected_current = format!("`{}%`", cur);
            let expected_previous = format!("`{}%`", prev);
            prop_assert!(msg.contains(&expected_delta));
            prop_assert!(msg.contains(&expected_current));
            prop_assert!(msg.contains(&expected_previous));
            if delta > 0 {
                prop_assert!(msg.contains("🔺") && !msg.contains("🔻"));
            } else {
                prop_assert!(msg.contains("🔻") && !msg.contains("🔺"));
            }
        }
    }
}
