//! Date buckets for the chat history sidebar.

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;

use crate::model::ChatSummary;

/// Sidebar section a chat falls into, ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateGroup {
    Today,
    Yesterday,
    PreviousSevenDays,
    PreviousThirtyDays,
    Older,
}

impl DateGroup {
    /// Bucket a timestamp relative to `now`, by calendar day in UTC.
    pub fn classify(at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let days = (now.date_naive() - at.date_naive()).num_days();
        match days {
            i64::MIN..=0 => DateGroup::Today,
            1 => DateGroup::Yesterday,
            2..=7 => DateGroup::PreviousSevenDays,
            8..=30 => DateGroup::PreviousThirtyDays,
            _ => DateGroup::Older,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DateGroup::Today => "Today",
            DateGroup::Yesterday => "Yesterday",
            DateGroup::PreviousSevenDays => "Previous 7 Days",
            DateGroup::PreviousThirtyDays => "Previous 30 Days",
            DateGroup::Older => "Older",
        }
    }
}

impl std::fmt::Display for DateGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Group chats into sidebar sections.
///
/// Chats are ordered by last activity, newest first; empty sections are omitted.
///
/// # Example
/// ```
/// use chatwire::history::{group_chats, DateGroup};
/// use chatwire::model::ChatSummary;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let chats = vec![ChatSummary {
///     id: "c1".to_string(),
///     title: "Trip plan".to_string(),
///     created_at: now - Duration::days(3),
///     updated_at: None,
/// }];
///
/// let groups = group_chats(&chats, now);
/// assert_eq!(groups[0].0, DateGroup::PreviousSevenDays);
/// ```
pub fn group_chats(chats: &[ChatSummary], now: DateTime<Utc>) -> Vec<(DateGroup, Vec<&ChatSummary>)> {
    let grouped = chats
        .iter()
        .sorted_by(|a, b| b.last_activity().cmp(&a.last_activity()))
        .chunk_by(|chat| DateGroup::classify(chat.last_activity(), now));

    let sections = (&grouped)
        .into_iter()
        .map(|(group, chats)| (group, chats.collect()))
        .collect();
    sections
}

/// Chats active within the last `window`, newest first.
pub fn recent_chats(chats: &[ChatSummary], now: DateTime<Utc>, window: Duration) -> Vec<&ChatSummary> {
    chats
        .iter()
        .filter(|chat| now - chat.last_activity() <= window)
        .sorted_by(|a, b| b.last_activity().cmp(&a.last_activity()))
        .collect()
}
