use serde::{Deserialize, Serialize};

use crate::api::HistoryEntry;

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the UI's conversation, tagged with its speaker.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Turn {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Turn {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Pair UI turns into endpoint history entries.
///
/// Turns are consumed two at a time, user then assistant. A missing or
/// wrong-role side degrades to an empty string, and a pair is only emitted
/// when both sides are non-empty after trimming. An unanswered trailing user
/// turn therefore never reaches history; it is the new request's input.
pub fn translate(turns: &[Turn]) -> Vec<HistoryEntry> {
    let mut entries = Vec::with_capacity(turns.len() / 2);
    for pair in turns.chunks(2) {
        let question = match pair.first() {
            Some(turn) if turn.role == Role::User => turn.content.as_str(),
            _ => "",
        };
        let answer = match pair.get(1) {
            Some(turn) if turn.role == Role::Assistant => turn.content.as_str(),
            _ => "",
        };
        if !question.trim().is_empty() && !answer.trim().is_empty() {
            entries.push(HistoryEntry::new(question, answer));
        }
    }
    entries
}
