use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One mailbox item as handed over by the mail-retrieval side.
///
/// Absent header fields arrive as empty strings; nothing downstream treats
/// an empty sender or subject as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub mailbox_id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender_address: String,
    #[serde(default)]
    pub sender_name: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl InboundMessage {
    /// Body text to analyse: the full body when present, otherwise the preview.
    pub fn content(&self) -> &str {
        match self.body.as_deref() {
            Some(body) if !body.trim().is_empty() => body,
            _ => &self.preview,
        }
    }

    /// Subject and content joined, the text every local stage works on.
    pub fn analysis_text(&self, max_body_chars: usize) -> String {
        let body = truncate_chars(self.content(), max_body_chars);
        format!("{} {}", self.subject, body)
    }

    /// Domain part of the sender address, lower-cased.
    pub fn sender_domain(&self) -> Option<String> {
        let (_, domain) = self.sender_address.trim().rsplit_once('@')?;
        let domain = domain.trim_end_matches('>').trim().to_lowercase();
        if domain.is_empty() {
            None
        } else {
            Some(domain)
        }
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
