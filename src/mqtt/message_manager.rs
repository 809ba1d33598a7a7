use crate::device::ToggleCommand;
use chrono::NaiveDateTime;
use std::fmt;

const PREVIEW_LEN: usize = 60;

/// A serialized message on its way to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    topic: String,
    content: String,
    timestamp: NaiveDateTime,
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = self.content.chars().take(PREVIEW_LEN).collect();
        if preview.len() < self.content.len() {
            write!(f, "{} - {}: {}...", self.timestamp, self.topic, preview)
        } else {
            write!(f, "{} - {}: {}", self.timestamp, self.topic, preview)
        }
    }
}

impl OutboundMessage {
    pub fn from_topic(topic: String, content: String) -> Self {
        OutboundMessage {
            topic,
            content,
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    pub fn from_command(command: &ToggleCommand) -> serde_json::Result<Self> {
        Ok(Self::from_topic(command.topic().to_string(), command.to_json()?))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn render(&self) -> String {
        format!("{}: {}\n{}", self.timestamp, self.topic, self.content)
    }
}
