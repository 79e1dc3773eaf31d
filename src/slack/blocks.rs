//! Block Kit message layout types
//!
//! Only the block and text kinds the crate emits are modeled.

use serde::{Deserialize, Serialize};

/// Text object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Text {
    /// Unformatted text
    PlainText {
        /// Content
        text: String,
    },
    /// Slack markdown
    Mrkdwn {
        /// Content
        text: String,
    },
}

impl Text {
    /// Plain text object
    pub fn plain(text: impl Into<String>) -> Self {
        Text::PlainText { text: text.into() }
    }

    /// Markdown text object
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Text::Mrkdwn { text: text.into() }
    }

    /// The text content
    pub fn as_str(&self) -> &str {
        match self {
            Text::PlainText { text } | Text::Mrkdwn { text } => text,
        }
    }
}

/// Layout block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Large bold title
    Header {
        /// Title (plain text only)
        text: Text,
    },
    /// Small secondary line
    Context {
        /// Text elements
        elements: Vec<Text>,
    },
    /// Body section with a text and/or a two-column field grid
    Section {
        /// Section text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<Text>,
        /// Field grid
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<Text>>,
    },
    /// Horizontal rule
    Divider,
}

impl Block {
    /// Header block
    pub fn header(text: impl Into<String>) -> Self {
        Block::Header {
            text: Text::plain(text),
        }
    }

    /// Context line with a single markdown element
    pub fn context(text: impl Into<String>) -> Self {
        Block::Context {
            elements: vec![Text::mrkdwn(text)],
        }
    }

    /// Section with a single markdown text
    pub fn text(text: impl Into<String>) -> Self {
        Block::Section {
            text: Some(Text::mrkdwn(text)),
            fields: None,
        }
    }

    /// Section with markdown fields
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Block::Section {
            text: None,
            fields: Some(fields.into_iter().map(Text::mrkdwn).collect()),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blocks_serialize_to_block_kit_json() {
        let blocks = vec![
            Block::header("Overview"),
            Block::Context {
                elements: vec![Text::mrkdwn("<https://x|Open Jira>")],
            },
            Block::fields(["*a*", "*b*"]),
            Block::Divider,
            Block::text("*Zero:*\nConta"),
        ];

        assert_eq!(
            serde_json::to_value(&blocks).unwrap(),
            json!([
                {"type": "header", "text": {"type": "plain_text", "text": "Overview"}},
                {"type": "context", "elements": [{"type": "mrkdwn", "text": "<https://x|Open Jira>"}]},
                {"type": "section", "fields": [
                    {"type": "mrkdwn", "text": "*a*"},
                    {"type": "mrkdwn", "text": "*b*"}
                ]},
                {"type": "divider"},
                {"type": "section", "text": {"type": "mrkdwn", "text": "*Zero:*\nConta"}}
            ])
        );
    }
}
