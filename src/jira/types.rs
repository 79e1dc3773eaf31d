//! Schemas for the parts of a Jira issue this crate reads
//!
//! Search results are kept as raw JSON so the export can persist them with full fidelity.
//! [`Issue`] pairs that raw document with a typed view of the handful of fields the
//! procedures actually use.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// One issue returned by the search endpoint
#[derive(Clone, Debug)]
pub struct Issue {
    raw: Value,
    key: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueDoc {
    key: String,
    #[serde(default)]
    fields: Option<IssueFields>,
}

/// Typed subset of an issue's `fields` object
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IssueFields {
    /// Issue title
    #[serde(default)]
    pub summary: Option<String>,

    /// Issue type (`{"name": "Story"}`)
    #[serde(default)]
    pub issuetype: Option<NamedValue>,

    /// Workflow status (`{"name": "Develop"}`)
    #[serde(default)]
    pub status: Option<NamedValue>,

    /// Attachment descriptors, present when `attachment` is among the requested fields
    #[serde(default)]
    pub attachment: Option<Vec<Attachment>>,
}

/// Any Jira object identified by a display name
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NamedValue {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Attachment metadata embedded in an issue
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment ID
    #[serde(default)]
    pub id: Option<String>,

    /// Original file name
    #[serde(default)]
    pub filename: Option<String>,

    /// MIME type reported by Jira
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Download URL of the content
    #[serde(default)]
    pub content: Option<String>,

    /// Size in bytes
    #[serde(default)]
    pub size: Option<u64>,
}

/// Select-list option (`{"value": "..."}`, sometimes `{"name": "..."}`)
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FieldOption {
    /// Option value
    #[serde(default)]
    pub value: Option<String>,
    /// Option name, used by some field types instead of `value`
    #[serde(default)]
    pub name: Option<String>,
}

impl FieldOption {
    /// `value`, falling back to `name` when the value is missing or empty
    pub fn label(&self) -> Option<&str> {
        self.value
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| self.name.as_deref().filter(|n| !n.is_empty()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OptionField {
    Many(Vec<FieldOption>),
    One(FieldOption),
}

impl Issue {
    /// Wrap a raw search result, decoding the typed view
    ///
    /// # Errors
    /// Returns [`Error::Decode`] if the document has no string `key` or a known field has an
    /// unexpected shape
    pub fn from_value(raw: Value) -> Result<Self> {
        let doc = IssueDoc::deserialize(&raw).map_err(|source| Error::Decode {
            context: "search result issue".to_string(),
            source,
        })?;

        Ok(Self {
            key: doc.key,
            fields: doc.fields.unwrap_or_default(),
            raw,
        })
    }

    /// Issue key, e.g. `EUR-1234`
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Summary, or an empty string
    pub fn summary(&self) -> &str {
        self.fields.summary.as_deref().unwrap_or_default()
    }

    /// Issue type name, or an empty string
    pub fn issue_type(&self) -> &str {
        self.fields
            .issuetype
            .as_ref()
            .and_then(|t| t.name.as_deref())
            .unwrap_or_default()
    }

    /// Status name, or an empty string
    pub fn status(&self) -> &str {
        self.fields
            .status
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .unwrap_or_default()
    }

    /// Attachment descriptors in the order Jira lists them
    pub fn attachments(&self) -> &[Attachment] {
        self.fields.attachment.as_deref().unwrap_or_default()
    }

    /// The document exactly as the server returned it
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// A raw entry of `fields`, for custom fields without a typed counterpart
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.raw.get("fields")?.get(name)
    }

    /// Label of a single- or multi-select custom field
    ///
    /// For multi-selects the first option wins. Returns `None` for empty, missing or
    /// non-option values.
    pub fn option_label(&self, name: &str) -> Option<String> {
        let value = self.field(name)?;
        match OptionField::deserialize(value).ok()? {
            OptionField::Many(options) => options.first()?.label().map(str::to_string),
            OptionField::One(option) => option.label().map(str::to_string),
        }
    }
}

impl Attachment {
    /// Whether the MIME type is one of `allowed`
    pub fn has_mime_in(&self, allowed: &[String]) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|mime| allowed.iter().any(|a| a == mime))
    }
}
