//! Actions: the unit of synchronized board state.
//!
//! An action is a flat JSON object tagged by its `type` field. Apart from the
//! tag, every field is opaque payload that is stored and relayed verbatim, in
//! the order the client wrote it.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the discriminator field.
pub const TYPE_FIELD: &str = "type";

/// Errors raised while reading an inbound action frame.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Action must be a JSON object")]
    NotAnObject,
    #[error("Action is missing the `type` field")]
    MissingType,
    #[error("Action `type` must be a non-empty string")]
    InvalidType,
}

/// Known action types. The set is open: unknown tags are carried as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Freehand stroke segment (`x0`, `y0`, `x1`, `y1`, `color`, `size`).
    Draw,
    /// Filled rectangle (`x`, `y`, `width`, `height`, `color`).
    Rect,
    /// Wrapped text block (`text`, `x`, `y`, `maxWidth`, `lineHeight`, `color`, `size`).
    TextBox,
    /// Typeset formula (`latex`, `x`, `y`).
    Math,
    /// Board reset. Never recorded in the history.
    Clear,
    Other(String),
}

impl ActionKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "draw" => Self::Draw,
            "rect" => Self::Rect,
            "textBox" => Self::TextBox,
            "math" => Self::Math,
            "clear" => Self::Clear,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Draw => "draw",
            Self::Rect => "rect",
            Self::TextBox => "textBox",
            Self::Math => "math",
            Self::Clear => "clear",
            Self::Other(tag) => tag,
        }
    }
}

/// A single edit applied to the shared board.
///
/// Construction validates the `type` tag; after that the record is immutable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Action {
    fields: Map<String, Value>,
}

impl Action {
    /// Parse an action from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, ActionError> {
        let value: Value = serde_json::from_str(text)?;
        Self::try_from(value)
    }

    /// Parse an action from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ActionError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::try_from(value)
    }

    /// The canonical `{"type":"clear"}` record.
    pub fn clear() -> Self {
        let mut fields = Map::new();
        fields.insert(TYPE_FIELD.to_string(), Value::from(ActionKind::Clear.as_str()));
        Self { fields }
    }

    /// The raw `type` tag.
    pub fn type_tag(&self) -> &str {
        self.fields
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> ActionKind {
        ActionKind::from_tag(self.type_tag())
    }

    pub fn is_clear(&self) -> bool {
        self.kind() == ActionKind::Clear
    }

    /// Look up a payload field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// All fields, including `type`.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serialize back to the wire representation.
    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

impl TryFrom<Map<String, Value>> for Action {
    type Error = ActionError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get(TYPE_FIELD) {
            None => Err(ActionError::MissingType),
            Some(Value::String(tag)) if !tag.is_empty() => Ok(Self { fields }),
            Some(_) => Err(ActionError::InvalidType),
        }
    }
}

impl TryFrom<Value> for Action {
    type Error = ActionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Self::try_from(fields),
            _ => Err(ActionError::NotAnObject),
        }
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
