use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// The kind tag of a message, used for identity comparison and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum MessageKind {
    Text,
    TextUpdate,
    Reasoning,
    ReasoningUpdate,
    ToolCall,
    ToolCallUpdate,
    ToolCallResult,
    ToolsCall,
    ToolsCallUpdate,
    ToolsCallResult,
    Usage,
    Composite,
    ToolsCallAggregate,
}

impl MessageKind {
    /// Update kinds carry partial fragments of a logical message; everything
    /// else is structurally complete on arrival.
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            MessageKind::TextUpdate
                | MessageKind::ReasoningUpdate
                | MessageKind::ToolCallUpdate
                | MessageKind::ToolsCallUpdate
        )
    }
}

/// Decides whether two adjacent fragments belong to the same logical message.
///
/// The sub-key is the tool-call identifier for tool-call update fragments and
/// absent for every other kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub generation_id: String,
    pub kind: MessageKind,
    pub sub_key: Option<String>,
}

impl Identity {
    pub fn new<S: Into<String>>(generation_id: S, kind: MessageKind, sub_key: Option<String>) -> Self {
        Self {
            generation_id: generation_id.into(),
            kind,
            sub_key,
        }
    }
}
