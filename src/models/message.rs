use serde::{Deserialize, Serialize};

use super::identity::MessageKind;
use super::tool::{ToolCall, ToolCallResult, ToolCallUpdate, ToolsCallAggregate, Usage};

/// The payload of a message, one variant per message kind.
///
/// Singular and plural tool-call variants coexist on purpose: agents emit the
/// plural forms, the ordering stage decomposes them into singular instances,
/// and the aggregate stage folds singular runs back into plural forms.
/// Composite and ToolsCallAggregate only exist on the aggregated side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text { text: String },
    TextUpdate { text: String },
    Reasoning { text: String },
    ReasoningUpdate { text: String },
    ToolCall(ToolCall),
    ToolCallUpdate(ToolCallUpdate),
    ToolCallResult(ToolCallResult),
    ToolsCall { calls: Vec<ToolCall> },
    ToolsCallUpdate { updates: Vec<ToolCallUpdate> },
    ToolsCallResult { results: Vec<ToolCallResult> },
    Usage(Usage),
    Composite { messages: Vec<Message> },
    ToolsCallAggregate(ToolsCallAggregate),
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageContent::Text { .. } => MessageKind::Text,
            MessageContent::TextUpdate { .. } => MessageKind::TextUpdate,
            MessageContent::Reasoning { .. } => MessageKind::Reasoning,
            MessageContent::ReasoningUpdate { .. } => MessageKind::ReasoningUpdate,
            MessageContent::ToolCall(_) => MessageKind::ToolCall,
            MessageContent::ToolCallUpdate(_) => MessageKind::ToolCallUpdate,
            MessageContent::ToolCallResult(_) => MessageKind::ToolCallResult,
            MessageContent::ToolsCall { .. } => MessageKind::ToolsCall,
            MessageContent::ToolsCallUpdate { .. } => MessageKind::ToolsCallUpdate,
            MessageContent::ToolsCallResult { .. } => MessageKind::ToolsCallResult,
            MessageContent::Usage(_) => MessageKind::Usage,
            MessageContent::Composite { .. } => MessageKind::Composite,
            MessageContent::ToolsCallAggregate(_) => MessageKind::ToolsCallAggregate,
        }
    }
}

/// A message flowing through the pipeline.
///
/// The envelope fields are ordering coordinates: `generation_id` groups the
/// messages of one generation turn (absent means ungrouped, passed through
/// untouched), `order_index` is the position of the logical message within its
/// generation, and `chunk_index` is the position of one fragment within its
/// logical message. Only the ordering stage writes the two indices, and
/// `chunk_index` only ever appears on update kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,
    pub content: MessageContent,
}

impl Message {
    pub fn new(content: MessageContent) -> Self {
        Message {
            generation_id: None,
            order_index: None,
            chunk_index: None,
            content,
        }
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        Message::new(MessageContent::Text { text: text.into() })
    }

    pub fn text_update<S: Into<String>>(text: S) -> Self {
        Message::new(MessageContent::TextUpdate { text: text.into() })
    }

    pub fn reasoning<S: Into<String>>(text: S) -> Self {
        Message::new(MessageContent::Reasoning { text: text.into() })
    }

    pub fn reasoning_update<S: Into<String>>(text: S) -> Self {
        Message::new(MessageContent::ReasoningUpdate { text: text.into() })
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Message::new(MessageContent::ToolCall(call))
    }

    pub fn tool_call_update(update: ToolCallUpdate) -> Self {
        Message::new(MessageContent::ToolCallUpdate(update))
    }

    pub fn tool_call_result(result: ToolCallResult) -> Self {
        Message::new(MessageContent::ToolCallResult(result))
    }

    pub fn tools_call(calls: Vec<ToolCall>) -> Self {
        Message::new(MessageContent::ToolsCall { calls })
    }

    pub fn tools_call_update(updates: Vec<ToolCallUpdate>) -> Self {
        Message::new(MessageContent::ToolsCallUpdate { updates })
    }

    pub fn tools_call_result(results: Vec<ToolCallResult>) -> Self {
        Message::new(MessageContent::ToolsCallResult { results })
    }

    pub fn usage(usage: Usage) -> Self {
        Message::new(MessageContent::Usage(usage))
    }

    pub fn composite(messages: Vec<Message>) -> Self {
        Message::new(MessageContent::Composite { messages })
    }

    pub fn tools_call_aggregate(calls: Vec<ToolCall>, results: Vec<ToolCallResult>) -> Self {
        Message::new(MessageContent::ToolsCallAggregate(ToolsCallAggregate {
            calls,
            results,
        }))
    }

    /// Tag the message with the generation it belongs to
    pub fn with_generation_id<S: Into<String>>(mut self, id: S) -> Self {
        self.generation_id = Some(id.into());
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }

    /// Get the text if this is a Text or TextUpdate message
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { text } | MessageContent::TextUpdate { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match &self.content {
            MessageContent::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_call_update(&self) -> Option<&ToolCallUpdate> {
        match &self.content {
            MessageContent::ToolCallUpdate(update) => Some(update),
            _ => None,
        }
    }

    pub fn as_tool_call_result(&self) -> Option<&ToolCallResult> {
        match &self.content {
            MessageContent::ToolCallResult(result) => Some(result),
            _ => None,
        }
    }
}
