use serde::{Deserialize, Serialize};

/// A complete tool call as emitted by a model.
///
/// `arguments` holds the raw argument text; while a generation is still
/// streaming it may be a prefix of a JSON document rather than valid JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Stable identifier pairing this call with its result
    pub id: String,
    /// The resolved function name
    pub name: String,
    /// Raw argument text, possibly partial JSON
    pub arguments: String,
    /// Position among sibling tool calls
    pub index: usize,
}

impl ToolCall {
    pub fn new<I, N, A>(id: I, name: N, arguments: A, index: usize) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
            index,
        }
    }
}

/// A partial tool-call fragment arriving mid-generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallUpdate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The newly arrived slice of argument text, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Structural events attached by the fragment differ. `None` means the
    /// differ never touched this update, which is distinct from
    /// `Some(vec![])` (touched, nothing newly derivable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_updates: Option<Vec<FragmentUpdate>>,
}

impl ToolCallUpdate {
    pub fn new<I: Into<String>>(id: I) -> Self {
        Self {
            id: id.into(),
            name: None,
            arguments: None,
            index: None,
            fragment_updates: None,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments<S: Into<String>>(mut self, arguments: S) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// The result of executing one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Identifier of the call this result answers
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub result: String,
}

impl ToolCallResult {
    pub fn new<I: Into<String>, R: Into<String>>(id: I, result: R) -> Self {
        Self {
            id: id.into(),
            name: None,
            result: result.into(),
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A folded tool-call batch paired 1:1 with its folded result batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsCallAggregate {
    pub calls: Vec<ToolCall>,
    pub results: Vec<ToolCallResult>,
}

/// Token accounting reported by a provider at the end of a generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(input_tokens: Option<i32>, output_tokens: Option<i32>, total_tokens: Option<i32>) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// What a fragment-update event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentUpdateKind {
    /// A value at `path` became unambiguously determinable
    JsonValue,
    /// The whole accumulated text is now one valid JSON document
    JsonComplete,
}

/// A path-addressed description of newly-resolved structure within a growing,
/// possibly-incomplete JSON document. Paths are root-relative: `root` for the
/// whole document, `root.key` for object members, `root[3]` for array elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentUpdate {
    pub kind: FragmentUpdateKind,
    pub path: String,
    pub value: String,
}

impl FragmentUpdate {
    pub fn value<P: Into<String>, V: Into<String>>(path: P, value: V) -> Self {
        Self {
            kind: FragmentUpdateKind::JsonValue,
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn complete<V: Into<String>>(value: V) -> Self {
        Self {
            kind: FragmentUpdateKind::JsonComplete,
            path: "root".to_string(),
            value: value.into(),
        }
    }
}
