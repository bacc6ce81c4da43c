use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::identity::MessageKind;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum PipelineError {
    /// An already-reconstructed message (Composite, ToolsCallAggregate) was
    /// fed back into the ordering stage, which only accepts raw agent output.
    #[error("Message kind cannot appear in raw agent output: {0}")]
    DisallowedKind(MessageKind),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
