use std::collections::HashMap;

use anyhow::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use tracing::debug;

use crate::errors::{PipelineError, PipelineResult};
use crate::models::identity::Identity;
use crate::models::message::{Message, MessageContent};

/// Stamps ordering coordinates onto a raw agent output stream.
///
/// Compound (plural) tool-call messages are decomposed into singular instances
/// first; every resulting message with a generation id then receives an order
/// index, and update fragments additionally receive a chunk index. Each
/// generation id gets its own counter and its own "currently open fragment"
/// slot, so interleaved generations never disturb each other.
///
/// One assigner instance covers one pipeline invocation; its bookkeeping is
/// discarded when the invocation's stream ends.
#[derive(Debug, Default)]
pub struct OrderingAssigner {
    generations: HashMap<String, GenerationState>,
}

#[derive(Debug, Default)]
struct GenerationState {
    next_order: u64,
    open: Option<OpenFragment>,
}

#[derive(Debug)]
struct OpenFragment {
    identity: Identity,
    order_index: u64,
    next_chunk: u64,
}

impl OrderingAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decompose and stamp one incoming message, in stream order.
    ///
    /// Returns the singular, ordered messages derived from it: one for most
    /// kinds, N for a plural message carrying N entries. Composite and
    /// ToolsCallAggregate inputs are a contract violation and fail fast.
    pub fn assign(&mut self, message: Message) -> PipelineResult<Vec<Message>> {
        match message.content {
            MessageContent::Composite { .. } | MessageContent::ToolsCallAggregate(_) => {
                return Err(PipelineError::DisallowedKind(message.content.kind()));
            }
            _ => {}
        }

        // Ungrouped messages pass through untouched, compound or not.
        if message.generation_id.is_none() {
            return Ok(vec![message]);
        }

        Ok(decompose(message)
            .into_iter()
            .map(|part| self.stamp(part))
            .collect())
    }

    /// Convenience for already-collected sequences.
    pub fn assign_all(&mut self, messages: Vec<Message>) -> PipelineResult<Vec<Message>> {
        let mut output = Vec::with_capacity(messages.len());
        for message in messages {
            output.extend(self.assign(message)?);
        }
        Ok(output)
    }

    /// Wrap an open-ended message stream, consuming this assigner.
    ///
    /// Emission order follows input order, so the Nth output's coordinates are
    /// fully determined by the first N inputs. Dropping the returned stream
    /// stops pulling upstream and abandons the in-flight bookkeeping.
    pub fn assign_stream(mut self, input: BoxStream<'_, Result<Message>>) -> BoxStream<'_, Result<Message>> {
        Box::pin(try_stream! {
            let mut input = input;
            while let Some(message) = input.try_next().await? {
                for assigned in self.assign(message)? {
                    yield assigned;
                }
            }
        })
    }

    fn stamp(&mut self, mut message: Message) -> Message {
        let Some(generation_id) = message.generation_id.clone() else {
            return message;
        };
        let state = self.generations.entry(generation_id.clone()).or_default();

        if !message.kind().is_update() {
            // Complete messages always open (and immediately finish) a new
            // logical message, and invalidate any open fragment run.
            message.order_index = Some(state.next_order);
            state.next_order += 1;
            state.open = None;
            return message;
        }

        let identity = identity_of(&generation_id, &message.content);
        match state.open.as_mut() {
            Some(open) if open.identity == identity => {
                message.order_index = Some(open.order_index);
                message.chunk_index = Some(open.next_chunk);
                open.next_chunk += 1;
            }
            _ => {
                let order_index = state.next_order;
                state.next_order += 1;
                debug!(generation = %generation_id, order = order_index, "opening new logical message");
                message.order_index = Some(order_index);
                message.chunk_index = Some(0);
                state.open = Some(OpenFragment {
                    identity,
                    order_index,
                    next_chunk: 1,
                });
            }
        }
        message
    }
}

/// Split plural tool-call variants into singular per-entry messages carrying
/// the parent's generation id. Everything else is already singular.
fn decompose(message: Message) -> Vec<Message> {
    fn singular(generation_id: &Option<String>, content: MessageContent) -> Message {
        Message {
            generation_id: generation_id.clone(),
            order_index: None,
            chunk_index: None,
            content,
        }
    }

    let Message {
        generation_id,
        content,
        ..
    } = message;
    match content {
        MessageContent::ToolsCall { calls } => calls
            .into_iter()
            .map(|call| singular(&generation_id, MessageContent::ToolCall(call)))
            .collect(),
        MessageContent::ToolsCallResult { results } => results
            .into_iter()
            .map(|result| singular(&generation_id, MessageContent::ToolCallResult(result)))
            .collect(),
        MessageContent::ToolsCallUpdate { updates } => updates
            .into_iter()
            .map(|update| singular(&generation_id, MessageContent::ToolCallUpdate(update)))
            .collect(),
        content => vec![singular(&generation_id, content)],
    }
}

fn identity_of(generation_id: &str, content: &MessageContent) -> Identity {
    let sub_key = match content {
        MessageContent::ToolCallUpdate(update) => Some(update.id.clone()),
        _ => None,
    };
    Identity::new(generation_id, content.kind(), sub_key)
}
