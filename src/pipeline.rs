use std::sync::Mutex;

use anyhow::Result;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use tracing::debug;

use crate::agent::{Agent, GenerateOptions};
use crate::aggregate::aggregate;
use crate::fragments::FragmentDiffer;
use crate::models::message::{Message, MessageContent};
use crate::ordering::OrderingAssigner;

/// The middleware stage translating between flat and aggregated message shapes.
///
/// Caller input is aggregated (generation runs folded into composite or
/// paired call/result forms) before reaching the inner agent; the inner
/// agent's output is decomposed and stamped with ordering coordinates, and
/// tool-call update fragments get structural JSON events attached on the way
/// out.
///
/// Ordering and aggregation bookkeeping is private to each invocation. The
/// fragment differ is the one deliberately shared piece of state: it lives
/// for the lifetime of the pipeline instance, serialized behind a mutex, and
/// is only reset by `clear_fragments`.
pub struct MessagePipeline<A> {
    inner: A,
    differ: Mutex<FragmentDiffer>,
}

impl<A: Agent> MessagePipeline<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            differ: Mutex::new(FragmentDiffer::new()),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Reset all accumulated tool-call argument state.
    pub fn clear_fragments(&self) {
        self.differ.lock().unwrap().clear();
    }

    fn attach_fragment_updates(&self, mut message: Message) -> Message {
        message.content = match message.content {
            MessageContent::ToolCallUpdate(update) => {
                MessageContent::ToolCallUpdate(self.differ.lock().unwrap().process(update))
            }
            content => content,
        };
        message
    }
}

#[async_trait]
impl<A: Agent> Agent for MessagePipeline<A> {
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: &GenerateOptions,
    ) -> Result<Vec<Message>> {
        let aggregated = aggregate(messages);
        debug!(batches = aggregated.len(), "invoking inner agent");
        let response = self.inner.generate(aggregated, options).await?;

        let mut assigner = OrderingAssigner::new();
        let mut output = Vec::with_capacity(response.len());
        for message in response {
            for assigned in assigner.assign(message)? {
                output.push(self.attach_fragment_updates(assigned));
            }
        }
        Ok(output)
    }

    async fn generate_streaming(
        &self,
        messages: Vec<Message>,
        options: &GenerateOptions,
    ) -> Result<BoxStream<'_, Result<Message>>> {
        let aggregated = aggregate(messages);
        let mut inner = self.inner.generate_streaming(aggregated, options).await?;

        Ok(Box::pin(try_stream! {
            let mut assigner = OrderingAssigner::new();
            while let Some(message) = inner.try_next().await? {
                for assigned in assigner.assign(message)? {
                    yield self.attach_fragment_updates(assigned);
                }
            }
        }))
    }
}
