use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;

/// Opaque, caller-supplied generation configuration.
///
/// The pipeline forwards this to the inner agent unchanged and never inspects
/// or mutates it; whatever keys the caller and the agent agree on live in the
/// flattened map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An LLM-style generation source.
///
/// Implementations produce a batch of messages per invocation; streaming
/// support is optional and defaults to replaying the one-shot result as a
/// stream. The pipeline stage wraps an inner Agent and is itself exposed as
/// one.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: &GenerateOptions,
    ) -> Result<Vec<Message>>;

    async fn generate_streaming(
        &self,
        messages: Vec<Message>,
        options: &GenerateOptions,
    ) -> Result<BoxStream<'_, Result<Message>>> {
        let response = self.generate(messages, options).await?;
        Ok(Box::pin(futures::stream::iter(response.into_iter().map(Ok))))
    }
}

/// An agent that replays scripted responses, for tests.
///
/// Pops one scripted batch per invocation and records the messages it was
/// invoked with, so callers can assert on what a wrapping stage delivered.
pub struct ScriptedAgent {
    responses: Arc<Mutex<VecDeque<Vec<Message>>>>,
    requests: Arc<Mutex<Vec<(Vec<Message>, GenerateOptions)>>>,
}

impl ScriptedAgent {
    pub fn new(responses: Vec<Vec<Message>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The message batches this agent has been invoked with, oldest first
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(messages, _)| messages.clone())
            .collect()
    }

    /// The options each invocation carried, oldest first
    pub fn seen_options(&self) -> Vec<GenerateOptions> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, options)| options.clone())
            .collect()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: &GenerateOptions,
    ) -> Result<Vec<Message>> {
        self.requests.lock().unwrap().push((messages, options.clone()));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_scripted_agent_pops_in_order() -> Result<()> {
        let agent = ScriptedAgent::new(vec![
            vec![Message::text("first")],
            vec![Message::text("second")],
        ]);
        let options = GenerateOptions::default();

        let first = agent.generate(vec![Message::text("hi")], &options).await?;
        assert_eq!(first[0].as_text(), Some("first"));
        let second = agent.generate(vec![], &options).await?;
        assert_eq!(second[0].as_text(), Some("second"));
        let exhausted = agent.generate(vec![], &options).await?;
        assert!(exhausted.is_empty());

        assert_eq!(agent.requests().len(), 3);
        assert_eq!(agent.requests()[0][0].as_text(), Some("hi"));
        Ok(())
    }

    #[test]
    fn test_exhausted_agent_returns_empty() {
        let agent = ScriptedAgent::new(vec![]);
        let output =
            tokio_test::block_on(agent.generate(vec![], &GenerateOptions::default())).unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_default_streaming_replays_one_shot() -> Result<()> {
        let agent = ScriptedAgent::new(vec![vec![
            Message::text("a"),
            Message::text("b"),
        ]]);
        let stream = agent
            .generate_streaming(vec![], &GenerateOptions::default())
            .await?;
        let messages: Vec<Message> = stream.try_collect().await?;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].as_text(), Some("b"));
        Ok(())
    }
}
