use tracing::trace;

use crate::models::message::{Message, MessageContent};

/// Fold a flat, already-ordered message sequence into the aggregated shape an
/// inner agent expects.
///
/// Messages without a generation id pass through one by one. The rest are
/// partitioned into maximal runs of equal generation id over the existing
/// order (no reordering), and each run folds into a single structural unit:
/// a ToolsCall for a pure call run, a ToolsCallResult for a pure result run,
/// a ToolsCallAggregate when a call run is immediately and exclusively
/// followed by a result run, and a Composite for anything heterogeneous.
///
/// Stateless across calls; each invocation owns its own scratch buffers.
pub fn aggregate(messages: Vec<Message>) -> Vec<Message> {
    let mut output = Vec::with_capacity(messages.len());
    let mut iter = messages.into_iter().peekable();
    while let Some(message) = iter.next() {
        let Some(generation_id) = message.generation_id.clone() else {
            output.push(message);
            continue;
        };
        let mut run = vec![message];
        while iter
            .peek()
            .is_some_and(|next| next.generation_id.as_deref() == Some(generation_id.as_str()))
        {
            run.push(iter.next().expect("peeked"));
        }
        trace!(generation = %generation_id, len = run.len(), "folding generation run");
        output.push(fold_run(generation_id, run));
    }
    output
}

fn is_call(message: &Message) -> bool {
    matches!(message.content, MessageContent::ToolCall(_))
}

fn is_result(message: &Message) -> bool {
    matches!(message.content, MessageContent::ToolCallResult(_))
}

fn fold_run(generation_id: String, run: Vec<Message>) -> Message {
    // Pure call/result runs fold even when the run has a single element, so
    // the inner agent always sees the plural form.
    if run.iter().all(is_call) {
        return fold_calls(&generation_id, run);
    }
    if run.iter().all(is_result) {
        return fold_results(&generation_id, run);
    }

    // A call run followed by exactly its result run pairs into an aggregate.
    let boundary = run.iter().position(|m| !is_call(m)).unwrap_or(run.len());
    if boundary > 0 && run[boundary..].iter().all(is_result) {
        let mut calls = run;
        let results = calls.split_off(boundary);
        return Message::tools_call_aggregate(
            calls
                .into_iter()
                .filter_map(|m| match m.content {
                    MessageContent::ToolCall(call) => Some(call),
                    _ => None,
                })
                .collect(),
            results
                .into_iter()
                .filter_map(|m| match m.content {
                    MessageContent::ToolCallResult(result) => Some(result),
                    _ => None,
                })
                .collect(),
        )
        .with_generation_id(generation_id);
    }

    if run.len() == 1 {
        return run.into_iter().next().expect("length checked");
    }

    // Heterogeneous: wrap in a Composite, folding contiguous call/result
    // sub-runs first so the bundle never carries bare singular tool calls.
    Message::composite(fold_sub_runs(&generation_id, run)).with_generation_id(generation_id)
}

fn fold_calls(generation_id: &str, run: Vec<Message>) -> Message {
    Message::tools_call(
        run.into_iter()
            .filter_map(|m| match m.content {
                MessageContent::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect(),
    )
    .with_generation_id(generation_id)
}

fn fold_results(generation_id: &str, run: Vec<Message>) -> Message {
    Message::tools_call_result(
        run.into_iter()
            .filter_map(|m| match m.content {
                MessageContent::ToolCallResult(result) => Some(result),
                _ => None,
            })
            .collect(),
    )
    .with_generation_id(generation_id)
}

fn fold_sub_runs(generation_id: &str, run: Vec<Message>) -> Vec<Message> {
    let mut folded = Vec::with_capacity(run.len());
    let mut iter = run.into_iter().peekable();
    while let Some(message) = iter.next() {
        if is_call(&message) {
            let mut calls = vec![message];
            while iter.peek().is_some_and(is_call) {
                calls.push(iter.next().expect("peeked"));
            }
            folded.push(fold_calls(generation_id, calls));
        } else if is_result(&message) {
            let mut results = vec![message];
            while iter.peek().is_some_and(is_result) {
                results.push(iter.next().expect("peeked"));
            }
            folded.push(fold_results(generation_id, results));
        } else {
            folded.push(message);
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::MessageKind;
    use crate::models::tool::{ToolCall, ToolCallResult, Usage};

    fn call(id: &str) -> Message {
        Message::tool_call(ToolCall::new(id, "echo", "{}", 0)).with_generation_id("gen1")
    }

    fn result(id: &str) -> Message {
        Message::tool_call_result(ToolCallResult::new(id, "ok")).with_generation_id("gen1")
    }

    #[test]
    fn test_untagged_messages_pass_through_individually() {
        let output = aggregate(vec![Message::text("a"), Message::text("b")]);
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].kind(), MessageKind::Text);
        assert_eq!(output[1].kind(), MessageKind::Text);
    }

    #[test]
    fn test_single_message_run_unchanged() {
        let message = Message::text("alone").with_generation_id("gen1");
        let output = aggregate(vec![message.clone()]);
        assert_eq!(output, vec![message]);
    }

    #[test]
    fn test_single_tool_call_still_folds_to_plural() {
        let output = aggregate(vec![call("call-1")]);
        assert_eq!(output.len(), 1);
        match &output[0].content {
            MessageContent::ToolsCall { calls } => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call-1");
            }
            other => panic!("expected ToolsCall, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_call_run_folds_preserving_order() {
        let output = aggregate(vec![call("call-1"), call("call-2"), call("call-3")]);
        assert_eq!(output.len(), 1);
        match &output[0].content {
            MessageContent::ToolsCall { calls } => {
                let ids: Vec<&str> = calls.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, vec!["call-1", "call-2", "call-3"]);
            }
            other => panic!("expected ToolsCall, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_result_run_folds() {
        let output = aggregate(vec![result("call-1"), result("call-2")]);
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].kind(), MessageKind::ToolsCallResult);
    }

    #[test]
    fn test_calls_then_results_pair_into_aggregate() {
        let output = aggregate(vec![
            call("call-1"),
            call("call-2"),
            result("call-1"),
            result("call-2"),
        ]);
        assert_eq!(output.len(), 1);
        match &output[0].content {
            MessageContent::ToolsCallAggregate(aggregate) => {
                assert_eq!(aggregate.calls.len(), 2);
                assert_eq!(aggregate.results.len(), 2);
                assert_eq!(aggregate.calls[0].id, "call-1");
                assert_eq!(aggregate.results[1].id, "call-2");
            }
            other => panic!("expected ToolsCallAggregate, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_heterogeneous_run_wraps_in_composite() {
        let output = aggregate(vec![
            Message::text("thinking...").with_generation_id("gen1"),
            call("call-1"),
            call("call-2"),
            result("call-1"),
            result("call-2"),
            Message::usage(Usage::default()).with_generation_id("gen1"),
        ]);
        assert_eq!(output.len(), 1);
        match &output[0].content {
            MessageContent::Composite { messages } => {
                assert_eq!(messages.len(), 4);
                assert_eq!(messages[0].kind(), MessageKind::Text);
                assert_eq!(messages[1].kind(), MessageKind::ToolsCall);
                assert_eq!(messages[2].kind(), MessageKind::ToolsCallResult);
                assert_eq!(messages[3].kind(), MessageKind::Usage);
            }
            other => panic!("expected Composite, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_two_generations_fold_separately() {
        let output = aggregate(vec![
            call("call-1"),
            Message::tool_call(ToolCall::new("call-9", "echo", "{}", 0)).with_generation_id("gen2"),
        ]);
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].generation_id.as_deref(), Some("gen1"));
        assert_eq!(output[0].kind(), MessageKind::ToolsCall);
        assert_eq!(output[1].generation_id.as_deref(), Some("gen2"));
        assert_eq!(output[1].kind(), MessageKind::ToolsCall);
    }

    #[test]
    fn test_untagged_message_splits_runs() {
        // The untagged message breaks gen1 into two runs, so no pairing
        // happens across it.
        let output = aggregate(vec![call("call-1"), Message::text("aside"), result("call-1")]);
        assert_eq!(output.len(), 3);
        assert_eq!(output[0].kind(), MessageKind::ToolsCall);
        assert_eq!(output[1].kind(), MessageKind::Text);
        assert_eq!(output[2].kind(), MessageKind::ToolsCallResult);
    }

    #[test]
    fn test_results_before_calls_do_not_pair() {
        let output = aggregate(vec![result("call-1"), call("call-1")]);
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].kind(), MessageKind::Composite);
    }
}
