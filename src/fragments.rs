//! Incremental structural differencing over growing JSON argument text.
//!
//! Tool-call arguments stream in as string fragments that only become valid
//! JSON once the generation finishes. The differ accumulates the text per
//! tool-call id and, after each fragment, reports the top-level structure
//! that has newly become unambiguous, without re-emitting anything for
//! unchanged prefixes and without ever failing on a still-growing document.
//!
//! Event granularity: one `JsonValue` event per newly *closed* top-level
//! element, meaning an object member (`root.<key>`) or array element
//! (`root[i]`).
//! An element counts as closed once its value's brackets balance and a `,`
//! or the container's closing delimiter follows. Scalar top-level documents
//! produce only the terminal event. Nested structure is not addressed below
//! the top level. When the whole accumulated text parses as one JSON
//! document, a single terminal `JsonComplete` event fires at path `root`
//! carrying the full text, at most once per tool-call id.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::models::tool::{FragmentUpdate, ToolCallUpdate};

/// Per-tool-call-id fragment state, long-lived by design.
///
/// Unlike the ordering and aggregation stages, whose bookkeeping dies with
/// each pipeline invocation, this store survives across invocations of the
/// same middleware instance until `clear` is called.
#[derive(Debug, Default)]
pub struct FragmentDiffer {
    states: HashMap<String, FragmentState>,
}

#[derive(Debug, Default)]
struct FragmentState {
    buffer: String,
    emitted: HashSet<String>,
    complete: bool,
}

impl FragmentDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all per-id state. Reprocessing previously-seen fragments after a
    /// clear behaves exactly like a first run.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Fold one argument fragment into the per-id buffer and attach the
    /// events newly derivable from the longer text.
    ///
    /// An update with empty or absent arguments is returned unmodified, with
    /// `fragment_updates` left as `None`. Otherwise `fragment_updates` is
    /// always `Some`, possibly empty when nothing new resolved.
    pub fn process(&mut self, mut update: ToolCallUpdate) -> ToolCallUpdate {
        let Some(delta) = update.arguments.as_deref().filter(|s| !s.is_empty()) else {
            return update;
        };

        let state = self.states.entry(update.id.clone()).or_default();
        if state.complete {
            // Contract: no further fragments expected once the document
            // completed; leave stragglers untouched.
            return update;
        }
        state.buffer.push_str(delta);

        let mut events = Vec::new();
        for (path, value) in closed_top_level_elements(&state.buffer) {
            if state.emitted.insert(path.clone()) {
                events.push(FragmentUpdate::value(path, value));
            }
        }
        if serde_json::from_str::<serde_json::Value>(&state.buffer).is_ok() {
            trace!(id = %update.id, "argument document complete");
            events.push(FragmentUpdate::complete(state.buffer.clone()));
            state.complete = true;
        }
        update.fragment_updates = Some(events);
        update
    }
}

/// Scan a possibly-incomplete JSON document and return the top-level elements
/// that are already unambiguously closed, as (path, raw value text) pairs.
fn closed_top_level_elements(text: &str) -> Vec<(String, String)> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut pos = skip_whitespace(&chars, 0);
    match chars.get(pos).map(|&(_, c)| c) {
        Some('{') => scan_container(text, &chars, pos + 1, true),
        Some('[') => scan_container(text, &chars, pos + 1, false),
        _ => Vec::new(),
    }
}

fn scan_container(
    text: &str,
    chars: &[(usize, char)],
    mut pos: usize,
    is_object: bool,
) -> Vec<(String, String)> {
    let close = if is_object { '}' } else { ']' };
    let mut elements = Vec::new();
    let mut index = 0usize;
    loop {
        pos = skip_whitespace(chars, pos);
        match chars.get(pos) {
            None => break,
            Some(&(_, c)) if c == close => break,
            _ => {}
        }

        let path;
        if is_object {
            let Some((key, after_key)) = scan_string(chars, pos) else {
                break;
            };
            pos = skip_whitespace(chars, after_key);
            if chars.get(pos).map(|&(_, c)| c) != Some(':') {
                break;
            }
            pos = skip_whitespace(chars, pos + 1);
            path = format!("root.{key}");
        } else {
            path = format!("root[{index}]");
        }

        let value_start = match chars.get(pos) {
            Some(&(byte, _)) => byte,
            None => break,
        };
        let Some(value_end) = scan_value(chars, pos) else {
            break;
        };
        let after_value = skip_whitespace(chars, value_end);
        let Some(&(_, delimiter)) = chars.get(after_value) else {
            // Value looks balanced but the delimiter has not arrived yet, so
            // it could still grow (e.g. a number gaining digits).
            break;
        };
        if delimiter != ',' && delimiter != close {
            break;
        }

        let value_end_byte = chars
            .get(value_end)
            .map(|&(byte, _)| byte)
            .unwrap_or(text.len());
        elements.push((path, text[value_start..value_end_byte].trim().to_string()));
        index += 1;
        if delimiter == close {
            break;
        }
        pos = after_value + 1;
    }
    elements
}

/// Parse a string token starting at `pos`; returns its unquoted content and
/// the position just past the closing quote.
fn scan_string(chars: &[(usize, char)], pos: usize) -> Option<(String, usize)> {
    if chars.get(pos).map(|&(_, c)| c) != Some('"') {
        return None;
    }
    let mut content = String::new();
    let mut i = pos + 1;
    while let Some(&(_, c)) = chars.get(i) {
        match c {
            '\\' => {
                if let Some(&(_, escaped)) = chars.get(i + 1) {
                    content.push(escaped);
                    i += 2;
                } else {
                    return None;
                }
            }
            '"' => return Some((content, i + 1)),
            _ => {
                content.push(c);
                i += 1;
            }
        }
    }
    None
}

/// Find the end of the value starting at `pos`: the index just past it.
///
/// Strings and containers return `None` while unterminated. Scalars run to
/// the next delimiter or end of input; whether a scalar is actually finished
/// is the caller's call, made by looking for the delimiter that follows.
fn scan_value(chars: &[(usize, char)], pos: usize) -> Option<usize> {
    match chars.get(pos).map(|&(_, c)| c)? {
        '"' => scan_string(chars, pos).map(|(_, end)| end),
        '{' | '[' => {
            let mut depth = 0usize;
            let mut in_string = false;
            let mut i = pos;
            while let Some(&(_, c)) = chars.get(i) {
                if in_string {
                    match c {
                        '\\' => i += 1,
                        '"' => in_string = false,
                        _ => {}
                    }
                } else {
                    match c {
                        '"' => in_string = true,
                        '{' | '[' => depth += 1,
                        '}' | ']' => {
                            depth -= 1;
                            if depth == 0 {
                                return Some(i + 1);
                            }
                        }
                        _ => {}
                    }
                }
                i += 1;
            }
            None
        }
        _ => {
            // Scalar: number, true/false/null, or garbage we let serde judge
            let mut i = pos;
            while let Some(&(_, c)) = chars.get(i) {
                if c == ',' || c == '}' || c == ']' || c.is_whitespace() {
                    break;
                }
                i += 1;
            }
            Some(i)
        }
    }
}

fn skip_whitespace(chars: &[(usize, char)], mut pos: usize) -> usize {
    while chars.get(pos).is_some_and(|&(_, c)| c.is_whitespace()) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::FragmentUpdateKind;

    fn update(id: &str, arguments: &str) -> ToolCallUpdate {
        ToolCallUpdate::new(id).with_arguments(arguments)
    }

    fn events(update: &ToolCallUpdate) -> &[FragmentUpdate] {
        update.fragment_updates.as_deref().expect("events attached")
    }

    #[test]
    fn test_empty_arguments_are_a_no_op() {
        let mut differ = FragmentDiffer::new();
        let output = differ.process(ToolCallUpdate::new("call-1"));
        assert_eq!(output.fragment_updates, None);

        let output = differ.process(update("call-1", ""));
        assert_eq!(output.fragment_updates, None);
    }

    #[test]
    fn test_single_fragment_complete_document() {
        let mut differ = FragmentDiffer::new();
        let text = r#"{"message": "Hello World"}"#;
        let output = differ.process(update("call-1", text));

        let events = events(&output);
        let complete: Vec<_> = events
            .iter()
            .filter(|e| e.kind == FragmentUpdateKind::JsonComplete)
            .collect();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].path, "root");
        assert_eq!(complete[0].value, text);
    }

    #[test]
    fn test_member_event_precedes_completion() {
        let mut differ = FragmentDiffer::new();
        let output = differ.process(update("call-1", r#"{"message": "Hello World"}"#));
        let events = events(&output);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, FragmentUpdateKind::JsonValue);
        assert_eq!(events[0].path, "root.message");
        assert_eq!(events[0].value, r#""Hello World""#);
        assert_eq!(events[1].kind, FragmentUpdateKind::JsonComplete);
    }

    #[test]
    fn test_members_resolve_incrementally() {
        let mut differ = FragmentDiffer::new();

        let output = differ.process(update("call-1", r#"{"city": "Par"#));
        assert_eq!(events(&output), &[] as &[FragmentUpdate]);

        let output = differ.process(update("call-1", r#"is", "#));
        let e = events(&output);
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].path, "root.city");
        assert_eq!(e[0].value, r#""Paris""#);

        let output = differ.process(update("call-1", r#""unit": "celsius"}"#));
        let e = events(&output);
        assert_eq!(e.len(), 2);
        assert_eq!(e[0].path, "root.unit");
        assert_eq!(e[0].value, r#""celsius""#);
        assert_eq!(e[1].kind, FragmentUpdateKind::JsonComplete);
        assert_eq!(e[1].value, r#"{"city": "Paris", "unit": "celsius"}"#);
    }

    #[test]
    fn test_no_re_emission_for_unchanged_prefix() {
        let mut differ = FragmentDiffer::new();
        let first = differ.process(update("call-1", r#"{"a": 1, "#));
        assert_eq!(events(&first).len(), 1);

        let second = differ.process(update("call-1", r#""b": 2, "#));
        let e = events(&second);
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].path, "root.b");
    }

    #[test]
    fn test_array_elements_addressed_by_index() {
        let mut differ = FragmentDiffer::new();
        let output = differ.process(update("call-1", r#"[1, "two", {"three": 3}"#));
        let e = events(&output);
        assert_eq!(e.len(), 2);
        assert_eq!(e[0].path, "root[0]");
        assert_eq!(e[0].value, "1");
        assert_eq!(e[1].path, "root[1]");
        assert_eq!(e[1].value, r#""two""#);

        let output = differ.process(update("call-1", "]"));
        let e = events(&output);
        assert_eq!(e.len(), 2);
        assert_eq!(e[0].path, "root[2]");
        assert_eq!(e[0].value, r#"{"three": 3}"#);
        assert_eq!(e[1].kind, FragmentUpdateKind::JsonComplete);
    }

    #[test]
    fn test_nested_value_closes_as_one_member() {
        let mut differ = FragmentDiffer::new();
        let output = differ.process(update("call-1", r#"{"outer": {"inner": [1, 2]}, "#));
        let e = events(&output);
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].path, "root.outer");
        assert_eq!(e[0].value, r#"{"inner": [1, 2]}"#);
    }

    #[test]
    fn test_scalar_document_only_completes() {
        let mut differ = FragmentDiffer::new();
        let output = differ.process(update("call-1", "42"));
        let e = events(&output);
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].kind, FragmentUpdateKind::JsonComplete);
        assert_eq!(e[0].value, "42");
    }

    #[test]
    fn test_unfinished_number_waits_for_delimiter() {
        let mut differ = FragmentDiffer::new();
        // "12" could still become "123"; no member event until the comma
        let output = differ.process(update("call-1", r#"{"n": 12"#));
        assert_eq!(events(&output), &[] as &[FragmentUpdate]);

        let output = differ.process(update("call-1", "3}"));
        let e = events(&output);
        assert_eq!(e[0].path, "root.n");
        assert_eq!(e[0].value, "123");
        assert_eq!(e[1].kind, FragmentUpdateKind::JsonComplete);
    }

    #[test]
    fn test_complete_fires_at_most_once() {
        let mut differ = FragmentDiffer::new();
        let output = differ.process(update("call-1", "{}"));
        assert_eq!(events(&output).len(), 1);
        assert_eq!(events(&output)[0].kind, FragmentUpdateKind::JsonComplete);

        // Stragglers after completion are returned untouched
        let output = differ.process(update("call-1", "{}"));
        assert_eq!(output.fragment_updates, None);
    }

    #[test]
    fn test_independent_state_per_call_id() {
        let mut differ = FragmentDiffer::new();
        differ.process(update("call-1", r#"{"a":"#));
        let output = differ.process(update("call-2", r#"{"b": 1}"#));
        let e = events(&output);
        assert_eq!(e.last().unwrap().kind, FragmentUpdateKind::JsonComplete);
        assert_eq!(e.last().unwrap().value, r#"{"b": 1}"#);
    }

    #[test]
    fn test_clear_then_reprocess_is_identical() {
        let fragments = [r#"{"city": "Par"#, r#"is", "#, r#""n": 1}"#];
        let run = |differ: &mut FragmentDiffer| -> Vec<ToolCallUpdate> {
            fragments
                .iter()
                .map(|f| differ.process(update("call-1", f)))
                .collect()
        };

        let mut differ = FragmentDiffer::new();
        let first = run(&mut differ);
        differ.clear();
        let second = run(&mut differ);
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_but_growing_json_never_panics() {
        let mut differ = FragmentDiffer::new();
        for fragment in ["{", r#""key"#, "\": ", "tru", "e}"] {
            differ.process(update("call-1", fragment));
        }
    }
}
