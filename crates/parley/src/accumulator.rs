//! Reduction of streamed fragments into final text and complete tool calls.

use chrono::Utc;
use std::collections::BTreeMap;

use crate::providers::base::{Fragment, ToolCallRequest};

#[derive(Debug, Default)]
struct ToolCallFragment {
    id: String,
    has_backend_id: bool,
    name: String,
    arguments: String,
}

/// The outcome of one streamed model turn
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Accumulated {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Collects text deltas and tool-call deltas (keyed by position index).
///
/// This is a pure reduction: it never drops text, even when tool calls show up
/// in the same turn. What to do with that text is up to the caller.
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    text: String,
    tool_calls: BTreeMap<usize, ToolCallFragment>,
    fragments: usize,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments += 1;
        match fragment {
            Fragment::Text(text) => self.text.push_str(&text),
            Fragment::ToolCall {
                index,
                id,
                name,
                arguments,
            } => {
                let entry = self.tool_calls.entry(index).or_insert_with(|| ToolCallFragment {
                    id: synthesized_id(index),
                    ..Default::default()
                });
                if let Some(id) = id.filter(|id| !id.is_empty()) {
                    if !entry.has_backend_id {
                        entry.id = id;
                        entry.has_backend_id = true;
                    }
                }
                if let Some(name) = name {
                    entry.name.push_str(&name);
                }
                if let Some(arguments) = arguments {
                    entry.arguments.push_str(&arguments);
                }
            }
        }
    }

    /// Number of fragments consumed so far
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Tool calls come out in ascending index order, whatever order their fragments arrived in
    pub fn finish(self) -> Accumulated {
        Accumulated {
            text: self.text,
            tool_calls: self
                .tool_calls
                .into_values()
                .map(|call| ToolCallRequest::new(call.id, call.name, call.arguments))
                .collect(),
        }
    }
}

impl Extend<Fragment> for DeltaAccumulator {
    fn extend<T: IntoIterator<Item = Fragment>>(&mut self, iter: T) {
        for fragment in iter {
            self.push(fragment);
        }
    }
}

fn synthesized_id(index: usize) -> String {
    format!("tool_{}_{}", Utc::now().timestamp_millis(), index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(index: usize, id: Option<&str>, name: Option<&str>, arguments: Option<&str>) -> Fragment {
        Fragment::ToolCall {
            index,
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            arguments: arguments.map(str::to_string),
        }
    }

    fn reduce(fragments: Vec<Fragment>) -> Accumulated {
        let mut accumulator = DeltaAccumulator::new();
        accumulator.extend(fragments);
        accumulator.finish()
    }

    #[test]
    fn test_text_only_concatenates_in_order() {
        let result = reduce(vec![
            Fragment::text("The "),
            Fragment::text("answer "),
            Fragment::text("is 42"),
        ]);
        assert_eq!(result.text, "The answer is 42");
        assert!(result.tool_calls.is_empty());
    }

    #[test]
    fn test_interleaved_indices_keep_per_index_order() {
        let result = reduce(vec![
            tool(0, Some("call_a"), Some("first"), Some("{\"a\":")),
            tool(1, Some("call_b"), Some("second"), Some("{\"b\":")),
            tool(0, None, None, Some("1}")),
            tool(1, None, None, Some("2}")),
        ]);

        assert_eq!(
            result.tool_calls,
            vec![
                ToolCallRequest::new("call_a", "first", "{\"a\":1}"),
                ToolCallRequest::new("call_b", "second", "{\"b\":2}"),
            ]
        );
    }

    #[test]
    fn test_emission_follows_index_not_arrival() {
        let result = reduce(vec![
            tool(2, Some("call_c"), Some("c"), Some("{}")),
            tool(0, Some("call_a"), Some("a"), Some("{}")),
            tool(1, Some("call_b"), Some("b"), Some("{}")),
        ]);
        let names: Vec<_> = result.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_text_and_tool_calls_in_one_turn() {
        let result = reduce(vec![
            Fragment::text("Hel"),
            Fragment::text("lo"),
            tool(0, None, Some("lookup"), Some("{\"q\":")),
            tool(0, None, None, Some("1}")),
        ]);

        assert_eq!(result.text, "Hello");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "lookup");
        assert_eq!(result.tool_calls[0].arguments, "{\"q\":1}");
        assert!(result.tool_calls[0].id.starts_with("tool_"));
        assert!(result.tool_calls[0].id.ends_with("_0"));
    }

    #[test]
    fn test_name_fragments_append() {
        let result = reduce(vec![
            tool(0, Some("call_1"), Some("calculate"), None),
            tool(0, None, Some("_ctr"), Some("{}")),
        ]);
        assert_eq!(result.tool_calls[0].name, "calculate_ctr");
        assert_eq!(result.tool_calls[0].arguments, "{}");
    }

    #[test]
    fn test_late_backend_id_replaces_synthesized_one_once() {
        let result = reduce(vec![
            tool(0, None, Some("lookup"), None),
            tool(0, Some("call_real"), None, Some("{}")),
            tool(0, Some("call_other"), None, None),
        ]);
        assert_eq!(result.tool_calls[0].id, "call_real");
    }

    #[test]
    fn test_counts_fragments() {
        let mut accumulator = DeltaAccumulator::new();
        accumulator.push(Fragment::text("a"));
        accumulator.push(tool(0, None, Some("x"), None));
        assert_eq!(accumulator.fragment_count(), 2);
        assert_eq!(accumulator.finish().tool_calls.len(), 1);
    }
}
