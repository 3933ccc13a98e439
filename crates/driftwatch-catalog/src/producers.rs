//! Structured tool fragments, one extractor per producer family.
//!
//! Each extractor knows its family's field conventions and nothing else.
//! [`structured_extractor`] is the lookup table.

use driftwatch_kernel::ProducerFamily;
use serde_json::{Map, Value};

use crate::fragment::{ToolFragment, first_str, first_truthy, lower_str};
use crate::normalize::Direction;

pub type StructuredExtractor = fn(&Map<String, Value>) -> Vec<ToolFragment>;

pub fn structured_extractor(family: ProducerFamily) -> StructuredExtractor {
    match family {
        ProducerFamily::Codex => codex_fragments,
        ProducerFamily::Claude => claude_fragments,
        ProducerFamily::Copilot => copilot_fragments,
        ProducerFamily::Droid => droid_fragments,
        ProducerFamily::Gemini => gemini_fragments,
        ProducerFamily::Opencode => opencode_fragments,
    }
}

fn as_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

/// Codex: `type=tool_call|function_call` and the result variants, either
/// at top level or wrapped in a `response_item` payload.
pub fn codex_fragments(obj: &Map<String, Value>) -> Vec<ToolFragment> {
    let mut fragments = Vec::new();
    let payload = as_object(obj.get("payload"));
    let working = payload.unwrap_or(obj);
    let event_type = first_str(working, &["type", "event"])
        .or_else(|| obj.get("type").and_then(Value::as_str))
        .unwrap_or_default()
        .to_lowercase();
    let wrapped = obj.get("type").and_then(Value::as_str) == Some("response_item") && payload.is_some();
    let field_path = if payload.is_some_and(|p| !p.is_empty()) {
        "payload.type"
    } else {
        "type"
    };
    let tool_name = first_str(working, &["name", "tool"]).or_else(|| {
        as_object(working.get("function")).and_then(|function| first_str(function, &["name"]))
    });

    match event_type.as_str() {
        "tool_call" | "function_call" => {
            let shape = match (event_type.as_str(), wrapped) {
                ("function_call", _) => "jsonl:type=function_call",
                (_, true) => "jsonl:response_item:payload.type=tool_call",
                _ => "jsonl:type=tool_call",
            };
            let input = first_truthy(working, &["arguments", "input", "parameters"]);
            fragments.push(ToolFragment::input(tool_name, input, shape, working, field_path));
        }
        "tool_result" | "function_result" => {
            let shape = match (event_type.as_str(), wrapped) {
                ("function_result", _) => "jsonl:type=function_result",
                (_, true) => "jsonl:response_item:payload.type=tool_result",
                _ => "jsonl:type=tool_result",
            };
            let output = if working.contains_key("result") {
                working.get("result")
            } else {
                first_truthy(working, &["output", "stdout", "stderr"])
            };
            fragments.push(ToolFragment::output(tool_name, output, shape, working, field_path));
        }
        _ => {}
    }
    fragments
}

/// `message.content[]` blocks typed `tool_use`/`tool_call`/`tool_result`.
fn content_block_fragments(obj: &Map<String, Value>, fragments: &mut Vec<ToolFragment>) {
    let Some(Value::Array(content)) = as_object(obj.get("message")).and_then(|m| m.get("content"))
    else {
        return;
    };
    for item in content.iter().filter_map(Value::as_object) {
        match lower_str(item, "type").as_str() {
            "tool_use" | "tool_call" => fragments.push(ToolFragment::input(
                first_str(item, &["name", "tool"]),
                item.get("input"),
                "jsonl:message.content[].type=tool_use",
                item,
                "message.content[]",
            )),
            "tool_result" => fragments.push(ToolFragment::output(
                None,
                item.get("content"),
                "jsonl:message.content[].type=tool_result",
                item,
                "message.content[]",
            )),
            _ => {}
        }
    }
}

/// Claude: content blocks plus the top-level `toolUseResult` object.
pub fn claude_fragments(obj: &Map<String, Value>) -> Vec<ToolFragment> {
    let mut fragments = Vec::new();
    content_block_fragments(obj, &mut fragments);
    if let Some(result) = as_object(obj.get("toolUseResult")) {
        fragments.push(ToolFragment::output(
            None,
            obj.get("toolUseResult"),
            "jsonl:toolUseResult",
            result,
            "toolUseResult",
        ));
    }
    fragments
}

/// Copilot: `assistant.message` tool requests and `tool.execution_complete`.
pub fn copilot_fragments(obj: &Map<String, Value>) -> Vec<ToolFragment> {
    let mut fragments = Vec::new();
    let Some(data) = as_object(obj.get("data")) else {
        return fragments;
    };
    match obj.get("type").and_then(Value::as_str) {
        Some("assistant.message") => {
            if let Some(Value::Array(requests)) = data.get("toolRequests") {
                for request in requests.iter().filter_map(Value::as_object) {
                    fragments.push(ToolFragment::input(
                        request.get("name").and_then(Value::as_str),
                        request.get("arguments"),
                        "jsonl:data.toolRequests[]",
                        request,
                        "data.toolRequests[]",
                    ));
                }
            }
        }
        Some("tool.execution_complete") => fragments.push(ToolFragment::output(
            first_str(data, &["toolName", "name"]),
            first_truthy(data, &["result", "output"]),
            "jsonl:type=tool.execution_complete",
            data,
            "data",
        )),
        _ => {}
    }
    fragments
}

/// Droid: flat `tool_call`/`tool_result` events plus content blocks.
pub fn droid_fragments(obj: &Map<String, Value>) -> Vec<ToolFragment> {
    let mut fragments = Vec::new();
    let tool_name = first_str(obj, &["toolName", "tool"]);
    match lower_str(obj, "type").as_str() {
        "tool_call" => fragments.push(ToolFragment::input(
            tool_name,
            first_truthy(obj, &["parameters", "input"]),
            "jsonl:type=tool_call",
            obj,
            "type",
        )),
        "tool_result" => fragments.push(ToolFragment::output(
            tool_name,
            first_truthy(obj, &["value", "result", "output"]),
            "jsonl:type=tool_result",
            obj,
            "type",
        )),
        _ => {}
    }
    content_block_fragments(obj, &mut fragments);
    fragments
}

/// OpenCode part files typed `tool`: `state.input` and `state.output`.
/// Errors are folded into the output as `{output, error}`.
pub fn opencode_fragments(obj: &Map<String, Value>) -> Vec<ToolFragment> {
    let mut fragments = Vec::new();
    if lower_str(obj, "type") != "tool" {
        return fragments;
    }
    const SHAPE: &str = "json:part.type=tool";
    let tool_name = obj.get("tool").and_then(Value::as_str);
    let empty = Map::new();
    let state = as_object(obj.get("state")).unwrap_or(&empty);

    fragments.push(ToolFragment::input(
        tool_name,
        state.get("input"),
        SHAPE,
        obj,
        "state.input",
    ));

    let mut output = first_truthy(state, &["output", "stdout"]).cloned();
    if let Some(error) = first_truthy(state, &["error", "stderr"]) {
        let mut wrapped = Map::new();
        wrapped.insert("output".to_string(), output.unwrap_or(Value::Null));
        wrapped.insert("error".to_string(), error.clone());
        output = Some(Value::Object(wrapped));
    }
    if let Some(output) = output {
        fragments.push(ToolFragment::new(
            Direction::Output,
            tool_name,
            Some(output),
            SHAPE,
            obj,
            "state.output",
        ));
    }
    fragments
}

/// Output of one Gemini `toolCalls[]` entry: `output`, `resultDisplay`, or
/// the first usable item of `result[]`.
pub fn gemini_tool_output(call: &Map<String, Value>) -> Option<&Value> {
    for key in ["output", "resultDisplay"] {
        if let Some(value) = call.get(key).filter(|v| !v.is_null()) {
            return Some(value);
        }
    }
    let Some(Value::Array(results)) = call.get("result") else {
        return None;
    };
    for item in results.iter().filter_map(Value::as_object) {
        if let Some(response) = as_object(item.get("functionResponse"))
            .and_then(|function| as_object(function.get("response")))
            && let Some(value) = ["output", "stdout", "text", "content"]
                .iter()
                .find_map(|key| response.get(*key))
        {
            return Some(value);
        }
        if let Some(value) = item.get("output").or_else(|| item.get("stdout")) {
            return Some(value);
        }
    }
    None
}

/// Gemini session items: typed tool events and `toolCalls[]` arrays.
pub fn gemini_fragments(obj: &Map<String, Value>) -> Vec<ToolFragment> {
    let mut fragments = Vec::new();
    let kind = first_str(obj, &["type", "role"]).unwrap_or_default().to_lowercase();
    match kind.as_str() {
        "tool_use" | "tool_call" => fragments.push(ToolFragment::input(
            first_str(obj, &["name", "tool"]),
            obj.get("input"),
            "json:type=tool_call",
            obj,
            "type",
        )),
        "tool_result" | "tool" => fragments.push(ToolFragment::output(
            None,
            obj.get("output"),
            "json:type=tool_result",
            obj,
            "type",
        )),
        _ => {}
    }

    if let Some(Value::Array(calls)) = first_truthy(obj, &["toolCalls", "tool_calls"]) {
        let shape = if obj.contains_key("toolCalls") {
            "json:toolCalls[]"
        } else {
            "json:tool_calls[]"
        };
        for call in calls.iter().filter_map(Value::as_object) {
            let tool_name = first_str(call, &["displayName", "name", "tool"]);
            fragments.push(ToolFragment::input(
                tool_name,
                first_truthy(call, &["args", "input"]),
                shape,
                call,
                "toolCalls[]",
            ));
            if let Some(output) = gemini_tool_output(call) {
                fragments.push(ToolFragment::output(
                    tool_name,
                    Some(output),
                    shape,
                    call,
                    "toolCalls[]",
                ));
            }
        }
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(obj) => obj,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn codex_wrapped_and_function_shapes() {
        let wrapped = object(json!({
            "type": "response_item",
            "payload": {"type": "tool_call", "name": "shell", "arguments": "{\"command\":[\"ls\"]}"}
        }));
        let fragments = codex_fragments(&wrapped);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].shape, "jsonl:response_item:payload.type=tool_call");
        assert_eq!(fragments[0].field_path, "payload.type");
        assert_eq!(fragments[0].tool_name.as_deref(), Some("shell"));

        let function = object(json!({
            "type": "function_call",
            "function": {"name": "apply_patch"},
            "input": {"patch": "x"}
        }));
        let fragments = codex_fragments(&function);
        assert_eq!(fragments[0].shape, "jsonl:type=function_call");
        assert_eq!(fragments[0].tool_name.as_deref(), Some("apply_patch"));
        assert_eq!(fragments[0].field_path, "type");
    }

    #[test]
    fn codex_result_prefers_present_result_key_even_if_empty() {
        let obj = object(json!({"type": "tool_result", "result": "", "output": "later"}));
        let fragments = codex_fragments(&obj);
        assert_eq!(fragments[0].direction, Direction::Output);
        assert_eq!(fragments[0].payload, Some(json!("")));
    }

    #[test]
    fn claude_content_blocks_and_tool_use_result() {
        let obj = object(json!({
            "type": "user",
            "message": {"content": [
                {"type": "tool_use", "name": "Bash", "input": {"command": "ls"}},
                {"type": "tool_result", "tool_use_id": "t1", "content": "ok"},
                {"type": "text", "text": "hi"}
            ]},
            "toolUseResult": {"stdout": "ok", "stderr": "", "interrupted": false}
        }));
        let shapes: Vec<_> = claude_fragments(&obj).iter().map(|f| f.shape).collect();
        assert_eq!(
            shapes,
            vec![
                "jsonl:message.content[].type=tool_use",
                "jsonl:message.content[].type=tool_result",
                "jsonl:toolUseResult",
            ]
        );
    }

    #[test]
    fn opencode_errors_wrap_output() {
        let obj = object(json!({
            "type": "tool",
            "tool": "bash",
            "state": {"input": {"command": "false"}, "error": "exit 1"}
        }));
        let fragments = opencode_fragments(&obj);
        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[1].payload,
            Some(json!({"output": null, "error": "exit 1"}))
        );
    }

    #[test]
    fn gemini_tool_calls_pull_function_response_output() {
        let obj = object(json!({
            "type": "gemini",
            "toolCalls": [{
                "name": "run_shell_command",
                "displayName": "Shell",
                "args": {"command": "ls"},
                "result": [{"functionResponse": {"response": {"output": "a\nb"}}}]
            }]
        }));
        let fragments = gemini_fragments(&obj);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].tool_name.as_deref(), Some("Shell"));
        assert_eq!(fragments[1].payload, Some(json!("a\nb")));
        assert!(fragments.iter().all(|f| f.shape == "json:toolCalls[]"));
    }

    #[test]
    fn copilot_requests_and_completion() {
        let request = object(json!({
            "type": "assistant.message",
            "data": {"toolRequests": [{"name": "bash", "arguments": {"command": "ls"}}]}
        }));
        assert_eq!(copilot_fragments(&request)[0].shape, "jsonl:data.toolRequests[]");

        let done = object(json!({
            "type": "tool.execution_complete",
            "data": {"toolName": "bash", "result": {"content": "ok"}}
        }));
        let fragments = copilot_fragments(&done);
        assert_eq!(fragments[0].direction, Direction::Output);
        assert_eq!(fragments[0].tool_name.as_deref(), Some("bash"));
    }
}
