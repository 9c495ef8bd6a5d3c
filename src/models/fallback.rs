//! Prompt-based tool calling for backends without a native mechanism.
//!
//! The tool catalog is rendered into the system prompt together with an
//! instruction to answer with a single fenced JSON block
//! `{"tool": <name>, "input": <args>}`. The plain-text reply is then scanned
//! for that object. A reply without one is a normal prose answer, not an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::traits::Backend;
use super::types::{ChatMessage, ChatOptions, ChatResult, ToolCall, ToolSpec};
use crate::utils::BackendError;

// First fenced block, language tag optional
static FENCED_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:[A-Za-z]+)?[ \t]*\r?\n?([\s\S]*?)```").expect("Invalid regex")
});

const TOOL_INSTRUCTIONS: &str = "\
## Tool use

You can call exactly one of the tools listed below. To call a tool, reply with \
ONLY a single fenced code block containing one JSON object and nothing else:

```json
{\"tool\": \"<tool name>\", \"input\": { ...arguments matching the tool's schema... }}
```

If no tool is needed, answer normally in plain prose without any JSON.

### Tools
";

/// Render the catalog as deterministic text: name, description, pretty schema
pub fn render_tool_catalog(tools: &[ToolSpec]) -> String {
    let mut out = String::new();
    for tool in tools {
        let schema = serde_json::to_string_pretty(&tool.input_schema)
            .unwrap_or_else(|_| tool.input_schema.to_string());
        out.push_str(&format!(
            "\n#### {}\n{}\nInput schema:\n```json\n{}\n```\n",
            tool.name, tool.description, schema
        ));
    }
    out
}

/// System prompt with the tool instructions and catalog appended
pub fn build_tool_system_prompt(system_prompt: &str, tools: &[ToolSpec]) -> String {
    let mut prompt = system_prompt.trim_end().to_string();
    if !prompt.is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str(TOOL_INSTRUCTIONS);
    prompt.push_str(&render_tool_catalog(tools));
    prompt
}

/// First top-level brace-balanced `{...}` span in `s`.
/// Braces inside JSON string literals do not count.
pub fn extract_first_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            },
            _ => {},
        }
    }

    None
}

/// Turn a plain-text reply into a `ChatResult`.
/// At most one tool call is extracted; anything unparseable degrades to prose.
pub fn parse_tool_response(raw: &str) -> ChatResult {
    let candidate = match FENCED_BLOCK_RE.captures(raw).and_then(|caps| caps.get(1)) {
        Some(block) => block.as_str(),
        None => raw.trim(),
    };

    let parsed = extract_first_json_object(candidate)
        .and_then(|span| serde_json::from_str::<Value>(span).ok());

    if let Some(Value::Object(mut obj)) = parsed {
        if let (Some(Value::String(name)), Some(input)) = (obj.remove("tool"), obj.remove("input"))
        {
            return ChatResult {
                text: None,
                tool_calls: vec![ToolCall {
                    id: None,
                    name,
                    input,
                }],
                usage: None,
            };
        }
    }

    ChatResult::text(raw)
}

/// Service a tool-use request through `backend.chat` alone
pub async fn chat_with_fallback<B: Backend + ?Sized>(
    backend: &B,
    system_prompt: &str,
    messages: &[ChatMessage],
    tools: &[ToolSpec],
    options: &ChatOptions,
) -> Result<ChatResult, BackendError> {
    // Nothing to call: plain chat, no tool instructions
    if tools.is_empty() {
        return backend.chat(system_prompt, messages, options).await;
    }

    let augmented = build_tool_system_prompt(system_prompt, tools);
    let response = backend.chat(&augmented, messages, options).await?;

    let result = parse_tool_response(response.text_or_empty()).with_usage(response.usage);
    debug!(
        "Fallback tool parse: {} tool call(s)",
        result.tool_calls.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::traits::MockBackend;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "t1".to_string(),
                description: "First tool".to_string(),
                input_schema: json!({"type": "object", "properties": {"a": {"type": "integer"}}}),
            },
            ToolSpec {
                name: "log_workout".to_string(),
                description: "Record a workout".to_string(),
                input_schema: json!({"type": "object"}),
            },
        ]
    }

    #[test]
    fn test_render_catalog_is_deterministic() {
        let tools = catalog();
        let first = render_tool_catalog(&tools);
        assert_eq!(first, render_tool_catalog(&tools));
        assert!(first.contains("#### t1\nFirst tool\n"));
        assert!(first.contains("\"integer\""));
        assert!(first.find("t1").unwrap() < first.find("log_workout").unwrap());
    }

    #[test]
    fn test_build_prompt_keeps_original_prompt_first() {
        let prompt = build_tool_system_prompt("You are a coach.", &catalog());
        assert!(prompt.starts_with("You are a coach.\n\n## Tool use"));
        assert!(prompt.contains("{\"tool\": \"<tool name>\", \"input\""));
    }

    #[test]
    fn test_fenced_tool_call() {
        let raw = "```json\n{\"tool\": \"t1\", \"input\": {\"a\": 1}}\n```";
        let result = parse_tool_response(raw);
        assert_eq!(result.text, None);
        assert_eq!(
            result.tool_calls,
            vec![ToolCall {
                id: None,
                name: "t1".to_string(),
                input: json!({"a": 1}),
            }]
        );
    }

    #[test]
    fn test_fence_without_language_tag() {
        let raw = "```\n{\"tool\": \"t1\", \"input\": {}}\n```";
        let result = parse_tool_response(raw);
        assert_eq!(result.tool_calls[0].name, "t1");
    }

    #[test]
    fn test_bare_json_with_nested_input() {
        let raw = "  {\"tool\": \"log_workout\", \"input\": {\"sets\": [{\"reps\": 5}], \"meta\": {\"note\": \"felt {easy}\"}}}  ";
        let result = parse_tool_response(raw);
        assert_eq!(result.text, None);
        assert_eq!(
            result.tool_calls[0].input,
            json!({"sets": [{"reps": 5}], "meta": {"note": "felt {easy}"}})
        );
    }

    #[test]
    fn test_prose_degrades_to_text() {
        let raw = "Rest a day, then try the squat again at the same weight.";
        let result = parse_tool_response(raw);
        assert_eq!(result.text.as_deref(), Some(raw));
        assert!(result.tool_calls.is_empty());
    }

    #[test]
    fn test_object_missing_keys_degrades_to_text() {
        let raw = "{\"name\": \"t1\", \"arguments\": {}}";
        let result = parse_tool_response(raw);
        assert_eq!(result.text.as_deref(), Some(raw));
        assert!(result.tool_calls.is_empty());
    }

    #[test]
    fn test_invalid_json_degrades_to_text() {
        let raw = "```json\n{\"tool\": \"t1\", \"input\": {a: 1}}\n```";
        let result = parse_tool_response(raw);
        assert_eq!(result.text.as_deref(), Some(raw));
        assert!(result.tool_calls.is_empty());
    }

    #[test]
    fn test_only_first_balanced_span_is_used() {
        let raw = "{\"tool\": \"t1\", \"input\": {\"a\": 1}} {\"tool\": \"t2\", \"input\": {}}";
        assert_eq!(
            extract_first_json_object(raw),
            Some("{\"tool\": \"t1\", \"input\": {\"a\": 1}}")
        );
        let result = parse_tool_response(raw);
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "t1");
    }

    #[test]
    fn test_extract_unbalanced() {
        assert_eq!(extract_first_json_object("{\"a\": {\"b\": 1}"), None);
        assert_eq!(extract_first_json_object("no braces here"), None);
        assert_eq!(extract_first_json_object("x {\"s\": \"}\"} y"), Some("{\"s\": \"}\"}"));
    }

    #[tokio::test]
    async fn test_chat_with_fallback_uses_plain_chat() {
        let mut backend = MockBackend::new();
        backend
            .expect_chat()
            .withf(|system, messages, _| {
                system.starts_with("Be brief.") && system.contains("#### t1") && messages.len() == 1
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(ChatResult::text(
                    "```json\n{\"tool\": \"t1\", \"input\": {\"a\": 1}}\n```",
                ))
            });
        backend.expect_chat_with_tools().never();

        let messages = vec![ChatMessage::user("log my squats")];
        let result = chat_with_fallback(
            &backend,
            "Be brief.",
            &messages,
            &catalog(),
            &ChatOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.text, None);
        assert_eq!(result.tool_calls[0].name, "t1");
        assert_eq!(result.tool_calls[0].input, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_chat_with_fallback_propagates_errors() {
        let mut backend = MockBackend::new();
        backend.expect_chat().returning(|_, _, _| {
            Err(BackendError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        });

        let result = chat_with_fallback(
            &backend,
            "",
            &[ChatMessage::user("hi")],
            &catalog(),
            &ChatOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(BackendError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_chat_with_fallback_empty_catalog_is_plain_chat() {
        let mut backend = MockBackend::new();
        backend
            .expect_chat()
            .withf(|system, _, _| system == "Be brief.")
            .times(1)
            .returning(|_, _, _| Ok(ChatResult::text("{\"tool\": \"t1\", \"input\": {}}")));

        let result = chat_with_fallback(
            &backend,
            "Be brief.",
            &[ChatMessage::user("hi")],
            &[],
            &ChatOptions::default(),
        )
        .await
        .unwrap();

        assert!(result.tool_calls.is_empty());
        assert_eq!(result.text.as_deref(), Some("{\"tool\": \"t1\", \"input\": {}}"));
    }
}
