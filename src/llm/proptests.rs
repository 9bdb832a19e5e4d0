//! Property-based tests for LLM provider translation layers
//!
//! These tests verify that the translation between our internal types
//! and provider wire formats preserves key invariants:
//! - Empty responses are rejected
//! - Tool calls with empty ids or names are rejected
//! - Correlation ids survive translation unchanged
//! - Tool results never vanish from a translated message

use super::anthropic::{self, AnthropicContentBlock, AnthropicResponse, AnthropicUsage};
use super::ollama::{self, OllamaMessage, OllamaResponse};
use super::types::{ContentBlock, LlmMessage, MessageRole};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_text_block() -> impl Strategy<Value = ContentBlock> {
    "[a-zA-Z0-9 _.!?,]{1,100}".prop_map(|text| ContentBlock::Text { text })
}

fn arb_tool_use_block() -> impl Strategy<Value = ContentBlock> {
    ("[a-z0-9_]{5,20}", "[a-z_]{3,20}", arb_json_value())
        .prop_map(|(id, name, input)| ContentBlock::ToolUse { id, name, input })
}

fn arb_tool_result_block() -> impl Strategy<Value = ContentBlock> {
    ("[a-z0-9_]{5,20}", "[a-zA-Z0-9 _.!?,]{0,100}", any::<bool>()).prop_map(
        |(tool_use_id, content, is_error)| ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        },
    )
}

/// Flat JSON object, the shape tool arguments take in practice
fn arb_json_value() -> impl Strategy<Value = serde_json::Value> {
    proptest::collection::hash_map("[a-z_]{1,10}", "[a-zA-Z0-9 ]{0,30}", 0..5).prop_map(|m| {
        serde_json::Value::Object(
            m.into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect(),
        )
    })
}

fn arb_user_message() -> impl Strategy<Value = LlmMessage> {
    proptest::collection::vec(
        prop_oneof![
            3 => arb_text_block(),
            2 => arb_tool_result_block(),
        ],
        1..6,
    )
    .prop_map(|content| LlmMessage {
        role: MessageRole::User,
        content,
    })
}

fn arb_assistant_message() -> impl Strategy<Value = LlmMessage> {
    proptest::collection::vec(
        prop_oneof![
            3 => arb_text_block(),
            3 => arb_tool_use_block(),
        ],
        1..6,
    )
    .prop_map(|content| LlmMessage {
        role: MessageRole::Assistant,
        content,
    })
}

fn arb_message() -> impl Strategy<Value = LlmMessage> {
    prop_oneof![arb_user_message(), arb_assistant_message()]
}

fn make_anthropic_response(
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<&str>,
) -> AnthropicResponse {
    AnthropicResponse {
        content,
        stop_reason: stop_reason.map(String::from),
        usage: AnthropicUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

// ============================================================================
// Response validation
// ============================================================================

proptest! {
    /// Empty Anthropic response → Err
    #[test]
    fn prop_anthropic_normalize_rejects_empty(
        stop_reason in proptest::option::of("[a-z_]{3,10}")
    ) {
        let resp = make_anthropic_response(vec![], stop_reason.as_deref());
        prop_assert!(anthropic::normalize_response(resp).is_err());
    }

    /// Whitespace-only Ollama text → Err
    #[test]
    fn prop_ollama_normalize_rejects_blank(blank in "[ \t\n]{0,10}") {
        let resp = OllamaResponse {
            message: OllamaMessage { role: "assistant".to_string(), content: blank },
            done: true,
            prompt_eval_count: None,
            eval_count: None,
        };
        prop_assert!(ollama::normalize_response(resp).is_err());
    }

    /// Ollama text comes back verbatim as one text block
    #[test]
    fn prop_ollama_normalize_preserves_text(text in "[a-zA-Z0-9{}\":, ]{1,100}") {
        prop_assume!(!text.trim().is_empty());
        let resp = OllamaResponse {
            message: OllamaMessage { role: "assistant".to_string(), content: text.clone() },
            done: true,
            prompt_eval_count: Some(3),
            eval_count: Some(4),
        };
        let normalized = ollama::normalize_response(resp).unwrap();
        prop_assert_eq!(normalized.text(), text);
        prop_assert!(normalized.tool_uses().is_empty());
    }
}

// ============================================================================
// Tool call integrity
// ============================================================================

proptest! {
    /// N named tool_use blocks → exactly N ToolUse blocks with the same ids
    #[test]
    fn prop_anthropic_normalize_preserves_tool_ids(
        calls in proptest::collection::vec(
            ("[a-z0-9]{5,15}", "[a-z_]{3,15}", arb_json_value()),
            1..5,
        ),
    ) {
        let blocks: Vec<_> = calls
            .iter()
            .map(|(id, name, input)| AnthropicContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            })
            .collect();
        let resp = anthropic::normalize_response(make_anthropic_response(blocks, Some("tool_use")))
            .unwrap();

        let ids: Vec<&str> = resp.tool_uses().iter().map(|(id, _, _)| *id).collect();
        let expected: Vec<&str> = calls.iter().map(|(id, _, _)| id.as_str()).collect();
        prop_assert_eq!(ids, expected);
        prop_assert!(!resp.end_turn);
    }

    /// A tool_use block with an empty name poisons the whole response
    #[test]
    fn prop_anthropic_normalize_rejects_unnamed_tool(
        id in "[a-z0-9]{5,15}",
        text in "[a-zA-Z ]{1,30}",
    ) {
        let resp = make_anthropic_response(
            vec![
                AnthropicContentBlock::Text { text },
                AnthropicContentBlock::ToolUse {
                    id,
                    name: String::new(),
                    input: serde_json::json!({}),
                },
            ],
            Some("tool_use"),
        );
        prop_assert!(anthropic::normalize_response(resp).is_err());
    }
}

// ============================================================================
// Message translation
// ============================================================================

proptest! {
    /// Anthropic translation is one block per block, in order
    #[test]
    fn prop_anthropic_translate_preserves_blocks(msg in arb_message()) {
        let wire = anthropic::translate_message(&msg);
        prop_assert_eq!(wire.content.len(), msg.content.len());

        for (ours, theirs) in msg.content.iter().zip(&wire.content) {
            match (ours, theirs) {
                (ContentBlock::Text { text: a }, AnthropicContentBlock::Text { text: b }) => {
                    prop_assert_eq!(a, b);
                }
                (
                    ContentBlock::ToolUse { id: a, .. },
                    AnthropicContentBlock::ToolUse { id: b, .. },
                )
                | (
                    ContentBlock::ToolResult { tool_use_id: a, .. },
                    AnthropicContentBlock::ToolResult { tool_use_id: b, .. },
                ) => {
                    prop_assert_eq!(a, b);
                }
                _ => prop_assert!(false, "block kind changed in translation"),
            }
        }
    }

    /// Every tool result's content is visible in the Ollama text turn
    #[test]
    fn prop_ollama_translate_keeps_tool_results(msg in arb_user_message()) {
        let wire = ollama::translate_message(&msg);
        prop_assert_eq!(wire.role.as_str(), "user");
        for block in &msg.content {
            if let ContentBlock::ToolResult { content, .. } = block {
                prop_assert!(wire.content.contains(content.as_str()));
            }
        }
    }

    /// An assistant turn never translates to empty Ollama text
    #[test]
    fn prop_ollama_translate_assistant_nonempty(msg in arb_assistant_message()) {
        let wire = ollama::translate_message(&msg);
        prop_assert_eq!(wire.role.as_str(), "assistant");
        prop_assert!(!wire.content.is_empty());
    }
}
