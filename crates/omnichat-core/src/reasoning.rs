//! `<think>` segment extraction.
//!
//! Some models inline their reasoning as `<think>...</think>` at the start of
//! the reply. The segment is moved into `reasoning_content` so `content` only
//! carries the visible answer.

use crate::types::ChatCompletionResponse;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Split `content` into `(reasoning, remainder)` when it opens with a complete think block.
pub fn split_thinking(content: &str) -> Option<(String, String)> {
    let trimmed = content.trim();
    let rest = trimmed.strip_prefix(THINK_OPEN)?;
    let end = rest.find(THINK_CLOSE)?;
    let reasoning = rest[..end].trim().to_string();
    let remainder = rest[end + THINK_CLOSE.len()..].trim().to_string();
    Some((reasoning, remainder))
}

/// Move a leading think block of the first choice into `reasoning_content`.
///
/// Content without a closing marker is left untouched.
pub fn extract_thinking(mut response: ChatCompletionResponse) -> ChatCompletionResponse {
    if let Some(choice) = response.choice_mut() {
        let message = &mut choice.message;
        let split = message.content.as_deref().and_then(split_thinking);
        if let Some((reasoning, remainder)) = split {
            message.reasoning_content = Some(reasoning);
            message.content = Some(remainder);
        }
    }
    response
}
