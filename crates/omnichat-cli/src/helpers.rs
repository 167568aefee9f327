//! Shared CLI helpers: response printing and the REPL banner.

use colored::Colorize;

use omnichat_core::utils::truncate_string;
use omnichat_core::{ChatCompletionResponse, FinishReason};

/// Longest tool-call argument text shown inline.
const MAX_ARGS_PREVIEW: usize = 80;

/// Render a response as terminal lines: reasoning (dimmed), reply, then any
/// tool calls the model left unanswered.
pub fn render_response(response: &ChatCompletionResponse) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(message) = response.message() else {
        lines.push("(no response)".dimmed().to_string());
        return lines;
    };

    if let Some(reasoning) = message.reasoning_content.as_deref().filter(|r| !r.is_empty()) {
        lines.extend(reasoning.lines().map(|l| l.dimmed().italic().to_string()));
        lines.push(String::new());
    }

    match message.content.as_deref().filter(|c| !c.is_empty()) {
        Some(content) => lines.push(content.to_string()),
        None if !message.has_tool_calls() => lines.push("(no response)".dimmed().to_string()),
        None => {}
    }

    for call in message.calls() {
        lines.push(format!(
            "{} {}({})",
            "→".yellow(),
            call.function.name.bold(),
            truncate_string(&call.function.arguments, MAX_ARGS_PREVIEW)
        ));
    }

    if response.finish_reason() == Some(FinishReason::Length) {
        lines.push("(truncated: token limit reached)".yellow().to_string());
    }
    lines
}

/// Print a response to stdout.
pub fn print_response(response: &ChatCompletionResponse) {
    println!();
    println!("{}", "Assistant".cyan().bold());
    for line in render_response(response) {
        println!("{line}");
    }
    println!();
}

/// Print the banner shown at REPL start.
pub fn print_banner(model: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}  {}", "Omnichat".cyan().bold(), version.dimmed(), model.green());
    println!(
        "{}",
        "Type a message, \"/reset\" to start over, or \"exit\" to quit.".dimmed()
    );
    println!();
}

/// Print a short dimmed status line.
pub fn print_notice(text: &str) {
    println!("{}", text.dimmed());
}

/// Print a "thinking" placeholder.
pub fn print_thinking() {
    eprint!("{}", "thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
