//! Path and string helpers.

use std::path::PathBuf;

/// Get the Omnichat data directory (e.g. `~/.omnichat/`).
pub fn get_data_path() -> PathBuf {
    let home = dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".omnichat")
}

/// Get the REPL history directory (e.g. `~/.omnichat/history/`).
pub fn get_history_path() -> PathBuf {
    get_data_path().join("history")
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand_home(path: &str) -> PathBuf {
    let home = || dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."));
    if path == "~" {
        home()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home().join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Shorten `text` to at most `max_chars` characters, ending in `...` when cut.
pub fn truncate_string(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
