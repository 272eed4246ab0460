//! Line-oriented `key=value` files
//!
//! Used for `bootstrap.properties`, `server.env` and `*.properties` files in
//! variables directories. Supported syntax:
//!
//! ```text
//! # comment
//! ! also a comment
//! key=value
//! key: value
//! key value
//! long.value=first \
//!     second
//! export NAME=value     (server.env only)
//! ```
//!
//! Keys and values are trimmed. Later entries overwrite earlier ones.

use indexmap::IndexMap;

/// Parse the contents of a `.properties` file
pub fn parse_properties(content: &str) -> IndexMap<String, String> {
    parse(content, false)
}

/// Parse the contents of a `server.env` file
pub fn parse_server_env(content: &str) -> IndexMap<String, String> {
    parse(content, true)
}

fn parse(content: &str, allow_export: bool) -> IndexMap<String, String> {
    let mut entries = IndexMap::new();

    for line in logical_lines(content) {
        let mut line = line.as_str();
        if allow_export {
            if let Some(rest) = line.strip_prefix("export ") {
                line = rest.trim_start();
            }
        }

        let Some((key, value)) = split_entry(line) else {
            continue;
        };
        entries.insert(key.to_string(), value.to_string());
    }

    entries
}

/// Join continued lines and drop blanks and comments
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for physical in content.lines() {
        let trimmed = physical.trim();

        let mut current = match pending.take() {
            Some(mut joined) => {
                joined.push_str(trimmed);
                joined
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed.to_string()
            }
        };

        if ends_with_continuation(&current) {
            current.pop();
            pending = Some(current);
        } else {
            lines.push(current);
        }
    }

    if let Some(last) = pending {
        lines.push(last);
    }

    lines
}

/// An odd number of trailing backslashes continues the line
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split at the first `=`, `:` or whitespace, then skip one optional
/// separator after whitespace
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let key_end = line
        .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
        .unwrap_or(line.len());
    let key = line[..key_end].trim();
    if key.is_empty() {
        return None;
    }

    let mut rest = line[key_end..].trim_start();
    if let Some(after) = rest.strip_prefix(['=', ':']) {
        rest = after;
    }

    Some((key, rest.trim()))
}
