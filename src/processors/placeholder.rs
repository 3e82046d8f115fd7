//! Placeholder protection around provider calls
//!
//! Interpolation variables (`{name}`, `{{ name }}`, `%s`, `%1$d`) and inline markup
//! (`<b>`, `</a>`) are swapped for opaque markers before translation and put back
//! afterwards, so providers cannot translate or mangle them.

use regex::{Captures, Regex};
use std::sync::OnceLock;

const PLACEHOLDER_PATTERN: &str =
    r"\{\{\s*[\w.\-]+\s*\}\}|\{[\w.\-]+\}|%(?:\d+\$)?[sdif@]|</?[A-Za-z][^<>]*>";
const MARKER_PATTERN: &str = r"⟦\s*(\d+)\s*⟧";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"))
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MARKER_PATTERN).expect("marker pattern is valid"))
}

fn marker(index: usize) -> String {
    format!("⟦{}⟧", index)
}

/// Text with its placeholders swapped for markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protected {
    pub text: String,
    pub placeholders: Vec<String>,
}

/// Masks and restores placeholders
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderGuard;

impl PlaceholderGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn protect(&self, text: &str) -> Protected {
        let mut placeholders = Vec::new();
        let masked = placeholder_regex().replace_all(text, |caps: &Captures| {
            placeholders.push(caps[0].to_string());
            marker(placeholders.len() - 1)
        });
        Protected {
            text: masked.into_owned(),
            placeholders,
        }
    }

    /// Put placeholders back; any marker the provider dropped is appended at the end
    pub fn restore(&self, translated: &str, placeholders: &[String]) -> String {
        if placeholders.is_empty() {
            return translated.to_string();
        }

        let mut used = vec![false; placeholders.len()];
        let restored = marker_regex().replace_all(translated, |caps: &Captures| {
            match caps[1].parse::<usize>().ok().filter(|i| *i < placeholders.len()) {
                Some(i) => {
                    used[i] = true;
                    placeholders[i].clone()
                }
                None => caps[0].to_string(),
            }
        });

        let mut restored = restored.into_owned();
        for (placeholder, _) in placeholders.iter().zip(&used).filter(|(_, used)| !**used) {
            if !restored.is_empty() && !restored.ends_with(' ') {
                restored.push(' ');
            }
            restored.push_str(placeholder);
        }
        restored
    }
}
