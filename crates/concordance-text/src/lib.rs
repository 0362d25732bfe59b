//! Line tokenization and context windows for keyword concordances.
//!
//! A line is split on whitespace; every piece is normalized by dropping ASCII
//! punctuation and lowercasing ASCII letters. Pieces made only of punctuation
//! vanish from the token sequence, so context windows never contain empty
//! words. Each [`Token`] still borrows its raw slice and remembers where it
//! started in the line.
//!
//! Context is measured in tokens, not characters: [`context_window`] takes
//! the ordinal of a matched token and returns up to `radius` tokens on each
//! side, clamped to the line.
//!
//! ```rust
//! use concordance_text::{context_window, tokenize};
//!
//! let tokens = tokenize("The quick brown fox!");
//! assert_eq!(tokens[3].text, "fox");
//! assert_eq!(tokens[3].offset, 16);
//!
//! let window = context_window(&tokens, 3, 2);
//! assert_eq!(window.before, "quick brown");
//! assert_eq!(window.after, "");
//! ```

/// A normalized word together with the raw text it came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token<'a> {
    /// Punctuation-free, ASCII-lowercased form used for matching.
    pub text: String,
    /// The whitespace-delimited slice as it appears in the line.
    pub raw: &'a str,
    /// Byte offset of `raw` within the line.
    pub offset: usize,
}

impl AsRef<str> for Token<'_> {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Words surrounding a match, each side joined with single spaces.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ContextWindow {
    pub before: String,
    pub after: String,
}

/// Split `line` into normalized tokens, preserving order and byte offsets.
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    line.split(char::is_whitespace)
        .filter(|piece| !piece.is_empty())
        .filter_map(|raw| {
            let text = normalize(raw)?;
            Some(Token {
                text,
                raw,
                offset: raw.as_ptr() as usize - line.as_ptr() as usize,
            })
        })
        .collect()
}

/// Strip ASCII punctuation and lowercase ASCII letters.
///
/// Returns `None` when nothing but punctuation was present.
pub fn normalize(raw: &str) -> Option<String> {
    let mut normalized = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_punctuation() {
            continue;
        }
        normalized.push(c.to_ascii_lowercase());
    }
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Collect up to `radius` tokens before and after `tokens[index]`.
///
/// Windows clamp at the ends of the slice. An `index` past the end yields an
/// empty window.
pub fn context_window<T: AsRef<str>>(tokens: &[T], index: usize, radius: usize) -> ContextWindow {
    if index >= tokens.len() {
        return ContextWindow::default();
    }
    let start = index.saturating_sub(radius);
    let end = index
        .saturating_add(radius)
        .saturating_add(1)
        .min(tokens.len());
    ContextWindow {
        before: join(&tokens[start..index]),
        after: join(&tokens[index + 1..end]),
    }
}

fn join<T: AsRef<str>>(tokens: &[T]) -> String {
    let len = tokens.iter().map(|t| t.as_ref().len() + 1).sum::<usize>();
    let mut joined = String::with_capacity(len);
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            joined.push(' ');
        }
        joined.push_str(token.as_ref());
    }
    joined
}
