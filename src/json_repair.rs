//! Recovery of a JSON object from free-form model output.
//!
//! Generative models are asked for bare JSON but routinely wrap it in prose
//! or code fences, use typographic quotes, pretty-print newlines inside
//! string values, leave trailing commas, use single-quoted strings, or put
//! unescaped quotation marks inside a value. [`extract_json`] finds each
//! balanced `{...}` candidate in the text and runs it through a fixed repair
//! pipeline until one parses:
//!
//! 1. parse the candidate as-is;
//! 2. strip fences, straighten smart quotes, turn raw newlines/tabs into
//!    spaces, then run the string-state scanner ([`sanitize`]) and parse;
//! 3. drop backslashes that do not start a valid escape and parse again.
//!
//! This is not a JSON5 parser. The scanner only knows enough about string
//! literals to tell a closing quote from a quote that belongs to the value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::utils::truncate_for_log;

static CONTROL_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n\t]+").expect("control whitespace pattern is valid"));

/// Characters that may legitimately follow the closing quote of a string.
const STRING_TERMINATORS: [char; 4] = [',', '}', ']', ':'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Double,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InString(Quote),
    Escaped(Quote),
}

/// Locate and parse the first repairable JSON object in `text`.
///
/// # Arguments
///
/// * `text` - Raw model output, possibly wrapped in prose or code fences
///
/// # Returns
///
/// The first top-level JSON object that parses, either as-is or after the
/// repair passes. `None` when no balanced candidate survives; a bounded
/// preview of the text is logged in that case.
pub fn extract_json(text: &str) -> Option<Value> {
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let rest = &text[start..];
        // Quote-aware first; the plain brace count still finds objects whose
        // quoting is broken enough to confuse the string tracking.
        let quoted = quoted_balanced_end(rest);
        let naive = balanced_end(rest).filter(|len| Some(*len) != quoted);
        if quoted.is_none() && naive.is_none() {
            debug!(start, "Unbalanced braces from here to end of text");
        }
        for len in quoted.into_iter().chain(naive) {
            if let Some(value) = parse_candidate(&rest[..len]) {
                return Some(value);
            }
            debug!(start, len, "Candidate object failed every repair pass");
        }
        // Retry from the next opening brace, which also visits nested objects.
        search_from = start + 1;
    }

    warn!(
        text_preview = %truncate_for_log(text, 300),
        "No parseable JSON object in model output"
    );
    None
}

/// Like [`balanced_end`], but braces inside double-quoted strings do not
/// count.
fn quoted_balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut state = ScanState::Outside;
    for (idx, c) in s.char_indices() {
        state = match (state, c) {
            (ScanState::Outside, '"') => ScanState::InString(Quote::Double),
            (ScanState::Outside, '{') => {
                depth += 1;
                ScanState::Outside
            }
            (ScanState::Outside, '}') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + c.len_utf8());
                }
                ScanState::Outside
            }
            (ScanState::InString(quote), '\\') => ScanState::Escaped(quote),
            (ScanState::InString(_), '"') => ScanState::Outside,
            (ScanState::Escaped(quote), _) => ScanState::InString(quote),
            (state, _) => state,
        };
    }
    None
}

/// Byte length of the `{...}` prefix of `s` whose braces balance, if any.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_candidate(candidate: &str) -> Option<Value> {
    if let Some(value) = parse_object(candidate) {
        return Some(value);
    }

    let normalized = normalize(candidate);
    let sanitized = sanitize(&normalized);
    if let Some(value) = parse_object(&sanitized) {
        return Some(value);
    }

    parse_object(&strip_stray_backslashes(&sanitized))
}

fn parse_object(s: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(s) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Candidate did not parse");
            None
        }
    }
}

/// Character-level normalisation that does not need string state.
fn normalize(candidate: &str) -> String {
    let unfenced = candidate.replace("```json", "").replace("```", "");
    let straightened: String = unfenced
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            other => other,
        })
        .collect();
    CONTROL_WHITESPACE
        .replace_all(&straightened, " ")
        .into_owned()
}

/// Rewrite `s` so that string literals are well formed.
///
/// Outside strings, single-quoted literals are converted to double-quoted
/// ones and commas directly before `}` or `]` are dropped. Inside a
/// double-quoted string, a `"` that is not followed by one of `, } ] :`
/// (ignoring whitespace) is part of the value and gets escaped.
fn sanitize(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 16);
    let mut state = ScanState::Outside;

    for (i, &c) in chars.iter().enumerate() {
        state = match state {
            ScanState::Outside => match c {
                '"' => {
                    out.push('"');
                    ScanState::InString(Quote::Double)
                }
                '\'' => {
                    out.push('"');
                    ScanState::InString(Quote::Single)
                }
                ',' if matches!(next_significant(&chars, i + 1), Some('}') | Some(']')) => {
                    ScanState::Outside
                }
                _ => {
                    out.push(c);
                    ScanState::Outside
                }
            },
            ScanState::InString(quote) => match (c, quote) {
                ('\\', _) => {
                    out.push('\\');
                    ScanState::Escaped(quote)
                }
                ('"', Quote::Double) | ('\'', Quote::Single) if closes_string(&chars, i + 1) => {
                    out.push('"');
                    ScanState::Outside
                }
                ('"', _) => {
                    out.push_str("\\\"");
                    ScanState::InString(quote)
                }
                _ if c.is_control() => {
                    out.push(' ');
                    ScanState::InString(quote)
                }
                _ => {
                    out.push(c);
                    ScanState::InString(quote)
                }
            },
            ScanState::Escaped(quote) => {
                if c == '\'' {
                    // `\'` is not a JSON escape; keep the bare apostrophe.
                    out.pop();
                }
                out.push(c);
                ScanState::InString(quote)
            }
        };
    }

    out
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from.min(chars.len())..]
        .iter()
        .copied()
        .find(|c| !c.is_whitespace())
}

fn closes_string(chars: &[char], from: usize) -> bool {
    match next_significant(chars, from) {
        None => true,
        Some(c) => STRING_TERMINATORS.contains(&c),
    }
}

/// Remove backslashes that do not begin a valid JSON escape sequence.
fn strip_stray_backslashes(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }
        match chars.get(i + 1) {
            Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => {
                out.push('\\');
                out.push(chars[i + 1]);
                i += 2;
            }
            Some('u') if is_unicode_escape(&chars[i + 2..]) => {
                out.push('\\');
                i += 1;
            }
            _ => i += 1,
        }
    }

    out
}

fn is_unicode_escape(rest: &[char]) -> bool {
    rest.len() >= 4 && rest[..4].iter().all(|c| c.is_ascii_hexdigit())
}
