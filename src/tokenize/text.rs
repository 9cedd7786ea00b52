//! Natural-language tokenizer for docs and memories.
//!
//! Strips the markup that would otherwise pollute the term space (fenced code
//! blocks, inline code, markdown links, HTML-ish tags), lowercases, and emits
//! both stemmed and unstemmed forms so literal queries still match.

use std::collections::HashSet;

/// Minimum token length for natural-language terms.
const MIN_TOKEN_LEN: usize = 3;

/// Tokenize prose into a deduplicated token list.
///
/// Each surviving word (≥ 3 chars after lowercasing) is emitted unstemmed and,
/// when the stem differs, stemmed as well.
pub fn tokenize_text(content: &str) -> Vec<String> {
    let stripped = strip_markup(content);

    let mut seen: HashSet<String> = HashSet::new();
    let mut tokens: Vec<String> = Vec::new();

    for word in stripped.split(|c: char| !c.is_alphanumeric()) {
        let word = word.to_lowercase();
        if word.chars().count() < MIN_TOKEN_LEN {
            continue;
        }
        if seen.insert(word.clone()) {
            tokens.push(word.clone());
        }
        let stemmed = stem(&word);
        if stemmed != word && stemmed.chars().count() >= MIN_TOKEN_LEN && seen.insert(stemmed.clone())
        {
            tokens.push(stemmed);
        }
    }

    tokens
}

/// Remove fenced code blocks, inline code spans, markdown links (keeping the
/// link text), and angle-bracket tags.
fn strip_markup(content: &str) -> String {
    let mut out = String::with_capacity(content.len());

    // Fenced code blocks: drop everything between ``` pairs.
    let mut in_fence = false;
    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        out.push_str(&strip_inline(line));
        out.push('\n');
    }
    out
}

/// Strip inline code, link targets, and tags from a single line.
fn strip_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            // Inline code span: skip to the closing backtick (or EOL).
            '`' => {
                i += 1;
                while i < chars.len() && chars[i] != '`' {
                    i += 1;
                }
                i += 1;
            }
            // Markdown link: keep [text], drop (url).
            '[' => {
                i += 1;
                while i < chars.len() && chars[i] != ']' {
                    out.push(chars[i]);
                    i += 1;
                }
                i += 1;
                if i < chars.len() && chars[i] == '(' {
                    while i < chars.len() && chars[i] != ')' {
                        i += 1;
                    }
                    i += 1;
                }
                out.push(' ');
            }
            // HTML-ish tag: drop <...>.
            '<' => {
                while i < chars.len() && chars[i] != '>' {
                    i += 1;
                }
                i += 1;
                out.push(' ');
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Simplified Porter stemmer: plural forms, past/progressive endings, and a
/// handful of derivational suffixes. Not a full Porter implementation — just
/// enough that "configurations" and "configuration" land on the same term.
pub(crate) fn stem(word: &str) -> String {
    let mut w = word.to_string();

    // Step 1: plurals.
    if let Some(base) = w.strip_suffix("ies") {
        if base.len() >= 2 {
            w = format!("{base}y");
        }
    } else if let Some(base) = w.strip_suffix("sses") {
        w = format!("{base}ss");
    } else if let Some(base) = w.strip_suffix("es") {
        if base.len() >= 3 {
            w = base.to_string();
        }
    } else if w.ends_with('s') && !w.ends_with("ss") && w.len() >= 4 {
        w.truncate(w.len() - 1);
    }

    // Step 2: -ed / -ing.
    if let Some(base) = w.strip_suffix("ing") {
        if base.len() >= 3 {
            w = undouble(base);
        }
    } else if let Some(base) = w.strip_suffix("ed") {
        if base.len() >= 3 {
            w = undouble(base);
        }
    }

    // Step 3: common derivational suffixes.
    for (suffix, replacement) in [
        ("ization", "ize"),
        ("ational", "ate"),
        ("ation", "ate"),
        ("fulness", "ful"),
        ("ousness", "ous"),
        ("iveness", "ive"),
        ("ness", ""),
        ("ment", ""),
        ("ful", ""),
        ("ity", ""),
    ] {
        if let Some(base) = w.strip_suffix(suffix) {
            if base.len() >= 3 {
                w = format!("{base}{replacement}");
                break;
            }
        }
    }

    w
}

/// Collapse a doubled final consonant left by suffix removal ("stopp" → "stop").
fn undouble(base: &str) -> String {
    let chars: Vec<char> = base.chars().collect();
    if chars.len() >= 2 {
        let last = chars[chars.len() - 1];
        let prev = chars[chars.len() - 2];
        if last == prev && !matches!(last, 'l' | 's' | 'z') && last.is_ascii_alphabetic() {
            return chars[..chars.len() - 1].iter().collect();
        }
    }
    base.to_string()
}
