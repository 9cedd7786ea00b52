//! Code-aware identifier tokenizer.
//!
//! An identifier is a maximal run of alphanumerics and underscores; every
//! other character — whitespace, `- . / \ : @`, brackets, operators — splits.
//! Each identifier is emitted un-split (lowercased, ≥ 2 chars) so exact-match
//! scoring can see it, then split again on underscores, camelCase/PascalCase
//! boundaries (acronym runs like `XMLHttp` → `xml`, `http`), and digit/letter
//! transitions.

use std::collections::HashSet;

/// Tokenize source content into a deduplicated, order-stable token set.
pub fn tokenize_code(content: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut tokens: Vec<String> = Vec::new();

    let mut push = |token: String, tokens: &mut Vec<String>| {
        if !token.is_empty() && seen.insert(token.clone()) {
            tokens.push(token);
        }
    };

    for word in content.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if word.is_empty() {
            continue;
        }
        // The un-split identifier, for exact-match scoring.
        if word.chars().count() >= 2 {
            push(word.to_lowercase(), &mut tokens);
        }
        for segment in word.split('_') {
            for part in split_case_boundaries(segment) {
                push(part, &mut tokens);
            }
        }
    }

    tokens
}

/// Split a separator-free segment on case and digit boundaries, lowercased.
///
/// `parseHTTPResponse2Json` → `["parse", "http", "response", "2", "json"]`.
/// An uppercase run followed by a lowercase letter keeps its last capital with
/// the following word (`HTTPServer` → `http`, `server`).
pub(crate) fn split_case_boundaries(segment: &str) -> Vec<String> {
    let chars: Vec<char> = segment.chars().collect();
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if current.is_empty() {
            current.push(c);
            continue;
        }
        let prev = chars[i - 1];
        let boundary = (c.is_uppercase() && prev.is_lowercase())
            || (c.is_uppercase()
                && prev.is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase()))
            || (c.is_ascii_digit() != prev.is_ascii_digit());
        if boundary {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
        .into_iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_split() {
        let tokens = tokenize_code("getUserName");
        assert!(tokens.contains(&"getusername".to_string()));
        assert!(tokens.contains(&"get".to_string()));
        assert!(tokens.contains(&"user".to_string()));
        assert!(tokens.contains(&"name".to_string()));
    }

    #[test]
    fn test_snake_case_identifier_emitted_whole() {
        let tokens = tokenize_code("fn parse_row(input: &str)");
        assert!(tokens.contains(&"parse_row".to_string()));
        assert!(tokens.contains(&"parse".to_string()));
        assert!(tokens.contains(&"row".to_string()));
    }

    #[test]
    fn test_acronym_boundary() {
        let parts = split_case_boundaries("XMLHttpRequest");
        assert_eq!(parts, vec!["xml", "http", "request"]);
    }

    #[test]
    fn test_digit_boundary() {
        let parts = split_case_boundaries("base64Encode");
        assert_eq!(parts, vec!["base", "64", "encode"]);
    }

    #[test]
    fn test_separators_split() {
        let tokens = tokenize_code("foo-bar.baz/qux\\quux:corge@grault");
        for expected in ["foo", "bar", "baz", "qux", "quux", "corge", "grault"] {
            assert!(tokens.contains(&expected.to_string()), "missing {expected}");
        }
        // Separator-joined compounds are not identifiers.
        assert!(!tokens.iter().any(|t| t.contains('.')));
    }

    #[test]
    fn test_qualified_path_splits_into_identifiers() {
        let tokens = tokenize_code("HashMap::insert");
        assert!(tokens.contains(&"hashmap".to_string()));
        assert!(tokens.contains(&"hash".to_string()));
        assert!(tokens.contains(&"map".to_string()));
        assert!(tokens.contains(&"insert".to_string()));
    }

    #[test]
    fn test_single_char_identifier_not_emitted_unsplit() {
        // "i" is below the 2-char exact-match floor but still a valid sub-token.
        let tokens = tokenize_code("for i in items");
        assert!(tokens.contains(&"items".to_string()));
        assert!(tokens.contains(&"i".to_string()));
    }

    #[test]
    fn test_deduplicated() {
        let tokens = tokenize_code("user user USER");
        assert_eq!(tokens.iter().filter(|t| t.as_str() == "user").count(), 1);
    }

    #[test]
    fn test_lowercased() {
        let tokens = tokenize_code("ServerConfig");
        assert!(tokens.iter().all(|t| t.chars().all(|c| !c.is_uppercase())));
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize_code("").is_empty());
        assert!(tokenize_code("   \n\t  ").is_empty());
    }
}
