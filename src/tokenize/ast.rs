//! Term-frequency enrichment from AST-extracted identifiers.
//!
//! The indexer's language frontends hand over the identifiers they extracted
//! from a parsed unit plus the unit's own symbol name. Re-tokenizing each one
//! through the code tokenizer and *repeating* the results (no dedup) raises
//! BM25 term frequency for the names that matter; the symbol name itself is
//! weighted three times.

use super::code::tokenize_code;

/// How many times symbol-name tokens are repeated in the output stream.
const SYMBOL_NAME_WEIGHT: usize = 3;

/// Expand extracted identifiers into a weighted token stream.
pub fn enrich_identifiers(identifiers: &[String], symbol_name: Option<&str>) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();

    for identifier in identifiers {
        tokens.extend(tokenize_code(identifier));
    }

    if let Some(symbol) = symbol_name {
        let symbol_tokens = tokenize_code(symbol);
        for _ in 0..SYMBOL_NAME_WEIGHT {
            tokens.extend(symbol_tokens.iter().cloned());
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repetition_preserved() {
        let ids = vec!["parseJson".to_string(), "parseJson".to_string()];
        let tokens = enrich_identifiers(&ids, None);
        // Each occurrence contributes its own tokens — no dedup across identifiers.
        assert_eq!(tokens.iter().filter(|t| t.as_str() == "parse").count(), 2);
        assert_eq!(tokens.iter().filter(|t| t.as_str() == "json").count(), 2);
    }

    #[test]
    fn test_symbol_name_tripled() {
        let tokens = enrich_identifiers(&[], Some("buildIndex"));
        assert_eq!(tokens.iter().filter(|t| t.as_str() == "build").count(), 3);
        assert_eq!(tokens.iter().filter(|t| t.as_str() == "index").count(), 3);
        assert_eq!(
            tokens.iter().filter(|t| t.as_str() == "buildindex").count(),
            3
        );
    }

    #[test]
    fn test_identifiers_and_symbol_combined() {
        let ids = vec!["rowCount".to_string()];
        let tokens = enrich_identifiers(&ids, Some("rowCount"));
        // 1 from the identifier + 3 from the symbol name.
        assert_eq!(tokens.iter().filter(|t| t.as_str() == "row").count(), 4);
    }

    #[test]
    fn test_empty_input() {
        assert!(enrich_identifiers(&[], None).is_empty());
    }
}
