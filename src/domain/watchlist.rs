//! Watch-list parsing.
//!
//! The watch-list is fixed at start-up; every other piece of per-instrument
//! state is keyed off the symbols parsed here.

use std::collections::HashSet;

#[derive(Debug, Clone, thiserror::Error)]
pub enum WatchlistError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("symbol list is empty")]
    Empty,
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, WatchlistError> {
    if input.trim().is_empty() {
        return Err(WatchlistError::Empty);
    }

    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(WatchlistError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(WatchlistError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_uppercases() {
        let symbols = parse_symbols("btcusdt, ETHUSDT ,solusdt").unwrap();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    }

    #[test]
    fn single_symbol() {
        assert_eq!(parse_symbols("ARBUSDT").unwrap(), vec!["ARBUSDT"]);
    }

    #[test]
    fn rejects_empty_token() {
        assert!(matches!(
            parse_symbols("BTCUSDT,,ETHUSDT"),
            Err(WatchlistError::EmptyToken)
        ));
    }

    #[test]
    fn rejects_duplicates_case_insensitively() {
        match parse_symbols("BTCUSDT,btcusdt") {
            Err(WatchlistError::DuplicateSymbol(s)) => assert_eq!(s, "BTCUSDT"),
            other => panic!("expected DuplicateSymbol, got {other:?}"),
        }
    }

    #[test]
    fn rejects_blank_input() {
        assert!(matches!(parse_symbols("   "), Err(WatchlistError::Empty)));
    }
}
