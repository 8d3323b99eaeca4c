//! Keyword message bookkeeping and block method naming.
//!
//! While the arguments of a keyword message are compiled, a [`KeywordRecord`]
//! tracks the selector parts seen so far. Block literals among the arguments
//! consult the innermost record to pick the name of their lambda method.

use skein_core::Span;

/// Characters that may not appear in a JVM method name.
const ILLEGAL_NAME_CHARS: &[char] = &['.', ';', '[', '/', '<', '>'];

/// Selector parts accumulated for one keyword message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRecord {
    keyword: String,
    first_argument: Option<String>,
    span: Span,
}

impl KeywordRecord {
    /// Start a record for the message at `span`.
    pub fn new(span: Span) -> Self {
        Self {
            keyword: String::new(),
            first_argument: None,
            span,
        }
    }

    /// Append a selector part such as `at:`.
    pub fn add_part(&mut self, part: &str) {
        self.keyword.push_str(part);
    }

    /// Remember the text of a symbol literal passed as the first argument.
    pub fn set_first_argument(&mut self, text: &str) {
        self.first_argument = Some(text.to_string());
    }

    /// Selector parts so far, concatenated.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// The first argument's symbol text, if it was a symbol literal.
    pub fn first_argument(&self) -> Option<&str> {
        self.first_argument.as_deref()
    }

    /// Span of the message.
    pub fn span(&self) -> Span {
        self.span
    }
}

/// Whether `name` can be used as a JVM method name.
pub fn is_legal_method_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(ILLEGAL_NAME_CHARS)
}

/// Name of the lambda method for a block.
///
/// A block passed next to a symbol, as in `#foo: withMethod: [...]`, is named
/// after the symbol when that is a legal method name. Everything else is
/// numbered `B<n>`; `next_sequence` is only called in that case.
pub fn block_method_name(first_argument: Option<&str>, next_sequence: impl FnOnce() -> u32) -> String {
    match first_argument.map(|text| text.trim_start_matches('#')) {
        Some(symbol) if is_legal_method_name(symbol) => symbol.to_string(),
        _ => format!("B{}", next_sequence()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_parts() {
        let mut record = KeywordRecord::new(Span::line(4));
        record.add_part("at:");
        record.add_part("put:");
        assert_eq!(record.keyword(), "at:put:");
        assert_eq!(record.first_argument(), None);
        assert_eq!(record.span().line, 4);
    }

    #[test]
    fn symbol_names_the_block() {
        let mut calls = 0;
        let name = block_method_name(Some("printOn:"), || {
            calls += 1;
            9
        });
        assert_eq!(name, "printOn:");
        assert_eq!(calls, 0);
    }

    #[test]
    fn leading_hash_is_ignored() {
        assert_eq!(block_method_name(Some("#size"), || 0), "size");
    }

    #[test]
    fn illegal_symbols_fall_back_to_sequence() {
        assert_eq!(block_method_name(Some("<="), || 3), "B3");
        assert_eq!(block_method_name(Some("a.b"), || 4), "B4");
        assert_eq!(block_method_name(Some(""), || 5), "B5");
        assert_eq!(block_method_name(None, || 0), "B0");
    }

    #[test]
    fn legal_names() {
        assert!(is_legal_method_name("value:value:"));
        assert!(is_legal_method_name("+"));
        assert!(!is_legal_method_name("a/b"));
        assert!(!is_legal_method_name("[x"));
    }
}
