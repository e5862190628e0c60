use std::sync::LazyLock;

use regex::Regex;

/// Identifier shape shared by the tokenizer, the macro table, and directive
/// parsing.
pub(crate) const IDENT_PATTERN: &str = "[_A-Za-z][_A-Za-z0-9]*";

const NUMBER_PATTERN: &str = r"[-+]?[0-9]+(?:\.[0-9]+)?";
const WHITESPACE_PATTERN: &str = r"\s+";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Whitespace matched by the ignore pattern; preserved so callers can
    /// reconstruct the input verbatim
    Ignore,
    Identifier,
    Number,
    /// A `"…"` or `'…'` literal; the lexeme has the quotes stripped
    Str,
    /// A single character no pattern claimed
    Unknown,
    /// One of the caller-supplied keyword patterns, tagged with its name
    Keyword(&'static str),
    /// Synthetic end-of-input marker
    Eof,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Patterns parameterizing a [`Tokenizer`]
///
/// Keywords are tried in order before the identifier and number patterns,
/// so word-shaped keywords must anchor on a boundary to avoid claiming
/// identifier prefixes.
pub(crate) struct TokenRules {
    identifier: Regex,
    number: Regex,
    whitespace: Regex,
    keywords: Vec<(&'static str, Regex)>,
}

impl TokenRules {
    pub(crate) fn with_keywords(keywords: &[(&'static str, &str)]) -> Self {
        let anchored = |p: &str| {
            Regex::new(&format!("^(?:{p})")).unwrap_or_else(|e| panic!("bad token pattern: {e}"))
        };
        TokenRules {
            identifier: anchored(IDENT_PATTERN),
            number: anchored(NUMBER_PATTERN),
            whitespace: anchored(WHITESPACE_PATTERN),
            keywords: keywords.iter().map(|(name, p)| (*name, anchored(p))).collect(),
        }
    }
}

/// Default rules: identifiers, numbers, whitespace, no keyword table.
pub(crate) static DEFAULT_RULES: LazyLock<TokenRules> =
    LazyLock::new(|| TokenRules::with_keywords(&[]));

/// Single-pass, forward-only tokenizer over one line of text
///
/// Yields `(kind, lexeme, start, end)` tuples and terminates with a
/// synthetic [`TokenKind::Eof`]. Not restartable.
pub(crate) struct Tokenizer<'a> {
    input: &'a str,
    rules: &'a TokenRules,
    pos: usize,
    eof_sent: bool,
}

impl<'a> Tokenizer<'a> {
    pub(crate) fn new(input: &'a str, rules: &'a TokenRules) -> Self {
        Tokenizer { input, rules, pos: 0, eof_sent: false }
    }

    fn emit(&mut self, kind: TokenKind, len: usize) -> Token<'a> {
        let start = self.pos;
        let end = start + len;
        self.pos = end;
        Token { kind, lexeme: &self.input[start..end], start, end }
    }

    /// Scan a quoted literal starting at `self.pos`. Backslash escapes the
    /// next character; an unterminated literal runs to end of input.
    fn scan_string(&mut self, quote: char) -> Token<'a> {
        let start = self.pos;
        let rest = &self.input[start + quote.len_utf8()..];
        let mut escaped = false;
        let mut inner_len = rest.len();
        let mut terminated = false;
        for (i, c) in rest.char_indices() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                inner_len = i;
                terminated = true;
                break;
            }
        }
        let inner_start = start + quote.len_utf8();
        let end = inner_start + inner_len + if terminated { quote.len_utf8() } else { 0 };
        self.pos = end;
        Token {
            kind: TokenKind::Str,
            lexeme: &self.input[inner_start..inner_start + inner_len],
            start,
            end,
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.pos >= self.input.len() {
            if self.eof_sent {
                return None;
            }
            self.eof_sent = true;
            return Some(Token { kind: TokenKind::Eof, lexeme: "", start: self.pos, end: self.pos });
        }

        let rest = &self.input[self.pos..];

        if let Some(m) = self.rules.whitespace.find(rest) {
            return Some(self.emit(TokenKind::Ignore, m.end()));
        }
        let keyword = self
            .rules
            .keywords
            .iter()
            .find_map(|(name, pattern)| pattern.find(rest).map(|m| (*name, m.end())));
        if let Some((name, len)) = keyword {
            return Some(self.emit(TokenKind::Keyword(name), len));
        }
        if let Some(m) = self.rules.identifier.find(rest) {
            return Some(self.emit(TokenKind::Identifier, m.end()));
        }
        if let Some(m) = self.rules.number.find(rest) {
            return Some(self.emit(TokenKind::Number, m.end()));
        }

        let first = rest.chars().next()?;
        if first == '"' || first == '\'' {
            return Some(self.scan_string(first));
        }
        Some(self.emit(TokenKind::Unknown, first.len_utf8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Tokenizer::new(input, &DEFAULT_RULES).map(|t| t.kind).collect()
    }

    #[test]
    fn identifiers_numbers_and_unknowns() {
        let tokens: Vec<_> = Tokenizer::new("int x = 42;", &DEFAULT_RULES).collect();
        let lexemes: Vec<_> = tokens.iter().map(|t| t.lexeme).collect();
        assert_eq!(lexemes, vec!["int", " ", "x", " ", "=", " ", "42", ";", ""]);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[6].kind, TokenKind::Number);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn strings_strip_quotes() {
        let tokens: Vec<_> = Tokenizer::new(r#"x = "a\"b";"#, &DEFAULT_RULES).collect();
        let s = tokens.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(s.lexeme, r#"a\"b"#);
        // span still covers the quotes
        assert_eq!(&r#"x = "a\"b";"#[s.start..s.end], r#""a\"b""#);
    }

    #[test]
    fn char_literals_are_strings_too() {
        let tokens: Vec<_> = Tokenizer::new("c = 'q'", &DEFAULT_RULES).collect();
        let s = tokens.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(s.lexeme, "q");
    }

    #[test]
    fn unterminated_string_runs_to_end() {
        let tokens: Vec<_> = Tokenizer::new("\"abc", &DEFAULT_RULES).collect();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "abc");
    }

    #[test]
    fn signed_number_after_identifier_keeps_spans_contiguous() {
        // "a-1" splits into identifier then signed number; spans cover the
        // input exactly so verbatim reconstruction works
        let tokens: Vec<_> = Tokenizer::new("a-1", &DEFAULT_RULES).collect();
        let text: String = tokens.iter().map(|t| &"a-1"[t.start..t.end]).collect();
        assert_eq!(text, "a-1");
    }

    #[test]
    fn word_keywords_respect_identifier_boundaries() {
        let rules = TokenRules::with_keywords(&[("defined", r"defined\b")]);
        let tokens: Vec<_> = Tokenizer::new("defined definedX", &rules).collect();
        assert_eq!(tokens[0].kind, TokenKind::Keyword("defined"));
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].lexeme, "definedX");
    }

    #[test]
    fn eof_is_sent_exactly_once() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }
}
