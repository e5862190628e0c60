//! Evaluator for `#if`/`#elif` expressions
//!
//! The accepted language is `defined(X)`, `defined X`, `!`, `&&`, `||`, and
//! parentheses. `&&` and `||` carry no relative precedence: operators fold
//! left-to-right in encounter order, so mixed expressions must parenthesize.

use std::sync::LazyLock;

use crate::error::ErrorKind;
use crate::macro_def::MacroTable;
use crate::token::{Token, TokenKind, TokenRules, Tokenizer};

static EXPR_RULES: LazyLock<TokenRules> = LazyLock::new(|| {
    TokenRules::with_keywords(&[
        ("defined", r"defined\b"),
        ("and", r"&&"),
        ("or", r"\|\|"),
        ("not", r"!"),
        ("open", r"\("),
        ("close", r"\)"),
    ])
});

/// Evaluate a conditional expression against the macro table
///
/// Any syntactic deviation fails with [`ErrorKind::ExpressionParse`]
/// carrying the offending input.
pub(crate) fn eval(input: &str, table: &MacroTable) -> Result<bool, ErrorKind> {
    let tokens: Vec<Token<'_>> = Tokenizer::new(input, &EXPR_RULES)
        .filter(|t| t.kind != TokenKind::Ignore)
        .collect();
    let mut parser = Parser { input, table, tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.peek().kind != TokenKind::Eof {
        return Err(parser.error());
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a str,
    table: &'a MacroTable,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Token<'a> {
        // the tokenizer terminates with Eof, which is never consumed
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token<'a> {
        let tok = self.peek();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, keyword: &'static str) -> bool {
        if self.peek().kind == TokenKind::Keyword(keyword) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn error(&self) -> ErrorKind {
        ErrorKind::ExpressionParse(self.input.trim().to_string())
    }

    /// EXPR := TERM (('&&' | '||') TERM)*
    fn expr(&mut self) -> Result<bool, ErrorKind> {
        let mut value = self.term()?;
        loop {
            if self.eat("and") {
                let rhs = self.term()?;
                value = value && rhs;
            } else if self.eat("or") {
                let rhs = self.term()?;
                value = value || rhs;
            } else {
                return Ok(value);
            }
        }
    }

    /// TERM := '!' TERM | '(' EXPR ')' | DEFCALL
    fn term(&mut self) -> Result<bool, ErrorKind> {
        if self.eat("not") {
            return Ok(!self.term()?);
        }
        if self.eat("open") {
            let value = self.expr()?;
            if !self.eat("close") {
                return Err(self.error());
            }
            return Ok(value);
        }
        if self.eat("defined") {
            return self.defcall();
        }
        Err(self.error())
    }

    /// DEFCALL := '(' IDENT ')' | IDENT   (the `defined` is already consumed)
    fn defcall(&mut self) -> Result<bool, ErrorKind> {
        if self.eat("open") {
            let name = self.identifier()?;
            if !self.eat("close") {
                return Err(self.error());
            }
            return Ok(self.table.is_defined(name));
        }
        let name = self.identifier()?;
        Ok(self.table.is_defined(name))
    }

    fn identifier(&mut self) -> Result<&'a str, ErrorKind> {
        if self.peek().kind != TokenKind::Identifier {
            return Err(self.error());
        }
        Ok(self.bump().lexeme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macro_def::MacroValue;

    fn table(names: &[&str]) -> MacroTable {
        let mut t = MacroTable::new();
        for name in names {
            t.define(*name, MacroValue::Flag).unwrap();
        }
        t
    }

    #[test]
    fn defined_with_and_without_parens() {
        let t = table(&["X"]);
        assert!(eval("defined(X)", &t).unwrap());
        assert!(eval("defined X", &t).unwrap());
        assert!(!eval("defined(Y)", &t).unwrap());
        assert!(!eval("defined Y", &t).unwrap());
    }

    #[test]
    fn negation_and_conjunction() {
        let t = table(&["X"]);
        assert!(eval("defined(X) && !defined(Y)", &t).unwrap());
        assert!(!eval("!defined(X)", &t).unwrap());
        assert!(eval("!!defined(X)", &t).unwrap());
    }

    #[test]
    fn disjunction_short_circuits() {
        let t = table(&["X"]);
        assert!(eval("defined(X) || defined(Y)", &t).unwrap());
        assert!(eval("defined(Y) || defined(X)", &t).unwrap());
    }

    #[test]
    fn operators_fold_left_to_right_without_precedence() {
        // (X || Y) && Z, not X || (Y && Z): C precedence would yield true
        let t = table(&["X"]);
        assert!(!eval("defined(X) || defined(Y) && defined(Z)", &t).unwrap());
    }

    #[test]
    fn parentheses_group() {
        let t = table(&["X"]);
        assert!(eval("defined(X) || (defined(Y) && defined(Z))", &t).unwrap());
        assert!(!eval("(defined(X) || defined(Y)) && defined(Z)", &t).unwrap());
    }

    #[test]
    fn whitespace_is_insignificant() {
        let t = table(&["A", "B"]);
        assert!(eval("  defined ( A )&&defined(B) ", &t).unwrap());
    }

    #[test]
    fn malformed_expressions_carry_the_input() {
        let t = table(&[]);
        for bad in ["", "defined", "defined(", "defined()", "defined(X) &&", "(defined(X)", "X", "1"]
        {
            match eval(bad, &t) {
                Err(ErrorKind::ExpressionParse(s)) => assert_eq!(s, bad.trim()),
                other => panic!("expected parse error for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let t = table(&["X"]);
        assert!(matches!(
            eval("defined(X) defined(X)", &t),
            Err(ErrorKind::ExpressionParse(_))
        ));
    }
}
