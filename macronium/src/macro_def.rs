use std::collections::HashMap;

use regex::Regex;

use crate::error::ErrorKind;
use crate::token::{DEFAULT_RULES, TokenKind, Tokenizer};

/// The value bound to a macro name
#[derive(Clone, Debug)]
pub enum MacroValue {
    /// Defined with no replacement text; participates only in `defined(…)`
    Flag,
    /// Object-like replacement, substituted verbatim on identifier match
    Text(String),
    /// Integer replacement, formatted as decimal when substituted
    Number(i64),
    /// Function-like macro with a compiled call-site substitutor
    Function(FunctionMacro),
}

/// One piece of a compiled replacement: literal text or a parameter slot
#[derive(Clone, Debug)]
enum Segment {
    Literal(String),
    Param(usize),
}

/// A compiled function-like macro
///
/// Built once from `#define NAME(a, b, …) REPLACEMENT`: the replacement is
/// parsed into literal spans and parameter indices (whole-identifier
/// matching, so a parameter `x` never rewrites part of `xx`), and a
/// call-site pattern is generated for the macro's arity. Applying the macro
/// rewrites every `NAME(arg, …)` in a line by rendering the captured
/// arguments into the template.
///
/// Arguments may not contain commas or nested parentheses.
#[derive(Clone, Debug)]
pub struct FunctionMacro {
    name: String,
    arity: usize,
    call_site: Regex,
    template: Vec<Segment>,
    /// Definition order; queued substitutors run in this order
    seq: u64,
}

impl FunctionMacro {
    /// Compile a function-like macro from its name, parameter list, and
    /// replacement text
    #[must_use]
    pub fn new(name: &str, params: &[String], replacement: &str) -> Self {
        let template = compile_template(params, replacement);
        let pattern = call_site_pattern(name, params.len());
        let call_site =
            Regex::new(&pattern).unwrap_or_else(|e| panic!("bad call-site pattern: {e}"));
        FunctionMacro { name: name.to_string(), arity: params.len(), call_site, template, seq: 0 }
    }

    /// The macro's name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of parameters
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Rewrite every call site of this macro in `line`
    #[must_use]
    pub fn apply(&self, line: &str) -> String {
        self.call_site
            .replace_all(line, |caps: &regex::Captures| {
                let mut out = String::new();
                for segment in &self.template {
                    match segment {
                        Segment::Literal(text) => out.push_str(text),
                        Segment::Param(i) => {
                            out.push_str(caps.get(i + 1).map_or("", |m| m.as_str()));
                        }
                    }
                }
                out
            })
            .into_owned()
    }
}

/// Parse the replacement into literal spans and parameter slots by
/// re-tokenizing it, which guarantees identifier-boundary substitution.
fn compile_template(params: &[String], replacement: &str) -> Vec<Segment> {
    let mut template = Vec::new();
    let mut literal = String::new();
    for tok in Tokenizer::new(replacement, &DEFAULT_RULES) {
        if tok.kind == TokenKind::Eof {
            break;
        }
        if tok.kind == TokenKind::Identifier
            && let Some(pos) = params.iter().position(|p| p == tok.lexeme)
        {
            if !literal.is_empty() {
                template.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            template.push(Segment::Param(pos));
            continue;
        }
        literal.push_str(&replacement[tok.start..tok.end]);
    }
    if !literal.is_empty() {
        template.push(Segment::Literal(literal));
    }
    template
}

/// Call-site pattern tailored to arity: each argument is a non-greedy run
/// up to the next comma or close paren, with optional surrounding
/// whitespace. The low arities are spelled out; higher ones are generated.
fn call_site_pattern(name: &str, arity: usize) -> String {
    let name = regex::escape(name);
    match arity {
        0 => format!(r"\b{name}\s*\(\s*\)"),
        1 => format!(r"\b{name}\s*\(\s*([^,()]*?)\s*\)"),
        2 => format!(r"\b{name}\s*\(\s*([^,()]*?)\s*,\s*([^,()]*?)\s*\)"),
        n => {
            let mut pattern = format!(r"\b{name}\s*\(\s*");
            for i in 0..n {
                if i > 0 {
                    pattern.push_str(r"\s*,\s*");
                }
                pattern.push_str(r"([^,()]*?)");
            }
            pattern.push_str(r"\s*\)");
            pattern
        }
    }
}

/// Mapping from identifier to [`MacroValue`]
///
/// Keys are unique: redefinition through [`MacroTable::define`] is an error
/// unless the caller explicitly overrides. Keys are expected to be
/// identifiers (`[_A-Za-z][_A-Za-z0-9]*`); directive parsing enforces this
/// for user input.
#[derive(Clone, Debug, Default)]
pub struct MacroTable {
    entries: HashMap<String, MacroValue>,
    next_seq: u64,
}

impl MacroTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        MacroTable::default()
    }

    /// Bind `name`, failing if it is already bound
    pub fn define<S: Into<String>>(&mut self, name: S, value: MacroValue) -> Result<(), ErrorKind> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(ErrorKind::Redefinition(name));
        }
        self.insert(name, value);
        Ok(())
    }

    /// Bind `name`, replacing any existing binding
    pub fn define_override<S: Into<String>>(&mut self, name: S, value: MacroValue) {
        self.insert(name.into(), value);
    }

    fn insert(&mut self, name: String, mut value: MacroValue) {
        if let MacroValue::Function(mac) = &mut value {
            mac.seq = self.next_seq;
            self.next_seq += 1;
        }
        self.entries.insert(name, value);
    }

    /// Remove a binding; absent names are ignored
    pub fn undef(&mut self, name: &str) {
        self.entries.remove(name);
    }

    /// Whether `name` is bound
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up a binding
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MacroValue> {
        self.entries.get(name)
    }

    /// Number of bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand one content line against this table
    ///
    /// Single pass over identifiers: flags erase, text and numbers
    /// substitute, function macros stay in place and their substitutors are
    /// queued for a second pass over the whole line in definition order.
    /// Produced text is not rescanned for further macros.
    #[must_use]
    pub fn expand_line(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut pending: Vec<&FunctionMacro> = Vec::new();
        for tok in Tokenizer::new(line, &DEFAULT_RULES) {
            if tok.kind == TokenKind::Eof {
                break;
            }
            if tok.kind == TokenKind::Identifier {
                match self.entries.get(tok.lexeme) {
                    Some(MacroValue::Flag) => continue,
                    Some(MacroValue::Text(text)) => {
                        out.push_str(text);
                        continue;
                    }
                    Some(MacroValue::Number(n)) => {
                        out.push_str(&n.to_string());
                        continue;
                    }
                    Some(MacroValue::Function(mac)) => {
                        out.push_str(&line[tok.start..tok.end]);
                        if !pending.iter().any(|p| p.name == mac.name) {
                            pending.push(mac);
                        }
                        continue;
                    }
                    None => {}
                }
            }
            out.push_str(&line[tok.start..tok.end]);
        }
        pending.sort_by_key(|mac| mac.seq);
        let mut line = out;
        for mac in pending {
            line = mac.apply(&line);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(defs: &[(&str, MacroValue)]) -> MacroTable {
        let mut t = MacroTable::new();
        for (name, value) in defs {
            t.define(*name, value.clone()).unwrap();
        }
        t
    }

    #[test]
    fn flag_expands_to_nothing() {
        let t = table(&[("DEBUG", MacroValue::Flag)]);
        assert_eq!(t.expand_line("a DEBUG b"), "a  b");
    }

    #[test]
    fn text_substitutes_verbatim() {
        let t = table(&[("LEET", MacroValue::Text("0x1337".to_string()))]);
        assert_eq!(t.expand_line("int x = LEET;"), "int x = 0x1337;");
    }

    #[test]
    fn number_formats_as_decimal() {
        let t = table(&[("N", MacroValue::Number(42))]);
        assert_eq!(t.expand_line("x[N]"), "x[42]");
    }

    #[test]
    fn identifiers_inside_strings_are_untouched() {
        let t = table(&[("N", MacroValue::Number(42))]);
        assert_eq!(t.expand_line("puts(\"N\"); x = N;"), "puts(\"N\"); x = 42;");
    }

    #[test]
    fn substring_identifiers_are_untouched() {
        let t = table(&[("N", MacroValue::Number(42))]);
        assert_eq!(t.expand_line("int NN = N;"), "int NN = 42;");
    }

    #[test]
    fn function_macro_two_args() {
        let mac = FunctionMacro::new(
            "MAX",
            &["x".to_string(), "y".to_string()],
            "((x)>(y)?(x):(y))",
        );
        assert_eq!(mac.apply("int z = MAX(a, b);"), "int z = ((a)>(b)?(a):(b));");
    }

    #[test]
    fn function_macro_zero_args_requires_parens() {
        let mac = FunctionMacro::new("VER", &[], "5");
        assert_eq!(mac.apply("x = VER();"), "x = 5;");
        assert_eq!(mac.apply("x = VER;"), "x = VER;");
    }

    #[test]
    fn function_macro_three_args_uses_generated_pattern() {
        let params = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mac = FunctionMacro::new("MID", &params, "b");
        assert_eq!(mac.apply("MID(1, 2, 3)"), "2");
    }

    #[test]
    fn parameter_substitution_is_whole_identifier() {
        let mac = FunctionMacro::new("F", &["x".to_string()], "(xx + x)");
        assert_eq!(mac.apply("F(1)"), "(xx + 1)");
    }

    #[test]
    fn repeated_parameter_renders_every_slot() {
        let mac = FunctionMacro::new("SQ", &["v".to_string()], "((v)*(v))");
        assert_eq!(mac.apply("SQ(n+1)"), "((n+1)*(n+1))");
    }

    #[test]
    fn expand_line_runs_queued_substitutors() {
        let mut t = MacroTable::new();
        t.define(
            "MAX",
            MacroValue::Function(FunctionMacro::new(
                "MAX",
                &["x".to_string(), "y".to_string()],
                "((x)>(y)?(x):(y))",
            )),
        )
        .unwrap();
        assert_eq!(t.expand_line("int z = MAX(a, b);"), "int z = ((a)>(b)?(a):(b));");
    }

    #[test]
    fn queued_substitutors_run_in_definition_order() {
        let mut t = MacroTable::new();
        t.define("WRAP", MacroValue::Function(FunctionMacro::new("WRAP", &["x".to_string()], "[x]")))
            .unwrap();
        t.define("PICK", MacroValue::Function(FunctionMacro::new("PICK", &["x".to_string()], "x")))
            .unwrap();
        // WRAP was defined first, so it rewrites first; once the inner call
        // is gone, PICK's call site becomes matchable and rewrites too
        assert_eq!(t.expand_line("PICK(WRAP(a))"), "[a]");
    }

    #[test]
    fn redefinition_is_an_error() {
        let mut t = MacroTable::new();
        t.define("X", MacroValue::Flag).unwrap();
        assert!(matches!(t.define("X", MacroValue::Flag), Err(ErrorKind::Redefinition(_))));
    }

    #[test]
    fn override_and_undef() {
        let mut t = MacroTable::new();
        t.define("X", MacroValue::Number(1)).unwrap();
        t.define_override("X", MacroValue::Number(2));
        assert_eq!(t.expand_line("X"), "2");
        t.undef("X");
        t.undef("X"); // absent names are ignored
        assert_eq!(t.expand_line("X"), "X");
    }
}
