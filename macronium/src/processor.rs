use std::mem;
use std::sync::LazyLock;

use log::{debug, trace};
use regex::Regex;

use crate::config::{IncludeContext, IncludeKind};
use crate::error::{ErrorKind, PreprocessError};
use crate::expr;
use crate::macro_def::{FunctionMacro, MacroValue};
use crate::state::State;
use crate::token::IDENT_PATTERN;

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(\w*)\s*(.*)$").unwrap_or_else(|e| panic!("bad pattern: {e}")));
static DEFINE_FLAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({IDENT_PATTERN})\s*$")).unwrap_or_else(|e| panic!("bad pattern: {e}"))
});
static DEFINE_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({IDENT_PATTERN})\s+(.*?)\s*$"))
        .unwrap_or_else(|e| panic!("bad pattern: {e}"))
});
static DEFINE_FUNC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({IDENT_PATTERN})\(([^)]*)\)\s*(.*?)\s*$"))
        .unwrap_or_else(|e| panic!("bad pattern: {e}"))
});
static PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{IDENT_PATTERN}$")).unwrap_or_else(|e| panic!("bad pattern: {e}"))
});
static INCLUDE_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"([^"]+)"$"#).unwrap_or_else(|e| panic!("bad pattern: {e}")));
static INCLUDE_ANGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<([^>]+)>$").unwrap_or_else(|e| panic!("bad pattern: {e}")));

/// Drain the state's screener through the line processor and join the
/// surviving output lines.
pub(crate) fn run(state: &mut State) -> Result<String, PreprocessError> {
    let mut output: Vec<String> = Vec::new();
    while let Some(line) = state.next_line() {
        trace!("[{:04}] {line}", state.lineno());
        if let Some(text) = process_line(state, &line)? {
            output.push(text);
        }
    }
    if state.level() != 0 {
        return Err(located(
            state,
            ErrorKind::UnbalancedConditional("unterminated #if/#ifdef/#ifndef".to_string()),
        ));
    }
    Ok(output.join("\n"))
}

fn located(state: &State, kind: ErrorKind) -> PreprocessError {
    PreprocessError::new(kind, state.file.clone(), state.lineno())
}

fn split_directive(line: &str) -> Option<(&str, &str)> {
    let caps = DIRECTIVE.captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Process one logical line, returning the text it contributes to the
/// output, if any.
///
/// Conditional directives act on the state machine first, so an `#endif`
/// inside a skipped region still closes it. While suppressed, everything
/// else is discarded. `#define`/`#undef`/`#error`/`#pragma` are interpreted
/// on the raw directive so redefinition checks see the literal macro name;
/// macro expansion then applies, and `#include` plus the unknown-directive
/// check run on the expanded line.
fn process_line(state: &mut State, line: &str) -> Result<Option<String>, PreprocessError> {
    if let Some((cmd, rest)) = split_directive(line) {
        match cmd {
            "ifdef" => {
                let name = rest.split_whitespace().next().unwrap_or("");
                let taken = state.defines.is_defined(name);
                state.open_block(taken);
                return Ok(None);
            }
            "ifndef" => {
                let name = rest.split_whitespace().next().unwrap_or("");
                let taken = !state.defines.is_defined(name);
                state.open_block(taken);
                return Ok(None);
            }
            "if" => {
                if state.is_skipping() {
                    state.open_block(false);
                } else {
                    let taken = expr::eval(rest, &state.defines).map_err(|k| located(state, k))?;
                    state.open_block(taken);
                }
                return Ok(None);
            }
            "elif" => {
                state.close_arm("#elif").map_err(|k| located(state, k))?;
                if state.arm_already_taken() {
                    state.suppress_arm();
                } else if !state.is_skipping() {
                    let taken = expr::eval(rest, &state.defines).map_err(|k| located(state, k))?;
                    state.arm(taken);
                }
                return Ok(None);
            }
            "else" => {
                state.close_arm("#else").map_err(|k| located(state, k))?;
                if state.arm_already_taken() {
                    state.suppress_arm();
                }
                // "#else if defined(X)" is not an #elif; the tail is content
                // of the else arm
                if !rest.is_empty() && !state.is_skipping() {
                    return Ok(Some(state.defines.expand_line(rest)));
                }
                return Ok(None);
            }
            "endif" => {
                state.close_block().map_err(|k| located(state, k))?;
                return Ok(None);
            }
            _ => {}
        }

        if state.is_skipping() {
            return Ok(None);
        }

        match cmd {
            "define" => {
                handle_define(state, rest)?;
                return Ok(None);
            }
            "undef" => {
                handle_undef(state, rest)?;
                return Ok(None);
            }
            "error" => return Err(located(state, ErrorKind::User(error_message(rest)))),
            "pragma" => return Ok(None),
            _ => {} // #include and unknown directives see the expanded line
        }
    } else if state.is_skipping() {
        return Ok(None);
    }

    let expanded = state.defines.expand_line(line);
    if let Some((cmd, rest)) = split_directive(&expanded) {
        return match cmd {
            "include" => handle_include(state, rest),
            "define" => {
                handle_define(state, rest)?;
                Ok(None)
            }
            "undef" => {
                handle_undef(state, rest)?;
                Ok(None)
            }
            "error" => Err(located(state, ErrorKind::User(error_message(rest)))),
            "pragma" => Ok(None),
            // conditional keywords were consumed above; expansion-produced
            // ones are not directives and pass through as content
            "if" | "ifdef" | "ifndef" | "elif" | "else" | "endif" => Ok(Some(expanded.clone())),
            _ => Err(located(state, ErrorKind::UnknownDirective(format!("#{cmd}")))),
        };
    }
    Ok(Some(expanded))
}

fn error_message(rest: &str) -> String {
    if rest.is_empty() { "#error".to_string() } else { rest.to_string() }
}

/// Install a macro from `#define`. Three forms, tried in order: bare
/// identifier, identifier + whitespace + replacement, identifier +
/// parameter list + replacement.
fn handle_define(state: &mut State, rest: &str) -> Result<(), PreprocessError> {
    if let Some(caps) = DEFINE_FLAG.captures(rest) {
        define(state, &caps[1], MacroValue::Flag)
    } else if let Some(caps) = DEFINE_TEXT.captures(rest) {
        define(state, &caps[1], MacroValue::Text(caps[2].to_string()))
    } else if let Some(caps) = DEFINE_FUNC.captures(rest) {
        let name = caps[1].to_string();
        let params = parse_params(state, &caps[2])?;
        let mac = FunctionMacro::new(&name, &params, &caps[3]);
        define(state, &name, MacroValue::Function(mac))
    } else {
        Err(located(state, ErrorKind::MalformedDirective(format!("define {rest}"))))
    }
}

fn define(state: &mut State, name: &str, value: MacroValue) -> Result<(), PreprocessError> {
    debug!("#define {name} at {}:{}", state.file, state.lineno());
    state.defines.define(name, value).map_err(|k| located(state, k))
}

fn parse_params(state: &State, list: &str) -> Result<Vec<String>, PreprocessError> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut params = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if !PARAM.is_match(part) {
            return Err(located(
                state,
                ErrorKind::MalformedDirective(format!("bad macro parameter: {part:?}")),
            ));
        }
        params.push(part.to_string());
    }
    Ok(params)
}

fn handle_undef(state: &mut State, rest: &str) -> Result<(), PreprocessError> {
    let Some(name) = rest.split_whitespace().next() else {
        return Err(located(state, ErrorKind::MalformedDirective("undef".to_string())));
    };
    debug!("#undef {name} at {}:{}", state.file, state.lineno());
    state.defines.undef(name);
    Ok(())
}

/// Recurse into an included file. The child pipeline inherits the macro
/// table and its mutations survive the return; the child's output replaces
/// the `#include` line.
fn handle_include(state: &mut State, rest: &str) -> Result<Option<String>, PreprocessError> {
    let rest = rest.trim();
    let (path, kind) = if let Some(caps) = INCLUDE_QUOTE.captures(rest) {
        (caps[1].to_string(), IncludeKind::Local)
    } else if let Some(caps) = INCLUDE_ANGLE.captures(rest) {
        (caps[1].to_string(), IncludeKind::System)
    } else {
        return Err(located(state, ErrorKind::MalformedDirective(format!("include {rest}"))));
    };

    let Some(loader) = state.loader.clone() else {
        return Err(located(state, ErrorKind::IncludeNotFound(path)));
    };
    let context = IncludeContext {
        including_file: state.file.clone(),
        include_stack: state.include_stack.clone(),
    };
    let Some(text) = loader(&path, kind, &context) else {
        return Err(located(state, ErrorKind::IncludeNotFound(path)));
    };

    debug!("entering include {path:?} from {}", state.file);
    let mut stack = state.include_stack.clone();
    stack.push(path.clone());
    let defines = mem::take(&mut state.defines);
    let mut child = State::for_include(&text, path, defines, state.loader.clone(), stack);
    let output = run(&mut child)?;
    state.defines = child.into_defines();
    state.defines.define_override("__FILE__", MacroValue::Text(state.file.clone()));
    state.refresh_indent();
    debug!("include done, back in {}", state.file);
    Ok(Some(output))
}
