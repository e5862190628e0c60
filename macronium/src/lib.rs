#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # C Preprocessor Engine
//!
//! This library implements the subset of the C preprocessor needed to make
//! real-world header files consumable by downstream declaration parsers,
//! such as foreign-function-interface ingesters. It screens raw input into
//! logical lines, tracks conditional compilation, expands object-like and
//! function-like macros, and recurses through `#include`s via an injected
//! file loader.
//!
//! ## Features
//!
//! - Macro expansion (flag, text, number, and function-like macros)
//! - Conditional compilation (`#ifdef`, `#ifndef`, `#if`, `#else`, `#elif`,
//!   `#endif`) with `defined(…)`, `!`, `&&`, `||` expressions
//! - `#include` processing with custom file loaders
//! - Predefined macros: `__FILE__`, `__LINE__`, `__DATE__`, `__TIME__`,
//!   `__INDENT__`
//! - C FFI for integration with native declaration parsers
//!
//! Token pasting (`##`), stringification (`#`), arithmetic `#if`
//! expressions, and variadic macros are out of scope. Macro expansion is a
//! single textual pass: produced text is not rescanned, so chained macros
//! must be staged by the caller.
//!
//! ## Example
//!
//! ```rust
//! use macronium::{Config, Predefines, compile};
//!
//! let source = r#"
//! #define LEET 0x1337
//! #ifdef LEET
//! int x = LEET;
//! #endif
//! "#;
//!
//! let (output, _state) = compile(source, &Config::new(), &Predefines::new()).unwrap();
//! assert_eq!(output, "int x = 0x1337;");
//! ```

mod c_api;
mod config;
mod error;
mod expr;
mod macro_def;
mod processor;
mod screener;
mod state;
mod token;

pub use config::{Config, FileLoader, IncludeContext, IncludeKind, Predefines, filesystem_loader};
pub use error::{ErrorKind, PreprocessError};
pub use macro_def::{FunctionMacro, MacroTable, MacroValue};
pub use state::State;

/// Pseudo-filename used when compiling from a string
pub(crate) const DEFAULT_FILE: &str = "<input>";

/// Run the full pipeline on a string, returning the preprocessed text and
/// the final state (macro table included)
///
/// `predefines` are installed after the configuration's `env` defines and
/// before any user input.
///
/// # Errors
/// Returns [`PreprocessError`] on malformed or unknown directives,
/// unbalanced conditionals, macro redefinition, failed includes, or a fired
/// `#error`; partial output is discarded.
pub fn compile(
    input: &str,
    config: &Config,
    predefines: &Predefines,
) -> Result<(String, State), PreprocessError> {
    let mut state = init(input, config, predefines);
    let output = processor::run(&mut state)?;
    Ok((output, state))
}

/// Load `path` through the file loader, bind `__FILE__` to it, and compile
///
/// When the configuration has no loader, the filesystem is read directly
/// and nested includes resolve relative to the including file.
///
/// # Errors
/// Returns [`PreprocessError`] if the file cannot be loaded or if
/// preprocessing fails.
pub fn compile_file(
    path: &str,
    config: &Config,
    predefines: &Predefines,
) -> Result<(String, State), PreprocessError> {
    let (text, effective) = match &config.loader {
        Some(loader) => {
            let Some(text) = loader(path, IncludeKind::Local, &IncludeContext::default()) else {
                return Err(PreprocessError::new(
                    ErrorKind::IncludeNotFound(path.to_string()),
                    path.to_string(),
                    0,
                ));
            };
            (text, config.clone())
        }
        None => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| PreprocessError::new(ErrorKind::Io(e), path.to_string(), 0))?;
            (text, config.clone().with_search_dirs(Vec::new()))
        }
    };
    let mut state = State::new(&text, path.to_string(), &effective, predefines);
    let output = processor::run(&mut state)?;
    Ok((output, state))
}

/// Construct a compile state without running the driver, for stepwise or
/// inspection use
#[must_use]
pub fn init(input: &str, config: &Config, predefines: &Predefines) -> State {
    State::new(input, DEFAULT_FILE.to_string(), config, predefines)
}
