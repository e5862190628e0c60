use chrono::Local;

use crate::config::{Config, FileLoader, Predefines};
use crate::error::ErrorKind;
use crate::macro_def::{MacroTable, MacroValue};
use crate::screener::Screener;

/// All mutable state for one compile invocation
///
/// Owns the macro table and the conditional-nesting counters; an `#include`
/// moves the table into a child state and reabsorbs it when the child
/// drains. Invariants: `level` never goes below zero (a file ending with
/// open conditionals fails), and an active suppression depth is always at
/// most `level`.
pub struct State {
    pub(crate) defines: MacroTable,
    lineno: usize,
    level: usize,
    /// Depth at which the current suppression began
    skip_level: Option<usize>,
    /// Depth at which a future `#else`/`#elif` must also be suppressed,
    /// because the chosen arm at that depth was already taken
    else_skip_level: Option<usize>,
    pub(crate) file: String,
    pub(crate) loader: Option<FileLoader>,
    pub(crate) include_stack: Vec<String>,
    screener: Screener,
}

impl State {
    pub(crate) fn new(input: &str, file: String, config: &Config, predefines: &Predefines) -> Self {
        let mut state = State {
            defines: MacroTable::new(),
            lineno: 0,
            level: 0,
            skip_level: None,
            else_skip_level: None,
            file,
            loader: config.loader.clone(),
            include_stack: Vec::new(),
            screener: Screener::new(input),
        };
        state.install_builtins();
        for (name, value) in &config.env {
            state.defines.define_override(name.clone(), value.clone());
        }
        for (name, value) in predefines {
            state.defines.define_override(name.clone(), value.clone());
        }
        state
    }

    /// Child state for an `#include`: inherits the parent's macro table and
    /// rebinds `__FILE__` to the included path.
    pub(crate) fn for_include(
        input: &str,
        file: String,
        defines: MacroTable,
        loader: Option<FileLoader>,
        include_stack: Vec<String>,
    ) -> Self {
        let mut state = State {
            defines,
            lineno: 0,
            level: 0,
            skip_level: None,
            else_skip_level: None,
            file: file.clone(),
            loader,
            include_stack,
            screener: Screener::new(input),
        };
        state.defines.define_override("__FILE__", MacroValue::Text(file));
        state.defines.define_override("__LINE__", MacroValue::Number(0));
        state.defines.define_override("__INDENT__", MacroValue::Number(0));
        state
    }

    fn install_builtins(&mut self) {
        let now = Local::now();
        self.defines.define_override("__FILE__", MacroValue::Text(self.file.clone()));
        self.defines.define_override("__LINE__", MacroValue::Number(0));
        self.defines
            .define_override("__DATE__", MacroValue::Text(now.format("%b %e %Y").to_string()));
        self.defines
            .define_override("__TIME__", MacroValue::Text(now.format("%H:%M:%S").to_string()));
        self.defines.define_override("__INDENT__", MacroValue::Number(0));
    }

    /// Pull the next logical line, advancing the line counter and the
    /// `__LINE__` predefine.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let line = self.screener.next()?;
        self.lineno += 1;
        self.defines.define_override("__LINE__", MacroValue::Number(self.lineno as i64));
        Some(line)
    }

    /// Re-bind `__INDENT__` to the current nesting level. Called on every
    /// nesting change, and after an `#include` reabsorbs a child table that
    /// ended at level zero.
    pub(crate) fn refresh_indent(&mut self) {
        self.defines.define_override("__INDENT__", MacroValue::Number(self.level as i64));
    }

    /// Logical line counter; the line currently being processed, 1-based
    #[must_use]
    pub fn lineno(&self) -> usize {
        self.lineno
    }

    /// Current conditional nesting depth
    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Whether output and side effects are currently suppressed
    #[must_use]
    pub fn is_skipping(&self) -> bool {
        self.skip_level.is_some_and(|skip| self.level >= skip)
    }

    /// Read access to the macro table
    #[must_use]
    pub fn defines(&self) -> &MacroTable {
        &self.defines
    }

    /// Consume the state, yielding the macro table
    #[must_use]
    pub fn into_defines(self) -> MacroTable {
        self.defines
    }

    /// Open a conditional block (`#if`/`#ifdef`/`#ifndef`). Inside a
    /// skipped region the block still nests but arms nothing, so the
    /// enclosing skip terminates correctly.
    pub(crate) fn open_block(&mut self, taken: bool) {
        self.level += 1;
        self.refresh_indent();
        if !self.is_skipping() {
            if taken {
                self.else_skip_level = Some(self.level);
            } else {
                self.skip_level = Some(self.level);
            }
        }
    }

    /// Close the arm ended by `#else`/`#elif`: a suppression that began at
    /// this depth ends here. The else-memory is left intact so a taken arm
    /// keeps suppressing its siblings.
    pub(crate) fn close_arm(&mut self, directive: &str) -> Result<(), ErrorKind> {
        if self.level == 0 {
            return Err(ErrorKind::UnbalancedConditional(format!("{directive} without #if")));
        }
        if self.skip_level == Some(self.level) {
            self.skip_level = None;
        }
        Ok(())
    }

    /// Whether an earlier arm at the current depth was already chosen
    #[must_use]
    pub(crate) fn arm_already_taken(&self) -> bool {
        self.else_skip_level == Some(self.level)
    }

    /// Suppress the arm just opened at the current depth
    pub(crate) fn suppress_arm(&mut self) {
        self.skip_level = Some(self.level);
    }

    /// Record the predicate outcome of a fresh `#elif` arm
    pub(crate) fn arm(&mut self, taken: bool) {
        if taken {
            self.else_skip_level = Some(self.level);
        } else {
            self.skip_level = Some(self.level);
        }
    }

    /// Close a conditional block (`#endif`)
    pub(crate) fn close_block(&mut self) -> Result<(), ErrorKind> {
        if self.level == 0 {
            return Err(ErrorKind::UnbalancedConditional("#endif without #if".to_string()));
        }
        if self.skip_level == Some(self.level) {
            self.skip_level = None;
        }
        if self.else_skip_level == Some(self.level) {
            self.else_skip_level = None;
        }
        self.level -= 1;
        self.refresh_indent();
        Ok(())
    }
}
