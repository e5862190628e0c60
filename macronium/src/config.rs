use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::macro_def::MacroValue;

/// Kind of include directive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeKind {
    /// Local include with quotes: `#include "file.h"`
    Local,
    /// System include with angles: `#include <file.h>`
    System,
}

/// Context handed to the file loader on every `#include`
///
/// Search paths, the distinction between quote and angle lookup, and
/// circular-include detection are all the loader's responsibility; the
/// context carries what it needs to implement them.
#[derive(Clone, Debug, Default)]
pub struct IncludeContext {
    /// File containing the `#include` being resolved
    pub including_file: String,
    /// Chain of include paths currently being expanded, outermost first
    pub include_stack: Vec<String>,
}

/// Injected file loader: maps an include path to its text, or `None` when
/// the path cannot be resolved
pub type FileLoader = Rc<dyn Fn(&str, IncludeKind, &IncludeContext) -> Option<String>>;

/// A set of predefined macros installed before user input
pub type Predefines = HashMap<String, MacroValue>;

/// Per-compile configuration
///
/// Constructed once and shared by every compile that uses it; there is no
/// process-wide mutable configuration.
#[derive(Clone, Default)]
pub struct Config {
    /// File loader consulted by `#include` and `compile_file`
    pub loader: Option<FileLoader>,
    /// Default predefines applied to every compile before the call-site
    /// predefines
    pub env: Predefines,
}

impl Config {
    /// Create an empty configuration: no file loader, no default predefines
    #[must_use]
    pub fn new() -> Self {
        Config::default()
    }

    /// Set a custom file loader
    #[must_use]
    pub fn with_loader<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, IncludeKind, &IncludeContext) -> Option<String> + 'static,
    {
        self.loader = Some(Rc::new(f));
        self
    }

    /// Use the filesystem loader with the given search directories
    #[must_use]
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.loader = Some(filesystem_loader(dirs));
        self
    }

    /// Add a default predefine applied to every compile
    #[must_use]
    pub fn with_env_define<S: Into<String>>(mut self, name: S, value: MacroValue) -> Self {
        self.env.insert(name.into(), value);
        self
    }
}

/// A `FileLoader` backed by the filesystem
///
/// Quote includes are resolved against the including file's directory
/// first, then each search directory in order; angle includes consult the
/// search directories only. As a last resort the path is tried as given,
/// relative to the working directory, so a top-level file with no
/// including file still resolves. Paths already on the include stack are
/// refused, which surfaces circular includes as `IncludeNotFound`.
#[must_use]
pub fn filesystem_loader(search_dirs: Vec<PathBuf>) -> FileLoader {
    Rc::new(move |path, kind, ctx| {
        if ctx.include_stack.iter().any(|p| p == path) {
            log::debug!("refusing circular include of {path:?}");
            return None;
        }

        let requested = Path::new(path);
        if requested.is_absolute() {
            return fs::read_to_string(requested).ok();
        }

        if kind == IncludeKind::Local && !ctx.including_file.is_empty() {
            if let Some(dir) = Path::new(&ctx.including_file).parent()
                && let Ok(text) = fs::read_to_string(dir.join(path))
            {
                return Some(text);
            }
        }

        for dir in &search_dirs {
            if let Ok(text) = fs::read_to_string(dir.join(path)) {
                return Some(text);
            }
        }

        fs::read_to_string(requested).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_refuses_paths_already_on_the_stack() {
        let loader = filesystem_loader(Vec::new());
        let ctx = IncludeContext {
            including_file: "a.h".to_string(),
            include_stack: vec!["a.h".to_string(), "b.h".to_string()],
        };
        assert!(loader("b.h", IncludeKind::Local, &ctx).is_none());
    }

    #[test]
    fn loader_falls_back_to_the_path_as_given() {
        // no including file and no search dirs: a working-directory-relative
        // path must still resolve (the top-level file of a compile)
        let loader = filesystem_loader(Vec::new());
        let text = loader("Cargo.toml", IncludeKind::Local, &IncludeContext::default());
        assert!(text.is_some_and(|t| t.contains("macronium")));
    }

    #[test]
    fn env_defines_accumulate() {
        let config = Config::new()
            .with_env_define("A", MacroValue::Flag)
            .with_env_define("B", MacroValue::Number(2));
        assert_eq!(config.env.len(), 2);
    }
}
