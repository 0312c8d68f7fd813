//! Per-procedure label scope (spec component C7): tracks `goto` targets
//! and their definitions so unused or undefined labels can be reported
//! once the procedure body has been fully walked.

use std::collections::HashMap;
use zx_common::{Diagnostics, Position};

struct LabelEntry {
    defined: bool,
    used: bool,
    /// Position of the definition if seen, otherwise the first use.
    position: Position,
}

/// Labels are scoped to a single procedure; callers construct one of these
/// per function body, feed it `define`/`use` calls as the body is walked,
/// then call [`LabelScope::finish`] to flush diagnostics.
#[derive(Default)]
pub struct LabelScope {
    labels: HashMap<String, LabelEntry>,
}

impl LabelScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a label definition (`name:`). Reports an error immediately
    /// if the label was already defined.
    pub fn define(&mut self, name: &str, position: Position, diagnostics: &mut Diagnostics) {
        match self.labels.get_mut(name) {
            Some(entry) if entry.defined => {
                diagnostics.error(position, format!("redefinition of label '{name}'"));
            }
            Some(entry) => {
                entry.defined = true;
                entry.position = position;
            }
            None => {
                self.labels.insert(name.to_string(), LabelEntry { defined: true, used: false, position });
            }
        }
    }

    /// Records a label use (`goto name;`). Inserts a placeholder entry if
    /// this is the first mention of the name.
    pub fn use_label(&mut self, name: &str, position: Position) {
        match self.labels.get_mut(name) {
            Some(entry) => entry.used = true,
            None => {
                self.labels.insert(name.to_string(), LabelEntry { defined: false, used: true, position });
            }
        }
    }

    /// Flushes diagnostics for every label that was used without ever being
    /// defined (error) or defined without ever being used (warning).
    pub fn finish(self, diagnostics: &mut Diagnostics) {
        for (name, entry) in self.labels {
            if entry.used && !entry.defined {
                diagnostics.error(entry.position, format!("label '{name}' is not defined"));
            } else if entry.defined && !entry.used {
                diagnostics.warning(entry.position, format!("unused label '{name}'"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn pos() -> Position {
        Position::new(Rc::from("a.c"), 1, 1, 0)
    }

    #[test]
    fn used_but_never_defined_label_reports_an_error() {
        let mut scope = LabelScope::new();
        scope.use_label("nowhere", pos());
        let mut diags = Diagnostics::new();
        scope.finish(&mut diags);
        assert!(diags.has_errors());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn defined_but_never_used_label_is_only_a_warning() {
        let mut scope = LabelScope::new();
        scope.define("done", pos(), &mut Diagnostics::new());
        let mut diags = Diagnostics::new();
        scope.finish(&mut diags);
        assert!(!diags.has_errors());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn defined_and_used_label_is_silent() {
        let mut scope = LabelScope::new();
        let mut diags = Diagnostics::new();
        scope.define("loop_top", pos(), &mut diags);
        scope.use_label("loop_top", pos());
        scope.finish(&mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn duplicate_definition_is_reported_immediately() {
        let mut scope = LabelScope::new();
        let mut diags = Diagnostics::new();
        scope.define("again", pos(), &mut diags);
        scope.define("again", pos(), &mut diags);
        assert!(diags.has_errors());
    }
}
