//! The top-level Z80 IC container: an ordered list of extern, variable and
//! procedure declarations, in source order.

use crate::proc::Decl;
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub decls: Vec<Decl>,
}

impl Module {
    pub fn new() -> Module {
        Module::default()
    }

    pub fn add(&mut self, decl: Decl) {
        self.decls.push(decl);
    }

    pub fn has_extern(&self, name: &str) -> bool {
        self.decls.iter().any(|d| matches!(d, Decl::Extern(n) if &**n == name))
    }

    /// Declares `name` as an extern the first time it's needed, so codegen
    /// can reference a runtime helper (e.g. `__mul16`) without tracking
    /// which ones it has already pulled in.
    pub fn ensure_extern(&mut self, name: impl Into<Rc<str>>) {
        let name = name.into();
        if !self.has_extern(&name) {
            self.add(Decl::Extern(name));
        }
    }
}
