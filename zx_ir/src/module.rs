//! The top-level IR container: an ordered list of variable and procedure
//! declarations, in source order.

use crate::proc::Decl;

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
}
