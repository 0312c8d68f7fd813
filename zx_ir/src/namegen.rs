//! Per-procedure fresh-name generator: `%N` temporaries and `_L_N` labels,
//! reset at the start of each procedure lowered.

use std::rc::Rc;

#[derive(Debug, Default)]
pub struct NameGen {
    next_temp: u32,
    next_label: u32,
}

impl NameGen {
    pub fn new() -> NameGen {
        NameGen::default()
    }

    pub fn temp(&mut self) -> Rc<str> {
        let name = format!("%{}", self.next_temp);
        self.next_temp += 1;
        Rc::from(name)
    }

    pub fn label(&mut self) -> Rc<str> {
        let name = format!("_L_{}", self.next_label);
        self.next_label += 1;
        Rc::from(name)
    }
}
