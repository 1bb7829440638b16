//! VM call frame: which closure is running, where its instruction pointer
//! sits, and where its locals start on the shared stack.

use std::rc::Rc;

use mutant_core::code::{Closure, Instructions};

pub struct Frame {
    pub closure: Rc<Closure>,
    /// Byte offset of the instruction about to be dispatched, minus one;
    /// the dispatch loop increments before reading so a fresh frame starts
    /// at instruction 0.
    pub ip: isize,
    /// Stack index where this call's locals (and, underneath them,
    /// arguments) begin.
    pub bp: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, bp: usize) -> Self {
        Frame {
            closure,
            ip: -1,
            bp,
        }
    }

    pub fn instructions(&self) -> &Instructions {
        &self.closure.function.instructions
    }
}
