//! Parsing, symbol resolution, macro expansion and bytecode emission for
//! Mutant source text.

pub mod compiler;
pub mod eval;
pub mod macro_engine;
pub mod parser;
pub mod symbol_table;

pub use compiler::{CompileError, Compiler, CompilerConfig};
pub use mutant_core::bytecode::Bytecode;
pub use parser::Parser;
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};
