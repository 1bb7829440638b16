//! Source compilation: `.mut` text to an in-memory [`mutant_core::bytecode::Bytecode`].

use mutant_compiler::macro_engine::{define_macros, expand_macros};
use mutant_compiler::{CompileError, Compiler, Parser};
use mutant_core::bytecode::Bytecode;
use mutant_core::lexer::Lexer;
use mutant_core::value::Environment;

pub enum CompileOutcome {
    Ok(Bytecode),
    ParseErrors(Vec<String>),
    CompileError(CompileError),
}

pub fn compile_source(source: &str) -> CompileOutcome {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    if !parser.errors().is_empty() {
        tracing::warn!(count = parser.errors().len(), "source failed to parse");
        return CompileOutcome::ParseErrors(parser.errors().to_vec());
    }

    let macro_env = Environment::new();
    let program = define_macros(program, &macro_env);
    let program = expand_macros(program, &macro_env);

    let mut compiler = Compiler::new();
    match compiler.compile_program(&program) {
        Ok(()) => {
            tracing::info!("source compiled successfully");
            CompileOutcome::Ok(compiler.bytecode())
        }
        Err(e) => {
            tracing::warn!(error = %e, "source failed to compile");
            CompileOutcome::CompileError(e)
        }
    }
}
