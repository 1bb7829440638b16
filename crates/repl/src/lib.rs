//! The REPL engine: owns whatever state must persist from one line to the
//! next, independent of how lines are read (`main.rs` wires this to
//! `rustyline`; tests drive it directly).

use mutant_compiler::eval;
use mutant_compiler::macro_engine::{define_macros, expand_macros};
use mutant_compiler::symbol_table::SymbolTable;
use mutant_compiler::{Compiler, Parser};
use mutant_core::lexer::Lexer;
use mutant_core::value::{Environment, Value};
use mutant_runtime::{Vm, GLOBAL_SIZE};

/// Result of feeding one line to the engine: either the value the line
/// produced, or the diagnostics that stopped it from running.
pub enum LineOutcome {
    Value(Value),
    ParseErrors(Vec<String>),
    CompileError(String),
    VmError(String),
}

/// Compiler/VM-backed engine. Each accepted line grows the same constant
/// pool, symbol table, and global store that the previous lines used.
pub struct CompiledEngine {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    globals: Vec<Value>,
}

impl CompiledEngine {
    pub fn new() -> Self {
        CompiledEngine {
            constants: Vec::new(),
            symbol_table: SymbolTable::new(),
            globals: vec![Value::Null; GLOBAL_SIZE],
        }
    }

    pub fn eval_line(&mut self, line: &str) -> LineOutcome {
        let mut parser = Parser::new(Lexer::new(line));
        let program = parser.parse_program();
        if !parser.errors().is_empty() {
            tracing::debug!(count = parser.errors().len(), "line rejected with parser errors");
            return LineOutcome::ParseErrors(parser.errors().to_vec());
        }

        let symbol_table = std::mem::take(&mut self.symbol_table);
        let mut compiler = Compiler::new_with_state(self.constants.clone(), symbol_table);

        if let Err(e) = compiler.compile_program(&program) {
            tracing::debug!(error = %e, "line rejected by the compiler");
            self.symbol_table = compiler.symbol_table();
            return LineOutcome::CompileError(e.to_string());
        }

        let bytecode = compiler.bytecode();
        self.constants = compiler.constants().to_vec();
        self.symbol_table = compiler.symbol_table();

        let globals = std::mem::take(&mut self.globals);
        let mut vm = Vm::new_with_global_store(bytecode, globals);
        if let Err(e) = vm.run() {
            self.globals = vec![Value::Null; GLOBAL_SIZE];
            return LineOutcome::VmError(e.to_string());
        }

        let result = vm.last_popped_stack_elem().clone();
        self.globals = vm.into_globals();
        LineOutcome::Value(result)
    }
}

impl Default for CompiledEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Tree-walking-evaluator engine used in `--macros` mode: macros are
/// expanded away before every line is evaluated directly against a
/// persistent environment, with no bytecode involved.
pub struct MacroEngine {
    env: Environment,
    macro_env: Environment,
}

impl MacroEngine {
    pub fn new() -> Self {
        MacroEngine {
            env: Environment::new(),
            macro_env: Environment::new(),
        }
    }

    pub fn eval_line(&mut self, line: &str) -> LineOutcome {
        let mut parser = Parser::new(Lexer::new(line));
        let program = parser.parse_program();
        if !parser.errors().is_empty() {
            return LineOutcome::ParseErrors(parser.errors().to_vec());
        }

        let program = define_macros(program, &self.macro_env);
        let program = expand_macros(program, &self.macro_env);

        LineOutcome::Value(eval::eval_program(&program, &self.env))
    }
}

impl Default for MacroEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosmetic shell commands handled before a line ever reaches the lexer.
pub enum ShellCommand {
    Clear,
    Exit,
}

pub fn shell_command(line: &str) -> Option<ShellCommand> {
    match line.trim() {
        "clear" | "cls" => Some(ShellCommand::Clear),
        "exit" | "quit" => Some(ShellCommand::Exit),
        _ => None,
    }
}

const PROMPT: &str = ">> ";

trait Engine {
    fn eval_line(&mut self, line: &str) -> LineOutcome;
}

impl Engine for CompiledEngine {
    fn eval_line(&mut self, line: &str) -> LineOutcome {
        CompiledEngine::eval_line(self, line)
    }
}

impl Engine for MacroEngine {
    fn eval_line(&mut self, line: &str) -> LineOutcome {
        MacroEngine::eval_line(self, line)
    }
}

/// Drive an interactive session on stdin/stdout until `exit`/`quit` or EOF.
/// `macros` selects the tree-walking evaluator instead of the compiler/VM.
pub fn run(macros: bool) -> rustyline::Result<()> {
    tracing::info!(macros, "starting repl session");
    let mut editor = rustyline::DefaultEditor::new()?;
    let mut compiled;
    let mut walking;
    let engine: &mut dyn Engine = if macros {
        walking = MacroEngine::new();
        &mut walking
    } else {
        compiled = CompiledEngine::new();
        &mut compiled
    };
    run_loop(&mut editor, engine);
    Ok(())
}

fn run_loop(editor: &mut rustyline::DefaultEditor, engine: &mut dyn Engine) {
    use rustyline::error::ReadlineError;

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());

                if let Some(cmd) = shell_command(&line) {
                    match cmd {
                        ShellCommand::Clear => {
                            print!("\x1B[2J\x1B[1;1H");
                            continue;
                        }
                        ShellCommand::Exit => break,
                    }
                }

                if line.trim().is_empty() {
                    continue;
                }

                match engine.eval_line(&line) {
                    LineOutcome::Value(value) => println!("{}", value.inspect()),
                    LineOutcome::ParseErrors(errors) => {
                        println!("parser errors:");
                        for e in errors {
                            println!("\t{}", e);
                        }
                    }
                    LineOutcome::CompileError(e) => println!("compile error: {}", e),
                    LineOutcome::VmError(e) => println!("vm error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_engine_persists_globals_across_lines() {
        let mut engine = CompiledEngine::new();
        assert!(matches!(engine.eval_line("let a = 5;"), LineOutcome::Value(_)));
        match engine.eval_line("a + 1") {
            LineOutcome::Value(Value::Integer(6)) => {}
            _ => panic!("expected a + 1 == 6"),
        }
    }

    #[test]
    fn compiled_engine_reports_parse_errors() {
        let mut engine = CompiledEngine::new();
        assert!(matches!(engine.eval_line("let = ;"), LineOutcome::ParseErrors(_)));
    }

    #[test]
    fn macro_engine_persists_environment_across_lines() {
        let mut engine = MacroEngine::new();
        assert!(matches!(engine.eval_line("let a = 5;"), LineOutcome::Value(_)));
        match engine.eval_line("a + 1") {
            LineOutcome::Value(Value::Integer(6)) => {}
            _ => panic!("expected a + 1 == 6"),
        }
    }

    #[test]
    fn shell_commands_are_recognized() {
        assert!(matches!(shell_command("exit"), Some(ShellCommand::Exit)));
        assert!(matches!(shell_command("cls"), Some(ShellCommand::Clear)));
        assert!(shell_command("1 + 1").is_none());
    }
}
