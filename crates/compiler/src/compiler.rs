//! AST-to-bytecode compiler.
//!
//! Maintains a stack of compilation scopes (one per function nesting
//! level, plus the outermost program scope) and a single shared constant
//! pool. Each scope remembers its last two emitted instructions so `if`
//! compilation can drop a trailing `Pop` by peephole edit.

use std::fmt;
use std::rc::Rc;

use mutant_core::ast::{Expression, Program, Statement};
use mutant_core::bytecode::Bytecode;
use mutant_core::code::{self, CompiledFunction, Instructions, Opcode};
use mutant_core::value::Value;

use crate::symbol_table::{Symbol, SymbolScope, SymbolTable};

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    UndefinedVariable(String),
    UnknownOperator(String),
    MacroLiteralAtCompileTime,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UndefinedVariable(name) => write!(f, "undefined variable {}", name),
            CompileError::UnknownOperator(op) => write!(f, "unknown operator {}", op),
            CompileError::MacroLiteralAtCompileTime => {
                write!(f, "macro literal reached the compiler unexpanded")
            }
        }
    }
}

impl std::error::Error for CompileError {}

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// Tuning knobs separated from compilation logic, mirroring the teacher's
/// `CompilerConfig` extensibility pattern. Only the builtin registration
/// order is currently configurable; a host embedding the compiler with a
/// different built-in set can supply it here instead of patching
/// `mutant_core::builtins`.
pub struct CompilerConfig {
    pub builtins: &'static [&'static str],
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            builtins: mutant_core::builtins::NAMES,
        }
    }
}

pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        let mut symbol_table = SymbolTable::new();
        for (i, name) in config.builtins.iter().enumerate() {
            symbol_table.define_builtin(i, name);
        }

        Compiler {
            constants: Vec::new(),
            symbol_table,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Resume compiling with constants and bindings carried over from a
    /// previous call, so a REPL can treat each line as an extension of the
    /// same program.
    pub fn new_with_state(constants: Vec<Value>, symbol_table: SymbolTable) -> Self {
        Compiler {
            constants,
            symbol_table,
            scopes: vec![CompilationScope::default()],
        }
    }

    pub fn symbol_table(self) -> SymbolTable {
        self.symbol_table
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_instructions().clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn compile_program(&mut self, program: &Program) -> Result<(), CompileError> {
        for stmt in program {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Let { name, value, .. } => {
                if matches!(value, Expression::FunctionLiteral(_)) {
                    self.symbol_table.define(name);
                    self.compile_expression(value)?;
                } else {
                    self.compile_expression(value)?;
                    self.symbol_table.define(name);
                }
                let symbol = self.symbol_table.resolve(name).expect("just defined");
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index]),
                    _ => self.emit(Opcode::SetLocal, &[symbol.index]),
                };
            }
            Statement::Return { value, .. } => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
            Statement::Expression { value, .. } => {
                self.compile_expression(value)?;
                self.emit(Opcode::Pop, &[]);
            }
            Statement::Block { statements, .. } => {
                for s in statements {
                    self.compile_statement(s)?;
                }
            }
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expression) -> Result<(), CompileError> {
        match expr {
            Expression::IntegerLiteral { value, .. } => {
                let idx = self.add_constant(Value::Integer(*value));
                self.emit(Opcode::Constant, &[idx]);
            }
            Expression::StringLiteral { value, .. } => {
                let idx = self.add_constant(Value::String(Rc::from(value.as_str())));
                self.emit(Opcode::Constant, &[idx]);
            }
            Expression::BooleanLiteral { value, .. } => {
                self.emit(if *value { Opcode::True } else { Opcode::False }, &[]);
            }
            Expression::Prefix { operator, right, .. } => {
                self.compile_expression(right)?;
                match operator.as_str() {
                    "!" => self.emit(Opcode::Bang, &[]),
                    "-" => self.emit(Opcode::Minus, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }
            Expression::Infix {
                operator,
                left,
                right,
                ..
            } => {
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Opcode::Greater, &[]);
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                match operator.as_str() {
                    "+" => self.emit(Opcode::Add, &[]),
                    "-" => self.emit(Opcode::Sub, &[]),
                    "*" => self.emit(Opcode::Mul, &[]),
                    "/" => self.emit(Opcode::Div, &[]),
                    ">" => self.emit(Opcode::Greater, &[]),
                    "==" => self.emit(Opcode::Equal, &[]),
                    "!=" => self.emit(Opcode::UnEqual, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }
            Expression::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                self.compile_expression(condition)?;
                let jump_false_pos = self.emit(Opcode::JumpFalse, &[9999]);

                self.compile_statement(consequence)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }

                let jump_pos = self.emit(Opcode::Jump, &[9999]);
                let after_consequence = self.current_instructions().len();
                self.change_operand(jump_false_pos, after_consequence);

                match alternative {
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                    Some(alt) => {
                        self.compile_statement(alt)?;
                        if self.last_instruction_is(Opcode::Pop) {
                            self.remove_last_pop();
                        }
                    }
                }

                let after_alternative = self.current_instructions().len();
                self.change_operand(jump_pos, after_alternative);
            }
            Expression::Identifier { name, .. } => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol);
            }
            Expression::ArrayLiteral { elements, .. } => {
                for e in elements {
                    self.compile_expression(e)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }
            Expression::HashLiteral { pairs, .. } => {
                for (k, v) in pairs {
                    self.compile_expression(k)?;
                    self.compile_expression(v)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }
            Expression::Index { left, index, .. } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
            Expression::FunctionLiteral(lit) => {
                self.enter_scope();

                if let Some(name) = &lit.name {
                    self.symbol_table.define_function_name(name);
                }
                for param in &lit.parameters {
                    self.symbol_table.define(param);
                }

                self.compile_statement(&lit.body)?;

                if self.last_instruction_is(Opcode::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Opcode::ReturnValue) {
                    self.emit(Opcode::Return, &[]);
                }

                let free_symbols = self.symbol_table.free_symbols.clone();
                let num_locals = self.symbol_table.num_definitions();
                let instructions = self.leave_scope();

                for sym in &free_symbols {
                    self.load_symbol(sym);
                }

                let compiled = CompiledFunction {
                    instructions,
                    num_locals: num_locals as u16,
                    num_params: lit.parameters.len() as u8,
                };
                let const_idx = self.add_constant(Value::CompiledFunction(Rc::new(compiled)));
                self.emit(Opcode::Closure, &[const_idx, free_symbols.len()]);
            }
            Expression::Call {
                function,
                arguments,
                ..
            } => {
                self.compile_expression(function)?;
                for arg in arguments {
                    self.compile_expression(arg)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }
            Expression::MacroLiteral(_) => {
                return Err(CompileError::MacroLiteralAtCompileTime);
            }
        }
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = code::make(op, operands);
        let position = self.current_instructions().len();
        self.current_instructions_mut().extend(instruction);

        let scope = self.scopes.last_mut().expect("at least one scope");
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction {
            opcode: op,
            position,
        });

        position
    }

    fn current_instructions(&self) -> &Instructions {
        &self.scopes.last().expect("at least one scope").instructions
    }

    fn current_instructions_mut(&mut self) -> &mut Instructions {
        &mut self.scopes.last_mut().expect("at least one scope").instructions
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        self.scopes
            .last()
            .and_then(|s| s.last_instruction)
            .is_some_and(|last| last.opcode == op)
    }

    fn remove_last_pop(&mut self) {
        let scope = self.scopes.last_mut().expect("at least one scope");
        let last = scope.last_instruction.expect("caller checked last_instruction_is");
        scope.instructions.truncate(last.position);
        scope.last_instruction = scope.previous_instruction;
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let ins = self.current_instructions_mut();
        ins[position..position + new_instruction.len()].copy_from_slice(new_instruction);
    }

    fn change_operand(&mut self, position: usize, operand: usize) {
        let op = Opcode::from_byte(self.current_instructions()[position])
            .expect("position always points at an opcode byte we emitted");
        let new_instruction = code::make(op, &[operand]);
        self.replace_instruction(position, &new_instruction);
    }

    fn replace_last_pop_with_return(&mut self) {
        let position = self
            .scopes
            .last()
            .and_then(|s| s.last_instruction)
            .expect("caller checked last_instruction_is")
            .position;
        let new_instruction = code::make(Opcode::ReturnValue, &[]);
        self.replace_instruction(position, &new_instruction);

        let scope = self.scopes.last_mut().expect("at least one scope");
        if let Some(last) = scope.last_instruction.as_mut() {
            last.opcode = Opcode::ReturnValue;
        }
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("enter_scope always pairs with leave_scope");
        let outer = std::mem::take(&mut self.symbol_table)
            .pop()
            .expect("enter_scope always pushes an enclosing table");
        self.symbol_table = outer;
        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mutant_core::code::disassemble;
    use mutant_core::lexer::Lexer;

    use crate::parser::Parser;

    fn compile(input: &str) -> Bytecode {
        let mut parser = Parser::new(Lexer::new(input));
        let program = parser.parse_program();
        assert!(parser.errors().is_empty(), "{:?}", parser.errors());
        let mut compiler = Compiler::new();
        compiler.compile_program(&program).expect("compile error");
        compiler.bytecode()
    }

    #[test]
    fn integer_arithmetic_emits_operands_then_operator() {
        let bc = compile("1 + 2");
        let expected = disassemble(&{
            let mut ins = code::make(Opcode::Constant, &[0]);
            ins.extend(code::make(Opcode::Constant, &[1]));
            ins.extend(code::make(Opcode::Add, &[]));
            ins.extend(code::make(Opcode::Pop, &[]));
            ins
        });
        assert_eq!(disassemble(&bc.instructions), expected);
        assert_eq!(bc.constants, vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn less_than_is_rewritten_to_greater_with_swapped_operands() {
        let bc = compile("1 < 2");
        assert_eq!(bc.constants, vec![Value::Integer(2), Value::Integer(1)]);
        assert!(disassemble(&bc.instructions).contains("OpGreater"));
        assert!(!disassemble(&bc.instructions).contains("OpJumpFalse"));
    }

    #[test]
    fn if_without_else_emits_null_branch() {
        let bc = compile("if (1 > 2) { 10 }; 3333;");
        let text = disassemble(&bc.instructions);
        assert!(text.contains("OpJumpFalse"));
        assert!(text.contains("OpNull"));
    }

    #[test]
    fn global_let_uses_set_and_get_global() {
        let bc = compile("let one = 1; let two = one;");
        let text = disassemble(&bc.instructions);
        assert!(text.contains("OpSetGlobal 0"));
        assert!(text.contains("OpGetGlobal 0"));
        assert!(text.contains("OpSetGlobal 1"));
    }

    #[test]
    fn function_literal_with_no_explicit_return_emits_return_value() {
        let bc = compile("fn() { 5 + 10 }");
        let Value::CompiledFunction(func) = &bc.constants[2] else {
            panic!("expected compiled function constant");
        };
        let text = disassemble(&func.instructions);
        assert!(text.ends_with("OpReturnValue\n"));
    }

    #[test]
    fn closure_captures_one_free_variable() {
        let bc = compile("let newAdder = fn(a) { fn(b) { a + b } }; newAdder(2)(3);");
        let text = disassemble(&bc.instructions);
        assert!(text.contains("OpClosure"));
        assert!(text.contains("OpGetFree 0"));
    }

    #[test]
    fn recursive_function_resolves_itself_via_function_scope() {
        let bc = compile("let countDown = fn(x) { countDown(x - 1) }; countDown(1);");
        let inner = bc
            .constants
            .iter()
            .find_map(|c| match c {
                Value::CompiledFunction(f) => Some(f.clone()),
                _ => None,
            })
            .expect("expected a compiled function constant");
        assert!(disassemble(&inner.instructions).contains("OpCurrentClosure"));
    }

    #[test]
    fn call_with_wrong_builtin_arity_still_compiles() {
        let bc = compile(r#"len("one", "two")"#);
        assert!(disassemble(&bc.instructions).contains("OpCall 2"));
    }

    #[test]
    fn with_config_registers_a_custom_builtin_set() {
        let config = CompilerConfig {
            builtins: &["only_builtin"],
        };
        let mut compiler = Compiler::with_config(config);
        let mut parser = Parser::new(Lexer::new("only_builtin"));
        let program = parser.parse_program();
        compiler.compile_program(&program).expect("compile error");
        assert!(disassemble(&compiler.bytecode().instructions).contains("OpGetBuiltin 0"));
    }
}
