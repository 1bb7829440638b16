//! Stack machine executing compiled bytecode.
//!
//! Dispatch reads one opcode at a time from the current frame's
//! instructions, decodes its operands per the static width table, and
//! executes it directly against the shared value stack — no intermediate
//! representation, no JIT.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use mutant_core::bytecode::Bytecode;
use mutant_core::code::{self, Closure, CompiledFunction, Opcode};
use mutant_core::value::{HashPair, Value};

use crate::frame::Frame;

pub const STACK_SIZE: usize = 2048 * 10;
pub const GLOBAL_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 2048 * 10;

/// Tunable VM capacities, defaulting to the sizes above. Exists so an
/// embedder can shrink or grow the machine without touching the dispatch
/// loop, the way the teacher's `CompilerConfig` separates tuning knobs from
/// compilation logic.
#[derive(Debug, Clone, Copy)]
pub struct VmConfig {
    pub stack_size: usize,
    pub global_size: usize,
    pub max_frames: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_size: STACK_SIZE,
            global_size: GLOBAL_SIZE,
            max_frames: MAX_FRAMES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    StackOverflow,
    DivisionByZero,
    UnsupportedBinaryOperation(String, String),
    UnsupportedUnaryOperation(String),
    UnknownOpcode(u8),
    WrongArity { want: usize, got: usize },
    CallingNonFunctionNonBuiltin,
    NotAFunctionConstant,
    UnhashableKey(String),
    UnsupportedIndex(String),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::StackOverflow => write!(f, "stack overflow"),
            VmError::DivisionByZero => write!(f, "division by zero"),
            VmError::UnsupportedBinaryOperation(a, b) => {
                write!(f, "unsupported types for binary operation: {} {}", a, b)
            }
            VmError::UnsupportedUnaryOperation(t) => write!(f, "unsupported type for negation: {}", t),
            VmError::UnknownOpcode(b) => write!(f, "unknown opcode {}", b),
            VmError::WrongArity { want, got } => {
                write!(f, "wrong number of arguments. want={}, got={}", want, got)
            }
            VmError::CallingNonFunctionNonBuiltin => {
                write!(f, "calling non-function and non-built-in")
            }
            VmError::NotAFunctionConstant => write!(f, "constant is not a function"),
            VmError::UnhashableKey(msg) => write!(f, "{}", msg),
            VmError::UnsupportedIndex(t) => write!(f, "index operator not supported: {}", t),
        }
    }
}

impl std::error::Error for VmError {}

pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    sp: usize,
    globals: Vec<Value>,
    frames: Vec<Frame>,
    max_frames: usize,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        let config = VmConfig::default();
        let globals = vec![Value::Null; config.global_size];
        Self::with_config(bytecode, globals, config)
    }

    /// Resume with globals carried over from a previous run, so a REPL can
    /// keep top-level bindings alive across lines.
    pub fn new_with_global_store(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        Self::with_config(bytecode, globals, VmConfig::default())
    }

    pub fn with_config(bytecode: Bytecode, globals: Vec<Value>, config: VmConfig) -> Self {
        tracing::debug!(
            instructions = bytecode.instructions.len(),
            constants = bytecode.constants.len(),
            "initializing vm"
        );

        let main_fn = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_params: 0,
        };
        let main_closure = Rc::new(Closure {
            function: Rc::new(main_fn),
            free: Vec::new(),
        });

        let mut frames = Vec::with_capacity(config.max_frames);
        frames.push(Frame::new(main_closure, 0));

        Vm {
            constants: bytecode.constants,
            stack: vec![Value::Null; config.stack_size],
            sp: 0,
            globals,
            frames,
            max_frames: config.max_frames,
        }
    }

    pub fn last_popped_stack_elem(&self) -> &Value {
        &self.stack[self.sp]
    }

    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    pub fn run(&mut self) -> Result<(), VmError> {
        let result = self.run_inner();
        if let Err(ref e) = result {
            tracing::error!(error = %e, "vm execution failed");
        }
        result
    }

    fn run_inner(&mut self) -> Result<(), VmError> {
        loop {
            let (ip, ins_len) = {
                let frame = self.frames.last().expect("at least one frame");
                (frame.ip, frame.instructions().len())
            };
            if ip >= ins_len as isize - 1 {
                break;
            }

            let ip = {
                let frame = self.frames.last_mut().expect("at least one frame");
                frame.ip += 1;
                frame.ip as usize
            };

            let op_byte = self.frames.last().unwrap().instructions()[ip];
            let op = Opcode::from_byte(op_byte).ok_or(VmError::UnknownOpcode(op_byte))?;

            match op {
                Opcode::Constant => {
                    let idx = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    self.push(self.constants[idx].clone())?;
                }
                Opcode::Pop => {
                    self.pop();
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.exec_binary_operation(op)?
                }
                Opcode::True => self.push(Value::Boolean(true))?,
                Opcode::False => self.push(Value::Boolean(false))?,
                Opcode::Null => self.push(Value::Null)?,
                Opcode::Equal | Opcode::UnEqual | Opcode::Greater => {
                    self.exec_comparison(op)?
                }
                Opcode::Bang => self.exec_bang()?,
                Opcode::Minus => self.exec_minus()?,
                Opcode::JumpFalse => {
                    let pos = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.set_ip(pos as isize - 1);
                    }
                }
                Opcode::Jump => {
                    let pos = self.read_u16(ip + 1) as usize;
                    self.set_ip(pos as isize - 1);
                }
                Opcode::SetGlobal => {
                    let idx = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    let value = self.pop();
                    self.globals[idx] = value;
                }
                Opcode::GetGlobal => {
                    let idx = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    self.push(self.globals[idx].clone())?;
                }
                Opcode::SetLocal => {
                    let idx = self.read_u8(ip + 1) as usize;
                    self.advance_ip(1);
                    let bp = self.frames.last().unwrap().bp;
                    let value = self.pop();
                    self.stack[bp + idx] = value;
                }
                Opcode::GetLocal => {
                    let idx = self.read_u8(ip + 1) as usize;
                    self.advance_ip(1);
                    let bp = self.frames.last().unwrap().bp;
                    self.push(self.stack[bp + idx].clone())?;
                }
                Opcode::GetBuiltin => {
                    let idx = self.read_u8(ip + 1) as usize;
                    self.advance_ip(1);
                    self.push(Value::Builtin(mutant_core::builtins::FUNCTIONS[idx]))?;
                }
                Opcode::GetFree => {
                    let idx = self.read_u8(ip + 1) as usize;
                    self.advance_ip(1);
                    let value = self.frames.last().unwrap().closure.free[idx].clone();
                    self.push(value)?;
                }
                Opcode::Array => {
                    let n = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    let elems = self.stack[self.sp - n..self.sp].to_vec();
                    self.sp -= n;
                    self.push(Value::Array(Rc::new(elems)))?;
                }
                Opcode::Hash => {
                    let n = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    self.exec_hash(n)?;
                }
                Opcode::Index => self.exec_index()?,
                Opcode::Call => {
                    let n = self.read_u8(ip + 1) as usize;
                    self.advance_ip(1);
                    self.exec_call(n)?;
                }
                Opcode::ReturnValue => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("call always pushes a frame");
                    self.sp = frame.bp - 1;
                    self.push(result)?;
                }
                Opcode::Return => {
                    let frame = self.frames.pop().expect("call always pushes a frame");
                    self.sp = frame.bp - 1;
                    self.push(Value::Null)?;
                }
                Opcode::Closure => {
                    let const_idx = self.read_u16(ip + 1) as usize;
                    let n_free = self.read_u8(ip + 3) as usize;
                    self.advance_ip(3);
                    self.exec_closure(const_idx, n_free)?;
                }
                Opcode::CurrentClosure => {
                    let closure = self.frames.last().unwrap().closure.clone();
                    self.push(Value::Closure(closure))?;
                }
            }
        }
        Ok(())
    }

    fn read_u16(&self, pos: usize) -> u16 {
        let ins = self.frames.last().unwrap();
        code::read_u16(&ins.instructions()[pos..])
    }

    fn read_u8(&self, pos: usize) -> u8 {
        let ins = self.frames.last().unwrap();
        code::read_u8(&ins.instructions()[pos..])
    }

    fn advance_ip(&mut self, n: isize) {
        self.frames.last_mut().unwrap().ip += n;
    }

    fn set_ip(&mut self, ip: isize) {
        self.frames.last_mut().unwrap().ip = ip;
    }

    fn push(&mut self, value: Value) -> Result<(), VmError> {
        if self.sp >= self.stack.len() {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    fn exec_binary_operation(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => {
                let result = match op {
                    Opcode::Add => a + b,
                    Opcode::Sub => a - b,
                    Opcode::Mul => a * b,
                    Opcode::Div => {
                        if *b == 0 {
                            return Err(VmError::DivisionByZero);
                        }
                        a / b
                    }
                    _ => unreachable!("caller only dispatches arithmetic opcodes here"),
                };
                self.push(Value::Integer(result))
            }
            (Value::String(a), Value::String(b)) if op == Opcode::Add => {
                self.push(Value::String(Rc::from(format!("{}{}", a, b))))
            }
            _ => Err(VmError::UnsupportedBinaryOperation(
                left.type_name().to_string(),
                right.type_name().to_string(),
            )),
        }
    }

    fn exec_comparison(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop();
        let left = self.pop();

        if let (Value::Integer(a), Value::Integer(b)) = (&left, &right) {
            let result = match op {
                Opcode::Equal => a == b,
                Opcode::UnEqual => a != b,
                Opcode::Greater => a > b,
                _ => unreachable!(),
            };
            return self.push(Value::Boolean(result));
        }

        match op {
            Opcode::Equal => self.push(Value::Boolean(left == right)),
            Opcode::UnEqual => self.push(Value::Boolean(left != right)),
            Opcode::Greater => Err(VmError::UnsupportedBinaryOperation(
                left.type_name().to_string(),
                right.type_name().to_string(),
            )),
            _ => unreachable!(),
        }
    }

    fn exec_bang(&mut self) -> Result<(), VmError> {
        let operand = self.pop();
        self.push(Value::Boolean(!operand.is_truthy()))
    }

    fn exec_minus(&mut self) -> Result<(), VmError> {
        let operand = self.pop();
        match operand {
            Value::Integer(i) => self.push(Value::Integer(-i)),
            other => Err(VmError::UnsupportedUnaryOperation(
                other.type_name().to_string(),
            )),
        }
    }

    fn exec_hash(&mut self, n: usize) -> Result<(), VmError> {
        let start = self.sp - n;
        let mut map = HashMap::new();
        let mut i = start;
        while i < self.sp {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();
            let hash_key = key
                .hash_key()
                .map_err(|e| VmError::UnhashableKey(e.to_string()))?;
            map.insert(hash_key, HashPair { key, value });
            i += 2;
        }
        self.sp = start;
        self.push(Value::Hash(Rc::new(map)))
    }

    fn exec_index(&mut self) -> Result<(), VmError> {
        let index = self.pop();
        let left = self.pop();

        match (&left, &index) {
            (Value::Array(elems), Value::Integer(i)) => {
                if *i < 0 || *i as usize >= elems.len() {
                    self.push(Value::Null)
                } else {
                    self.push(elems[*i as usize].clone())
                }
            }
            (Value::Hash(map), key) => {
                let hash_key = key
                    .hash_key()
                    .map_err(|e| VmError::UnhashableKey(e.to_string()))?;
                self.push(map.get(&hash_key).map(|p| p.value.clone()).unwrap_or(Value::Null))
            }
            (other, _) => Err(VmError::UnsupportedIndex(other.type_name().to_string())),
        }
    }

    fn exec_call(&mut self, n: usize) -> Result<(), VmError> {
        let callee = self.stack[self.sp - 1 - n].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, n),
            Value::Builtin(f) => self.call_builtin(f, n),
            _ => Err(VmError::CallingNonFunctionNonBuiltin),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, n: usize) -> Result<(), VmError> {
        let want = closure.function.num_params as usize;
        if n != want {
            tracing::warn!(want, got = n, "closure called with the wrong number of arguments");
            return Err(VmError::WrongArity { want, got: n });
        }
        if self.frames.len() >= self.max_frames {
            return Err(VmError::StackOverflow);
        }

        let num_locals = closure.function.num_locals as usize;
        let bp = self.sp - n;
        self.frames.push(Frame::new(closure, bp));
        self.sp = bp + num_locals;
        Ok(())
    }

    fn call_builtin(&mut self, f: fn(&[Value]) -> Value, n: usize) -> Result<(), VmError> {
        let args = self.stack[self.sp - n..self.sp].to_vec();
        let result = f(&args);
        self.sp -= n + 1;
        self.push(result)
    }

    fn exec_closure(&mut self, const_idx: usize, n_free: usize) -> Result<(), VmError> {
        let function = match &self.constants[const_idx] {
            Value::CompiledFunction(f) => f.clone(),
            _ => return Err(VmError::NotAFunctionConstant),
        };
        let free = self.stack[self.sp - n_free..self.sp].to_vec();
        self.sp -= n_free;
        self.push(Value::Closure(Rc::new(Closure { function, free })))
    }
}
