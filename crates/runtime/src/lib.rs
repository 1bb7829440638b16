//! Bytecode virtual machine: call frames, the value stack, and dispatch.

pub mod frame;
pub mod vm;

pub use frame::Frame;
pub use vm::{Vm, VmConfig, VmError, GLOBAL_SIZE, MAX_FRAMES, STACK_SIZE};
