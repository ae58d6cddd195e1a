//! Main execution loop and opcode dispatch for the stackvm VM.

use stackvm_common::{Address, Instruction, Opcode, Value};
use tracing::{debug, trace};

use crate::error::RuntimeError;
use crate::frame::Frame;
use crate::heap::{Heap, HeapError};
use crate::machine::{Step, Vm};

impl<'a> Vm<'a> {
    /// Execute until the entry function returns or an error occurs.
    ///
    /// Returns the entry function's integer result.
    pub fn execute(&mut self) -> Result<i32, RuntimeError> {
        loop {
            if let Step::Halted(result) = self.step()? {
                return Ok(result);
            }
        }
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Result<Step, RuntimeError> {
        if let Some(result) = self.halted {
            return Ok(Step::Halted(result));
        }

        let code = self.code()?;
        self.at = self.frame.pc;
        let instr = Instruction::decode(code, self.at).map_err(|source| RuntimeError::Decode {
            at: self.location(),
            source,
        })?;
        trace!(
            function = self.frame.function,
            pc = self.at,
            op = instr.opcode.mnemonic(),
            arg = instr.arg,
            stack = self.frame.stack.len(),
            depth = self.call_stack.len(),
            "exec"
        );
        self.frame.pc = self.at + instr.len();

        match instr.opcode {
            // Stack manipulation
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let v = self.pop()?;
                self.push(v);
                self.push(v);
            }
            Opcode::Swap => {
                let v2 = self.pop()?;
                let v1 = self.pop()?;
                self.push(v2);
                self.push(v1);
            }

            // Arithmetic
            Opcode::Iadd => self.exec_arith(i32::wrapping_add)?,
            Opcode::Isub => self.exec_arith(i32::wrapping_sub)?,
            Opcode::Imul => self.exec_arith(i32::wrapping_mul)?,
            Opcode::Idiv => self.exec_division(|x, y| x / y)?,
            Opcode::Irem => self.exec_division(|x, y| x % y)?,
            Opcode::Iand => self.exec_arith(|x, y| x & y)?,
            Opcode::Ior => self.exec_arith(|x, y| x | y)?,
            Opcode::Ixor => self.exec_arith(|x, y| x ^ y)?,
            Opcode::Ishl => self.exec_shift(|x, y| x << y)?,
            Opcode::Ishr => self.exec_shift(|x, y| x >> y)?,

            // Constants
            Opcode::Bipush => self.push(Value::Int(instr.arg_i8() as i32)),
            Opcode::Ildc => self.exec_ildc(&instr)?,
            Opcode::Aldc => self.exec_aldc(&instr)?,
            Opcode::AconstNull => self.push(Value::NULL),

            // Locals
            Opcode::Vload => {
                let v = *self.local(&instr)?;
                self.push(v);
            }
            Opcode::Vstore => {
                let v = self.pop()?;
                *self.local(&instr)? = v;
            }

            // Control
            Opcode::Nop => {}
            Opcode::Athrow => {
                let r = self.pop_ref()?;
                return Err(RuntimeError::UserError {
                    at: self.location(),
                    message: self.message(r),
                });
            }
            Opcode::Assert => {
                let r = self.pop_ref()?;
                let cond = self.pop_int()?;
                if cond == 0 {
                    return Err(RuntimeError::AssertionFailed {
                        at: self.location(),
                        message: self.message(r),
                    });
                }
            }
            Opcode::IfCmpeq => self.exec_if_cmp(&instr, true)?,
            Opcode::IfCmpne => self.exec_if_cmp(&instr, false)?,
            Opcode::IfIcmplt => self.exec_if_icmp(&instr, |x, y| x < y)?,
            Opcode::IfIcmpge => self.exec_if_icmp(&instr, |x, y| x >= y)?,
            Opcode::IfIcmpgt => self.exec_if_icmp(&instr, |x, y| x > y)?,
            Opcode::IfIcmple => self.exec_if_icmp(&instr, |x, y| x <= y)?,
            Opcode::Goto => self.jump(&instr)?,

            // Functions
            Opcode::Return => return self.exec_return(),
            Opcode::Invokestatic => self.exec_invokestatic(&instr)?,
            Opcode::Invokenative => self.exec_invokenative(&instr)?,

            // Memory
            Opcode::New => {
                let addr = self.heap_op(|heap| heap.alloc_block(instr.arg_u8() as usize))?;
                self.push(Value::address(addr));
            }
            Opcode::Imload => {
                let r = self.pop_ref()?;
                let n = self.heap_op(|heap| heap.load_int(r))?;
                self.push(Value::Int(n));
            }
            Opcode::Imstore => {
                let x = self.pop_int()?;
                let r = self.pop_ref()?;
                self.heap_op(|heap| heap.store_int(r, x))?;
            }
            Opcode::Amload => {
                let r = self.pop_ref()?;
                let v = self.heap_op(|heap| heap.load_ref(r))?;
                self.push(Value::Ref(v));
            }
            Opcode::Amstore => {
                let b = self.pop_ref()?;
                let a = self.pop_ref()?;
                self.heap_op(|heap| heap.store_ref(a, b))?;
            }
            Opcode::Cmload => {
                let r = self.pop_ref()?;
                let c = self.heap_op(|heap| heap.load_byte(r))?;
                self.push(Value::Int(c as i8 as i32));
            }
            Opcode::Cmstore => {
                let x = self.pop_int()?;
                let r = self.pop_ref()?;
                self.heap_op(|heap| heap.store_byte(r, x as u8))?;
            }
            Opcode::Aaddf => {
                let r = self.pop_ref()?;
                let addr = self.heap_op(|heap| heap.field(r, instr.arg_u8()))?;
                self.push(Value::address(addr));
            }

            // Arrays
            Opcode::Newarray => {
                let n = self.pop_int()?;
                let addr = self.heap_op(|heap| heap.alloc_array(n, instr.arg_u8()))?;
                self.push(Value::address(addr));
            }
            Opcode::Arraylength => {
                let r = self.pop_ref()?;
                let len = self.heap_op(|heap| heap.array_len(r))?;
                self.push(Value::Int(len as i32));
            }
            Opcode::Aadds => {
                let i = self.pop_int()?;
                let r = self.pop_ref()?;
                let addr = self.heap_op(|heap| heap.element(r, i))?;
                self.push(Value::address(addr));
            }
        }

        self.at = self.frame.pc;
        Ok(Step::Continue)
    }

    /// Run a heap operation, attaching the current location to any failure.
    fn heap_op<T>(
        &mut self,
        op: impl FnOnce(&mut Heap) -> Result<T, HeapError>,
    ) -> Result<T, RuntimeError> {
        let at = self.location();
        op(&mut self.heap).map_err(|e| RuntimeError::from_heap(at, e))
    }

    fn exec_arith(&mut self, op: fn(i32, i32) -> i32) -> Result<(), RuntimeError> {
        let y = self.pop_int()?;
        let x = self.pop_int()?;
        self.push(Value::Int(op(x, y)));
        Ok(())
    }

    /// IDIV and IREM: truncating division with zero and overflow checks.
    fn exec_division(&mut self, op: fn(i32, i32) -> i32) -> Result<(), RuntimeError> {
        let y = self.pop_int()?;
        let x = self.pop_int()?;
        if y == 0 {
            return Err(RuntimeError::DivisionByZero {
                at: self.location(),
            });
        }
        if x == i32::MIN && y == -1 {
            return Err(RuntimeError::DivisionOverflow {
                at: self.location(),
            });
        }
        self.push(Value::Int(op(x, y)));
        Ok(())
    }

    /// ISHL and ISHR: the shift amount must lie in [0, 32).
    fn exec_shift(&mut self, op: fn(i32, u32) -> i32) -> Result<(), RuntimeError> {
        let y = self.pop_int()?;
        let x = self.pop_int()?;
        if !(0..32).contains(&y) {
            return Err(RuntimeError::InvalidShift {
                at: self.location(),
                amount: y,
            });
        }
        self.push(Value::Int(op(x, y as u32)));
        Ok(())
    }

    fn exec_ildc(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let pool = &self.program.int_pool;
        let n = *pool
            .get(instr.arg as usize)
            .ok_or(RuntimeError::PoolIndex {
                at: self.location(),
                pool: "int pool",
                index: instr.arg,
                len: pool.len(),
            })?;
        self.push(Value::Int(n));
        Ok(())
    }

    fn exec_aldc(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let len = self.program.string_pool.len();
        match self.strings {
            Some(object) if (instr.arg as usize) < len => {
                self.push(Value::address(Address {
                    object,
                    offset: instr.arg as u32,
                }));
                Ok(())
            }
            _ => Err(RuntimeError::PoolIndex {
                at: self.location(),
                pool: "string pool",
                index: instr.arg,
                len,
            }),
        }
    }

    /// The local slot named by a VLOAD/VSTORE operand.
    fn local(&mut self, instr: &Instruction) -> Result<&mut Value, RuntimeError> {
        let at = self.location();
        let index = instr.arg_u8() as usize;
        let count = self.frame.locals.len();
        self.frame
            .locals
            .get_mut(index)
            .ok_or(RuntimeError::LocalOutOfRange { at, index, count })
    }

    /// Transfer control to the branch target of `instr`.
    fn jump(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let len = self.code()?.len();
        match instr.branch_target(self.at) {
            Some(target) if target < len => {
                self.frame.pc = target;
                Ok(())
            }
            _ => Err(RuntimeError::BadBranchTarget {
                at: self.location(),
                offset: instr.arg_i16(),
            }),
        }
    }

    /// IF_CMPEQ / IF_CMPNE: compare two values of the same kind.
    fn exec_if_cmp(&mut self, instr: &Instruction, equal: bool) -> Result<(), RuntimeError> {
        let v2 = self.pop()?;
        let v1 = self.pop()?;
        let same = match (v1, v2) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Int(_), found) => {
                return Err(RuntimeError::TypeMismatch {
                    at: self.location(),
                    expected: "int",
                    found,
                })
            }
            (Value::Ref(_), found) => {
                return Err(RuntimeError::TypeMismatch {
                    at: self.location(),
                    expected: "reference",
                    found,
                })
            }
        };
        if same == equal {
            self.jump(instr)?;
        }
        Ok(())
    }

    fn exec_if_icmp(
        &mut self,
        instr: &Instruction,
        cmp: fn(i32, i32) -> bool,
    ) -> Result<(), RuntimeError> {
        let y = self.pop_int()?;
        let x = self.pop_int()?;
        if cmp(x, y) {
            self.jump(instr)?;
        }
        Ok(())
    }

    /// Pop `count` values; the first argument ends up first.
    fn pop_args(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let mut args = vec![Value::Int(0); count];
        for slot in args.iter_mut().rev() {
            *slot = self.pop()?;
        }
        Ok(args)
    }

    fn exec_invokestatic(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let at = self.location();
        let index = instr.arg as usize;
        let info = self
            .program
            .functions
            .get(index)
            .ok_or(RuntimeError::PoolIndex {
                at,
                pool: "function pool",
                index: instr.arg,
                len: self.program.functions.len(),
            })?;

        if let Some(limit) = self.config.max_call_depth {
            if self.call_stack.len() >= limit {
                return Err(RuntimeError::CallDepthExceeded { at, limit });
            }
        }

        let num_args = info.num_args as usize;
        let num_vars = info.num_vars as usize;
        if num_args > num_vars {
            return Err(RuntimeError::LocalOutOfRange {
                at,
                index: num_args - 1,
                count: num_vars,
            });
        }

        let args = self.pop_args(num_args)?;
        let mut callee = Frame::new(index, num_vars);
        callee.locals[..num_args].copy_from_slice(&args);

        debug!(
            caller = self.frame.function,
            callee = index,
            args = num_args,
            depth = self.call_stack.len() + 1,
            "call"
        );
        let caller = std::mem::replace(&mut self.frame, callee);
        self.call_stack.push(caller);
        Ok(())
    }

    fn exec_invokenative(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let at = self.location();
        let info = *self
            .program
            .natives
            .get(instr.arg as usize)
            .ok_or(RuntimeError::PoolIndex {
                at,
                pool: "native pool",
                index: instr.arg,
                len: self.program.natives.len(),
            })?;

        let args = self.pop_args(info.num_args as usize)?;
        debug!(
            native = info.table_index,
            name = self.natives.name(info.table_index).unwrap_or("?"),
            args = args.len(),
            "native call"
        );
        let result = self
            .natives
            .call(info.table_index, &mut self.heap, &args)
            .ok_or(RuntimeError::UnknownNative {
                at,
                table_index: info.table_index,
            })?
            .map_err(|err| RuntimeError::Native {
                at,
                name: self
                    .natives
                    .name(info.table_index)
                    .unwrap_or_default()
                    .to_string(),
                message: err.0,
            })?;
        self.push(result);
        Ok(())
    }

    fn exec_return(&mut self) -> Result<Step, RuntimeError> {
        let value = self.pop()?;
        if !self.frame.stack.is_empty() {
            return Err(RuntimeError::ReturnWithNonEmptyStack {
                at: self.location(),
                remaining: self.frame.stack.len(),
            });
        }

        match self.call_stack.pop() {
            Some(caller) => {
                debug!(
                    callee = self.frame.function,
                    caller = caller.function,
                    depth = self.call_stack.len(),
                    %value,
                    "return"
                );
                self.frame = caller;
                self.at = self.frame.pc;
                self.push(value);
                Ok(Step::Continue)
            }
            None => match value {
                Value::Int(result) => {
                    debug!(result, "entry function returned");
                    self.halted = Some(result);
                    Ok(Step::Halted(result))
                }
                found => Err(RuntimeError::TypeMismatch {
                    at: self.location(),
                    expected: "int",
                    found,
                }),
            },
        }
    }
}
