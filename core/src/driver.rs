//! The execution driver: steps a program store through the processor core,
//! resolving `input` literals and `if`/`goto` control annotations along the
//! way (`SPEC_FULL.md` §4.4).
//!
//! Like the teacher's own console loop, this has no notion of a UI event
//! loop -- a headless host just calls [`Driver::step`] (or [`Driver::run`])
//! in a plain loop with a step budget, per §10.

use log::{debug, info, trace};

use crate::catalog::{self, Class};
use crate::codec::{self, Program};
use crate::comment::{self, Directive};
use crate::flags::{InFlags, OutFlags};
use crate::processor::Processor;

/// Number of addressable rows in the program store (mirrors [`codec::ROW_COUNT`]).
pub const ROW_COUNT: usize = codec::ROW_COUNT;

/// Supplies a 16-bit datum for an `IN` operand the current row's control
/// annotation doesn't resolve via an `input` directive.
pub trait InputProvider {
    /// Provide a value for the instruction at `ip`, or `None` to cancel the
    /// run before it executes.
    fn provide(&mut self, ip: u16) -> Option<u16>;
}

/// An [`InputProvider`] that always returns a fixed value, for headless runs
/// with no interactive prompt available.
#[derive(Debug, Clone, Copy)]
pub struct FixedInput(pub u16);

impl InputProvider for FixedInput {
    fn provide(&mut self, _ip: u16) -> Option<u16> {
        Some(self.0)
    }
}

/// An [`InputProvider`] that always cancels, for hosts where an unresolved
/// `IN` operand should abort the run rather than block.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl InputProvider for NoInput {
    fn provide(&mut self, _ip: u16) -> Option<u16> {
        None
    }
}

/// How a [`Driver::run`] call should bound its stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Execute exactly one instruction.
    Step,
    /// Execute until termination, a breakpoint, or IP wraps past the end.
    Run,
    /// Execute until `IP == addr`, or any other stop condition is reached first.
    RunToCursor(u16),
}

/// Why a [`Driver::run`] call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The single requested step (in [`RunMode::Step`]) completed.
    StepComplete,
    /// The new IP's breakpoint attribute is set.
    Breakpoint,
    /// IP advanced past the last row and wrapped to zero.
    Wrapped,
    /// The input provider cancelled before the instruction executed.
    InputCancelled,
    /// `IP` reached the requested cursor address.
    CursorReached,
    /// The step budget was exhausted before any other stop condition.
    StepBudgetExhausted,
}

/// Drives a [`Program`] through a [`Processor`], one microinstruction at a time.
#[derive(Debug, Clone)]
pub struct Driver {
    /// The loaded program store.
    pub program: Program,
    /// The processor core.
    pub processor: Processor,
    /// The address of the row about to execute.
    pub ip: u16,
    /// The address executed on the previous step.
    pub old_ip: u16,
    /// Caller-configured input flags (`CI` is overwritten per step from the
    /// row's carry attribute; the rest are under host control).
    pub in_flags: InFlags,
    /// The output flag word from the most recent step.
    pub out_flags: OutFlags,
}

impl Driver {
    /// Build a driver over `program`, with a processor of the given register width.
    #[must_use]
    pub fn new(program: Program, bits_count: u32) -> Self {
        debug!("instruction catalog: {} entries", crate::catalog::CATALOG.len());
        Self {
            program,
            processor: Processor::new(bits_count),
            ip: 0,
            old_ip: 0,
            in_flags: InFlags::default(),
            out_flags: OutFlags::default(),
        }
    }

    /// Reset the processor core and IP, keeping the loaded program.
    pub fn reset(&mut self) {
        self.processor.reset();
        self.ip = 0;
        self.old_ip = 0;
        self.out_flags = OutFlags::default();
    }

    fn resolve_input(&self, control: &str, ip: u16, provider: &mut impl InputProvider) -> Option<u16> {
        comment::parse_input(control).or_else(|| provider.provide(ip))
    }

    /// Execute exactly one microinstruction, per the algorithm in
    /// `SPEC_FULL.md` §4.4. Returns the [`StopReason`] that would end a
    /// [`RunMode::Step`] run; the caller decides whether to keep stepping.
    pub fn step(&mut self, provider: &mut impl InputProvider) -> StopReason {
        let word = self.program.rows[self.ip as usize].word;
        let control = self.program.rows[self.ip as usize].control.clone();
        let opcode = word & 0x1ff;
        let entry = catalog::decode(opcode).map(|(_, e)| e);

        let needs_in = entry.is_some_and(|e| e.operands.iter().any(|o| o.class == Class::In));
        let di = if needs_in {
            match self.resolve_input(&control, self.ip, provider) {
                Some(v) => v,
                None => {
                    info!("input cancelled at IP={}, run terminated", self.ip);
                    return StopReason::InputCancelled;
                }
            }
        } else {
            0
        };

        let mut in_flags = self.in_flags;
        in_flags.set_ci(codec::carry_value(word));

        let res = self.processor.execute(word, di, in_flags);
        self.out_flags = res.flags;
        trace!("step IP={} opcode={:#05x} matched={}", self.ip, opcode, res.matched);

        self.old_ip = self.ip;
        let directive = comment::parse(&control).unwrap_or(None);
        let (next_ip, wrapped) = match directive {
            Some(Directive::If { flag_bit, true_addr, false_addr }) => {
                let target = if self.out_flags.branch_bit(flag_bit) { true_addr } else { false_addr };
                (target, false)
            }
            Some(Directive::Goto { addr }) => (addr, false),
            None => {
                let next = self.ip as usize + 1;
                if next >= ROW_COUNT {
                    (0, true)
                } else {
                    (next as u16, false)
                }
            }
        };
        self.ip = next_ip;

        if codec::has_breakpoint(self.program.rows[self.ip as usize].word) {
            debug!("breakpoint hit at IP={}", self.ip);
            return StopReason::Breakpoint;
        }
        if wrapped {
            info!("program counter wrapped past the end of the store");
            return StopReason::Wrapped;
        }
        StopReason::StepComplete
    }

    /// Run under `mode`, stepping at most `step_budget` times (the headless
    /// stand-in for the windowed editor's cooperative event-loop yield).
    pub fn run(&mut self, mode: RunMode, provider: &mut impl InputProvider, step_budget: u32) -> StopReason {
        match mode {
            RunMode::Step => self.step(provider),
            RunMode::Run => {
                for _ in 0..step_budget {
                    match self.step(provider) {
                        StopReason::StepComplete => {}
                        other => return other,
                    }
                }
                StopReason::StepBudgetExhausted
            }
            RunMode::RunToCursor(addr) => {
                for _ in 0..step_budget {
                    match self.step(provider) {
                        StopReason::StepComplete => {
                            if self.ip == addr {
                                return StopReason::CursorReached;
                            }
                        }
                        other => return other,
                    }
                }
                StopReason::StepBudgetExhausted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Driver, FixedInput, NoInput, RunMode, StopReason};
    use crate::codec::{Program, Row};

    fn single_row_program(word: u16, control: &str) -> Program {
        let mut program = Program::new();
        program.rows[0] = Row {
            word,
            control: control.to_string(),
            comment: String::new(),
        };
        program
    }

    #[test]
    fn seed_scenario_conditional_branch_via_annotation() {
        let mut program = Program::new();
        // row 5: "WR := WR + DI + C" (sets CO per inputs), branches on CO.
        program.rows[5] = Row {
            word: 0b000000000,
            control: "ЕСЛИ П ТО 100 ИНАЧЕ 10".to_string(),
            comment: String::new(),
        };

        let mut driver = Driver::new(program.clone(), 16);
        driver.ip = 5;
        driver.processor.wr = 0xffff;
        let reason = driver.step(&mut FixedInput(0x0001)); // forces CO=1
        assert_eq!(reason, StopReason::StepComplete);
        assert!(driver.out_flags.co());
        assert_eq!(driver.ip, 100);

        let mut driver = Driver::new(program, 16);
        driver.ip = 5;
        driver.processor.wr = 0x0001;
        let reason = driver.step(&mut FixedInput(0x0001)); // no carry out
        assert_eq!(reason, StopReason::StepComplete);
        assert!(!driver.out_flags.co());
        assert_eq!(driver.ip, 10);
    }

    #[test]
    fn seed_scenario_unconditional_jump() {
        let program = single_row_program(crate::catalog::NOP, "GOTO 0");
        let mut driver = Driver::new(program, 16);
        driver.ip = 7;
        let reason = driver.step(&mut NoInput);
        assert_eq!(reason, StopReason::StepComplete);
        assert_eq!(driver.ip, 0);
    }

    #[test]
    fn seed_scenario_input_literal_binding() {
        // "REG := WR + DI + C" (catalog entry 9) consumes DI; row 3's control
        // annotation supplies it, so the provider must never be consulted.
        let opcode = 0b100000000u16;
        let program = single_row_program(opcode, "INPUT 0000 0000 1111 1111");
        let mut driver = Driver::new(program, 16);
        driver.ip = 3;

        struct PanicIfAsked;
        impl super::InputProvider for PanicIfAsked {
            fn provide(&mut self, _ip: u16) -> Option<u16> {
                panic!("input provider should not have been consulted");
            }
        }

        driver.step(&mut PanicIfAsked);
        assert_eq!(driver.processor.reg[0], 0x00ff);
    }

    #[test]
    fn input_cancellation_stops_the_run_without_executing() {
        let opcode = 0b100000000u16; // "REG := WR + DI + C", consumes IN
        let program = single_row_program(opcode, "");
        let mut driver = Driver::new(program, 16);
        driver.processor.wr = 0x1234;
        let reason = driver.step(&mut NoInput);
        assert_eq!(reason, StopReason::InputCancelled);
        assert_eq!(driver.processor.reg[0], 0);
        assert_eq!(driver.ip, 0);
    }

    #[test]
    fn breakpoint_attribute_stops_the_run() {
        let mut program = Program::new();
        program.rows[0] = Row { word: crate::catalog::NOP, control: String::new(), comment: String::new() };
        program.rows[1].word |= 1 << 15; // breakpoint attribute
        let mut driver = Driver::new(program, 16);
        let reason = driver.step(&mut NoInput);
        assert_eq!(reason, StopReason::Breakpoint);
        assert_eq!(driver.ip, 1);
    }

    #[test]
    fn run_to_cursor_stops_exactly_at_the_requested_address() {
        let mut program = Program::new();
        for i in 0..5u16 {
            program.rows[i as usize] = Row { word: crate::catalog::NOP, control: String::new(), comment: String::new() };
        }
        let mut driver = Driver::new(program, 16);
        let reason = driver.run(RunMode::RunToCursor(3), &mut NoInput, 100);
        assert_eq!(reason, StopReason::CursorReached);
        assert_eq!(driver.ip, 3);
    }

    #[test]
    fn run_mode_honors_step_budget() {
        let program = Program::new();
        let mut driver = Driver::new(program, 16);
        let reason = driver.run(RunMode::Run, &mut NoInput, 3);
        assert_eq!(reason, StopReason::StepBudgetExhausted);
        assert_eq!(driver.ip, 3);
    }
}
