#![allow(dead_code)]

use vmtrans::hack::{self, Instruction, Program};
use vmtrans::translator::HALT_LABEL;
use vmtrans::{Options, Translator};

pub const SP: usize = 0;
pub const LCL: usize = 1;
pub const ARG: usize = 2;
pub const THIS: usize = 3;
pub const THAT: usize = 4;

const RAM_SIZE: usize = 0x6001;
const MAX_STEPS: usize = 200_000;

/// Executes resolved Hack instructions.
pub struct Cpu {
    pub ram: Vec<i16>,
    pub a: i16,
    pub d: i16,
    pub pc: usize,
    pub program: Program,
}

impl Cpu {
    pub fn new(program: Program) -> Self {
        Cpu {
            ram: vec![0; RAM_SIZE],
            a: 0,
            d: 0,
            pc: 0,
            program,
        }
    }

    fn addr(&self) -> usize {
        self.a as u16 as usize
    }

    pub fn step(&mut self) {
        match self.program.instructions[self.pc] {
            Instruction::A(value) => {
                self.a = value as i16;
                self.pc += 1;
            }
            Instruction::C { dest, comp, jump } => {
                let m = if comp.reads_memory() {
                    self.ram[self.addr()]
                } else {
                    0
                };
                let out = comp.eval(self.d, self.a, m);
                let target = self.addr();
                if dest.m {
                    self.ram[target] = out;
                }
                if dest.a {
                    self.a = out;
                }
                if dest.d {
                    self.d = out;
                }
                self.pc = if jump.taken(out) { target } else { self.pc + 1 };
            }
        }
    }

    /// Run until the terminating loop is reached.
    pub fn run(&mut self) {
        let halt = self.program.label(HALT_LABEL).expect("halt label") as usize;
        for _ in 0..MAX_STEPS {
            if self.pc == halt {
                return;
            }
            self.step();
        }
        panic!("program did not halt, pc = {}", self.pc);
    }

    pub fn sp(&self) -> usize {
        self.ram[SP] as usize
    }

    /// Value on top of the stack.
    pub fn top(&self) -> i16 {
        self.ram[self.sp() - 1]
    }

    pub fn stack(&self, base: usize) -> &[i16] {
        &self.ram[base..self.sp()]
    }

    pub fn variable(&self, name: &str) -> i16 {
        let addr = *self.program.variables.get(name).expect("variable");
        self.ram[addr as usize]
    }
}

pub fn assemble(source: &str, options: Options) -> Vec<String> {
    let mut translator = Translator::with_options(options);
    translator
        .translate_unit("Test", source.as_bytes())
        .expect("translate");
    translator.finish()
}

/// Translate, assemble and load `source` with the usual segment bases.
pub fn load_with(source: &str, options: Options) -> Cpu {
    let lines = assemble(source, options);
    let program = hack::assemble(&lines).expect("assemble");
    let mut cpu = Cpu::new(program);
    cpu.ram[SP] = 256;
    cpu.ram[LCL] = 300;
    cpu.ram[ARG] = 400;
    cpu.ram[THIS] = 3000;
    cpu.ram[THAT] = 3010;
    cpu
}

pub fn load(source: &str) -> Cpu {
    load_with(source, Options::default())
}

pub fn run(source: &str) -> Cpu {
    let mut cpu = load(source);
    cpu.run();
    cpu
}
