use std::io::BufRead;

use log::{debug, trace};

use crate::ast::{Command, Operation, Segment, RETURN_LABEL_PREFIX};
use crate::emitter::{svec, Emitter};
use crate::error::{Result, SourceLine, TranslateError};
use crate::parser::Commands;
use crate::segment::{self, Access, MAX_CONSTANT};

/// Saved caller state per frame: return address plus LCL, ARG, THIS, THAT.
const FRAME_SIZE: u16 = 5;

/// Label of the terminating loop.
pub const HALT_LABEL: &str = "$HALT";

/// How comparison operators skip their "false" overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareStrategy {
    /// Jump to a ROM address computed from the emission count.
    #[default]
    Absolute,
    /// Jump to a generated label resolved by the assembler.
    Symbolic,
}

/// Jump condition `if-goto` tests the popped value against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IfGotoTest {
    /// `JGT`: only positive values jump. Comparison results (-1) do not.
    #[default]
    Positive,
    /// `JNE`: any non-zero value jumps.
    NonZero,
}

impl IfGotoTest {
    fn jump(self) -> &'static str {
        match self {
            IfGotoTest::Positive => "JGT",
            IfGotoTest::NonZero => "JNE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub compare: CompareStrategy,
    pub if_goto: IfGotoTest,
    pub comments: bool,
    pub bootstrap: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            compare: CompareStrategy::default(),
            if_goto: IfGotoTest::default(),
            comments: true,
            bootstrap: false,
        }
    }
}

/// Push microcode for the four base-pointer segments
fn seg_push(base: &str, offset: u16) -> Vec<String> {
    svec![
        format!("@{}", base),
        "D=M",
        format!("@{}", offset),
        "A=D+A", // A = SEG+offset
        "D=M"    // D = value to push
    ]
}

fn seg_pop(base: &str, offset: u16) -> Vec<String> {
    svec![
        format!("@{}", base),
        "D=M",
        format!("@{}", offset),
        "D=D+A",
        "@R13",
        "M=D",    // Store target addr in R13
        "@SP",
        "AM=M-1", // SP--, A <- new SP (val to be popped)
        "D=M",
        "@R13",
        "A=M",    // At the target address...
        "M=D"     // ... store the popped val
    ]
}

fn simple_un_op(op: char) -> Vec<String> {
    svec!["@SP", "A=M-1", format!("M={}M", op)]
}

// i.e. no conditions or jumps, just pop and run
fn simple_bin_op(comp: &str) -> Vec<String> {
    svec![
        "@SP",
        "AM=M-1",             // SP--, looking at top of stack now
        "D=M",                // Right arg in D
        "A=A-1",              // Looking at left arg, will overwrite
        format!("M={}", comp)
    ]
}

/// Lowers VM commands into Hack assembly.
///
/// One translator covers one run: compilation units translated through it
/// share the emission counter and the call-site counter, so generated labels
/// stay unique across files.
pub struct Translator {
    options: Options,
    emitter: Emitter,
    unit: String,
    current_function: Option<String>,
    call_sites: usize,
    compare_sites: usize,
}

impl Default for Translator {
    fn default() -> Self {
        Translator::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        Translator::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let mut emitter = Emitter::new(options.comments);
        if options.bootstrap {
            emitter.comment("bootstrap: SP = 256");
            emitter.write(svec!["@256", "D=A", "@SP", "M=D"]);
        }
        Translator {
            options,
            emitter,
            unit: String::new(),
            current_function: None,
            call_sites: 0,
            compare_sites: 0,
        }
    }

    /// Start a new compilation unit; statics and top-level labels are
    /// namespaced by `unit`.
    pub fn begin_unit(&mut self, unit: &str) {
        self.unit = unit.to_string();
        self.current_function = None;
    }

    pub fn current_function(&self) -> Option<&str> {
        self.current_function.as_deref()
    }

    /// Translate every command read from `reader` as unit `unit`.
    pub fn translate_unit<R: BufRead>(&mut self, unit: &str, reader: R) -> Result<()> {
        self.begin_unit(unit);
        let start = self.emitter.current_line_number();
        let mut count = 0;
        for command in Commands::new(reader) {
            self.translate_command(&command?)?;
            count += 1;
        }
        debug!(
            "translated unit {}: {} commands, {} instructions",
            unit,
            count,
            self.emitter.current_line_number() - start
        );
        Ok(())
    }

    /// Translate one command. Nothing is emitted if the command is invalid:
    /// every fallible step checks its input before its first write.
    pub fn translate_command(&mut self, command: &Command) -> Result<()> {
        let op = command.operation()?;
        trace!("{:?}", op);
        let at = &command.source;

        self.emitter.comment(at.text.as_str());
        match op {
            Operation::Push(seg, offset) => self.push(seg, offset, at)?,
            Operation::Pop(seg, offset) => self.pop(seg, offset, at)?,
            Operation::Add => self.emitter.write(simple_bin_op("D+M")),
            Operation::Sub => self.emitter.write(simple_bin_op("M-D")),
            Operation::And => self.emitter.write(simple_bin_op("D&M")),
            Operation::Or => self.emitter.write(simple_bin_op("D|M")),
            Operation::Neg => self.emitter.write(simple_un_op('-')),
            Operation::Not => self.emitter.write(simple_un_op('!')),
            Operation::Eq => self.compare("JEQ", at)?,
            Operation::Lt => self.compare("JLT", at)?,
            Operation::Gt => self.compare("JGT", at)?,
            Operation::Label(label) => {
                let sym = self.label_to_sym(&label);
                self.emitter.write(svec![format!("({})", sym)]);
            }
            Operation::Goto(label) => {
                let sym = self.label_to_sym(&label);
                self.emitter.write(svec![format!("@{}", sym), "0;JMP"]);
            }
            Operation::IfGoto(label) => self.if_goto(&label),
            Operation::Function(name, locals) => self.function(name, locals),
            Operation::Call(name, args) => self.call(&name, args, at)?,
            Operation::Return => self.ret(),
        }
        Ok(())
    }

    /// Emit the terminating loop and hand back the program.
    pub fn finish(mut self) -> Vec<String> {
        self.emitter.comment("end of program");
        self.emitter.write(svec![
            format!("({})", HALT_LABEL),
            format!("@{}", HALT_LABEL),
            "0;JMP"
        ]);
        self.emitter.into_lines()
    }

    fn resolve(&self, seg: Segment, offset: u16, at: &SourceLine) -> Result<Access> {
        segment::resolve(seg, offset, &self.unit, at)
    }

    fn push(&mut self, seg: Segment, offset: u16, at: &SourceLine) -> Result<()> {
        let load = match self.resolve(seg, offset, at)? {
            Access::Constant(value) => svec![format!("@{}", value), "D=A"],
            Access::Indirect { base, offset } => seg_push(base, offset),
            Access::Direct(sym) => svec![format!("@{}", sym), "D=M"],
        };
        self.emitter.write(load);
        self.emitter.push_d();
        Ok(())
    }

    fn pop(&mut self, seg: Segment, offset: u16, at: &SourceLine) -> Result<()> {
        let store = match self.resolve(seg, offset, at)? {
            Access::Indirect { base, offset } => seg_pop(base, offset),
            Access::Direct(sym) => svec!["@SP", "AM=M-1", "D=M", format!("@{}", sym), "M=D"],
            Access::Constant(_) => {
                return Err(TranslateError::InvalidSegment {
                    segment: "constant (pop)".to_string(),
                    at: at.clone(),
                })
            }
        };
        self.emitter.write(store);
        Ok(())
    }

    /// Leaves -1 (true) or 0 (false) in place of the two operands.
    fn compare(&mut self, jump: &str, at: &SourceLine) -> Result<()> {
        // 6 setup lines, then @target, D;Jxx, @SP, A=M-1, M=0
        let target = self.emitter.current_line_number() + 11;
        if self.options.compare == CompareStrategy::Absolute && target > usize::from(MAX_CONSTANT) {
            return Err(TranslateError::Range {
                reason: format!("comparison target {} beyond ROM", target),
                at: at.clone(),
            });
        }
        self.emitter.write(svec![
            "@SP",
            "AM=M-1", // SP--, looking at top of stack now
            "D=M",    // Right arg in D
            "A=A-1",  // Looking at left arg, will overwrite
            "D=M-D",
            "M=-1"    // Assume true
        ]);
        match self.options.compare {
            CompareStrategy::Absolute => {
                self.emitter.a(target);
                self.emitter
                    .write(svec![format!("D;{}", jump), "@SP", "A=M-1", "M=0"]);
            }
            CompareStrategy::Symbolic => {
                let sym = format!("{}:CMP_{}", self.unit, self.compare_sites);
                self.compare_sites += 1;
                self.emitter.write(svec![
                    format!("@{}", sym),
                    format!("D;{}", jump),
                    "@SP",
                    "A=M-1",
                    "M=0",
                    format!("({})", sym)
                ]);
            }
        }
        Ok(())
    }

    /// Convert VM label to Hack ASM symbol, scoped to the current function
    fn label_to_sym(&self, label: &str) -> String {
        let scope = self.current_function.as_deref().unwrap_or(&self.unit);
        format!("{}${}", scope, label)
    }

    fn if_goto(&mut self, label: &str) {
        let sym = self.label_to_sym(label);
        self.emitter.write(svec![
            "@SP",
            "AM=M-1",
            "D=M", // Stack popped into D
            format!("@{}", sym),
            format!("D;{}", self.options.if_goto.jump())
        ]);
    }

    fn function(&mut self, name: String, locals: u16) {
        self.emitter.write(svec![format!("({})", name)]);
        if locals > 0 {
            self.emitter.write(svec!["@SP", "A=M"]);
            for _ in 0..locals {
                self.emitter.write(svec!["M=0", "A=A+1"]);
            }
            self.emitter.write(svec!["D=A", "@SP", "M=D"]);
        }
        self.current_function = Some(name);
    }

    fn call(&mut self, callee: &str, args: u16, at: &SourceLine) -> Result<()> {
        if args > MAX_CONSTANT - FRAME_SIZE {
            return Err(TranslateError::Range {
                reason: format!("argument count {} too large", args),
                at: at.clone(),
            });
        }
        let ret = format!("{}${}{}", callee, RETURN_LABEL_PREFIX, self.call_sites);
        self.call_sites += 1;

        self.emitter.write(svec![format!("@{}", ret), "D=A"]);
        self.emitter.push_d();
        for base in ["LCL", "ARG", "THIS", "THAT"] {
            self.emitter.comment(format!("push {}", base));
            self.emitter.write(svec![format!("@{}", base), "D=M"]);
            self.emitter.push_d();
        }
        self.emitter.comment(format!("ARG = SP-{}-{}", args, FRAME_SIZE));
        self.emitter.write(svec![
            "@SP",
            "D=M",
            format!("@{}", args + FRAME_SIZE),
            "D=D-A",
            "@ARG",
            "M=D"
        ]);
        self.emitter.comment("LCL = SP");
        self.emitter.write(svec!["@SP", "D=M", "@LCL", "M=D"]);
        self.emitter.write(svec![
            format!("@{}", callee),
            "0;JMP",
            format!("({})", ret)
        ]);
        Ok(())
    }

    fn ret(&mut self) {
        self.current_function = None;
        self.emitter.write(svec!["@LCL", "D=M", "@R14", "M=D"]);
        self.emitter.comment("RET = *(FRAME-5)");
        self.emitter.write(svec![
            format!("@{}", FRAME_SIZE),
            "A=D-A",
            "D=M",
            "@R15",
            "M=D"
        ]);
        self.emitter.comment("*ARG = pop()");
        self.emitter
            .write(svec!["@SP", "A=M-1", "D=M", "@ARG", "A=M", "M=D"]);
        self.emitter.comment("SP = ARG + 1");
        self.emitter.write(svec!["@ARG", "D=M+1", "@SP", "M=D"]);
        for base in ["THAT", "THIS", "ARG", "LCL"] {
            self.emitter
                .comment(format!("FRAME = FRAME-1; {} = *FRAME", base));
            self.emitter.write(svec![
                "@R14",
                "AM=M-1",
                "D=M",
                format!("@{}", base),
                "M=D"
            ]);
        }
        self.emitter.write(svec!["@R15", "A=M", "0;JMP"]);
    }
}

/// Translate a single compilation unit held in memory.
pub fn translate(unit: &str, source: &str, options: Options) -> Result<Vec<String>> {
    let mut translator = Translator::with_options(options);
    translator.translate_unit(unit, source.as_bytes())?;
    Ok(translator.finish())
}
