//! Symbolic Hack assembly: the format the translator emits.
//!
//! This is the front half of the downstream assembler. It parses lines,
//! collects labels (pass 1) and resolves every symbol to an address (pass 2).
//! Binary encoding is left to the real assembler.

use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::{is_a, take_while1},
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt, verify},
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

use crate::error::{Result, SourceLine, TranslateError};

/// First RAM address handed out to variables.
pub const VARIABLE_BASE: u16 = 16;

/// Instruction memory size; the largest ROM address is `ROM_SIZE - 1`.
pub const ROM_SIZE: usize = 0x8000;

pub const SCREEN: u16 = 16384;
pub const KBD: u16 = 24576;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Dest {
    pub a: bool,
    pub d: bool,
    pub m: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Comp {
    Zero,
    One,
    MinusOne,
    D,
    A,
    M,
    NotD,
    NotA,
    NotM,
    NegD,
    NegA,
    NegM,
    DPlusOne,
    APlusOne,
    MPlusOne,
    DMinusOne,
    AMinusOne,
    MMinusOne,
    DPlusA,
    DPlusM,
    DMinusA,
    DMinusM,
    AMinusD,
    MMinusD,
    DAndA,
    DAndM,
    DOrA,
    DOrM,
}

impl Comp {
    pub fn from_mnemonic(text: &str) -> Option<Comp> {
        let comp = match text {
            "0" => Comp::Zero,
            "1" => Comp::One,
            "-1" => Comp::MinusOne,
            "D" => Comp::D,
            "A" => Comp::A,
            "M" => Comp::M,
            "!D" => Comp::NotD,
            "!A" => Comp::NotA,
            "!M" => Comp::NotM,
            "-D" => Comp::NegD,
            "-A" => Comp::NegA,
            "-M" => Comp::NegM,
            "D+1" => Comp::DPlusOne,
            "A+1" => Comp::APlusOne,
            "M+1" => Comp::MPlusOne,
            "D-1" => Comp::DMinusOne,
            "A-1" => Comp::AMinusOne,
            "M-1" => Comp::MMinusOne,
            "D+A" => Comp::DPlusA,
            "D+M" => Comp::DPlusM,
            "D-A" => Comp::DMinusA,
            "D-M" => Comp::DMinusM,
            "A-D" => Comp::AMinusD,
            "M-D" => Comp::MMinusD,
            "D&A" => Comp::DAndA,
            "D&M" => Comp::DAndM,
            "D|A" => Comp::DOrA,
            "D|M" => Comp::DOrM,
            _ => return None,
        };
        Some(comp)
    }

    /// Whether the computation reads memory at A.
    pub fn reads_memory(self) -> bool {
        matches!(
            self,
            Comp::M
                | Comp::NotM
                | Comp::NegM
                | Comp::MPlusOne
                | Comp::MMinusOne
                | Comp::DPlusM
                | Comp::DMinusM
                | Comp::MMinusD
                | Comp::DAndM
                | Comp::DOrM
        )
    }

    /// Evaluate with 16-bit wrapping arithmetic.
    pub fn eval(self, d: i16, a: i16, m: i16) -> i16 {
        match self {
            Comp::Zero => 0,
            Comp::One => 1,
            Comp::MinusOne => -1,
            Comp::D => d,
            Comp::A => a,
            Comp::M => m,
            Comp::NotD => !d,
            Comp::NotA => !a,
            Comp::NotM => !m,
            Comp::NegD => d.wrapping_neg(),
            Comp::NegA => a.wrapping_neg(),
            Comp::NegM => m.wrapping_neg(),
            Comp::DPlusOne => d.wrapping_add(1),
            Comp::APlusOne => a.wrapping_add(1),
            Comp::MPlusOne => m.wrapping_add(1),
            Comp::DMinusOne => d.wrapping_sub(1),
            Comp::AMinusOne => a.wrapping_sub(1),
            Comp::MMinusOne => m.wrapping_sub(1),
            Comp::DPlusA => d.wrapping_add(a),
            Comp::DPlusM => d.wrapping_add(m),
            Comp::DMinusA => d.wrapping_sub(a),
            Comp::DMinusM => d.wrapping_sub(m),
            Comp::AMinusD => a.wrapping_sub(d),
            Comp::MMinusD => m.wrapping_sub(d),
            Comp::DAndA => d & a,
            Comp::DAndM => d & m,
            Comp::DOrA => d | a,
            Comp::DOrM => d | m,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Jump {
    #[default]
    Never,
    Jgt,
    Jeq,
    Jge,
    Jlt,
    Jne,
    Jle,
    Jmp,
}

impl Jump {
    pub fn taken(self, value: i16) -> bool {
        match self {
            Jump::Never => false,
            Jump::Jgt => value > 0,
            Jump::Jeq => value == 0,
            Jump::Jge => value >= 0,
            Jump::Jlt => value < 0,
            Jump::Jne => value != 0,
            Jump::Jle => value <= 0,
            Jump::Jmp => true,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Address {
    Literal(u16),
    Symbol(String),
}

/// One line of symbolic assembly.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AsmLine {
    A(Address),
    C { dest: Dest, comp: Comp, jump: Jump },
    Label(String),
}

/// An instruction with every symbol replaced by its address.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    A(u16),
    C { dest: Dest, comp: Comp, jump: Jump },
}

fn symbol(input: &str) -> IResult<&str, String> {
    map(
        verify(
            is_a("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_.$:0123456789"),
            |c: &str| !c.as_bytes()[0].is_ascii_digit(),
        ),
        |sym: &str| sym.to_string(),
    )(input)
}

fn literal(input: &str) -> IResult<&str, u16> {
    verify(map_res(digit1, |c: &str| c.parse()), |n: &u16| *n <= 0x7fff)(input)
}

fn a_instruction(input: &str) -> IResult<&str, AsmLine> {
    map(
        preceded(
            char('@'),
            alt((map(literal, Address::Literal), map(symbol, Address::Symbol))),
        ),
        AsmLine::A,
    )(input)
}

fn label(input: &str) -> IResult<&str, AsmLine> {
    map(delimited(char('('), symbol, char(')')), AsmLine::Label)(input)
}

fn dest(input: &str) -> IResult<&str, Dest> {
    map_res(is_a("ADM"), |d: &str| {
        let dest = Dest {
            a: d.contains('A'),
            d: d.contains('D'),
            m: d.contains('M'),
        };
        let distinct = [dest.a, dest.d, dest.m].iter().filter(|b| **b).count();
        if distinct == d.len() {
            Ok(dest)
        } else {
            Err(())
        }
    })(input)
}

fn comp(input: &str) -> IResult<&str, Comp> {
    map_res(take_while1(|c: char| "ADM01+-!&|".contains(c)), |c: &str| {
        Comp::from_mnemonic(c).ok_or(())
    })(input)
}

fn jump(input: &str) -> IResult<&str, Jump> {
    map_res(is_a("JGTEQLNMP"), |j: &str| match j {
        "JGT" => Ok(Jump::Jgt),
        "JEQ" => Ok(Jump::Jeq),
        "JGE" => Ok(Jump::Jge),
        "JLT" => Ok(Jump::Jlt),
        "JNE" => Ok(Jump::Jne),
        "JLE" => Ok(Jump::Jle),
        "JMP" => Ok(Jump::Jmp),
        _ => Err(()),
    })(input)
}

fn c_instruction(input: &str) -> IResult<&str, AsmLine> {
    map(
        tuple((
            opt(terminated(dest, char('='))),
            comp,
            opt(preceded(char(';'), jump)),
        )),
        |(dest, comp, jump)| AsmLine::C {
            dest: dest.unwrap_or_default(),
            comp,
            jump: jump.unwrap_or_default(),
        },
    )(input)
}

#[test]
fn test_c_instruction() {
    assert_eq!(
        c_instruction("AM=M-1"),
        Ok((
            "",
            AsmLine::C {
                dest: Dest {
                    a: true,
                    d: false,
                    m: true
                },
                comp: Comp::MMinusOne,
                jump: Jump::Never
            }
        ))
    );
    assert_eq!(
        c_instruction("D;JGT"),
        Ok((
            "",
            AsmLine::C {
                dest: Dest::default(),
                comp: Comp::D,
                jump: Jump::Jgt
            }
        ))
    );
}

/// Parse one line of assembly; blank and comment-only lines produce `None`.
pub fn parse_line(number: usize, raw: &str) -> Result<Option<AsmLine>> {
    let code = raw.split_once("//").map(|(s, _)| s).unwrap_or(raw);
    let line: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    if line.is_empty() {
        return Ok(None);
    }
    let parsed = all_consuming(alt((a_instruction, label, c_instruction)))(line.as_str());
    match parsed {
        Ok((_, parsed)) => Ok(Some(parsed)),
        Err(_) => Err(TranslateError::Parse {
            reason: "invalid assembly".to_string(),
            at: SourceLine::new(number, raw.trim()),
        }),
    }
}

#[test]
fn test_parse_line() {
    assert_eq!(
        parse_line(1, "@Main.f$ret.0 //call").unwrap(),
        Some(AsmLine::A(Address::Symbol("Main.f$ret.0".to_string())))
    );
    assert_eq!(
        parse_line(2, "(LOOP)").unwrap(),
        Some(AsmLine::Label("LOOP".to_string()))
    );
    assert_eq!(parse_line(3, "  // nothing").unwrap(), None);
    assert!(parse_line(4, "M=M+D").is_err());
    assert!(parse_line(5, "@32768").is_err());
    assert!(parse_line(6, "DD=A").is_err());
}

/// Assembled program: resolved instructions plus the symbol table.
#[derive(Debug, Clone)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub labels: HashMap<String, u16>,
    pub variables: HashMap<String, u16>,
}

fn predefined(sym: &str) -> Option<u16> {
    let addr = match sym {
        "SP" => 0,
        "LCL" => 1,
        "ARG" => 2,
        "THIS" => 3,
        "THAT" => 4,
        "SCREEN" => SCREEN,
        "KBD" => KBD,
        _ => return (0..=15).find(|n| sym == format!("R{}", n)),
    };
    Some(addr)
}

impl Program {
    pub fn label(&self, name: &str) -> Option<u16> {
        self.labels.get(name).copied()
    }
}

fn rom_full(number: usize, raw: &str) -> TranslateError {
    TranslateError::Range {
        reason: format!("program exceeds {} instructions", ROM_SIZE),
        at: SourceLine::new(number, raw.trim()),
    }
}

/// Run both assembler passes over `source`.
pub fn assemble<S: AsRef<str>>(source: &[S]) -> Result<Program> {
    let mut lines = Vec::new();
    let mut labels = HashMap::new();

    // Pass 1: labels take the address of the next real instruction
    for (i, raw) in source.iter().enumerate() {
        let raw = raw.as_ref();
        match parse_line(i + 1, raw)? {
            Some(AsmLine::Label(name)) => {
                if labels.contains_key(&name) {
                    return Err(TranslateError::DuplicateLabel {
                        label: name,
                        at: SourceLine::new(i + 1, raw.trim()),
                    });
                }
                let addr = u16::try_from(lines.len())
                    .ok()
                    .filter(|addr| usize::from(*addr) < ROM_SIZE)
                    .ok_or_else(|| rom_full(i + 1, raw))?;
                labels.insert(name, addr);
            }
            Some(line) => {
                if lines.len() >= ROM_SIZE {
                    return Err(rom_full(i + 1, raw));
                }
                lines.push(line);
            }
            None => {}
        }
    }

    // Pass 2: resolve symbols, allocating variables on first use
    let mut variables = HashMap::new();
    let mut next_variable = VARIABLE_BASE;
    let instructions = lines
        .into_iter()
        .filter_map(|line| match line {
            AsmLine::A(Address::Literal(n)) => Some(Instruction::A(n)),
            AsmLine::A(Address::Symbol(sym)) => {
                let addr = predefined(&sym)
                    .or_else(|| labels.get(&sym).copied())
                    .unwrap_or_else(|| {
                        *variables.entry(sym).or_insert_with(|| {
                            let addr = next_variable;
                            next_variable += 1;
                            addr
                        })
                    });
                Some(Instruction::A(addr))
            }
            AsmLine::C { dest, comp, jump } => Some(Instruction::C { dest, comp, jump }),
            // Already placed in pass 1
            AsmLine::Label(_) => None,
        })
        .collect();

    Ok(Program {
        instructions,
        labels,
        variables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_and_variables() {
        let program = assemble(&[
            "@i", "M=1", "(LOOP)", "@i", "D=M", "@LOOP", "D;JGT", "@R13", "@j", "(END)",
        ])
        .unwrap();
        assert_eq!(program.label("LOOP"), Some(2));
        assert_eq!(program.label("END"), Some(8));
        assert_eq!(program.variables.get("i"), Some(&16));
        assert_eq!(program.variables.get("j"), Some(&17));
        assert_eq!(program.instructions[4], Instruction::A(2));
        assert_eq!(program.instructions[6], Instruction::A(13));
    }

    #[test]
    fn test_duplicate_label() {
        let err = assemble(&["(A)", "@A", "(A)"]).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::DuplicateLabel { ref label, ref at } if label == "A" && at.number == 3
        ));
    }

    #[test]
    fn test_rom_limit() {
        let mut source = vec!["D=0"; ROM_SIZE];
        source.push("(END)");
        assert!(matches!(
            assemble(&source),
            Err(TranslateError::Range { ref at, .. }) if at.number == ROM_SIZE + 1
        ));

        let mut source = vec!["D=0"; ROM_SIZE - 1];
        source.push("(LAST)");
        source.push("0;JMP");
        assert_eq!(assemble(&source).unwrap().label("LAST"), Some(0x7fff));
        source.push("D=0");
        assert!(matches!(assemble(&source), Err(TranslateError::Range { .. })));
    }

    #[test]
    fn test_parse_line_from_owned_lines() {
        let lines: Vec<String> = vec!["AM=M-1 // pop".to_string()];
        let parsed = parse_line(1, &lines[0]).unwrap();
        assert!(matches!(parsed, Some(AsmLine::C { comp: Comp::MMinusOne, .. })));
    }

    #[test]
    fn test_predefined_symbols() {
        assert_eq!(predefined("R15"), Some(15));
        assert_eq!(predefined("R16"), None);
        assert_eq!(predefined("R01"), None);
        assert_eq!(predefined("THAT"), Some(4));
        assert_eq!(predefined("KBD"), Some(KBD));
        assert_eq!(predefined("Rx"), None);
    }

    #[test]
    fn test_jump_conditions() {
        assert!(Jump::Jgt.taken(1));
        assert!(!Jump::Jgt.taken(-1));
        assert!(Jump::Jne.taken(-1));
        assert!(!Jump::Never.taken(0));
    }

    #[test]
    fn test_comp_wraps() {
        assert_eq!(Comp::DPlusM.eval(i16::MAX, 0, 1), i16::MIN);
        assert_eq!(Comp::NotM.eval(0, 0, 0), -1);
        assert_eq!(Comp::MMinusD.eval(3, 0, 10), 7);
    }
}
