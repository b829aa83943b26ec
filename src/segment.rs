use crate::ast::Segment;
use crate::error::{Result, SourceLine, TranslateError};

/// Base address of the temp segment (R5..R12).
pub const TEMP_BASE: u16 = 5;
pub const TEMP_SIZE: u16 = 8;
/// Largest value an A-instruction can load.
pub const MAX_CONSTANT: u16 = 0x7fff;

/// Where a segment access lands once resolved.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Access {
    /// The offset itself is the value.
    Constant(u16),
    /// `*base + offset`, where `base` names a pointer register.
    Indirect { base: &'static str, offset: u16 },
    /// A fixed cell named by a register alias or a static symbol.
    Direct(String),
}

fn out_of_range(segment: Segment, offset: u16, limit: u16, at: &SourceLine) -> TranslateError {
    TranslateError::Range {
        reason: format!("{} offset {} out of range 0..={}", segment, offset, limit),
        at: at.clone(),
    }
}

/// Resolve `segment offset` within compilation unit `unit`.
pub fn resolve(segment: Segment, offset: u16, unit: &str, at: &SourceLine) -> Result<Access> {
    let access = match segment {
        Segment::Constant => {
            if offset > MAX_CONSTANT {
                return Err(out_of_range(segment, offset, MAX_CONSTANT, at));
            }
            Access::Constant(offset)
        }
        Segment::Local | Segment::Argument | Segment::This | Segment::That
            if offset > MAX_CONSTANT =>
        {
            return Err(out_of_range(segment, offset, MAX_CONSTANT, at));
        }
        Segment::Local => Access::Indirect { base: "LCL", offset },
        Segment::Argument => Access::Indirect { base: "ARG", offset },
        Segment::This => Access::Indirect { base: "THIS", offset },
        Segment::That => Access::Indirect { base: "THAT", offset },
        Segment::Temp => {
            if offset >= TEMP_SIZE {
                return Err(out_of_range(segment, offset, TEMP_SIZE - 1, at));
            }
            Access::Direct(format!("R{}", TEMP_BASE + offset))
        }
        Segment::Pointer => match offset {
            0 => Access::Direct("THIS".to_string()),
            1 => Access::Direct("THAT".to_string()),
            _ => return Err(out_of_range(segment, offset, 1, at)),
        },
        Segment::Static => Access::Direct(format!("{}.{}", unit, offset)),
    };
    Ok(access)
}
