//! Translates stack VM code into symbolic Hack assembly.

pub mod ast;
pub mod emitter;
pub mod error;
pub mod hack;
pub mod parser;
pub mod segment;
pub mod translator;

pub use error::{Result, SourceLine, TranslateError};
pub use translator::{translate, CompareStrategy, IfGotoTest, Options, Translator};
