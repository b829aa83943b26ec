use std::io::{BufRead, ErrorKind, Lines};

use log::trace;
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_till1},
    character::complete::{digit1, multispace1},
    combinator::{all_consuming, map_res, value},
    multi::separated_list1,
    IResult,
};

use crate::ast::{Command, Kind};
use crate::error::{Result, SourceLine, TranslateError};

fn integer(input: &str) -> IResult<&str, u16> {
    map_res(digit1, |c: &str| c.parse())(input)
}

fn token(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(input)
}

fn tokens(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list1(multispace1, token)(input)
}

fn keyword(input: &str) -> IResult<&str, Kind> {
    alt((
        value(Kind::Push, tag_no_case("push")),
        value(Kind::Pop, tag_no_case("pop")),
        value(Kind::Add, tag_no_case("add")),
        value(Kind::Sub, tag_no_case("sub")),
        value(Kind::Or, tag_no_case("or")),
        value(Kind::And, tag_no_case("and")),
        value(Kind::Eq, tag_no_case("eq")),
        value(Kind::Lt, tag_no_case("lt")),
        value(Kind::Gt, tag_no_case("gt")),
        value(Kind::Neg, tag_no_case("neg")),
        value(Kind::Not, tag_no_case("not")),
        value(Kind::Label, tag_no_case("label")),
        value(Kind::Goto, tag_no_case("goto")),
        value(Kind::IfGoto, tag_no_case("if-goto")),
        value(Kind::IfGoto, tag_no_case("ifgoto")),
        value(Kind::Function, tag_no_case("function")),
        value(Kind::Call, tag_no_case("call")),
        value(Kind::Return, tag_no_case("return")),
    ))(input)
}

#[test]
fn test_keyword() {
    assert_eq!(keyword("If-Goto"), Ok(("", Kind::IfGoto)));
    assert_eq!(keyword("PUSH"), Ok(("", Kind::Push)));
}

/// Parse one raw source line. Blank and comment-only lines produce `None`.
pub fn parse_line(number: usize, raw: &str) -> Result<Option<Command>> {
    let line = raw.split_once("//").map(|(s, _)| s).unwrap_or(raw).trim();
    if line.is_empty() {
        return Ok(None);
    }
    let source = SourceLine::new(number, line);

    let words = match all_consuming(tokens)(line) {
        Ok((_, words)) => words,
        Err(_) => {
            return Err(TranslateError::Parse {
                reason: "malformed command".to_string(),
                at: source,
            })
        }
    };

    let kind = match all_consuming(keyword)(words[0]) {
        Ok((_, kind)) => kind,
        Err(_) => {
            return Err(TranslateError::Parse {
                reason: format!("unknown command '{}'", words[0]),
                at: source,
            })
        }
    };

    if words.len() > 3 {
        return Err(TranslateError::Arity {
            reason: format!("'{}' has extra parts '{}'", kind.keyword(), words[3..].join(" ")),
            at: source,
        });
    }

    let arg2 = match words.get(2) {
        Some(&word) => match all_consuming(integer)(word) {
            Ok((_, n)) => Some(n),
            Err(_) => {
                return Err(TranslateError::Parse {
                    reason: format!("expected number '{}'", word),
                    at: source,
                })
            }
        },
        None => None,
    };

    Ok(Some(Command::new(kind, words.get(1).copied(), arg2, source)))
}

#[test]
fn test_parse_push() {
    let cmd = parse_line(7, "push  pointer  1   // set that").unwrap().unwrap();
    assert_eq!(cmd.kind, Kind::Push);
    assert_eq!(cmd.arg1.as_deref(), Some("pointer"));
    assert_eq!(cmd.arg2, Some(1));
    assert_eq!(cmd.source, SourceLine::new(7, "push  pointer  1"));
}

#[test]
fn test_skips_blank_and_comment_lines() {
    assert_eq!(parse_line(1, "   ").unwrap(), None);
    assert_eq!(parse_line(2, "// only a comment").unwrap(), None);
}

#[test]
fn test_parse_errors() {
    let err = parse_line(4, "jump LOOP").unwrap_err();
    assert!(matches!(err, TranslateError::Parse { ref at, .. } if at.number == 4));
    assert!(matches!(
        parse_line(5, "push constant x"),
        Err(TranslateError::Parse { .. })
    ));
    assert!(matches!(
        parse_line(6, "push constant -1"),
        Err(TranslateError::Parse { .. })
    ));
    assert!(matches!(
        parse_line(7, "push constant 1 2"),
        Err(TranslateError::Arity { .. })
    ));
    // Arity is checked at translation time, not here.
    assert!(parse_line(8, "push constant").unwrap().is_some());
}

/// Lazily parses commands from a reader, one line at a time.
pub struct Commands<R> {
    lines: Lines<R>,
    number: usize,
    failed: bool,
}

impl<R: BufRead> Commands<R> {
    pub fn new(reader: R) -> Self {
        Commands {
            lines: reader.lines(),
            number: 0,
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for Commands<R> {
    type Item = Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        for line in self.lines.by_ref() {
            self.number += 1;
            let number = self.number;
            let parsed = line
                .map_err(|e| match e.kind() {
                    ErrorKind::InvalidData => TranslateError::Parse {
                        reason: "line is not valid UTF-8".to_string(),
                        at: SourceLine::new(number, "<invalid UTF-8>"),
                    },
                    _ => TranslateError::from(e),
                })
                .and_then(|line| parse_line(number, &line));
            match parsed {
                Ok(Some(command)) => {
                    trace!("parsed {:?}", command);
                    return Some(Ok(command));
                }
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

pub fn parse(input: &str) -> Result<Vec<Command>> {
    Commands::new(input.as_bytes()).collect()
}

#[test]
fn test_parse_counts_source_lines() {
    let commands = parse("// header\n\npush constant 7\n  add  \nIF-GOTO END\n").unwrap();
    let summary: Vec<_> = commands
        .iter()
        .map(|c| (c.kind, c.source.number))
        .collect();
    assert_eq!(
        summary,
        vec![(Kind::Push, 3), (Kind::Add, 4), (Kind::IfGoto, 5)]
    );
}

#[test]
fn test_invalid_utf8_reports_line() {
    let input: &[u8] = b"push constant 1\npush \xff\xfe 2\nadd\n";
    let mut commands = Commands::new(input);
    assert!(commands.next().unwrap().is_ok());
    let err = commands.next().unwrap().unwrap_err();
    assert!(matches!(err, TranslateError::Parse { ref at, .. } if at.number == 2));
    assert!(commands.next().is_none());
}
