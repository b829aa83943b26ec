macro_rules! svec {
    ($($x:expr),* $(,)?) => (vec![$($x.to_string()),*]);
}
pub(crate) use svec;

/// Collects emitted assembly and counts the ROM addresses it occupies.
#[derive(Debug, Default)]
pub struct Emitter {
    lines: Vec<String>,
    pending_comment: Option<String>,
    instructions: usize,
    comments: bool,
}

fn is_label(line: &str) -> bool {
    line.starts_with('(')
}

impl Emitter {
    pub fn new(comments: bool) -> Self {
        Emitter {
            comments,
            ..Default::default()
        }
    }

    /// Append `lines` in order; a staged comment goes on the first one.
    pub fn write(&mut self, lines: Vec<String>) {
        let comment = self.pending_comment.take();
        for (i, mut line) in lines.into_iter().enumerate() {
            if i == 0 {
                if let Some(comment) = &comment {
                    line.push_str(" //");
                    line.push_str(comment);
                }
            }
            // Labels do not occupy an address
            if !is_label(&line) {
                self.instructions += 1;
            }
            self.lines.push(line);
        }
    }

    /// Stage a comment for the next `write`.
    pub fn comment(&mut self, text: impl Into<String>) {
        if self.comments {
            self.pending_comment = Some(text.into());
        }
    }

    /// ROM address the next emitted instruction will have.
    pub fn current_line_number(&self) -> usize {
        self.instructions
    }

    pub fn a(&mut self, val: impl std::fmt::Display) {
        self.write(svec![format!("@{}", val)]);
    }

    pub fn inc_sp(&mut self) {
        self.write(svec!["@SP", "M=M+1"]);
    }

    /// Push D onto the stack.
    pub fn push_d(&mut self) {
        self.write(svec!["@SP", "A=M", "M=D"]);
        self.inc_sp();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_goes_on_first_line_only() {
        let mut emitter = Emitter::new(true);
        emitter.comment("add");
        emitter.write(svec!["@SP", "AM=M-1"]);
        emitter.write(svec!["D=M"]);
        assert_eq!(emitter.lines(), &["@SP //add", "AM=M-1", "D=M"]);
    }

    #[test]
    fn test_comments_disabled() {
        let mut emitter = Emitter::new(false);
        emitter.comment("add");
        emitter.write(svec!["@SP"]);
        assert_eq!(emitter.lines(), &["@SP"]);
    }

    #[test]
    fn test_labels_are_not_counted() {
        let mut emitter = Emitter::new(true);
        emitter.write(svec!["(Main$LOOP)", "@5", "D=A"]);
        emitter.comment("label first");
        emitter.write(svec!["(X)"]);
        assert_eq!(emitter.current_line_number(), 2);
        emitter.push_d();
        assert_eq!(emitter.current_line_number(), 7);
    }
}
