/// Position of the first character of a token, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Moves past `text`, counting columns in characters.
    pub fn advance(self, text: &str) -> Span {
        text.chars().fold(self, |span, c| {
            if c == '\n' {
                Span {
                    line: span.line + 1,
                    column: 1,
                }
            } else {
                Span {
                    line: span.line,
                    column: span.column + 1,
                }
            }
        })
    }
}
