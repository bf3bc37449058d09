//! Lexical analysis of a command line: pipeline segmentation and tokenization.
//!
//! Both passes walk the input with the same quoting state machine, so a `|`
//! that the tokenizer would treat as literal text never splits a pipeline.

/// Quoting context of the character currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    SingleQuote,
    DoubleQuote,
}

/// What a single input character means once quoting and escaping are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
    /// Literal text to append to the current word.
    Text(String),
    /// Unquoted, unescaped whitespace.
    Separator,
    /// Unquoted, unescaped `|`.
    Pipe,
    /// A quote that only changes state and produces no text.
    Quote,
    /// A backslash starting an escape sequence.
    Escape,
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    escaped: bool,
}

impl<'a> LexingFSM<'a> {
    fn new(line: &'a str) -> Self {
        LexingFSM {
            input: line.chars(),
            state: LexingState::Unquoted,
            escaped: false,
        }
    }

    /// Reads one character and classifies it.
    ///
    /// An unterminated quote is simply left open when the input runs out, and
    /// a trailing lone backslash produces nothing.
    fn next_lexeme(&mut self) -> Option<(char, Lexeme)> {
        let ch = self.input.next()?;
        let lexeme = match self.state {
            LexingState::SingleQuote => self.handle_single_quote(ch),
            LexingState::DoubleQuote => self.handle_double_quote(ch),
            LexingState::Unquoted => self.handle_unquoted(ch),
        };
        Some((ch, lexeme))
    }

    fn handle_unquoted(&mut self, ch: char) -> Lexeme {
        if self.escaped {
            self.escaped = false;
            return Lexeme::Text(ch.to_string());
        }
        match ch {
            '\\' => {
                self.escaped = true;
                Lexeme::Escape
            }
            '\'' => {
                self.state = LexingState::SingleQuote;
                Lexeme::Quote
            }
            '"' => {
                self.state = LexingState::DoubleQuote;
                Lexeme::Quote
            }
            '|' => Lexeme::Pipe,
            c if c.is_whitespace() => Lexeme::Separator,
            c => Lexeme::Text(c.to_string()),
        }
    }

    fn handle_single_quote(&mut self, ch: char) -> Lexeme {
        match ch {
            '\'' => {
                self.state = LexingState::Unquoted;
                Lexeme::Quote
            }
            c => Lexeme::Text(c.to_string()),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Lexeme {
        if self.escaped {
            self.escaped = false;
            return match ch {
                '\\' | '"' => Lexeme::Text(ch.to_string()),
                c => Lexeme::Text(format!("\\{c}")),
            };
        }
        match ch {
            '\\' => {
                self.escaped = true;
                Lexeme::Escape
            }
            '"' => {
                self.state = LexingState::Unquoted;
                Lexeme::Quote
            }
            c => Lexeme::Text(c.to_string()),
        }
    }
}

/// Splits a line into words, resolving quotes and backslash escapes.
///
/// Blank input yields an empty vector. A `|` is an ordinary character here;
/// use [`split_pipeline`] first to separate pipeline stages.
///
/// ```
/// use pipesh::lexer::split_into_tokens;
/// let tokens = split_into_tokens(r#"echo 'a b' "c\"d" \|"#);
/// assert_eq!(tokens, ["echo", "a b", "c\"d", "|"]);
/// ```
pub fn split_into_tokens(line: &str) -> Vec<String> {
    let mut lexer = LexingFSM::new(line);
    let mut tokens = Vec::new();
    let mut current = String::new();
    // Distinguishes `''` (an empty word) from no word at all.
    let mut in_word = false;

    while let Some((ch, lexeme)) = lexer.next_lexeme() {
        match lexeme {
            Lexeme::Text(text) => {
                current.push_str(&text);
                in_word = true;
            }
            Lexeme::Pipe => {
                current.push(ch);
                in_word = true;
            }
            Lexeme::Quote => in_word = true,
            Lexeme::Escape => {}
            Lexeme::Separator => {
                if in_word {
                    tokens.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
        }
    }

    if in_word {
        tokens.push(current);
    }
    tokens
}

/// Splits a raw line into pipeline segments on every unquoted, unescaped `|`.
///
/// Segments keep their original quoting so they can be tokenized afterwards.
/// Each segment is trimmed and empty segments are dropped.
pub fn split_pipeline(line: &str) -> Vec<String> {
    let mut lexer = LexingFSM::new(line);
    let mut segments = Vec::new();
    let mut current = String::new();

    while let Some((ch, lexeme)) = lexer.next_lexeme() {
        match lexeme {
            Lexeme::Pipe => push_segment(&mut segments, &mut current),
            _ => current.push(ch),
        }
    }
    push_segment(&mut segments, &mut current);
    segments
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    let segment = current.trim();
    if !segment.is_empty() {
        segments.push(segment.to_string());
    }
    current.clear();
}
