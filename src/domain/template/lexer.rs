// Tokenizer for `{{ }}` template syntax

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_COMMENT: &str = "/*";
const RIGHT_COMMENT: &str = "*/";
const TRIM_MARKER: char = '-';
const TRIM_MARKER_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Text,
    Comment,
    LeftDelim,
    RightDelim,
    Space,
    Identifier,
    Field,
    Variable,
    Dot,
    String,
    RawString,
    CharConstant,
    Number,
    Bool,
    Nil,
    Pipe,
    Declare,
    Assign,
    LeftParen,
    RightParen,
    /// Any other printable ASCII character, e.g. the `,` in range declarations
    Char,
    Block,
    Break,
    Continue,
    Define,
    Else,
    End,
    If,
    Range,
    Template,
    With,
    Eof,
}

impl ItemKind {
    fn keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "." => ItemKind::Dot,
            "block" => ItemKind::Block,
            "break" => ItemKind::Break,
            "continue" => ItemKind::Continue,
            "define" => ItemKind::Define,
            "else" => ItemKind::Else,
            "end" => ItemKind::End,
            "if" => ItemKind::If,
            "nil" => ItemKind::Nil,
            "range" => ItemKind::Range,
            "template" => ItemKind::Template,
            "with" => ItemKind::With,
            _ => return None,
        };
        Some(kind)
    }

    fn is_keyword(self) -> bool {
        matches!(
            self,
            ItemKind::Block
                | ItemKind::Dot
                | ItemKind::Nil
                | ItemKind::Break
                | ItemKind::Continue
                | ItemKind::Define
                | ItemKind::Else
                | ItemKind::End
                | ItemKind::If
                | ItemKind::Range
                | ItemKind::Template
                | ItemKind::With
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    pub val: String,
    pub line: usize,
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ItemKind::Eof => write!(f, "EOF"),
            kind if kind.is_keyword() => write!(f, "<{}>", self.val),
            _ if self.val.chars().count() > 10 => {
                let head: String = self.val.chars().take(10).collect();
                write!(f, "{:?}...", head)
            }
            _ => write!(f, "{:?}", self.val),
        }
    }
}

/// Lexing failure with the line it occurred on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    start: usize,
    line: usize,
    line_pos: usize,
    paren_depth: i32,
    emit_comments: bool,
    items: Vec<Item>,
}

impl<'a> Lexer<'a> {
    /// Split `input` into items, ending with a single `Eof` item
    pub fn lex(input: &'a str, emit_comments: bool) -> Result<Vec<Item>, LexError> {
        let mut lexer = Self {
            input,
            pos: 0,
            start: 0,
            line: 1,
            line_pos: 0,
            paren_depth: 0,
            emit_comments,
            items: Vec::new(),
        };
        lexer.run()?;
        Ok(lexer.items)
    }

    fn run(&mut self) -> Result<(), LexError> {
        let mut inside_action = false;
        loop {
            if inside_action {
                inside_action = self.lex_inside_action()?;
                continue;
            }
            match self.input[self.pos..].find(LEFT_DELIM) {
                Some(offset) => {
                    self.lex_text(offset);
                    inside_action = self.lex_left_delim()?;
                }
                None => {
                    self.pos = self.input.len();
                    if self.pos > self.start {
                        self.emit(ItemKind::Text);
                    }
                    self.emit(ItemKind::Eof);
                    return Ok(());
                }
            }
        }
    }

    fn lex_text(&mut self, offset: usize) {
        if offset == 0 {
            return;
        }
        self.pos += offset;
        let delim_end = self.pos + LEFT_DELIM.len();
        let trim = if has_left_trim_marker(&self.input[delim_end..]) {
            right_trim_length(&self.input[self.start..self.pos])
        } else {
            0
        };
        self.pos -= trim;
        if self.pos > self.start {
            self.emit(ItemKind::Text);
        }
        self.pos += trim;
        self.ignore();
    }

    /// Returns true when an action was opened, false after a comment
    fn lex_left_delim(&mut self) -> Result<bool, LexError> {
        self.pos += LEFT_DELIM.len();
        let after_marker = if has_left_trim_marker(&self.input[self.pos..]) {
            TRIM_MARKER_LEN
        } else {
            0
        };
        if self.input[self.pos + after_marker..].starts_with(LEFT_COMMENT) {
            self.pos += after_marker;
            self.ignore();
            self.lex_comment()?;
            return Ok(false);
        }
        self.emit(ItemKind::LeftDelim);
        self.pos += after_marker;
        self.ignore();
        self.paren_depth = 0;
        Ok(true)
    }

    fn lex_comment(&mut self) -> Result<(), LexError> {
        self.pos += LEFT_COMMENT.len();
        let Some(end) = self.input[self.pos..].find(RIGHT_COMMENT) else {
            return Err(self.error("unclosed comment"));
        };
        self.pos += end + RIGHT_COMMENT.len();
        let (delim, trim) = self.at_right_delim();
        if !delim {
            return Err(self.error("comment ends before closing delimiter"));
        }
        if self.emit_comments {
            self.emit(ItemKind::Comment);
        }
        if trim {
            self.pos += TRIM_MARKER_LEN;
        }
        self.pos += RIGHT_DELIM.len();
        if trim {
            self.pos += left_trim_length(&self.input[self.pos..]);
        }
        self.ignore();
        Ok(())
    }

    fn lex_right_delim(&mut self, trim: bool) {
        if trim {
            self.pos += TRIM_MARKER_LEN;
            self.ignore();
        }
        self.pos += RIGHT_DELIM.len();
        self.emit(ItemKind::RightDelim);
        if trim {
            self.pos += left_trim_length(&self.input[self.pos..]);
            self.ignore();
        }
    }

    /// Lex one item inside an action. Returns false once the action is closed.
    fn lex_inside_action(&mut self) -> Result<bool, LexError> {
        let (delim, trim) = self.at_right_delim();
        if delim {
            if self.paren_depth == 0 {
                self.lex_right_delim(trim);
                return Ok(false);
            }
            return Err(self.error("unclosed left paren"));
        }
        let Some(r) = self.next() else {
            return Err(self.error("unclosed action"));
        };
        match r {
            r if is_space(r) => {
                self.backup(r);
                self.lex_space();
            }
            '=' => self.emit(ItemKind::Assign),
            ':' => {
                if self.next() != Some('=') {
                    return Err(self.error("expected :="));
                }
                self.emit(ItemKind::Declare);
            }
            '|' => self.emit(ItemKind::Pipe),
            '"' => self.lex_quote()?,
            '`' => self.lex_raw_quote()?,
            '$' => self.lex_field_or_variable(ItemKind::Variable)?,
            '\'' => self.lex_char()?,
            '.' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.lex_field_or_variable(ItemKind::Field)?
            }
            '.' | '+' | '-' | '0'..='9' => {
                self.backup(r);
                self.lex_number()?;
            }
            r if is_alphanumeric(r) => {
                self.backup(r);
                self.lex_identifier()?;
            }
            '(' => {
                self.emit(ItemKind::LeftParen);
                self.paren_depth += 1;
            }
            ')' => {
                self.emit(ItemKind::RightParen);
                self.paren_depth -= 1;
                if self.paren_depth < 0 {
                    return Err(self.error("unexpected right paren"));
                }
            }
            r if r.is_ascii() && !r.is_ascii_control() => self.emit(ItemKind::Char),
            r => {
                return Err(self.error(format!(
                    "unrecognized character in action: {}",
                    describe_char(r)
                )))
            }
        }
        Ok(true)
    }

    fn lex_space(&mut self) {
        let mut spaces = 0;
        while self.peek().is_some_and(is_space) {
            self.next();
            spaces += 1;
        }
        // a trim-marked closing delimiter starts with one of these spaces
        let last_space = self.pos - 1;
        if has_right_trim_marker(&self.input[last_space..])
            && self.input[last_space + TRIM_MARKER_LEN..].starts_with(RIGHT_DELIM)
        {
            self.pos = last_space;
            if spaces == 1 {
                return;
            }
        }
        self.emit(ItemKind::Space);
    }

    fn lex_identifier(&mut self) -> Result<(), LexError> {
        self.accept_alphanumeric_run();
        if !self.at_terminator() {
            return Err(self.bad_character());
        }
        let word = &self.input[self.start..self.pos];
        let kind = if let Some(keyword) = ItemKind::keyword(word) {
            keyword
        } else if word == "true" || word == "false" {
            ItemKind::Bool
        } else {
            ItemKind::Identifier
        };
        self.emit(kind);
        Ok(())
    }

    /// Lex `.Field` or `$var` after the leading `.` or `$` was consumed
    fn lex_field_or_variable(&mut self, kind: ItemKind) -> Result<(), LexError> {
        if self.at_terminator() {
            let kind = if kind == ItemKind::Variable {
                ItemKind::Variable
            } else {
                ItemKind::Dot
            };
            self.emit(kind);
            return Ok(());
        }
        self.accept_alphanumeric_run();
        if !self.at_terminator() {
            return Err(self.bad_character());
        }
        self.emit(kind);
        Ok(())
    }

    fn lex_quote(&mut self) -> Result<(), LexError> {
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some('\n') | None => return Err(self.error("unterminated quoted string")),
                    Some(_) => {}
                },
                Some('\n') | None => return Err(self.error("unterminated quoted string")),
                Some('"') => break,
                Some(_) => {}
            }
        }
        self.emit(ItemKind::String);
        Ok(())
    }

    fn lex_raw_quote(&mut self) -> Result<(), LexError> {
        match self.input[self.pos..].find('`') {
            Some(end) => {
                self.pos += end + 1;
                self.emit(ItemKind::RawString);
                Ok(())
            }
            None => Err(self.error("unterminated raw quoted string")),
        }
    }

    fn lex_char(&mut self) -> Result<(), LexError> {
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some('\n') | None => {
                        return Err(self.error("unterminated character constant"))
                    }
                    Some(_) => {}
                },
                Some('\n') | None => return Err(self.error("unterminated character constant")),
                Some('\'') => break,
                Some(_) => {}
            }
        }
        self.emit(ItemKind::CharConstant);
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), LexError> {
        if !self.scan_number() {
            return Err(self.bad_number());
        }
        if matches!(self.peek(), Some('+' | '-')) {
            // complex literal such as 1+2i
            if !self.scan_number() || !self.input[..self.pos].ends_with('i') {
                return Err(self.bad_number());
            }
        }
        self.emit(ItemKind::Number);
        Ok(())
    }

    fn scan_number(&mut self) -> bool {
        self.accept("+-");
        let mut digits = "0123456789_";
        if self.accept("0") {
            if self.accept("xX") {
                digits = "0123456789abcdefABCDEF_";
            } else if self.accept("oO") {
                digits = "01234567_";
            } else if self.accept("bB") {
                digits = "01_";
            }
        }
        self.accept_run(digits);
        if self.accept(".") {
            self.accept_run(digits);
        }
        if digits.len() == 11 && self.accept("eE") {
            self.accept("+-");
            self.accept_run("0123456789_");
        }
        if digits.len() == 23 && self.accept("pP") {
            self.accept("+-");
            self.accept_run("0123456789_");
        }
        self.accept("i");
        if self.peek().is_some_and(is_alphanumeric) {
            self.next();
            return false;
        }
        true
    }

    fn at_right_delim(&self) -> (bool, bool) {
        let rest = &self.input[self.pos..];
        if has_right_trim_marker(rest) && rest[TRIM_MARKER_LEN..].starts_with(RIGHT_DELIM) {
            return (true, true);
        }
        (rest.starts_with(RIGHT_DELIM), false)
    }

    fn at_terminator(&self) -> bool {
        match self.peek() {
            None => true,
            Some(r) if is_space(r) => true,
            Some('.' | ',' | '|' | ':' | ')' | '(') => true,
            Some(_) => self.input[self.pos..].starts_with(RIGHT_DELIM),
        }
    }

    fn accept(&mut self, valid: &str) -> bool {
        match self.peek() {
            Some(r) if valid.contains(r) => {
                self.next();
                true
            }
            _ => false,
        }
    }

    fn accept_run(&mut self, valid: &str) {
        while self.accept(valid) {}
    }

    fn accept_alphanumeric_run(&mut self) {
        while let Some(r) = self.peek().filter(|r| is_alphanumeric(*r)) {
            self.pos += r.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let r = self.peek()?;
        self.pos += r.len_utf8();
        Some(r)
    }

    fn backup(&mut self, r: char) {
        self.pos -= r.len_utf8();
    }

    fn current_line(&mut self) -> usize {
        if self.start > self.line_pos {
            self.line += self.input[self.line_pos..self.start].matches('\n').count();
            self.line_pos = self.start;
        }
        self.line
    }

    fn emit(&mut self, kind: ItemKind) {
        let line = self.current_line();
        self.items.push(Item {
            kind,
            val: self.input[self.start..self.pos].to_string(),
            line,
        });
        self.start = self.pos;
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn error(&mut self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.current_line(),
        }
    }

    fn bad_character(&mut self) -> LexError {
        let found = self.peek().map(describe_char).unwrap_or_else(|| "EOF".to_string());
        self.error(format!("bad character {}", found))
    }

    fn bad_number(&mut self) -> LexError {
        let text = self.input[self.start..self.pos].to_string();
        self.error(format!("bad number syntax: {:?}", text))
    }
}

fn is_space(r: char) -> bool {
    matches!(r, ' ' | '\t' | '\r' | '\n')
}

/// Letters, decimal digits and `_`
fn is_alphanumeric(r: char) -> bool {
    r == '_' || r.is_alphabetic() || r.is_ascii_digit()
}

fn has_left_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some(TRIM_MARKER) && chars.next().is_some_and(is_space)
}

fn has_right_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_space) && chars.next() == Some(TRIM_MARKER)
}

fn right_trim_length(s: &str) -> usize {
    s.len() - s.trim_end_matches(is_space).len()
}

fn left_trim_length(s: &str) -> usize {
    s.len() - s.trim_start_matches(is_space).len()
}

fn describe_char(r: char) -> String {
    format!("U+{:04X} '{}'", r as u32, r)
}
