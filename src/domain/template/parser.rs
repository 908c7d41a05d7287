// Template parser using recursive descent over lexer items

use super::ast::{Arg, Branch, Command, Node, Pipe, Tree, TreeSet, ROOT_NAME};
use super::lexer::{Item, ItemKind, Lexer};
use super::quote::unquote;
use super::registry::FunctionRegistry;
use crate::error::{ParseError, ParseErrorKind};

type Result<T> = std::result::Result<T, ParseError>;

/// Parses template text into named trees without executing anything
pub struct TemplateParser<'a> {
    name: String,
    functions: &'a FunctionRegistry,
    parse_comments: bool,
}

/// What `text_or_action` produced
enum Parsed {
    Node(Node),
    End,
    Else,
}

/// How an item list was closed
#[derive(PartialEq)]
enum ListEnd {
    End,
    Else,
}

impl<'a> TemplateParser<'a> {
    /// `name` is used in error messages only
    pub fn new(name: impl Into<String>, functions: &'a FunctionRegistry) -> Self {
        Self {
            name: name.into(),
            functions,
            parse_comments: false,
        }
    }

    /// Keep `{{/* */}}` comments as nodes instead of dropping them
    pub fn parse_comments(mut self, keep: bool) -> Self {
        self.parse_comments = keep;
        self
    }

    pub fn parse(&self, text: &str) -> Result<TreeSet> {
        let items = Lexer::lex(text, self.parse_comments).map_err(|err| ParseError {
            name: self.name.clone(),
            line: err.line,
            kind: ParseErrorKind::Syntax(err.message),
        })?;
        let mut state = ParseState {
            name: &self.name,
            functions: self.functions,
            items,
            pos: 0,
            line: 1,
            vars: vec!["$".to_string()],
            range_depth: 0,
            trees: TreeSet::new(),
        };
        state.parse_file()?;
        Ok(state.trees)
    }
}

struct ParseState<'a> {
    name: &'a str,
    functions: &'a FunctionRegistry,
    items: Vec<Item>,
    pos: usize,
    line: usize,
    vars: Vec<String>,
    range_depth: usize,
    trees: TreeSet,
}

impl<'a> ParseState<'a> {
    fn parse_file(&mut self) -> Result<()> {
        let mut root = Vec::new();
        while self.peek().kind != ItemKind::Eof {
            if self.peek().kind == ItemKind::LeftDelim {
                let delim = self.pos;
                self.next();
                if self.next_non_space().kind == ItemKind::Define {
                    self.parse_definition()?;
                    continue;
                }
                self.pos = delim;
            }
            match self.text_or_action()? {
                Parsed::Node(node) => root.push(node),
                Parsed::End => return Err(self.error("unexpected {{end}}")),
                Parsed::Else => return Err(self.error("unexpected {{else}}")),
            }
        }
        self.add_tree(Tree::new(ROOT_NAME, root))
    }

    fn parse_definition(&mut self) -> Result<()> {
        const CONTEXT: &str = "define clause";
        let token = self.next_non_space();
        let name = self.parse_template_name(&token, CONTEXT)?;
        self.expect(ItemKind::RightDelim, CONTEXT)?;
        let (list, end) = self.nested_tree(|state| state.item_list())?;
        if end != ListEnd::End {
            return Err(self.error(format!("unexpected {{{{else}}}} in {}", CONTEXT)));
        }
        self.add_tree(Tree::new(name, list))
    }

    /// Parse a separately named tree with its own variable scope
    fn nested_tree<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let outer_vars = std::mem::replace(&mut self.vars, vec!["$".to_string()]);
        let outer_depth = std::mem::replace(&mut self.range_depth, 0);
        let result = parse(self);
        self.vars = outer_vars;
        self.range_depth = outer_depth;
        result
    }

    fn add_tree(&mut self, tree: Tree) -> Result<()> {
        let name = tree.name.clone();
        if self.trees.add(tree) {
            Ok(())
        } else {
            Err(self.error(format!("multiple definition of template {:?}", name)))
        }
    }

    fn item_list(&mut self) -> Result<(Vec<Node>, ListEnd)> {
        let mut list = Vec::new();
        while self.peek_non_space().kind != ItemKind::Eof {
            match self.text_or_action()? {
                Parsed::Node(node) => list.push(node),
                Parsed::End => return Ok((list, ListEnd::End)),
                Parsed::Else => return Ok((list, ListEnd::Else)),
            }
        }
        Err(self.error("unexpected EOF"))
    }

    fn text_or_action(&mut self) -> Result<Parsed> {
        let token = self.next_non_space();
        match token.kind {
            ItemKind::Text => Ok(Parsed::Node(Node::Text(token.val))),
            ItemKind::Comment => Ok(Parsed::Node(Node::Comment(token.val))),
            ItemKind::LeftDelim => self.action(),
            _ => Err(self.unexpected(&token, "input")),
        }
    }

    fn action(&mut self) -> Result<Parsed> {
        let token = self.next_non_space();
        let node = match token.kind {
            ItemKind::Block => self.block_control()?,
            ItemKind::Break => self.loop_control("break", Node::Break)?,
            ItemKind::Continue => self.loop_control("continue", Node::Continue)?,
            ItemKind::Else => return self.else_control(),
            ItemKind::End => {
                self.expect(ItemKind::RightDelim, "end")?;
                return Ok(Parsed::End);
            }
            ItemKind::If => Node::If(self.parse_control("if")?),
            ItemKind::Range => Node::Range(self.parse_control("range")?),
            ItemKind::With => Node::With(self.parse_control("with")?),
            ItemKind::Template => self.template_control()?,
            _ => {
                self.backup();
                Node::Action(self.pipeline("command", ItemKind::RightDelim)?)
            }
        };
        Ok(Parsed::Node(node))
    }

    fn else_control(&mut self) -> Result<Parsed> {
        // `{{else if ...}}` and `{{else with ...}}` leave the keyword for parse_control
        let peek = self.peek_non_space();
        if peek.kind != ItemKind::If && peek.kind != ItemKind::With {
            self.expect(ItemKind::RightDelim, "else")?;
        }
        Ok(Parsed::Else)
    }

    fn parse_control(&mut self, context: &str) -> Result<Branch> {
        let vars = self.vars.len();
        let pipe = self.pipeline(context, ItemKind::RightDelim)?;
        if context == "range" {
            self.range_depth += 1;
        }
        let (list, end) = self.item_list()?;
        if context == "range" {
            self.range_depth -= 1;
        }
        let else_list = match end {
            ListEnd::End => None,
            ListEnd::Else if context == "if" && self.peek().kind == ItemKind::If => {
                self.next();
                Some(vec![Node::If(self.parse_control("if")?)])
            }
            ListEnd::Else if context == "with" && self.peek().kind == ItemKind::With => {
                self.next();
                Some(vec![Node::With(self.parse_control("with")?)])
            }
            ListEnd::Else => {
                let (list, end) = self.item_list()?;
                if end != ListEnd::End {
                    return Err(self.error("expected end; found {{else}}"));
                }
                Some(list)
            }
        };
        self.vars.truncate(vars);
        Ok(Branch {
            pipe,
            list,
            else_list,
        })
    }

    fn block_control(&mut self) -> Result<Node> {
        const CONTEXT: &str = "block clause";
        let token = self.next_non_space();
        let name = self.parse_template_name(&token, CONTEXT)?;
        let pipe = self.pipeline(CONTEXT, ItemKind::RightDelim)?;
        let (list, end) = self.nested_tree(|state| state.item_list())?;
        if end != ListEnd::End {
            return Err(self.error(format!("unexpected {{{{else}}}} in {}", CONTEXT)));
        }
        self.add_tree(Tree::new(name.clone(), list))?;
        Ok(Node::Template {
            name,
            pipe: Some(pipe),
        })
    }

    fn template_control(&mut self) -> Result<Node> {
        const CONTEXT: &str = "template clause";
        let token = self.next_non_space();
        let name = self.parse_template_name(&token, CONTEXT)?;
        let pipe = if self.next_non_space().kind != ItemKind::RightDelim {
            self.backup();
            Some(self.pipeline(CONTEXT, ItemKind::RightDelim)?)
        } else {
            None
        };
        Ok(Node::Template { name, pipe })
    }

    fn loop_control(&mut self, keyword: &str, node: Node) -> Result<Node> {
        let token = self.next_non_space();
        if token.kind != ItemKind::RightDelim {
            return Err(self.unexpected(&token, &format!("{{{{{}}}}}", keyword)));
        }
        if self.range_depth == 0 {
            return Err(self.error(format!("{{{{{}}}}} outside {{{{range}}}}", keyword)));
        }
        Ok(node)
    }

    fn parse_template_name(&mut self, token: &Item, context: &str) -> Result<String> {
        match token.kind {
            ItemKind::String | ItemKind::RawString => unquote(&token.val)
                .ok_or_else(|| self.error(format!("invalid syntax: {}", token.val))),
            _ => Err(self.unexpected(token, context)),
        }
    }

    fn pipeline(&mut self, context: &str, end: ItemKind) -> Result<Pipe> {
        let mut pipe = Pipe::default();
        while self.peek_non_space().kind == ItemKind::Variable {
            let variable_pos = self.pos;
            let variable = self.next();
            let next = self.peek_non_space();
            match next.kind {
                ItemKind::Assign | ItemKind::Declare => {
                    pipe.is_assign = next.kind == ItemKind::Assign;
                    self.next_non_space();
                    self.declare(&mut pipe, variable.val);
                }
                ItemKind::Char if next.val == "," => {
                    self.next_non_space();
                    self.declare(&mut pipe, variable.val);
                    if context == "range" && pipe.decl.len() < 2 {
                        match self.peek_non_space().kind {
                            ItemKind::Variable | ItemKind::RightDelim | ItemKind::RightParen => {
                                continue
                            }
                            _ => return Err(self.error("range can only initialize variables")),
                        }
                    }
                    return Err(self.error(format!("too many declarations in {}", context)));
                }
                _ => self.pos = variable_pos,
            }
            break;
        }
        loop {
            let token = self.next_non_space();
            match token.kind {
                kind if kind == end => {
                    self.check_pipeline(&pipe, context)?;
                    return Ok(pipe);
                }
                ItemKind::Bool
                | ItemKind::CharConstant
                | ItemKind::Dot
                | ItemKind::Field
                | ItemKind::Identifier
                | ItemKind::Number
                | ItemKind::Nil
                | ItemKind::RawString
                | ItemKind::String
                | ItemKind::Variable
                | ItemKind::LeftParen => {
                    self.backup();
                    let command = self.command()?;
                    pipe.cmds.push(command);
                }
                _ => return Err(self.unexpected(&token, context)),
            }
        }
    }

    fn declare(&mut self, pipe: &mut Pipe, variable: String) {
        self.vars.push(variable.clone());
        pipe.decl.push(variable);
    }

    fn check_pipeline(&self, pipe: &Pipe, context: &str) -> Result<()> {
        if pipe.cmds.is_empty() {
            return Err(self.error(format!("missing value for {}", context)));
        }
        for (stage, command) in pipe.cmds.iter().enumerate().skip(1) {
            if let Some(
                Arg::Bool(_) | Arg::Dot | Arg::Nil | Arg::Number(_) | Arg::String { .. },
            ) = command.args.first()
            {
                return Err(self.error(format!(
                    "non executable command in pipeline stage {}",
                    stage + 1
                )));
            }
        }
        Ok(())
    }

    fn command(&mut self) -> Result<Command> {
        let mut command = Command::default();
        loop {
            self.peek_non_space();
            if let Some(operand) = self.operand()? {
                command.args.push(operand);
            }
            let token = self.next();
            match token.kind {
                ItemKind::Space => continue,
                ItemKind::RightDelim | ItemKind::RightParen => self.backup(),
                ItemKind::Pipe => {}
                _ => return Err(self.unexpected(&token, "operand")),
            }
            break;
        }
        if command.args.is_empty() {
            return Err(self.error("empty command"));
        }
        Ok(command)
    }

    fn operand(&mut self) -> Result<Option<Arg>> {
        let Some(node) = self.term()? else {
            return Ok(None);
        };
        if self.peek().kind != ItemKind::Field {
            return Ok(Some(node));
        }
        let mut fields = Vec::new();
        while self.peek().kind == ItemKind::Field {
            let field = self.next();
            fields.push(field.val[1..].to_string());
        }
        let node = match node {
            Arg::Field(mut idents) => {
                idents.extend(fields);
                Arg::Field(idents)
            }
            Arg::Variable(mut idents) => {
                idents.extend(fields);
                Arg::Variable(idents)
            }
            Arg::Bool(_) | Arg::String { .. } | Arg::Number(_) | Arg::Nil | Arg::Dot => {
                return Err(self.error(format!("unexpected . after term {:?}", node.to_string())));
            }
            node => Arg::Chain {
                node: Box::new(node),
                fields,
            },
        };
        Ok(Some(node))
    }

    fn term(&mut self) -> Result<Option<Arg>> {
        let token = self.next_non_space();
        let arg = match token.kind {
            ItemKind::Identifier => {
                if !self.functions.contains(&token.val) {
                    return Err(ParseError {
                        name: self.name.to_string(),
                        line: self.line,
                        kind: ParseErrorKind::UndefinedFunction(token.val),
                    });
                }
                Arg::Identifier(token.val)
            }
            ItemKind::Dot => Arg::Dot,
            ItemKind::Nil => Arg::Nil,
            ItemKind::Variable => self.use_var(&token.val)?,
            ItemKind::Field => Arg::Field(token.val[1..].split('.').map(String::from).collect()),
            ItemKind::Bool => Arg::Bool(token.val == "true"),
            ItemKind::Number | ItemKind::CharConstant => self.number(token)?,
            ItemKind::LeftParen => {
                let pipe = self.pipeline("parenthesized pipeline", ItemKind::RightParen)?;
                Arg::Pipe(Box::new(pipe))
            }
            ItemKind::String | ItemKind::RawString => match unquote(&token.val) {
                Some(text) => Arg::String {
                    quoted: token.val,
                    text,
                },
                None => return Err(self.error(format!("invalid syntax: {}", token.val))),
            },
            _ => {
                self.backup();
                return Ok(None);
            }
        };
        Ok(Some(arg))
    }

    fn use_var(&self, name: &str) -> Result<Arg> {
        let idents: Vec<String> = name.split('.').map(String::from).collect();
        if self.vars.iter().any(|var| *var == idents[0]) {
            Ok(Arg::Variable(idents))
        } else {
            Err(self.error(format!("undefined variable {:?}", idents[0])))
        }
    }

    fn number(&self, token: Item) -> Result<Arg> {
        if token.kind == ItemKind::CharConstant {
            if unquote(&token.val).is_none() {
                return Err(self.error(format!("malformed character constant: {}", token.val)));
            }
        } else if !is_number_literal(&token.val) {
            return Err(self.error(format!("illegal number syntax: {:?}", token.val)));
        }
        Ok(Arg::Number(token.val))
    }

    fn expect(&mut self, kind: ItemKind, context: &str) -> Result<Item> {
        let token = self.next_non_space();
        if token.kind != kind {
            return Err(self.unexpected(&token, context));
        }
        Ok(token)
    }

    fn peek(&self) -> &Item {
        &self.items[self.pos.min(self.items.len() - 1)]
    }

    fn next(&mut self) -> Item {
        let item = self.peek().clone();
        self.pos += 1;
        self.line = item.line;
        item
    }

    fn backup(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }

    fn next_non_space(&mut self) -> Item {
        loop {
            let item = self.next();
            if item.kind != ItemKind::Space {
                return item;
            }
        }
    }

    fn peek_non_space(&mut self) -> Item {
        let item = self.next_non_space();
        self.backup();
        item
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            name: self.name.to_string(),
            line: self.line,
            kind: ParseErrorKind::Syntax(message.into()),
        }
    }

    fn unexpected(&self, token: &Item, context: &str) -> ParseError {
        self.error(format!("unexpected {} in {}", token, context))
    }
}


/// Integer (optionally with a 0x/0o/0b prefix), float, imaginary or complex
/// literal, with `_` only between digits.
fn is_number_literal(text: &str) -> bool {
    let Some(body) = text.strip_suffix('i') else {
        return is_real(text);
    };
    match complex_split(body) {
        Some(at) => is_real(&body[..at]) && is_real(&body[at..]),
        None => is_real(body),
    }
}

/// Index of the sign that starts the imaginary part of `a+bi`
fn complex_split(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    (1..bytes.len()).rev().find(|&i| {
        matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E' | b'p' | b'P')
    })
}

fn is_real(text: &str) -> bool {
    if !underscores_ok(text) {
        return false;
    }
    let text = text.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(text);
    match text.get(..2) {
        Some("0x" | "0X") => is_hex(&text[2..]),
        Some("0o" | "0O") => is_integer(&text[2..], 8),
        Some("0b" | "0B") => is_integer(&text[2..], 2),
        _ => is_decimal(text),
    }
}

fn is_integer(digits: &str, radix: u32) -> bool {
    u64::from_str_radix(&digits.replace('_', ""), radix).is_ok()
}

fn is_hex(digits: &str) -> bool {
    if is_integer(digits, 16) {
        return true;
    }
    // hex floats need a binary exponent
    match digits.split_once(|c: char| c == 'p' || c == 'P') {
        Some((mantissa, exponent)) => {
            is_mantissa(mantissa, |c| c.is_ascii_hexdigit()) && is_exponent(exponent)
        }
        None => false,
    }
}

fn is_decimal(digits: &str) -> bool {
    match digits.split_once(|c: char| c == 'e' || c == 'E') {
        Some((mantissa, exponent)) => {
            is_mantissa(mantissa, |c| c.is_ascii_digit()) && is_exponent(exponent)
        }
        None => is_mantissa(digits, |c| c.is_ascii_digit()),
    }
}

fn is_mantissa(text: &str, is_digit: fn(char) -> bool) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for c in text.chars() {
        match c {
            '.' => dots += 1,
            '_' => {}
            c if is_digit(c) => digits += 1,
            _ => return false,
        }
    }
    dots <= 1 && digits > 0
}

fn is_exponent(text: &str) -> bool {
    let text = text.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(text);
    text.chars().any(|c| c.is_ascii_digit()) && text.chars().all(|c| c.is_ascii_digit() || c == '_')
}

/// `_` may only separate digits, or follow a base prefix
fn underscores_ok(text: &str) -> bool {
    #[derive(PartialEq)]
    enum Saw {
        Start,
        Digit,
        Underscore,
        Other,
    }
    let bytes = text.as_bytes();
    let mut i = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut saw = Saw::Start;
    let mut hex = false;
    if bytes.len() >= i + 2
        && bytes[i] == b'0'
        && matches!(bytes[i + 1].to_ascii_lowercase(), b'b' | b'o' | b'x')
    {
        hex = bytes[i + 1].to_ascii_lowercase() == b'x';
        saw = Saw::Digit;
        i += 2;
    }
    for &b in &bytes[i..] {
        if b.is_ascii_digit() || (hex && b.is_ascii_hexdigit()) {
            saw = Saw::Digit;
        } else if b == b'_' {
            if saw != Saw::Digit {
                return false;
            }
            saw = Saw::Underscore;
        } else if saw == Saw::Underscore {
            return false;
        } else {
            saw = Saw::Other;
        }
    }
    saw != Saw::Underscore
}
