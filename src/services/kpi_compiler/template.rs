//! Constrained template engine for organization query templates
//!
//! Supported syntax:
//! - `{{ path }}` and `{{ path | filter | ... }}` with `join("sep")`, `lower`, `upper`,
//!   `length` and `default("x")`
//! - `{% for x in path %}...{% endfor %}` exposing `loop.index`, `loop.index0`,
//!   `loop.first`, `loop.last` and `loop.length`
//! - `{% if expr %}...{% elif expr %}...{% else %}...{% endif %}`
//! - `{# comment #}` and the `-` trim markers on every delimiter
//!
//! Undefined paths render as empty and test as false. Printing an array or an object
//! without a filter is an error.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

const MAX_NESTING_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("blocks nested deeper than {max} levels at byte {offset}")]
    TooDeep { offset: usize, max: usize },

    #[error("cannot print '{path}': {kind} values need a filter such as join")]
    NotPrintable { path: String, kind: &'static str },

    #[error("'{path}' is not a list and cannot be iterated")]
    NotIterable { path: String },

    #[error("filter '{filter}' cannot be applied to '{path}'")]
    BadFilterInput { filter: &'static str, path: String },
}

fn syntax(offset: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Syntax { offset, message: message.into() }
}

// ---------------------------------------------------------------------------
// Lexing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Text,
    Output,
    Tag,
    Comment,
}

#[derive(Debug, Clone)]
struct RawToken {
    kind: TokenKind,
    content: String,
    offset: usize,
    trim_before: bool,
    trim_after: bool,
}

fn lex(source: &str) -> Result<Vec<RawToken>, TemplateError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos + 1 < bytes.len() {
        let (kind, close) = match (bytes[pos], bytes[pos + 1]) {
            (b'{', b'{') => (TokenKind::Output, "}}"),
            (b'{', b'%') => (TokenKind::Tag, "%}"),
            (b'{', b'#') => (TokenKind::Comment, "#}"),
            _ => {
                pos += 1;
                continue;
            },
        };

        if text_start < pos {
            tokens.push(text_token(&source[text_start..pos], text_start));
        }

        let inner_start = pos + 2;
        let inner_len = source[inner_start..].find(close).ok_or_else(|| {
            syntax(pos, format!("unclosed delimiter, expected '{}'", close))
        })?;
        let mut inner = &source[inner_start..inner_start + inner_len];

        let trim_before = inner.starts_with('-');
        if trim_before {
            inner = &inner[1..];
        }
        let trim_after = inner.ends_with('-');
        if trim_after {
            inner = &inner[..inner.len() - 1];
        }

        tokens.push(RawToken {
            kind,
            content: inner.trim().to_string(),
            offset: pos,
            trim_before,
            trim_after,
        });

        pos = inner_start + inner_len + close.len();
        text_start = pos;
    }

    if text_start < source.len() {
        tokens.push(text_token(&source[text_start..], text_start));
    }

    apply_trim_markers(&mut tokens);
    tokens.retain(|t| t.kind != TokenKind::Comment);
    Ok(tokens)
}

fn text_token(text: &str, offset: usize) -> RawToken {
    RawToken {
        kind: TokenKind::Text,
        content: text.to_string(),
        offset,
        trim_before: false,
        trim_after: false,
    }
}

fn apply_trim_markers(tokens: &mut [RawToken]) {
    for i in 0..tokens.len() {
        if tokens[i].kind == TokenKind::Text {
            continue;
        }
        if tokens[i].trim_before && i > 0 && tokens[i - 1].kind == TokenKind::Text {
            let trimmed = tokens[i - 1].content.trim_end().to_string();
            tokens[i - 1].content = trimmed;
        }
        if tokens[i].trim_after && i + 1 < tokens.len() && tokens[i + 1].kind == TokenKind::Text {
            let trimmed = tokens[i + 1].content.trim_start().to_string();
            tokens[i + 1].content = trimmed;
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Ident(String),
    Str(String),
    Int(i64),
    Eq,
    Ne,
    LParen,
    RParen,
    Pipe,
}

fn tokenize_expr(src: &str, offset: usize) -> Result<Vec<ExprToken>, TemplateError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(ExprToken::LParen);
                i += 1;
            },
            ')' => {
                tokens.push(ExprToken::RParen);
                i += 1;
            },
            '|' => {
                tokens.push(ExprToken::Pipe);
                i += 1;
            },
            '=' | '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(if c == '=' { ExprToken::Eq } else { ExprToken::Ne });
                i += 2;
            },
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax(offset, "unterminated string literal")),
                        Some('\\') if chars.get(i + 1).is_some() => {
                            value.push(chars[i + 1]);
                            i += 2;
                        },
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        },
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        },
                    }
                }
                tokens.push(ExprToken::Str(value));
            },
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while chars.get(i).is_some_and(|n| n.is_ascii_digit()) {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| syntax(offset, format!("invalid integer '{}'", literal)))?;
                tokens.push(ExprToken::Int(value));
            },
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while chars.get(i).is_some_and(|n| n.is_alphanumeric() || *n == '_' || *n == '.') {
                    i += 1;
                }
                tokens.push(ExprToken::Ident(chars[start..i].iter().collect()));
            },
            other => return Err(syntax(offset, format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct Path {
    source: String,
    segments: Vec<Segment>,
}

impl Path {
    fn parse(source: &str, offset: usize) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        for part in source.split('.') {
            if part.is_empty() {
                return Err(syntax(offset, format!("invalid path '{}'", source)));
            }
            match part.parse::<usize>() {
                Ok(index) => segments.push(Segment::Index(index)),
                Err(_) => segments.push(Segment::Key(part.to_string())),
            }
        }
        if !matches!(segments.first(), Some(Segment::Key(_))) {
            return Err(syntax(offset, format!("path '{}' must start with a name", source)));
        }
        Ok(Self { source: source.to_string(), segments })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Path(Path),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Join(String),
    Lower,
    Upper,
    Length,
    Default(String),
}

impl Filter {
    fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Length => "length",
            Self::Default(_) => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
enum Cond {
    Operand(Operand),
    Compare { left: Operand, op: CompareOp, right: Operand },
    Not(Box<Cond>),
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
}

#[derive(Debug, Clone, PartialEq)]
struct OutputExpr {
    operand: Operand,
    filters: Vec<Filter>,
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
    offset: usize,
    depth: usize,
}

impl ExprParser {
    fn new(src: &str, offset: usize) -> Result<Self, TemplateError> {
        Ok(Self { tokens: tokenize_expr(src, offset)?, pos: 0, offset, depth: 0 })
    }

    /// `not` chains and parentheses share the block nesting bound
    fn descend(&mut self) -> Result<(), TemplateError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(TemplateError::TooDeep { offset: self.offset, max: MAX_NESTING_DEPTH });
        }
        Ok(())
    }

    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<ExprToken> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(ExprToken::Ident(word)) if word == keyword)
    }

    fn expect_end(&self) -> Result<(), TemplateError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(syntax(self.offset, format!("unexpected token {:?}", token))),
        }
    }

    fn parse_output(&mut self) -> Result<OutputExpr, TemplateError> {
        let operand = self.parse_operand()?;
        let mut filters = Vec::new();
        while self.peek() == Some(&ExprToken::Pipe) {
            self.pos += 1;
            filters.push(self.parse_filter()?);
        }
        self.expect_end()?;
        Ok(OutputExpr { operand, filters })
    }

    fn parse_filter(&mut self) -> Result<Filter, TemplateError> {
        let name = match self.next() {
            Some(ExprToken::Ident(name)) => name,
            _ => return Err(syntax(self.offset, "expected filter name after '|'")),
        };
        match name.as_str() {
            "lower" => Ok(Filter::Lower),
            "upper" => Ok(Filter::Upper),
            "length" => Ok(Filter::Length),
            "join" => Ok(Filter::Join(self.parse_filter_argument(&name)?)),
            "default" => Ok(Filter::Default(self.parse_filter_argument(&name)?)),
            other => Err(syntax(self.offset, format!("unknown filter '{}'", other))),
        }
    }

    fn parse_filter_argument(&mut self, filter: &str) -> Result<String, TemplateError> {
        let open = self.next();
        let argument = self.next();
        let close = self.next();
        match (open, argument, close) {
            (Some(ExprToken::LParen), Some(ExprToken::Str(value)), Some(ExprToken::RParen)) => {
                Ok(value)
            },
            _ => Err(syntax(self.offset, format!("filter '{}' takes one string argument", filter))),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, TemplateError> {
        match self.next() {
            Some(ExprToken::Str(value)) => Ok(Operand::Literal(Value::String(value))),
            Some(ExprToken::Int(value)) => Ok(Operand::Literal(Value::from(value))),
            Some(ExprToken::Ident(word)) => match word.as_str() {
                "true" | "True" => Ok(Operand::Literal(Value::Bool(true))),
                "false" | "False" => Ok(Operand::Literal(Value::Bool(false))),
                "none" | "None" | "null" => Ok(Operand::Literal(Value::Null)),
                "and" | "or" | "not" | "in" => {
                    Err(syntax(self.offset, format!("unexpected keyword '{}'", word)))
                },
                _ => Ok(Operand::Path(Path::parse(&word, self.offset)?)),
            },
            Some(token) => Err(syntax(self.offset, format!("unexpected token {:?}", token))),
            None => Err(syntax(self.offset, "expected a value")),
        }
    }

    fn parse_condition(&mut self) -> Result<Cond, TemplateError> {
        let cond = self.parse_or()?;
        self.expect_end()?;
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Cond, TemplateError> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Cond::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Cond, TemplateError> {
        let mut left = self.parse_not()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Cond::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Cond, TemplateError> {
        if self.peek_keyword("not") {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Cond::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Cond, TemplateError> {
        if self.peek() == Some(&ExprToken::LParen) {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_or()?;
            self.depth -= 1;
            return match self.next() {
                Some(ExprToken::RParen) => Ok(inner),
                _ => Err(syntax(self.offset, "expected ')'")),
            };
        }

        let left = self.parse_operand()?;
        let not_in = self.peek_keyword("not")
            && matches!(self.tokens.get(self.pos + 1), Some(ExprToken::Ident(w)) if w == "in");
        let op = match self.peek() {
            Some(ExprToken::Eq) => Some((CompareOp::Eq, 1)),
            Some(ExprToken::Ne) => Some((CompareOp::Ne, 1)),
            Some(ExprToken::Ident(word)) if word == "in" => Some((CompareOp::In, 1)),
            _ if not_in => Some((CompareOp::NotIn, 2)),
            _ => None,
        };

        match op {
            Some((op, width)) => {
                self.pos += width;
                let right = self.parse_operand()?;
                Ok(Cond::Compare { left, op, right })
            },
            None => Ok(Cond::Operand(left)),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Output(OutputExpr),
    For { var: String, iterable: Path, body: Vec<Node> },
    If { branches: Vec<(Cond, Vec<Node>)>, otherwise: Vec<Node> },
}

struct Terminator {
    keyword: String,
    rest: String,
    offset: usize,
}

struct Parser {
    tokens: Vec<RawToken>,
    pos: usize,
}

impl Parser {
    fn parse_block(
        &mut self,
        depth: usize,
        terminators: &[&str],
    ) -> Result<(Vec<Node>, Option<Terminator>), TemplateError> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.get(self.pos).cloned() {
            self.pos += 1;
            match token.kind {
                TokenKind::Text => {
                    if !token.content.is_empty() {
                        nodes.push(Node::Text(token.content));
                    }
                },
                TokenKind::Output => {
                    let mut parser = ExprParser::new(&token.content, token.offset)?;
                    nodes.push(Node::Output(parser.parse_output()?));
                },
                TokenKind::Comment => {},
                TokenKind::Tag => {
                    let (keyword, rest) = split_keyword(&token.content);
                    if terminators.contains(&keyword) {
                        return Ok((
                            nodes,
                            Some(Terminator {
                                keyword: keyword.to_string(),
                                rest: rest.to_string(),
                                offset: token.offset,
                            }),
                        ));
                    }
                    match keyword {
                        "for" => nodes.push(self.parse_for(rest, token.offset, depth)?),
                        "if" => nodes.push(self.parse_if(rest, token.offset, depth)?),
                        other => {
                            return Err(syntax(token.offset, format!("unexpected tag '{}'", other)));
                        },
                    }
                },
            }
        }

        Ok((nodes, None))
    }

    fn parse_for(&mut self, rest: &str, offset: usize, depth: usize) -> Result<Node, TemplateError> {
        check_depth(depth + 1, offset)?;

        let parts: Vec<&str> = rest.split_whitespace().collect();
        let (var, iterable) = match parts.as_slice() {
            [var, "in", iterable] => (*var, *iterable),
            _ => return Err(syntax(offset, "expected 'for <name> in <path>'")),
        };
        if var.contains('.') || var == "loop" {
            return Err(syntax(offset, format!("invalid loop variable '{}'", var)));
        }
        let iterable = Path::parse(iterable, offset)?;

        let (body, end) = self.parse_block(depth + 1, &["endfor"])?;
        if end.is_none() {
            return Err(syntax(offset, "'for' block is never closed"));
        }

        Ok(Node::For { var: var.to_string(), iterable, body })
    }

    fn parse_if(&mut self, rest: &str, offset: usize, depth: usize) -> Result<Node, TemplateError> {
        check_depth(depth + 1, offset)?;

        let mut branches = Vec::new();
        let mut otherwise = Vec::new();
        let mut cond = ExprParser::new(rest, offset)?.parse_condition()?;

        loop {
            let (body, end) = self.parse_block(depth + 1, &["elif", "else", "endif"])?;
            branches.push((cond, body));
            let end = end.ok_or_else(|| syntax(offset, "'if' block is never closed"))?;

            match end.keyword.as_str() {
                "elif" => {
                    cond = ExprParser::new(&end.rest, end.offset)?.parse_condition()?;
                },
                "else" => {
                    let (body, end) = self.parse_block(depth + 1, &["endif"])?;
                    if end.is_none() {
                        return Err(syntax(offset, "'if' block is never closed"));
                    }
                    otherwise = body;
                    break;
                },
                _ => break,
            }
        }

        Ok(Node::If { branches, otherwise })
    }
}

fn split_keyword(content: &str) -> (&str, &str) {
    match content.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (content, ""),
    }
}

fn check_depth(depth: usize, offset: usize) -> Result<(), TemplateError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(TemplateError::TooDeep { offset, max: MAX_NESTING_DEPTH });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Parsed template, reusable across renders
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parser = Parser { tokens: lex(source)?, pos: 0 };
        let (nodes, end) = parser.parse_block(0, &[])?;
        if let Some(end) = end {
            return Err(syntax(end.offset, format!("unexpected tag '{}'", end.keyword)));
        }
        Ok(Self { nodes })
    }

    /// Render against a JSON object whose keys are the top-level names
    pub fn render(&self, context: &Value) -> Result<String, TemplateError> {
        let mut scope = Scope { root: context, frames: Vec::new() };
        let mut out = String::new();
        render_nodes(&self.nodes, &mut scope, &mut out)?;
        Ok(out)
    }
}

/// Parse and render in one step
pub fn render_str(source: &str, context: &Value) -> Result<String, TemplateError> {
    Template::parse(source)?.render(context)
}

struct Scope<'a> {
    root: &'a Value,
    frames: Vec<(String, Value)>,
}

impl Scope<'_> {
    fn resolve(&self, path: &Path) -> Option<&Value> {
        let (first, rest) = path.segments.split_first()?;
        let Segment::Key(name) = first else {
            return None;
        };

        let mut current = self
            .frames
            .iter()
            .rev()
            .find(|(frame_name, _)| frame_name == name)
            .map(|(_, value)| value)
            .or_else(|| self.root.get(name))?;

        for segment in rest {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
                (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn value_of(&self, operand: &Operand) -> Value {
        match operand {
            Operand::Literal(value) => value.clone(),
            Operand::Path(path) => self.resolve(path).cloned().unwrap_or(Value::Null),
        }
    }
}

fn render_nodes(nodes: &[Node], scope: &mut Scope, out: &mut String) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output(expr) => out.push_str(&render_output(expr, scope)?),
            Node::For { var, iterable, body } => {
                let items = match scope.resolve(iterable) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(items)) => items.clone(),
                    Some(_) => return Err(TemplateError::NotIterable { path: iterable.to_string() }),
                };
                let length = items.len();

                for (index, item) in items.into_iter().enumerate() {
                    scope.frames.push((var.clone(), item));
                    scope.frames.push(("loop".to_string(), loop_object(index, length)));
                    let result = render_nodes(body, scope, out);
                    scope.frames.truncate(scope.frames.len() - 2);
                    result?;
                }
            },
            Node::If { branches, otherwise } => {
                let chosen = branches
                    .iter()
                    .find(|(cond, _)| evaluate(cond, scope))
                    .map(|(_, body)| body)
                    .unwrap_or(otherwise);
                render_nodes(chosen, scope, out)?;
            },
        }
    }
    Ok(())
}

fn loop_object(index: usize, length: usize) -> Value {
    let mut map = Map::new();
    map.insert("index".to_string(), Value::from(index + 1));
    map.insert("index0".to_string(), Value::from(index));
    map.insert("first".to_string(), Value::Bool(index == 0));
    map.insert("last".to_string(), Value::Bool(index + 1 == length));
    map.insert("length".to_string(), Value::from(length));
    Value::Object(map)
}

fn operand_label(operand: &Operand) -> String {
    match operand {
        Operand::Path(path) => path.to_string(),
        Operand::Literal(value) => value.to_string(),
    }
}

fn render_output(expr: &OutputExpr, scope: &Scope) -> Result<String, TemplateError> {
    let label = operand_label(&expr.operand);
    let mut value = scope.value_of(&expr.operand);

    for filter in &expr.filters {
        value = match filter {
            Filter::Default(fallback) => match value {
                Value::Null => Value::String(fallback.clone()),
                other => other,
            },
            Filter::Length => match &value {
                Value::Null => Value::from(0),
                Value::Array(items) => Value::from(items.len()),
                Value::Object(map) => Value::from(map.len()),
                Value::String(s) => Value::from(s.chars().count()),
                _ => return Err(TemplateError::BadFilterInput { filter: filter.name(), path: label }),
            },
            Filter::Join(separator) => match &value {
                Value::Null => Value::String(String::new()),
                Value::Array(items) => {
                    let parts = items
                        .iter()
                        .map(|item| scalar_text(item, &label))
                        .collect::<Result<Vec<_>, _>>()?;
                    Value::String(parts.join(separator))
                },
                _ => return Err(TemplateError::BadFilterInput { filter: filter.name(), path: label }),
            },
            Filter::Lower => Value::String(scalar_text(&value, &label)?.to_lowercase()),
            Filter::Upper => Value::String(scalar_text(&value, &label)?.to_uppercase()),
        };
    }

    scalar_text(&value, &label)
}

fn scalar_text(value: &Value, label: &str) -> Result<String, TemplateError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) => Err(TemplateError::NotPrintable { path: label.to_string(), kind: "array" }),
        Value::Object(_) => {
            Err(TemplateError::NotPrintable { path: label.to_string(), kind: "object" })
        },
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Array(items), _) => items.iter().any(|item| values_equal(item, needle)),
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn evaluate(cond: &Cond, scope: &Scope) -> bool {
    match cond {
        Cond::Operand(operand) => truthy(&scope.value_of(operand)),
        Cond::Not(inner) => !evaluate(inner, scope),
        Cond::And(left, right) => evaluate(left, scope) && evaluate(right, scope),
        Cond::Or(left, right) => evaluate(left, scope) || evaluate(right, scope),
        Cond::Compare { left, op, right } => {
            let left = scope.value_of(left);
            let right = scope.value_of(right);
            match op {
                CompareOp::Eq => values_equal(&left, &right),
                CompareOp::Ne => !values_equal(&left, &right),
                CompareOp::In => contains(&right, &left),
                CompareOp::NotIn => !contains(&right, &left),
            }
        },
    }
}
