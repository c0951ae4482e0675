//! Expression evaluation for the REPL.
//!
//! The language is deliberately small: a literal, or a path rooted at
//! `cambusa` made of `.field`, `[index]` / `["key"]` and calls with literal
//! arguments. A leading `await` is accepted and ignored, since every call is
//! awaited anyway.

use cambusa_core::{Application, DataSource, DataSourceError};
use serde_json::{json, Value};

/// Name the application is bound to.
pub const BINDING: &str = "cambusa";

/// Why an expression could not be evaluated. Recovered by the REPL loop.
#[derive(Debug)]
pub enum EvalError {
    Syntax(String),
    NotDefined(String),
    Type(String),
    Database(DataSourceError),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Syntax(msg) => write!(f, "SyntaxError: {msg}"),
            EvalError::NotDefined(name) => write!(f, "{name} is not defined"),
            EvalError::Type(msg) => write!(f, "TypeError: {msg}"),
            EvalError::Database(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvalError::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DataSourceError> for EvalError {
    fn from(err: DataSourceError) -> Self {
        EvalError::Database(err)
    }
}

// ── Lexing ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(Value),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            ';' => {
                chars.next();
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        None => return Err(EvalError::Syntax("Unterminated string".into())),
                        Some(q) if q == c => break,
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(other) => text.push(other),
                            None => return Err(EvalError::Syntax("Unterminated string".into())),
                        },
                        Some(other) => text.push(other),
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                text.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(parse_number(&text)?));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '$' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(EvalError::Syntax(format!("Unexpected token '{other}'")));
            }
        }
    }
    Ok(tokens)
}

fn parse_number(text: &str) -> Result<Value, EvalError> {
    let invalid = || EvalError::Syntax(format!("Invalid number '{text}'"));
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::from(n));
    }
    let f: f64 = text.parse().map_err(|_| invalid())?;
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(invalid)
}

// ── Parsing ─────────────────────────────────────────────────────────

/// A parsed REPL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path { root: String, segments: Vec<Segment> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Field(String),
    Index(Value),
    Call(Vec<Value>),
}

/// Parse one line into an expression.
pub fn parse(line: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(line)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(EvalError::Syntax(format!("Unexpected token {token:?}")));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), EvalError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(EvalError::Syntax(format!(
                "Expected {expected:?}, found {token:?}"
            ))),
            None => Err(EvalError::Syntax("Unexpected end of input".into())),
        }
    }

    fn expression(&mut self) -> Result<Expr, EvalError> {
        while matches!(self.peek(), Some(Token::Ident(id)) if id == "await") {
            self.pos += 1;
        }
        match self.next() {
            None => Err(EvalError::Syntax("Unexpected end of input".into())),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(n)),
            Some(Token::Ident(id)) => match keyword(&id) {
                Some(value) => Ok(Expr::Literal(value)),
                None => Ok(Expr::Path {
                    root: id,
                    segments: self.segments()?,
                }),
            },
            Some(token) => Err(EvalError::Syntax(format!("Unexpected token {token:?}"))),
        }
    }

    fn segments(&mut self) -> Result<Vec<Segment>, EvalError> {
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Ident(name)) => segments.push(Segment::Field(name)),
                        _ => return Err(EvalError::Syntax("Expected property name after '.'".into())),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let key = self.literal()?;
                    self.expect(Token::RBracket)?;
                    segments.push(Segment::Index(key));
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.literal()?);
                            if self.peek() == Some(&Token::Comma) {
                                self.pos += 1;
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(Token::RParen)?;
                    segments.push(Segment::Call(args));
                }
                _ => return Ok(segments),
            }
        }
    }

    fn literal(&mut self) -> Result<Value, EvalError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Ident(id)) => keyword(&id).ok_or(EvalError::NotDefined(id)),
            Some(token) => Err(EvalError::Syntax(format!("Unexpected token {token:?}"))),
            None => Err(EvalError::Syntax("Unexpected end of input".into())),
        }
    }
}

fn keyword(ident: &str) -> Option<Value> {
    match ident {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" | "undefined" => Some(Value::Null),
        _ => None,
    }
}

// ── Evaluation ──────────────────────────────────────────────────────

/// Where evaluation currently points.
enum Cursor<'a> {
    App(&'a Application),
    Db(&'a dyn DataSource),
    Value(Value),
}

impl Cursor<'_> {
    fn into_value(self) -> Value {
        match self {
            Cursor::App(app) => app.snapshot(),
            Cursor::Db(db) => db_value(db),
            Cursor::Value(value) => value,
        }
    }
}

fn db_value(db: &dyn DataSource) -> Value {
    json!({
        "isInitialized": db.is_initialized(),
        "options": db.options(),
    })
}

/// Parse and evaluate `line` against `app`.
pub async fn evaluate(app: &Application, line: &str) -> Result<Value, EvalError> {
    let expr = parse(line)?;
    eval_expr(app, &expr).await
}

/// Evaluate an already parsed expression.
pub async fn eval_expr(app: &Application, expr: &Expr) -> Result<Value, EvalError> {
    let (root, segments) = match expr {
        Expr::Literal(value) => return Ok(value.clone()),
        Expr::Path { root, segments } => (root, segments),
    };
    if root != BINDING {
        return Err(EvalError::NotDefined(root.clone()));
    }

    let mut cursor = Cursor::App(app);
    let mut i = 0;
    while i < segments.len() {
        let call_args = match segments.get(i + 1) {
            Some(Segment::Call(args)) => Some(args.as_slice()),
            _ => None,
        };
        cursor = match &segments[i] {
            Segment::Field(name) => step_field(cursor, name, call_args).await?,
            Segment::Index(key) => {
                if call_args.is_some() {
                    return Err(EvalError::Type("value is not a function".into()));
                }
                match key {
                    Value::String(name) => step_field(cursor, name, None).await?,
                    other => Cursor::Value(index(cursor.into_value(), other)?),
                }
            }
            Segment::Call(_) => {
                return Err(EvalError::Type("expression is not a function".into()));
            }
        };
        i += if call_args.is_some() { 2 } else { 1 };
    }
    Ok(cursor.into_value())
}

async fn step_field<'a>(
    cursor: Cursor<'a>,
    name: &str,
    call: Option<&[Value]>,
) -> Result<Cursor<'a>, EvalError> {
    match cursor {
        Cursor::App(app) => {
            if call.is_some() {
                return Err(not_a_function(BINDING, name));
            }
            Ok(app_member(app, name))
        }
        Cursor::Db(db) => db_member(db, name, call).await,
        Cursor::Value(value) => value_member(value, name, call).map(Cursor::Value),
    }
}

fn app_member<'a>(app: &'a Application, name: &str) -> Cursor<'a> {
    match name {
        "app" => Cursor::Value(json!({ "name": app.name(), "routes": app.routes() })),
        "name" => Cursor::Value(Value::String(app.name().to_string())),
        "routes" => Cursor::Value(json!(app.routes())),
        "models" => Cursor::Value(json!(app.models())),
        "config" => Cursor::Value(app.config().to_json()),
        "root" => Cursor::Value(Value::String(app.root().display().to_string())),
        "profile" => Cursor::Value(Value::String(app.config().profile().to_string())),
        "db" => match app.db() {
            Some(db) => Cursor::Db(db),
            None => Cursor::Value(Value::Null),
        },
        _ => Cursor::Value(Value::Null),
    }
}

async fn db_member<'a>(
    db: &'a dyn DataSource,
    name: &str,
    call: Option<&[Value]>,
) -> Result<Cursor<'a>, EvalError> {
    let is_method = matches!(
        name,
        "initialize" | "runMigrations" | "appliedMigrations" | "destroy"
    );
    let Some(_args) = call else {
        return match name {
            "isInitialized" => Ok(Cursor::Value(Value::Bool(db.is_initialized()))),
            "options" => Ok(Cursor::Value(json!(db.options()))),
            _ if is_method => Ok(Cursor::Value(Value::String(format!("[Function: {name}]")))),
            _ => Ok(Cursor::Value(Value::Null)),
        };
    };

    let value = match name {
        "initialize" => {
            db.initialize().await?;
            Value::Null
        }
        "runMigrations" => json!(db.run_migrations().await?),
        "appliedMigrations" => json!(db.applied_migrations().await?),
        "destroy" => {
            db.destroy().await?;
            Value::Null
        }
        _ => return Err(not_a_function("cambusa.db", name)),
    };
    Ok(Cursor::Value(value))
}

fn value_member(value: Value, name: &str, call: Option<&[Value]>) -> Result<Value, EvalError> {
    if let Some(_args) = call {
        return match (name, &value) {
            ("keys", Value::Object(map)) => Ok(json!(map.keys().collect::<Vec<_>>())),
            _ => Err(not_a_function("value", name)),
        };
    }
    match (&value, name) {
        (Value::Null, _) => Err(EvalError::Type(format!(
            "Cannot read properties of null (reading '{name}')"
        ))),
        (Value::Array(items), "length") => Ok(Value::from(items.len())),
        (Value::String(text), "length") => Ok(Value::from(text.chars().count())),
        (Value::Object(map), "length") if !map.contains_key("length") => Ok(Value::from(map.len())),
        (Value::Object(map), _) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn index(value: Value, key: &Value) -> Result<Value, EvalError> {
    match (&value, key) {
        (Value::Null, _) => Err(EvalError::Type(format!(
            "Cannot read properties of null (reading '{key}')"
        ))),
        (Value::Array(items), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .cloned()
            .unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn not_a_function(owner: &str, name: &str) -> EvalError {
    EvalError::Type(format!("{owner}.{name} is not a function"))
}

/// Text printed for an evaluation result: strings raw, everything else as JSON.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
