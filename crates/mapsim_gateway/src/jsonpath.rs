//! JSONPath evaluation over `serde_json` documents.
//!
//! Supports the subset mapping templates use: `$`, `.name`, `['name']`,
//! `[n]` (negative counts from the end), `[*]` and `.*`, deep scan `..`,
//! unions, slices `[start:end]`, filters `[?(...)]` and trailing
//! `length()`, `min()`, `max()`, `avg()` and `sum()`.
//!
//! A definite path (only names and single indices) yields one value and
//! fails when a step is missing. Any other path yields the array of matches.
//! A union of names as the last step merges the selected fields into one
//! object, so `$['a','b']` is still definite.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Number, Value as JsonValue};
use thiserror::Error;

/// Errors from compiling or evaluating a path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonPathError {
    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("No results for path: {0}")]
    PathNotFound(String),

    #[error("Function {function} cannot be applied: {message}")]
    Function { function: String, message: String },
}

pub type JsonPathResult<T> = Result<T, JsonPathError>;

#[derive(Debug, Clone)]
enum Selector {
    Name(String),
    Names(Vec<String>),
    Wildcard,
    Index(i64),
    Indexes(Vec<i64>),
    Slice(Option<i64>, Option<i64>),
    Filter(Box<Filter>),
}

#[derive(Debug, Clone)]
struct Step {
    descendants: bool,
    selector: Selector,
}

impl Step {
    fn is_definite(&self) -> bool {
        !self.descendants && matches!(self.selector, Selector::Name(_) | Selector::Index(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Length,
    Min,
    Max,
    Avg,
    Sum,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "length" | "size" => Some(Function::Length),
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            "avg" => Some(Function::Avg),
            "sum" => Some(Function::Sum),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Function::Length => "length",
            Function::Min => "min",
            Function::Max => "max",
            Function::Avg => "avg",
            Function::Sum => "sum",
        }
    }

    fn apply(&self, value: JsonValue) -> JsonPathResult<JsonValue> {
        let fail = |message: &str| JsonPathError::Function {
            function: format!("{}()", self.name()),
            message: message.to_string(),
        };

        if *self == Function::Length {
            return match &value {
                JsonValue::Array(items) => Ok(JsonValue::from(items.len())),
                JsonValue::Object(fields) => Ok(JsonValue::from(fields.len())),
                _ => Err(fail("expected an array or an object")),
            };
        }

        let JsonValue::Array(items) = value else {
            return Err(fail("expected an array"));
        };
        let numbers: Vec<f64> = items.iter().filter_map(JsonValue::as_f64).collect();
        if numbers.is_empty() {
            return Err(fail("attempted to calculate value using empty array"));
        }

        let result = match self {
            Function::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
            Function::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Function::Sum => numbers.iter().sum(),
            _ => numbers.iter().sum::<f64>() / numbers.len() as f64,
        };
        Ok(Number::from_f64(result).map(JsonValue::Number).unwrap_or(JsonValue::Null))
    }
}

/// A path relative to `@` or `$` inside a filter.
#[derive(Debug, Clone)]
struct RelativePath {
    from_root: bool,
    steps: Vec<Step>,
    function: Option<Function>,
}

#[derive(Debug, Clone)]
enum Operand {
    Path(RelativePath),
    Literal(JsonValue),
    Regex(Regex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Matches,
}

#[derive(Debug, Clone)]
enum Filter {
    Or(Box<Filter>, Box<Filter>),
    And(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    Exists(Operand),
    Compare(Operand, CompareOp, Operand),
}

/// A compiled JSONPath expression.
#[derive(Debug, Clone)]
pub struct JsonPath {
    source: String,
    steps: Vec<Step>,
    function: Option<Function>,
}

impl JsonPath {
    /// Compile an expression. Paths not starting with `$` are read relative
    /// to the root.
    pub fn compile(expression: &str) -> JsonPathResult<Self> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(JsonPathError::InvalidPath {
                path: expression.to_string(),
                message: "path must not be empty".to_string(),
            });
        }
        let source = if trimmed.starts_with('$') {
            trimmed.to_string()
        } else if trimmed.starts_with('[') {
            format!("${}", trimmed)
        } else {
            format!("$.{}", trimmed)
        };

        let mut parser = PathParser::new(&source);
        parser.pos = 1;
        let (steps, function) = parser.parse_steps(false)?;
        if parser.peek().is_some() {
            return Err(parser.error("unexpected character"));
        }

        Ok(Self {
            source,
            steps,
            function,
        })
    }

    /// Whether the path selects at most one node.
    pub fn is_definite(&self) -> bool {
        is_definite_path(&self.steps)
    }

    /// Evaluate against a document.
    pub fn evaluate(&self, document: &JsonValue) -> JsonPathResult<JsonValue> {
        let result = walk_steps(document, &self.steps, document)
            .ok_or_else(|| JsonPathError::PathNotFound(self.source.clone()))?;

        match self.function {
            Some(function) => function.apply(result),
            None => Ok(result),
        }
    }
}

/// Compile and evaluate `expression` against `document`.
pub fn evaluate(document: &JsonValue, expression: &str) -> JsonPathResult<JsonValue> {
    JsonPath::compile(expression)?.evaluate(document)
}

// -------------------------------------------------------------------------
// Selection
// -------------------------------------------------------------------------

/// Split off a trailing name union, which merges rather than selects.
fn split_merge(steps: &[Step]) -> (&[Step], Option<&[String]>) {
    match steps.split_last() {
        Some((
            Step {
                descendants: false,
                selector: Selector::Names(names),
            },
            rest,
        )) => (rest, Some(names.as_slice())),
        _ => (steps, None),
    }
}

fn is_definite_path(steps: &[Step]) -> bool {
    split_merge(steps).0.iter().all(Step::is_definite)
}

/// Object holding those of `names` present on `node`.
fn merge_fields(node: &JsonValue, names: &[String]) -> Option<JsonValue> {
    let JsonValue::Object(fields) = node else {
        return None;
    };
    let merged = names
        .iter()
        .filter_map(|name| fields.get(name).map(|value| (name.clone(), value.clone())))
        .collect();
    Some(JsonValue::Object(merged))
}

/// Walk `steps` from `start`. A definite path yields its single node, or
/// `None` when a step misses. Other paths yield the array of matches.
fn walk_steps(start: &JsonValue, steps: &[Step], root: &JsonValue) -> Option<JsonValue> {
    let (prefix, merge) = split_merge(steps);

    if prefix.iter().all(Step::is_definite) {
        let mut node = start;
        for step in prefix {
            node = select_one(node, &step.selector)?;
        }
        return match merge {
            Some(names) => merge_fields(node, names),
            None => Some(node.clone()),
        };
    }

    let nodes = select_all(start, prefix, root);
    let matches = match merge {
        Some(names) => nodes.into_iter().filter_map(|n| merge_fields(n, names)).collect(),
        None => nodes.into_iter().cloned().collect(),
    };
    Some(JsonValue::Array(matches))
}

fn array_index(len: usize, index: i64) -> Option<usize> {
    let resolved = if index < 0 { len as i64 + index } else { index };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

fn select_one<'a>(node: &'a JsonValue, selector: &Selector) -> Option<&'a JsonValue> {
    match (selector, node) {
        (Selector::Name(name), JsonValue::Object(fields)) => fields.get(name),
        (Selector::Index(index), JsonValue::Array(items)) => {
            array_index(items.len(), *index).map(|i| &items[i])
        }
        _ => None,
    }
}

fn select_all<'a>(node: &'a JsonValue, steps: &[Step], root: &'a JsonValue) -> Vec<&'a JsonValue> {
    let mut nodes = vec![node];
    for step in steps {
        let candidates: Vec<&JsonValue> = if step.descendants {
            nodes.into_iter().flat_map(descendants_or_self).collect()
        } else {
            nodes
        };
        nodes = candidates
            .into_iter()
            .flat_map(|n| select(n, &step.selector, root))
            .collect();
    }
    nodes
}

fn descendants_or_self(node: &JsonValue) -> Vec<&JsonValue> {
    let mut out = vec![node];
    match node {
        JsonValue::Array(items) => items.iter().for_each(|v| out.extend(descendants_or_self(v))),
        JsonValue::Object(fields) => fields
            .values()
            .for_each(|v| out.extend(descendants_or_self(v))),
        _ => {}
    }
    out
}

fn select<'a>(node: &'a JsonValue, selector: &Selector, root: &'a JsonValue) -> Vec<&'a JsonValue> {
    match selector {
        Selector::Name(_) | Selector::Index(_) => select_one(node, selector).into_iter().collect(),
        Selector::Names(names) => match node {
            JsonValue::Object(fields) => names.iter().filter_map(|n| fields.get(n)).collect(),
            _ => Vec::new(),
        },
        Selector::Wildcard => match node {
            JsonValue::Array(items) => items.iter().collect(),
            JsonValue::Object(fields) => fields.values().collect(),
            _ => Vec::new(),
        },
        Selector::Indexes(indexes) => match node {
            JsonValue::Array(items) => indexes
                .iter()
                .filter_map(|i| array_index(items.len(), *i).map(|i| &items[i]))
                .collect(),
            _ => Vec::new(),
        },
        Selector::Slice(start, end) => match node {
            JsonValue::Array(items) => {
                let len = items.len() as i64;
                let clamp = |bound: i64| {
                    if bound < 0 {
                        (len + bound).max(0)
                    } else {
                        bound.min(len)
                    }
                };
                let from = start.map(clamp).unwrap_or(0);
                let to = end.map(clamp).unwrap_or(len);
                if from >= to {
                    Vec::new()
                } else {
                    items[from as usize..to as usize].iter().collect()
                }
            }
            _ => Vec::new(),
        },
        Selector::Filter(filter) => match node {
            JsonValue::Array(items) => items.iter().filter(|item| filter.matches(item, root)).collect(),
            JsonValue::Object(_) if filter.matches(node, root) => vec![node],
            _ => Vec::new(),
        },
    }
}

// -------------------------------------------------------------------------
// Filters
// -------------------------------------------------------------------------

impl RelativePath {
    fn resolve(&self, current: &JsonValue, root: &JsonValue) -> Option<JsonValue> {
        let start = if self.from_root { root } else { current };
        let value = walk_steps(start, &self.steps, root)?;

        match self.function {
            Some(function) => function.apply(value).ok(),
            None => Some(value),
        }
    }
}

impl Operand {
    fn resolve(&self, current: &JsonValue, root: &JsonValue) -> Option<JsonValue> {
        match self {
            Operand::Path(path) => path.resolve(current, root),
            Operand::Literal(value) => Some(value.clone()),
            Operand::Regex(_) => None,
        }
    }
}

fn compare_values(left: &JsonValue, right: &JsonValue) -> Option<Ordering> {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn values_equal(left: &JsonValue, right: &JsonValue) -> bool {
    match compare_values(left, right) {
        Some(ordering) => ordering == Ordering::Equal,
        None => left == right,
    }
}

impl Filter {
    fn matches(&self, current: &JsonValue, root: &JsonValue) -> bool {
        match self {
            Filter::Or(a, b) => a.matches(current, root) || b.matches(current, root),
            Filter::And(a, b) => a.matches(current, root) && b.matches(current, root),
            Filter::Not(inner) => !inner.matches(current, root),
            Filter::Exists(operand) => match operand.resolve(current, root) {
                Some(JsonValue::Array(items)) => match operand {
                    Operand::Path(path) if !is_definite_path(&path.steps) => {
                        !items.is_empty()
                    }
                    _ => true,
                },
                Some(_) => true,
                None => false,
            },
            Filter::Compare(left, CompareOp::Matches, Operand::Regex(regex)) => {
                match left.resolve(current, root) {
                    Some(JsonValue::String(s)) => regex.is_match(&s),
                    _ => false,
                }
            }
            Filter::Compare(left, op, right) => {
                let (Some(a), Some(b)) = (left.resolve(current, root), right.resolve(current, root)) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => values_equal(&a, &b),
                    CompareOp::Ne => !values_equal(&a, &b),
                    CompareOp::Lt => compare_values(&a, &b) == Some(Ordering::Less),
                    CompareOp::Le => matches!(compare_values(&a, &b), Some(Ordering::Less | Ordering::Equal)),
                    CompareOp::Gt => compare_values(&a, &b) == Some(Ordering::Greater),
                    CompareOp::Ge => matches!(compare_values(&a, &b), Some(Ordering::Greater | Ordering::Equal)),
                    CompareOp::Matches => false,
                }
            }
        }
    }
}

// -------------------------------------------------------------------------
// Parsing
// -------------------------------------------------------------------------

const NAME_STOP: &[char] = &['.', '[', ']', '(', ')', ' ', '=', '!', '<', '>', '&', '|', ',', '~'];

struct PathParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> JsonPathError {
        JsonPathError::InvalidPath {
            path: self.source.to_string(),
            message: format!("{} at position {}", message, self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, s: &str) -> bool {
        let matches = s
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c));
        if matches {
            self.pos += s.chars().count();
        }
        matches
    }

    fn expect(&mut self, c: char) -> JsonPathResult<()> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while self.peek().map_or(false, |c| !NAME_STOP.contains(&c)) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_steps(&mut self, in_filter: bool) -> JsonPathResult<(Vec<Step>, Option<Function>)> {
        let mut steps = Vec::new();

        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    let descendants = self.peek() == Some('.');
                    if descendants {
                        self.pos += 1;
                    }

                    match self.peek() {
                        Some('*') => {
                            self.pos += 1;
                            steps.push(Step {
                                descendants,
                                selector: Selector::Wildcard,
                            });
                        }
                        Some('[') if descendants => {
                            self.pos += 1;
                            let selector = self.parse_bracket()?;
                            steps.push(Step {
                                descendants,
                                selector,
                            });
                        }
                        _ => {
                            let name = self.read_name();
                            if name.is_empty() {
                                return Err(self.error("expected a property name"));
                            }
                            if self.peek() == Some('(') {
                                self.pos += 1;
                                self.skip_ws();
                                self.expect(')')?;
                                let function = Function::from_name(&name).ok_or_else(|| {
                                    self.error(&format!("unknown function {}()", name))
                                })?;
                                let at_end = if in_filter {
                                    self.peek() != Some('.') && self.peek() != Some('[')
                                } else {
                                    self.peek().is_none()
                                };
                                if !at_end {
                                    return Err(self.error("a function must end the path"));
                                }
                                return Ok((steps, Some(function)));
                            }
                            steps.push(Step {
                                descendants,
                                selector: Selector::Name(name),
                            });
                        }
                    }
                }
                Some('[') => {
                    self.pos += 1;
                    let selector = self.parse_bracket()?;
                    steps.push(Step {
                        descendants: false,
                        selector,
                    });
                }
                _ => return Ok((steps, None)),
            }
        }
    }

    /// Parse the inside of `[...]`; the opening bracket is consumed.
    fn parse_bracket(&mut self) -> JsonPathResult<Selector> {
        self.skip_ws();
        let selector = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Selector::Wildcard
            }
            Some('?') => {
                self.pos += 1;
                self.skip_ws();
                self.expect('(')?;
                let filter = self.parse_or()?;
                self.skip_ws();
                self.expect(')')?;
                Selector::Filter(Box::new(filter))
            }
            Some(quote @ ('\'' | '"')) => {
                let mut names = vec![self.parse_string(quote)?];
                loop {
                    self.skip_ws();
                    if self.peek() != Some(',') {
                        break;
                    }
                    self.pos += 1;
                    self.skip_ws();
                    match self.peek() {
                        Some(q @ ('\'' | '"')) => names.push(self.parse_string(q)?),
                        _ => return Err(self.error("expected a quoted property name")),
                    }
                }
                if names.len() == 1 {
                    Selector::Name(names.remove(0))
                } else {
                    Selector::Names(names)
                }
            }
            _ => {
                let start = self.pos;
                while self.peek().map_or(false, |c| c != ']') {
                    self.pos += 1;
                }
                let content: String = self.chars[start..self.pos].iter().collect();
                self.parse_index_selector(content.trim())?
            }
        };
        self.skip_ws();
        self.expect(']')?;
        Ok(selector)
    }

    fn parse_index_selector(&self, content: &str) -> JsonPathResult<Selector> {
        let number = |text: &str| -> JsonPathResult<Option<i64>> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse()
                .map(Some)
                .map_err(|_| self.error(&format!("invalid array index '{}'", text)))
        };

        if let Some((start, end)) = content.split_once(':') {
            return Ok(Selector::Slice(number(start)?, number(end)?));
        }

        let mut indexes = Vec::new();
        for part in content.split(',') {
            match number(part)? {
                Some(index) => indexes.push(index),
                None => return Err(self.error("empty array index")),
            }
        }
        if indexes.len() == 1 {
            Ok(Selector::Index(indexes[0]))
        } else {
            Ok(Selector::Indexes(indexes))
        }
    }

    fn parse_string(&mut self, quote: char) -> JsonPathResult<String> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    if let Some(c) = self.peek() {
                        out.push(c);
                        self.pos += 1;
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_or(&mut self) -> JsonPathResult<Filter> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            if !self.eat("||") {
                return Ok(left);
            }
            let right = self.parse_and()?;
            left = Filter::Or(Box::new(left), Box::new(right));
        }
    }

    fn parse_and(&mut self) -> JsonPathResult<Filter> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_ws();
            if !self.eat("&&") {
                return Ok(left);
            }
            let right = self.parse_unary()?;
            left = Filter::And(Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> JsonPathResult<Filter> {
        self.skip_ws();
        if self.peek() == Some('!') && self.peek_at(1) != Some('=') {
            self.pos += 1;
            return Ok(Filter::Not(Box::new(self.parse_unary()?)));
        }
        if self.peek() == Some('(') {
            self.pos += 1;
            let inner = self.parse_or()?;
            self.skip_ws();
            self.expect(')')?;
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        self.skip_ws();
        let op = if self.eat("==") {
            CompareOp::Eq
        } else if self.eat("!=") {
            CompareOp::Ne
        } else if self.eat("<=") {
            CompareOp::Le
        } else if self.eat(">=") {
            CompareOp::Ge
        } else if self.eat("=~") {
            CompareOp::Matches
        } else if self.eat("<") {
            CompareOp::Lt
        } else if self.eat(">") {
            CompareOp::Gt
        } else {
            return match left {
                Operand::Path(_) => Ok(Filter::Exists(left)),
                _ => Err(self.error("expected a comparison")),
            };
        };

        let right = self.parse_operand()?;
        if op == CompareOp::Matches && !matches!(right, Operand::Regex(_)) {
            return Err(self.error("'=~' needs a /regex/ on its right side"));
        }
        Ok(Filter::Compare(left, op, right))
    }

    fn parse_operand(&mut self) -> JsonPathResult<Operand> {
        self.skip_ws();
        match self.peek() {
            Some(c @ ('@' | '$')) => {
                self.pos += 1;
                let (steps, function) = self.parse_steps(true)?;
                Ok(Operand::Path(RelativePath {
                    from_root: c == '$',
                    steps,
                    function,
                }))
            }
            Some(quote @ ('\'' | '"')) => Ok(Operand::Literal(JsonValue::String(self.parse_string(quote)?))),
            Some('/') => self.parse_regex(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number(),
            Some(_) => {
                let word = self.read_name();
                match word.as_str() {
                    "true" => Ok(Operand::Literal(JsonValue::Bool(true))),
                    "false" => Ok(Operand::Literal(JsonValue::Bool(false))),
                    "null" => Ok(Operand::Literal(JsonValue::Null)),
                    _ => Err(self.error(&format!("unexpected '{}' in filter", word))),
                }
            }
            None => Err(self.error("unexpected end of filter")),
        }
    }

    fn parse_number(&mut self) -> JsonPathResult<Operand> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self
            .peek()
            .map_or(false, |c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        serde_json::from_str::<Number>(&text)
            .map(|n| Operand::Literal(JsonValue::Number(n)))
            .map_err(|_| self.error(&format!("invalid number '{}'", text)))
    }

    fn parse_regex(&mut self) -> JsonPathResult<Operand> {
        self.expect('/')?;
        let mut pattern = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated regular expression")),
                Some('\\') if self.peek_at(1) == Some('/') => {
                    pattern.push('/');
                    self.pos += 2;
                }
                Some('/') => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    pattern.push(c);
                    self.pos += 1;
                }
            }
        }

        let mut flags = String::new();
        while let Some(c) = self.peek().filter(|c| matches!(c, 'i' | 'm' | 's' | 'x')) {
            flags.push(c);
            self.pos += 1;
        }
        let full = if flags.is_empty() {
            pattern
        } else {
            format!("(?{}){}", flags, pattern)
        };
        Regex::new(&full)
            .map(Operand::Regex)
            .map_err(|e| self.error(&format!("invalid regular expression: {}", e)))
    }
}
