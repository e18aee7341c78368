//! Template parser.
//!
//! A hand-written recursive-descent parser over the template characters.
//! Text, references and directives are recognised in one pass; expressions
//! inside directive arguments and method calls use a precedence-climbing
//! sub-parser.
//!
//! A directive standing alone on its line takes the line's indentation and
//! trailing newline with it, so block structure does not leave blank lines
//! in the output.

use crate::ast::{BinaryOp, Expr, Node, Position, Reference, Segment, UnaryOp};
use crate::error::{EngineError, EngineResult};

/// How a block ended.
enum Terminator {
    Eof,
    End(Position),
    Else(Position),
    ElseIf(Expr, Position),
}

enum HashOutcome {
    Text,
    Node(Node),
    Terminator(Terminator),
}

const DIRECTIVES: &[&str] = &[
    "set", "if", "elseif", "else", "end", "foreach", "break", "stop", "parse", "include",
];

/// Parser for one template source.
pub struct Parser<'a> {
    template: &'a str,
    chars: Vec<char>,
    pos: usize,
    line_starts: Vec<usize>,
    base: Position,
}

impl<'a> Parser<'a> {
    /// Create a parser; `template` names the source in error messages.
    pub fn new(template: &'a str, source: &str) -> Self {
        Self::with_base(template, source, Position::new(1, 1))
    }

    fn with_base(template: &'a str, source: &str, base: Position) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let mut line_starts = vec![0];
        for (i, c) in chars.iter().enumerate() {
            if *c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            template,
            chars,
            pos: 0,
            line_starts,
            base,
        }
    }

    /// Parse the whole source.
    pub fn parse(mut self) -> EngineResult<Vec<Node>> {
        let (nodes, terminator) = self.parse_block()?;
        match terminator {
            Terminator::Eof => Ok(nodes),
            Terminator::End(position) => Err(self.error_at(
                position,
                "Encountered \"#end\" without a matching #if or #foreach",
            )),
            Terminator::Else(position) | Terminator::ElseIf(_, position) => Err(self.error_at(
                position,
                "Encountered \"#else\" outside of an #if block",
            )),
        }
    }

    // ---------------------------------------------------------------------
    // Positions and errors
    // ---------------------------------------------------------------------

    fn position_of(&self, index: usize) -> Position {
        let line_index = match self.line_starts.binary_search(&index) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = index - self.line_starts[line_index] + 1;
        if line_index == 0 {
            Position::new(self.base.line, self.base.column + column - 1)
        } else {
            Position::new(self.base.line + line_index, column)
        }
    }

    fn position(&self) -> Position {
        self.position_of(self.pos)
    }

    fn error_at(&self, position: Position, message: impl Into<String>) -> EngineError {
        EngineError::Parse {
            template: self.template.to_string(),
            message: message.into(),
            line: position.line,
            column: position.column,
        }
    }

    fn error(&self, message: impl Into<String>) -> EngineError {
        self.error_at(self.position(), message)
    }

    fn unexpected(&self, expecting: &str) -> EngineError {
        let found = match self.peek() {
            Some(c) => c.to_string(),
            None => "<EOF>".to_string(),
        };
        self.error(format!(
            "Encountered \"{}\" but was expecting {}",
            found, expecting
        ))
    }

    fn eof_in_block(&self, directive: &str, opened: Position) -> EngineError {
        self.error(format!(
            "Encountered \"<EOF>\" but was expecting #end for {} opened at line {}, column {}",
            directive, opened.line, opened.column
        ))
    }

    // ---------------------------------------------------------------------
    // Character helpers
    // ---------------------------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.chars().count();
            true
        } else {
            false
        }
    }

    /// Consume a keyword only when it is not the prefix of a longer word.
    fn eat_word(&mut self, word: &str) -> bool {
        let len = word.chars().count();
        if self.starts_with(word) && !self.peek_at(len).map_or(false, is_ident_char) {
            self.pos += len;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> EngineResult<()> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&format!("\"{}\"", c)))
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
    }

    fn skip_inline_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    fn find(&self, needle: &str, from: usize) -> Option<usize> {
        let needle: Vec<char> = needle.chars().collect();
        (from..self.chars.len()).find(|&i| self.chars[i..].starts_with(&needle))
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().map_or(false, is_ident_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Indentation before `start` when only spaces and tabs separate it from
    /// the beginning of its line.
    fn line_indent(&self, start: usize) -> Option<usize> {
        let mut indent = 0;
        while start > indent && matches!(self.chars[start - indent - 1], ' ' | '\t') {
            indent += 1;
        }
        if start == indent || self.chars[start - indent - 1] == '\n' {
            Some(indent)
        } else {
            None
        }
    }

    /// Swallow indentation and trailing newline around a directive that sits
    /// alone on its line.
    fn gobble(&mut self, start: usize, text: &mut String) {
        let Some(indent) = self.line_indent(start) else {
            return;
        };

        let mut end = self.pos;
        while matches!(self.chars.get(end), Some(' ' | '\t')) {
            end += 1;
        }
        match self.chars.get(end) {
            None => {}
            Some('\n') => end += 1,
            Some('\r') if self.chars.get(end + 1) == Some(&'\n') => end += 2,
            _ => return,
        }

        trim_indent(text, indent);
        self.pos = end;
    }

    // ---------------------------------------------------------------------
    // Template structure
    // ---------------------------------------------------------------------

    fn parse_block(&mut self) -> EngineResult<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        loop {
            let Some(c) = self.peek() else {
                flush_text(&mut nodes, &mut text);
                return Ok((nodes, Terminator::Eof));
            };

            match c {
                '\\' => self.parse_escape(&mut text),
                '$' => match self.parse_reference()? {
                    Some(reference) => {
                        flush_text(&mut nodes, &mut text);
                        nodes.push(Node::Reference(reference));
                    }
                    None => {
                        text.push('$');
                        self.pos += 1;
                    }
                },
                '#' => match self.parse_hash(&mut text)? {
                    HashOutcome::Text => {}
                    HashOutcome::Node(node) => {
                        flush_text(&mut nodes, &mut text);
                        nodes.push(node);
                    }
                    HashOutcome::Terminator(terminator) => {
                        flush_text(&mut nodes, &mut text);
                        return Ok((nodes, terminator));
                    }
                },
                _ => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    /// `\$ref` and `\#directive` render literally; pairs of backslashes
    /// collapse to one.
    fn parse_escape(&mut self, text: &mut String) {
        let start = self.pos;
        while self.peek() == Some('\\') {
            self.pos += 1;
        }
        let count = self.pos - start;

        match self.peek() {
            Some(c @ ('$' | '#')) => {
                text.extend(std::iter::repeat('\\').take(count / 2));
                if count % 2 == 1 {
                    text.push(c);
                    self.pos += 1;
                }
            }
            _ => text.extend(std::iter::repeat('\\').take(count)),
        }
    }

    fn parse_hash(&mut self, text: &mut String) -> EngineResult<HashOutcome> {
        let start = self.pos;

        match self.peek_at(1) {
            Some('#') => {
                self.parse_line_comment(text);
                return Ok(HashOutcome::Text);
            }
            Some('*') => {
                self.parse_block_comment(text)?;
                return Ok(HashOutcome::Text);
            }
            Some('[') if self.peek_at(2) == Some('[') => {
                self.parse_unparsed(text)?;
                return Ok(HashOutcome::Text);
            }
            _ => {}
        }

        let Some((word, after)) = self.directive_word() else {
            text.push('#');
            self.pos += 1;
            return Ok(HashOutcome::Text);
        };
        if !DIRECTIVES.contains(&word.as_str()) {
            text.push('#');
            self.pos += 1;
            return Ok(HashOutcome::Text);
        }

        let position = self.position();
        self.pos = after;

        let outcome = match word.as_str() {
            "set" => {
                let (target, value) = self.parse_set_args()?;
                self.gobble(start, text);
                HashOutcome::Node(Node::Set {
                    target,
                    value,
                    position,
                })
            }
            "if" => {
                let condition = self.parse_paren_expr("#if")?;
                self.gobble(start, text);
                HashOutcome::Node(self.parse_if(condition, position)?)
            }
            "elseif" => {
                let condition = self.parse_paren_expr("#elseif")?;
                self.gobble(start, text);
                HashOutcome::Terminator(Terminator::ElseIf(condition, position))
            }
            "else" => {
                self.gobble(start, text);
                HashOutcome::Terminator(Terminator::Else(position))
            }
            "end" => {
                self.gobble(start, text);
                HashOutcome::Terminator(Terminator::End(position))
            }
            "foreach" => {
                let (variable, iterable) = self.parse_foreach_args()?;
                self.gobble(start, text);
                HashOutcome::Node(self.parse_foreach(variable, iterable, position)?)
            }
            "break" => {
                self.gobble(start, text);
                HashOutcome::Node(Node::Break(position))
            }
            "stop" => {
                self.gobble(start, text);
                HashOutcome::Node(Node::Stop(position))
            }
            "parse" => {
                let name = self.parse_paren_expr("#parse")?;
                self.gobble(start, text);
                HashOutcome::Node(Node::Parse { name, position })
            }
            _ => {
                let name = self.parse_paren_expr("#include")?;
                self.gobble(start, text);
                HashOutcome::Node(Node::Include { name, position })
            }
        };

        Ok(outcome)
    }

    /// Read `#word` or `#{word}`; returns the word and the index after it.
    fn directive_word(&self) -> Option<(String, usize)> {
        let braced = self.peek_at(1) == Some('{');
        let mut cursor = self.pos + if braced { 2 } else { 1 };
        let start = cursor;
        while self
            .chars
            .get(cursor)
            .map_or(false, |c| c.is_ascii_alphabetic())
        {
            cursor += 1;
        }
        if cursor == start {
            return None;
        }
        let word: String = self.chars[start..cursor].iter().collect();
        if braced {
            if self.chars.get(cursor) != Some(&'}') {
                return None;
            }
            cursor += 1;
        }
        Some((word, cursor))
    }

    fn parse_line_comment(&mut self, text: &mut String) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\n' {
                break;
            }
        }
        if let Some(indent) = self.line_indent(start) {
            trim_indent(text, indent);
        }
    }

    fn parse_block_comment(&mut self, text: &mut String) -> EngineResult<()> {
        let start = self.pos;
        let end = self
            .find("*#", start + 2)
            .ok_or_else(|| self.error("Encountered \"<EOF>\" inside a #* comment *#"))?;
        self.pos = end + 2;
        self.gobble(start, text);
        Ok(())
    }

    fn parse_unparsed(&mut self, text: &mut String) -> EngineResult<()> {
        let start = self.pos + 3;
        let end = self
            .find("]]#", start)
            .ok_or_else(|| self.error("Encountered \"<EOF>\" inside a #[[ unparsed ]]# block"))?;
        text.extend(self.chars[start..end].iter());
        self.pos = end + 3;
        Ok(())
    }

    fn parse_if(&mut self, condition: Expr, position: Position) -> EngineResult<Node> {
        let mut branches = Vec::new();
        let mut current = condition;

        loop {
            let (body, terminator) = self.parse_block()?;
            match terminator {
                Terminator::End(_) => {
                    branches.push((current, body));
                    return Ok(Node::If {
                        branches,
                        otherwise: None,
                        position,
                    });
                }
                Terminator::ElseIf(next, _) => {
                    branches.push((current, body));
                    current = next;
                }
                Terminator::Else(_) => {
                    branches.push((current, body));
                    let (otherwise, terminator) = self.parse_block()?;
                    return match terminator {
                        Terminator::End(_) => Ok(Node::If {
                            branches,
                            otherwise: Some(otherwise),
                            position,
                        }),
                        Terminator::Eof => Err(self.eof_in_block("#if", position)),
                        Terminator::Else(at) | Terminator::ElseIf(_, at) => Err(self.error_at(
                            at,
                            "Encountered \"#else\" after the #else branch of an #if block",
                        )),
                    };
                }
                Terminator::Eof => return Err(self.eof_in_block("#if", position)),
            }
        }
    }

    fn parse_foreach(
        &mut self,
        variable: String,
        iterable: Expr,
        position: Position,
    ) -> EngineResult<Node> {
        let (body, terminator) = self.parse_block()?;
        match terminator {
            Terminator::End(_) => Ok(Node::Foreach {
                variable,
                iterable,
                body,
                position,
            }),
            Terminator::Eof => Err(self.eof_in_block("#foreach", position)),
            Terminator::Else(at) | Terminator::ElseIf(_, at) => Err(self.error_at(
                at,
                "Encountered \"#else\" inside a #foreach block",
            )),
        }
    }

    // ---------------------------------------------------------------------
    // Directive arguments
    // ---------------------------------------------------------------------

    fn open_paren(&mut self, directive: &str) -> EngineResult<()> {
        self.skip_inline_ws();
        if self.peek() == Some('(') {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&format!("\"(\" after {}", directive)))
        }
    }

    fn close_paren(&mut self) -> EngineResult<()> {
        self.skip_ws();
        self.expect(')')
    }

    fn parse_paren_expr(&mut self, directive: &str) -> EngineResult<Expr> {
        self.open_paren(directive)?;
        let expr = self.parse_expr()?;
        self.close_paren()?;
        Ok(expr)
    }

    fn parse_set_args(&mut self) -> EngineResult<(Reference, Expr)> {
        self.open_paren("#set")?;
        self.skip_ws();
        let target = self.expect_reference()?;
        self.skip_ws();
        if !(self.peek() == Some('=') && self.peek_at(1) != Some('=')) {
            return Err(self.unexpected("\"=\" in #set"));
        }
        self.pos += 1;
        let value = self.parse_expr()?;
        self.close_paren()?;
        Ok((target, value))
    }

    fn parse_foreach_args(&mut self) -> EngineResult<(String, Expr)> {
        self.open_paren("#foreach")?;
        self.skip_ws();
        let variable = self.expect_reference()?;
        if !variable.is_bare() {
            return Err(self.error_at(
                variable.position,
                format!("#foreach needs a simple loop variable, found {}", variable.literal),
            ));
        }
        self.skip_ws();
        if !self.eat_word("in") {
            return Err(self.unexpected("\"in\" in #foreach"));
        }
        let iterable = self.parse_expr()?;
        self.close_paren()?;
        Ok((variable.name, iterable))
    }

    fn expect_reference(&mut self) -> EngineResult<Reference> {
        if self.peek() != Some('$') {
            return Err(self.unexpected("a reference"));
        }
        match self.parse_reference()? {
            Some(reference) => Ok(reference),
            None => Err(self.unexpected("a reference")),
        }
    }

    // ---------------------------------------------------------------------
    // References
    // ---------------------------------------------------------------------

    /// Parse `$name...` at the current `$`. Returns `None`, consuming
    /// nothing, when the `$` does not start a reference.
    fn parse_reference(&mut self) -> EngineResult<Option<Reference>> {
        let start = self.pos;
        let position = self.position();

        let mut cursor = start + 1;
        let quiet = self.chars.get(cursor) == Some(&'!');
        if quiet {
            cursor += 1;
        }
        let braced = self.chars.get(cursor) == Some(&'{');
        if braced {
            cursor += 1;
        }
        if !self.chars.get(cursor).map_or(false, |c| is_ident_start(*c)) {
            return Ok(None);
        }

        self.pos = cursor;
        let name = self.read_identifier();
        let mut segments = Vec::new();

        loop {
            match self.peek() {
                Some('.') if self.peek_at(1).map_or(false, is_ident_start) => {
                    self.pos += 1;
                    let member = self.read_identifier();
                    if self.peek() == Some('(') {
                        let args = self.parse_arguments()?;
                        segments.push(Segment::Method { name: member, args });
                    } else {
                        segments.push(Segment::Property(member));
                    }
                }
                Some('[') => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.skip_ws();
                    self.expect(']')?;
                    segments.push(Segment::Index(index));
                }
                _ => break,
            }
        }

        if braced {
            if self.peek() == Some('}') {
                self.pos += 1;
            } else {
                return Err(self.unexpected("\"}\" to close the reference"));
            }
        }

        Ok(Some(Reference {
            name,
            segments,
            quiet,
            literal: self.chars[start..self.pos].iter().collect(),
            position,
        }))
    }

    fn parse_arguments(&mut self) -> EngineResult<Vec<Expr>> {
        self.expect('(')?;
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(args);
                }
                _ => return Err(self.unexpected("\",\" or \")\" in the argument list")),
            }
        }
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn parse_expr(&mut self) -> EngineResult<Expr> {
        self.parse_or()
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr, position: Position) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            position,
        }
    }

    fn parse_or(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            let position = self.position();
            if self.eat("||") || self.eat_word("or") {
                let right = self.parse_and()?;
                left = Self::binary(BinaryOp::Or, left, right, position);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_equality()?;
        loop {
            self.skip_ws();
            let position = self.position();
            if self.eat("&&") || self.eat_word("and") {
                let right = self.parse_equality()?;
                left = Self::binary(BinaryOp::And, left, right, position);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_equality(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            self.skip_ws();
            let position = self.position();
            let op = if self.eat("==") || self.eat_word("eq") {
                BinaryOp::Eq
            } else if self.eat("!=") || self.eat_word("ne") {
                BinaryOp::Ne
            } else {
                return Ok(left);
            };
            let right = self.parse_relational()?;
            left = Self::binary(op, left, right, position);
        }
    }

    fn parse_relational(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            self.skip_ws();
            let position = self.position();
            let op = if self.eat("<=") || self.eat_word("le") {
                BinaryOp::Le
            } else if self.eat(">=") || self.eat_word("ge") {
                BinaryOp::Ge
            } else if self.eat("<") || self.eat_word("lt") {
                BinaryOp::Lt
            } else if self.eat(">") || self.eat_word("gt") {
                BinaryOp::Gt
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right, position);
        }
    }

    fn parse_additive(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_ws();
            let position = self.position();
            let op = if self.eat("+") {
                BinaryOp::Add
            } else if self.eat("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right, position);
        }
    }

    fn parse_multiplicative(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_ws();
            let position = self.position();
            let op = if self.eat("*") {
                BinaryOp::Mul
            } else if self.eat("/") {
                BinaryOp::Div
            } else if self.eat("%") {
                BinaryOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right, position);
        }
    }

    fn parse_unary(&mut self) -> EngineResult<Expr> {
        self.skip_ws();
        let position = self.position();
        let op = if self.peek() == Some('!') && self.peek_at(1) != Some('=') {
            self.pos += 1;
            UnaryOp::Not
        } else if self.eat_word("not") {
            UnaryOp::Not
        } else if self.peek() == Some('-') {
            self.pos += 1;
            UnaryOp::Negate
        } else {
            return self.parse_primary();
        };
        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            position,
        })
    }

    fn parse_primary(&mut self) -> EngineResult<Expr> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.unexpected("an expression")),
            Some('(') => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.close_paren()?;
                Ok(expr)
            }
            Some('\'') => self.parse_single_quoted(),
            Some('"') => self.parse_double_quoted(),
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some('[') => self.parse_list(),
            Some('{') => self.parse_map(),
            Some('$') => Ok(Expr::Reference(self.expect_reference()?)),
            Some(c) if is_ident_start(c) => {
                if self.eat_word("true") {
                    Ok(Expr::Bool(true))
                } else if self.eat_word("false") {
                    Ok(Expr::Bool(false))
                } else if self.eat_word("null") {
                    Ok(Expr::Null)
                } else {
                    let position = self.position();
                    let word = self.read_identifier();
                    Err(self.error_at(
                        position,
                        format!("Encountered \"{}\" but was expecting an expression", word),
                    ))
                }
            }
            Some(_) => Err(self.unexpected("an expression")),
        }
    }

    fn read_quoted(&mut self, quote: char) -> EngineResult<String> {
        let position = self.position();
        self.pos += 1;
        let mut content = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error_at(position, "Encountered \"<EOF>\" inside a string literal"))
                }
                Some(c) if c == quote && self.peek_at(1) == Some(quote) => {
                    content.push(quote);
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(content);
                }
                Some(c) => {
                    content.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_single_quoted(&mut self) -> EngineResult<Expr> {
        Ok(Expr::Str(self.read_quoted('\'')?))
    }

    fn parse_double_quoted(&mut self) -> EngineResult<Expr> {
        let base = self.position_of(self.pos + 1);
        let content = self.read_quoted('"')?;
        if content.contains('$') || content.contains('#') {
            let nodes = Parser::with_base(self.template, &content, base).parse()?;
            Ok(Expr::Interpolated(nodes))
        } else {
            Ok(Expr::Str(content))
        }
    }

    fn parse_number(&mut self) -> EngineResult<Expr> {
        let start = self.pos;
        let position = self.position();
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let is_float = self.peek() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit());
        if is_float {
            self.pos += 1;
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        let literal: String = self.chars[start..self.pos].iter().collect();
        if !is_float {
            if let Ok(i) = literal.parse::<i64>() {
                return Ok(Expr::Int(i));
            }
        }
        literal
            .parse::<f64>()
            .map(Expr::Float)
            .map_err(|_| self.error_at(position, format!("Invalid number literal {}", literal)))
    }

    fn parse_list(&mut self) -> EngineResult<Expr> {
        self.expect('[')?;
        self.skip_ws();
        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(Expr::List(Vec::new()));
        }

        let first = self.parse_expr()?;
        self.skip_ws();
        if self.eat("..") {
            let last = self.parse_expr()?;
            self.skip_ws();
            self.expect(']')?;
            return Ok(Expr::Range(Box::new(first), Box::new(last)));
        }

        let mut items = vec![first];
        loop {
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    items.push(self.parse_expr()?);
                }
                Some(']') => {
                    self.pos += 1;
                    return Ok(Expr::List(items));
                }
                _ => return Err(self.unexpected("\",\" or \"]\" in the list")),
            }
        }
    }

    fn parse_map(&mut self) -> EngineResult<Expr> {
        self.expect('{')?;
        let mut entries = Vec::new();
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Expr::Map(entries));
        }

        loop {
            let key = self.parse_expr()?;
            self.skip_ws();
            self.expect(':')?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Ok(Expr::Map(entries));
                }
                _ => return Err(self.unexpected("\",\" or \"}\" in the map")),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn flush_text(nodes: &mut Vec<Node>, text: &mut String) {
    if !text.is_empty() {
        nodes.push(Node::Text(std::mem::take(text)));
    }
}

fn trim_indent(text: &mut String, indent: usize) {
    for _ in 0..indent {
        if text.ends_with([' ', '\t']) {
            text.pop();
        }
    }
}

/// Parse a template source.
pub fn parse(template: &str, source: &str) -> EngineResult<Vec<Node>> {
    Parser::new(template, source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Vec<Node> {
        parse("test", source).unwrap_or_else(|e| panic!("{}", e))
    }

    fn reference(node: &Node) -> &Reference {
        match node {
            Node::Reference(r) => r,
            other => panic!("expected reference, got {:?}", other),
        }
    }

    #[test]
    fn test_text_and_reference() {
        let nodes = parse_ok("Hello, $name!");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Text("Hello, ".to_string()));
        assert_eq!(reference(&nodes[1]).name, "name");
        assert_eq!(nodes[2], Node::Text("!".to_string()));
    }

    #[test]
    fn test_reference_chain() {
        let nodes = parse_ok("${input.path('$.id')}.x");
        let r = reference(&nodes[0]);
        assert_eq!(r.name, "input");
        assert_eq!(r.literal, "${input.path('$.id')}");
        assert_eq!(
            r.segments,
            vec![Segment::Method {
                name: "path".to_string(),
                args: vec![Expr::Str("$.id".to_string())],
            }]
        );
        assert_eq!(nodes[1], Node::Text(".x".to_string()));
    }

    #[test]
    fn test_quiet_and_index() {
        let nodes = parse_ok("$!items[0].name");
        let r = reference(&nodes[0]);
        assert!(r.quiet);
        assert_eq!(
            r.segments,
            vec![
                Segment::Index(Expr::Int(0)),
                Segment::Property("name".to_string())
            ]
        );
    }

    #[test]
    fn test_dollar_without_identifier_is_text() {
        assert_eq!(parse_ok("cost: $5 $"), vec![Node::Text("cost: $5 $".to_string())]);
    }

    #[test]
    fn test_escaped_reference() {
        assert_eq!(parse_ok("\\$name"), vec![Node::Text("$name".to_string())]);
        let nodes = parse_ok("\\\\$name");
        assert_eq!(nodes[0], Node::Text("\\".to_string()));
        assert_eq!(reference(&nodes[1]).name, "name");
    }

    #[test]
    fn test_positions() {
        let nodes = parse_ok("a\n  $b");
        assert_eq!(reference(&nodes[1]).position, Position::new(2, 3));
    }

    #[test]
    fn test_if_else_gobbles_lines() {
        let nodes = parse_ok("{\n  #if($a)\n  yes\n  #else\n  no\n  #end\n}");
        assert_eq!(nodes[0], Node::Text("{\n".to_string()));
        match &nodes[1] {
            Node::If {
                branches,
                otherwise,
                ..
            } => {
                assert_eq!(branches[0].1, vec![Node::Text("  yes\n".to_string())]);
                assert_eq!(otherwise.as_ref().unwrap(), &vec![Node::Text("  no\n".to_string())]);
            }
            other => panic!("expected #if, got {:?}", other),
        }
        assert_eq!(nodes[2], Node::Text("}".to_string()));
    }

    #[test]
    fn test_inline_directives_keep_whitespace() {
        let nodes = parse_ok("a #if($x)b#{else}c#end d");
        assert_eq!(nodes[0], Node::Text("a ".to_string()));
        assert_eq!(nodes[2], Node::Text(" d".to_string()));
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            parse_ok("a ## note\nb#* block *#c\n  ## whole line\nd"),
            vec![Node::Text("a bc\nd".to_string())]
        );
    }

    #[test]
    fn test_unparsed_block() {
        assert_eq!(
            parse_ok("#[[ $raw #if ]]#"),
            vec![Node::Text(" $raw #if ".to_string())]
        );
    }

    #[test]
    fn test_unknown_directive_is_text() {
        assert_eq!(parse_ok("#hashtag"), vec![Node::Text("#hashtag".to_string())]);
    }

    #[test]
    fn test_set_and_precedence() {
        let nodes = parse_ok("#set($x = 1 + 2 * 3 == 7 && !$y)");
        match &nodes[0] {
            Node::Set { target, value, .. } => {
                assert_eq!(target.name, "x");
                match value {
                    Expr::Binary { op, left, .. } => {
                        assert_eq!(*op, BinaryOp::And);
                        assert!(matches!(**left, Expr::Binary { op: BinaryOp::Eq, .. }));
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("expected #set, got {:?}", other),
        }
    }

    #[test]
    fn test_foreach_and_range() {
        let nodes = parse_ok("#foreach($i in [1..3])$i#end");
        match &nodes[0] {
            Node::Foreach {
                variable, iterable, ..
            } => {
                assert_eq!(variable, "i");
                assert!(matches!(iterable, Expr::Range(_, _)));
            }
            other => panic!("expected #foreach, got {:?}", other),
        }
    }

    #[test]
    fn test_interpolated_string() {
        let nodes = parse_ok("#set($s = \"id-$id\")");
        match &nodes[0] {
            Node::Set { value, .. } => assert!(matches!(value, Expr::Interpolated(_))),
            other => panic!("expected #set, got {:?}", other),
        }
    }

    #[test]
    fn test_map_literal() {
        let nodes = parse_ok("#set($m = {'a': 1, \"b\": [true, null]})");
        match &nodes[0] {
            Node::Set { value: Expr::Map(entries), .. } => assert_eq!(entries.len(), 2),
            other => panic!("expected map literal, got {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_if_reports_eof() {
        let err = parse("requestTemplate", "#if($a)\nyes").unwrap_err();
        match err {
            EngineError::Parse { line, column, message, .. } => {
                assert_eq!((line, column), (2, 4));
                assert!(message.contains("<EOF>"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_stray_end_is_error() {
        assert!(parse("t", "text #end").is_err());
        assert!(parse("t", "#else").is_err());
    }

    #[test]
    fn test_bad_expression_position() {
        let err = parse("t", "line\n#set($x = )").unwrap_err();
        assert_eq!((err.line(), err.column()), (2, 11));
    }
}
