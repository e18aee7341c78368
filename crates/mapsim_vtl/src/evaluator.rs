//! Tree-walking evaluator.

use std::cmp::Ordering;

use indexmap::IndexMap;
use tracing::debug;

use crate::ast::{BinaryOp, Expr, Node, Position, Reference, Segment, UnaryOp};
use crate::context::RenderContext;
use crate::engine::EngineConfig;
use crate::error::{EngineError, EngineResult, InvocationCause};
use crate::methods;
use crate::parser;
use crate::value::{MethodError, Value};

/// What a rendered node asks its enclosing block to do next.
enum Flow {
    Normal,
    Break,
    Stop,
}

pub(crate) struct Evaluator<'e> {
    config: &'e EngineConfig,
    template: String,
    depth: usize,
}

impl<'e> Evaluator<'e> {
    pub(crate) fn new(config: &'e EngineConfig, template: &str) -> Self {
        Self {
            config,
            template: template.to_string(),
            depth: 0,
        }
    }

    pub(crate) fn render(&mut self, nodes: &[Node], ctx: &mut RenderContext) -> EngineResult<String> {
        let mut out = String::new();
        self.render_nodes(nodes, ctx, &mut out)?;
        Ok(out)
    }

    fn strict(&self) -> bool {
        self.config.strict_references
    }

    // ---------------------------------------------------------------------
    // Errors
    // ---------------------------------------------------------------------

    fn invocation(&self, r: &Reference, message: String, cause: Option<String>) -> EngineError {
        EngineError::Invocation {
            template: self.template.clone(),
            message,
            reference: r.literal.clone(),
            line: r.position.line,
            column: r.position.column,
            cause: cause.map(InvocationCause),
        }
    }

    fn runtime(&self, position: Position, message: String) -> EngineError {
        EngineError::Runtime {
            template: self.template.clone(),
            message,
            line: position.line,
            column: position.column,
        }
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    fn render_nodes(
        &mut self,
        nodes: &[Node],
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> EngineResult<Flow> {
        for node in nodes {
            match self.render_node(node, ctx, out)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn render_node(
        &mut self,
        node: &Node,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> EngineResult<Flow> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Reference(r) => {
                let value = self.resolve(r, ctx)?;
                if !value.is_null() {
                    out.push_str(&value.render());
                } else if !r.quiet {
                    out.push_str(&r.literal);
                }
            }
            Node::Set { target, value, .. } => self.assign(target, value, ctx)?,
            Node::If {
                branches,
                otherwise,
                ..
            } => {
                for (condition, body) in branches {
                    if self.condition(condition, ctx)? {
                        return self.render_nodes(body, ctx, out);
                    }
                }
                if let Some(body) = otherwise {
                    return self.render_nodes(body, ctx, out);
                }
            }
            Node::Foreach {
                variable,
                iterable,
                body,
                position,
            } => return self.foreach(variable, iterable, body, *position, ctx, out),
            Node::Break(_) => return Ok(Flow::Break),
            Node::Stop(_) => return Ok(Flow::Stop),
            Node::Parse { name, position } => return self.parse_resource(name, *position, ctx, out),
            Node::Include { name, position } => {
                let (_, source) = self.resource(name, *position, ctx)?;
                out.push_str(&source);
            }
        }
        Ok(Flow::Normal)
    }

    fn foreach(
        &mut self,
        variable: &str,
        iterable: &Expr,
        body: &[Node],
        position: Position,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> EngineResult<Flow> {
        let collection = self.eval(iterable, ctx)?;
        let items = match &collection {
            Value::Null => return Ok(Flow::Normal),
            Value::List(list) => list.borrow().clone(),
            Value::Map(map) => map.borrow().values().cloned().collect(),
            other => {
                debug!(
                    "#foreach at line {}, column {} cannot iterate over {}",
                    position.line,
                    position.column,
                    other.type_name()
                );
                return Ok(Flow::Normal);
            }
        };

        let saved = [variable, "foreach", "velocityCount"].map(|name| (name, ctx.remove(name)));
        let total = items.len();
        let mut flow = Flow::Normal;

        for (i, item) in items.into_iter().enumerate() {
            let mut state = IndexMap::new();
            state.insert("index".to_string(), Value::Int(i as i64));
            state.insert("count".to_string(), Value::Int(i as i64 + 1));
            state.insert("hasNext".to_string(), Value::Bool(i + 1 < total));
            state.insert("first".to_string(), Value::Bool(i == 0));
            state.insert("last".to_string(), Value::Bool(i + 1 == total));

            ctx.put(variable, item);
            ctx.put("foreach", Value::map(state));
            ctx.put("velocityCount", Value::Int(i as i64 + 1));

            match self.render_nodes(body, ctx, out)? {
                Flow::Normal => {}
                Flow::Break => break,
                Flow::Stop => {
                    flow = Flow::Stop;
                    break;
                }
            }
        }

        for (name, value) in saved {
            match value {
                Some(value) => ctx.put(name, value),
                None => ctx.remove(name),
            };
        }
        Ok(flow)
    }

    fn resource(
        &mut self,
        name: &Expr,
        position: Position,
        ctx: &mut RenderContext,
    ) -> EngineResult<(String, String)> {
        let resource = match self.eval(name, ctx)? {
            Value::Null => expr_literal(name),
            value => value.render(),
        };

        match self.config.resources.get(&resource) {
            Some(source) => Ok((resource, source.clone())),
            None => {
                let mut message = format!("Unable to find resource '{}'", resource);
                if let Expr::Reference(r) = name {
                    message.push_str(&format!(" referenced by {}", r.literal));
                }
                Err(EngineError::ResourceNotFound {
                    template: self.template.clone(),
                    message,
                    name: resource,
                    line: position.line,
                    column: position.column,
                })
            }
        }
    }

    fn parse_resource(
        &mut self,
        name: &Expr,
        position: Position,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> EngineResult<Flow> {
        if self.depth >= self.config.max_parse_depth {
            return Err(self.runtime(
                position,
                format!(
                    "Max recursion depth reached ({}) for #parse",
                    self.config.max_parse_depth
                ),
            ));
        }

        let (resource, source) = self.resource(name, position, ctx)?;
        debug!("Parsing resource {} from {}", resource, self.template);
        let nodes = parser::parse(&resource, &source)?;

        let parent = std::mem::replace(&mut self.template, resource);
        self.depth += 1;
        let flow = self.render_nodes(&nodes, ctx, out);
        self.depth -= 1;
        self.template = parent;

        match flow? {
            Flow::Stop => Ok(Flow::Stop),
            _ => Ok(Flow::Normal),
        }
    }

    // ---------------------------------------------------------------------
    // References
    // ---------------------------------------------------------------------

    fn resolve(&mut self, r: &Reference, ctx: &mut RenderContext) -> EngineResult<Value> {
        Ok(self.resolve_segments(r, &r.segments, ctx)?.0)
    }

    /// Walk `segments` from the root of `r`; returns the value and the text
    /// of the path walked so far.
    fn resolve_segments(
        &mut self,
        r: &Reference,
        segments: &[Segment],
        ctx: &mut RenderContext,
    ) -> EngineResult<(Value, String)> {
        let mut walked = format!("${}", r.name);
        let mut current = match ctx.get(&r.name) {
            Some(value) => value.clone(),
            None if self.strict() => {
                return Err(self.invocation(
                    r,
                    format!("Variable {} reference is not defined", walked),
                    None,
                ))
            }
            None => return Ok((Value::Null, walked)),
        };

        for segment in segments {
            let (member, label) = match segment {
                Segment::Property(name) => (name.clone(), format!("{} (property)", name)),
                Segment::Method { name, .. } => (name.clone(), format!("{}()", name)),
                Segment::Index(_) => ("get".to_string(), "get()".to_string()),
            };

            if current.is_null() {
                if self.strict() {
                    return Err(self.invocation(
                        r,
                        format!("Attempted to access '{}' on a null value", member),
                        Some(format!("{}.{}: {} is null", walked, label, walked)),
                    ));
                }
                return Ok((Value::Null, walked));
            }

            let type_name = current.type_name();
            let (result, next) = match segment {
                Segment::Property(name) => (
                    methods::property(&current, name),
                    format!("{}.{}", walked, name),
                ),
                Segment::Method { name, args } => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg, ctx)?);
                    }
                    (
                        methods::invoke(&current, name, &values),
                        format!("{}.{}", walked, name),
                    )
                }
                Segment::Index(expr) => {
                    let index = self.eval(expr, ctx)?;
                    let next = format!("{}[{}]", walked, index.render());
                    (methods::index(&current, &index), next)
                }
            };

            current = match result {
                Ok(value) => value,
                Err(MethodError::NotFound) if self.strict() => {
                    let message = match segment {
                        Segment::Property(name) => format!(
                            "Object '{}' does not contain property '{}'",
                            type_name, name
                        ),
                        _ => format!(
                            "Object '{}' does not contain method {}",
                            type_name, label
                        ),
                    };
                    return Err(self.invocation(
                        r,
                        message,
                        Some(format!("{}.{}: no matching member on {}", walked, label, type_name)),
                    ));
                }
                Err(MethodError::NotFound) => return Ok((Value::Null, next)),
                Err(MethodError::Failed(detail)) => {
                    return Err(self.invocation(
                        r,
                        format!(
                            "Invocation of method '{}' on {} threw exception",
                            member, type_name
                        ),
                        Some(format!("{}.{}: {}", walked, label, detail)),
                    ))
                }
            };
            walked = next;
        }

        Ok((current, walked))
    }

    fn assign(&mut self, target: &Reference, value: &Expr, ctx: &mut RenderContext) -> EngineResult<()> {
        let value = self.eval(value, ctx)?;
        if value.is_null() {
            debug!("#set({}) skipped: right-hand side is null", target.literal);
            return Ok(());
        }

        let Some((last, parents)) = target.segments.split_last() else {
            ctx.put(target.name.as_str(), value);
            return Ok(());
        };

        let (parent, walked) = self.resolve_segments(target, parents, ctx)?;
        let key = match last {
            Segment::Property(name) => Value::string(name.as_str()),
            Segment::Index(expr) => self.eval(expr, ctx)?,
            Segment::Method { .. } => {
                return Err(self.runtime(
                    target.position,
                    format!("Cannot assign to method call {}", target.literal),
                ))
            }
        };

        match &parent {
            Value::Map(map) => {
                let key = key.render();
                map.borrow_mut().insert(key, value);
                Ok(())
            }
            Value::List(_) => match methods::invoke(&parent, "set", &[key, value]) {
                Ok(_) => Ok(()),
                Err(MethodError::Failed(detail)) => Err(self.invocation(
                    target,
                    format!("Invocation of method 'set' on {} threw exception", parent.type_name()),
                    Some(format!("{}.set(): {}", walked, detail)),
                )),
                Err(MethodError::NotFound) => Err(self.runtime(
                    target.position,
                    format!("List index in {} must be an integer", target.literal),
                )),
            },
            Value::Null if !self.strict() => Ok(()),
            other => Err(self.runtime(
                target.position,
                format!("Cannot assign {} on {}", target.literal, other.type_name()),
            )),
        }
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    /// `#if` conditions treat bare undefined references as false even under
    /// strict references.
    fn condition(&mut self, expr: &Expr, ctx: &mut RenderContext) -> EngineResult<bool> {
        match expr {
            Expr::Reference(r) if r.is_bare() => {
                Ok(ctx.get(&r.name).map_or(false, Value::is_truthy))
            }
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
                ..
            } => Ok(!self.condition(expr, ctx)?),
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
                ..
            } => Ok(self.condition(left, ctx)? && self.condition(right, ctx)?),
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
                ..
            } => Ok(self.condition(left, ctx)? || self.condition(right, ctx)?),
            other => Ok(self.eval(other, ctx)?.is_truthy()),
        }
    }

    fn eval(&mut self, expr: &Expr, ctx: &mut RenderContext) -> EngineResult<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::string(s.as_str())),
            Expr::Interpolated(nodes) => {
                let mut out = String::new();
                self.render_nodes(nodes, ctx, &mut out)?;
                Ok(Value::String(out))
            }
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, ctx)?);
                }
                Ok(Value::list(values))
            }
            Expr::Range(first, last) => {
                let from = self.eval(first, ctx)?;
                let to = self.eval(last, ctx)?;
                match (range_bound(&from), range_bound(&to)) {
                    (Some(from), Some(to)) if from <= to => {
                        Ok(Value::list((from..=to).map(Value::Int).collect()))
                    }
                    (Some(from), Some(to)) => {
                        Ok(Value::list((to..=from).rev().map(Value::Int).collect()))
                    }
                    _ => Ok(Value::Null),
                }
            }
            Expr::Map(entries) => {
                let mut map = IndexMap::new();
                for (key, value) in entries {
                    let key = self.eval(key, ctx)?.render();
                    let value = self.eval(value, ctx)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expr::Reference(r) => self.resolve(r, ctx),
            Expr::Unary { op, expr, position } => {
                let value = self.eval(expr, ctx)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Negate => match value {
                        Value::Int(i) => Ok(i
                            .checked_neg()
                            .map(Value::Int)
                            .unwrap_or(Value::Float(-(i as f64)))),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        Value::Null if self.strict() => Err(self.runtime(
                            *position,
                            format!("Operand ({}) of unary '-' has null value", expr_literal(expr)),
                        )),
                        _ => Ok(Value::Null),
                    },
                }
            }
            Expr::Binary {
                op,
                left,
                right,
                position,
            } => self.eval_binary(*op, left, right, *position, ctx),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        position: Position,
        ctx: &mut RenderContext,
    ) -> EngineResult<Value> {
        match op {
            BinaryOp::And => {
                let result = self.eval(left, ctx)?.is_truthy() && self.eval(right, ctx)?.is_truthy();
                return Ok(Value::Bool(result));
            }
            BinaryOp::Or => {
                let result = self.eval(left, ctx)?.is_truthy() || self.eval(right, ctx)?.is_truthy();
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        let a = self.eval(left, ctx)?;
        let b = self.eval(right, ctx)?;

        match op {
            BinaryOp::Eq => return Ok(Value::Bool(a.loose_eq(&b))),
            BinaryOp::Ne => return Ok(Value::Bool(!a.loose_eq(&b))),
            BinaryOp::Add if a.as_str().is_some() || b.as_str().is_some() => {
                let text = |value: &Value, expr: &Expr| match value {
                    Value::Null => expr_literal(expr),
                    other => other.render(),
                };
                return Ok(Value::String(text(&a, left) + &text(&b, right)));
            }
            _ => {}
        }

        if a.is_null() || b.is_null() {
            if self.strict() {
                let (side, expr) = if a.is_null() { ("Left", left) } else { ("Right", right) };
                return Err(self.runtime(
                    position,
                    format!(
                        "{} side ({}) of '{}' operation has null value",
                        side,
                        expr_literal(expr),
                        op.symbol()
                    ),
                ));
            }
            return Ok(match op {
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Value::Bool(false),
                _ => Value::Null,
            });
        }

        match op {
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = compare(&a, &b).ok_or_else(|| {
                    self.runtime(
                        position,
                        format!(
                            "Cannot compare {} with {} using '{}'",
                            a.type_name(),
                            b.type_name(),
                            op.symbol()
                        ),
                    )
                })?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            _ => Ok(arithmetic(op, &a, &b)),
        }
    }
}

fn range_bound(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (x, y) if x.is_number() && y.is_number() => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Integer arithmetic is checked and falls back to floating point on
/// overflow. Division or remainder by zero, and non-numeric operands, give
/// null.
fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Value {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(*y),
            BinaryOp::Sub => x.checked_sub(*y),
            BinaryOp::Mul => x.checked_mul(*y),
            BinaryOp::Div if *y == 0 => return Value::Null,
            BinaryOp::Div => x.checked_div(*y),
            BinaryOp::Mod if *y == 0 => return Value::Null,
            BinaryOp::Mod => x.checked_rem(*y),
            _ => None,
        };
        if let Some(result) = exact {
            return Value::Int(result);
        }
    }

    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        debug!(
            "'{}' is not defined for {} and {}",
            op.symbol(),
            a.type_name(),
            b.type_name()
        );
        return Value::Null;
    };
    match op {
        BinaryOp::Add => Value::Float(x + y),
        BinaryOp::Sub => Value::Float(x - y),
        BinaryOp::Mul => Value::Float(x * y),
        BinaryOp::Div if y == 0.0 => Value::Null,
        BinaryOp::Div => Value::Float(x / y),
        BinaryOp::Mod if y == 0.0 => Value::Null,
        BinaryOp::Mod => Value::Float(x % y),
        _ => Value::Null,
    }
}

/// Source text of an expression, used where Velocity shows the literal of a
/// null operand.
fn expr_literal(expr: &Expr) -> String {
    match expr {
        Expr::Reference(r) => r.literal.clone(),
        Expr::Str(s) => s.clone(),
        _ => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TemplateEngine;

    fn render(source: &str, ctx: &mut RenderContext) -> EngineResult<String> {
        TemplateEngine::default().evaluate(ctx, "test", source)
    }

    fn lenient(source: &str, ctx: &mut RenderContext) -> EngineResult<String> {
        TemplateEngine::new(EngineConfig::default().with_strict_references(false)).evaluate(ctx, "test", source)
    }

    #[test]
    fn test_arithmetic() {
        let mut ctx = RenderContext::new();
        assert_eq!(render("#set($x = 7 / 2)$x", &mut ctx).unwrap(), "3");
        assert_eq!(render("#set($x = 7 % 3 + 1.5)$x", &mut ctx).unwrap(), "2.5");
        assert_eq!(render("#set($x = 1 / 0)$x", &mut ctx).unwrap(), "2.5");
        assert_eq!(
            render("#set($y = 9223372036854775807 + 1)$y", &mut ctx).unwrap(),
            "9.223372036854776E18"
        );
    }

    #[test]
    fn test_string_concatenation() {
        let mut ctx = RenderContext::new();
        ctx.put("n", 2i64);
        assert_eq!(render("#set($s = 'n=' + $n)$s", &mut ctx).unwrap(), "n=2");
    }

    #[test]
    fn test_foreach_state_and_restore() {
        let mut ctx = RenderContext::new();
        ctx.put("item", "outer");
        let out = render(
            "#foreach($item in ['a', 'b', 'c'])$foreach.index:$item#if($foreach.hasNext),#end#end $item",
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out, "0:a,1:b,2:c outer");
        assert!(!ctx.contains_key("foreach"));
    }

    #[test]
    fn test_break_and_stop() {
        let mut ctx = RenderContext::new();
        assert_eq!(
            render("#foreach($i in [1..5])#if($i == 3)#break#end$i#end!", &mut ctx).unwrap(),
            "12!"
        );
        assert_eq!(render("a#stop b", &mut ctx).unwrap(), "a");
    }

    #[test]
    fn test_set_on_map_and_list() {
        let mut ctx = RenderContext::new();
        let out = render(
            "#set($m = {})#set($m.a = 1)#set($m['b'] = 2)#set($l = [0, 0])#set($l[1] = 5)$m $l",
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out, "{a=1, b=2} [0, 5]");
    }

    #[test]
    fn test_set_null_keeps_previous_value() {
        let mut ctx = RenderContext::new();
        ctx.put("m", Value::empty_map());
        assert_eq!(render("#set($x = 1)#set($x = $m.missing)$x", &mut ctx).unwrap(), "1");
    }

    #[test]
    fn test_strict_undefined_reference() {
        let mut ctx = RenderContext::new();
        let err = render("a\n  $undefinedVar b", &mut ctx).unwrap_err();
        assert_eq!(err.message(), "Variable $undefinedVar reference is not defined");
        assert_eq!((err.line(), err.column()), (2, 3));
        assert_eq!(lenient("$undefinedVar", &mut ctx).unwrap(), "$undefinedVar");
        assert_eq!(lenient("[$!undefinedVar]", &mut ctx).unwrap(), "[]");
    }

    #[test]
    fn test_undefined_in_condition_is_false() {
        let mut ctx = RenderContext::new();
        assert_eq!(
            render("#if($missing)yes#elseif(!$missing && !$other)no#end", &mut ctx).unwrap(),
            "no"
        );
    }

    #[test]
    fn test_method_failure_has_cause() {
        let mut ctx = RenderContext::new();
        ctx.put("list", Value::list(vec![]));
        let err = render("$list.get(3)", &mut ctx).unwrap_err();
        assert_eq!(err.message(), "Invocation of method 'get' on List threw exception");
        let cause = err.cause().unwrap().to_string();
        assert!(cause.starts_with("$list.get(): Index 3 out of bounds"));
    }

    #[test]
    fn test_null_member_access() {
        let mut ctx = RenderContext::new();
        ctx.put("m", Value::empty_map());
        assert!(render("$m.a.b", &mut ctx).is_err());
        assert_eq!(lenient("$m.a.b", &mut ctx).unwrap(), "$m.a.b");
    }

    #[test]
    fn test_parse_and_include_resources() {
        let config = EngineConfig::default()
            .with_resource("greeting.vtl", "Hello $name")
            .with_resource("raw.txt", "$name");
        let engine = TemplateEngine::new(config);
        let mut ctx = RenderContext::new();
        ctx.put("name", "Ana");
        assert_eq!(
            engine
                .evaluate(&mut ctx, "t", "#parse('greeting.vtl') / #include('raw.txt')")
                .unwrap(),
            "Hello Ana / $name"
        );

        let err = engine.evaluate(&mut ctx, "t", "#parse('nope.vtl')").unwrap_err();
        assert!(matches!(err, EngineError::ResourceNotFound { ref name, .. } if name == "nope.vtl"));
    }

    #[test]
    fn test_recursive_parse_is_limited() {
        let config = EngineConfig::default().with_resource("loop.vtl", "#parse('loop.vtl')");
        let err = TemplateEngine::new(config)
            .evaluate(&mut RenderContext::new(), "t", "#parse('loop.vtl')")
            .unwrap_err();
        assert!(err.message().contains("Max recursion depth"));
    }
}
