//! Runtime values seen by templates.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// A template value.
///
/// Lists and maps are shared handles: a template that calls `$list.add(..)`
/// or `#set($map.key = ..)` mutates the same container every other binding
/// that holds it sees, the way Velocity does with Java collections.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<IndexMap<String, Value>>>),
    Object(Rc<dyn TemplateObject>),
}

/// Why a method or property could not be invoked on a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodError {
    /// No method with this name and signature exists.
    NotFound,
    /// The method exists but failed.
    Failed(String),
}

/// A host object exposed to templates with a fixed set of named methods.
///
/// The engine dispatches `$obj.method(args)` to [`TemplateObject::invoke`]
/// and `$obj.prop` to [`TemplateObject::property`], which follows the bean
/// convention of trying `getProp()` and then `isProp()`.
pub trait TemplateObject {
    /// Short type name used in error messages.
    fn type_name(&self) -> &str;

    /// Invoke a method by name.
    fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, MethodError>;

    /// Resolve a property.
    fn property(&self, name: &str) -> Result<Value, MethodError> {
        let suffix = capitalize(name);
        match self.invoke(&format!("get{}", suffix), &[]) {
            Err(MethodError::NotFound) => self.invoke(&format!("is{}", suffix), &[]),
            other => other,
        }
    }

    /// Text rendered when the object itself is referenced.
    fn render(&self) -> String {
        format!("{}@object", self.type_name())
    }
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create a list value.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Create a map value.
    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// Create an empty map value.
    pub fn empty_map() -> Self {
        Value::map(IndexMap::new())
    }

    /// Wrap a host object.
    pub fn object(object: impl TemplateObject + 'static) -> Self {
        Value::Object(Rc::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Look up a key when this value is a map.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Snapshot of the items when this value is a list.
    pub fn items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(list) => Some(list.borrow().clone()),
            _ => None,
        }
    }

    /// Velocity truthiness: only null and `false` are false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    /// Name of the value's type, Java-flavoured, for error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "Boolean".to_string(),
            Value::Int(_) => "Integer".to_string(),
            Value::Float(_) => "Double".to_string(),
            Value::String(_) => "String".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::Object(o) => o.type_name().to_string(),
        }
    }

    /// Identity of a list or map handle. Scalars and host objects have none.
    pub fn container_id(&self) -> Option<usize> {
        match self {
            Value::List(list) => Some(Rc::as_ptr(list) as *const () as usize),
            Value::Map(map) => Some(Rc::as_ptr(map) as *const () as usize),
            _ => None,
        }
    }

    /// Text that stands in for a container nested inside itself, as Java's
    /// collection `toString` writes it.
    pub fn self_reference_text(&self) -> Option<&'static str> {
        match self {
            Value::List(_) => Some("(this Collection)"),
            Value::Map(_) => Some("(this Map)"),
            _ => None,
        }
    }

    /// Text form of the value as it appears in rendered output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, &mut Vec::new());
        out
    }

    fn render_into(&self, out: &mut String, open: &mut Vec<usize>) {
        if let (Some(id), Some(text)) = (self.container_id(), self.self_reference_text()) {
            if open.contains(&id) {
                out.push_str(text);
                return;
            }
            open.push(id);
        }

        match self {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&format_double(*f)),
            Value::String(s) => out.push_str(s),
            Value::List(list) => {
                out.push('[');
                for (i, item) in list.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render_into(out, open);
                }
                out.push(']');
            }
            Value::Map(map) => {
                out.push('{');
                for (i, (key, value)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push('=');
                    value.render_into(out, open);
                }
                out.push('}');
            }
            Value::Object(o) => out.push_str(&o.render()),
        }

        if self.container_id().is_some() {
            open.pop();
        }
    }

    /// Structural equality. A pair of containers already being compared
    /// further up is taken as equal, so cyclic values terminate.
    fn eq_within(&self, other: &Value, open: &mut Vec<(usize, usize)>) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && nested_eq(self, other, open, |open| {
                        a.iter().zip(b.iter()).all(|(x, y)| x.eq_within(y, open))
                    });
                equal
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && nested_eq(self, other, open, |open| {
                        a.iter()
                            .all(|(k, x)| b.get(k).map_or(false, |y| x.eq_within(y, open)))
                    });
                equal
            }
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose equality used by `==` and collection lookups: numbers compare
    /// by value, mismatched types compare by their rendered text.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (a, b) if a.is_number() && b.is_number() => a.as_f64() == b.as_f64(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(_), Value::List(_)) | (Value::Map(_), Value::Map(_)) => self == other,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (a, b) => a.render() == b.render(),
        }
    }
}

fn nested_eq(
    a: &Value,
    b: &Value,
    open: &mut Vec<(usize, usize)>,
    compare: impl FnOnce(&mut Vec<(usize, usize)>) -> bool,
) -> bool {
    let pair = match (a.container_id(), b.container_id()) {
        (Some(x), Some(y)) => (x, y),
        _ => return compare(open),
    };
    if open.contains(&pair) {
        return true;
    }
    open.push(pair);
    let equal = compare(open);
    open.pop();
    equal
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_within(other, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = RefCell::new(Vec::new());
        fmt::Debug::fmt(&DebugNested { value: self, open: &open }, f)
    }
}

/// Debug view that tracks the containers currently being printed.
struct DebugNested<'a> {
    value: &'a Value,
    open: &'a RefCell<Vec<usize>>,
}

impl fmt::Debug for DebugNested<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.value.container_id();
        if let (Some(id), Some(text)) = (id, self.value.self_reference_text()) {
            if self.open.borrow().contains(&id) {
                return f.write_str(text);
            }
            self.open.borrow_mut().push(id);
        }

        let open = self.open;
        let result = match self.value {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::List(list) => f
                .debug_list()
                .entries(list.borrow().iter().map(|value| DebugNested { value, open }))
                .finish(),
            Value::Map(map) => f
                .debug_map()
                .entries(map.borrow().iter().map(|(k, value)| (k, DebugNested { value, open })))
                .finish(),
            Value::Object(o) => write!(f, "Object({})", o.type_name()),
        };

        if id.is_some() {
            self.open.borrow_mut().pop();
        }
        result
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Value::map(entries)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Format a double the way `Double.toString` does.
pub fn format_double(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let magnitude = f.abs();
    if (1e-3..1e7).contains(&magnitude) {
        let text = f.to_string();
        if text.contains('.') {
            text
        } else {
            format!("{}.0", text)
        }
    } else {
        let text = format!("{:e}", f);
        let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
        if mantissa.contains('.') {
            format!("{}E{}", mantissa, exponent)
        } else {
            format!("{}.0E{}", mantissa, exponent)
        }
    }
}

pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Greeter;

    impl TemplateObject for Greeter {
        fn type_name(&self) -> &str {
            "Greeter"
        }

        fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, MethodError> {
            match (method, args) {
                ("getName", []) => Ok(Value::from("world")),
                ("isFriendly", []) => Ok(Value::Bool(true)),
                _ => Err(MethodError::NotFound),
            }
        }
    }

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(1.0), "1.0");
        assert_eq!(format_double(1.2), "1.2");
        assert_eq!(format_double(-0.5), "-0.5");
        assert_eq!(format_double(0.0), "0.0");
        assert_eq!(format_double(1e21), "1.0E21");
        assert_eq!(format_double(1.5e-5), "1.5E-5");
        assert_eq!(format_double(12345678.9), "1.23456789E7");
    }

    #[test]
    fn test_render_collections() {
        let mut entries = IndexMap::new();
        entries.insert("a".to_string(), Value::Int(1));
        entries.insert("b".to_string(), Value::list(vec![Value::from("x"), Value::Null]));
        assert_eq!(Value::map(entries).render(), "{a=1, b=[x, null]}");
    }

    #[test]
    fn test_shared_list_mutation() {
        let list = Value::list(vec![]);
        let alias = list.clone();
        if let Value::List(items) = &alias {
            items.borrow_mut().push(Value::Int(3));
        }
        assert_eq!(list.render(), "[3]");
    }

    #[test]
    fn test_self_containing_list_renders() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.render(), "[1, (this Collection)]");
        assert_eq!(format!("{:?}", list), "[Int(1), (this Collection)]");
    }

    #[test]
    fn test_self_containing_map_renders() {
        let map = Value::empty_map();
        if let Value::Map(entries) = &map {
            entries.borrow_mut().insert("a".to_string(), map.clone());
            entries.borrow_mut().insert("b".to_string(), Value::list(vec![map.clone()]));
        }
        assert_eq!(map.render(), "{a=(this Map), b=[(this Map)]}");
    }

    #[test]
    fn test_cyclic_values_compare() {
        let first = Value::list(vec![]);
        let second = Value::list(vec![]);
        for list in [&first, &second] {
            if let Value::List(items) = list {
                items.borrow_mut().push(list.clone());
            }
        }
        assert_eq!(first, second);
        assert!(first.loose_eq(&second));
        assert_ne!(first, Value::list(vec![Value::Int(1)]));
    }

    #[test]
    fn test_loose_eq() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::from("1").loose_eq(&Value::Int(1)));
        assert!(!Value::Null.loose_eq(&Value::from("null")));
        assert!(Value::Null.loose_eq(&Value::Null));
    }

    #[test]
    fn test_object_property_convention() {
        let greeter = Greeter;
        assert_eq!(greeter.property("name"), Ok(Value::from("world")));
        assert_eq!(greeter.property("friendly"), Ok(Value::Bool(true)));
        assert_eq!(greeter.property("missing"), Err(MethodError::NotFound));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(Value::Int(0).is_truthy());
    }
}
