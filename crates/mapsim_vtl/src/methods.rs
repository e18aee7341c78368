//! Built-in methods on strings, lists, maps and numbers.
//!
//! Names and behaviour follow the Java methods mapping templates are written
//! against, so `$s.length()`, `$list.size()` and `$map.keySet()` work as
//! they do in the gateway.

use std::cmp::Ordering;

use indexmap::IndexMap;
use regex::Regex;

use crate::value::{capitalize, MethodError, Value};

type MethodResult = Result<Value, MethodError>;

/// Value returned by methods declared `void`; renders as nothing.
fn void() -> Value {
    Value::string("")
}

fn failed(message: impl Into<String>) -> MethodError {
    MethodError::Failed(message.into())
}

fn str_arg(args: &[Value], i: usize) -> Result<&str, MethodError> {
    args.get(i).and_then(Value::as_str).ok_or(MethodError::NotFound)
}

fn int_arg(args: &[Value], i: usize) -> Result<i64, MethodError> {
    args.get(i).and_then(Value::as_i64).ok_or(MethodError::NotFound)
}

fn any_arg(args: &[Value], i: usize) -> Result<&Value, MethodError> {
    args.get(i).ok_or(MethodError::NotFound)
}

/// Map keys are strings; other key values use their rendered text.
fn key_of(value: &Value) -> String {
    value.render()
}

/// Invoke `method` on `target`.
pub(crate) fn invoke(target: &Value, method: &str, args: &[Value]) -> MethodResult {
    match target {
        Value::Null => Err(MethodError::NotFound),
        Value::Object(object) => object.invoke(method, args),
        Value::String(s) => string_method(s, method, args),
        Value::List(_) => list_method(target, method, args),
        Value::Map(_) => map_method(target, method, args),
        Value::Int(_) | Value::Float(_) => number_method(target, method, args),
        Value::Bool(b) => match (method, args.len()) {
            ("booleanValue", 0) => Ok(Value::Bool(*b)),
            ("toString", 0) => Ok(Value::string(b.to_string())),
            ("equals", 1) => Ok(Value::Bool(args[0] == *target)),
            _ => Err(MethodError::NotFound),
        },
    }
}

/// Resolve `$target.name`: a key lookup on maps, the getter convention
/// elsewhere.
pub(crate) fn property(target: &Value, name: &str) -> MethodResult {
    match target {
        Value::Null => Err(MethodError::NotFound),
        Value::Map(map) => Ok(map.borrow().get(name).cloned().unwrap_or(Value::Null)),
        Value::Object(object) => object.property(name),
        _ => {
            let suffix = capitalize(name);
            match invoke(target, &format!("get{}", suffix), &[]) {
                Err(MethodError::NotFound) => invoke(target, &format!("is{}", suffix), &[]),
                other => other,
            }
        }
    }
}

/// Resolve `$target[index]`.
pub(crate) fn index(target: &Value, index: &Value) -> MethodResult {
    match target {
        Value::List(_) => invoke(target, "get", std::slice::from_ref(index)),
        Value::Map(map) => Ok(map.borrow().get(&key_of(index)).cloned().unwrap_or(Value::Null)),
        Value::Object(object) => object.invoke("get", std::slice::from_ref(index)),
        _ => Err(MethodError::NotFound),
    }
}

fn char_index(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

fn char_position(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

fn compile(pattern: &str) -> Result<Regex, MethodError> {
    Regex::new(pattern).map_err(|e| failed(format!("invalid regular expression '{}': {}", pattern, e)))
}

fn string_method(s: &str, method: &str, args: &[Value]) -> MethodResult {
    let length = s.chars().count() as i64;
    match (method, args.len()) {
        ("length", 0) => Ok(Value::Int(length)),
        ("isEmpty", 0) => Ok(Value::Bool(s.is_empty())),
        ("toString", 0) => Ok(Value::string(s)),
        ("toUpperCase", 0) => Ok(Value::string(s.to_uppercase())),
        ("toLowerCase", 0) => Ok(Value::string(s.to_lowercase())),
        ("trim", 0) => Ok(Value::string(s.trim_matches(|c: char| c <= ' '))),
        ("substring", 1 | 2) => {
            let begin = int_arg(args, 0)?;
            let end = if args.len() == 2 { int_arg(args, 1)? } else { length };
            if begin < 0 || end > length || begin > end {
                return Err(failed(format!(
                    "begin {}, end {}, length {}",
                    begin, end, length
                )));
            }
            let from = char_index(s, begin as usize);
            let to = char_index(s, end as usize);
            Ok(Value::string(&s[from..to]))
        }
        ("charAt", 1) => {
            let at = int_arg(args, 0)?;
            if at < 0 || at >= length {
                return Err(failed(format!("index {}, length {}", at, length)));
            }
            Ok(Value::string(s.chars().nth(at as usize).map(String::from).unwrap_or_default()))
        }
        ("indexOf", 1 | 2) => {
            let needle = str_arg(args, 0)?;
            let from = if args.len() == 2 { int_arg(args, 1)?.clamp(0, length) } else { 0 };
            let start = char_index(s, from as usize);
            Ok(Value::Int(
                s[start..]
                    .find(needle)
                    .map(|i| char_position(s, start + i))
                    .unwrap_or(-1),
            ))
        }
        ("lastIndexOf", 1) => {
            let needle = str_arg(args, 0)?;
            Ok(Value::Int(s.rfind(needle).map(|i| char_position(s, i)).unwrap_or(-1)))
        }
        ("contains", 1) => Ok(Value::Bool(s.contains(str_arg(args, 0)?))),
        ("startsWith", 1) => Ok(Value::Bool(s.starts_with(str_arg(args, 0)?))),
        ("endsWith", 1) => Ok(Value::Bool(s.ends_with(str_arg(args, 0)?))),
        ("equals", 1) => Ok(Value::Bool(args[0].as_str() == Some(s))),
        ("equalsIgnoreCase", 1) => Ok(Value::Bool(
            args[0]
                .as_str()
                .map_or(false, |other| other.to_lowercase() == s.to_lowercase()),
        )),
        ("concat", 1) => Ok(Value::string(format!("{}{}", s, str_arg(args, 0)?))),
        ("compareTo", 1) => {
            let other = str_arg(args, 0)?;
            let diff = s
                .chars()
                .zip(other.chars())
                .find(|(a, b)| a != b)
                .map(|(a, b)| a as i64 - b as i64)
                .unwrap_or(length - other.chars().count() as i64);
            Ok(Value::Int(diff))
        }
        ("replace", 2) => Ok(Value::string(s.replace(str_arg(args, 0)?, str_arg(args, 1)?))),
        ("replaceAll", 2) => {
            let regex = compile(str_arg(args, 0)?)?;
            Ok(Value::string(regex.replace_all(s, str_arg(args, 1)?)))
        }
        ("replaceFirst", 2) => {
            let regex = compile(str_arg(args, 0)?)?;
            Ok(Value::string(regex.replace(s, str_arg(args, 1)?)))
        }
        ("matches", 1) => {
            let regex = compile(&format!("^(?:{})$", str_arg(args, 0)?))?;
            Ok(Value::Bool(regex.is_match(s)))
        }
        ("split", 1) => {
            let regex = compile(str_arg(args, 0)?)?;
            let mut parts: Vec<Value> = regex.split(s).map(Value::from).collect();
            while parts.len() > 1 && parts.last().map_or(false, |p| p.as_str() == Some("")) {
                parts.pop();
            }
            Ok(Value::list(parts))
        }
        _ => Err(MethodError::NotFound),
    }
}

fn list_method(target: &Value, method: &str, args: &[Value]) -> MethodResult {
    let Value::List(list) = target else {
        return Err(MethodError::NotFound);
    };
    let size = list.borrow().len() as i64;
    let out_of_bounds = |i: i64| failed(format!("Index {} out of bounds for length {}", i, size));

    match (method, args.len()) {
        ("size", 0) => Ok(Value::Int(size)),
        ("isEmpty", 0) => Ok(Value::Bool(size == 0)),
        ("toString", 0) => Ok(Value::string(target.render())),
        ("get", 1) => {
            let i = int_arg(args, 0)?;
            if i < 0 || i >= size {
                return Err(out_of_bounds(i));
            }
            Ok(list.borrow()[i as usize].clone())
        }
        ("contains", 1) => Ok(Value::Bool(list.borrow().iter().any(|v| v.loose_eq(&args[0])))),
        ("indexOf", 1) => Ok(Value::Int(
            list.borrow()
                .iter()
                .position(|v| v.loose_eq(&args[0]))
                .map(|i| i as i64)
                .unwrap_or(-1),
        )),
        ("add", 1) => {
            list.borrow_mut().push(args[0].clone());
            Ok(Value::Bool(true))
        }
        ("add", 2) => {
            let i = int_arg(args, 0)?;
            if i < 0 || i > size {
                return Err(out_of_bounds(i));
            }
            list.borrow_mut().insert(i as usize, args[1].clone());
            Ok(void())
        }
        ("set", 2) => {
            let i = int_arg(args, 0)?;
            if i < 0 || i >= size {
                return Err(out_of_bounds(i));
            }
            Ok(std::mem::replace(&mut list.borrow_mut()[i as usize], args[1].clone()))
        }
        ("remove", 1) => match &args[0] {
            Value::Int(i) => {
                if *i < 0 || *i >= size {
                    return Err(out_of_bounds(*i));
                }
                Ok(list.borrow_mut().remove(*i as usize))
            }
            other => {
                let position = list.borrow().iter().position(|v| v.loose_eq(other));
                if let Some(position) = position {
                    list.borrow_mut().remove(position);
                }
                Ok(Value::Bool(position.is_some()))
            }
        },
        ("addAll", 1) => {
            let items = any_arg(args, 0)?.items().ok_or(MethodError::NotFound)?;
            let changed = !items.is_empty();
            list.borrow_mut().extend(items);
            Ok(Value::Bool(changed))
        }
        ("clear", 0) => {
            list.borrow_mut().clear();
            Ok(void())
        }
        ("subList", 2) => {
            let from = int_arg(args, 0)?;
            let to = int_arg(args, 1)?;
            if from < 0 || to > size || from > to {
                return Err(failed(format!("fromIndex {}, toIndex {}, size {}", from, to, size)));
            }
            Ok(Value::list(list.borrow()[from as usize..to as usize].to_vec()))
        }
        _ => Err(MethodError::NotFound),
    }
}

fn map_method(target: &Value, method: &str, args: &[Value]) -> MethodResult {
    let Value::Map(map) = target else {
        return Err(MethodError::NotFound);
    };

    match (method, args.len()) {
        ("size", 0) => Ok(Value::Int(map.borrow().len() as i64)),
        ("isEmpty", 0) => Ok(Value::Bool(map.borrow().is_empty())),
        ("toString", 0) => Ok(Value::string(target.render())),
        ("get", 1) => Ok(map.borrow().get(&key_of(&args[0])).cloned().unwrap_or(Value::Null)),
        ("containsKey", 1) => Ok(Value::Bool(map.borrow().contains_key(&key_of(&args[0])))),
        ("containsValue", 1) => Ok(Value::Bool(
            map.borrow().values().any(|v| v.loose_eq(&args[0])),
        )),
        ("put", 2) => {
            let key = key_of(&args[0]);
            Ok(map.borrow_mut().insert(key, args[1].clone()).unwrap_or(Value::Null))
        }
        ("remove", 1) => {
            let key = key_of(&args[0]);
            Ok(map.borrow_mut().shift_remove(&key).unwrap_or(Value::Null))
        }
        ("putAll", 1) => {
            let Value::Map(other) = &args[0] else {
                return Err(MethodError::NotFound);
            };
            let entries: Vec<(String, Value)> = other
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            map.borrow_mut().extend(entries);
            Ok(void())
        }
        ("clear", 0) => {
            map.borrow_mut().clear();
            Ok(void())
        }
        ("keySet", 0) => Ok(Value::list(
            map.borrow().keys().map(|k| Value::string(k.as_str())).collect(),
        )),
        ("values", 0) => Ok(Value::list(map.borrow().values().cloned().collect())),
        ("entrySet", 0) => Ok(Value::list(
            map.borrow()
                .iter()
                .map(|(k, v)| {
                    let mut entry = IndexMap::new();
                    entry.insert("key".to_string(), Value::string(k.as_str()));
                    entry.insert("value".to_string(), v.clone());
                    Value::map(entry)
                })
                .collect(),
        )),
        _ => Err(MethodError::NotFound),
    }
}

fn number_method(target: &Value, method: &str, args: &[Value]) -> MethodResult {
    match (method, args.len()) {
        ("intValue" | "longValue", 0) => Ok(match target {
            Value::Float(f) => Value::Int(*f as i64),
            other => other.clone(),
        }),
        ("doubleValue" | "floatValue", 0) => Ok(target.as_f64().map(Value::Float).unwrap_or(Value::Null)),
        ("toString", 0) => Ok(Value::string(target.render())),
        ("equals", 1) => Ok(Value::Bool(args[0] == *target)),
        ("compareTo", 1) => {
            let (Some(a), Some(b)) = (target.as_f64(), args[0].as_f64()) else {
                return Err(MethodError::NotFound);
            };
            Ok(Value::Int(match a.partial_cmp(&b) {
                Some(Ordering::Less) => -1,
                Some(Ordering::Greater) => 1,
                _ => 0,
            }))
        }
        _ => Err(MethodError::NotFound),
    }
}
