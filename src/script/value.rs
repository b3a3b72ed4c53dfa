//! Runtime values of the snippet dialect.
//!
//! Containers and instances are shared by reference: binding a list to a
//! second name and appending through either name changes both.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::ir::{Adjacency, Element, NodeId, TreeNode, format_number};

use super::builtins::{Builtin, Module};
use super::error::ErrorKind;
use super::parser::FunctionDef;

/// Longest sequence a snippet may build by repetition or materialise from a
/// range.
pub const MAX_SEQUENCE_LEN: usize = 10_000_000;

pub type List = Rc<RefCell<Vec<Value>>>;

/// Hashable form of a value, used for dict keys and set members. Booleans
/// and integral floats share the integer variant, so `1`, `1.0` and `True`
/// are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    None,
    Int(i64),
    Float(u64),
    Str(String),
    Tuple(Vec<Key>),
}

impl Key {
    pub fn to_value(&self) -> Value {
        match self {
            Self::None => Value::None,
            Self::Int(value) => Value::Number(*value as f64),
            Self::Float(bits) => Value::Number(f64::from_bits(*bits)),
            Self::Str(text) => Value::Str(text.clone()),
            Self::Tuple(items) => Value::tuple(items.iter().map(Key::to_value).collect()),
        }
    }

    /// Only integers and strings name graph nodes.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::Int(value) => Some(NodeId::Int(*value)),
            Self::Str(text) => Some(NodeId::Label(text.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn new(start: i64, stop: i64, step: i64) -> Result<Self, ErrorKind> {
        if step == 0 {
            return Err(ErrorKind::Value("range() arg 3 must not be zero".to_string()));
        }
        Ok(Self { start, stop, step })
    }

    pub fn len(&self) -> usize {
        let (start, stop, step) = (
            i128::from(self.start),
            i128::from(self.stop),
            i128::from(self.step),
        );
        let span = if step > 0 { stop - start } else { start - stop };
        if span <= 0 {
            return 0;
        }
        let stride = step.abs();
        usize::try_from((span + stride - 1) / stride).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        let value = i128::from(self.start) + index as i128 * i128::from(self.step);
        i64::try_from(value).ok()
    }

    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= value && value < self.stop
        } else {
            self.stop < value && value <= self.start
        };
        in_bounds && (i128::from(value) - i128::from(self.start)) % i128::from(self.step) == 0
    }

    pub fn iter(&self) -> RangeIter {
        RangeIter {
            next: Some(self.start),
            stop: self.stop,
            step: self.step,
        }
    }
}

/// Lazy range iteration; stops instead of wrapping when the next value
/// would overflow.
pub struct RangeIter {
    next: Option<i64>,
    stop: i64,
    step: i64,
}

impl Iterator for RangeIter {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let current = self.next?;
        let in_range = if self.step > 0 {
            current < self.stop
        } else {
            current > self.stop
        };
        if !in_range {
            self.next = None;
            return None;
        }
        self.next = current.checked_add(self.step);
        Some(current)
    }
}

pub struct DictObject {
    pub entries: RefCell<IndexMap<Key, Value>>,
    /// Set for `defaultdict`: called to fill a missing key on lookup.
    pub default_factory: Option<Value>,
}

impl DictObject {
    pub fn new(entries: IndexMap<Key, Value>) -> Self {
        Self {
            entries: RefCell::new(entries),
            default_factory: None,
        }
    }
}

/// A name scope. Function scopes point at the scope they were defined in.
#[derive(Default)]
pub struct Scope {
    pub vars: RefCell<HashMap<String, Value>>,
    pub parent: Option<Rc<Scope>>,
}

pub struct Function {
    pub def: Rc<FunctionDef>,
    /// Evaluated once, when the `def` statement runs.
    pub defaults: Vec<Option<Value>>,
    pub closure: Option<Rc<Scope>>,
}

pub struct Class {
    pub name: String,
    pub bases: Vec<Rc<Class>>,
    pub attrs: HashMap<String, Value>,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            attrs: HashMap::new(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.attrs
            .get(name)
            .cloned()
            .or_else(|| self.bases.iter().find_map(|base| base.lookup(name)))
    }

    pub fn is_subclass_of(self: &Rc<Self>, other: &Rc<Class>) -> bool {
        Rc::ptr_eq(self, other) || self.bases.iter().any(|base| base.is_subclass_of(other))
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<IndexMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(IndexMap::new()),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }
}

pub enum Method {
    User(Rc<Function>),
    Native(&'static str),
}

pub struct BoundMethod {
    pub receiver: Value,
    pub method: Method,
}

pub struct Exception {
    pub name: &'static str,
    pub message: String,
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Number(f64),
    Str(String),
    List(List),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<DictObject>),
    Set(Rc<RefCell<IndexSet<Key>>>),
    Range(RangeValue),
    Instance(Rc<Instance>),
    Class(Rc<Class>),
    Function(Rc<Function>),
    BoundMethod(Rc<BoundMethod>),
    Builtin(Builtin),
    Module(Module),
    Exception(Rc<Exception>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Self::Tuple(Rc::new(items))
    }

    pub fn dict(entries: IndexMap<Key, Value>) -> Self {
        Self::Dict(Rc::new(DictObject::new(entries)))
    }

    pub fn set(keys: IndexSet<Key>) -> Self {
        Self::Set(Rc::new(RefCell::new(keys)))
    }

    pub fn type_name(&self) -> String {
        let name = match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Number(value) if value.fract() == 0.0 => "int",
            Self::Number(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::Range(_) => "range",
            Self::Instance(instance) => return instance.class.name.clone(),
            Self::Class(_) => "type",
            Self::Function(_) => "function",
            Self::BoundMethod(_) => "method",
            Self::Builtin(_) => "builtin_function_or_method",
            Self::Module(_) => "module",
            Self::Exception(exception) => exception.name,
        };
        name.to_string()
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0,
            Self::Str(text) => !text.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::Dict(dict) => !dict.entries.borrow().is_empty(),
            Self::Set(keys) => !keys.borrow().is_empty(),
            Self::Range(range) => !range.is_empty(),
            _ => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Bool(value) => Some(f64::from(u8::from(*value))),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Result<i64, ErrorKind> {
        match self.as_number() {
            Some(value) if value.fract() == 0.0 && value.abs() < 9.2e18 => Ok(value as i64),
            Some(value) if value.is_finite() && value.fract() == 0.0 => Err(ErrorKind::Limit(
                format!("integer {} does not fit in 64 bits", format_number(value)),
            )),
            _ => Err(ErrorKind::Type(format!(
                "'{}' object cannot be interpreted as an integer",
                self.type_name()
            ))),
        }
    }

    pub fn to_key(&self) -> Result<Key, ErrorKind> {
        match self {
            Self::None => Ok(Key::None),
            Self::Number(_) | Self::Bool(_) => match self.as_int() {
                Ok(value) => Ok(Key::Int(value)),
                Err(_) => Ok(Key::Float(self.as_number().unwrap_or_default().to_bits())),
            },
            Self::Str(text) => Ok(Key::Str(text.clone())),
            Self::Tuple(items) => items
                .iter()
                .map(Value::to_key)
                .collect::<Result<Vec<_>, _>>()
                .map(Key::Tuple),
            other => Err(ErrorKind::Type(format!(
                "unhashable type: '{}'",
                other.type_name()
            ))),
        }
    }

    /// Iterates over a snapshot of the container; ranges stay lazy.
    pub fn iterate(&self) -> Result<Box<dyn Iterator<Item = Value>>, ErrorKind> {
        match self {
            Self::List(items) => Ok(Box::new(items.borrow().clone().into_iter())),
            Self::Tuple(items) => Ok(Box::new(items.to_vec().into_iter())),
            Self::Str(text) => Ok(Box::new(
                text.chars()
                    .map(|c| Value::Str(c.to_string()))
                    .collect::<Vec<_>>()
                    .into_iter(),
            )),
            Self::Dict(dict) => Ok(Box::new(
                dict.entries
                    .borrow()
                    .keys()
                    .map(Key::to_value)
                    .collect::<Vec<_>>()
                    .into_iter(),
            )),
            Self::Set(keys) => Ok(Box::new(
                keys.borrow()
                    .iter()
                    .map(Key::to_value)
                    .collect::<Vec<_>>()
                    .into_iter(),
            )),
            Self::Range(range) => Ok(Box::new(
                range.iter().map(|value| Value::Number(value as f64)),
            )),
            other => Err(ErrorKind::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Materialises an iterable, refusing ranges longer than
    /// [`MAX_SEQUENCE_LEN`].
    pub fn collect_items(&self) -> Result<Vec<Value>, ErrorKind> {
        if let Self::Range(range) = self
            && range.len() > MAX_SEQUENCE_LEN
        {
            return Err(sequence_limit(range.len()));
        }
        Ok(self.iterate()?.collect())
    }

    pub fn to_element(&self) -> Element {
        match self.as_number() {
            Some(value) => Element::Number(value),
            None => Element::Label(self.to_string()),
        }
    }

    pub fn to_elements(&self) -> Result<Vec<Element>, ErrorKind> {
        match self {
            Self::List(_) | Self::Tuple(_) | Self::Range(_) => Ok(self
                .collect_items()?
                .iter()
                .map(Value::to_element)
                .collect()),
            other => Err(ErrorKind::Type(format!(
                "expected a sequence of values, got '{}'",
                other.type_name()
            ))),
        }
    }

    /// Reads a tree of objects with `value`, `left` and `right` attributes.
    /// A missing or falsy child ends that branch.
    pub fn to_tree(&self) -> Result<Option<TreeNode>, ErrorKind> {
        tree_node(self, &mut Vec::new())
    }

    /// Keys must be integers or strings. Neighbours come from any iterable;
    /// hashable neighbours of other types can never match a key and are
    /// dropped.
    pub fn to_adjacency(&self) -> Result<Adjacency, ErrorKind> {
        let Self::Dict(dict) = self else {
            return Err(ErrorKind::Type(format!(
                "expected a dict of neighbour lists, got '{}'",
                self.type_name()
            )));
        };
        let entries = dict.entries.borrow();
        let mut adj = Adjacency::with_capacity(entries.len());
        for (key, neighbors) in entries.iter() {
            let id = key.node_id().ok_or_else(|| {
                ErrorKind::Type(format!(
                    "graph node {} must be an int or str",
                    key.to_value().repr()
                ))
            })?;
            let mut ids = Vec::new();
            for neighbor in neighbors.collect_items()? {
                if let Some(id) = neighbor.to_key()?.node_id() {
                    ids.push(id);
                }
            }
            adj.insert(id, ids);
        }
        Ok(adj)
    }

    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                Rc::ptr_eq(a, b) || sequences_equal(&a.borrow(), &b.borrow())
            }
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b) || sequences_equal(a, b),
            (Self::Dict(a), Self::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.entries.borrow(), b.entries.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).is_some_and(|other| value.equals(other)))
            }
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Self::Range(a), Self::Range(b)) => {
                a.len() == b.len()
                    && (a.is_empty() || (a.start == b.start && (a.len() == 1 || a.step == b.step)))
            }
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Module(a), Self::Module(b)) => a == b,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => a.identical(b),
            },
        }
    }

    /// Identity, as tested by `is`.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b),
            (Self::Instance(a), Self::Instance(b)) => Rc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::BoundMethod(a), Self::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Module(a), Self::Module(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering for `<`-style comparisons. `Ok(None)` means unordered (NaN).
    pub fn compare(&self, other: &Value, symbol: &str) -> Result<Option<Ordering>, ErrorKind> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(a.partial_cmp(&b));
        }
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Ok(Some(a.cmp(b))),
            (Self::List(a), Self::List(b)) => {
                compare_sequences(&a.borrow().clone(), &b.borrow().clone(), symbol)
            }
            (Self::Tuple(a), Self::Tuple(b)) => compare_sequences(a, b, symbol),
            _ => Err(ErrorKind::Type(format!(
                "'{symbol}' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Quoted form used inside containers and error messages.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new());
        out
    }

    fn write_repr(&self, out: &mut String, seen: &mut Vec<*const ()>) {
        match self {
            Self::Str(text) => out.push_str(&quote(text)),
            Self::List(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(ptr);
                out.push('[');
                write_items(out, items.borrow().iter(), seen);
                out.push(']');
                seen.pop();
            }
            Self::Tuple(items) => {
                out.push('(');
                write_items(out, items.iter(), seen);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Self::Dict(dict) => {
                let ptr = Rc::as_ptr(dict) as *const ();
                if seen.contains(&ptr) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(ptr);
                out.push('{');
                for (idx, (key, value)) in dict.entries.borrow().iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    key.to_value().write_repr(out, seen);
                    out.push_str(": ");
                    value.write_repr(out, seen);
                }
                out.push('}');
                seen.pop();
            }
            Self::Set(keys) => {
                let keys = keys.borrow();
                if keys.is_empty() {
                    out.push_str("set()");
                    return;
                }
                out.push('{');
                let values: Vec<Value> = keys.iter().map(Key::to_value).collect();
                write_items(out, values.iter(), seen);
                out.push('}');
            }
            Self::Exception(exception) => {
                out.push_str(exception.name);
                out.push('(');
                if !exception.message.is_empty() {
                    out.push_str(&quote(&exception.message));
                }
                out.push(')');
            }
            other => out.push_str(&other.to_string()),
        }
    }
}

fn write_items<'v>(
    out: &mut String,
    items: impl Iterator<Item = &'v Value>,
    seen: &mut Vec<*const ()>,
) {
    for (idx, item) in items.enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        item.write_repr(out, seen);
    }
}

pub fn sequence_limit(len: usize) -> ErrorKind {
    ErrorKind::Limit(format!(
        "sequence of {len} items exceeds the limit of {MAX_SEQUENCE_LEN}"
    ))
}

fn sequences_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
}

fn compare_sequences(
    a: &[Value],
    b: &[Value],
    symbol: &str,
) -> Result<Option<Ordering>, ErrorKind> {
    for (x, y) in a.iter().zip(b) {
        if !x.equals(y) {
            return x.compare(y, symbol);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// Single quotes unless the text contains one and no double quote.
fn quote(text: &str) -> String {
    let delimiter = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(delimiter);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

fn tree_node(
    value: &Value,
    path: &mut Vec<*const Instance>,
) -> Result<Option<TreeNode>, ErrorKind> {
    let instance = match value {
        Value::None => return Ok(None),
        Value::Instance(instance) => instance,
        other => {
            return Err(ErrorKind::Attribute(format!(
                "'{}' object has no attribute 'value'",
                other.type_name()
            )));
        }
    };
    let ptr = Rc::as_ptr(instance);
    if path.contains(&ptr) {
        return Err(ErrorKind::Value("tree contains a cycle".to_string()));
    }
    let element = instance
        .field("value")
        .or_else(|| instance.class.lookup("value"))
        .ok_or_else(|| {
            ErrorKind::Attribute(format!(
                "'{}' object has no attribute 'value'",
                instance.class.name
            ))
        })?
        .to_element();
    path.push(ptr);
    let left = tree_child(instance, "left", path)?;
    let right = tree_child(instance, "right", path)?;
    path.pop();
    Ok(Some(TreeNode {
        value: element,
        left: left.map(Box::new),
        right: right.map(Box::new),
    }))
}

fn tree_child(
    instance: &Instance,
    field: &str,
    path: &mut Vec<*const Instance>,
) -> Result<Option<TreeNode>, ErrorKind> {
    match instance.field(field) {
        Some(child) if child.truthy() => tree_node(&child, path),
        _ => Ok(None),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Number(value) => f.write_str(&format_number(*value)),
            Self::Str(text) => f.write_str(text),
            Self::Range(range) if range.step == 1 => {
                write!(f, "range({}, {})", range.start, range.stop)
            }
            Self::Range(range) => {
                write!(f, "range({}, {}, {})", range.start, range.stop, range.step)
            }
            Self::Instance(instance) => write!(f, "<{} object>", instance.class.name),
            Self::Class(class) => write!(f, "<class '{}'>", class.name),
            Self::Function(function) => write!(f, "<function {}>", function.def.name),
            Self::BoundMethod(bound) => match &bound.method {
                Method::User(function) => write!(f, "<bound method {}>", function.def.name),
                Method::Native(name) => write!(f, "<built-in method {name}>"),
            },
            Self::Builtin(builtin) => write!(f, "<built-in function {}>", builtin.name()),
            Self::Module(module) => write!(f, "<module '{}'>", module.name()),
            Self::Exception(exception) => f.write_str(&exception.message),
            Self::List(_) | Self::Tuple(_) | Self::Dict(_) | Self::Set(_) => {
                f.write_str(&self.repr())
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> Value {
        Value::list(values.iter().map(|v| Value::Number(*v)).collect())
    }

    #[test]
    fn display_matches_literal_syntax() {
        let value = Value::list(vec![
            Value::Number(1.0),
            Value::Str("it's".into()),
            Value::None,
            Value::tuple(vec![Value::Bool(true)]),
        ]);
        assert_eq!(value.to_string(), "[1, \"it's\", None, (True,)]");
        assert_eq!(Value::set(IndexSet::new()).to_string(), "set()");
    }

    #[test]
    fn self_containing_list_prints_ellipsis() {
        let value = numbers(&[1.0]);
        if let Value::List(items) = &value {
            items.borrow_mut().push(value.clone());
        }
        assert_eq!(value.repr(), "[1, [...]]");
        assert!(value.equals(&value.clone()));
    }

    #[test]
    fn range_iteration_stops_before_overflow() {
        let range =
            RangeValue::new(0, 9_000_000_000_000_000_000, 4_000_000_000_000_000_000).unwrap();
        assert_eq!(range.len(), 3);
        assert_eq!(range.iter().count(), 3);
        let near_max = RangeValue::new(i64::MAX - 2, i64::MAX, 5).unwrap();
        assert_eq!(near_max.iter().collect::<Vec<_>>(), [i64::MAX - 2]);
        let down = RangeValue::new(i64::MIN + 1, i64::MIN, -7).unwrap();
        assert_eq!(down.iter().count(), 1);
        assert!(RangeValue::new(0, 1, 0).is_err());
    }

    #[test]
    fn huge_ranges_are_not_materialised() {
        let range = Value::Range(RangeValue::new(0, i64::MAX, 1).unwrap());
        assert!(matches!(range.collect_items(), Err(ErrorKind::Limit(_))));
        assert_eq!(range.iterate().unwrap().take(3).count(), 3);
        assert!(RangeValue::new(0, 10, 3).unwrap().contains(9));
        assert!(!RangeValue::new(0, 10, 3).unwrap().contains(10));
    }

    #[test]
    fn keys_unify_numbers_and_keep_strings_apart() {
        assert_eq!(Value::Number(1.0).to_key().unwrap(), Key::Int(1));
        assert_eq!(Value::Bool(true).to_key().unwrap(), Key::Int(1));
        assert_ne!(Value::Str("1".into()).to_key().unwrap(), Key::Int(1));
        assert!(matches!(numbers(&[]).to_key(), Err(ErrorKind::Type(_))));
    }

    #[test]
    fn adjacency_keeps_key_types_distinct() {
        let mut entries = IndexMap::new();
        entries.insert(Key::Int(1), Value::list(vec![Value::Str("1".into())]));
        entries.insert(Key::Str("1".into()), Value::tuple(vec![Value::Number(1.0)]));
        entries.insert(Key::Int(2), Value::list(vec![Value::None]));
        let adj = Value::dict(entries).to_adjacency().unwrap();
        assert_eq!(adj.len(), 3);
        assert_eq!(adj[&NodeId::Int(1)], [NodeId::from("1")]);
        assert_eq!(adj[&NodeId::from("1")], [NodeId::Int(1)]);
        assert!(adj[&NodeId::Int(2)].is_empty());
    }

    #[test]
    fn adjacency_rejects_unhashable_neighbours_and_odd_keys() {
        let mut entries = IndexMap::new();
        entries.insert(Key::Int(1), Value::list(vec![numbers(&[2.0])]));
        assert!(matches!(
            Value::dict(entries).to_adjacency(),
            Err(ErrorKind::Type(_))
        ));
        let mut entries = IndexMap::new();
        entries.insert(Key::Float(1.5f64.to_bits()), numbers(&[]));
        assert!(Value::dict(entries).to_adjacency().is_err());
    }

    #[test]
    fn sequences_compare_lexicographically() {
        let a = numbers(&[1.0, 2.0]);
        let b = numbers(&[1.0, 3.0]);
        assert_eq!(a.compare(&b, "<").unwrap(), Some(Ordering::Less));
        assert_eq!(numbers(&[1.0]).compare(&a, "<").unwrap(), Some(Ordering::Less));
        assert!(a.compare(&Value::Str("x".into()), "<").is_err());
        assert_eq!(
            Value::Number(f64::NAN).compare(&Value::Number(1.0), "<").unwrap(),
            None
        );
    }

    #[test]
    fn non_integer_index_is_rejected() {
        assert!(Value::Number(1.5).as_int().is_err());
        assert_eq!(Value::Number(-2.0).as_int().unwrap(), -2);
        assert_eq!(Value::Bool(true).as_int().unwrap(), 1);
    }
}
