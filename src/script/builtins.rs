//! Importable modules, built-in functions and methods of the built-in
//! containers.

use std::cmp::Ordering;
use std::io::Write;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::draw::{
    DEFAULT_ARRAY_TITLE, DEFAULT_GRAPH_TITLE, DEFAULT_QUEUE_TITLE, DEFAULT_SEARCH_TITLE,
    DEFAULT_SORT_TITLE, DEFAULT_STACK_TITLE, DEFAULT_TREE_TITLE,
};

use super::error::{ErrorKind, ScriptError};
use super::eval::Evaluator;
use super::ops::{self, normalize_index};
use super::parser::BinOp;
use super::value::{
    Class, DictObject, Exception, Instance, Key, List, RangeValue, Value, sequence_limit,
    MAX_SEQUENCE_LEN,
};

/// The toolkit module. The documents import it under its package path
/// `DSA_Utils.utils`, which resolves to the same module.
pub const MODULE_NAME: &str = "dsviz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Toolkit,
    /// `DSA_Utils`, whose only member is the toolkit as `utils`.
    UtilsPackage,
    Collections,
    Math,
}

impl Module {
    pub fn find(name: &str) -> Option<Self> {
        match name {
            MODULE_NAME | "DSA_Utils.utils" => Some(Self::Toolkit),
            "DSA_Utils" => Some(Self::UtilsPackage),
            "collections" => Some(Self::Collections),
            "math" => Some(Self::Math),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Toolkit => MODULE_NAME,
            Self::UtilsPackage => "DSA_Utils",
            Self::Collections => "collections",
            Self::Math => "math",
        }
    }

    pub fn attr(self, name: &str) -> Option<Value> {
        self.exports()
            .into_iter()
            .find(|(export, _)| *export == name)
            .map(|(_, value)| value)
    }

    /// Names bound by `from <module> import *`.
    pub fn exports(self) -> Vec<(&'static str, Value)> {
        let builtins: &[Builtin] = match self {
            Self::Toolkit => &Builtin::TOOLKIT,
            Self::UtilsPackage => return vec![("utils", Value::Module(Self::Toolkit))],
            Self::Collections => &[Builtin::Deque, Builtin::DefaultDict],
            Self::Math => {
                return vec![
                    ("sqrt", Value::Builtin(Builtin::Sqrt)),
                    ("floor", Value::Builtin(Builtin::Floor)),
                    ("ceil", Value::Builtin(Builtin::Ceil)),
                    ("pi", Value::Number(std::f64::consts::PI)),
                    ("e", Value::Number(std::f64::consts::E)),
                    ("inf", Value::Number(f64::INFINITY)),
                ];
            }
        };
        builtins
            .iter()
            .map(|builtin| (builtin.name(), Value::Builtin(*builtin)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    DrawArray,
    DrawStack,
    DrawQueue,
    DrawSort,
    DrawSearch,
    DrawTree,
    DrawGraph,
    Node,
    Range,
    Len,
    Print,
    Enumerate,
    Zip,
    Min,
    Max,
    Sum,
    Abs,
    Round,
    Repr,
    Str,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Dict,
    Set,
    Sorted,
    Reversed,
    Isinstance,
    Getattr,
    Hasattr,
    Object,
    Deque,
    DefaultDict,
    Sqrt,
    Floor,
    Ceil,
    /// An exception type such as `ValueError`; calling it builds an exception.
    Exception(&'static str),
}

impl Builtin {
    pub const TOOLKIT: [Builtin; 8] = [
        Self::DrawArray,
        Self::DrawStack,
        Self::DrawQueue,
        Self::DrawSort,
        Self::DrawSearch,
        Self::DrawTree,
        Self::DrawGraph,
        Self::Node,
    ];

    /// Names visible in every snippet without an import.
    pub const PRELUDE: [Builtin; 33] = [
        Self::Range,
        Self::Len,
        Self::Print,
        Self::Enumerate,
        Self::Zip,
        Self::Min,
        Self::Max,
        Self::Sum,
        Self::Abs,
        Self::Round,
        Self::Repr,
        Self::Str,
        Self::Int,
        Self::Float,
        Self::Bool,
        Self::List,
        Self::Tuple,
        Self::Dict,
        Self::Set,
        Self::Sorted,
        Self::Reversed,
        Self::Isinstance,
        Self::Getattr,
        Self::Hasattr,
        Self::Object,
        Self::Exception("Exception"),
        Self::Exception("ValueError"),
        Self::Exception("IndexError"),
        Self::Exception("KeyError"),
        Self::Exception("TypeError"),
        Self::Exception("RuntimeError"),
        Self::Exception("AssertionError"),
        Self::Exception("ZeroDivisionError"),
    ];

    pub fn prelude(name: &str) -> Option<Self> {
        Self::PRELUDE
            .into_iter()
            .find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::DrawArray => "draw_array",
            Self::DrawStack => "draw_stack",
            Self::DrawQueue => "draw_queue",
            Self::DrawSort => "draw_sort",
            Self::DrawSearch => "draw_search",
            Self::DrawTree => "draw_tree",
            Self::DrawGraph => "draw_graph",
            Self::Node => "Node",
            Self::Range => "range",
            Self::Len => "len",
            Self::Print => "print",
            Self::Enumerate => "enumerate",
            Self::Zip => "zip",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Repr => "repr",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Dict => "dict",
            Self::Set => "set",
            Self::Sorted => "sorted",
            Self::Reversed => "reversed",
            Self::Isinstance => "isinstance",
            Self::Getattr => "getattr",
            Self::Hasattr => "hasattr",
            Self::Object => "object",
            Self::Deque => "deque",
            Self::DefaultDict => "defaultdict",
            Self::Sqrt => "sqrt",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Exception(name) => name,
        }
    }

    /// Parameter list for the builtins that bind arguments by name.
    fn signature(self) -> Signature {
        let (params, required): (&'static [&'static str], usize) = match self {
            Self::DrawArray => (&["values", "highlight_index", "title"], 1),
            Self::DrawStack | Self::DrawQueue | Self::DrawSort => (&["values", "title"], 1),
            Self::DrawSearch => (&["values", "index", "title"], 1),
            Self::DrawTree => (&["root", "title"], 1),
            Self::DrawGraph => (&["adj", "title"], 1),
            Self::Node => (&["value", "left", "right"], 1),
            Self::Range => (&["start", "stop", "step"], 1),
            Self::Enumerate | Self::Sum => (&["iterable", "start"], 1),
            Self::Round => (&["number", "ndigits"], 1),
            Self::Sorted => (&["iterable", "key", "reverse"], 1),
            Self::Isinstance => (&["obj", "classinfo"], 2),
            Self::Getattr => (&["obj", "name", "default"], 2),
            Self::Hasattr => (&["obj", "name"], 2),
            Self::Deque => (&["iterable", "maxlen"], 0),
            Self::DefaultDict => (&["default_factory"], 0),
            Self::Len | Self::Abs | Self::Repr | Self::Reversed => (&["obj"], 1),
            Self::Sqrt | Self::Floor | Self::Ceil => (&["x"], 1),
            Self::Str | Self::Int | Self::Float | Self::Bool => (&["x"], 0),
            Self::List | Self::Tuple | Self::Dict | Self::Set => (&["iterable"], 0),
            Self::Object
            | Self::Print
            | Self::Zip
            | Self::Min
            | Self::Max
            | Self::Exception(_) => (&[], 0),
        };
        Signature {
            name: self.name(),
            params,
            required,
        }
    }
}

/// Parameter list of a callable: names in order, the first `required` of
/// them mandatory.
struct Signature {
    name: &'static str,
    params: &'static [&'static str],
    required: usize,
}

/// Arguments matched to a [`Signature`], consumed in parameter order.
struct Args {
    slots: std::vec::IntoIter<Option<Value>>,
}

impl Args {
    fn bind(
        signature: &Signature,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Self, ErrorKind> {
        let Signature {
            name,
            params,
            required,
        } = *signature;
        if args.len() > params.len() {
            return Err(ErrorKind::Type(format!(
                "{name}() takes at most {} positional arguments but {} were given",
                params.len(),
                args.len()
            )));
        }
        let mut slots: Vec<Option<Value>> = vec![None; params.len()];
        for (slot, arg) in slots.iter_mut().zip(args) {
            *slot = Some(arg);
        }
        for (keyword, value) in kwargs {
            let position = params
                .iter()
                .position(|param| *param == keyword)
                .ok_or_else(|| unexpected_keyword(name, &keyword))?;
            if slots[position].is_some() {
                return Err(ErrorKind::Type(format!(
                    "{name}() got multiple values for argument '{keyword}'"
                )));
            }
            slots[position] = Some(value);
        }
        if let Some(missing) = (0..required).find(|&i| slots[i].is_none()) {
            return Err(ErrorKind::Type(format!(
                "{name}() missing required argument: '{}'",
                params[missing]
            )));
        }
        Ok(Self {
            slots: slots.into_iter(),
        })
    }

    /// The next argument, `None` when it was not given.
    fn next(&mut self) -> Value {
        self.next_given().unwrap_or(Value::None)
    }

    fn next_given(&mut self) -> Option<Value> {
        self.slots.next().flatten()
    }
}

fn unexpected_keyword(function: &str, name: &str) -> ErrorKind {
    ErrorKind::Type(format!(
        "{function}() got an unexpected keyword argument '{name}'"
    ))
}

fn optional_int(value: Value) -> Result<Option<i64>, ErrorKind> {
    if value.is_none() {
        Ok(None)
    } else {
        value.as_int().map(Some)
    }
}

fn title_or(value: Value, default: &str) -> String {
    match value {
        Value::None => default.to_string(),
        other => other.to_string(),
    }
}

fn number_arg(function: &str, value: &Value) -> Result<f64, ErrorKind> {
    value.as_number().ok_or_else(|| {
        ErrorKind::Type(format!(
            "{function}() argument must be a number, not '{}'",
            value.type_name()
        ))
    })
}

fn str_arg(method: &str, value: Option<&Value>) -> Result<String, ErrorKind> {
    match value {
        Some(Value::Str(text)) => Ok(text.clone()),
        Some(other) => Err(ErrorKind::Type(format!(
            "{method}() argument must be str, not '{}'",
            other.type_name()
        ))),
        None => Err(ErrorKind::Type(format!("{method}() missing required argument"))),
    }
}

fn arity(method: &str, args: &[Value], min: usize, max: usize) -> Result<(), ErrorKind> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{min} to {max}")
    };
    Err(ErrorKind::Type(format!(
        "{method}() takes {expected} arguments ({} given)",
        args.len()
    )))
}

/// `(key, value)` pairs from a dict or an iterable of pairs.
fn pairs(value: &Value) -> Result<Vec<(Key, Value)>, ErrorKind> {
    if let Value::Dict(dict) = value {
        return Ok(dict
            .entries
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect());
    }
    let mut out = Vec::new();
    for (idx, item) in value.collect_items()?.into_iter().enumerate() {
        let pair = item.collect_items()?;
        let [key, value] = <[Value; 2]>::try_from(pair).map_err(|pair| {
            ErrorKind::Value(format!(
                "dictionary update sequence element #{idx} has length {}; 2 is required",
                pair.len()
            ))
        })?;
        out.push((key.to_key()?, value));
    }
    Ok(out)
}

fn parse_int(text: &str) -> Result<f64, ErrorKind> {
    text.trim()
        .replace('_', "")
        .parse::<i64>()
        .map(|value| value as f64)
        .map_err(|_| {
            ErrorKind::Value(format!(
                "invalid literal for int() with base 10: {}",
                Value::Str(text.to_string()).repr()
            ))
        })
}

fn parse_float(text: &str) -> Result<f64, ErrorKind> {
    let trimmed = text.trim().to_ascii_lowercase();
    let parsed = match trimmed.trim_start_matches(['+', '-']) {
        "inf" | "infinity" | "nan" => trimmed.parse::<f64>().ok(),
        _ => trimmed.parse::<f64>().ok().filter(|value| value.is_finite()),
    };
    parsed.ok_or_else(|| {
        ErrorKind::Value(format!(
            "could not convert string to float: {}",
            Value::Str(text.to_string()).repr()
        ))
    })
}

const LIST_METHODS: [&str; 13] = [
    "append",
    "pop",
    "insert",
    "extend",
    "remove",
    "index",
    "count",
    "copy",
    "reverse",
    "sort",
    "clear",
    "popleft",
    "appendleft",
];
const TUPLE_METHODS: [&str; 2] = ["index", "count"];
const DICT_METHODS: [&str; 9] = [
    "keys",
    "values",
    "items",
    "get",
    "pop",
    "setdefault",
    "update",
    "copy",
    "clear",
];
const SET_METHODS: [&str; 5] = ["add", "remove", "discard", "copy", "clear"];
const STR_METHODS: [&str; 9] = [
    "join",
    "split",
    "upper",
    "lower",
    "strip",
    "startswith",
    "endswith",
    "replace",
    "isdigit",
];

/// Looks up a method of a built-in container by name.
pub(super) fn native_method(value: &Value, name: &str) -> Option<&'static str> {
    let methods: &[&'static str] = match value {
        Value::List(_) => &LIST_METHODS,
        Value::Tuple(_) => &TUPLE_METHODS,
        Value::Dict(_) => &DICT_METHODS,
        Value::Set(_) => &SET_METHODS,
        Value::Str(_) => &STR_METHODS,
        _ => return None,
    };
    methods.iter().copied().find(|method| *method == name)
}

impl Evaluator<'_, '_> {
    pub(super) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        match builtin {
            Builtin::Print => return self.print(args, kwargs),
            Builtin::Min => return self.extremum("min", args, kwargs, Ordering::Less),
            Builtin::Max => return self.extremum("max", args, kwargs, Ordering::Greater),
            Builtin::Zip => return zip(args, kwargs).map_err(ScriptError::from),
            Builtin::Exception(name) => {
                if let Some((keyword, _)) = kwargs.first() {
                    return Err(unexpected_keyword(name, keyword).into());
                }
                let mut parts = Vec::with_capacity(args.len());
                for arg in &args {
                    parts.push(self.display(arg)?);
                }
                return Ok(Value::Exception(Rc::new(Exception {
                    name,
                    message: parts.join(", "),
                })));
            }
            _ => {}
        }

        let mut args = Args::bind(&builtin.signature(), args, kwargs)?;
        if Builtin::TOOLKIT.contains(&builtin) {
            debug!(function = builtin.name(); "Calling toolkit function");
        }
        let value = match builtin {
            Builtin::DrawArray => {
                let values = args.next().to_elements()?;
                let highlight = optional_int(args.next())?;
                let title = title_or(args.next(), DEFAULT_ARRAY_TITLE);
                self.toolkit.draw_array(&values, highlight, &title)?;
                Value::None
            }
            Builtin::DrawStack => {
                let values = args.next().to_elements()?;
                let title = title_or(args.next(), DEFAULT_STACK_TITLE);
                self.toolkit.draw_stack(&values, &title)?;
                Value::None
            }
            Builtin::DrawQueue => {
                let values = args.next().to_elements()?;
                let title = title_or(args.next(), DEFAULT_QUEUE_TITLE);
                self.toolkit.draw_queue(&values, &title)?;
                Value::None
            }
            Builtin::DrawSort => {
                let values = args.next().to_elements()?;
                let title = title_or(args.next(), DEFAULT_SORT_TITLE);
                self.toolkit.draw_sort(&values, &title)?;
                Value::None
            }
            Builtin::DrawSearch => {
                let values = args.next().to_elements()?;
                let index = optional_int(args.next())?;
                let title = title_or(args.next(), DEFAULT_SEARCH_TITLE);
                self.toolkit.draw_search(&values, index, &title)?;
                Value::None
            }
            Builtin::DrawTree => {
                let root = args.next().to_tree()?;
                let title = title_or(args.next(), DEFAULT_TREE_TITLE);
                self.toolkit.draw_tree(root.as_ref(), &title)?;
                Value::None
            }
            Builtin::DrawGraph => {
                let adj = args.next().to_adjacency()?;
                let title = title_or(args.next(), DEFAULT_GRAPH_TITLE);
                self.toolkit.draw_graph(&adj, &title)?;
                Value::None
            }
            Builtin::Node => {
                let node = Instance::new(self.node_class.clone());
                {
                    let mut fields = node.fields.borrow_mut();
                    fields.insert("value".to_string(), args.next());
                    fields.insert("left".to_string(), args.next());
                    fields.insert("right".to_string(), args.next());
                }
                Value::Instance(Rc::new(node))
            }
            Builtin::Range => {
                let first = args.next().as_int()?;
                let (start, stop, step) = match (args.next(), args.next()) {
                    (Value::None, Value::None) => (0, first, 1),
                    (stop, Value::None) => (first, stop.as_int()?, 1),
                    (stop, step) => (first, stop.as_int()?, step.as_int()?),
                };
                Value::Range(RangeValue::new(start, stop, step)?)
            }
            Builtin::Len => Value::Number(ops::length(&args.next())? as f64),
            Builtin::Enumerate => {
                let items = args.next().collect_items()?;
                let start = args.next_given().map_or(Ok(0), |start| start.as_int())?;
                let pairs = items
                    .into_iter()
                    .enumerate()
                    .map(|(idx, item)| {
                        let position = Value::Number((start as f64) + idx as f64);
                        Value::tuple(vec![position, item])
                    })
                    .collect();
                Value::list(pairs)
            }
            Builtin::Sum => {
                let items = args.next().iterate()?;
                let mut total = args.next_given().unwrap_or(Value::Number(0.0));
                for item in items {
                    self.tick()?;
                    total = ops::binary(&total, BinOp::Add, &item)?;
                }
                total
            }
            Builtin::Abs => {
                let value = args.next();
                Value::Number(number_arg("abs", &value)?.abs())
            }
            Builtin::Round => {
                let value = args.next();
                let number = number_arg("round", &value)?;
                match optional_int(args.next())? {
                    None => Value::Number(number.round_ties_even()),
                    Some(digits) => {
                        let scale = 10f64.powi(digits.clamp(-308, 308) as i32);
                        Value::Number((number * scale).round_ties_even() / scale)
                    }
                }
            }
            Builtin::Repr => {
                let value = args.next();
                Value::Str(self.repr_of(&value)?)
            }
            Builtin::Str => match args.next_given() {
                Some(value) => Value::Str(self.display(&value)?),
                None => Value::Str(String::new()),
            },
            Builtin::Int => match args.next_given() {
                None => Value::Number(0.0),
                Some(Value::Str(text)) => Value::Number(parse_int(&text)?),
                Some(value) => {
                    let number = number_arg("int", &value)?;
                    if !number.is_finite() {
                        return Err(ErrorKind::Value(format!(
                            "cannot convert float {} to integer",
                            value
                        ))
                        .into());
                    }
                    Value::Number(number.trunc())
                }
            },
            Builtin::Float => match args.next_given() {
                None => Value::Number(0.0),
                Some(Value::Str(text)) => Value::Number(parse_float(&text)?),
                Some(value) => Value::Number(number_arg("float", &value)?),
            },
            Builtin::Bool => Value::Bool(args.next_given().is_some_and(|value| value.truthy())),
            Builtin::List => match args.next_given() {
                Some(iterable) => Value::list(iterable.collect_items()?),
                None => Value::list(Vec::new()),
            },
            Builtin::Tuple => match args.next_given() {
                Some(iterable) => Value::tuple(iterable.collect_items()?),
                None => Value::tuple(Vec::new()),
            },
            Builtin::Dict => match args.next_given() {
                Some(source) => Value::dict(pairs(&source)?.into_iter().collect()),
                None => Value::dict(IndexMap::new()),
            },
            Builtin::Set => {
                let mut keys = IndexSet::new();
                if let Some(iterable) = args.next_given() {
                    for item in iterable.collect_items()? {
                        keys.insert(item.to_key()?);
                    }
                }
                Value::set(keys)
            }
            Builtin::Sorted => {
                let mut items = args.next().collect_items()?;
                let key = args.next();
                let reverse = args.next().truthy();
                self.sort_values(&mut items, &key, reverse)?;
                Value::list(items)
            }
            Builtin::Reversed => {
                let mut items = args.next().collect_items()?;
                items.reverse();
                Value::list(items)
            }
            Builtin::Isinstance => {
                let value = args.next();
                let classinfo = args.next();
                Value::Bool(self.is_instance(&value, &classinfo)?)
            }
            Builtin::Getattr => {
                let obj = args.next();
                let name = str_arg("getattr", Some(&args.next()))?;
                match (ops::get_attr(&obj, &name), args.next_given()) {
                    (Ok(value), _) => value,
                    (Err(ErrorKind::Attribute(_)), Some(default)) => default,
                    (Err(err), _) => return Err(err.into()),
                }
            }
            Builtin::Hasattr => {
                let obj = args.next();
                let name = str_arg("hasattr", Some(&args.next()))?;
                Value::Bool(ops::get_attr(&obj, &name).is_ok())
            }
            Builtin::Object => {
                let class = Rc::new(Class::new("object"));
                Value::Instance(Rc::new(Instance::new(class)))
            }
            Builtin::Deque => {
                let items = match args.next_given() {
                    Some(iterable) => iterable.collect_items()?,
                    None => Vec::new(),
                };
                if !args.next().is_none() {
                    return Err(ErrorKind::Value(
                        "deque(maxlen=...) is not supported in snippets".to_string(),
                    )
                    .into());
                }
                Value::list(items)
            }
            Builtin::DefaultDict => {
                let factory = args.next();
                let factory = match factory {
                    Value::None => None,
                    Value::Builtin(_) | Value::Function(_) | Value::Class(_) => Some(factory),
                    other => {
                        return Err(ErrorKind::Type(format!(
                            "first argument must be callable or None, not '{}'",
                            other.type_name()
                        ))
                        .into());
                    }
                };
                let mut dict = DictObject::new(IndexMap::new());
                dict.default_factory = factory;
                Value::Dict(Rc::new(dict))
            }
            Builtin::Sqrt => {
                let x = number_arg("sqrt", &args.next())?;
                if x < 0.0 {
                    return Err(ErrorKind::Value("math domain error".to_string()).into());
                }
                Value::Number(x.sqrt())
            }
            Builtin::Floor => Value::Number(number_arg("floor", &args.next())?.floor()),
            Builtin::Ceil => Value::Number(number_arg("ceil", &args.next())?.ceil()),
            Builtin::Print
            | Builtin::Min
            | Builtin::Max
            | Builtin::Zip
            | Builtin::Exception(_) => Value::None,
        };
        Ok(value)
    }

    fn print(
        &mut self,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        let mut sep = " ".to_string();
        let mut end = "\n".to_string();
        let mut flush = false;
        for (keyword, value) in kwargs {
            match (keyword.as_str(), value) {
                ("sep", Value::None) | ("end", Value::None) => {}
                ("sep", Value::Str(text)) => sep = text,
                ("end", Value::Str(text)) => end = text,
                ("flush", value) => flush = value.truthy(),
                ("sep" | "end", other) => {
                    return Err(ErrorKind::Type(format!(
                        "{keyword} must be None or a string, not {}",
                        other.type_name()
                    ))
                    .into());
                }
                (other, _) => return Err(unexpected_keyword("print", other).into()),
            }
        }
        let mut parts = Vec::with_capacity(args.len());
        for arg in &args {
            parts.push(self.display(arg)?);
        }
        let mut stdout = std::io::stdout().lock();
        let written = write!(stdout, "{}{end}", parts.join(&sep));
        if written.is_ok() && flush {
            let _ = stdout.flush();
        }
        Ok(Value::None)
    }

    /// `min` and `max`: a single iterable or several values, with optional
    /// `key` and `default`.
    fn extremum(
        &mut self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        want: Ordering,
    ) -> Result<Value, ScriptError> {
        let mut key = Value::None;
        let mut default = None;
        for (keyword, value) in kwargs {
            match keyword.as_str() {
                "key" => key = value,
                "default" => default = Some(value),
                other => return Err(unexpected_keyword(name, other).into()),
            }
        }
        let items = match <[Value; 1]>::try_from(args) {
            Ok([iterable]) => iterable.collect_items()?,
            Err(args) if args.is_empty() => {
                return Err(ErrorKind::Type(format!(
                    "{name} expected at least 1 argument, got 0"
                ))
                .into());
            }
            Err(args) => args,
        };
        let symbol = if want == Ordering::Less { "<" } else { ">" };
        let mut best: Option<(Value, Value)> = None;
        for item in items {
            let rank = self.sort_key(&key, &item)?;
            let better = match &best {
                None => true,
                Some((_, best_rank)) => rank.compare(best_rank, symbol)? == Some(want),
            };
            if better {
                best = Some((item, rank));
            }
        }
        match (best, default) {
            (Some((item, _)), _) => Ok(item),
            (None, Some(default)) => Ok(default),
            (None, None) => {
                Err(ErrorKind::Value(format!("{name}() arg is an empty sequence")).into())
            }
        }
    }

    fn sort_key(&mut self, key: &Value, item: &Value) -> Result<Value, ScriptError> {
        if key.is_none() {
            Ok(item.clone())
        } else {
            self.call_value(key, vec![item.clone()], Vec::new())
        }
    }

    /// Stable sort; with `reverse` equal items keep their order.
    pub(super) fn sort_values(
        &mut self,
        items: &mut Vec<Value>,
        key: &Value,
        reverse: bool,
    ) -> Result<(), ScriptError> {
        let mut keys = Vec::with_capacity(items.len());
        for item in items.iter() {
            keys.push(self.sort_key(key, item)?);
        }
        let mut order: Vec<usize> = (0..items.len()).collect();
        let mut failure = None;
        order.sort_by(|&a, &b| {
            if failure.is_some() {
                return Ordering::Equal;
            }
            match keys[a].compare(&keys[b], "<") {
                Ok(ordering) => {
                    let ordering = ordering.unwrap_or(Ordering::Equal);
                    if reverse { ordering.reverse() } else { ordering }
                }
                Err(err) => {
                    failure = Some(err);
                    Ordering::Equal
                }
            }
        });
        if let Some(err) = failure {
            return Err(err.into());
        }
        let sorted = order.into_iter().map(|idx| items[idx].clone()).collect();
        *items = sorted;
        Ok(())
    }

    fn is_instance(&self, value: &Value, classinfo: &Value) -> Result<bool, ErrorKind> {
        let builtin = match classinfo {
            Value::Tuple(options) => {
                for option in options.iter() {
                    if self.is_instance(value, option)? {
                        return Ok(true);
                    }
                }
                return Ok(false);
            }
            Value::Class(class) => {
                return Ok(matches!(value, Value::Instance(instance)
                    if instance.class.is_subclass_of(class)));
            }
            Value::Builtin(builtin) => *builtin,
            other => {
                return Err(ErrorKind::Type(format!(
                    "isinstance() arg 2 must be a type or tuple of types, not '{}'",
                    other.type_name()
                )));
            }
        };
        Ok(match builtin {
            Builtin::Int => match value {
                Value::Bool(_) => true,
                Value::Number(number) => number.fract() == 0.0,
                _ => false,
            },
            // Snippets have a single numeric type.
            Builtin::Float => matches!(value, Value::Number(_)),
            Builtin::Bool => matches!(value, Value::Bool(_)),
            Builtin::Str => matches!(value, Value::Str(_)),
            Builtin::List | Builtin::Deque => matches!(value, Value::List(_)),
            Builtin::Tuple => matches!(value, Value::Tuple(_)),
            Builtin::Dict => matches!(value, Value::Dict(_)),
            Builtin::DefaultDict => {
                matches!(value, Value::Dict(dict) if dict.default_factory.is_some())
            }
            Builtin::Set => matches!(value, Value::Set(_)),
            Builtin::Range => matches!(value, Value::Range(_)),
            Builtin::Object => true,
            Builtin::Node => matches!(value, Value::Instance(instance)
                if Rc::ptr_eq(&instance.class, &self.node_class)),
            Builtin::Exception(name) => matches!(value, Value::Exception(exception)
                if name == "Exception" || exception.name == name),
            other => {
                return Err(ErrorKind::Type(format!(
                    "isinstance() arg 2 must be a type, not '{}'",
                    other.name()
                )));
            }
        })
    }

    pub(super) fn call_native_method(
        &mut self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        if let (Value::List(items), "sort") = (receiver, method) {
            arity("sort", &args, 0, 0)?;
            let mut key = Value::None;
            let mut reverse = false;
            for (keyword, value) in kwargs {
                match keyword.as_str() {
                    "key" => key = value,
                    "reverse" => reverse = value.truthy(),
                    other => return Err(unexpected_keyword("sort", other).into()),
                }
            }
            let mut sorted = items.borrow().clone();
            self.sort_values(&mut sorted, &key, reverse)?;
            *items.borrow_mut() = sorted;
            return Ok(Value::None);
        }
        if !kwargs.is_empty() {
            return Err(ErrorKind::Type(format!("{method}() takes no keyword arguments")).into());
        }
        let result = match receiver {
            Value::List(items) => list_method(items, method, &args),
            Value::Tuple(items) => sequence_method(items, method, &args, "tuple"),
            Value::Dict(dict) => dict_method(dict, method, &args),
            Value::Set(keys) => set_method(keys, method, &args),
            Value::Str(text) => str_method(text, method, &args),
            other => Err(ops::no_attribute(other, method)),
        };
        Ok(result?)
    }
}

fn zip(args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, ErrorKind> {
    if let Some((keyword, _)) = kwargs.first() {
        return Err(unexpected_keyword("zip", keyword));
    }
    let columns = args
        .iter()
        .map(Value::collect_items)
        .collect::<Result<Vec<_>, _>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    Ok(Value::list(
        (0..rows)
            .map(|row| Value::tuple(columns.iter().map(|column| column[row].clone()).collect()))
            .collect(),
    ))
}

/// `index` and `count`, shared by lists and tuples.
fn sequence_method(
    items: &[Value],
    method: &str,
    args: &[Value],
    kind: &str,
) -> Result<Value, ErrorKind> {
    arity(method, args, 1, 1)?;
    let needle = &args[0];
    match method {
        "count" => Ok(Value::Number(
            items.iter().filter(|item| item.equals(needle)).count() as f64,
        )),
        "index" => items
            .iter()
            .position(|item| item.equals(needle))
            .map(|idx| Value::Number(idx as f64))
            .ok_or_else(|| ErrorKind::Value(format!("{} is not in {kind}", needle.repr()))),
        _ => Err(ops::no_attribute(&Value::tuple(Vec::new()), method)),
    }
}

fn list_method(items: &List, method: &str, args: &[Value]) -> Result<Value, ErrorKind> {
    match method {
        "append" | "appendleft" => {
            arity(method, args, 1, 1)?;
            let len = items.borrow().len();
            if len >= MAX_SEQUENCE_LEN {
                return Err(sequence_limit(len + 1));
            }
            if method == "append" {
                items.borrow_mut().push(args[0].clone());
            } else {
                items.borrow_mut().insert(0, args[0].clone());
            }
            Ok(Value::None)
        }
        "pop" => {
            arity(method, args, 0, 1)?;
            let len = items.borrow().len();
            if len == 0 {
                return Err(ErrorKind::Index("pop from empty list".to_string()));
            }
            let position = match args.first() {
                Some(index) => normalize_index(index, len, "pop")?,
                None => len - 1,
            };
            Ok(items.borrow_mut().remove(position))
        }
        "popleft" => {
            arity(method, args, 0, 0)?;
            if items.borrow().is_empty() {
                return Err(ErrorKind::Index("pop from an empty deque".to_string()));
            }
            Ok(items.borrow_mut().remove(0))
        }
        "insert" => {
            arity(method, args, 2, 2)?;
            let len = items.borrow().len() as i64;
            let mut index = args[0].as_int()?;
            if index < 0 {
                index = index.saturating_add(len);
            }
            let index = index.clamp(0, len) as usize;
            items.borrow_mut().insert(index, args[1].clone());
            Ok(Value::None)
        }
        "extend" => {
            arity(method, args, 1, 1)?;
            let extra = args[0].collect_items()?;
            let len = items.borrow().len();
            if len + extra.len() > MAX_SEQUENCE_LEN {
                return Err(sequence_limit(len + extra.len()));
            }
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "remove" => {
            arity(method, args, 1, 1)?;
            let position = items.borrow().iter().position(|item| item.equals(&args[0]));
            let position = position.ok_or_else(|| {
                ErrorKind::Value("list.remove(x): x not in list".to_string())
            })?;
            items.borrow_mut().remove(position);
            Ok(Value::None)
        }
        "index" | "count" => {
            let snapshot = items.borrow().clone();
            sequence_method(&snapshot, method, args, "list")
        }
        "copy" => {
            arity(method, args, 0, 0)?;
            Ok(Value::list(items.borrow().clone()))
        }
        "reverse" => {
            arity(method, args, 0, 0)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "clear" => {
            arity(method, args, 0, 0)?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => Err(ops::no_attribute(&Value::List(items.clone()), method)),
    }
}

fn dict_method(dict: &Rc<DictObject>, method: &str, args: &[Value]) -> Result<Value, ErrorKind> {
    match method {
        "keys" | "values" | "items" => {
            arity(method, args, 0, 0)?;
            let entries = dict.entries.borrow();
            let listed = entries
                .iter()
                .map(|(key, value)| match method {
                    "keys" => key.to_value(),
                    "values" => value.clone(),
                    _ => Value::tuple(vec![key.to_value(), value.clone()]),
                })
                .collect();
            Ok(Value::list(listed))
        }
        "get" => {
            arity(method, args, 1, 2)?;
            let key = args[0].to_key()?;
            let found = dict.entries.borrow().get(&key).cloned();
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }
        "pop" => {
            arity(method, args, 1, 2)?;
            let key = args[0].to_key()?;
            let removed = dict.entries.borrow_mut().shift_remove(&key);
            removed
                .or_else(|| args.get(1).cloned())
                .ok_or_else(|| ErrorKind::Key(args[0].repr()))
        }
        "setdefault" => {
            arity(method, args, 1, 2)?;
            let key = args[0].to_key()?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            Ok(dict.entries.borrow_mut().entry(key).or_insert(default).clone())
        }
        "update" => {
            arity(method, args, 1, 1)?;
            let extra = pairs(&args[0])?;
            dict.entries.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "copy" => {
            arity(method, args, 0, 0)?;
            Ok(Value::dict(dict.entries.borrow().clone()))
        }
        "clear" => {
            arity(method, args, 0, 0)?;
            dict.entries.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => Err(ops::no_attribute(&Value::Dict(dict.clone()), method)),
    }
}

fn set_method(
    keys: &Rc<std::cell::RefCell<IndexSet<Key>>>,
    method: &str,
    args: &[Value],
) -> Result<Value, ErrorKind> {
    match method {
        "add" | "remove" | "discard" => {
            arity(method, args, 1, 1)?;
            let key = args[0].to_key()?;
            if method == "add" {
                keys.borrow_mut().insert(key);
                return Ok(Value::None);
            }
            let removed = keys.borrow_mut().shift_remove(&key);
            if !removed && method == "remove" {
                return Err(ErrorKind::Key(args[0].repr()));
            }
            Ok(Value::None)
        }
        "copy" => {
            arity(method, args, 0, 0)?;
            Ok(Value::set(keys.borrow().clone()))
        }
        "clear" => {
            arity(method, args, 0, 0)?;
            keys.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => Err(ops::no_attribute(&Value::Set(keys.clone()), method)),
    }
}

fn str_method(text: &str, method: &str, args: &[Value]) -> Result<Value, ErrorKind> {
    match method {
        "join" => {
            arity(method, args, 1, 1)?;
            let mut parts = Vec::new();
            for (idx, item) in args[0].collect_items()?.into_iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(ErrorKind::Type(format!(
                            "sequence item {idx}: expected str instance, {} found",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::Str(parts.join(text)))
        }
        "split" => {
            arity(method, args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => text
                    .split_whitespace()
                    .map(|part| Value::Str(part.to_string()))
                    .collect(),
                Some(separator) => {
                    let separator = str_arg(method, Some(separator))?;
                    if separator.is_empty() {
                        return Err(ErrorKind::Value("empty separator".to_string()));
                    }
                    text.split(separator.as_str())
                        .map(|part| Value::Str(part.to_string()))
                        .collect()
                }
            };
            Ok(Value::list(parts))
        }
        "upper" | "lower" => {
            arity(method, args, 0, 0)?;
            Ok(Value::Str(if method == "upper" {
                text.to_uppercase()
            } else {
                text.to_lowercase()
            }))
        }
        "strip" => {
            arity(method, args, 0, 1)?;
            Ok(Value::Str(match args.first() {
                None | Some(Value::None) => text.trim().to_string(),
                Some(chars) => {
                    let chars = str_arg(method, Some(chars))?;
                    text.trim_matches(|c| chars.contains(c)).to_string()
                }
            }))
        }
        "startswith" | "endswith" => {
            arity(method, args, 1, 1)?;
            let affix = str_arg(method, args.first())?;
            Ok(Value::Bool(if method == "startswith" {
                text.starts_with(affix.as_str())
            } else {
                text.ends_with(affix.as_str())
            }))
        }
        "replace" => {
            arity(method, args, 2, 2)?;
            let old = str_arg(method, args.first())?;
            let new = str_arg(method, args.get(1))?;
            Ok(Value::Str(text.replace(old.as_str(), &new)))
        }
        "isdigit" => {
            arity(method, args, 0, 0)?;
            Ok(Value::Bool(
                !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()),
            ))
        }
        _ => Err(ops::no_attribute(&Value::Str(text.to_string()), method)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> List {
        Rc::new(std::cell::RefCell::new(
            values.iter().copied().map(Value::Number).collect(),
        ))
    }

    #[test]
    fn modules_resolve_by_path() {
        assert_eq!(Module::find("DSA_Utils.utils"), Some(Module::Toolkit));
        assert_eq!(Module::find(MODULE_NAME), Some(Module::Toolkit));
        assert!(Module::find("matplotlib").is_none());
        assert!(matches!(
            Module::UtilsPackage.attr("utils"),
            Some(Value::Module(Module::Toolkit))
        ));
        assert!(Module::Toolkit.attr("draw_heap").is_none());
        assert_eq!(Module::Toolkit.exports().len(), Builtin::TOOLKIT.len());
    }

    #[test]
    fn toolkit_names_are_not_in_the_prelude() {
        for builtin in Builtin::TOOLKIT {
            assert!(Builtin::prelude(builtin.name()).is_none());
        }
        assert_eq!(Builtin::prelude("len"), Some(Builtin::Len));
        assert_eq!(
            Builtin::prelude("ValueError"),
            Some(Builtin::Exception("ValueError"))
        );
    }

    #[test]
    fn binding_reports_missing_and_duplicate_arguments() {
        let signature = Builtin::DrawArray.signature();
        let err = Args::bind(&signature, Vec::new(), Vec::new()).err().unwrap();
        assert!(err.to_string().contains("missing required argument: 'values'"));
        let kwargs = vec![("values".to_string(), Value::None)];
        let err = Args::bind(&signature, vec![Value::None], kwargs).err().unwrap();
        assert!(err.to_string().contains("multiple values"));
        let mut args = Args::bind(&signature, vec![Value::Number(1.0)], Vec::new()).unwrap();
        assert_eq!(args.next().to_string(), "1");
        assert!(args.next_given().is_none());
        assert!(args.next().is_none());
    }

    #[test]
    fn list_methods_mutate_in_place() {
        let items = numbers(&[3.0, 1.0]);
        list_method(&items, "append", &[Value::Number(2.0)]).unwrap();
        list_method(&items, "insert", &[Value::Number(-1.0), Value::Number(9.0)]).unwrap();
        assert_eq!(Value::List(items.clone()).to_string(), "[3, 1, 9, 2]");
        let last = list_method(&items, "pop", &[]).unwrap();
        assert_eq!(last.to_string(), "2");
        let first = list_method(&items, "popleft", &[]).unwrap();
        assert_eq!(first.to_string(), "3");
        assert!(list_method(&items, "remove", &[Value::Number(7.0)]).is_err());
        let empty = numbers(&[]);
        let err = list_method(&empty, "pop", &[]).unwrap_err();
        assert_eq!(err.to_string(), "index error: pop from empty list");
    }

    #[test]
    fn dict_methods() {
        let dict = Rc::new(DictObject::new(IndexMap::new()));
        let key = Value::Str("a".into());
        dict_method(&dict, "setdefault", &[key.clone(), Value::Number(1.0)]).unwrap();
        let got = dict_method(&dict, "get", &[key.clone()]).unwrap();
        assert_eq!(got.to_string(), "1");
        let missing = dict_method(&dict, "get", &[Value::Str("z".into())]).unwrap();
        assert!(missing.is_none());
        let items = dict_method(&dict, "items", &[]).unwrap();
        assert_eq!(items.to_string(), "[('a', 1)]");
        assert!(dict_method(&dict, "pop", &[Value::Str("z".into())]).is_err());
    }

    #[test]
    fn str_methods() {
        let words = Value::list(vec![Value::Str("a".into()), Value::Str("b".into())]);
        assert_eq!(str_method("-", "join", &[words]).unwrap().to_string(), "a-b");
        let split = str_method(" x  y ", "split", &[]).unwrap();
        assert_eq!(split.to_string(), "['x', 'y']");
        assert!(str_method("a", "split", &[Value::Str(String::new())]).is_err());
        let bad = Value::list(vec![Value::Number(1.0)]);
        assert!(str_method("-", "join", &[bad]).is_err());
        assert!(str_method("42", "isdigit", &[]).unwrap().truthy());
    }

    #[test]
    fn numeric_parsing() {
        assert_eq!(parse_int(" 42 ").unwrap(), 42.0);
        assert!(parse_int("4.2").is_err());
        assert_eq!(parse_float("inf").unwrap(), f64::INFINITY);
        assert!(parse_float("1e999").is_err());
    }
}
