use std::collections::HashMap;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use log::trace;

use crate::draw::Toolkit;

use super::builtins::{Builtin, Module};
use super::error::{ErrorKind, ScriptError};
use super::ops;
use super::parser::{
    BinOp, BoolOp, Comprehension, Expr, FPart, FunctionDef, ImportNames, Pattern, Stmt,
    StmtKind, Target,
};
use super::value::{Class, Function, Instance, Method, Scope, Value};

/// Statements, loop iterations and comprehension items one snippet may run.
pub const MAX_STEPS: u64 = 10_000_000;
/// Nested function calls one snippet may make.
pub const MAX_CALL_DEPTH: usize = 100;

/// How a block finished.
pub enum Flow {
    Next,
    Break,
    Continue,
    Return(Value),
}

struct Frame {
    scope: Rc<Scope>,
    /// Class bodies do not enclose the functions defined in them.
    class_body: bool,
}

/// Runs parsed snippets against a [`Toolkit`]. Each evaluator owns its own
/// globals, so separate snippets never see each other's names.
pub struct Evaluator<'t, 's> {
    pub(super) toolkit: &'t mut Toolkit<'s>,
    globals: Rc<Scope>,
    frames: Vec<Frame>,
    /// The class behind the toolkit's `Node`.
    pub(super) node_class: Rc<Class>,
    steps: u64,
}

impl<'t, 's> Evaluator<'t, 's> {
    pub fn new(toolkit: &'t mut Toolkit<'s>) -> Self {
        Self {
            toolkit,
            globals: Rc::new(Scope::default()),
            frames: Vec::new(),
            node_class: Rc::new(Class::new("Node")),
            steps: 0,
        }
    }

    /// A global binding of the snippet.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.vars.borrow().get(name).cloned()
    }

    pub fn run(&mut self, program: &[Stmt]) -> Result<(), ScriptError> {
        self.run_block(program).map(|_| ())
    }

    pub(super) fn tick(&mut self) -> Result<(), ErrorKind> {
        self.steps += 1;
        if self.steps > MAX_STEPS {
            return Err(ErrorKind::Limit(format!(
                "snippet ran more than {MAX_STEPS} steps"
            )));
        }
        Ok(())
    }

    fn scope(&self) -> Rc<Scope> {
        self.frames
            .last()
            .map_or_else(|| self.globals.clone(), |frame| frame.scope.clone())
    }

    /// The scope a function defined here closes over; `None` means globals.
    fn closure(&self) -> Option<Rc<Scope>> {
        match self.frames.last() {
            None => None,
            Some(frame) if frame.class_body => frame.scope.parent.clone(),
            Some(frame) => Some(frame.scope.clone()),
        }
    }

    fn bind(&mut self, name: &str, value: Value) {
        self.scope().vars.borrow_mut().insert(name.to_string(), value);
    }

    fn lookup(&self, name: &str) -> Result<Value, ErrorKind> {
        let mut scope = self.frames.last().map(|frame| frame.scope.clone());
        while let Some(current) = scope {
            if let Some(value) = current.vars.borrow().get(name) {
                return Ok(value.clone());
            }
            scope = current.parent.clone();
        }
        if let Some(value) = self.get(name) {
            return Ok(value);
        }
        Builtin::prelude(name)
            .map(Value::Builtin)
            .ok_or_else(|| ErrorKind::Name(name.to_string()))
    }

    fn run_block(&mut self, body: &[Stmt]) -> Result<Flow, ScriptError> {
        for stmt in body {
            match self.execute(stmt)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        trace!(line = stmt.line; "Executing statement");
        self.tick()
            .map_err(|kind| ScriptError::new(stmt.line, kind))?;
        self.execute_kind(&stmt.kind)
            .map_err(|err| err.located(stmt.line))
    }

    fn execute_kind(&mut self, kind: &StmtKind) -> Result<Flow, ScriptError> {
        match kind {
            StmtKind::Import { module, alias } => self.import(module, alias.as_deref())?,
            StmtKind::FromImport { module, names } => self.from_import(module, names)?,
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign_pattern(target, value.clone())?;
                }
            }
            StmtKind::AugAssign { target, op, value } => self.aug_assign(target, *op, value)?,
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.run_block(body);
                    }
                }
                return self.run_block(orelse);
            }
            StmtKind::While { cond, body } => {
                while self.eval(cond)?.truthy() {
                    self.tick()?;
                    match self.run_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
            }
            StmtKind::For { target, iter, body } => {
                for item in self.eval(iter)?.iterate()? {
                    self.tick()?;
                    self.assign_pattern(target, item)?;
                    match self.run_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Def(def) => self.define_function(def)?,
            StmtKind::Class { name, bases, body } => self.define_class(name, bases, body)?,
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Raise(value) => return Err(self.raise(value.as_ref())?.into()),
            StmtKind::Assert { test, message } => {
                if !self.eval(test)?.truthy() {
                    let message = match message {
                        Some(expr) => {
                            let value = self.eval(expr)?;
                            self.display(&value)?
                        }
                        None => "condition is false".to_string(),
                    };
                    return Err(ErrorKind::Assertion(message).into());
                }
            }
            StmtKind::Delete(targets) => {
                for target in targets {
                    self.delete(target)?;
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
        }
        Ok(Flow::Next)
    }

    fn import(&mut self, module: &str, alias: Option<&str>) -> Result<(), ErrorKind> {
        let found =
            Module::find(module).ok_or_else(|| ErrorKind::ModuleNotFound(module.to_string()))?;
        match alias {
            Some(alias) => self.bind(alias, Value::Module(found)),
            None => {
                // `import a.b` binds `a`.
                let head = module.split('.').next().unwrap_or(module);
                let package = Module::find(head)
                    .ok_or_else(|| ErrorKind::ModuleNotFound(head.to_string()))?;
                self.bind(head, Value::Module(package));
            }
        }
        Ok(())
    }

    fn from_import(&mut self, module: &str, names: &ImportNames) -> Result<(), ErrorKind> {
        let found =
            Module::find(module).ok_or_else(|| ErrorKind::ModuleNotFound(module.to_string()))?;
        match names {
            ImportNames::All => {
                for (name, value) in found.exports() {
                    self.bind(name, value);
                }
            }
            ImportNames::Names(names) => {
                for (name, alias) in names {
                    let value = found.attr(name).ok_or_else(|| ErrorKind::Import {
                        module: module.to_string(),
                        name: name.clone(),
                    })?;
                    self.bind(alias.as_ref().unwrap_or(name), value);
                }
            }
        }
        Ok(())
    }

    fn define_function(&mut self, def: &Rc<FunctionDef>) -> Result<(), ScriptError> {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            defaults.push(match &param.default {
                Some(expr) => Some(self.eval(expr)?),
                None => None,
            });
        }
        let function = Function {
            def: def.clone(),
            defaults,
            closure: self.closure(),
        };
        self.bind(&def.name, Value::Function(Rc::new(function)));
        Ok(())
    }

    fn define_class(
        &mut self,
        name: &str,
        bases: &[Expr],
        body: &[Stmt],
    ) -> Result<(), ScriptError> {
        let mut parents = Vec::with_capacity(bases.len());
        for base in bases {
            match self.eval(base)? {
                Value::Class(class) => parents.push(class),
                Value::Builtin(Builtin::Object) => {}
                other => {
                    return Err(ErrorKind::Type(format!(
                        "class {name} cannot derive from '{}'",
                        other
                    ))
                    .into());
                }
            }
        }
        let scope = Rc::new(Scope {
            parent: self.closure(),
            ..Scope::default()
        });
        self.frames.push(Frame {
            scope: scope.clone(),
            class_body: true,
        });
        let result = self.run_block(body);
        self.frames.pop();
        result?;
        let class = Class {
            name: name.to_string(),
            bases: parents,
            attrs: scope.vars.take(),
        };
        self.bind(name, Value::Class(Rc::new(class)));
        Ok(())
    }

    /// The error a `raise` statement produces.
    fn raise(&mut self, value: Option<&Expr>) -> Result<ErrorKind, ScriptError> {
        let Some(expr) = value else {
            return Ok(ErrorKind::Raised {
                name: "RuntimeError".to_string(),
                message: "No active exception to reraise".to_string(),
            });
        };
        Ok(match self.eval(expr)? {
            Value::Exception(exception) => ErrorKind::Raised {
                name: exception.name.to_string(),
                message: exception.message.clone(),
            },
            Value::Builtin(Builtin::Exception(name)) => ErrorKind::Raised {
                name: name.to_string(),
                message: String::new(),
            },
            _ => ErrorKind::Type("exceptions must derive from BaseException".to_string()),
        })
    }

    fn assign_pattern(&mut self, pattern: &Pattern, value: Value) -> Result<(), ScriptError> {
        match pattern {
            Pattern::Target(target) => self.assign(target, value),
            Pattern::Tuple(patterns) => {
                let items = value.collect_items()?;
                let expected = patterns.len();
                if items.len() < expected {
                    return Err(ErrorKind::Value(format!(
                        "not enough values to unpack (expected {expected}, got {})",
                        items.len()
                    ))
                    .into());
                }
                if items.len() > expected {
                    return Err(ErrorKind::Value(format!(
                        "too many values to unpack (expected {expected})"
                    ))
                    .into());
                }
                for (pattern, item) in patterns.iter().zip(items) {
                    self.assign_pattern(pattern, item)?;
                }
                Ok(())
            }
        }
    }

    fn assign(&mut self, target: &Target, value: Value) -> Result<(), ScriptError> {
        match target {
            Target::Name(name) => self.bind(name, value),
            Target::Attr(obj, field) => {
                let obj = self.eval(obj)?;
                ops::set_attr(&obj, field, value)?;
            }
            Target::Index(base, index) => {
                let base = self.eval(base)?;
                if let Expr::Slice { lower, upper, step } = index {
                    let lower = self.eval_optional(lower.as_deref())?;
                    let upper = self.eval_optional(upper.as_deref())?;
                    let step = self.eval_optional(step.as_deref())?;
                    ops::store_slice(&base, (&lower, &upper, &step), &value)?;
                } else {
                    let index = self.eval(index)?;
                    ops::store_index(&base, &index, value)?;
                }
            }
        }
        Ok(())
    }

    /// `target op= value`, evaluating the target's base and index once.
    fn aug_assign(
        &mut self,
        target: &Target,
        op: BinOp,
        value: &Expr,
    ) -> Result<(), ScriptError> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name)?;
                let rhs = self.eval(value)?;
                let updated = augmented(&current, op, &rhs)?;
                self.bind(name, updated);
            }
            Target::Attr(obj, field) => {
                let obj = self.eval(obj)?;
                let current = ops::get_attr(&obj, field)?;
                let rhs = self.eval(value)?;
                ops::set_attr(&obj, field, augmented(&current, op, &rhs)?)?;
            }
            Target::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                let current = self.get_item(&base, &index)?;
                let rhs = self.eval(value)?;
                ops::store_index(&base, &index, augmented(&current, op, &rhs)?)?;
            }
        }
        Ok(())
    }

    fn delete(&mut self, target: &Target) -> Result<(), ScriptError> {
        match target {
            Target::Name(name) => {
                if self.scope().vars.borrow_mut().remove(name).is_none() {
                    return Err(ErrorKind::Name(name.clone()).into());
                }
            }
            Target::Attr(obj, field) => {
                let obj = self.eval(obj)?;
                ops::delete_attr(&obj, field)?;
            }
            Target::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                ops::delete_index(&base, &index)?;
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        Ok(match expr {
            Expr::Number(value) => Value::Number(*value),
            Expr::Str(value) => Value::Str(value.clone()),
            Expr::FString(parts) => Value::Str(self.format_string(parts)?),
            Expr::None => Value::None,
            Expr::Bool(value) => Value::Bool(*value),
            Expr::List(items) => Value::list(self.eval_all(items)?),
            Expr::Tuple(items) => Value::tuple(self.eval_all(items)?),
            Expr::Dict(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval(key)?.to_key()?;
                    map.insert(key, self.eval(value)?);
                }
                Value::dict(map)
            }
            Expr::Set(items) => {
                let mut keys = IndexSet::with_capacity(items.len());
                for item in items {
                    keys.insert(self.eval(item)?.to_key()?);
                }
                Value::set(keys)
            }
            Expr::ListComp { element, clauses } => {
                let mut out = Vec::new();
                self.comprehend(clauses, &mut |ev| {
                    out.push(ev.eval(element)?);
                    Ok(())
                })?;
                Value::list(out)
            }
            Expr::DictComp {
                key,
                value,
                clauses,
            } => {
                let mut map = IndexMap::new();
                self.comprehend(clauses, &mut |ev| {
                    let key = ev.eval(key)?.to_key()?;
                    map.insert(key, ev.eval(value)?);
                    Ok(())
                })?;
                Value::dict(map)
            }
            Expr::Name(name) => self.lookup(name)?,
            Expr::Attr(obj, field) => ops::get_attr(&self.eval(obj)?, field)?,
            Expr::Index(base, index) => self.eval_index(base, index)?,
            Expr::Slice { .. } => {
                return Err(ErrorKind::Syntax("slice outside of a subscript".to_string()).into());
            }
            Expr::Call { func, args, kwargs } => {
                let callee = self.eval(func)?;
                let args = self.eval_all(args)?;
                let mut named = Vec::with_capacity(kwargs.len());
                for (name, expr) in kwargs {
                    named.push((name.clone(), self.eval(expr)?));
                }
                self.call_value(&callee, args, named)?
            }
            Expr::Neg(inner) => ops::negate(&self.eval(inner)?)?,
            Expr::Not(inner) => Value::Bool(!self.eval(inner)?.truthy()),
            Expr::Binary(lhs, op, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                ops::binary(&lhs, *op, &rhs)?
            }
            Expr::Compare(first, rest) => {
                let mut lhs = self.eval(first)?;
                for (op, expr) in rest {
                    let rhs = self.eval(expr)?;
                    if !ops::compare(&lhs, *op, &rhs)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Value::Bool(true)
            }
            Expr::Logic(lhs, op, rhs) => {
                let lhs = self.eval(lhs)?;
                let short_circuit = match op {
                    BoolOp::And => !lhs.truthy(),
                    BoolOp::Or => lhs.truthy(),
                };
                if short_circuit { lhs } else { self.eval(rhs)? }
            }
            Expr::IfElse { cond, then, orelse } => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)?
                } else {
                    self.eval(orelse)?
                }
            }
        })
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, ScriptError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn eval_optional(&mut self, expr: Option<&Expr>) -> Result<Value, ScriptError> {
        match expr {
            Some(expr) => self.eval(expr),
            None => Ok(Value::None),
        }
    }

    fn eval_index(&mut self, base: &Expr, index: &Expr) -> Result<Value, ScriptError> {
        let base = self.eval(base)?;
        if let Expr::Slice { lower, upper, step } = index {
            let lower = self.eval_optional(lower.as_deref())?;
            let upper = self.eval_optional(upper.as_deref())?;
            let step = self.eval_optional(step.as_deref())?;
            return Ok(ops::slice(&base, &lower, &upper, &step)?);
        }
        let index = self.eval(index)?;
        self.get_item(&base, &index)
    }

    /// `base[index]`; a `defaultdict` fills a missing key from its factory.
    fn get_item(&mut self, base: &Value, index: &Value) -> Result<Value, ScriptError> {
        if let Value::Dict(dict) = base
            && let Some(factory) = &dict.default_factory
        {
            let key = index.to_key()?;
            let existing = dict.entries.borrow().get(&key).cloned();
            if let Some(value) = existing {
                return Ok(value);
            }
            let value = self.call_value(factory, Vec::new(), Vec::new())?;
            dict.entries.borrow_mut().insert(key, value.clone());
            return Ok(value);
        }
        Ok(ops::get_index(base, index)?)
    }

    /// Runs `emit` once per combination the clauses produce. Loop variables
    /// are bound in the current scope.
    fn comprehend(
        &mut self,
        clauses: &[Comprehension],
        emit: &mut dyn FnMut(&mut Self) -> Result<(), ScriptError>,
    ) -> Result<(), ScriptError> {
        let Some((clause, rest)) = clauses.split_first() else {
            return emit(self);
        };
        'items: for item in self.eval(&clause.iter)?.iterate()? {
            self.tick()?;
            self.assign_pattern(&clause.target, item)?;
            for cond in &clause.conditions {
                if !self.eval(cond)?.truthy() {
                    continue 'items;
                }
            }
            self.comprehend(rest, emit)?;
        }
        Ok(())
    }

    pub(super) fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        match callee {
            Value::Builtin(builtin) => self.call_builtin(*builtin, args, kwargs),
            Value::Function(function) => self.call_function(function, None, args, kwargs),
            Value::BoundMethod(bound) => match &bound.method {
                Method::User(function) => {
                    self.call_function(function, Some(bound.receiver.clone()), args, kwargs)
                }
                Method::Native(name) => {
                    self.call_native_method(&bound.receiver, name, args, kwargs)
                }
            },
            Value::Class(class) => {
                let instance = Value::Instance(Rc::new(Instance::new(class.clone())));
                match class.lookup("__init__") {
                    Some(Value::Function(init)) => {
                        let result =
                            self.call_function(&init, Some(instance.clone()), args, kwargs)?;
                        if !result.is_none() {
                            return Err(ErrorKind::Type(
                                "__init__() should return None".to_string(),
                            )
                            .into());
                        }
                    }
                    _ if !args.is_empty() || !kwargs.is_empty() => {
                        return Err(ErrorKind::Type(format!(
                            "{}() takes no arguments",
                            class.name
                        ))
                        .into());
                    }
                    _ => {}
                }
                Ok(instance)
            }
            other => Err(ErrorKind::Type(format!(
                "'{}' object is not callable",
                other.type_name()
            ))
            .into()),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        receiver: Option<Value>,
        mut args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(ErrorKind::Limit("maximum recursion depth exceeded".to_string()).into());
        }
        if let Some(receiver) = receiver {
            args.insert(0, receiver);
        }
        let scope = bind_params(function, args, kwargs)?;
        self.frames.push(Frame {
            scope: Rc::new(scope),
            class_body: false,
        });
        let result = self.run_block(&function.def.body);
        self.frames.pop();
        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Next | Flow::Break | Flow::Continue => Ok(Value::None),
        }
    }

    /// `str(value)`, honouring a user `__str__` or `__repr__`.
    pub(super) fn display(&mut self, value: &Value) -> Result<String, ScriptError> {
        match self.hook(value, &["__str__", "__repr__"])? {
            Some(text) => Ok(text),
            None => Ok(value.to_string()),
        }
    }

    pub(super) fn repr_of(&mut self, value: &Value) -> Result<String, ScriptError> {
        match self.hook(value, &["__repr__"])? {
            Some(text) => Ok(text),
            None => Ok(value.repr()),
        }
    }

    fn hook(&mut self, value: &Value, names: &[&str]) -> Result<Option<String>, ScriptError> {
        let Value::Instance(instance) = value else {
            return Ok(None);
        };
        let Some(function) = names.iter().find_map(|name| match instance.class.lookup(name) {
            Some(Value::Function(function)) => Some(function),
            _ => None,
        }) else {
            return Ok(None);
        };
        match self.call_function(&function, Some(value.clone()), Vec::new(), Vec::new())? {
            Value::Str(text) => Ok(Some(text)),
            other => Err(ErrorKind::Type(format!(
                "{} returned non-string (type {})",
                function.def.name,
                other.type_name()
            ))
            .into()),
        }
    }

    fn format_string(&mut self, parts: &[FPart]) -> Result<String, ScriptError> {
        let mut out = String::new();
        for part in parts {
            match part {
                FPart::Text(text) => out.push_str(text),
                FPart::Field {
                    expr,
                    conversion,
                    spec,
                } => {
                    let value = self.eval(expr)?;
                    let value = match conversion {
                        Some('r' | 'a') => Value::Str(self.repr_of(&value)?),
                        Some(_) => Value::Str(self.display(&value)?),
                        None => value,
                    };
                    match spec.as_deref() {
                        Some(spec) if !spec.is_empty() => {
                            out.push_str(&ops::format_spec(&value, spec)?);
                        }
                        _ => out.push_str(&self.display(&value)?),
                    }
                }
            }
        }
        Ok(out)
    }
}

/// `target op= rhs`; `+=` on a list extends it in place.
fn augmented(current: &Value, op: BinOp, rhs: &Value) -> Result<Value, ErrorKind> {
    if let (Value::List(items), BinOp::Add) = (current, op) {
        let extra = rhs.collect_items()?;
        items.borrow_mut().extend(extra);
        return Ok(current.clone());
    }
    ops::binary(current, op, rhs)
}

/// Matches call arguments to a user function's parameters.
fn bind_params(
    function: &Function,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Scope, ErrorKind> {
    let def = &function.def;
    let name = &def.name;
    if args.len() > def.params.len() {
        return Err(ErrorKind::Type(format!(
            "{name}() takes {} positional arguments but {} were given",
            def.params.len(),
            args.len()
        )));
    }
    let mut slots: Vec<Option<Value>> = vec![None; def.params.len()];
    for (slot, arg) in slots.iter_mut().zip(args) {
        *slot = Some(arg);
    }
    for (keyword, value) in kwargs {
        let position = def
            .params
            .iter()
            .position(|param| param.name == keyword)
            .ok_or_else(|| {
                ErrorKind::Type(format!(
                    "{name}() got an unexpected keyword argument '{keyword}'"
                ))
            })?;
        if slots[position].is_some() {
            return Err(ErrorKind::Type(format!(
                "{name}() got multiple values for argument '{keyword}'"
            )));
        }
        slots[position] = Some(value);
    }
    let mut vars = HashMap::with_capacity(slots.len());
    for ((param, slot), default) in def.params.iter().zip(slots).zip(&function.defaults) {
        let value = slot.or_else(|| default.clone()).ok_or_else(|| {
            ErrorKind::Type(format!(
                "{name}() missing required argument: '{}'",
                param.name
            ))
        })?;
        vars.insert(param.name.clone(), value);
    }
    Ok(Scope {
        vars: vars.into(),
        parent: function.closure.clone(),
    })
}
