//! Runtime values of the guest language.
//!
//! Scalars are stored inline; containers and objects live behind `Rc` so
//! they share identity like their Python counterparts (appending to a list
//! bound under two names is visible through both).

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use vibe_types::{Form, SourceFile};

use crate::env::Scope;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::{Evaluator, STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::io::StreamName;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(0x1000);

/// Deepest container nesting `==` will descend into.
pub const MAX_COMPARE_DEPTH: usize = 10_000;

thread_local! {
    static COMPARE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static COMPARE_TOO_DEEP: Cell<bool> = const { Cell::new(false) };
}

/// A process-unique identity handle for objects shown by address.
pub fn next_handle() -> u64 {
    NEXT_HANDLE.fetch_add(0x10, Ordering::Relaxed)
}

/// Native function signature for built-ins.
pub type BuiltinFn = fn(&mut Evaluator, Args) -> EvalResult<Value>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// A user function created by `defn` or `fn`.
#[derive(Debug, Clone)]
pub struct Lambda {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Form>,
    /// Snapshot of the non-global scopes visible where the function was
    /// created.
    pub captured: Vec<Scope>,
    /// The cell the function was defined in, for trace lines.
    pub source: Rc<SourceFile>,
    pub line: u32,
    pub handle: u64,
}

/// A class created by `defclass`.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub bases: Vec<Rc<Class>>,
    pub attrs: RefCell<BTreeMap<String, Value>>,
    pub handle: u64,
}

impl Class {
    pub fn new(name: impl Into<String>, bases: Vec<Rc<Class>>, attrs: BTreeMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            bases,
            attrs: RefCell::new(attrs),
            handle: next_handle(),
        }
    }

    /// Attribute lookup through the class and then its bases, depth first.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attrs.borrow().get(name) {
            return Some(value.clone());
        }
        self.bases.iter().find_map(|base| base.lookup(name))
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<BTreeMap<String, Value>>,
    pub handle: u64,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(BTreeMap::new()),
            handle: next_handle(),
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        let fields = mem::take(self.fields.get_mut());
        release(fields.into_values().filter(Value::has_children).collect());
    }
}

/// What a bound method dispatches to.
#[derive(Debug, Clone)]
pub enum Callee {
    /// A function found on the receiver's class.
    Guest(Rc<Lambda>),
    /// A native method of a built-in type (`list.append`).
    Native(&'static str),
}

#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub callee: Callee,
    pub handle: u64,
}

impl BoundMethod {
    pub fn new(receiver: Value, callee: Callee) -> Self {
        Self {
            receiver,
            callee,
            handle: next_handle(),
        }
    }

    pub fn name(&self) -> &str {
        match &self.callee {
            Callee::Guest(lambda) => &lambda.name,
            Callee::Native(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionValue {
    pub kind: String,
    pub message: String,
}

/// A host-provided namespace such as `sys`.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub attrs: BTreeMap<String, Value>,
    pub handle: u64,
}

/// Backing store of a guest list.
#[derive(Debug, Default)]
pub struct List {
    items: RefCell<Vec<Value>>,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: RefCell::new(items),
        }
    }
}

impl Deref for List {
    type Target = RefCell<Vec<Value>>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl Drop for List {
    fn drop(&mut self) {
        release(mem::take(self.items.get_mut()));
    }
}

/// Insertion-ordered mapping with guest equality on keys.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or overwrite; an existing key keeps its position.
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

impl Drop for Dict {
    fn drop(&mut self) {
        let pending = self
            .entries
            .drain(..)
            .flat_map(|(k, v)| [k, v])
            .filter(Value::has_children)
            .collect();
        release(pending);
    }
}

/// Drop `pending` one value at a time, moving the children of uniquely
/// owned containers onto the same work list. A chain of a million nested
/// lists then tears down in constant stack.
fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::List(mut list) => {
                if let Some(list) = Rc::get_mut(&mut list) {
                    pending.append(list.items.get_mut());
                }
            }
            Value::Dict(mut dict) => {
                if let Some(dict) = Rc::get_mut(&mut dict) {
                    let entries = &mut dict.get_mut().entries;
                    pending.extend(entries.drain(..).flat_map(|(k, v)| [k, v]));
                }
            }
            Value::Instance(mut instance) => {
                if let Some(instance) = Rc::get_mut(&mut instance) {
                    let fields = mem::take(instance.fields.get_mut());
                    pending.extend(fields.into_values());
                }
            }
            _ => {}
        }
    }
}

impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| ov == v))
    }
}

/// A guest value.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(String),
    List(Rc<List>),
    Dict(Rc<RefCell<Dict>>),
    Function(Rc<Lambda>),
    Builtin(Builtin),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Method(Rc<BoundMethod>),
    Exception(Rc<ExceptionValue>),
    Module(Rc<Module>),
    Stream(StreamName),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(List::new(items)))
    }

    pub fn dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn exception(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exception(Rc::new(ExceptionValue {
            kind: kind.into(),
            message: message.into(),
        }))
    }

    /// `None` doubles as the "no result" marker of a cell.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(x) => *x != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Dict(dict) => !dict.borrow().is_empty(),
            _ => true,
        }
    }

    /// The guest-visible type name.
    pub fn type_name(&self) -> String {
        let name = match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Keyword(_) => "Keyword",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Function(_) => "function",
            Self::Builtin(_) => "builtin_function_or_method",
            Self::Class(_) => "type",
            Self::Instance(instance) => return instance.class.name.clone(),
            Self::Method(_) => "method",
            Self::Exception(exc) => return exc.kind.clone(),
            Self::Module(_) => "module",
            Self::Stream(_) => "TextIOWrapper",
        };
        name.to_string()
    }

    /// Module the value's type lives in.
    pub fn module_name(&self) -> &'static str {
        match self {
            Self::Instance(_) => "__main__",
            _ => "builtins",
        }
    }

    /// Identity handle for objects that have one.
    pub fn handle(&self) -> Option<u64> {
        match self {
            Self::Function(f) => Some(f.handle),
            Self::Class(c) => Some(c.handle),
            Self::Instance(i) => Some(i.handle),
            Self::Method(m) => Some(m.handle),
            Self::Module(m) => Some(m.handle),
            _ => None,
        }
    }

    /// Objects whose default printed form is an address, not their content.
    pub fn is_opaque(&self) -> bool {
        self.handle().is_some()
    }

    /// `<module.Type at 0xHANDLE>`, the compact stand-in for opaque objects.
    pub fn placeholder(&self) -> String {
        match self.handle() {
            Some(handle) => format!(
                "<{}.{} at {handle:#x}>",
                self.module_name(),
                self.type_name()
            ),
            None => format!("<{}.{} object>", self.module_name(), self.type_name()),
        }
    }

    /// Values that may own further guest values.
    pub fn has_children(&self) -> bool {
        matches!(self, Self::List(_) | Self::Dict(_) | Self::Instance(_))
    }

    pub fn is_hashable(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Dict(_))
    }

    /// Fail with `TypeError` for values that cannot be dict keys.
    pub fn ensure_hashable(&self) -> EvalResult<()> {
        if self.is_hashable() {
            Ok(())
        } else {
            Err(EvalError::Type(format!(
                "unhashable type: '{}'",
                self.type_name()
            )))
        }
    }

    /// Integer view of ints and bools.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            other => other.as_int().map(|n| n as f64),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Keyword(a), Self::Keyword(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                Rc::ptr_eq(a, b) || nested_eq(|| *a.borrow() == *b.borrow())
            }
            (Self::Dict(a), Self::Dict(b)) => {
                Rc::ptr_eq(a, b) || nested_eq(|| *a.borrow() == *b.borrow())
            }
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a.name == b.name,
            (Self::Class(a), Self::Class(b)) => Rc::ptr_eq(a, b),
            (Self::Instance(a), Self::Instance(b)) => Rc::ptr_eq(a, b),
            (Self::Method(a), Self::Method(b)) => Rc::ptr_eq(a, b),
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => Rc::ptr_eq(a, b),
            (Self::Stream(a), Self::Stream(b)) => a == b,
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y,
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                },
            },
        }
    }
}

/// Compare container contents one level down. Past `MAX_COMPARE_DEPTH`
/// the pair counts as unequal and [`checked_eq`] reports the overrun.
fn nested_eq(compare: impl FnOnce() -> bool) -> bool {
    let depth = COMPARE_DEPTH.with(Cell::get);
    if depth >= MAX_COMPARE_DEPTH {
        COMPARE_TOO_DEEP.with(|flag| flag.set(true));
        return false;
    }
    COMPARE_DEPTH.with(|d| d.set(depth + 1));
    let equal = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, compare);
    COMPARE_DEPTH.with(|d| d.set(depth));
    equal
}

/// Guest `==`: like `a == b`, but comparing structures nested deeper than
/// `MAX_COMPARE_DEPTH` (self-referencing ones included) is a
/// `RecursionError`.
pub fn checked_eq(a: &Value, b: &Value) -> EvalResult<bool> {
    COMPARE_TOO_DEEP.with(|flag| flag.set(false));
    let equal = a == b;
    if COMPARE_TOO_DEEP.with(|flag| flag.replace(false)) {
        return Err(EvalError::Recursion);
    }
    Ok(equal)
}

/// Shallow: containers print their size, objects their name.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(n) => write!(f, "Int({n})"),
            Self::Float(x) => write!(f, "Float({x:?})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Keyword(k) => write!(f, "Keyword({k})"),
            Self::List(items) => write!(f, "List(len={})", items.borrow().len()),
            Self::Dict(dict) => write!(f, "Dict(len={})", dict.borrow().len()),
            Self::Function(lambda) => write!(f, "Function({})", lambda.name),
            Self::Builtin(builtin) => write!(f, "Builtin({})", builtin.name),
            Self::Class(class) => write!(f, "Class({})", class.name),
            Self::Instance(instance) => write!(f, "Instance({})", instance.class.name),
            Self::Method(method) => write!(f, "Method({})", method.name()),
            Self::Exception(exc) => write!(f, "Exception({}: {})", exc.kind, exc.message),
            Self::Module(module) => write!(f, "Module({})", module.name),
            Self::Stream(name) => write!(f, "Stream({})", name.as_str()),
        }
    }
}

/// Evaluated call arguments: positionals plus `:name value` keywords.
#[derive(Debug, Default, Clone)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Fail unless every keyword is in `allowed`.
    pub(crate) fn check_keywords(&self, func: &str, allowed: &[&str]) -> EvalResult<()> {
        match self.keywords.iter().find(|(k, _)| !allowed.contains(&k.as_str())) {
            Some((k, _)) => Err(EvalError::Type(format!(
                "'{k}' is an invalid keyword argument for {func}()"
            ))),
            None => Ok(()),
        }
    }

    /// Exactly `n` positionals and no keywords.
    pub(crate) fn exactly(&self, func: &str, n: usize) -> EvalResult<&[Value]> {
        self.between(func, n, n)
    }

    /// Between `min` and `max` positionals and no keywords.
    pub(crate) fn between(&self, func: &str, min: usize, max: usize) -> EvalResult<&[Value]> {
        self.check_keywords(func, &[])?;
        let given = self.positional.len();
        if (min..=max).contains(&given) {
            return Ok(&self.positional);
        }
        let expected = if min == max {
            format!("exactly {min} argument{}", plural(min))
        } else if given < min {
            format!("at least {min} argument{}", plural(min))
        } else {
            format!("at most {max} argument{}", plural(max))
        };
        Err(EvalError::Type(format!("{func}() takes {expected} ({given} given)")))
    }
}

pub(crate) fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
