//! Core form evaluator.

use std::rc::Rc;

use vibe_types::{Form, FormKind, SourceFile, Span};

use crate::builtins;
use crate::env::{Environment, Scope};
use crate::error::{EvalError, EvalResult};
use crate::io::Streams;
use crate::methods;
use crate::trace::{BoundaryTag, Fault, Frame, Origin};
use crate::value::{plural, Args, BoundMethod, Callee, Class, Dict, Instance, Lambda, Value};

/// Call depth at which guest recursion is stopped.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// Largest call depth a session may be configured with.
pub const MAX_DEPTH_CEILING: usize = 10_000;

/// Remaining native stack below which evaluation moves to a fresh segment.
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each fresh native stack segment.
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// The evaluator: walks forms and produces values.
///
/// One evaluator is one interpreter session. Its global scope persists
/// across calls to [`Evaluator::evaluate`].
pub struct Evaluator {
    /// Variable environment (scoped).
    pub env: Environment,
    streams: Streams,
    stack: Vec<Frame>,
    /// Stack snapshot taken where the current error was first raised.
    fault_frames: Option<Vec<Frame>>,
    max_depth: usize,
    /// Containers being printed right now; guards self-referencing reprs.
    pub(crate) repr_active: Vec<usize>,
}

impl Evaluator {
    /// An evaluator printing to the process's stdout and stderr.
    pub fn new() -> Self {
        Self::with_streams(Streams::stdio())
    }

    pub fn with_streams(streams: Streams) -> Self {
        let mut env = Environment::new();
        builtins::install(&mut env);
        Self {
            env,
            streams,
            stack: Vec::new(),
            fault_frames: None,
            max_depth: DEFAULT_MAX_DEPTH,
            repr_active: Vec::new(),
        }
    }

    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Clamped to `1..=MAX_DEPTH_CEILING`.
    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth.clamp(1, MAX_DEPTH_CEILING);
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Host boundary
    // ══════════════════════════════════════════════════════════════════════

    /// Push a host frame and return a tag marking it.
    pub fn enter_host(&mut self, name: &str) -> BoundaryTag {
        let mut frame = Frame::host(name);
        frame.depth = self.stack.len() + 1;
        self.stack.push(frame);
        BoundaryTag::new(self.stack.len())
    }

    /// Pop the tagged host frame and everything above it.
    pub fn leave_host(&mut self, tag: BoundaryTag) {
        self.stack.truncate(tag.depth().saturating_sub(1));
    }

    /// Reset per-call state after evaluation was abandoned midway.
    /// Globals survive.
    pub fn recover(&mut self) {
        self.stack.clear();
        self.env.clear_locals();
        self.fault_frames = None;
        self.repr_active.clear();
    }

    // ══════════════════════════════════════════════════════════════════════
    // Entry point
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate one top-level form from `source`.
    pub fn evaluate(&mut self, form: &Form, source: &Rc<SourceFile>) -> Result<Value, Fault> {
        self.fault_frames = None;
        let frame = Frame::guest("<module>", Rc::clone(source), form.span.start_line);
        self.with_frame(frame, |ev| ev.eval_form(form))
            .map_err(|error| {
                let frames = self
                    .fault_frames
                    .take()
                    .unwrap_or_else(|| self.stack.clone());
                Fault { error, frames }
            })
    }

    /// Run `body` inside `frame`, enforcing the depth limit.
    pub(crate) fn with_frame<T>(
        &mut self,
        mut frame: Frame,
        body: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        if self.stack.len() >= self.max_depth {
            return Err(EvalError::Recursion);
        }
        frame.depth = self.stack.len() + 1;
        self.stack.push(frame);
        let result = body(self);
        if result.is_err() && self.fault_frames.is_none() {
            self.fault_frames = Some(self.stack.clone());
        }
        self.stack.pop();
        result
    }

    fn mark_line(&mut self, span: Span) {
        if let Some(frame) = self.stack.last_mut() {
            if frame.origin == Origin::Guest {
                frame.line = span.start_line;
            }
        }
    }

    /// Source of the innermost guest frame.
    pub(crate) fn current_source(&self) -> Rc<SourceFile> {
        self.stack
            .iter()
            .rev()
            .find_map(|frame| frame.source.clone())
            .unwrap_or_else(|| Rc::new(SourceFile::new("<unknown>", "")))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Forms
    // ══════════════════════════════════════════════════════════════════════

    pub(crate) fn eval_form(&mut self, form: &Form) -> EvalResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_form_inner(form))
    }

    fn eval_form_inner(&mut self, form: &Form) -> EvalResult<Value> {
        self.mark_line(form.span);
        match &form.kind {
            FormKind::Integer(n) => Ok(Value::Int(*n)),
            FormKind::Float(x) => Ok(Value::Float(*x)),
            FormKind::Str(s) => Ok(Value::Str(s.clone())),
            FormKind::Keyword(k) => Ok(Value::Keyword(k.clone())),
            FormKind::Symbol(name) => self.eval_symbol(name),
            FormKind::List(items) => self.eval_list_literal(items),
            FormKind::Dict(items) => self.eval_dict_literal(items),
            FormKind::Expression(items) => self.eval_expression(form.span, items),
        }
    }

    /// Evaluate forms in order; the value of the last, or `None`.
    pub(crate) fn eval_body(&mut self, forms: &[Form]) -> EvalResult<Value> {
        forms
            .iter()
            .try_fold(Value::None, |_, form| self.eval_form(form))
    }

    // ── Literals ──────────────────────────────────────────────────────────

    fn eval_list_literal(&mut self, items: &[Form]) -> EvalResult<Value> {
        let values = items
            .iter()
            .map(|item| self.eval_form(item))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(Value::list(values))
    }

    fn eval_dict_literal(&mut self, items: &[Form]) -> EvalResult<Value> {
        let mut dict = Dict::new();
        for pair in items.chunks(2) {
            let [key, value] = pair else {
                return Err(EvalError::syntax("dict literal needs an even number of forms"));
            };
            let key = self.eval_form(key)?;
            key.ensure_hashable()?;
            let value = self.eval_form(value)?;
            dict.insert(key, value);
        }
        Ok(Value::dict(dict))
    }

    // ── Symbols ───────────────────────────────────────────────────────────

    pub(crate) fn eval_symbol(&mut self, name: &str) -> EvalResult<Value> {
        match name {
            "None" => return Ok(Value::None),
            "True" => return Ok(Value::Bool(true)),
            "False" => return Ok(Value::Bool(false)),
            _ => {}
        }
        if is_dotted(name) {
            let mut parts = name.split('.');
            let head = parts.next().unwrap_or(name);
            let mut value = self.lookup(head)?;
            for attr in parts {
                value = self.get_attr(&value, attr)?;
            }
            return Ok(value);
        }
        self.lookup(name)
    }

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        self.env
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedName(name.to_string()))
    }

    // ── Calls ─────────────────────────────────────────────────────────────

    fn eval_expression(&mut self, span: Span, items: &[Form]) -> EvalResult<Value> {
        let Some((head, rest)) = items.split_first() else {
            return Err(EvalError::syntax("empty expression cannot be evaluated"));
        };
        if let Some(name) = head.as_symbol() {
            if let Some(result) = self.eval_special(name, rest) {
                return result;
            }
            if let Some(method) = name.strip_prefix('.').filter(|m| is_plain_name(m)) {
                let Some((receiver, rest)) = rest.split_first() else {
                    return Err(EvalError::type_error(format!(
                        "method call .{method} needs a receiver"
                    )));
                };
                let receiver = self.eval_form(receiver)?;
                let args = self.eval_args(rest)?;
                self.mark_line(span);
                return self.call_method(&receiver, method, args);
            }
        }
        let callee = self.eval_form(head)?;
        let args = self.eval_args(rest)?;
        self.mark_line(span);
        self.call_value(&callee, args)
    }

    /// Evaluate call arguments; `:name value` pairs become keywords.
    fn eval_args(&mut self, forms: &[Form]) -> EvalResult<Args> {
        let mut args = Args::default();
        let mut forms = forms.iter();
        while let Some(form) = forms.next() {
            if let FormKind::Keyword(name) = &form.kind {
                let Some(value) = forms.next() else {
                    return Err(EvalError::syntax(format!(
                        "keyword argument :{name} needs a value"
                    )));
                };
                let value = self.eval_form(value)?;
                args.keywords.push((name.clone(), value));
            } else {
                let value = self.eval_form(form)?;
                args.positional.push(value);
            }
        }
        Ok(args)
    }

    /// Call any callable guest value.
    pub fn call_value(&mut self, callee: &Value, args: Args) -> EvalResult<Value> {
        match callee {
            Value::Builtin(builtin) => (builtin.func)(self, args),
            Value::Function(lambda) => self.call_lambda(lambda, None, args),
            Value::Class(class) => self.instantiate(class, args),
            Value::Method(method) => match &method.callee {
                Callee::Guest(lambda) => {
                    self.call_lambda(lambda, Some(method.receiver.clone()), args)
                }
                Callee::Native(name) => methods::call_native(self, &method.receiver, name, args),
            },
            other => Err(EvalError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// Call a user function, binding `receiver` (if any) to the first
    /// parameter.
    pub(crate) fn call_lambda(
        &mut self,
        lambda: &Rc<Lambda>,
        receiver: Option<Value>,
        args: Args,
    ) -> EvalResult<Value> {
        if let Some((key, _)) = args.keywords.first() {
            return Err(EvalError::type_error(format!(
                "{}() got an unexpected keyword argument '{key}'",
                lambda.name
            )));
        }
        let values: Vec<Value> = receiver.into_iter().chain(args.positional).collect();
        let expected = lambda.params.len();
        if values.len() < expected {
            let missing = &lambda.params[values.len()..];
            return Err(EvalError::type_error(format!(
                "{}() missing {} required positional argument{}: {}",
                lambda.name,
                missing.len(),
                plural(missing.len()),
                quoted_list(missing)
            )));
        }
        if values.len() > expected {
            return Err(EvalError::type_error(format!(
                "{}() takes {expected} positional argument{} but {} {} given",
                lambda.name,
                plural(expected),
                values.len(),
                if values.len() == 1 { "was" } else { "were" }
            )));
        }

        let mut scope = Scope::new();
        for (param, value) in lambda.params.iter().zip(values) {
            scope.define(param, value);
        }
        let mut locals = lambda.captured.clone();
        locals.push(scope);

        let frame = Frame::guest(lambda.name.clone(), Rc::clone(&lambda.source), lambda.line);
        self.with_frame(frame, |ev| {
            let saved = ev.env.replace_locals(locals);
            let result = ev.eval_body(&lambda.body);
            ev.env.replace_locals(saved);
            result
        })
    }

    fn instantiate(&mut self, class: &Rc<Class>, args: Args) -> EvalResult<Value> {
        let instance = Value::Instance(Rc::new(Instance::new(Rc::clone(class))));
        match class.lookup("__init__") {
            Some(Value::Function(init)) => {
                self.call_lambda(&init, Some(instance.clone()), args)?;
            }
            Some(other) => {
                return Err(EvalError::type_error(format!(
                    "'{}' object is not callable",
                    other.type_name()
                )));
            }
            None if !args.is_empty() => {
                return Err(EvalError::type_error(format!(
                    "{}() takes no arguments",
                    class.name
                )));
            }
            None => {}
        }
        Ok(instance)
    }

    pub(crate) fn call_method(&mut self, receiver: &Value, name: &str, args: Args) -> EvalResult<Value> {
        let method = self.get_attr(receiver, name)?;
        self.call_value(&method, args)
    }

    // ── Attributes ────────────────────────────────────────────────────────

    /// `obj.name`: instance fields, then class attributes (functions come
    /// back bound), then native methods of built-in types.
    pub fn get_attr(&self, value: &Value, name: &str) -> EvalResult<Value> {
        match value {
            Value::Instance(instance) => {
                if let Some(field) = instance.fields.borrow().get(name) {
                    return Ok(field.clone());
                }
                match instance.class.lookup(name) {
                    Some(Value::Function(lambda)) => Ok(Value::Method(Rc::new(BoundMethod::new(
                        value.clone(),
                        Callee::Guest(lambda),
                    )))),
                    Some(other) => Ok(other),
                    None => Err(EvalError::Attribute(format!(
                        "'{}' object has no attribute '{name}'",
                        instance.class.name
                    ))),
                }
            }
            Value::Class(class) => class.lookup(name).ok_or_else(|| {
                EvalError::Attribute(format!(
                    "type object '{}' has no attribute '{name}'",
                    class.name
                ))
            }),
            Value::Module(module) => module.attrs.get(name).cloned().ok_or_else(|| {
                EvalError::Attribute(format!(
                    "module '{}' has no attribute '{name}'",
                    module.name
                ))
            }),
            other => match methods::lookup(other, name) {
                Some(native) => Ok(Value::Method(Rc::new(BoundMethod::new(
                    other.clone(),
                    Callee::Native(native),
                )))),
                None => Err(EvalError::Attribute(format!(
                    "'{}' object has no attribute '{name}'",
                    other.type_name()
                ))),
            },
        }
    }

    pub(crate) fn set_attr(&self, target: &Value, name: &str, value: Value) -> EvalResult<()> {
        match target {
            Value::Instance(instance) => {
                instance.fields.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class) => {
                class.attrs.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            other => Err(EvalError::Attribute(format!(
                "'{}' object attribute '{name}' is read-only",
                other.type_name()
            ))),
        }
    }

    // ── Iteration ─────────────────────────────────────────────────────────

    /// Snapshot of the items `for` and friends walk over.
    pub(crate) fn iterate(&self, value: &Value) -> EvalResult<Vec<Value>> {
        match value {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Dict(dict) => Ok(dict.borrow().keys().cloned().collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(EvalError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// `a.b.c` style access path; leading, trailing or doubled dots disqualify.
pub(crate) fn is_dotted(name: &str) -> bool {
    name.contains('.') && name.split('.').all(|part| !part.is_empty())
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('.')
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`.
fn quoted_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} and {b}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}
