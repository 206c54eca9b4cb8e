//! Special forms: expressions whose head symbol changes how the rest of
//! the expression is evaluated.

use std::rc::Rc;

use vibe_types::{Form, FormKind};

use crate::builtins;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::{is_dotted, Evaluator};
use crate::value::{next_handle, Args, Class, Lambda, Value};

/// Names handled here rather than looked up in the environment.
pub const SPECIAL_FORMS: &[&str] = &[
    "and", "assert", "cond", "defclass", "defn", "do", "fn", "for", "if", "let", "lfor", "or",
    "raise", "setv", "when", "while",
];

impl Evaluator {
    /// Evaluate `(name args...)` if `name` is a special form.
    pub(crate) fn eval_special(&mut self, name: &str, args: &[Form]) -> Option<EvalResult<Value>> {
        let result = match name {
            "setv" => self.eval_setv(args),
            "defn" => self.eval_defn(args),
            "fn" => self.eval_fn(args),
            "if" => self.eval_if(args),
            "when" => self.eval_when(args),
            "cond" => self.eval_cond(args),
            "do" => self.eval_body(args),
            "let" => self.eval_let(args),
            "while" => self.eval_while(args),
            "for" => self.eval_for(args),
            "lfor" => self.eval_lfor(args),
            "and" => self.eval_and(args),
            "or" => self.eval_or(args),
            "defclass" => self.eval_defclass(args),
            "assert" => self.eval_assert(args),
            "raise" => self.eval_raise(args),
            _ => return None,
        };
        Some(result)
    }

    // ── Bindings ──────────────────────────────────────────────────────────

    fn eval_setv(&mut self, args: &[Form]) -> EvalResult<Value> {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(EvalError::syntax("setv needs an even number of arguments"));
        }
        for pair in args.chunks(2) {
            let value = self.eval_form(&pair[1])?;
            self.assign(&pair[0], value)?;
        }
        Ok(Value::None)
    }

    fn assign(&mut self, target: &Form, value: Value) -> EvalResult<()> {
        let Some(name) = target.as_symbol() else {
            return Err(EvalError::syntax(format!(
                "can't assign to a {}",
                target.describe()
            )));
        };
        if matches!(name, "None" | "True" | "False") {
            return Err(EvalError::syntax(format!("can't assign to constant {name}")));
        }
        if is_dotted(name) {
            if let Some((owner, attr)) = name.rsplit_once('.') {
                let owner = self.eval_symbol(owner)?;
                return self.set_attr(&owner, attr, value);
            }
        }
        if name.starts_with('.') || name.ends_with('.') {
            return Err(EvalError::syntax(format!("can't assign to {name}")));
        }
        self.env.define(name, value);
        Ok(())
    }

    fn eval_let(&mut self, args: &[Form]) -> EvalResult<Value> {
        let Some((bindings, body)) = args.split_first() else {
            return Err(EvalError::syntax("let needs a binding list"));
        };
        let FormKind::List(pairs) = &bindings.kind else {
            return Err(EvalError::syntax(format!(
                "let bindings must be a list, not a {}",
                bindings.describe()
            )));
        };
        if pairs.len() % 2 != 0 {
            return Err(EvalError::syntax("let needs an even number of binding forms"));
        }
        self.env.push_scope();
        let result = self.eval_let_scope(pairs, body);
        self.env.pop_scope();
        result
    }

    fn eval_let_scope(&mut self, pairs: &[Form], body: &[Form]) -> EvalResult<Value> {
        for pair in pairs.chunks(2) {
            let Some(name) = pair[0].as_symbol() else {
                return Err(EvalError::syntax(format!(
                    "can't bind to a {}",
                    pair[0].describe()
                )));
            };
            let value = self.eval_form(&pair[1])?;
            self.env.define(name, value);
        }
        self.eval_body(body)
    }

    // ── Functions and classes ─────────────────────────────────────────────

    fn eval_defn(&mut self, args: &[Form]) -> EvalResult<Value> {
        let [name_form, params, body @ ..] = args else {
            return Err(EvalError::syntax("defn needs a name and a parameter list"));
        };
        let Some(name) = name_form.as_symbol() else {
            return Err(EvalError::syntax(format!(
                "defn name must be a symbol, not a {}",
                name_form.describe()
            )));
        };
        let function = self.make_lambda(name, params, body, name_form.span.start_line)?;
        self.env.define(name, function);
        Ok(Value::None)
    }

    fn eval_fn(&mut self, args: &[Form]) -> EvalResult<Value> {
        let Some((params, body)) = args.split_first() else {
            return Err(EvalError::syntax("fn needs a parameter list"));
        };
        self.make_lambda("<lambda>", params, body, params.span.start_line)
    }

    fn make_lambda(&self, name: &str, params: &Form, body: &[Form], line: u32) -> EvalResult<Value> {
        let FormKind::List(items) = &params.kind else {
            return Err(EvalError::syntax(format!(
                "parameter list must be a list, not a {}",
                params.describe()
            )));
        };
        let params = items
            .iter()
            .map(|p| {
                p.as_symbol().map(str::to_string).ok_or_else(|| {
                    EvalError::syntax(format!("parameter must be a symbol, not a {}", p.describe()))
                })
            })
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(Value::Function(Rc::new(Lambda {
            name: name.to_string(),
            params,
            body: body.to_vec(),
            captured: self.env.local_scopes(),
            source: self.current_source(),
            line,
            handle: next_handle(),
        })))
    }

    /// `(defclass Name [Bases...] body...)`. Bindings made by the body
    /// become class attributes.
    fn eval_defclass(&mut self, args: &[Form]) -> EvalResult<Value> {
        let [name_form, bases_form, body @ ..] = args else {
            return Err(EvalError::syntax("defclass needs a name and a base list"));
        };
        let Some(name) = name_form.as_symbol() else {
            return Err(EvalError::syntax(format!(
                "class name must be a symbol, not a {}",
                name_form.describe()
            )));
        };
        let FormKind::List(base_forms) = &bases_form.kind else {
            return Err(EvalError::syntax("defclass bases must be a list"));
        };
        let mut bases = Vec::with_capacity(base_forms.len());
        for form in base_forms {
            match self.eval_form(form)? {
                Value::Class(class) => bases.push(class),
                other => {
                    return Err(EvalError::type_error(format!(
                        "bases must be classes, not '{}'",
                        other.type_name()
                    )))
                }
            }
        }

        let outer = self.env.local_scopes();
        self.env.push_scope();
        let result = self.eval_body(body);
        let scope = self.env.pop_scope().unwrap_or_default();
        result?;

        // Methods close over the scopes around the class, not the class body.
        let mut attrs = scope.into_bindings();
        for value in attrs.values_mut() {
            if let Value::Function(lambda) = value {
                *lambda = Rc::new(Lambda {
                    captured: outer.clone(),
                    ..(**lambda).clone()
                });
            }
        }
        let class = Class::new(name, bases, attrs);
        self.env.define(name, Value::Class(Rc::new(class)));
        Ok(Value::None)
    }

    // ── Control flow ──────────────────────────────────────────────────────

    fn eval_if(&mut self, args: &[Form]) -> EvalResult<Value> {
        match args {
            [test, then] => {
                if self.eval_form(test)?.is_truthy() {
                    self.eval_form(then)
                } else {
                    Ok(Value::None)
                }
            }
            [test, then, otherwise] => {
                if self.eval_form(test)?.is_truthy() {
                    self.eval_form(then)
                } else {
                    self.eval_form(otherwise)
                }
            }
            _ => Err(EvalError::syntax(
                "if needs a condition, a then-branch and at most one else-branch",
            )),
        }
    }

    fn eval_when(&mut self, args: &[Form]) -> EvalResult<Value> {
        let Some((test, body)) = args.split_first() else {
            return Err(EvalError::syntax("when needs a condition"));
        };
        if self.eval_form(test)?.is_truthy() {
            self.eval_body(body)
        } else {
            Ok(Value::None)
        }
    }

    fn eval_cond(&mut self, args: &[Form]) -> EvalResult<Value> {
        if args.len() % 2 != 0 {
            return Err(EvalError::syntax("cond needs an even number of arguments"));
        }
        for pair in args.chunks(2) {
            if self.eval_form(&pair[0])?.is_truthy() {
                return self.eval_form(&pair[1]);
            }
        }
        Ok(Value::None)
    }

    fn eval_while(&mut self, args: &[Form]) -> EvalResult<Value> {
        let Some((test, body)) = args.split_first() else {
            return Err(EvalError::syntax("while needs a condition"));
        };
        while self.eval_form(test)?.is_truthy() {
            self.eval_body(body)?;
        }
        Ok(Value::None)
    }

    /// `(for [x items] body...)`
    fn eval_for(&mut self, args: &[Form]) -> EvalResult<Value> {
        let Some((binding, body)) = args.split_first() else {
            return Err(EvalError::syntax("for needs a binding list"));
        };
        let FormKind::List(parts) = &binding.kind else {
            return Err(EvalError::syntax("for binding must be a list like [x items]"));
        };
        let [target, iterable] = parts.as_slice() else {
            return Err(EvalError::syntax("for binding must be a list like [x items]"));
        };
        let Some(name) = target.as_symbol() else {
            return Err(EvalError::syntax(format!("can't bind to a {}", target.describe())));
        };
        let iterable = self.eval_form(iterable)?;
        for item in self.iterate(&iterable)? {
            self.env.define(name, item);
            self.eval_body(body)?;
        }
        Ok(Value::None)
    }

    /// `(lfor x items expr)`
    fn eval_lfor(&mut self, args: &[Form]) -> EvalResult<Value> {
        let [target, iterable, expr] = args else {
            return Err(EvalError::syntax("lfor takes a name, an iterable and an expression"));
        };
        let Some(name) = target.as_symbol() else {
            return Err(EvalError::syntax(format!("can't bind to a {}", target.describe())));
        };
        let iterable = self.eval_form(iterable)?;
        let items = self.iterate(&iterable)?;
        self.env.push_scope();
        let result = items
            .into_iter()
            .map(|item| {
                self.env.define(name, item);
                self.eval_form(expr)
            })
            .collect::<EvalResult<Vec<_>>>();
        self.env.pop_scope();
        Ok(Value::list(result?))
    }

    fn eval_and(&mut self, args: &[Form]) -> EvalResult<Value> {
        let mut last = Value::Bool(true);
        for form in args {
            last = self.eval_form(form)?;
            if !last.is_truthy() {
                break;
            }
        }
        Ok(last)
    }

    fn eval_or(&mut self, args: &[Form]) -> EvalResult<Value> {
        let mut last = Value::None;
        for form in args {
            last = self.eval_form(form)?;
            if last.is_truthy() {
                break;
            }
        }
        Ok(last)
    }

    // ── Errors ────────────────────────────────────────────────────────────

    fn eval_assert(&mut self, args: &[Form]) -> EvalResult<Value> {
        let (test, message) = match args {
            [test] => (test, None),
            [test, message] => (test, Some(message)),
            _ => return Err(EvalError::syntax("assert takes a condition and an optional message")),
        };
        if self.eval_form(test)?.is_truthy() {
            return Ok(Value::None);
        }
        let message = match message {
            Some(form) => {
                let value = self.eval_form(form)?;
                self.to_display_string(&value)?
            }
            None => String::new(),
        };
        Err(EvalError::Assertion(message))
    }

    fn eval_raise(&mut self, args: &[Form]) -> EvalResult<Value> {
        let exc = match args {
            [exc] => exc,
            [] => {
                return Err(EvalError::Raised {
                    kind: "RuntimeError".into(),
                    message: "No active exception to reraise".into(),
                })
            }
            _ => return Err(EvalError::syntax("raise takes at most one argument")),
        };
        let value = match self.eval_form(exc)? {
            Value::Builtin(ctor) if builtins::is_exception_constructor(ctor.name) => {
                (ctor.func)(self, Args::default())?
            }
            other => other,
        };
        match value {
            Value::Exception(exc) => Err(EvalError::Raised {
                kind: exc.kind.clone(),
                message: exc.message.clone(),
            }),
            _ => Err(EvalError::type_error("exceptions must derive from BaseException")),
        }
    }
}
