//! Evaluator tests: arithmetic, bindings, functions, classes, output,
//! errors and frames.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use pretty_assertions::assert_eq;
use vibe_eval::{static_repr, EvalError, Evaluator, Fault, Origin, Streams, Value};
use vibe_lexer::Lexer;
use vibe_parser::Parser;
use vibe_types::{Form, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Buf(Rc<RefCell<Vec<u8>>>);

impl Write for Buf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Buf {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

struct Harness {
    ev: Evaluator,
    out: Buf,
    err: Buf,
    cells: u32,
}

impl Harness {
    fn new() -> Self {
        let out = Buf::default();
        let err = Buf::default();
        let ev = Evaluator::with_streams(Streams::new(out.clone(), err.clone()));
        Self { ev, out, err, cells: 0 }
    }

    fn forms(source: &SourceFile) -> Vec<Form> {
        let lex = Lexer::new(source).lex();
        assert!(!lex.errors.has_errors(), "lex errors: {:?}", lex.errors);
        let parsed = Parser::new(lex.tokens, source).parse();
        assert!(!parsed.errors.has_errors(), "parse errors: {:?}", parsed.errors);
        parsed.forms
    }

    /// Run a cell; the value of its last form.
    fn run(&mut self, code: &str) -> Result<Value, Fault> {
        self.cells += 1;
        let source = Rc::new(SourceFile::new(format!("<cell-{}>", self.cells), code));
        let mut last = Value::None;
        for form in Self::forms(&source) {
            last = self.ev.evaluate(&form, &source)?;
        }
        Ok(last)
    }

    fn value(&mut self, code: &str) -> Value {
        match self.run(code) {
            Ok(v) => v,
            Err(fault) => panic!("{code}: {}: {}", fault.kind(), fault.message()),
        }
    }

    fn repr(&mut self, code: &str) -> String {
        let value = self.value(code);
        self.ev.repr(&value).unwrap()
    }

    fn fault(&mut self, code: &str) -> Fault {
        match self.run(code) {
            Ok(v) => panic!("{code}: expected a fault, got {v:?}"),
            Err(fault) => fault,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Arithmetic and literals
// ─────────────────────────────────────────────────────────────────────

#[test]
fn variadic_addition() {
    let mut h = Harness::new();
    assert_eq!(h.value("(+ 1 2 3)"), Value::Int(6));
}

#[test]
fn mixed_arithmetic() {
    let mut h = Harness::new();
    assert_eq!(h.repr("(/ 7 2)"), "3.5");
    assert_eq!(h.repr("(// 7 2)"), "3");
    assert_eq!(h.repr("(* 2 3.0)"), "6.0");
    assert_eq!(h.repr("(% -7 3)"), "2");
    assert_eq!(h.repr("(- 10 1 2)"), "7");
}

#[test]
fn literals_repr() {
    let mut h = Harness::new();
    assert_eq!(h.repr("[1 \"two\" 3.0 None True]"), "[1, 'two', 3.0, None, True]");
    assert_eq!(h.repr("{\"a\" 1 \"b\" [2]}"), "{'a': 1, 'b': [2]}");
    assert_eq!(h.repr(":key"), ":key");
}

// ─────────────────────────────────────────────────────────────────────
// Bindings and scope
// ─────────────────────────────────────────────────────────────────────

#[test]
fn globals_persist_across_cells() {
    let mut h = Harness::new();
    h.value("(setv x 10)");
    assert_eq!(h.value("(* x 2)"), Value::Int(20));
}

#[test]
fn setv_pairs() {
    let mut h = Harness::new();
    h.value("(setv a 1 b (+ a 1))");
    assert_eq!(h.value("b"), Value::Int(2));
}

#[test]
fn let_is_local() {
    let mut h = Harness::new();
    assert_eq!(h.value("(let [x 2 y (* x 3)] (+ x y))"), Value::Int(8));
    assert_eq!(h.fault("x").kind(), "NameError");
}

#[test]
fn closures_capture_let_bindings() {
    let mut h = Harness::new();
    h.value("(setv add5 (let [n 5] (fn [x] (+ x n))))");
    assert_eq!(h.value("(add5 1)"), Value::Int(6));
}

// ─────────────────────────────────────────────────────────────────────
// Functions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn defn_then_call() {
    let mut h = Harness::new();
    assert_eq!(h.value("(defn square [x] (* x x))"), Value::None);
    assert_eq!(h.value("(square 5)"), Value::Int(25));
}

#[test]
fn recursion() {
    let mut h = Harness::new();
    h.value("(defn fact [n] (if (<= n 1) 1 (* n (fact (- n 1)))))");
    assert_eq!(h.value("(fact 10)"), Value::Int(3628800));
}

#[test]
fn arity_errors_read_like_python() {
    let mut h = Harness::new();
    h.value("(defn pair [a b] [a b])");
    let fault = h.fault("(pair 1)");
    assert_eq!(fault.kind(), "TypeError");
    assert_eq!(
        fault.message(),
        "pair() missing 1 required positional argument: 'b'"
    );
    let fault = h.fault("(pair 1 2 3)");
    assert_eq!(
        fault.message(),
        "pair() takes 2 positional arguments but 3 were given"
    );
}

#[test]
fn runaway_recursion_is_a_recursion_error() {
    let mut h = Harness::new();
    h.ev.set_max_depth(40);
    h.value("(defn forever [n] (forever (+ n 1)))");
    let fault = h.fault("(forever 0)");
    assert_eq!(fault.kind(), "RecursionError");
    assert_eq!(fault.frames.len(), 40);
    // The session keeps working afterwards.
    assert_eq!(h.value("(+ 1 1)"), Value::Int(2));
}

#[test]
fn default_depth_limit_is_reached_before_the_native_stack() {
    let mut h = Harness::new();
    h.value("(defn down [n] (if (< n 0) 0 (+ 1 (down (+ n 1)))))");
    let fault = h.fault("(down 0)");
    assert_eq!(fault.kind(), "RecursionError");
    assert_eq!(fault.frames.len(), vibe_eval::DEFAULT_MAX_DEPTH);
}

#[test]
fn higher_order_functions() {
    let mut h = Harness::new();
    h.value("(defn twice [f x] (f (f x)))");
    assert_eq!(h.value("(twice (fn [y] (* y 3)) 2)"), Value::Int(18));
}

// ─────────────────────────────────────────────────────────────────────
// Control flow
// ─────────────────────────────────────────────────────────────────────

#[test]
fn conditionals() {
    let mut h = Harness::new();
    assert_eq!(h.value("(if (> 2 1) \"yes\" \"no\")"), Value::str("yes"));
    assert_eq!(h.value("(when False 1)"), Value::None);
    assert_eq!(
        h.value("(cond (= 1 2) :a (= 1 1) :b True :c)"),
        Value::Keyword("b".into())
    );
}

#[test]
fn loops() {
    let mut h = Harness::new();
    h.value("(setv total 0)\n(for [i (range 5)] (setv total (+ total i)))");
    assert_eq!(h.value("total"), Value::Int(10));
    h.value("(setv n 0)\n(while (< n 3) (setv n (+ n 1)))");
    assert_eq!(h.value("n"), Value::Int(3));
    assert_eq!(h.repr("(lfor x [1 2 3] (* x x))"), "[1, 4, 9]");
}

#[test]
fn and_or_return_operands() {
    let mut h = Harness::new();
    assert_eq!(h.value("(and 1 0 2)"), Value::Int(0));
    assert_eq!(h.value("(or None \"\" \"x\")"), Value::str("x"));
    assert_eq!(h.value("(and)"), Value::Bool(true));
}

// ─────────────────────────────────────────────────────────────────────
// Objects
// ─────────────────────────────────────────────────────────────────────

#[test]
fn classes_methods_and_fields() {
    let mut h = Harness::new();
    h.value(
        "(defclass Counter []\n\
         (defn __init__ [self start] (setv self.count start))\n\
         (defn bump [self] (setv self.count (+ self.count 1)) self.count))",
    );
    h.value("(setv c (Counter 5))");
    assert_eq!(h.value("(.bump c)"), Value::Int(6));
    assert_eq!(h.value("(c.bump)"), Value::Int(7));
    assert_eq!(h.value("c.count"), Value::Int(7));
}

#[test]
fn inheritance() {
    let mut h = Harness::new();
    h.value("(defclass A [] (defn hello [self] \"from A\"))");
    h.value("(defclass B [A])");
    assert_eq!(h.value("(.hello (B))"), Value::str("from A"));
}

#[test]
fn instances_repr_as_placeholders_unless_hooked() {
    let mut h = Harness::new();
    h.value("(defclass P [])");
    let plain = h.repr("(P)");
    assert!(plain.starts_with("<__main__.P object at 0x"), "{plain}");

    h.value("(defclass Q [] (defn __repr__ [self] \"Q!\"))");
    assert_eq!(h.repr("(Q)"), "Q!");
    assert_eq!(h.repr("[(Q)]"), "[Q!]");
}

#[test]
fn native_methods() {
    let mut h = Harness::new();
    h.value("(setv xs [3 1])\n(.append xs 2)");
    assert_eq!(h.repr("(sorted xs)"), "[1, 2, 3]");
    assert_eq!(h.repr("(.split \"a b  c\")"), "['a', 'b', 'c']");
    assert_eq!(h.repr("(.join \", \" [\"x\" \"y\"])"), "'x, y'");
    assert_eq!(h.repr("(.get {\"k\" 1} \"z\" 0)"), "0");
    assert_eq!(h.repr("(.upper \"hi\")"), "'HI'");
}

#[test]
fn mutation_is_shared() {
    let mut h = Harness::new();
    h.value("(setv a [1])\n(setv b a)\n(.append b 2)");
    assert_eq!(h.repr("a"), "[1, 2]");
}

// ─────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────

#[test]
fn print_goes_to_primary_stream() {
    let mut h = Harness::new();
    h.value("(print \"hello\" 42)");
    h.value("(print 1 2 :sep \"-\" :end \"!\")");
    assert_eq!(h.out.text(), "hello 42\n1-2!");
    assert_eq!(h.err.text(), "");
}

#[test]
fn print_to_diagnostic_stream() {
    let mut h = Harness::new();
    h.value("(print \"warn\" :file sys.stderr)");
    assert_eq!(h.err.text(), "warn\n");
    assert_eq!(h.out.text(), "");
}

#[test]
fn print_uses_str_not_repr() {
    let mut h = Harness::new();
    h.value("(print \"a\" [\"b\"])");
    assert_eq!(h.out.text(), "a ['b']\n");
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn common_error_kinds() {
    let mut h = Harness::new();
    let cases = [
        ("undefined-thing", "NameError", "name 'undefined-thing' is not defined"),
        ("(/ 1 0)", "ZeroDivisionError", "division by zero"),
        ("(+ 1 \"a\")", "TypeError", "unsupported operand type(s) for +: 'int' and 'str'"),
        ("(get [1] 5)", "IndexError", "list index out of range"),
        ("(get {} \"k\")", "KeyError", "'k'"),
        ("(int \"x\")", "ValueError", "invalid literal for int() with base 10: 'x'"),
        ("(5 1)", "TypeError", "'int' object is not callable"),
        ("(assert (= 1 2) \"nope\")", "AssertionError", "nope"),
        ("(raise (ValueError \"bad input\"))", "ValueError", "bad input"),
    ];
    for (code, kind, message) in cases {
        let fault = h.fault(code);
        assert_eq!((fault.kind(), fault.message().as_str()), (kind, message), "{code}");
    }
}

#[test]
fn malformed_special_form_is_a_syntax_error() {
    let mut h = Harness::new();
    let fault = h.fault("(setv x)");
    assert!(matches!(fault.error, EvalError::Syntax(_)));
}

#[test]
fn fault_frames_point_at_the_failing_line() {
    let mut h = Harness::new();
    h.value("(defn bad [x]\n  (+ x undefined-y))");
    let fault = h.fault("(bad 1)");
    let frames: Vec<(&str, u32)> = fault
        .frames
        .iter()
        .map(|f| (f.name.as_str(), f.line))
        .collect();
    assert_eq!(frames, vec![("<module>", 1), ("bad", 2)]);
    assert_eq!(fault.frames[1].file(), "<cell-1>");
    assert_eq!(fault.frames[1].source_line(), Some("  (+ x undefined-y))"));
    assert!(fault.frames.iter().all(|f| f.origin == Origin::Guest));
}

#[test]
fn host_frames_are_tagged_and_filtered() {
    let mut h = Harness::new();
    let tag = h.ev.enter_host("execute");
    let fault = h.fault("(undefined)");
    h.ev.leave_host(tag);

    assert_eq!(fault.frames[0].origin, Origin::Host);
    let guest: Vec<_> = fault.guest_frames(tag).map(|f| f.name.as_str()).collect();
    assert_eq!(guest, vec!["<module>"]);
    assert_eq!(h.ev.stack_depth(), 0);
}

#[test]
fn failed_let_does_not_leak_scope() {
    let mut h = Harness::new();
    h.fault("(let [tmp 1] (undefined))");
    assert_eq!(h.fault("tmp").kind(), "NameError");
}

#[test]
fn static_repr_never_runs_hooks() {
    let mut h = Harness::new();
    h.value("(defclass Loud [] (defn __repr__ [self] (print \"side effect\") \"loud\"))");
    let value = h.value("(Loud)");
    let text = static_repr(&value);
    assert!(text.starts_with("<__main__.Loud object"), "{text}");
    assert_eq!(h.out.text(), "");
}

#[test]
fn oversized_results_are_memory_errors() {
    let mut h = Harness::new();
    h.value("(setv s (* \"a\" 20000))");
    assert_eq!(h.fault("(.replace s \"\" s)").kind(), "MemoryError");
    assert_eq!(h.fault("(* [s] 20000000)").kind(), "MemoryError");
    assert_eq!(h.repr("(.replace \"ab\" \"\" \"-\")"), "'-a-b-'");
    assert_eq!(h.repr("(len s)"), "20000");
}
