//! Execute cycle tests: counting, capture, presentation and error reports.

use pretty_assertions::assert_eq;
use serde_json::json;
use vibe_eval::Value;
use vibe_kernel::{
    CaptureScope, ExecuteReply, ExecuteRequest, KernelConfig, KernelError, RecordingTransport,
    Session,
};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn run(session: &mut Session, transport: &mut RecordingTransport, code: &str) -> ExecuteReply {
    session.execute(&ExecuteRequest::new(code), transport)
}

fn plain_result(transport: &RecordingTransport) -> Option<String> {
    transport
        .of_type("execute_result")
        .last()
        .map(|m| m.content["data"]["text/plain"].as_str().unwrap().to_string())
}

fn traceback(transport: &RecordingTransport) -> Vec<String> {
    let errors = transport.of_type("error");
    assert_eq!(errors.len(), 1, "expected exactly one error message");
    serde_json::from_value(errors[0].content["traceback"].clone()).unwrap()
}

// ─────────────────────────────────────────────────────────────────────
// Results and counting
// ─────────────────────────────────────────────────────────────────────

#[test]
fn arithmetic_result_is_displayed() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let reply = run(&mut session, &mut transport, "(+ 1 2 3)");
    assert_eq!(reply, ExecuteReply::ok(1));
    assert_eq!(transport.msg_types(), vec!["execute_result"]);
    assert_eq!(
        transport.messages[0].content,
        json!({
            "execution_count": 1,
            "data": {"text/plain": "6"},
            "metadata": {},
        })
    );
}

#[test]
fn definitions_persist_between_submissions() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let reply = run(&mut session, &mut transport, "(defn square [x] (* x x))");
    assert_eq!(reply, ExecuteReply::ok(1));
    assert!(transport.messages.is_empty());

    let reply = run(&mut session, &mut transport, "(square 5)");
    assert_eq!(reply, ExecuteReply::ok(2));
    assert_eq!(plain_result(&transport).as_deref(), Some("25"));
}

#[test]
fn only_the_last_unit_is_displayed() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, "(setv xs [1 2])\n(.append xs 3)\nxs");
    assert_eq!(transport.of_type("execute_result").len(), 1);
    assert_eq!(plain_result(&transport).as_deref(), Some("[1, 2, 3]"));
}

#[test]
fn none_results_are_not_displayed() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let reply = run(&mut session, &mut transport, "(setv x 10)");
    assert!(reply.is_ok());
    assert!(transport.of_type("execute_result").is_empty());
}

#[test]
fn empty_code_does_not_advance_the_counter() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    assert_eq!(run(&mut session, &mut transport, "   \n"), ExecuteReply::ok(0));
    assert_eq!(run(&mut session, &mut transport, "1"), ExecuteReply::ok(1));
    assert_eq!(run(&mut session, &mut transport, ""), ExecuteReply::ok(1));
    assert_eq!(session.execution_count(), 1);
}

#[test]
fn errors_still_advance_the_counter() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let reply = run(&mut session, &mut transport, "(/ 1 0)");
    assert_eq!(reply.execution_count(), 1);
    assert_eq!(reply.ename(), Some("ZeroDivisionError"));
    assert_eq!(run(&mut session, &mut transport, "2").execution_count(), 2);
}

// ─────────────────────────────────────────────────────────────────────
// Syntax errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn unbalanced_input_is_a_parse_error() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let reply = run(&mut session, &mut transport, "(+ 1 2");

    assert_eq!(reply.ename(), Some("ParseError"));
    assert_eq!(reply.execution_count(), 0);
    let ExecuteReply::Error { traceback: record, .. } = &reply else {
        panic!("expected an error reply");
    };
    assert!(record.is_empty());

    let trace = traceback(&transport);
    assert_eq!(trace.len(), 3);
    assert_eq!(trace[0], "  File \"<input>\", line 1");
    assert_eq!(trace[1], "    (+ 1 2");
    assert!(trace[2].starts_with("ParseError: "));
}

#[test]
fn parse_errors_run_nothing() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, "(setv a 1)\n(print a))");
    assert!(session.evaluator().env.get("a").is_none());
    assert!(transport.of_type("stream").is_empty());
}

// ─────────────────────────────────────────────────────────────────────
// Guest errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn failure_stops_later_units_and_keeps_earlier_effects() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let reply = run(
        &mut session,
        &mut transport,
        "(setv a 1)\n(print \"partial\")\nnope\n(setv b 2)",
    );
    assert_eq!(
        reply,
        ExecuteReply::error(1, "NameError", "name 'nope' is not defined")
    );

    let env = &session.evaluator().env;
    assert_eq!(env.get("a"), Some(&Value::Int(1)));
    assert!(env.get("b").is_none());
    // Output captured before the failure is dropped.
    assert_eq!(transport.msg_types(), vec!["error"]);
}

#[test]
fn name_error_trace_has_no_host_frames() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, "nope");
    let trace = traceback(&transport);
    assert_eq!(
        trace,
        vec![
            "Traceback (most recent call last):".to_string(),
            "  File \"<cell-1>\", line 1, in <module>".to_string(),
            "    nope".to_string(),
            "NameError: name 'nope' is not defined".to_string(),
        ]
    );
    assert!(trace.iter().all(|line| !line.contains("<host>")));
}

#[test]
fn trace_names_guest_functions() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, "(defn boom []\n  (get {} \"k\"))");
    transport.clear();
    run(&mut session, &mut transport, "(boom)");
    let trace = traceback(&transport);
    assert_eq!(trace.first().map(String::as_str), Some("Traceback (most recent call last):"));
    assert!(trace.contains(&"  File \"<cell-1>\", line 2, in boom".to_string()));
    assert_eq!(trace.last().map(String::as_str), Some("KeyError: 'k'"));
}

const RUNAWAY: &str = "(defn down [n] (if (< n 0) 0 (+ 1 (down (+ n 1)))))";

#[test]
fn runaway_recursion_is_reported() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, RUNAWAY);
    let reply = run(&mut session, &mut transport, "(down 0)");
    assert_eq!(reply.ename(), Some("RecursionError"));

    // The session is usable afterwards.
    let reply = run(&mut session, &mut transport, "(+ 1 1)");
    assert!(reply.is_ok());
    assert_eq!(plain_result(&transport).as_deref(), Some("2"));
}

#[test]
fn deep_configured_recursion_is_reported() {
    let config = KernelConfig {
        max_call_depth: 3_000,
        ..KernelConfig::default()
    };
    let mut session = Session::with_config(config);
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, RUNAWAY);
    let reply = run(&mut session, &mut transport, "(down 0)");
    assert_eq!(reply.ename(), Some("RecursionError"));

    // Deep but within the limit.
    run(&mut session, &mut transport, "(defn depth [n] (if (= n 0) 0 (+ 1 (depth (- n 1)))))");
    let reply = run(&mut session, &mut transport, "(depth 2500)");
    assert!(reply.is_ok());
    assert_eq!(plain_result(&transport).as_deref(), Some("2500"));
}

#[test]
fn raised_exceptions_carry_kind_and_message() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let reply = run(&mut session, &mut transport, "(raise (ValueError \"bad value\"))");
    assert_eq!(reply.ename(), Some("ValueError"));
    assert_eq!(reply.evalue(), Some("bad value"));
}

// ─────────────────────────────────────────────────────────────────────
// Output streams
// ─────────────────────────────────────────────────────────────────────

#[test]
fn print_goes_to_stdout_stream() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, "(print \"hello\" 42)");
    assert_eq!(transport.msg_types(), vec!["stream"]);
    assert_eq!(
        transport.messages[0].content,
        json!({"name": "stdout", "text": "hello 42\n"})
    );
}

#[test]
fn stderr_output_is_a_separate_stream() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(
        &mut session,
        &mut transport,
        "(print \"out\")\n(print \"warn\" :file sys.stderr)\n7",
    );
    assert_eq!(transport.msg_types(), vec!["stream", "stream", "execute_result"]);
    assert_eq!(transport.messages[0].content["name"], "stdout");
    assert_eq!(transport.messages[1].content, json!({"name": "stderr", "text": "warn\n"}));
}

#[test]
fn output_is_captured_per_submission() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, "(print 1)");
    transport.clear();
    run(&mut session, &mut transport, "(print 2)");
    assert_eq!(transport.messages[0].content["text"], "2\n");
    assert!(!session.evaluator().streams().is_redirected());
}

#[test]
fn nested_capture_is_rejected() {
    let session = Session::new();
    let streams = session.evaluator().streams();
    let outer = CaptureScope::begin(streams).unwrap();
    assert!(matches!(
        CaptureScope::begin(streams),
        Err(KernelError::CaptureActive)
    ));
    drop(outer);
    assert!(!streams.is_redirected());
}

#[test]
fn kernel_fault_is_an_internal_error_reply() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let streams = session.evaluator().streams().clone();
    let held = CaptureScope::begin(&streams).unwrap();

    let reply = run(&mut session, &mut transport, "(+ 1 2)");
    assert_eq!(
        reply,
        ExecuteReply::error(1, "InternalError", "output capture is already active")
    );
    assert_eq!(transport.msg_types(), vec!["error"]);
    assert_eq!(
        traceback(&transport),
        vec!["InternalError: output capture is already active".to_string()]
    );

    // Once the outside capture ends the session carries on.
    drop(held);
    transport.clear();
    let reply = run(&mut session, &mut transport, "(+ 1 1)");
    assert_eq!(reply, ExecuteReply::ok(2));
    assert_eq!(plain_result(&transport).as_deref(), Some("2"));
}

// ─────────────────────────────────────────────────────────────────────
// Presentation
// ─────────────────────────────────────────────────────────────────────

#[test]
fn rich_display_hook_adds_html() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(
        &mut session,
        &mut transport,
        "(defclass Card []\n  (defn _repr_html_ [self] \"<b>card</b>\"))",
    );
    run(&mut session, &mut transport, "(Card)");
    let result = transport.of_type("execute_result")[0];
    assert_eq!(result.content["data"]["text/html"], "<b>card</b>");
    let plain = result.content["data"]["text/plain"].as_str().unwrap();
    assert!(plain.starts_with("<__main__.Card at 0x"), "{plain}");
}

#[test]
fn repr_hook_drives_plain_text() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(
        &mut session,
        &mut transport,
        "(defclass Point []\n  (defn __init__ [self x] (setv self.x x))\n  (defn __repr__ [self] (+ \"Point(\" (str self.x) \")\")))",
    );
    run(&mut session, &mut transport, "(Point 3)");
    assert_eq!(plain_result(&transport).as_deref(), Some("Point(3)"));
}

#[test]
fn functions_show_a_placeholder() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, "(fn [x] x)");
    let plain = plain_result(&transport).unwrap();
    assert!(plain.starts_with("<builtins.function at 0x"), "{plain}");
}

#[test]
fn strings_use_python_repr() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, "\"it's\"");
    assert_eq!(plain_result(&transport).as_deref(), Some("\"it's\""));
}

// ─────────────────────────────────────────────────────────────────────
// Silent mode
// ─────────────────────────────────────────────────────────────────────

#[test]
fn silent_runs_match_loud_runs_without_messages() {
    let cells = [
        "(defn f [x] (print x) (* x 2))",
        "(f 21)",
        "(f undefined)",
        "(+ 1",
    ];
    let mut loud = Session::new();
    let mut quiet = Session::new();
    let mut loud_transport = RecordingTransport::new();
    let mut quiet_transport = RecordingTransport::new();
    for code in cells {
        let a = loud.execute(&ExecuteRequest::new(code), &mut loud_transport);
        let b = quiet.execute(&ExecuteRequest::new(code).silent(true), &mut quiet_transport);
        assert_eq!(a, b, "{code}");
    }
    assert_eq!(loud.execution_count(), quiet.execution_count());
    assert!(!loud_transport.messages.is_empty());
    assert!(quiet_transport.messages.is_empty());
}

// ─────────────────────────────────────────────────────────────────────
// Read-only requests
// ─────────────────────────────────────────────────────────────────────

#[test]
fn completion_and_inspection_do_not_touch_state() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, "(setv counter-total 5)\n(defn count-up [] 1)");

    let reply = session.complete("(cou", 4);
    assert_eq!(reply.matches, vec!["count-up".to_string(), "counter-total".to_string()]);
    let reply = session.inspect("counter-total", 3, 0);
    assert_eq!(reply.data["text/plain"], "counter-total: int = 5");
    session.is_complete("(count-up");

    assert_eq!(session.execution_count(), 1);
}

#[test]
fn completes_instance_attributes() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(
        &mut session,
        &mut transport,
        "(defclass Box []\n  (defn __init__ [self] (setv self.width 1))\n  (defn weigh [self] 2))\n(setv b (Box))",
    );
    let reply = session.complete("b.w", 3);
    assert_eq!(reply.matches, vec!["b.weigh".to_string(), "b.width".to_string()]);
    assert_eq!((reply.cursor_start, reply.cursor_end), (0, 3));
}

// ─────────────────────────────────────────────────────────────────────
// Resource limits
// ─────────────────────────────────────────────────────────────────────

const DEEP_LIST: &str = "(setv a [])\n(for [i (range 100000)] (setv a [a]))";

#[test]
fn deeply_nested_result_falls_back_to_placeholder() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    run(&mut session, &mut transport, DEEP_LIST);

    let reply = run(&mut session, &mut transport, "a");
    assert_eq!(reply, ExecuteReply::ok(2));
    assert_eq!(plain_result(&transport).as_deref(), Some("<builtins.list object>"));

    transport.clear();
    let reply = run(&mut session, &mut transport, "(print a)");
    assert_eq!(reply.ename(), Some("RecursionError"));

    let reply = session.inspect("a", 1, 0);
    let text = &reply.data["text/plain"];
    assert!(text.starts_with("a: list = [[[["), "{text}");
    assert!(text.ends_with("]]]]"), "{text}");

    // Rebinding drops the old chain in one go.
    let reply = run(&mut session, &mut transport, "(setv a 0)\n(+ a 1)");
    assert!(reply.is_ok());
}

#[test]
fn huge_repetition_is_a_guest_error() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let reply = run(&mut session, &mut transport, "(* [1 2] 4611686018427387904)");
    assert_eq!(reply.ename(), Some("MemoryError"));
    let reply = run(&mut session, &mut transport, "(* \"ab\" 100000000000000)");
    assert_eq!(reply.ename(), Some("MemoryError"));

    let reply = run(&mut session, &mut transport, "(len (* [0] 3))");
    assert!(reply.is_ok());
    assert_eq!(plain_result(&transport).as_deref(), Some("3"));
}

#[test]
fn comparing_self_referencing_lists_is_a_recursion_error() {
    let mut session = Session::new();
    let mut transport = RecordingTransport::new();
    let reply = run(
        &mut session,
        &mut transport,
        "(setv a [])\n(.append a a)\n(setv b [])\n(.append b b)\n(= a b)",
    );
    assert_eq!(reply.ename(), Some("RecursionError"));
    let reply = run(&mut session, &mut transport, "(= a a)");
    assert!(reply.is_ok());
    assert_eq!(plain_result(&transport).as_deref(), Some("True"));
}
