//! vibekernel tree-walking evaluator.
//!
//! Evaluates parsed [`vibe_types::Form`]s for a Hy-flavoured Lisp with
//! Python value semantics. One [`Evaluator`] is one session: globals
//! persist between calls to [`Evaluator::evaluate`], and output from
//! `print` goes through swappable [`Streams`].

pub mod builtins;
pub mod display;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod io;
pub mod methods;
pub mod ops;
pub mod special_forms;
pub mod trace;
pub mod value;

pub use display::static_repr;
pub use env::{Environment, Scope};
pub use error::{EvalError, EvalResult};
pub use evaluator::{Evaluator, DEFAULT_MAX_DEPTH, MAX_DEPTH_CEILING};
pub use io::{StreamName, Streams, Target};
pub use special_forms::SPECIAL_FORMS;
pub use trace::{BoundaryTag, Fault, Frame, Origin};
pub use value::{checked_eq, Args, List, Value};

/// Guest language version reported to front ends.
pub const LANGUAGE_VERSION: &str = "1.0.0";
