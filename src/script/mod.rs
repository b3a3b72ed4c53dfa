//! The snippet dialect: a Python-flavoured language used to execute the
//! visualization examples embedded in the documents. Snippets reach the
//! drawing functions through the `dsviz` module.

mod builtins;
mod error;
mod eval;
mod lexer;
mod ops;
mod parser;
mod value;

pub use builtins::{Builtin, MODULE_NAME, Module};
pub use error::{ErrorKind, ScriptError};
pub use eval::{Evaluator, MAX_CALL_DEPTH, MAX_STEPS};
pub use parser::{Stmt, parse_program};
pub use value::{MAX_SEQUENCE_LEN, Value};

use crate::draw::Toolkit;

/// Parses and runs one snippet in a fresh scope.
pub fn run_snippet(source: &str, toolkit: &mut Toolkit<'_>) -> Result<(), ScriptError> {
    let program = parse_program(source)?;
    Evaluator::new(toolkit).run(&program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::theme::Theme;

    #[test]
    fn snippets_do_not_share_names() {
        let mut sink = RecordingSink::new();
        let mut toolkit = Toolkit::new(&mut sink, Theme::classic());
        run_snippet("from dsviz import draw_array\nxs = [1]\n", &mut toolkit).unwrap();
        let err = run_snippet("draw_array(xs)\n", &mut toolkit).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Name(_)));
    }

    #[test]
    fn syntax_errors_surface_before_any_drawing() {
        let mut sink = RecordingSink::new();
        let mut toolkit = Toolkit::new(&mut sink, Theme::classic());
        let source = "from dsviz import draw_array\ndraw_array([1])\ndraw_array([2] 3)\n";
        let err = run_snippet(source, &mut toolkit).unwrap_err();
        assert_eq!(err.line, 3);
        drop(toolkit);
        assert!(sink.scenes.is_empty());
    }
}
