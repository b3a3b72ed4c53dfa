use thiserror::Error;

use crate::draw::DrawError;

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("name '{0}' is not defined")]
    Name(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("index error: {0}")]
    Index(String),
    #[error("key error: {0}")]
    Key(String),
    #[error("attribute error: {0}")]
    Attribute(String),
    #[error("no module named '{0}'")]
    ModuleNotFound(String),
    #[error("cannot import name '{name}' from '{module}'")]
    Import { module: String, name: String },
    #[error("value error: {0}")]
    Value(String),
    #[error("division by zero")]
    ZeroDivision,
    #[error("assertion failed: {0}")]
    Assertion(String),
    /// Raised by the snippet itself with `raise`.
    #[error("{name}: {message}")]
    Raised { name: String, message: String },
    #[error("limit exceeded: {0}")]
    Limit(String),
    #[error("draw error: {0}")]
    Draw(#[from] DrawError),
}

/// An error raised while parsing or running a snippet, tied to a source line.
/// Line 0 means the line is not known yet.
#[derive(Debug, Error)]
#[error("line {line}: {kind}")]
pub struct ScriptError {
    pub line: usize,
    #[source]
    pub kind: ErrorKind,
}

impl ScriptError {
    pub fn new(line: usize, kind: ErrorKind) -> Self {
        Self { line, kind }
    }

    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::new(line, ErrorKind::Syntax(message.into()))
    }

    /// Fills in the line unless an inner statement already did.
    pub fn located(mut self, line: usize) -> Self {
        if self.line == 0 {
            self.line = line;
        }
        self
    }

    /// Renders the error with the offending source line underneath.
    pub fn diagnostic(&self, source: &str) -> String {
        let mut out = format!("error: {}\n --> snippet line {}\n", self.kind, self.line);
        if let Some(text) = source.lines().nth(self.line.saturating_sub(1)) {
            let gutter = self.line.to_string();
            let pad = " ".repeat(gutter.len());
            out.push_str(&format!("{pad} |\n{gutter} | {text}\n"));
        }
        out
    }
}

impl From<ErrorKind> for ScriptError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(0, kind)
    }
}

impl From<DrawError> for ScriptError {
    fn from(err: DrawError) -> Self {
        Self::new(0, ErrorKind::Draw(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_quotes_source_line() {
        let err = ScriptError::new(2, ErrorKind::Name("draw_arry".to_string()));
        let text = err.diagnostic("from dsviz import draw_array\ndraw_arry([1])\n");
        assert!(text.contains("name 'draw_arry' is not defined"));
        assert!(text.contains("snippet line 2"));
        assert!(text.contains("2 | draw_arry([1])"));
    }

    #[test]
    fn located_keeps_the_innermost_line() {
        let err = ScriptError::from(ErrorKind::ZeroDivision).located(4).located(2);
        assert_eq!(err.line, 4);
        assert_eq!(err.to_string(), "line 4: division by zero");
    }

    #[test]
    fn diagnostic_without_matching_line() {
        let err = ScriptError::syntax(9, "unexpected end of input");
        let text = err.diagnostic("x = 1");
        assert!(text.starts_with("error: syntax error: unexpected end of input"));
        assert!(!text.contains(" | "));
    }
}
