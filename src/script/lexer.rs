use super::error::ScriptError;

const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    /// An f-string, already split into literal text and `{…}` fields.
    FStr(Vec<FPiece>),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Arrow,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    DoubleSlashAssign,
    PercentAssign,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FPiece {
    Text(String),
    Field {
        source: String,
        conversion: Option<char>,
        spec: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    indents: Vec<usize>,
    tokens: Vec<Token>,
}

/// Splits snippet source into tokens. Indentation becomes `Indent`/`Dedent`;
/// line breaks inside brackets are ignored.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        depth: 0,
        indents: vec![0],
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn run(&mut self) -> Result<(), ScriptError> {
        let mut at_line_start = true;
        loop {
            if at_line_start && self.depth == 0 {
                if !self.indentation()? {
                    break;
                }
                at_line_start = false;
            }
            let Some(ch) = self.peek() else {
                break;
            };
            match ch {
                ' ' | '\t' | '\r' => self.pos += 1,
                '#' => self.skip_comment(),
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push(Tok::Newline);
                        at_line_start = true;
                    }
                    self.line += 1;
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '0'..='9' => self.number()?,
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number()?,
                '"' | '\'' => self.string(ch, false, false)?,
                c if c == '_' || c.is_alphabetic() => self.ident_or_prefixed_string()?,
                '(' | '[' | '{' => {
                    self.depth += 1;
                    self.push(match ch {
                        '(' => Tok::LParen,
                        '[' => Tok::LBracket,
                        _ => Tok::LBrace,
                    });
                    self.pos += 1;
                }
                ')' | ']' | '}' => {
                    if self.depth == 0 {
                        return Err(ScriptError::syntax(self.line, format!("unmatched '{ch}'")));
                    }
                    self.depth -= 1;
                    self.push(match ch {
                        ')' => Tok::RParen,
                        ']' => Tok::RBracket,
                        _ => Tok::RBrace,
                    });
                    self.pos += 1;
                }
                _ => self.operator(ch)?,
            }
        }

        if self.depth > 0 {
            return Err(ScriptError::syntax(
                self.line,
                "unexpected end of input inside brackets",
            ));
        }
        if !matches!(
            self.tokens.last().map(|t| &t.tok),
            None | Some(Tok::Newline)
        ) {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::Eof);
        Ok(())
    }

    fn operator(&mut self, ch: char) -> Result<(), ScriptError> {
        let next = self.peek_at(1);
        let after = self.peek_at(2);
        let (tok, width) = match (ch, next, after) {
            ('/', Some('/'), Some('=')) => (Tok::DoubleSlashAssign, 3),
            ('/', Some('/'), _) => (Tok::DoubleSlash, 2),
            ('/', Some('='), _) => (Tok::SlashAssign, 2),
            ('/', _, _) => (Tok::Slash, 1),
            ('*', Some('*'), _) => (Tok::DoubleStar, 2),
            ('*', Some('='), _) => (Tok::StarAssign, 2),
            ('*', _, _) => (Tok::Star, 1),
            ('+', Some('='), _) => (Tok::PlusAssign, 2),
            ('+', _, _) => (Tok::Plus, 1),
            ('-', Some('='), _) => (Tok::MinusAssign, 2),
            ('-', Some('>'), _) => (Tok::Arrow, 2),
            ('-', _, _) => (Tok::Minus, 1),
            ('%', Some('='), _) => (Tok::PercentAssign, 2),
            ('%', _, _) => (Tok::Percent, 1),
            ('<', Some('='), _) => (Tok::Le, 2),
            ('<', _, _) => (Tok::Lt, 1),
            ('>', Some('='), _) => (Tok::Ge, 2),
            ('>', _, _) => (Tok::Gt, 1),
            ('=', Some('='), _) => (Tok::EqEq, 2),
            ('=', _, _) => (Tok::Assign, 1),
            ('!', Some('='), _) => (Tok::NotEq, 2),
            (',', _, _) => (Tok::Comma, 1),
            (':', _, _) => (Tok::Colon, 1),
            (';', _, _) => (Tok::Semicolon, 1),
            ('.', _, _) => (Tok::Dot, 1),
            (other, _, _) => {
                return Err(ScriptError::syntax(
                    self.line,
                    format!("unexpected character '{other}'"),
                ));
            }
        };
        self.push(tok);
        self.pos += width;
        Ok(())
    }

    /// Measures the indentation of the next non-blank line and emits
    /// `Indent`/`Dedent`. Returns `false` at end of input.
    fn indentation(&mut self) -> Result<bool, ScriptError> {
        loop {
            let mut width = 0;
            while let Some(ch) = self.peek() {
                match ch {
                    ' ' => width += 1,
                    '\t' => width += TAB_WIDTH,
                    '\r' => {}
                    _ => break,
                }
                self.pos += 1;
            }
            match self.peek() {
                None => return Ok(false),
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {}
            }

            let current = self.indents.last().copied().unwrap_or(0);
            if width > current {
                self.indents.push(width);
                self.push(Tok::Indent);
            } else {
                while width < self.indents.last().copied().unwrap_or(0) {
                    self.indents.pop();
                    self.push(Tok::Dedent);
                }
                if width != self.indents.last().copied().unwrap_or(0) {
                    return Err(ScriptError::syntax(
                        self.line,
                        "unindent does not match any outer indentation level",
                    ));
                }
            }
            return Ok(true);
        }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<(), ScriptError> {
        let start = self.pos;
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' | '_' => {}
                '.' if !seen_dot && !seen_exp => seen_dot = true,
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    if matches!(self.peek_at(1), Some('+') | Some('-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let value = text
            .parse::<f64>()
            .map_err(|_| ScriptError::syntax(self.line, format!("invalid number '{text}'")))?;
        self.push(Tok::Number(value));
        Ok(())
    }

    /// Reads a string literal starting at the opening quote. Triple-quoted
    /// literals may span lines; the token keeps the line it started on.
    fn string(&mut self, quote: char, raw: bool, format: bool) -> Result<(), ScriptError> {
        let start_line = self.line;
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };
        let mut value = String::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(ScriptError::syntax(start_line, "unterminated string literal"));
            };
            if ch == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }
            self.pos += 1;
            match ch {
                '\n' if !triple => {
                    return Err(ScriptError::syntax(start_line, "unterminated string literal"));
                }
                '\n' => {
                    self.line += 1;
                    value.push('\n');
                }
                '\\' if !raw => {
                    let Some(escaped) = self.peek() else {
                        return Err(ScriptError::syntax(start_line, "unterminated string literal"));
                    };
                    self.pos += 1;
                    match escaped {
                        '\n' => self.line += 1,
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' | '\'' | '"' => value.push(escaped),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                c => value.push(c),
            }
        }
        let tok = if format {
            Tok::FStr(split_format_string(&value, start_line)?)
        } else {
            Tok::Str(value)
        };
        self.tokens.push(Token {
            tok,
            line: start_line,
        });
        Ok(())
    }

    fn ident_or_prefixed_string(&mut self) -> Result<(), ScriptError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '_' || ch.is_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if let Some(quote @ ('"' | '\'')) = self.peek() {
            let prefix = name.to_ascii_lowercase();
            if matches!(prefix.as_str(), "f" | "r" | "rf" | "fr") {
                return self.string(quote, prefix.contains('r'), prefix.contains('f'));
            }
        }
        self.push(Tok::Ident(name));
        Ok(())
    }
}

/// Splits the body of an f-string into text and `{expr!c:spec}` fields.
fn split_format_string(text: &str, line: usize) -> Result<Vec<FPiece>, ScriptError> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '}' => {
                return Err(ScriptError::syntax(
                    line,
                    "f-string: single '}' is not allowed",
                ));
            }
            '{' => {
                if !literal.is_empty() {
                    pieces.push(FPiece::Text(std::mem::take(&mut literal)));
                }
                let (piece, next) = format_field(&chars, i + 1, line)?;
                pieces.push(piece);
                i = next;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        pieces.push(FPiece::Text(literal));
    }
    Ok(pieces)
}

/// Reads one replacement field starting after its `{`. Returns the field and
/// the position after the closing `}`.
fn format_field(
    chars: &[char],
    start: usize,
    line: usize,
) -> Result<(FPiece, usize), ScriptError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = start;
    let mut source_end = None;
    let mut conversion = None;
    while i < chars.len() {
        let ch = chars[i];
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' if depth > 0 => depth -= 1,
            '!' if depth == 0 && chars.get(i + 1) != Some(&'=') => {
                source_end = Some(i);
                conversion = chars.get(i + 1).copied();
                i += 2;
                break;
            }
            ':' | '}' if depth == 0 => {
                source_end = Some(i);
                break;
            }
            _ => {}
        }
        i += 1;
    }
    let Some(end) = source_end else {
        return Err(ScriptError::syntax(line, "f-string: expecting '}'"));
    };
    let source: String = chars[start..end].iter().collect();
    if source.trim().is_empty() {
        return Err(ScriptError::syntax(line, "f-string: empty expression not allowed"));
    }
    let mut spec = None;
    if chars.get(i) == Some(&':') {
        let spec_start = i + 1;
        let mut j = spec_start;
        while j < chars.len() && chars[j] != '}' {
            j += 1;
        }
        spec = Some(chars[spec_start..j.min(chars.len())].iter().collect());
        i = j;
    }
    if chars.get(i) != Some(&'}') {
        return Err(ScriptError::syntax(line, "f-string: expecting '}'"));
    }
    Ok((
        FPiece::Field {
            source,
            conversion,
            spec,
        },
        i + 1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(source: &str) -> Vec<Tok> {
        tokenize(source).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn call_with_keyword() {
        assert_eq!(
            toks("draw_array([1, 2.5], title='A')"),
            vec![
                Tok::Ident("draw_array".into()),
                Tok::LParen,
                Tok::LBracket,
                Tok::Number(1.0),
                Tok::Comma,
                Tok::Number(2.5),
                Tok::RBracket,
                Tok::Comma,
                Tok::Ident("title".into()),
                Tok::Assign,
                Tok::Str("A".into()),
                Tok::RParen,
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn comparison_and_augmented_operators() {
        assert_eq!(
            toks("a[j] > a[j + 1] <= b != c == d >= e < f"),
            vec![
                Tok::Ident("a".into()),
                Tok::LBracket,
                Tok::Ident("j".into()),
                Tok::RBracket,
                Tok::Gt,
                Tok::Ident("a".into()),
                Tok::LBracket,
                Tok::Ident("j".into()),
                Tok::Plus,
                Tok::Number(1.0),
                Tok::RBracket,
                Tok::Le,
                Tok::Ident("b".into()),
                Tok::NotEq,
                Tok::Ident("c".into()),
                Tok::EqEq,
                Tok::Ident("d".into()),
                Tok::Ge,
                Tok::Ident("e".into()),
                Tok::Lt,
                Tok::Ident("f".into()),
                Tok::Newline,
                Tok::Eof,
            ]
        );
        assert_eq!(
            toks("i += 1; n //= 2; x = 2 ** 3"),
            vec![
                Tok::Ident("i".into()),
                Tok::PlusAssign,
                Tok::Number(1.0),
                Tok::Semicolon,
                Tok::Ident("n".into()),
                Tok::DoubleSlashAssign,
                Tok::Number(2.0),
                Tok::Semicolon,
                Tok::Ident("x".into()),
                Tok::Assign,
                Tok::Number(2.0),
                Tok::DoubleStar,
                Tok::Number(3.0),
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn indentation_produces_indent_and_dedent() {
        let source = "for x in xs:\n    f(x)\n\n    # note\n    g(x)\nh()\n";
        let tokens = toks(source);
        assert_eq!(tokens.iter().filter(|t| **t == Tok::Indent).count(), 1);
        assert_eq!(tokens.iter().filter(|t| **t == Tok::Dedent).count(), 1);
        let dedent = tokens.iter().position(|t| *t == Tok::Dedent).unwrap();
        assert_eq!(tokens[dedent + 1], Tok::Ident("h".into()));
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let tokens = tokenize("adj = {\n  'A': ['B'],\n  'B': [],\n}\nx = 1\n").unwrap();
        let newlines: Vec<usize> = tokens
            .iter()
            .filter(|t| t.tok == Tok::Newline)
            .map(|t| t.line)
            .collect();
        assert_eq!(newlines, [4, 5]);
    }

    #[test]
    fn docstrings_span_lines() {
        let source = "def f():\n    \"\"\"Line one.\n    Line two.\"\"\"\n    pass\n";
        let tokens = tokenize(source).unwrap();
        let doc = tokens
            .iter()
            .find(|t| matches!(t.tok, Tok::Str(_)))
            .unwrap();
        assert_eq!(doc.line, 2);
        let pass = tokens
            .iter()
            .find(|t| t.tok == Tok::Ident("pass".into()))
            .unwrap();
        assert_eq!(pass.line, 4);
    }

    #[test]
    fn format_strings_split_into_fields() {
        assert_eq!(
            toks("f'Step {i + 1}: {{x}} {ratio:.2f} {name!r}'")[0],
            Tok::FStr(vec![
                FPiece::Text("Step ".into()),
                FPiece::Field {
                    source: "i + 1".into(),
                    conversion: None,
                    spec: None,
                },
                FPiece::Text(": {x} ".into()),
                FPiece::Field {
                    source: "ratio".into(),
                    conversion: None,
                    spec: Some(".2f".into()),
                },
                FPiece::Text(" ".into()),
                FPiece::Field {
                    source: "name".into(),
                    conversion: Some('r'),
                    spec: None,
                },
            ])
        );
        assert!(tokenize("f'{}'").is_err());
        assert!(tokenize("f'a } b'").is_err());
        assert_eq!(toks(r"r'\d'")[0], Tok::Str("\\d".into()));
    }

    #[test]
    fn reports_line_of_bad_character() {
        let err = tokenize("x = 1\ny = 2 $ 3\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn rejects_unterminated_string_and_brackets() {
        assert!(tokenize("x = 'abc\n").is_err());
        assert!(tokenize("x = '''abc\n").is_err());
        assert!(tokenize("x = [1, 2\n").is_err());
        assert!(tokenize("x = 1)\n").is_err());
    }

    #[test]
    fn inconsistent_dedent_is_an_error() {
        assert!(tokenize("for x in y:\n    f()\n  g()\n").is_err());
    }
}
