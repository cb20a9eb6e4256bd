//! Cell-expression parser.
//!
//! A cell's text is literal content interspersed with `{{...}}` markers:
//! `{{name}}` is a data lookup, `{{helper a "b" {{c}}}}` a helper call with
//! bareword, quoted, and nested-call arguments. Parsing is a single
//! left-to-right pass with a cursor; nesting is handled by recursion.

use std::fmt;
use std::sync::Arc;

use crate::core::helpers::{HelperRegistry, RegisteredHelper};

/// A parsed cell expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Ordered children whose string renderings are concatenated.
    Sequence(Vec<Expr>),
    /// A textual fragment, either surrounding text or a quoted argument.
    Literal(String),
    /// A lookup in the current data scope. Missing keys are not errors.
    KeyRef(String),
    /// A helper invocation.
    Call(CallExpr),
}

#[derive(Clone)]
pub struct CallExpr {
    pub name: String,
    pub helper: Arc<RegisteredHelper>,
    pub args: Vec<Expr>,
}

impl fmt::Debug for CallExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallExpr")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// `}}` with no open `{{`.
    NoStart,
    /// `{{` immediately followed by a separator; no name to look up.
    NoKey,
    /// Input ended inside an open `{{...}}`.
    NoEnd,
    /// Call names a helper that is not registered.
    NoHelper(String),
    /// Argument count does not match the helper's declared inputs.
    Arity {
        name: String,
        want: usize,
        got: usize,
    },
}

/// Error from parsing one cell's text, with the byte offset it was
/// detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
}

impl ParseError {
    fn new(kind: ParseErrorKind, position: usize) -> Self {
        Self { kind, position }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at byte {}: ", self.position)?;
        match &self.kind {
            ParseErrorKind::NoStart => write!(f, "`}}}}` without a matching `{{{{`"),
            ParseErrorKind::NoKey => write!(f, "`{{{{` without a key or helper name"),
            ParseErrorKind::NoEnd => write!(f, "`{{{{` without a matching `}}}}`"),
            ParseErrorKind::NoHelper(name) => write!(f, "no helper named `{name}`"),
            ParseErrorKind::Arity { name, want, got } => {
                write!(f, "helper `{name}` takes {want} argument(s), found {got}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse one cell's source text against the registered helpers.
///
/// The result is a [`Expr::Sequence`] unless the whole cell is a single
/// helper call, which is returned directly.
pub fn parse(src: &str, registry: &HelperRegistry) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        src,
        pos: 0,
        registry,
    };
    let mut items = Vec::new();
    while !parser.at_end() {
        items.push(parser.next_item()?);
    }
    if items.len() == 1 && matches!(items[0], Expr::Call(_)) {
        return Ok(items.remove(0));
    }
    Ok(Expr::Sequence(items))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    registry: &'a HelperRegistry,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn starts(&self, pat: &str) -> bool {
        self.src.as_bytes()[self.pos..].starts_with(pat.as_bytes())
    }

    fn next_item(&mut self) -> Result<Expr, ParseError> {
        if self.starts("}}") {
            return Err(ParseError::new(ParseErrorKind::NoStart, self.pos));
        }
        if self.starts("{{") {
            self.pos += 2;
            return self.parse_call();
        }
        Ok(Expr::Literal(self.take_literal_run().to_string()))
    }

    /// Consume up to the next `{{` or `}}` pair, or to end of input.
    fn take_literal_run(&mut self) -> &str {
        let start = self.pos;
        while !self.at_end() && !self.starts("{{") && !self.starts("}}") {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    /// Parse the interior of a `{{...}}`, cursor just past the opening
    /// braces. `{{name}}` with no arguments degenerates to a key lookup.
    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let name_at = self.pos;
        let name = self.take_word().to_string();
        if name.is_empty() {
            return Err(ParseError::new(ParseErrorKind::NoKey, name_at));
        }
        if self.starts("}}") {
            self.pos += 2;
            return Ok(Expr::KeyRef(name));
        }

        let helper = self
            .registry
            .get(&name)
            .cloned()
            .ok_or_else(|| ParseError::new(ParseErrorKind::NoHelper(name.clone()), name_at))?;

        let mut args = Vec::new();
        loop {
            while self.starts(" ") {
                self.pos += 1;
            }
            if self.at_end() {
                return Err(ParseError::new(ParseErrorKind::NoEnd, self.pos));
            }
            if self.starts("}}") {
                self.pos += 2;
                break;
            }
            if self.starts("{{") {
                self.pos += 2;
                args.push(self.parse_call()?);
            } else if self.starts("\"") {
                args.push(Expr::Literal(self.take_quoted()?.to_string()));
            } else {
                let word = self.take_word().to_string();
                args.push(Expr::KeyRef(word));
            }
        }

        let want = helper.signature().arity();
        if args.len() != want {
            return Err(ParseError::new(
                ParseErrorKind::Arity {
                    name,
                    want,
                    got: args.len(),
                },
                self.pos,
            ));
        }
        Ok(Expr::Call(CallExpr { name, helper, args }))
    }

    /// A bareword: everything up to a space, a quote, a `{{`/`}}` pair, or
    /// end of input. Lone braces are word characters.
    fn take_word(&mut self) -> &str {
        let start = self.pos;
        while !self.at_end() {
            let b = self.src.as_bytes()[self.pos];
            if b == b' ' || b == b'"' || self.starts("{{") || self.starts("}}") {
                break;
            }
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    /// A quoted argument: cursor on the opening quote. Brace pairs inside
    /// the quotes stay literal text.
    fn take_quoted(&mut self) -> Result<&str, ParseError> {
        self.pos += 1;
        let start = self.pos;
        while !self.at_end() && !self.starts("\"") {
            self.pos += 1;
        }
        if self.at_end() {
            return Err(ParseError::new(ParseErrorKind::NoEnd, self.pos));
        }
        let payload = &self.src[start..self.pos];
        self.pos += 1;
        Ok(payload)
    }
}
