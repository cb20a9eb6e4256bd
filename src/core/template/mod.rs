//! The cell templating language: parser, evaluator, and the per-renderer
//! cache of compiled expressions.

pub mod evaluator;
pub mod parser;

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::helpers::HelperRegistry;
use parser::{parse, Expr, ParseError};

/// Per-renderer cache of compiled cell expressions, keyed by cell source
/// text. Templates repeat the same cell text across range iterations, so
/// each distinct string is parsed once and shared by reference.
#[derive(Debug, Default)]
pub struct TemplateCache {
    compiled: HashMap<String, Arc<Expr>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&mut self, src: &str, registry: &HelperRegistry) -> Result<Arc<Expr>, ParseError> {
        if let Some(expr) = self.compiled.get(src) {
            return Ok(expr.clone());
        }
        let expr = Arc::new(parse(src, registry)?);
        self.compiled.insert(src.to_string(), expr.clone());
        Ok(expr)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
