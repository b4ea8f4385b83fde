//! Explanation and skill metadata attached to transformations.
//!
//! The engine does not render text. An explanation is a translation key plus
//! expression parameters; turning that into prose is the embedder's job.

use std::fmt;
use std::sync::Arc;

use stepwise_ast::Expr;

use crate::context::Context;
use crate::pattern::Match;
use crate::subexpression::Subexpression;

pub type MetadataKey = &'static str;

/// Keys for the steps the engine itself injects (partial expression
/// bookkeeping, task result substitution).
pub mod keys {
    pub const EXTRACT_PARTIAL_EXPRESSION: &str = "Engine.ExtractPartialExpression";
    pub const REARRANGE_SUM: &str = "Engine.RearrangeSum";
    pub const REARRANGE_PRODUCT: &str = "Engine.RearrangeProduct";
    pub const INLINE_PARTIAL_SUM: &str = "Engine.InlinePartialSum";
    pub const INLINE_PARTIAL_PRODUCT: &str = "Engine.InlinePartialProduct";
    pub const SUBSTITUTE_RESULT_OF_TASK_SET: &str = "Engine.SubstituteResultOfTaskSet";
}

/// A translation key with expression parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub key: MetadataKey,
    pub params: Vec<Expr>,
}

impl Metadata {
    pub fn new(key: MetadataKey) -> Self {
        Metadata {
            key,
            params: Vec::new(),
        }
    }

    pub fn with_params(key: MetadataKey, params: Vec<Expr>) -> Self {
        Metadata { key, params }
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        Ok(())
    }
}

type MetadataFn = dyn Fn(&Context, &Subexpression, &Match) -> Metadata + Send + Sync;

/// Deferred metadata construction: a plan's explanation may depend on what its
/// pattern matched, so it is built once a match is at hand.
#[derive(Clone)]
pub enum MetadataMaker {
    FixedKey(MetadataKey),
    General(Arc<MetadataFn>),
}

impl MetadataMaker {
    pub fn general<F>(f: F) -> Self
    where
        F: Fn(&Context, &Subexpression, &Match) -> Metadata + Send + Sync + 'static,
    {
        MetadataMaker::General(Arc::new(f))
    }

    pub fn make(&self, ctx: &Context, sub: &Subexpression, m: &Match) -> Metadata {
        match self {
            MetadataMaker::FixedKey(key) => Metadata::new(*key),
            MetadataMaker::General(f) => f(ctx, sub, m),
        }
    }
}

impl fmt::Debug for MetadataMaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataMaker::FixedKey(key) => write!(f, "MetadataMaker::FixedKey({:?})", key),
            MetadataMaker::General(_) => write!(f, "MetadataMaker::General(..)"),
        }
    }
}
