//! Ordered alternatives.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{ProduceResult, StepsProducer};
use crate::context::Context;
use crate::subexpression::Subexpression;

pub enum FirstOfOption {
    /// Taken if no earlier option applied.
    Option(Arc<StepsProducer>),
    /// A preferred shortcut: if it applies and lands on the same result as
    /// the option already chosen, it replaces that option's steps.
    ShortOption(Arc<StepsProducer>),
}

/// Tries options in declaration order; the first applicable one wins.
pub struct FirstOf {
    options: Vec<FirstOfOption>,
    min_depth: OnceCell<usize>,
}

impl FirstOf {
    /// Panics if `options` is empty.
    pub(crate) fn new(options: Vec<FirstOfOption>) -> Self {
        assert!(!options.is_empty(), "firstOf needs at least one option");
        FirstOf {
            options,
            min_depth: OnceCell::new(),
        }
    }

    pub fn min_depth(&self) -> usize {
        *self.min_depth.get_or_init(|| {
            self.options
                .iter()
                .map(|option| match option {
                    FirstOfOption::Option(p) | FirstOfOption::ShortOption(p) => p.min_depth(),
                })
                .min()
                .unwrap_or(1)
        })
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        let mut chosen: Option<Vec<_>> = None;
        for option in &self.options {
            match option {
                FirstOfOption::Option(producer) => {
                    if chosen.is_none() {
                        chosen = producer.produce_steps(ctx, sub)?;
                    }
                }
                FirstOfOption::ShortOption(producer) => {
                    let current = producer.produce_steps(ctx, sub)?;
                    let replaces = match (&chosen, &current) {
                        (None, _) => true,
                        (Some(prev), Some(new)) => match (prev.last(), new.last()) {
                            (Some(a), Some(b)) => a.to_expr == b.to_expr,
                            _ => false,
                        },
                        _ => false,
                    };
                    if replaces {
                        chosen = current;
                    }
                }
            }
        }
        Ok(chosen)
    }
}
