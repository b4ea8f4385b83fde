//! An expression anchored at its position inside a larger one.
//!
//! Transformations record where they happened, not just what they produced.
//! Pairing the expression value with its path from the enclosing root is what
//! lets step chains produced deep inside a tree be re-anchored onto the
//! original input.

use std::fmt;

use stepwise_ast::{path_to_string, Expr, ExprPath};

/// An expression together with the path locating it under some root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subexpression {
    pub expr: Expr,
    pub path: ExprPath,
}

impl Subexpression {
    /// Anchor `expr` at the root (empty path).
    pub fn root(expr: Expr) -> Self {
        Subexpression {
            expr,
            path: Vec::new(),
        }
    }

    pub fn at(expr: Expr, path: ExprPath) -> Self {
        Subexpression { expr, path }
    }

    /// The `index`-th child, with its path extended accordingly. Path
    /// elements are `u8`; operands beyond that range cannot be addressed.
    pub fn child(&self, index: usize) -> Option<Subexpression> {
        debug_assert!(index <= u8::MAX as usize, "child index beyond path range");
        let expr = self.expr.nth_child(index)?.clone();
        let mut path = self.path.clone();
        path.push(index as u8);
        Some(Subexpression { expr, path })
    }

    pub fn children(&self) -> Vec<Subexpression> {
        (0..self.expr.child_count())
            .filter_map(|i| self.child(i))
            .collect()
    }

    /// Same anchor, different value. Used when a subexpression is rewritten
    /// in place.
    pub fn with_expr(&self, expr: Expr) -> Self {
        Subexpression {
            expr,
            path: self.path.clone(),
        }
    }
}

impl fmt::Display for Subexpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.expr, path_to_string(&self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_extends_path() {
        let sub = Subexpression::at(
            Expr::sum(vec![Expr::variable("a"), Expr::variable("b")]),
            vec![1],
        );
        let child = sub.child(1).unwrap();
        assert_eq!(child.expr, Expr::variable("b"));
        assert_eq!(child.path, vec![1, 1]);
        assert!(sub.child(2).is_none());
    }

    #[test]
    #[should_panic(expected = "beyond path range")]
    fn test_child_index_beyond_path_range_is_rejected() {
        let wide = Subexpression::root(Expr::sum((0..=256).map(Expr::integer).collect()));
        let _ = wide.child(256);
    }
}
