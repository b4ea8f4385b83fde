//! The immutable expression tree.
//!
//! Nodes are shared behind `Arc` so that cloning a subtree is cheap and
//! compiled plan graphs holding fixed expressions can be shared across
//! request threads. All "mutation" builds a new tree; `substitute` replaces
//! the node at a path and rebuilds only the spine above it.

use std::sync::Arc;

use smallvec::SmallVec;

/// Decorations attached to a node, orthogonal to its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decorator {
    /// Ordinary visible brackets.
    RoundBracket,
    /// Marks a sub-sum or sub-product temporarily extracted from a larger
    /// n-ary node. Internal bookkeeping only; inlined away before any
    /// user-facing output.
    PartialBracket,
}

/// A scratch annotation used by plans to refer back to a node across steps.
/// Labels never survive past the plan that set them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    A,
    B,
    C,
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub enum ExprKind {
    /// An opaque integer literal. The engine never evaluates these.
    Integer(i64),
    Variable(String),
    Sum(Vec<Expr>),
    Product {
        factors: Vec<Expr>,
        /// Indices of factors preceded by an explicit multiplication sign.
        /// Must be re-indexed, never dropped, when partial products are
        /// flattened into their parent.
        forced_signs: Vec<usize>,
    },
    Power {
        base: Expr,
        exponent: Expr,
    },
    /// The distinguished "undefined" value. Rewriting an expression to
    /// undefined halts the enclosing step chain.
    Undefined,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct Node {
    kind: ExprKind,
    decorators: SmallVec<[Decorator; 2]>,
    label: Option<Label>,
}

/// An immutable expression tree value.
#[derive(Debug, Clone)]
pub struct Expr(Arc<Node>);

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Expr {}

impl std::hash::Hash for Expr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Expr {
    fn new(kind: ExprKind) -> Self {
        Expr(Arc::new(Node {
            kind,
            decorators: SmallVec::new(),
            label: None,
        }))
    }

    pub fn integer(value: i64) -> Self {
        Expr::new(ExprKind::Integer(value))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Variable(name.into()))
    }

    pub fn sum(terms: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Sum(terms))
    }

    pub fn product(factors: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Product {
            factors,
            forced_signs: Vec::new(),
        })
    }

    pub fn product_with_signs(factors: Vec<Expr>, forced_signs: Vec<usize>) -> Self {
        Expr::new(ExprKind::Product {
            factors,
            forced_signs,
        })
    }

    pub fn power(base: Expr, exponent: Expr) -> Self {
        Expr::new(ExprKind::Power { base, exponent })
    }

    pub fn undefined() -> Self {
        Expr::new(ExprKind::Undefined)
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.0.kind, ExprKind::Undefined)
    }

    pub fn is_sum(&self) -> bool {
        matches!(self.0.kind, ExprKind::Sum(_))
    }

    pub fn is_product(&self) -> bool {
        matches!(self.0.kind, ExprKind::Product { .. })
    }

    /// Forced multiplication sign indices; empty for non-products.
    pub fn forced_signs(&self) -> &[usize] {
        match &self.0.kind {
            ExprKind::Product { forced_signs, .. } => forced_signs,
            _ => &[],
        }
    }

    pub fn child_count(&self) -> usize {
        match &self.0.kind {
            ExprKind::Integer(_) | ExprKind::Variable(_) | ExprKind::Undefined => 0,
            ExprKind::Sum(terms) => terms.len(),
            ExprKind::Product { factors, .. } => factors.len(),
            ExprKind::Power { .. } => 2,
        }
    }

    pub fn nth_child(&self, index: usize) -> Option<&Expr> {
        match &self.0.kind {
            ExprKind::Integer(_) | ExprKind::Variable(_) | ExprKind::Undefined => None,
            ExprKind::Sum(terms) => terms.get(index),
            ExprKind::Product { factors, .. } => factors.get(index),
            ExprKind::Power { base, exponent } => match index {
                0 => Some(base),
                1 => Some(exponent),
                _ => None,
            },
        }
    }

    pub fn children(&self) -> Vec<Expr> {
        (0..self.child_count())
            .map(|i| self.nth_child(i).cloned().unwrap_or_else(Expr::undefined))
            .collect()
    }

    /// Tree depth: atoms have depth 1.
    pub fn depth(&self) -> usize {
        1 + (0..self.child_count())
            .filter_map(|i| self.nth_child(i))
            .map(Expr::depth)
            .max()
            .unwrap_or(0)
    }

    /// Return a copy of this tree with the node at `path` replaced by
    /// `replacement`. An invalid path leaves the tree unchanged.
    pub fn substitute(&self, path: &[u8], replacement: &Expr) -> Expr {
        let Some((&index, rest)) = path.split_first() else {
            return replacement.clone();
        };
        let index = index as usize;
        let Some(child) = self.nth_child(index) else {
            return self.clone();
        };
        let new_child = child.substitute(rest, replacement);
        self.with_nth_child(index, new_child)
    }

    fn with_nth_child(&self, index: usize, new_child: Expr) -> Expr {
        let kind = match &self.0.kind {
            ExprKind::Sum(terms) => {
                let mut terms = terms.clone();
                terms[index] = new_child;
                ExprKind::Sum(terms)
            }
            ExprKind::Product {
                factors,
                forced_signs,
            } => {
                let mut factors = factors.clone();
                factors[index] = new_child;
                ExprKind::Product {
                    factors,
                    forced_signs: forced_signs.clone(),
                }
            }
            ExprKind::Power { base, exponent } => {
                if index == 0 {
                    ExprKind::Power {
                        base: new_child,
                        exponent: exponent.clone(),
                    }
                } else {
                    ExprKind::Power {
                        base: base.clone(),
                        exponent: new_child,
                    }
                }
            }
            _ => return self.clone(),
        };
        Expr(Arc::new(Node {
            kind,
            decorators: self.0.decorators.clone(),
            label: self.0.label,
        }))
    }

    pub fn decorators(&self) -> &[Decorator] {
        &self.0.decorators
    }

    pub fn has_decorator(&self, decorator: Decorator) -> bool {
        self.0.decorators.contains(&decorator)
    }

    /// The outermost decorator, if any.
    pub fn outer_bracket(&self) -> Option<Decorator> {
        self.0.decorators.last().copied()
    }

    pub fn decorated(&self, decorator: Decorator) -> Expr {
        let mut decorators = self.0.decorators.clone();
        decorators.push(decorator);
        Expr(Arc::new(Node {
            kind: self.clone_kind(),
            decorators,
            label: self.0.label,
        }))
    }

    /// Copy this node without its decorators (children untouched).
    pub fn undecorated(&self) -> Expr {
        if self.0.decorators.is_empty() {
            return self.clone();
        }
        Expr(Arc::new(Node {
            kind: self.clone_kind(),
            decorators: SmallVec::new(),
            label: self.0.label,
        }))
    }

    /// Copy of this node carrying `source`'s decorators and label, children
    /// untouched. Used when a node is rebuilt in place of `source`.
    pub fn annotated_like(&self, source: &Expr) -> Expr {
        if self.0.decorators == source.0.decorators && self.0.label == source.0.label {
            return self.clone();
        }
        Expr(Arc::new(Node {
            kind: self.clone_kind(),
            decorators: source.0.decorators.clone(),
            label: source.0.label,
        }))
    }

    pub fn label(&self) -> Option<Label> {
        self.0.label
    }

    pub fn has_label(&self) -> bool {
        self.0.label.is_some()
    }

    pub fn with_label(&self, label: Label) -> Expr {
        Expr(Arc::new(Node {
            kind: self.clone_kind(),
            decorators: self.0.decorators.clone(),
            label: Some(label),
        }))
    }

    /// True if this node or any descendant carries a label.
    pub fn contains_labels(&self) -> bool {
        self.0.label.is_some()
            || (0..self.child_count())
                .filter_map(|i| self.nth_child(i))
                .any(Expr::contains_labels)
    }

    /// Return a copy of this tree with every label removed. Returns a clone
    /// of `self` (sharing all nodes) when no label is present.
    pub fn clear_labels(&self) -> Expr {
        if !self.contains_labels() {
            return self.clone();
        }
        let kind = match &self.0.kind {
            ExprKind::Integer(v) => ExprKind::Integer(*v),
            ExprKind::Variable(name) => ExprKind::Variable(name.clone()),
            ExprKind::Undefined => ExprKind::Undefined,
            ExprKind::Sum(terms) => ExprKind::Sum(terms.iter().map(Expr::clear_labels).collect()),
            ExprKind::Product {
                factors,
                forced_signs,
            } => ExprKind::Product {
                factors: factors.iter().map(Expr::clear_labels).collect(),
                forced_signs: forced_signs.clone(),
            },
            ExprKind::Power { base, exponent } => ExprKind::Power {
                base: base.clear_labels(),
                exponent: exponent.clear_labels(),
            },
        };
        Expr(Arc::new(Node {
            kind,
            decorators: self.0.decorators.clone(),
            label: None,
        }))
    }

    /// Find the first node (prefix order) satisfying `predicate`, returning
    /// its path.
    pub fn find_first(&self, predicate: &dyn Fn(&Expr) -> bool) -> Option<crate::ExprPath> {
        if predicate(self) {
            return Some(Vec::new());
        }
        for i in 0..self.child_count() {
            if let Some(mut path) = self.nth_child(i)?.find_first(predicate) {
                debug_assert!(i <= u8::MAX as usize, "child index beyond path range");
                path.insert(0, i as u8);
                return Some(path);
            }
        }
        None
    }

    fn clone_kind(&self) -> ExprKind {
        match &self.0.kind {
            ExprKind::Integer(v) => ExprKind::Integer(*v),
            ExprKind::Variable(name) => ExprKind::Variable(name.clone()),
            ExprKind::Undefined => ExprKind::Undefined,
            ExprKind::Sum(terms) => ExprKind::Sum(terms.clone()),
            ExprKind::Product {
                factors,
                forced_signs,
            } => ExprKind::Product {
                factors: factors.clone(),
                forced_signs: forced_signs.clone(),
            },
            ExprKind::Power { base, exponent } => ExprKind::Power {
                base: base.clone(),
                exponent: exponent.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Expr {
        // (a + b) * c
        Expr::product(vec![
            Expr::sum(vec![Expr::variable("a"), Expr::variable("b")]),
            Expr::variable("c"),
        ])
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(sample(), sample());
        assert_ne!(sample(), Expr::variable("a"));
        // Decorators participate in equality
        assert_ne!(sample(), sample().decorated(Decorator::PartialBracket));
    }

    #[test]
    fn test_substitute_at_path() {
        let expr = sample();
        let replaced = expr.substitute(&[0, 1], &Expr::integer(0));
        assert_eq!(
            replaced,
            Expr::product(vec![
                Expr::sum(vec![Expr::variable("a"), Expr::integer(0)]),
                Expr::variable("c"),
            ])
        );
        // Root substitution replaces the whole tree
        assert_eq!(expr.substitute(&[], &Expr::integer(1)), Expr::integer(1));
        // Invalid paths leave the tree unchanged
        assert_eq!(expr.substitute(&[7], &Expr::integer(1)), expr);
    }

    #[test]
    fn test_depth() {
        assert_eq!(Expr::variable("x").depth(), 1);
        assert_eq!(sample().depth(), 3);
    }

    #[test]
    fn test_labels_cleared_recursively() {
        let labelled = Expr::sum(vec![
            Expr::variable("a").with_label(Label::A),
            Expr::variable("b"),
        ]);
        assert!(labelled.contains_labels());
        let cleared = labelled.clear_labels();
        assert!(!cleared.contains_labels());
        assert_eq!(
            cleared,
            Expr::sum(vec![Expr::variable("a"), Expr::variable("b")])
        );
    }

    #[test]
    fn test_annotated_like_copies_decorators_and_label() {
        let source = Expr::sum(vec![Expr::variable("a"), Expr::variable("b")])
            .decorated(Decorator::RoundBracket)
            .with_label(Label::A);
        let rebuilt = Expr::sum(vec![Expr::variable("a")]).annotated_like(&source);
        assert_eq!(rebuilt.decorators(), &[Decorator::RoundBracket]);
        assert_eq!(rebuilt.label(), Some(Label::A));

        // A bare source leaves a bare node untouched.
        let plain = Expr::variable("x");
        assert_eq!(plain.annotated_like(&Expr::variable("y")), plain);
    }

    #[test]
    fn test_forced_signs_kept_on_substitute() {
        let product = Expr::product_with_signs(
            vec![Expr::variable("a"), Expr::variable("b")],
            vec![1],
        );
        let replaced = product.substitute(&[0], &Expr::integer(2));
        assert_eq!(replaced.forced_signs(), &[1]);
    }
}
