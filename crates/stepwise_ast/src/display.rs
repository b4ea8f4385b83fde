//! Plain-text rendering, used by logs, errors and test assertions.
//! Presentation-quality output (LaTeX etc.) is out of scope for this crate.

use std::fmt;

use crate::expression::{Decorator, Expr, ExprKind};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bracketed = !self.decorators().is_empty();
        if bracketed {
            let open = match self.outer_bracket() {
                Some(Decorator::PartialBracket) => "<.",
                _ => "(",
            };
            write!(f, "{}", open)?;
        }
        match self.kind() {
            ExprKind::Integer(v) => write!(f, "{}", v)?,
            ExprKind::Variable(name) => write!(f, "{}", name)?,
            ExprKind::Undefined => write!(f, "/undefined/")?,
            ExprKind::Sum(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{}", term)?;
                }
            }
            ExprKind::Product { factors, .. } => {
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        write!(f, " * ")?;
                    }
                    write!(f, "{}", factor)?;
                }
            }
            ExprKind::Power { base, exponent } => {
                write!(f, "{} ^ {}", base, exponent)?;
            }
        }
        if bracketed {
            let close = match self.outer_bracket() {
                Some(Decorator::PartialBracket) => ".>",
                _ => ")",
            };
            write!(f, "{}", close)?;
        }
        Ok(())
    }
}
