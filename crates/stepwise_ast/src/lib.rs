pub mod display;
pub mod expression;
pub mod path;

pub use expression::{Decorator, Expr, ExprKind, Label};
pub use path::{is_prefix_of, path_to_string, ExprPath};
