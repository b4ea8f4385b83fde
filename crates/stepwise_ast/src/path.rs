//! Paths addressing a node's position inside an expression tree.
//!
//! A path is the sequence of 0-based child indices leading from the root to a
//! node. Nodes hold no parent pointers; a path together with the root
//! expression is the sole addressing mechanism.

/// A path from the root to a specific node in an expression tree.
///
/// Each element is a child index (0-based):
/// - n-ary ops (sum, product): operand index
/// - power: 0 = base, 1 = exponent
///
/// Example: in `(a + b) * c`, the path to `b` is `[0, 1]`.
pub type ExprPath = Vec<u8>;

/// Convert a path to a human-readable string (for logs and errors).
pub fn path_to_string(path: &[u8]) -> String {
    if path.is_empty() {
        return "root".to_string();
    }
    path.iter()
        .map(|&i| i.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Check if `prefix` is a prefix of `path` (or equal).
pub fn is_prefix_of(prefix: &[u8], path: &[u8]) -> bool {
    if prefix.len() > path.len() {
        return false;
    }
    prefix.iter().zip(path.iter()).all(|(a, b)| a == b)
}

/// The remainder of `path` after stripping `prefix`, or `None` if `prefix`
/// does not lead to `path`.
pub fn relative_to<'a>(path: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    if is_prefix_of(prefix, path) {
        Some(&path[prefix.len()..])
    } else {
        None
    }
}
