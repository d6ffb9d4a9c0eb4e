//! Traversal payload paths.
//!
//! [`generate`] turns one target name into a [`TraversalSequence`]: the
//! literal name followed by the name prefixed with one, two, ... `depth`
//! copies of a traversal token.
//!
//! ```
//! use archslip::payload::{DEFAULT_TRAVERSAL_TOKEN, generate};
//!
//! let paths = generate("/etc/passwd", 2, DEFAULT_TRAVERSAL_TOKEN);
//! assert_eq!(
//!     paths.as_slice(),
//!     ["/etc/passwd", "../etc/passwd", "../../etc/passwd"]
//! );
//! ```

/// The conventional parent-directory token.
pub const DEFAULT_TRAVERSAL_TOKEN: &str = "../";

/// Candidate paths for one target, shallowest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalSequence {
    paths: Vec<String>,
}

impl TraversalSequence {
    /// Returns the number of candidates (`depth + 1`).
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Always `false`: a sequence holds at least the literal name.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Returns the candidates as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.paths
    }

    /// Iterates over the candidates.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.paths.iter()
    }
}

impl IntoIterator for TraversalSequence {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}

impl<'a> IntoIterator for &'a TraversalSequence {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// Builds the traversal candidates for `base_name`.
///
/// Element 0 is `base_name` unchanged. Element `i` is `token` repeated `i`
/// times followed by `base_name` with its leading `/` and `\` removed.
/// `depth` is not bounded here.
pub fn generate(base_name: &str, depth: usize, token: &str) -> TraversalSequence {
    let stripped = base_name.trim_start_matches(['/', '\\']);
    let mut paths = Vec::with_capacity(depth + 1);
    paths.push(base_name.to_string());
    let mut prefix = String::with_capacity(token.len() * depth);
    for _ in 0..depth {
        prefix.push_str(token);
        paths.push(format!("{prefix}{stripped}"));
    }
    TraversalSequence { paths }
}
