use crate::ast::Name;

/// Selection-traversal failure: a fragment spread names a fragment that is not
/// present in the caller-supplied fragment map.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown fragment '{name}'")]
pub struct MissingFragmentError {
    pub name: Name,
}
