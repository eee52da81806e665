use crate::arc::Arc;
use std::fmt;
use std::hash;

/// Smart pointer to a selection-set node.
///
/// Thin wrapper over [`Arc`] under a GraphQL-flavored name, kept distinct so that
/// selection-set types read the way an AST crate's types normally do (`Node<Field>`,
/// not `Arc<Field>`). Carries no source location: parsing is out of scope for this
/// crate (selection sets arrive pre-parsed), so there is nothing to point diagnostics at.
#[derive(Hash, Eq, PartialEq)]
pub struct Node<T>(Arc<T>);

impl<T> Node<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Returns whether two `Node`s point to the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }

    pub fn make_mut(&mut self) -> &mut T
    where
        T: Clone,
    {
        self.0.make_mut()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.0.get_mut()
    }
}

impl<T> std::ops::Deref for Node<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T> AsRef<T> for Node<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ptr_eq_tracks_allocation_not_value() {
        let a = Node::new(1_i32);
        let b = a.clone();
        let c = Node::new(1_i32);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a, c); // value equality still holds
    }
}
