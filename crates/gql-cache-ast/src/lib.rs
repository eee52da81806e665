//! Selection-set AST and storage-key utilities shared by the normalized GraphQL
//! cache: the textual/structural pieces that don't need to know about the graph
//! store itself.

mod arc;
mod error;
mod node;

pub mod ast;
pub mod selection;
pub mod storage_key;

pub use arc::Arc;
pub use error::MissingFragmentError;
pub use node::Node;
pub use selection::{walk_selections, EffectiveFieldSelection};
pub use storage_key::field_storage_key;
