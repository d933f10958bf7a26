use std::sync::Arc;

use crate::tree::Handle;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Structural defects that abort a compilation.
///
/// Data-completeness problems (a fallback variant, a dangling fragment
/// handle) are not errors: they are logged and the affected piece is skipped.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("entity \"{type_name}\" defines no selection variant")]
    #[diagnostic(
        code(shapeset::no_selection),
        help("Give the entity at least one non-empty `common`, `full`, `list` or `nav` tree.")
    )]
    NoSelectionAvailable { type_name: String },

    #[error("no entity named \"{type_name}\" is registered")]
    #[diagnostic(code(shapeset::unknown_entity))]
    UnknownEntity { type_name: String },

    #[error("entity \"{type_name}\" is defined more than once")]
    #[diagnostic(code(shapeset::duplicate_entity))]
    DuplicateEntity { type_name: String },

    #[error("selection nesting reached depth {depth}, the limit is {limit}")]
    #[diagnostic(
        code(shapeset::cycle_overrun),
        help("A reference cycle is probably missing an `omit` on its back-edge.")
    )]
    CycleOverrun { depth: usize, limit: usize },

    #[error("two different shapes were registered as fragment \"{name}\"")]
    #[diagnostic(
        code(shapeset::fragment_collision),
        help("Fragments are keyed by type and variant; use the same omissions at every site.")
    )]
    FragmentCollision { name: String },

    #[error("fragment {handle} has no type name or selection variant")]
    #[diagnostic(code(shapeset::untagged_fragment))]
    UntaggedFragment { handle: Handle },

    #[error("a deferred selection failed to resolve")]
    #[diagnostic(code(shapeset::deferred))]
    Deferred {
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    pub fn deferred(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Deferred {
            source: Arc::new(source),
        }
    }
}
