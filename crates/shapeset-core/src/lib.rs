//! Compiles declarative entity selections into self-contained shapes.
//!
//! Entities declare field trees per [`Variant`]. Trees can embed other
//! entities lazily, share sub-shapes through handle-keyed fragment pools
//! and branch per concrete type. [`Resolver::rel`] turns one
//! `(entity, variant)` pair into a finite [`Shape`] whose shared fragments
//! are interned once under `__define`.

mod engine;
mod error;
mod registry;
mod shape;
mod tree;
mod variant;

#[cfg(test)]
mod fixtures;

pub use engine::find_selection;
pub use engine::search_definition;
pub use engine::CollisionPolicy;
pub use engine::EngineConfig;
pub use engine::Resolver;
pub use engine::SearchOptions;
pub use error::Error;
pub use error::Result;
pub use registry::EntityDefinition;
pub use registry::Registry;
pub use shape::Shape;
pub use shape::ShapeField;
pub use shape::UnionMember;
pub use tree::Branch;
pub use tree::Deferred;
pub use tree::EntityRef;
pub use tree::Field;
pub use tree::FieldTree;
pub use tree::FragmentPool;
pub use tree::Handle;
pub use tree::OmitSpec;
pub use tree::Thunk;
pub use variant::UnknownVariant;
pub use variant::Variant;
