//! The resolution engine.
//!
//! A [`Resolver`] owns nothing mutable: every call builds its own fragment
//! pool, and the only state carried down a recursion is the current depth.

mod compile;
mod fragments;
mod omit;
mod search;
mod select;


use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;

pub use search::search_definition;
pub use search::SearchOptions;
pub use select::find_selection;

use crate::error::Error;
use crate::error::Result;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::tree::Branch;
use crate::tree::Deferred;
use crate::tree::Field;
use crate::tree::FieldTree;
use crate::tree::FragmentPool;

/// What to do when two different shapes claim the same fragment name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Keep the first registration and log the conflict.
    #[default]
    FirstWins,
    /// Abort the compilation with [`Error::FragmentCollision`].
    Reject,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_depth: usize,
    pub on_collision: CollisionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            on_collision: CollisionPolicy::default(),
        }
    }
}

#[derive(Clone)]
pub struct Resolver {
    registry: Arc<Registry>,
    config: Arc<EngineConfig>,
    depth: usize,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(registry: Registry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: Registry, config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
            depth: 0,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// A resolver one level deeper, or `CycleOverrun` past the limit.
    pub(crate) fn descend(&self) -> Result<Resolver> {
        let depth = self.depth + 1;
        if depth > self.config.max_depth {
            return Err(Error::CycleOverrun {
                depth,
                limit: self.config.max_depth,
            });
        }

        Ok(Resolver {
            registry: self.registry.clone(),
            config: self.config.clone(),
            depth,
        })
    }

    /// Resolves one deferred shape. Ready shapes are returned as they are.
    pub fn resolve<'a>(&'a self, deferred: &'a Deferred) -> BoxFuture<'a, Result<Option<Shape>>> {
        async move {
            match deferred {
                Deferred::Ready(shape) => Ok(Some(shape.clone())),
                Deferred::Reference(reference) => {
                    let cx = self.descend()?;
                    cx.rel(&reference.type_name, reference.variant, &reference.omit)
                        .await
                        .map(Some)
                }
                Deferred::Pending(thunk) => thunk.call(self.descend()?).await,
            }
        }
        .boxed()
    }

    /// Resolves every deferred value in `tree`: fields, union branches and
    /// pool entries. Values that resolve to nothing are dropped.
    pub fn resolve_tree(&self, tree: FieldTree) -> BoxFuture<'_, Result<FieldTree>> {
        async move {
            let cx = self.descend()?;
            let mut resolved = FieldTree::new();

            if let Some(pool) = tree.define {
                let mut entries = FragmentPool::new();
                for (handle, entry) in pool {
                    if let Some(shape) = cx.resolve(&entry).await? {
                        entries.insert(handle, Deferred::Ready(shape));
                    }
                }
                resolved.define = Some(entries);
            }

            for (name, field) in tree.fields {
                let field = match field {
                    Field::Scalar => Some(Field::Scalar),
                    Field::Object(tree) => Some(Field::Object(cx.resolve_tree(tree).await?)),
                    Field::Fragment { handle, extra } => Some(Field::Fragment {
                        handle,
                        extra: cx.resolve_tree(extra).await?,
                    }),
                    Field::Union(branches) => {
                        let mut members = IndexMap::new();
                        for (type_name, branch) in branches {
                            match branch {
                                Branch::Handle(handle) => {
                                    members.insert(type_name, Branch::Handle(handle));
                                }
                                Branch::Inline(deferred) => {
                                    if let Some(shape) = cx.resolve(&deferred).await? {
                                        members.insert(type_name, Branch::literal(shape));
                                    }
                                }
                            }
                        }
                        Some(Field::Union(members))
                    }
                    Field::Lazy(deferred) => cx
                        .resolve(&deferred)
                        .await?
                        .map(|shape| Field::Lazy(Deferred::Ready(shape))),
                };

                if let Some(field) = field {
                    resolved.fields.insert(name, field);
                }
            }

            Ok(resolved)
        }
        .boxed()
    }
}
