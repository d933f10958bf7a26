//! Declarative field trees, the input side of the engine.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::engine::Resolver;
use crate::error::Result;
use crate::shape::Shape;
use crate::variant::Variant;

/// Key of an entry in a [`FragmentPool`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Handle {
    Index(u32),
    Name(String),
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Index(index) => write!(f, "#{index}"),
            Handle::Name(name) => write!(f, "\"{name}\""),
        }
    }
}

impl From<u32> for Handle {
    fn from(value: u32) -> Self {
        Handle::Index(value)
    }
}

impl From<&str> for Handle {
    fn from(value: &str) -> Self {
        Handle::Name(value.to_string())
    }
}

impl From<String> for Handle {
    fn from(value: String) -> Self {
        Handle::Name(value)
    }
}

/// Fragments declared once on a tree and referenced by handle from it or
/// any of its descendants.
pub type FragmentPool = IndexMap<Handle, Deferred>;

/// Dot-separated field paths removed from a tree before it is compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OmitSpec(IndexSet<String>);

impl OmitSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>) {
        self.0.insert(path.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for OmitSpec {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        OmitSpec(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for OmitSpec {
    fn from(paths: [S; N]) -> Self {
        paths.into_iter().collect()
    }
}

/// A pointer to another entity's compiled variant, resolved on demand
/// through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub type_name: String,
    pub variant: Variant,
    pub omit: OmitSpec,
}

impl EntityRef {
    pub fn new(type_name: impl Into<String>, variant: Variant) -> Self {
        Self {
            type_name: type_name.into(),
            variant,
            omit: OmitSpec::new(),
        }
    }

    pub fn omit(mut self, path: impl Into<String>) -> Self {
        self.omit.insert(path);
        self
    }
}

type ThunkFn = dyn Fn(Resolver) -> BoxFuture<'static, Result<Option<Shape>>> + Send + Sync;

/// An arbitrary asynchronous computation producing a shape.
///
/// It receives the resolver it is evaluated under, so nested lookups keep
/// the caller's depth guard and configuration.
#[derive(Clone)]
pub struct Thunk(Arc<ThunkFn>);

impl Thunk {
    pub(crate) fn call(&self, cx: Resolver) -> BoxFuture<'static, Result<Option<Shape>>> {
        (self.0)(cx)
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Thunk").finish_non_exhaustive()
    }
}

/// A shape that is either already available or still to be computed.
#[derive(Debug, Clone)]
pub enum Deferred {
    Ready(Shape),
    Reference(EntityRef),
    Pending(Thunk),
}

impl Deferred {
    /// Wraps an async closure. Returning `Ok(None)` means the value does not
    /// exist and whatever refers to it is skipped.
    pub fn lazy<F, Fut>(compute: F) -> Self
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Shape>>> + Send + 'static,
    {
        Deferred::Pending(Thunk(Arc::new(move |cx| compute(cx).boxed())))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Deferred::Ready(_))
    }
}

impl From<Shape> for Deferred {
    fn from(shape: Shape) -> Self {
        Deferred::Ready(shape)
    }
}

impl From<EntityRef> for Deferred {
    fn from(reference: EntityRef) -> Self {
        Deferred::Reference(reference)
    }
}

/// One concrete-type branch of a polymorphic field.
#[derive(Debug, Clone)]
pub enum Branch {
    Handle(Handle),
    Inline(Deferred),
}

impl Branch {
    pub fn handle(handle: impl Into<Handle>) -> Self {
        Branch::Handle(handle.into())
    }

    pub fn entity(reference: EntityRef) -> Self {
        Branch::Inline(Deferred::Reference(reference))
    }

    pub fn literal(shape: Shape) -> Self {
        Branch::Inline(Deferred::Ready(shape))
    }
}

#[derive(Debug, Clone)]
pub enum Field {
    Scalar,
    Object(FieldTree),
    /// A reference into the in-scope pool, with literal sibling fields.
    Fragment {
        handle: Handle,
        extra: FieldTree,
    },
    Union(IndexMap<String, Branch>),
    Lazy(Deferred),
}

#[derive(Debug, Clone, Default)]
pub struct FieldTree {
    pub(crate) fields: IndexMap<String, Field>,
    pub(crate) define: Option<FragmentPool>,
}

impl FieldTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.insert(name, field);
        self
    }

    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.field(name, Field::Scalar)
    }

    pub fn scalars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.insert(name, Field::Scalar);
        }
        self
    }

    pub fn object(self, name: impl Into<String>, tree: FieldTree) -> Self {
        self.field(name, Field::Object(tree))
    }

    pub fn lazy(self, name: impl Into<String>, deferred: impl Into<Deferred>) -> Self {
        self.field(name, Field::Lazy(deferred.into()))
    }

    pub fn reference(self, name: impl Into<String>, reference: EntityRef) -> Self {
        self.lazy(name, reference)
    }

    pub fn fragment(
        self,
        name: impl Into<String>,
        handle: impl Into<Handle>,
        extra: FieldTree,
    ) -> Self {
        self.field(
            name,
            Field::Fragment {
                handle: handle.into(),
                extra,
            },
        )
    }

    pub fn union<I, S>(self, name: impl Into<String>, branches: I) -> Self
    where
        I: IntoIterator<Item = (S, Branch)>,
        S: Into<String>,
    {
        let branches = branches
            .into_iter()
            .map(|(type_name, branch)| (type_name.into(), branch))
            .collect();
        self.field(name, Field::Union(branches))
    }

    /// Adds an entry to this tree's own fragment pool.
    pub fn define(mut self, handle: impl Into<Handle>, fragment: impl Into<Deferred>) -> Self {
        self.define_mut().insert(handle.into(), fragment.into());
        self
    }

    pub(crate) fn define_mut(&mut self) -> &mut FragmentPool {
        self.define.get_or_insert_with(FragmentPool::new)
    }

    pub fn fields(&self) -> &IndexMap<String, Field> {
        &self.fields
    }

    pub fn pool(&self) -> Option<&FragmentPool> {
        self.define.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.define.as_ref().map_or(true, IndexMap::is_empty)
    }

    /// Whether no deferred value is left anywhere in the tree.
    pub fn is_resolved(&self) -> bool {
        let pool_ready = self
            .define
            .iter()
            .flat_map(IndexMap::values)
            .all(Deferred::is_ready);

        pool_ready
            && self.fields.values().all(|field| match field {
                Field::Scalar => true,
                Field::Object(tree) => tree.is_resolved(),
                Field::Fragment { extra, .. } => extra.is_resolved(),
                Field::Union(branches) => branches.values().all(|branch| match branch {
                    Branch::Handle(_) => true,
                    Branch::Inline(deferred) => deferred.is_ready(),
                }),
                Field::Lazy(deferred) => deferred.is_ready(),
            })
    }
}
