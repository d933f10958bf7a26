use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use tracing::debug;
use tracing::warn;

use super::fragments::Fragments;
use super::Resolver;
use crate::error::Error;
use crate::error::Result;
use crate::shape::Shape;
use crate::shape::ShapeField;
use crate::shape::UnionMember;
use crate::tree::Branch;
use crate::tree::Deferred;
use crate::tree::Field;
use crate::tree::FieldTree;
use crate::tree::FragmentPool;
use crate::tree::Handle;

/// Pool handles visible to a tree, mapped to their global fragment names.
pub(crate) type Scope = IndexMap<Handle, String>;

impl Resolver {
    /// Compiles a field tree with no inherited fragment pool.
    pub fn partial_shape(&self, tree: FieldTree) -> BoxFuture<'_, Result<Shape>> {
        self.compile_tree(tree, None)
    }

    /// A tree's own pool replaces the inherited one; trees without a pool
    /// see their parent's handles.
    pub(crate) fn compile_tree<'a>(
        &'a self,
        tree: FieldTree,
        parent: Option<&'a Scope>,
    ) -> BoxFuture<'a, Result<Shape>> {
        async move {
            let cx = self.descend()?;
            let mut fragments = Fragments::new(self.config.on_collision);

            let local = match tree.define {
                Some(pool) => Some(cx.register_pool(pool, &mut fragments).await?),
                None => None,
            };
            let scope = local.as_ref().or(parent);

            let mut shape = Shape::new();
            for (name, field) in tree.fields {
                if let Some(field) = cx.compile_field(&name, field, scope, &mut fragments).await? {
                    shape.fields.insert(name, field);
                }
            }

            shape.define = fragments.into_define();
            Ok(shape)
        }
        .boxed()
    }

    async fn register_pool(&self, pool: FragmentPool, fragments: &mut Fragments) -> Result<Scope> {
        let mut scope = Scope::new();

        for (handle, entry) in pool {
            let Some(shape) = self.resolve(&entry).await? else {
                debug!(%handle, "Fragment resolved to nothing");
                continue;
            };
            let Some(name) = shape.fragment_name() else {
                return Err(Error::UntaggedFragment { handle });
            };

            fragments.intern(name.clone(), shape)?;
            scope.insert(handle, name);
        }

        Ok(scope)
    }

    async fn compile_field(
        &self,
        name: &str,
        field: Field,
        scope: Option<&Scope>,
        fragments: &mut Fragments,
    ) -> Result<Option<ShapeField>> {
        match field {
            Field::Scalar => Ok(Some(ShapeField::Scalar)),
            Field::Object(tree) => {
                let mut child = self.compile_tree(tree, scope).await?;
                fragments.absorb(std::mem::take(&mut child.define))?;
                Ok(Some(ShapeField::Object(child)))
            }
            Field::Fragment { handle, extra } => {
                let Some(fragment) = lookup(scope, &handle) else {
                    warn!(field = name, %handle, "Missing fragment reference, skipping field");
                    return Ok(None);
                };

                let mut child = self.compile_tree(extra, scope).await?;
                fragments.absorb(std::mem::take(&mut child.define))?;
                child.uses = Some(fragment.to_string());
                Ok(Some(ShapeField::Object(child)))
            }
            Field::Union(branches) => {
                let mut members = IndexMap::new();

                for (type_name, branch) in branches {
                    match branch {
                        Branch::Handle(handle) => match lookup(scope, &handle) {
                            Some(fragment) => {
                                let member = UnionMember::Fragment(fragment.to_string());
                                members.insert(type_name, member);
                            }
                            None => warn!(
                                field = name,
                                %type_name,
                                %handle,
                                "Missing fragment reference, skipping union branch"
                            ),
                        },
                        Branch::Inline(deferred) => {
                            if let Some(shape) = self.embed(&deferred, fragments).await? {
                                members.insert(type_name, UnionMember::Inline(shape));
                            }
                        }
                    }
                }

                if members.is_empty() {
                    debug!(field = name, "No union branch left, skipping field");
                    return Ok(None);
                }
                Ok(Some(ShapeField::Union(members)))
            }
            Field::Lazy(deferred) => Ok(self
                .embed(&deferred, fragments)
                .await?
                .map(ShapeField::Object)),
        }
    }

    /// Resolves an already compiled shape and hoists its fragments.
    async fn embed(&self, deferred: &Deferred, fragments: &mut Fragments) -> Result<Option<Shape>> {
        let Some(mut shape) = self.resolve(deferred).await? else {
            return Ok(None);
        };
        fragments.absorb(std::mem::take(&mut shape.define))?;
        Ok(Some(shape))
    }
}

fn lookup<'s>(scope: Option<&'s Scope>, handle: &Handle) -> Option<&'s str> {
    scope?.get(handle).map(String::as_str)
}
