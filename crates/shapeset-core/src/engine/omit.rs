use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use super::Resolver;
use crate::error::Result;
use crate::tree::Branch;
use crate::tree::Deferred;
use crate::tree::Field;
use crate::tree::FieldTree;
use crate::tree::OmitSpec;

impl Resolver {
    /// Strips every path of `omit` from `tree`.
    pub async fn omit(&self, tree: &mut FieldTree, omit: &OmitSpec) -> Result<()> {
        for path in omit.iter() {
            let segments = path
                .split('.')
                .filter(|segment| !segment.is_empty())
                .collect::<Vec<_>>();

            if !self.strip(tree, &segments).await? {
                debug!(path, "Omitted path matched nothing");
            }
        }

        Ok(())
    }

    fn strip<'a>(
        &'a self,
        tree: &'a mut FieldTree,
        segments: &'a [&'a str],
    ) -> BoxFuture<'a, Result<bool>> {
        async move {
            let Some((first, rest)) = segments.split_first() else {
                return Ok(false);
            };

            if rest.is_empty() {
                return Ok(tree.fields.shift_remove(*first).is_some());
            }

            match tree.fields.get_mut(*first) {
                None | Some(Field::Scalar) => Ok(false),
                Some(Field::Object(sub)) => self.strip(sub, rest).await,
                Some(Field::Fragment { handle, extra }) => {
                    debug!(
                        %handle,
                        path = segments.join("."),
                        "Only trimming the sibling fields of a shared fragment"
                    );
                    self.strip(extra, rest).await
                }
                Some(Field::Union(branches)) => {
                    let Some((type_name, rest)) = rest.split_first() else {
                        return Ok(false);
                    };
                    if rest.is_empty() {
                        return Ok(branches.shift_remove(*type_name).is_some());
                    }

                    match branches.get_mut(*type_name) {
                        Some(Branch::Inline(deferred)) => {
                            match self.strip_deferred(deferred, rest).await? {
                                Some(removed) => Ok(removed),
                                None => Ok(branches.shift_remove(*type_name).is_some()),
                            }
                        }
                        Some(Branch::Handle(handle)) => {
                            debug!(
                                %handle,
                                path = segments.join("."),
                                "Not omitting inside a shared fragment"
                            );
                            Ok(false)
                        }
                        None => Ok(false),
                    }
                }
                Some(Field::Lazy(deferred)) => match self.strip_deferred(deferred, rest).await? {
                    Some(removed) => Ok(removed),
                    None => Ok(tree.fields.shift_remove(*first).is_some()),
                },
            }
        }
        .boxed()
    }

    /// References take the remaining path as their own omission, so a cut
    /// back-edge is never expanded.
    ///
    /// Returns `None` when a thunk resolved to nothing and its field has to go.
    async fn strip_deferred(
        &self,
        deferred: &mut Deferred,
        rest: &[&str],
    ) -> Result<Option<bool>> {
        match deferred {
            Deferred::Reference(reference) => {
                reference.omit.insert(rest.join("."));
                Ok(Some(true))
            }
            Deferred::Ready(shape) => Ok(Some(shape.remove_path(rest))),
            Deferred::Pending(_) => {
                let Some(mut shape) = self.resolve(deferred).await? else {
                    return Ok(None);
                };
                let removed = shape.remove_path(rest);
                *deferred = Deferred::Ready(shape);
                Ok(Some(removed))
            }
        }
    }
}
