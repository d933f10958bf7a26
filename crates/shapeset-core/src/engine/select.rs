use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::trace;
use tracing::warn;

use super::fragments::Fragments;
use super::Resolver;
use crate::error::Error;
use crate::error::Result;
use crate::registry::EntityDefinition;
use crate::shape::Shape;
use crate::tree::FieldTree;
use crate::tree::OmitSpec;
use crate::variant::Variant;

/// Picks the variant actually used for `requested`.
///
/// Falling back is logged, not an error: asking for `full` on an entity
/// that only defines `list` is legitimate.
pub fn find_selection(definition: &EntityDefinition, requested: Variant) -> Result<Variant> {
    let actual = std::iter::once(requested)
        .chain(requested.fallbacks())
        .find(|variant| definition.variant(*variant).is_some())
        .ok_or_else(|| Error::NoSelectionAvailable {
            type_name: definition.type_name().to_string(),
        })?;

    if actual != requested {
        warn!(
            entity = definition.type_name(),
            %requested,
            used = %actual,
            "Selection variant not defined, using fallback"
        );
    }

    Ok(actual)
}

impl Resolver {
    /// Compiles `variant` of the registered entity `type_name`.
    pub fn rel<'a>(
        &'a self,
        type_name: &'a str,
        variant: Variant,
        omit: &'a OmitSpec,
    ) -> BoxFuture<'a, Result<Shape>> {
        async move {
            let definition =
                self.registry
                    .get(type_name)
                    .ok_or_else(|| Error::UnknownEntity {
                        type_name: type_name.to_string(),
                    })?;

            self.rel_entity(definition, variant, omit).await
        }
        .boxed()
    }

    /// Compiles `requested` of `definition`, folding in its `common` tree
    /// for `full` and `list`.
    pub fn rel_entity<'a>(
        &'a self,
        definition: &'a EntityDefinition,
        requested: Variant,
        omit: &'a OmitSpec,
    ) -> BoxFuture<'a, Result<Shape>> {
        async move {
            let actual = find_selection(definition, requested)?;
            trace!(entity = definition.type_name(), %actual, "Compiling selection");

            let mut fragments = Fragments::new(self.config.on_collision);

            let mut shape = match definition.variant(actual) {
                Some(tree) => self.trimmed_shape(tree, omit).await?,
                None => Shape::new(),
            };
            fragments.absorb(std::mem::take(&mut shape.define))?;

            if actual.merges_common() {
                if let Some(common) = definition.variant(Variant::Common) {
                    let mut common = self.trimmed_shape(common, omit).await?;
                    fragments.absorb(std::mem::take(&mut common.define))?;
                    shape.merge_under(common);
                }
            }

            shape.typename = Some(definition.type_name().to_string());
            shape.selection = Some(actual);
            shape.define = fragments.into_define();
            Ok(shape)
        }
        .boxed()
    }

    async fn trimmed_shape(&self, tree: &FieldTree, omit: &OmitSpec) -> Result<Shape> {
        let mut tree = tree.clone();
        if !omit.is_empty() {
            self.omit(&mut tree, omit).await?;
        }
        self.compile_tree(tree, None).await
    }
}
