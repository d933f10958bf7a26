use super::Resolver;
use crate::error::Result;
use crate::registry::EntityDefinition;
use crate::shape::Shape;
use crate::tree::FieldTree;
use crate::tree::Handle;
use crate::tree::OmitSpec;
use crate::variant::Variant;

/// Replacement trees for the pagination envelope.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Added next to `cursor` and `node`, replacing them on a name clash.
    pub edges: Option<FieldTree>,
    /// Replaces the default `pageInfo { hasNextPage endCursor }`.
    pub page_info: Option<FieldTree>,
}

/// Wraps a compiled `list` shape in a `<Type>SearchResult` entity.
///
/// The node loses its `__define`, which moves to the envelope's `list` tree.
pub fn search_definition(
    type_name: &str,
    mut shape: Shape,
    options: SearchOptions,
) -> EntityDefinition {
    let define = std::mem::take(&mut shape.define);

    let mut edges = FieldTree::new().scalar("cursor").lazy("node", shape);
    if let Some(extra) = options.edges {
        edges.fields.extend(extra.fields);
        // `node` is already compiled, so the override's pool can scope the
        // whole `edges` tree.
        if let Some(pool) = extra.define {
            edges.define_mut().extend(pool);
        }
    }

    let page_info = options
        .page_info
        .unwrap_or_else(|| FieldTree::new().scalars(["hasNextPage", "endCursor"]));

    let mut list = FieldTree::new()
        .object("edges", edges)
        .object("pageInfo", page_info);
    for (name, fragment) in define {
        list = list.define(Handle::Name(name), fragment);
    }

    EntityDefinition::new(format!("{type_name}SearchResult")).with_variant(Variant::List, list)
}

impl Resolver {
    /// Builds the search-result entity for `type_name` from its `list` shape.
    pub async fn to_search(
        &self,
        type_name: &str,
        options: SearchOptions,
    ) -> Result<EntityDefinition> {
        let shape = self.rel(type_name, Variant::List, &OmitSpec::new()).await?;
        Ok(search_definition(type_name, shape, options))
    }
}
