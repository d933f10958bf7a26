use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::error::Error;
use crate::error::Result;
use crate::tree::FieldTree;
use crate::variant::Variant;

/// The declarative selections of one entity type.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    type_name: String,
    variants: BTreeMap<Variant, FieldTree>,
}

impl EntityDefinition {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            variants: BTreeMap::new(),
        }
    }

    pub fn with_variant(mut self, variant: Variant, tree: FieldTree) -> Self {
        self.variants.insert(variant, tree);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The tree for `variant`, if the entity defines a non-empty one.
    pub fn variant(&self, variant: Variant) -> Option<&FieldTree> {
        self.variants.get(&variant).filter(|tree| !tree.is_empty())
    }

    pub fn variants(&self) -> impl Iterator<Item = Variant> + '_ {
        self.variants
            .iter()
            .filter(|(_, tree)| !tree.is_empty())
            .map(|(variant, _)| *variant)
    }
}

/// Entity definitions by type name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: IndexMap<String, EntityDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(
        definitions: impl IntoIterator<Item = EntityDefinition>,
    ) -> Result<Self> {
        let mut registry = Registry::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, definition: EntityDefinition) -> Result<()> {
        if self.entities.contains_key(definition.type_name()) {
            return Err(Error::DuplicateEntity {
                type_name: definition.type_name,
            });
        }

        self.entities.insert(definition.type_name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<&EntityDefinition> {
        self.entities.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entities.contains_key(type_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trees_do_not_count_as_variants() {
        let definition = EntityDefinition::new("Tag")
            .with_variant(Variant::Nav, FieldTree::new())
            .with_variant(Variant::List, FieldTree::new().scalar("tag"));

        assert!(definition.variant(Variant::Nav).is_none());
        assert_eq!(definition.variants().collect::<Vec<_>>(), vec![Variant::List]);
    }

    #[test]
    fn rejects_a_second_definition_for_a_type() {
        let tag =
            EntityDefinition::new("Tag").with_variant(Variant::Nav, FieldTree::new().scalar("id"));
        let registry = Registry::from_definitions([tag.clone(), tag]);

        assert!(matches!(
            registry,
            Err(Error::DuplicateEntity { type_name }) if type_name == "Tag"
        ));
    }
}
