//! Compiled shapes, the output side of the engine.

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;
use tracing::debug;

use crate::variant::Variant;

/// A finite, self-contained selection tree.
///
/// `define` only carries entries on a compilation root; nested shapes have
/// their fragments hoisted into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    pub typename: Option<String>,
    pub selection: Option<Variant>,
    /// Name of the shared fragment this node expands, next to its own fields.
    pub uses: Option<String>,
    pub fields: IndexMap<String, ShapeField>,
    pub define: IndexMap<String, Shape>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeField {
    Scalar,
    Object(Shape),
    Union(IndexMap<String, UnionMember>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnionMember {
    Fragment(String),
    Inline(Shape),
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tagged(typename: impl Into<String>, selection: Variant) -> Self {
        Self {
            typename: Some(typename.into()),
            selection: Some(selection),
            ..Self::default()
        }
    }

    pub fn scalar(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), ShapeField::Scalar);
        self
    }

    pub fn scalars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.fields.insert(name.into(), ShapeField::Scalar);
        }
        self
    }

    pub fn object(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.fields.insert(name.into(), ShapeField::Object(shape));
        self
    }

    /// Canonical fragment key.
    pub fn fragment_name(&self) -> Option<String> {
        match (&self.typename, self.selection) {
            (Some(typename), Some(selection)) => Some(format!("{typename}_{selection}")),
            _ => None,
        }
    }

    /// Looks up a nested node by dot path. Union segments name a concrete
    /// type and only descend into inline members.
    pub fn node(&self, path: &str) -> Option<&Shape> {
        let mut segments = path.split('.');
        let mut current = self;

        while let Some(segment) = segments.next() {
            current = match current.fields.get(segment)? {
                ShapeField::Scalar => return None,
                ShapeField::Object(shape) => shape,
                ShapeField::Union(members) => match members.get(segments.next()?)? {
                    UnionMember::Inline(shape) => shape,
                    UnionMember::Fragment(_) => return None,
                },
            };
        }

        Some(current)
    }

    /// Folds `other` underneath `self`.
    ///
    /// Fields of `self` win; nested objects and inline union members merge
    /// recursively. `define` is left to the caller, which owns fragment
    /// interning.
    pub fn merge_under(&mut self, other: Shape) {
        if self.typename.is_none() {
            self.typename = other.typename;
        }
        if self.selection.is_none() {
            self.selection = other.selection;
        }
        if self.uses.is_none() {
            self.uses = other.uses;
        }

        for (name, theirs) in other.fields {
            let Some(mine) = self.fields.get_mut(&name) else {
                self.fields.insert(name, theirs);
                continue;
            };

            match (mine, theirs) {
                (ShapeField::Object(mine), ShapeField::Object(theirs)) => mine.merge_under(theirs),
                (ShapeField::Union(mine), ShapeField::Union(theirs)) => {
                    for (type_name, member) in theirs {
                        match mine.entry(type_name) {
                            Entry::Vacant(slot) => {
                                slot.insert(member);
                            }
                            Entry::Occupied(mut slot) => {
                                if let (UnionMember::Inline(mine), UnionMember::Inline(theirs)) =
                                    (slot.get_mut(), member)
                                {
                                    mine.merge_under(theirs);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Removes the field at `segments`. Returns whether anything was removed.
    pub fn remove_path(&mut self, segments: &[&str]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return false;
        };

        if rest.is_empty() {
            return self.fields.shift_remove(*first).is_some();
        }

        match self.fields.get_mut(*first) {
            Some(ShapeField::Object(shape)) => shape.remove_path(rest),
            Some(ShapeField::Union(members)) => {
                let Some((type_name, rest)) = rest.split_first() else {
                    return false;
                };
                if rest.is_empty() {
                    return members.shift_remove(*type_name).is_some();
                }
                match members.get_mut(*type_name) {
                    Some(UnionMember::Inline(shape)) => shape.remove_path(rest),
                    Some(UnionMember::Fragment(name)) => {
                        debug!(
                            %name,
                            path = segments.join("."),
                            "Not omitting inside a shared fragment"
                        );
                        false
                    }
                    None => false,
                }
            }
            Some(ShapeField::Scalar) | None => false,
        }
    }
}

impl Serialize for Shape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(typename) = &self.typename {
            map.serialize_entry("__typename", typename)?;
        }
        if let Some(selection) = self.selection {
            map.serialize_entry("__selectionType", selection.as_str())?;
        }
        if let Some(uses) = &self.uses {
            map.serialize_entry("__use", uses)?;
        }
        for (name, field) in &self.fields {
            map.serialize_entry(name, field)?;
        }
        if !self.define.is_empty() {
            map.serialize_entry("__define", &self.define)?;
        }
        map.end()
    }
}

impl Serialize for ShapeField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ShapeField::Scalar => serializer.serialize_bool(true),
            ShapeField::Object(shape) => shape.serialize(serializer),
            ShapeField::Union(members) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("__union", members)?;
                map.end()
            }
        }
    }
}

impl Serialize for UnionMember {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UnionMember::Fragment(name) => serializer.serialize_str(name),
            UnionMember::Inline(shape) => shape.serialize(serializer),
        }
    }
}
