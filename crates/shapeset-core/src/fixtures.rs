//! A small entity graph with the awkward parts: a Project/ProjectVersion
//! cycle, self-referencing directories and a Team/User owner union.

use crate::registry::EntityDefinition;
use crate::registry::Registry;
use crate::tree::Branch;
use crate::tree::EntityRef;
use crate::tree::FieldTree;
use crate::variant::Variant::*;

pub(crate) fn registry() -> Registry {
    Registry::from_definitions([
        tag(),
        user(),
        team(),
        project(),
        project_version(),
        directory(),
        comment(),
        comment_translation(),
    ])
    .expect("fixture entities are unique")
}

fn tag() -> EntityDefinition {
    EntityDefinition::new("Tag")
        .with_variant(Common, FieldTree::new().scalars(["id", "tag"]))
        .with_variant(List, FieldTree::new().scalars(["created_at", "bookmarks"]))
}

fn user() -> EntityDefinition {
    EntityDefinition::new("User")
        .with_variant(Nav, FieldTree::new().scalars(["id", "handle", "name"]))
        .with_variant(
            Full,
            FieldTree::new().scalars(["id", "handle", "name", "bio", "bannerImage"]),
        )
}

fn team() -> EntityDefinition {
    EntityDefinition::new("Team").with_variant(Nav, FieldTree::new().scalars(["id", "handle"]))
}

fn project() -> EntityDefinition {
    EntityDefinition::new("Project")
        .with_variant(
            Common,
            FieldTree::new()
                .define(0, EntityRef::new("Team", Nav))
                .define(1, EntityRef::new("User", Nav))
                .define(2, EntityRef::new("Tag", List))
                .scalars(["id", "handle", "isPrivate"])
                .union(
                    "owner",
                    [("Team", Branch::handle(0)), ("User", Branch::handle(1))],
                )
                .fragment("tags", 2, FieldTree::new()),
        )
        .with_variant(
            List,
            FieldTree::new()
                .scalar("score")
                .reference("versions", EntityRef::new("ProjectVersion", List).omit("root")),
        )
        .with_variant(
            Full,
            FieldTree::new()
                .define(1, EntityRef::new("User", Nav))
                .fragment("createdBy", 1, FieldTree::new())
                .reference(
                    "versions",
                    EntityRef::new("ProjectVersion", Full).omit("root.versions"),
                ),
        )
        .with_variant(
            Nav,
            FieldTree::new()
                .scalars(["id", "handle"])
                .reference("versions", EntityRef::new("ProjectVersion", Nav)),
        )
}

fn project_version() -> EntityDefinition {
    EntityDefinition::new("ProjectVersion")
        .with_variant(Nav, FieldTree::new().scalars(["id", "versionLabel"]))
        .with_variant(
            List,
            FieldTree::new()
                .scalars(["id", "versionLabel", "isComplete"])
                .reference("root", EntityRef::new("Project", Nav)),
        )
        .with_variant(
            Full,
            FieldTree::new()
                .define(0, EntityRef::new("User", Nav))
                .scalars(["id", "versionLabel"])
                .fragment("createdBy", 0, FieldTree::new())
                .reference("root", EntityRef::new("Project", Nav))
                .reference("directories", EntityRef::new("Directory", List)),
        )
}

fn directory() -> EntityDefinition {
    EntityDefinition::new("Directory")
        .with_variant(Nav, FieldTree::new().scalars(["id", "name"]))
        .with_variant(
            List,
            FieldTree::new()
                .scalars(["id", "name"])
                .reference("parent", EntityRef::new("Directory", Nav)),
        )
        .with_variant(
            Full,
            FieldTree::new()
                .scalars(["id", "name"])
                .reference("parent", EntityRef::new("Directory", Nav))
                .reference("children", EntityRef::new("Directory", List)),
        )
}

fn comment() -> EntityDefinition {
    EntityDefinition::new("Comment")
        .with_variant(Common, FieldTree::new().scalars(["id", "score"]))
        .with_variant(
            Full,
            FieldTree::new().reference("translations", EntityRef::new("CommentTranslation", Full)),
        )
}

fn comment_translation() -> EntityDefinition {
    EntityDefinition::new("CommentTranslation")
        .with_variant(Nav, FieldTree::new().scalars(["id", "language"]))
        .with_variant(Full, FieldTree::new().scalars(["id", "language", "text"]))
}
