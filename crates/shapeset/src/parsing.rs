use camino::Utf8Path;
use camino::Utf8PathBuf;
use futures::StreamExt;
use futures::TryStreamExt;
use kdl::KdlDocument;
use kdl::KdlEntry;
use kdl::KdlNode;
use kdl::KdlValue;
use miette::IntoDiagnostic;
use miette::LabeledSpan;
use miette::NamedSource;
use owo_colors::OwoColorize;
use shapeset_core::Branch;
use shapeset_core::EntityDefinition;
use shapeset_core::EntityRef;
use shapeset_core::Field;
use shapeset_core::FieldTree;
use shapeset_core::Handle;
use shapeset_core::OmitSpec;
use shapeset_core::Registry;
use shapeset_core::Shape;
use shapeset_core::Variant;
use tokio_stream::wrappers::ReadDirStream;

pub(crate) fn parse_handle(entry: &KdlEntry) -> miette::Result<Handle> {
    match entry.value() {
        KdlValue::String(name) => Ok(Handle::Name(name.clone())),
        KdlValue::Integer(index) => u32::try_from(*index).map(Handle::Index).map_err(|_| {
            miette::diagnostic!(
                labels = vec![LabeledSpan::new_primary_with_span(None, entry.span())],
                "Fragment handles have to fit into 32 bits."
            )
            .into()
        }),
        _ => Err(miette::diagnostic!(
            labels = vec![LabeledSpan::new_primary_with_span(None, entry.span())],
            "A fragment handle is either an integer or a string."
        ))?,
    }
}

pub(crate) fn parse_variant(node: &KdlNode, key: &str) -> miette::Result<Variant> {
    let Some(entry) = node.entry(key) else {
        return Err(miette::diagnostic!(
            labels = vec![LabeledSpan::new_primary_with_span(
                Some(String::from("this reference")),
                node.name().span()
            )],
            help = "Add one of: variant=\"common\", \"full\", \"list\" or \"nav\"",
            "Missing `{key}` property."
        ))?;
    };

    entry
        .value()
        .as_string()
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| {
            miette::diagnostic!(
                labels = vec![LabeledSpan::new_primary_with_span(None, entry.span())],
                help = "Allowed variants are: common, full, list, nav",
                "Unknown selection variant."
            )
            .into()
        })
}

/// `omit "a.b" "c"` children, repeated as often as needed.
pub(crate) fn parse_omissions(node: &KdlNode) -> miette::Result<OmitSpec> {
    let mut omit = OmitSpec::new();

    for child in node.iter_children() {
        if child.name().value() != "omit" {
            return Err(miette::diagnostic!(
                labels = vec![LabeledSpan::new_primary_with_span(
                    Some(String::from("here")),
                    child.name().span()
                )],
                help = "Only `omit` nodes are allowed below a reference",
                "Unknown node \"{}\".",
                child.name().value().red(),
            ))?;
        }

        for entry in child.entries() {
            let Some(path) = entry.value().as_string() else {
                return Err(miette::diagnostic!(
                    labels = vec![LabeledSpan::new_primary_with_span(None, entry.span())],
                    "Omitted paths are strings like \"root.versions\"."
                ))?;
            };
            omit.insert(path);
        }
    }

    Ok(omit)
}

fn parse_reference(node: &KdlNode) -> miette::Result<EntityRef> {
    let Some(type_entry) = node.entry("ref") else {
        return Err(miette::diagnostic!(
            labels = vec![LabeledSpan::new_primary_with_span(None, node.span())],
            "Missing `ref` property."
        ))?;
    };
    let Some(type_name) = type_entry.value().as_string() else {
        return Err(miette::diagnostic!(
            labels = vec![LabeledSpan::new_primary_with_span(None, type_entry.span())],
            "The `ref` property names an entity and needs to be a string."
        ))?;
    };

    Ok(EntityRef {
        type_name: type_name.to_string(),
        variant: parse_variant(node, "variant")?,
        omit: parse_omissions(node)?,
    })
}

/// Literal branches are plain shapes, so their nodes are bare names or blocks.
fn parse_literal(doc: &KdlDocument) -> miette::Result<Shape> {
    let mut shape = Shape::new();

    for node in doc.nodes() {
        if !node.entries().is_empty() {
            return Err(miette::diagnostic!(
                labels = vec![LabeledSpan::new_primary_with_span(
                    Some(String::from("this field")),
                    node.span()
                )],
                help = "Move `ref`/`use` fields into a `ref=` or `use=` branch",
                "Fields of a literal union branch cannot carry properties"
            ))?;
        }

        let name = node.name().value();
        shape = match node.children() {
            Some(children) => shape.object(name, parse_literal(children)?),
            None => shape.scalar(name),
        };
    }

    Ok(shape)
}

fn parse_branch(node: &KdlNode) -> miette::Result<Branch> {
    if let Some(handle) = node.entry("use") {
        return parse_handle(handle).map(Branch::Handle);
    }
    if node.entry("ref").is_some() {
        return parse_reference(node).map(Branch::entity);
    }
    if let Some(children) = node.children() {
        return parse_literal(children).map(Branch::literal);
    }

    Err(miette::diagnostic!(
        labels = vec![LabeledSpan::new_primary_with_span(
            Some(String::from("this branch")),
            node.name().span()
        )],
        help = "Set `use=<handle>`, `ref=\"Type\" variant=\"...\"`, or give it a block of fields",
        "Unrecognizable union branch"
    ))?
}

fn parse_field(node: &KdlNode) -> miette::Result<Field> {
    if node.entry("ref").is_some() {
        return parse_reference(node).map(|reference| Field::Lazy(reference.into()));
    }

    if let Some(handle) = node.entry("use") {
        let extra = match node.children() {
            Some(children) => parse_tree(children)?,
            None => FieldTree::new(),
        };
        return Ok(Field::Fragment {
            handle: parse_handle(handle)?,
            extra,
        });
    }

    if node.get("union").and_then(KdlValue::as_bool) == Some(true) {
        let branches = node
            .iter_children()
            .map(|branch| {
                Ok::<_, miette::Report>((branch.name().value().to_string(), parse_branch(branch)?))
            })
            .collect::<miette::Result<_>>()?;
        return Ok(Field::Union(branches));
    }

    match (node.children(), node.entries().is_empty()) {
        (Some(children), true) => Ok(Field::Object(parse_tree(children)?)),
        (None, true) => Ok(Field::Scalar),
        _ => Err(miette::diagnostic!(
            labels = vec![LabeledSpan::new_primary_with_span(
                Some(String::from("this field")),
                node.span()
            )],
            help = "A field is a bare name, a block, or carries `ref`, `use` or `union=#true`",
            "Unrecognizable field definition"
        ))?,
    }
}

fn parse_pool(node: &KdlNode, tree: &mut FieldTree) -> miette::Result<()> {
    for fragment in node.iter_children() {
        if fragment.name().value() != "fragment" {
            return Err(miette::diagnostic!(
                labels = vec![LabeledSpan::new_primary_with_span(
                    Some(String::from("here")),
                    fragment.name().span()
                )],
                help = "Allowed nodes are: \"fragment\"",
                "Unknown node \"{}\".",
                fragment.name().value().red(),
            ))?;
        }

        let Some(handle) = fragment.entry(0) else {
            return Err(miette::diagnostic!(
                labels = vec![LabeledSpan::new_primary_with_span(
                    Some(String::from("this fragment")),
                    fragment.name().span()
                )],
                "Every fragment needs a handle as its first argument."
            ))?;
        };

        let handle = parse_handle(handle)?;
        let reference = parse_reference(fragment)?;
        *tree = std::mem::take(tree).define(handle, reference);
    }

    Ok(())
}

pub(crate) fn parse_tree(doc: &KdlDocument) -> miette::Result<FieldTree> {
    let mut tree = FieldTree::new();

    for node in doc.nodes() {
        match node.name().value() {
            "define" => parse_pool(node, &mut tree)?,
            name => tree.insert(name, parse_field(node)?),
        }
    }

    Ok(tree)
}

pub(crate) fn parse_definition(type_name: &str, bytes: &str) -> miette::Result<EntityDefinition> {
    let doc: KdlDocument = bytes.parse()?;

    let mut definition = EntityDefinition::new(type_name);
    let mut seen = vec![];

    for node in doc.nodes() {
        let Ok(variant) = node.name().value().parse::<Variant>() else {
            return Err(miette::diagnostic!(
                labels = vec![LabeledSpan::new_primary_with_span(
                    Some(String::from("here")),
                    node.name().span()
                )],
                help = "Allowed nodes are: \"common\", \"full\", \"list\", \"nav\"",
                "Unknown node \"{}\".",
                node.name().value().red(),
            ))?;
        };

        if seen.contains(&variant) {
            return Err(miette::diagnostic!(
                labels = vec![LabeledSpan::new_primary_with_span(
                    Some(String::from("second definition")),
                    node.name().span()
                )],
                "The `{variant}` selection is defined twice."
            ))?;
        }
        seen.push(variant);

        let tree = match node.children() {
            Some(children) => parse_tree(children)?,
            None => FieldTree::new(),
        };
        definition = definition.with_variant(variant, tree);
    }

    Ok(definition)
}

/// Every `*.kdl` file of `path`, read concurrently.
pub(crate) async fn read_kdl_files(path: &Utf8Path) -> miette::Result<Vec<(Utf8PathBuf, String)>> {
    let mut files: Vec<(Utf8PathBuf, String)> =
        ReadDirStream::new(tokio::fs::read_dir(path).await.into_diagnostic()?)
            .map_err(miette::Report::from_err)
            .and_then(|entry| async move {
                let path = Utf8PathBuf::from_path_buf(entry.path()).map_err(|path| {
                    miette::miette!("\"{}\" is not a valid UTF-8 path", path.display())
                })?;

                if entry.file_type().await.into_diagnostic()?.is_file()
                    && path.extension() == Some("kdl")
                {
                    let bytes = tokio::fs::read_to_string(&path).await.into_diagnostic()?;
                    Ok(Some((path, bytes)))
                } else {
                    Ok(None)
                }
            })
            .flat_map(|val| futures::stream::iter(val.transpose()))
            .try_collect()
            .await?;

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

pub(crate) async fn load_definitions(path: &Utf8Path) -> miette::Result<Registry> {
    let definitions = read_kdl_files(path)
        .await?
        .into_iter()
        .map(|(name, bytes)| {
            let type_name = name.file_stem().unwrap_or_default().to_string();
            parse_definition(&type_name, &bytes)
                .map_err(|e| e.with_source_code(NamedSource::new(name, bytes).with_language("kdl")))
        })
        .collect::<miette::Result<Vec<_>>>()?;

    Ok(Registry::from_definitions(definitions)?)
}

#[cfg(test)]
mod tests {
    use shapeset_core::OmitSpec;
    use shapeset_core::Resolver;
    use shapeset_core::ShapeField;

    use super::*;

    const PROJECT: &str = r#"
        common {
            define {
                fragment 0 ref="Team" variant="nav"
                fragment 1 ref="User" variant="nav"
            }
            id
            handle
            owner union=#true {
                Team use=0
                User use=1
            }
        }
        full {
            versions ref="ProjectVersion" variant="full" {
                omit "root.versions"
            }
            you {
                canDelete
                canUpdate
            }
        }
    "#;

    #[test]
    fn parses_variant_blocks() {
        let definition = parse_definition("Project", PROJECT).unwrap();

        assert_eq!(
            definition.variants().collect::<Vec<_>>(),
            vec![Variant::Common, Variant::Full]
        );

        let common = definition.variant(Variant::Common).unwrap();
        assert_eq!(common.pool().map(|pool| pool.len()), Some(2));
        assert!(matches!(
            common.fields()["owner"],
            Field::Union(ref branches) if branches.len() == 2
        ));

        let full = definition.variant(Variant::Full).unwrap();
        let Field::Lazy(shapeset_core::Deferred::Reference(versions)) = &full.fields()["versions"]
        else {
            panic!("versions should be a reference");
        };
        assert_eq!(versions.type_name, "ProjectVersion");
        assert_eq!(versions.variant, Variant::Full);
        assert_eq!(versions.omit, OmitSpec::from(["root.versions"]));
        assert!(matches!(full.fields()["you"], Field::Object(_)));
    }

    #[test]
    fn parses_handles_and_union_literals() {
        let doc: KdlDocument = r#"
            define {
                fragment "author" ref="User" variant="nav"
            }
            createdBy use="author" {
                isBot
            }
            subject union=#true {
                Team ref="Team" variant="nav"
                Note {
                    id
                    body { text }
                }
            }
        "#
        .parse()
        .unwrap();

        let tree = parse_tree(&doc).unwrap();

        assert!(tree.pool().unwrap().contains_key(&Handle::from("author")));
        assert!(matches!(
            &tree.fields()["createdBy"],
            Field::Fragment { handle, extra }
                if *handle == Handle::from("author") && extra.fields().contains_key("isBot")
        ));

        let Field::Union(branches) = &tree.fields()["subject"] else {
            panic!("subject should be a union");
        };
        assert!(matches!(branches["Team"], Branch::Inline(shapeset_core::Deferred::Reference(_))));
        let Branch::Inline(shapeset_core::Deferred::Ready(note)) = &branches["Note"] else {
            panic!("Note should be a literal");
        };
        assert_eq!(
            note.node("body").map(|body| body.fields.contains_key("text")),
            Some(true)
        );
    }

    #[test]
    fn rejects_unknown_variants() {
        let err = parse_definition("Tag", "detail { id }").unwrap_err();
        assert!(err.to_string().contains("Unknown node"));
    }

    #[test]
    fn rejects_references_without_variant() {
        let err = parse_definition("Tag", r#"full { owner ref="User" }"#).unwrap_err();
        assert!(err.to_string().contains("Missing `variant` property"));
    }

    #[test]
    fn rejects_properties_inside_literal_branches() {
        let err = parse_definition(
            "Comment",
            r#"full {
                subject union=#true {
                    Note { id; author use=0 }
                }
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot carry properties"));

        let err = parse_definition(
            "Comment",
            r#"full {
                subject union=#true {
                    Note { project ref="Project" variant="nav" }
                }
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot carry properties"));
    }

    #[test]
    fn rejects_duplicate_variants() {
        let err = parse_definition("Tag", "nav { id }\nnav { tag }").unwrap_err();
        assert!(err.to_string().contains("defined twice"));
    }

    #[tokio::test]
    async fn loads_a_definition_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        tokio::fs::write(root.join("Project.kdl"), PROJECT).await.unwrap();
        tokio::fs::write(root.join("Team.kdl"), "nav { id; handle }")
            .await
            .unwrap();
        tokio::fs::write(root.join("User.kdl"), "nav { id; name }")
            .await
            .unwrap();
        tokio::fs::write(
            root.join("ProjectVersion.kdl"),
            r#"full { id; root ref="Project" variant="nav" }"#,
        )
        .await
        .unwrap();
        tokio::fs::write(root.join("notes.txt"), "not a definition")
            .await
            .unwrap();

        let registry = load_definitions(root).await.unwrap();
        assert_eq!(registry.len(), 4);

        let shape = Resolver::new(registry)
            .rel("Project", Variant::Full, &OmitSpec::new())
            .await
            .unwrap();

        let versions = shape.node("versions").unwrap();
        assert_eq!(versions.selection, Some(Variant::Full));
        assert_eq!(
            versions.node("root").map(|root| root.selection),
            Some(Some(Variant::Common))
        );
        assert!(matches!(shape.fields["owner"], ShapeField::Union(_)));
        assert_eq!(
            shape.define.keys().collect::<Vec<_>>(),
            ["Team_nav", "User_nav"]
        );
    }
}
