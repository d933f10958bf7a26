//! Endpoint tables: which shape every named operation compiles to.

use camino::Utf8Path;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use kdl::KdlDocument;
use kdl::KdlNode;
use kdl::KdlValue;
use miette::IntoDiagnostic;
use miette::LabeledSpan;
use miette::NamedSource;
use shapeset_core::FieldTree;
use shapeset_core::OmitSpec;
use shapeset_core::Resolver;
use shapeset_core::SearchOptions;
use shapeset_core::Shape;
use shapeset_core::Variant;
use tracing::debug;
use tracing::info;

use crate::parsing;

#[derive(Debug)]
pub(crate) enum Target {
    Selection { variant: Variant, omit: OmitSpec },
    Search(SearchOptions),
}

#[derive(Debug)]
pub(crate) struct Operation {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) target: Target,
}

#[derive(Debug)]
pub(crate) struct EndpointTable {
    pub(crate) name: String,
    pub(crate) operations: Vec<Operation>,
}

fn scalar_list(node: &KdlNode) -> FieldTree {
    FieldTree::new().scalars(
        node.entries()
            .iter()
            .filter_map(|entry| entry.value().as_string()),
    )
}

fn parse_search(node: &KdlNode) -> miette::Result<SearchOptions> {
    let mut options = SearchOptions::default();

    for child in node.iter_children() {
        match child.name().value() {
            "edges" => options.edges = Some(scalar_list(child)),
            "pageInfo" => options.page_info = Some(scalar_list(child)),
            unknown => {
                return Err(miette::diagnostic!(
                    labels = vec![LabeledSpan::new_primary_with_span(
                        Some(String::from("here")),
                        child.name().span()
                    )],
                    help = "Allowed nodes are: \"edges\", \"pageInfo\"",
                    "Unknown node \"{unknown}\"."
                ))?
            }
        }
    }

    Ok(options)
}

pub(crate) fn parse_table(name: &str, bytes: &str) -> miette::Result<EndpointTable> {
    let doc: KdlDocument = bytes.parse()?;

    let operations = doc
        .nodes()
        .iter()
        .map(|node| {
            let Some(type_name) = node.get(0).and_then(KdlValue::as_string) else {
                return Err(miette::diagnostic!(
                    labels = vec![LabeledSpan::new_primary_with_span(
                        Some(String::from("this operation")),
                        node.name().span()
                    )],
                    help = "Write it as `findOne \"Project\" variant=\"full\"`",
                    "Every operation needs the entity it returns as its first argument."
                ))?;
            };

            let target = if node.get("search").and_then(KdlValue::as_bool) == Some(true) {
                Target::Search(parse_search(node)?)
            } else {
                Target::Selection {
                    variant: parsing::parse_variant(node, "variant")?,
                    omit: parsing::parse_omissions(node)?,
                }
            };

            Ok::<_, miette::Report>(Operation {
                name: node.name().value().to_string(),
                type_name: type_name.to_string(),
                target,
            })
        })
        .collect::<miette::Result<_>>()?;

    Ok(EndpointTable {
        name: name.to_string(),
        operations,
    })
}

pub(crate) async fn load_tables(path: &Utf8Path) -> miette::Result<Vec<EndpointTable>> {
    parsing::read_kdl_files(path)
        .await?
        .into_iter()
        .map(|(name, bytes)| {
            let table = name.file_stem().unwrap_or_default().to_string();
            parse_table(&table, &bytes)
                .map_err(|e| e.with_source_code(NamedSource::new(name, bytes).with_language("kdl")))
        })
        .collect()
}

pub(crate) async fn compile_operation(
    resolver: &Resolver,
    operation: &Operation,
) -> miette::Result<Shape> {
    debug!(operation = %operation.name, entity = %operation.type_name, "Compiling operation");

    let shape = match &operation.target {
        Target::Selection { variant, omit } => {
            resolver.rel(&operation.type_name, *variant, omit).await?
        }
        Target::Search(options) => {
            let search = resolver
                .to_search(&operation.type_name, options.clone())
                .await?;
            resolver
                .rel_entity(&search, Variant::List, &OmitSpec::new())
                .await?
        }
    };

    Ok(shape)
}

pub(crate) async fn compile_table(
    resolver: &Resolver,
    table: &EndpointTable,
) -> miette::Result<IndexMap<String, Shape>> {
    let mut shapes = IndexMap::new();
    for operation in &table.operations {
        let shape = compile_operation(resolver, operation)
            .await
            .map_err(|e| {
                e.wrap_err(format!("while compiling `{}.{}`", table.name, operation.name))
            })?;
        shapes.insert(operation.name.clone(), shape);
    }
    Ok(shapes)
}

/// Fails on the first operation that selects an entity with no definition.
pub(crate) fn check_entities(
    resolver: &Resolver,
    tables: &[EndpointTable],
) -> miette::Result<()> {
    for table in tables {
        for operation in &table.operations {
            if !resolver.registry().contains(&operation.type_name) {
                let file = format!("{}.kdl", operation.type_name);
                return Err(miette::diagnostic!(
                    help = format!("Add a `{file}` file to the definitions folder"),
                    "`{}.{}` selects the unregistered entity `{}`",
                    table.name,
                    operation.name,
                    operation.type_name,
                ))?;
            }
        }
    }

    Ok(())
}

/// Compiles every table concurrently and writes `<output>/<table>.json`.
///
/// Nothing is written if any operation names an unknown entity.
pub(crate) async fn build(
    resolver: &Resolver,
    tables: &[EndpointTable],
    output: &Utf8Path,
) -> miette::Result<Vec<Utf8PathBuf>> {
    check_entities(resolver, tables)?;
    tokio::fs::create_dir_all(output).await.into_diagnostic()?;

    futures::future::try_join_all(tables.iter().map(|table| async move {
        let shapes = compile_table(resolver, table).await?;
        let path = output.join(format!("{}.json", table.name));
        let json = serde_json::to_string_pretty(&shapes).into_diagnostic()?;
        tokio::fs::write(&path, json).await.into_diagnostic()?;
        info!(%path, operations = shapes.len(), "Wrote endpoint table");
        Ok::<_, miette::Report>(path)
    }))
    .await
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use shapeset_core::EntityDefinition;
    use shapeset_core::EntityRef;
    use shapeset_core::Registry;

    use super::*;

    fn resolver() -> Resolver {
        Resolver::new(
            Registry::from_definitions([
                EntityDefinition::new("User")
                    .with_variant(Variant::Nav, FieldTree::new().scalars(["id", "handle"])),
                EntityDefinition::new("Project")
                    .with_variant(
                        Variant::Common,
                        FieldTree::new()
                            .define(0, EntityRef::new("User", Variant::Nav))
                            .fragment("owner", 0, FieldTree::new()),
                    )
                    .with_variant(Variant::List, FieldTree::new().scalar("id")),
            ])
            .unwrap(),
        )
    }

    const TABLE: &str = r#"
        findOne "Project" variant="full"
        findMany "Project" search=#true {
            pageInfo "hasNextPage" "endCursor" "totalCount"
        }
        update "Project" variant="list" {
            omit "owner"
        }
    "#;

    #[test]
    fn parses_operations() {
        let table = parse_table("project", TABLE).unwrap();

        let names = table
            .operations
            .iter()
            .map(|operation| operation.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["findOne", "findMany", "update"]);
        assert!(matches!(
            table.operations[1].target,
            Target::Search(ref options) if options.page_info.is_some()
        ));
        assert!(matches!(
            &table.operations[2].target,
            Target::Selection { variant: Variant::List, omit } if *omit == OmitSpec::from(["owner"])
        ));
    }

    #[test]
    fn operations_need_an_entity() {
        let err = parse_table("project", "findOne variant=\"full\"").unwrap_err();
        assert!(err.to_string().contains("first argument"));
    }

    #[tokio::test]
    async fn unknown_entities_stop_the_build_early() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8Path::from_path(dir.path()).unwrap().join("generated");
        let tables = vec![parse_table("ghost", r#"findOne "Ghost" variant="full""#).unwrap()];

        let err = build(&resolver(), &tables, &output).await.unwrap_err();

        assert!(err.to_string().contains("`ghost.findOne` selects the unregistered entity"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn builds_one_document_per_table() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8Path::from_path(dir.path()).unwrap().join("generated");
        let tables = vec![parse_table("project", TABLE).unwrap()];

        let written = build(&resolver(), &tables, &output).await.unwrap();
        assert_eq!(written, vec![output.join("project.json")]);

        let json: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&written[0]).await.unwrap()).unwrap();

        assert_eq!(
            json["findOne"],
            serde_json::json!({
                "__typename": "Project",
                "__selectionType": "list",
                "id": true,
                "owner": { "__use": "User_nav" },
                "__define": { "User_nav": { "__typename": "User", "__selectionType": "nav", "id": true, "handle": true } },
            })
        );
        assert_eq!(
            json["findMany"]["pageInfo"],
            serde_json::json!({ "hasNextPage": true, "endCursor": true, "totalCount": true })
        );
        assert_eq!(
            json["findMany"]["edges"]["node"]["owner"],
            serde_json::json!({ "__use": "User_nav" })
        );
        assert_eq!(json["update"]["id"], serde_json::json!(true));
        assert!(json["update"].get("owner").is_none());
    }

    #[tokio::test]
    async fn demo_project_builds() {
        let root = Utf8Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../../demo"));
        let config = crate::config::parse_config(&root.join(crate::config::CONFIG_FILE))
            .await
            .unwrap();
        let registry = parsing::load_definitions(&config.root_folder.join("definitions"))
            .await
            .unwrap();
        let resolver = Resolver::with_config(registry, config.engine);
        let tables = load_tables(&config.root_folder.join("endpoints"))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = Utf8Path::from_path(dir.path()).unwrap();
        let written = build(&resolver, &tables, output).await.unwrap();
        assert_eq!(written.len(), 2);

        let table = |name: &str| tables.iter().find(|table| table.name == name).unwrap();

        let project = compile_table(&resolver, table("project")).await.unwrap();
        let find_one = &project["findOne"];
        assert_eq!(
            find_one.define.keys().collect::<Vec<_>>(),
            ["User_nav", "Team_nav", "Tag_list"]
        );
        assert_eq!(
            find_one
                .node("versions.root")
                .map(|root| root.fields.contains_key("versions")),
            Some(false)
        );
        assert_eq!(
            project["findMany"].node("edges.node").unwrap().selection,
            Some(Variant::List)
        );

        let comment = compile_table(&resolver, table("comment")).await.unwrap();
        let translations = comment["create"].node("translations").unwrap();
        assert!(translations.fields.contains_key("language"));
        assert!(!translations.fields.contains_key("text"));
        assert_eq!(
            comment["findMany"].node("edges.node").unwrap().selection,
            Some(Variant::Common)
        );
    }
}
