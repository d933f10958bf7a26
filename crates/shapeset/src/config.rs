use camino::Utf8Path;
use camino::Utf8PathBuf;
use kdl::KdlDocument;
use kdl::KdlNode;
use miette::Context;
use miette::LabeledSpan;
use miette::NamedSource;
use shapeset_core::CollisionPolicy;
use shapeset_core::EngineConfig;

pub(crate) const CONFIG_FILE: &str = "shapeset.kdl";

#[derive(Debug)]
pub struct Config {
    pub(crate) root_folder: Utf8PathBuf,
    pub(crate) output_folder: Utf8PathBuf,
    pub(crate) engine: EngineConfig,
}

impl Config {
    /// Defaults for a project without a configuration file.
    pub(crate) fn in_folder(root: &Utf8Path) -> Self {
        Self {
            root_folder: root.to_path_buf(),
            output_folder: root.join("generated"),
            engine: EngineConfig::default(),
        }
    }
}

fn string_value<'a>(node: &'a KdlNode, name: &str) -> miette::Result<&'a str> {
    node.get(0).and_then(|v| v.as_string()).ok_or_else(|| {
        miette::diagnostic!(
            labels = vec![LabeledSpan::new_primary_with_span(None, node.span())],
            "{name} is expected to be a string"
        )
        .into()
    })
}

/// Parses configuration text. Relative folders are taken relative to `base`.
pub(crate) fn parse_config_str(data: &str, base: &Utf8Path) -> miette::Result<Config> {
    let doc: KdlDocument = data.parse()?;

    let root_folder = doc
        .get("root_folder")
        .ok_or_else(|| miette::miette!("\"root_folder\" configuration value not found"))
        .and_then(|val| string_value(val, "root_folder"))
        .map(|path| base.join(path))?;

    let output_folder = match doc.get("output_folder") {
        Some(val) => base.join(string_value(val, "output_folder")?),
        None => root_folder.join("generated"),
    };

    let mut engine = EngineConfig::default();

    if let Some(val) = doc.get("max_depth") {
        engine.max_depth = val
            .get(0)
            .and_then(|v| v.as_integer())
            .and_then(|depth| usize::try_from(depth).ok())
            .filter(|depth| *depth > 0)
            .ok_or_else(|| {
                miette::Report::from(miette::diagnostic!(
                    labels = vec![LabeledSpan::new_primary_with_span(None, val.span())],
                    "max_depth is expected to be a positive integer"
                ))
            })?;
    }

    if let Some(val) = doc.get("on_collision") {
        engine.on_collision = match string_value(val, "on_collision")? {
            "first-wins" => CollisionPolicy::FirstWins,
            "reject" => CollisionPolicy::Reject,
            _ => {
                return Err(miette::diagnostic!(
                    labels = vec![LabeledSpan::new_primary_with_span(None, val.span())],
                    help = "Allowed values are: \"first-wins\", \"reject\"",
                    "Unknown collision policy"
                ))?
            }
        };
    }

    Ok(Config {
        root_folder,
        output_folder,
        engine,
    })
}

pub(crate) async fn parse_config(path: &Utf8Path) -> miette::Result<Config> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| miette::miette!(e))
        .wrap_err_with(|| miette::miette!("Could not read configuration at \"{path}\""))?;

    let base = path.parent().unwrap_or(Utf8Path::new("."));

    parse_config_str(&data, base)
        .map_err(|e| e.with_source_code(NamedSource::new(path, data).with_language("kdl")))
}
