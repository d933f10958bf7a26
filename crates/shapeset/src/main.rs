use camino::Utf8PathBuf;
use clap::Parser;
use clap::Subcommand;
use clap::ValueHint;
use human_panic::Metadata;
use miette::IntoDiagnostic;
use owo_colors::OwoColorize;
use shapeset_core::OmitSpec;
use shapeset_core::Resolver;
use shapeset_core::SearchOptions;
use shapeset_core::Variant;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod endpoints;
mod parsing;

#[derive(Debug, Parser)]
struct Args {
    /// Project folder, holding `shapeset.kdl` or `definitions/` directly
    #[arg(short, long, value_hint(ValueHint::DirPath), default_value = ".")]
    path: Utf8PathBuf,

    #[arg(short, long, value_hint(ValueHint::FilePath))]
    config: Option<Utf8PathBuf>,

    /// Overrides `max_depth` from the configuration
    #[arg(long)]
    max_depth: Option<usize>,

    #[command(subcommand)]
    mode: ArgMode,
}

#[derive(Debug, Subcommand)]
enum ArgMode {
    /// Compile every endpoint table into the output folder
    Build,
    /// Print one compiled shape
    Dump {
        type_name: String,

        #[arg(short, long, default_value_t = Variant::Full)]
        variant: Variant,

        #[arg(long)]
        omit: Vec<String>,

        /// Wrap the `list` shape in a search result
        #[arg(long, conflicts_with_all = ["variant", "omit"])]
        search: bool,
    },
    /// Show the registered entities and their variants
    List,
}

async fn load_config(args: &Args) -> miette::Result<config::Config> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| args.path.join(config::CONFIG_FILE));

    let mut config = if args.config.is_some() || path.is_file() {
        config::parse_config(&path).await?
    } else {
        config::Config::in_folder(&args.path)
    };

    if let Some(max_depth) = args.max_depth {
        config.engine.max_depth = max_depth;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    human_panic::setup_panic!(
        Metadata::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
            .authors(env!("CARGO_PKG_AUTHORS"))
    );

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args).await?;

    let registry = parsing::load_definitions(&config.root_folder.join("definitions")).await?;
    let resolver = Resolver::with_config(registry, config.engine.clone());
    info!(
        entities = resolver.registry().len(),
        max_depth = resolver.config().max_depth,
        on_collision = ?resolver.config().on_collision,
        "Loaded definitions"
    );

    match args.mode {
        ArgMode::Build => {
            let tables = endpoints::load_tables(&config.root_folder.join("endpoints")).await?;
            let written = endpoints::build(&resolver, &tables, &config.output_folder).await?;
            info!(tables = written.len(), output = %config.output_folder, "Build finished");
        }
        ArgMode::Dump {
            type_name,
            variant,
            omit,
            search,
        } => {
            let shape = if search {
                let search = resolver
                    .to_search(&type_name, SearchOptions::default())
                    .await?;
                resolver
                    .rel_entity(&search, Variant::List, &OmitSpec::new())
                    .await?
            } else {
                resolver
                    .rel(&type_name, variant, &omit.into_iter().collect())
                    .await?
            };

            println!(
                "{}",
                serde_json::to_string_pretty(&shape).into_diagnostic()?
            );
        }
        ArgMode::List => {
            for definition in resolver.registry().iter() {
                let variants = definition
                    .variants()
                    .map(|variant| variant.to_string())
                    .collect::<Vec<_>>();
                println!(
                    "{} {}",
                    definition.type_name().bold(),
                    variants.join(", ").dimmed()
                );
            }
        }
    }

    Ok(())
}
