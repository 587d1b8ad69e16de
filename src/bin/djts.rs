//! Command-line front end for TagSpec catalogs.
//!
//! Usage:
//!   djts resolve catalogs/project.toml --format json
//!   djts validate catalogs/project.toml
//!   djts generate-schema -o tagspec.schema.json
//!   djts list-tags --registry registry.json --catalog catalogs/project.toml --status missing

use clap::{Parser, Subcommand};
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use std::fs;
use std::path::PathBuf;
use tagspecs::coverage::{self, GroupBy, RegisteredTag, SpecStatus, TagFilter};
use tagspecs::reference::SearchPathLocator;
use tagspecs::{catalog_schema_json, Format, Loader};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "djts")]
#[command(about = "Resolve, validate and inspect TagSpec catalogs", long_about = None)]
struct Cli {
    /// Extra directory to search for `pkg://` packages, ahead of TAGSPECS_PATH. Repeatable.
    #[arg(long = "package-path", value_name = "DIR", global = true)]
    package_path: Vec<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a catalog and print it, with its extends chain folded in.
    Resolve {
        path: PathBuf,
        /// Output format: json, toml or yaml.
        #[arg(long, default_value = "toml")]
        format: Format,
        /// Print the document as written, without following `extends`.
        #[arg(long)]
        no_extends: bool,
    },
    /// Resolve a catalog and report whether it is valid.
    Validate { path: PathBuf },
    /// Print the JSON Schema for catalog documents.
    GenerateSchema {
        /// Write the schema here instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// List registered tags, optionally checked against a catalog.
    ListTags {
        /// JSON array of `{name, module, library}` objects.
        #[arg(long, value_name = "FILE")]
        registry: PathBuf,
        /// Catalog used to mark which tags are documented.
        #[arg(long, value_name = "PATH")]
        catalog: Option<PathBuf>,
        #[arg(long)]
        module: Option<String>,
        #[arg(long)]
        library: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// all, documented or missing.
        #[arg(long, default_value = "all")]
        status: SpecStatus,
        #[arg(long, default_value = "table", value_parser = ["table", "json", "csv"])]
        format: String,
        /// module or package.
        #[arg(long = "group-by", default_value = "module")]
        group_by: GroupBy,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    // The library logs through `log`; the subscriber's log bridge picks those records up.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let locator = SearchPathLocator::from_env().with_priority_roots(cli.package_path);
    let loader = Loader::with_locator(locator);

    match cli.command {
        Command::Resolve {
            path,
            format,
            no_extends,
        } => {
            let document = loader.load(&path, !no_extends)?;
            println!("{}", tagspecs::dump_catalog(&document, format)?);
        }
        Command::Validate { path } => {
            let document = loader.resolve(&path)?;
            let tags: usize = document.libraries().iter().map(|l| l.tags().len()).sum();
            println!(
                "{} is valid: {} libraries, {} tags",
                path.display(),
                document.libraries().len(),
                tags
            );
        }
        Command::GenerateSchema { output } => {
            let schema = catalog_schema_json()?;
            match output {
                Some(file) => fs::write(&file, format!("{schema}\n"))
                    .into_diagnostic()
                    .wrap_err_with(|| format!("writing schema to {}", file.display()))?,
                None => println!("{schema}"),
            }
        }
        Command::ListTags {
            registry,
            catalog,
            module,
            library,
            name,
            status,
            format,
            group_by,
        } => {
            if status != SpecStatus::All && catalog.is_none() {
                return Err(miette!("filtering by --status requires --catalog"));
            }
            let raw = fs::read_to_string(&registry)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading registry {}", registry.display()))?;
            let mut tags: Vec<RegisteredTag> = serde_json::from_str(&raw)
                .into_diagnostic()
                .wrap_err_with(|| format!("parsing registry {}", registry.display()))?;
            if let Some(catalog) = &catalog {
                let document = loader.resolve(catalog)?;
                coverage::annotate(&mut tags, &document);
            }
            let filter = TagFilter {
                module,
                library,
                name,
                status,
            };
            let tags = filter.apply(&tags);
            if tags.is_empty() {
                println!("No tags found");
                return Ok(());
            }
            match format.as_str() {
                "json" => println!("{}", coverage::to_json(&tags, group_by).into_diagnostic()?),
                "csv" => print!("{}", coverage::to_csv(&tags, group_by)),
                _ => print!("{}", coverage::to_table(&tags, group_by, catalog.is_some())),
            }
        }
    }
    Ok(())
}
