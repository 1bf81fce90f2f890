use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use lumen_engine::{Collaborators, ExtensionCatalog, ExtensionInvoker, Session, decode_page};
use lumen_types::{Page, ValueMap};
use lumen_util::{Config, default_config_path, load_config_from_path};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod browse;
mod render;
mod system;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("list", _)) => list_extensions(&config),
        Some(("manifest", sub)) => print_manifest(&config, sub).await,
        Some(("run", sub)) => run_once(&config, sub).await,
        Some(("browse", sub)) => {
            let extension = required(sub, "extension")?;
            browse_extension(&config, ExtensionCatalog::from_config(&config), extension, sub).await
        }
        Some(("extension", sub)) => {
            let path = PathBuf::from(required(sub, "path")?);
            let mut catalog = ExtensionCatalog::from_config(&config);
            let name = catalog.insert_path(&path);
            browse_extension(&config, catalog, &name, sub).await
        }
        Some(("validate", sub)) => validate_page(sub.get_one::<String>("file").map(String::as_str)),
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for page JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let params = Arg::new("param")
        .long("param")
        .short('p')
        .value_name("NAME=VALUE")
        .action(ArgAction::Append)
        .help("Command parameter; may be repeated");

    Command::new("lumen")
        .about("Launcher for JSON speaking extensions")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .action(ArgAction::Set)
                .help("Configuration file (default: $LUMEN_CONFIG or ~/.config/lumen/config.json)"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..))
                .action(ArgAction::Set)
                .help("Per-invocation timeout in milliseconds"),
        )
        .subcommand(Command::new("list").about("List configured extensions"))
        .subcommand(
            Command::new("manifest")
                .about("Print the manifest of an extension")
                .arg(Arg::new("extension").required(true))
                .arg(Arg::new("refresh").long("refresh").action(ArgAction::SetTrue).help("Query the extension again")),
        )
        .subcommand(
            Command::new("run")
                .about("Run one command and print its page as JSON")
                .arg(Arg::new("extension").required(true))
                .arg(Arg::new("command").required(true))
                .arg(params.clone())
                .arg(Arg::new("query").long("query").action(ArgAction::Set).help("Query for search commands")),
        )
        .subcommand(
            Command::new("browse")
                .about("Browse an extension interactively")
                .arg(Arg::new("extension").required(true))
                .arg(Arg::new("command"))
                .arg(params.clone()),
        )
        .subcommand(
            Command::new("extension")
                .about("Browse an extension by path without configuring it")
                .arg(Arg::new("path").required(true))
                .arg(Arg::new("command"))
                .arg(params),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a page document")
                .arg(Arg::new("file").help("Page file; reads stdin when omitted")),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let mut config = load_config_from_path(&path).with_context(|| format!("failed to load {}", path.display()))?;
    if let Some(timeout_ms) = matches.get_one::<u64>("timeout-ms") {
        config.timeout_ms = *timeout_ms;
    }
    debug!(path = %path.display(), timeout_ms = config.timeout_ms, "configuration ready");
    Ok(config)
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing <{name}>"))
}

/// Collects repeated `-p name=value` flags.
fn parse_params(matches: &ArgMatches) -> Result<ValueMap> {
    let mut params = ValueMap::new();
    for raw in matches.get_many::<String>("param").into_iter().flatten() {
        let Some((name, value)) = raw.split_once('=') else {
            bail!("invalid parameter '{raw}': expected NAME=VALUE");
        };
        params.insert(name.trim().to_string(), Value::String(value.to_string()));
    }
    Ok(params)
}

fn session(config: &Config, catalog: ExtensionCatalog, collaborators: Collaborators) -> Result<Session> {
    let cwd = std::env::current_dir().context("cannot determine the working directory")?;
    Ok(Session::new(catalog, ExtensionInvoker::new(config.timeout()), collaborators, cwd))
}

fn list_extensions(config: &Config) -> Result<()> {
    let catalog = ExtensionCatalog::from_config(config);
    if catalog.entries().is_empty() {
        eprintln!("no extensions configured in {}", default_config_path().display());
    }
    for entry in catalog.entries() {
        println!("{}\t{}", entry.name, entry.entrypoint.display());
    }
    Ok(())
}

async fn print_manifest(config: &Config, matches: &ArgMatches) -> Result<()> {
    let extension = required(matches, "extension")?;
    let session = session(config, ExtensionCatalog::from_config(config), Collaborators::unavailable())?;
    let manifest = if matches.get_flag("refresh") {
        session.refresh_manifest(extension).await?
    } else {
        session.manifest(extension).await?
    };
    println!("{}", serde_json::to_string_pretty(&*manifest)?);
    Ok(())
}

async fn run_once(config: &Config, matches: &ArgMatches) -> Result<()> {
    let extension = required(matches, "extension")?;
    let command = required(matches, "command")?;
    let params = parse_params(matches)?;
    let query = matches.get_one::<String>("query").cloned();

    let session = session(config, ExtensionCatalog::from_config(config), Collaborators::unavailable())?;
    if let Some(page) = session.run_command(extension, command, &params, query).await? {
        println!("{}", serde_json::to_string_pretty(&page)?);
    }
    Ok(())
}

async fn browse_extension(config: &Config, catalog: ExtensionCatalog, extension: &str, matches: &ArgMatches) -> Result<()> {
    let collaborators = system::interactive_collaborators(config.editor.as_deref());
    let session = session(config, catalog, collaborators)?;
    match matches.get_one::<String>("command") {
        Some(command) => {
            session.open_command(extension, command, &parse_params(matches)?).await?;
        }
        None => {
            session.open_root(extension).await?;
        }
    }
    browse::run(&session).await
}

fn validate_page(file: Option<&str>) -> Result<()> {
    let bytes = match file {
        Some(path) => std::fs::read(path).with_context(|| format!("failed to read {path}"))?,
        None => {
            let mut buffer = Vec::new();
            std::io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };

    let page = decode_page(&bytes)?;
    println!("{}", summarize(&page));
    Ok(())
}

fn summarize(page: &Page) -> String {
    let actions = page.all_actions().count();
    match page {
        Page::List(list) => format!("valid list page: {} items, {actions} actions", list.items.len()),
        Page::Detail(_) => format!("valid detail page: {actions} actions"),
    }
}
