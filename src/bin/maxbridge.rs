//! maxbridge - dry-run tooling for the 3ds Max bridge.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use maxbridge_core::discovery::Launcher;
use maxbridge_core::{
    AppInstance, Command, CommandKind, Context, Engine, EngineSettings, MaxVersion, Menu,
    MenuNode, RecordingHost,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "maxbridge")]
#[command(about = "Render and inspect the Shotgun menu for 3ds Max without a host")]
#[command(version)]
struct Args {
    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the menu for a command manifest and print the MaxScript
    Menu {
        /// JSON manifest of apps and commands
        manifest: PathBuf,

        /// Engine settings JSON
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Context JSON
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Print the menu tree instead of the script
        #[arg(long)]
        tree: bool,
    },
    /// List installed 3ds Max versions
    Scan {
        /// Install roots to search instead of the default locations
        #[arg(long)]
        root: Vec<PathBuf>,
    },
    /// Print the launch environment for a 3ds Max executable
    Launch {
        exec: PathBuf,

        #[arg(long, default_value = "")]
        args: String,

        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Scene to open on startup
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
    /// Translate a Get3DSMAXVersion() value
    Version { version_id: u32 },
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    apps: Vec<AppInstance>,
    commands: Vec<ManifestCommand>,
}

#[derive(Debug, Deserialize)]
struct ManifestCommand {
    name: String,
    /// Instance name of the owning app
    #[serde(default)]
    app: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<EngineSettings> {
    match path {
        Some(path) => EngineSettings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(EngineSettings::default()),
    }
}

fn load_context(path: Option<&Path>) -> anyhow::Result<Context> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Context::from_json(&raw).with_context(|| format!("Invalid context in {}", path.display()))
        }
        None => Ok(Context::default()),
    }
}

fn print_tree(menu: &Menu, depth: usize) {
    println!("{}{}", "  ".repeat(depth), menu.label);
    for item in &menu.items {
        match item {
            MenuNode::Action { label, id, .. } => println!("{}{}  [{}]", "  ".repeat(depth + 1), label, id),
            MenuNode::Separator => println!("{}----", "  ".repeat(depth + 1)),
            MenuNode::Submenu(submenu) => print_tree(submenu, depth + 1),
        }
    }
}

fn render_menu(
    manifest: &Path,
    settings: Option<&Path>,
    context: Option<&Path>,
    tree: bool,
) -> anyhow::Result<()> {
    let raw = fs::read_to_string(manifest)
        .with_context(|| format!("Failed to read {}", manifest.display()))?;
    let manifest: Manifest = serde_json::from_str(&raw).context("Invalid manifest")?;

    let host = Arc::new(RecordingHost::new());
    let engine = Engine::new(host.clone(), load_settings(settings)?, load_context(context)?);

    let apps: Vec<Arc<AppInstance>> = manifest
        .apps
        .into_iter()
        .map(|app| engine.register_app(app))
        .collect();

    for entry in manifest.commands {
        let name = entry.name.clone();
        let mut command = Command::new(entry.name, move || {
            log::info!("Dry run: would run '{}'", name);
            Ok(())
        });
        if let Some(instance) = &entry.app {
            let app = apps
                .iter()
                .find(|a| &a.instance_name == instance)
                .with_context(|| format!("Command '{}' names unknown app '{}'", command.name, instance))?;
            command = command.with_app(app.clone());
        }
        if let Some(kind) = &entry.kind {
            command = command.with_kind(CommandKind::from_tag(kind));
        }
        if let Some(description) = entry.description {
            command = command.with_description(description);
        }
        engine.register_command(command);
    }

    let menu = engine.rebuild_menu()?;
    if tree {
        print_tree(&menu, 0);
    } else if let Some(script) = host.evaluated().last() {
        print!("{}", script);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Commands::Menu {
            manifest,
            settings,
            context,
            tree,
        } => render_menu(&manifest, settings.as_deref(), context.as_deref(), tree)?,
        Commands::Scan { root } => {
            let launcher = Launcher::new(".", EngineSettings::default());
            let found = if root.is_empty() {
                launcher.scan_software()?
            } else {
                launcher.scan_roots(&root)?
            };
            println!("Installed 3ds Max versions: {}", found.len());
            for software in found {
                println!("  {} {}  {}", software.product, software.version, software.path.display());
            }
        }
        Commands::Launch {
            exec,
            args,
            context,
            file,
            settings,
        } => {
            let launcher = Launcher::new(".", load_settings(settings.as_deref())?);
            let info = launcher.prepare_launch(
                &exec,
                &args,
                &load_context(context.as_deref())?,
                file.as_deref(),
            )?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Version { version_id } => {
            let version = MaxVersion::from_version_id(version_id);
            println!("{}", version);
            println!("compatibility: {:?}", version.compatibility(EngineSettings::default().max_tested_year));
        }
    }

    Ok(())
}
