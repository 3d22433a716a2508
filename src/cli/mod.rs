//! CLI commands for Beacon.
//!
//! Drives a headless launcher: list and search commands, run them, and
//! manage linked extensions, shortcuts and disabled commands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::commands::RenderResult;
use crate::config::{expand_path, Config};
use crate::extensions::{ExtensionRoot, Origin, ValidationReport};
use crate::launcher::{HostPlatform, Launcher};
use crate::logging;
use crate::navigation::PushOutcome;

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Keyboard-driven command launcher", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Extra development extensions directory
    #[arg(long, global = true, value_name = "DIR")]
    pub extensions: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every registered command
    List,

    /// Search commands by title, name or keyword
    Search {
        query: String,

        /// Rank with the fuzzy matcher instead of substring matching
        #[arg(long)]
        fuzzy: bool,
    },

    /// Show inline previews for a query
    Preview { query: String },

    /// Run a command and print the resulting frame
    Run {
        /// Command id, e.g. notes#open
        id: String,
    },

    /// Check whether a directory holds a loadable extension
    Validate {
        #[arg(default_value = ".")]
        path: String,
    },

    /// Link a local extension directory
    Link {
        #[arg(default_value = ".")]
        path: String,
    },

    /// Bind a global hotkey to a command
    Bind {
        id: String,
        /// Key combination, e.g. Control+Alt+N
        combo: String,
    },

    /// Remove a command's hotkey
    Unbind { id: String },

    /// Hide a command from search and block it from running
    Disable { id: String },

    /// Re-enable a disabled command
    Enable { id: String },
}

/// Parse arguments and run the requested command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Validation needs no launcher
    if let Commands::Validate { path } = &cli.command {
        let report = crate::extensions::validate(&expand_path(path));
        print_validation(&report);
        if !report.valid {
            bail!("validation failed");
        }
        return Ok(());
    }

    let mut launcher = build_launcher(&cli)?;
    let report = launcher.boot().context("Failed to load extensions")?;
    for (name, error) in &report.failed {
        eprintln!("warning: extension '{}' failed to load: {}", name, error);
    }

    match cli.command {
        Commands::List => list(&launcher),
        Commands::Search { query, fuzzy } => search(&launcher, &query, fuzzy),
        Commands::Preview { query } => {
            let hits = launcher.preview(&query);
            if hits.is_empty() {
                println!("No previews for '{}'", query);
            }
            for hit in hits {
                println!("{}", hit.command.id);
                println!("  {}", describe(&hit.result));
            }
        }
        Commands::Run { id } => run_command(&mut launcher, &id)?,
        Commands::Validate { .. } => {}
        Commands::Link { path } => {
            let path = expand_path(&path);
            let report = launcher.link_local(&path)?;
            print_validation(&report);
            if !report.valid {
                bail!("cannot link {}", path.display());
            }
        }
        Commands::Bind { id, combo } => {
            launcher.bind_shortcut(&id, &combo)?;
            let bound = launcher
                .registry()
                .get(&id)
                .and_then(|c| c.shortcut().map(str::to_string))
                .unwrap_or(combo);
            println!("Bound {} to {}", bound, id);
        }
        Commands::Unbind { id } => {
            launcher.unbind_shortcut(&id)?;
            println!("Removed shortcut for {}", id);
        }
        Commands::Disable { id } => {
            launcher.set_command_disabled(&id, true)?;
            println!("Disabled {}", id);
        }
        Commands::Enable { id } => {
            launcher.set_command_disabled(&id, false)?;
            println!("Enabled {}", id);
        }
    }

    Ok(())
}

fn build_launcher(cli: &Cli) -> Result<Launcher> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let config = Config::load_from(&config_path);

    let mut launcher = Launcher::new(
        config,
        config_path,
        Config::data_dir(),
        HostPlatform::headless(),
    )?;
    if let Some(dir) = &cli.extensions {
        launcher = launcher.with_extension_root(ExtensionRoot::parent(
            expand_path(dir),
            Origin::Development,
        ));
    }
    Ok(launcher)
}

fn list(launcher: &Launcher) {
    let commands = launcher.registry().get_all();
    if commands.is_empty() {
        println!("No commands registered");
        return;
    }

    for command in commands {
        let mut flags = Vec::new();
        if command.disabled() {
            flags.push("disabled".to_string());
        }
        if let Some(shortcut) = command.shortcut() {
            flags.push(shortcut.to_string());
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!(
            "{:<32} {:<6} {}{}",
            command.id.as_str(),
            command.kind.label(),
            command.title,
            flags
        );
    }
}

fn search(launcher: &Launcher, query: &str, fuzzy: bool) {
    if fuzzy {
        for (command, score) in launcher.fuzzy_search(query) {
            println!("{:>5}  {:<32} {}", score, command.id.as_str(), command.title);
        }
        return;
    }

    let results = launcher.search(query);
    if results.is_empty() {
        println!("No commands match '{}'", query);
    }
    for command in results {
        println!("{:<32} {}", command.id.as_str(), command.title);
    }
}

fn run_command(launcher: &mut Launcher, id: &str) -> Result<()> {
    match launcher.run(id) {
        PushOutcome::Pushed => {
            if let Some(frame) = launcher.navigator().top() {
                println!("{} ({})", frame.title(), frame.command());
                println!("{}", describe(frame.result()));
            }
        }
        PushOutcome::ActionFired => println!("Ran {}", id),
        PushOutcome::NothingToShow => println!("{} produced nothing to show", id),
        PushOutcome::NotFound => bail!("Command '{}' not found", id),
        PushOutcome::Disabled => bail!("Command '{}' is disabled", id),
        PushOutcome::Stale => println!("{} finished after the page changed", id),
        PushOutcome::Failed(reason) => bail!("Command '{}' failed: {}", id, reason),
    }
    Ok(())
}

/// One-line rendering of a frame for terminal output.
fn describe(result: &RenderResult) -> String {
    match result.text_content() {
        Some(text) => text.to_string(),
        None => format!("<{}> {}", result.kind(), result.props()),
    }
}

fn print_validation(report: &ValidationReport) {
    match (&report.info, &report.error) {
        (Some(package), _) if report.valid => {
            println!(
                "✓ {} ({}) with {} command(s) at {}",
                package.title,
                package.name,
                package.commands.len(),
                display_path(&package.directory)
            );
        }
        (_, Some(error)) => println!("✗ {}", error),
        _ => println!("✗ invalid extension"),
    }
}

fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}
