//! cubecalc CLI: item-enhancement probability calculator.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use cubecalc::calc::Calculator;
use cubecalc::config::CalcConfig;
use cubecalc::enums::Tier;
use cubecalc::lines::LineCatalog;
use cubecalc::paths::CalcPaths;
use cubecalc::presets;
use cubecalc::shell::Shell;

#[derive(Parser)]
#[command(name = "cubecalc", version, about = "Item-enhancement probability calculator")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/cubecalc/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Line-table file, overriding the config.
    #[arg(long, global = true)]
    lines: Option<PathBuf>,

    /// Trace every session mutation.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the command shell, interactively or over a script.
    Shell {
        /// Read commands from a file instead of stdin; stops at the first error.
        #[arg(long)]
        script: Option<PathBuf>,

        /// Initial session id.
        #[arg(long, default_value = "1")]
        session: i64,
    },

    /// List the loaded line tables.
    Tables {
        /// Also list rows for this tier.
        #[arg(long)]
        tier: Option<Tier>,
    },

    /// List, run or export the bundled example queries.
    Presets {
        /// Run this preset and print its results.
        name: Option<String>,

        /// Write every preset into this directory as a shell script.
        #[arg(long)]
        write: Option<PathBuf>,
    },

    /// Show the effective configuration.
    Config {
        /// Write the defaults to the config file if it does not exist.
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => CalcPaths::resolve().into_diagnostic()?.config_file(),
    };
    let mut config = CalcConfig::load_or_default(&config_path).into_diagnostic()?;
    if cli.lines.is_some() {
        config.lines = cli.lines.clone();
    }
    config.debug |= cli.debug;

    match cli.command {
        Commands::Shell { script, session } => {
            let calc = Calculator::new(&config).into_diagnostic()?;
            let mut stdout = std::io::stdout().lock();
            match script {
                Some(path) => {
                    let file = std::fs::File::open(&path).into_diagnostic()?;
                    let mut shell = Shell::new(calc, config.max_display)
                        .with_session(session)
                        .strict(true);
                    shell
                        .run(std::io::BufReader::new(file), &mut stdout, false)
                        .into_diagnostic()?;
                }
                None => {
                    let stdin = std::io::stdin();
                    let prompt = stdin.is_terminal();
                    let mut shell = Shell::new(calc, config.max_display).with_session(session);
                    shell.run(stdin.lock(), &mut stdout, prompt).into_diagnostic()?;
                }
            }
        }

        Commands::Tables { tier } => {
            let catalog = match &config.lines {
                Some(path) => LineCatalog::load(path).into_diagnostic()?,
                None => LineCatalog::builtin().into_diagnostic()?,
            };
            println!("Line tables ({}):", catalog.tables().len());
            for table in catalog.tables() {
                println!("  {} [{}] {} rows", table.name, table.cubes, table.rows.len());
                let Some(tier) = tier else { continue };
                for row in table.rows.iter().filter(|r| r.tier == tier) {
                    println!(
                        "    {:<28} {:<10} {:>4}  1 in {}",
                        row.categories.to_string(),
                        row.line.to_string(),
                        row.value,
                        row.one_in
                    );
                }
            }
        }

        Commands::Presets { name, write } => {
            if let Some(dir) = write {
                for path in presets::write_all(&dir).into_diagnostic()? {
                    println!("Wrote {}", path.display());
                }
            }
            match name {
                Some(name) => {
                    let preset = presets::find(&name).into_diagnostic()?;
                    let calc = Calculator::new(&config).into_diagnostic()?;
                    let mut shell = Shell::new(calc, config.max_display).strict(true);
                    let mut stdout = std::io::stdout().lock();
                    preset.run(&mut shell, &mut stdout).into_diagnostic()?;
                }
                None => {
                    println!("Presets ({}):", presets::PRESETS.len());
                    for preset in presets::PRESETS {
                        println!("  {:<10} {}", preset.id, preset.description());
                    }
                }
            }
        }

        Commands::Config { init } => {
            if init && !config_path.exists() {
                CalcConfig::default().save(&config_path).into_diagnostic()?;
                println!("Wrote {}", config_path.display());
            }
            println!("# {}", config_path.display());
            print!("{}", toml::to_string_pretty(&config).into_diagnostic()?);
        }
    }

    Ok(())
}
