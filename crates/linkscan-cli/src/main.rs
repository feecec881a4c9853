use clap::{Parser, Subcommand};
use linkscan_build::LinkscanConfig;
use linkscan_driver::Driver;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "linkscan.toml";

#[derive(Parser, Debug)]
#[command(name = "linkscan")]
#[command(author, version, about = "Symbol definition and linkage analysis for C sources")]
struct Cli {
    /// Configuration file (default: ./linkscan.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarise symbol definitions and dependencies of C files
    Analyse {
        /// Files to analyse (default: the configured sources)
        files: Vec<PathBuf>,

        /// Folder for cached results
        #[arg(long)]
        prebuild: Option<PathBuf>,

        /// Wrap #include lines in region pragmas before analysing
        #[arg(long)]
        inject_pragmas: bool,

        /// Worker threads
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the symbol table of a C file
    Symbols {
        /// Source file to analyse
        file: PathBuf,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a .prag copy of each file with include regions marked
    InjectPragmas {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("LINKSCAN_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| miette::miette!("Failed to initialize tracing subscriber: {}", e))
}

fn load_config(explicit: Option<&Path>) -> Result<LinkscanConfig> {
    match explicit {
        Some(path) => LinkscanConfig::from_file(path).into_diagnostic(),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            LinkscanConfig::from_file(Path::new(DEFAULT_CONFIG)).into_diagnostic()
        }
        None => Ok(LinkscanConfig::new("linkscan")),
    }
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
    }))?;

    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyse {
            files,
            prebuild,
            inject_pragmas,
            jobs,
            json,
        } => {
            if let Some(prebuild) = prebuild {
                config.analysis.prebuild = Some(prebuild);
            }
            if inject_pragmas {
                config.analysis.inject_pragmas = true;
            }
            if jobs.is_some() {
                config.analysis.jobs = jobs;
            }
            config.validate().into_diagnostic()?;

            let files = if files.is_empty() {
                config.source_paths()
            } else {
                files
            };
            if files.is_empty() {
                return Err(miette::miette!(
                    "No files given and no sources configured in {}",
                    DEFAULT_CONFIG
                ));
            }

            let driver = Driver::from_config(&config);
            let report = driver.summarise_all(&files)?;

            if json {
                let out = serde_json::to_string_pretty(&report.analysed).into_diagnostic()?;
                println!("{}", out);
            } else {
                for analysed in &report.analysed {
                    println!("{}:", analysed.fpath.display());
                    for def in &analysed.symbol_defs {
                        println!("  def {}", def);
                    }
                    for dep in &analysed.symbol_deps {
                        println!("  dep {}", dep);
                    }
                }
            }

            tracing::info!(
                files = files.len(),
                cached = report.cache_hits,
                failed = report.failures.len(),
                "analysis finished"
            );
            for (path, err) in &report.failures {
                eprintln!("{}: Error", path.display());
                eprintln!("{:?}", err);
            }
            if !report.is_success() {
                return Err(miette::miette!(
                    "{} of {} files failed",
                    report.failures.len(),
                    files.len()
                ));
            }
        }

        Commands::Symbols { file, json } => {
            let driver = Driver::from_config(&config);
            let result = driver.analyse_file(&file)?;

            if json {
                let out = serde_json::to_string_pretty(&result.analysis.table).into_diagnostic()?;
                println!("{}", out);
            } else {
                for symbol in result.analysis.table.records() {
                    println!(
                        "{:<32} {:<8} {:<8} {:<10} {}",
                        symbol.name,
                        symbol.kind.to_string(),
                        symbol.linkage.to_string(),
                        if symbol.is_definition { "definition" } else { "declaration" },
                        symbol.region
                    );
                }
            }

            for report in result.reports() {
                eprintln!("{:?}", report);
            }
        }

        Commands::InjectPragmas { files } => {
            let driver = Driver::from_config(&config);
            for file in &files {
                let output = driver.inject_pragmas_file(file)?;
                println!("{} -> {}", file.display(), output.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyse() {
        let cli = Cli::try_parse_from([
            "linkscan", "-v", "analyse", "a.c", "b.c", "--prebuild", "_prebuild", "--json",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Analyse {
                files,
                prebuild,
                json,
                ..
            } => {
                assert_eq!(files, vec![PathBuf::from("a.c"), PathBuf::from("b.c")]);
                assert_eq!(prebuild, Some(PathBuf::from("_prebuild")));
                assert!(json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["linkscan", "-q", "-v", "symbols", "a.c"]).is_err());
    }

    #[test]
    fn test_inject_pragmas_needs_files() {
        assert!(Cli::try_parse_from(["linkscan", "inject-pragmas"]).is_err());
    }
}
