mod config;
mod report;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use config::FlowcheckConfig;
use flowcheck_analysis::CheckRunner;
use flowcheck_core::dataflow::fragments;
use flowcheck_core::{AnalysisContext, SourceTree, SymbolTable};
use report::OutputFormat;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowcheck")]
#[command(about = "Dataflow-based static checks over JSON-encoded compilation units")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the checkers over one or more compilation units
    Check {
        /// Compilation units to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Path to a flowcheck.toml
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
        /// Type name to treat as resolvable (repeatable)
        #[arg(long = "known-type")]
        known_types: Vec<String>,
        /// Checker to skip (repeatable)
        #[arg(long)]
        disable: Vec<String>,
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Print the control-flow graph of each fragment
    Cfg {
        file: PathBuf,
        /// Only print the fragment with this name, e.g. `Calc.broken`
        #[arg(long)]
        fragment: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long = "known-type")]
        known_types: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Check {
            files,
            config,
            format,
            known_types,
            disable,
            no_color,
        } => {
            if no_color {
                colored::control::set_override(false);
            }
            run_check(CheckArgs {
                files,
                config,
                format,
                known_types,
                disable,
            })
        }
        Commands::Cfg {
            file,
            fragment,
            config,
            known_types,
        } => run_cfg(&file, fragment.as_deref(), config.as_deref(), &known_types),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Log to stderr so stdout stays clean for machine output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct CheckArgs {
    files: Vec<PathBuf>,
    config: Option<PathBuf>,
    format: OutputFormat,
    known_types: Vec<String>,
    disable: Vec<String>,
}

fn load_unit(path: &Path) -> Result<Arc<SourceTree>> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    SourceTree::from_json(&source).with_context(|| format!("failed to parse compilation unit {}", path.display()))
}

fn symbol_table(tree: &SourceTree, config: &FlowcheckConfig, extra: &[String]) -> SymbolTable {
    let mut env = SymbolTable::for_tree(tree);
    env.extend(config.checks.known_types.iter().cloned());
    env.extend(extra.iter().cloned());
    env
}

fn run_check(args: CheckArgs) -> Result<ExitCode> {
    let config = FlowcheckConfig::load(args.config.as_deref())?;

    let mut runner = CheckRunner::with_default_checkers(config.dataflow.clone());
    let disabled: Vec<String> = config.checks.disabled.iter().chain(&args.disable).cloned().collect();
    for unknown in runner.disable(&disabled) {
        warn!(checker = unknown, "unknown checker in disable list");
    }

    let mut reports = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let tree = load_unit(path)?;
        let env = symbol_table(&tree, &config, &args.known_types);
        reports.push(runner.check_unit(&tree, &env)?);
    }

    let stats = runner.stats();
    info!(
        cfg_builds = stats.cfg_builds,
        cfg_hits = stats.cfg_hits,
        analysis_runs = stats.analysis_runs,
        analysis_hits = stats.analysis_hits,
        "check finished"
    );

    println!("{}", report::render(args.format, &reports, stats)?);

    if reports.iter().any(|r| r.has_errors()) {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_cfg(path: &Path, only: Option<&str>, config: Option<&Path>, known_types: &[String]) -> Result<ExitCode> {
    let config = FlowcheckConfig::load(config)?;
    let tree = load_unit(path)?;
    let env = symbol_table(&tree, &config, known_types);
    let ctx = AnalysisContext::new(config.dataflow.clone());

    let mut printed = 0;
    for fragment in fragments(&tree) {
        if only.is_some_and(|name| fragment.name() != name) || !fragment.has_body() {
            continue;
        }
        let cfg = ctx
            .cfg_for(&fragment, &env)
            .with_context(|| format!("failed to build the CFG of {fragment}"))?;
        if printed > 0 {
            println!();
        }
        print!("{cfg}");
        printed += 1;
    }

    if printed == 0 {
        match only {
            Some(name) => bail!("no fragment named `{name}` in {}", path.display()),
            None => println!("{} has no fragments with a body", tree.name()),
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from([
            "flowcheck",
            "check",
            "a.json",
            "b.json",
            "--format",
            "json",
            "--known-type",
            "Widget",
            "--disable",
            "constant-condition",
        ])
        .unwrap();
        match cli.command {
            Commands::Check {
                files,
                format,
                known_types,
                disable,
                ..
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(known_types, vec!["Widget"]);
                assert_eq!(disable, vec!["constant-condition"]);
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_check_requires_files() {
        assert!(Cli::try_parse_from(["flowcheck", "check"]).is_err());
    }

    #[test]
    fn test_parse_cfg_with_verbosity() {
        let cli = Cli::try_parse_from(["flowcheck", "cfg", "a.json", "--fragment", "Calc.f", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Cfg { fragment, .. } => assert_eq!(fragment.as_deref(), Some("Calc.f")),
            _ => panic!("expected cfg"),
        }
    }
}
