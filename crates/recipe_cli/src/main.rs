//! Recipe descriptor command line.
//!
//! # Responsibility
//! - Read a recipe file and capture the process environment once, at the edge.
//! - Print the rendered descriptor, a load summary, or referenced variables.
//! - Exit non-zero with the error text when resolution fails.

use clap::{Parser, Subcommand};
use log::error;
use recipe_core::{
    init_logging, log_recipe_session, ConstraintPolicy, Environment, LoadOptions,
    PackageDescriptor, Platform, RecipeDocument,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about = "Resolve and render package build recipes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Target platform (linux, osx, win). Defaults to the host.
    #[arg(long, global = true)]
    platform: Option<String>,

    /// Fail when an optional run constraint variable is unset.
    #[arg(long, global = true)]
    strict_run_constraints: bool,

    /// Absolute directory for rolling log files. Logging is off when omitted.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a recipe and print its canonical JSON form
    Render {
        /// Recipe file
        recipe: PathBuf,
    },
    /// Resolve a recipe and print a one-line summary
    Check {
        /// Recipe file
        recipe: PathBuf,
    },
    /// List environment variables a recipe references
    Vars {
        /// Recipe file
        recipe: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| recipe_core::default_log_level());
        if let Err(err) = init_logging(level, &log_dir.to_string_lossy()) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(&cli, &Environment::from_process()) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, environment: &Environment) -> Result<String, String> {
    let options = load_options(cli)?;
    let (name, recipe) = match &cli.command {
        Commands::Render { recipe } => ("render", recipe),
        Commands::Check { recipe } => ("check", recipe),
        Commands::Vars { recipe } => ("vars", recipe),
    };
    log_recipe_session(name, recipe, &options);

    match &cli.command {
        Commands::Render { recipe } => {
            let descriptor = load_file(recipe, environment, &options)?;
            descriptor.render().map_err(|err| err.to_string())
        }
        Commands::Check { recipe } => {
            let descriptor = load_file(recipe, environment, &options)?;
            Ok(format!(
                "ok {} {} {} build_requirements=[{}]",
                descriptor.name,
                descriptor.version,
                descriptor.build.string,
                descriptor.build_requirement_specs().join(", ")
            ))
        }
        Commands::Vars { recipe } => {
            let document =
                RecipeDocument::parse(&read_recipe(recipe)?).map_err(|err| err.to_string())?;
            let variables = document
                .referenced_variables()
                .map_err(|err| err.to_string())?;
            Ok(variables
                .iter()
                .map(|(name, usage)| {
                    let status = match (environment.get(name), usage.required) {
                        (Some(_), _) => "set",
                        (None, true) => "missing",
                        (None, false) => "unset",
                    };
                    let requirement = if usage.required { "required" } else { "optional" };
                    format!("{name}\t{requirement}\t{status}\t{}", usage.fields.join(","))
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }
}

fn load_options(cli: &Cli) -> Result<LoadOptions, String> {
    let platform = match cli.platform.as_deref() {
        Some(value) => value.parse::<Platform>().map_err(|err| err.to_string())?,
        None => Platform::host(),
    };
    let policy = if cli.strict_run_constraints {
        ConstraintPolicy::RequireSet
    } else {
        ConstraintPolicy::OmitWhenUnset
    };
    Ok(LoadOptions::new(platform).with_run_constraints(policy))
}

fn load_file(
    path: &Path,
    environment: &Environment,
    options: &LoadOptions,
) -> Result<PackageDescriptor, String> {
    let text = read_recipe(path)?;
    PackageDescriptor::load(&text, environment, options).map_err(|err| err.to_string())
}

fn read_recipe(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read recipe `{}`: {err}", path.display()))
}
