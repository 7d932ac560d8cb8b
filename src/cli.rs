use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::colors::*;
use crate::environment::EnvironmentSource;
use crate::lockfile;
use crate::resolver::{add_wheels, AddWheelsOptions};
use crate::solver::{SolverConfig, DEFAULT_PYTHON_PLATFORM};

#[derive(Parser, Debug)]
#[command(
    name = "wasmlock",
    version,
    about = "Maintain lockfiles for WebAssembly-targeted Python runtime distributions",
    long_about = "wasmlock maintains reproducible package lockfiles for a \
WebAssembly-targeted runtime.\n\nExamples:\n  wasmlock add-wheels dist/*.whl --input wasm-lock.json --output wasm-lock-new.json\n  wasmlock validate wasm-lock.json\n  wasmlock compile --input wasm-lock.json --spec 'httpx'\n  wasmlock list wasm-lock.json"
)]
pub struct WasmlockCli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a set of wheels to an existing lockfile, resolving their
    /// dependencies against the lockfile plus the batch
    AddWheels {
        /// Wheels to add
        wheels: Vec<PathBuf>,
        /// Source lockfile
        #[arg(long, default_value = "wasm-lock.json")]
        input: PathBuf,
        /// Updated lockfile
        #[arg(long, default_value = "wasm-lock-new.json")]
        output: PathBuf,
        /// Base path wheel locations are made relative to (defaults to
        /// the first wheel's directory)
        #[arg(long)]
        base_path: Option<PathBuf>,
        /// URL prefix prepended to wheel locations, for wheels hosted on
        /// a different server than the core distribution
        #[arg(long, default_value = "")]
        base_url: String,
        /// Record dependencies missing from the lockfile and the added
        /// wheels instead of failing. Warning: this can produce a broken
        /// lockfile
        #[arg(long)]
        ignore_missing_dependencies: bool,
        /// Evaluate environment markers against the live host rather than
        /// the lockfile's own target descriptor
        #[arg(long)]
        host_environment: bool,
        /// Write compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },
    /// Check a lockfile: wheel filename consistency and dependency closure
    Validate {
        #[arg(default_value = "wasm-lock.json")]
        lockfile: PathBuf,
    },
    /// Update a lockfile through an external dependency solver
    Compile {
        /// Source lockfile
        #[arg(long, default_value = "wasm-lock.json")]
        input: PathBuf,
        /// Updated lockfile (defaults to overwriting the input)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Folder for newly fetched wheels
        #[arg(long)]
        wheel_dir: Option<PathBuf>,
        /// Requirement specs to include when solving
        #[arg(long = "spec")]
        specs: Vec<String>,
        /// Local wheels to include when solving
        #[arg(long = "wheel")]
        wheels: Vec<PathBuf>,
        /// Requirement specs to constrain when solving
        #[arg(long = "constraint")]
        constraints: Vec<String>,
        /// Package names to exclude from the solve
        #[arg(long = "exclude")]
        excludes: Vec<String>,
        /// URL prefix existing lock entries are hosted under, used to pin
        /// entries whose wheels are not on disk next to the input
        #[arg(long)]
        input_base_url: Option<String>,
        /// Keep the remote URL as the location for fetched wheels whose
        /// source URL starts with this prefix
        #[arg(long = "preserve-url-prefix")]
        preserve_url_prefixes: Vec<String>,
        /// Solver binary (falls back to $WASMLOCK_SOLVER, then 'uv')
        #[arg(long)]
        solver_bin: Option<PathBuf>,
        /// Solver --python-platform value
        #[arg(long, default_value = DEFAULT_PYTHON_PLATFORM)]
        python_platform: String,
        /// Extra arguments passed through to the solver
        #[arg(long = "solver-arg")]
        extra_args: Vec<String>,
        /// Working directory for solver inputs (temp dir when unset)
        #[arg(long)]
        work_dir: Option<PathBuf>,
        /// Write compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },
    /// List packages from a lockfile
    List {
        #[arg(default_value = "wasm-lock.json")]
        lockfile: PathBuf,
    },
}

impl WasmlockCli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.command {
            Commands::AddWheels {
                wheels,
                input,
                output,
                base_path,
                base_url,
                ignore_missing_dependencies,
                host_environment,
                compact,
            } => cmd_add_wheels(
                wheels,
                input,
                output,
                base_path.clone(),
                base_url.clone(),
                *ignore_missing_dependencies,
                *host_environment,
                *compact,
            ),
            Commands::Validate { lockfile } => cmd_validate(lockfile),
            Commands::Compile {
                input,
                output,
                wheel_dir,
                specs,
                wheels,
                constraints,
                excludes,
                input_base_url,
                preserve_url_prefixes,
                solver_bin,
                python_platform,
                extra_args,
                work_dir,
                compact,
            } => {
                let mut config = SolverConfig::new(input.clone());
                config.output = output.clone();
                config.wheel_dir = wheel_dir.clone();
                config.specs = specs.clone();
                config.wheels = wheels.clone();
                config.constraints = constraints.clone();
                config.excludes = excludes.clone();
                config.input_base_url = input_base_url.clone();
                config.preserve_url_prefixes = preserve_url_prefixes.clone();
                config.solver_bin = solver_bin.clone();
                config.python_platform = python_platform.clone();
                config.extra_args = extra_args.clone();
                config.work_dir = work_dir.clone();
                config.pretty = !compact;
                cmd_compile(config)
            }
            Commands::List { lockfile } => cmd_list(lockfile),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_add_wheels(
    wheels: &[PathBuf],
    input: &PathBuf,
    output: &PathBuf,
    base_path: Option<PathBuf>,
    base_url: String,
    ignore_missing: bool,
    host_environment: bool,
    compact: bool,
) -> Result<()> {
    let lock = lockfile::load(input)
        .with_context(|| format!("read lockfile {}", input.display()))?;
    let opts = AddWheelsOptions {
        base_path,
        base_url,
        ignore_missing,
        source: if host_environment {
            EnvironmentSource::Host
        } else {
            EnvironmentSource::Descriptor
        },
    };
    let new_lock = add_wheels(&lock, wheels, &opts)?;
    lockfile::write(&new_lock, output, !compact)
        .with_context(|| format!("write lockfile {}", output.display()))?;

    let added = new_lock.packages.len() - lock.packages.len();
    let replaced = wheels.len().saturating_sub(added);
    println!(
        "{C_GRAY}[wasmlock]{C_RESET} {C_GREEN}merged{C_RESET} {count} wheels ({C_GREEN}{added} added{C_RESET}, {C_DIM}{replaced} replaced{C_RESET}) into {out}",
        count = wheels.len(),
        out = output.display()
    );
    Ok(())
}

fn cmd_validate(path: &PathBuf) -> Result<()> {
    let lock = lockfile::load(path)
        .with_context(|| format!("read lockfile {}", path.display()))?;
    lock.check_wheel_filenames()?;
    lock.validate_depends()?;
    println!(
        "{C_GRAY}[wasmlock]{C_RESET} {C_GREEN}ok{C_RESET} {path}: {count} packages, closure intact",
        path = path.display(),
        count = lock.packages.len()
    );
    Ok(())
}

fn cmd_compile(config: SolverConfig) -> Result<()> {
    let out = config
        .output
        .clone()
        .unwrap_or_else(|| config.input.clone());
    println!(
        "{C_GRAY}[wasmlock]{C_RESET} {C_CYAN}solving{C_RESET} against {}",
        config.input.display()
    );
    let new_lock = config.update()?;
    println!(
        "{C_GRAY}[wasmlock]{C_RESET} {C_GREEN}wrote{C_RESET} {out} ({count} packages)",
        out = out.display(),
        count = new_lock.packages.len()
    );
    Ok(())
}

fn cmd_list(path: &PathBuf) -> Result<()> {
    let lock = lockfile::load(path)
        .with_context(|| format!("read lockfile {}", path.display()))?;
    println!(
        "{C_GRAY}[wasmlock]{C_RESET} {target} packages ({count} entries):",
        target = path.display(),
        count = lock.packages.len()
    );
    for (name, entry) in &lock.packages {
        println!(
            "{C_GRAY}[wasmlock]{C_RESET}  {C_DIM}-{C_RESET} {name} => {version} [{file}]",
            version = entry.version,
            file = entry.file_name
        );
    }
    Ok(())
}
