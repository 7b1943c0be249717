//! mssql-procgen CLI - SQL Server stored procedure generator.

use clap::{Parser, Subcommand};
use mssql_procgen::config::validate_compatibility_level;
use mssql_procgen::procedure::generate_scripts;
use mssql_procgen::{
    load_elements, CompatibilityProbe, Config, Dialect, Element, FixedCompatibility, GenError,
    MssqlPool, ProcedureGenerator, ProcedureSet, ScriptWriter,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mssql-procgen")]
#[command(about = "Generate SQL Server stored procedures from element metadata")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "warn")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate write/read procedure scripts
    Generate {
        /// Metadata files or directories (.json, .yaml, .yml)
        #[arg(required = true)]
        metadata: Vec<PathBuf>,

        /// Target compatibility level; skips probing the database
        #[arg(long)]
        compat_level: Option<u16>,

        /// Override the output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print scripts to stdout instead of writing files
        #[arg(long)]
        stdout: bool,

        /// Also generate CREATE TABLE scripts
        #[arg(long)]
        table_scripts: bool,
    },

    /// Check element metadata without generating anything
    Validate {
        /// Metadata files or directories (.json, .yaml, .yml)
        #[arg(required = true)]
        metadata: Vec<PathBuf>,
    },

    /// Print the compatibility level of the configured database
    CompatLevel,

    /// Generate scripts and execute them against the configured database
    Apply {
        /// Metadata files or directories (.json, .yaml, .yml)
        #[arg(required = true)]
        metadata: Vec<PathBuf>,

        /// Target compatibility level; skips probing the database
        #[arg(long)]
        compat_level: Option<u16>,

        /// Also create missing tables
        #[arg(long)]
        table_scripts: bool,

        /// Print the scripts that would be executed without running them
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), GenError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(GenError::Config)?;

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };

    match cli.command {
        Commands::Validate { metadata } => {
            let elements = load_metadata(&metadata)?;
            for element in &elements {
                println!(
                    "{}: OK ({} fields, write={}, read={})",
                    element.name,
                    element.fields.len(),
                    element.write_procedure(),
                    element.read_procedure()
                );
            }
            println!("{} element(s) valid", elements.len());
        }

        Commands::CompatLevel => {
            let pool = connect(&config, "probing the compatibility level").await?;
            println!("{}", pool.compatibility_level().await?);
        }

        Commands::Generate {
            metadata,
            compat_level,
            output_dir,
            stdout,
            table_scripts,
        } => {
            let elements = load_metadata(&metadata)?;
            let table_scripts = table_scripts || config.generation.table_scripts;

            let fixed = pinned_level(compat_level, &config)?.map(FixedCompatibility);
            let pool = match fixed {
                Some(_) => None,
                None => Some(connect(&config, "probing the compatibility level").await?),
            };
            let (level, sets) =
                generate(select_probe(&fixed, &pool)?, &elements, table_scripts).await?;

            if stdout {
                for set in &sets {
                    for script in set.scripts() {
                        print!("{}", script.sql);
                    }
                }
            } else {
                let dir = output_dir.unwrap_or_else(|| config.generation.output_dir.clone());
                let writer = ScriptWriter::new(&dir);
                let manifest = writer.write(&sets, level, &config.hash())?;
                println!(
                    "Wrote {} script(s) for {} element(s) to {}",
                    manifest.scripts.len(),
                    sets.len(),
                    writer.dir().display()
                );
            }
        }

        Commands::Apply {
            metadata,
            compat_level,
            table_scripts,
            dry_run,
        } => {
            let elements = load_metadata(&metadata)?;
            let table_scripts = table_scripts || config.generation.table_scripts;

            let fixed = pinned_level(compat_level, &config)?.map(FixedCompatibility);
            let pool = if dry_run && fixed.is_some() {
                None
            } else {
                Some(connect(&config, "applying scripts").await?)
            };
            let (_, sets) =
                generate(select_probe(&fixed, &pool)?, &elements, table_scripts).await?;

            let mut applied = 0;
            for set in &sets {
                for script in set.scripts() {
                    match (&pool, dry_run) {
                        (Some(pool), false) => {
                            pool.execute_script(script).await?;
                            println!("Applied {}", script.object_name);
                            applied += 1;
                        }
                        _ => {
                            println!("-- {} ({})", script.file_name(), script.kind.as_str());
                            print!("{}", script.sql);
                        }
                    }
                }
            }
            if !dry_run {
                println!("Applied {} script(s)", applied);
            }
        }
    }

    Ok(())
}

/// Load every element named on the command line and validate it before
/// any connection is attempted.
fn load_metadata(paths: &[PathBuf]) -> Result<Vec<Element>, GenError> {
    let mut elements = Vec::new();
    for path in paths {
        elements.extend(load_elements(path)?);
    }
    if elements.is_empty() {
        return Err(GenError::Config(format!(
            "no elements found in {}",
            display_paths(paths)
        )));
    }
    for element in &elements {
        element.validate()?;
    }
    Ok(elements)
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Level from `--compat-level`, else from the configuration.
fn pinned_level(cli_level: Option<u16>, config: &Config) -> Result<Option<u16>, GenError> {
    let level = cli_level.or(config.generation.compatibility_level);
    if let Some(level) = level {
        validate_compatibility_level(level)?;
    }
    Ok(level)
}

async fn connect(config: &Config, purpose: &str) -> Result<MssqlPool, GenError> {
    let conn = config.connection.clone().ok_or_else(|| {
        GenError::Config(format!(
            "a connection section is required for {}; pin a compatibility level with \
             --compat-level or generation.compatibility_level to work offline",
            purpose
        ))
    })?;
    MssqlPool::new(conn).await
}

fn select_probe<'a>(
    fixed: &'a Option<FixedCompatibility>,
    pool: &'a Option<MssqlPool>,
) -> Result<&'a dyn CompatibilityProbe, GenError> {
    match (fixed, pool) {
        (Some(fixed), _) => Ok(fixed),
        (None, Some(pool)) => Ok(pool),
        (None, None) => Err(GenError::Config(
            "no compatibility level pinned and no connection configured".into(),
        )),
    }
}

/// Probe once and generate every element at that level.
async fn generate(
    probe: &dyn CompatibilityProbe,
    elements: &[Element],
    table_scripts: bool,
) -> Result<(u16, Vec<ProcedureSet>), GenError> {
    let generator = ProcedureGenerator::new(probe);
    let dialect = generator.dialect().await?;
    info!("Target compatibility level: {}", dialect.compatibility_level());

    let sets = elements
        .iter()
        .map(|e| generate_scripts(e, &dialect, table_scripts))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((dialect.compatibility_level(), sets))
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    // Scripts go to stdout, so logs stay on stderr
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
