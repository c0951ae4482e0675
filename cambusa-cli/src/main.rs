use std::path::PathBuf;

use cambusa_cli::commands::{self, init, migrations, models, repl, routes, scripts};
use cambusa_cli::error::CommandError;
use cambusa_cli::logging::{init_tracing, LogLevel};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cambusa",
    version,
    about = "Cambusa CLI: migrations, scripts and an interactive shell for Cambusa projects"
)]
struct Cli {
    /// Log verbosity
    #[arg(short, long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Configuration profile (overridden by CAMBUSA_PROFILE)
    #[arg(long, global = true, default_value = "dev")]
    profile: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new Cambusa project
    Init {
        /// Project name
        #[arg(default_value = "cambusa-project")]
        name: String,
        /// Database backend (none, sqlite, postgres, mysql)
        #[arg(long)]
        db: Option<String>,
        /// Skip interactive prompts
        #[arg(long)]
        no_interactive: bool,
    },
    /// Generate a new migration based on entity changes
    #[command(name = "migrations:generate")]
    MigrationsGenerate {
        /// Migration name
        name: String,
    },
    /// Create a new empty migration
    #[command(name = "migrations:create")]
    MigrationsCreate {
        /// Migration name
        name: String,
    },
    /// Run pending migrations
    #[command(name = "migrations:run")]
    MigrationsRun,
    /// Run a script from the scripts directory
    Run {
        /// Script path relative to scripts/, without extension
        script: String,
        /// Arguments passed to the script
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List available scripts
    #[command(name = "scripts:list")]
    ScriptsList,
    /// Start an interactive session with the application loaded
    Repl,
    /// List registered routes
    #[command(name = "routes:list")]
    RoutesList,
    /// List all models
    #[command(name = "models:list")]
    ModelsList,
    /// Generate a new model
    #[command(name = "models:generate")]
    ModelsGenerate {
        /// Model name
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    if let Err(e) = dispatch(cli).await {
        eprintln!("{}", colored::Colorize::red(format!("Error: {e}").as_str()));
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<(), CommandError> {
    let root: PathBuf = std::env::current_dir()?;
    let load = || commands::load_app(&root, &cli.profile);

    match cli.command {
        Commands::Init {
            name,
            db,
            no_interactive,
        } => init::run(&name, init::InitOpts { db, no_interactive }),
        Commands::MigrationsGenerate { name } => migrations::generate(&load()?, &name).await,
        Commands::MigrationsCreate { name } => migrations::create(&load()?, &name).await,
        Commands::MigrationsRun => migrations::run(&load()?).await,
        Commands::Run { script, args } => scripts::run(&load()?, &script, &args).await,
        Commands::ScriptsList => scripts::list(&root),
        Commands::Repl => repl::run(&load()?).await,
        Commands::RoutesList => routes::run(&load()?),
        Commands::ModelsList => models::list(&root),
        Commands::ModelsGenerate { name } => models::generate(&root, &name),
    }
}
