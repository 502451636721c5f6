use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sessionkeep_cli::{Error, commands, tracing::Tracing, util::ui::UI};
use sessionkeep_config::{Config, Environment, load_config, parse_env};
use sessionkeep_db::SessionStore;
use tokio::signal;

#[tokio::main]
async fn main() -> ExitCode {
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();

    let args = Cli::parse();
    let mut ui = UI::new(&mut stdout, &mut stderr, !args.no_color, !args.quiet);

    match cli(&mut ui, args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            ui.error(e.to_string().as_str(), &e.into());
            ExitCode::FAILURE
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "A CLI tool to manage the session store.", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Choose the environment (development, test, production).", value_parser = parse_env, default_value = "development")]
    env: Environment,

    #[arg(long, global = true, help = "Disable colored output.")]
    no_color: bool,

    #[arg(long, global = true, help = "Disable debug output.")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create the database and the session table")]
    Create,
    #[command(about = "Delete all expired sessions once")]
    Sweep,
    #[command(about = "Delete expired sessions on the configured interval until stopped")]
    Watch,
    #[command(about = "Print a live session as JSON")]
    Show { id: String },
    #[command(about = "Delete a session")]
    Destroy { id: String },
}

async fn cli(ui: &mut UI<'_>, cli: Cli) -> Result<(), Error> {
    let config: Config = load_config(&cli.env)?;
    Tracing::init(&config.tracing, !cli.no_color);

    let store = SessionStore::connect(&config)?;

    match cli.command {
        Commands::Create => {
            ui.info(&format!("Creating {} session table…", &cli.env));
            commands::create(ui, &config.database, &store).await?;
            ui.success("Created session table successfully.");
        }
        Commands::Sweep => {
            ui.info(&format!("Sweeping {} sessions…", &cli.env));
            let deleted = commands::sweep(&store).await?;
            ui.success(&format!("Deleted {} expired sessions.", deleted));
        }
        Commands::Watch => {
            ui.info(&format!(
                "Watching {} sessions, press Ctrl+C to stop…",
                &cli.env
            ));
            commands::watch(ui, &store, shutdown_signal()).await?;
            ui.success("Sweeper stopped.");
        }
        Commands::Show { id } => {
            if !commands::show(ui, &store, &id).await? {
                ui.info(&format!("No live session {}.", id));
            }
        }
        Commands::Destroy { id } => {
            commands::destroy(&store, &id).await?;
            ui.success(&format!("Destroyed session {}.", id));
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
