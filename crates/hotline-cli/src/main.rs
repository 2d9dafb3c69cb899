//! hotlined - the Hotline server daemon.

use clap::Parser;
use hotline_server::{Config, ConfigPaths, Server, ServerError};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code for configuration problems
const EXIT_CONFIG: u8 = 1;
/// Exit code for listen/bind failures
const EXIT_LISTEN: u8 = 2;
/// Exit code installed by the panic hook
const EXIT_PANIC: i32 = 3;

/// Hotline server daemon
#[derive(Parser)]
#[command(name = "hotlined")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration directory
    #[arg(short = 'd', long, default_value = "config")]
    config_dir: PathBuf,

    /// Override the control-port listen address
    #[arg(long)]
    listen: Option<String>,

    /// Override the transfer-port listen address
    #[arg(long)]
    transfer_listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Materialize a default config directory and exit
    #[arg(long)]
    init: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    // Any panic that escapes the runtime is a distinct failure class.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_hook(info);
        std::process::exit(EXIT_PANIC);
    }));

    if cli.init {
        return match init_config_dir(&cli.config_dir) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "init failed");
                ExitCode::from(EXIT_CONFIG)
            }
        };
    }

    match serve(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ ServerError::Config(_)) => {
            tracing::error!(error = %e, "configuration rejected");
            ExitCode::from(EXIT_CONFIG)
        }
        Err(e @ ServerError::Io(_)) => {
            tracing::error!(error = %e, "cannot listen");
            ExitCode::from(EXIT_LISTEN)
        }
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::from(EXIT_LISTEN)
        }
    }
}

fn serve(cli: Cli) -> Result<(), ServerError> {
    let paths = ConfigPaths::new(&cli.config_dir);
    let mut config = Config::load(paths.config_file())?;

    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(transfer_listen) = cli.transfer_listen {
        config.transfer_listen = transfer_listen;
    }
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = Server::new(config, paths)?;
        server.accounts.seed_defaults()?;
        tracing::info!(name = server.config.name, "starting");
        server.run().await
    })
}

/// First-run bootstrap: default config, empty board and agreement,
/// stock accounts
fn init_config_dir(dir: &PathBuf) -> Result<(), ServerError> {
    let paths = ConfigPaths::new(dir);
    std::fs::create_dir_all(dir)?;

    if paths.config_file().exists() {
        return Err(ServerError::Config(format!(
            "{} already exists",
            paths.config_file().display()
        )));
    }

    Config::default().save(paths.config_file())?;
    std::fs::write(paths.message_board(), b"")?;
    std::fs::write(
        paths.agreement(),
        b"Welcome!\r\rBe excellent to each other.\r",
    )?;
    std::fs::create_dir_all(paths.files_root(&Config::default()))?;

    let accounts = hotline_server::accounts::AccountStore::open(paths.users_dir())?;
    accounts.seed_defaults()?;

    println!("Initialized config directory at {}", dir.display());
    println!("Accounts: admin/admin, guest (no password)");
    Ok(())
}
