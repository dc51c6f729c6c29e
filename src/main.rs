mod args;
mod commands;
mod init;

use std::process::ExitCode;

use args::{Cli, Commands};
use clap::Parser;
use console::style;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init::initialize_logging(cli.verbose, cli.quiet);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Install { exporter, skip_verify } => {
            commands::install::cmd_install(&exporter, skip_verify).await?
        }
        Commands::Uninstall { exporter, purge } => {
            commands::uninstall::cmd_uninstall(&exporter, purge).await?
        }
        Commands::Status { exporter } => commands::status::cmd_status(&exporter).await?,
        Commands::List => commands::list::cmd_list(),
        Commands::Completions { shell } => commands::completions::cmd_completions(shell),
    }

    Ok(())
}
