// anggar CLI entry point.

use clap::Parser;

mod client;
mod commands;
mod daemon_launcher;
mod output;

#[derive(Parser)]
#[command(name = "anggar", about = "RAB and BQ cost sheets from the command line")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(error) = commands::run(cli.command) {
        if let Some(code) = client::daemon_unavailable_exit_code(&error) {
            std::process::exit(code);
        }
        return Err(error);
    }
    Ok(())
}
