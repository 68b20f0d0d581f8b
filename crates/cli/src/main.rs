use clap::Parser;
use rk_cli::cli::Cli;
use rk_cli::context::CommandContext;
use rk_cli::{commands, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let ctx = CommandContext::new(cli.endpoint, cli.collection);
	if let Err(err) = commands::dispatch(cli.command, ctx).await {
		error!(target = "rk", error = %format!("{err:#}"), "command failed");
		std::process::exit(1);
	}
}
