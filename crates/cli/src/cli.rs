use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rk")]
#[command(about = "Remote Jupyter kernel servers on GPU instances")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Provider API endpoint (overrides RK_API_ENDPOINT)
	#[arg(long, global = true, value_name = "URL")]
	pub endpoint: Option<String>,

	/// Server collection to list and resolve from
	#[arg(long, global = true, value_name = "ID")]
	pub collection: Option<String>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List servers of the active collection (no network access)
	#[command(alias = "ls")]
	Servers,

	/// Provision a server and print its connection info
	Resolve {
		/// Server id as printed by `rk servers`
		id: String,
	},

	/// End the active session on the provider
	End,

	/// Serve open/close/resolve events read line by line from stdin
	///
	/// Accepted lines: `open <path> [language]`, `close <path>`,
	/// `resolve <id>`. Sessions are torn down when the last notebook
	/// closes and when input ends.
	Watch,

	/// Manage the preferred kernel of a notebook
	Prefer {
		#[command(subcommand)]
		action: PreferAction,
	},
}

#[derive(Subcommand, Debug)]
pub enum PreferAction {
	/// Print the preferred kernel id of a notebook
	Get { notebook: PathBuf },

	/// Record the preferred kernel id of a notebook
	Set { notebook: PathBuf, kernel: String },

	/// Forget the preferred kernel of a notebook
	Clear { notebook: PathBuf },

	/// Print the notebook's preferred kernel if it is among the live ones
	Select {
		notebook: PathBuf,
		/// Kernel ids currently running on the server
		#[arg(required = true)]
		kernels: Vec<String>,
	},
}
