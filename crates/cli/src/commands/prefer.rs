use std::path::Path;

use anyhow::{Result, bail};
use rk::{KernelId, NotebookIdentity};

use crate::context::CommandContext;

pub fn get(notebook: &Path, ctx: &CommandContext) -> Result<()> {
	let store = ctx.preferred_kernels();
	match store.get_preferred_kernel_id(&NotebookIdentity::from_path(notebook)) {
		Some(kernel) => println!("{kernel}"),
		None => eprintln!("no preferred kernel for {}", notebook.display()),
	}
	Ok(())
}

pub fn set(notebook: &Path, kernel: &str, ctx: &CommandContext) -> Result<()> {
	let store = ctx.preferred_kernels();
	store.set_preferred_kernel_id(&NotebookIdentity::from_path(notebook), KernelId::new(kernel))?;
	Ok(())
}

pub fn clear(notebook: &Path, ctx: &CommandContext) -> Result<()> {
	let store = ctx.preferred_kernels();
	if !store.clear_preferred_kernel_id(&NotebookIdentity::from_path(notebook))? {
		eprintln!("no preferred kernel for {}", notebook.display());
	}
	Ok(())
}

/// Picks the kernel to reconnect to when a notebook is reopened. Exits
/// non-zero when none of `kernels` is the recorded preference.
pub fn select(notebook: &Path, kernels: &[String], ctx: &CommandContext) -> Result<()> {
	let store = ctx.preferred_kernels();
	let live: Vec<KernelId> = kernels.iter().map(|k| KernelId::new(k.as_str())).collect();
	match store.select_kernel(&NotebookIdentity::from_path(notebook), &live) {
		Some(kernel) => {
			println!("{kernel}");
			Ok(())
		}
		None => bail!("no preferred kernel for {} among the running kernels", notebook.display()),
	}
}
