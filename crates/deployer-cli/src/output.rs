//! Terminal output and the deployment report written after a run.

use alloy_primitives::Address;
use colored::Colorize;
use deployer_types::DeploymentRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Terminal display utilities for formatted CLI output.
///
/// Kept separate from tracing output: this is what the operator reads.
pub struct Display;

impl Display {
	/// Displays a formatted section header with underline
	///
	/// # Arguments
	/// * `text` - Header text to display
	pub fn header(text: &str) {
		println!("\n{}", text.bold().cyan());
		println!("{}", "─".repeat(text.chars().count()).cyan());
	}

	/// Displays a success message with green checkmark
	pub fn success(message: &str) {
		println!("{} {}", "✓".green().bold(), message);
	}

	/// Displays an error message with red X symbol to stderr
	pub fn error(message: &str) {
		eprintln!("{} {}", "✗".red().bold(), message.red());
	}

	/// Displays a warning message with yellow warning symbol
	pub fn warning(message: &str) {
		println!("{} {}", "⚠".yellow().bold(), message.yellow());
	}

	pub fn info(message: &str) {
		println!("{} {}", "ℹ".blue().bold(), message);
	}

	/// Displays a key-value pair with formatted labels
	///
	/// # Arguments
	/// * `key` - Label or key name
	/// * `value` - Associated value to display
	pub fn kv(key: &str, value: &str) {
		println!("  {} {}", format!("{key}:").bold(), value);
	}

	/// Displays a formatted section title with arrow prefix
	pub fn section(title: &str) {
		println!("\n{}", format!("▸ {title}").bold());
	}

	/// Displays confirmed deployments, one line per artifact.
	pub fn records(records: &[DeploymentRecord]) {
		let width = records
			.iter()
			.map(|record| record.artifact_name.len())
			.max()
			.unwrap_or(0);
		for record in records {
			println!(
				"  {}  {}  {}",
				format!("{:<width$}", record.artifact_name).bold(),
				record.address.to_string().green(),
				format!("tx {} block {}", record.transaction_hash, record.block_number).dimmed(),
			);
		}
	}
}

/// Report of a deployment run, written as JSON.
#[derive(Debug, Serialize)]
pub struct DeploymentOutput<'a> {
	pub network: &'a str,
	pub chain_id: u64,
	/// Deployed address by artifact name.
	pub contracts: BTreeMap<&'a str, Address>,
	/// Records in deployment order.
	pub records: &'a [DeploymentRecord],
}

impl<'a> DeploymentOutput<'a> {
	pub fn new(network: &'a str, chain_id: u64, records: &'a [DeploymentRecord]) -> Self {
		let contracts = records
			.iter()
			.map(|record| (record.artifact_name.as_str(), record.address))
			.collect();
		Self {
			network,
			chain_id,
			contracts,
			records,
		}
	}

	/// Writes the report as pretty-printed JSON.
	pub fn write(&self, path: &Path) -> anyhow::Result<()> {
		let json = serde_json::to_string_pretty(self)?;
		std::fs::write(path, json)?;
		Ok(())
	}
}
