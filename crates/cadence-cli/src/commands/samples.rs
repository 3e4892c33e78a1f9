//! Samples command: list built-in sample graphs or print one.

use cadence_config::{get_sample_graph, sample_graphs};
use clap::Args;

#[derive(Args)]
pub struct SamplesArgs {
    /// Sample to print as TOML (lists all samples when omitted)
    name: Option<String>,
}

pub fn run(args: SamplesArgs) -> anyhow::Result<()> {
    if let Some(name) = args.name {
        let sample = get_sample_graph(&name).ok_or_else(|| {
            anyhow::anyhow!(
                "Sample graph '{}' not found. Use 'cadence samples' to see available samples.",
                name
            )
        })?;
        print!("{}", sample.to_toml().map_err(|e| anyhow::anyhow!("{}", e))?);
        return Ok(());
    }

    println!("Sample graphs:");
    println!();
    for sample in sample_graphs() {
        println!(
            "  {:<20} {}",
            sample.name,
            sample.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
