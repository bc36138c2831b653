//! Aggregate simulator output files into per-trace summary documents
use clap::Parser;
use cli_table::{Cell, Table, print_stdout};
use prefetch_experiments::{BANDWIDTH_KEY_SCALE, ExperimentSpec, SummaryAggregator};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to experiment spec json
    #[arg(short, long)]
    spec: PathBuf,

    /// Directory holding results/ and receiving summary/, defaults to the
    /// current directory
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let spec = ExperimentSpec::load(&args.spec)?;
    let aggregator = SummaryAggregator::new(&spec, &args.root);

    for trace in spec.traces()? {
        println!("Summarizing {}", trace);
        let document = aggregator.summarize_trace(&trace)?;

        let mut table = vec![];
        for (config, summary) in &document {
            for (bandwidth_key, ipc) in &summary.ipc {
                table.push(vec![
                    config.as_str().cell(),
                    (bandwidth_key / BANDWIDTH_KEY_SCALE).cell(),
                    format!("{:.4}", ipc).cell(),
                ]);
            }
        }
        let table = table
            .table()
            .title(vec!["Configuration".cell(), "Bandwidth".cell(), "IPC".cell()]);
        print_stdout(table)?;

        let path = aggregator.write_summary(&trace, &document)?;
        println!("Summary written to {}", path.display());
    }

    Ok(())
}
