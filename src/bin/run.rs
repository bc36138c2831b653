//! Launch simulator runs for every (configuration, bandwidth, trace) combination
use clap::Parser;
use prefetch_experiments::{ExperimentSpec, ProcessPool};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to experiment spec json
    #[arg(short, long)]
    spec: PathBuf,

    /// Directory holding results/, defaults to the current directory
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Build the simulator executables before running
    #[arg(long)]
    build: bool,

    /// Re-run jobs whose output file already exists
    #[arg(long)]
    replace: bool,
}

fn get_tqdm_style() -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(
            "{percent:>3}% |{wide_bar}| {pos}/{len} [{elapsed_precise}<{eta_precise}, {custom_per_sec}]",
        )
        .unwrap()
        .with_key(
            "custom_per_sec",
            Box::new(|s: &indicatif::ProgressState, w: &mut dyn std::fmt::Write| write!(w, "{:.2} it/s", s.per_sec()).unwrap()),
        ).progress_chars("██ ")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let spec = ExperimentSpec::load(&args.spec)?;

    if args.build {
        for config in &spec.configs {
            let sh_args = format!("{} {}", spec.build_script, config.modules);
            println!("Running {}", sh_args);
            let result = std::process::Command::new("sh")
                .arg("-c")
                .arg(sh_args)
                .status()?;
            assert!(result.success());
        }
    }

    let traces = spec.traces()?;
    let jobs = spec.jobs(&traces);
    println!(
        "Got {} jobs: {} configs, {} traces",
        jobs.len(),
        spec.configs.len(),
        traces.len()
    );

    let pbar = indicatif::ProgressBar::new(jobs.len() as u64);
    pbar.set_style(get_tqdm_style());

    let mut pool = ProcessPool::new(spec.max_processes);
    let mut spawned = 0;
    for job in &jobs {
        let output_file = args.root.join(job.output_file());
        if pool.submit(job.command(&spec), &output_file, args.replace)? {
            pbar.println(format!("{}", output_file.display()));
            spawned += 1;
        } else {
            log::info!("skipping existing {}", output_file.display());
        }
        pbar.inc(1);
    }
    pool.drain()?;
    pbar.finish();

    println!("Ran {} jobs, skipped {}", spawned, jobs.len() - spawned);
    Ok(())
}
