use crate::{executable_name, results_file};
use serde::Deserialize;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    process::Command,
};

fn default_trace_prefix() -> String {
    "server".to_string()
}

fn default_max_processes() -> usize {
    6
}

fn default_build_script() -> String {
    "./build_champsim.sh".to_string()
}

fn default_run_script() -> String {
    "./run_champsim.sh".to_string()
}

/// One simulator configuration: the module list compiled into an executable
/// and the prefetch bandwidths to sweep for it.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSpec {
    /// Space-separated hardware module list, e.g.
    /// "bimodal next_line bingo bingo bingo lru 1"
    pub modules: String,
    /// Prefetch bandwidths to run this configuration at
    pub bandwidths: Vec<u32>,
}

/// Full description of one experiment, loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentSpec {
    /// Simulator configurations to sweep
    pub configs: Vec<ConfigSpec>,
    /// Warmup length in millions of instructions
    pub warmup: u64,
    /// Simulation length in millions of instructions
    pub simulation: u64,
    /// Directory holding the input trace files
    pub trace_dir: PathBuf,
    /// Only files whose name starts with this prefix are treated as traces
    #[serde(default = "default_trace_prefix")]
    pub trace_prefix: String,
    /// Concurrency ceiling for simulator runs
    #[serde(default = "default_max_processes")]
    pub max_processes: usize,
    /// Script that compiles a module list into a simulator executable
    #[serde(default = "default_build_script")]
    pub build_script: String,
    /// Script that runs one simulation, printing the statistics to stdout
    #[serde(default = "default_run_script")]
    pub run_script: String,
}

impl ExperimentSpec {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let spec = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        Ok(spec)
    }

    /// List trace files under `trace_dir`, filtered to the recognized prefix,
    /// in sorted order.
    pub fn traces(&self) -> anyhow::Result<Vec<String>> {
        let mut traces = vec![];
        for entry in std::fs::read_dir(&self.trace_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&self.trace_prefix) {
                traces.push(name);
            }
        }
        traces.sort();
        Ok(traces)
    }

    /// Enumerate the full (configuration, bandwidth, trace) cross product.
    pub fn jobs(&self, traces: &[String]) -> Vec<Job> {
        let mut jobs = vec![];
        for config in &self.configs {
            let executable = executable_name(&config.modules);
            for &bandwidth in &config.bandwidths {
                for trace in traces {
                    jobs.push(Job {
                        executable: executable.clone(),
                        warmup: self.warmup,
                        simulation: self.simulation,
                        bandwidth,
                        trace: trace.clone(),
                    });
                }
            }
        }
        jobs
    }
}

/// One simulator run: a single point of the experiment matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub executable: String,
    pub warmup: u64,
    pub simulation: u64,
    pub bandwidth: u32,
    pub trace: String,
}

impl Job {
    /// Where this run's simulator output lands, relative to the experiment root.
    pub fn output_file(&self) -> PathBuf {
        results_file(self.simulation, self.bandwidth, &self.trace, &self.executable)
    }

    /// The run script invocation for this job. Stdout capture is left to the
    /// caller (the pool redirects it to `output_file`).
    pub fn command(&self, spec: &ExperimentSpec) -> Command {
        let mut command = Command::new(&spec.run_script);
        command
            .arg(&self.executable)
            .arg(self.warmup.to_string())
            .arg(self.simulation.to_string())
            .arg(self.bandwidth.to_string())
            .arg(spec.trace_dir.join(&self.trace));
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_spec(trace_dir: PathBuf) -> ExperimentSpec {
        ExperimentSpec {
            configs: vec![
                ConfigSpec {
                    modules: "bimodal next_line bingo bingo bingo lru 1".to_string(),
                    bandwidths: vec![2, 4, 6],
                },
                ConfigSpec {
                    modules: "bimodal next_line bingo_new bingo bingo lru 1".to_string(),
                    bandwidths: vec![2],
                },
            ],
            warmup: 10,
            simulation: 10,
            trace_dir,
            trace_prefix: "server".to_string(),
            max_processes: 6,
            build_script: default_build_script(),
            run_script: default_run_script(),
        }
    }

    #[test]
    fn matrix_covers_cross_product() {
        let spec = test_spec(PathBuf::from("traces"));
        let traces = vec![
            "server_001.champsimtrace.xz".to_string(),
            "server_003.champsimtrace.xz".to_string(),
        ];
        let jobs = spec.jobs(&traces);
        // (3 + 1) bandwidths x 2 traces
        assert_eq!(jobs.len(), 8);

        let first = &jobs[0];
        assert_eq!(first.executable, "bimodal-next_line-bingo-bingo-bingo-lru-1core");
        assert_eq!(first.bandwidth, 2);
        assert_eq!(first.trace, "server_001.champsimtrace.xz");
        assert_eq!(
            first.output_file(),
            PathBuf::from(
                "results/10M_2B/server_001.champsimtrace.xz-bimodal-next_line-bingo-bingo-bingo-lru-1core.txt"
            )
        );
    }

    #[test]
    fn trace_discovery_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "server_003.champsimtrace.xz",
            "server_001.champsimtrace.xz",
            "client_001.champsimtrace.xz",
            "README",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let spec = test_spec(dir.path().to_path_buf());
        let traces = spec.traces().unwrap();
        assert_eq!(
            traces,
            vec![
                "server_001.champsimtrace.xz".to_string(),
                "server_003.champsimtrace.xz".to_string(),
            ]
        );
    }

    #[test]
    fn spec_defaults_from_json() {
        let json = r#"{
            "configs": [{"modules": "bimodal lru 1", "bandwidths": [2]}],
            "warmup": 10,
            "simulation": 50,
            "trace_dir": "traces"
        }"#;
        let spec: ExperimentSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.trace_prefix, "server");
        assert_eq!(spec.max_processes, 6);
        assert_eq!(spec.build_script, "./build_champsim.sh");
        assert_eq!(spec.run_script, "./run_champsim.sh");
        assert_eq!(spec.simulation, 50);
    }

    #[test]
    fn command_passes_positional_arguments() {
        let spec = test_spec(PathBuf::from("/traces"));
        let job = &spec.jobs(&["server_001.champsimtrace.xz".to_string()])[0];
        let command = job.command(&spec);
        assert_eq!(command.get_program(), "./run_champsim.sh");
        let args: Vec<_> = command.get_args().map(|arg| arg.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            vec![
                "bimodal-next_line-bingo-bingo-bingo-lru-1core",
                "10",
                "10",
                "2",
                "/traces/server_001.champsimtrace.xz",
            ]
        );
    }
}
