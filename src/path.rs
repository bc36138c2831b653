// experiment folder structure:
// {root}/
// |- results/
//    \- {simulation}M_{bandwidth}B/
//       \- {trace-file-name}-{executable-name}.txt
// \- summary/
//    \- {trace-file-name}.json

use std::path::PathBuf;

/// Name of the simulator executable built from a space-separated module list,
/// e.g. "bimodal next_line bingo bingo bingo lru 1" => "bimodal-next_line-bingo-bingo-bingo-lru-1core"
pub fn executable_name(modules: &str) -> String {
    let mut name = modules.split_whitespace().collect::<Vec<_>>().join("-");
    name.push_str("core");
    name
}

/// Simulator output file for one run. Doubles as the idempotency token: a run
/// whose output file already exists is skipped unless a replace is requested.
pub fn results_file(simulation: u64, bandwidth: u32, trace: &str, executable: &str) -> PathBuf {
    PathBuf::from("results")
        .join(format!("{}M_{}B", simulation, bandwidth))
        .join(format!("{}-{}.txt", trace, executable))
}

/// Per-trace summary document path.
pub fn summary_file(trace: &str) -> PathBuf {
    PathBuf::from("summary").join(format!("{}.json", trace))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_name_joins_modules() {
        assert_eq!(
            executable_name("bimodal next_line bingo bingo bingo lru 1"),
            "bimodal-next_line-bingo-bingo-bingo-lru-1core"
        );
        assert_eq!(executable_name("lru"), "lrucore");
    }

    #[test]
    fn results_file_is_deterministic() {
        let a = results_file(10, 2, "server_001.champsimtrace.xz", "lrucore");
        let b = results_file(10, 2, "server_001.champsimtrace.xz", "lrucore");
        assert_eq!(a, b);
        assert_eq!(
            a,
            PathBuf::from("results/10M_2B/server_001.champsimtrace.xz-lrucore.txt")
        );
    }

    #[test]
    fn results_file_distinguishes_parameters() {
        let base = results_file(10, 2, "server_001.champsimtrace.xz", "lrucore");
        assert_ne!(base, results_file(50, 2, "server_001.champsimtrace.xz", "lrucore"));
        assert_ne!(base, results_file(10, 4, "server_001.champsimtrace.xz", "lrucore"));
        assert_ne!(base, results_file(10, 2, "server_002.champsimtrace.xz", "lrucore"));
        assert_ne!(base, results_file(10, 2, "server_001.champsimtrace.xz", "fifocore"));
    }

    #[test]
    fn summary_file_path() {
        assert_eq!(
            summary_file("server_001.champsimtrace.xz"),
            PathBuf::from("summary/server_001.champsimtrace.xz.json")
        );
    }
}
