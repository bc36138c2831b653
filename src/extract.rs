use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// Cache hierarchy levels in the order the simulator prints their statistics.
pub const CACHE_LEVELS: [&str; 4] = ["L1D", "L1I", "L2C", "LLC"];

/// Prefetcher statistics for one cache level, recorded when its
/// "PREFETCH  REQUESTED" line is seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefetchStats {
    pub useful: u64,
    pub useless: u64,
    /// Demand misses (LOAD + RFO) accumulated up to the prefetch line
    pub misses: u64,
    /// useful / (useful + useless), NaN when no prefetches were issued
    pub accuracy: f64,
    /// useful / (useful + misses), NaN when both are zero
    pub coverage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelRecord {
    pub prefetch: Option<PrefetchStats>,
    pub miss_latency: Option<f64>,
}

/// Whether the extractor consumed a full four-level statistics block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Complete,
    /// The log ended early, e.g. an interrupted simulation. Levels before
    /// `levels_done` are fully recorded, the rest partially or not at all.
    Truncated { levels_done: usize },
}

/// Metrics scraped from one simulator output file.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub ipc: Option<f64>,
    /// Indexed like [`CACHE_LEVELS`]
    pub levels: [LevelRecord; 4],
    pub outcome: ParseOutcome,
}

enum ParserState {
    /// Scanning statistics of `CACHE_LEVELS[index]`; `misses` accumulates
    /// the level's LOAD and RFO miss counts
    Level { index: usize, misses: f64 },
    Done,
}

/// Single-pass parser over simulator output.
///
/// The simulator prints, per cache level in [`CACHE_LEVELS`] order, a LOAD
/// access line, an RFO access line, a prefetch line and an average miss
/// latency line; the latency line closes the level. The cumulative IPC line
/// can appear anywhere. Any other line is ignored.
pub struct LogExtractor {
    state: ParserState,
    ipc: Option<f64>,
    levels: [LevelRecord; 4],
}

fn parse_token(token: Option<&&str>) -> f64 {
    token.and_then(|token| token.parse().ok()).unwrap_or(f64::NAN)
}

impl LogExtractor {
    pub fn new() -> Self {
        Self {
            state: ParserState::Level {
                index: 0,
                misses: 0.0,
            },
            ipc: None,
            levels: [LevelRecord::default(); 4],
        }
    }

    /// Whether the terminal state has been reached; the rest of the file
    /// need not be read.
    pub fn done(&self) -> bool {
        matches!(self.state, ParserState::Done)
    }

    pub fn feed_line(&mut self, line: &str) {
        let (index, mut misses) = match self.state {
            ParserState::Done => return,
            ParserState::Level { index, misses } => (index, misses),
        };
        let level = CACHE_LEVELS[index];
        let tokens: Vec<&str> = line.split_whitespace().collect();

        if line.starts_with("CPU 0 cumulative IPC") {
            self.ipc = Some(parse_token(tokens.get(4)));
            return;
        }

        if line.starts_with(&format!("{} LOAD      ACCESS", level))
            || line.starts_with(&format!("{} RFO       ACCESS", level))
        {
            misses += parse_token(tokens.last());
            self.state = ParserState::Level { index, misses };
            return;
        }

        if line.starts_with(&format!("{} PREFETCH  REQUESTED", level)) {
            let useful = parse_token(tokens.get(tokens.len().wrapping_sub(3)));
            let useless = parse_token(tokens.last());
            // 0/0 falls out as NaN
            let accuracy = useful / (useful + useless);
            let coverage = useful / (useful + misses);
            self.levels[index].prefetch = Some(PrefetchStats {
                useful: useful as u64,
                useless: useless as u64,
                misses: misses as u64,
                accuracy,
                coverage,
            });
            return;
        }

        if line.starts_with(&format!("{} AVERAGE MISS LATENCY", level)) {
            self.levels[index].miss_latency = Some(parse_token(tokens.get(4)));
            self.state = if index + 1 == CACHE_LEVELS.len() {
                ParserState::Done
            } else {
                ParserState::Level {
                    index: index + 1,
                    misses: 0.0,
                }
            };
        }
    }

    pub fn finish(self) -> MetricsRecord {
        let outcome = match self.state {
            ParserState::Done => ParseOutcome::Complete,
            ParserState::Level { index, .. } => ParseOutcome::Truncated { levels_done: index },
        };
        MetricsRecord {
            ipc: self.ipc,
            levels: self.levels,
            outcome,
        }
    }

    /// Extract metrics from one simulator output file. A missing or
    /// unreadable file is an error; a short file is not (see
    /// [`ParseOutcome::Truncated`]).
    pub fn extract<P: AsRef<Path>>(path: P) -> anyhow::Result<MetricsRecord> {
        let file = File::open(path)?;
        let mut extractor = Self::new();
        for line in BufReader::new(file).lines() {
            extractor.feed_line(&line?);
            if extractor.done() {
                break;
            }
        }
        Ok(extractor.finish())
    }
}

impl Default for LogExtractor {
    fn default() -> Self {
        Self::new()
    }
}
