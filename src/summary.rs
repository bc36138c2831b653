use crate::{
    CACHE_LEVELS, ExperimentSpec, LogExtractor, MetricsRecord, ParseOutcome, executable_name,
    results_file, summary_file,
};
use log::warn;
use serde::{Serialize, Serializer};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Bandwidths are stored in summaries scaled by this factor, leaving room for
/// fractional bandwidth encodings later.
pub const BANDWIDTH_KEY_SCALE: u32 = 100;

fn nan_as_null<S>(map: &BTreeMap<u32, f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(
        map.iter()
            .map(|(key, value)| (key, value.is_finite().then_some(*value))),
    )
}

/// Per-cache-level metrics of one configuration, each keyed by the scaled
/// bandwidth.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LevelSummary {
    #[serde(rename = "USEFUL")]
    pub useful: BTreeMap<u32, u64>,
    #[serde(rename = "USELESS")]
    pub useless: BTreeMap<u32, u64>,
    #[serde(rename = "MISSES")]
    pub misses: BTreeMap<u32, u64>,
    #[serde(rename = "ACCURACY", serialize_with = "nan_as_null")]
    pub accuracy: BTreeMap<u32, f64>,
    #[serde(rename = "COVERAGE", serialize_with = "nan_as_null")]
    pub coverage: BTreeMap<u32, f64>,
    #[serde(rename = "MISS LATENCY", serialize_with = "nan_as_null")]
    pub miss_latency: BTreeMap<u32, f64>,
}

/// All metrics of one configuration across its bandwidth sweep.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ConfigSummary {
    #[serde(rename = "IPC", serialize_with = "nan_as_null")]
    pub ipc: BTreeMap<u32, f64>,
    #[serde(rename = "L1D")]
    pub l1d: LevelSummary,
    #[serde(rename = "L1I")]
    pub l1i: LevelSummary,
    #[serde(rename = "L2C")]
    pub l2c: LevelSummary,
    #[serde(rename = "LLC")]
    pub llc: LevelSummary,
}

impl ConfigSummary {
    /// Level summaries indexed like [`CACHE_LEVELS`].
    pub fn level_mut(&mut self, index: usize) -> &mut LevelSummary {
        match index {
            0 => &mut self.l1d,
            1 => &mut self.l1i,
            2 => &mut self.l2c,
            3 => &mut self.llc,
            _ => panic!("no cache level at index {}", index),
        }
    }

    /// Fold one extraction into this summary under `bandwidth_key`. Metrics
    /// absent from the record (truncated log) leave their keys absent here.
    pub fn merge(&mut self, bandwidth_key: u32, record: &MetricsRecord) {
        if let Some(ipc) = record.ipc {
            self.ipc.insert(bandwidth_key, ipc);
        }
        for (index, level) in record.levels.iter().enumerate() {
            let summary = self.level_mut(index);
            if let Some(prefetch) = &level.prefetch {
                summary.useful.insert(bandwidth_key, prefetch.useful);
                summary.useless.insert(bandwidth_key, prefetch.useless);
                summary.misses.insert(bandwidth_key, prefetch.misses);
                summary.accuracy.insert(bandwidth_key, prefetch.accuracy);
                summary.coverage.insert(bandwidth_key, prefetch.coverage);
            }
            if let Some(latency) = level.miss_latency {
                summary.miss_latency.insert(bandwidth_key, latency);
            }
        }
    }
}

/// One summary document per trace: configuration identifier => metrics.
pub type SummaryDocument = BTreeMap<String, ConfigSummary>;

/// Drives [`LogExtractor`] across every (configuration, bandwidth) output
/// file of a trace and assembles the per-trace summary documents.
pub struct SummaryAggregator<'a> {
    spec: &'a ExperimentSpec,
    root: PathBuf,
}

impl<'a> SummaryAggregator<'a> {
    /// `root` is the directory holding `results/` and receiving `summary/`.
    pub fn new<P: AsRef<Path>>(spec: &'a ExperimentSpec, root: P) -> Self {
        Self {
            spec,
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Build the summary document for one trace. A missing output file is
    /// fatal for the whole pass.
    pub fn summarize_trace(&self, trace: &str) -> anyhow::Result<SummaryDocument> {
        let mut document = SummaryDocument::new();
        for config in &self.spec.configs {
            let executable = executable_name(&config.modules);
            let mut summary = ConfigSummary::default();
            for &bandwidth in &config.bandwidths {
                let data_file = self.root.join(results_file(
                    self.spec.simulation,
                    bandwidth,
                    trace,
                    &executable,
                ));
                let record = LogExtractor::extract(&data_file)?;
                if let ParseOutcome::Truncated { levels_done } = record.outcome {
                    warn!(
                        "{} ended after {} of {} cache levels, keeping partial metrics",
                        data_file.display(),
                        levels_done,
                        CACHE_LEVELS.len()
                    );
                }
                summary.merge(bandwidth * BANDWIDTH_KEY_SCALE, &record);
            }
            document.insert(config.modules.clone(), summary);
        }
        Ok(document)
    }

    /// Serialize a trace's document to its summary path.
    pub fn write_summary(&self, trace: &str, document: &SummaryDocument) -> anyhow::Result<PathBuf> {
        let path = self.root.join(summary_file(trace));
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = File::create(&path)?;
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(BufWriter::new(file), formatter);
        document.serialize(&mut serializer)?;
        serializer.into_inner().flush()?;
        Ok(path)
    }

    /// Summarize every recognized trace in sorted order, returning the
    /// written summary paths.
    pub fn run(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut written = vec![];
        for trace in self.spec.traces()? {
            let document = self.summarize_trace(&trace)?;
            written.push(self.write_summary(&trace, &document)?);
        }
        Ok(written)
    }
}
