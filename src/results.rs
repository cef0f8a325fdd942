//! CSV result files
//!
//! Every completed task execution appends one [`RunRecord`] to the result file
//! of its configuration. Files are append-only; the header row is written when
//! the file is empty, so a file collects runs from any number of invocations.
//! There is no locking between processes writing the same file.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::Task;
use crate::error::Result;
use crate::monitor::{Samples, mean, peak};
use crate::shape::VolumeShape;

/// Columns describing the benchmarked operator
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigColumns {
    pub backend: String,
    pub eps: f64,
    pub upsampfac: f64,
    pub n_coils: usize,
    pub shape: VolumeShape,
    pub n_samples: usize,
    pub dim: usize,
    pub sense: bool,
}

/// Columns measured for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetrics {
    pub task: Task,
    pub run: usize,
    /// Seconds
    pub run_time: f64,
    /// GiB
    pub mem_avg: f64,
    pub mem_peak: f64,
    /// Cores
    pub cpu_avg: f64,
    pub cpu_peak: f64,
    /// `(name, value)` pairs for `<gpu metric>_avg` and `<gpu metric>_peak`
    pub gpu: Vec<(String, f64)>,
}

impl RunMetrics {
    /// Reduce monitor samples to averages and peaks
    ///
    /// GPU columns are only produced when `gpu` is set, one `_avg`/`_peak`
    /// pair per sampled `gpu*` metric in name order.
    #[must_use]
    pub fn from_samples(
        task: Task,
        run: usize,
        run_time: f64,
        samples: &Samples,
        gpu: bool,
    ) -> Self {
        let metric = |name: &str| samples.get(name).map_or(&[][..], Vec::as_slice);
        let mut gpu_columns = Vec::new();
        if gpu {
            for (name, values) in samples.iter().filter(|(k, _)| k.contains("gpu")) {
                gpu_columns.push((format!("{name}_avg"), mean(values)));
                gpu_columns.push((format!("{name}_peak"), peak(values)));
            }
        }
        Self {
            task,
            run,
            run_time,
            mem_avg: mean(metric("rss_GiB")),
            mem_peak: peak(metric("rss_GiB")),
            cpu_avg: mean(metric("cpus")),
            cpu_peak: peak(metric("cpus")),
            gpu: gpu_columns,
        }
    }
}

/// One result row
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub config: ConfigColumns,
    pub metrics: RunMetrics,
}

impl RunRecord {
    /// Column names, in row order
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = [
            "backend", "eps", "upsampfac", "n_coils", "shape", "n_samples", "dim", "sense",
            "task", "run", "run_time", "mem_avg", "mem_peak", "cpu_avg", "cpu_peak",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        header.extend(self.metrics.gpu.iter().map(|(name, _)| name.clone()));
        header
    }

    /// Row values, matching [`RunRecord::header`]
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        let c = &self.config;
        let m = &self.metrics;
        let mut values = vec![
            c.backend.clone(),
            format!("{:?}", c.eps),
            format!("{:?}", c.upsampfac),
            c.n_coils.to_string(),
            c.shape.to_string(),
            c.n_samples.to_string(),
            c.dim.to_string(),
            c.sense.to_string(),
            m.task.to_string(),
            m.run.to_string(),
            m.run_time.to_string(),
            m.mem_avg.to_string(),
            m.mem_peak.to_string(),
            m.cpu_avg.to_string(),
            m.cpu_peak.to_string(),
        ];
        values.extend(m.gpu.iter().map(|(_, v)| v.to_string()));
        values
    }
}

/// Appends records to one result file
#[derive(Debug, Clone)]
pub struct ResultWriter {
    path: PathBuf,
}

impl ResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, preceded by the header if the file is empty
    /// # Errors
    /// `Io` / `Csv` on open or write failures
    pub fn append(&self, record: &RunRecord) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if empty {
            writer.write_record(record.header())?;
        }
        writer.write_record(record.values())?;
        writer.flush()?;
        Ok(())
    }
}

// ===== READ-BACK AND SUMMARY =====

/// One parsed result row, keyed by column name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    fields: HashMap<String, String>,
}

impl ResultRow {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    #[must_use]
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(|v| v.trim().parse().ok())
    }
}

/// Parse a result file back into rows
/// # Errors
/// `Io` / `Csv` on read failures
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<ResultRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for fields in reader.deserialize::<HashMap<String, String>>() {
        rows.push(ResultRow { fields: fields? });
    }
    Ok(rows)
}

fn collect_csv(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_csv(&path, out)?;
        } else if path.extension().is_some_and(|e| e == "csv") {
            out.push(path);
        }
    }
    Ok(())
}

/// Rows of every `.csv` file under `dir`, subdirectories included
/// # Errors
/// directory listing and parsing errors
pub fn read_dir_records<P: AsRef<Path>>(dir: P) -> Result<Vec<ResultRow>> {
    let mut paths = Vec::new();
    collect_csv(dir.as_ref(), &mut paths)?;
    paths.sort();
    let mut rows = Vec::new();
    for path in paths {
        rows.extend(read_records(path)?);
    }
    Ok(rows)
}

/// Averages over the runs of one `(backend, task, n_coils)` group
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub backend: String,
    pub task: String,
    pub n_coils: usize,
    pub runs: usize,
    pub run_time: f64,
    /// `run_time / n_coils`
    pub coil_time: f64,
    pub mem_peak: f64,
    /// `mem_peak / n_coils`
    pub coil_mem: f64,
    /// Mean of `gpu0_mem_GiB_peak` over the rows that have it
    pub gpu_mem_peak: Option<f64>,
}

#[derive(Default)]
struct Accumulator {
    run_time: Vec<f64>,
    coil_time: Vec<f64>,
    mem_peak: Vec<f64>,
    coil_mem: Vec<f64>,
    gpu_mem_peak: Vec<f64>,
}

/// Group rows by `(backend, task, n_coils)` and average the per-coil metrics
///
/// Rows lacking one of the required columns are skipped with a warning.
#[must_use]
pub fn summarize(rows: &[ResultRow]) -> Vec<TaskSummary> {
    let mut groups: BTreeMap<(String, String, usize), Accumulator> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        let parsed = (|| {
            let backend = row.get("backend")?.to_string();
            let task = row.get("task")?.to_string();
            let n_coils: usize = row.get("n_coils")?.trim().parse().ok()?;
            let run_time = row.get_f64("run_time")?;
            let mem_peak = row.get_f64("mem_peak")?;
            Some((backend, task, n_coils, run_time, mem_peak))
        })();
        let Some((backend, task, n_coils, run_time, mem_peak)) = parsed else {
            warn!(row = i, "skipping incomplete result row");
            continue;
        };
        if n_coils == 0 {
            warn!(row = i, "skipping result row with n_coils = 0");
            continue;
        }
        let acc = groups.entry((backend, task, n_coils)).or_default();
        acc.run_time.push(run_time);
        acc.coil_time.push(run_time / n_coils as f64);
        acc.mem_peak.push(mem_peak);
        acc.coil_mem.push(mem_peak / n_coils as f64);
        if let Some(gpu) = row.get_f64("gpu0_mem_GiB_peak") {
            acc.gpu_mem_peak.push(gpu);
        }
    }

    groups
        .into_iter()
        .map(|((backend, task, n_coils), acc)| TaskSummary {
            backend,
            task,
            n_coils,
            runs: acc.run_time.len(),
            run_time: mean(&acc.run_time),
            coil_time: mean(&acc.coil_time),
            mem_peak: mean(&acc.mem_peak),
            coil_mem: mean(&acc.coil_mem),
            gpu_mem_peak: (!acc.gpu_mem_peak.is_empty()).then(|| mean(&acc.gpu_mem_peak)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(task: Task, run: usize, run_time: f64, n_coils: usize) -> RunRecord {
        RunRecord {
            config: ConfigColumns {
                backend: "noop".into(),
                eps: 1e-6,
                upsampfac: 2.0,
                n_coils,
                shape: VolumeShape::new(&[64, 64, 64]).unwrap(),
                n_samples: 1024,
                dim: 3,
                sense: false,
            },
            metrics: RunMetrics {
                task,
                run,
                run_time,
                mem_avg: 1.0,
                mem_peak: 2.0,
                cpu_avg: 0.5,
                cpu_peak: 1.0,
                gpu: Vec::new(),
            },
        }
    }

    #[test]
    fn test_metrics_from_samples() {
        let mut samples = Samples::new();
        samples.insert("rss_GiB".into(), vec![1.0, 3.0]);
        samples.insert("cpus".into(), vec![0.5, 1.5, 1.0]);
        samples.insert("gpu0_mem_GiB".into(), vec![2.0, 4.0]);
        samples.insert("gpu0_util".into(), vec![10.0]);

        let m = RunMetrics::from_samples(Task::Forward, 3, 0.25, &samples, true);
        assert_eq!(m.mem_avg, 2.0);
        assert_eq!(m.mem_peak, 3.0);
        assert_eq!(m.cpu_avg, 1.0);
        assert_eq!(m.cpu_peak, 1.5);
        assert_eq!(
            m.gpu,
            vec![
                ("gpu0_mem_GiB_avg".to_string(), 3.0),
                ("gpu0_mem_GiB_peak".to_string(), 4.0),
                ("gpu0_util_avg".to_string(), 10.0),
                ("gpu0_util_peak".to_string(), 10.0),
            ]
        );

        let cpu_only = RunMetrics::from_samples(Task::Forward, 0, 0.1, &samples, false);
        assert!(cpu_only.gpu.is_empty());
    }

    #[test]
    fn test_header_and_values_align() {
        let mut r = record(Task::Grad, 0, 0.5, 4);
        r.metrics.gpu.push(("gpu0_util_avg".into(), 12.0));
        assert_eq!(r.header().len(), r.values().len());
        assert_eq!(r.header().last().unwrap(), "gpu0_util_avg");
        assert_eq!(r.values()[4], "(64, 64, 64)");
    }

    #[test]
    fn test_float_columns_match_file_name_format() {
        let r = record(Task::Forward, 0, 0.5, 1);
        let values = r.values();
        assert_eq!(values[1], "1e-6");
        assert_eq!(values[2], "2.0");

        let mut cfg = crate::config::RunConfig::default();
        cfg.backend.eps = r.config.eps;
        cfg.backend.upsampfac = r.config.upsampfac;
        assert!(cfg.result_file_name().contains(&format!("_{}_", values[2])));
        assert!(cfg.result_file_name().contains(&format!("_{}_", values[1])));
    }

    #[test]
    fn test_read_dir_records_recurses() {
        let dir = tempfile::tempdir().unwrap();
        ResultWriter::new(dir.path().join("top.csv"))
            .append(&record(Task::Forward, 0, 1.0, 1))
            .unwrap();
        ResultWriter::new(dir.path().join("sweep").join("a").join("nested.csv"))
            .append(&record(Task::Adjoint, 0, 2.0, 2))
            .unwrap();
        fs::write(dir.path().join("sweep").join("notes.txt"), "not a result").unwrap();

        let rows = read_dir_records(dir.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.get("task") == Some("adjoint")));
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path().join("out").join("r.csv"));
        for run in 0..3 {
            writer.append(&record(Task::Forward, run, 0.1, 4)).unwrap();
        }
        let text = fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("backend,eps,upsampfac"));
        assert_eq!(text.matches("backend,").count(), 1);
    }

    #[test]
    fn test_summarize_groups_and_divides_by_coils() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path().join("r.csv"));
        writer.append(&record(Task::Forward, 0, 1.0, 4)).unwrap();
        writer.append(&record(Task::Forward, 1, 3.0, 4)).unwrap();
        writer.append(&record(Task::Adjoint, 0, 2.0, 4)).unwrap();

        let rows = read_dir_records(dir.path()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("shape"), Some("(64, 64, 64)"));

        let summary = summarize(&rows);
        assert_eq!(summary.len(), 2);
        let forward = summary.iter().find(|s| s.task == "forward").unwrap();
        assert_eq!(forward.runs, 2);
        assert_eq!(forward.run_time, 2.0);
        assert_eq!(forward.coil_time, 0.5);
        assert_eq!(forward.coil_mem, 0.5);
        assert_eq!(forward.gpu_mem_peak, None);
    }

    #[test]
    fn test_summarize_skips_incomplete_rows() {
        let row = ResultRow::default();
        assert!(summarize(&[row]).is_empty());
    }
}
