use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use ens_core::errors::{EnsembleError, ErrorInfo};
use ens_core::JobContext;
use tracing::info;

/// Target used for every report emitted to the tracing sink.
pub const REPORT_TARGET: &str = "ensemble_metrics";

fn io_error(code: &str, err: impl ToString, path: &Path) -> EnsembleError {
    EnsembleError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Assembles the full report text: header lines followed by the kind's block.
///
/// The result is not newline terminated.
pub fn render_report(
    kind: &str,
    job: &dyn JobContext,
    items_in_ensemble: usize,
    body: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Report from {kind}:");
    if let Some(name) = job.job_name() {
        let _ = writeln!(out, "\tjob_name:\t{name}");
        if let Some(index) = job.nstruct_index() {
            let _ = writeln!(out, "\tjob_nstruct_index:\t{index}");
        }
    }
    if let Some(rank) = job.process_rank() {
        let _ = writeln!(out, "\tprocess_rank:\t{rank}");
    }
    let _ = writeln!(out, "\tposes_in_ensemble:\t{items_in_ensemble}");
    out.push_str(body);
    out
}

/// Builds the per-job report path from the configured filename.
///
/// The file stem becomes `prefix_job_proc_N_stem_suffix`, with absent
/// segments omitted, so every job of a batch writes its own file.
pub fn report_file_path(
    filename: &str,
    prefix: &str,
    suffix: &str,
    job: &dyn JobContext,
) -> Result<PathBuf, EnsembleError> {
    if filename.is_empty() {
        return Err(EnsembleError::Config(
            ErrorInfo::new(
                "report.missing_filename",
                "an output file must be set in order to use file output",
            )
            .with_hint("set output_filename or use the tracer output mode"),
        ));
    }
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());

    let mut segments: Vec<String> = Vec::new();
    if !prefix.is_empty() {
        segments.push(prefix.to_string());
    }
    if let Some(name) = job.job_name().filter(|name| !name.is_empty()) {
        segments.push(name);
    }
    if let Some(index) = job.nstruct_index() {
        segments.push(index.to_string());
    }
    if let Some(rank) = job.process_rank() {
        segments.push(format!("proc_{rank}"));
    }
    segments.push(stem);
    if !suffix.is_empty() {
        segments.push(suffix.to_string());
    }
    let mut file_name = segments.join("_");
    if let Some(ext) = extension {
        file_name.push('.');
        file_name.push_str(&ext);
    }
    Ok(match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(file_name),
        _ => PathBuf::from(file_name),
    })
}

/// Emits a finished report through the tracing sink.
pub fn emit_to_tracer(kind: &str, label: &str, text: &str) {
    info!(target: REPORT_TARGET, kind = %kind, label = %label, "{}", text);
}

/// Writes a finished report to disk, creating parent directories as needed.
pub fn write_report_file(path: &Path, text: &str) -> Result<(), EnsembleError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| io_error("report.create_dir", err, parent))?;
    }
    let mut contents = String::with_capacity(text.len() + 1);
    contents.push_str(text);
    contents.push('\n');
    fs::write(path, contents).map_err(|err| io_error("report.write", err, path))?;
    info!(
        target: REPORT_TARGET,
        path = %path.display(),
        "wrote ensemble metric report"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ens_core::{JobInfo, NoJob};

    #[test]
    fn header_without_job_system() {
        let text = render_report("CentralTendency", &NoJob, 3, "\tmean:\t1");
        assert_eq!(
            text,
            "Report from CentralTendency:\n\tposes_in_ensemble:\t3\n\tmean:\t1"
        );
    }

    #[test]
    fn header_with_job_identifiers() {
        let job = JobInfo::new("design_0004", 4);
        let text = render_report("CentralTendency", &job, 2, "body");
        assert!(text.contains("\tjob_name:\tdesign_0004\n"));
        assert!(text.contains("\tjob_nstruct_index:\t4\n"));
        assert!(text.ends_with("\tposes_in_ensemble:\t2\nbody"));
    }

    #[test]
    fn file_name_composition() {
        let plain = report_file_path("out/report.txt", "", "", &NoJob).expect("path");
        assert_eq!(plain, PathBuf::from("out/report.txt"));

        let job = JobInfo::new("design_0004", 4).with_process_rank(2);
        let full = report_file_path("report.txt", "pre", "post", &job).expect("path");
        assert_eq!(full, PathBuf::from("pre_design_0004_4_proc_2_report_post.txt"));

        let no_ext = report_file_path("summary", "", "b", &NoJob).expect("path");
        assert_eq!(no_ext, PathBuf::from("summary_b"));
    }

    #[test]
    fn runs_of_one_job_get_separate_files() {
        let first = report_file_path("stats.txt", "", "", &JobInfo::new("design", 1)).expect("path");
        let second =
            report_file_path("stats.txt", "", "", &JobInfo::new("design", 2)).expect("path");
        assert_eq!(first, PathBuf::from("design_1_stats.txt"));
        assert_eq!(second, PathBuf::from("design_2_stats.txt"));
    }

    #[test]
    fn empty_filename_is_rejected() {
        let err = report_file_path("", "a", "b", &NoJob).expect_err("empty");
        assert_eq!(err.code(), "report.missing_filename");
    }
}
