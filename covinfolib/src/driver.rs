//! High-level extraction API.
//!
//! [`Driver::run`] walks the input directories and, for every raw data file
//! found, goes through the same sequence:
//!
//! 1. resolve the paired metadata file and decode it
//! 2. change into the data file's directory and invoke the annotation tool
//! 3. match every listing to a metadata source path and aggregate it
//! 4. stream the resulting records to the output
//! 5. remove the listings and change back
//!
//! Any error aborts the whole run. Reconciliation warnings only skip the
//! listing (or data file) concerned.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::annotate::Annotator;
use crate::data::{
    match_source, parse_annotated_file, read_metadata, MetadataMapping, SourceFileRecord,
};
use crate::error::{CovinfoError, ReconciliationWarning};
use crate::output::{per_data_file_output, OutputTarget, ReportWriter};
use crate::path::resolve_symlink_chain;
use crate::source::{discover_data_files_in_dirs, FilterConfig, RawDataFile};
use crate::workdir::WorkdirGuard;
use crate::Result;

/// Options for an extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Label written to every `TN:` line
    pub test_name: String,
    /// Output destination
    pub output: OutputTarget,
    /// Raw data file selection
    pub filter: FilterConfig,
    /// Suppress progress messages
    pub quiet: bool,
}

impl ExtractOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the test name.
    pub fn test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = name.into();
        self
    }

    /// Set the output destination.
    pub fn output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    /// Set the data file filter.
    pub fn filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Suppress progress messages.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Progress is never reported while the report itself goes to stdout.
    fn reports_progress(&self) -> bool {
        !self.quiet && !self.output.is_stdout()
    }
}

/// Check that a test name only uses letters, digits and underscores.
pub fn validate_test_name(name: &str) -> Result<()> {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(CovinfoError::Usage(format!(
            "invalid test name '{name}': only letters, digits and '_' are allowed"
        )))
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Raw data files for which the annotation tool ran
    pub data_files: usize,
    /// Records written
    pub records: usize,
    /// Reconciliation warnings emitted
    pub warnings: usize,
}

/// What became of one annotated listing.
enum Outcome {
    Record(SourceFileRecord),
    Skipped(ReconciliationWarning),
}

/// Orchestrates extraction over a set of input directories.
pub struct Driver<A: Annotator> {
    annotator: A,
    options: ExtractOptions,
}

impl<A: Annotator> Driver<A> {
    pub fn new(annotator: A, options: ExtractOptions) -> Self {
        Self { annotator, options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Process every raw data file below `inputs`.
    ///
    /// Inputs are validated before anything is written.
    pub fn run<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<RunSummary> {
        validate_test_name(&self.options.test_name)?;
        if inputs.is_empty() {
            return Err(CovinfoError::Usage("no input directory specified".to_string()));
        }
        for input in inputs {
            let input = input.as_ref();
            if !input.exists() {
                return Err(CovinfoError::PathNotFound(input.to_path_buf()));
            }
        }

        let data_files = discover_data_files_in_dirs(inputs, &self.options.filter)?;
        if data_files.is_empty() {
            warn!("no data files found");
        }

        let mut shared = match &self.options.output {
            OutputTarget::PerDataFile => None,
            OutputTarget::File(path) => Some(ReportWriter::create(path)?),
            OutputTarget::Stdout => Some(ReportWriter::stdout()),
        };

        let mut summary = RunSummary::default();
        for data_file in &data_files {
            self.process_data_file(data_file, shared.as_mut(), &mut summary)?;
        }

        if let Some(writer) = shared.as_mut() {
            writer.flush()?;
        }
        if self.options.reports_progress() {
            info!(
                "Finished: {} data files processed, {} records written, {} warnings",
                summary.data_files, summary.records, summary.warnings
            );
        }
        Ok(summary)
    }

    fn process_data_file<W: Write>(
        &self,
        data_file: &Path,
        mut shared: Option<&mut ReportWriter<W>>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let raw = RawDataFile::new(data_file)?;
        if self.options.reports_progress() {
            info!("Processing {}", raw.path.display());
        }

        let (mapping, object_dir) = load_metadata(&raw)?;

        let _workdir = WorkdirGuard::enter(&raw.dir)?;
        let artifacts = self.annotator.annotate(&raw, &object_dir)?;
        summary.data_files += 1;
        if artifacts.is_empty() {
            report(
                ReconciliationWarning::NoAnnotatedFiles(raw.path.clone()),
                summary,
            );
            return Ok(());
        }

        let mut dedicated: Option<ReportWriter<Box<dyn Write>>> = None;
        for artifact in &artifacts {
            let outcome = aggregate_artifact(artifact, &mapping);
            remove_artifact(artifact);

            let record = match outcome? {
                Outcome::Record(record) => record,
                Outcome::Skipped(warning) => {
                    report(warning, summary);
                    continue;
                }
            };

            match shared.as_deref_mut() {
                Some(writer) => writer.write_record(&record, &self.options.test_name)?,
                None => {
                    if dedicated.is_none() {
                        let path = per_data_file_output(&raw.path);
                        if self.options.reports_progress() {
                            info!("Writing {}", path.display());
                        }
                        dedicated = Some(ReportWriter::create(&path)?);
                    }
                    if let Some(writer) = dedicated.as_mut() {
                        writer.write_record(&record, &self.options.test_name)?;
                    }
                }
            }
            summary.records += 1;
        }

        if let Some(writer) = dedicated.as_mut() {
            writer.flush()?;
        }
        if let Some(writer) = shared {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Locate, resolve and decode the metadata file paired with `raw`.
///
/// Returns the mapping and the object directory (where the resolved metadata file lives).
fn load_metadata(raw: &RawDataFile) -> Result<(MetadataMapping, PathBuf)> {
    let metadata_path = raw.metadata_path();
    if fs::symlink_metadata(&metadata_path).is_err() {
        return Err(CovinfoError::Configuration(format!(
            "no metadata file found for '{}' (expected '{}')",
            raw.path.display(),
            metadata_path.display()
        )));
    }

    let resolved = resolve_symlink_chain(&metadata_path)?;
    let object_dir = resolved
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| raw.dir.clone());
    let mapping = read_metadata(&resolved)?;
    Ok((mapping, object_dir))
}

fn aggregate_artifact(artifact: &Path, mapping: &MetadataMapping) -> Result<Outcome> {
    let source = match match_source(artifact, mapping.paths()) {
        Ok(source) => source,
        Err(warning) => return Ok(Outcome::Skipped(warning)),
    };

    let lines = parse_annotated_file(artifact)?;
    if lines.is_empty() {
        return Ok(Outcome::Skipped(ReconciliationWarning::EmptyAnnotatedFile(
            artifact.to_path_buf(),
        )));
    }

    let functions = mapping.functions(source).unwrap_or_default();
    Ok(Outcome::Record(SourceFileRecord::aggregate(
        source, functions, &lines,
    )))
}

fn remove_artifact(artifact: &Path) {
    if let Err(e) = fs::remove_file(artifact) {
        warn!("cannot remove {}: {e}", artifact.display());
    }
}

fn report(warning: ReconciliationWarning, summary: &mut RunSummary) {
    warn!("{warning}");
    summary.warnings += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::metadata::tests::MetadataBuilder;
    use crate::workdir::CWD_LOCK;
    use std::cell::RefCell;
    use std::env;
    use std::sync::MutexGuard;
    use tempfile::TempDir;

    /// Writes canned listings into the data file's directory instead of running a tool.
    #[derive(Default)]
    struct FakeAnnotator {
        listings: Vec<(&'static str, String)>,
        fail: bool,
        calls: RefCell<Vec<(PathBuf, PathBuf, PathBuf)>>,
    }

    impl FakeAnnotator {
        fn with_listing(mut self, name: &'static str, content: impl Into<String>) -> Self {
            self.listings.push((name, content.into()));
            self
        }
    }

    impl Annotator for FakeAnnotator {
        fn annotate(&self, raw: &RawDataFile, object_dir: &Path) -> Result<Vec<PathBuf>> {
            self.calls.borrow_mut().push((
                raw.path.clone(),
                object_dir.to_path_buf(),
                env::current_dir()?,
            ));
            if self.fail {
                return Err(CovinfoError::Configuration("fake tool failed".to_string()));
            }
            let mut files = Vec::new();
            for (name, content) in &self.listings {
                let path = raw.dir.join(name);
                fs::write(&path, content)?;
                files.push(path);
            }
            Ok(files)
        }
    }

    fn lock() -> MutexGuard<'static, ()> {
        CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A build tree with `obj/a.da` and `obj/a.bb` declaring `/src/a.c` with `f` at line 10.
    fn build_tree() -> (TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let obj = temp.path().join("obj");
        fs::create_dir(&obj).unwrap();
        fs::write(obj.join("a.da"), b"").unwrap();
        fs::write(
            obj.join("a.bb"),
            MetadataBuilder::new()
                .file("/src/a.c")
                .function("f", 10)
                .file("/src/a.h")
                .build(),
        )
        .unwrap();
        (temp, obj)
    }

    /// Twelve lines; line 10 executed three times, line 11 uninstrumented, line 12 never executed.
    fn listing_a_c() -> String {
        let mut listing = String::new();
        for i in 1..=9 {
            listing.push_str(&format!("\t\t/* line {i} */\n"));
        }
        listing.push_str("        3    int f() {\n");
        listing.push_str("\t\t  /* comment */\n");
        listing.push_str("      ######    }\n");
        listing
    }

    #[test]
    fn test_end_to_end_per_data_file_output() {
        let _lock = lock();
        let (_temp, obj) = build_tree();
        let cwd_before = env::current_dir().unwrap();
        let annotator = FakeAnnotator::default().with_listing("a.c.gcov", listing_a_c());

        let driver = Driver::new(annotator, ExtractOptions::new().test_name("unit").quiet(true));
        let summary = driver.run(&[obj.clone()]).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                data_files: 1,
                records: 1,
                warnings: 0
            }
        );
        let report = fs::read_to_string(obj.join("a.da.info")).unwrap();
        assert_eq!(
            report,
            "TN:unit\nSF:/src/a.c\nFN:10,f\nDA:10,3\nDA:12,0\nLF:2\nLH:1\nend_of_record\n"
        );

        assert!(!obj.join("a.c.gcov").exists());
        assert_eq!(env::current_dir().unwrap(), cwd_before);

        let calls = driver.annotator.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            fs::canonicalize(&calls[0].2).unwrap(),
            fs::canonicalize(&obj).unwrap()
        );
    }

    #[test]
    fn test_shared_output_and_warnings() {
        let _lock = lock();
        let (temp, obj) = build_tree();
        let out = temp.path().join("all.info");
        let annotator = FakeAnnotator::default()
            .with_listing("a.c.gcov", listing_a_c())
            .with_listing("a.h.gcov", "\t\tstatic inline int g();\n        2    return 1;\n")
            .with_listing("missing.c.gcov", "        1    x;\n")
            .with_listing("empty.h.gcov", "");

        let driver = Driver::new(
            annotator,
            ExtractOptions::new()
                .output(OutputTarget::File(out.clone()))
                .quiet(true),
        );
        let summary = driver.run(&[obj.clone()]).unwrap();

        assert_eq!(summary.records, 2);
        // missing.c has no source; empty.h has no source either
        assert_eq!(summary.warnings, 2);

        let report = fs::read_to_string(&out).unwrap();
        assert_eq!(report.matches("end_of_record").count(), 2);
        assert!(report.find("SF:/src/a.c").unwrap() < report.find("SF:/src/a.h").unwrap());
        assert!(report.contains("SF:/src/a.h\nDA:2,2\nLF:1\nLH:1\n"));
        assert!(!obj.join("a.da.info").exists());

        for name in ["a.c.gcov", "a.h.gcov", "missing.c.gcov", "empty.h.gcov"] {
            assert!(!obj.join(name).exists(), "{name} was not cleaned up");
        }
    }

    #[test]
    fn test_empty_listing_is_skipped() {
        let _lock = lock();
        let (_temp, obj) = build_tree();
        let annotator = FakeAnnotator::default().with_listing("a.c.gcov", "");

        let driver = Driver::new(annotator, ExtractOptions::new().quiet(true));
        let summary = driver.run(&[obj.clone()]).unwrap();

        assert_eq!(summary.records, 0);
        assert_eq!(summary.warnings, 1);
        assert!(!obj.join("a.da.info").exists());
        assert!(!obj.join("a.c.gcov").exists());
    }

    #[test]
    fn test_no_listings_is_a_warning() {
        let _lock = lock();
        let (_temp, obj) = build_tree();

        let driver = Driver::new(FakeAnnotator::default(), ExtractOptions::new().quiet(true));
        let summary = driver.run(&[obj]).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                data_files: 1,
                records: 0,
                warnings: 1
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_metadata_selects_object_dir() {
        let _lock = lock();
        let (temp, obj) = build_tree();
        let run_dir = temp.path().join("run");
        fs::create_dir(&run_dir).unwrap();
        fs::rename(obj.join("a.da"), run_dir.join("a.da")).unwrap();
        std::os::unix::fs::symlink(obj.join("a.bb"), run_dir.join("a.bb")).unwrap();

        let annotator = FakeAnnotator::default().with_listing("a.c.gcov", listing_a_c());
        let driver = Driver::new(annotator, ExtractOptions::new().quiet(true));
        driver.run(&[run_dir.clone()]).unwrap();

        let calls = driver.annotator.calls.borrow();
        assert_eq!(calls[0].1, obj);
        assert!(run_dir.join("a.da.info").exists());
    }

    #[test]
    fn test_missing_metadata_is_fatal() {
        let _lock = lock();
        let (_temp, obj) = build_tree();
        fs::remove_file(obj.join("a.bb")).unwrap();

        let driver = Driver::new(FakeAnnotator::default(), ExtractOptions::new().quiet(true));
        let result = driver.run(&[obj]);

        assert!(matches!(result, Err(CovinfoError::Configuration(_))));
        assert!(driver.annotator.calls.borrow().is_empty());
    }

    #[test]
    fn test_malformed_metadata_is_fatal() {
        let _lock = lock();
        let (_temp, obj) = build_tree();
        fs::write(obj.join("a.bb"), MetadataBuilder::new().word(5).build()).unwrap();

        let driver = Driver::new(FakeAnnotator::default(), ExtractOptions::new().quiet(true));
        assert!(matches!(
            driver.run(&[obj]),
            Err(CovinfoError::Format { .. })
        ));
    }

    #[test]
    fn test_tool_failure_aborts_and_restores_cwd() {
        let _lock = lock();
        let (_temp, obj) = build_tree();
        let cwd_before = env::current_dir().unwrap();
        let annotator = FakeAnnotator {
            fail: true,
            ..FakeAnnotator::default()
        };

        let driver = Driver::new(annotator, ExtractOptions::new().quiet(true));
        assert!(driver.run(&[obj]).is_err());
        assert_eq!(env::current_dir().unwrap(), cwd_before);
    }

    #[test]
    fn test_invalid_inputs_rejected_before_processing() {
        let _lock = lock();
        let (_temp, obj) = build_tree();

        let driver = Driver::new(FakeAnnotator::default(), ExtractOptions::new());
        let result = driver.run(&[obj.clone(), PathBuf::from("/nonexistent/path")]);
        assert!(matches!(result, Err(CovinfoError::PathNotFound(_))));

        let driver = Driver::new(FakeAnnotator::default(), ExtractOptions::new().test_name("bad name"));
        let result = driver.run(&[obj]);
        assert!(matches!(result, Err(CovinfoError::Usage(_))));
        assert!(driver.annotator.calls.borrow().is_empty());

        let driver = Driver::new(FakeAnnotator::default(), ExtractOptions::new());
        let result = driver.run::<PathBuf>(&[]);
        assert!(matches!(result, Err(CovinfoError::Usage(_))));
    }

    #[test]
    fn test_validate_test_name() {
        assert!(validate_test_name("").is_ok());
        assert!(validate_test_name("unit_tests_2").is_ok());
        assert!(validate_test_name("with space").is_err());
        assert!(validate_test_name("a,b").is_err());
    }
}
