//! Generation pipeline
//!
//! sources -> bounded queue -> extractor -> `finalize()` -> walker + dialect
//! -> files on disk.
//!
//! Error policy: a source that cannot be read or decoded is skipped when
//! `continue_on_error` is set and aborts the run otherwise. A decoding error
//! keeps whatever the document contributed before the failure. Nothing is
//! written unless every file rendered; writing goes through `.partial`
//! files that are renamed into place at the end. If a rename fails, targets
//! already moved are put back the way they were.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::codegen::{self, GeneratedOutput};
use crate::config::GeneratorConfig;
use crate::error::{Result, TypegenError};
use crate::extract::Extractor;
use crate::source::{SourceQueue, SourceSpec};
use crate::tree::{FinalizedTree, SchemaTree};

const PARTIAL_SUFFIX: &str = "partial";
const BACKUP_SUFFIX: &str = "backup";

type Rename<'a> = dyn FnMut(&Path, &Path) -> io::Result<()> + 'a;

/// Counters for one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Sources that contributed to the tree (possibly partially)
    pub sources_scanned: usize,
    /// Sources skipped after a read or decode error
    pub sources_failed: usize,
    pub elements: u64,
    pub ignored: u64,
}

/// Result of scanning every source
#[derive(Debug)]
pub struct Scan {
    pub tree: FinalizedTree,
    /// Names of the sources that contributed, in scan order
    pub sources: Vec<String>,
    pub summary: ScanSummary,
}

/// Scan and generation together
#[derive(Debug)]
pub struct Generation {
    pub scan: Scan,
    pub output: GeneratedOutput,
}

/// Validate the configuration and build the schema tree from every source
pub fn scan(config: &GeneratorConfig, specs: Vec<SourceSpec>) -> Result<Scan> {
    config.validate()?;
    if specs.is_empty() {
        return Err(TypegenError::NoSources);
    }

    let continue_on_error = config.input.continue_on_error;
    let mut tree = SchemaTree::new(config);
    let mut summary = ScanSummary::default();
    let mut sources = Vec::new();

    {
        let mut extractor = Extractor::new(&mut tree).with_progress(config.input.progress_every);

        for prepared in SourceQueue::spawn(specs) {
            let prepared = match prepared {
                Ok(prepared) => prepared,
                Err(e) if continue_on_error && e.is_per_source() => {
                    tracing::warn!(error = %e, "skipping unreadable source");
                    summary.sources_failed += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            tracing::debug!(source = %prepared.name, bytes = prepared.bytes.len(), "scanning source");
            match extractor.extract(&prepared.name, prepared.bytes.as_slice()) {
                Ok(stats) => {
                    summary.elements += stats.elements;
                    summary.ignored += stats.ignored;
                    summary.sources_scanned += 1;
                    sources.push(prepared.name);
                }
                Err(e) if continue_on_error && e.is_per_source() => {
                    tracing::warn!(error = %e, "decoding failed, keeping partial schema");
                    summary.sources_failed += 1;
                    summary.sources_scanned += 1;
                    sources.push(prepared.name);
                }
                Err(e) => return Err(e),
            }
        }
    }

    if summary.sources_scanned == 0 {
        return Err(TypegenError::NoSources);
    }

    tracing::info!(
        scanned = summary.sources_scanned,
        failed = summary.sources_failed,
        elements = summary.elements,
        nodes = tree.len(),
        "scan complete"
    );

    Ok(Scan {
        tree: tree.finalize(),
        sources,
        summary,
    })
}

/// Scan every source, then emit code for the configured dialect
pub fn run(config: &GeneratorConfig, specs: Vec<SourceSpec>) -> Result<Generation> {
    run_at(config, specs, Utc::now())
}

/// `run` with a fixed timestamp for generated headers
pub fn run_at(config: &GeneratorConfig, specs: Vec<SourceSpec>, generated_at: DateTime<Utc>) -> Result<Generation> {
    let scan = scan(config, specs)?;
    let output = codegen::generate_at(&scan.tree, config, &scan.sources, generated_at)?;
    Ok(Generation { scan, output })
}

/// Write every generated file below `out_dir`, all or nothing.
///
/// Returns the final paths in output order.
pub fn write_output(output: &GeneratedOutput, out_dir: &Path) -> Result<Vec<PathBuf>> {
    write_output_with(output, out_dir, &mut |from: &Path, to: &Path| fs::rename(from, to))
}

fn write_output_with(output: &GeneratedOutput, out_dir: &Path, rename: &mut Rename<'_>) -> Result<Vec<PathBuf>> {
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(output.files.len());

    for file in &output.files {
        let target = out_dir.join(&file.path);
        let partial = sibling(&target, PARTIAL_SUFFIX);
        let written = target
            .parent()
            .map_or(Ok(()), |dir| fs::create_dir_all(dir))
            .and_then(|_| fs::write(&partial, &file.contents));
        if let Err(e) = written {
            // Count the failed file too; it may have been created before the error
            staged.push((partial, target));
            discard(&staged);
            return Err(e.into());
        }
        staged.push((partial, target));
    }

    commit(&staged, rename)?;
    let written: Vec<PathBuf> = staged.into_iter().map(|(_, target)| target).collect();
    prune(output, out_dir, &written)?;

    tracing::debug!(files = written.len(), dir = %out_dir.display(), "output written");
    Ok(written)
}

/// Move every staged file over its target, all or nothing.
///
/// An existing target is first set aside as `<name>.backup`. On failure the
/// targets handled so far get their backups back (or are removed when they
/// did not exist before) and the remaining partial files are deleted.
fn commit(staged: &[(PathBuf, PathBuf)], rename: &mut Rename<'_>) -> io::Result<()> {
    let mut done: Vec<(&Path, Option<PathBuf>)> = Vec::with_capacity(staged.len());

    for (i, (partial, target)) in staged.iter().enumerate() {
        let backup = if target.exists() {
            let backup = sibling(target, BACKUP_SUFFIX);
            if let Err(e) = rename(target, &backup) {
                rollback(&done, rename);
                discard(&staged[i..]);
                return Err(e);
            }
            Some(backup)
        } else {
            None
        };

        if let Err(e) = rename(partial, target) {
            done.push((target.as_path(), backup));
            rollback(&done, rename);
            discard(&staged[i..]);
            return Err(e);
        }
        done.push((target.as_path(), backup));
    }

    for (_, backup) in &done {
        if let Some(backup) = backup {
            remove_quietly(backup);
        }
    }
    Ok(())
}

fn rollback(done: &[(&Path, Option<PathBuf>)], rename: &mut Rename<'_>) {
    for (target, backup) in done.iter().rev() {
        match backup {
            Some(backup) => {
                if let Err(e) = rename(backup, target) {
                    tracing::warn!(path = %target.display(), error = %e, "could not restore previous file");
                }
            }
            None => remove_quietly(target),
        }
    }
}

/// Remove files in the output's managed directories that this run did not write
fn prune(output: &GeneratedOutput, out_dir: &Path, written: &[PathBuf]) -> Result<()> {
    let keep: HashSet<&Path> = written.iter().map(PathBuf::as_path).collect();
    for dir in &output.managed_dirs {
        let dir = out_dir.join(dir);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() && !keep.contains(entry.path()) {
                fs::remove_file(entry.path())?;
                tracing::debug!(path = %entry.path().display(), "removed stale generated file");
            }
        }
    }
    Ok(())
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    target.with_file_name(name)
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (partial, _) in staged {
        remove_quietly(partial);
    }
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "could not remove file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::GeneratedFile;
    use crate::config::OutputDialect;

    fn config() -> GeneratorConfig {
        let mut config = GeneratorConfig::default();
        config.output.dialect = Some(OutputDialect::Go);
        config.inference.use_types = true;
        config
    }

    #[test]
    fn test_scan_merges_documents() {
        let specs = vec![
            SourceSpec::inline("one.xml", "<a><b/></a>"),
            SourceSpec::inline("two.xml", "<a><c/></a>"),
        ];
        let scan = scan(&config(), specs).unwrap();
        assert_eq!(scan.summary.sources_scanned, 2);
        assert_eq!(scan.sources, vec!["one.xml", "two.xml"]);
        assert_eq!(scan.tree.find("/a").unwrap().children.len(), 2);
    }

    #[test]
    fn test_config_errors_come_first() {
        let mut config = config();
        config.output.dialect = None;
        let err = scan(&config, vec![SourceSpec::inline("x", "<a/>")]).unwrap_err();
        assert!(matches!(err, TypegenError::Config(_)));
    }

    #[test]
    fn test_no_sources() {
        assert!(matches!(scan(&config(), Vec::new()), Err(TypegenError::NoSources)));
    }

    #[test]
    fn test_unreadable_source_strict_and_permissive() {
        let specs = || {
            vec![
                SourceSpec::File(PathBuf::from("/no/such/file.xml")),
                SourceSpec::inline("ok.xml", "<a/>"),
            ]
        };
        let err = scan(&config(), specs()).unwrap_err();
        assert!(matches!(err, TypegenError::Source { .. }));

        let mut permissive = config();
        permissive.input.continue_on_error = true;
        let scan = scan(&permissive, specs()).unwrap();
        assert_eq!(scan.summary.sources_failed, 1);
        assert_eq!(scan.sources, vec!["ok.xml"]);
    }

    #[test]
    fn test_all_sources_unreadable_is_no_sources() {
        let mut permissive = config();
        permissive.input.continue_on_error = true;
        let specs = vec![SourceSpec::File(PathBuf::from("/no/such/file.xml"))];
        assert!(matches!(scan(&permissive, specs), Err(TypegenError::NoSources)));
    }

    #[test]
    fn test_write_output_leaves_no_partials() {
        let dir = tempfile::tempdir().unwrap();
        let output = GeneratedOutput {
            files: vec![
                GeneratedFile { path: "a/one.txt".into(), contents: "1".to_string() },
                GeneratedFile { path: "two.txt".into(), contents: "2".to_string() },
            ],
            type_count: 0,
            managed_dirs: Vec::new(),
        };
        let written = write_output(&output, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("a/one.txt")).unwrap(), "1");
        assert!(!dir.path().join("a/one.txt.partial").exists());
    }

    #[test]
    fn test_write_failure_removes_partials() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is needed makes the second write fail
        fs::write(dir.path().join("blocker"), "").unwrap();
        let output = GeneratedOutput {
            files: vec![
                GeneratedFile { path: "first.txt".into(), contents: "1".to_string() },
                GeneratedFile { path: "blocker/second.txt".into(), contents: "2".to_string() },
            ],
            type_count: 0,
            managed_dirs: Vec::new(),
        };
        assert!(write_output(&output, dir.path()).is_err());
        assert!(!dir.path().join("first.txt").exists());
        assert!(!dir.path().join("first.txt.partial").exists());
    }

    #[test]
    fn test_rename_failure_restores_earlier_targets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("first.txt"), "old").unwrap();
        let output = GeneratedOutput {
            files: vec![
                GeneratedFile { path: "first.txt".into(), contents: "new".to_string() },
                GeneratedFile { path: "second.txt".into(), contents: "2".to_string() },
                GeneratedFile { path: "third.txt".into(), contents: "3".to_string() },
            ],
            type_count: 0,
            managed_dirs: Vec::new(),
        };

        let mut failing = |from: &Path, to: &Path| {
            if to.ends_with("second.txt") {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "rename refused"))
            } else {
                fs::rename(from, to)
            }
        };
        let err = write_output_with(&output, dir.path(), &mut failing).unwrap_err();
        assert!(matches!(err, TypegenError::Io(_)));

        assert_eq!(fs::read_to_string(dir.path().join("first.txt")).unwrap(), "old");
        assert!(!dir.path().join("second.txt").exists());
        assert!(!dir.path().join("third.txt").exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != "first.txt")
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
    }

    #[test]
    fn test_overwrite_drops_backups() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.txt"), "old").unwrap();
        let output = GeneratedOutput {
            files: vec![GeneratedFile { path: "one.txt".into(), contents: "new".to_string() }],
            type_count: 0,
            managed_dirs: Vec::new(),
        };
        write_output(&output, dir.path()).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("one.txt")).unwrap(), "new");
        assert!(!dir.path().join("one.txt.backup").exists());
    }

    #[test]
    fn test_stale_java_classes_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut java = config();
        java.output.dialect = Some(OutputDialect::Java);
        let classes = dir.path().join("src/main/java/io/xmltypegen/jaxb/xml");

        let first = run(&java, vec![SourceSpec::inline("one.xml", "<a><b/></a>")]).unwrap();
        write_output(&first.output, dir.path()).unwrap();
        assert!(classes.join("Cb.java").exists());

        let second = run(&java, vec![SourceSpec::inline("two.xml", "<a><c/></a>")]).unwrap();
        write_output(&second.output, dir.path()).unwrap();
        assert!(classes.join("Ca.java").exists());
        assert!(classes.join("Cc.java").exists());
        assert!(!classes.join("Cb.java").exists());
        assert!(dir.path().join("pom.xml").exists());
    }

    #[test]
    fn test_sibling_paths() {
        assert_eq!(sibling(Path::new("out/Main.java"), PARTIAL_SUFFIX), PathBuf::from("out/Main.java.partial"));
        assert_eq!(sibling(Path::new("out/Main.java"), BACKUP_SUFFIX), PathBuf::from("out/Main.java.backup"));
    }
}
