//! Escape, unescape and prepare: delimiter rewriting applied to files.
//!
//! Output always mirrors the input path under an output directory
//! (`<output_dir>/<path>`), so the sources are never modified in place.
//! Binary files are copied untouched.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::classify::{self, ContentKind};
use crate::config::EscapeOptions;
use crate::error::{ArchetypeError, Result};
use crate::escape::{self, Direction};
use crate::filter::{self, FileFilter};
use crate::materialize::write_file;
use crate::metadata::Metadata;
use crate::source::{dir, Snapshot};

/// Totals of a [`prepare_snapshot`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrepareSummary {
    pub written: usize,
    /// Files in which at least one span was rewritten.
    pub modified: usize,
    pub filtered: usize,
}

/// Where `file` lands under `output_dir`.
///
/// Root and `.` components are dropped so absolute inputs are mirrored too;
/// `..` is refused.
pub fn output_path(output_dir: &Path, file: &Path) -> Result<PathBuf> {
    let mut relative = PathBuf::new();
    for component in file.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(ArchetypeError::PathEscape {
                    file: file.display().to_string(),
                    rendered: output_dir.join(file).display().to_string(),
                })
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(ArchetypeError::PathEscape {
            file: file.display().to_string(),
            rendered: output_dir.display().to_string(),
        });
    }
    Ok(output_dir.join(relative))
}

/// Rewrite delimiters in `content` unless it is binary.
///
/// Returns the new bytes and whether any span was rewritten.
fn rewrite<F>(label: &str, content: Vec<u8>, direction: Direction, accept: F) -> (Vec<u8>, bool)
where
    F: Fn(&str) -> bool,
{
    if classify::classify(&content) == ContentKind::Binary {
        tracing::debug!(file = label, "binary file, copying as is");
        return (content, false);
    }
    let text = match String::from_utf8(content) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(file = label, "text file is not UTF-8, copying as is");
            return (e.into_bytes(), false);
        }
    };

    let (from, to) = direction.pairs();
    let result = escape::transform(&text, &from, &to, accept);
    tracing::debug!(
        file = label,
        spans = result.spans,
        rewritten = result.rewritten,
        "processed file"
    );
    (result.text.into_bytes(), result.rewritten > 0)
}

/// Escape or unescape one local file into `options.output_dir`.
///
/// Returns whether any span was rewritten.
pub fn process_file<F>(path: &Path, options: &EscapeOptions, accept: F) -> Result<bool>
where
    F: Fn(&str) -> bool,
{
    let read_error = |source| ArchetypeError::Classification {
        path: path.to_path_buf(),
        source,
    };
    let content = fs::read(path).map_err(read_error)?;
    let mode = dir::file_mode(&fs::metadata(path).map_err(read_error)?);
    let output = output_path(&options.output_dir, path)?;

    let label = path.display().to_string();
    let (bytes, modified) = rewrite(&label, content, options.direction, accept);
    write_file(&output, &bytes, mode)?;
    tracing::info!(file = %label, output = %output.display(), modified, "file saved");
    Ok(modified)
}

/// Process every file in order, rewriting every span.
///
/// All files are attempted; failures are joined into one
/// [`ArchetypeError::Aggregate`]. Returns the number of modified files.
pub fn process_files<P: AsRef<Path>>(paths: &[P], options: &EscapeOptions) -> Result<usize> {
    let mut modified = 0;
    let mut errors = Vec::new();
    for path in paths {
        match process_file(path.as_ref(), options, escape::accept_all) {
            Ok(true) => modified += 1,
            Ok(false) => {}
            Err(error) => {
                tracing::error!(file = %path.as_ref().display(), %error, "cannot process file");
                errors.push(error);
            }
        }
    }
    ArchetypeError::join(errors)?;
    Ok(modified)
}

/// Escape every filtered file of an archetype into `output_dir`, leaving
/// spans that reference declared parameters live.
pub fn prepare_snapshot(
    snapshot: &dyn Snapshot,
    metadata: &Metadata,
    output_dir: &Path,
    filter: &FileFilter,
) -> Result<PrepareSummary> {
    fs::create_dir_all(output_dir)?;
    let accept = escape::protect_parameters(metadata);
    let mut summary = PrepareSummary::default();
    let mut errors = Vec::new();

    for entry in snapshot.entries() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                errors.push(error);
                continue;
            }
        };

        let decision = filter.decide(&entry.path);
        if !decision.is_included() {
            if !filter::is_reserved(&entry.path) {
                tracing::info!(file = %entry.path, reason = %decision.reason(), "file filtered out");
                summary.filtered += 1;
            }
            continue;
        }

        let written = output_path(output_dir, Path::new(&entry.path)).and_then(|output| {
            let (bytes, modified) =
                rewrite(&entry.path, entry.content, Direction::Escape, &accept);
            write_file(&output, &bytes, entry.mode)?;
            Ok(modified)
        });
        match written {
            Ok(modified) => {
                summary.written += 1;
                summary.modified += usize::from(modified);
            }
            Err(error) => {
                tracing::error!(file = %entry.path, %error, "cannot prepare file");
                errors.push(error);
            }
        }
    }

    ArchetypeError::join(errors)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Parameter;
    use crate::source::DirectorySnapshot;

    #[test]
    fn test_output_path_mirrors_input() {
        let out = Path::new("out");
        assert_eq!(
            output_path(out, Path::new("a/b.txt")).unwrap(),
            PathBuf::from("out/a/b.txt")
        );
        assert_eq!(
            output_path(out, Path::new("./a.txt")).unwrap(),
            PathBuf::from("out/a.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_output_path_absolute_input() {
        assert_eq!(
            output_path(Path::new("out"), Path::new("/tmp/a.txt")).unwrap(),
            PathBuf::from("out/tmp/a.txt")
        );
    }

    #[test]
    fn test_output_path_parent_rejected() {
        let err = output_path(Path::new("out"), Path::new("../a.txt")).unwrap_err();
        assert!(matches!(err, ArchetypeError::PathEscape { .. }));
    }

    #[test]
    fn test_escape_then_unescape_files() {
        let dir = tempfile::tempdir().unwrap();
        let original = "kind: {{ .Values.kind }}\nplain line\n";
        let input = dir.path().join("input.yml");
        fs::write(&input, original).unwrap();

        let escaped_dir = dir.path().join("escaped");
        let options = EscapeOptions::new(Direction::Escape).with_output_dir(&escaped_dir);
        assert!(process_file(&input, &options, escape::accept_all).unwrap());

        let escaped = output_path(&escaped_dir, &input).unwrap();
        let text = fs::read_to_string(&escaped).unwrap();
        assert_eq!(text, "kind: {-{ .Values.kind }-}\nplain line\n");

        let restored_dir = dir.path().join("restored");
        let options = EscapeOptions::new(Direction::Unescape).with_output_dir(&restored_dir);
        assert!(process_file(&escaped, &options, escape::accept_all).unwrap());
        let restored = output_path(&restored_dir, &escaped).unwrap();
        assert_eq!(fs::read_to_string(restored).unwrap(), original);
    }

    #[test]
    fn test_file_without_spans_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("plain.txt");
        fs::write(&input, "nothing here\n").unwrap();
        let out = dir.path().join("out");
        let options = EscapeOptions::new(Direction::Escape).with_output_dir(&out);

        assert!(!process_file(&input, &options, escape::accept_all).unwrap());
        let written = output_path(&out, &input).unwrap();
        assert_eq!(fs::read_to_string(written).unwrap(), "nothing here\n");
    }

    #[test]
    fn test_binary_file_is_copied_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("blob.bin");
        let bytes = b"\x00{{x}}\x01\x02".to_vec();
        fs::write(&input, &bytes).unwrap();
        let out = dir.path().join("out");
        let options = EscapeOptions::new(Direction::Escape).with_output_dir(&out);

        assert!(!process_file(&input, &options, escape::accept_all).unwrap());
        assert_eq!(fs::read(output_path(&out, &input).unwrap()).unwrap(), bytes);
    }

    #[test]
    fn test_process_files_aggregates_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        fs::write(&good, "{{a}}").unwrap();
        let missing_one = dir.path().join("missing-1.txt");
        let missing_two = dir.path().join("missing-2.txt");
        let out = dir.path().join("out");
        let options = EscapeOptions::new(Direction::Escape).with_output_dir(&out);

        let err = process_files(&[&missing_one, &good, &missing_two], &options).unwrap_err();
        match err {
            ArchetypeError::Aggregate(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected aggregate, got {other}"),
        }
        // The good file in the middle was still processed.
        assert!(output_path(&out, &good).unwrap().is_file());

        assert_eq!(process_files(&[&good], &options).unwrap(), 1);
    }

    #[test]
    fn test_prepare_snapshot_protects_parameters() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join(".archetype")).unwrap();
        fs::write(src.path().join(".archetype/metadata.yml"), "version: 1\n").unwrap();
        fs::write(
            src.path().join("chart.yml"),
            "name: {{name}}\nimage: {{ .Values.image }}\n",
        )
        .unwrap();
        fs::write(src.path().join("notes.txt"), "{{ .Release }}\n").unwrap();

        let mut metadata = Metadata::default();
        metadata.parameters.insert("name".into(), Parameter::default());
        let out = tempfile::tempdir().unwrap();
        let filter = FileFilter::new(&[r"\.yml$"], &[]);

        let summary = prepare_snapshot(
            &DirectorySnapshot::new(src.path()),
            &metadata,
            out.path(),
            &filter,
        )
        .unwrap();

        assert_eq!(
            summary,
            PrepareSummary {
                written: 1,
                modified: 1,
                filtered: 1,
            }
        );
        assert_eq!(
            fs::read_to_string(out.path().join("chart.yml")).unwrap(),
            "name: {{name}}\nimage: {-{ .Values.image }-}\n"
        );
        assert!(!out.path().join(".archetype").exists());
        assert!(!out.path().join("notes.txt").exists());
    }
}
