//! Header-Synchronizer (spec.md §4.2.1): compares a freshly generated
//! header against the existing one and atomically replaces only on
//! difference.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Everything collected while compiling one source file: its lines, verbatim,
/// plus the `#define NAME number` pairs contributed by its own directives
/// (spec.md §4.2.1).
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub source_path: PathBuf,
    pub lines: Vec<String>,
    pub defines: Vec<(String, i64)>,
}

impl FileHeader {
    #[must_use]
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            source_path,
            lines: Vec::new(),
            defines: Vec::new(),
        }
    }
}

/// Where the generated header for `source` is written: `<name>.fmt.h` next
/// to a `.fmt` source, or the source file itself for anything else.
#[must_use]
pub fn target_path(source: &Path) -> PathBuf {
    if source.extension().and_then(|e| e.to_str()) == Some("fmt") {
        source.with_extension("fmt.h")
    } else {
        source.to_path_buf()
    }
}

fn render_body(lines: &[String], defines: &[(String, i64)]) -> String {
    let mut body = lines.join("\n");
    if !lines.is_empty() {
        body.push('\n');
    }
    if !defines.is_empty() {
        body.push('\n');
        for (name, number) in defines {
            body.push_str(&format!("#define {name} {number}\n"));
        }
    }
    body
}

/// Render and write one file's generated header (spec.md §4.2.1), honoring
/// `-back`/`keep_backup` and `-purge`/`purge_defines`. Returns whether the
/// on-disk file actually changed.
pub fn write_header(header: &FileHeader, keep_backup: bool, purge_defines: bool) -> io::Result<bool> {
    let is_fmt = header.source_path.extension().and_then(|e| e.to_str()) == Some("fmt");
    let empty = Vec::new();
    let defines = if purge_defines { &empty } else { &header.defines };
    let body = render_body(&header.lines, defines);
    let content = if is_fmt {
        let guard = include_guard(&header.source_path);
        wrap_with_guard(&guard, &body)
    } else {
        body
    };
    let target = target_path(&header.source_path);
    replace_if_different(&target, &content, keep_backup)
}

/// Derive an include-guard token from a `.fmt` file's path.
#[must_use]
pub fn include_guard(fmt_path: &Path) -> String {
    let stem = fmt_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("FORMAT");
    let mut guard: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    guard.push_str("_H");
    guard
}

/// Wrap `body` in an include guard for files whose path ends in `.fmt`; the
/// header is emitted as `<path>.h`.
#[must_use]
pub fn wrap_with_guard(guard: &str, body: &str) -> String {
    format!("#ifndef {guard}\n#define {guard}\n\n{body}\n#endif /* {guard} */\n")
}

/// Write `new_content` to `target`, skipping the write if it is
/// byte-identical to what's already there, and honoring `keep_backup` by
/// renaming the previous file to `.bak` first.
pub fn replace_if_different(target: &Path, new_content: &str, keep_backup: bool) -> io::Result<bool> {
    if let Ok(existing) = fs::read_to_string(target) {
        if existing == new_content {
            return Ok(false);
        }
    }
    if keep_backup && target.exists() {
        let backup = target.with_extension(format!(
            "{}.bak",
            target.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));
        fs::rename(target, backup)?;
    }
    let work_path = target.with_extension("work");
    fs::write(&work_path, new_content)?;
    if target.exists() && !keep_backup {
        fs::remove_file(target)?;
    }
    fs::rename(&work_path, target)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn include_guard_is_uppercase_and_sanitized() {
        let guard = include_guard(&PathBuf::from("sensors-v2.fmt"));
        assert_eq!(guard, "SENSORS_V2_H");
    }

    #[test]
    fn skip_rewrite_when_identical() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.fmt.h");
        fs::write(&target, "same").unwrap();
        let changed = replace_if_different(&target, "same", false).unwrap();
        assert!(!changed);
    }

    #[test]
    fn rewrite_when_different() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.fmt.h");
        fs::write(&target, "old").unwrap();
        let changed = replace_if_different(&target, "new", false).unwrap();
        assert!(changed);
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn write_header_emits_guard_and_defines() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("sensors.fmt");
        let mut header = FileHeader::new(source);
        header.lines.push("// MSG0_PING".to_string());
        header.defines.push(("PING".to_string(), 3));
        let changed = write_header(&header, false, false).unwrap();
        assert!(changed);
        let written = fs::read_to_string(dir.path().join("sensors.fmt.h")).unwrap();
        assert!(written.starts_with("#ifndef SENSORS_H"));
        assert!(written.contains("// MSG0_PING"));
        assert!(written.contains("#define PING 3"));
    }

    #[test]
    fn write_header_purges_defines() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("sensors.fmt");
        let mut header = FileHeader::new(source);
        header.lines.push("// MSG0_PING".to_string());
        header.defines.push(("PING".to_string(), 3));
        write_header(&header, false, true).unwrap();
        let written = fs::read_to_string(dir.path().join("sensors.fmt.h")).unwrap();
        assert!(!written.contains("#define"));
    }

    #[test]
    fn write_header_replaces_non_fmt_source_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("shared.h");
        fs::write(&source, "stale").unwrap();
        let mut header = FileHeader::new(source.clone());
        header.lines.push("// FILTER(F_ADC,\"adc\")".to_string());
        header.defines.push(("F_ADC".to_string(), 0));
        write_header(&header, false, false).unwrap();
        let written = fs::read_to_string(&source).unwrap();
        assert!(!written.contains("#ifndef"));
        assert!(written.contains("#define F_ADC 0"));
    }
}
