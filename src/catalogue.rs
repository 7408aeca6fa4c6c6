//! `Messages.txt` catalogue loader (spec.md §6, §10): exactly
//! `TOTAL_MESSAGES` lines, the N-th line holding the template for internal
//! message code N. Decoupling the English text from the binary keeps the
//! catalogue swappable without touching this crate.

use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    lines: Vec<String>,
}

impl Catalogue {
    /// Load the catalogue from alongside the executable; a missing file is
    /// tolerated by falling back to numeric codes (no localized text).
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let lines = fs::read_to_string(path)
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default();
        Self { lines }
    }

    #[must_use]
    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.lines.get(code as usize).map(String::as_str)
    }

    #[must_use]
    pub fn describe(&self, code: u32) -> String {
        self.lookup(code)
            .map(str::to_string)
            .unwrap_or_else(|| format!("error {code}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lookup_returns_nth_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Messages.txt");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "zero").unwrap();
        writeln!(f, "one").unwrap();
        let cat = Catalogue::load(&path);
        assert_eq!(cat.lookup(1), Some("one"));
    }

    #[test]
    fn missing_file_falls_back_to_numeric_code() {
        let cat = Catalogue::load(Path::new("/nonexistent/Messages.txt"));
        assert_eq!(cat.describe(42), "error 42");
    }
}
