//! Best-effort help texts for metrics.
//!
//! Help texts are not carried in an archive. They can be supplied as a JSON
//! object mapping metric name to description. Absence of the database, a
//! database that fails to load, or a metric without an entry are all the
//! normal case, never an error.

use std::collections::HashMap;
use std::path::Path;

use ringlog::*;

pub trait HelpLookup {
    fn help_text(&self, metric: &str) -> Option<&str>;
}

#[derive(Default)]
pub struct HelpDb {
    inner: HashMap<String, String>,
}

impl HelpDb {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a help database, falling back to an empty one on any failure.
    pub fn load(path: &Path) -> Self {
        let inner = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok());

        match inner {
            Some(inner) => Self { inner },
            None => {
                debug!("no usable help database at {}", path.display());
                Self::default()
            }
        }
    }
}

impl HelpLookup for HelpDb {
    fn help_text(&self, metric: &str) -> Option<&str> {
        self.inner.get(metric).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn looks_up_loaded_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"network.in":"bytes received"}}"#).unwrap();

        let db = HelpDb::load(file.path());
        assert_eq!(db.help_text("network.in"), Some("bytes received"));
        assert_eq!(db.help_text("network.out"), None);
    }

    #[test]
    fn unreadable_database_is_empty_not_fatal() {
        let db = HelpDb::load(Path::new("/nonexistent/help.json"));
        assert_eq!(db.help_text("anything"), None);
    }

    #[test]
    fn malformed_database_is_empty_not_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let db = HelpDb::load(file.path());
        assert_eq!(db.help_text("anything"), None);
    }
}
