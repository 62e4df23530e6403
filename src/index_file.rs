//! Pre-built index persistence: `<dir>/<domain>.json`, the layout served
//! under a configured `index_url`.

use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::FragmentIndex;

/// File name of a domain's index.
pub fn file_name(domain: &str) -> String {
    return format!("{domain}.json");
}

/// Serialize to pretty JSON with a trailing newline.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn serialize(index: &FragmentIndex) -> Result<String, Error> {
    let mut content = serde_json::to_string_pretty(index)?;
    content.push('\n');
    return Ok(content);
}

/// Write a domain's index into `dir`, creating the directory if needed.
/// Returns the path written.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails,
/// or `Error::Io` if the directory or file cannot be written.
pub fn write(dir: &Path, domain: &str, index: &FragmentIndex) -> Result<PathBuf, Error> {
    let content = serialize(index)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name(domain));
    std::fs::write(&path, content)?;
    log::info!("wrote {} fragments to {}", index.len(), path.display());
    return Ok(path);
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::parser::parse_prebuilt;
    use crate::types::Reference;

    fn index() -> FragmentIndex {
        let mut index = FragmentIndex::default();
        index.push("sec-foo", Reference::new("https://a.org/#sec-foo", "dom/Foo.cpp", 4).unwrap());
        index.push("sec-foo", Reference::new("https://a.org/#sec-foo", "dom/test_foo.html", 1).unwrap());
        index.push("intro", Reference::new("https://a.org/#intro", "README", 2).unwrap());
        index
    }

    #[test]
    fn written_file_reads_back_as_prebuilt_index() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir.path().join("nested"), "a.org", &index()).unwrap();
        assert!(path.ends_with("nested/a.org.json"));

        let content = std::fs::read_to_string(&path).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parse_prebuilt(&payload).unwrap(), index());
    }

    #[test]
    fn records_use_prebuilt_field_names() {
        let content = serialize(&index()).unwrap();
        assert!(content.ends_with("}\n"));
        let payload: serde_json::Value = serde_json::from_str(&content).unwrap();
        let first = &payload["sec-foo"][0];
        assert_eq!(first["filepath"], "dom/Foo.cpp");
        assert_eq!(first["line_number"], 4);
        assert_eq!(first["url"], "https://a.org/#sec-foo");
    }

    #[test]
    fn target_that_is_a_file_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        assert!(matches!(write(&blocker, "a.org", &index()), Err(Error::Io(_))));
    }
}
