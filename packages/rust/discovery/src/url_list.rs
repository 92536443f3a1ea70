//! The line-delimited URL list handed from `harvest` to `prepare`.

use std::collections::BTreeSet;
use std::path::Path;

use outreach_shared::{OutreachError, Result};
use tracing::info;

use crate::links::clean_url;

/// Clean, deduplicate and sort `urls`, then write one per line.
/// Returns the number of URLs written.
pub fn write_url_list(path: &Path, urls: &[String]) -> Result<usize> {
    let cleaned: BTreeSet<String> = urls.iter().filter_map(|u| clean_url(u)).collect();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| OutreachError::io(parent, e))?;
    }

    let mut content = String::new();
    for url in &cleaned {
        content.push_str(url);
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|e| OutreachError::io(path, e))?;

    info!(path = %path.display(), count = cleaned.len(), "saved cleaned URL list");
    Ok(cleaned.len())
}

/// Read a URL list: trimmed, non-empty lines in file order.
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OutreachError::validation(format!(
                "URL list '{}' not found; run `outreach harvest` first",
                path.display()
            ))
        } else {
            OutreachError::io(path, e)
        }
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_list_is_clean_sorted_and_unique() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        let urls = vec![
            "https://globex.com/?ref=taaft".to_string(),
            "https://acme.io/pricing#plans".to_string(),
            "https://globex.com/".to_string(),
            "garbage".to_string(),
        ];

        let written = write_url_list(&path, &urls).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "https://acme.io/pricing\nhttps://globex.com/\n"
        );

        assert_eq!(
            read_url_list(&path).unwrap(),
            vec!["https://acme.io/pricing", "https://globex.com/"]
        );
    }

    #[test]
    fn read_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        std::fs::write(&path, "\n  https://a.io/  \n\nhttps://b.io/\n").unwrap();
        assert_eq!(
            read_url_list(&path).unwrap(),
            vec!["https://a.io/", "https://b.io/"]
        );
    }

    #[test]
    fn missing_list_points_at_harvest() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_url_list(&dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("outreach harvest"));
    }
}
