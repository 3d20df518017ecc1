use crate::SchemaError;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One `repository:tag` line of an image list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageEntry {
    pub repository: String,
    pub tag: String,
}

impl ImageEntry {
    /// The tag recorded in the catalog, `<repository>:<tag>`.
    pub fn repo_tag(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl fmt::Display for ImageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

impl FromStr for ImageEntry {
    type Err = SchemaError;

    /// Parses an entry outside any list context; errors report line 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_entry(s.trim(), 0)
    }
}

// A '/' after the last ':' means the colon belonged to a registry port.
fn parse_entry(line: &str, lineno: usize) -> Result<ImageEntry, SchemaError> {
    let invalid = || SchemaError::InvalidEntry {
        line: lineno,
        entry: line.to_owned(),
    };
    let (repository, tag) = line.rsplit_once(':').ok_or_else(invalid)?;
    if repository.is_empty() || tag.is_empty() || tag.contains('/') {
        return Err(invalid());
    }
    if repository.chars().any(char::is_whitespace) || tag.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(ImageEntry {
        repository: repository.to_owned(),
        tag: tag.to_owned(),
    })
}

/// Parse a newline-delimited image list.
///
/// Blank lines and `#` comments are skipped. Entries keep their input order.
pub fn parse_image_list(content: &str) -> Result<Vec<ImageEntry>, SchemaError> {
    let mut entries = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        entries.push(parse_entry(line, idx + 1)?);
    }
    Ok(entries)
}

pub fn read_image_list(path: &Path) -> Result<Vec<ImageEntry>, SchemaError> {
    let content = std::fs::read_to_string(path)?;
    parse_image_list(&content)
}
