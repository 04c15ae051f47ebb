// Structured view of `git remote -v` output.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDirection {
    Fetch,
    Push,
}

/// One line of `git remote -v`: `<name>\t<url> (fetch|push)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub url: String,
    pub direction: RemoteDirection,
}

/// Parse the listing into entries. Lines that do not have the expected shape
/// are skipped.
pub fn parse_remote_listing(listing: &str) -> Vec<RemoteEntry> {
    listing.lines().filter_map(parse_remote_line).collect()
}

fn parse_remote_line(line: &str) -> Option<RemoteEntry> {
    let line = line.trim();
    let (name, rest) = line.split_once(|c: char| c.is_whitespace())?;
    let rest = rest.trim();
    let (url, direction) = match rest.rsplit_once(|c: char| c.is_whitespace()) {
        Some((url, "(fetch)")) => (url.trim(), RemoteDirection::Fetch),
        Some((url, "(push)")) => (url.trim(), RemoteDirection::Push),
        _ => return None,
    };
    if name.is_empty() || url.is_empty() {
        return None;
    }
    Some(RemoteEntry { name: name.to_string(), url: url.to_string(), direction })
}

/// What the remote configuration looks like for one remote name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Missing,
    Matches,
    Mismatched { urls: Vec<String> },
}

/// Compare every entry for `name` against `expected_url` by exact equality.
pub fn remote_status(entries: &[RemoteEntry], name: &str, expected_url: &str) -> RemoteStatus {
    let mut urls: Vec<String> = Vec::new();
    for entry in entries.iter().filter(|entry| entry.name == name) {
        if !urls.contains(&entry.url) {
            urls.push(entry.url.clone());
        }
    }

    if urls.is_empty() {
        RemoteStatus::Missing
    } else if urls.iter().all(|url| url == expected_url) {
        RemoteStatus::Matches
    } else {
        RemoteStatus::Mismatched { urls }
    }
}

/// Repository name derived from the working directory's base name.
pub fn repo_name(repo_path: &Path) -> Option<String> {
    repo_path.file_name().map(|name| name.to_string_lossy().into_owned())
}

/// `<base-url><repo-name>.git`. The base URL is used verbatim, so it should
/// carry its own trailing separator.
pub fn expected_remote_url(base_url: &str, repo_name: &str) -> String {
    format!("{base_url}{repo_name}.git")
}
