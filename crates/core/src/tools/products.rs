use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use super::{Candidate, CandidateSource};
use crate::config::SymbolicateConfig;

/// Walks build-output roots for products matching a set of path patterns.
///
/// Pattern components are matched one directory level at a time; `*` inside a
/// component matches any run of characters.
#[derive(Debug, Clone)]
pub struct BuildProductsSearch {
    roots: Vec<PathBuf>,
    patterns: Vec<String>,
}

impl BuildProductsSearch {
    pub fn new(roots: Vec<PathBuf>, patterns: Vec<String>) -> Self {
        Self { roots, patterns }
    }

    pub fn from_config(config: &SymbolicateConfig) -> Self {
        Self::new(config.search_roots.clone(), config.expanded_patterns())
    }
}

impl CandidateSource for BuildProductsSearch {
    fn candidates(&self) -> Vec<Candidate> {
        let mut found: Vec<Candidate> = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                debug!(root = %root.display(), "search root missing, skipping");
                continue;
            }
            for pattern in &self.patterns {
                let components: Vec<&str> =
                    pattern.split('/').filter(|c| !c.is_empty()).collect();
                for path in expand(root, &components) {
                    if found.iter().any(|c| c.path == path) {
                        continue;
                    }
                    let modified = fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .unwrap_or(SystemTime::UNIX_EPOCH);
                    found.push(Candidate { path, modified });
                }
            }
        }
        sort_newest_first(&mut found);
        found
    }
}

/// Most recent first; ties broken by path so the order is stable.
pub fn sort_newest_first(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
}

fn expand(base: &Path, components: &[&str]) -> Vec<PathBuf> {
    let Some((head, rest)) = components.split_first() else {
        return if base.exists() { vec![base.to_path_buf()] } else { Vec::new() };
    };

    if !head.contains('*') {
        let next = base.join(head);
        return if next.exists() { expand(&next, rest) } else { Vec::new() };
    }

    let Ok(entries) = fs::read_dir(base) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| wildcard_match(head, name))
        .collect();
    names.sort();
    names.iter().flat_map(|name| expand(&base.join(name), rest)).collect()
}

/// Match `name` against `pattern`, where `*` matches any (possibly empty) run.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }
    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !name.starts_with(first) || name.len() < first.len() + last.len() {
        return false;
    }
    let mut rest = &name[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
