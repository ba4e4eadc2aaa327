// src/step/sources.rs

//! Fresh glob evaluation for step inputs.
//!
//! Each pattern is split into a literal base directory and a glob remainder
//! (`assets/images/**/*.png` -> `assets/images` + `**/*.png`). Only the base
//! is walked, and matched files keep their path relative to that base, so
//! `assets/images/icons/a.png` lands at `<dest>/icons/a.png`.
//!
//! Patterns starting with `!` exclude files matched by earlier patterns.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;
use crate::watch::path_utils::relative_str;

/// A file selected by a [`SourceSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path as handed to the filesystem (root joined with the pattern).
    pub abs: PathBuf,
    /// Path relative to the base directory of the pattern that matched it.
    pub rel: PathBuf,
}

#[derive(Debug, Clone)]
struct SourcePattern {
    base: PathBuf,
    matcher: GlobMatcher,
    /// `None` when the remainder contains `**`.
    max_depth: Option<usize>,
}

/// Compiled include/exclude globs for one step.
#[derive(Debug, Clone)]
pub struct SourceSet {
    raw: Vec<String>,
    includes: Vec<SourcePattern>,
    excludes: Option<GlobSet>,
}

/// Compile a glob where `*` does not cross directory separators.
pub fn compile_glob(pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

/// Strip a leading `./` so patterns line up with root-relative paths.
pub fn normalize_pattern(pattern: &str) -> &str {
    let mut p = pattern.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Split a pattern into `(base dir, glob remainder)`.
fn split_base(pattern: &str) -> (PathBuf, String) {
    let parts: Vec<&str> = pattern.split('/').collect();
    let first_meta = parts.iter().position(|p| has_glob_meta(p));

    let split_at = match first_meta {
        Some(idx) => idx,
        // Plain file path: the base is its parent directory.
        None => parts.len().saturating_sub(1),
    };

    // Joining the raw parts keeps the leading `/` of an absolute pattern.
    let base = match parts[..split_at].join("/") {
        b if b.is_empty() && pattern.starts_with('/') => PathBuf::from("/"),
        b => PathBuf::from(b),
    };
    let rest = parts[split_at..].join("/");
    (base, rest)
}

impl SourceSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut includes = Vec::new();
        let mut excludes = GlobSetBuilder::new();
        let mut has_excludes = false;

        for raw in patterns {
            if let Some(negated) = raw.trim().strip_prefix('!') {
                excludes.add(compile_glob(normalize_pattern(negated))?);
                has_excludes = true;
                continue;
            }

            let pattern = normalize_pattern(raw);
            let (base, rest) = split_base(pattern);
            let max_depth = if rest.contains("**") {
                None
            } else {
                Some(rest.split('/').count())
            };

            includes.push(SourcePattern {
                base,
                matcher: compile_glob(&rest)?.compile_matcher(),
                max_depth,
            });
        }

        let excludes = if has_excludes {
            Some(excludes.build().context("building exclude globset")?)
        } else {
            None
        };

        Ok(Self {
            raw: patterns.to_vec(),
            includes,
            excludes,
        })
    }

    /// The patterns as configured, for error messages.
    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    /// Walk the filesystem and return every matching file.
    ///
    /// Order follows pattern order, then path order within a pattern; a file
    /// matched by several patterns appears once.
    pub fn collect(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<SourceFile>> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut out = Vec::new();

        for pattern in &self.includes {
            let dir = join_base(root, &pattern.base);
            if !fs.is_dir(&dir) {
                continue;
            }

            let mut matched = Vec::new();
            let mut stack = vec![(dir.clone(), 0usize)];

            while let Some((current, depth)) = stack.pop() {
                for path in fs.read_dir(&current)? {
                    if fs.is_dir(&path) {
                        if pattern.max_depth.is_none_or(|max| depth + 1 < max) {
                            stack.push((path, depth + 1));
                        }
                        continue;
                    }
                    if !fs.is_file(&path) {
                        continue;
                    }
                    let Ok(rel) = path.strip_prefix(&dir) else {
                        continue;
                    };
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if !pattern.matcher.is_match(&rel_str) {
                        continue;
                    }
                    if self.is_excluded(root, &path) {
                        continue;
                    }
                    matched.push(SourceFile {
                        abs: path.clone(),
                        rel: rel.to_path_buf(),
                    });
                }
            }

            matched.sort_by(|a, b| a.rel.cmp(&b.rel));
            for file in matched {
                if seen.insert(file.abs.clone()) {
                    out.push(file);
                }
            }
        }

        Ok(out)
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let Some(excludes) = &self.excludes else {
            return false;
        };
        match relative_str(root, path) {
            Some(rel) => excludes.is_match(rel),
            // Outside the root: absolute exclude patterns still apply.
            None => excludes.is_match(path.to_string_lossy().replace('\\', "/")),
        }
    }
}

/// `root.join(base)` without producing a trailing separator for an empty base.
pub fn join_base(root: &Path, base: &Path) -> PathBuf {
    if base.as_os_str().is_empty() || base.components().all(|c| c == Component::CurDir) {
        root.to_path_buf()
    } else {
        root.join(base)
    }
}
