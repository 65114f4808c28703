use crate::error::Result;
use ignore::Match;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

const TEST_MARKERS: &[&str] = &[
    ".test.",
    ".spec.",
    "_test.",
    "test_",
    "__tests__/",
    "tests/",
    ".stories.",
    "__mocks__/",
];

/// Heuristic for test, story and mock files.
pub fn is_test_path(path: &str) -> bool {
    TEST_MARKERS.iter().any(|marker| path.contains(marker))
}

/// Lowercased extension without the dot.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

/// Whether `path` has one of `file_types` (`"ts"` and `".ts"` are equivalent).
pub fn matches_file_type(path: &str, file_types: &[String]) -> bool {
    let Some(ext) = extension_of(path) else {
        return false;
    };
    file_types
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(&ext))
}

/// Repository-relative path with `/` separators.
///
/// Lexical only: `None` for paths outside `root` and for any path that still
/// carries `..`, a root or a drive prefix after stripping.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = if path.is_absolute() {
        path.strip_prefix(root).ok()?
    } else {
        path
    };
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

const DEFAULT_EXCLUDES: &[&str] = &[".git/"];

/// Decides which repository files are indexable: an extension allow-list plus
/// gitignore-syntax exclude patterns. The index store directory is always
/// excluded when it lives inside the root.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    matcher: Gitignore,
    extensions: BTreeSet<String>,
}

impl PathFilter {
    pub fn new(
        root: &Path,
        store_dir: &Path,
        exclude_patterns: &[String],
        extensions: &[String],
    ) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in DEFAULT_EXCLUDES {
            builder.add_line(None, pattern)?;
        }
        for pattern in exclude_patterns {
            builder.add_line(None, pattern)?;
        }
        if let Some(store) = relative_path(root, store_dir) {
            builder.add_line(None, &format!("/{store}/"))?;
        }
        let matcher = builder.build()?;

        Ok(Self {
            root: root.to_path_buf(),
            matcher,
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        })
    }

    /// Whether the relative path (or any parent directory) is excluded.
    pub fn is_excluded(&self, relative: &str, is_dir: bool) -> bool {
        matches!(
            self.matcher
                .matched_path_or_any_parents(self.root.join(relative), is_dir),
            Match::Ignore(_)
        )
    }

    pub fn has_allowed_extension(&self, relative: &str) -> bool {
        extension_of(relative).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// A file is indexable when its extension is allowed and it is not excluded.
    pub fn is_indexable(&self, relative: &str) -> bool {
        self.has_allowed_extension(relative) && !self.is_excluded(relative, false)
    }
}
