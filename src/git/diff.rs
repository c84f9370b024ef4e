//! git::diff
//!
//! Size-bounded parsing of unified diffs produced by `git diff`.
//!
//! The parser is fed one line at a time so the caller can stop reading the
//! toolchain's output as soon as the file bound is reached. Hitting any
//! bound flags the result incomplete; it is never an error.
//!
//! # Bounds
//!
//! - `max_files`: files beyond this count are dropped and the diff is
//!   flagged incomplete
//! - `max_lines`: per file; further hunk lines of that file are dropped
//! - `max_line_chars`: a longer line marks its file incomplete and is dropped
//!
//! # Example
//!
//! ```
//! use hostgit::git::diff::{parse_diff, DiffLimits, FileStatus};
//!
//! let text = "\
//! diff --git a/a.txt b/a.txt
//! index 1111111..2222222 100644
//! --- a/a.txt
//! +++ b/a.txt
//! @@ -1 +1 @@
//! -old
//! +new
//! ";
//! let diff = parse_diff(text, DiffLimits::default());
//! assert_eq!(diff.files.len(), 1);
//! assert_eq!(diff.files[0].status, FileStatus::Modified);
//! assert_eq!((diff.total_additions, diff.total_deletions), (1, 1));
//! assert!(!diff.is_incomplete);
//! ```

use serde::Serialize;

/// Bounds applied while parsing a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffLimits {
    pub max_files: usize,
    pub max_lines: usize,
    pub max_line_chars: usize,
}

impl Default for DiffLimits {
    fn default() -> Self {
        Self {
            max_files: 100,
            max_lines: 1000,
            max_line_chars: 2000,
        }
    }
}

/// How a file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// Kind of a single diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Context,
    Added,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
    /// Line number in the old file (context and deleted lines)
    pub old_line: Option<u32>,
    /// Line number in the new file (context and added lines)
    pub new_line: Option<u32>,
}

/// One `@@` hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSection {
    pub header: String,
    pub lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffFile {
    pub name: String,
    /// Previous name for renames, otherwise equal to `name`
    pub old_name: String,
    pub status: FileStatus,
    pub additions: usize,
    pub deletions: usize,
    pub is_binary: bool,
    pub is_incomplete: bool,
    pub sections: Vec<DiffSection>,
}

impl DiffFile {
    fn new(old_name: String, name: String) -> Self {
        Self {
            name,
            old_name,
            status: FileStatus::Modified,
            additions: 0,
            deletions: 0,
            is_binary: false,
            is_incomplete: false,
            sections: Vec::new(),
        }
    }

    fn line_count(&self) -> usize {
        self.sections.iter().map(|s| s.lines.len()).sum()
    }
}

/// A parsed, possibly truncated diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub files: Vec<DiffFile>,
    pub total_additions: usize,
    pub total_deletions: usize,
    pub is_incomplete: bool,
}

impl Diff {
    pub fn num_files(&self) -> usize {
        self.files.len()
    }
}

/// Incremental unified-diff parser.
#[derive(Debug)]
pub struct DiffParser {
    limits: DiffLimits,
    diff: Diff,
    current: Option<DiffFile>,
    in_header: bool,
    old_line: u32,
    new_line: u32,
    full: bool,
}

impl DiffParser {
    pub fn new(limits: DiffLimits) -> Self {
        Self {
            limits,
            diff: Diff::default(),
            current: None,
            in_header: false,
            old_line: 0,
            new_line: 0,
            full: false,
        }
    }

    /// Feed one line (without its trailing newline).
    ///
    /// Returns `false` once the file bound is reached; further input is
    /// ignored and the caller may stop reading.
    pub fn feed(&mut self, line: &str) -> bool {
        if self.full {
            return false;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            self.finish_file();
            if self.diff.files.len() >= self.limits.max_files {
                self.diff.is_incomplete = true;
                self.full = true;
                return false;
            }
            let (old_name, name) = split_git_header(rest);
            self.current = Some(DiffFile::new(old_name, name));
            self.in_header = true;
            return true;
        }

        let Some(file) = self.current.as_mut() else {
            return true;
        };

        if self.in_header {
            if line.starts_with("new file mode") {
                file.status = FileStatus::Added;
            } else if line.starts_with("deleted file mode") {
                file.status = FileStatus::Deleted;
            } else if let Some(from) = line.strip_prefix("rename from ") {
                file.status = FileStatus::Renamed;
                file.old_name = unquote(from);
            } else if let Some(to) = line.strip_prefix("rename to ") {
                file.status = FileStatus::Renamed;
                file.name = unquote(to);
            } else if line.starts_with("Binary files ") || line == "GIT binary patch" {
                file.is_binary = true;
            } else if let Some(to) = line.strip_prefix("+++ ") {
                if let Some(name) = unquote(to).strip_prefix("b/") {
                    file.name = name.to_string();
                }
            } else if line.starts_with("@@") {
                self.in_header = false;
                self.start_section(line);
            }
            return true;
        }

        if line.starts_with("@@") {
            self.start_section(line);
            return true;
        }

        let (kind, content) = match line.as_bytes().first() {
            Some(b'+') => (LineKind::Added, &line[1..]),
            Some(b'-') => (LineKind::Deleted, &line[1..]),
            Some(b' ') => (LineKind::Context, &line[1..]),
            Some(b'\\') => return true,
            _ => (LineKind::Context, line),
        };

        match kind {
            LineKind::Added => file.additions += 1,
            LineKind::Deleted => file.deletions += 1,
            LineKind::Context => {}
        }

        let (old_line, new_line) = match kind {
            LineKind::Added => {
                self.new_line += 1;
                (None, Some(self.new_line))
            }
            LineKind::Deleted => {
                self.old_line += 1;
                (Some(self.old_line), None)
            }
            LineKind::Context => {
                self.old_line += 1;
                self.new_line += 1;
                (Some(self.old_line), Some(self.new_line))
            }
        };

        if file.is_incomplete {
            return true;
        }
        if content.chars().count() > self.limits.max_line_chars
            || file.line_count() >= self.limits.max_lines
        {
            file.is_incomplete = true;
            return true;
        }

        if let Some(section) = file.sections.last_mut() {
            section.lines.push(DiffLine {
                kind,
                content: content.to_string(),
                old_line,
                new_line,
            });
        }
        true
    }

    fn start_section(&mut self, header: &str) {
        let (old_start, new_start) = parse_hunk_header(header);
        self.old_line = old_start.saturating_sub(1);
        self.new_line = new_start.saturating_sub(1);
        if let Some(file) = self.current.as_mut() {
            file.sections.push(DiffSection {
                header: header.to_string(),
                lines: Vec::new(),
            });
        }
    }

    fn finish_file(&mut self) {
        if let Some(file) = self.current.take() {
            self.diff.total_additions += file.additions;
            self.diff.total_deletions += file.deletions;
            if file.is_incomplete {
                self.diff.is_incomplete = true;
            }
            self.diff.files.push(file);
        }
    }

    /// Mark the diff incomplete, e.g. when the toolchain was cut off.
    pub fn truncate(&mut self) {
        self.diff.is_incomplete = true;
        self.full = true;
    }

    pub fn finish(mut self) -> Diff {
        self.finish_file();
        self.diff
    }
}

/// Parse a complete diff text.
pub fn parse_diff(text: &str, limits: DiffLimits) -> Diff {
    let mut parser = DiffParser::new(limits);
    for line in text.lines() {
        if !parser.feed(line) {
            break;
        }
    }
    parser.finish()
}

/// Split `a/<old> b/<new>` from a `diff --git` header.
fn split_git_header(rest: &str) -> (String, String) {
    // Unrenamed files repeat the same name, so try the exact midpoint first.
    if rest.len() % 2 == 1 {
        let mid = rest.len() / 2;
        if rest.is_char_boundary(mid) && rest.is_char_boundary(mid + 1) {
            let (left, right) = (&rest[..mid], &rest[mid + 1..]);
            if let (Some(old), Some(new)) = (left.strip_prefix("a/"), right.strip_prefix("b/")) {
                if old == new {
                    return (old.to_string(), new.to_string());
                }
            }
        }
    }

    match rest.find(" b/") {
        Some(idx) => {
            let old = rest[..idx].trim_start_matches("a/");
            let new = &rest[idx + 3..];
            (unquote(old), unquote(new))
        }
        None => (unquote(rest), unquote(rest)),
    }
}

fn unquote(name: &str) -> String {
    let name = name.trim_end_matches('\t');
    match name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => name.to_string(),
    }
}

/// Parse the starting line numbers from `@@ -a,b +c,d @@`.
fn parse_hunk_header(header: &str) -> (u32, u32) {
    let mut old_start = 0;
    let mut new_start = 0;
    for token in header.split_whitespace().skip(1).take(2) {
        let number = |t: &str| {
            t.split(',')
                .next()
                .and_then(|n| n.parse::<u32>().ok())
                .unwrap_or(0)
        };
        if let Some(old) = token.strip_prefix('-') {
            old_start = number(old);
        } else if let Some(new) = token.strip_prefix('+') {
            new_start = number(new);
        }
    }
    (old_start, new_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "\
diff --git a/added.txt b/added.txt
new file mode 100644
index 0000000..3b18e51
--- /dev/null
+++ b/added.txt
@@ -0,0 +1,2 @@
+hello
+world
diff --git a/gone.txt b/gone.txt
deleted file mode 100644
index 3b18e51..0000000
--- a/gone.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
";

    #[test]
    fn statuses_and_totals() {
        let diff = parse_diff(TWO_FILES, DiffLimits::default());
        assert_eq!(diff.num_files(), 2);
        assert_eq!(diff.files[0].name, "added.txt");
        assert_eq!(diff.files[0].status, FileStatus::Added);
        assert_eq!(diff.files[1].status, FileStatus::Deleted);
        assert_eq!(diff.total_additions, 2);
        assert_eq!(diff.total_deletions, 1);
    }

    #[test]
    fn line_numbers_follow_hunk_header() {
        let text = "\
diff --git a/f b/f
--- a/f
+++ b/f
@@ -10,3 +10,3 @@ fn main
 keep
-old
+new
";
        let diff = parse_diff(text, DiffLimits::default());
        let lines = &diff.files[0].sections[0].lines;
        assert_eq!(lines[0].old_line, Some(10));
        assert_eq!(lines[0].new_line, Some(10));
        assert_eq!(lines[1].old_line, Some(11));
        assert_eq!(lines[2].new_line, Some(11));
    }

    #[test]
    fn rename_detected() {
        let text = "\
diff --git a/old name.txt b/new name.txt
similarity index 100%
rename from old name.txt
rename to new name.txt
";
        let diff = parse_diff(text, DiffLimits::default());
        let file = &diff.files[0];
        assert_eq!(file.status, FileStatus::Renamed);
        assert_eq!(file.old_name, "old name.txt");
        assert_eq!(file.name, "new name.txt");
    }

    #[test]
    fn binary_detected() {
        let text = "\
diff --git a/img.png b/img.png
index 1111111..2222222 100644
Binary files a/img.png and b/img.png differ
";
        let diff = parse_diff(text, DiffLimits::default());
        assert!(diff.files[0].is_binary);
    }

    #[test]
    fn content_lines_starting_with_dashes_are_not_headers() {
        let text = "\
diff --git a/f b/f
--- a/f
+++ b/f
@@ -1 +1 @@
---- old rule
++++ new rule
";
        let diff = parse_diff(text, DiffLimits::default());
        assert_eq!(diff.files[0].deletions, 1);
        assert_eq!(diff.files[0].additions, 1);
        assert_eq!(diff.files[0].sections[0].lines[0].content, "--- old rule");
    }

    #[test]
    fn file_bound_flags_incomplete() {
        let limits = DiffLimits {
            max_files: 1,
            ..Default::default()
        };
        let diff = parse_diff(TWO_FILES, limits);
        assert_eq!(diff.num_files(), 1);
        assert!(diff.is_incomplete);
    }

    #[test]
    fn line_bound_flags_file_incomplete() {
        let limits = DiffLimits {
            max_lines: 1,
            ..Default::default()
        };
        let diff = parse_diff(TWO_FILES, limits);
        assert!(diff.files[0].is_incomplete);
        assert_eq!(diff.files[0].line_count(), 1);
        assert_eq!(diff.files[0].additions, 2);
        assert!(diff.is_incomplete);
    }

    #[test]
    fn long_line_flags_file_incomplete() {
        let limits = DiffLimits {
            max_line_chars: 3,
            ..Default::default()
        };
        let diff = parse_diff(TWO_FILES, limits);
        assert!(diff.files[0].is_incomplete);
        assert!(diff.is_incomplete);
    }

    #[test]
    fn empty_input() {
        let diff = parse_diff("", DiffLimits::default());
        assert!(diff.files.is_empty());
        assert!(!diff.is_incomplete);
    }
}
