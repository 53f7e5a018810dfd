//! Workspace text and file-name search.
//!
//! Content search shells out to `rg` (ripgrep) when it is on `PATH`, parsing
//! its `--json` match records so column positions and per-file size caps
//! come for free; when `rg` is unavailable an in-process scanner stands in,
//! skipping binary files and anything over the same size cap.
//!
//! File-name search is a fuzzy, in-order subsequence match over a cached
//! file listing: exact substrings rank above subsequence matches, and the
//! listing itself is refreshed at most once every ten seconds per root so a
//! burst of keystrokes in a "go to file" box doesn't re-walk the tree.

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use regex::RegexBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::errors::CoreError;

const DEFAULT_EXCLUDES: &[&str] = &["!.git", "!node_modules", "!dist", "!build", "!.next", "!coverage"];
const CONTENT_FILE_SIZE_CAP: u64 = 2 * 1024 * 1024;
const FILE_LIST_CACHE_TTL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RESULTS: usize = 500;
pub const MAX_MAX_RESULTS: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMatch {
    pub path: PathBuf,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatch {
    pub path: PathBuf,
    pub line_number: usize,
    pub line: String,
    pub column_start: usize,
    pub column_end: usize,
}

/// A capped result set: `truncated` is set whenever more matches existed
/// than were returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome<T> {
    pub matches: Vec<T>,
    pub truncated: bool,
}

#[derive(Debug, Default, Clone)]
pub struct ContentSearchOptions {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub is_regex: bool,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

/// Caches a workspace's enumerated file list for ten seconds, keyed by
/// workspace root, so repeated fuzzy file-name queries against the same
/// workspace don't re-walk (or re-exec `rg --files` against) the tree.
#[derive(Default)]
pub struct FileListCache {
    entries: Mutex<HashMap<PathBuf, (Instant, Vec<PathBuf>)>>,
}

impl FileListCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, root: &Path) -> Vec<PathBuf> {
        {
            let entries = self.entries.lock().expect("file list cache mutex poisoned");
            if let Some((fetched_at, files)) = entries.get(root) {
                if fetched_at.elapsed() < FILE_LIST_CACHE_TTL {
                    return files.clone();
                }
            }
        }
        let files = enumerate_files(root);
        self.entries
            .lock()
            .expect("file list cache mutex poisoned")
            .insert(root.to_path_buf(), (Instant::now(), files.clone()));
        files
    }
}

fn enumerate_files(root: &Path) -> Vec<PathBuf> {
    enumerate_files_with_ripgrep(root).unwrap_or_else(|| {
        default_walker(root, &[], &[])
            .build()
            .flatten()
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.path().to_path_buf())
            .collect()
    })
}

fn enumerate_files_with_ripgrep(root: &Path) -> Option<Vec<PathBuf>> {
    let mut cmd = Command::new("rg");
    cmd.arg("--files");
    for exclude in DEFAULT_EXCLUDES {
        cmd.arg("--glob").arg(exclude);
    }
    let output = cmd.arg(root).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Some(stdout.lines().map(PathBuf::from).collect())
}

fn default_walker(root: &Path, include_globs: &[String], exclude_globs: &[String]) -> WalkBuilder {
    let mut overrides = OverrideBuilder::new(root);
    for pattern in DEFAULT_EXCLUDES {
        overrides.add(pattern).expect("built-in exclude glob is valid");
    }
    for glob in exclude_globs {
        let _ = overrides.add(&format!("!{glob}"));
    }
    for glob in include_globs {
        let _ = overrides.add(glob);
    }
    let mut builder = WalkBuilder::new(root);
    if let Ok(built) = overrides.build() {
        builder.overrides(built);
    }
    builder
}

/// Fuzzy file-name search, ranked exact-substring first, then in-order
/// character subsequence, ties broken lexicographically.
pub fn search_files(cache: &FileListCache, root: &Path, query: &str, limit: usize) -> SearchOutcome<FileMatch> {
    if query.is_empty() || limit == 0 {
        return SearchOutcome { matches: Vec::new(), truncated: false };
    }
    let query_lower = query.to_lowercase();
    let mut matches: Vec<FileMatch> = cache
        .list(root)
        .into_iter()
        .filter_map(|path| {
            let candidate = path.to_string_lossy().to_lowercase();
            score_candidate(&candidate, &query_lower).map(|score| FileMatch { path, score })
        })
        .collect();
    matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    let truncated = matches.len() > limit;
    matches.truncate(limit);
    SearchOutcome { matches, truncated }
}

fn score_candidate(candidate: &str, query_lower: &str) -> Option<i64> {
    let len = candidate.chars().count() as i64;
    if let Some(byte_position) = candidate.find(query_lower) {
        let position = candidate[..byte_position].chars().count() as i64;
        return Some(10_000 - position * 10 - len.min(500));
    }
    let (first, last) = fuzzy_span(candidate, query_lower)?;
    let span = (last - first + 1) as i64;
    let gaps = span - query_lower.chars().count() as i64;
    Some(2_000 - span * 5 - gaps * 3 - len.min(500))
}

/// First and last matched character index for an in-order subsequence
/// match, or `None` if `query_lower` is not a subsequence of `candidate`.
fn fuzzy_span(candidate: &str, query_lower: &str) -> Option<(usize, usize)> {
    let chars: Vec<char> = candidate.chars().collect();
    let mut idx = 0;
    let mut first = None;
    let mut last = 0;
    for q in query_lower.chars() {
        let mut found = false;
        while idx < chars.len() {
            let c = chars[idx];
            idx += 1;
            if c == q {
                first.get_or_insert(idx - 1);
                last = idx - 1;
                found = true;
                break;
            }
        }
        if !found {
            return None;
        }
    }
    first.map(|first| (first, last))
}

/// Search file contents under `root` for `query`, preferring `rg --json`
/// and falling back to an in-process scanner. `max_results` is clamped to
/// `[1, MAX_MAX_RESULTS]`; callers pick the default.
pub fn search_content(root: &Path, query: &str, max_results: usize, options: &ContentSearchOptions) -> Result<SearchOutcome<ContentMatch>, CoreError> {
    let max_results = max_results.clamp(1, MAX_MAX_RESULTS);
    if query.is_empty() {
        return Ok(SearchOutcome { matches: Vec::new(), truncated: false });
    }
    if options.is_regex {
        RegexBuilder::new(query)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|e| CoreError::invalid_payload(format!("invalid regex: {e}")))?;
    }
    match search_content_with_ripgrep(root, query, max_results, options) {
        Some(outcome) => Ok(outcome),
        None => search_content_fallback(root, query, max_results, options),
    }
}

fn search_content_with_ripgrep(root: &Path, query: &str, max_results: usize, options: &ContentSearchOptions) -> Option<SearchOutcome<ContentMatch>> {
    let mut cmd = Command::new("rg");
    cmd.arg("--json").arg("--max-filesize").arg(CONTENT_FILE_SIZE_CAP.to_string());
    if !options.is_regex {
        cmd.arg("--fixed-strings");
    }
    if options.case_sensitive {
        cmd.arg("--case-sensitive");
    } else {
        cmd.arg("--ignore-case");
    }
    if options.whole_word {
        cmd.arg("--word-regexp");
    }
    for exclude in DEFAULT_EXCLUDES {
        cmd.arg("--glob").arg(exclude);
    }
    for glob in &options.include_globs {
        cmd.arg("--glob").arg(glob);
    }
    for glob in &options.exclude_globs {
        cmd.arg("--glob").arg(format!("!{glob}"));
    }
    cmd.arg("--").arg(query).arg(root);

    let output = cmd.output().ok()?;
    // rg exits 1 when there are simply no matches; only a missing binary or
    // a crashed process should fall through to the in-process scanner.
    if !output.status.success() && output.status.code() != Some(1) {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut matches = Vec::new();
    let mut truncated = false;
    'lines: for line in stdout.lines() {
        let Ok(record) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if record.get("type").and_then(|t| t.as_str()) != Some("match") {
            continue;
        }
        let data = &record["data"];
        let Some(path) = data["path"]["text"].as_str() else {
            continue;
        };
        let Some(line_number) = data["line_number"].as_u64() else {
            continue;
        };
        let line_text = data["lines"]["text"].as_str().unwrap_or("").trim_end_matches('\n').to_string();
        let submatches = data["submatches"].as_array().cloned().unwrap_or_default();
        for submatch in submatches {
            if matches.len() >= max_results {
                truncated = true;
                break 'lines;
            }
            let start = submatch["start"].as_u64().unwrap_or(0) as usize;
            let end = submatch["end"].as_u64().unwrap_or(0) as usize;
            matches.push(ContentMatch {
                path: PathBuf::from(path),
                line_number: line_number as usize,
                line: line_text.clone(),
                column_start: byte_to_char_offset(&line_text, start),
                column_end: byte_to_char_offset(&line_text, end),
            });
        }
    }
    Some(SearchOutcome { matches, truncated })
}

fn search_content_fallback(root: &Path, query: &str, max_results: usize, options: &ContentSearchOptions) -> Result<SearchOutcome<ContentMatch>, CoreError> {
    let regex = if options.is_regex {
        Some(
            RegexBuilder::new(query)
                .case_insensitive(!options.case_sensitive)
                .build()
                .map_err(|e| CoreError::invalid_payload(format!("invalid regex: {e}")))?,
        )
    } else {
        None
    };

    let mut matches = Vec::new();
    let mut truncated = false;
    'entries: for entry in default_walker(root, &options.include_globs, &options.exclude_globs).build().flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.len() > CONTENT_FILE_SIZE_CAP {
            continue;
        }
        let Ok(bytes) = std::fs::read(entry.path()) else {
            continue;
        };
        if bytes.contains(&0) {
            continue;
        }
        let Ok(contents) = String::from_utf8(bytes) else {
            continue;
        };
        for (idx, line) in contents.lines().enumerate() {
            let ranges = match &regex {
                Some(re) => re.find_iter(line).map(|m| (m.start(), m.end())).collect::<Vec<_>>(),
                None => find_plain_matches(line, query, options.case_sensitive, options.whole_word),
            };
            for (start, end) in ranges {
                if matches.len() >= max_results {
                    truncated = true;
                    break 'entries;
                }
                matches.push(ContentMatch {
                    path: entry.path().to_path_buf(),
                    line_number: idx + 1,
                    line: line.to_string(),
                    column_start: byte_to_char_offset(line, start),
                    column_end: byte_to_char_offset(line, end),
                });
            }
        }
    }
    Ok(SearchOutcome { matches, truncated })
}

fn find_plain_matches(line: &str, query: &str, case_sensitive: bool, whole_word: bool) -> Vec<(usize, usize)> {
    let haystack = if case_sensitive { line.to_string() } else { line.to_lowercase() };
    let needle = if case_sensitive { query.to_string() } else { query.to_lowercase() };
    if needle.is_empty() {
        return Vec::new();
    }
    let mut matches = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        let Some(pos) = haystack[start..].find(&needle) else { break };
        let match_start = start + pos;
        let match_end = match_start + needle.len();
        if !whole_word || is_word_boundary_match(&haystack, match_start, match_end) {
            matches.push((match_start, match_end));
        }
        start = match_end.max(match_start + 1);
    }
    matches
}

fn is_word_boundary_match(haystack: &str, start: usize, end: usize) -> bool {
    let before_ok = haystack[..start].chars().next_back().map(|c| !c.is_alphanumeric() && c != '_').unwrap_or(true);
    let after_ok = haystack[end..].chars().next().map(|c| !c.is_alphanumeric() && c != '_').unwrap_or(true);
    before_ok && after_ok
}

/// Convert a byte offset within `line` to a char offset, the way the
/// wire protocol reports column positions (UTF-8 prefix length).
fn byte_to_char_offset(line: &str, byte_offset: usize) -> usize {
    let clamped = byte_offset.min(line.len());
    match line.get(..clamped) {
        Some(prefix) => prefix.chars().count(),
        None => line.chars().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn options() -> ContentSearchOptions {
        ContentSearchOptions::default()
    }

    #[test]
    fn fallback_finds_a_substring_match_with_column_positions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {\n    let needle = 1;\n}\n").unwrap();
        let outcome = search_content_fallback(dir.path(), "needle", 10, &options()).unwrap();
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].line_number, 2);
        assert_eq!(outcome.matches[0].column_start, 8);
        assert_eq!(outcome.matches[0].column_end, 14);
        assert!(!outcome.truncated);
    }

    #[test]
    fn fallback_respects_whole_word() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "cat category cat\n").unwrap();
        let mut opts = options();
        opts.whole_word = true;
        let outcome = search_content_fallback(dir.path(), "cat", 10, &opts).unwrap();
        assert_eq!(outcome.matches.len(), 2);
    }

    #[test]
    fn fallback_skips_binary_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bin.dat"), [0u8, 1, 2, b'n', b'e', b'e', b'd', b'l', b'e']).unwrap();
        let outcome = search_content_fallback(dir.path(), "needle", 10, &options()).unwrap();
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn fallback_caps_results_and_sets_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let body = "needle\n".repeat(5);
        fs::write(dir.path().join("many.txt"), body).unwrap();
        let outcome = search_content_fallback(dir.path(), "needle", 2, &options()).unwrap();
        assert_eq!(outcome.matches.len(), 2);
        assert!(outcome.truncated);
    }

    #[test]
    fn invalid_regex_is_rejected_before_any_scan() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options();
        opts.is_regex = true;
        let err = search_content(dir.path(), "(", 10, &opts).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::InvalidPayload);
    }

    #[test]
    fn exact_substring_ranks_above_fuzzy_subsequence() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "").unwrap();
        fs::write(dir.path().join("src/my_avionics_init.rs"), "").unwrap();

        let cache = FileListCache::new();
        let outcome = search_files(&cache, dir.path(), "main.rs", 10);
        assert!(!outcome.matches.is_empty());
        assert!(outcome.matches[0].path.ends_with("main.rs"));
    }

    #[test]
    fn fuzzy_subsequence_requires_in_order_characters() {
        assert!(fuzzy_span("abc", "ac").is_some());
        assert!(fuzzy_span("abc", "cab").is_none());
    }

    #[test]
    fn file_search_caps_results_and_sets_truncated() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("match{i}.txt")), "").unwrap();
        }
        let cache = FileListCache::new();
        let outcome = search_files(&cache, dir.path(), "match", 2);
        assert_eq!(outcome.matches.len(), 2);
        assert!(outcome.truncated);
    }

    #[test]
    fn file_list_cache_reuses_the_listing_within_the_ttl() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.txt"), "").unwrap();
        let cache = FileListCache::new();
        let first = search_files(&cache, dir.path(), "one", 10);
        fs::write(dir.path().join("two.txt"), "").unwrap();
        let second = search_files(&cache, dir.path(), "two", 10);
        assert_eq!(first.matches.len(), 1);
        // `two.txt` was created after the listing was cached, so it isn't
        // visible yet — this is the expected staleness window, not a bug.
        assert!(second.matches.is_empty());
    }
}
