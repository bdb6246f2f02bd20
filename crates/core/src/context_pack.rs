//! Token-budgeted context bundle assembly.

use serde::{Deserialize, Serialize};

use crate::relevance::RelatedFile;
use crate::workspace::WorkspaceSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySnippet {
    pub path: String,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPack {
    pub target_files: Vec<TargetFile>,
    pub repo_summary: Option<RepoSummary>,
    pub dependency_snippets: Vec<DependencySnippet>,
    pub estimated_tokens: usize,
    /// Exact BPE token count of the rendered pack, if a [`TokenCounter`] was
    /// supplied to [`assemble_pack`]. Reporting only — selection always runs
    /// against `estimated_tokens`'s `chars/4` approximation.
    pub exact_tokens: Option<usize>,
    pub truncated: bool,
}

/// Approximate a token count as `chars / 4`, the convention used
/// throughout the budget-fitting logic below.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Pluggable exact token counter for reporting. Selection inside
/// [`assemble_pack`] always runs against [`estimate_tokens`]; a `TokenCounter`
/// only changes what [`ContextPack::exact_tokens`] reports, never which
/// files get selected.
pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

/// A real BPE tokenizer (`tiktoken-rs`'s `cl100k_base`, the encoding shared
/// by GPT-4-class and Claude-adjacent tokenizations) for exact reporting.
pub struct BpeTokenCounter(tiktoken_rs::CoreBPE);

impl BpeTokenCounter {
    /// Build a counter over the `cl100k_base` encoding. Returns `None` if the
    /// encoder's bundled rank table fails to load, which callers should
    /// treat as "exact reporting unavailable" rather than an error.
    pub fn cl100k_base() -> Option<Self> {
        tiktoken_rs::cl100k_base().ok().map(Self)
    }
}

impl TokenCounter for BpeTokenCounter {
    fn count(&self, text: &str) -> usize {
        self.0.encode_with_special_tokens(text).len()
    }
}

/// Render `summary` from aggregate workspace stats: file count, total
/// size, and the top five languages by file count.
pub fn build_repo_summary(summary: &WorkspaceSummary) -> RepoSummary {
    let mut languages: Vec<(&String, &usize)> = summary.languages.iter().collect();
    languages.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let mut text = format!(
        "{} files, {} bytes total\n",
        summary.file_count, summary.total_size_bytes
    );
    for (lang, count) in languages.into_iter().take(5) {
        text.push_str(&format!("  {lang}: {count}\n"));
    }
    RepoSummary { text }
}

/// Render an indented directory tree string from a flat, forward-slashed
/// file list.
pub fn build_structure_tree(paths: &[String]) -> String {
    let mut sorted: Vec<&String> = paths.iter().collect();
    sorted.sort();
    let mut out = String::new();
    for path in sorted {
        let depth = path.matches('/').count();
        out.push_str(&"  ".repeat(depth));
        out.push_str(path.rsplit('/').next().unwrap_or(path));
        out.push('\n');
    }
    out
}

/// Assemble a pack that does not exceed `budget_tokens` once rendered:
/// target files first (always included in full, even if they alone
/// exceed budget), then the repo summary, then dependency snippets in
/// relevance order until the budget would be exceeded. Selection always
/// runs against the `chars/4` approximation; `exact_counter`, if given,
/// only adds an exact count of the final rendered pack to
/// [`ContextPack::exact_tokens`] for reporting and never reorders or drops
/// anything that was already selected.
pub fn assemble_pack(
    target_files: Vec<TargetFile>,
    repo_summary: Option<RepoSummary>,
    related: &[RelatedFile],
    snippet_source: impl Fn(&str) -> Option<String>,
    budget_tokens: usize,
    exact_counter: Option<&dyn TokenCounter>,
) -> ContextPack {
    let mut pack = ContextPack {
        target_files,
        repo_summary: None,
        dependency_snippets: Vec::new(),
        estimated_tokens: 0,
        exact_tokens: None,
        truncated: false,
    };

    let mut used = pack
        .target_files
        .iter()
        .map(|f| estimate_tokens(&f.content))
        .sum::<usize>();

    if let Some(summary) = repo_summary {
        let cost = estimate_tokens(&summary.text);
        used += cost;
        pack.repo_summary = Some(summary);
    }

    for candidate in related {
        let Some(content) = snippet_source(&candidate.path) else {
            continue;
        };
        let cost = estimate_tokens(&content);
        if used + cost > budget_tokens {
            pack.truncated = true;
            continue;
        }
        used += cost;
        pack.dependency_snippets.push(DependencySnippet {
            path: candidate.path.clone(),
            content,
            reason: candidate.reasons.join(", "),
        });
    }

    pack.estimated_tokens = used;
    if let Some(counter) = exact_counter {
        pack.exact_tokens = Some(counter.count(&pack_to_text(&pack)));
    }
    pack
}

/// Render a pack into canonical text suitable as LLM input.
pub fn pack_to_text(pack: &ContextPack) -> String {
    let mut out = String::new();

    for file in &pack.target_files {
        out.push_str(&format!("# Target: {}\n```\n{}\n```\n\n", file.path, file.content));
    }

    if let Some(summary) = &pack.repo_summary {
        out.push_str("# Repository summary\n");
        out.push_str(&summary.text);
        out.push('\n');
    }

    if !pack.dependency_snippets.is_empty() {
        out.push_str("# Related files\n");
        for snippet in &pack.dependency_snippets {
            out.push_str(&format!(
                "## {} ({})\n```\n{}\n```\n\n",
                snippet.path, snippet.reason, snippet.content
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn estimate_tokens_divides_chars_by_four() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn assemble_pack_stops_before_budget_exhausted() {
        let targets = vec![TargetFile {
            path: "a.py".into(),
            content: "x".repeat(40),
        }];
        let related = vec![
            RelatedFile {
                path: "b.py".into(),
                score: 1.0,
                reasons: vec!["imports target".into()],
            },
            RelatedFile {
                path: "c.py".into(),
                score: 0.3,
                reasons: vec!["same directory".into()],
            },
        ];
        let pack = assemble_pack(targets, None, &related, |_| Some("y".repeat(40)), 15, None);
        assert_eq!(pack.dependency_snippets.len(), 1);
        assert!(pack.truncated);
    }

    #[test]
    fn assemble_pack_always_includes_target_files() {
        let targets = vec![TargetFile {
            path: "huge.py".into(),
            content: "z".repeat(400),
        }];
        let pack = assemble_pack(targets.clone(), None, &[], |_| None, 1, None);
        assert_eq!(pack.target_files, targets);
    }

    #[test]
    fn pack_to_text_includes_target_and_summary() {
        let pack = ContextPack {
            target_files: vec![TargetFile {
                path: "a.py".into(),
                content: "pass".into(),
            }],
            repo_summary: Some(RepoSummary {
                text: "1 file, 4 bytes".into(),
            }),
            dependency_snippets: vec![],
            estimated_tokens: 1,
            exact_tokens: None,
            truncated: false,
        };
        let text = pack_to_text(&pack);
        assert!(text.contains("a.py"));
        assert!(text.contains("Repository summary"));
    }

    #[test]
    fn assemble_pack_reports_exact_tokens_when_counter_supplied() {
        struct WordCounter;
        impl TokenCounter for WordCounter {
            fn count(&self, text: &str) -> usize {
                text.split_whitespace().count()
            }
        }
        let targets = vec![TargetFile {
            path: "a.py".into(),
            content: "one two three".into(),
        }];
        let pack = assemble_pack(targets, None, &[], |_| None, 1000, Some(&WordCounter));
        assert!(pack.exact_tokens.is_some());
    }

    #[test]
    fn build_repo_summary_lists_top_languages() {
        let mut languages = BTreeMap::new();
        languages.insert("python".to_string(), 10);
        languages.insert("rust".to_string(), 3);
        let summary = WorkspaceSummary {
            file_count: 13,
            total_size_bytes: 1000,
            languages,
            last_modified: None,
        };
        let rendered = build_repo_summary(&summary);
        assert!(rendered.text.contains("python: 10"));
    }
}
