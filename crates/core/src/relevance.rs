//! Four-factor additive relevance scoring.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const RECENCY_WINDOW_SECONDS: i64 = 24 * 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedFile {
    pub path: String,
    pub score: f64,
    pub reasons: Vec<String>,
}

fn import_graph_score(
    target: &str,
    candidate: &str,
    imports: &HashMap<String, Vec<String>>,
    importers: &HashMap<String, Vec<String>>,
) -> Option<(f64, String)> {
    let target_imports: HashSet<&str> = imports.get(target).map(|v| v.iter().map(String::as_str).collect()).unwrap_or_default();
    let candidate_imports: HashSet<&str> = imports.get(candidate).map(|v| v.iter().map(String::as_str).collect()).unwrap_or_default();

    if target_imports.contains(candidate) {
        return Some((1.0, "imported by target".to_string()));
    }
    if candidate_imports.contains(target) {
        return Some((0.8, "imports target".to_string()));
    }

    let target_importers: HashSet<&str> = importers.get(target).map(|v| v.iter().map(String::as_str).collect()).unwrap_or_default();
    for intermediate in target_imports.iter().chain(target_importers.iter()) {
        let intermediate_imports: HashSet<&str> =
            imports.get(*intermediate).map(|v| v.iter().map(String::as_str).collect()).unwrap_or_default();
        if intermediate_imports.contains(candidate) || candidate_imports.contains(*intermediate) {
            return Some((0.5, "two-hop import relation".to_string()));
        }
    }

    None
}

fn directory_distance(a: &str, b: &str) -> usize {
    let dir_a: Vec<&str> = Path::new(a).parent().map(|p| p.to_str().unwrap_or("")).unwrap_or("").split('/').filter(|s| !s.is_empty()).collect();
    let dir_b: Vec<&str> = Path::new(b).parent().map(|p| p.to_str().unwrap_or("")).unwrap_or("").split('/').filter(|s| !s.is_empty()).collect();

    let common = dir_a.iter().zip(dir_b.iter()).take_while(|(x, y)| x == y).count();
    (dir_a.len() - common) + (dir_b.len() - common)
}

fn directory_proximity_score(target: &str, candidate: &str) -> Option<(f64, String)> {
    match directory_distance(target, candidate) {
        0 => Some((0.3, "same directory".to_string())),
        1 => Some((0.2, "adjacent directory".to_string())),
        2 => Some((0.1, "nearby directory".to_string())),
        _ => None,
    }
}

fn stem(path: &str) -> &str {
    let basename = path.rsplit('/').next().unwrap_or(path);
    basename.rsplit_once('.').map(|(s, _)| s).unwrap_or(basename)
}

fn is_test_impl_mirror(a: &str, b: &str) -> bool {
    let strip_test = |s: &str| -> Option<String> {
        if let Some(rest) = s.strip_prefix("test_") {
            Some(rest.to_string())
        } else {
            s.strip_suffix("_test").map(str::to_string)
        }
    };
    match (strip_test(a), strip_test(b)) {
        (Some(base), None) => base == b,
        (None, Some(base)) => base == a,
        _ => false,
    }
}

fn name_similarity_score(target: &str, candidate: &str) -> Option<(f64, String)> {
    let target_stem = stem(target);
    let candidate_stem = stem(candidate);

    if is_test_impl_mirror(target_stem, candidate_stem) {
        return Some((0.4, "test/implementation pair".to_string()));
    }

    let shared_prefix = target_stem
        .chars()
        .zip(candidate_stem.chars())
        .take_while(|(a, b)| a == b)
        .count();
    if shared_prefix >= 4 {
        return Some((0.2, "shared name prefix".to_string()));
    }
    None
}

fn recency_score(target_mtime: Option<DateTime<Utc>>, candidate_mtime: Option<DateTime<Utc>>) -> Option<(f64, String)> {
    let (t, c) = (target_mtime?, candidate_mtime?);
    let delta = (t - c).num_seconds().abs();
    if delta > RECENCY_WINDOW_SECONDS {
        return None;
    }
    let fraction = 1.0 - (delta as f64 / RECENCY_WINDOW_SECONDS as f64);
    Some((0.3 * fraction, "recently modified together".to_string()))
}

/// Score every candidate in `all_files` against `target_path` across the
/// four factors, drop zero-scored entries, sort descending by score, and
/// trim to `max_results`.
#[allow(clippy::too_many_arguments)]
pub fn find_related(
    target_path: &str,
    all_files: &[String],
    imports: &HashMap<String, Vec<String>>,
    importers: &HashMap<String, Vec<String>>,
    mtimes: &HashMap<String, DateTime<Utc>>,
    max_results: usize,
) -> Vec<RelatedFile> {
    let mut results: Vec<RelatedFile> = Vec::new();

    for candidate in all_files {
        if candidate == target_path {
            continue;
        }

        let mut score = 0.0;
        let mut reasons = Vec::new();

        if let Some((s, reason)) = import_graph_score(target_path, candidate, imports, importers) {
            score += s;
            reasons.push(reason);
        }
        if let Some((s, reason)) = directory_proximity_score(target_path, candidate) {
            score += s;
            reasons.push(reason);
        }
        if let Some((s, reason)) = name_similarity_score(target_path, candidate) {
            score += s;
            reasons.push(reason);
        }
        if let Some((s, reason)) = recency_score(mtimes.get(target_path).copied(), mtimes.get(candidate).copied()) {
            score += s;
            reasons.push(reason);
        }

        if score > 0.0 {
            results.push(RelatedFile {
                path: candidate.clone(),
                score,
                reasons,
            });
        }
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(max_results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_import_outranks_two_hop() {
        let all = vec!["a.py".to_string(), "b.py".to_string(), "c.py".to_string()];
        let mut imports = HashMap::new();
        imports.insert("a.py".to_string(), vec!["b.py".to_string()]);
        imports.insert("c.py".to_string(), vec!["d.py".to_string()]);
        let importers = HashMap::new();
        let related = find_related("a.py", &all, &imports, &importers, &HashMap::new(), 15);
        assert_eq!(related[0].path, "b.py");
        assert!(related[0].score >= 1.0);
    }

    #[test]
    fn test_impl_mirror_detected() {
        let all = vec!["test_foo.py".to_string(), "unrelated.py".to_string()];
        let related = find_related("foo.py", &all, &HashMap::new(), &HashMap::new(), &HashMap::new(), 15);
        assert_eq!(related[0].path, "test_foo.py");
        assert!(related[0].reasons.iter().any(|r| r.contains("test/implementation")));
    }

    #[test]
    fn same_directory_scores_above_distant() {
        let all = vec!["pkg/sibling.py".to_string(), "aa/bb/cc/far.py".to_string()];
        let related = find_related("pkg/target.py", &all, &HashMap::new(), &HashMap::new(), &HashMap::new(), 15);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].path, "pkg/sibling.py");
    }

    #[test]
    fn zero_scored_entries_are_dropped() {
        let all = vec!["totally/unrelated/thing.py".to_string()];
        let related = find_related("a/target.py", &all, &HashMap::new(), &HashMap::new(), &HashMap::new(), 15);
        assert!(related.is_empty());
    }

    #[test]
    fn results_truncated_to_max() {
        let all: Vec<String> = (0..20).map(|i| format!("pkg/file{i}.py")).collect();
        let related = find_related("pkg/target.py", &all, &HashMap::new(), &HashMap::new(), &HashMap::new(), 5);
        assert_eq!(related.len(), 5);
    }
}
