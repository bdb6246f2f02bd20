//! Concrete tool handlers wired up by [`crate::default_registry`].
//!
//! Each handler decodes its own request model, does its work against the
//! workspace handed to it by [`crate::Registry::dispatch`], and returns a
//! bare JSON value — `Registry::dispatch` wraps it in the envelope.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::schema_for;
use serde_json::{json, Value};

use forge_ide_core::contracts::{
    ApplyPatchRequest, ApplyResponseRequest, AssembleContextPackRequest, CheckSyntaxRequest, FindRelatedRequest,
    GenerateDiffRequest, ListDirectoryRequest, ParseResponseRequest, ReadFileRequest, RunCommandRequest,
    RunTestsRequest, WriteFileRequest,
};
use forge_ide_core::errors::{ForgeIdeError, Result};
use forge_ide_core::workspace::Workspace;
use forge_ide_core::{context_pack, file_index, lang, reader, relevance, response_parser, sanitize, snapshot};

use crate::build_helpers;
use crate::registry::{decode_params, Registry, ToolHandler};

pub fn register_all(registry: &mut Registry) {
    registry.register("read_file", "Read a file in full, by line range, or by named symbol", Arc::new(ReadFileHandler));
    registry.register("list_directory", "List the workspace's file tree", Arc::new(ListDirectoryHandler));
    registry.register("search_code", "Search workspace files by literal or regex pattern", Arc::new(SearchCodeHandler));
    registry.register("write_file", "Write content to a workspace-relative path", Arc::new(WriteFileHandler));
    registry.register("apply_patch", "Apply a unified diff to a file, with fuzzy hunk matching", Arc::new(ApplyPatchHandler));
    registry.register("generate_diff", "Generate a unified diff between an old and new string", Arc::new(GenerateDiffHandler));
    registry.register("run_command", "Run an allowlisted shell command with a timeout", Arc::new(RunCommandHandler));
    registry.register("run_tests", "Run a command and summarise its output (pytest/npm/build/generic)", Arc::new(RunTestsHandler));
    registry.register("check_syntax", "Best-effort syntax check for a source file", Arc::new(CheckSyntaxHandler));
    registry.register("get_workspace_summary", "Aggregate file count, size, and language histogram", Arc::new(WorkspaceSummaryHandler));
    registry.register("get_snapshot", "Single-pass workspace reconnaissance: symbols, imports, tests, schema", Arc::new(SnapshotHandler));
    registry.register("find_related", "Rank files by relevance to a target file", Arc::new(FindRelatedHandler));
    registry.register("assemble_context_pack", "Assemble a token-budgeted context bundle for target files", Arc::new(AssembleContextPackHandler));
    registry.register("parse_llm_response", "Classify an LLM response as diff or full file content", Arc::new(ParseResponseHandler));
    registry.register("apply_llm_response", "Apply an LLM response to a file, falling back to full content on conflict", Arc::new(ApplyResponseHandler));
}

fn schema_of<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null)
}

async fn resolve(workspace: &Workspace, rel: &str) -> Result<std::path::PathBuf> {
    workspace.resolve(rel)
}

// ---------------------------------------------------------------------
// read_file
// ---------------------------------------------------------------------

struct ReadFileHandler;

#[async_trait]
impl ToolHandler for ReadFileHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: ReadFileRequest = decode_params(params)?;
        let abs = resolve(&workspace, &req.path).await?;
        let read = reader::read_file(&abs, Some(req.max_bytes))?;

        if let Some(name) = req.symbol.as_deref() {
            let snippet = reader::read_symbol(&read.content, &read.language, name)?;
            return Ok(json!({
                "path": req.path,
                "language": read.language,
                "range": snippet.range,
                "content": snippet.content,
            }));
        }

        if let (Some(start), Some(end)) = (req.start_line, req.end_line) {
            let snippet = reader::read_range(&read.content, start, end)?;
            return Ok(json!({
                "path": req.path,
                "language": read.language,
                "range": snippet.range,
                "content": snippet.content,
            }));
        }

        Ok(json!({
            "path": req.path,
            "content": read.content,
            "line_count": read.line_count,
            "size_bytes": read.size_bytes,
            "language": read.language,
            "encoding": read.encoding,
        }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<ReadFileRequest>()
    }
}

// ---------------------------------------------------------------------
// list_directory
// ---------------------------------------------------------------------

struct ListDirectoryHandler;

#[async_trait]
impl ToolHandler for ListDirectoryHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: ListDirectoryRequest = decode_params(params)?;
        let mut entries = workspace.file_tree(&req.ignore_patterns);
        if let Some(prefix) = req.path.as_deref().filter(|p| !p.is_empty()) {
            let prefix = prefix.trim_end_matches('/');
            entries.retain(|e| e.path == prefix || e.path.starts_with(&format!("{prefix}/")));
        }
        entries.sort_by(|a, b| sanitize::normalize_path_separators(&a.path).to_lowercase().cmp(&sanitize::normalize_path_separators(&b.path).to_lowercase()));
        Ok(json!({ "entries": entries, "summary": workspace.workspace_summary() }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<ListDirectoryRequest>()
    }
}

// ---------------------------------------------------------------------
// search_code
// ---------------------------------------------------------------------

struct SearchCodeHandler;

#[async_trait]
impl ToolHandler for SearchCodeHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: forge_ide_core::contracts::SearchCodeRequest = decode_params(params)?;
        if req.pattern.is_empty() {
            return Err(ForgeIdeError::Internal("search pattern must not be empty".into()));
        }
        let (mut matches, truncated) = forge_ide_search::search_async(
            workspace.root().to_path_buf(),
            req.pattern,
            req.glob,
            req.is_regex,
            req.max_results,
            req.context_lines,
            req.case_sensitive,
        )
        .await;
        sanitize::sort_matches(&mut matches);
        Ok(json!({ "matches": matches, "truncated": truncated }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<forge_ide_core::contracts::SearchCodeRequest>()
    }
}

// ---------------------------------------------------------------------
// write_file
// ---------------------------------------------------------------------

struct WriteFileHandler;

#[async_trait]
impl ToolHandler for WriteFileHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: WriteFileRequest = decode_params(params)?;
        let abs = resolve(&workspace, &req.path).await?;
        if req.create_parents {
            if let Some(parent) = abs.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&abs, &req.content).await?;
        workspace.invalidate_cache();
        Ok(json!({ "path": req.path, "bytes_written": req.content.len() }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<WriteFileRequest>()
    }
}

// ---------------------------------------------------------------------
// apply_patch
// ---------------------------------------------------------------------

struct ApplyPatchHandler;

#[async_trait]
impl ToolHandler for ApplyPatchHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: ApplyPatchRequest = decode_params(params)?;
        let abs = resolve(&workspace, &req.path).await?;
        let pre_content = tokio::fs::read_to_string(&abs).await.unwrap_or_default();

        let result = forge_ide_apply_patch::apply_patch(&pre_content, &req.diff, &req.path, req.fuzz)?;

        if req.write {
            tokio::fs::write(&abs, &result.content).await?;
            workspace.invalidate_cache();
        }

        Ok(json!({
            "path": req.path,
            "success": true,
            "pre_content": pre_content,
            "post_content": result.content,
            "hunks_applied": result.hunks_applied,
            "insertions": result.stats.insertions,
            "deletions": result.stats.deletions,
            "written": req.write,
        }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<ApplyPatchRequest>()
    }
}

// ---------------------------------------------------------------------
// generate_diff
// ---------------------------------------------------------------------

struct GenerateDiffHandler;

#[async_trait]
impl ToolHandler for GenerateDiffHandler {
    async fn call(&self, _workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: GenerateDiffRequest = decode_params(params)?;
        let diff = forge_ide_apply_patch::generate_diff(&req.old, &req.new, &req.path, req.context_lines);
        let text = forge_ide_apply_patch::diff_to_text(&diff);
        Ok(json!({
            "path": diff.path,
            "hunks": diff.hunks,
            "insertions": diff.insertions,
            "deletions": diff.deletions,
            "text": text,
        }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<GenerateDiffRequest>()
    }
}

// ---------------------------------------------------------------------
// run_command / run_tests
// ---------------------------------------------------------------------

struct RunCommandHandler;

#[async_trait]
impl ToolHandler for RunCommandHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: RunCommandRequest = decode_params(params)?;
        let cwd = req.cwd.unwrap_or_else(|| workspace.root().to_string_lossy().into_owned());
        let env: HashMap<String, String> = req.env.into_iter().collect();
        let result = forge_ide_runner::run(&req.command, req.timeout_s, Some(&cwd), Some(&env), None)
            .await
            .map_err(ForgeIdeError::from)?;
        Ok(serde_json::to_value(result)?)
    }

    fn input_schema(&self) -> Value {
        schema_of::<RunCommandRequest>()
    }
}

struct RunTestsHandler;

#[async_trait]
impl ToolHandler for RunTestsHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: RunTestsRequest = decode_params(params)?;
        let cwd = req.cwd.unwrap_or_else(|| workspace.root().to_string_lossy().into_owned());
        let (result, summary) = build_helpers::run_and_summarise(&req.command, req.timeout_s, Some(&cwd))
            .await
            .map_err(ForgeIdeError::from)?;
        Ok(json!({ "run": result, "summary": summary }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<RunTestsRequest>()
    }
}

// ---------------------------------------------------------------------
// check_syntax
// ---------------------------------------------------------------------

struct CheckSyntaxHandler;

#[async_trait]
impl ToolHandler for CheckSyntaxHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: CheckSyntaxRequest = decode_params(params)?;
        let abs = resolve(&workspace, &req.path).await?;
        let read = reader::read_file(&abs, None)?;
        let diagnostics = match read.language.as_str() {
            "python" => lang::python_intel::parse_python_ast_errors(&req.path, &read.content),
            _ => Vec::new(),
        };
        Ok(json!({ "path": req.path, "diagnostics": diagnostics, "ok": diagnostics.is_empty() }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<CheckSyntaxRequest>()
    }
}

// ---------------------------------------------------------------------
// get_workspace_summary
// ---------------------------------------------------------------------

struct WorkspaceSummaryHandler;

#[async_trait]
impl ToolHandler for WorkspaceSummaryHandler {
    async fn call(&self, workspace: Arc<Workspace>, _params: Value) -> Result<Value> {
        Ok(serde_json::to_value(workspace.workspace_summary())?)
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
}

// ---------------------------------------------------------------------
// get_snapshot
// ---------------------------------------------------------------------

struct SnapshotHandler;

#[async_trait]
impl ToolHandler for SnapshotHandler {
    async fn call(&self, workspace: Arc<Workspace>, _params: Value) -> Result<Value> {
        let snap = snapshot::capture_snapshot(&workspace);
        let brief = snapshot::snapshot_to_workspace_info(&snap);
        Ok(json!({ "snapshot": snap, "brief": brief }))
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
}

// ---------------------------------------------------------------------
// find_related
// ---------------------------------------------------------------------

struct FindRelatedHandler;

/// Build the path-keyed import/importer maps `find_related` expects, by
/// resolving each Python file's dotted imports against the workspace's
/// own file list (unresolved and third-party imports are dropped — they
/// can't contribute to an in-workspace relevance score).
fn build_relevance_graphs(
    workspace: &Workspace,
    index: &file_index::FileIndex,
) -> (HashMap<String, Vec<String>>, HashMap<String, Vec<String>>) {
    let all_files: std::collections::HashSet<String> = index.all_files().into_iter().collect();
    let mut imports: HashMap<String, Vec<String>> = HashMap::new();
    let mut importers: HashMap<String, Vec<String>> = HashMap::new();

    for path in &all_files {
        let Some(meta) = index.get_metadata(path) else { continue };
        if meta.language != "python" {
            continue;
        }
        let source = std::fs::read_to_string(workspace.root().join(path)).unwrap_or_default();
        let resolved: Vec<String> = lang::python_intel::resolve_imports(&source, path, &all_files, None)
            .into_iter()
            .filter_map(|i| i.resolved_path)
            .collect();
        for target in &resolved {
            importers.entry(target.clone()).or_default().push(path.clone());
        }
        imports.insert(path.clone(), resolved);
    }

    (imports, importers)
}

#[async_trait]
impl ToolHandler for FindRelatedHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: FindRelatedRequest = decode_params(params)?;
        let index = file_index::FileIndex::build(&workspace);
        let all_files = index.all_files();
        let (imports, importers) = build_relevance_graphs(&workspace, &index);

        let mut mtimes: HashMap<String, DateTime<Utc>> = HashMap::new();
        for entry in workspace.file_tree(&[]) {
            if let Some(mtime) = entry.last_modified {
                mtimes.insert(entry.path, mtime);
            }
        }

        let related = relevance::find_related(&req.target_path, &all_files, &imports, &importers, &mtimes, req.max_results);
        Ok(json!({ "target_path": req.target_path, "related": related }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<FindRelatedRequest>()
    }
}

// ---------------------------------------------------------------------
// assemble_context_pack
// ---------------------------------------------------------------------

/// Lazily built, process-wide `cl100k_base` BPE counter — the rank table
/// load is too costly to repeat per call. `None` if it failed to load, in
/// which case the pack's `exact_tokens` field is just left unset.
fn exact_token_counter() -> Option<&'static context_pack::BpeTokenCounter> {
    static COUNTER: OnceLock<Option<context_pack::BpeTokenCounter>> = OnceLock::new();
    COUNTER.get_or_init(context_pack::BpeTokenCounter::cl100k_base).as_ref()
}

struct AssembleContextPackHandler;

#[async_trait]
impl ToolHandler for AssembleContextPackHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: AssembleContextPackRequest = decode_params(params)?;

        let mut target_files = Vec::new();
        for path in &req.target_files {
            let abs = resolve(&workspace, path).await?;
            let read = reader::read_file(&abs, None)?;
            target_files.push(context_pack::TargetFile { path: path.clone(), content: read.content });
        }

        let summary = workspace.workspace_summary();
        let repo_summary = context_pack::build_repo_summary(&summary);

        let index = file_index::FileIndex::build(&workspace);
        let all_files = index.all_files();
        let (imports, importers) = build_relevance_graphs(&workspace, &index);
        let mut mtimes: HashMap<String, DateTime<Utc>> = HashMap::new();
        for entry in workspace.file_tree(&[]) {
            if let Some(mtime) = entry.last_modified {
                mtimes.insert(entry.path, mtime);
            }
        }

        let mut seen = std::collections::HashSet::new();
        let mut related = Vec::new();
        for target in &req.target_files {
            for candidate in relevance::find_related(target, &all_files, &imports, &importers, &mtimes, req.max_related) {
                if seen.insert(candidate.path.clone()) {
                    related.push(candidate);
                }
            }
        }
        related.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        related.truncate(req.max_related);

        let root = workspace.root().to_path_buf();
        let pack = context_pack::assemble_pack(
            target_files,
            Some(repo_summary),
            &related,
            |rel_path| std::fs::read_to_string(root.join(rel_path)).ok(),
            req.budget_tokens,
            exact_token_counter().map(|c| c as &dyn context_pack::TokenCounter),
        );
        let text = context_pack::pack_to_text(&pack);
        Ok(json!({ "pack": pack, "text": text }))
    }

    fn input_schema(&self) -> Value {
        schema_of::<AssembleContextPackRequest>()
    }
}

// ---------------------------------------------------------------------
// parse_llm_response / apply_llm_response
// ---------------------------------------------------------------------

struct ParseResponseHandler;

#[async_trait]
impl ToolHandler for ParseResponseHandler {
    async fn call(&self, _workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: ParseResponseRequest = decode_params(params)?;
        Ok(serde_json::to_value(response_parser::parse_response(&req.raw))?)
    }

    fn input_schema(&self) -> Value {
        schema_of::<ParseResponseRequest>()
    }
}

struct ApplyResponseHandler;

#[async_trait]
impl ToolHandler for ApplyResponseHandler {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value> {
        let req: ApplyResponseRequest = decode_params(params)?;
        let abs = resolve(&workspace, &req.path).await?;
        let original = tokio::fs::read_to_string(&abs).await.unwrap_or_default();

        let applied = build_helpers::apply_response(&original, &req.llm_text, &req.path);

        if req.write {
            if let build_helpers::AppliedResponse::Applied { content, .. } = &applied {
                tokio::fs::write(&abs, content).await?;
                workspace.invalidate_cache();
            }
        }

        Ok(serde_json::to_value(applied)?)
    }

    fn input_schema(&self) -> Value {
        schema_of::<ApplyResponseRequest>()
    }
}
