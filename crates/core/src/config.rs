//! Layered runtime configuration: built-in defaults, overlaid by an
//! optional `forge_ide.toml` in the workspace root, overlaid by
//! `FORGE_IDE_`-prefixed environment variables, overlaid last by whatever
//! a caller passes explicitly (a CLI flag, or a field present in a tool
//! request's JSON params).
//!
//! Each layer is a full [`RuntimeConfig`] merge, not a parse-time
//! short-circuit, so the precedence is just "later merge wins" — easy to
//! reason about and easy to unit test.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Every knob the spec calls out as configurable: cache TTL, max file read
/// bytes, stdout/stderr caps, default search result cap/context lines,
/// runner timeout, fuzz distance, context-pack token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub cache_ttl_s: u64,
    pub max_read_bytes: u64,
    pub max_stdout_bytes: usize,
    pub max_stderr_bytes: usize,
    pub search_max_results: usize,
    pub search_context_lines: usize,
    pub runner_timeout_s: u64,
    pub patch_fuzz: usize,
    pub context_pack_budget_tokens: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache_ttl_s: 2,
            max_read_bytes: 100_000,
            max_stdout_bytes: 50_000,
            max_stderr_bytes: 10_000,
            search_max_results: 100,
            search_context_lines: 0,
            runner_timeout_s: 120,
            patch_fuzz: 3,
            context_pack_budget_tokens: 8_000,
        }
    }
}

/// Mirrors [`RuntimeConfig`] with every field optional, so a `forge_ide.toml`
/// or an environment-variable scan only needs to say what it's overriding.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RuntimeConfigOverrides {
    pub cache_ttl_s: Option<u64>,
    pub max_read_bytes: Option<u64>,
    pub max_stdout_bytes: Option<usize>,
    pub max_stderr_bytes: Option<usize>,
    pub search_max_results: Option<usize>,
    pub search_context_lines: Option<usize>,
    pub runner_timeout_s: Option<u64>,
    pub patch_fuzz: Option<usize>,
    pub context_pack_budget_tokens: Option<usize>,
}

macro_rules! apply_overrides {
    ($self:ident, $over:ident, [$($field:ident),+ $(,)?]) => {
        $(if let Some(v) = $over.$field { $self.$field = v; })+
    };
}

impl RuntimeConfig {
    /// Overlay `over` on `self`: every `Some` field in `over` replaces the
    /// current value, every `None` field leaves it untouched. This is the
    /// one merge step used at every layer (file, env, explicit).
    pub fn merged(mut self, over: &RuntimeConfigOverrides) -> Self {
        apply_overrides!(
            self,
            over,
            [
                cache_ttl_s,
                max_read_bytes,
                max_stdout_bytes,
                max_stderr_bytes,
                search_max_results,
                search_context_lines,
                runner_timeout_s,
                patch_fuzz,
                context_pack_budget_tokens,
            ]
        );
        self
    }

    /// Parse `<workspace_root>/forge_ide.toml`. A missing file or a parse
    /// error both yield an all-`None` overlay — silent recovery, the same
    /// policy the gitignore parser and symbol extractors use elsewhere.
    pub fn read_toml_overrides(workspace_root: &Path) -> RuntimeConfigOverrides {
        std::fs::read_to_string(workspace_root.join("forge_ide.toml"))
            .ok()
            .and_then(|text| toml::from_str(&text).ok())
            .unwrap_or_default()
    }

    /// Scan `FORGE_IDE_<FIELD>` environment variables (e.g.
    /// `FORGE_IDE_RUNNER_TIMEOUT_S=30`). A variable that's set but fails to
    /// parse as the field's type is ignored rather than rejected.
    pub fn read_env_overrides() -> RuntimeConfigOverrides {
        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|raw| raw.parse().ok())
        }

        RuntimeConfigOverrides {
            cache_ttl_s: parsed("FORGE_IDE_CACHE_TTL_S"),
            max_read_bytes: parsed("FORGE_IDE_MAX_READ_BYTES"),
            max_stdout_bytes: parsed("FORGE_IDE_MAX_STDOUT_BYTES"),
            max_stderr_bytes: parsed("FORGE_IDE_MAX_STDERR_BYTES"),
            search_max_results: parsed("FORGE_IDE_SEARCH_MAX_RESULTS"),
            search_context_lines: parsed("FORGE_IDE_SEARCH_CONTEXT_LINES"),
            runner_timeout_s: parsed("FORGE_IDE_RUNNER_TIMEOUT_S"),
            patch_fuzz: parsed("FORGE_IDE_PATCH_FUZZ"),
            context_pack_budget_tokens: parsed("FORGE_IDE_CONTEXT_PACK_BUDGET_TOKENS"),
        }
    }

    /// Layer built-in defaults, then `forge_ide.toml` in `workspace_root`,
    /// then `FORGE_IDE_*` environment variables. Explicit per-call values
    /// (a CLI flag, a field present in a tool request) are the caller's own
    /// last `merged` call, applied on top of this result.
    pub fn load(workspace_root: &Path) -> Self {
        Self::default()
            .merged(&Self::read_toml_overrides(workspace_root))
            .merged(&Self::read_env_overrides())
    }
}

static GLOBAL: OnceLock<RuntimeConfig> = OnceLock::new();

/// The process-wide effective config, computed once from the current
/// directory's `forge_ide.toml` (if any) plus `FORGE_IDE_*` env vars and
/// cached for the process lifetime. Consulted by the request-model default
/// functions in [`crate::contracts`] so a value absent from both a tool
/// call's JSON params and the environment still resolves through the same
/// file/env layers as everything else, rather than a separate hardcoded
/// constant.
pub fn global() -> &'static RuntimeConfig {
    GLOBAL.get_or_init(|| {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        RuntimeConfig::load(&cwd)
    })
}

/// Initialize the process-wide config explicitly: file/env layers from
/// `workspace_root`, then `explicit` (the CLI-flags layer) on top. Meant to
/// be called once, early, by a binary entry point that knows its workspace
/// root and parsed flags before [`global`] is ever consulted — a later call
/// to either function after the singleton is already set has no effect,
/// since [`OnceLock`] only runs its initializer once.
pub fn init(workspace_root: &Path, explicit: &RuntimeConfigOverrides) -> &'static RuntimeConfig {
    GLOBAL.get_or_init(|| RuntimeConfig::load(workspace_root).merged(explicit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_constants() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.max_read_bytes, 100_000);
        assert_eq!(cfg.max_stdout_bytes, 50_000);
        assert_eq!(cfg.max_stderr_bytes, 10_000);
        assert_eq!(cfg.patch_fuzz, 3);
    }

    #[test]
    fn merged_overlay_only_touches_some_fields() {
        let base = RuntimeConfig::default();
        let over = RuntimeConfigOverrides {
            runner_timeout_s: Some(30),
            ..Default::default()
        };
        let merged = base.merged(&over);
        assert_eq!(merged.runner_timeout_s, 30);
        assert_eq!(merged.patch_fuzz, base.patch_fuzz);
    }

    #[test]
    fn toml_overrides_parse_a_partial_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("forge_ide.toml"),
            "runner_timeout_s = 45\npatch_fuzz = 5\n",
        )
        .unwrap();
        let over = RuntimeConfig::read_toml_overrides(dir.path());
        assert_eq!(over.runner_timeout_s, Some(45));
        assert_eq!(over.patch_fuzz, Some(5));
        assert_eq!(over.cache_ttl_s, None);
    }

    #[test]
    fn missing_toml_file_yields_all_none_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let over = RuntimeConfig::read_toml_overrides(dir.path());
        assert_eq!(over.runner_timeout_s, None);
    }

    /// The config-precedence property the expansion calls for: a
    /// `forge_ide.toml` value is overridden by a `FORGE_IDE_*` env var for
    /// the same key, and an explicit (CLI-flag-equivalent) value overrides
    /// both. Mutates process environment, so it must not run concurrently
    /// with another test touching `FORGE_IDE_RUNNER_TIMEOUT_S`.
    #[test]
    #[serial_test::serial]
    fn config_layers_file_then_env_then_explicit_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("forge_ide.toml"), "runner_timeout_s = 45\n").unwrap();

        let original = std::env::var("FORGE_IDE_RUNNER_TIMEOUT_S").ok();

        // No env var set: file value wins over the built-in default.
        std::env::remove_var("FORGE_IDE_RUNNER_TIMEOUT_S");
        let file_only = RuntimeConfig::load(dir.path());
        assert_eq!(file_only.runner_timeout_s, 45);

        // Env var set: it overrides the file value.
        std::env::set_var("FORGE_IDE_RUNNER_TIMEOUT_S", "60");
        let with_env = RuntimeConfig::load(dir.path());
        assert_eq!(with_env.runner_timeout_s, 60);

        // Explicit value (the CLI-flag-equivalent layer) overrides both.
        let explicit = with_env.merged(&RuntimeConfigOverrides {
            runner_timeout_s: Some(90),
            ..Default::default()
        });
        assert_eq!(explicit.runner_timeout_s, 90);

        match original {
            Some(v) => std::env::set_var("FORGE_IDE_RUNNER_TIMEOUT_S", v),
            None => std::env::remove_var("FORGE_IDE_RUNNER_TIMEOUT_S"),
        }
    }

    #[test]
    #[serial_test::serial]
    fn unparseable_env_var_is_ignored_not_rejected() {
        let original = std::env::var("FORGE_IDE_PATCH_FUZZ").ok();
        std::env::set_var("FORGE_IDE_PATCH_FUZZ", "not-a-number");
        let over = RuntimeConfig::read_env_overrides();
        assert_eq!(over.patch_fuzz, None);
        match original {
            Some(v) => std::env::set_var("FORGE_IDE_PATCH_FUZZ", v),
            None => std::env::remove_var("FORGE_IDE_PATCH_FUZZ"),
        }
    }
}
