//! forge_ide CLI library
//!
//! Provides the argument parsing and subcommand implementations that back
//! the `forge-ide` binary, kept separate from `main.rs` so they can be unit
//! tested directly.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use colored::Colorize;
use forge_ide_core::contracts::ToolRequest;
use forge_ide_registry::default_registry;

/// forge_ide - headless IDE runtime for coding agents
#[derive(Parser, Debug, Clone)]
#[command(name = "forge-ide")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Explicit config overrides, layered above `forge_ide.toml` and
    /// `FORGE_IDE_*` environment variables
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// The CLI-flags layer of the runtime config, highest precedence over the
/// workspace's `forge_ide.toml` and `FORGE_IDE_*` environment variables.
/// Each flag is `global = true` so it's accepted before or after the
/// subcommand (`forge-ide --runner-timeout-s 30 run ...` and
/// `forge-ide run --runner-timeout-s 30 ...` both parse).
#[derive(Parser, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Override the workspace file-tree/summary cache TTL, in seconds
    #[arg(long, global = true)]
    pub cache_ttl_s: Option<u64>,
    /// Override the max bytes `read_file` will read before rejecting the file
    #[arg(long, global = true)]
    pub max_read_bytes: Option<u64>,
    /// Override the stdout byte cap applied to subprocess output
    #[arg(long, global = true)]
    pub max_stdout_bytes: Option<usize>,
    /// Override the stderr byte cap applied to subprocess output
    #[arg(long, global = true)]
    pub max_stderr_bytes: Option<usize>,
    /// Override `search_code`'s default max result count
    #[arg(long, global = true)]
    pub search_max_results: Option<usize>,
    /// Override `search_code`'s default context-line count
    #[arg(long, global = true)]
    pub search_context_lines: Option<usize>,
    /// Override the default subprocess timeout, in seconds
    #[arg(long, global = true)]
    pub runner_timeout_s: Option<u64>,
    /// Override the patch engine's default fuzz distance
    #[arg(long, global = true)]
    pub patch_fuzz: Option<usize>,
    /// Override `assemble_context_pack`'s default token budget
    #[arg(long, global = true)]
    pub context_pack_budget_tokens: Option<usize>,
}

impl From<&ConfigArgs> for forge_ide_core::config::RuntimeConfigOverrides {
    fn from(args: &ConfigArgs) -> Self {
        Self {
            cache_ttl_s: args.cache_ttl_s,
            max_read_bytes: args.max_read_bytes,
            max_stdout_bytes: args.max_stdout_bytes,
            max_stderr_bytes: args.max_stderr_bytes,
            search_max_results: args.search_max_results,
            search_context_lines: args.search_context_lines,
            runner_timeout_s: args.runner_timeout_s,
            patch_fuzz: args.patch_fuzz,
            context_pack_budget_tokens: args.context_pack_budget_tokens,
        }
    }
}

/// Initialize the process-wide runtime config from `workspace_root`'s
/// `forge_ide.toml` and the environment, with `args.config` applied as the
/// final, highest-precedence layer. Call once, before the first tool
/// dispatch — see [`forge_ide_core::config::init`].
pub fn init_config(args: &Args, workspace_root: &std::path::Path) {
    forge_ide_core::config::init(workspace_root, &(&args.config).into());
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Invoke a single registered tool and print its response as JSON
    Run(RunArgs),
    /// List every tool the registry exposes, with its JSON Schema
    ListTools(ListToolsArgs),
    /// Run as an MCP server (exposes every tool over stdio)
    McpServer(McpServerArgs),
    /// Generate shell completions for the CLI
    Completions(CompletionsArgs),
    /// Show detailed version information
    Version(VersionArgs),
    /// Check that the runtime environment is set up correctly
    Doctor(DoctorArgs),
}

/// Arguments for the `run` subcommand
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Name of the tool to invoke (see `forge-ide list-tools`)
    pub tool: String,

    /// Tool parameters as a JSON object, e.g. '{"path": "src/lib.rs"}'
    #[arg(long, conflicts_with = "params_file")]
    pub params: Option<String>,

    /// Read tool parameters from a JSON file instead of --params
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "params")]
    pub params_file: Option<PathBuf>,

    /// Workspace root the tool should operate against
    #[arg(short = 'd', long, value_hint = ValueHint::DirPath, default_value = ".")]
    pub working_dir: String,

    /// Pretty-print the JSON response
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the `list-tools` subcommand
#[derive(Parser, Debug, Clone, Default)]
pub struct ListToolsArgs {
    /// Emit the full tool list (name, description, input schema) as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `mcp-server` subcommand
#[derive(Parser, Debug, Clone)]
pub struct McpServerArgs {
    /// Default workspace root for tool calls that don't override it
    #[arg(short = 'd', long, value_hint = ValueHint::DirPath)]
    pub working_dir: Option<String>,
}

/// Arguments for the `completions` subcommand
#[derive(Parser, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CliShell,
}

/// CLI-friendly enum for shell types
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum CliShell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell
    Elvish,
}

impl From<CliShell> for Shell {
    fn from(cli: CliShell) -> Self {
        match cli {
            CliShell::Bash => Shell::Bash,
            CliShell::Zsh => Shell::Zsh,
            CliShell::Fish => Shell::Fish,
            CliShell::PowerShell => Shell::PowerShell,
            CliShell::Elvish => Shell::Elvish,
        }
    }
}

/// Arguments for the `version` subcommand
#[derive(Parser, Debug, Clone, Default)]
pub struct VersionArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `doctor` subcommand
#[derive(Parser, Debug, Clone, Default)]
pub struct DoctorArgs {
    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,

    /// Workspace root to check (defaults to the current directory)
    #[arg(short = 'd', long, value_hint = ValueHint::DirPath)]
    pub working_dir: Option<String>,
}

// ============================================================================
// run
// ============================================================================

/// Read the params object for a `run` invocation: `--params` takes
/// precedence over `--params-file`; neither given means `{}`.
pub fn resolve_params(args: &RunArgs) -> anyhow::Result<serde_json::Value> {
    if let Some(raw) = &args.params {
        return Ok(serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("--params is not valid JSON: {e}"))?);
    }
    if let Some(path) = &args.params_file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        return Ok(serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("{} is not valid JSON: {e}", path.display()))?);
    }
    Ok(serde_json::json!({}))
}

/// Run the `run` subcommand: dispatch one tool call through the registry
/// and print the resulting envelope. Returns the process exit code.
pub async fn run_run_command(args: &RunArgs) -> anyhow::Result<i32> {
    let params = resolve_params(args)?;
    let request = ToolRequest {
        name: args.tool.clone(),
        params,
        working_dir: args.working_dir.clone(),
    };

    let registry = default_registry();
    let response = registry.dispatch(request).await;

    let text = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{text}");

    Ok(if response.success { 0 } else { 1 })
}

// ============================================================================
// list-tools
// ============================================================================

pub fn run_list_tools_command(args: &ListToolsArgs) {
    let registry = default_registry();
    let tools = registry.list_tools();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tools).unwrap());
        return;
    }

    for tool in &tools {
        println!("{}  {}", tool.name.bold(), tool.description);
    }
}

// ============================================================================
// mcp-server
// ============================================================================

pub async fn run_mcp_server_command(args: &McpServerArgs) -> anyhow::Result<()> {
    let mut config = forge_ide_mcp_server::McpServerConfig::default();
    if let Some(dir) = &args.working_dir {
        config = config.with_working_dir(dir);
    }
    forge_ide_mcp_server::run_mcp_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))
}

// ============================================================================
// completions
// ============================================================================

pub fn run_completions_command(args: &CompletionsArgs) {
    let mut cmd = Args::command();
    let shell: Shell = args.shell.into();
    generate(shell, &mut cmd, "forge-ide", &mut std::io::stdout());
}

// ============================================================================
// version
// ============================================================================

/// Build-time version information captured by build.rs
pub struct VersionInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_date: &'static str,
    pub build_timestamp: &'static str,
    pub build_target: &'static str,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("GIT_HASH"),
            git_date: env!("GIT_DATE"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
            build_target: env!("BUILD_TARGET"),
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "forge-ide {}", self.version)?;
        writeln!(f)?;
        writeln!(f, "Git commit: {} ({})", self.git_hash, self.git_date)?;
        writeln!(f, "Build time: {}", self.build_timestamp)?;
        writeln!(f, "Target:     {}", self.build_target)?;
        Ok(())
    }
}

pub fn run_version_command(args: &VersionArgs) {
    let info = VersionInfo::current();
    if args.json {
        let output = serde_json::json!({
            "version": info.version,
            "git_hash": info.git_hash,
            "git_date": info.git_date,
            "build_timestamp": info.build_timestamp,
            "build_target": info.build_target,
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
    } else {
        print!("{info}");
    }
}

// ============================================================================
// doctor
// ============================================================================

/// Exit code for the doctor subcommand: Ok if every check passed, Warnings
/// if some checks degrade functionality without blocking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorExitCode {
    Ok,
    Warnings,
}

impl DoctorExitCode {
    pub fn code(self) -> i32 {
        match self {
            DoctorExitCode::Ok => 0,
            DoctorExitCode::Warnings => 1,
        }
    }
}

struct DoctorCheck {
    name: &'static str,
    ok: bool,
    detail: String,
}

pub fn run_doctor_command(args: &DoctorArgs) -> DoctorExitCode {
    let working_dir = args
        .working_dir
        .clone()
        .unwrap_or_else(|| ".".to_string());
    let root = PathBuf::from(&working_dir);

    let mut checks = Vec::new();

    checks.push(DoctorCheck {
        name: "workspace_root",
        ok: root.is_dir(),
        detail: format!("{} {}", root.display(), if root.is_dir() { "exists" } else { "is not a directory" }),
    });

    let rg_found = which::which("rg").is_ok();
    checks.push(DoctorCheck {
        name: "ripgrep",
        ok: rg_found,
        detail: if rg_found {
            "rg found on PATH, search_code will shell out to it".to_string()
        } else {
            "rg not found, search_code will fall back to an in-process walker".to_string()
        },
    });

    let git_found = which::which("git").is_ok();
    checks.push(DoctorCheck {
        name: "git",
        ok: git_found,
        detail: if git_found {
            "git found on PATH".to_string()
        } else {
            "git not found, .gitignore-aware walking still works but git-tracked file listing does not".to_string()
        },
    });

    let registry = default_registry();
    let tool_count = registry.list_tools().len();
    checks.push(DoctorCheck {
        name: "tool_registry",
        ok: tool_count > 0,
        detail: format!("{tool_count} tools registered"),
    });

    let all_critical_ok = checks
        .iter()
        .filter(|c| c.name != "ripgrep" && c.name != "git")
        .all(|c| c.ok);
    let any_warning = checks.iter().any(|c| !c.ok);

    if args.json {
        let output = serde_json::json!({
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "ok": c.ok,
                "detail": c.detail,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
    } else {
        for check in &checks {
            let marker = if check.ok { "OK".green() } else { "WARN".yellow() };
            println!("[{marker}] {}: {}", check.name, check.detail);
        }
    }

    if !all_critical_ok {
        DoctorExitCode::Warnings
    } else if any_warning {
        DoctorExitCode::Warnings
    } else {
        DoctorExitCode::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn config_args_only_convert_the_flags_that_were_set() {
        let args = ConfigArgs {
            runner_timeout_s: Some(30),
            ..Default::default()
        };
        let overrides: forge_ide_core::config::RuntimeConfigOverrides = (&args).into();
        assert_eq!(overrides.runner_timeout_s, Some(30));
        assert_eq!(overrides.cache_ttl_s, None);
        assert_eq!(overrides.patch_fuzz, None);
    }

    #[test]
    fn resolve_params_defaults_to_empty_object() {
        let args = RunArgs {
            tool: "read_file".into(),
            params: None,
            params_file: None,
            working_dir: ".".into(),
            pretty: false,
        };
        assert_eq!(resolve_params(&args).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn resolve_params_parses_inline_json() {
        let args = RunArgs {
            tool: "read_file".into(),
            params: Some(r#"{"path": "a.py"}"#.into()),
            params_file: None,
            working_dir: ".".into(),
            pretty: false,
        };
        assert_eq!(resolve_params(&args).unwrap(), serde_json::json!({"path": "a.py"}));
    }

    #[test]
    fn resolve_params_rejects_invalid_json() {
        let args = RunArgs {
            tool: "read_file".into(),
            params: Some("not json".into()),
            params_file: None,
            working_dir: ".".into(),
            pretty: false,
        };
        assert!(resolve_params(&args).is_err());
    }

    #[test]
    fn doctor_reports_registered_tools() {
        let args = DoctorArgs { json: true, working_dir: Some(".".into()) };
        // Doesn't assert a specific exit code: whether rg/git are present
        // varies across CI / dev machines. Just confirm it runs to completion.
        let _ = run_doctor_command(&args);
    }

    #[tokio::test]
    async fn run_command_reports_failure_for_unknown_tool() {
        let dir = std::env::temp_dir();
        let args = RunArgs {
            tool: "does_not_exist".into(),
            params: None,
            params_file: None,
            working_dir: dir.to_string_lossy().into_owned(),
            pretty: false,
        };
        let code = run_run_command(&args).await.unwrap();
        assert_eq!(code, 1);
    }
}
