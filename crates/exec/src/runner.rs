//! Validated subprocess execution with restricted environment, timeout,
//! and output truncation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::config::{
    max_stderr_bytes, max_stdout_bytes, BLOCKED_PREFIXES, GENERIC_COMMAND_PREFIXES, INHERITED_ENV_VARS,
    INJECTION_CHARS, TEST_COMMAND_PREFIXES,
};
use crate::error::{Result, RunnerError};
use crate::output::{truncate_output, RunResult};

/// Default allowlist: test-running prefixes union generic-command
/// prefixes, used when the caller does not supply its own.
pub fn default_allowed_prefixes() -> Vec<&'static str> {
    TEST_COMMAND_PREFIXES.iter().chain(GENERIC_COMMAND_PREFIXES.iter()).copied().collect()
}

/// Validate `cmd` against the rejection rules, in order: empty/whitespace;
/// injection characters; blocked prefixes; not matching any allowed
/// prefix. Returns `None` if accepted, or a short reason string.
pub fn validate_command(cmd: &str, allowed_prefixes: Option<&[&str]>) -> Option<String> {
    let trimmed = cmd.trim();
    if trimmed.is_empty() {
        return Some("command is empty".to_string());
    }

    if let Some(ch) = trimmed.chars().find(|c| INJECTION_CHARS.contains(c)) {
        return Some(format!("command contains disallowed character '{ch}'"));
    }

    let lower = trimmed.to_ascii_lowercase();
    if let Some(blocked) = BLOCKED_PREFIXES.iter().find(|p| lower.starts_with(&p.to_ascii_lowercase())) {
        return Some(format!("command begins with blocked prefix '{blocked}'"));
    }

    let owned_defaults;
    let allowed: &[&str] = match allowed_prefixes {
        Some(p) => p,
        None => {
            owned_defaults = default_allowed_prefixes();
            &owned_defaults
        }
    };
    if !allowed.iter().any(|p| lower.starts_with(&p.to_ascii_lowercase())) {
        return Some("command does not begin with an allowlisted prefix".to_string());
    }

    None
}

fn restricted_env(extra: &HashMap<String, String>) -> HashMap<String, String> {
    let mut env = HashMap::new();
    for key in INHERITED_ENV_VARS {
        if let Ok(value) = std::env::var(key) {
            env.insert((*key).to_string(), value);
        }
    }
    for (k, v) in extra {
        env.insert(k.clone(), v.clone());
    }
    env
}

#[cfg(unix)]
fn pre_exec_new_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt as _;
    unsafe {
        cmd.pre_exec(|| {
            libc::setpgid(0, 0);
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn pre_exec_new_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &tokio::process::Child) {
    if let Some(pid) = child.id() {
        let pid = pid as libc::pid_t;
        let pgid = unsafe { libc::getpgid(pid) };
        if pgid != -1 {
            unsafe { libc::killpg(pgid, libc::SIGKILL) };
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &tokio::process::Child) {}

/// Validate and execute `cmd` inside `cwd` (defaulting to the current
/// directory) with a restricted environment, killing the process (and, on
/// Unix, its process group) if it runs past `timeout_s`. stdout/stderr are
/// captured as text and independently truncated.
pub async fn run(
    cmd: &str,
    timeout_s: u64,
    cwd: Option<&str>,
    env: Option<&HashMap<String, String>>,
    allowed_prefixes: Option<&[&str]>,
) -> Result<RunResult> {
    if let Some(reason) = validate_command(cmd, allowed_prefixes) {
        return Err(RunnerError::Rejected {
            command: cmd.to_string(),
            reason,
        });
    }

    let empty = HashMap::new();
    let full_env = restricted_env(env.unwrap_or(&empty));

    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command.env_clear();
    command.envs(&full_env);
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());
    pre_exec_new_group(&mut command);

    let start = Instant::now();
    let mut child = command.spawn().map_err(|e| RunnerError::Spawn(e.to_string()))?;

    let mut stdout_pipe = child.stdout.take().expect("stdout piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr piped");
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let timeout = Duration::from_secs(timeout_s);
    let (exit_code, killed) = tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| RunnerError::Spawn(e.to_string()))?;
            (status.code().unwrap_or(-1), false)
        }
        _ = tokio::time::sleep(timeout) => {
            kill_process_group(&child);
            let _ = child.start_kill();
            let _ = child.wait().await;
            (-1, true)
        }
    };

    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();
    let duration_ms = start.elapsed().as_millis() as u64;

    let stdout_text = String::from_utf8_lossy(&stdout_bytes).into_owned();
    let stderr_text = String::from_utf8_lossy(&stderr_bytes).into_owned();
    let (stdout, stdout_truncated) = truncate_output(&stdout_text, max_stdout_bytes());
    let (stderr, stderr_truncated) = truncate_output(&stderr_text, max_stderr_bytes());

    Ok(RunResult {
        command: cmd.to_string(),
        exit_code: if killed { -1 } else { exit_code },
        stdout,
        stderr,
        duration_ms,
        killed,
        truncated: stdout_truncated || stderr_truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn validate_command_rejects_empty() {
        assert!(validate_command("", None).is_some());
        assert!(validate_command("   ", None).is_some());
    }

    #[test]
    fn validate_command_rejects_injection_characters() {
        assert!(validate_command("echo hi; rm -rf /", None).is_some());
        assert!(validate_command("echo $(whoami)", None).is_some());
    }

    #[test]
    fn validate_command_rejects_blocked_prefixes() {
        assert!(validate_command("rm -rf /tmp/x", None).is_some());
        assert!(validate_command("git push origin main", None).is_some());
    }

    #[test]
    fn validate_command_rejects_commands_outside_allowlist() {
        assert!(validate_command("sudo reboot now", None).is_some());
    }

    #[test]
    fn validate_command_accepts_allowed_test_prefix() {
        assert!(validate_command("pytest tests/", None).is_none());
    }

    #[test]
    fn validate_command_honors_caller_supplied_allowlist() {
        assert!(validate_command("my-custom-tool run", Some(&["my-custom-tool"])).is_none());
        assert!(validate_command("pytest tests/", Some(&["my-custom-tool"])).is_some());
    }

    #[tokio::test]
    async fn run_executes_allowed_command_and_captures_stdout() {
        let result = run("echo hello", 5, None, None, None).await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hello"));
        assert!(!result.killed);
    }

    #[tokio::test]
    async fn run_rejects_disallowed_command_without_spawning() {
        let err = run("rm -rf /", 5, None, None, None).await.unwrap_err();
        assert!(matches!(err, RunnerError::Rejected { .. }));
    }
}
