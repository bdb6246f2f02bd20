//! Fixed tables driving command validation and output truncation.

/// Characters that make a shell command ambiguous enough to reject
/// outright: pipes, redirection into a subshell, substitution, grouping.
pub const INJECTION_CHARS: &[char] = &[';', '|', '&', '`', '$', '(', ')', '{', '}'];

/// Case-insensitive command prefixes that are never allowed, regardless
/// of the caller-supplied allowlist.
pub const BLOCKED_PREFIXES: &[&str] = &[
    "rm", "del", "rmdir", "curl", "wget", "ssh", "scp", "git push", "git remote", "shutdown",
    "reboot", "format", "mkfs", "dd ", "chmod", "chown",
];

/// Default allowlist for test-running commands.
pub const TEST_COMMAND_PREFIXES: &[&str] = &[
    "pytest",
    "python -m pytest",
    "python3 -m pytest",
    "npm test",
    "npm run test",
    "npx vitest",
    "npx jest",
];

/// Default allowlist for generic build/inspection commands.
pub const GENERIC_COMMAND_PREFIXES: &[&str] = &[
    "pip install",
    "pip3 install",
    "npm install",
    "npx ",
    "python -m ",
    "python3 -m ",
    "cat ",
    "head ",
    "tail ",
    "wc ",
    "find ",
    "ls ",
    "dir ",
    "type ",
];

/// Environment variables forwarded to the child process regardless of
/// the caller's `env` map. Caller entries with the same key override
/// these.
pub const INHERITED_ENV_VARS: &[&str] = &["PATH", "SYSTEMROOT", "TEMP", "TMP", "HOME", "USERPROFILE", "VIRTUAL_ENV"];

/// Layered from [`forge_ide_core::config`] (built-in default,
/// `forge_ide.toml`, then `FORGE_IDE_RUNNER_TIMEOUT_S`) so the runner's
/// timeout tracks the same precedence as every other tunable.
pub fn default_timeout_s() -> u64 {
    forge_ide_core::config::global().runner_timeout_s
}

pub fn max_stdout_bytes() -> usize {
    forge_ide_core::config::global().max_stdout_bytes
}

pub fn max_stderr_bytes() -> usize {
    forge_ide_core::config::global().max_stderr_bytes
}
