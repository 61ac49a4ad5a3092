//! `exec_command` host function: subprocess execution with no shell
//! wrapper, bounded output capture, and an explicit invocation
//! classification used both for capability derivation and for the
//! info-level audit log every grant produces.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use cce_capability::{basename, is_granted, Capability, Kind};

use crate::error::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const BOUNDED_BUFFER_CAP: usize = 10 * 1024 * 1024;

const DANGEROUS_SHELLS: &[&str] = &["sh", "bash", "dash", "zsh", "ksh", "csh", "tcsh", "fish"];
const EVAL_FLAGS: &[&str] = &["-c", "-e", "-E", "-r", "--eval", "--command"];

const INTERPRETER_EVAL_FLAGS: &[(&str, &[&str])] = &[
    ("python", &["-c"]),
    ("python3", &["-c"]),
    ("perl", &["-e"]),
    ("ruby", &["-e"]),
    ("node", &["--eval", "-e"]),
    ("nodejs", &["--eval", "-e"]),
    ("php", &["-r"]),
    ("awk", &[]),
    ("gawk", &[]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Safe,
    Shell,
    Interpreter,
    Suspicious,
}

#[derive(Debug, Deserialize)]
pub struct ExecCommandRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ExecCommandResponse {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stdout_truncated: bool,
    pub stderr: String,
    pub stderr_truncated: bool,
}

/// Classify the invocation per the shell/interpreter/suspicious
/// contract. Awk's code-execution form is `awk 'BEGIN{...}'` — a bare
/// program argument rather than a flag — so it's treated as always
/// eval-capable once invoked with any argument.
#[must_use]
pub fn classify(command: &str, args: &[String]) -> Classification {
    let base = basename(command);

    if DANGEROUS_SHELLS.contains(&base) {
        return if args.is_empty() { Classification::Safe } else { Classification::Shell };
    }

    for (interp, flags) in INTERPRETER_EVAL_FLAGS {
        let matches_variant = base == *interp
            || base.strip_prefix(interp).is_some_and(|rest| {
                rest.chars().next().is_none_or(|c| c.is_ascii_digit() || c == '.' || c == ':')
            });
        if matches_variant {
            let is_awk = *interp == "awk" || *interp == "gawk";
            if (is_awk && !args.is_empty()) || args.iter().any(|a| flags.contains(&a.as_str())) {
                return Classification::Interpreter;
            }
            return Classification::Safe;
        }
    }

    if args.iter().any(|a| EVAL_FLAGS.contains(&a.as_str())) {
        return Classification::Suspicious;
    }

    Classification::Safe
}

/// Every classification requires the same `exec:<command>` capability;
/// only the audit-log verbosity differs.
#[must_use]
pub fn capability_for(command: &str) -> Capability {
    Capability::of(Kind::Exec, command.to_string())
}

#[must_use]
pub fn is_authorized(grant: &cce_capability::Grant, command: &str) -> bool {
    is_granted(grant, &capability_for(command))
}

/// Denial message naming the classification that drove the capability
/// requirement, so a user denied `exec:python` for `python -c ...`
/// learns why a plain `exec:python` grant wasn't enough to expect.
#[must_use]
pub fn denial_message(classification: Classification, command: &str) -> String {
    let reason = match classification {
        Classification::Safe => "execution",
        Classification::Shell => "shell invocation",
        Classification::Interpreter => "interpreter code execution",
        Classification::Suspicious => "suspicious invocation",
    };
    format!("{reason} requires 'exec:{command}'")
}

async fn read_bounded<R: AsyncReadExt + Unpin>(mut reader: R) -> (String, bool) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() + n > BOUNDED_BUFFER_CAP {
                    let remaining = BOUNDED_BUFFER_CAP.saturating_sub(buf.len());
                    buf.extend_from_slice(&chunk[..remaining.min(n)]);
                    truncated = true;
                } else {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
            Err(_) => break,
        }
    }
    (String::from_utf8_lossy(&buf).into_owned(), truncated)
}

/// Execute the command directly, never via a shell wrapper. The
/// child's environment is exactly `request.env` — the host's own
/// environment is never inherited.
pub async fn execute(request: &ExecCommandRequest) -> Result<ExecCommandResponse> {
    if request.command.is_empty() {
        return Err(Error::malformed_payload("command must not be empty"));
    }

    let mut cmd = Command::new(&request.command);
    cmd.args(&request.args);
    cmd.env_clear();
    for (key, value) in &request.env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::execution(format!("spawning '{}': {e}", request.command)))?;

    let mut stdout = child.stdout.take().expect("stdout was piped");
    let mut stderr = child.stderr.take().expect("stderr was piped");

    let budget = request
        .timeout_ms
        .map_or(DEFAULT_TIMEOUT, Duration::from_millis);

    let run = async {
        let (stdout_result, stderr_result) =
            tokio::join!(read_bounded(&mut stdout), read_bounded(&mut stderr));
        let status = child.wait().await.map_err(|e| Error::execution(e.to_string()))?;
        Ok::<_, Error>((stdout_result, stderr_result, status))
    };

    match timeout(budget, run).await {
        Ok(Ok(((stdout_text, stdout_truncated), (stderr_text, stderr_truncated), status))) => {
            Ok(ExecCommandResponse {
                exit_code: status.code(),
                stdout: stdout_text,
                stdout_truncated,
                stderr: stderr_text,
                stderr_truncated,
            })
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            let _ = child.start_kill();
            Err(Error::Timeout(request.command.clone()))
        }
    }
}
