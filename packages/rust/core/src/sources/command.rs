//! External transcription commands.
//!
//! Commands are argv arrays from config; placeholders such as `{input}` are
//! substituted per argument and the process's stdout is the result.

use std::process::Stdio;

use tracing::{debug, instrument};

use siphon_shared::{Result, SiphonError};

/// Replace `{name}` placeholders in every argument.
///
/// Each argument is scanned once, so substituted values are never expanded
/// again. Unknown placeholders and stray braces are kept as written.
pub(crate) fn substitute(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template.iter().map(|arg| substitute_one(arg, vars)).collect()
}

fn substitute_one(arg: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match vars.iter().find(|(var, _)| *var == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Run `argv` to completion and return its trimmed stdout.
///
/// The child is killed if the returned future is dropped, so a stage
/// deadline also stops the process.
#[instrument(skip_all, fields(program = argv.first().map(String::as_str).unwrap_or_default()))]
pub(crate) async fn run(argv: &[String]) -> Result<String> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| SiphonError::config("empty transcription command"))?;

    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| SiphonError::Conversion(format!("failed to run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let snippet: String = stderr.trim().chars().take(300).collect();
        return Err(SiphonError::Conversion(format!(
            "{program} exited with {}: {snippet}",
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!(bytes = stdout.len(), "command finished");
    Ok(stdout)
}
