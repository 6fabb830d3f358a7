use std::process::Command;

use anyhow::{bail, Context, Result};

/// Run `program` and return its trimmed stdout. Non-zero exit is an error
/// carrying stderr.
pub fn stdout_of(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to spawn {program}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{program} exited with {}: {}", output.status, stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run `osascript -e <script>`.
pub fn osascript(script: &str) -> Result<String> {
    stdout_of("osascript", &["-e", script])
}

/// Quote `value` as an AppleScript string literal.
pub fn applescript_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applescript_strings_are_escaped() {
        assert_eq!(applescript_string("Spotify"), "\"Spotify\"");
        assert_eq!(applescript_string("a \"b\" \\c"), "\"a \\\"b\\\" \\\\c\"");
    }

    #[test]
    fn missing_program_is_an_error() {
        assert!(stdout_of("adhush-definitely-not-installed", &[]).is_err());
    }
}
