use anyhow::{Result, bail};
use tracing::debug;

/// Puts `content` on the system clipboard.
pub fn copy_text(content: &str) -> Result<()> {
    if content.is_empty() {
        bail!("Nothing to copy");
    }

    #[cfg(feature = "clipboard")]
    {
        use clipboard::{ClipboardContext, ClipboardProvider};
        if let Ok(mut ctx) = ClipboardContext::new() {
            if ctx.set_contents(content.to_string()).is_ok() {
                return Ok(());
            }
        }
        debug!("Clipboard context unavailable, falling back to platform tools");
    }

    copy_with_platform_tool(content)
}

#[cfg(target_os = "linux")]
fn copy_with_platform_tool(content: &str) -> Result<()> {
    for (program, args) in [("xclip", &["-selection", "clipboard"][..]), ("xsel", &["--clipboard", "--input"][..])] {
        if pipe_into(program, args, content).is_ok() {
            return Ok(());
        }
        debug!(program, "Clipboard tool failed");
    }
    bail!("No clipboard tool available (install xclip or xsel)")
}

#[cfg(target_os = "macos")]
fn copy_with_platform_tool(content: &str) -> Result<()> {
    pipe_into("pbcopy", &[], content)
}

#[cfg(target_os = "windows")]
fn copy_with_platform_tool(content: &str) -> Result<()> {
    let status = std::process::Command::new("powershell")
        .args(["-command", &format!("Set-Clipboard -Value '{}'", content.replace('\'', "''"))])
        .status()?;
    if !status.success() {
        bail!("Set-Clipboard exited with {}", status);
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn copy_with_platform_tool(_content: &str) -> Result<()> {
    bail!("Clipboard not supported on this platform")
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn pipe_into(program: &str, args: &[&str], content: &str) -> Result<()> {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut child = Command::new(program).args(args).stdin(Stdio::piped()).spawn()?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(content.as_bytes())?;
    }
    let status = child.wait()?;
    if !status.success() {
        bail!("{} exited with {}", program, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_is_rejected() {
        assert!(copy_text("").is_err());
    }
}
