use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

/// Only web links are handed to the system opener.
pub fn is_openable(url: &str) -> bool {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://"))
        && lower.len() > "https://".len()
        && url.chars().all(is_url_char)
}

/// Characters that may appear unencoded in a URL. Whitespace, controls and
/// the delimiters RFC 3986 never allows raw are refused.
fn is_url_char(c: char) -> bool {
    !c.is_whitespace()
        && !c.is_control()
        && !matches!(c, '"' | '<' | '>' | '\\' | '^' | '`' | '{' | '|' | '}')
}

/// Program and arguments that open `url` on `os`. The URL is always passed
/// as one argument and never through a shell.
fn opener_args(os: &str, url: &str) -> (&'static str, Vec<String>) {
    match os {
        "macos" => ("open", vec![url.to_string()]),
        "windows" => (
            "rundll32",
            vec!["url.dll,FileProtocolHandler".to_string(), url.to_string()],
        ),
        _ => ("xdg-open", vec![url.to_string()]),
    }
}

/// Open a grant link in the user's browser. The opener runs detached with no
/// access to our terminal.
pub fn open_link(url: &str) -> Result<()> {
    if !is_openable(url) {
        return Err(anyhow!("Refusing to open link: {}", url));
    }
    let url = url.trim();

    let (program, args) = opener_args(std::env::consts::OS, url);
    spawn_detached(program, &args)?;

    info!(url, program, "opened link");
    Ok(())
}

/// Start `program` with null stdio. A background thread waits on it so the
/// exited process is reaped instead of lingering as a zombie.
fn spawn_detached(program: &str, args: &[String]) -> Result<JoinHandle<()>> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(thread::spawn(move || match child.wait() {
        Ok(status) => debug!(%status, "link opener exited"),
        Err(e) => warn!(error = %e, "failed to wait for link opener"),
    }))
}
