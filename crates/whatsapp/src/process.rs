//! Supervision of the Node.js sidecar that speaks WhatsApp Web.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    anyhow::{Context, Result, bail},
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        process::{Child, Command},
    },
    tracing::{debug, error, info, warn},
};

pub const SIDECAR_DIR_ENV: &str = "WAGPT_WHATSAPP_SIDECAR_DIR";

const SIDECAR_REL_PATH: &str = "sidecar/whatsapp-baileys";
const STARTUP_GRACE: Duration = Duration::from_millis(500);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A running sidecar child process.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, then kill if the process has not exited within five seconds.
    pub async fn stop(&mut self) -> Result<()> {
        info!(port = self.port, "stopping whatsapp sidecar");

        #[cfg(unix)]
        {
            use nix::{
                sys::signal::{Signal, kill},
                unistd::Pid,
            };
            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(STOP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "whatsapp sidecar exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for whatsapp sidecar"),
            Err(_) => {
                warn!("whatsapp sidecar ignored SIGTERM, killing");
                self.child.kill().await.context("failed to kill sidecar")?;
            },
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Directory containing the sidecar's `package.json`.
    pub sidecar_dir: PathBuf,
    pub port: u16,
    /// Where the sidecar persists login credentials.
    pub auth_dir: PathBuf,
}

fn has_package_json(dir: &Path) -> bool {
    dir.join("package.json").exists()
}

/// Locate the sidecar package.
///
/// Search order: the explicit path, `WAGPT_WHATSAPP_SIDECAR_DIR`, next to
/// the executable, then `sidecar/whatsapp-baileys` under the working
/// directory and its parents.
pub fn find_sidecar_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if has_package_json(path) {
            return Ok(path.to_path_buf());
        }
        bail!(
            "sidecar directory {} has no package.json",
            path.display()
        );
    }

    if let Ok(dir) = std::env::var(SIDECAR_DIR_ENV) {
        let path = PathBuf::from(&dir);
        if has_package_json(&path) {
            return Ok(path);
        }
        warn!(path = %dir, "{SIDECAR_DIR_ENV} is set but has no package.json");
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        for up in ["..", "../.."] {
            let candidate = exe_dir.join(up).join(SIDECAR_REL_PATH);
            if has_package_json(&candidate) {
                return Ok(candidate);
            }
        }
    }

    for prefix in [".", "..", "../.."] {
        let candidate = Path::new(prefix).join(SIDECAR_REL_PATH);
        if has_package_json(&candidate) {
            return Ok(candidate.canonicalize().unwrap_or(candidate));
        }
    }

    bail!("whatsapp sidecar not found; set {SIDECAR_DIR_ENV} or create {SIDECAR_REL_PATH}")
}

pub fn is_sidecar_built(sidecar_dir: &Path) -> bool {
    sidecar_dir.join("dist/index.js").exists()
}

/// Build the sidecar if needed, spawn it and forward its logs.
pub async fn start_sidecar(config: &SidecarConfig) -> Result<SidecarProcess> {
    let dir = &config.sidecar_dir;
    if !has_package_json(dir) {
        bail!("whatsapp sidecar not found at {}", dir.display());
    }

    if !is_sidecar_built(dir) {
        if !dir.join("node_modules").exists() {
            run_npm(dir, &["install"]).await?;
        }
        run_npm(dir, &["run", "build"]).await?;
    }

    info!(path = %dir.display(), port = config.port, "starting whatsapp sidecar");

    let mut child = Command::new("node")
        .arg("dist/index.js")
        .current_dir(dir)
        .env("WAGPT_WHATSAPP_PORT", config.port.to_string())
        .env("WAGPT_WHATSAPP_AUTH_DIR", &config.auth_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn whatsapp sidecar")?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                forward_log_line(&line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "whatsapp_sidecar", "{line}");
            }
        });
    }

    tokio::time::sleep(STARTUP_GRACE).await;
    if let Some(status) = child
        .try_wait()
        .context("failed to poll whatsapp sidecar")?
    {
        bail!("whatsapp sidecar exited immediately with {status}");
    }

    Ok(SidecarProcess {
        child,
        port: config.port,
    })
}

/// pino writes JSON lines with numeric levels; anything else is logged
/// verbatim at info.
fn forward_log_line(line: &str) {
    let Some((level, msg)) = pino_level(line) else {
        info!(target: "whatsapp_sidecar", "{line}");
        return;
    };
    match level {
        0..=20 => debug!(target: "whatsapp_sidecar", "{msg}"),
        21..=30 => info!(target: "whatsapp_sidecar", "{msg}"),
        31..=40 => warn!(target: "whatsapp_sidecar", "{msg}"),
        _ => error!(target: "whatsapp_sidecar", "{msg}"),
    }
}

fn pino_level(line: &str) -> Option<(u64, String)> {
    if !line.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let level = value.get("level").and_then(|v| v.as_u64()).unwrap_or(30);
    let msg = value
        .get("msg")
        .and_then(|v| v.as_str())
        .unwrap_or(line)
        .to_string();
    Some((level, msg))
}

async fn run_npm(dir: &Path, args: &[&str]) -> Result<()> {
    info!(path = %dir.display(), ?args, "running npm for whatsapp sidecar");
    let output = Command::new("npm")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .with_context(|| format!("failed to run npm {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "npm {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_needs_package_json() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_sidecar_dir(Some(dir.path())).is_err());

        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        assert_eq!(find_sidecar_dir(Some(dir.path())).unwrap(), dir.path());
        assert!(!is_sidecar_built(dir.path()));
    }

    #[test]
    fn bundled_sidecar_is_found_and_built() {
        let bundled = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .join(SIDECAR_REL_PATH);
        let dir = find_sidecar_dir(Some(&bundled)).unwrap();
        assert!(is_sidecar_built(&dir));

        let package: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("package.json")).unwrap())
                .unwrap();
        assert_eq!(package["main"], "dist/index.js");
        assert!(package["scripts"]["build"].is_string());
    }

    #[test]
    fn pino_lines_are_parsed() {
        assert_eq!(
            pino_level(r#"{"level":40,"msg":"stream errored"}"#),
            Some((40, "stream errored".into()))
        );
        assert_eq!(pino_level("plain text"), None);
        assert_eq!(pino_level("{not json"), None);
    }
}
