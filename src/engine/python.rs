use super::{Engine, types::*};
use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const RUNNER_SCRIPT: &str = "docling_runner.py";

/// Requests understood by `scripts/docling_runner.py`, one JSON object on
/// stdin. The runner answers with one JSON object on stdout.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
enum RunnerRequest<'a> {
    Doctor { cfg: &'a Config },
    Convert { req: &'a ConvertIn, cfg: &'a Config },
}

pub struct PythonEngine {
    cfg: Config,
    runner: PathBuf,
    python_exe: PathBuf,
}

impl PythonEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let scripts_dir = PathBuf::from(&cfg.paths.scripts_dir);
        if cfg.security.pin_scripts_dir {
            let cwd = std::env::current_dir().with_context(|| "current_dir")?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&cwd) {
                return Err(anyhow!(
                    "scripts_dir is outside cwd while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }
        let runner = scripts_dir.join(RUNNER_SCRIPT);
        if !runner.exists() {
            return Err(anyhow!("missing script: {}", runner.display()));
        }
        let python_exe = resolve_python_exe(&cfg.docling.python_exe);
        debug!("python={} runner={}", python_exe.display(), runner.display());
        Ok(Self {
            cfg: cfg.clone(),
            runner,
            python_exe,
        })
    }

    fn call<O: DeserializeOwned>(&self, request: &RunnerRequest<'_>, timeout: Option<Duration>) -> Result<O> {
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(&self.runner)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&self.cfg.docling.env);
        if !self.cfg.docling.ocr.models_dir.is_empty() {
            cmd.env("MARKBRIDGE_MODELS_DIR", expand_tilde(&self.cfg.docling.ocr.models_dir));
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning python: {}", self.python_exe.display()))?;

        {
            let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            serde_json::to_writer(&mut stdin, request).with_context(|| "writing runner request")?;
            stdin.flush().ok();
        }

        let output = match timeout {
            Some(limit) => wait_with_timeout(&mut child, limit)?,
            None => child
                .wait_with_output()
                .with_context(|| "waiting for python")?,
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(anyhow!(
                "docling runner failed ({}): {}",
                output.status,
                stderr.trim()
            ));
        }
        if self.cfg.debug.keep_python_stderr && !stderr.trim().is_empty() {
            debug!("runner stderr: {}", stderr.trim());
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing runner JSON output: {}", self.runner.display()))
    }
}

impl Engine for PythonEngine {
    fn doctor(&self) -> Result<DocDiag> {
        let timeout = Duration::from_secs(self.cfg.docling.doctor_timeout_seconds.max(1));
        self.call(&RunnerRequest::Doctor { cfg: &self.cfg }, Some(timeout))
    }

    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut> {
        let timeout = match self.cfg.docling.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        info!("docling convert {} mode={}", req.input_path, req.image_mode.as_str());
        let out: ConvertOut = self.call(&RunnerRequest::Convert { req, cfg: &self.cfg }, timeout)?;
        if !out.ok {
            warn!("docling convert returned ok=false for {}", req.input_path);
        }
        Ok(out)
    }
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if !raw.is_empty() && !raw.eq_ignore_ascii_case("auto") {
        return expand_tilde(raw);
    }
    if let Ok(env_val) = std::env::var("DOCLING_PYTHON") {
        let p = expand_tilde(&env_val);
        if p.exists() {
            return p;
        }
    }
    let venv = Path::new(".venv").join("bin").join("python");
    if venv.exists() {
        return venv;
    }
    PathBuf::from("python3")
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn drain<R: Read + Send + 'static>(reader: Option<R>, name: &'static str) -> JoinHandle<Result<Vec<u8>>> {
    std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            r.read_to_end(&mut buf)
                .with_context(|| format!("read {name}"))?;
        }
        Ok(buf)
    })
}

fn collect(
    status: std::process::ExitStatus,
    stdout: JoinHandle<Result<Vec<u8>>>,
    stderr: JoinHandle<Result<Vec<u8>>>,
) -> Result<Output> {
    let stdout = stdout
        .join()
        .map_err(|_| anyhow!("stdout reader thread panicked"))??;
    let stderr = stderr
        .join()
        .map_err(|_| anyhow!("stderr reader thread panicked"))??;
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Docling logs heavily; both pipes are drained while waiting so the child
    // never blocks on a full buffer.
    let stdout = drain::<ChildStdout>(child.stdout.take(), "stdout");
    let stderr = drain::<ChildStderr>(child.stderr.take(), "stderr");

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            return collect(status, stdout, stderr);
        }

        if start.elapsed() > timeout {
            warn!("docling runner timed out after {:?}", timeout);
            let _ = child.kill();
            let status = child.wait().with_context(|| "wait after kill")?;
            let output = collect(status, stdout, stderr)?;
            return Err(anyhow!(
                "docling runner exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
