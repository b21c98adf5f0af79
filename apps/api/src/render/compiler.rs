//! Document compiler: LaTeX source in, PDF bytes out.
//!
//! `PdflatexCompiler` runs one `pdflatex` pass in a throwaway directory.
//! On failure the `.log` file is returned verbatim so the caller can show it.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::resume::reconstruct::{DOCUMENT_END, PREAMBLE};

/// Lines of stdout kept when pdflatex prints nothing to stderr.
const STDOUT_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Could not start '{bin}': {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("LaTeX compilation timed out after {0}s")]
    Timeout(u64),

    #[error("LaTeX compilation failed: {stderr}")]
    Failed { stderr: String, log: String },

    #[error("PDF generation failed")]
    MissingOutput { log: String },

    #[error("I/O error during compilation: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// The compiler's log file, when one was produced.
    pub fn log(&self) -> Option<&str> {
        match self {
            CompileError::Failed { log, .. } | CompileError::MissingOutput { log } => {
                Some(log.as_str())
            }
            _ => None,
        }
    }
}

/// Compiles a complete markup document to PDF.
#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    async fn compile(&self, source: &str) -> Result<Vec<u8>, CompileError>;
}

#[derive(Debug, Clone)]
pub struct PdflatexCompiler {
    bin: String,
    timeout: Duration,
}

impl PdflatexCompiler {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }
}

#[async_trait]
impl DocumentCompiler for PdflatexCompiler {
    async fn compile(&self, source: &str) -> Result<Vec<u8>, CompileError> {
        let dir = tempfile::tempdir()?;
        let base = Uuid::new_v4().to_string();
        let tex_name = format!("{base}.tex");
        tokio::fs::write(dir.path().join(&tex_name), source).await?;
        debug!("Compiling {tex_name} in {}", dir.path().display());

        let child = Command::new(&self.bin)
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(&tex_name)
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => return Err(CompileError::Timeout(self.timeout.as_secs())),
            Ok(Err(source)) => {
                return Err(CompileError::Spawn {
                    bin: self.bin.clone(),
                    source,
                })
            }
            Ok(Ok(output)) => output,
        };

        let log = read_lossy(&dir.path().join(format!("{base}.log"))).await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                tail_lines(&String::from_utf8_lossy(&output.stdout), STDOUT_TAIL_LINES)
            } else {
                stderr
            };
            warn!("LaTeX compilation failed ({}): {stderr}", output.status);
            return Err(CompileError::Failed { stderr, log });
        }

        match tokio::fs::read(dir.path().join(format!("{base}.pdf"))).await {
            Ok(pdf) => {
                info!("LaTeX compilation successful ({} bytes)", pdf.len());
                Ok(pdf)
            }
            Err(_) => {
                warn!("PDF file was not generated");
                Err(CompileError::MissingOutput { log })
            }
        }
    }
}

async fn read_lossy(path: &Path) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Minimal document using every package the generated preamble loads.
pub fn toolchain_check_document() -> String {
    format!("{PREAMBLE}Test\n{DOCUMENT_END}\n")
}

/// Compiles [`toolchain_check_document`] once and logs install hints when it fails.
///
/// Never fatal: parsing and tailoring work without a TeX installation.
pub async fn check_toolchain(compiler: &dyn DocumentCompiler) -> bool {
    match compiler.compile(&toolchain_check_document()).await {
        Ok(_) => {
            info!("LaTeX toolchain check passed");
            true
        }
        Err(e) => {
            warn!(
                "LaTeX toolchain check failed: {e}. PDF rendering will not work. \
                 Install TeX Live, e.g. `apt-get install texlive-latex-base \
                 texlive-latex-recommended texlive-latex-extra texlive-fonts-recommended` \
                 or `brew install --cask mactex`"
            );
            false
        }
    }
}
