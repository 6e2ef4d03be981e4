//! @acp:module "Document Converter"
//! @acp:summary "Run the external markdown converter under a timeout and fix table styles"
//! @acp:domain engine
//! @acp:layer output

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::{ConverterConfig, TableStyle};
use crate::error::{CheckmateError, Result};

/// Main content part of a word processing archive
const DOCUMENT_PART: &str = "word/document.xml";

/// @acp:summary "External converter invocation settings"
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConverterConfig,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Command line arguments for one conversion
    pub fn arguments(&self, input: &Path, output: &Path, reference: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            format!("--from={}", self.config.from),
            format!("--to={}", self.config.to),
            format!("--columns={}", self.config.columns),
            "--wrap=preserve".to_string(),
            format!("--output={}", output.display()),
        ];
        if let Some(reference) = reference {
            args.push(format!("--reference-doc={}", reference.display()));
        }
        args.push(input.display().to_string());
        args
    }

    /// @acp:summary "Convert markdown into a document written to `output`"
    ///
    /// Nothing is written to `output` unless conversion and post-processing
    /// both succeed.
    pub fn convert(&self, markdown: &str, reference: Option<&[u8]>, output: &Path) -> Result<()> {
        let workdir = TempDir::new()?;
        let input = workdir.path().join("input.md");
        fs::write(&input, markdown)?;
        let produced = workdir.path().join(format!("output.{}", self.config.to));

        let reference_path = match reference {
            Some(bytes) => {
                let path = workdir.path().join(format!("reference.{}", self.config.to));
                fs::write(&path, bytes)?;
                Some(path)
            }
            None => None,
        };

        let args = self.arguments(&input, &produced, reference_path.as_deref());
        tracing::debug!(program = %self.config.program, ?args, "running converter");
        run_blocking(
            &self.config.program,
            &args,
            Duration::from_secs(self.config.timeout_secs),
        )?;

        if !produced.is_file() {
            return Err(CheckmateError::Conversion(format!(
                "{} produced no output",
                self.config.program
            )));
        }
        fix_table_style(&produced, output, &self.config.table_style)
    }
}

async fn run(program: &str, args: &[String], limit: Duration) -> Result<()> {
    let child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CheckmateError::Conversion(format!("cannot start {}: {}", program, e)))?;

    // Dropping the pending wait on timeout kills the child
    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| {
            CheckmateError::Conversion(format!(
                "{} timed out after {}s",
                program,
                limit.as_secs()
            ))
        })?
        .map_err(|e| CheckmateError::Conversion(format!("{} failed: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CheckmateError::Conversion(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Drive the async runner from synchronous code
///
/// Inside an existing runtime the conversion runs on a scoped thread with its
/// own runtime, since blocking the caller's runtime thread is not allowed.
fn run_blocking(program: &str, args: &[String], limit: Duration) -> Result<()> {
    let execute = || -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(run(program, args, limit))
    };

    if tokio::runtime::Handle::try_current().is_ok() {
        std::thread::scope(|scope| scope.spawn(execute).join()).unwrap_or_else(|_| {
            Err(CheckmateError::Conversion(
                "converter thread panicked".to_string(),
            ))
        })
    } else {
        execute()
    }
}

/// Replace the table style identifier inside document XML
pub fn replace_table_style(xml: &str, style: &TableStyle) -> String {
    xml.replace(
        &format!("<w:tblStyle w:val=\"{}\" />", style.source),
        &format!("<w:tblStyle w:val=\"{}\" />", style.target),
    )
}

/// Copy a document archive to `target`, rewriting the table style of its
/// main content part
pub fn fix_table_style(source: &Path, target: &Path, style: &TableStyle) -> Result<()> {
    let mut archive = ZipArchive::new(File::open(source)?)?;
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut temp = NamedTempFile::new_in(&parent)?;
    {
        let mut zip = ZipWriter::new(temp.as_file_mut());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            if entry.is_dir() {
                zip.add_directory(name.as_str(), options)?;
                continue;
            }
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            if name == DOCUMENT_PART {
                let xml = String::from_utf8_lossy(&content);
                content = replace_table_style(&xml, style).into_bytes();
            }
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&content)?;
        }
        zip.finish()?;
    }
    temp.persist(target).map_err(|e| CheckmateError::Io(e.error))?;
    Ok(())
}
