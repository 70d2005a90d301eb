//! Plan file storage
//!
//! A plan lives in a single file whose extension selects the format:
//! `.json`, `.yaml`/`.yml` or `.toml`. Reads take a shared lock, writes go
//! to a locked temp file that is renamed over the original.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fs2::FileExt;

use crate::domain::Plan;

/// Serialisation format of a plan file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Yaml,
    Toml,
}

impl PlanFormat {
    /// Picks the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Ok(PlanFormat::Json),
            Some("yaml") | Some("yml") => Ok(PlanFormat::Yaml),
            Some("toml") => Ok(PlanFormat::Toml),
            _ => bail!(
                "Unsupported plan file '{}': expected a .json, .yaml, .yml or .toml extension",
                path.display()
            ),
        }
    }

    pub fn parse(&self, content: &str) -> Result<Plan> {
        match self {
            PlanFormat::Json => serde_json::from_str(content).context("Invalid JSON plan"),
            PlanFormat::Yaml => serde_yaml::from_str(content).context("Invalid YAML plan"),
            PlanFormat::Toml => toml::from_str(content).context("Invalid TOML plan"),
        }
    }

    pub fn render(&self, plan: &Plan) -> Result<String> {
        match self {
            PlanFormat::Json => {
                let mut out =
                    serde_json::to_string_pretty(plan).context("Failed to serialize plan")?;
                out.push('\n');
                Ok(out)
            }
            PlanFormat::Yaml => serde_yaml::to_string(plan).context("Failed to serialize plan"),
            PlanFormat::Toml => toml::to_string_pretty(plan).context("Failed to serialize plan"),
        }
    }
}

/// A plan file on disk
#[derive(Debug, Clone)]
pub struct PlanFile {
    path: PathBuf,
    format: PlanFormat,
}

impl PlanFile {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = PlanFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> PlanFormat {
        self.format
    }

    /// Reads the plan; a missing file is an empty plan
    pub fn read(&self) -> Result<Plan> {
        if !self.path.exists() {
            return Ok(Plan::default());
        }

        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open plan file: {}", self.path.display()))?;

        file.lock_shared()
            .context("Failed to acquire read lock on plan file")?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .with_context(|| format!("Failed to read plan file: {}", self.path.display()))?;

        self.format
            .parse(&content)
            .with_context(|| format!("Failed to parse plan file: {}", self.path.display()))
    }

    /// Replaces the file with `plan`
    pub fn write(&self, plan: &Plan) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let content = self.format.render(plan)?;
        let temp_path = self.temp_path();

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .context("Failed to acquire write lock on plan file")?;

            file.write_all(content.as_bytes())
                .context("Failed to write plan")?;
            file.flush().context("Failed to flush plan file")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
