//! Run settings: built-in defaults, then an optional settings file, then
//! `PAPERQA_*` environment variables (`__` separates nested keys, e.g.
//! `PAPERQA_ENDPOINT__URL`).

use std::fs;
use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::generation::{DEFAULT_TEMPLATE, TEXT_PLACEHOLDER};
use crate::normalize::{default_patterns, default_substitutions, Normalizer, Substitution};
use crate::tei::PassageOptions;

/// Settings file looked up in the working directory when no path is given.
pub const DEFAULT_SETTINGS_NAME: &str = "paper_qa";
pub const ENV_PREFIX: &str = "PAPERQA";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: EndpointSettings,
    pub grobid: GrobidConfig,
    pub segmenter: SegmenterSettings,
    pub passages: PassageSettings,
    pub normalizer: NormalizerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub url: String,
    pub model: String,
    /// Zero disables the client-side timeout.
    pub timeout_secs: u64,
    pub max_tokens: u32,
    /// Instruction template; `{text}` is replaced by the unit.
    pub template: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        EndpointSettings {
            url: "http://localhost:7860/v1/chat/completions".to_string(),
            model: "string".to_string(),
            timeout_secs: 120,
            max_tokens: 0,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Options for the GROBID service. Also written verbatim as the side
/// configuration file GROBID clients read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrobidConfig {
    pub grobid_server: String,
    pub batch_size: u32,
    /// Seconds to wait when the server reports it is busy.
    pub sleep_time: u64,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// TEI elements GROBID should attach page coordinates to.
    pub coordinates: Vec<String>,
}

impl Default for GrobidConfig {
    fn default() -> Self {
        GrobidConfig {
            grobid_server: "http://localhost:8070".to_string(),
            batch_size: 1000,
            sleep_time: 5,
            timeout: 60,
            coordinates: ["persName", "figure", "ref", "biblStruct", "formula", "s"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl GrobidConfig {
    /// Write the side configuration file as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterSettings {
    /// Window length in chars; consecutive windows overlap by half.
    pub window_size: usize,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        SegmenterSettings { window_size: 400 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassageSettings {
    pub use_paragraphs: bool,
    pub capture_coordinates: bool,
    /// Send the header abstract before the body passages.
    pub include_abstract: bool,
}

impl Default for PassageSettings {
    fn default() -> Self {
        PassageSettings {
            use_paragraphs: true,
            capture_coordinates: false,
            include_abstract: true,
        }
    }
}

impl PassageSettings {
    pub fn options(&self) -> PassageOptions {
        PassageOptions {
            use_paragraphs: self.use_paragraphs,
            capture_coordinates: self.capture_coordinates,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerSettings {
    pub substitutions: Vec<Substitution>,
    pub patterns: Vec<String>,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        NormalizerSettings {
            substitutions: default_substitutions(),
            patterns: default_patterns(),
        }
    }
}

impl NormalizerSettings {
    pub fn build(&self) -> Result<Normalizer> {
        Normalizer::new(self.substitutions.clone(), &self.patterns)
    }
}

/// `PAPERQA_SECTION__KEY` variables. The prefix is joined with a single
/// underscore; config defaults it to the nesting separator otherwise.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

impl Settings {
    /// Load settings. An explicit `path` must exist; otherwise
    /// `paper_qa.{toml,json,yaml}` is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Settings::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_SETTINGS_NAME).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would make a run misbehave before any request
    /// is sent.
    pub fn validate(&self) -> Result<()> {
        if self.segmenter.window_size == 0 {
            return Err(Error::configuration("segmenter.window_size must be greater than zero"));
        }
        if !self.endpoint.template.contains(TEXT_PLACEHOLDER) {
            return Err(Error::configuration(format!(
                "endpoint.template must contain {}",
                TEXT_PLACEHOLDER
            )));
        }
        if self.endpoint.url.trim().is_empty() {
            return Err(Error::configuration("endpoint.url is empty"));
        }
        self.normalizer.build()?;
        Ok(())
    }
}
