//! Blocking client for a GROBID server.
//!
//! GROBID turns a PDF into TEI XML. A busy server answers 503; the client
//! sleeps `sleep_time` seconds and tries again a few times before giving
//! up. Every other failure aborts the document.

use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::multipart::Form;
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::config::GrobidConfig;
use crate::error::{Error, Result};

const FULLTEXT_SERVICE: &str = "processFulltextDocument";
const MAX_BUSY_RETRIES: u32 = 3;

/// Per-document switches for `processFulltextDocument`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FulltextOptions {
    /// Wrap sentences in `<s>`; required for sentence-level passages.
    pub segment_sentences: bool,
    /// Ask for `coords` on the configured elements.
    pub tei_coordinates: bool,
}

pub struct GrobidClient {
    client: reqwest::blocking::Client,
    config: GrobidConfig,
}

impl GrobidClient {
    pub fn new(config: &GrobidConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| Error::configuration(format!("cannot build HTTP client: {}", e)))?;
        Ok(GrobidClient {
            client,
            config: config.clone(),
        })
    }

    fn url(&self, service: &str) -> String {
        format!("{}/api/{}", self.config.grobid_server.trim_end_matches('/'), service)
    }

    pub fn is_alive(&self) -> bool {
        match self.client.get(self.url("isalive")).send() {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                warn!(server = %self.config.grobid_server, error = %e, "GROBID server unreachable");
                false
            }
        }
    }

    /// Form fields sent alongside the PDF.
    pub fn form_fields(&self, options: FulltextOptions) -> Vec<(&'static str, String)> {
        let flag = |on: bool| (if on { "1" } else { "0" }).to_string();
        let mut fields = vec![
            ("consolidateHeader", flag(true)),
            ("consolidateCitations", flag(false)),
            ("segmentSentences", flag(options.segment_sentences)),
            ("includeRawCitations", flag(false)),
            ("includeRawAffiliations", flag(false)),
            ("generateIDs", flag(true)),
        ];
        if options.tei_coordinates {
            fields.extend(
                self.config
                    .coordinates
                    .iter()
                    .map(|tag| ("teiCoordinates", tag.clone())),
            );
        }
        fields
    }

    /// Convert one PDF into TEI XML.
    pub fn process_fulltext(&self, pdf: &Path, options: FulltextOptions) -> Result<String> {
        let url = self.url(FULLTEXT_SERVICE);
        info!(file = %pdf.display(), %url, "sending document to GROBID");

        for attempt in 0..=MAX_BUSY_RETRIES {
            let mut form = Form::new()
                .file("input", pdf)
                .map_err(|e| Error::extraction(format!("cannot read {}: {}", pdf.display(), e)))?;
            for (name, value) in self.form_fields(options) {
                form = form.text(name, value);
            }

            let response = self
                .client
                .post(&url)
                .multipart(form)
                .send()
                .map_err(|e| Error::extraction(format!("GROBID request failed: {}", e)))?;

            match response.status() {
                StatusCode::OK => {
                    return response
                        .text()
                        .map_err(|e| Error::extraction(format!("cannot read GROBID reply: {}", e)));
                }
                StatusCode::SERVICE_UNAVAILABLE if attempt < MAX_BUSY_RETRIES => {
                    warn!(attempt, wait_secs = self.config.sleep_time, "GROBID busy, retrying");
                    thread::sleep(Duration::from_secs(self.config.sleep_time));
                }
                StatusCode::NO_CONTENT => {
                    return Err(Error::extraction(format!(
                        "GROBID extracted no content from {}",
                        pdf.display()
                    )));
                }
                status => {
                    let body = response.text().unwrap_or_default();
                    return Err(Error::extraction(format!(
                        "GROBID returned {} for {}: {}",
                        status,
                        pdf.display(),
                        body.trim()
                    )));
                }
            }
        }
        Err(Error::extraction(format!(
            "GROBID stayed busy after {} retries",
            MAX_BUSY_RETRIES
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &str) -> GrobidClient {
        GrobidClient::new(&GrobidConfig {
            grobid_server: server.to_string(),
            ..GrobidConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn service_urls() {
        assert_eq!(
            client("http://localhost:8070/").url(FULLTEXT_SERVICE),
            "http://localhost:8070/api/processFulltextDocument"
        );
        assert_eq!(client("http://grobid:8070").url("isalive"), "http://grobid:8070/api/isalive");
    }

    #[test]
    fn default_form_fields() {
        let fields = client("http://x").form_fields(FulltextOptions::default());
        let get = |k: &str| fields.iter().find(|(n, _)| *n == k).map(|(_, v)| v.as_str());
        assert_eq!(get("consolidateHeader"), Some("1"));
        assert_eq!(get("consolidateCitations"), Some("0"));
        assert_eq!(get("segmentSentences"), Some("0"));
        assert_eq!(get("generateIDs"), Some("1"));
        assert_eq!(get("teiCoordinates"), None);
    }

    #[test]
    fn coordinates_and_sentences() {
        let fields = client("http://x").form_fields(FulltextOptions {
            segment_sentences: true,
            tei_coordinates: true,
        });
        let coords: Vec<&str> = fields
            .iter()
            .filter(|(n, _)| *n == "teiCoordinates")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(coords, vec!["persName", "figure", "ref", "biblStruct", "formula", "s"]);
        assert!(fields.contains(&("segmentSentences", "1".to_string())));
    }

    #[test]
    fn unreadable_pdf_is_an_extraction_failure() {
        let err = client("http://127.0.0.1:9")
            .process_fulltext(Path::new("/nonexistent/paper.pdf"), FulltextOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
