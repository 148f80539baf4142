//! Sequential driver: one unit at a time, in document order.
//!
//! A unit whose request fails contributes no records; the run always
//! continues with the next unit.

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{PassageSettings, Settings};
use crate::error::Result;
use crate::generation::{ChatTransport, GenerationReply, Generator};
use crate::normalize::Normalizer;
use crate::reply::{parse_reply, QaRecord};
use crate::segment::{check_window, segment};
use crate::tei::{self, ABSTRACT_SECTION};
use crate::unit::{Provenance, TextUnit};

/// Totals for one run, plus the records in document order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub records: Vec<QaRecord>,
    pub units: usize,
    pub failed_units: usize,
    pub blank_units: usize,
    pub skipped_segments: usize,
}

pub struct Pipeline<T> {
    normalizer: Normalizer,
    generator: Generator<T>,
}

impl<T: ChatTransport> Pipeline<T> {
    pub fn new(normalizer: Normalizer, generator: Generator<T>) -> Self {
        Pipeline {
            normalizer,
            generator,
        }
    }

    pub fn from_settings(settings: &Settings, transport: T) -> Result<Self> {
        Ok(Pipeline::new(
            settings.normalizer.build()?,
            Generator::new(transport, &settings.endpoint)?,
        ))
    }

    /// Normalize, request and parse one unit, appending its records.
    pub fn process_unit(&self, unit: &TextUnit, summary: &mut RunSummary) {
        summary.units += 1;
        let text = self.normalizer.normalize(&unit.content);
        if text.trim().is_empty() {
            debug!(unit = unit.label(), "blank unit, not sent");
            summary.blank_units += 1;
            return;
        }

        let reply = self.generator.request_completion(&text);
        if let GenerationReply::Failed(failure) = &reply {
            warn!(unit = unit.label(), ?failure, "no records for unit");
            summary.failed_units += 1;
            return;
        }

        let mut pairs = parse_reply(&reply);
        summary.records.extend(pairs.by_ref());
        summary.skipped_segments += pairs.skipped();
    }

    pub fn run<I>(&self, units: I, progress: &ProgressBar) -> RunSummary
    where
        I: IntoIterator<Item = TextUnit>,
    {
        let mut summary = RunSummary::default();
        for unit in units {
            progress.set_message(format!("unit {}", unit.label()));
            self.process_unit(&unit, &mut summary);
            progress.inc(1);
        }
        progress.finish_and_clear();
        info!(
            units = summary.units,
            records = summary.records.len(),
            failed = summary.failed_units,
            blank = summary.blank_units,
            skipped_segments = summary.skipped_segments,
            "run finished"
        );
        summary
    }
}

/// Record waiting for a human-written `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationRecord {
    pub input: String,
    pub output: String,
}

/// Normalized units as annotation records. No endpoint calls.
pub fn annotation_records<'a, I>(units: I, normalizer: &'a Normalizer) -> impl Iterator<Item = AnnotationRecord> + 'a
where
    I: IntoIterator<Item = TextUnit>,
    I::IntoIter: 'a,
{
    units.into_iter().map(move |unit| AnnotationRecord {
        input: normalizer.normalize(&unit.content),
        output: String::new(),
    })
}

/// Windows over every page, in page order. Fails up front on a zero
/// window size.
pub fn window_units(pages: &[String], window_size: usize) -> Result<impl Iterator<Item = TextUnit> + '_> {
    check_window(window_size)?;
    Ok(pages.iter().flat_map(move |page| {
        segment(page, window_size)
            .into_iter()
            .flatten()
            .map(TextUnit::window)
    }))
}

/// The abstract (when enabled and present) followed by the body passages.
pub fn passage_units(tei_xml: &str, settings: &PassageSettings) -> Result<Vec<TextUnit>> {
    let mut units = Vec::new();
    if settings.include_abstract {
        if let Some(text) = tei::extract_abstract(tei_xml)? {
            units.push(TextUnit::with_provenance(
                text,
                Provenance {
                    section: ABSTRACT_SECTION.to_string(),
                    sub_section: String::new(),
                    id: "abstract".to_string(),
                    coordinates: String::new(),
                },
            ));
        }
    }
    units.extend(
        tei::extract_passages(tei_xml, settings.options())?
            .into_iter()
            .map(tei::Passage::into_unit),
    );
    Ok(units)
}
