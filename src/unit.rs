use serde::Serialize;

/// Where a passage came from inside the source markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub section: String,
    pub sub_section: String,
    pub id: String,
    pub coordinates: String,
}

/// One chunk of text submitted to the generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub content: String,
    pub provenance: Option<Provenance>,
}

impl TextUnit {
    /// A window cut from plain text; carries no provenance.
    pub fn window(content: impl Into<String>) -> Self {
        TextUnit {
            content: content.into(),
            provenance: None,
        }
    }

    pub fn with_provenance(content: impl Into<String>, provenance: Provenance) -> Self {
        TextUnit {
            content: content.into(),
            provenance: Some(provenance),
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> &str {
        match &self.provenance {
            Some(p) => &p.id,
            None => "window",
        }
    }
}
