use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One source sentence and its machine translation.
///
/// Stored as a two-element array so progress documents keep the
/// `[source, translation]` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Segment {
    pub source: String,
    pub translation: String,
}

impl Segment {
    pub fn new(source: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            translation: translation.into(),
        }
    }
}

impl From<(String, String)> for Segment {
    fn from((source, translation): (String, String)) -> Self {
        Self {
            source,
            translation,
        }
    }
}

impl From<Segment> for (String, String) {
    fn from(segment: Segment) -> Self {
        (segment.source, segment.translation)
    }
}

#[derive(Debug, Error)]
pub enum SegmentLoadError {
    #[error(
        "source and translation must have the same number of lines \
         (source: {source_lines}, translation: {translation_lines})"
    )]
    LineCountMismatch {
        source_lines: usize,
        translation_lines: usize,
    },

    #[error("failed to read {path}: {err}")]
    Read { path: String, err: std::io::Error },
}

fn non_blank_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Pair up the non-blank lines of a source text and its translation.
pub fn load_segments(source: &str, translation: &str) -> Result<Vec<Segment>, SegmentLoadError> {
    let source_lines = non_blank_lines(source);
    let translation_lines = non_blank_lines(translation);

    if source_lines.len() != translation_lines.len() {
        return Err(SegmentLoadError::LineCountMismatch {
            source_lines: source_lines.len(),
            translation_lines: translation_lines.len(),
        });
    }

    Ok(source_lines
        .into_iter()
        .zip(translation_lines)
        .map(|(source, translation)| Segment::new(source, translation))
        .collect())
}

pub fn load_segment_files<P, Q>(source: P, translation: Q) -> Result<Vec<Segment>, SegmentLoadError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let read = |path: &Path| {
        fs::read_to_string(path).map_err(|err| SegmentLoadError::Read {
            path: path.display().to_string(),
            err,
        })
    };
    let source_text = read(source.as_ref())?;
    let translation_text = read(translation.as_ref())?;
    load_segments(&source_text, &translation_text)
}
