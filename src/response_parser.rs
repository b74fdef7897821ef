use crate::error::AnalysisError;
use crate::model::analysis::{AnalysisResult, GridInfo, NoteEvent};
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

const MAX_MIDI_VALUE: u8 = 127;

#[derive(Deserialize)]
struct RawAnalysis {
    grid_info: GridInfo,
    notes: Vec<NoteEvent>,
}

/// Extracts the JSON document embedded in the model's free-text reply and
/// validates it into a structured note list plus grid metadata.
///
/// Models wrap their JSON in prose or code fences often enough that we scan
/// for the first balanced object instead of trusting the reply to be pure
/// JSON.
pub fn parse_response(raw: &str) -> Result<AnalysisResult, AnalysisError> {
    let candidate = extract_json(raw)?;
    debug!("Extracted JSON candidate ({} bytes)", candidate.len());

    let value: Value = serde_json::from_str(candidate)?;

    for key in ["grid_info", "notes"] {
        if value.get(key).is_none() {
            return Err(AnalysisError::SchemaViolation(format!(
                "missing required field `{key}`"
            )));
        }
    }

    let analysis: RawAnalysis = serde_json::from_value(value)
        .map_err(|e| AnalysisError::SchemaViolation(e.to_string()))?;

    for (i, note) in analysis.notes.iter().enumerate() {
        validate_note(i, note)?;
    }

    info!("Found {} notes in the image..!", analysis.notes.len());
    debug!(
        "Grid calibration: {} pixels per beat",
        analysis.grid_info.pixels_per_beat
    );

    Ok(AnalysisResult {
        grid: analysis.grid_info,
        notes: analysis.notes,
    })
}

/// Locates the first balanced `{...}` object in the text, tracking string and
/// escape state so stray braces inside the surrounding prose don't cut the
/// document short. Text that opens an object but never balances falls back to
/// the first-`{`/last-`}` window and lets serde report what is wrong with it.
fn extract_json(raw: &str) -> Result<&str, AnalysisError> {
    let start = raw.find('{').ok_or(AnalysisError::NoJsonFound)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&raw[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    let end = raw.rfind('}').map(|i| i + 1).unwrap_or(raw.len());
    Ok(&raw[start..end.max(start + 1)])
}

fn validate_note(index: usize, note: &NoteEvent) -> Result<(), AnalysisError> {
    let reject = |what: &str| {
        Err(AnalysisError::SchemaViolation(format!(
            "note {index}: {what}"
        )))
    };

    if note.midi_note > MAX_MIDI_VALUE {
        return reject(&format!("midi_note {} out of range", note.midi_note));
    }
    if note.velocity > MAX_MIDI_VALUE {
        return reject(&format!("velocity {} out of range", note.velocity));
    }
    if !note.start_beat.is_finite() || note.start_beat < 0.0 {
        return reject(&format!("start_beat {} is not a valid time", note.start_beat));
    }
    if !note.duration_beats.is_finite() || note.duration_beats <= 0.0 {
        return reject(&format!(
            "duration_beats {} must be positive",
            note.duration_beats
        ));
    }

    Ok(())
}
