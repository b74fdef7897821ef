use serde::{Deserialize, Serialize};

/// Pixel-to-musical-time mapping the model inferred from the screenshot.
/// Advisory calibration metadata; the encoder works in beats, not pixels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridInfo {
    pub pixels_per_beat: u32,
    pub pixels_per_semitone: u32,
    pub total_beats: u32,
    pub lowest_note: u8,
    pub highest_note: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub midi_note: u8,
    pub start_beat: f64,
    pub duration_beats: f64,
    #[serde(default = "default_velocity")]
    pub velocity: u8,
}

pub(crate) fn default_velocity() -> u8 {
    100
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnalysisResult {
    pub grid: GridInfo,
    pub notes: Vec<NoteEvent>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProcessingOutcome {
    pub success: bool,
    pub message: String,
}
