use crate::error::AnalysisError;
use crate::image_loader::{encode_image, validate_image};
use crate::midi_encoder::write_midi_file;
use crate::model::analysis::ProcessingOutcome;
use crate::response_parser::parse_response;
use crate::vision::VisionClient;
use log::{error, info};
use std::path::Path;

/// Runs the whole screenshot-to-MIDI pipeline: validate input, encode it,
/// ask the vision model, parse the reply, write the file.
#[derive(Debug)]
pub struct ScreenshotProcessor<C: VisionClient> {
    client: C,
    tempo_bpm: u16,
}

impl<C: VisionClient> ScreenshotProcessor<C> {
    pub fn new(client: C, tempo_bpm: u16) -> Self {
        Self { client, tempo_bpm }
    }

    /// The single error-containment point: every component failure comes back
    /// as an unsuccessful outcome, nothing propagates past here.
    pub fn process(&self, input: &Path, output: &Path) -> ProcessingOutcome {
        info!(
            "Processing screenshot: {} -> {}",
            input.display(),
            output.display()
        );

        match self.run(input, output) {
            Ok(message) => ProcessingOutcome {
                success: true,
                message,
            },
            Err(e) => {
                error!("Processing failed: {e}");
                ProcessingOutcome {
                    success: false,
                    message: e.to_string(),
                }
            }
        }
    }

    fn run(&self, input: &Path, output: &Path) -> Result<String, AnalysisError> {
        if !input.is_file() {
            return Err(AnalysisError::FileNotFound(input.to_path_buf()));
        }

        validate_image(input)?;

        let base64_image = encode_image(input)?;
        let raw = self.client.analyze(&base64_image)?;
        let analysis = parse_response(&raw)?;

        write_midi_file(&analysis.notes, output, self.tempo_bpm)?;

        Ok(format!(
            "Successfully created MIDI file: {}",
            output.display()
        ))
    }
}
