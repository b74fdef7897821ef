use crate::error::AnalysisError;
use log::{debug, info};

/// Keeps the single-document reply bounded; there is no continuation protocol.
const MAX_RESPONSE_TOKENS: u32 = 4096;

const ANALYSIS_PROMPT: &str = r#"You are an expert music notation analyzer. Examine this MIDI piano roll screenshot with precision. For each note block visible:
1. Determine its exact vertical position (MIDI note number)
2. Calculate its horizontal position (start beat), pay close attention to the numbers at top that indicate what beat the notes start on.
3. Measure its length (duration in beats)
4. If visible, note its velocity (default to 100 if not clear)

Return ONLY this JSON format with no additional text:
{
    "grid_info": {
        "pixels_per_beat": int,
        "pixels_per_semitone": int,
        "total_beats": int,
        "lowest_note": int,
        "highest_note": int
    },
    "notes": [
        {
            "midi_note": int,
            "start_beat": float,
            "duration_beats": float,
            "velocity": int
        }
    ]
}"#;

/// One screenshot in, the model's raw reply text out. The HTTP client
/// implements this; tests substitute a canned-response fake.
pub trait VisionClient {
    fn analyze(&self, base64_image: &str) -> Result<String, AnalysisError>;
}

/// Sends screenshots to an OpenAI-compatible chat completions endpoint.
pub struct OpenAiVisionClient {
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiVisionClient {
    pub fn new(api_key: String, model: String, api_url: &str) -> Self {
        let api_url = api_url.trim_end_matches('/').to_string();
        info!("OpenAiVisionClient: endpoint {api_url}, model {model}");
        Self {
            api_url,
            api_key,
            model,
        }
    }
}

impl VisionClient for OpenAiVisionClient {
    fn analyze(&self, base64_image: &str) -> Result<String, AnalysisError> {
        // MIME is declared PNG regardless of the source format; the loader
        // already proved the bytes decode and the endpoint sniffs content.
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": ANALYSIS_PROMPT},
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:image/png;base64,{base64_image}")
                            }
                        }
                    ]
                }
            ],
            "max_tokens": MAX_RESPONSE_TOKENS,
        });

        info!("Sending analysis request to the vision endpoint...");
        let resp: serde_json::Value =
            ureq::post(&format!("{}/chat/completions", self.api_url))
                .set("Authorization", &format!("Bearer {}", self.api_key))
                .set("Content-Type", "application/json")
                .send_json(body)
                .map_err(|e| AnalysisError::Upstream(e.to_string()))?
                .into_json()
                .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("");

        debug!("Raw model response:\n{content}\n---End of raw response---");
        Ok(content.to_string())
    }
}
