use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "piano-roll-midi",
    about = "Turn a piano-roll screenshot into a playable MIDI file!"
)]
pub struct Args {
    /// Path to the piano-roll screenshot.
    pub image: PathBuf,

    /// Path to write the output MIDI file to.
    pub output: PathBuf,

    /// Tempo of the output file, in beats per minute.
    #[arg(short, long, default_value_t = 120)]
    pub tempo: u16,

    /// Vision model to request from the endpoint.
    #[arg(short, long, default_value = "gpt-4o")]
    pub model: String,

    /// Base URL of an OpenAI-compatible chat completions API.
    #[arg(long = "api-url", default_value = "https://api.openai.com/v1")]
    pub api_url: String,
}
