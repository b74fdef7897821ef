use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use piano_roll_midi::{Args, OpenAiVisionClient, ScreenshotProcessor};
use std::env;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        bail!("Please set the OPENAI_API_KEY environment variable..!");
    };

    // Never log the credential itself; a short prefix is enough to tell
    // keys apart when debugging.
    let prefix: String = api_key.chars().take(4).collect();
    info!("Using API key: {prefix}...");

    info!("Input image: {}", args.image.display());
    info!("Output MIDI: {}", args.output.display());

    let client = OpenAiVisionClient::new(api_key, args.model, &args.api_url);
    let processor = ScreenshotProcessor::new(client, args.tempo);
    let outcome = processor.process(&args.image, &args.output);

    println!(
        "Result: {}",
        if outcome.success { "Success" } else { "Failed" }
    );
    println!("{}", outcome.message);

    Ok(())
}
