use crate::error::AnalysisError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::ImageReader;
use log::{debug, info};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// Opens the file as a raster image and decodes it to prove it is one.
/// This probe is separate from (and runs before) base64 encoding.
pub fn validate_image(path: &Path) -> Result<ImageMetadata, AnalysisError> {
    let invalid = |reason: String| AnalysisError::InvalidImage {
        path: path.to_path_buf(),
        reason,
    };

    let reader = ImageReader::open(path)
        .map_err(|e| invalid(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| invalid(e.to_string()))?;

    let format = reader
        .format()
        .ok_or_else(|| invalid(String::from("unrecognized image format")))?;

    let img = reader.decode().map_err(|e| invalid(e.to_string()))?;

    let metadata = ImageMetadata {
        format: format!("{format:?}"),
        width: img.width(),
        height: img.height(),
    };

    debug!(
        "Validated image: {} {}x{}",
        metadata.format, metadata.width, metadata.height
    );

    Ok(metadata)
}

/// Reads the image file and base64-encodes its raw bytes for API submission.
pub fn encode_image(path: &Path) -> Result<String, AnalysisError> {
    info!("Loading image from: {}", path.display());

    if !path.is_file() {
        return Err(AnalysisError::FileNotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path).map_err(|e| {
        AnalysisError::Encoding(format!("Failed to read image {}: {}", path.display(), e))
    })?;

    let encoded = BASE64.encode(bytes);
    debug!("Successfully encoded image, length: {}..!", encoded.len());

    Ok(encoded)
}

#[cfg(test)]
mod test {
    use super::*;
    use base64::Engine as _;
    use std::io::Write;

    fn write_test_png(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("roll.png");
        let img = image::RgbImage::from_pixel(16, 8, image::Rgb([40, 40, 40]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn validates_a_real_png() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        let path = write_test_png(&dir);

        let meta = validate_image(&path).unwrap();
        assert_eq!(meta.width, 16);
        assert_eq!(meta.height, 8);
        assert_eq!(meta.format, "Png");
    }

    #[test]
    fn rejects_non_image_bytes() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_an_image.png");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"definitely not pixels").unwrap();

        let err = validate_image(&path).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidImage { .. }));
    }

    #[test]
    fn encode_missing_file_is_not_found() {
        env_logger::try_init().unwrap_or(());

        let err = encode_image(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, AnalysisError::FileNotFound(_)));
    }

    #[test]
    fn encode_round_trips_through_base64() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        let path = write_test_png(&dir);

        let encoded = encode_image(&path).unwrap();
        let decoded = BASE64.decode(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, fs::read(&path).unwrap());
    }
}
