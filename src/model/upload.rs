use std::path::Path;
use image::ImageFormat;

/// A file to be sent as one multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        FileUpload { file_name: file_name.into(), content_type: content_type.into(), bytes }
    }

    /// An image upload; the content type is sniffed from the bytes.
    pub fn image(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let content_type = image::guess_format(&bytes)
            .map(image_mime)
            .unwrap_or("application/octet-stream");
        FileUpload::new(file_name, content_type, bytes)
    }

    /// Model weights (`.pt` / `.pth`); always sent as octet-stream.
    pub fn weights(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        FileUpload::new(file_name, "application/octet-stream", bytes)
    }

    /// Reads an image from disk.
    pub fn image_from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(FileUpload::image(file_name_of(path), bytes))
    }

    /// Reads model weights from disk.
    pub fn weights_from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(FileUpload::weights(file_name_of(path), bytes))
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("upload")
        .to_owned()
}

fn image_mime(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png  => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif  => "image/gif",
        ImageFormat::Bmp  => "image/bmp",
        _                 => "application/octet-stream",
    }
}
