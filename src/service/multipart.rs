// Extraction of one uploaded file from a multipart/form-data body.

use bytes::Bytes;
use std::convert::Infallible;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file part")]
    NoFilePart,

    #[error("No selected file")]
    NoSelectedFile,

    #[error("Malformed upload: {0}")]
    Malformed(#[from] multer::Error),
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Reads the file part named `field` out of an already collected body.
///
/// Parts without a filename are form values, not files, and are skipped.
pub async fn read_file_field(
    content_type: Option<&str>,
    body: Bytes,
    field: &str,
) -> Result<UploadedFile, UploadError> {
    let Some(boundary) = content_type.and_then(|ct| multer::parse_boundary(ct).ok()) else {
        return Err(UploadError::NoFilePart);
    };
    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(part) = multipart.next_field().await? {
        if part.name() != Some(field) {
            continue;
        }
        let Some(file_name) = part.file_name().map(str::to_string) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(UploadError::NoSelectedFile);
        }
        let bytes = part.bytes().await?;
        return Ok(UploadedFile { file_name, bytes });
    }
    Err(UploadError::NoFilePart)
}

#[cfg(test)]
pub(crate) fn form_body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
    let mut out = String::new();
    for (name, file_name, content) in parts {
        out.push_str(&format!("--{boundary}\r\n"));
        match file_name {
            Some(f) => out.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: text/html\r\n\r\n"
            )),
            None => out.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
        }
        out.push_str(content);
        out.push_str("\r\n");
    }
    out.push_str(&format!("--{boundary}--\r\n"));
    out.into_bytes()
}
