use std::io::{self, Read};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use styleai_contracts::InlineImage;

use crate::error::{Result, StyleError};

/// Bytes encoded per step. A multiple of 3 so chunk boundaries never need
/// base64 padding and the concatenated output equals a one-shot encode.
pub const ENCODE_CHUNK_BYTES: usize = 3 * 64 * 1024;

const FALLBACK_MIME: &str = "image/png";

/// Streams `reader` into a data URI, encoding at most `chunk_bytes` at a time.
///
/// A declared `image/*` MIME type wins; otherwise the type is sniffed from
/// the first chunk.
pub fn encode_stream<R: Read>(
    mut reader: R,
    declared_mime: Option<&str>,
    chunk_bytes: usize,
) -> io::Result<InlineImage> {
    let chunk_bytes = (chunk_bytes / 3).max(1) * 3;
    let mut buffer = vec![0u8; chunk_bytes];
    let mut payload = String::new();
    let mut mime = declared_mime
        .map(|value| value.split(';').next().unwrap_or_default().trim())
        .filter(|value| value.starts_with("image/"))
        .map(str::to_string);

    loop {
        let filled = fill_chunk(&mut reader, &mut buffer)?;
        if filled == 0 {
            break;
        }
        if mime.is_none() {
            mime = Some(sniff_mime(&buffer[..filled]).to_string());
        }
        BASE64.encode_string(&buffer[..filled], &mut payload);
        if filled < buffer.len() {
            break;
        }
    }

    if payload.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "image body was empty",
        ));
    }
    let mime = mime.unwrap_or_else(|| FALLBACK_MIME.to_string());
    Ok(InlineImage::from_base64(&mime, &payload))
}

pub fn encode_bytes(bytes: &[u8], declared_mime: Option<&str>) -> Result<InlineImage> {
    encode_stream(bytes, declared_mime, ENCODE_CHUNK_BYTES)
        .map_err(|err| StyleError::MalformedResponse(format!("failed to encode image: {err}")))
}

pub fn decode(image: &InlineImage) -> Result<Vec<u8>> {
    let payload = image.base64_payload().ok_or_else(|| {
        StyleError::MalformedResponse("image is not a base64 data URI".to_string())
    })?;
    BASE64
        .decode(payload.trim())
        .map_err(|err| StyleError::MalformedResponse(format!("invalid base64 image data: {err}")))
}

pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MIME)
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    ImageFormat::from_mime_type(mime)
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("png")
}

fn fill_chunk<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
