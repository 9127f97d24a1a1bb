use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use styleai_contracts::{AttributeKind, InlineImage};

use crate::error::{Result, StyleError};
use crate::gateway::{ChatGateway, GatewayReply};
use crate::inline::encode_bytes;
use crate::synthesizer::ImageBackend;

const DRYRUN_SCHEME: &str = "dryrun://";

const GARMENT_COLORS: &[&str] = &[
    "navy blue",
    "charcoal gray",
    "emerald green",
    "burgundy",
    "ivory",
    "mustard yellow",
];

/// Offline chat gateway. Replies are deterministic for a given payload.
pub struct DryrunChatGateway;

impl ChatGateway for DryrunChatGateway {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn send(&self, kind: AttributeKind, payload: &Value) -> Result<GatewayReply> {
        let digest = payload_digest(payload);
        let attributes = match kind {
            AttributeKind::Person => json!({
                "skinTone": "medium, neutral undertone",
                "bodyShape": "rectangle",
                "heightCm": 168,
                "ethnicity": "not determinable from input",
                "sizeEstimate": "M",
                "notes": "dryrun profile",
            }),
            AttributeKind::Garment => json!({
                "category": "top",
                "color": GARMENT_COLORS[digest[0] as usize % GARMENT_COLORS.len()],
                "pattern": "solid",
                "material": "cotton",
                "fit": "regular",
                "style": "casual",
                "occasion": "everyday",
                "notes": "dryrun garment",
            }),
        };
        let content = format!("```json\n{attributes:#}\n```");
        let body = json!({
            "id": format!("dryrun-{:02x}{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2], digest[3]),
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop",
            }],
        });
        Ok(GatewayReply::new(200, body.to_string()))
    }
}

pub struct DryrunImageBackend;

impl ImageBackend for DryrunImageBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn submit(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        let digest = payload_digest(payload);
        let (width, height) = dims_for_size(payload.get("image_size").and_then(Value::as_str));
        let url = format!(
            "{DRYRUN_SCHEME}{:02x}{:02x}{:02x}/{width}x{height}",
            digest[0], digest[1], digest[2]
        );
        Ok(json!({
            "images": [{ "url": url, "width": width, "height": height }],
            "endpoint": endpoint,
        }))
    }

    fn fetch_inline(&self, url: &str) -> Result<InlineImage> {
        let (color, dims) = parse_dryrun_url(url).ok_or_else(|| {
            StyleError::MalformedResponse(format!("not a dryrun image url: {url}"))
        })?;
        let (width, height) = dims;
        let image = RgbImage::from_pixel(width, height, Rgb(color));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|err| StyleError::Internal(format!("failed to render dryrun image: {err}")))?;
        encode_bytes(&bytes, Some("image/png"))
    }
}

fn payload_digest(payload: &Value) -> [u8; 32] {
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

fn dims_for_size(image_size: Option<&str>) -> (u32, u32) {
    match image_size {
        Some("landscape_4_3") => (640, 480),
        Some("portrait_4_3") => (480, 640),
        _ => (512, 512),
    }
}

fn parse_dryrun_url(url: &str) -> Option<([u8; 3], (u32, u32))> {
    let rest = url.strip_prefix(DRYRUN_SCHEME)?;
    let (hex, dims) = rest.split_once('/')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
    let color = [channel(0)?, channel(2)?, channel(4)?];
    let (width, height) = dims.split_once('x')?;
    let width: u32 = width.parse().ok()?;
    let height: u32 = height.parse().ok()?;
    if width == 0 || height == 0 || width > 4096 || height > 4096 {
        return None;
    }
    Some((color, (width, height)))
}
