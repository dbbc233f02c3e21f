//! Image optimisation.
//!
//! PNG and JPEG files lose their metadata chunks and segments; SVG documents
//! are minified as markup. GIF, WebP and ICO pass through unchanged.

use crate::classify::ImageFormat;
use crate::error::{as_text, StepError};
use crate::step::{normalize, Transform};
use crate::steps::markup::minify_markup;
use kiln_common::TransformKind;
use serde::{Deserialize, Serialize};

/// Options for [`OptimizeImage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizeImageOptions {
    /// Remove textual and EXIF metadata.
    pub strip_metadata: bool,
    /// Minify SVG markup.
    pub minify_svg: bool,
}

impl Default for OptimizeImageOptions {
    fn default() -> Self {
        Self {
            strip_metadata: true,
            minify_svg: true,
        }
    }
}

/// Lossless image size reduction.
pub struct OptimizeImage {
    strip_metadata: bool,
    minify_svg: bool,
    options: String,
}

impl OptimizeImage {
    /// Creates the step.
    pub fn new(options: OptimizeImageOptions) -> Self {
        Self {
            strip_metadata: options.strip_metadata,
            minify_svg: options.minify_svg,
            options: normalize(&options),
        }
    }
}

impl Transform for OptimizeImage {
    fn kind(&self) -> TransformKind {
        TransformKind::OptimizeImage
    }

    fn version(&self) -> u32 {
        1
    }

    fn options(&self) -> &str {
        &self.options
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, StepError> {
        match ImageFormat::detect(input) {
            Some(ImageFormat::Png) if self.strip_metadata => strip_png(input),
            Some(ImageFormat::Jpeg) if self.strip_metadata => strip_jpeg(input),
            Some(_) => Ok(input.to_vec()),
            None => self.optimize_svg(input),
        }
    }
}

impl OptimizeImage {
    fn optimize_svg(&self, input: &[u8]) -> Result<Vec<u8>, StepError> {
        let text = as_text(input)?;
        let mut svg = text.to_string();
        if self.strip_metadata {
            while let Some(start) = svg.find("<metadata") {
                let Some(end) = svg[start..].find("</metadata>") else {
                    break;
                };
                svg.replace_range(start..start + end + "</metadata>".len(), "");
            }
        }
        if self.minify_svg {
            svg = minify_markup(&svg, true, true);
        }
        Ok(svg.into_bytes())
    }
}

const PNG_METADATA: [&[u8; 4]; 4] = [b"tEXt", b"zTXt", b"iTXt", b"tIME"];

fn malformed(format: &'static str, reason: impl Into<String>) -> StepError {
    StepError::MalformedImage {
        format,
        reason: reason.into(),
    }
}

fn strip_png(input: &[u8]) -> Result<Vec<u8>, StepError> {
    let mut out = input[..8].to_vec();
    let mut pos = 8;
    loop {
        let header = input
            .get(pos..pos + 8)
            .ok_or_else(|| malformed("png", format!("truncated chunk header at offset {pos}")))?;
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let chunk_type = &header[4..8];
        let end = pos + 12 + length;
        let chunk = input
            .get(pos..end)
            .ok_or_else(|| malformed("png", format!("truncated chunk at offset {pos}")))?;
        if !PNG_METADATA.iter().any(|t| t.as_slice() == chunk_type) {
            out.extend_from_slice(chunk);
        }
        if chunk_type == b"IEND" {
            return Ok(out);
        }
        pos = end;
    }
}

fn is_jpeg_metadata(marker: u8) -> bool {
    // APP1..APP13, APP15 and COM. APP0 (JFIF) and APP14 (Adobe colour) stay.
    matches!(marker, 0xE1..=0xED | 0xEF | 0xFE)
}

fn strip_jpeg(input: &[u8]) -> Result<Vec<u8>, StepError> {
    let mut out = vec![0xFF, 0xD8];
    let mut pos = 2;
    loop {
        if input.get(pos) != Some(&0xFF) {
            return Err(malformed("jpeg", format!("expected marker at offset {pos}")));
        }
        let mut m = pos + 1;
        while input.get(m) == Some(&0xFF) {
            m += 1;
        }
        let marker = *input
            .get(m)
            .ok_or_else(|| malformed("jpeg", "missing end of image"))?;
        match marker {
            0xD9 => {
                out.extend_from_slice(&[0xFF, 0xD9]);
                return Ok(out);
            }
            0xD0..=0xD7 | 0x01 => {
                out.extend_from_slice(&[0xFF, marker]);
                pos = m + 1;
            }
            0xDA => {
                out.extend_from_slice(&input[pos..]);
                return Ok(out);
            }
            _ => {
                let len_bytes = input
                    .get(m + 1..m + 3)
                    .ok_or_else(|| malformed("jpeg", format!("truncated segment at offset {pos}")))?;
                let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
                let end = m + 1 + len;
                let segment = input
                    .get(pos..end)
                    .ok_or_else(|| malformed("jpeg", format!("truncated segment at offset {pos}")))?;
                if !is_jpeg_metadata(marker) {
                    out.extend_from_slice(segment);
                }
                pos = end;
            }
        }
    }
}
