// SPDX-License-Identifier: GPL-3.0-only

//! QR code decoding
//!
//! Frames are reduced to greyscale, downscaled so the longest side fits
//! `max_dimension`, and handed to `rqrr`. Only QR symbols are recognized;
//! linear barcodes are never reported by this decoder.

use crate::backends::{CodeBatch, CodeType, ScanOptions, ScannedCode};
use crate::constants::scan::MAX_DECODE_DIMENSION;
use tracing::{debug, trace};

/// 8-bit greyscale frame without row padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl LumaFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Extract the Y channel of a packed YUYV (YUY2) frame
    pub fn from_yuyv(buf: &[u8], width: u32, height: u32, stride: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        let stride = (stride as usize).max(w * 2);
        let mut data = Vec::with_capacity(w * h);

        for y in 0..h {
            let row = y * stride;
            for x in 0..w {
                data.push(buf.get(row + x * 2).copied().unwrap_or(0));
            }
        }

        Self { width, height, data }
    }

    /// Copy a greyscale frame, dropping row padding
    pub fn from_grey(buf: &[u8], width: u32, height: u32, stride: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        let stride = (stride as usize).max(w);
        let mut data = Vec::with_capacity(w * h);

        for y in 0..h {
            let start = y * stride;
            match buf.get(start..start + w) {
                Some(row) => data.extend_from_slice(row),
                None => data.resize(data.len() + w, 0),
            }
        }

        Self { width, height, data }
    }

    /// Decode a compressed image (JPEG/PNG/...) and keep its luma
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let luma = image::load_from_memory(bytes)?.to_luma8();
        Ok(Self::from(luma))
    }

    /// Downscale with bilinear interpolation so the longest side is at most
    /// `max_dimension`
    pub fn downscaled(&self, max_dimension: u32) -> Self {
        if self.width <= max_dimension && self.height <= max_dimension {
            return self.clone();
        }

        let scale = (self.width as f32 / max_dimension as f32)
            .max(self.height as f32 / max_dimension as f32);
        let dst_width = ((self.width as f32 / scale) as u32).max(1);
        let dst_height = ((self.height as f32 / scale) as u32).max(1);

        let src_width = self.width as usize;
        let src_height = self.height as usize;
        let x_ratio = src_width as f32 / dst_width as f32;
        let y_ratio = src_height as f32 / dst_height as f32;

        let pixel = |px: usize, py: usize| -> f32 {
            self.data.get(py * src_width + px).copied().unwrap_or(0) as f32
        };

        let mut data = Vec::with_capacity((dst_width * dst_height) as usize);
        for y in 0..dst_height {
            for x in 0..dst_width {
                let src_x = x as f32 * x_ratio;
                let src_y = y as f32 * y_ratio;

                let x0 = src_x as usize;
                let y0 = src_y as usize;
                let x1 = (x0 + 1).min(src_width - 1);
                let y1 = (y0 + 1).min(src_height - 1);

                let x_frac = src_x - x0 as f32;
                let y_frac = src_y - y0 as f32;

                let value = pixel(x0, y0) * (1.0 - x_frac) * (1.0 - y_frac)
                    + pixel(x1, y0) * x_frac * (1.0 - y_frac)
                    + pixel(x0, y1) * (1.0 - x_frac) * y_frac
                    + pixel(x1, y1) * x_frac * y_frac;

                data.push(value as u8);
            }
        }

        Self {
            width: dst_width,
            height: dst_height,
            data,
        }
    }
}

impl From<image::GrayImage> for LumaFrame {
    fn from(image: image::GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

/// QR decoder
///
/// Optimized for real-time use: frames are downscaled before detection.
#[derive(Debug, Clone)]
pub struct QrDecoder {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    pub fn new() -> Self {
        Self {
            max_dimension: MAX_DECODE_DIMENSION,
        }
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Decode every QR symbol in the frame
    pub fn decode(&self, frame: &LumaFrame) -> CodeBatch {
        let start = std::time::Instant::now();

        let prepared = frame.downscaled(self.max_dimension);
        let width = prepared.width as usize;
        let mut image =
            rqrr::PreparedImage::prepare_from_greyscale(width, prepared.height as usize, |x, y| {
                prepared.data[y * width + x]
            });

        let grids = image.detect_grids();
        let mut batch = Vec::with_capacity(grids.len());

        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    debug!(content = %content, "Decoded QR code");
                    batch.push(ScannedCode::new(CodeType::Qr, content));
                }
                Err(e) => debug!(error = ?e, "Failed to decode QR grid"),
            }
        }

        trace!(
            width = prepared.width,
            height = prepared.height,
            count = batch.len(),
            decode_ms = start.elapsed().as_millis(),
            "QR decode pass complete"
        );

        batch
    }

    /// Decode and keep only the requested symbologies
    pub fn decode_filtered(&self, frame: &LumaFrame, options: &ScanOptions) -> CodeBatch {
        let mut batch = self.decode(frame);
        batch.retain(|code| options.accepts(code.kind));
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_luma_extraction_skips_chroma_and_padding() {
        // 2x2 YUYV frame with 2 bytes of padding per row
        let buf: Vec<u8> = vec![
            10, 128, 20, 128, 0, 0, // row 0
            30, 128, 40, 128, 0, 0, // row 1
        ];
        let frame = LumaFrame::from_yuyv(&buf, 2, 2, 6);
        assert_eq!(frame.data, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_grey_copy_without_stride() {
        let buf: Vec<u8> = vec![1, 2, 0, 3, 4, 0];
        let frame = LumaFrame::from_grey(&buf, 2, 2, 3);
        assert_eq!(frame.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_downscale_limits_longest_side() {
        let frame = LumaFrame::new(1280, 720, vec![200; 1280 * 720]).unwrap();
        let small = frame.downscaled(640);
        assert_eq!(small.width, 640);
        assert_eq!(small.height, 360);
        assert!(small.data.iter().all(|&v| (199..=200).contains(&v)));

        let untouched = LumaFrame::new(4, 2, vec![0; 8]).unwrap().downscaled(640);
        assert_eq!((untouched.width, untouched.height), (4, 2));
    }

    #[test]
    fn test_downscale_interpolates() {
        // 4x2 horizontal gradient
        let frame = LumaFrame::new(4, 2, vec![0, 85, 170, 255, 0, 85, 170, 255]).unwrap();
        let small = frame.downscaled(2);
        assert_eq!((small.width, small.height), (2, 1));
        assert!(small.data[0] < 100);
        assert!(small.data[1] > 150);
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let frame = LumaFrame::new(320, 240, vec![255; 320 * 240]).unwrap();
        assert!(QrDecoder::new().decode(&frame).is_empty());
    }

    #[test]
    fn test_mismatched_buffer_is_rejected() {
        assert!(LumaFrame::new(4, 4, vec![0; 15]).is_none());
    }
}
