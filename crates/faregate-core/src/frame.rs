//! Frame type and image plumbing — decode, crop, bilinear resize, PNG output.

use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::types::BoundingBox;

/// An owned grayscale image handed through the recognition pipeline.
///
/// Frames enter the core as single-channel intensity buffers; color inputs
/// are reduced to luma at the edges.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes, row-major).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap a raw grayscale buffer; the length must be `width * height`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        let expected = (width * height) as usize;
        if data.len() != expected {
            return Err(FrameError::InvalidLength { expected, actual: data.len() });
        }
        Ok(Self { data, width, height })
    }

    /// Decode an image file and reduce it to grayscale.
    pub fn open(path: &Path) -> Result<Self, FrameError> {
        let img = image::open(path).map_err(|source| FrameError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_dynamic(img))
    }

    /// Reduce an already decoded image (RGB or otherwise) to a frame.
    pub fn from_dynamic(img: image::DynamicImage) -> Self {
        Self::from_luma(img.to_luma8())
    }

    pub fn from_luma(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self { data: img.into_raw(), width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn pixel(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    /// Extract the sub-image under `region`, clamped to the frame bounds.
    ///
    /// A region lying entirely outside the frame produces an empty crop.
    pub fn crop(&self, region: &BoundingBox) -> Frame {
        let x0 = region.x.min(self.width);
        let y0 = region.y.min(self.height);
        let x1 = region.x.saturating_add(region.width).min(self.width);
        let y1 = region.y.saturating_add(region.height).min(self.height);
        let w = x1 - x0;
        let h = y1 - y0;

        let mut data = Vec::with_capacity((w * h) as usize);
        for y in y0..y1 {
            let row = (y * self.width + x0) as usize;
            data.extend_from_slice(&self.data[row..row + w as usize]);
        }
        Frame { data, width: w, height: h }
    }

    /// Resize with bilinear interpolation, center-aligned sampling.
    ///
    /// An empty source yields an all-zero target of the requested size.
    pub fn resize(&self, new_width: u32, new_height: u32) -> Frame {
        let out_len = (new_width * new_height) as usize;
        if self.is_empty() || out_len == 0 {
            return Frame { data: vec![0u8; out_len], width: new_width, height: new_height };
        }

        let (w, h) = (self.width as usize, self.height as usize);
        let (nw, nh) = (new_width as usize, new_height as usize);
        let inv_scale_x = w as f32 / nw as f32;
        let inv_scale_y = h as f32 / nh as f32;

        let mut resized = vec![0u8; out_len];
        for y in 0..nh {
            let src_y = (y as f32 + 0.5) * inv_scale_y - 0.5;
            let y0 = (src_y.floor() as i32).clamp(0, h as i32 - 1) as usize;
            let y1 = (y0 + 1).min(h - 1);
            let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

            for x in 0..nw {
                let src_x = (x as f32 + 0.5) * inv_scale_x - 0.5;
                let x0 = (src_x.floor() as i32).clamp(0, w as i32 - 1) as usize;
                let x1 = (x0 + 1).min(w - 1);
                let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                let tl = self.data[y0 * w + x0] as f32;
                let tr = self.data[y0 * w + x1] as f32;
                let bl = self.data[y1 * w + x0] as f32;
                let br = self.data[y1 * w + x1] as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                resized[y * nw + x] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
        Frame { data: resized, width: new_width, height: new_height }
    }

    /// Write the frame as a PNG (or whatever the extension selects).
    pub fn save_png(&self, path: &Path) -> Result<(), FrameError> {
        let expected = (self.width * self.height) as usize;
        let img = GrayImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            FrameError::InvalidLength { expected, actual: self.data.len() },
        )?;
        img.save(path).map_err(|source| FrameError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("failed to read image {path}: {source}")]
    Read { path: PathBuf, source: image::ImageError },
    #[error("failed to write image {path}: {source}")]
    Write { path: PathBuf, source: image::ImageError },
}
