//! Helpers between `image` buffers and the tracker's frame views.

use std::path::Path;

use tld_core::GrayImageView;

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] ::image::ImageError),
}

/// Borrow an `image::GrayImage` as a frame.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Build an `image::GrayImage` from a raw grayscale buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, FrameError> {
    let w = usize::try_from(width).ok();
    let h = usize::try_from(height).ok();
    let Some((w, h)) = w.zip(h) else {
        return Err(FrameError::InvalidGrayDimensions { width, height });
    };
    let Some(expected) = w.checked_mul(h).filter(|&n| n > 0) else {
        return Err(FrameError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(FrameError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(FrameError::InvalidGrayDimensions { width, height })
}

/// Decode an image file and convert it to 8-bit luma.
pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, FrameError> {
    Ok(::image::ImageReader::open(path)?.decode()?.to_luma8())
}
