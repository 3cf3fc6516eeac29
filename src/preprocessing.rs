use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array, Ix4};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Error reading image: {0}")]
    Read(#[from] std::io::Error),
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Invalid tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Target geometry of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub height: u32,
    pub width: u32,
}

impl InputSize {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }
}

pub fn load_image(path: &Path) -> Result<DynamicImage, PreprocessError> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    Ok(img)
}

/// Resizes to `size` with nearest-neighbour sampling and lays the RGB pixels
/// out as a `(1, height, width, 3)` tensor scaled to [0, 1].
pub fn image_to_tensor(
    img: &DynamicImage,
    size: InputSize,
) -> Result<Array<f32, Ix4>, PreprocessError> {
    let rgb = img.to_rgb8();
    let resized = image::imageops::resize(&rgb, size.width, size.height, FilterType::Nearest);

    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| (v as f32) / 255.)
        .collect();

    let tensor = Array::from_shape_vec(
        (1, size.height as usize, size.width as usize, 3),
        data,
    )?;

    Ok(tensor)
}

pub fn preprocess_file(path: &Path, size: InputSize) -> Result<Array<f32, Ix4>, PreprocessError> {
    let img = load_image(path)?;
    tracing::debug!(
        width = img.width(),
        height = img.height(),
        "Decoded uploaded image"
    );
    image_to_tensor(&img, size)
}
