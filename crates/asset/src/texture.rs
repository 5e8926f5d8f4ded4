//! Texture loading and data structures.
//! Cube maps are six square RGBA8 faces; faces that cannot be read are
//! replaced by a generated gradient so the viewer always has an environment.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Face file stems in upload order (+X, -X, +Y, -Y, +Z, -Z).
pub const CUBE_FACE_NAMES: [&str; 6] = ["pos-x", "neg-x", "pos-y", "neg-y", "pos-z", "neg-z"];

/// Edge length used when no face could be read.
pub const DEFAULT_FACE_SIZE: u32 = 256;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to open image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cube face {path} is {width}x{height}, expected {size}x{size}")]
    BadFaceSize {
        path: PathBuf,
        width: u32,
        height: u32,
        size: u32,
    },
}

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl TextureData {
    /// Create a new RGBA8 texture with given dimensions.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height * 4) as usize,
            "Data size doesn't match RGBA8 format"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// Load texture from PNG file.
    pub fn load_png<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let path = path.as_ref();
        log::debug!("Loading texture from {:?}", path);

        let img = image::open(path).map_err(|source| TextureError::Image {
            path: path.to_path_buf(),
            source,
        })?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self::new_rgba8(width, height, rgba.into_raw()))
    }

    /// Generated face: vertical gradient from `top` to `bottom` with a faint
    /// grid so rotation stays visible.
    pub fn gradient_face(size: u32, top: [u8; 3], bottom: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        let span = size.saturating_sub(1).max(1) as f32;

        for y in 0..size {
            let t = y as f32 / span;
            let mut rgb = [0u8; 3];
            for (c, out) in rgb.iter_mut().enumerate() {
                *out = (top[c] as f32 * (1.0 - t) + bottom[c] as f32 * t).round() as u8;
            }
            for x in 0..size {
                let grid = x % 32 == 0 || y % 32 == 0;
                let px = if grid { rgb.map(|v| v.saturating_add(24)) } else { rgb };
                data.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }

        Self::new_rgba8(size, size, data)
    }

    pub const fn bytes_per_pixel(&self) -> u32 {
        4
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.bytes_per_pixel()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}

/// Six equally sized square faces.
#[derive(Clone, Debug)]
pub struct CubeMapData {
    pub faces: [TextureData; 6],
    pub size: u32,
}

impl CubeMapData {
    /// Fully generated sky: light top, dark bottom, tinted sides.
    pub fn procedural(size: u32) -> Self {
        let faces = std::array::from_fn(|i| procedural_face(i, size));
        Self { faces, size }
    }

    /// Load `<dir>/<face>.png` for every face. Each face that is missing,
    /// unreadable or sized differently from the first readable face is
    /// replaced by its generated counterpart.
    pub fn load_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let loaded: Vec<Result<TextureData, TextureError>> = CUBE_FACE_NAMES
            .iter()
            .map(|name| TextureData::load_png(dir.join(format!("{name}.png"))))
            .collect();

        let size = loaded
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .find(|t| t.width == t.height && t.width > 0)
            .map_or(DEFAULT_FACE_SIZE, |t| t.width);

        let mut fallbacks = 0;
        let mut slots: Vec<TextureData> = Vec::with_capacity(6);
        for (i, result) in loaded.into_iter().enumerate() {
            let checked = result.and_then(|t| {
                if t.width == size && t.height == size {
                    Ok(t)
                } else {
                    Err(TextureError::BadFaceSize {
                        path: dir.join(format!("{}.png", CUBE_FACE_NAMES[i])),
                        width: t.width,
                        height: t.height,
                        size,
                    })
                }
            });
            match checked {
                Ok(face) => slots.push(face),
                Err(err) => {
                    log::warn!("Cube face '{}': {err}; using generated face", CUBE_FACE_NAMES[i]);
                    fallbacks += 1;
                    slots.push(procedural_face(i, size));
                }
            }
        }

        log::info!(
            "Cube map from {}: {size}x{size}, {} of 6 faces generated",
            dir.display(),
            fallbacks
        );

        let mut slots = slots.into_iter();
        let faces = std::array::from_fn(|i| {
            slots.next().unwrap_or_else(|| procedural_face(i, size))
        });
        Self { faces, size }
    }

    pub fn is_valid(&self) -> bool {
        self.faces
            .iter()
            .all(|f| f.is_valid() && f.width == self.size && f.height == self.size)
    }
}

fn procedural_face(index: usize, size: u32) -> TextureData {
    const SKY: [u8; 3] = [150, 190, 235];
    const HORIZON: [u8; 3] = [205, 163, 63];
    const GROUND: [u8; 3] = [40, 35, 30];
    match index {
        2 => TextureData::gradient_face(size, SKY, SKY),
        3 => TextureData::gradient_face(size, GROUND, GROUND),
        _ => TextureData::gradient_face(size, SKY, HORIZON),
    }
}
