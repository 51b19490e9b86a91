use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while loading demo assets or building GPU programs.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to load image '{}'", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to read '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid OBJ file '{}': {message}", path.display())]
    Obj { path: PathBuf, message: String },

    #[error("cubemap face '{}' is {width}x{height}, expected a {expected}x{expected} face", path.display())]
    CubemapFace {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: u32,
    },

    #[error("shader '{label}' failed to compile: {message}")]
    Shader { label: String, message: String },

    #[error("pipeline '{label}' is invalid: {message}")]
    Pipeline { label: String, message: String },
}
