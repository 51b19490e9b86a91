//! Real-time rendering demos on wgpu: mipmapping, normal mapping, PBR,
//! image based lighting, skyboxes and 3D textures.
//!
//! Everything that does not need a GPU (mesh generation, OBJ parsing, image
//! preparation, BRDF integration, camera and input handling) lives in plain
//! modules so it can be tested headless.

pub mod app;
pub mod brdf;
pub mod camera;
pub mod config;
pub mod demos;
pub mod error;
pub mod image_data;
pub mod input;
pub mod mesh;
pub mod noise;
pub mod obj;
pub mod render;
pub mod ui;

pub use camera::{Camera, CameraInputs};
pub use config::{AppConfig, RunMode};
pub use demos::{Demo, DemoKind};
pub use error::AssetError;
pub use image_data::{HdrImage, ImageData, MediaDir};
pub use input::{InputState, KeyCode, MouseButton, NamedKey};
pub use mesh::{MeshBuilder, MeshSlice, MeshVertex};
pub use obj::{load_obj_from_str, ObjMesh};
pub use render::GpuContext;
pub use ui::UiOverlay;
