mod context;
mod pipeline;
mod texture;
mod uniform;
mod vertex;

pub use context::{GpuContext, DEPTH_FORMAT};
pub use pipeline::{
    create_render_pipeline, create_shader, linear_sampler, sampler_entry, texture_entry,
    unfilterable_texture_entry, uniform_entry, DepthState, PipelineDesc,
};
pub use texture::GpuTexture;
pub use uniform::{
    align_to, mat3_to_3x4, CameraUniform, DynamicUniformBuffer, ModelUniform, UniformBuffer,
};
pub use vertex::{
    PbrVertex, PosNormalVertex, PosUvVertex, PositionVertex, TangentVertex, Vertex, VertexBuffer,
};
