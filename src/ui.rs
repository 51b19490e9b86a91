//! egui overlay drawn on top of the demo in the same frame.

use winit::event::WindowEvent;
use winit::window::Window;

use crate::render::GpuContext;

pub struct UiOverlay {
    context: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl UiOverlay {
    pub fn new(gpu: &GpuContext) -> Self {
        let context = egui::Context::default();
        let window = gpu.window();
        let max_texture_side = gpu.device.limits().max_texture_dimension_2d as usize;
        let state = egui_winit::State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            Some(max_texture_side),
        );
        let renderer = egui_wgpu::Renderer::new(
            &gpu.device,
            gpu.surface_format(),
            egui_wgpu::RendererOptions {
                msaa_samples: 1,
                depth_stencil_format: None,
                dithering: true,
                ..Default::default()
            },
        );
        Self {
            context,
            state,
            renderer,
        }
    }

    pub fn context(&self) -> &egui::Context {
        &self.context
    }

    /// Returns true when egui used the event and the demo should not see it.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn wants_pointer(&self) -> bool {
        self.context.wants_pointer_input()
    }

    pub fn wants_keyboard(&self) -> bool {
        self.context.wants_keyboard_input()
    }

    pub fn begin(&mut self, window: &Window) {
        let input = self.state.take_egui_input(window);
        self.context.begin_pass(input);
    }

    /// Finishes the UI pass and draws it over `target` without clearing.
    ///
    /// The returned command buffers upload egui's vertex data and must be
    /// submitted before `encoder`.
    pub fn end_and_paint(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) -> Vec<wgpu::CommandBuffer> {
        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = self.context.end_pass();
        self.state.handle_platform_output(gpu.window(), platform_output);

        let jobs = self.context.tessellate(shapes, pixels_per_point);
        let size = gpu.size();
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point,
        };

        for (id, delta) in &textures_delta.set {
            self.renderer.update_texture(&gpu.device, &gpu.queue, *id, delta);
        }
        let uploads = self
            .renderer
            .update_buffers(&gpu.device, &gpu.queue, encoder, &jobs, &screen);

        {
            let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.renderer.render(&mut pass.forget_lifetime(), &jobs, &screen);
        }

        for id in &textures_delta.free {
            self.renderer.free_texture(id);
        }
        uploads
    }

    /// Makes a GPU texture displayable with `egui::Image`.
    pub fn register_texture(
        &mut self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
    ) -> egui::TextureId {
        self.renderer
            .register_native_texture(device, view, wgpu::FilterMode::Linear)
    }
}
