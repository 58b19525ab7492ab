//! # Gloam
//!
//! **A deferred renderer with screen-space ambient occlusion, stencil-volume
//! point lights and automatic exposure, built on wgpu.**
//!
//! Each frame writes the scene into a GBuffer, shades it with an ambient term
//! darkened by SSAO, adds every point light through a stencil-marked sphere
//! volume, then tone-maps the HDR result with an exposure that drifts toward
//! the average scene luminance.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gloam::*;
//!
//! fn main() -> Result<()> {
//!     run(RendererConfig::new().title("Lights").size(1280, 720).vsync(false))
//! }
//! ```
//!
//! ## Driving the renderer yourself
//!
//! [`Renderer`] is generic over a [`RenderBackend`]. [`WgpuBackend`] draws to
//! a window; [`RecordingBackend`] executes the same frame plan without a GPU
//! and records every command, which is how the frame sequence is tested.
//!
//! ```
//! use gloam::*;
//!
//! let config = RendererConfig::new().size(640, 480);
//! let mut renderer = Renderer::new(RecordingBackend::new(), &config)?;
//! let cube = renderer.upload_mesh(&MeshData::cube());
//! renderer
//!     .lights_mut()
//!     .add(PointLight::new(Vec3::new(0.0, 2.0, 0.0), Vec3::ONE));
//!
//! let mut meshes = MeshQueue::new();
//! meshes.draw(cube, Transform::new(), Material::default());
//! let stats = renderer.render_frame(&Camera::new(), &meshes, 1.0 / 60.0)?;
//! assert_eq!(stats.lights_drawn, 1);
//! # Ok::<(), RenderError>(())
//! ```

mod app;
mod camera;
mod config;
mod error;
mod exposure;
mod gpu;
mod input;
mod light;
mod mesh;
mod mipmap;
mod programs;
mod render_graph;
mod renderer;
mod ssao_kernel;
mod stages;
mod targets;

pub use app::run;
pub use camera::{Camera, FrameUniforms, Projection};
pub use config::{FrameToggles, RendererConfig, SsaoSettings};
pub use error::{RenderError, Result};
pub use exposure::{ExposureState, luminance, target_exposure};
pub use gpu::{GpuContext, REQUIRED_FEATURES};
pub use input::Input;
pub use light::{LightId, LightManager, PointLight, influence_radius};
pub use mesh::{MeshData, MeshId, Transform, Vertex3d};
pub use programs::{BindingSlot, ProgramId, ProgramLibrary, ShaderProgram};
pub use render_graph::{
    ColorAttachment, Command, DepthState, DepthStencilAttachment, Draw, DrawCommand, FrameData,
    Material, MeshQueue, PassDescriptor, PassKind, QueuedMesh, RecordingBackend, RenderBackend,
    RenderState, Step, StencilMode, WgpuBackend,
};
pub use renderer::{FramePlan, FrameStats, Renderer, TargetStatus, frame_plan};
pub use ssao_kernel::SsaoKernel;
pub use targets::{DEPTH_FORMAT, HDR_FORMAT, TargetId, TargetLayout, TargetSpec};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;
