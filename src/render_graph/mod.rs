//! Frame plans and the backends that execute them.
//!
//! A frame is described as a flat, ordered list of [`Step`]s built by the
//! stage modules: render passes with explicit attachments and load ops, raw
//! depth+stencil copies, and mip generation. A [`RenderBackend`] consumes
//! the list.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  plan   ┌──────────────┐  execute  ┌───────────────────┐
//! │ Renderer │───────▶│  Vec<Step>   │─────────▶│  RenderBackend    │
//! └──────────┘         └──────────────┘           │  ├ WgpuBackend    │
//!                                                 │  └ RecordingBackend│
//!                                                 └───────────────────┘
//! ```
//!
//! Every draw names a [`PassKind`], and the kind alone determines culling,
//! depth, stencil, blending and color writes. No state carries over from one
//! draw to the next.

mod backend;
mod gpu_backend;
mod mesh_queue;
mod pass;
mod recorder;
mod render_target;

pub use backend::{FrameData, RenderBackend};
pub use gpu_backend::WgpuBackend;
pub use mesh_queue::{Material, MeshQueue, QueuedMesh};
pub use pass::{
    ColorAttachment, DepthState, DepthStencilAttachment, Draw, DrawCommand, PassDescriptor,
    PassKind, RenderState, Step, StencilMode,
};
pub use recorder::{Command, RecordingBackend};
pub use render_target::TargetSet;

#[cfg(test)]
pub(crate) use pass::compare;
