//! Error types for the renderer.
//!
//! Every fallible operation in the crate returns [`Result<T>`], an alias for
//! `std::result::Result<T, RenderError>`. Nothing here is retried: a failed
//! target (re)creation or a missing mandatory binding is fatal, and the caller
//! is expected to log it and shut down.

use thiserror::Error;

use crate::targets::TargetId;

/// The main error type for the renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // Device & Surface
    // ========================================================================
    /// Failed to create a presentable surface for the window.
    #[error("Failed to create surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),

    /// No adapter compatible with the surface was found.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(#[from] wgpu::RequestAdapterError),

    /// The adapter refused to create a device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The adapter lacks a feature the pipeline cannot run without.
    #[error("Adapter does not support required feature {0:?}")]
    MissingFeature(wgpu::Features),

    /// The next swapchain image could not be acquired.
    #[error("Failed to acquire surface texture: {0}")]
    SurfaceAcquire(#[from] wgpu::SurfaceError),

    // ========================================================================
    // Render Targets
    // ========================================================================
    /// A render target failed its completeness check after (re)creation.
    #[error("Render target {target:?} is incomplete: {reason}")]
    IncompleteTarget {
        /// The target that failed.
        target: TargetId,
        /// What the check found.
        reason: String,
    },

    /// Targets were requested at a zero width or height.
    #[error("Cannot create render targets of size {width}x{height}")]
    ZeroSizedTarget { width: u32, height: u32 },

    /// A frame was requested after a failed resize left no valid targets.
    #[error("Render targets are invalid; a successful resize is required before rendering")]
    TargetsInvalid,

    /// A step referenced a target the backend does not own.
    #[error("Render target {0:?} is not available")]
    MissingTarget(TargetId),

    // ========================================================================
    // Programs
    // ========================================================================
    /// A mandatory shader binding was not declared by the program.
    #[error("Program '{program}' does not declare required binding '{name}'")]
    MissingUniform {
        /// Program that was searched.
        program: &'static str,
        /// Binding name that was requested.
        name: String,
    },

    /// A program's bind groups are not numbered contiguously from zero.
    #[error("Program '{program}' declares no bindings in group {group}")]
    BindGroupGap { program: &'static str, group: u32 },

    // ========================================================================
    // Frame Execution
    // ========================================================================
    /// A draw referenced a mesh handle that was never uploaded.
    #[error("Unknown mesh handle {0}")]
    UnknownMesh(usize),

    /// Mapping the luminance readback buffer failed.
    #[error("Luminance readback failed: {0}")]
    Readback(String),

    // ========================================================================
    // Host
    // ========================================================================
    /// The OS refused to create a window.
    #[error("Failed to create window: {0}")]
    WindowCreateFailed(#[from] winit::error::OsError),

    /// The event loop could not start or exited abnormally.
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
