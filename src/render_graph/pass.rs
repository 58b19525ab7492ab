//! Explicit pass descriptors.
//!
//! A frame is a flat list of [`Step`]s. Each render pass names its
//! attachments and load operations, and each draw inside it carries a
//! [`PassKind`] whose [`RenderState`] fully determines culling, depth, stencil,
//! blending and color writes. Nothing depends on state left behind by an
//! earlier draw, so a backend can execute the list in order and a test can
//! inspect it without a GPU.

use crate::light::LightId;
use crate::targets::TargetId;

/// Depth test configuration for a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthState {
    /// Passes when `incoming <compare> stored`.
    pub compare: wgpu::CompareFunction,
    pub write: bool,
}

/// Stencil behaviour for a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilMode {
    /// Stencil ignored and untouched.
    Disabled,
    /// Always pass; increment (clamped) where the depth test fails.
    IncrementOnDepthFail,
    /// Pass only where the stencil equals the reference.
    EqualReference(u32),
}

impl StencilMode {
    /// Equivalent wgpu stencil state, applied to both faces.
    pub fn to_wgpu(self) -> wgpu::StencilState {
        let face = match self {
            StencilMode::Disabled => wgpu::StencilFaceState::IGNORE,
            StencilMode::IncrementOnDepthFail => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Always,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::IncrementClamp,
                pass_op: wgpu::StencilOperation::Keep,
            },
            StencilMode::EqualReference(_) => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Equal,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Keep,
            },
        };
        let mask = if self == StencilMode::Disabled { 0 } else { 0xFF };
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: mask,
            write_mask: mask,
        }
    }

    /// Reference value to set before drawing.
    pub fn reference(self) -> u32 {
        match self {
            StencilMode::EqualReference(value) => value,
            _ => 0,
        }
    }
}

/// Fixed-function state of one draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderState {
    pub cull_mode: Option<wgpu::Face>,
    /// `None` when the pass has no depth attachment.
    pub depth: Option<DepthState>,
    pub stencil: StencilMode,
    pub blend: Option<wgpu::BlendState>,
    pub color_writes: wgpu::ColorWrites,
}

impl RenderState {
    /// Untested, unblended, writes every channel.
    pub const FULLSCREEN: RenderState = RenderState {
        cull_mode: None,
        depth: None,
        stencil: StencilMode::Disabled,
        blend: None,
        color_writes: wgpu::ColorWrites::ALL,
    };
}

/// Additive `src + dst` blending for light accumulation.
pub const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Every kind of draw the frame issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    Geometry,
    SsaoSample,
    SsaoBlur,
    AmbientLighting,
    LightMark,
    LightShade,
    ToneMap,
}

impl PassKind {
    pub fn render_state(self) -> RenderState {
        use wgpu::CompareFunction as C;

        let opaque = RenderState::FULLSCREEN;
        match self {
            PassKind::Geometry => RenderState {
                cull_mode: Some(wgpu::Face::Back),
                depth: Some(DepthState {
                    compare: C::Less,
                    write: true,
                }),
                ..opaque
            },
            // full-screen draws sit on the far plane: "greater" keeps only
            // pixels where geometry was written
            PassKind::SsaoSample | PassKind::AmbientLighting => RenderState {
                depth: Some(DepthState {
                    compare: C::Greater,
                    write: false,
                }),
                ..opaque
            },
            PassKind::SsaoBlur | PassKind::ToneMap => opaque,
            PassKind::LightMark => RenderState {
                cull_mode: Some(wgpu::Face::Back),
                depth: Some(DepthState {
                    compare: C::LessEqual,
                    write: false,
                }),
                stencil: StencilMode::IncrementOnDepthFail,
                color_writes: wgpu::ColorWrites::empty(),
                ..opaque
            },
            PassKind::LightShade => RenderState {
                cull_mode: Some(wgpu::Face::Front),
                depth: Some(DepthState {
                    compare: C::GreaterEqual,
                    write: false,
                }),
                stencil: StencilMode::EqualReference(0),
                blend: Some(ADDITIVE),
                color_writes: wgpu::ColorWrites::ALL,
            },
        }
    }
}

/// What a draw rasterizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Draw {
    /// One triangle covering the target.
    FullScreen,
    /// Every queued scene mesh.
    SceneMeshes,
    /// The proxy sphere of one light.
    LightVolume(LightId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCommand {
    pub kind: PassKind,
    pub draw: Draw,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorAttachment {
    pub target: TargetId,
    pub load: wgpu::LoadOp<wgpu::Color>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthStencilAttachment {
    pub target: TargetId,
    pub depth_load: wgpu::LoadOp<f32>,
    pub stencil_load: wgpu::LoadOp<u32>,
}

/// One render pass: attachments plus the ordered draws recorded into it.
#[derive(Clone, Debug, PartialEq)]
pub struct PassDescriptor {
    pub label: &'static str,
    pub colors: Vec<ColorAttachment>,
    pub depth_stencil: Option<DepthStencilAttachment>,
    pub draws: Vec<DrawCommand>,
}

impl PassDescriptor {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            colors: Vec::new(),
            depth_stencil: None,
            draws: Vec::new(),
        }
    }

    pub fn color(mut self, target: TargetId, load: wgpu::LoadOp<wgpu::Color>) -> Self {
        self.colors.push(ColorAttachment { target, load });
        self
    }

    pub fn depth_stencil(
        mut self,
        target: TargetId,
        depth_load: wgpu::LoadOp<f32>,
        stencil_load: wgpu::LoadOp<u32>,
    ) -> Self {
        self.depth_stencil = Some(DepthStencilAttachment {
            target,
            depth_load,
            stencil_load,
        });
        self
    }

    pub fn draw(mut self, kind: PassKind, draw: Draw) -> Self {
        self.draws.push(DrawCommand { kind, draw });
        self
    }
}

/// A unit of GPU work in frame order.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Pass(PassDescriptor),
    /// Raw, unfiltered copy of depth and stencil between same-sized targets.
    CopyDepthStencil { from: TargetId, to: TargetId },
    /// Fill every mip below level 0 by successive downsampling.
    GenerateMipmaps(TargetId),
}

impl Step {
    pub fn as_pass(&self) -> Option<&PassDescriptor> {
        match self {
            Step::Pass(pass) => Some(pass),
            _ => None,
        }
    }
}

/// Evaluate a compare function the way the rasterizer does.
#[cfg(test)]
pub(crate) fn compare(function: wgpu::CompareFunction, incoming: f32, stored: f32) -> bool {
    use wgpu::CompareFunction as C;
    match function {
        C::Never => false,
        C::Less => incoming < stored,
        C::Equal => incoming == stored,
        C::LessEqual => incoming <= stored,
        C::Greater => incoming > stored,
        C::NotEqual => incoming != stored,
        C::GreaterEqual => incoming >= stored,
        C::Always => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_writes_depth() {
        let state = PassKind::Geometry.render_state();
        assert_eq!(state.cull_mode, Some(wgpu::Face::Back));
        assert_eq!(
            state.depth,
            Some(DepthState {
                compare: wgpu::CompareFunction::Less,
                write: true
            })
        );
    }

    #[test]
    fn only_geometry_writes_depth() {
        for kind in [
            PassKind::SsaoSample,
            PassKind::SsaoBlur,
            PassKind::AmbientLighting,
            PassKind::LightMark,
            PassKind::LightShade,
            PassKind::ToneMap,
        ] {
            let state = kind.render_state();
            assert!(state.depth.is_none_or(|d| !d.write), "{kind:?}");
        }
    }

    #[test]
    fn mark_and_shade_are_complementary() {
        let mark = PassKind::LightMark.render_state();
        let shade = PassKind::LightShade.render_state();

        assert_eq!(mark.cull_mode, Some(wgpu::Face::Back));
        assert_eq!(shade.cull_mode, Some(wgpu::Face::Front));
        assert!(mark.color_writes.is_empty());
        assert_eq!(shade.blend, Some(ADDITIVE));

        let mark_stencil = mark.stencil.to_wgpu();
        assert_eq!(
            mark_stencil.front.depth_fail_op,
            wgpu::StencilOperation::IncrementClamp
        );
        assert_eq!(mark_stencil.front.compare, wgpu::CompareFunction::Always);

        let shade_stencil = shade.stencil.to_wgpu();
        assert_eq!(shade_stencil.back.compare, wgpu::CompareFunction::Equal);
        assert_eq!(shade_stencil.read_mask, 0xFF);
        assert_eq!(shade.stencil.reference(), 0);
    }

    #[test]
    fn disabled_stencil_is_inert() {
        let state = StencilMode::Disabled.to_wgpu();
        assert!(!state.is_enabled());
    }

    #[test]
    fn compare_semantics() {
        use wgpu::CompareFunction as C;
        assert!(compare(C::Greater, 1.0, 0.5));
        assert!(!compare(C::Greater, 1.0, 1.0));
        assert!(compare(C::GreaterEqual, 1.0, 1.0));
        assert!(compare(C::LessEqual, 0.3, 0.3));
        assert!(!compare(C::Less, 0.3, 0.3));
    }
}
