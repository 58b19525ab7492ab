//! Offscreen render target catalogue.
//!
//! [`TargetLayout`] describes every offscreen image the frame needs at a given
//! resolution without touching the GPU. Backends turn the layout into real
//! textures; the frame plan refers to images only by [`TargetId`].

use crate::error::{RenderError, Result};

/// Packed depth + stencil format shared by every depth target so the depth
/// relay can copy between them byte for byte.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32FloatStencil8;

/// HDR format of the light buffer.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Name of an image the frame reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetId {
    /// World-space position.
    GPosition,
    /// World-space normal.
    GNormal,
    /// Albedo in rgb, specular intensity in alpha.
    GAlbedoSpec,
    GDepth,
    /// HDR accumulation of ambient and light volume contributions.
    LightColor,
    LightDepth,
    /// Raw occlusion term.
    SsaoColor,
    SsaoDepth,
    /// Blurred occlusion term read by ambient lighting.
    SsaoBlur,
    /// The presentable surface image. Not owned by the layout.
    Surface,
}

impl TargetId {
    /// Every target owned by the layout, in creation order.
    pub const OFFSCREEN: [TargetId; 9] = [
        TargetId::GPosition,
        TargetId::GNormal,
        TargetId::GAlbedoSpec,
        TargetId::GDepth,
        TargetId::LightColor,
        TargetId::LightDepth,
        TargetId::SsaoColor,
        TargetId::SsaoDepth,
        TargetId::SsaoBlur,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TargetId::GPosition => "GBuffer Position",
            TargetId::GNormal => "GBuffer Normal",
            TargetId::GAlbedoSpec => "GBuffer Albedo Spec",
            TargetId::GDepth => "GBuffer Depth",
            TargetId::LightColor => "Light Color",
            TargetId::LightDepth => "Light Depth",
            TargetId::SsaoColor => "SSAO Color",
            TargetId::SsaoDepth => "SSAO Depth",
            TargetId::SsaoBlur => "SSAO Blur",
            TargetId::Surface => "Surface",
        }
    }

    /// Texture format of an offscreen target; `None` for the surface,
    /// whose format is chosen by the adapter.
    pub fn format(self) -> Option<wgpu::TextureFormat> {
        use wgpu::TextureFormat as F;
        match self {
            TargetId::GPosition => Some(F::Rgba32Float),
            TargetId::GNormal => Some(F::Rgba16Float),
            TargetId::GAlbedoSpec => Some(F::Rgba8Unorm),
            TargetId::GDepth | TargetId::LightDepth | TargetId::SsaoDepth => Some(DEPTH_FORMAT),
            TargetId::LightColor => Some(HDR_FORMAT),
            TargetId::SsaoColor | TargetId::SsaoBlur => Some(F::R16Float),
            TargetId::Surface => None,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TargetId::GDepth | TargetId::LightDepth | TargetId::SsaoDepth
        )
    }
}

/// `1 + floor(log2(max(width, height)))`, the length of a full mip chain.
pub fn full_mip_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Everything needed to allocate one target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetSpec {
    pub id: TargetId,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_level_count: u32,
    pub usage: wgpu::TextureUsages,
}

impl TargetSpec {
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// The full set of offscreen targets for one resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetLayout {
    width: u32,
    height: u32,
}

impl TargetLayout {
    /// Describe the targets for a `width` x `height` frame.
    ///
    /// Zero-sized layouts are rejected; the caller is expected to suspend
    /// rendering while the window is minimized instead.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroSizedTarget { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Allocation parameters for `id`, or `None` for the surface.
    pub fn spec(&self, id: TargetId) -> Option<TargetSpec> {
        use wgpu::TextureUsages as U;

        let format = id.format()?;
        let sampled = U::RENDER_ATTACHMENT | U::TEXTURE_BINDING;
        let (usage, mip_level_count) = match id {
            TargetId::GDepth => (U::RENDER_ATTACHMENT | U::COPY_SRC, 1),
            TargetId::LightColor => (
                sampled | U::COPY_SRC,
                full_mip_count(self.width, self.height),
            ),
            TargetId::LightDepth | TargetId::SsaoDepth => (U::RENDER_ATTACHMENT | U::COPY_DST, 1),
            _ => (sampled, 1),
        };

        Some(TargetSpec {
            id,
            format,
            width: self.width,
            height: self.height,
            mip_level_count,
            usage,
        })
    }

    /// Specs for every offscreen target.
    pub fn specs(&self) -> impl Iterator<Item = TargetSpec> + '_ {
        TargetId::OFFSCREEN
            .iter()
            .filter_map(move |&id| self.spec(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_length() {
        assert_eq!(full_mip_count(1, 1), 1);
        assert_eq!(full_mip_count(2, 1), 2);
        assert_eq!(full_mip_count(1280, 720), 11);
        assert_eq!(full_mip_count(1024, 1024), 11);
        assert_eq!(full_mip_count(1023, 600), 10);
    }

    #[test]
    fn zero_size_rejected() {
        assert!(matches!(
            TargetLayout::new(0, 600),
            Err(RenderError::ZeroSizedTarget { width: 0, .. })
        ));
        assert!(TargetLayout::new(800, 0).is_err());
    }

    #[test]
    fn every_target_matches_resolution() {
        let layout = TargetLayout::new(1280, 720).unwrap();
        let specs: Vec<_> = layout.specs().collect();
        assert_eq!(specs.len(), TargetId::OFFSCREEN.len());
        for spec in specs {
            assert_eq!((spec.width, spec.height), (1280, 720));
        }
    }

    #[test]
    fn only_light_color_has_mips() {
        let layout = TargetLayout::new(640, 480).unwrap();
        for spec in layout.specs() {
            let expected = if spec.id == TargetId::LightColor { 10 } else { 1 };
            assert_eq!(spec.mip_level_count, expected, "{:?}", spec.id);
        }
    }

    #[test]
    fn depth_targets_share_format_for_copies() {
        let layout = TargetLayout::new(64, 64).unwrap();
        let src = layout.spec(TargetId::GDepth).unwrap();
        for dst in [TargetId::LightDepth, TargetId::SsaoDepth] {
            let dst = layout.spec(dst).unwrap();
            assert_eq!(src.format, dst.format);
            assert!(dst.usage.contains(wgpu::TextureUsages::COPY_DST));
        }
        assert!(src.usage.contains(wgpu::TextureUsages::COPY_SRC));
    }

    #[test]
    fn surface_is_not_owned() {
        let layout = TargetLayout::new(64, 64).unwrap();
        assert!(layout.spec(TargetId::Surface).is_none());
    }
}
