//! GPU textures backing the offscreen targets.

use std::collections::HashMap;

use crate::error::{RenderError, Result};
use crate::targets::{TargetId, TargetLayout, TargetSpec};

/// One offscreen texture.
///
/// `view` covers mip level 0 only, which is what render passes attach and
/// what every shader reads. Mip generation creates its own per-level views
/// from `texture`.
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// Level-0 view for attachments and `textureLoad`.
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Allocate the texture described by `spec`.
    pub fn new(device: &wgpu::Device, spec: &TargetSpec) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(spec.id.label()),
            size: spec.extent(),
            mip_level_count: spec.mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: spec.format,
            usage: spec.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(spec.id.label()),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });
        Self {
            texture,
            view,
            width: spec.width,
            height: spec.height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Check the allocated texture against what was asked for.
    pub fn verify(&self, spec: &TargetSpec) -> Result<()> {
        let incomplete = |reason: String| RenderError::IncompleteTarget {
            target: spec.id,
            reason,
        };

        let size = self.texture.size();
        if (size.width, size.height) != (spec.width, spec.height) {
            return Err(incomplete(format!(
                "allocated {}x{}, expected {}x{}",
                size.width, size.height, spec.width, spec.height
            )));
        }
        if self.texture.format() != spec.format {
            return Err(incomplete(format!(
                "format {:?}, expected {:?}",
                self.texture.format(),
                spec.format
            )));
        }
        if self.texture.mip_level_count() != spec.mip_level_count {
            return Err(incomplete(format!(
                "{} mip levels, expected {}",
                self.texture.mip_level_count(),
                spec.mip_level_count
            )));
        }
        if !self.texture.usage().contains(spec.usage) {
            return Err(incomplete(format!("usage {:?}", self.texture.usage())));
        }
        Ok(())
    }
}

/// Every offscreen target at one resolution.
pub struct TargetSet {
    targets: HashMap<TargetId, RenderTarget>,
}

impl TargetSet {
    /// Allocate and verify every target in `layout`.
    ///
    /// Allocation runs inside a validation error scope; any error reported by
    /// the device, or any target that does not match its spec, fails the
    /// whole set.
    pub fn create(device: &wgpu::Device, layout: TargetLayout) -> Result<Self> {
        let max = device.limits().max_texture_dimension_2d;
        if layout.width() > max || layout.height() > max {
            return Err(RenderError::IncompleteTarget {
                target: TargetId::GPosition,
                reason: format!(
                    "{}x{} exceeds the device limit of {max}",
                    layout.width(),
                    layout.height()
                ),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let targets: HashMap<_, _> = layout
            .specs()
            .map(|spec| (spec.id, RenderTarget::new(device, &spec)))
            .collect();
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::IncompleteTarget {
                target: TargetId::GPosition,
                reason: error.to_string(),
            });
        }

        for spec in layout.specs() {
            let target = targets
                .get(&spec.id)
                .ok_or(RenderError::MissingTarget(spec.id))?;
            target.verify(&spec)?;
        }

        log::info!(
            "Created {} render targets at {}x{}",
            targets.len(),
            layout.width(),
            layout.height()
        );
        Ok(Self { targets })
    }

    pub fn get(&self, id: TargetId) -> Result<&RenderTarget> {
        self.targets.get(&id).ok_or(RenderError::MissingTarget(id))
    }

    pub fn view(&self, id: TargetId) -> Result<&wgpu::TextureView> {
        self.get(id).map(|t| &t.view)
    }
}
