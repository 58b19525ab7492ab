//! Copies of the GBuffer depth+stencil into the targets that depth-test
//! against the scene.

use crate::render_graph::Step;
use crate::targets::TargetId;

fn copy_to(to: TargetId) -> Step {
    Step::CopyDepthStencil {
        from: TargetId::GDepth,
        to,
    }
}

/// Relay scene depth after the geometry pass: always into the light buffer,
/// into the occlusion buffer only when it will be drawn.
pub fn plan(ssao: bool) -> Vec<Step> {
    let mut steps = vec![copy_to(TargetId::LightDepth)];
    if ssao {
        steps.push(copy_to(TargetId::SsaoDepth));
    }
    steps
}

/// Put scene depth back into the light buffer once the light volumes have
/// finished with its stencil.
pub fn restore() -> Vec<Step> {
    vec![copy_to(TargetId::LightDepth)]
}

/// Record a raw copy of every aspect of `from` into `to`.
pub fn encode_copy(
    encoder: &mut wgpu::CommandEncoder,
    from: &wgpu::Texture,
    to: &wgpu::Texture,
) {
    encoder.copy_texture_to_texture(
        wgpu::TexelCopyTextureInfo {
            texture: from,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyTextureInfo {
            texture: to,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        from.size(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relays_to_light_buffer_only_without_ssao() {
        assert_eq!(
            plan(false),
            vec![Step::CopyDepthStencil {
                from: TargetId::GDepth,
                to: TargetId::LightDepth
            }]
        );
    }

    #[test]
    fn relays_to_both_with_ssao() {
        let targets: Vec<_> = plan(true)
            .into_iter()
            .map(|step| match step {
                Step::CopyDepthStencil { from, to } => {
                    assert_eq!(from, TargetId::GDepth);
                    to
                }
                other => panic!("unexpected step {other:?}"),
            })
            .collect();
        assert_eq!(targets, [TargetId::LightDepth, TargetId::SsaoDepth]);
    }

    #[test]
    fn restore_targets_light_buffer() {
        assert_eq!(restore(), plan(false));
    }
}
