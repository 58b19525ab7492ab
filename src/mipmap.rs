//! Mip chain generation by repeated linear downsampling.

use std::collections::HashMap;

use crate::error::Result;
use crate::programs::ShaderProgram;
use crate::render_graph::RenderState;
use crate::stages::{GroupLayout, PipelineDesc, Resource, create_pipeline, pipeline_layout};

pub struct MipmapGenerator {
    group: GroupLayout,
    layout: wgpu::PipelineLayout,
    module: wgpu::ShaderModule,
    sampler: wgpu::Sampler,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl MipmapGenerator {
    pub fn new(device: &wgpu::Device, program: &ShaderProgram) -> Result<Self> {
        let slot = program.required("src_texture")?;
        let group = GroupLayout::new(
            device,
            program,
            slot.group,
            &[
                ("src_texture", Resource::FilterableTexture),
                ("src_sampler", Resource::Sampler),
            ],
        )?;
        let layout = pipeline_layout(device, program, &[&group])?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Mipmap Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            group,
            layout,
            module: program.create_module(device),
            sampler,
            pipelines: HashMap::new(),
        })
    }

    /// Create the pipeline for `format` ahead of the first frame.
    pub fn ensure_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        if !self.pipelines.contains_key(&format) {
            let pipeline = self.create_pipeline(device, format);
            self.pipelines.insert(format, pipeline);
        }
    }

    fn create_pipeline(
        &self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        create_pipeline(
            device,
            &PipelineDesc {
                label: &format!("Mipmap Pipeline {format:?}"),
                module: &self.module,
                layout: &self.layout,
                vertex_entry: "vs_fullscreen",
                fragment_entry: "fs_main",
                vertex_buffers: &[],
                color_formats: &[format],
                state: RenderState::FULLSCREEN,
            },
        )
    }

    /// Fill levels `1..` of `texture`, each from the level above it.
    pub fn generate(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
    ) {
        let mip_count = texture.mip_level_count();
        if mip_count < 2 {
            return;
        }

        let format = texture.format();
        let pipeline = match self.pipelines.get(&format) {
            Some(pipeline) => pipeline.clone(),
            None => {
                log::warn!("No mipmap pipeline prepared for {format:?}, creating one on the fly");
                self.create_pipeline(device, format)
            }
        };

        let level_view = |level: u32, usage: wgpu::TextureUsages| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Mip Level"),
                base_mip_level: level,
                mip_level_count: Some(1),
                usage: Some(usage),
                ..Default::default()
            })
        };

        for level in 1..mip_count {
            let src = level_view(level - 1, wgpu::TextureUsages::TEXTURE_BINDING);
            let dst = level_view(level, wgpu::TextureUsages::RENDER_ATTACHMENT);
            let bind_group = self.group.bind(
                device,
                "Mipmap Bind Group",
                [
                    wgpu::BindingResource::TextureView(&src),
                    wgpu::BindingResource::Sampler(&self.sampler),
                ],
            );

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Mipmap Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dst,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(self.group.group, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}
