//! The deferred frame, one module per stage.
//!
//! Every stage has two halves:
//!
//! - a pure `plan` function returning the [`Step`](crate::render_graph::Step)s
//!   the stage contributes to a frame, tested without a GPU;
//! - a GPU struct owning the stage's pipelines and bind groups, used by
//!   [`WgpuBackend`](crate::render_graph::WgpuBackend) to record draws.
//!
//! ```text
//! geometry ─▶ depth relay ─▶ ambient occlusion ─▶ ambient lighting
//!                                                        │
//!        tone map ◀─ mip reduce ◀─ depth relay ◀─ volume lighting
//! ```

pub mod ambient_lighting;
pub mod ambient_occlusion;
pub mod depth_relay;
pub mod geometry;
pub mod tone_map;
pub mod volume_lighting;

use crate::error::{RenderError, Result};
use crate::programs::ShaderProgram;
use crate::render_graph::RenderState;
use crate::targets::DEPTH_FORMAT;

/// Kind of resource bound at a named slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Resource {
    Uniform,
    /// Uniform read at a per-draw offset; the value is the bound size in bytes.
    DynamicUniform(u64),
    /// Float texture read with `textureLoad`.
    Texture,
    FilterableTexture,
    Sampler,
}

impl Resource {
    fn binding_type(self) -> wgpu::BindingType {
        match self {
            Resource::Uniform => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            Resource::DynamicUniform(size) => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            Resource::Texture | Resource::FilterableTexture => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float {
                    filterable: self == Resource::FilterableTexture,
                },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            Resource::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        }
    }
}

/// A bind group layout built from the names a program declares.
pub(crate) struct GroupLayout {
    pub group: u32,
    pub layout: wgpu::BindGroupLayout,
    bindings: Vec<u32>,
}

impl GroupLayout {
    /// Resolve every name in `resources` through `program`. Each must exist
    /// and live in `group`.
    pub fn new(
        device: &wgpu::Device,
        program: &ShaderProgram,
        group: u32,
        resources: &[(&str, Resource)],
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(resources.len());
        let mut bindings = Vec::with_capacity(resources.len());
        for &(name, resource) in resources {
            let slot = program.required(name)?;
            if slot.group != group {
                return Err(RenderError::MissingUniform {
                    program: program.name(),
                    name: format!(
                        "{name} (expected in group {group}, found in {})",
                        slot.group
                    ),
                });
            }
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: resource.binding_type(),
                count: None,
            });
            bindings.push(slot.binding);
        }

        let label = format!("{} Group {group} Layout", program.name());
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&label),
            entries: &entries,
        });
        Ok(Self {
            group,
            layout,
            bindings,
        })
    }

    /// Create a bind group. `resources` follow the order given to [`new`](Self::new).
    pub fn bind<'a>(
        &self,
        device: &wgpu::Device,
        label: &str,
        resources: impl IntoIterator<Item = wgpu::BindingResource<'a>>,
    ) -> wgpu::BindGroup {
        let entries: Vec<_> = self
            .bindings
            .iter()
            .zip(resources)
            .map(|(&binding, resource)| wgpu::BindGroupEntry { binding, resource })
            .collect();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layout,
            entries: &entries,
        })
    }
}

/// The shared camera uniform buffer bound into one program.
pub(crate) struct FrameBinding {
    group: GroupLayout,
    bind_group: wgpu::BindGroup,
}

impl FrameBinding {
    pub fn required(
        device: &wgpu::Device,
        program: &ShaderProgram,
        buffer: &wgpu::Buffer,
    ) -> Result<Self> {
        let slot = program.required("frame")?;
        Self::at(device, program, slot.group, buffer)
    }

    /// Bind the frame uniforms only if the program declares them.
    pub fn optional(
        device: &wgpu::Device,
        program: &ShaderProgram,
        buffer: &wgpu::Buffer,
    ) -> Result<Option<Self>> {
        program
            .optional("frame")
            .map(|slot| Self::at(device, program, slot.group, buffer))
            .transpose()
    }

    fn at(
        device: &wgpu::Device,
        program: &ShaderProgram,
        group: u32,
        buffer: &wgpu::Buffer,
    ) -> Result<Self> {
        let group = GroupLayout::new(device, program, group, &[("frame", Resource::Uniform)])?;
        let bind_group = group.bind(
            device,
            &format!("{} Frame Bind Group", program.name()),
            [buffer.as_entire_binding()],
        );
        Ok(Self { group, bind_group })
    }

    pub fn layout(&self) -> &GroupLayout {
        &self.group
    }

    pub fn set(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(self.group.group, &self.bind_group, &[]);
    }
}

/// Pipeline layout with `groups` placed at their declared indices.
pub(crate) fn pipeline_layout(
    device: &wgpu::Device,
    program: &ShaderProgram,
    groups: &[&GroupLayout],
) -> Result<wgpu::PipelineLayout> {
    let mut ordered = groups.to_vec();
    ordered.sort_by_key(|g| g.group);
    for (index, group) in ordered.iter().enumerate() {
        if group.group != index as u32 {
            return Err(RenderError::BindGroupGap {
                program: program.name(),
                group: index as u32,
            });
        }
    }

    let layouts: Vec<_> = ordered.iter().map(|g| &g.layout).collect();
    Ok(device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{} Pipeline Layout", program.name())),
        bind_group_layouts: &layouts,
        push_constant_ranges: &[],
    }))
}

/// Inputs for one render pipeline.
pub(crate) struct PipelineDesc<'a> {
    pub label: &'a str,
    pub module: &'a wgpu::ShaderModule,
    pub layout: &'a wgpu::PipelineLayout,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub color_formats: &'a [wgpu::TextureFormat],
    pub state: RenderState,
}

pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    desc: &PipelineDesc<'_>,
) -> wgpu::RenderPipeline {
    let state = desc.state;
    let targets: Vec<_> = desc
        .color_formats
        .iter()
        .map(|&format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: state.blend,
                write_mask: state.color_writes,
            })
        })
        .collect();

    let depth_stencil = state.depth.map(|depth| wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: depth.write,
        depth_compare: depth.compare,
        stencil: state.stencil.to_wgpu(),
        bias: wgpu::DepthBiasState::default(),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: desc.module,
            entry_point: Some(desc.vertex_entry),
            buffers: desc.vertex_buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.module,
            entry_point: Some(desc.fragment_entry),
            targets: &targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: state.cull_mode,
            ..Default::default()
        },
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Create a uniform buffer sized for `T`.
pub(crate) fn uniform_buffer<T>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Offset alignment used by the dynamic uniform buffers.
pub(crate) const DYNAMIC_STRIDE: u64 = 256;

/// A uniform buffer holding one `T` per draw at [`DYNAMIC_STRIDE`] spacing.
pub(crate) struct DynamicUniforms<T> {
    label: &'static str,
    buffer: wgpu::Buffer,
    capacity: usize,
    staging: Vec<u8>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: bytemuck::Pod> DynamicUniforms<T> {
    pub fn new(device: &wgpu::Device, label: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            label,
            buffer: Self::allocate(device, label, capacity),
            capacity,
            staging: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    fn allocate(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: DYNAMIC_STRIDE * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Size of one element as seen by the shader.
    pub fn binding_size() -> u64 {
        std::mem::size_of::<T>() as u64
    }

    /// Binding covering a single element; the draw picks it by offset.
    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: wgpu::BufferSize::new(Self::binding_size()),
        })
    }

    /// Upload `items`. Returns `true` when the buffer was reallocated and
    /// bind groups referencing it must be recreated.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, items: &[T]) -> bool {
        let grown = items.len() > self.capacity;
        if grown {
            self.capacity = items.len().next_power_of_two();
            self.buffer = Self::allocate(device, self.label, self.capacity);
        }

        self.staging.clear();
        self.staging.resize(DYNAMIC_STRIDE as usize * items.len(), 0);
        for (index, item) in items.iter().enumerate() {
            let start = index * DYNAMIC_STRIDE as usize;
            let bytes = bytemuck::bytes_of(item);
            self.staging[start..start + bytes.len()].copy_from_slice(bytes);
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
        grown
    }

    pub fn offset(index: usize) -> u32 {
        (index as u64 * DYNAMIC_STRIDE) as u32
    }
}
