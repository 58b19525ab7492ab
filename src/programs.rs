//! Named shader programs and binding lookup.
//!
//! Each built-in pass owns one WGSL program. Pipelines never hard-code binding
//! indices: they ask the program where a named resource lives. A
//! [`required`](ShaderProgram::required) lookup that fails is a configuration
//! error and aborts setup; an [`optional`](ShaderProgram::optional) lookup
//! that fails simply means the pass does not use that resource.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{RenderError, Result};

/// Structs and the full-screen vertex entry point shared by every program.
const PRELUDE: &str = include_str!("shaders/common.wgsl");

/// Where a named resource is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingSlot {
    pub group: u32,
    pub binding: u32,
}

/// Identifies one of the built-in programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramId {
    Geometry,
    SsaoSample,
    SsaoBlur,
    Ambient,
    LightVolume,
    ToneMap,
    Mipmap,
}

impl ProgramId {
    pub const ALL: [ProgramId; 7] = [
        ProgramId::Geometry,
        ProgramId::SsaoSample,
        ProgramId::SsaoBlur,
        ProgramId::Ambient,
        ProgramId::LightVolume,
        ProgramId::ToneMap,
        ProgramId::Mipmap,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProgramId::Geometry => "geometry",
            ProgramId::SsaoSample => "ssao_sample",
            ProgramId::SsaoBlur => "ssao_blur",
            ProgramId::Ambient => "ambient",
            ProgramId::LightVolume => "light_volume",
            ProgramId::ToneMap => "tone_map",
            ProgramId::Mipmap => "mipmap",
        }
    }

    /// Bindings the pass cannot run without.
    pub fn required_bindings(self) -> &'static [&'static str] {
        match self {
            ProgramId::Geometry => &["frame", "model_uniforms"],
            ProgramId::SsaoSample => &["frame", "g_position", "g_normal", "noise_tex", "ssao"],
            ProgramId::SsaoBlur => &["ssao_input"],
            ProgramId::Ambient => &["g_albedo_spec", "ssao_input", "ambient"],
            ProgramId::LightVolume => {
                &["frame", "light", "g_position", "g_normal", "g_albedo_spec"]
            }
            ProgramId::ToneMap => &["hdr_input", "tone"],
            ProgramId::Mipmap => &["src_texture", "src_sampler"],
        }
    }

    fn builtin_source(self) -> &'static str {
        match self {
            ProgramId::Geometry => include_str!("shaders/geometry.wgsl"),
            ProgramId::SsaoSample => include_str!("shaders/ssao_sample.wgsl"),
            ProgramId::SsaoBlur => include_str!("shaders/ssao_blur.wgsl"),
            ProgramId::Ambient => include_str!("shaders/ambient.wgsl"),
            ProgramId::LightVolume => include_str!("shaders/light_volume.wgsl"),
            ProgramId::ToneMap => include_str!("shaders/tone_map.wgsl"),
            ProgramId::Mipmap => include_str!("shaders/mipmap.wgsl"),
        }
    }
}

/// A WGSL program and the bindings it declares.
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    name: &'static str,
    source: Cow<'static, str>,
    bindings: HashMap<String, BindingSlot>,
}

impl ShaderProgram {
    /// Prepend the shared prelude to `body` and index its bindings.
    pub fn new(name: &'static str, body: &str) -> Self {
        let source: Cow<'static, str> = Cow::Owned(format!("{PRELUDE}\n{body}"));
        let bindings = parse_bindings(&source);
        Self {
            name,
            source,
            bindings,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Slot of a binding the caller cannot do without.
    pub fn required(&self, binding: &str) -> Result<BindingSlot> {
        self.optional(binding)
            .ok_or_else(|| RenderError::MissingUniform {
                program: self.name,
                name: binding.to_string(),
            })
    }

    /// Slot of a binding the caller may skip.
    pub fn optional(&self, binding: &str) -> Option<BindingSlot> {
        self.bindings.get(binding).copied()
    }

    /// Bindings declared in `group`, ordered by binding index.
    pub fn group(&self, group: u32) -> Vec<(&str, u32)> {
        let mut entries: Vec<_> = self
            .bindings
            .iter()
            .filter(|(_, slot)| slot.group == group)
            .map(|(name, slot)| (name.as_str(), slot.binding))
            .collect();
        entries.sort_by_key(|&(_, binding)| binding);
        entries
    }

    pub fn create_module(&self, device: &wgpu::Device) -> wgpu::ShaderModule {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.name),
            source: wgpu::ShaderSource::Wgsl(self.source.clone()),
        })
    }
}

/// The set of programs the built-in passes are created from.
#[derive(Clone, Debug)]
pub struct ProgramLibrary {
    programs: Vec<ShaderProgram>,
}

impl Default for ProgramLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProgramLibrary {
    /// Programs compiled into the crate.
    pub fn builtin() -> Self {
        let programs = ProgramId::ALL
            .iter()
            .map(|&id| ShaderProgram::new(id.name(), id.builtin_source()))
            .collect();
        Self { programs }
    }

    pub fn get(&self, id: ProgramId) -> &ShaderProgram {
        &self.programs[Self::index(id)]
    }

    /// Swap in a custom body for one of the passes. Call
    /// [`verify`](Self::verify) afterwards to catch missing bindings early.
    pub fn replace(&mut self, id: ProgramId, body: &str) {
        self.programs[Self::index(id)] = ShaderProgram::new(id.name(), body);
    }

    /// Check every program declares the bindings its pass needs.
    pub fn verify(&self) -> Result<()> {
        for id in ProgramId::ALL {
            let program = self.get(id);
            for name in id.required_bindings() {
                program.required(name)?;
            }
        }
        Ok(())
    }

    fn index(id: ProgramId) -> usize {
        ProgramId::ALL
            .iter()
            .position(|&p| p == id)
            .unwrap_or_default()
    }
}

fn parse_bindings(source: &str) -> HashMap<String, BindingSlot> {
    let mut bindings = HashMap::new();
    for line in source.lines() {
        let line = line.trim();
        if line.starts_with("//") {
            continue;
        }
        let (Some(group), Some(binding)) =
            (attribute(line, "@group("), attribute(line, "@binding("))
        else {
            continue;
        };
        if let Some(name) = declared_name(line) {
            bindings.insert(name.to_string(), BindingSlot { group, binding });
        }
    }
    bindings
}

fn attribute(line: &str, prefix: &str) -> Option<u32> {
    let start = line.find(prefix)? + prefix.len();
    let rest = &line[start..];
    let end = rest.find(')')?;
    rest[..end].trim().parse().ok()
}

fn declared_name(line: &str) -> Option<&str> {
    let mut rest = &line[line.find("var")? + 3..];
    if rest.starts_with('<') {
        rest = &rest[rest.find('>')? + 1..];
    }
    let name = rest.split(':').next()?.trim();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uniform_and_texture_bindings() {
        let program = ShaderProgram::new(
            "test",
            "@group(0) @binding(0) var<uniform> frame: FrameUniforms;\n\
             @group(1) @binding(3) var g_normal: texture_2d<f32>;\n\
             @group(2)  @binding( 1 ) var src_sampler : sampler;\n\
             // @group(3) @binding(0) var commented: texture_2d<f32>;",
        );
        let slot = |group, binding| BindingSlot { group, binding };
        assert_eq!(program.required("frame").unwrap(), slot(0, 0));
        assert_eq!(program.required("g_normal").unwrap(), slot(1, 3));
        assert_eq!(program.optional("src_sampler"), Some(slot(2, 1)));
        assert!(program.optional("commented").is_none());
    }

    #[test]
    fn required_lookup_fails_loudly() {
        let program = ShaderProgram::new("bare", "fn main() {}");
        match program.required("frame") {
            Err(RenderError::MissingUniform { program, name }) => {
                assert_eq!(program, "bare");
                assert_eq!(name, "frame");
            }
            other => panic!("expected MissingUniform, got {other:?}"),
        }
    }

    #[test]
    fn optional_lookup_is_silent() {
        let program = ShaderProgram::new("bare", "fn main() {}");
        assert!(program.optional("frame").is_none());
    }

    #[test]
    fn builtin_programs_declare_required_bindings() {
        ProgramLibrary::builtin().verify().unwrap();
    }

    #[test]
    fn only_camera_aware_programs_see_frame() {
        let library = ProgramLibrary::builtin();
        for id in [
            ProgramId::Geometry,
            ProgramId::SsaoSample,
            ProgramId::LightVolume,
        ] {
            assert!(library.get(id).optional("frame").is_some(), "{id:?}");
        }
        for id in [ProgramId::SsaoBlur, ProgramId::Ambient, ProgramId::ToneMap] {
            assert!(library.get(id).optional("frame").is_none(), "{id:?}");
        }
    }

    #[test]
    fn replaced_program_is_verified() {
        let mut library = ProgramLibrary::builtin();
        library.replace(
            ProgramId::ToneMap,
            "@group(0) @binding(0) var hdr_input: texture_2d<f32>;",
        );
        assert!(matches!(
            library.verify(),
            Err(RenderError::MissingUniform { name, .. }) if name == "tone"
        ));
    }

    #[test]
    fn group_listing_is_ordered() {
        let library = ProgramLibrary::builtin();
        let names: Vec<_> = library
            .get(ProgramId::Mipmap)
            .group(0)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["src_texture", "src_sampler"]);
    }
}
