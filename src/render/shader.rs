//! Shader programs.
//!
//! A [`Shader`] owns one linked program plus its stage objects and caches the
//! locations of the runtime's well-known uniforms (see [`UniformId`]). Every
//! program starts out with working default sources so a freshly created
//! shader can draw immediately; callers then replace individual stages with
//! [`Shader::compile`] and [`Shader::link`].
//!
//! Binding is deduplicated per thread: [`Shader::bind`] only issues a
//! `use_program` when the (context, program) pair differs from the last one
//! bound on this thread. Destroying a context invalidates the cache so a new
//! context with a recycled program name cannot be mistaken for bound state.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{Result, VitrailError, set_last_error};
use crate::gl::{Device, ProgramId, ShaderObjectId, ShaderStage, UniformLocation};
use crate::math::Matrix;
use crate::render::context::{Context, ContextId};
use crate::render::vertex::{self, Color, VertexLayoutId};

/// Attribute name the default layout binds vertex positions to.
pub const POSITION_ATTRIBUTE: &str = "in_Vertex";
/// Attribute name the default layout binds vertex colors to.
pub const COLOR_ATTRIBUTE: &str = "in_Color";
/// Attribute name the default layout binds texture coordinates to.
pub const TEXCOORD_ATTRIBUTE: &str = "in_TexCoord";

/// Uniform name of the per-drawable transform.
pub const MODEL_VIEW_UNIFORM: &str = "in_ModelView";
/// Uniform name of the view projection.
pub const PROJECTION_UNIFORM: &str = "in_Projection";
/// Uniform name of the texture sampler.
pub const TEXTURE_UNIFORM: &str = "in_Texture";
/// Uniform name of the texturing toggle.
pub const TEXTURE_ENABLED_UNIFORM: &str = "in_TextureEnabled";
/// Fragment output name used by modern-GLSL programs.
pub const FRAG_COLOR_OUTPUT: &str = "out_FragColor";

/// The uniforms every program compatible with the runtime declares. Their
/// locations are resolved at link time so per-draw updates skip the name
/// lookup.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UniformId {
    Projection,
    ModelView,
    Texture,
    TextureEnabled,
}

impl UniformId {
    /// The GLSL name of this uniform.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Projection => PROJECTION_UNIFORM,
            Self::ModelView => MODEL_VIEW_UNIFORM,
            Self::Texture => TEXTURE_UNIFORM,
            Self::TextureEnabled => TEXTURE_ENABLED_UNIFORM,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Projection => 0,
            Self::ModelView => 1,
            Self::Texture => 2,
            Self::TextureEnabled => 3,
        }
    }
}

const DEFAULT_VERTEX_LEGACY: &str = "\
#version 110

attribute vec2 in_Vertex;
attribute vec4 in_Color;
attribute vec2 in_TexCoord;

uniform mat4 in_ModelView;
uniform mat4 in_Projection;

varying vec4 var_Color;
varying vec2 var_TexCoord;

void main() {
  gl_Position  = vec4(in_Vertex, 0, 1) * (in_ModelView * in_Projection);
  var_Color    = in_Color;
  var_TexCoord = in_TexCoord;
}
";

const DEFAULT_FRAGMENT_LEGACY: &str = "\
#version 110

uniform sampler2D in_Texture;
uniform bool in_TextureEnabled;

varying vec4 var_Color;
varying vec2 var_TexCoord;

void main() {
  if (in_TextureEnabled)
    gl_FragColor = texture2D(in_Texture, var_TexCoord) * var_Color;
  else
    gl_FragColor = var_Color;
}
";

const DEFAULT_VERTEX_MODERN: &str = "\
#version 140

in vec2 in_Vertex;
in vec4 in_Color;
in vec2 in_TexCoord;

uniform mat4 in_ModelView;
uniform mat4 in_Projection;

out vec4 var_Color;
out vec2 var_TexCoord;

void main() {
  gl_Position  = vec4(in_Vertex, 0, 1) * (in_ModelView * in_Projection);
  var_Color    = in_Color;
  var_TexCoord = in_TexCoord;
}
";

const DEFAULT_FRAGMENT_MODERN: &str = "\
#version 140

uniform sampler2D in_Texture;
uniform bool in_TextureEnabled;

in vec4 var_Color;
in vec2 var_TexCoord;

out vec4 out_FragColor;

void main() {
  if (in_TextureEnabled)
    out_FragColor = texture2D(in_Texture, var_TexCoord) * var_Color;
  else
    out_FragColor = var_Color;
}
";

static USE_MODERN: AtomicBool = AtomicBool::new(false);
static FORCE_LEGACY: AtomicBool = AtomicBool::new(false);

/// Switches default shader sources to GLSL 1.40. Ignored after
/// [`force_legacy_glsl`]; already-created shaders are unaffected.
pub fn enable_modern_glsl() {
    if !FORCE_LEGACY.load(Ordering::Relaxed) {
        USE_MODERN.store(true, Ordering::Relaxed);
    }
}

/// Pins default shader sources to GLSL 1.10 for the rest of the process.
pub fn force_legacy_glsl() {
    FORCE_LEGACY.store(true, Ordering::Relaxed);
    USE_MODERN.store(false, Ordering::Relaxed);
}

fn modern_glsl() -> bool {
    USE_MODERN.load(Ordering::Relaxed)
}

#[derive(Default)]
struct ProgramBinding {
    last: Option<(ContextId, ProgramId)>,
}

impl ProgramBinding {
    /// Records the pair; true when it differs from the previous one and a
    /// `use_program` must actually be issued.
    fn needs_bind(&mut self, context: ContextId, program: ProgramId) -> bool {
        if self.last == Some((context, program)) {
            return false;
        }
        self.last = Some((context, program));
        true
    }

    fn invalidate(&mut self) {
        self.last = None;
    }
}

thread_local! {
    static BINDING: RefCell<ProgramBinding> = RefCell::default();
}

/// Forgets this thread's last-bound program. Called on context destruction;
/// a recycled program name in a fresh context must not hit the cache.
pub(crate) fn invalidate_program_binding() {
    let _ = BINDING.try_with(|binding| binding.borrow_mut().invalidate());
}

/// A linked GPU program with cached well-known uniform locations.
pub struct Shader {
    device: Arc<dyn Device>,
    program: ProgramId,
    vertex: ShaderObjectId,
    fragment: ShaderObjectId,
    geometry: Option<ShaderObjectId>,
    locations: [Option<UniformLocation>; 4],
}

impl Shader {
    /// Creates a program for the default 2D vertex layout, compiled and
    /// linked from the default sources.
    pub fn new() -> Result<Self> {
        Self::with_layout(vertex::default_vertex_layout())
    }

    /// Creates a program whose attribute indices follow `layout`, compiled
    /// and linked from the default sources. Custom layouts normally replace
    /// the vertex stage before drawing.
    pub fn with_layout(layout: VertexLayoutId) -> Result<Self> {
        let context = Context::ensure()?;
        let device = Arc::clone(context.device());

        let vertex_obj = device.create_shader(ShaderStage::Vertex)?;
        let fragment_obj = device.create_shader(ShaderStage::Fragment)?;
        let program = device.create_program()?;
        device.attach_shader(program, vertex_obj);
        device.attach_shader(program, fragment_obj);

        let mut shader = Self {
            device,
            program,
            vertex: vertex_obj,
            fragment: fragment_obj,
            geometry: None,
            locations: [None; 4],
        };

        let (vertex_src, fragment_src) = if modern_glsl() {
            (DEFAULT_VERTEX_MODERN, DEFAULT_FRAGMENT_MODERN)
        } else {
            (DEFAULT_VERTEX_LEGACY, DEFAULT_FRAGMENT_LEGACY)
        };
        shader.compile(ShaderStage::Vertex, vertex_src)?;
        shader.compile(ShaderStage::Fragment, fragment_src)?;
        shader.apply_layout(layout);
        shader.link()?;

        let identity = Matrix::identity();
        shader.set_matrix_id(UniformId::ModelView, &identity)?;
        shader.set_matrix_id(UniformId::Projection, &identity)?;
        shader.set_texture_unit_id(UniformId::Texture, 0)?;
        shader.set_bool_id(UniformId::TextureEnabled, false)?;
        Ok(shader)
    }

    /// Replaces one stage's source and compiles it. The program keeps its
    /// previous binary until the next successful [`Shader::link`].
    ///
    /// Compiling a geometry stage on a context without geometry shader
    /// support fails without touching the program.
    pub fn compile(&mut self, stage: ShaderStage, source: &str) -> Result<()> {
        let object = match stage {
            ShaderStage::Vertex => self.vertex,
            ShaderStage::Fragment => self.fragment,
            ShaderStage::Geometry => {
                if !self.device.has_geometry_shaders() {
                    set_last_error("geometry shaders are not available on the current context");
                    return Err(VitrailError::Unsupported("geometry shaders"));
                }
                match self.geometry {
                    Some(object) => object,
                    None => {
                        let object = self.device.create_shader(ShaderStage::Geometry)?;
                        self.device.attach_shader(self.program, object);
                        self.geometry = Some(object);
                        object
                    }
                }
            }
        };

        if let Err(log) = self.device.compile_shader(object, source) {
            log::warn!("{stage:?} shader compilation failed: {log}");
            set_last_error(log.clone());
            return Err(VitrailError::ShaderCompile(log));
        }
        Ok(())
    }

    /// Detaches and destroys the geometry stage, if any. Takes effect at the
    /// next link.
    pub fn detach_geometry(&mut self) {
        if let Some(object) = self.geometry.take() {
            self.device.detach_shader(self.program, object);
            self.device.delete_shader(object);
        }
    }

    /// Binds each attribute of `layout` to its index within the layout.
    /// Takes effect at the next link.
    pub fn apply_layout(&self, layout: VertexLayoutId) {
        let layout = vertex::layout(layout);
        for (index, attribute) in layout.attributes().iter().enumerate() {
            self.device
                .bind_attrib_location(self.program, index as u32, &attribute.name);
        }
        if modern_glsl() {
            self.device
                .bind_frag_data_location(self.program, 0, FRAG_COLOR_OUTPUT);
        }
    }

    /// Links the program and re-resolves the well-known uniform locations.
    /// On failure the previous binary and locations stay in effect.
    pub fn link(&mut self) -> Result<()> {
        if let Err(log) = self.device.link_program(self.program) {
            log::warn!("shader program link failed: {log}");
            set_last_error(log.clone());
            return Err(VitrailError::ShaderLink(log));
        }
        self.locations = [
            self.device
                .uniform_location(self.program, PROJECTION_UNIFORM),
            self.device
                .uniform_location(self.program, MODEL_VIEW_UNIFORM),
            self.device.uniform_location(self.program, TEXTURE_UNIFORM),
            self.device
                .uniform_location(self.program, TEXTURE_ENABLED_UNIFORM),
        ];
        Ok(())
    }

    /// Makes this program current, skipping the driver call when the
    /// (context, program) pair is already the thread's last-bound one.
    pub fn bind(&self) -> Result<()> {
        let context = Context::ensure()?;
        let fresh = BINDING.with(|binding| {
            binding
                .borrow_mut()
                .needs_bind(context.id(), self.program)
        });
        if fresh {
            self.device.use_program(Some(self.program));
        }
        Ok(())
    }

    /// Resolves a uniform by name in the linked program.
    #[must_use]
    pub fn locate(&self, name: &str) -> Option<UniformLocation> {
        self.device.uniform_location(self.program, name)
    }

    // ------------------------------------------------------------------
    // By-name setters. Each binds the program first; unknown names are
    // silently ignored, matching driver behavior for optimized-out uniforms.
    // ------------------------------------------------------------------

    pub fn set_matrix(&self, name: &str, matrix: &Matrix) -> Result<()> {
        self.bind()?;
        if let Some(location) = self.locate(name) {
            self.device.set_uniform_matrix4(location, matrix.as_array());
        }
        Ok(())
    }

    pub fn set_int(&self, name: &str, value: i32) -> Result<()> {
        self.bind()?;
        if let Some(location) = self.locate(name) {
            self.device.set_uniform_i32(location, value);
        }
        Ok(())
    }

    pub fn set_float(&self, name: &str, value: f32) -> Result<()> {
        self.bind()?;
        if let Some(location) = self.locate(name) {
            self.device.set_uniform_f32(location, value);
        }
        Ok(())
    }

    pub fn set_vec2(&self, name: &str, value: [f32; 2]) -> Result<()> {
        self.bind()?;
        if let Some(location) = self.locate(name) {
            self.device.set_uniform_vec2(location, value);
        }
        Ok(())
    }

    pub fn set_vec3(&self, name: &str, value: [f32; 3]) -> Result<()> {
        self.bind()?;
        if let Some(location) = self.locate(name) {
            self.device.set_uniform_vec3(location, value);
        }
        Ok(())
    }

    /// Sets a `vec4` uniform from a color, normalized to `[0, 1]`.
    pub fn set_color(&self, name: &str, color: Color) -> Result<()> {
        self.bind()?;
        if let Some(location) = self.locate(name) {
            self.device.set_uniform_vec4(location, color.to_vec4());
        }
        Ok(())
    }

    /// Sets a `bool` uniform (an integer 0 or 1 on the wire).
    pub fn set_bool(&self, name: &str, value: bool) -> Result<()> {
        self.set_int(name, i32::from(value))
    }

    /// Points a sampler uniform at texture unit 0, where the runtime binds
    /// the active texture.
    pub fn set_current_texture(&self, name: &str) -> Result<()> {
        self.set_int(name, 0)
    }

    // ------------------------------------------------------------------
    // By-location setters, for user uniforms resolved once via `locate`.
    // Locations are only valid for the program that resolved them and
    // expire at the next successful link.
    // ------------------------------------------------------------------

    pub fn set_matrix_at(&self, location: UniformLocation, matrix: &Matrix) -> Result<()> {
        self.bind()?;
        self.device.set_uniform_matrix4(location, matrix.as_array());
        Ok(())
    }

    pub fn set_int_at(&self, location: UniformLocation, value: i32) -> Result<()> {
        self.bind()?;
        self.device.set_uniform_i32(location, value);
        Ok(())
    }

    pub fn set_float_at(&self, location: UniformLocation, value: f32) -> Result<()> {
        self.bind()?;
        self.device.set_uniform_f32(location, value);
        Ok(())
    }

    pub fn set_vec2_at(&self, location: UniformLocation, value: [f32; 2]) -> Result<()> {
        self.bind()?;
        self.device.set_uniform_vec2(location, value);
        Ok(())
    }

    pub fn set_vec3_at(&self, location: UniformLocation, value: [f32; 3]) -> Result<()> {
        self.bind()?;
        self.device.set_uniform_vec3(location, value);
        Ok(())
    }

    pub fn set_color_at(&self, location: UniformLocation, color: Color) -> Result<()> {
        self.bind()?;
        self.device.set_uniform_vec4(location, color.to_vec4());
        Ok(())
    }

    pub fn set_bool_at(&self, location: UniformLocation, value: bool) -> Result<()> {
        self.set_int_at(location, i32::from(value))
    }

    // ------------------------------------------------------------------
    // By-id setters over the cached locations; the per-draw path.
    // ------------------------------------------------------------------

    pub fn set_matrix_id(&self, id: UniformId, matrix: &Matrix) -> Result<()> {
        self.bind()?;
        if let Some(location) = self.locations[id.index()] {
            self.device.set_uniform_matrix4(location, matrix.as_array());
        }
        Ok(())
    }

    pub fn set_int_id(&self, id: UniformId, value: i32) -> Result<()> {
        self.bind()?;
        if let Some(location) = self.locations[id.index()] {
            self.device.set_uniform_i32(location, value);
        }
        Ok(())
    }

    pub fn set_bool_id(&self, id: UniformId, value: bool) -> Result<()> {
        self.set_int_id(id, i32::from(value))
    }

    pub fn set_texture_unit_id(&self, id: UniformId, unit: i32) -> Result<()> {
        self.set_int_id(id, unit)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.detach_geometry();
        self.device.detach_shader(self.program, self.vertex);
        self.device.detach_shader(self.program, self.fragment);
        self.device.delete_shader(self.vertex);
        self.device.delete_shader(self.fragment);
        self.device.delete_program(self.program);
        // The deleted program's name may be recycled by the driver.
        invalidate_program_binding();
    }
}
