//! Shader stages and linked programs
//!
//! Compile and link failures never abort: the error text is kept on the
//! object, `is_compiled()` / `is_linked()` report the outcome, and callers
//! decide what to fall back to. Sources are either inline text or file paths;
//! file sources are re-read on every reload so edits on disk are picked up.

use std::fs;
use std::path::PathBuf;

use crate::render::driver::{GraphicsDriver, ObjectId, ShaderStage, UniformValue};
use crate::render::material::TextureLevel;
use crate::render::RenderResult;

/// Where a stage's GLSL comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    /// Source text held in memory
    Inline(String),
    /// Plain-text file read at load time
    File(PathBuf),
}

impl ShaderSource {
    /// Resolve to source text
    pub fn load(&self) -> std::io::Result<String> {
        match self {
            Self::Inline(source) => Ok(source.clone()),
            Self::File(path) => fs::read_to_string(path),
        }
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Inline(_) => "<inline>".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// One compiled shader stage
#[derive(Debug)]
pub struct Shader {
    id: ObjectId,
    stage: ShaderStage,
    source: ShaderSource,
    error: Option<String>,
}

impl Shader {
    /// Create and compile a stage
    ///
    /// Only driver allocation failure is an error; a compile failure yields a
    /// shader with `is_compiled() == false`.
    pub fn new(driver: &mut dyn GraphicsDriver, stage: ShaderStage, source: ShaderSource) -> RenderResult<Self> {
        let id = driver.create_shader(stage)?;
        let mut shader = Self { id, stage, source, error: None };
        shader.compile(driver);
        Ok(shader)
    }

    fn compile(&mut self, driver: &mut dyn GraphicsDriver) {
        let text = match self.source.load() {
            Ok(text) => text,
            Err(e) => {
                self.error = Some(format!("cannot read {}: {}", self.source.describe(), e));
                return;
            }
        };
        self.error = driver.compile_shader(self.id, &text).err();
        if let Some(error) = &self.error {
            log::error!("{:?} shader {} failed to compile: {}", self.stage, self.source.describe(), error);
        }
    }

    /// Whether the last compile succeeded
    pub fn is_compiled(&self) -> bool {
        self.id != 0 && self.error.is_none()
    }

    /// Compiler output of the last failed compile
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Pipeline stage
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Driver name
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Source description
    pub fn source(&self) -> &ShaderSource {
        &self.source
    }

    /// Release the driver shader
    pub fn destroy(&mut self, driver: &mut dyn GraphicsDriver) {
        if self.id != 0 {
            driver.delete_shader(self.id);
            self.id = 0;
        }
    }
}

/// Linked shader program
#[derive(Debug)]
pub struct ShaderProgram {
    name: String,
    id: ObjectId,
    stages: Vec<(ShaderStage, ShaderSource)>,
    shaders: Vec<Shader>,
    texture_levels: Vec<TextureLevel>,
    samples_environment: bool,
    linked: bool,
    error: Option<String>,
}

impl ShaderProgram {
    /// Compile every stage and link
    ///
    /// With `validate` set the program is also validated after a successful
    /// link, which development builds enable through the engine config.
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        name: impl Into<String>,
        stages: Vec<(ShaderStage, ShaderSource)>,
        validate: bool,
    ) -> RenderResult<Self> {
        let id = driver.create_program()?;
        let mut program = Self {
            name: name.into(),
            id,
            stages,
            shaders: Vec::new(),
            texture_levels: Vec::new(),
            samples_environment: false,
            linked: false,
            error: None,
        };
        program.build(driver, validate)?;
        Ok(program)
    }

    /// Declare the texture levels the fragment stage samples
    pub fn with_texture_levels(mut self, levels: &[TextureLevel]) -> Self {
        self.texture_levels = levels.to_vec();
        self
    }

    /// Declare that the program samples the environment cube map
    pub fn with_environment(mut self) -> Self {
        self.samples_environment = true;
        self
    }

    fn build(&mut self, driver: &mut dyn GraphicsDriver, validate: bool) -> RenderResult<()> {
        for (stage, source) in &self.stages {
            self.shaders.push(Shader::new(driver, *stage, source.clone())?);
        }
        self.link(driver, validate);
        Ok(())
    }

    /// Attach every stage and link; returns the link outcome
    pub fn link(&mut self, driver: &mut dyn GraphicsDriver, validate: bool) -> bool {
        self.error = self
            .shaders
            .iter()
            .find_map(|s| s.error().map(|e| format!("{:?} stage: {}", s.stage(), e)));

        if self.error.is_none() {
            for shader in &self.shaders {
                driver.attach_shader(self.id, shader.id());
            }
            self.error = driver.link_program(self.id).err();
            if self.error.is_none() && validate {
                self.error = driver.validate_program(self.id).err();
            }
        }

        self.linked = self.error.is_none();
        match &self.error {
            None => log::debug!("Program '{}' linked", self.name),
            Some(error) => log::error!("Program '{}' failed to link: {}", self.name, error),
        }
        self.linked
    }

    /// Detach and destroy every stage, recreate them from their sources and
    /// relink into a fresh program object
    pub fn reload(&mut self, driver: &mut dyn GraphicsDriver, validate: bool) -> RenderResult<bool> {
        self.destroy(driver);
        self.id = driver.create_program()?;
        self.build(driver, validate)?;
        Ok(self.linked)
    }

    /// Make this program current; fails when the program is not linked
    pub fn bind(&self, driver: &mut dyn GraphicsDriver) -> bool {
        if !self.is_linked() {
            return false;
        }
        driver.use_program(Some(self.id));
        true
    }

    /// Write a uniform; returns whether the program has it
    pub fn set_uniform(&self, driver: &mut dyn GraphicsDriver, name: &str, value: UniformValue) -> bool {
        self.is_linked() && driver.set_uniform(self.id, name, value)
    }

    /// Release the program and its stages
    pub fn destroy(&mut self, driver: &mut dyn GraphicsDriver) {
        for mut shader in self.shaders.drain(..) {
            if self.id != 0 {
                driver.detach_shader(self.id, shader.id());
            }
            shader.destroy(driver);
        }
        if self.id != 0 {
            driver.delete_program(self.id);
            self.id = 0;
        }
        self.linked = false;
    }

    /// Whether the last link succeeded
    pub fn is_linked(&self) -> bool {
        self.id != 0 && self.linked
    }

    /// Compile or link error of the last build
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver name
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Texture levels sampled by the program
    pub fn texture_levels(&self) -> &[TextureLevel] {
        &self.texture_levels
    }

    /// Whether the program samples the environment cube map
    pub fn samples_environment(&self) -> bool {
        self.samples_environment
    }

    /// Stage sources
    pub fn stages(&self) -> &[(ShaderStage, ShaderSource)] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDriver;
    use std::io::Write;

    fn stages(fragment: &str) -> Vec<(ShaderStage, ShaderSource)> {
        vec![
            (ShaderStage::Vertex, ShaderSource::Inline("void main() {}".into())),
            (ShaderStage::Fragment, ShaderSource::Inline(fragment.into())),
        ]
    }

    #[test]
    fn test_program_links() {
        let mut driver = HeadlessDriver::new();
        let program = ShaderProgram::new(&mut driver, "ok", stages("void main() {}"), true).unwrap();
        assert!(program.is_linked());
        assert!(program.bind(&mut driver));
        assert_eq!(driver.current_program(), Some(program.id()));
    }

    #[test]
    fn test_compile_failure_is_recorded_not_raised() {
        let mut driver = HeadlessDriver::new();
        let program = ShaderProgram::new(&mut driver, "broken", stages("#error nope"), false).unwrap();
        assert!(!program.is_linked());
        assert!(program.error().unwrap().contains("Fragment"));
        assert!(!program.bind(&mut driver));
    }

    #[test]
    fn test_missing_file_source_fails_compile() {
        let mut driver = HeadlessDriver::new();
        let source = ShaderSource::File(PathBuf::from("/nonexistent/shader.frag"));
        let shader = Shader::new(&mut driver, ShaderStage::Fragment, source).unwrap();
        assert!(!shader.is_compiled());
        assert!(shader.error().unwrap().contains("cannot read"));
    }

    #[test]
    fn test_reload_picks_up_file_changes() {
        let mut driver = HeadlessDriver::new();
        let path = std::env::temp_dir().join(format!("scene_engine_reload_{}.frag", std::process::id()));
        fs::write(&path, "#error not yet").unwrap();

        let mut program = ShaderProgram::new(
            &mut driver,
            "file",
            vec![
                (ShaderStage::Vertex, ShaderSource::Inline("void main() {}".into())),
                (ShaderStage::Fragment, ShaderSource::File(path.clone())),
            ],
            false,
        )
        .unwrap();
        assert!(!program.is_linked());

        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"void main() {}").unwrap();
        drop(file);

        let old_id = program.id();
        assert!(program.reload(&mut driver, false).unwrap());
        assert_ne!(program.id(), old_id);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_destroy_releases_stages() {
        let mut driver = HeadlessDriver::new();
        let mut program = ShaderProgram::new(&mut driver, "ok", stages("void main() {}"), false).unwrap();
        program.destroy(&mut driver);
        assert_eq!(driver.live_object_count(), 0);
        assert!(!program.is_linked());
    }
}
