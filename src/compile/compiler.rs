//! Seam to the external shader compiler service.

use crate::kernel::DefinitionSet;
use crate::types::{FeatureLevel, ShaderPlatform};
use std::sync::Arc;

/// One permutation of one kernel to compile.
#[derive(Debug, Clone)]
pub struct ShaderCompileInput {
    /// `<graph>/<entry point>`, used in diagnostics
    pub friendly_name: String,
    pub entry_point: String,
    pub source: Arc<str>,
    /// Kernel and data-interface defines plus the permutation's domain values
    pub definitions: DefinitionSet,
    pub permutation_id: u32,
    pub shader_platform: ShaderPlatform,
    pub feature_level: FeatureLevel,
    /// Cook target name, if compiling for a cook
    pub target_platform: Option<String>,
}

/// Successful compile output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderCompileOutput {
    pub bytecode: Vec<u8>,
    pub warnings: Vec<String>,
}

/// Request/response shader compiler. Called from compile worker threads.
pub trait ShaderCompiler: Send + Sync {
    /// Compile one permutation. On failure, return the compiler's error lines.
    fn compile(&self, input: &ShaderCompileInput) -> Result<ShaderCompileOutput, Vec<String>>;
}
