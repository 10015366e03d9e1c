//! Compile scheduling.
//!
//! [`CompileScheduler`] decides whether a kernel resource compiles
//! synchronously, hands it to [`KernelResource::cache_shaders`], and applies
//! the failure policy: a failed default kernel is fatal, any other failure is
//! logged with its compiler errors and the kernel stays disabled.

pub mod compiler;

pub use compiler::{ShaderCompileInput, ShaderCompileOutput, ShaderCompiler};

use crate::config::CompileConfig;
use crate::context::ComputeFrameworkContext;
use crate::error::{ComputeGraphError, Result};
use crate::resource::KernelResource;
use crate::types::{ShaderPlatform, TargetPlatform};
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Options for a caching request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompilationFlags: u32 {
        /// Ignore an in-memory complete shader map and consult the cache again
        const FORCE = 1 << 0;
        /// Block until the shader map is available or compilation failed
        const SYNCHRONOUS = 1 << 1;
        /// Publish the finished map to the rendering thread
        const APPLY_COMPLETED_SHADER_MAP_FOR_RENDERING = 1 << 2;
        const IS_COOKING = 1 << 3;
    }
}

pub struct CompileScheduler;

impl CompileScheduler {
    /// Only a non-default kernel compiled interactively in the editor (not
    /// under automation, not cooking) may compile asynchronously.
    pub fn resolve_flags(
        config: &CompileConfig,
        flags: CompilationFlags,
        is_default_kernel: bool,
    ) -> CompilationFlags {
        let may_be_async = config.editor
            && !config.automation_testing
            && !flags.contains(CompilationFlags::IS_COOKING)
            && !is_default_kernel;
        if may_be_async {
            flags
        } else {
            flags | CompilationFlags::SYNCHRONOUS
        }
    }

    /// Begin (or finish, when synchronous) caching one resource.
    ///
    /// Returns `Ok(false)` when a non-default kernel failed to compile and
    /// `Err(DefaultKernelCompile)` when a default kernel did.
    pub fn cache_shaders_for_resource(
        context: &Arc<ComputeFrameworkContext>,
        shader_platform: ShaderPlatform,
        target_platform: Option<&TargetPlatform>,
        flags: CompilationFlags,
        resource: &Arc<KernelResource>,
    ) -> Result<bool> {
        let is_default = resource.is_default_kernel();
        let flags = Self::resolve_flags(&context.config().compile, flags, is_default);

        if resource.cache_shaders(context, shader_platform, target_platform, flags) {
            return Ok(true);
        }

        let name = resource.friendly_name();
        let platform = shader_platform.shader_format().to_string();
        let errors = resource.compile_errors();

        if is_default {
            tracing::error!(
                "Failed to compile default kernel resource [{}] for platform [{}]!",
                name,
                platform
            );
            for error in &errors {
                tracing::error!("      [Error] - {}", error);
            }
            return Err(ComputeGraphError::DefaultKernelCompile {
                name,
                platform,
                errors,
            });
        }

        tracing::warn!(
            "Failed to compile kernel resource [{}] for platform [{}].",
            name,
            platform
        );
        for error in &errors {
            tracing::warn!("      [Error] - {}", error);
        }
        Ok(false)
    }
}
