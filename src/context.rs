//! Process-wide compute framework services
//!
//! [`ComputeFrameworkContext`] bundles everything graphs share: the
//! configuration, the render thread and, in editor builds, the compile worker
//! pool, the cache backend and the shader compiler service.

use crate::config::FrameworkConfig;
use crate::error::Result;
use crate::render::{RenderQueue, RenderThread};
use crate::types::{FeatureLevel, ShaderPlatform};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "editor")]
use crate::cache::{CacheBackend, FileSystemCacheBackend, MemoryCacheBackend};
#[cfg(feature = "editor")]
use crate::compile::ShaderCompiler;
#[cfg(feature = "editor")]
use crate::config::CacheBackendKind;
#[cfg(feature = "editor")]
use crate::error::ComputeGraphError;
#[cfg(feature = "editor")]
use crate::worker::WorkerPool;

pub struct ComputeFrameworkContext {
    config: FrameworkConfig,
    render_thread: RenderThread,
    #[cfg(feature = "editor")]
    workers: Arc<WorkerPool>,
    #[cfg(feature = "editor")]
    cache: Arc<dyn CacheBackend>,
    #[cfg(feature = "editor")]
    compiler: Arc<dyn ShaderCompiler>,
}

impl ComputeFrameworkContext {
    pub fn builder(config: FrameworkConfig) -> ComputeFrameworkContextBuilder {
        ComputeFrameworkContextBuilder {
            config,
            #[cfg(feature = "editor")]
            cache: None,
            #[cfg(feature = "editor")]
            compiler: None,
        }
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    pub fn shader_platform(&self) -> ShaderPlatform {
        self.config.rhi.shader_platform
    }

    /// Feature level kernel resources are cached for
    pub fn feature_level(&self) -> FeatureLevel {
        self.config.rhi.feature_level()
    }

    pub fn can_ever_render(&self) -> bool {
        self.config.rhi.can_ever_render
    }

    pub fn render_queue(&self) -> RenderQueue {
        self.render_thread.queue()
    }

    /// Wait for background compile work and queued render commands.
    /// Returns false if the timeout elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        #[cfg(feature = "editor")]
        let drained = self.workers.wait_idle(timeout);
        #[cfg(not(feature = "editor"))]
        let drained = true;
        drained && self.render_queue().flush(timeout).is_ok()
    }
}

#[cfg(feature = "editor")]
impl ComputeFrameworkContext {
    pub fn workers(&self) -> &Arc<WorkerPool> {
        &self.workers
    }

    pub fn cache(&self) -> &Arc<dyn CacheBackend> {
        &self.cache
    }

    pub fn compiler(&self) -> &Arc<dyn ShaderCompiler> {
        &self.compiler
    }
}

impl fmt::Debug for ComputeFrameworkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ComputeFrameworkContext");
        s.field("config", &self.config);
        #[cfg(feature = "editor")]
        s.field("cache", &self.cache.name());
        s.finish()
    }
}

#[cfg(feature = "editor")]
type CacheFactory = Box<dyn FnOnce(Arc<WorkerPool>) -> Arc<dyn CacheBackend>>;

pub struct ComputeFrameworkContextBuilder {
    config: FrameworkConfig,
    #[cfg(feature = "editor")]
    cache: Option<CacheFactory>,
    #[cfg(feature = "editor")]
    compiler: Option<Arc<dyn ShaderCompiler>>,
}

#[cfg(feature = "editor")]
impl ComputeFrameworkContextBuilder {
    pub fn with_compiler(mut self, compiler: Arc<dyn ShaderCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Use a custom cache backend built on the context's worker pool.
    pub fn with_cache<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(Arc<WorkerPool>) -> Arc<dyn CacheBackend> + 'static,
    {
        self.cache = Some(Box::new(factory));
        self
    }
}

impl ComputeFrameworkContextBuilder {
    #[cfg(feature = "editor")]
    pub fn build(self) -> Result<Arc<ComputeFrameworkContext>> {
        let render_thread = RenderThread::spawn()?;
        let compiler = self.compiler.ok_or_else(|| {
            ComputeGraphError::Config("no shader compiler service registered".to_string())
        })?;
        let workers = Arc::new(WorkerPool::new(
            "compile-worker",
            self.config.compile.worker_threads,
        )?);
        let cache = match self.cache {
            Some(factory) => factory(workers.clone()),
            None => match self.config.cache.backend {
                CacheBackendKind::Memory => {
                    Arc::new(MemoryCacheBackend::new(workers.clone())) as Arc<dyn CacheBackend>
                }
                CacheBackendKind::Filesystem => Arc::new(FileSystemCacheBackend::new(
                    self.config.cache.resolved_directory()?,
                    workers.clone(),
                )?),
            },
        };
        tracing::info!(
            "Compute framework ready ({}, {} cache)",
            self.config.rhi.shader_platform,
            cache.name()
        );
        Ok(Arc::new(ComputeFrameworkContext {
            config: self.config,
            render_thread,
            workers,
            cache,
            compiler,
        }))
    }

    #[cfg(not(feature = "editor"))]
    pub fn build(self) -> Result<Arc<ComputeFrameworkContext>> {
        let render_thread = RenderThread::spawn()?;
        tracing::info!(
            "Compute framework ready ({}, runtime)",
            self.config.rhi.shader_platform
        );
        Ok(Arc::new(ComputeFrameworkContext {
            config: self.config,
            render_thread,
        }))
    }
}
