//! Kernel resources
//!
//! A [`KernelResource`] owns the compiled shader map of one kernel at one
//! feature level. Its lifecycle:
//!
//! ```text
//! Empty ──setup──▶ Pending ──cache_shaders──▶ InFlight ──ok──▶ Complete
//!                                                      └─fail─▶ Failed
//! Complete/Failed ──invalidate──▶ Empty
//! ```
//!
//! The game-thread and rendering-thread shader maps are `Arc` pointers behind
//! locks. They are replaced wholesale, never mutated in place, so a reader
//! either sees the previous map or a fully built new one.
//!
//! Every caching request carries a generation number. Completions from an
//! older generation (invalidated, cancelled or superseded requests) are
//! dropped without publishing anything or firing the completion callback.

pub mod set;
pub mod shader_map;

pub use set::KernelResourceSet;
pub use shader_map::{CompiledShader, ExpectedShaderMap, ShaderMap, ShaderMapId};

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::data_interface::{MetadataHandle, ShaderParametersMetadataAllocations};
use crate::error::{ComputeGraphError, Result};
use crate::graph::KernelCacheKey;
use crate::kernel::{DefinitionSet, KernelFlags, PermutationVector};
use crate::types::{FeatureLevel, ShaderPlatform};
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "editor")]
use crate::cache::{CacheKey, CacheRecordBuilder, CacheResponse, CacheStatus, RequestOwner, VALUE_ID};
#[cfg(feature = "editor")]
use crate::compile::{CompilationFlags, ShaderCompileInput};
#[cfg(feature = "editor")]
use crate::context::ComputeFrameworkContext;
#[cfg(feature = "editor")]
use crate::types::TargetPlatform;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique resource identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelResourceState {
    Empty,
    Pending,
    InFlight,
    Complete,
    Failed,
}

/// Everything a resource needs to compile one kernel.
#[derive(Debug, Clone)]
pub struct KernelResourceSetup {
    pub feature_level: FeatureLevel,
    pub graph_name: String,
    pub entry_point: String,
    pub key: KernelCacheKey,
    pub source: Arc<str>,
    pub definitions: DefinitionSet,
    pub permutation_vector: PermutationVector,
    pub metadata_allocations: ShaderParametersMetadataAllocations,
    pub metadata: Option<MetadataHandle>,
    pub package_name: String,
    pub flags: KernelFlags,
}

impl KernelResourceSetup {
    fn expected_shader_map(&self) -> ExpectedShaderMap {
        ExpectedShaderMap {
            key: self.key,
            feature_level: self.feature_level,
            permutation_ids: self.permutation_vector.permutation_ids(),
        }
    }

    fn friendly_name(&self) -> String {
        format!("{}/{}", self.graph_name, self.entry_point)
    }
}

pub type CompilationCompleteCallback = Arc<dyn Fn(&KernelResource) + Send + Sync>;

struct ResourceInner {
    state: KernelResourceState,
    setup: Option<Arc<KernelResourceSetup>>,
    shader_platform: Option<ShaderPlatform>,
    compile_errors: Vec<String>,
    generation: u64,
    #[cfg(feature = "editor")]
    request_owner: Option<RequestOwner>,
    on_compilation_complete: Option<CompilationCompleteCallback>,
}

/// Compiled artifact for one (kernel, feature level) pair.
pub struct KernelResource {
    id: ResourceId,
    inner: Mutex<ResourceInner>,
    finished: Condvar,
    game_thread_shader_map: RwLock<Option<Arc<ShaderMap>>>,
    rendering_thread_shader_map: RwLock<Option<Arc<ShaderMap>>>,
}

impl Default for KernelResource {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelResource {
    pub fn new() -> Self {
        Self {
            id: ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)),
            inner: Mutex::new(ResourceInner {
                state: KernelResourceState::Empty,
                setup: None,
                shader_platform: None,
                compile_errors: Vec::new(),
                generation: 0,
                #[cfg(feature = "editor")]
                request_owner: None,
                on_compilation_complete: None,
            }),
            finished: Condvar::new(),
            game_thread_shader_map: RwLock::new(None),
            rendering_thread_shader_map: RwLock::new(None),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn state(&self) -> KernelResourceState {
        self.inner.lock().state
    }

    /// Install compilation inputs. Re-running setup with the key the resource
    /// already holds keeps the current artifacts; a different key invalidates
    /// the resource first.
    pub fn setup(&self, setup: KernelResourceSetup) {
        {
            let mut inner = self.inner.lock();
            match &inner.setup {
                Some(current)
                    if current.key == setup.key && current.feature_level == setup.feature_level =>
                {
                    if inner.state == KernelResourceState::Empty {
                        inner.state = KernelResourceState::Pending;
                    }
                    return;
                }
                // A loaded map built for exactly these inputs is adopted
                None if self.game_thread_shader_map.read().as_ref().is_some_and(|map| {
                    map.id.key == setup.key && map.id.feature_level == setup.feature_level
                }) =>
                {
                    inner.setup = Some(Arc::new(setup));
                    return;
                }
                _ => {}
            }
        }

        self.invalidate();

        let mut inner = self.inner.lock();
        tracing::trace!(
            "Resource {} set up for {} with key {:?}",
            self.id,
            setup.friendly_name(),
            setup.key
        );
        inner.setup = Some(Arc::new(setup));
        inner.state = KernelResourceState::Pending;
    }

    pub fn setup_data(&self) -> Option<Arc<KernelResourceSetup>> {
        self.inner.lock().setup.clone()
    }

    pub fn key(&self) -> Option<KernelCacheKey> {
        self.inner.lock().setup.as_ref().map(|s| s.key)
    }

    pub fn feature_level(&self) -> Option<FeatureLevel> {
        self.inner.lock().setup.as_ref().map(|s| s.feature_level)
    }

    /// `<graph>/<entry point>`, or the loaded map's name for cooked data
    pub fn friendly_name(&self) -> String {
        if let Some(setup) = &self.inner.lock().setup {
            return setup.friendly_name();
        }
        self.game_thread_shader_map()
            .map(|map| map.friendly_name.clone())
            .unwrap_or_else(|| format!("KernelResource{}", self.id))
    }

    pub fn is_default_kernel(&self) -> bool {
        self.inner
            .lock()
            .setup
            .as_ref()
            .is_some_and(|s| s.flags.contains(KernelFlags::IS_DEFAULT_KERNEL))
    }

    /// What a shader map must satisfy to be complete for this resource.
    /// `None` for resources that were never set up (cooked runtime data).
    pub fn expected_shader_map(&self) -> Option<ExpectedShaderMap> {
        self.inner
            .lock()
            .setup
            .as_ref()
            .map(|s| s.expected_shader_map())
    }

    pub fn game_thread_shader_map(&self) -> Option<Arc<ShaderMap>> {
        self.game_thread_shader_map.read().clone()
    }

    /// Shader map the render thread dispatches with.
    pub fn rendering_thread_shader_map(&self) -> Option<Arc<ShaderMap>> {
        self.rendering_thread_shader_map.read().clone()
    }

    /// The game-thread map exists and is complete for the current inputs.
    pub fn is_complete(&self, silent: bool) -> bool {
        self.game_thread_shader_map()
            .is_some_and(|map| map.is_complete(self, silent))
    }

    /// Complete for the given shader platform.
    pub fn is_complete_for(&self, shader_platform: ShaderPlatform, silent: bool) -> bool {
        self.game_thread_shader_map().is_some_and(|map| {
            map.shader_platform() == shader_platform && map.is_complete(self, silent)
        })
    }

    pub fn compile_errors(&self) -> Vec<String> {
        self.inner.lock().compile_errors.clone()
    }

    /// The last compile failure as an error value.
    pub fn compile_failure(&self) -> Option<ComputeGraphError> {
        let inner = self.inner.lock();
        if inner.state != KernelResourceState::Failed {
            return None;
        }
        Some(ComputeGraphError::Compile {
            name: inner
                .setup
                .as_ref()
                .map(|s| s.friendly_name())
                .unwrap_or_default(),
            platform: inner
                .shader_platform
                .map(|p| p.shader_format().to_string())
                .unwrap_or_default(),
            errors: inner.compile_errors.clone(),
        })
    }

    /// Called once per finished (successful or failed) caching request.
    /// Not called for cancelled requests.
    pub fn bind_on_compilation_complete<F>(&self, callback: F)
    where
        F: Fn(&KernelResource) + Send + Sync + 'static,
    {
        self.inner.lock().on_compilation_complete = Some(Arc::new(callback));
    }

    pub fn is_compilation_finished(&self) -> bool {
        self.state() != KernelResourceState::InFlight
    }

    /// Block until the current request (if any) finishes.
    pub fn finish_compilation(&self) {
        let mut inner = self.inner.lock();
        let generation = inner.generation;
        while inner.state == KernelResourceState::InFlight && inner.generation == generation {
            self.finished.wait(&mut inner);
        }
    }

    /// Install a shader map directly (cooked data). Cancels any request in flight.
    pub fn set_inline_shader_map(&self, map: Arc<ShaderMap>) {
        {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state = KernelResourceState::Complete;
            inner.shader_platform = Some(map.shader_platform());
            inner.compile_errors.clear();
            *self.game_thread_shader_map.write() = Some(map.clone());
            *self.rendering_thread_shader_map.write() = Some(map);
            self.take_request_owner(&mut inner);
        }
        self.finished.notify_all();
    }

    /// Release the shader maps. The compilation inputs are kept.
    pub fn discard_shader_map(&self) {
        let mut inner = self.inner.lock();
        *self.game_thread_shader_map.write() = None;
        *self.rendering_thread_shader_map.write() = None;
        if inner.state == KernelResourceState::Complete {
            inner.state = if inner.setup.is_some() {
                KernelResourceState::Pending
            } else {
                KernelResourceState::Empty
            };
        }
    }

    /// Cancel any request in flight, release the shader maps and forget the
    /// compilation inputs.
    pub fn invalidate(&self) {
        {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state = KernelResourceState::Empty;
            inner.setup = None;
            inner.compile_errors.clear();
            *self.game_thread_shader_map.write() = None;
            *self.rendering_thread_shader_map.write() = None;
            self.take_request_owner(&mut inner);
        }
        self.finished.notify_all();
    }

    /// Cancel the request in flight, leaving the resource `Empty` with its
    /// inputs intact. The completion callback does not fire.
    pub fn cancel_compilation(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state != KernelResourceState::InFlight {
                return;
            }
            inner.generation += 1;
            inner.state = KernelResourceState::Empty;
            self.take_request_owner(&mut inner);
        }
        self.finished.notify_all();
    }

    #[cfg(feature = "editor")]
    fn take_request_owner(&self, inner: &mut ResourceInner) {
        if let Some(owner) = inner.request_owner.take() {
            owner.cancel();
        }
    }

    #[cfg(not(feature = "editor"))]
    fn take_request_owner(&self, _inner: &mut ResourceInner) {}

    /// Write the game-thread shader map (or its absence).
    pub fn serialize_shader_map<W: Write>(&self, archive: &mut ArchiveWriter<W>) -> Result<()> {
        let map = self.game_thread_shader_map();
        archive.write_value(&map.as_deref())
    }

    /// Read a shader map written by [`Self::serialize_shader_map`].
    pub fn deserialize_shader_map<R: Read>(
        archive: &mut ArchiveReader<R>,
    ) -> Result<Option<ShaderMap>> {
        archive.read_value()
    }

    /// Publish a finished request. Stale generations are ignored.
    #[cfg_attr(not(feature = "editor"), allow(dead_code))]
    fn finish(
        &self,
        generation: u64,
        result: std::result::Result<Arc<ShaderMap>, Vec<String>>,
        apply_for_rendering: bool,
    ) {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != KernelResourceState::InFlight {
                tracing::trace!("Resource {} dropped a stale completion", self.id);
                return;
            }
            match result {
                Ok(map) => {
                    *self.game_thread_shader_map.write() = Some(map.clone());
                    if apply_for_rendering {
                        *self.rendering_thread_shader_map.write() = Some(map);
                    }
                    inner.state = KernelResourceState::Complete;
                }
                Err(errors) => {
                    *self.game_thread_shader_map.write() = None;
                    inner.compile_errors = errors;
                    inner.state = KernelResourceState::Failed;
                }
            }
            #[cfg(feature = "editor")]
            {
                inner.request_owner = None;
            }
            inner.on_compilation_complete.clone()
        };
        self.finished.notify_all();

        if let Some(callback) = callback {
            callback(self);
        }
    }
}

#[cfg(feature = "editor")]
struct CacheRequest {
    generation: u64,
    setup: Arc<KernelResourceSetup>,
    shader_platform: ShaderPlatform,
    target_platform: Option<String>,
    apply_for_rendering: bool,
    owner: RequestOwner,
}

#[cfg(feature = "editor")]
impl KernelResource {
    /// Begin caching this resource's shader map: consult the cache, compile
    /// on a miss, and publish the result. Blocks iff `SYNCHRONOUS` is set.
    ///
    /// Returns false when the resource was never set up or compilation failed.
    pub fn cache_shaders(
        self: &Arc<Self>,
        context: &Arc<ComputeFrameworkContext>,
        shader_platform: ShaderPlatform,
        target_platform: Option<&TargetPlatform>,
        flags: CompilationFlags,
    ) -> bool {
        let synchronous = flags.contains(CompilationFlags::SYNCHRONOUS);
        let apply_for_rendering =
            flags.contains(CompilationFlags::APPLY_COMPLETED_SHADER_MAP_FOR_RENDERING);

        let request = {
            let mut inner = self.inner.lock();
            let Some(setup) = inner.setup.clone() else {
                tracing::warn!("Resource {} cached before setup", self.id);
                return false;
            };

            match inner.state {
                KernelResourceState::InFlight => {
                    let generation = inner.generation;
                    if synchronous {
                        while inner.state == KernelResourceState::InFlight
                            && inner.generation == generation
                        {
                            self.finished.wait(&mut inner);
                        }
                    }
                    return inner.state != KernelResourceState::Failed;
                }
                KernelResourceState::Complete if !flags.contains(CompilationFlags::FORCE) => {
                    let map = self.game_thread_shader_map.read().clone();
                    if let Some(map) = map {
                        let expected = setup.expected_shader_map();
                        if map.shader_platform() == shader_platform
                            && map.satisfies(Some(&expected), true)
                        {
                            if apply_for_rendering {
                                *self.rendering_thread_shader_map.write() = Some(map);
                            }
                            return true;
                        }
                    }
                }
                _ => {}
            }

            inner.generation += 1;
            inner.state = KernelResourceState::InFlight;
            inner.shader_platform = Some(shader_platform);
            inner.compile_errors.clear();
            let owner = RequestOwner::new();
            if let Some(previous) = inner.request_owner.replace(owner.clone()) {
                previous.cancel();
            }

            CacheRequest {
                generation: inner.generation,
                setup,
                shader_platform,
                target_platform: target_platform.map(|t| t.name.clone()),
                apply_for_rendering,
                owner,
            }
        };

        let generation = request.generation;
        let key = CacheKey::kernel(*request.setup.key.digest());
        let owner = request.owner.clone();
        tracing::debug!(
            "Caching {} for {} ({})",
            request.setup.friendly_name(),
            shader_platform,
            key
        );

        let this = Arc::clone(self);
        let job_context = Arc::clone(context);
        context.cache().get(
            &key,
            &owner,
            Box::new(move |response| this.on_cache_response(&job_context, request, response)),
        );

        if synchronous {
            let mut inner = self.inner.lock();
            while inner.state == KernelResourceState::InFlight && inner.generation == generation {
                self.finished.wait(&mut inner);
            }
            return inner.state != KernelResourceState::Failed;
        }
        true
    }

    fn on_cache_response(
        self: Arc<Self>,
        context: &Arc<ComputeFrameworkContext>,
        request: CacheRequest,
        response: CacheResponse,
    ) {
        if request.owner.is_cancelled() {
            return;
        }

        let name = request.setup.friendly_name();
        match response.status {
            CacheStatus::Cancelled => return,
            CacheStatus::Ok => {
                match Self::shader_map_from_response(&request, &response) {
                    Ok(map) => {
                        tracing::debug!("Cache hit for {} ({})", name, response.key);
                        self.finish(request.generation, Ok(Arc::new(map)), request.apply_for_rendering);
                        return;
                    }
                    Err(e) => {
                        tracing::warn!("Discarding cached shader map for {}: {}", name, e);
                    }
                }
            }
            CacheStatus::Miss => {
                tracing::debug!("Cache miss for {} ({})", name, response.key);
            }
            CacheStatus::Error => {
                tracing::warn!(
                    "Cache error for {} ({}), compiling instead: {}",
                    name,
                    response.key,
                    response.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        let this = Arc::clone(&self);
        let job_context = Arc::clone(context);
        let generation = request.generation;
        let apply_for_rendering = request.apply_for_rendering;
        if let Err(e) = context
            .workers()
            .execute(move || this.run_compile_job(&job_context, request))
        {
            self.finish(generation, Err(vec![e.to_string()]), apply_for_rendering);
        }
    }

    fn shader_map_from_response(
        request: &CacheRequest,
        response: &CacheResponse,
    ) -> Result<ShaderMap> {
        let bytes = response
            .record
            .as_ref()
            .and_then(|record| record.value(VALUE_ID))
            .ok_or_else(|| ComputeGraphError::Cache(format!("record has no '{}' value", VALUE_ID)))?;
        let map = ShaderMap::from_bytes(bytes)?;
        let expected = request.setup.expected_shader_map();
        if map.shader_platform() != request.shader_platform || !map.satisfies(Some(&expected), true) {
            return Err(ComputeGraphError::Cache(
                "cached shader map does not match the request".to_string(),
            ));
        }
        Ok(map)
    }

    /// Compile every permutation, then store and publish the shader map.
    fn run_compile_job(self: Arc<Self>, context: &Arc<ComputeFrameworkContext>, request: CacheRequest) {
        if request.owner.is_cancelled() {
            return;
        }

        let setup = &request.setup;
        let friendly_name = setup.friendly_name();
        let permutation_ids = setup.permutation_vector.permutation_ids();
        tracing::info!(
            "Compiling {} for {} ({} permutations)",
            friendly_name,
            request.shader_platform,
            permutation_ids.len()
        );

        let mut map = ShaderMap::new(
            ShaderMapId {
                key: setup.key,
                feature_level: setup.feature_level,
                shader_platform: request.shader_platform,
            },
            friendly_name.clone(),
            permutation_ids.len() as u32,
        );
        let mut errors = Vec::new();

        for permutation_id in permutation_ids {
            if request.owner.is_cancelled() {
                return;
            }
            let mut definitions = setup.definitions.clone();
            for (symbol, value) in setup.permutation_vector.defines_for(permutation_id) {
                definitions.add(symbol, value);
            }
            let input = ShaderCompileInput {
                friendly_name: friendly_name.clone(),
                entry_point: setup.entry_point.clone(),
                source: setup.source.clone(),
                definitions,
                permutation_id,
                shader_platform: request.shader_platform,
                feature_level: setup.feature_level,
                target_platform: request.target_platform.clone(),
            };
            match context.compiler().compile(&input) {
                Ok(output) => {
                    for warning in &output.warnings {
                        tracing::debug!("{} [{}]: {}", friendly_name, permutation_id, warning);
                    }
                    map.add_shader(CompiledShader {
                        permutation_id,
                        bytecode: output.bytecode,
                    });
                }
                Err(permutation_errors) => errors.extend(permutation_errors),
            }
        }

        if !errors.is_empty() {
            self.finish(request.generation, Err(errors), request.apply_for_rendering);
            return;
        }

        match map.to_bytes() {
            Ok(bytes) => context.cache().put(
                CacheRecordBuilder::new(CacheKey::kernel(*setup.key.digest()))
                    .add_value(VALUE_ID, bytes),
                &request.owner,
            ),
            Err(e) => tracing::warn!("Failed to encode shader map for {}: {}", friendly_name, e),
        }

        self.finish(request.generation, Ok(Arc::new(map)), request.apply_for_rendering);
    }
}

impl fmt::Debug for KernelResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("KernelResource")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("key", &inner.setup.as_ref().map(|s| s.key))
            .finish()
    }
}
