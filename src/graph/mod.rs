//! Compute graphs
//!
//! A [`ComputeGraph`] is a DAG of kernel invocations bound to data interfaces
//! by [`GraphEdge`]s. It owns one [`KernelResourceSet`] per kernel slot and
//! publishes an immutable [`GraphRenderProxy`] for the render thread.
//!
//! # Threading
//!
//! All mutation happens on the thread that owns the graph (the game thread).
//! Compile completions arrive on worker threads and are routed back through
//! a channel; call [`ComputeGraph::process_compilation_events`] from the game
//! thread to deliver them and swap in a fresh proxy once nothing is in flight.
//!
//! # Example
//!
//! ```ignore
//! let mut graph = ComputeGraph::new("Deformer", context.clone());
//! let kernel = graph.add_kernel(Arc::new(ComputeKernel::new(source)));
//! let buffer = graph.add_data_interface(Arc::new(MeshBuffer::default()));
//! graph.add_edge(GraphEdge::input(kernel, 0, buffer, 0));
//! graph.validate()?;
//! graph.update_resources()?;
//! ```

pub mod assembler;
pub mod id;
pub mod key;
pub mod providers;
pub mod validate;

#[cfg(feature = "editor")]
pub mod cook;

pub use assembler::{AssembledKernel, ShaderSourceAssembler};
pub use id::{DataInterfaceIndex, KernelIndex};
pub use key::KernelCacheKey;
pub use validate::GraphValidator;

#[cfg(feature = "editor")]
pub use cook::PlatformCookStore;
#[cfg(feature = "editor")]
pub use key::{KeyContext, KeyDeriver};

use crate::archive::{ArchiveHeader, ArchiveReader, ArchiveWriter};
use crate::context::ComputeFrameworkContext;
use crate::data_interface::{
    unique_data_interface_name, DataInterface, MetadataHandle, MetadataUseCase,
    ShaderParametersMetadataAllocations, ShaderParametersMetadataBuilder,
};
use crate::error::{ComputeGraphError, Result, ResultExt, ValidationErrors};
use crate::kernel::{ComputeKernel, KernelSource, PermutationVector};
use crate::render::{GraphRenderProxy, RenderProxyBuilder};
use crate::resource::{KernelResource, KernelResourceSet, ResourceId, ShaderMap};
use crate::types::ShaderPlatform;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use validate::{enabled_source, kernel_data_interface_slots};

#[cfg(feature = "editor")]
use crate::compile::{CompilationFlags, CompileScheduler};
#[cfg(feature = "editor")]
use crate::resource::KernelResourceSetup;
#[cfg(feature = "editor")]
use crate::types::{FeatureLevel, TargetPlatform};

/// Wires one data-interface function to one external function slot of a kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub kernel_index: KernelIndex,
    /// Slot in the kernel's external inputs (or outputs)
    pub kernel_binding_index: u32,
    pub data_interface_index: DataInterfaceIndex,
    /// Function in the data interface's supported inputs (or outputs)
    pub data_interface_binding_index: u32,
    pub is_kernel_input: bool,
    pub binding_function_name_override: Option<String>,
}

impl GraphEdge {
    /// The kernel reads through the data interface.
    pub fn input(
        kernel_index: KernelIndex,
        kernel_binding_index: u32,
        data_interface_index: DataInterfaceIndex,
        data_interface_binding_index: u32,
    ) -> Self {
        Self {
            kernel_index,
            kernel_binding_index,
            data_interface_index,
            data_interface_binding_index,
            is_kernel_input: true,
            binding_function_name_override: None,
        }
    }

    /// The kernel writes through the data interface.
    pub fn output(
        kernel_index: KernelIndex,
        kernel_binding_index: u32,
        data_interface_index: DataInterfaceIndex,
        data_interface_binding_index: u32,
    ) -> Self {
        Self {
            is_kernel_input: false,
            ..Self::input(
                kernel_index,
                kernel_binding_index,
                data_interface_index,
                data_interface_binding_index,
            )
        }
    }

    /// Name the generated shim instead of using the kernel slot's name.
    pub fn with_name_override(mut self, name: impl Into<String>) -> Self {
        self.binding_function_name_override = Some(name.into());
        self
    }
}

/// A finished caching request, routed from a worker thread to the game thread.
#[derive(Debug, Clone)]
pub struct CompilationEvent {
    pub kernel_index: KernelIndex,
    pub resource_id: ResourceId,
    pub errors: Vec<String>,
}

pub type CompilationListener = Box<dyn FnMut(KernelIndex, &[String]) + Send>;

pub struct ComputeGraph {
    name: String,
    package_name: String,
    kernel_invocations: Vec<Option<Arc<ComputeKernel>>>,
    data_interfaces: Vec<Option<Arc<dyn DataInterface>>>,
    graph_edges: Vec<GraphEdge>,
    kernel_resources: Vec<KernelResourceSet>,
    render_proxy: RwLock<Option<Arc<GraphRenderProxy>>>,
    context: Arc<ComputeFrameworkContext>,
    #[cfg(feature = "editor")]
    cook_store: PlatformCookStore,
    event_sender: Sender<CompilationEvent>,
    event_receiver: Receiver<CompilationEvent>,
    listener: Option<CompilationListener>,
}

impl ComputeGraph {
    pub fn new(name: impl Into<String>, context: Arc<ComputeFrameworkContext>) -> Self {
        let name = name.into();
        let (event_sender, event_receiver) = unbounded();
        Self {
            package_name: format!("/Game/{}", name),
            name,
            kernel_invocations: Vec::new(),
            data_interfaces: Vec::new(),
            graph_edges: Vec::new(),
            kernel_resources: Vec::new(),
            render_proxy: RwLock::new(None),
            context,
            #[cfg(feature = "editor")]
            cook_store: PlatformCookStore::default(),
            event_sender,
            event_receiver,
            listener: None,
        }
    }

    pub fn with_package_name(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = package_name.into();
        self
    }

    // ==================== Authoring ====================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn context(&self) -> &Arc<ComputeFrameworkContext> {
        &self.context
    }

    pub fn kernels(&self) -> &[Option<Arc<ComputeKernel>>] {
        &self.kernel_invocations
    }

    pub fn data_interfaces(&self) -> &[Option<Arc<dyn DataInterface>>] {
        &self.data_interfaces
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.graph_edges
    }

    pub fn add_kernel(&mut self, kernel: Arc<ComputeKernel>) -> KernelIndex {
        self.kernel_invocations.push(Some(kernel));
        KernelIndex((self.kernel_invocations.len() - 1) as u32)
    }

    /// Add an empty kernel slot. It stays disabled until a kernel is set.
    pub fn add_null_kernel(&mut self) -> KernelIndex {
        self.kernel_invocations.push(None);
        KernelIndex((self.kernel_invocations.len() - 1) as u32)
    }

    /// Replace the kernel in a slot. The slot's resources are rebuilt on the
    /// next [`Self::update_resources`].
    pub fn set_kernel(
        &mut self,
        kernel_index: KernelIndex,
        kernel: Option<Arc<ComputeKernel>>,
    ) -> Result<()> {
        let slot = self
            .kernel_invocations
            .get_mut(kernel_index.index())
            .ok_or_else(|| {
                ComputeGraphError::Authoring(format!("no kernel slot {}", kernel_index))
            })?;
        *slot = kernel;
        Ok(())
    }

    pub fn add_data_interface(&mut self, data_interface: Arc<dyn DataInterface>) -> DataInterfaceIndex {
        self.data_interfaces.push(Some(data_interface));
        DataInterfaceIndex((self.data_interfaces.len() - 1) as u32)
    }

    pub fn add_null_data_interface(&mut self) -> DataInterfaceIndex {
        self.data_interfaces.push(None);
        DataInterfaceIndex((self.data_interfaces.len() - 1) as u32)
    }

    pub fn set_data_interface(
        &mut self,
        index: DataInterfaceIndex,
        data_interface: Option<Arc<dyn DataInterface>>,
    ) -> Result<()> {
        let slot = self.data_interfaces.get_mut(index.index()).ok_or_else(|| {
            ComputeGraphError::Authoring(format!("no data interface slot {}", index))
        })?;
        *slot = data_interface;
        Ok(())
    }

    /// Edges are checked by [`Self::validate`], not here.
    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.graph_edges.push(edge);
    }

    pub fn clear_edges(&mut self) {
        self.graph_edges.clear();
    }

    // ==================== Validation ====================

    pub fn validation_errors(&self) -> ValidationErrors {
        GraphValidator::validate(
            &self.kernel_invocations,
            &self.data_interfaces,
            &self.graph_edges,
        )
    }

    pub fn validate(&self) -> Result<()> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            for error in errors.iter() {
                tracing::debug!("Graph '{}': {}", self.name, error);
            }
            Err(ComputeGraphError::Validation(errors))
        }
    }

    /// Enabled kernels in dispatch order (writers before readers).
    pub fn execution_order(&self) -> Result<Vec<KernelIndex>> {
        self.validate()?;
        Ok(GraphValidator::topological_order(
            &self.kernel_invocations,
            &self.graph_edges,
        ))
    }

    // ==================== Resources ====================

    /// Resource of a kernel at the process' feature level
    pub fn kernel_resource(&self, kernel_index: KernelIndex) -> Option<Arc<KernelResource>> {
        self.kernel_resources
            .get(kernel_index.index())
            .and_then(|set| set.get(self.context.feature_level()))
            .cloned()
    }

    pub fn kernel_resource_set(&self, kernel_index: KernelIndex) -> Option<&KernelResourceSet> {
        self.kernel_resources.get(kernel_index.index())
    }

    /// Every enabled kernel has a complete shader map for the current shader platform.
    pub fn is_compiled(&self) -> bool {
        let shader_platform = self.context.shader_platform();
        self.kernel_invocations
            .iter()
            .enumerate()
            .filter(|(_, kernel)| enabled_source(kernel).is_some())
            .all(|(index, _)| {
                self.kernel_resource(KernelIndex(index as u32))
                    .is_some_and(|r| r.is_complete_for(shader_platform, true))
            })
    }

    /// Lay out the parameters of every data interface bound to a kernel into
    /// one struct named after the kernel's entry point.
    pub fn build_kernel_shader_metadata(
        &self,
        kernel_index: KernelIndex,
        allocations: &mut ShaderParametersMetadataAllocations,
    ) -> Option<MetadataHandle> {
        let source = self
            .kernel_invocations
            .get(kernel_index.index())
            .and_then(enabled_source)?;

        let mut builder = ShaderParametersMetadataBuilder::new();
        let slots = kernel_data_interface_slots(&self.graph_edges, kernel_index);
        for (slot, &di_index) in slots.iter().enumerate() {
            let Some(data_interface) = self.data_interfaces.get(di_index).and_then(Option::as_ref) else {
                continue;
            };
            let uid = unique_data_interface_name(slot, data_interface.class_name());
            allocations.add_name(uid.clone());
            data_interface.shader_parameters(&uid, &mut builder, allocations);
        }

        let metadata = builder.build(
            MetadataUseCase::ShaderParameterStruct,
            source.entry_point(),
            allocations,
        );
        Some(allocations.insert(metadata))
    }

    /// One vector per kernel slot: kernel domains, then each bound data
    /// interface's domains in binding order. Disabled slots get an empty vector.
    pub fn build_shader_permutation_vectors(&self) -> Vec<PermutationVector> {
        self.kernel_invocations
            .iter()
            .enumerate()
            .map(|(index, kernel)| {
                let mut vector = PermutationVector::new();
                let Some(source) = enabled_source(kernel) else {
                    return vector;
                };
                vector.add_permutation_set(source.permutations());
                for di_index in kernel_data_interface_slots(&self.graph_edges, KernelIndex(index as u32)) {
                    if let Some(data_interface) = self.data_interfaces.get(di_index).and_then(Option::as_ref) {
                        data_interface.permutations(&mut vector);
                    }
                }
                vector
            })
            .collect()
    }

    // ==================== Render proxy ====================

    pub fn render_proxy(&self) -> Option<Arc<GraphRenderProxy>> {
        self.render_proxy.read().clone()
    }

    /// Rebuild and publish the render proxy. The previous proxy is released
    /// on the render thread.
    pub fn refresh_render_proxy(&self) {
        if !self.context.can_ever_render() {
            return;
        }
        let proxy = Arc::new(RenderProxyBuilder::build(self));
        let previous = self.render_proxy.write().replace(proxy);
        if let Some(previous) = previous {
            self.context.render_queue().release_on_render_thread(previous);
        }
    }

    /// Cache shaders for rendering (editor builds) and publish a new proxy.
    pub fn update_resources(&mut self) -> Result<()> {
        if !self.context.can_ever_render() {
            tracing::debug!("Graph '{}': process cannot render, skipping resources", self.name);
            return Ok(());
        }

        #[cfg(feature = "editor")]
        self.cache_resource_shaders_for_rendering(
            CompilationFlags::FORCE | CompilationFlags::APPLY_COMPLETED_SHADER_MAP_FOR_RENDERING,
        )?;

        self.refresh_render_proxy();
        Ok(())
    }

    // ==================== Compilation events ====================

    /// Called for every finished compile of a rendering resource.
    pub fn set_compilation_listener<F>(&mut self, listener: F)
    where
        F: FnMut(KernelIndex, &[String]) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn on_kernel_compilation_complete(&mut self, kernel_index: KernelIndex, errors: &[String]) {
        if errors.is_empty() {
            tracing::debug!("Graph '{}': kernel {} compiled", self.name, kernel_index);
        } else {
            tracing::debug!(
                "Graph '{}': kernel {} failed with {} error(s)",
                self.name,
                kernel_index,
                errors.len()
            );
        }
        if let Some(listener) = self.listener.as_mut() {
            listener(kernel_index, errors);
        }
    }

    /// Deliver finished compiles to the listener. Once no rendering resource
    /// is still compiling, the render proxy is rebuilt. Returns the number of
    /// events delivered.
    pub fn process_compilation_events(&mut self) -> usize {
        let events: Vec<CompilationEvent> = self.event_receiver.try_iter().collect();
        let mut delivered = 0;
        for event in events {
            let current = self
                .kernel_resource(event.kernel_index)
                .is_some_and(|r| r.id() == event.resource_id);
            if !current {
                continue;
            }
            self.on_kernel_compilation_complete(event.kernel_index, &event.errors);
            delivered += 1;
        }

        if delivered > 0 && !self.has_compilation_in_flight() {
            self.refresh_render_proxy();
        }
        delivered
    }

    pub fn has_compilation_in_flight(&self) -> bool {
        self.kernel_resources
            .iter()
            .flat_map(KernelResourceSet::iter)
            .any(|r| !r.is_compilation_finished())
    }

    /// Wait for background work to drain, then process compilation events.
    /// Returns false if the timeout elapsed first.
    pub fn wait_for_compilation(&mut self, timeout: Duration) -> bool {
        let drained = self.context.wait_idle(timeout);
        self.process_compilation_events();
        drained && !self.has_compilation_in_flight()
    }

    fn bind_completion(&self, kernel_index: KernelIndex, resource: &KernelResource) {
        let sender = self.event_sender.clone();
        resource.bind_on_compilation_complete(move |resource| {
            let _ = sender.send(CompilationEvent {
                kernel_index,
                resource_id: resource.id(),
                errors: resource.compile_errors(),
            });
        });
    }

    // ==================== Serialization ====================

    /// Write an editor archive. No shader maps are stored.
    pub fn save<W: Write>(&self, writer: W) -> Result<W> {
        let mut archive = ArchiveWriter::new(writer, &ArchiveHeader::editor(&self.name))?;
        archive.write_count(self.kernel_invocations.len())?;
        for _ in &self.kernel_invocations {
            archive.write_count(0)?;
        }
        archive.finish()
    }

    /// Read an archive written by [`Self::save`] or a cooked save. Call
    /// [`Self::post_load`] afterwards.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut archive = ArchiveReader::new(reader)
            .with_context(|| format!("Failed to open archive for '{}'", self.name))?;
        let shader_platform = self.context.shader_platform();
        let kernel_count = archive.read_count()?;
        if kernel_count > self.kernel_invocations.len() {
            return Err(ComputeGraphError::Archive(format!(
                "archive for '{}' holds {} kernels, graph has {}",
                self.name,
                kernel_count,
                self.kernel_invocations.len()
            )));
        }
        if kernel_count < self.kernel_invocations.len() {
            tracing::warn!(
                "Archive for '{}' holds {} kernels, graph has {}",
                self.name,
                kernel_count,
                self.kernel_invocations.len()
            );
        }

        self.kernel_resources.iter_mut().for_each(KernelResourceSet::reset);
        self.kernel_resources
            .resize_with(self.kernel_invocations.len(), KernelResourceSet::new);

        for kernel_index in 0..kernel_count {
            let map_count = archive.read_count()?;
            for _ in 0..map_count {
                let Some(map) = KernelResource::deserialize_shader_map(&mut archive)? else {
                    continue;
                };
                self.install_loaded_shader_map(kernel_index, map, shader_platform);
            }
        }
        Ok(())
    }

    /// Editor builds keep every loaded map until [`Self::post_load`] picks one.
    #[cfg(feature = "editor")]
    fn install_loaded_shader_map(
        &mut self,
        kernel_index: usize,
        map: ShaderMap,
        _shader_platform: ShaderPlatform,
    ) {
        self.kernel_resources[kernel_index].store_loaded_shader_map(map);
    }

    #[cfg(not(feature = "editor"))]
    fn install_loaded_shader_map(
        &mut self,
        kernel_index: usize,
        map: ShaderMap,
        shader_platform: ShaderPlatform,
    ) {
        if map.shader_platform() == shader_platform {
            self.kernel_resources[kernel_index].install_shader_map(map);
        }
    }

    /// Install loaded shader maps for the current platform and rebuild resources.
    pub fn post_load(&mut self) -> Result<()> {
        #[cfg(feature = "editor")]
        {
            let shader_platform = self.context.shader_platform();
            for set in &mut self.kernel_resources {
                set.process_serialized_shader_maps(shader_platform);
            }
        }
        self.update_resources()
    }
}

#[cfg(feature = "editor")]
impl ComputeGraph {
    /// Assemble the shader source of one kernel. `None` for disabled kernels.
    pub fn build_kernel_source(&self, kernel_index: KernelIndex) -> Result<Option<AssembledKernel>> {
        let Some(source) = self
            .kernel_invocations
            .get(kernel_index.index())
            .and_then(enabled_source)
        else {
            return Ok(None);
        };
        ShaderSourceAssembler::assemble(
            kernel_index,
            source.as_ref(),
            &self.data_interfaces,
            &self.graph_edges,
        )
        .map(Some)
    }

    /// Cache key of a kernel for the process' shader platform.
    pub fn kernel_cache_key(&self, kernel_index: KernelIndex) -> Result<Option<KernelCacheKey>> {
        let shader_platform = self.context.shader_platform();
        Ok(self
            .kernel_setup(kernel_index, shader_platform, shader_platform.max_feature_level(), &[])?
            .map(|setup| setup.key))
    }

    fn kernel_setup(
        &self,
        kernel_index: KernelIndex,
        shader_platform: ShaderPlatform,
        feature_level: FeatureLevel,
        cooked_formats: &[String],
    ) -> Result<Option<KernelResourceSetup>> {
        let Some(kernel) = self.kernel_invocations.get(kernel_index.index()).and_then(Option::as_ref) else {
            return Ok(None);
        };
        let Some(source) = kernel.source() else {
            return Ok(None);
        };
        let Some(assembled) = self.build_kernel_source(kernel_index)? else {
            return Ok(None);
        };

        let key = KeyDeriver::derive(
            &assembled.partial_hash,
            &KeyContext {
                entry_point: source.entry_point(),
                shader_platform,
                feature_level,
                cooked_formats,
            },
        );

        let mut metadata_allocations = ShaderParametersMetadataAllocations::new();
        let metadata = self.build_kernel_shader_metadata(kernel_index, &mut metadata_allocations);

        Ok(Some(KernelResourceSetup {
            feature_level,
            graph_name: self.name.clone(),
            entry_point: source.entry_point().to_string(),
            key,
            source: Arc::from(assembled.source),
            definitions: assembled.definitions,
            permutation_vector: assembled.permutation_vector,
            metadata_allocations,
            metadata,
            package_name: self.package_name.clone(),
            flags: kernel.flags,
        }))
    }

    /// Set up and cache every kernel's resource at the process' feature
    /// level. Disabled kernels have their slot reset. A kernel whose source
    /// cannot be assembled is logged and left disabled.
    ///
    /// Only a default kernel's compile failure is returned as an error.
    pub fn cache_resource_shaders_for_rendering(&mut self, flags: CompilationFlags) -> Result<()> {
        if !self.context.can_ever_render() {
            return Ok(());
        }

        let shader_platform = self.context.shader_platform();
        let feature_level = self.context.feature_level();
        self.kernel_resources
            .resize_with(self.kernel_invocations.len(), KernelResourceSet::new);

        for index in 0..self.kernel_invocations.len() {
            let kernel_index = KernelIndex(index as u32);
            let setup = match self.kernel_setup(kernel_index, shader_platform, feature_level, &[]) {
                Ok(Some(setup)) => setup,
                Ok(None) => {
                    self.kernel_resources[index].reset();
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Graph '{}': kernel {} disabled: {}", self.name, kernel_index, e);
                    self.kernel_resources[index].reset();
                    continue;
                }
            };

            let resource = self.kernel_resources[index].get_or_create(feature_level);
            resource.setup(setup);
            self.bind_completion(kernel_index, &resource);
            CompileScheduler::cache_shaders_for_resource(
                &self.context,
                shader_platform,
                None,
                flags,
                &resource,
            )?;
        }
        Ok(())
    }

    /// Compile every kernel for every shader format of `target` and hold the
    /// resources until [`Self::save_cooked`]. Compiles run synchronously.
    pub fn begin_cache_for_cooked_platform_data(&mut self, target: &TargetPlatform) -> Result<()> {
        if self.cook_store.contains(&target.name) {
            return Ok(());
        }

        let mut per_kernel = Vec::with_capacity(self.kernel_invocations.len());
        for index in 0..self.kernel_invocations.len() {
            let kernel_index = KernelIndex(index as u32);
            let mut resources = Vec::new();
            for shader_platform in target.shader_platforms() {
                let feature_level = shader_platform.max_feature_level();
                let Some(setup) = self.kernel_setup(
                    kernel_index,
                    shader_platform,
                    feature_level,
                    &target.shader_formats,
                )?
                else {
                    continue;
                };
                let resource = Arc::new(KernelResource::new());
                resource.setup(setup);
                CompileScheduler::cache_shaders_for_resource(
                    &self.context,
                    shader_platform,
                    Some(target),
                    CompilationFlags::IS_COOKING,
                    &resource,
                )?;
                resources.push(resource);
            }
            per_kernel.push(resources);
        }

        tracing::info!(
            "Graph '{}': cached {} kernel(s) for {}",
            self.name,
            per_kernel.len(),
            target.name
        );
        self.cook_store.insert(target.name.clone(), per_kernel);
        Ok(())
    }

    pub fn is_cached_cooked_platform_data_loaded(&self, target: &TargetPlatform) -> bool {
        self.cook_store.is_loaded(&target.name)
    }

    pub fn clear_cached_cooked_platform_data(&mut self, target: &TargetPlatform) {
        self.cook_store.remove(&target.name);
    }

    pub fn clear_all_cached_cooked_platform_data(&mut self) {
        self.cook_store.clear();
    }

    /// Write a cooked archive holding one shader map per shader format of
    /// `target` for each kernel.
    pub fn save_cooked<W: Write>(&self, writer: W, target: &TargetPlatform) -> Result<W> {
        let per_kernel = self.cook_store.get(&target.name).ok_or_else(|| {
            ComputeGraphError::Archive(format!(
                "'{}' has no cooked data for {}",
                self.name, target.name
            ))
        })?;

        let mut archive =
            ArchiveWriter::new(writer, &ArchiveHeader::cooked(&self.name, &target.name))?;
        archive.write_count(self.kernel_invocations.len())?;
        for index in 0..self.kernel_invocations.len() {
            let resources = per_kernel.get(index).map(Vec::as_slice).unwrap_or_default();
            archive.write_count(resources.len())?;
            for resource in resources {
                resource.serialize_shader_map(&mut archive)?;
            }
        }
        archive.finish()
    }
}

impl Drop for ComputeGraph {
    fn drop(&mut self) {
        for resource in self.kernel_resources.iter().flat_map(KernelResourceSet::iter) {
            resource.cancel_compilation();
        }
        if let Some(proxy) = self.render_proxy.get_mut().take() {
            self.context.render_queue().release_on_render_thread(proxy);
        }
    }
}

impl fmt::Debug for ComputeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeGraph")
            .field("name", &self.name)
            .field("kernels", &self.kernel_invocations.len())
            .field("data_interfaces", &self.data_interfaces.len())
            .field("edges", &self.graph_edges.len())
            .finish()
    }
}
