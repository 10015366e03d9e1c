//! Render-thread snapshot of a graph.

use crate::data_interface::{MetadataHandle, ShaderParametersMetadata, ShaderParametersMetadataAllocations};
use crate::graph::validate::bound_data_interfaces;
use crate::graph::{ComputeGraph, DataInterfaceIndex, KernelIndex};
use crate::kernel::PermutationVector;
use crate::resource::{KernelResource, ShaderMap};
use std::sync::Arc;

/// One dispatchable kernel in a [`GraphRenderProxy`].
#[derive(Debug, Clone)]
pub struct KernelInvocation {
    pub kernel_index: KernelIndex,
    pub kernel_name: String,
    pub group_size: [u32; 3],
    pub kernel_resource: Arc<KernelResource>,
    /// Rendering-thread shader map captured when the proxy was built
    shader_map: Arc<ShaderMap>,
    /// Handle into the owning proxy's metadata arena
    pub shader_parameter_metadata: Option<MetadataHandle>,
    pub bound_provider_indices: Vec<DataInterfaceIndex>,
    pub execution_provider_index: DataInterfaceIndex,
}

impl KernelInvocation {
    /// The shader map the render thread dispatches with. Later edits to the
    /// kernel resource do not change it.
    pub fn shader_map(&self) -> &Arc<ShaderMap> {
        &self.shader_map
    }
}

/// Immutable once built. Owns the metadata arena its invocations point into.
#[derive(Debug)]
pub struct GraphRenderProxy {
    pub graph_name: String,
    pub kernel_invocations: Vec<KernelInvocation>,
    /// One vector per kernel slot of the graph
    pub shader_permutation_vectors: Vec<PermutationVector>,
    metadata_allocations: ShaderParametersMetadataAllocations,
}

impl GraphRenderProxy {
    pub fn invocation_count(&self) -> usize {
        self.kernel_invocations.len()
    }

    pub fn invocation(&self, kernel_index: KernelIndex) -> Option<&KernelInvocation> {
        self.kernel_invocations
            .iter()
            .find(|invocation| invocation.kernel_index == kernel_index)
    }

    pub fn shader_parameter_metadata(
        &self,
        invocation: &KernelInvocation,
    ) -> Option<&ShaderParametersMetadata> {
        invocation
            .shader_parameter_metadata
            .and_then(|handle| self.metadata_allocations.get(handle))
    }

    pub fn metadata_allocations(&self) -> &ShaderParametersMetadataAllocations {
        &self.metadata_allocations
    }
}

/// Builds a [`GraphRenderProxy`] from a graph's current state.
pub struct RenderProxyBuilder;

impl RenderProxyBuilder {
    /// Only kernels whose resource holds a complete shader map for the
    /// current shader platform, and that have exactly one bound execution
    /// interface, become invocations.
    pub fn build(graph: &ComputeGraph) -> GraphRenderProxy {
        let shader_platform = graph.context().config().rhi.shader_platform;
        let data_interfaces = graph.data_interfaces();
        let edges = graph.edges();
        let mut metadata_allocations = ShaderParametersMetadataAllocations::new();
        let mut kernel_invocations = Vec::new();

        for (index, kernel) in graph.kernels().iter().enumerate() {
            let kernel_index = KernelIndex(index as u32);
            let Some(source) = kernel.as_ref().and_then(|k| k.source()) else {
                continue;
            };
            let Some(resource) = graph.kernel_resource(kernel_index) else {
                continue;
            };
            if !resource.is_complete_for(shader_platform, true) {
                tracing::trace!(
                    "Kernel {} of '{}' has no complete shader map, omitted from proxy",
                    kernel_index,
                    graph.name()
                );
                continue;
            }
            let Some(shader_map) = resource.rendering_thread_shader_map() else {
                continue;
            };

            let bound = bound_data_interfaces(edges, kernel_index);
            let executions: Vec<usize> = bound
                .iter()
                .copied()
                .filter(|&di| {
                    data_interfaces
                        .get(di)
                        .and_then(Option::as_ref)
                        .is_some_and(|d| d.is_execution_interface())
                })
                .collect();
            let [execution_index] = executions[..] else {
                tracing::warn!(
                    "Kernel {} of '{}' has {} execution interfaces, omitted from proxy",
                    kernel_index,
                    graph.name(),
                    executions.len()
                );
                continue;
            };

            kernel_invocations.push(KernelInvocation {
                kernel_index,
                kernel_name: source.entry_point().to_string(),
                group_size: source.group_size(),
                kernel_resource: resource,
                shader_map,
                shader_parameter_metadata: graph
                    .build_kernel_shader_metadata(kernel_index, &mut metadata_allocations),
                bound_provider_indices: bound
                    .into_iter()
                    .map(|di| DataInterfaceIndex(di as u32))
                    .collect(),
                execution_provider_index: DataInterfaceIndex(execution_index as u32),
            });
        }

        tracing::debug!(
            "Built render proxy for '{}' with {} invocation(s)",
            graph.name(),
            kernel_invocations.len()
        );

        GraphRenderProxy {
            graph_name: graph.name().to_string(),
            kernel_invocations,
            shader_permutation_vectors: graph.build_shader_permutation_vectors(),
            metadata_allocations,
        }
    }
}
