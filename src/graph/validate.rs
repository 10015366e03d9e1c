//! Graph validation and kernel ordering.
//!
//! Kernels depend on each other through data interfaces: a kernel that writes
//! a data interface must run before every other kernel that reads it. The
//! resulting kernel-level graph must be acyclic; a kernel reading and writing
//! the same data interface is not a dependency on itself.

use super::id::KernelIndex;
use super::GraphEdge;
use crate::data_interface::DataInterface;
use crate::error::{BindingSide, ValidationError, ValidationErrors};
use crate::kernel::{ComputeKernel, KernelSource};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

/// Validates graph topology and computes a dispatch order.
pub struct GraphValidator;

impl GraphValidator {
    /// Collect every authoring problem in the graph. An empty list means the
    /// graph is valid.
    pub fn validate(
        kernels: &[Option<Arc<ComputeKernel>>],
        data_interfaces: &[Option<Arc<dyn DataInterface>>],
        edges: &[GraphEdge],
    ) -> ValidationErrors {
        let mut errors = Vec::new();

        for (edge_index, edge) in edges.iter().enumerate() {
            Self::validate_edge(edge_index, edge, kernels, data_interfaces, &mut errors);
        }

        Self::validate_execution_interfaces(kernels, data_interfaces, edges, &mut errors);

        let enabled = kernels
            .iter()
            .filter(|k| enabled_source(k).is_some())
            .count();
        let order = Self::topological_order(kernels, edges);
        if order.len() < enabled {
            errors.push(ValidationError::CycleDetected {
                scheduled: order.len(),
                total: enabled,
            });
        }

        ValidationErrors(errors)
    }

    fn validate_edge(
        edge_index: usize,
        edge: &GraphEdge,
        kernels: &[Option<Arc<ComputeKernel>>],
        data_interfaces: &[Option<Arc<dyn DataInterface>>],
        errors: &mut Vec<ValidationError>,
    ) {
        let mut in_range = true;
        if edge.kernel_index.index() >= kernels.len() {
            errors.push(ValidationError::KernelIndexOutOfRange {
                edge: edge_index,
                kernel_index: edge.kernel_index.index(),
                kernel_count: kernels.len(),
            });
            in_range = false;
        }
        if edge.data_interface_index.index() >= data_interfaces.len() {
            errors.push(ValidationError::DataInterfaceIndexOutOfRange {
                edge: edge_index,
                data_interface_index: edge.data_interface_index.index(),
                data_interface_count: data_interfaces.len(),
            });
            in_range = false;
        }
        if !in_range {
            return;
        }

        // Edges into disabled kernels are ignored
        let Some(source) = enabled_source(&kernels[edge.kernel_index.index()]) else {
            return;
        };

        let Some(data_interface) = &data_interfaces[edge.data_interface_index.index()] else {
            errors.push(ValidationError::NullDataInterface {
                edge: edge_index,
                kernel_index: edge.kernel_index.index(),
                data_interface_index: edge.data_interface_index.index(),
            });
            return;
        };

        let (kernel_functions, kernel_side) = if edge.is_kernel_input {
            (source.external_inputs(), BindingSide::KernelInput)
        } else {
            (source.external_outputs(), BindingSide::KernelOutput)
        };
        let (data_interface_functions, data_interface_side) = if edge.is_kernel_input {
            (data_interface.supported_inputs(), BindingSide::DataInterfaceInput)
        } else {
            (data_interface.supported_outputs(), BindingSide::DataInterfaceOutput)
        };

        let kernel_function = kernel_functions.get(edge.kernel_binding_index as usize);
        if kernel_function.is_none() {
            errors.push(ValidationError::BindingIndexOutOfRange {
                edge: edge_index,
                side: kernel_side,
                binding_index: edge.kernel_binding_index as usize,
                available: kernel_functions.len(),
            });
        }
        let data_interface_function =
            data_interface_functions.get(edge.data_interface_binding_index as usize);
        if data_interface_function.is_none() {
            errors.push(ValidationError::BindingIndexOutOfRange {
                edge: edge_index,
                side: data_interface_side,
                binding_index: edge.data_interface_binding_index as usize,
                available: data_interface_functions.len(),
            });
        }

        if let (Some(kernel_function), Some(data_interface_function)) =
            (kernel_function, data_interface_function)
        {
            if !kernel_function.signature_matches(data_interface_function) {
                errors.push(ValidationError::SignatureMismatch {
                    edge: edge_index,
                    kernel_function: kernel_function.signature(),
                    data_interface_function: data_interface_function.signature(),
                });
            }
        }
    }

    fn validate_execution_interfaces(
        kernels: &[Option<Arc<ComputeKernel>>],
        data_interfaces: &[Option<Arc<dyn DataInterface>>],
        edges: &[GraphEdge],
        errors: &mut Vec<ValidationError>,
    ) {
        for (kernel_index, kernel) in kernels.iter().enumerate() {
            if enabled_source(kernel).is_none() {
                continue;
            }
            let count = bound_data_interfaces(edges, KernelIndex(kernel_index as u32))
                .into_iter()
                .filter_map(|i| data_interfaces.get(i).and_then(Option::as_ref))
                .filter(|di| di.is_execution_interface())
                .count();
            match count {
                1 => {}
                0 => errors.push(ValidationError::MissingExecutionInterface { kernel_index }),
                count => errors.push(ValidationError::MultipleExecutionInterfaces {
                    kernel_index,
                    count,
                }),
            }
        }
    }

    /// Kahn's algorithm over enabled kernels. Kernels caught in a cycle are
    /// left out of the result.
    pub fn topological_order(
        kernels: &[Option<Arc<ComputeKernel>>],
        edges: &[GraphEdge],
    ) -> Vec<KernelIndex> {
        let n = kernels.len();
        let enabled: Vec<bool> = kernels.iter().map(|k| enabled_source(k).is_some()).collect();

        // data interface index -> (writers, readers)
        let mut writers: Vec<(usize, usize)> = Vec::new();
        let mut readers: Vec<(usize, usize)> = Vec::new();
        for edge in edges {
            let k = edge.kernel_index.index();
            if k >= n || !enabled[k] {
                continue;
            }
            let di = edge.data_interface_index.index();
            if edge.is_kernel_input {
                readers.push((di, k));
            } else {
                writers.push((di, k));
            }
        }

        let mut dependencies = BTreeSet::new();
        for &(di_w, writer) in &writers {
            for &(di_r, reader) in &readers {
                if di_w == di_r && writer != reader {
                    dependencies.insert((writer, reader));
                }
            }
        }

        let mut adj = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        for &(from, to) in &dependencies {
            adj[from].push(to);
            in_degree[to] += 1;
        }

        let mut queue: VecDeque<usize> = (0..n)
            .filter(|&i| enabled[i] && in_degree[i] == 0)
            .collect();
        let mut result = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            result.push(KernelIndex(node as u32));
            for &neighbor in &adj[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }

        result
    }
}

/// Kernel source of an enabled kernel (non-null kernel with a non-null source).
pub(crate) fn enabled_source(kernel: &Option<Arc<ComputeKernel>>) -> Option<&Arc<dyn KernelSource>> {
    kernel.as_ref().and_then(|k| k.source())
}

/// Distinct data-interface indices bound to a kernel, ascending.
pub(crate) fn bound_data_interfaces(edges: &[GraphEdge], kernel_index: KernelIndex) -> Vec<usize> {
    edges
        .iter()
        .filter(|e| e.kernel_index == kernel_index)
        .map(|e| e.data_interface_index.index())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct data interfaces bound to a kernel in kernel binding order:
/// inputs before outputs, then by kernel binding index. The position of an
/// interface in the result is its slot in the kernel's generated source, so
/// the graph order in which interfaces were added never reaches the key.
pub(crate) fn kernel_data_interface_slots(edges: &[GraphEdge], kernel_index: KernelIndex) -> Vec<usize> {
    let mut incident: Vec<&GraphEdge> = edges
        .iter()
        .filter(|e| e.kernel_index == kernel_index)
        .collect();
    incident.sort_by_key(|e| {
        (
            !e.is_kernel_input,
            e.kernel_binding_index,
            e.data_interface_binding_index,
            e.data_interface_index,
        )
    });

    let mut slots = Vec::new();
    for edge in incident {
        let di_index = edge.data_interface_index.index();
        if !slots.contains(&di_index) {
            slots.push(di_index);
        }
    }
    slots
}
