//! Data provider creation for a dispatch.

use super::ComputeGraph;
use crate::data_interface::{BindingObject, DataProvider, SourceType};
use std::sync::Arc;

/// Providers indexed like the graph's data interfaces
pub type DataProviders = Vec<Option<Box<dyn DataProvider>>>;

impl ComputeGraph {
    /// Function masks of one data interface: bit `n` of the input (output)
    /// mask is set when some edge reads (writes) through its function `n`.
    pub fn data_interface_function_masks(&self, data_interface_index: usize) -> (u64, u64) {
        let mut input_mask = 0u64;
        let mut output_mask = 0u64;
        for edge in &self.graph_edges {
            if edge.data_interface_index.index() != data_interface_index {
                continue;
            }
            let Some(bit) = 1u64.checked_shl(edge.data_interface_binding_index) else {
                tracing::warn!(
                    "Graph '{}': binding {} does not fit a function mask",
                    self.name,
                    edge.data_interface_binding_index
                );
                continue;
            };
            if edge.is_kernel_input {
                input_mask |= bit;
            } else {
                output_mask |= bit;
            }
        }
        (input_mask, output_mask)
    }

    /// Create one provider per data interface from the caller's binding
    /// objects. Each source type a data interface asks for is matched
    /// against the binding objects directly, then through their owners.
    pub fn create_data_providers(&self, binding_objects: &[Arc<dyn BindingObject>]) -> DataProviders {
        self.data_interfaces
            .iter()
            .enumerate()
            .map(|(index, data_interface)| {
                let data_interface = data_interface.as_ref()?;
                let bindings: Vec<Option<Arc<dyn BindingObject>>> = data_interface
                    .source_types()
                    .iter()
                    .map(|source_type| find_binding(binding_objects, source_type))
                    .collect();
                let (input_mask, output_mask) = self.data_interface_function_masks(index);
                let provider = data_interface.create_data_provider(&bindings, input_mask, output_mask);
                if provider.is_none() {
                    tracing::debug!(
                        "Graph '{}': {} produced no provider",
                        self.name,
                        data_interface.class_name()
                    );
                }
                provider
            })
            .collect()
    }

    /// One valid provider for every non-null data interface.
    pub fn validate_providers(&self, providers: &[Option<Box<dyn DataProvider>>]) -> bool {
        if providers.len() != self.data_interfaces.len() {
            return false;
        }
        self.data_interfaces
            .iter()
            .zip(providers)
            .all(|(data_interface, provider)| {
                data_interface.is_none() || provider.as_ref().is_some_and(|p| p.is_valid())
            })
    }
}

fn find_binding(
    binding_objects: &[Arc<dyn BindingObject>],
    source_type: &SourceType,
) -> Option<Arc<dyn BindingObject>> {
    if let Some(object) = binding_objects.iter().find(|o| o.is_a(source_type)) {
        return Some(object.clone());
    }
    binding_objects
        .iter()
        .filter_map(|o| o.owner())
        .find_map(|owner| owner.find_component(source_type))
}
