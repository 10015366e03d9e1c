//! Integration tests for graph validation, ordering and data providers

#![cfg(feature = "editor")]

mod common;

use common::builders::{
    producer_consumer_graph, read_fn, single_kernel_graph, sync_context, write_fn,
    DataInterfaceBuilder, KernelBuilder, TestActor, TestComponent,
};
use common::mock_helpers::accepting_mock;
use computegraph_rs::data_interface::{
    BindingObject, ShaderParameterKind, ShaderParametersMetadataAllocations,
};
use computegraph_rs::error::{BindingSide, ValidationError};
use computegraph_rs::graph::{DataInterfaceIndex, KernelIndex};
use computegraph_rs::kernel::{ShaderFunctionDefinition, ShaderValueType};
use computegraph_rs::{ComputeFrameworkContext, ComputeGraph, ComputeGraphError, GraphEdge};
use std::sync::Arc;

fn context() -> Arc<ComputeFrameworkContext> {
    sync_context(Arc::new(accepting_mock()))
}

// ==================== Signatures and ranges ====================

#[test]
fn test_signature_mismatch() {
    let mut graph = ComputeGraph::new("Mismatch", context());
    let kernel = graph.add_kernel(KernelBuilder::new("Main").reads(read_fn()).build());
    // `float ReadValue(float)` against the kernel's `float ReadValue(uint)`
    let buffer = graph.add_data_interface(
        DataInterfaceBuilder::new("Buffer")
            .execution()
            .inputs(vec![ShaderFunctionDefinition::new("ReadValue")
                .returns(ShaderValueType::float())
                .param(ShaderValueType::float())])
            .build(),
    );
    graph.add_edge(GraphEdge::input(kernel, 0, buffer, 0));

    let errors = graph.validation_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors.contains(|e| matches!(e, ValidationError::SignatureMismatch { edge: 0, .. })));
    assert!(matches!(graph.validate(), Err(ComputeGraphError::Validation(_))));
}

#[test]
fn test_out_of_range_indices() {
    let mut graph = ComputeGraph::new("Ranges", context());
    let kernel = graph.add_kernel(KernelBuilder::new("Main").reads(read_fn()).build());
    let buffer = graph.add_data_interface(DataInterfaceBuilder::new("Buffer").execution().build());
    graph.add_edge(GraphEdge::input(kernel, 0, buffer, 0));
    graph.add_edge(GraphEdge::input(KernelIndex(7), 0, buffer, 0));
    graph.add_edge(GraphEdge::input(kernel, 0, DataInterfaceIndex(3), 0));
    graph.add_edge(GraphEdge::input(kernel, 2, buffer, 0));
    graph.add_edge(GraphEdge::input(kernel, 0, buffer, 5));

    let errors = graph.validation_errors();
    assert!(errors.contains(|e| matches!(
        e,
        ValidationError::KernelIndexOutOfRange { edge: 1, kernel_index: 7, kernel_count: 1 }
    )));
    assert!(errors.contains(|e| matches!(
        e,
        ValidationError::DataInterfaceIndexOutOfRange { edge: 2, data_interface_index: 3, .. }
    )));
    assert!(errors.contains(|e| matches!(
        e,
        ValidationError::BindingIndexOutOfRange {
            edge: 3,
            side: BindingSide::KernelInput,
            binding_index: 2,
            available: 1,
        }
    )));
    assert!(errors.contains(|e| matches!(
        e,
        ValidationError::BindingIndexOutOfRange {
            edge: 4,
            side: BindingSide::DataInterfaceInput,
            binding_index: 5,
            ..
        }
    )));
}

#[test]
fn test_null_data_interface_edge() {
    let mut graph = ComputeGraph::new("NullDataInterface", context());
    let kernel = graph.add_kernel(KernelBuilder::new("Main").reads(read_fn()).writes(write_fn()).build());
    let buffer = graph.add_data_interface(DataInterfaceBuilder::new("Buffer").execution().build());
    let empty = graph.add_null_data_interface();
    graph.add_edge(GraphEdge::input(kernel, 0, buffer, 0));
    graph.add_edge(GraphEdge::output(kernel, 0, empty, 0));

    let errors = graph.validation_errors();
    assert!(errors.contains(|e| matches!(
        e,
        ValidationError::NullDataInterface { edge: 1, kernel_index: 0, data_interface_index: 1 }
    )));
}

// ==================== Execution interfaces ====================

#[test]
fn test_execution_interface_count() {
    let mut graph = ComputeGraph::new("Execution", context());
    let none = graph.add_kernel(KernelBuilder::new("NoExecution").reads(read_fn()).build());
    let two = graph.add_kernel(KernelBuilder::new("TwoExecutions").reads(read_fn()).writes(write_fn()).build());
    let plain = graph.add_data_interface(DataInterfaceBuilder::new("Plain").build());
    let vertices = graph.add_data_interface(DataInterfaceBuilder::new("Vertices").execution().build());
    let triangles = graph.add_data_interface(DataInterfaceBuilder::new("Triangles").execution().build());
    graph.add_edge(GraphEdge::input(none, 0, plain, 0));
    graph.add_edge(GraphEdge::input(two, 0, vertices, 0));
    graph.add_edge(GraphEdge::output(two, 0, triangles, 0));

    let errors = graph.validation_errors();
    assert_eq!(errors.len(), 2);
    assert!(errors.contains(|e| matches!(
        e,
        ValidationError::MissingExecutionInterface { kernel_index: 0 }
    )));
    assert!(errors.contains(|e| matches!(
        e,
        ValidationError::MultipleExecutionInterfaces { kernel_index: 1, count: 2 }
    )));
}

#[test]
fn test_same_interface_read_and_written_counts_once() {
    let (graph, _, _) = single_kernel_graph(context());
    assert!(graph.validate().is_ok());
}

// ==================== Ordering ====================

#[test]
fn test_execution_order_puts_writers_first() {
    let (graph, produce, consume) = producer_consumer_graph(context());
    assert_eq!(graph.execution_order().expect("valid graph"), vec![produce, consume]);
}

#[test]
fn test_cycle_detected() {
    let mut graph = ComputeGraph::new("Cycle", context());
    let first = graph.add_kernel(KernelBuilder::new("First").reads(read_fn()).writes(write_fn()).build());
    let second = graph.add_kernel(KernelBuilder::new("Second").reads(read_fn()).writes(write_fn()).build());
    let a = graph.add_data_interface(DataInterfaceBuilder::new("A").execution().build());
    let b = graph.add_data_interface(DataInterfaceBuilder::new("B").build());
    graph.add_edge(GraphEdge::input(first, 0, a, 0));
    graph.add_edge(GraphEdge::output(first, 0, b, 0));
    graph.add_edge(GraphEdge::input(second, 0, b, 0));
    graph.add_edge(GraphEdge::output(second, 0, a, 0));

    let errors = graph.validation_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors.contains(|e| matches!(
        e,
        ValidationError::CycleDetected { scheduled: 0, total: 2 }
    )));
    assert!(graph.execution_order().is_err());
}

#[test]
fn test_null_kernel_edges_are_ignored() {
    let (mut graph, _, _) = single_kernel_graph(context());
    let null_kernel = graph.add_null_kernel();
    // Would be out of range on the kernel side if the kernel existed
    graph.add_edge(GraphEdge::input(null_kernel, 4, DataInterfaceIndex(0), 0));

    assert!(graph.validate().is_ok());
    assert_eq!(graph.execution_order().expect("valid graph"), vec![KernelIndex(0)]);
}

// ==================== Providers ====================

#[test]
fn test_function_masks() {
    let mut graph = ComputeGraph::new("Masks", context());
    let kernel = graph.add_kernel(
        KernelBuilder::new("Main")
            .reads(read_fn())
            .reads(read_fn())
            .writes(write_fn())
            .build(),
    );
    let buffer = graph.add_data_interface(
        DataInterfaceBuilder::new("Buffer")
            .execution()
            .inputs(vec![read_fn(), read_fn(), read_fn()])
            .build(),
    );
    graph.add_edge(GraphEdge::input(kernel, 0, buffer, 0));
    graph.add_edge(GraphEdge::input(kernel, 1, buffer, 2));
    graph.add_edge(GraphEdge::output(kernel, 0, buffer, 0));

    assert_eq!(graph.data_interface_function_masks(buffer.index()), (0b101, 0b1));
}

#[test]
fn test_providers_resolve_through_owner() {
    let mesh: Arc<dyn BindingObject> = Arc::new(TestComponent::new("SkinnedMesh"));
    let actor = Arc::new(TestActor {
        components: vec![mesh],
    });
    let transform: Arc<dyn BindingObject> =
        Arc::new(TestComponent::new("Transform").owned_by(actor));

    let mut graph = ComputeGraph::new("Providers", context());
    let kernel = graph.add_kernel(KernelBuilder::new("Main").reads(read_fn()).writes(write_fn()).build());
    let buffer = DataInterfaceBuilder::new("Buffer")
        .execution()
        .source_type("SkinnedMesh")
        .source_type("Transform")
        .build();
    let buffer_index = graph.add_data_interface(buffer.clone());
    graph.add_edge(GraphEdge::input(kernel, 0, buffer_index, 0));
    graph.add_edge(GraphEdge::output(kernel, 0, buffer_index, 0));

    let providers = graph.create_data_providers(&[transform]);
    assert_eq!(providers.len(), 1);
    assert!(graph.validate_providers(&providers));

    let record = buffer.last_provider.lock().clone().expect("provider created");
    assert_eq!(record.input_mask, 1);
    assert_eq!(record.output_mask, 1);
    assert_eq!(
        record.bindings,
        vec![Some("SkinnedMesh".to_string()), Some("Transform".to_string())]
    );
}

#[test]
fn test_missing_binding_invalidates_providers() {
    let mut graph = ComputeGraph::new("Unbound", context());
    let kernel = graph.add_kernel(KernelBuilder::new("Main").reads(read_fn()).build());
    let buffer = graph.add_data_interface(
        DataInterfaceBuilder::new("Buffer")
            .execution()
            .source_type("SkinnedMesh")
            .build(),
    );
    graph.add_null_data_interface();
    graph.add_edge(GraphEdge::input(kernel, 0, buffer, 0));

    let unrelated: Arc<dyn BindingObject> = Arc::new(TestComponent::new("Light"));
    let providers = graph.create_data_providers(&[unrelated]);

    assert_eq!(providers.len(), 2);
    assert!(providers[1].is_none());
    assert!(!graph.validate_providers(&providers));
    assert!(!graph.validate_providers(&[]));
}

// ==================== Shader parameter metadata ====================

#[test]
fn test_kernel_metadata_nests_each_bound_interface() {
    let mut graph = ComputeGraph::new("Metadata", context());
    let kernel = graph.add_kernel(KernelBuilder::new("Main").reads(read_fn()).writes(write_fn()).build());
    let input = graph.add_data_interface(DataInterfaceBuilder::new("Input").execution().build());
    let output = graph.add_data_interface(DataInterfaceBuilder::new("Output").build());
    graph.add_edge(GraphEdge::output(kernel, 0, output, 0));
    graph.add_edge(GraphEdge::input(kernel, 0, input, 0));

    let mut allocations = ShaderParametersMetadataAllocations::new();
    let handle = graph
        .build_kernel_shader_metadata(kernel, &mut allocations)
        .expect("enabled kernel");
    let metadata = allocations.get(handle).expect("allocated");

    assert_eq!(metadata.struct_name, "Main");
    let input_member = metadata.member("DI0_Input").expect("input member");
    let output_member = metadata.member("DI1_Output").expect("output member");
    assert_eq!(input_member.offset, 0);
    assert_eq!(output_member.offset, 16);
    assert_eq!(metadata.size, 32);
    assert_eq!(metadata.resource_count(), 0);

    let ShaderParameterKind::NestedStruct(nested) = input_member.kind else {
        panic!("expected a nested struct, got {:?}", input_member.kind);
    };
    let nested = allocations.get(nested).expect("nested allocated");
    assert_eq!(nested.struct_name, "DI0_Input");
    assert_eq!(nested.resource_count(), 1);
}
