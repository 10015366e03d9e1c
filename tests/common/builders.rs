//! Test data builders for kernels, data interfaces, contexts and graphs

use computegraph_rs::compile::ShaderCompiler;
use computegraph_rs::config::FrameworkConfig;
use computegraph_rs::data_interface::{
    BindingObject, BindingOwner, DataInterface, DataProvider, MetadataUseCase, SourceType,
    ShaderParametersMetadataAllocations, ShaderParametersMetadataBuilder,
};
use computegraph_rs::graph::{DataInterfaceIndex, KernelIndex};
use computegraph_rs::hash::HashBuilder;
use computegraph_rs::kernel::{
    ComputeKernel, KernelFlags, PermutationDomain, PermutationVector, ShaderFunctionDefinition,
    ShaderValueType, TextKernelSource,
};
use computegraph_rs::{ComputeFrameworkContext, ComputeGraph, GraphEdge, ShaderPlatform};
use parking_lot::Mutex;
use std::sync::Arc;

/// `float ReadValue(uint)`
pub fn read_fn() -> ShaderFunctionDefinition {
    ShaderFunctionDefinition::new("ReadValue")
        .returns(ShaderValueType::float())
        .param(ShaderValueType::uint())
}

/// `void WriteValue(uint, float)`
pub fn write_fn() -> ShaderFunctionDefinition {
    ShaderFunctionDefinition::new("WriteValue")
        .param(ShaderValueType::uint())
        .param(ShaderValueType::float())
}

// ==================== Data interfaces ====================

/// Data interface with one read and one write function.
pub struct TestDataInterface {
    pub class_name: String,
    pub execution: bool,
    pub hlsl: String,
    pub hash_salt: String,
    pub permutations: Vec<PermutationDomain>,
    pub source_types: Vec<SourceType>,
    pub inputs: Vec<ShaderFunctionDefinition>,
    pub outputs: Vec<ShaderFunctionDefinition>,
    /// Masks and binding names of the last created provider
    pub last_provider: Mutex<Option<ProviderRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    pub input_mask: u64,
    pub output_mask: u64,
    pub bindings: Vec<Option<String>>,
}

impl DataInterface for TestDataInterface {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn source_types(&self) -> Vec<SourceType> {
        self.source_types.clone()
    }

    fn supported_inputs(&self) -> Vec<ShaderFunctionDefinition> {
        self.inputs.clone()
    }

    fn supported_outputs(&self) -> Vec<ShaderFunctionDefinition> {
        self.outputs.clone()
    }

    fn hlsl(&self, out: &mut String) {
        out.push_str(&self.hlsl);
    }

    fn permutations(&self, permutations: &mut PermutationVector) {
        for domain in &self.permutations {
            permutations.add_permutation(domain.clone());
        }
    }

    fn shader_hash(&self, hash: &mut HashBuilder) {
        hash.append_str(&self.class_name).append_str(&self.hash_salt);
    }

    fn shader_parameters(
        &self,
        uid: &str,
        builder: &mut ShaderParametersMetadataBuilder,
        allocations: &mut ShaderParametersMetadataAllocations,
    ) {
        let mut nested = ShaderParametersMetadataBuilder::new();
        nested
            .add_param("NumElements", ShaderValueType::uint())
            .add_buffer_srv("Values", ShaderValueType::float());
        let metadata = nested.build(MetadataUseCase::NestedStruct, uid, allocations);
        let handle = allocations.insert(metadata);
        builder.add_nested_struct(uid, handle);
    }

    fn is_execution_interface(&self) -> bool {
        self.execution
    }

    fn create_data_provider(
        &self,
        bindings: &[Option<Arc<dyn BindingObject>>],
        input_mask: u64,
        output_mask: u64,
    ) -> Option<Box<dyn DataProvider>> {
        *self.last_provider.lock() = Some(ProviderRecord {
            input_mask,
            output_mask,
            bindings: bindings
                .iter()
                .map(|b| b.as_ref().map(|b| b.type_name().to_string()))
                .collect(),
        });
        Some(Box::new(TestProvider {
            valid: bindings.iter().all(Option::is_some),
        }))
    }
}

pub struct TestProvider {
    pub valid: bool,
}

impl DataProvider for TestProvider {
    fn is_valid(&self) -> bool {
        self.valid
    }
}

pub struct DataInterfaceBuilder {
    inner: TestDataInterface,
}

impl DataInterfaceBuilder {
    pub fn new(class_name: &str) -> Self {
        Self {
            inner: TestDataInterface {
                class_name: class_name.to_string(),
                execution: false,
                hlsl: "StructuredBuffer<float> DI_UID##Values;\n\
                       float DI_UID##ReadValue(uint Index) { return DI_UID##Values[Index]; }\n\
                       void DI_UID##WriteValue(uint Index, float Value) { }\n"
                    .to_string(),
                hash_salt: String::new(),
                permutations: Vec::new(),
                source_types: Vec::new(),
                inputs: vec![read_fn()],
                outputs: vec![write_fn()],
                last_provider: Mutex::new(None),
            },
        }
    }

    pub fn execution(mut self) -> Self {
        self.inner.execution = true;
        self
    }

    pub fn salt(mut self, salt: &str) -> Self {
        self.inner.hash_salt = salt.to_string();
        self
    }

    pub fn hlsl(mut self, hlsl: &str) -> Self {
        self.inner.hlsl = hlsl.to_string();
        self
    }

    pub fn permutation(mut self, domain: PermutationDomain) -> Self {
        self.inner.permutations.push(domain);
        self
    }

    pub fn source_type(mut self, name: &str) -> Self {
        self.inner.source_types.push(SourceType::new(name));
        self
    }

    pub fn inputs(mut self, inputs: Vec<ShaderFunctionDefinition>) -> Self {
        self.inner.inputs = inputs;
        self
    }

    pub fn build(self) -> Arc<TestDataInterface> {
        Arc::new(self.inner)
    }
}

// ==================== Kernels ====================

pub struct KernelBuilder {
    source: TextKernelSource,
    flags: KernelFlags,
}

impl KernelBuilder {
    pub fn new(entry_point: &str) -> Self {
        Self {
            source: TextKernelSource::new(
                entry_point,
                format!("[numthreads(64, 1, 1)]\nvoid {}(uint3 Id : SV_DispatchThreadID) {{ }}\n", entry_point),
            ),
            flags: KernelFlags::empty(),
        }
    }

    pub fn body(mut self, body: &str) -> Self {
        let entry_point = self.source.entry_point.clone();
        let mut source = TextKernelSource::new(entry_point, body);
        source.external_inputs = std::mem::take(&mut self.source.external_inputs);
        source.external_outputs = std::mem::take(&mut self.source.external_outputs);
        source.permutations = std::mem::take(&mut self.source.permutations);
        source.definitions = std::mem::take(&mut self.source.definitions);
        self.source = source;
        self
    }

    pub fn reads(mut self, function: ShaderFunctionDefinition) -> Self {
        self.source = self.source.with_input(function);
        self
    }

    pub fn writes(mut self, function: ShaderFunctionDefinition) -> Self {
        self.source = self.source.with_output(function);
        self
    }

    pub fn define(mut self, symbol: &str, value: &str) -> Self {
        self.source = self.source.with_define(symbol, value);
        self
    }

    pub fn permutation(mut self, domain: PermutationDomain) -> Self {
        self.source = self.source.with_permutation(domain);
        self
    }

    pub fn default_kernel(mut self) -> Self {
        self.flags |= KernelFlags::IS_DEFAULT_KERNEL;
        self
    }

    pub fn build(self) -> Arc<ComputeKernel> {
        Arc::new(ComputeKernel::new(Arc::new(self.source)).with_flags(self.flags))
    }
}

// ==================== Contexts ====================

/// Editor context under automation: every compile is synchronous.
pub fn sync_context(compiler: Arc<dyn ShaderCompiler>) -> Arc<ComputeFrameworkContext> {
    let mut config = FrameworkConfig::editor();
    config.compile.automation_testing = true;
    config.compile.worker_threads = 2;
    context_with(config, compiler)
}

/// Interactive editor context: user kernels compile asynchronously.
pub fn async_context(compiler: Arc<dyn ShaderCompiler>) -> Arc<ComputeFrameworkContext> {
    let mut config = FrameworkConfig::editor();
    config.compile.worker_threads = 2;
    context_with(config, compiler)
}

pub fn context_with(
    config: FrameworkConfig,
    compiler: Arc<dyn ShaderCompiler>,
) -> Arc<ComputeFrameworkContext> {
    ComputeFrameworkContext::builder(config)
        .with_compiler(compiler)
        .build()
        .expect("build framework context")
}

pub fn context_for_platform(
    shader_platform: ShaderPlatform,
    compiler: Arc<dyn ShaderCompiler>,
) -> Arc<ComputeFrameworkContext> {
    let mut config = FrameworkConfig::editor();
    config.compile.automation_testing = true;
    config.rhi.shader_platform = shader_platform;
    context_with(config, compiler)
}

// ==================== Graphs ====================

/// One kernel reading and writing one execution data interface.
pub fn single_kernel_graph(
    context: Arc<ComputeFrameworkContext>,
) -> (ComputeGraph, KernelIndex, DataInterfaceIndex) {
    let mut graph = ComputeGraph::new("SingleKernel", context);
    let kernel = graph.add_kernel(KernelBuilder::new("Main").reads(read_fn()).writes(write_fn()).build());
    let buffer = graph.add_data_interface(DataInterfaceBuilder::new("Buffer").execution().build());
    graph.add_edge(GraphEdge::input(kernel, 0, buffer, 0));
    graph.add_edge(GraphEdge::output(kernel, 0, buffer, 0));
    (graph, kernel, buffer)
}

/// `Produce` writes a buffer that `Consume` reads.
pub fn producer_consumer_graph(
    context: Arc<ComputeFrameworkContext>,
) -> (ComputeGraph, KernelIndex, KernelIndex) {
    let mut graph = ComputeGraph::new("ProducerConsumer", context);
    let consume = graph.add_kernel(KernelBuilder::new("Consume").reads(read_fn()).build());
    let produce = graph.add_kernel(KernelBuilder::new("Produce").writes(write_fn()).build());
    let buffer = graph.add_data_interface(DataInterfaceBuilder::new("Buffer").execution().build());
    graph.add_edge(GraphEdge::input(consume, 0, buffer, 0));
    graph.add_edge(GraphEdge::output(produce, 0, buffer, 0));
    (graph, produce, consume)
}

// ==================== Binding objects ====================

pub struct TestComponent {
    pub type_name: String,
    pub owner: Option<Arc<TestActor>>,
}

impl TestComponent {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            owner: None,
        }
    }

    pub fn owned_by(mut self, owner: Arc<TestActor>) -> Self {
        self.owner = Some(owner);
        self
    }
}

impl BindingObject for TestComponent {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn owner(&self) -> Option<Arc<dyn BindingOwner>> {
        self.owner.clone().map(|o| o as Arc<dyn BindingOwner>)
    }
}

#[derive(Default)]
pub struct TestActor {
    pub components: Vec<Arc<dyn BindingObject>>,
}

impl BindingOwner for TestActor {
    fn find_component(&self, source_type: &SourceType) -> Option<Arc<dyn BindingObject>> {
        self.components.iter().find(|c| c.is_a(source_type)).cloned()
    }
}
