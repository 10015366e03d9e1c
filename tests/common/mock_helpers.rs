//! Mock construction helpers

use computegraph_rs::compile::{ShaderCompileInput, ShaderCompileOutput, ShaderCompiler};
use mockall::mock;
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::Arc;

mock! {
    pub Compiler {}

    impl ShaderCompiler for Compiler {
        fn compile(&self, input: &ShaderCompileInput) -> Result<ShaderCompileOutput, Vec<String>>;
    }
}

/// Bytecode a test compiler emits for one input
pub fn fake_bytecode(input: &ShaderCompileInput) -> Vec<u8> {
    format!(
        "{}:{}:{}",
        input.entry_point, input.permutation_id, input.shader_platform
    )
    .into_bytes()
}

/// Mock compiler that accepts every input
pub fn accepting_mock() -> MockCompiler {
    let mut compiler = MockCompiler::new();
    compiler.expect_compile().returning(|input| {
        Ok(ShaderCompileOutput {
            bytecode: fake_bytecode(input),
            warnings: Vec::new(),
        })
    });
    compiler
}

/// Records every compile and fails the entry points it is told to.
#[derive(Default)]
pub struct CountingCompiler {
    compiled: Mutex<Vec<ShaderCompileInput>>,
    failing: Mutex<HashSet<String>>,
}

impl CountingCompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_entry_point(&self, entry_point: &str) {
        self.failing.lock().insert(entry_point.to_string());
    }

    pub fn compile_count(&self) -> usize {
        self.compiled.lock().len()
    }

    /// Compiles of `entry_point`, one per permutation
    pub fn compiles_of(&self, entry_point: &str) -> usize {
        self.compiled
            .lock()
            .iter()
            .filter(|input| input.entry_point == entry_point)
            .count()
    }

    pub fn inputs(&self) -> Vec<ShaderCompileInput> {
        self.compiled.lock().clone()
    }

    pub fn reset(&self) {
        self.compiled.lock().clear();
    }
}

impl ShaderCompiler for CountingCompiler {
    fn compile(&self, input: &ShaderCompileInput) -> Result<ShaderCompileOutput, Vec<String>> {
        self.compiled.lock().push(input.clone());
        if self.failing.lock().contains(&input.entry_point) {
            return Err(vec![format!(
                "{}: error X3004: undeclared identifier 'Missing'",
                input.entry_point
            )]);
        }
        Ok(ShaderCompileOutput {
            bytecode: fake_bytecode(input),
            warnings: Vec::new(),
        })
    }
}

/// Blocks every compile until [`GatedCompiler::open`] is called.
#[derive(Default)]
pub struct GatedCompiler {
    open: Mutex<bool>,
    opened: Condvar,
}

impl GatedCompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }
}

impl ShaderCompiler for GatedCompiler {
    fn compile(&self, input: &ShaderCompileInput) -> Result<ShaderCompileOutput, Vec<String>> {
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
        Ok(ShaderCompileOutput {
            bytecode: fake_bytecode(input),
            warnings: Vec::new(),
        })
    }
}
