//! Error handling for the compute graph kernel cache
//!
//! This module defines the crate-wide error type, a Result alias, and the
//! typed graph validation errors surfaced by [`crate::graph::ComputeGraph::validate`].

use std::fmt;
use thiserror::Error;

/// Main error type for compute graph operations
#[derive(Error, Debug)]
pub enum ComputeGraphError {
    /// The graph failed validation
    #[error("Graph validation failed: {0}")]
    Validation(ValidationErrors),

    /// Inconsistent authoring data found outside of validation (e.g. during source assembly)
    #[error("Authoring error: {0}")]
    Authoring(String),

    /// Errors reported by a cache backend
    #[error("Cache error: {0}")]
    Cache(String),

    /// A non-default kernel failed to compile
    #[error("Failed to compile kernel resource [{name}] for platform [{platform}] ({} errors)", errors.len())]
    Compile {
        name: String,
        platform: String,
        errors: Vec<String>,
    },

    /// A default (built-in) kernel failed to compile; the process cannot continue rendering
    #[error("Failed to compile default kernel resource [{name}] for platform [{platform}]")]
    DefaultKernelCompile {
        name: String,
        platform: String,
        errors: Vec<String>,
    },

    /// Errors reading or writing graph archives
    #[error("Archive error: {0}")]
    Archive(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication between threads
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ComputeGraphError>,
    },
}

impl ComputeGraphError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ComputeGraphError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for failures the caller must treat as fatal
    pub fn is_fatal(&self) -> bool {
        match self {
            ComputeGraphError::DefaultKernelCompile { .. } => true,
            ComputeGraphError::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

impl From<rmp_serde::encode::Error> for ComputeGraphError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        ComputeGraphError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ComputeGraphError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        ComputeGraphError::Serialization(err.to_string())
    }
}

/// Result type alias for compute graph operations
pub type Result<T> = std::result::Result<T, ComputeGraphError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

/// A single authoring problem found by graph validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("edge {edge} references kernel {kernel_index} but the graph has {kernel_count} kernels")]
    KernelIndexOutOfRange {
        edge: usize,
        kernel_index: usize,
        kernel_count: usize,
    },

    #[error("edge {edge} references data interface {data_interface_index} but the graph has {data_interface_count} data interfaces")]
    DataInterfaceIndexOutOfRange {
        edge: usize,
        data_interface_index: usize,
        data_interface_count: usize,
    },

    #[error("edge {edge} binding index {binding_index} is out of range ({side}, {available} functions available)")]
    BindingIndexOutOfRange {
        edge: usize,
        side: BindingSide,
        binding_index: usize,
        available: usize,
    },

    #[error("edge {edge} binds kernel {kernel_index} to an empty data interface slot {data_interface_index}")]
    NullDataInterface {
        edge: usize,
        kernel_index: usize,
        data_interface_index: usize,
    },

    #[error("edge {edge}: kernel function '{kernel_function}' does not match data interface function '{data_interface_function}'")]
    SignatureMismatch {
        edge: usize,
        kernel_function: String,
        data_interface_function: String,
    },

    #[error("kernel {kernel_index} has no bound execution interface")]
    MissingExecutionInterface { kernel_index: usize },

    #[error("kernel {kernel_index} has {count} bound execution interfaces")]
    MultipleExecutionInterfaces { kernel_index: usize, count: usize },

    #[error("kernel dependency graph contains a cycle ({scheduled} of {total} kernels scheduled)")]
    CycleDetected { scheduled: usize, total: usize },
}

/// Which side of an edge a binding index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSide {
    KernelInput,
    KernelOutput,
    DataInterfaceInput,
    DataInterfaceOutput,
}

impl fmt::Display for BindingSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingSide::KernelInput => "kernel input",
            BindingSide::KernelOutput => "kernel output",
            BindingSide::DataInterfaceInput => "data interface input",
            BindingSide::DataInterfaceOutput => "data interface output",
        };
        f.write_str(name)
    }
}

/// All validation errors found in one pass over the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// True if any error matches the predicate.
    pub fn contains(&self, pred: impl Fn(&ValidationError) -> bool) -> bool {
        self.0.iter().any(pred)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for ComputeGraphError {
    fn from(errors: ValidationErrors) -> Self {
        ComputeGraphError::Validation(errors)
    }
}
