//! Shader value types and external function signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar component type of a shader value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderFundamentalType {
    Bool,
    Int,
    Uint,
    Float,
}

impl ShaderFundamentalType {
    fn hlsl_name(self) -> &'static str {
        match self {
            ShaderFundamentalType::Bool => "bool",
            ShaderFundamentalType::Int => "int",
            ShaderFundamentalType::Uint => "uint",
            ShaderFundamentalType::Float => "float",
        }
    }
}

/// Shape of a shader value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderTypeDimension {
    Scalar,
    /// Vector with 2..=4 components
    Vector(u8),
    /// Matrix with rows x columns, each 2..=4
    Matrix(u8, u8),
}

/// A typed shader value (`float3`, `uint`, `float4x4`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShaderValueType {
    pub fundamental: ShaderFundamentalType,
    pub dimension: ShaderTypeDimension,
}

impl ShaderValueType {
    pub const fn scalar(fundamental: ShaderFundamentalType) -> Self {
        Self {
            fundamental,
            dimension: ShaderTypeDimension::Scalar,
        }
    }

    pub const fn vector(fundamental: ShaderFundamentalType, components: u8) -> Self {
        Self {
            fundamental,
            dimension: ShaderTypeDimension::Vector(components),
        }
    }

    pub const fn matrix(fundamental: ShaderFundamentalType, rows: u8, columns: u8) -> Self {
        Self {
            fundamental,
            dimension: ShaderTypeDimension::Matrix(rows, columns),
        }
    }

    pub const fn float() -> Self {
        Self::scalar(ShaderFundamentalType::Float)
    }

    pub const fn uint() -> Self {
        Self::scalar(ShaderFundamentalType::Uint)
    }

    pub const fn int() -> Self {
        Self::scalar(ShaderFundamentalType::Int)
    }

    pub const fn float3() -> Self {
        Self::vector(ShaderFundamentalType::Float, 3)
    }

    pub const fn float4() -> Self {
        Self::vector(ShaderFundamentalType::Float, 4)
    }

    /// Number of scalar components
    pub fn component_count(&self) -> usize {
        match self.dimension {
            ShaderTypeDimension::Scalar => 1,
            ShaderTypeDimension::Vector(n) => n as usize,
            ShaderTypeDimension::Matrix(r, c) => r as usize * c as usize,
        }
    }

    /// Size in bytes when stored in a constant buffer (every component is 4 bytes)
    pub fn size_bytes(&self) -> usize {
        self.component_count() * 4
    }

    /// HLSL type declaration
    pub fn type_declaration(&self) -> String {
        let base = self.fundamental.hlsl_name();
        match self.dimension {
            ShaderTypeDimension::Scalar => base.to_string(),
            ShaderTypeDimension::Vector(n) => format!("{}{}", base, n),
            ShaderTypeDimension::Matrix(r, c) => format!("{}{}x{}", base, r, c),
        }
    }
}

impl fmt::Display for ShaderValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_declaration())
    }
}

/// Signature of an external function on a kernel, or a function a data interface implements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShaderFunctionDefinition {
    pub name: String,
    pub return_type: Option<ShaderValueType>,
    pub param_types: Vec<ShaderValueType>,
}

impl ShaderFunctionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: None,
            param_types: Vec::new(),
        }
    }

    pub fn returns(mut self, ty: ShaderValueType) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn param(mut self, ty: ShaderValueType) -> Self {
        self.param_types.push(ty);
        self
    }

    /// Same return type, arity and per-parameter types. Names are not compared.
    pub fn signature_matches(&self, other: &ShaderFunctionDefinition) -> bool {
        self.return_type == other.return_type && self.param_types == other.param_types
    }

    /// Human readable signature, used in diagnostics
    pub fn signature(&self) -> String {
        let ret = self
            .return_type
            .map(|t| t.type_declaration())
            .unwrap_or_else(|| "void".to_string());
        let params: Vec<String> = self
            .param_types
            .iter()
            .map(|t| t.type_declaration())
            .collect();
        format!("{} {}({})", ret, self.name, params.join(", "))
    }
}
