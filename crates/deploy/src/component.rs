//! Component definitions: names, call arguments and constructor specifications.

use std::fmt;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

use crate::{ComponentRegistry, error::Result};

/// Identifier of one deployable component.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Deref,
    Display,
    From,
)]
#[serde(transparent)]
pub struct ComponentName(String);

impl From<&str> for ComponentName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl ComponentName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A fully resolved value passed to a remote deployment or invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Token {
    Address(Address),
    Uint(U256),
    String(String),
}

impl Token {
    /// The ABI type name of this value, as used in function signatures.
    pub fn sol_type(&self) -> &'static str {
        match self {
            Token::Address(_) => "address",
            Token::Uint(_) => "uint256",
            Token::String(_) => "string",
        }
    }

    pub fn to_sol_value(&self) -> DynSolValue {
        match self {
            Token::Address(address) => DynSolValue::Address(*address),
            Token::Uint(value) => DynSolValue::Uint(*value, 256),
            Token::String(value) => DynSolValue::String(value.clone()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Address(address) => write!(f, "{address}"),
            Token::Uint(value) => write!(f, "{value}"),
            Token::String(value) => write!(f, "{value:?}"),
        }
    }
}

/// A constructor argument: either a literal value or the address of another component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorArg {
    Literal(Token),
    AddressOf(ComponentName),
}

impl ConstructorArg {
    pub fn string(value: impl Into<String>) -> Self {
        ConstructorArg::Literal(Token::String(value.into()))
    }

    pub fn address_of(component: impl Into<ComponentName>) -> Self {
        ConstructorArg::AddressOf(component.into())
    }
}

impl fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructorArg::Literal(token) => write!(f, "{token}"),
            ConstructorArg::AddressOf(name) => write!(f, "&{name}"),
        }
    }
}

/// Static description of a component to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// The component name, unique within a plan.
    pub name: ComponentName,
    /// Name of the compiled artifact holding the component's bytecode.
    pub artifact: String,
    /// Ordered constructor arguments.
    pub constructor_args: Vec<ConstructorArg>,
}

impl ComponentSpec {
    /// Create a spec whose artifact shares the component name.
    pub fn new(name: impl Into<ComponentName>) -> Self {
        let name = name.into();
        Self {
            artifact: name.to_string(),
            name,
            constructor_args: Vec::new(),
        }
    }

    pub fn artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = artifact.into();
        self
    }

    pub fn arg(mut self, arg: ConstructorArg) -> Self {
        self.constructor_args.push(arg);
        self
    }

    /// Components whose address this component needs at construction time.
    pub fn dependencies(&self) -> impl Iterator<Item = &ComponentName> {
        self.constructor_args.iter().filter_map(|arg| match arg {
            ConstructorArg::AddressOf(name) => Some(name),
            ConstructorArg::Literal(_) => None,
        })
    }

    /// Replace every component reference with its recorded address.
    ///
    /// Fails with `UnresolvedDependency` on the first reference that is not deployed.
    pub fn resolve_args(&self, registry: &ComponentRegistry) -> Result<Vec<Token>> {
        self.constructor_args
            .iter()
            .map(|arg| match arg {
                ConstructorArg::Literal(token) => Ok(token.clone()),
                ConstructorArg::AddressOf(name) => registry
                    .require_address(name, self.name.as_str())
                    .map(Token::Address),
            })
            .collect()
    }
}
