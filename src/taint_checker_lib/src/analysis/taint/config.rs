//! Loading and validation of taint rule files.
//!
//! A rule file is a JSON document with three rule lists:
//!
//! ```json
//! {
//!     "sources": [
//!         { "method": { "class": "Net", "name": "read", "param_types": [], "return_type": "String" },
//!           "type": "String" }
//!     ],
//!     "sinks": [
//!         { "method": { "class": "Db", "name": "exec", "param_types": ["String"], "return_type": "void" },
//!           "index": 0 }
//!     ],
//!     "transfers": [
//!         { "method": { "class": "StringBuilder", "name": "append", "param_types": ["String"], "return_type": "StringBuilder" },
//!           "from": 0, "to": "base", "type": "StringBuilder" }
//!     ]
//! }
//! ```
//!
//! Transfer endpoints are either an argument index, `"base"` or `"result"`.
//! Taint can only be transferred from an argument or the receiver (`"base"`)
//! and only to the receiver or the call result;
//! rule files violating this are rejected before the analysis starts.

use crate::intermediate_representation::MethodRef;
use crate::prelude::*;
use derive_more::Display;
use std::fmt;

/// The rule sets of the taint analysis as found in the rule file.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
pub struct TaintConfig {
    /// Methods whose return value is considered tainted.
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    /// Method arguments that must not receive tainted values.
    #[serde(default)]
    pub sinks: Vec<SinkSpec>,
    /// Methods propagating taint between their arguments, receiver and result.
    #[serde(default)]
    pub transfers: Vec<TransferSpec>,
}

/// A source rule: calls of `method` return a tainted value of type `data_type`.
///
/// The rule only takes effect if the declared type matches the return type of the method.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SourceSpec {
    /// The source method.
    pub method: MethodRef,
    /// The declared type of the produced taint.
    #[serde(rename = "type")]
    pub data_type: String,
}

/// A sink rule: passing a tainted value as the `index`-th argument of `method`
/// constitutes a taint flow.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SinkSpec {
    /// The sink method.
    pub method: MethodRef,
    /// The zero-based index of the observed argument.
    pub index: usize,
}

/// A transfer rule: calls of `method` propagate taint from `from` to `to`,
/// retyping the propagated taint to `data_type`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct TransferSpec {
    /// The transferring method.
    pub method: MethodRef,
    /// Where the taint is read from: an argument index or `base`.
    pub from: EndpointSpec,
    /// Where the taint is written to: `base` or `result`.
    pub to: EndpointSpec,
    /// The declared type of the propagated taint.
    #[serde(rename = "type")]
    pub data_type: String,
}

/// An endpoint of a transfer rule as written in the rule file.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(untagged)]
pub enum EndpointSpec {
    /// The argument with the given zero-based index.
    Arg(usize),
    /// The receiver object or the call result.
    Named(NamedEndpoint),
}

/// The non-argument endpoints of a transfer rule.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum NamedEndpoint {
    /// The receiver object of the call.
    Base,
    /// The return value of the call.
    Result,
}

/// A validated endpoint of a transfer rule.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Display)]
pub enum TransferEndpoint {
    /// The argument with the given zero-based index.
    #[display(fmt = "argument {}", _0)]
    Arg(usize),
    /// The receiver object of the call.
    #[display(fmt = "base")]
    Base,
    /// The return value of the call.
    #[display(fmt = "result")]
    Result,
}

impl From<EndpointSpec> for TransferEndpoint {
    fn from(spec: EndpointSpec) -> TransferEndpoint {
        match spec {
            EndpointSpec::Arg(index) => TransferEndpoint::Arg(index),
            EndpointSpec::Named(NamedEndpoint::Base) => TransferEndpoint::Base,
            EndpointSpec::Named(NamedEndpoint::Result) => TransferEndpoint::Result,
        }
    }
}

impl fmt::Display for TransferSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.method,
            TransferEndpoint::from(self.from),
            TransferEndpoint::from(self.to)
        )
    }
}

impl TaintConfig {
    /// Read a rule file.
    /// Unreadable or unparseable files are a fatal error.
    pub fn read_from_file(path: &str) -> Result<TaintConfig, Error> {
        let content = std::fs::read_to_string(path)
            .context(format!("Could not read taint rule file {path}"))?;
        let config: TaintConfig =
            serde_json::from_str(&content).context("Could not parse taint rule file")?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all transfer rules read from a valid endpoint and write to a valid endpoint.
    pub fn validate(&self) -> Result<(), Error> {
        for transfer in &self.transfers {
            let from = TransferEndpoint::from(transfer.from);
            let to = TransferEndpoint::from(transfer.to);
            if from == TransferEndpoint::Result {
                return Err(anyhow!("invalid transfer rule ({transfer}): cannot read taint from the call result"));
            }
            if matches!(to, TransferEndpoint::Arg(_)) {
                return Err(anyhow!("invalid transfer rule ({transfer}): cannot write taint to an argument"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rule_file() {
        let json = r#"
        {
            "sources": [
                { "method": { "class": "Net", "name": "read", "param_types": [], "return_type": "String" },
                  "type": "String" }
            ],
            "sinks": [
                { "method": { "class": "Db", "name": "exec", "param_types": ["String"], "return_type": "void" },
                  "index": 0 }
            ],
            "transfers": [
                { "method": { "class": "SB", "name": "append", "param_types": ["String"], "return_type": "SB" },
                  "from": 0, "to": "base", "type": "SB" },
                { "method": { "class": "SB", "name": "toString", "param_types": [], "return_type": "String" },
                  "from": "base", "to": "result", "type": "String" }
            ]
        }"#;
        let config: TaintConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sinks[0].index, 0);
        assert_eq!(
            TransferEndpoint::from(config.transfers[0].from),
            TransferEndpoint::Arg(0)
        );
        assert_eq!(
            TransferEndpoint::from(config.transfers[1].from),
            TransferEndpoint::Base
        );
    }

    #[test]
    fn invalid_endpoints_are_rejected() {
        let json = r#"
        {
            "transfers": [
                { "method": { "class": "SB", "name": "append", "param_types": [], "return_type": "SB" },
                  "from": "result", "to": "base", "type": "SB" }
            ]
        }"#;
        let config: TaintConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"
        {
            "transfers": [
                { "method": { "class": "SB", "name": "append", "param_types": [], "return_type": "SB" },
                  "from": "base", "to": 1, "type": "SB" }
            ]
        }"#;
        let config: TaintConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        // Missing rule lists default to empty.
        let config: TaintConfig = serde_json::from_str("{}").unwrap();
        assert!(config.validate().is_ok());
        assert!(config.sources.is_empty());
    }
}
