//! Deployment record written by the contract deployment script.

use std::{collections::BTreeMap, fs, path::Path};

use mediator_types::{Address, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed deployment file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid address for `{field}`: {source}")]
    Address {
        field: String,
        #[source]
        source: ValidationError,
    },
    #[error("unknown asset `{0}`")]
    UnknownAsset(String),
}

/// `{"assets": {"OAX": "0x..", ...}, "mediator": "0x..", "operator": "0x.."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub assets: BTreeMap<String, String>,
    pub mediator: String,
    #[serde(default)]
    pub operator: Option<String>,
}

fn parse_address(field: &str, value: &str) -> Result<Address, DeploymentError> {
    value.parse().map_err(|source| DeploymentError::Address {
        field: field.to_string(),
        source,
    })
}

impl Deployment {
    pub fn load(path: &Path) -> Result<Self, DeploymentError> {
        let raw = fs::read_to_string(path).map_err(|source| DeploymentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn mediator_address(&self) -> Result<Address, DeploymentError> {
        parse_address("mediator", &self.mediator)
    }

    pub fn operator_address(&self) -> Result<Option<Address>, DeploymentError> {
        self.operator
            .as_deref()
            .map(|operator| parse_address("operator", operator))
            .transpose()
    }

    /// Resolve a token given either as an address or as an asset symbol.
    pub fn resolve_token(&self, token: &str) -> Result<Address, DeploymentError> {
        if let Ok(address) = token.parse() {
            return Ok(address);
        }
        let address = self
            .assets
            .get(token)
            .or_else(|| self.assets.get(&token.to_ascii_uppercase()))
            .ok_or_else(|| DeploymentError::UnknownAsset(token.to_string()))?;
        parse_address(token, address)
    }

    /// Registered assets as `(symbol, address)` pairs.
    pub fn asset_addresses(&self) -> Result<Vec<(String, Address)>, DeploymentError> {
        self.assets
            .iter()
            .map(|(symbol, address)| Ok((symbol.clone(), parse_address(symbol, address)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use mediator_types::Address;

    use super::{Deployment, DeploymentError};

    const SAMPLE: &str = r#"{
  "assets": {
    "OAX": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
    "WETH": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
  },
  "mediator": "0x4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d",
  "operator": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a"
}"#;

    #[test]
    fn parses_deploy_script_output() {
        let deployment: Deployment = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(
            deployment.mediator_address().unwrap(),
            Address::new([0x4d; 20])
        );
        assert_eq!(
            deployment.operator_address().unwrap(),
            Some(Address::new([0x0a; 20]))
        );
        assert_eq!(deployment.asset_addresses().unwrap().len(), 2);
    }

    #[test]
    fn tokens_resolve_by_symbol_or_address() {
        let deployment: Deployment = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(
            deployment.resolve_token("weth").unwrap(),
            Address::new([0xbb; 20])
        );
        assert_eq!(
            deployment
                .resolve_token("0xcccccccccccccccccccccccccccccccccccccccc")
                .unwrap(),
            Address::new([0xcc; 20])
        );
        assert!(matches!(
            deployment.resolve_token("DAI"),
            Err(DeploymentError::UnknownAsset(_))
        ));
    }

    #[test]
    fn rejects_bad_mediator_address() {
        let deployment: Deployment = serde_json::from_str(r#"{"mediator": "0x12"}"#).unwrap();
        assert!(deployment.mediator_address().is_err());
        assert_eq!(deployment.operator_address().unwrap(), None);
    }
}
