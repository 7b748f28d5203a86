//! `ContractGateway` over a JSON-RPC node.

pub mod abi;
pub mod gateway;

pub use gateway::{RpcConfig, RpcGateway};
