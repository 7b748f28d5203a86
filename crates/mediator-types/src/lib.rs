//! Shared types for the mediator client: protocol records, fixed-size ids,
//! contract calls, and the `ContractGateway` boundary consumed by the client.

pub mod calls;
pub mod error;
pub mod ids;
pub mod protocol;
pub mod traits;

pub use alloy_primitives::U256;
pub use calls::{
    ContractCall, DisputeSummary, MediatorCall, SentTx, TokenCall, TxOptions, TxReceipt,
    TxRequest,
};
pub use error::{GatewayError, ValidationError};
pub use ids::{Address, ContentHash, TxHash};
pub use protocol::{
    Approval, AuthorizationMessage, Dispute, Fill, Proof, Quarter, RootInfo, Round, Signature,
};
pub use traits::ContractGateway;
