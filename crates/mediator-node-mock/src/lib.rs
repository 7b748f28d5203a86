//! In-memory fake node and mediator contract for exercising the mediator
//! client without a chain.

pub mod fake_node;
pub mod log_capture;
pub mod mock_mediator;
pub mod scenarios;

pub use fake_node::{FakeNode, MiningMode, SentRecord, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
pub use log_capture::{CapturedEvent, LogCapture};
pub use mock_mediator::{DisputeEntry, MockMediator};
pub use scenarios::{DemoAccounts, DemoScenario};
