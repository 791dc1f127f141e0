//! In-memory FastSet network for tests and the demo: validators and a proxy that speak the
//! same JSON-RPC methods as live nodes, in process or over HTTP.

pub mod handler;
pub mod mock_proxy;
pub mod mock_validator;
pub mod scenarios;
pub mod server;

pub use handler::{RpcHandler, SharedHandler};
pub use mock_proxy::{MockProxy, SharedProxy};
pub use mock_validator::{AccountState, MockValidator, SharedValidator};
pub use scenarios::{DemoAccounts, DemoScenario, VALIDATOR_NAMES};
pub use server::{serve_proxy, serve_validator, ProxyService, ServedNetwork, ValidatorService};
