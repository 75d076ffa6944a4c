//! Helpers for tests that need a real database or a predictable payment gateway.
pub mod prepare_env;
pub mod stub_gateway;

pub use stub_gateway::StubGateway;
