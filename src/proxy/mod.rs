//! Local proxy gateway and system proxy settings

pub mod gateway;
pub mod system;

pub use gateway::ProxyGateway;
pub use system::SystemProxy;
