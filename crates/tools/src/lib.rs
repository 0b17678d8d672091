//! Remote tools for Memoria.
//!
//! Memoria has no local tools. Everything the model can call lives behind an
//! MCP tool gateway that requires an OAuth2 client-credentials token:
//! - [`auth`]: token exchange and the process-wide token cache
//! - [`gateway`]: the JSON-RPC client, per-turn [`McpSession`]s and the proxy [`GatewayTool`]

pub mod auth;
pub mod gateway;

pub use auth::{
    ClientCredentials, ClientCredentialsExchange, CredentialExchange, IssuedToken, TokenCache,
};
pub use gateway::{
    CallOutcome, GatewayTool, McpGateway, McpSession, RemoteToolSpec, register_gateway_tools,
};
