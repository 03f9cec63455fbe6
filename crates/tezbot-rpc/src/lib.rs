//! tezbot-rpc — HTTP access to a Tezos node.
//!
//! [`TezosRpcClient`] implements [`tezbot_core::ChainService`] over the node's
//! REST RPC. One-shot calls retry transient failures with [`RetryPolicy`];
//! the head monitor is a plain stream and leaves reconnection to the caller.

pub mod client;
pub mod retry;

pub use client::{RpcClientConfig, TezosRpcClient};
pub use retry::{RetryConfig, RetryPolicy, Verdict};
