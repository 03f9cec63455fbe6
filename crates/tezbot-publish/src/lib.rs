//! tezbot-publish — where governance events end up.
//!
//! | Backend            | Output                         |
//! |--------------------|--------------------------------|
//! | [`DebugPublisher`] | stdout                         |
//! | [`TwitterPublisher`] | `POST /2/tweets` on the Twitter API |
//!
//! Both render events through [`MessageFormatter`], which replaces hashes with
//! vanity names when a [`NameResolver`] knows them.

pub mod debug;
pub mod msg;
pub mod names;
pub mod twitter;

pub use debug::DebugPublisher;
pub use msg::{percent, MessageFormatter};
pub use names::{DnsTxtResolver, NameResolver, NoopResolver};
#[cfg(any(test, feature = "testing"))]
pub use names::StaticResolver;
pub use twitter::{TwitterConfig, TwitterPublisher};
