// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication for the Switchboard Request Router.
//!
//! The credential resolver tries bearer JWT, static API keys, and trusted
//! upstream proxy headers in order; the signature module verifies the chat
//! surface's HMAC-signed payloads.

pub mod jwt;
pub mod resolver;
pub mod signature;

pub use jwt::{AuthMethod, Identity, JwtValidator};
pub use resolver::{CredentialResolver, ProxyHeaders};
pub use signature::{verify_chat_signature, verify_chat_signature_at};
