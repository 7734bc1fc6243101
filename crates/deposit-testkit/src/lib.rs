//! Test doubles shared by `deposit-core`'s unit, integration, and property
//! tests: an etag-checked in-memory [`MetadataStore`](deposit_collaborators::MetadataStore),
//! and scripted [`Assembler`](deposit_collaborators::Assembler)/[`Transport`](deposit_collaborators::Transport)/
//! [`MessageBus`](deposit_collaborators::MessageBus) doubles.
//!
//! Kept as its own crate, rather than `#[cfg(test)]` modules inside
//! `deposit-core`, so the end-to-end scenario tests in `deposit-core/tests/`
//! can depend on it as an ordinary dev-dependency.

pub mod doubles;
pub mod store;

pub use doubles::{
    FailingAssembler, FailingSubmissionBuilder, FakeAssembler, FakeMessageBus, FakeSubmissionBuilder, ScriptedSend,
    ScriptedTransport, TransportCounters,
};
pub use store::InMemoryStore;
