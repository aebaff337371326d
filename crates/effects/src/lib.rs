//! `effects` crate: the collaborator ports the action executor delegates to.
//!
//! Every side effect a recipe action can cause (mail, work items, chat,
//! entity mutations, payables) goes through one of the traits in [`traits`].
//! The engine crate only ever sees these trait objects.

pub mod error;
pub mod traits;
pub mod requests;
pub mod memory;

pub use error::EffectError;
pub use requests::{
    ChatMessage, EmailMessage, EntityRef, NewTask, NewWorkItem, PaymentRequest, Priority,
    WorkItemOutcome,
};
pub use traits::{
    ChatNotifier, Effects, EntityStore, ExecutionContext, Mailer, PaymentRequests, WorkItemStore,
};
