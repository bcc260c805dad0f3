//! These models represent the objects passed around by the runtime
//!
//! There are several related formats we need to interact with:
//! - transcript messages loaded by the caller from its chat store
//! - anthropic messages/tools, sent from the agent to the LLM
//! - tool requests, sent from the agent to the tool backend
//! - turn events, streamed from the agent back to the caller
//!
//! These all overlap to varying degrees. We immediately convert external
//! data into the internal structs using to/from helpers, so the internal
//! models are not an exact match to any single wire format.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
