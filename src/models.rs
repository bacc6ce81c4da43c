//! These models represent the messages passed between an agent and its callers
//!
//! The same conversation exists in two shapes: a flat, incrementally-produced
//! stream of fragments (what an agent emits while generating) and a
//! structurally complete, aggregated form (what callers that want whole tool
//! calls or whole turns expect). The message union here covers both shapes;
//! the ordering and aggregate modules translate between them.

pub mod identity;
pub mod message;
pub mod tool;
