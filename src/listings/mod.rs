//! Listing orchestrator.
//! Mission: Validate, persist, and fan out events for the listing lifecycle
//! (spec §4.2). Reads compose the cache and the read assembler; writes
//! compose the database and the event bus.

pub mod completion;
pub mod orchestrator;
pub mod read_assembler;
pub mod validate;

pub use completion::FileValidationCompletionConsumer;
pub use orchestrator::{ListingOrchestrator, NewListingRequest, UpdateListingRequest};
