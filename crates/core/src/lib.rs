pub mod config;
pub mod errors;
pub mod projection;
pub mod roster;
pub mod store;

pub use errors::{InterfaceError, RosterError};
pub use projection::{
    BoundParty, MessageHandle, Projection, ThreadBinding, ThreadId, ThreadTracker, TrackerError,
};
pub use roster::claim::{ClaimEngine, ClaimError, ClaimReceipt};
pub use roster::codec::CodecError;
pub use roster::reader::read_roster;
pub use roster::{PartyBlock, Roster, SlotRecord};
pub use store::{
    CellRange, CellRef, Grid, InMemoryTabularStore, RosterSource, StoreError, TabularStore,
};
