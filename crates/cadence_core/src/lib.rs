pub mod activity;
pub mod occurrence;
pub mod recurrence;
pub mod store;

pub use crate::activity::{
    Activity, ActivityId, ActivityPatch, ActivityStatus, Client, ClientId, NewActivity,
    Occurrence, User, UserId,
};
pub use crate::recurrence::{RecurrenceMetadata, RecurrenceType};
pub use crate::store::{ActivityStore, ClientDirectory, MemoryStore, StoreError, UserDirectory};
