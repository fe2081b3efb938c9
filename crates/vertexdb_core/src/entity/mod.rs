//! Entity store: CRUD, batch, list, and range-query operations.

mod engine;
mod payload;

pub use engine::{
    BatchCreateRequest, BatchEntriesRequest, BatchReadRequest, BatchRemoveRequest,
    CreateQueryRequest, EntityEngine, ListQueryRequest, RangePredicate, ReadQueryRequest,
    RemoveQueryRequest, UpdateQueryRequest,
};
pub use payload::{entity_id, merge, scalar_to_string, with_id, Entity};
