//! Dispatch domain models.
//!
//! Provides the core data types of the dispatcher: the linear stop
//! topology, ride requests and the vehicle.
//!
//! # Domain Mappings
//!
//! | shuttle-dispatch | Rail shuttle | Elevator | Ambulance line |
//! |------------------|--------------|----------|----------------|
//! | Stop | Station | Floor | Depot/Hospital |
//! | Request | Passenger | Call | Transfer |
//! | Emergency | Priority passenger | Fire service call | Critical patient |
//! | Vehicle | Train | Car | Ambulance |

mod request;
mod topology;
mod vehicle;

pub use request::{Priority, Request, RequestId, RequestKind, RequestSpec, RequestState, Tick};
pub use topology::{StopId, Topology};
pub use vehicle::Vehicle;
