//! Core transit routing engine: RAPTOR extended with frequency-based
//! Monte-Carlo sampling and range-RAPTOR sweeps over a departure-time
//! window, terminating in propagation to off-network target points.
//!
//! Ingestion (GTFS/OSM/shapefile parsing), street-network routing, job
//! scheduling, and persistence are all out of scope: this crate consumes
//! an already-built [`model::TransitLayer`] and produces per-iteration,
//! per-target arrival-time rows via a caller-supplied
//! [`propagation::PropagatedTimesStore`].

pub mod error;
pub mod frequency;
pub mod model;
pub mod propagation;
pub mod round;
pub mod state;
pub mod sweep;
pub mod time;

pub mod prelude {
    pub use crate::error::RaptorError;
    pub use crate::frequency::{BoardingAssumption, FrequencyOffsets};
    pub use crate::model::{
        AccessTimes, PointSetTimes, ProfileRequest, ServiceCalendar, StopTree, TargetSet, TransitLayer,
    };
    pub use crate::propagation::{MatrixStore, PropagatedTimesStore};
    pub use crate::state::RaptorState;
    pub use crate::sweep::{run_many_parallel, SweepDriver, SweepStats};
    pub use crate::time::{Time, UNREACHED};
}
