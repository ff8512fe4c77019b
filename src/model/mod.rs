//! Data model for the RAPTOR core.
//!
//! `TransitLayer` is the flattened, pre-indexed timetable consumed by the
//! rest of the crate. Everything in this module is read-only once built;
//! building it (from GTFS, shapefiles, OSM, ...) is out of scope here.

pub mod calendar;
pub mod request;
pub mod transit_layer;

pub use calendar::ServiceCalendar;
pub use request::{AccessTimes, PointSetTimes, ProfileRequest, StopTree, TargetSet};
pub use transit_layer::{FrequencyEntries, Pattern, PatternId, StopId, Transfer, TransitLayer, Trip};
