//! Record Shaping
//!
//! Turns the rows matched by a backing store into the resolver's output
//! record. Shared by every store variant.

use crate::domain::entities::{ReferenceRecord, Resolution, ResultRecord};
use crate::domain::services::RepresentativePoint;
use crate::domain::value_objects::Schema;
use std::sync::Arc;

/// Shape matched rows into a `Resolution`.
///
/// The first row supplies the output fields, minus the schema's internal
/// columns. `location` is the coordinate of the first row that has one;
/// `representative_point` aggregates the coordinates of all rows. Rows with
/// an absent coordinate are left out of both.
pub fn shape(rows: Vec<ReferenceRecord>, schema: &Schema) -> Resolution {
    let points: Vec<_> = rows.iter().filter_map(ReferenceRecord::coordinate).collect();

    let Some(primary) = rows.into_iter().next() else {
        return Resolution::NotFound;
    };

    let location = points.first().copied();
    let representative_point = RepresentativePoint::aggregate(&points);

    let fields = primary
        .into_fields()
        .into_iter()
        .filter(|(column, _)| !schema.is_internal(column))
        .collect();

    Resolution::Found(Arc::new(ResultRecord {
        fields,
        location,
        representative_point,
    }))
}
