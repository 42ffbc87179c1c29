//! Semantic validation of parsed instances.
//!
//! Checks the cross-field invariants the grammar cannot express: fleet
//! sizes, declared counts, unique identifiers, time windows inside the
//! depot horizon, per-customer demand against capacity, and finite
//! coordinates. Validation is exhaustive: every defect found in one pass is
//! reported together.

use crate::error::{ConvertError, Result};
use crate::models::{Customer, Instance, ValidInstance};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// One violated instance invariant
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationDefect {
    #[error("positive-fleet: vehicle_count must be > 0, found {value}")]
    NonPositiveVehicleCount { value: i64 },

    #[error("positive-fleet: vehicle_capacity must be > 0, found {value}")]
    NonPositiveCapacity { value: i64 },

    #[error("declared-count: header declares {declared} customers, file has {actual}")]
    CustomerCountMismatch { declared: usize, actual: usize },

    #[error("unique-id: id {id} appears more than once")]
    DuplicateId { id: i64 },

    #[error("non-negative: id {id} has negative {field} {value}")]
    NegativeValue {
        id: i64,
        field: &'static str,
        value: i64,
    },

    #[error("time-window: id {id} has ready_time {ready_time} > due_time {due_time}")]
    InvalidTimeWindow {
        id: i64,
        ready_time: i64,
        due_time: i64,
    },

    #[error("depot-horizon: id {id} has due_time {due_time} beyond depot due_time {horizon}")]
    OutsideHorizon { id: i64, due_time: i64, horizon: i64 },

    #[error("capacity: id {id} has demand {demand} above vehicle_capacity {capacity}")]
    DemandExceedsCapacity { id: i64, demand: i64, capacity: i64 },

    #[error("finite-coordinates: id {id} has non-finite {field} {value}")]
    NonFiniteCoordinate {
        id: i64,
        field: &'static str,
        value: f64,
    },
}

impl ValidationDefect {
    /// Customer id the defect refers to, if it is about a single record
    pub fn customer_id(&self) -> Option<i64> {
        match self {
            ValidationDefect::DuplicateId { id }
            | ValidationDefect::NegativeValue { id, .. }
            | ValidationDefect::InvalidTimeWindow { id, .. }
            | ValidationDefect::OutsideHorizon { id, .. }
            | ValidationDefect::DemandExceedsCapacity { id, .. }
            | ValidationDefect::NonFiniteCoordinate { id, .. } => Some(*id),
            ValidationDefect::NonPositiveVehicleCount { .. }
            | ValidationDefect::NonPositiveCapacity { .. }
            | ValidationDefect::CustomerCountMismatch { .. } => None,
        }
    }
}

/// Collect every defect of an instance, in a stable order: fleet, declared
/// count, then records in file order with the depot first.
pub fn find_defects(instance: &Instance) -> Vec<ValidationDefect> {
    let mut defects = Vec::new();

    if instance.vehicle_count <= 0 {
        defects.push(ValidationDefect::NonPositiveVehicleCount {
            value: instance.vehicle_count,
        });
    }
    if instance.vehicle_capacity <= 0 {
        defects.push(ValidationDefect::NonPositiveCapacity {
            value: instance.vehicle_capacity,
        });
    }

    if let Some(declared) = instance.declared_customers {
        if declared != instance.customers.len() {
            defects.push(ValidationDefect::CustomerCountMismatch {
                declared,
                actual: instance.customers.len(),
            });
        }
    }

    let horizon = instance.depot.due_time;
    let mut seen = HashSet::new();
    let mut reported_duplicates = HashSet::new();

    for (position, customer) in instance.all_customers().enumerate() {
        let is_depot = position == 0;

        if !seen.insert(customer.id) && reported_duplicates.insert(customer.id) {
            defects.push(ValidationDefect::DuplicateId { id: customer.id });
        }

        check_record(customer, &mut defects);

        if !is_depot && customer.due_time > horizon {
            defects.push(ValidationDefect::OutsideHorizon {
                id: customer.id,
                due_time: customer.due_time,
                horizon,
            });
        }

        if instance.vehicle_capacity > 0 && customer.demand > instance.vehicle_capacity {
            defects.push(ValidationDefect::DemandExceedsCapacity {
                id: customer.id,
                demand: customer.demand,
                capacity: instance.vehicle_capacity,
            });
        }
    }

    defects
}

/// Validate an instance, handing it back unchanged on success
pub fn validate_instance(instance: Instance) -> Result<ValidInstance> {
    let defects = find_defects(&instance);

    if defects.is_empty() {
        debug!("Instance {} passed validation", instance.name);
        Ok(ValidInstance::new_unchecked(instance))
    } else {
        debug!(
            "Instance {} failed validation with {} defect(s)",
            instance.name,
            defects.len()
        );
        Err(ConvertError::Validation {
            name: instance.name,
            defects,
        })
    }
}

/// Per-record checks that do not depend on other records
fn check_record(customer: &Customer, defects: &mut Vec<ValidationDefect>) {
    for (field, value) in [
        ("id", customer.id),
        ("demand", customer.demand),
        ("ready_time", customer.ready_time),
        ("due_time", customer.due_time),
        ("service_time", customer.service_time),
    ] {
        if value < 0 {
            defects.push(ValidationDefect::NegativeValue {
                id: customer.id,
                field,
                value,
            });
        }
    }

    if customer.ready_time > customer.due_time {
        defects.push(ValidationDefect::InvalidTimeWindow {
            id: customer.id,
            ready_time: customer.ready_time,
            due_time: customer.due_time,
        });
    }

    for (field, value) in [("x", customer.x), ("y", customer.y)] {
        if !value.is_finite() {
            defects.push(ValidationDefect::NonFiniteCoordinate {
                id: customer.id,
                field,
                value,
            });
        }
    }
}
