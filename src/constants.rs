//! Constants for the Homberger instance grammar and output layout.
//!
//! Centralises section labels, field shapes, column names, and default
//! limits so the parser, writer, and CLI agree on a single definition.

// =============================================================================
// Instance Grammar
// =============================================================================

/// Section label that opens the vehicle section
pub const VEHICLE_SECTION_LABEL: &str = "VEHICLE";

/// Section label that opens the customer section
pub const CUSTOMER_SECTION_LABEL: &str = "CUSTOMER";

/// Column caption printed above the vehicle line
pub const VEHICLE_COLUMNS_LABEL: &str = "NUMBER CAPACITY";

/// Column caption printed above the customer records.
/// Compared after collapsing whitespace and upper-casing.
pub const CUSTOMER_COLUMNS_LABEL: &str =
    "CUST NO. XCOORD. YCOORD. DEMAND READY TIME DUE DATE SERVICE TIME";

/// Header key declaring the number of customers (depot excluded)
pub const DECLARED_COUNT_KEY: &str = "CUSTOMERS";

/// Number of tokens on the vehicle line: `vehicle_count vehicle_capacity`
pub const VEHICLE_FIELD_COUNT: usize = 2;

/// Field names of the vehicle line in positional order
pub const VEHICLE_FIELDS: [&str; VEHICLE_FIELD_COUNT] = ["vehicle_count", "vehicle_capacity"];

/// Number of tokens on a customer record
pub const CUSTOMER_FIELD_COUNT: usize = 7;

/// Identifier the depot always carries in canonical form
pub const DEPOT_ID: i64 = 0;

// =============================================================================
// Output Schema
// =============================================================================

/// Column names of the customer table, in output order
pub const CUSTOMER_COLUMNS: [&str; CUSTOMER_FIELD_COUNT] = [
    "id",
    "x",
    "y",
    "demand",
    "ready_time",
    "due_time",
    "service_time",
];

/// Infix between the instance name and the tabular extension
pub const CUSTOMERS_ARTIFACT_INFIX: &str = "customers";

/// Suffix of the parameters record
pub const PARAMS_ARTIFACT_SUFFIX: &str = "params.json";

// =============================================================================
// Discovery and Processing Defaults
// =============================================================================

/// Default instance file pattern: the C, R and RC families of both horizons.
/// Matched case-insensitively against the whole entry basename.
pub const DEFAULT_INSTANCE_PATTERN: &str = r"(c|r|rc)[12].*\.txt";

/// Default output directory for artifact pairs
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Largest instance entry read into memory (64 MiB)
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

/// Default number of extra attempts for a failed artifact write
pub const DEFAULT_WRITE_RETRIES: usize = 2;

/// Default base delay between write attempts
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;

/// Headroom factor applied to the demand-based fleet estimate
pub const FLEET_ESTIMATE_FACTOR: f64 = 1.2;

/// Exit code used when the run was cancelled by the user
pub const EXIT_CANCELLED: i32 = 130;
