//! Homberger instance grammar parsing.
//!
//! Parses the positional, line-oriented instance format: an optional header
//! (title and declared customer count), one vehicle line
//! `vehicle_count vehicle_capacity`, then one seven-field record per customer
//! with the depot first. Only syntax is checked here; cross-record rules
//! belong to the validator.

use crate::constants::{
    CUSTOMER_COLUMNS, CUSTOMER_COLUMNS_LABEL, CUSTOMER_FIELD_COUNT, CUSTOMER_SECTION_LABEL,
    DECLARED_COUNT_KEY, DEPOT_ID, VEHICLE_COLUMNS_LABEL, VEHICLE_FIELD_COUNT, VEHICLE_FIELDS,
    VEHICLE_SECTION_LABEL,
};
use crate::models::{Customer, Instance, RawBlob};
use thiserror::Error;
use tracing::{debug, warn};

/// Syntax defect in an instance file. Line numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: expected {expected} fields ({shape}), found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
        shape: &'static str,
    },

    #[error("line {line}: field '{field}' expected {kind}, found '{token}'")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        kind: &'static str,
        token: String,
    },

    #[error("line {line}: unexpected section label '{label}'")]
    UnexpectedLabel { line: usize, label: String },

    #[error("line {line}: unexpected second vehicle line")]
    DuplicateVehicleLine { line: usize },

    #[error("line {line}: customer record found before the vehicle line")]
    MissingVehicleLine { line: usize },

    #[error("line {line}: no depot record found")]
    MissingDepot { line: usize },
}

impl ParseError {
    /// Line the defect was found on
    pub fn line(&self) -> usize {
        match self {
            ParseError::FieldCount { line, .. }
            | ParseError::InvalidNumber { line, .. }
            | ParseError::UnexpectedLabel { line, .. }
            | ParseError::DuplicateVehicleLine { line }
            | ParseError::MissingVehicleLine { line }
            | ParseError::MissingDepot { line } => *line,
        }
    }
}

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Recognised label lines, compared after whitespace collapsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Vehicle,
    VehicleColumns,
    Customer,
    CustomerColumns,
}

impl Label {
    fn recognise(normalised: &str) -> Option<Self> {
        match normalised {
            VEHICLE_SECTION_LABEL => Some(Label::Vehicle),
            VEHICLE_COLUMNS_LABEL => Some(Label::VehicleColumns),
            CUSTOMER_SECTION_LABEL => Some(Label::Customer),
            CUSTOMER_COLUMNS_LABEL => Some(Label::CustomerColumns),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Vehicle,
    Customers,
}

/// Parse one raw blob into an unchecked instance
pub fn parse_instance(blob: &RawBlob) -> ParseResult<Instance> {
    let mut builder = InstanceBuilder::new(blob.instance_name());
    let mut section = Section::Header;

    for (index, raw_line) in blob.lines.iter().enumerate() {
        let line_num = index + 1;
        let line = raw_line.trim();

        if line.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let normalised = tokens.join(" ").to_ascii_uppercase();

        if let Some(label) = Label::recognise(&normalised) {
            section = builder.enter_label(label, section, line_num, line)?;
            continue;
        }

        section = match section {
            Section::Header => {
                if is_numeric_line(&tokens) {
                    // Files without section labels start the vehicle line right after the header
                    builder.parse_vehicle_line(&tokens, line_num)?;
                    Section::Customers
                } else {
                    builder.parse_header_line(line, line_num)?;
                    Section::Header
                }
            }
            Section::Vehicle => {
                builder.parse_vehicle_line(&tokens, line_num)?;
                Section::Customers
            }
            Section::Customers => {
                if builder.vehicle.is_none() {
                    return Err(ParseError::MissingVehicleLine { line: line_num });
                }
                builder.parse_customer_line(&tokens, line_num)?;
                Section::Customers
            }
        };
    }

    builder.build(blob.lines.len())
}

/// Accumulates parsed sections until the whole blob has been consumed
struct InstanceBuilder {
    name: String,
    title: Option<String>,
    declared_customers: Option<usize>,
    vehicle: Option<(i64, i64)>,
    records: Vec<Customer>,
}

impl InstanceBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            title: None,
            declared_customers: None,
            vehicle: None,
            records: Vec::new(),
        }
    }

    fn enter_label(
        &self,
        label: Label,
        current: Section,
        line_num: usize,
        line: &str,
    ) -> ParseResult<Section> {
        match (label, current) {
            (Label::Vehicle, Section::Header) => Ok(Section::Vehicle),
            (Label::VehicleColumns, Section::Header | Section::Vehicle) => Ok(Section::Vehicle),
            (Label::Customer | Label::CustomerColumns, _) if self.vehicle.is_some() => {
                Ok(Section::Customers)
            }
            (Label::Customer | Label::CustomerColumns, _) => {
                Err(ParseError::MissingVehicleLine { line: line_num })
            }
            _ => Err(ParseError::UnexpectedLabel {
                line: line_num,
                label: line.to_string(),
            }),
        }
    }

    /// Header text is informational; `CUSTOMERS: <n>` declares the count
    fn parse_header_line(&mut self, line: &str, line_num: usize) -> ParseResult<()> {
        if let Some((key, value)) = line.split_once([':', '=']) {
            if key.trim().eq_ignore_ascii_case(DECLARED_COUNT_KEY) {
                let value = value.trim();
                let count = value
                    .parse::<usize>()
                    .map_err(|_| ParseError::InvalidNumber {
                        line: line_num,
                        field: "customer_count",
                        kind: "non-negative integer",
                        token: value.to_string(),
                    })?;
                self.declared_customers = Some(count);
                return Ok(());
            }
        }

        if self.title.is_none() {
            self.title = Some(line.to_string());
        }
        Ok(())
    }

    fn parse_vehicle_line(&mut self, tokens: &[&str], line_num: usize) -> ParseResult<()> {
        if self.vehicle.is_some() {
            return Err(ParseError::DuplicateVehicleLine { line: line_num });
        }

        if tokens.len() != VEHICLE_FIELD_COUNT {
            return Err(ParseError::FieldCount {
                line: line_num,
                expected: VEHICLE_FIELD_COUNT,
                found: tokens.len(),
                shape: "vehicle_count vehicle_capacity",
            });
        }

        let count = parse_integer(tokens[0], VEHICLE_FIELDS[0], line_num)?;
        let capacity = parse_integer(tokens[1], VEHICLE_FIELDS[1], line_num)?;
        self.vehicle = Some((count, capacity));
        Ok(())
    }

    fn parse_customer_line(&mut self, tokens: &[&str], line_num: usize) -> ParseResult<()> {
        if tokens.len() != CUSTOMER_FIELD_COUNT {
            return Err(ParseError::FieldCount {
                line: line_num,
                expected: CUSTOMER_FIELD_COUNT,
                found: tokens.len(),
                shape: "id x y demand ready_time due_time service_time",
            });
        }

        let [id, x, y, demand, ready_time, due_time, service_time] = CUSTOMER_COLUMNS;
        self.records.push(Customer {
            id: parse_integer(tokens[0], id, line_num)?,
            x: parse_float(tokens[1], x, line_num)?,
            y: parse_float(tokens[2], y, line_num)?,
            demand: parse_integer(tokens[3], demand, line_num)?,
            ready_time: parse_integer(tokens[4], ready_time, line_num)?,
            due_time: parse_integer(tokens[5], due_time, line_num)?,
            service_time: parse_integer(tokens[6], service_time, line_num)?,
        });
        Ok(())
    }

    fn build(self, total_lines: usize) -> ParseResult<Instance> {
        let end_line = total_lines.max(1);
        let (vehicle_count, vehicle_capacity) = self
            .vehicle
            .ok_or(ParseError::MissingVehicleLine { line: end_line })?;

        let mut records = self.records.into_iter();
        let mut depot = records
            .next()
            .ok_or(ParseError::MissingDepot { line: end_line })?;

        if depot.id != DEPOT_ID {
            warn!(
                "Instance {}: first record has id {}, assigning depot id {}",
                self.name, depot.id, DEPOT_ID
            );
            depot.id = DEPOT_ID;
        }

        let customers: Vec<Customer> = records.collect();
        debug!(
            "Parsed instance {}: {} vehicles of capacity {}, {} customers",
            self.name,
            vehicle_count,
            vehicle_capacity,
            customers.len()
        );

        Ok(Instance {
            name: self.name,
            title: self.title,
            declared_customers: self.declared_customers,
            vehicle_count,
            vehicle_capacity,
            depot,
            customers,
        })
    }
}

fn is_numeric_line(tokens: &[&str]) -> bool {
    !tokens.is_empty()
        && tokens
            .iter()
            .all(|t| t.parse::<f64>().is_ok_and(f64::is_finite))
}

fn parse_integer(token: &str, field: &'static str, line: usize) -> ParseResult<i64> {
    token.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
        line,
        field,
        kind: "integer",
        token: token.to_string(),
    })
}

fn parse_float(token: &str, field: &'static str, line: usize) -> ParseResult<f64> {
    token.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        line,
        field,
        kind: "number",
        token: token.to_string(),
    })
}
