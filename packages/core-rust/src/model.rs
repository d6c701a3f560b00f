//! Canonical business entities.
//!
//! The shapes callers receive regardless of which backend stores the data.
//! Adapters project backend rows into these via mapping-document lookups;
//! nothing here knows about any physical schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical entity names used as mapping-path prefixes.
pub mod entity_names {
    pub const CUSTOMER: &str = "Customer";
    pub const VEHICLE: &str = "Vehicle";
    pub const INVOICE: &str = "Invoice";
    pub const APPOINTMENT: &str = "Appointment";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub customer_id: String,
    pub vin: Option<String>,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub license_plate: Option<String>,
}

/// Invoice lifecycle states shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Voided,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub customer_id: String,
    pub vehicle_id: Option<String>,
    pub number: String,
    pub status: InvoiceStatus,
    /// Totals are carried in minor currency units to avoid float drift
    /// across backends that disagree on decimal precision.
    pub total_cents: i64,
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub customer_id: String,
    pub vehicle_id: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}
