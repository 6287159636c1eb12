use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::{full_name, normalize_name, normalize_phone};

/// Raw observation forwarded by the browser driver.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
    /// Form fields posted by the injected capture script.
    FormSubmitted {
        fields: Map<String, Value>,
        captured_at: DateTime<Utc>,
    },
    RequestBody { url: String, body: Value },
    ResponseBody { url: String, body: Value },
}

/// Payload the capture script sends through the page binding.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePayload {
    #[serde(default)]
    pub fields: Map<String, Value>,
    pub captured_at: Option<DateTime<Utc>>,
}

/// A form submission waiting for its EMR id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmission {
    pub id: u64,
    pub captured_at: DateTime<Utc>,
    pub booking_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<String>,
    pub phone: Option<String>,
    pub sex_at_birth: Option<String>,
    pub reason_for_visit: Option<String>,
    pub fields: Map<String, Value>,
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Form inputs are named by the third-party page, so fields are matched on
/// a squashed lower-case form of their name.
fn squash(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Inputs describing someone other than the patient.
const OTHER_PARTY_MARKERS: &[&str] = &[
    "emergency",
    "guardian",
    "guarantor",
    "parent",
    "spouse",
    "nextofkin",
    "subscriber",
    "policyholder",
];

/// Exact squashed names win over fragment matches, so `firstName` is preferred
/// to `middleFirstNameInitial` regardless of field order.
fn find_field(fields: &Map<String, Value>, aliases: &[&str], fragments: &[&str]) -> Option<String> {
    let candidates: Vec<(String, &Value)> = fields
        .iter()
        .map(|(name, value)| (squash(name), value))
        .filter(|(name, _)| !OTHER_PARTY_MARKERS.iter().any(|m| name.contains(m)))
        .collect();

    candidates
        .iter()
        .filter(|(name, _)| aliases.contains(&name.as_str()))
        .find_map(|(_, value)| field_text(value))
        .or_else(|| {
            candidates
                .iter()
                .filter(|(name, _)| fragments.iter().any(|f| name.contains(f)))
                .find_map(|(_, value)| field_text(value))
        })
}

impl PendingSubmission {
    pub fn from_fields(id: u64, fields: Map<String, Value>, captured_at: DateTime<Utc>) -> Self {
        let first_name = find_field(
            &fields,
            &["firstname", "legalfirstname", "patientfirstname", "givenname", "fname"],
            &["firstname"],
        );
        let last_name = find_field(
            &fields,
            &["lastname", "legallastname", "patientlastname", "familyname", "surname", "lname"],
            &["lastname"],
        );
        let phone = find_field(
            &fields,
            &["phone", "mobilephone", "phonenumber", "mobile", "cellphone", "patientphone"],
            &["phone", "mobile"],
        );
        let dob = find_field(
            &fields,
            &["dob", "birthdate", "dateofbirth", "patientdob"],
            &["birthdate", "dateofbirth"],
        );
        let sex_at_birth = find_field(&fields, &["sex", "sexatbirth", "gender"], &["sex", "gender"]);
        let reason_for_visit = find_field(
            &fields,
            &["reason", "reasonforvisit", "visitreason", "chiefcomplaint"],
            &["reason", "complaint"],
        );
        let booking_id = find_field(&fields, &["bookingid"], &[]);

        Self {
            id,
            captured_at,
            booking_id,
            first_name,
            last_name,
            dob,
            phone,
            sex_at_birth,
            reason_for_visit,
            fields,
        }
    }

    pub fn normalized_full_name(&self) -> Option<String> {
        full_name(self.first_name.as_deref(), self.last_name.as_deref())
    }

    pub fn normalized_last_name(&self) -> Option<String> {
        self.last_name
            .as_deref()
            .map(normalize_name)
            .filter(|n| !n.is_empty())
    }

    pub fn normalized_phone(&self) -> Option<String> {
        self.phone.as_deref().and_then(normalize_phone)
    }
}

/// How a pending submission was tied to an EMR id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    BookingId,
    NameAndPhone,
    PhoneAndLastName,
}

/// Output of the correlator, consumed by the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    PendingCaptured(PendingSubmission),
    PatientIdentified {
        submission: PendingSubmission,
        emr_id: String,
        booking_id: Option<String>,
        matched_by: MatchKind,
    },
    StatusChanged {
        emr_id: String,
        booking_id: Option<String>,
        status: String,
    },
}
