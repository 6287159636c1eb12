//! Pulls patient-shaped records out of arbitrary JSON seen on the wire.

use serde_json::{Map, Value};

const EMR_KEYS: &[&str] = &["emrId", "emr_id", "emrID", "EMRId", "patientEmrId"];
const BOOKING_KEYS: &[&str] = &["bookingId", "booking_id", "bookingID", "BookingId"];
const FIRST_NAME_KEYS: &[&str] = &["firstName", "first_name", "legalFirstName", "legal_first_name", "givenName"];
const LAST_NAME_KEYS: &[&str] = &["lastName", "last_name", "legalLastName", "legal_last_name", "familyName"];
const FULL_NAME_KEYS: &[&str] = &["fullName", "full_name", "patientName", "name"];
const PHONE_KEYS: &[&str] = &["mobilePhone", "mobile_phone", "phone", "phoneNumber", "phone_number", "cellPhone"];
const STATUS_KEYS: &[&str] = &["status", "bookingStatus", "booking_status", "visitStatus", "appointmentStatus"];

/// A record observed in a request or response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedRecord {
    pub emr_id: Option<String>,
    pub booking_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
}

impl ObservedRecord {
    fn has_details(&self) -> bool {
        self.first_name.is_some()
            || self.last_name.is_some()
            || self.full_name.is_some()
            || self.phone.is_some()
            || self.status.is_some()
    }

    /// Fills gaps from a nested object, e.g. an appointment's `patient`.
    fn absorb(&mut self, other: ObservedRecord) {
        self.emr_id = self.emr_id.take().or(other.emr_id);
        self.first_name = self.first_name.take().or(other.first_name);
        self.last_name = self.last_name.take().or(other.last_name);
        self.full_name = self.full_name.take().or(other.full_name);
        self.phone = self.phone.take().or(other.phone);
    }
}

/// Scalar value as text; numbers are accepted because some endpoints send ids unquoted.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| object.get(*key).and_then(text))
}

fn read_object(object: &Map<String, Value>) -> ObservedRecord {
    ObservedRecord {
        emr_id: first_text(object, EMR_KEYS),
        booking_id: first_text(object, BOOKING_KEYS),
        first_name: first_text(object, FIRST_NAME_KEYS),
        last_name: first_text(object, LAST_NAME_KEYS),
        full_name: first_text(object, FULL_NAME_KEYS),
        phone: first_text(object, PHONE_KEYS),
        status: first_text(object, STATUS_KEYS),
    }
}

fn walk(value: &Value, out: &mut Vec<ObservedRecord>) {
    match value {
        Value::Object(object) => {
            let mut record = read_object(object);

            if record.booking_id.is_some() && record.emr_id.is_none() {
                for child in object.values() {
                    if let Value::Object(nested) = child {
                        let nested = read_object(nested);
                        if nested.emr_id.is_some() && nested.booking_id.is_none() {
                            record.absorb(nested);
                            break;
                        }
                    }
                }
            }

            let keep = record.emr_id.is_some() || (record.booking_id.is_some() && record.has_details());
            if keep {
                out.push(record);
            }

            for child in object.values() {
                walk(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        _ => {}
    }
}

/// Every object in `value` that carries an EMR id, or a booking id together
/// with a name, phone or status. Parents are listed before their children.
pub fn extract_records(value: &Value) -> Vec<ObservedRecord> {
    let mut out = Vec::new();
    walk(value, &mut out);
    out
}
