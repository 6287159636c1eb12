//! Ties form submissions to the EMR ids that show up later in network
//! traffic, and tracks booking statuses for identified patients.
//!
//! The correlator is synchronous and takes the current time as an argument,
//! so it can be driven deterministically from tests.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::events::{MatchKind, MonitorEvent, PendingSubmission};
use crate::extract::{extract_records, ObservedRecord};
use crate::normalize::{full_name, normalize_name, normalize_phone};

/// Booking mappings and delivered statuses are kept at least this long after
/// they were last seen.
const MAPPING_RETENTION_HOURS: i64 = 12;

pub struct Correlator {
    ttl: Duration,
    next_id: u64,
    /// Unmatched submissions, oldest first.
    pending: Vec<PendingSubmission>,
    /// Booking id -> (EMR id, last seen).
    booking_to_emr: HashMap<String, (String, DateTime<Utc>)>,
    /// EMR id -> (last reported status, last seen).
    last_status: HashMap<String, (String, DateTime<Utc>)>,
    /// Statuses seen for bookings whose EMR id is not known yet.
    parked_status: HashMap<String, (String, DateTime<Utc>)>,
}

impl Correlator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_id: 1,
            pending: Vec::new(),
            booking_to_emr: HashMap::new(),
            last_status: HashMap::new(),
            parked_status: HashMap::new(),
        }
    }

    pub fn pending(&self) -> &[PendingSubmission] {
        &self.pending
    }

    pub fn emr_for_booking(&self, booking_id: &str) -> Option<&str> {
        self.booking_to_emr.get(booking_id).map(|(emr_id, _)| emr_id.as_str())
    }

    pub fn record_submission(&mut self, fields: Map<String, Value>, captured_at: DateTime<Utc>) -> Vec<MonitorEvent> {
        let submission = PendingSubmission::from_fields(self.next_id, fields, captured_at);
        self.next_id += 1;
        debug!("Captured submission {}", submission.id);

        self.pending.push(submission.clone());
        vec![MonitorEvent::PendingCaptured(submission)]
    }

    pub fn observe_payload(&mut self, payload: &Value, now: DateTime<Utc>) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        for record in extract_records(payload) {
            self.observe_record(record, now, &mut events);
        }
        events
    }

    fn observe_record(&mut self, record: ObservedRecord, now: DateTime<Utc>, events: &mut Vec<MonitorEvent>) {
        // Bookings known to belong to the record's patient after this record.
        let mut linked_bookings = Vec::new();

        if let (Some(emr_id), Some(booking_id)) = (&record.emr_id, &record.booking_id) {
            self.booking_to_emr.insert(booking_id.clone(), (emr_id.clone(), now));
            linked_bookings.push(booking_id.clone());
        }

        if let Some(emr_id) = record.emr_id.clone() {
            if let Some((index, matched_by)) = self.find_match(&record) {
                let submission = self.pending.remove(index);
                debug!("Submission {} identified as {} by {:?}", submission.id, emr_id, matched_by);

                if let Some(booking_id) = &submission.booking_id {
                    if !linked_bookings.contains(booking_id) {
                        self.booking_to_emr.insert(booking_id.clone(), (emr_id.clone(), now));
                        linked_bookings.push(booking_id.clone());
                    }
                }

                events.push(MonitorEvent::PatientIdentified {
                    booking_id: record.booking_id.clone().or_else(|| submission.booking_id.clone()),
                    submission,
                    emr_id,
                    matched_by,
                });
            }
        }

        let emr_id = record.emr_id.clone().or_else(|| {
            let booking_id = record.booking_id.as_deref()?;
            let (emr_id, seen) = self.booking_to_emr.get_mut(booking_id)?;
            *seen = now;
            Some(emr_id.clone())
        });

        match (emr_id, record.status.as_deref()) {
            (Some(emr_id), Some(status)) => {
                // The observed status supersedes anything parked for the patient.
                for booking_id in linked_bookings.iter().chain(record.booking_id.iter()) {
                    self.parked_status.remove(booking_id);
                }
                self.propagate_status(emr_id, record.booking_id.clone(), status, now, events);
            }
            (Some(emr_id), None) => {
                for booking_id in linked_bookings {
                    if let Some((status, _)) = self.parked_status.remove(&booking_id) {
                        self.propagate_status(emr_id.clone(), Some(booking_id), &status, now, events);
                    }
                }
            }
            (None, Some(status)) => {
                if let Some(booking_id) = &record.booking_id {
                    debug!("Parking status {} for unmapped booking {}", status, booking_id);
                    self.parked_status.insert(booking_id.clone(), (status.to_string(), now));
                }
            }
            (None, None) => {}
        }
    }

    fn propagate_status(
        &mut self,
        emr_id: String,
        booking_id: Option<String>,
        status: &str,
        now: DateTime<Utc>,
        events: &mut Vec<MonitorEvent>,
    ) {
        let status = status.trim().to_ascii_uppercase();
        if status.is_empty() {
            return;
        }
        if let Some((last, seen)) = self.last_status.get_mut(&emr_id) {
            if *last == status {
                *seen = now;
                return;
            }
        }

        self.last_status.insert(emr_id.clone(), (status.clone(), now));
        events.push(MonitorEvent::StatusChanged {
            emr_id,
            booking_id,
            status,
        });
    }

    /// Drops the remembered status of a patient when it is still `status`, so
    /// the next observation of it is reported again.
    pub fn forget_status(&mut self, emr_id: &str, status: &str) {
        if self.last_status.get(emr_id).is_some_and(|(last, _)| last == status) {
            self.last_status.remove(emr_id);
        }
    }

    /// Oldest pending submission matching the record: booking id first, then
    /// full name with compatible phones, then phone plus last name.
    fn find_match(&self, record: &ObservedRecord) -> Option<(usize, MatchKind)> {
        if let Some(booking_id) = &record.booking_id {
            let found = self
                .pending
                .iter()
                .position(|p| p.booking_id.as_ref() == Some(booking_id));
            if let Some(index) = found {
                return Some((index, MatchKind::BookingId));
            }
        }

        let observed_name = full_name(record.first_name.as_deref(), record.last_name.as_deref())
            .or_else(|| record.full_name.as_deref().map(normalize_name).filter(|n| !n.is_empty()));
        let observed_phone = record.phone.as_deref().and_then(normalize_phone);
        let observed_last = record
            .last_name
            .as_deref()
            .map(normalize_name)
            .filter(|n| !n.is_empty());

        if let Some(name) = &observed_name {
            let found = self.pending.iter().position(|p| {
                let phones_agree = match (&observed_phone, p.normalized_phone()) {
                    (Some(a), Some(b)) => *a == b,
                    _ => true,
                };
                p.normalized_full_name().as_ref() == Some(name) && phones_agree
            });
            if let Some(index) = found {
                return Some((index, MatchKind::NameAndPhone));
            }
        }

        if let (Some(phone), Some(last)) = (&observed_phone, &observed_last) {
            let found = self.pending.iter().position(|p| {
                p.normalized_phone().as_ref() == Some(phone) && p.normalized_last_name().as_ref() == Some(last)
            });
            if let Some(index) = found {
                return Some((index, MatchKind::PhoneAndLastName));
            }
        }

        None
    }

    /// Drops submissions captured more than the TTL before `now`, along with
    /// parked statuses of the same age and mappings unused for the retention
    /// window.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<PendingSubmission> {
        let cutoff = now - self.ttl;
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| p.captured_at < cutoff);
        self.pending = kept;

        self.parked_status.retain(|_, (_, seen)| *seen >= cutoff);

        let retention_cutoff = now - self.ttl.max(Duration::hours(MAPPING_RETENTION_HOURS));
        self.booking_to_emr.retain(|_, (_, seen)| *seen >= retention_cutoff);
        self.last_status.retain(|_, (_, seen)| *seen >= retention_cutoff);

        expired
    }
}
