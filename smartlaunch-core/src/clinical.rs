//! Clinical summary shaping
//!
//! Turns raw FHIR JSON (Patient resource, searchset Bundles) into the small
//! display structures the dashboard renders. Everything here is pure.

use serde::Serialize;
use serde_json::{Number, Value};

/// Observation `code.text` values shown on the dashboard. Exact match.
pub const ALLOWED_OBSERVATIONS: &[&str] = &[
    "Body Weight",
    "Systolic Blood Pressure",
    "Diastolic Blood Pressure",
    "Heart rate",
];

const MISSING: &str = "?";

/// Patient display data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
    pub name: String,
}

impl PatientSummary {
    /// `"<first given> <family>"` from the first `name` entry, `?` for gaps.
    pub fn from_patient(patient: &Value) -> Self {
        let name = patient
            .get("name")
            .and_then(|n| n.as_array())
            .and_then(|names| names.first());

        let given = name
            .and_then(|n| n.get("given"))
            .and_then(|g| g.as_array())
            .and_then(|g| g.first())
            .and_then(|g| g.as_str())
            .unwrap_or(MISSING);

        let family = name
            .and_then(|n| n.get("family"))
            .and_then(|f| f.as_str())
            .unwrap_or(MISSING);

        Self {
            name: format!("{} {}", given, family),
        }
    }
}

/// Table row for an observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationEntry {
    pub label: String,
    pub value: String,
}

/// Chart data point for an observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub num: Number,
    pub time: String,
}

/// Allow-listed vital signs from an Observation bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VitalSigns {
    pub observations: Vec<ObservationEntry>,
    pub chart: Vec<ChartPoint>,
}

/// Iterate `entry[].resource` of a searchset bundle. Missing `entry` is empty.
pub fn bundle_resources(bundle: &Value) -> impl Iterator<Item = &Value> {
    bundle
        .get("entry")
        .and_then(|e| e.as_array())
        .map(|entries| entries.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| entry.get("resource"))
}

/// Collect `<field>.text` from every bundle resource, sorted ascending.
fn sorted_texts(bundle: &Value, field: &str) -> Vec<String> {
    let mut texts: Vec<String> = bundle_resources(bundle)
        .filter_map(|res| res.get(field))
        .filter_map(|concept| concept.get("text"))
        .filter_map(|text| text.as_str())
        .map(String::from)
        .collect();
    texts.sort();
    texts
}

/// Condition names from a Condition search bundle
pub fn condition_list(bundle: &Value) -> Vec<String> {
    sorted_texts(bundle, "code")
}

/// Medication names from a MedicationRequest search bundle
pub fn medication_list(bundle: &Value) -> Vec<String> {
    sorted_texts(bundle, "medicationCodeableConcept")
}

impl VitalSigns {
    /// Keep allow-listed observations that carry a numeric `valueQuantity`.
    /// Bundle order is preserved.
    pub fn from_bundle(bundle: &Value) -> Self {
        let mut vitals = VitalSigns::default();
        let mut skipped = 0usize;

        for res in bundle_resources(bundle) {
            let label = res
                .get("code")
                .and_then(|c| c.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or("Unknown");

            if !ALLOWED_OBSERVATIONS.contains(&label) {
                skipped += 1;
                continue;
            }

            let quantity = res.get("valueQuantity");
            let Some(num) = quantity
                .and_then(|q| q.get("value"))
                .and_then(|v| v.as_number())
            else {
                skipped += 1;
                continue;
            };
            let unit = quantity
                .and_then(|q| q.get("unit"))
                .and_then(|u| u.as_str())
                .unwrap_or("");
            let time = res
                .get("effectiveDateTime")
                .and_then(|t| t.as_str())
                .unwrap_or("");

            vitals.observations.push(ObservationEntry {
                label: label.to_string(),
                value: format!("{} {}", num, unit),
            });
            vitals.chart.push(ChartPoint {
                label: label.to_string(),
                num: num.clone(),
                time: time.to_string(),
            });
        }

        tracing::debug!(kept = vitals.chart.len(), skipped, "Filtered observations");
        vitals
    }
}

/// Everything the dashboard view needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub patient_id: String,
    pub patient: PatientSummary,
    pub conditions: Vec<String>,
    pub medications: Vec<String>,
    pub observations: Vec<ObservationEntry>,
    pub chart: Vec<ChartPoint>,
}

/// Raw FHIR payloads fetched during the callback
#[derive(Debug, Clone)]
pub struct ClinicalBundles {
    pub patient: Value,
    pub conditions: Value,
    pub medications: Value,
    pub observations: Value,
}

impl Dashboard {
    pub fn from_bundles(patient_id: impl Into<String>, bundles: &ClinicalBundles) -> Self {
        let vitals = VitalSigns::from_bundle(&bundles.observations);
        Self {
            patient_id: patient_id.into(),
            patient: PatientSummary::from_patient(&bundles.patient),
            conditions: condition_list(&bundles.conditions),
            medications: medication_list(&bundles.medications),
            observations: vitals.observations,
            chart: vitals.chart,
        }
    }
}
