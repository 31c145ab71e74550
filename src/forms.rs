//! Caregiver form inputs and the prompts assembled from them.
//!
//! Each form is posted by the browser, checked against the same limits the
//! page widgets offer, and rendered into its page's prompt template under
//! stable labels. Free text is embedded as typed.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::DashboardError;
use crate::prompts::{
    FEEDING_USER_PROMPT, INFECTION_USER_PROMPT, NUTRITION_USER_PROMPT,
    UMBILICAL_USER_PROMPT,
};
use crate::translation::Language;

pub const FEEDING_AGE_OPTIONS: &[&str] =
    &["0-1 week", "1-4 weeks", "1-3 months", "3-6 months", "6+ months"];
pub const LATCH_OPTIONS: &[&str] = &[
    "Seems good",
    "Painful for me",
    "Baby seems to slip off",
    "Unsure",
];
pub const DIAPER_OPTIONS: &[&str] = &["1-2", "3-5", "6 or more"];

pub const NUTRITION_AGE_OPTIONS: &[&str] = &[
    "0-1 month",
    "1-2 months",
    "2-4 months",
    "4-6 months",
    "6-9 months",
    "9-12 months",
];
pub const FEEDING_METHOD_OPTIONS: &[&str] = &[
    "Exclusive Breastfeeding",
    "Formula Feeding",
    "Mixed Feeding (Breastmilk + Formula)",
];

pub const FEEDING_STATUS_OPTIONS: &[&str] =
    &["Exclusive Breastfeeding", "Mixed Feeding", "Formula-fed"];
pub const SKIN_PERFUSION_OPTIONS: &[&str] =
    &["Normal", "Pale", "Mottled", "Cyanotic"];
pub const BLOOD_CULTURE_OPTIONS: &[&str] =
    &["Not Available", "Pending", "No Growth", "Growth Detected"];

/// Gestational age the nutrition form starts at; left unchanged it is
/// reported to the model as not specified.
const UNSPECIFIED_GESTATIONAL_AGE: u32 = 40;

/// Replaces each `{key}` in `template` with its value in one pass.
/// Inserted values are never rescanned, so braces typed by the caregiver
/// come through unchanged. Unknown keys are left as written.
pub fn fill_template(template: &str, fields: &[(&str, String)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        filled.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let field = after.find('}').and_then(|close| {
            let key = &after[..close];
            fields
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (value, close))
        });
        match field {
            Some((value, close)) => {
                filled.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                filled.push('{');
                rest = after;
            }
        }
    }
    filled.push_str(rest);
    filled
}

/// Whole numbers keep one decimal place ("3.0"), others print as entered.
pub fn format_measure(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn or_placeholder(text: &str, placeholder: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        placeholder.to_string()
    } else {
        trimmed.to_string()
    }
}

fn check_option(
    label: &str,
    value: &str,
    options: &[&str],
) -> Result<(), DashboardError> {
    if options.contains(&value) {
        Ok(())
    } else {
        Err(DashboardError::invalid_input(format!(
            "{} must be one of: {}",
            label,
            options.join(", ")
        )))
    }
}

fn check_range<T: PartialOrd + Display>(
    label: &str,
    value: T,
    min: T,
    max: T,
) -> Result<(), DashboardError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(DashboardError::invalid_input(format!(
            "{} must be between {} and {}",
            label, min, max
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedingForm {
    pub age: String,
    pub concerns: String,
    pub latching: String,
    pub feeding_frequency: u32,
    pub diapers: String,
}

impl Default for FeedingForm {
    fn default() -> Self {
        Self {
            age: FEEDING_AGE_OPTIONS[0].to_string(),
            concerns: String::new(),
            latching: LATCH_OPTIONS[0].to_string(),
            feeding_frequency: 8,
            diapers: DIAPER_OPTIONS[0].to_string(),
        }
    }
}

impl FeedingForm {
    pub fn validate(&self) -> Result<(), DashboardError> {
        check_option("Baby's Age", &self.age, FEEDING_AGE_OPTIONS)?;
        check_option("Latch", &self.latching, LATCH_OPTIONS)?;
        check_range("Feedings per 24 hours", self.feeding_frequency, 1, 20)?;
        check_option("Wet diapers", &self.diapers, DIAPER_OPTIONS)?;
        Ok(())
    }

    pub fn prompt_fields(&self, language: Language) -> Vec<(&'static str, String)> {
        vec![
            ("language", language.name().to_string()),
            ("age", self.age.clone()),
            ("concerns", or_placeholder(&self.concerns, "Not specified")),
            ("latching", self.latching.clone()),
            ("feeding_frequency", self.feeding_frequency.to_string()),
            ("diapers", self.diapers.clone()),
        ]
    }

    pub fn to_prompt(&self, language: Language) -> String {
        fill_template(FEEDING_USER_PROMPT, &self.prompt_fields(language))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionForm {
    pub age: String,
    pub weight: f64,
    pub gestational_age: u32,
    pub feeding_method: String,
    pub illnesses: String,
    pub conditions: String,
}

impl Default for NutritionForm {
    fn default() -> Self {
        Self {
            age: NUTRITION_AGE_OPTIONS[0].to_string(),
            weight: 0.5,
            gestational_age: UNSPECIFIED_GESTATIONAL_AGE,
            feeding_method: FEEDING_METHOD_OPTIONS[0].to_string(),
            illnesses: String::new(),
            conditions: String::new(),
        }
    }
}

impl NutritionForm {
    pub fn validate(&self) -> Result<(), DashboardError> {
        check_option("Infant's Age", &self.age, NUTRITION_AGE_OPTIONS)?;
        check_range("Weight (kg)", self.weight, 0.5, 20.0)?;
        check_range("Gestational age (weeks)", self.gestational_age, 20, 45)?;
        check_option(
            "Feeding method",
            &self.feeding_method,
            FEEDING_METHOD_OPTIONS,
        )?;
        Ok(())
    }

    pub fn prompt_fields(&self, language: Language) -> Vec<(&'static str, String)> {
        let gestational_age =
            if self.gestational_age == UNSPECIFIED_GESTATIONAL_AGE {
                "Not specified".to_string()
            } else {
                format!("{} weeks", self.gestational_age)
            };
        vec![
            ("language", language.name().to_string()),
            ("age", self.age.clone()),
            ("weight", format_measure(self.weight)),
            ("gestational_age", gestational_age),
            ("feeding_method", self.feeding_method.clone()),
            ("illnesses", or_placeholder(&self.illnesses, "None")),
            ("conditions", or_placeholder(&self.conditions, "None")),
        ]
    }

    pub fn to_prompt(&self, language: Language) -> String {
        fill_template(NUTRITION_USER_PROMPT, &self.prompt_fields(language))
    }
}

/// Clinical and vital signs for the infection page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalData {
    pub age: u32,
    pub birth_weight: f64,
    pub current_weight: f64,
    pub gestational_age: u32,
    pub feeding_status: String,
    pub temperature: f64,
    pub heart_rate: u32,
    pub resp_rate: u32,
    pub cap_refill: u32,
    pub skin_perfusion: String,
    pub lethargy: bool,
    pub urine_output: f64,
    pub spo2: u32,
    pub bp_systolic: u32,
    pub bp_diastolic: u32,
}

impl Default for ClinicalData {
    fn default() -> Self {
        Self {
            age: 7,
            birth_weight: 3.0,
            current_weight: 3.1,
            gestational_age: 40,
            feeding_status: FEEDING_STATUS_OPTIONS[0].to_string(),
            temperature: 37.5,
            heart_rate: 160,
            resp_rate: 50,
            cap_refill: 2,
            skin_perfusion: SKIN_PERFUSION_OPTIONS[0].to_string(),
            lethargy: false,
            urine_output: 1.5,
            spo2: 98,
            bp_systolic: 70,
            bp_diastolic: 40,
        }
    }
}

impl ClinicalData {
    pub fn validate(&self) -> Result<(), DashboardError> {
        check_range("Infant Age (days)", self.age, 0, 90)?;
        check_range("Birth Weight (kg)", self.birth_weight, 0.5, 10.0)?;
        check_range("Current Weight (kg)", self.current_weight, 0.5, 10.0)?;
        check_range("Gestational Age (weeks)", self.gestational_age, 22, 45)?;
        check_option(
            "Feeding Status",
            &self.feeding_status,
            FEEDING_STATUS_OPTIONS,
        )?;
        check_range("Temperature (°C)", self.temperature, 34.0, 42.0)?;
        check_range("Heart Rate (bpm)", self.heart_rate, 50, 250)?;
        check_range("Respiratory Rate", self.resp_rate, 10, 100)?;
        check_range("Capillary Refill Time", self.cap_refill, 1, 10)?;
        check_option(
            "Skin Perfusion",
            &self.skin_perfusion,
            SKIN_PERFUSION_OPTIONS,
        )?;
        check_range("Urine Output", self.urine_output, 0.0, 10.0)?;
        check_range("SpO2", self.spo2, 70, 100)?;
        check_range("Systolic Blood Pressure", self.bp_systolic, 0, 150)?;
        check_range("Diastolic Blood Pressure", self.bp_diastolic, 0, 100)?;
        Ok(())
    }

    pub fn prompt_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("age", self.age.to_string()),
            ("birth_weight", format_measure(self.birth_weight)),
            ("current_weight", format_measure(self.current_weight)),
            ("gestational_age", self.gestational_age.to_string()),
            ("feeding_status", self.feeding_status.clone()),
            ("temperature", format_measure(self.temperature)),
            ("heart_rate", self.heart_rate.to_string()),
            ("resp_rate", self.resp_rate.to_string()),
            ("cap_refill", self.cap_refill.to_string()),
            ("skin_perfusion", self.skin_perfusion.clone()),
            (
                "lethargy",
                if self.lethargy { "Yes" } else { "No" }.to_string(),
            ),
            ("urine_output", format_measure(self.urine_output)),
            ("spo2", self.spo2.to_string()),
            ("bp_systolic", self.bp_systolic.to_string()),
            ("bp_diastolic", self.bp_diastolic.to_string()),
        ]
    }
}

/// Lab and diagnostic parameters for the infection page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabData {
    pub ph: f64,
    pub lactate: f64,
    pub crp: u32,
    pub wbc: u32,
    pub platelets: u32,
    pub blood_culture: String,
    pub procalcitonin: f64,
    pub glucose: u32,
}

impl Default for LabData {
    fn default() -> Self {
        Self {
            ph: 7.35,
            lactate: 1.5,
            crp: 5,
            wbc: 10,
            platelets: 250,
            blood_culture: BLOOD_CULTURE_OPTIONS[0].to_string(),
            procalcitonin: 0.5,
            glucose: 90,
        }
    }
}

impl LabData {
    pub fn validate(&self) -> Result<(), DashboardError> {
        check_range("Blood pH", self.ph, 6.8, 7.8)?;
        check_range("Lactate", self.lactate, 0.0, 20.0)?;
        check_range("CRP", self.crp, 0, 300)?;
        check_range("WBC Count", self.wbc, 0, 50)?;
        check_range("Platelet Count", self.platelets, 0, 600)?;
        check_option(
            "Blood Culture Result",
            &self.blood_culture,
            BLOOD_CULTURE_OPTIONS,
        )?;
        check_range("Procalcitonin", self.procalcitonin, 0.0, 100.0)?;
        check_range("Glucose", self.glucose, 0, 500)?;
        Ok(())
    }

    pub fn prompt_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ph", format_measure(self.ph)),
            ("lactate", format_measure(self.lactate)),
            ("crp", self.crp.to_string()),
            ("wbc", self.wbc.to_string()),
            ("platelets", self.platelets.to_string()),
            ("blood_culture", self.blood_culture.clone()),
            ("procalcitonin", format_measure(self.procalcitonin)),
            ("glucose", self.glucose.to_string()),
        ]
    }
}

pub fn infection_prompt(clinical: &ClinicalData, lab: &LabData) -> String {
    let mut fields = clinical.prompt_fields();
    fields.extend(lab.prompt_fields());
    fill_template(INFECTION_USER_PROMPT, &fields)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmbilicalForm {
    pub redness: bool,
    pub odor: bool,
    pub swelling: bool,
    pub discharge: bool,
    pub other_observations: String,
}

impl UmbilicalForm {
    pub fn reported_symptoms(&self) -> Vec<&'static str> {
        [
            (self.redness, "Redness/Discoloration"),
            (self.odor, "Foul Odor"),
            (self.swelling, "Swelling/Puffiness"),
            (self.discharge, "Pus/Discharge"),
        ]
        .into_iter()
        .filter_map(|(checked, label)| checked.then_some(label))
        .collect()
    }

    pub fn to_prompt(&self) -> String {
        let symptoms = self.reported_symptoms();
        let symptoms = if symptoms.is_empty() {
            "None reported.".to_string()
        } else {
            symptoms.join(", ")
        };
        fill_template(
            UMBILICAL_USER_PROMPT,
            &[
                ("symptoms", symptoms),
                (
                    "observations",
                    or_placeholder(&self.other_observations, "None."),
                ),
            ],
        )
    }
}

/// A form control as the page template draws it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    /// `select`, `number`, `textarea` or `checkbox`
    pub kind: &'static str,
    pub value: String,
    pub options: &'static [&'static str],
    pub min: String,
    pub max: String,
    pub step: String,
}

impl FieldView {
    fn select(
        name: &'static str,
        label: &'static str,
        options: &'static [&'static str],
        value: &str,
    ) -> Self {
        Self {
            name,
            label,
            kind: "select",
            value: value.to_string(),
            options,
            min: String::new(),
            max: String::new(),
            step: String::new(),
        }
    }

    fn number<T: Display>(
        name: &'static str,
        label: &'static str,
        value: T,
        min: T,
        max: T,
        step: &str,
    ) -> Self {
        Self {
            name,
            label,
            kind: "number",
            value: value.to_string(),
            options: &[],
            min: min.to_string(),
            max: max.to_string(),
            step: step.to_string(),
        }
    }

    fn textarea(name: &'static str, label: &'static str, value: &str) -> Self {
        Self {
            kind: "textarea",
            ..Self::select(name, label, &[], value)
        }
    }

    fn checkbox(name: &'static str, label: &'static str, checked: bool) -> Self {
        Self {
            kind: "checkbox",
            ..Self::select(name, label, &[], if checked { "true" } else { "false" })
        }
    }
}

impl FeedingForm {
    pub fn field_views(&self) -> Vec<FieldView> {
        vec![
            FieldView::select("age", "Baby's Age", FEEDING_AGE_OPTIONS, &self.age),
            FieldView::textarea(
                "concerns",
                "What are your main concerns? (e.g., sore nipples, low supply)",
                &self.concerns,
            ),
            FieldView::select(
                "latching",
                "How does the latch feel?",
                LATCH_OPTIONS,
                &self.latching,
            ),
            FieldView::number(
                "feeding_frequency",
                "How many times does baby feed in 24 hours?",
                self.feeding_frequency,
                1,
                20,
                "1",
            ),
            FieldView::select(
                "diapers",
                "Wet diapers in the last 24 hours",
                DIAPER_OPTIONS,
                &self.diapers,
            ),
        ]
    }
}

impl NutritionForm {
    pub fn field_views(&self) -> Vec<FieldView> {
        vec![
            FieldView::select(
                "age",
                "Infant's Age",
                NUTRITION_AGE_OPTIONS,
                &self.age,
            ),
            FieldView::number("weight", "Weight (kg)", self.weight, 0.5, 20.0, "0.1"),
            FieldView::number(
                "gestational_age",
                "Gestational age at birth (weeks)",
                self.gestational_age,
                20,
                45,
                "1",
            ),
            FieldView::select(
                "feeding_method",
                "Current feeding method",
                FEEDING_METHOD_OPTIONS,
                &self.feeding_method,
            ),
            FieldView::textarea(
                "illnesses",
                "Any recent illnesses? (e.g., diarrhea, fever)",
                &self.illnesses,
            ),
            FieldView::textarea(
                "conditions",
                "Other medical conditions? (e.g., reflux, allergies)",
                &self.conditions,
            ),
        ]
    }
}

impl ClinicalData {
    pub fn field_views(&self) -> Vec<FieldView> {
        vec![
            FieldView::number("age", "Infant Age (days)", self.age, 0, 90, "1"),
            FieldView::number(
                "birth_weight",
                "Birth Weight (kg)",
                self.birth_weight,
                0.5,
                10.0,
                "0.1",
            ),
            FieldView::number(
                "current_weight",
                "Current Weight (kg)",
                self.current_weight,
                0.5,
                10.0,
                "0.1",
            ),
            FieldView::number(
                "gestational_age",
                "Gestational Age (weeks)",
                self.gestational_age,
                22,
                45,
                "1",
            ),
            FieldView::select(
                "feeding_status",
                "Feeding Status",
                FEEDING_STATUS_OPTIONS,
                &self.feeding_status,
            ),
            FieldView::number(
                "temperature",
                "Temperature (°C)",
                self.temperature,
                34.0,
                42.0,
                "0.1",
            ),
            FieldView::number(
                "heart_rate",
                "Heart Rate (bpm)",
                self.heart_rate,
                50,
                250,
                "1",
            ),
            FieldView::number(
                "resp_rate",
                "Respiratory Rate (breaths/min)",
                self.resp_rate,
                10,
                100,
                "1",
            ),
            FieldView::number(
                "cap_refill",
                "Capillary Refill Time (seconds)",
                self.cap_refill,
                1,
                10,
                "1",
            ),
            FieldView::select(
                "skin_perfusion",
                "Skin Perfusion",
                SKIN_PERFUSION_OPTIONS,
                &self.skin_perfusion,
            ),
            FieldView::checkbox(
                "lethargy",
                "Lethargy or Irritability",
                self.lethargy,
            ),
            FieldView::number(
                "urine_output",
                "Urine Output (ml/kg/hr)",
                self.urine_output,
                0.0,
                10.0,
                "0.1",
            ),
            FieldView::number("spo2", "SpO2 (%)", self.spo2, 70, 100, "1"),
            FieldView::number(
                "bp_systolic",
                "Systolic Blood Pressure (mmHg)",
                self.bp_systolic,
                0,
                150,
                "1",
            ),
            FieldView::number(
                "bp_diastolic",
                "Diastolic Blood Pressure (mmHg)",
                self.bp_diastolic,
                0,
                100,
                "1",
            ),
        ]
    }
}

impl LabData {
    pub fn field_views(&self) -> Vec<FieldView> {
        vec![
            FieldView::number("ph", "Blood pH", self.ph, 6.8, 7.8, "0.01"),
            FieldView::number(
                "lactate",
                "Lactate (mmol/L)",
                self.lactate,
                0.0,
                20.0,
                "0.1",
            ),
            FieldView::number("crp", "CRP (mg/L)", self.crp, 0, 300, "1"),
            FieldView::number("wbc", "WBC Count (x10^9/L)", self.wbc, 0, 50, "1"),
            FieldView::number(
                "platelets",
                "Platelet Count (x10^9/L)",
                self.platelets,
                0,
                600,
                "1",
            ),
            FieldView::select(
                "blood_culture",
                "Blood Culture Result",
                BLOOD_CULTURE_OPTIONS,
                &self.blood_culture,
            ),
            FieldView::number(
                "procalcitonin",
                "Procalcitonin (ng/mL)",
                self.procalcitonin,
                0.0,
                100.0,
                "0.1",
            ),
            FieldView::number(
                "glucose",
                "Glucose (mg/dL)",
                self.glucose,
                0,
                500,
                "1",
            ),
        ]
    }
}

impl UmbilicalForm {
    pub fn symptom_views(&self) -> Vec<FieldView> {
        vec![
            FieldView::checkbox("redness", "Redness/Discoloration", self.redness),
            FieldView::checkbox("odor", "Foul Odor", self.odor),
            FieldView::checkbox("swelling", "Swelling/Puffiness", self.swelling),
            FieldView::checkbox("discharge", "Pus/Discharge", self.discharge),
        ]
    }
}
