//! Sepsis and shock risk page: sub-view selection, saved clinical and lab
//! data, optional images and the last analysis.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::error::DashboardError;
use crate::forms::{infection_prompt, ClinicalData, LabData};
use crate::gemini::{GeminiClientTrait, GenerateRequest, InlineImage};
use crate::prompts::INFECTION_SYSTEM_PROMPT;
use crate::retry::{generate_with_retry, RetryPolicy};

pub const MISSING_DATA_MESSAGE: &str =
    "Please fill in all required data in Clinical and Lab tabs before analysis.";

/// Which input panel is shown. Any view can be selected from any other and
/// the choice lasts until the caregiver picks another one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InfectionView {
    #[default]
    None,
    Clinic,
    Lab,
    Image,
}

impl InfectionView {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfectionView::None => "none",
            InfectionView::Clinic => "clinic",
            InfectionView::Lab => "lab",
            InfectionView::Image => "image",
        }
    }
}

impl FromStr for InfectionView {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clinic" => Ok(InfectionView::Clinic),
            "lab" => Ok(InfectionView::Lab),
            "image" => Ok(InfectionView::Image),
            other => Err(DashboardError::invalid_input(format!(
                "Unknown view: {}",
                other
            ))),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ImageSlot {
    Umbilical,
    Skin,
    ChestXray,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 3] =
        [ImageSlot::Umbilical, ImageSlot::Skin, ImageSlot::ChestXray];

    /// Multipart field name of the slot's file input.
    pub fn field_name(&self) -> &'static str {
        match self {
            ImageSlot::Umbilical => "umbilical_image",
            ImageSlot::Skin => "skin_image",
            ImageSlot::ChestXray => "xray_image",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.field_name() == name)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageSlot::Umbilical => "Umbilical Cord Image",
            ImageSlot::Skin => "Skin Rash/Lesion Image",
            ImageSlot::ChestXray => "Chest X-ray Image",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InfectionState {
    pub view: InfectionView,
    pub clinical: Option<ClinicalData>,
    pub lab: Option<LabData>,
    pub images: BTreeMap<ImageSlot, InlineImage>,
    pub last_analysis: Option<String>,
}

impl InfectionState {
    /// Switches the visible panel. Opening the clinical or lab panel saves
    /// that form's defaults if nothing has been saved yet.
    pub fn select(&mut self, view: InfectionView) {
        self.view = view;
        match view {
            InfectionView::Clinic => {
                self.clinical.get_or_insert_with(ClinicalData::default);
            }
            InfectionView::Lab => {
                self.lab.get_or_insert_with(LabData::default);
            }
            InfectionView::None | InfectionView::Image => {}
        }
    }

    pub fn save_clinical(
        &mut self,
        data: ClinicalData,
    ) -> Result<(), DashboardError> {
        data.validate()?;
        self.clinical = Some(data);
        Ok(())
    }

    pub fn save_lab(&mut self, data: LabData) -> Result<(), DashboardError> {
        data.validate()?;
        self.lab = Some(data);
        Ok(())
    }

    pub fn set_image(&mut self, slot: ImageSlot, image: InlineImage) {
        self.images.insert(slot, image);
    }

    /// Drops the image in `slot` so later analyses go without it.
    pub fn clear_image(&mut self, slot: ImageSlot) -> bool {
        self.images.remove(&slot).is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.clinical.is_some() && self.lab.is_some()
    }
}

/// Sends the saved clinical and lab data, plus any uploaded images, for a
/// risk assessment. Images are optional.
#[instrument(skip_all, fields(images = state.images.len()))]
pub async fn analyze(
    state: &mut InfectionState,
    client: &dyn GeminiClientTrait,
    policy: &RetryPolicy,
) -> Result<String, DashboardError> {
    let (Some(clinical), Some(lab)) = (&state.clinical, &state.lab) else {
        return Err(DashboardError::empty_input(MISSING_DATA_MESSAGE));
    };

    let request = GenerateRequest::new(infection_prompt(clinical, lab))
        .with_system_instruction(INFECTION_SYSTEM_PROMPT)
        .with_images(state.images.values().cloned().collect());

    info!("Requesting sepsis risk assessment");
    let reply = generate_with_retry(client, request, policy).await?;
    state.last_analysis = Some(reply.clone());
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::fake::FakeGeminiClient;

    const TABLE_REPLY: &str = "### AI-Powered Sepsis Risk Assessment\n\n\
**2. Abnormal Parameters:**\n\
| Parameter | Value | Normal Range (for context) |\n|---|---|---|\n\
| Heart Rate | 185 bpm | 110-160 bpm |\n| CRP | 25 mg/L | < 10 mg/L |\n";

    #[test]
    fn every_view_is_reachable_from_every_view() {
        let views = [
            InfectionView::None,
            InfectionView::Clinic,
            InfectionView::Lab,
            InfectionView::Image,
        ];
        for from in views {
            for to in views {
                let mut state = InfectionState {
                    view: from,
                    ..Default::default()
                };
                state.select(to);
                assert_eq!(state.view, to);
            }
        }
    }

    #[test]
    fn opening_a_form_seeds_its_defaults_once() {
        let mut state = InfectionState::default();
        assert!(!state.is_ready());

        state.select(InfectionView::Clinic);
        assert_eq!(state.clinical, Some(ClinicalData::default()));

        state
            .save_clinical(ClinicalData {
                heart_rate: 185,
                ..Default::default()
            })
            .unwrap();
        state.select(InfectionView::Image);
        state.select(InfectionView::Clinic);
        assert_eq!(state.clinical.as_ref().unwrap().heart_rate, 185);

        state.select(InfectionView::Lab);
        assert!(state.is_ready());
    }

    #[test]
    fn invalid_clinical_data_is_not_saved() {
        let mut state = InfectionState::default();
        let result = state.save_clinical(ClinicalData {
            spo2: 50,
            ..Default::default()
        });
        assert!(result.is_err());
        assert!(state.clinical.is_none());
    }

    #[tokio::test]
    async fn analysis_requires_clinical_and_lab_data() {
        let client = FakeGeminiClient::new();
        let mut state = InfectionState::default();
        state.select(InfectionView::Clinic);

        let err = analyze(&mut state, &client, &RetryPolicy::no_retry())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), MISSING_DATA_MESSAGE);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn analysis_without_images_succeeds() {
        let client = FakeGeminiClient::new().with_response(TABLE_REPLY);
        let mut state = InfectionState::default();
        state
            .save_clinical(ClinicalData {
                heart_rate: 185,
                ..Default::default()
            })
            .unwrap();
        state
            .save_lab(LabData {
                crp: 25,
                ..Default::default()
            })
            .unwrap();

        let reply = analyze(&mut state, &client, &RetryPolicy::no_retry())
            .await
            .unwrap();

        assert!(reply.contains("| Parameter | Value |"));
        assert_eq!(state.last_analysis.as_deref(), Some(TABLE_REPLY));
        let request = client.last_request().unwrap();
        assert!(request.images.is_empty());
        assert!(request.prompt.contains("- Heart Rate: 185 bpm"));
        assert!(request.prompt.contains("- CRP: 25 mg/L"));
        assert_eq!(
            request.system_instruction.as_deref(),
            Some(INFECTION_SYSTEM_PROMPT)
        );
    }

    #[tokio::test]
    async fn uploaded_images_are_attached_in_slot_order() {
        let client = FakeGeminiClient::new();
        let mut state = InfectionState::default();
        state.select(InfectionView::Clinic);
        state.select(InfectionView::Lab);
        state.set_image(
            ImageSlot::ChestXray,
            InlineImage::new("image/png", vec![2]),
        );
        state.set_image(
            ImageSlot::Umbilical,
            InlineImage::new("image/jpeg", vec![1]),
        );

        analyze(&mut state, &client, &RetryPolicy::no_retry())
            .await
            .unwrap();

        let images = client.last_request().unwrap().images;
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].data, vec![1]);
        assert_eq!(images[1].data, vec![2]);
    }

    #[tokio::test]
    async fn cleared_image_is_left_out_of_analysis() {
        let client = FakeGeminiClient::new();
        let mut state = InfectionState::default();
        state.select(InfectionView::Clinic);
        state.select(InfectionView::Lab);
        state.set_image(ImageSlot::Skin, InlineImage::new("image/png", vec![3]));

        assert!(state.clear_image(ImageSlot::Skin));
        assert!(!state.clear_image(ImageSlot::Skin));
        analyze(&mut state, &client, &RetryPolicy::no_retry())
            .await
            .unwrap();

        assert!(client.last_request().unwrap().images.is_empty());
    }

    #[test]
    fn views_parse_from_route_segments() {
        assert_eq!("lab".parse::<InfectionView>().unwrap(), InfectionView::Lab);
        assert!("none".parse::<InfectionView>().is_err());
        assert_eq!(
            ImageSlot::from_field_name("xray_image"),
            Some(ImageSlot::ChestXray)
        );
    }
}
