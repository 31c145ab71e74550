//! Chat protocol shared by the feeding and nutrition pages.
//!
//! A form submission appends a fixed user message and asks for a plan; a
//! follow-up appends the caregiver's question. Either way the assistant
//! reply is appended only when the call succeeds.

use tracing::{info, instrument};

use crate::conversation::Conversation;
use crate::error::DashboardError;
use crate::forms::{FeedingForm, NutritionForm};
use crate::gemini::{GeminiClientTrait, GenerateRequest};
use crate::parser::{ResponseLayout, FEEDING_LAYOUT, NUTRITION_LAYOUT};
use crate::prompts::{
    FEEDING_SUBMITTED, FEEDING_SYSTEM_PROMPT, FEEDING_WELCOME,
    NUTRITION_SUBMITTED, NUTRITION_SYSTEM_PROMPT, NUTRITION_WELCOME,
};
use crate::retry::{generate_with_retry, RetryPolicy};
use crate::translation::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPage {
    Feeding,
    Nutrition,
}

impl ChatPage {
    pub fn route(&self) -> &'static str {
        match self {
            ChatPage::Feeding => "/feeding",
            ChatPage::Nutrition => "/nutrition",
        }
    }

    pub fn welcome(&self) -> &'static str {
        match self {
            ChatPage::Feeding => FEEDING_WELCOME,
            ChatPage::Nutrition => NUTRITION_WELCOME,
        }
    }

    /// User message recorded when the sidebar form is submitted.
    pub fn submitted_message(&self) -> &'static str {
        match self {
            ChatPage::Feeding => FEEDING_SUBMITTED,
            ChatPage::Nutrition => NUTRITION_SUBMITTED,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            ChatPage::Feeding => FEEDING_SYSTEM_PROMPT,
            ChatPage::Nutrition => NUTRITION_SYSTEM_PROMPT,
        }
    }

    pub fn layout(&self) -> &'static ResponseLayout {
        match self {
            ChatPage::Feeding => &FEEDING_LAYOUT,
            ChatPage::Nutrition => &NUTRITION_LAYOUT,
        }
    }

    fn language_prefix(&self, language: Language) -> Option<&'static str> {
        match (self, language) {
            (_, Language::English) => None,
            (ChatPage::Feeding, Language::Hindi) => Some("Respond in Hindi: "),
            (ChatPage::Nutrition, Language::Hindi) => {
                Some("Please respond in Hindi: ")
            }
        }
    }

    /// Text sent to the model for a follow-up question.
    pub fn follow_up_prompt(&self, question: &str, language: Language) -> String {
        match self.language_prefix(language) {
            Some(prefix) => format!("{}{}", prefix, question),
            None => question.to_string(),
        }
    }
}

/// A sidebar form that turns into a plan request.
pub trait PlanForm {
    fn validate(&self) -> Result<(), DashboardError>;
    fn to_prompt(&self, language: Language) -> String;
}

impl PlanForm for FeedingForm {
    fn validate(&self) -> Result<(), DashboardError> {
        FeedingForm::validate(self)
    }

    fn to_prompt(&self, language: Language) -> String {
        FeedingForm::to_prompt(self, language)
    }
}

impl PlanForm for NutritionForm {
    fn validate(&self) -> Result<(), DashboardError> {
        NutritionForm::validate(self)
    }

    fn to_prompt(&self, language: Language) -> String {
        NutritionForm::to_prompt(self, language)
    }
}

/// Conversation and last submitted form of one chat page.
#[derive(Debug, Clone)]
pub struct ChatState<F> {
    pub conversation: Conversation,
    pub form: F,
}

impl<F: Default> ChatState<F> {
    pub fn new(page: ChatPage) -> Self {
        Self {
            conversation: Conversation::with_welcome(page.welcome()),
            form: F::default(),
        }
    }

    pub fn reset(&mut self) {
        self.conversation.reset();
        self.form = F::default();
    }
}

/// Records the form submission and asks for a structured plan.
///
/// The request carries the whole history, including the submission
/// message just appended, followed by the assembled prompt.
#[instrument(skip_all, fields(page = ?page, language = %language))]
pub async fn submit_plan<F: PlanForm>(
    state: &mut ChatState<F>,
    page: ChatPage,
    form: F,
    language: Language,
    client: &dyn GeminiClientTrait,
    policy: &RetryPolicy,
) -> Result<(), DashboardError> {
    form.validate()?;
    let prompt = form.to_prompt(language);
    state.form = form;

    let conversation = &mut state.conversation;
    conversation.push_user(page.submitted_message());
    let request = GenerateRequest::new(prompt)
        .with_system_instruction(page.system_prompt())
        .with_history(conversation.messages());

    let reply = generate_with_retry(client, request, policy).await?;
    info!("Received plan of {} chars", reply.len());
    conversation.push_assistant(reply);
    Ok(())
}

/// Appends a follow-up question and the model's answer.
///
/// The stored user message is the question as typed; the language prefix
/// only goes to the model.
#[instrument(skip_all, fields(page = ?page, language = %language))]
pub async fn follow_up(
    conversation: &mut Conversation,
    page: ChatPage,
    question: &str,
    language: Language,
    client: &dyn GeminiClientTrait,
    policy: &RetryPolicy,
) -> Result<(), DashboardError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(DashboardError::empty_input("Please enter a question."));
    }

    let history = conversation.messages().to_vec();
    conversation.push_user(question);
    let request =
        GenerateRequest::new(page.follow_up_prompt(question, language))
            .with_system_instruction(page.system_prompt())
            .with_history(&history);

    let reply = generate_with_retry(client, request, policy).await?;
    conversation.push_assistant(reply);
    Ok(())
}
