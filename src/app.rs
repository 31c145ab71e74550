use crate::chat::{self, ChatPage};
use crate::cli::CommonArgs;
use crate::error::DashboardError;
use crate::forms::{ClinicalData, FeedingForm, LabData, NutritionForm, UmbilicalForm};
use crate::gemini::{GeminiClientTrait, GeminiError, InlineImage};
use crate::infection::{self, ImageSlot, InfectionView};
use crate::presenter::{self, nav_links, Page};
use crate::prompts::{INFECTION_DISCLAIMER, UMBILICAL_DISCLAIMER};
use crate::session::{self, Notice, Session, SessionHandle, SESSION_COOKIE};
use crate::translation::Language;
use crate::umbilical;
use crate::AppState;
use anyhow::Result;
use axum::{
    extract::{
        rejection::FormRejection, DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tera::{Context as TeraContext, Tera};
use tower_http::compression::predicate::{
    NotForContentType, Predicate, SizeAbove,
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{prelude::*, Registry};
use tracing_tree::HierarchicalLayer;

// Add build-time information
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Largest accepted upload request; three phone photos fit comfortably.
const UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

const NO_RESPONSE_MESSAGE: &str =
    "Sorry, I couldn't get a response. Please try again.";

#[derive(Parser, Debug)]
#[command(author, version, about = "Neonatal care dashboard")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = 8501)]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Seconds a session survives without requests
    #[arg(long, default_value_t = 86400)]
    session_ttl_secs: u64,

    /// Seconds between sweeps for expired sessions
    #[arg(long, default_value_t = 300)]
    session_gc_interval_secs: u64,

    #[command(flatten)]
    common: CommonArgs,
}

fn get_build_info() -> String {
    fn clean(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty() && v != "unknown")
    }

    let clean_env = |key: &str| clean(env::var(key).ok());

    let mut parts = Vec::new();
    parts.push(format!("Version {}", built_info::PKG_VERSION));

    if let Some(tag) = clean_env("APP_BUILD_TAG") {
        parts.push(format!("Image {}", tag));
    }

    let commit = clean_env("APP_BUILD_COMMIT").or_else(|| {
        clean(built_info::GIT_COMMIT_HASH_SHORT.map(|s| s.to_string()))
    });
    if let Some(commit) = commit {
        let short: String = commit.chars().take(12).collect();
        parts.push(format!("Commit {}", short));
    }

    if let Some(true) = built_info::GIT_DIRTY {
        parts.push("workspace dirty".to_string());
    }

    if let Some(time) = clean(Some(built_info::BUILT_TIME_UTC.to_string())) {
        parts.push(format!("Built {}", time));
    }

    if let Some(profile) = clean(Some(built_info::PROFILE.to_string())) {
        parts.push(format!("Profile {}", profile));
    }

    parts.join(" • ")
}

static TEMPLATES: OnceLock<Tera> = OnceLock::new();

fn init_templates() -> Tera {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("templates/base.html")),
        ("home.html", include_str!("templates/home.html")),
        ("error.html", include_str!("templates/error.html")),
        ("chat.html", include_str!("templates/chat.html")),
        ("infection.html", include_str!("templates/infection.html")),
        ("umbilical.html", include_str!("templates/umbilical.html")),
    ])
    .expect("Failed to parse page templates");
    tera
}

pub fn ensure_templates() {
    TEMPLATES.get_or_init(init_templates);
}

fn render(template: &str, context: &TeraContext) -> Html<String> {
    let rendered = TEMPLATES
        .get_or_init(init_templates)
        .render(template, context)
        .unwrap_or_else(|e| {
            error!("Failed to render {}: {:?}", template, e);
            format!("Template error: {}", e)
        });
    Html(rendered)
}

fn page_context(page: Page, notices: Vec<Notice>) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("page_title", page.title());
    context.insert("nav", &nav_links(page));
    context.insert("notices", &notices);
    context.insert("build_info", &get_build_info());
    context
}

/// Page shown instead of any model-backed page when no key is configured.
fn configuration_missing(page: Page) -> Response {
    let mut context = page_context(page, Vec::new());
    context.insert("message", &DashboardError::ConfigurationMissing.to_string());
    (StatusCode::SERVICE_UNAVAILABLE, render("error.html", &context))
        .into_response()
}

fn require_client(
    state: &AppState,
    page: Page,
) -> Result<Arc<dyn GeminiClientTrait>, Response> {
    state.gemini_client.clone().ok_or_else(|| {
        warn!("{} requested without a Gemini API key", page.title());
        configuration_missing(page)
    })
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

async fn load_session(state: &AppState, headers: &HeaderMap) -> SessionHandle {
    let id = session_id_from_headers(headers);
    state.sessions.get_or_create(id.as_deref()).await
}

/// Sets the session cookie when the request started a new session.
fn with_session_cookie(handle: &SessionHandle, response: Response) -> Response {
    let mut response = response;
    if handle.created {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, handle.id
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Invalid session cookie: {}", e),
        }
    }
    response
}

fn see_other(handle: &SessionHandle, location: &str) -> Response {
    let response = (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.to_string())],
    )
        .into_response();
    with_session_cookie(handle, response)
}

/// Logs a failed action and keeps its message for the next render.
/// A reply with no text is worth another try, so it only warns.
fn report(session: &mut Session, err: DashboardError) {
    match &err {
        DashboardError::RemoteCallFailure {
            source: GeminiError::EmptyResponse { .. },
            ..
        } => {
            warn!("Model returned no text: {}", err);
            session.warning(NO_RESPONSE_MESSAGE);
        }
        DashboardError::RemoteCallFailure { attempts, .. } => {
            error!("Model call failed after {} attempts: {}", attempts, err);
            session.error(err.to_string());
        }
        _ => {
            warn!("Action refused: {}", err);
            session.error(err.to_string());
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
struct FeatureCard {
    title: &'static str,
    description: &'static str,
    route: &'static str,
}

const FEATURE_CARDS: [FeatureCard; 4] = [
    FeatureCard {
        title: "Feeding Guidance",
        description: "Personalized breastfeeding plans, latching tips and troubleshooting for new mothers.",
        route: "/feeding",
    },
    FeatureCard {
        title: "Nutrition Support",
        description: "Age-appropriate nutrition guidance for neonates and infants, including preterm babies.",
        route: "/nutrition",
    },
    FeatureCard {
        title: "Infection Prevention",
        description: "Early sepsis and shock risk assessment from clinical signs, lab values and images.",
        route: "/infection",
    },
    FeatureCard {
        title: "Umbilical Care",
        description: "Image-based umbilical cord check for early signs of omphalitis.",
        route: "/umbilical",
    },
];

#[instrument]
async fn home_page() -> Html<String> {
    let mut context = page_context(Page::Home, Vec::new());
    context.insert("cards", &FEATURE_CARDS);
    render("home.html", &context)
}

// Chat pages

#[derive(Debug, Deserialize)]
struct AskForm {
    #[serde(default)]
    question: String,
}

#[derive(Debug, Deserialize)]
struct LanguageForm {
    language: String,
}

#[instrument(skip(state, headers))]
async fn chat_page(
    state: Arc<AppState>,
    headers: HeaderMap,
    page: ChatPage,
) -> Response {
    let client = match require_client(&state, page.into()) {
        Ok(client) => client,
        Err(response) => return response,
    };
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;

    let messages = presenter::render_chat(
        &mut session,
        page,
        client.as_ref(),
        &state.retry_policy,
    )
    .await;
    let (heading, form_heading, submit_label, fields) = match page {
        ChatPage::Feeding => (
            "Breastfeeding & Lactation Support",
            "Tell us about your feeding journey",
            "Get My Feeding Plan",
            session.feeding.form.field_views(),
        ),
        ChatPage::Nutrition => (
            "Neonatal Nutrition Guide",
            "Infant details",
            "Generate Nutrition Plan",
            session.nutrition.form.field_views(),
        ),
    };

    let mut context = page_context(page.into(), session.take_notices());
    context.insert("heading", heading);
    context.insert("form_heading", form_heading);
    context.insert("submit_label", submit_label);
    context.insert("fields", &fields);
    context.insert("route", page.route());
    context.insert("messages", &messages);
    context.insert("language", session.language.name());
    let languages: Vec<&str> =
        Language::ALL.iter().map(|language| language.name()).collect();
    context.insert("languages", &languages);

    with_session_cookie(&handle, render("chat.html", &context).into_response())
}

#[axum::debug_handler]
async fn feeding_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    chat_page(state, headers, ChatPage::Feeding).await
}

#[axum::debug_handler]
async fn nutrition_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    chat_page(state, headers, ChatPage::Nutrition).await
}

#[instrument(skip_all)]
async fn submit_feeding_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<FeedingForm>, FormRejection>,
) -> Response {
    let page = ChatPage::Feeding;
    let client = match require_client(&state, page.into()) {
        Ok(client) => client,
        Err(response) => return response,
    };
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;

    let result = match form {
        Ok(Form(form)) => {
            let language = session.language;
            chat::submit_plan(
                &mut session.feeding,
                page,
                form,
                language,
                client.as_ref(),
                &state.retry_policy,
            )
            .await
        }
        Err(rejection) => Err(DashboardError::invalid_input(rejection.body_text())),
    };
    if let Err(e) = result {
        report(&mut session, e);
    }
    see_other(&handle, page.route())
}

#[instrument(skip_all)]
async fn submit_nutrition_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<NutritionForm>, FormRejection>,
) -> Response {
    let page = ChatPage::Nutrition;
    let client = match require_client(&state, page.into()) {
        Ok(client) => client,
        Err(response) => return response,
    };
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;

    let result = match form {
        Ok(Form(form)) => {
            let language = session.language;
            chat::submit_plan(
                &mut session.nutrition,
                page,
                form,
                language,
                client.as_ref(),
                &state.retry_policy,
            )
            .await
        }
        Err(rejection) => Err(DashboardError::invalid_input(rejection.body_text())),
    };
    if let Err(e) = result {
        report(&mut session, e);
    }
    see_other(&handle, page.route())
}

async fn ask(
    state: Arc<AppState>,
    headers: HeaderMap,
    page: ChatPage,
    question: String,
) -> Response {
    let client = match require_client(&state, page.into()) {
        Ok(client) => client,
        Err(response) => return response,
    };
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;

    let language = session.language;
    let conversation = match page {
        ChatPage::Feeding => &mut session.feeding.conversation,
        ChatPage::Nutrition => &mut session.nutrition.conversation,
    };
    let result = chat::follow_up(
        conversation,
        page,
        &question,
        language,
        client.as_ref(),
        &state.retry_policy,
    )
    .await;
    if let Err(e) = result {
        report(&mut session, e);
    }
    see_other(&handle, page.route())
}

async fn ask_feeding(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<AskForm>,
) -> Response {
    ask(state, headers, ChatPage::Feeding, form.question).await
}

async fn ask_nutrition(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<AskForm>,
) -> Response {
    ask(state, headers, ChatPage::Nutrition, form.question).await
}

async fn change_language(
    state: Arc<AppState>,
    headers: HeaderMap,
    page: ChatPage,
    language: String,
) -> Response {
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;
    match language.parse::<Language>() {
        Ok(language) => {
            debug!("Session language set to {}", language);
            session.language = language;
        }
        Err(e) => report(&mut session, e),
    }
    see_other(&handle, page.route())
}

async fn feeding_language(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LanguageForm>,
) -> Response {
    change_language(state, headers, ChatPage::Feeding, form.language).await
}

async fn nutrition_language(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LanguageForm>,
) -> Response {
    change_language(state, headers, ChatPage::Nutrition, form.language).await
}

async fn reset_chat(
    state: Arc<AppState>,
    headers: HeaderMap,
    page: ChatPage,
) -> Response {
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;
    match page {
        ChatPage::Feeding => session.feeding.reset(),
        ChatPage::Nutrition => session.nutrition.reset(),
    }
    info!("Reset {:?} conversation", page);
    see_other(&handle, page.route())
}

async fn reset_feeding(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    reset_chat(state, headers, ChatPage::Feeding).await
}

async fn reset_nutrition(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    reset_chat(state, headers, ChatPage::Nutrition).await
}

// Infection page

#[derive(Debug, Serialize)]
struct ViewSelector {
    view: &'static str,
    label: &'static str,
}

const VIEW_SELECTORS: [ViewSelector; 3] = [
    ViewSelector {
        view: "clinic",
        label: "Clinical & Vital Signs",
    },
    ViewSelector {
        view: "lab",
        label: "Lab & Diagnostics",
    },
    ViewSelector {
        view: "image",
        label: "Medical Images",
    },
];

#[derive(Debug, Serialize)]
struct ImageSlotView {
    field: &'static str,
    label: &'static str,
    uploaded: bool,
}

#[instrument(skip_all)]
async fn infection_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_client(&state, Page::Infection) {
        return response;
    }
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;

    let infection = &session.infection;
    let clinical_fields = infection
        .clinical
        .clone()
        .unwrap_or_default()
        .field_views();
    let lab_fields = infection.lab.clone().unwrap_or_default().field_views();
    let image_slots: Vec<ImageSlotView> = ImageSlot::ALL
        .iter()
        .map(|slot| ImageSlotView {
            field: slot.field_name(),
            label: slot.label(),
            uploaded: infection.images.contains_key(slot),
        })
        .collect();
    let analysis = infection
        .last_analysis
        .as_deref()
        .map(|text| presenter::arrange_infection(text, &infection.images))
        .unwrap_or_default();
    let view = infection.view.as_str();
    let ready = infection.is_ready();

    let mut context = page_context(Page::Infection, session.take_notices());
    context.insert("disclaimer", &presenter::markdown_html(INFECTION_DISCLAIMER));
    context.insert("selectors", &VIEW_SELECTORS);
    context.insert("view", view);
    context.insert("clinical_fields", &clinical_fields);
    context.insert("lab_fields", &lab_fields);
    context.insert("image_slots", &image_slots);
    context.insert("ready", &ready);
    context.insert("analysis", &analysis);

    with_session_cookie(
        &handle,
        render("infection.html", &context).into_response(),
    )
}

#[instrument(skip_all)]
async fn select_infection_view(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(view): Path<String>,
) -> Response {
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;
    match view.parse::<InfectionView>() {
        Ok(view) => session.infection.select(view),
        Err(e) => report(&mut session, e),
    }
    see_other(&handle, Page::Infection.route())
}

#[instrument(skip_all)]
async fn save_clinical(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<ClinicalData>, FormRejection>,
) -> Response {
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;
    let result = match form {
        Ok(Form(data)) => session.infection.save_clinical(data),
        Err(rejection) => Err(DashboardError::invalid_input(rejection.body_text())),
    };
    match result {
        Ok(()) => session.notify(
            session::NoticeKind::Info,
            "Clinical data saved.",
        ),
        Err(e) => report(&mut session, e),
    }
    see_other(&handle, Page::Infection.route())
}

#[instrument(skip_all)]
async fn save_lab(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<LabData>, FormRejection>,
) -> Response {
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;
    let result = match form {
        Ok(Form(data)) => session.infection.save_lab(data),
        Err(rejection) => Err(DashboardError::invalid_input(rejection.body_text())),
    };
    match result {
        Ok(()) => {
            session.notify(session::NoticeKind::Info, "Lab data saved.")
        }
        Err(e) => report(&mut session, e),
    }
    see_other(&handle, Page::Infection.route())
}

/// Non-empty uploaded files from a multipart body, keyed by field name.
/// Fields submitted without a file are skipped.
async fn read_uploads(
    multipart: &mut Multipart,
) -> Result<Vec<(String, InlineImage)>, DashboardError> {
    let mut uploads = Vec::new();
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| DashboardError::invalid_input(e.body_text()))?;
        let Some(field) = field else {
            break;
        };
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| DashboardError::invalid_input(e.body_text()))?;
        if file_name.is_empty() || data.is_empty() {
            continue;
        }
        debug!("Received {} ({} bytes) as {}", file_name, data.len(), name);
        uploads.push((name, InlineImage::from_upload(&file_name, data.to_vec())?));
    }
    Ok(uploads)
}

#[instrument(skip_all)]
async fn upload_infection_images(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let handle = load_session(&state, &headers).await;
    let uploads = read_uploads(&mut multipart).await;
    let mut session = handle.session.lock().await;
    match uploads {
        Ok(uploads) => {
            for (name, image) in uploads {
                match ImageSlot::from_field_name(&name) {
                    Some(slot) => session.infection.set_image(slot, image),
                    None => warn!("Ignoring upload in unknown field {}", name),
                }
            }
        }
        Err(e) => report(&mut session, e),
    }
    see_other(&handle, Page::Infection.route())
}

#[instrument(skip(state, headers))]
async fn clear_infection_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(field): Path<String>,
) -> Response {
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;
    match ImageSlot::from_field_name(&field) {
        Some(slot) => {
            if session.infection.clear_image(slot) {
                debug!("Cleared {}", slot.label());
            }
        }
        None => report(
            &mut session,
            DashboardError::invalid_input(format!("Unknown image slot {}", field)),
        ),
    }
    see_other(&handle, Page::Infection.route())
}

#[instrument(skip_all)]
async fn analyze_infection(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let client = match require_client(&state, Page::Infection) {
        Ok(client) => client,
        Err(response) => return response,
    };
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;
    let result = infection::analyze(
        &mut session.infection,
        client.as_ref(),
        &state.retry_policy,
    )
    .await;
    if let Err(e) = result {
        report(&mut session, e);
    }
    see_other(&handle, Page::Infection.route())
}

// Umbilical page

#[instrument(skip_all)]
async fn umbilical_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_client(&state, Page::Umbilical) {
        return response;
    }
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;

    let umbilical = &session.umbilical;
    let analysis = match (&umbilical.image, &umbilical.last_analysis) {
        (Some(image), Some(text)) => presenter::arrange_umbilical(image, text),
        _ => Vec::new(),
    };
    let preview = umbilical.image.as_ref().map(|image| {
        format!(
            "<figure><img src=\"{}\" alt=\"Uploaded image\"><figcaption>Uploaded Image</figcaption></figure>",
            image.data_uri()
        )
    });
    let symptoms = umbilical.form.symptom_views();
    let other_observations = umbilical.form.other_observations.clone();
    let can_analyze = umbilical.can_analyze();

    let mut context = page_context(Page::Umbilical, session.take_notices());
    context.insert("disclaimer", &presenter::markdown_html(UMBILICAL_DISCLAIMER));
    context.insert("analysis", &analysis);
    context.insert("preview", &preview);
    context.insert("symptoms", &symptoms);
    context.insert("other_observations", &other_observations);
    context.insert("can_analyze", &can_analyze);

    with_session_cookie(
        &handle,
        render("umbilical.html", &context).into_response(),
    )
}

#[instrument(skip_all)]
async fn upload_umbilical_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let handle = load_session(&state, &headers).await;
    let uploads = read_uploads(&mut multipart).await;
    let mut session = handle.session.lock().await;
    match uploads {
        Ok(uploads) => {
            match uploads.into_iter().find(|(name, _)| name == "image") {
                Some((_, image)) => {
                    session.umbilical.image = Some(image);
                    session.umbilical.last_analysis = None;
                }
                None => report(
                    &mut session,
                    DashboardError::empty_input(umbilical::MISSING_IMAGE_MESSAGE),
                ),
            }
        }
        Err(e) => report(&mut session, e),
    }
    see_other(&handle, Page::Umbilical.route())
}

#[instrument(skip_all)]
async fn analyze_umbilical(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<UmbilicalForm>, FormRejection>,
) -> Response {
    let client = match require_client(&state, Page::Umbilical) {
        Ok(client) => client,
        Err(response) => return response,
    };
    let handle = load_session(&state, &headers).await;
    let mut session = handle.session.lock().await;

    let result = match form {
        Ok(Form(form)) => {
            session.umbilical.form = form;
            umbilical::analyze(
                &mut session.umbilical,
                client.as_ref(),
                &state.retry_policy,
            )
            .await
            .map(|_| ())
        }
        Err(rejection) => Err(DashboardError::invalid_input(rejection.body_text())),
    };
    if let Err(e) = result {
        report(&mut session, e);
    }
    see_other(&handle, Page::Umbilical.route())
}

pub fn routes(state: Arc<AppState>) -> Router {
    let predicate = SizeAbove::new(32)
        // still don't compress gRPC
        .and(NotForContentType::GRPC)
        // still don't compress images
        .and(NotForContentType::IMAGES);

    let compression_layer = CompressionLayer::new()
        .br(true)
        .deflate(true)
        .gzip(true)
        .zstd(true)
        .compress_when(predicate);

    Router::new()
        .route("/", get(home_page))
        .route("/health", get(health_check))
        .route("/feeding", get(feeding_page))
        .route("/feeding/plan", post(submit_feeding_plan))
        .route("/feeding/ask", post(ask_feeding))
        .route("/feeding/language", post(feeding_language))
        .route("/feeding/reset", post(reset_feeding))
        .route("/nutrition", get(nutrition_page))
        .route("/nutrition/plan", post(submit_nutrition_plan))
        .route("/nutrition/ask", post(ask_nutrition))
        .route("/nutrition/language", post(nutrition_language))
        .route("/nutrition/reset", post(reset_nutrition))
        .route("/infection", get(infection_page))
        .route("/infection/view/{view}", post(select_infection_view))
        .route("/infection/clinical", post(save_clinical))
        .route("/infection/lab", post(save_lab))
        .route("/infection/images", post(upload_infection_images))
        .route(
            "/infection/images/{slot}/clear",
            post(clear_infection_image),
        )
        .route("/infection/analyze", post(analyze_infection))
        .route("/umbilical", get(umbilical_page))
        .route("/umbilical/image", post(upload_umbilical_image))
        .route("/umbilical/analyze", post(analyze_umbilical))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .layer(compression_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve() -> Result<()> {
    // Initialize logging with tracing
    let subscriber = Registry::default()
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        );

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Parse command line arguments
    let args = Args::parse();

    info!("Starting incubate dashboard");

    let gemini_api_key = args.common.resolve_api_key()?;
    let state = crate::create_app_state(crate::AppConfig {
        gemini_api_key,
        gemini_api_base: args.common.gemini_api_base.clone(),
        gemini_model: args.common.gemini_model.clone(),
        retry_policy: args.common.retry_policy(),
        session_ttl: Duration::from_secs(args.session_ttl_secs),
        session_gc_interval: Duration::from_secs(
            args.session_gc_interval_secs.max(1),
        ),
    });

    // Set up ctrl-c handler
    let shutdown_token = state.shutdown_token.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL-C, initiating shutdown");
            shutdown_token.cancel();
        }
    });

    info!("Starting session cleanup task");
    let gc_handle = tokio::spawn(session::collect_expired_sessions(
        state.sessions.clone(),
        state.session_gc_interval,
        state.shutdown_token.clone(),
    ));

    // Initialize templates
    ensure_templates();

    // Start web server
    let shutdown_token = state.shutdown_token.clone();
    let app = routes(state);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_token.cancelled() => {
            info!("Shutdown signal received, waiting for background tasks to complete...");
        }
    }

    shutdown_token.cancel();
    match tokio::time::timeout(Duration::from_secs(5), gc_handle).await {
        Ok(_) => info!("Session cleanup completed gracefully"),
        Err(_) => warn!("Session cleanup timed out during shutdown"),
    }

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; incubate_session=abc123; other=1"),
        );
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc123"));
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn templates_parse() {
        let tera = init_templates();
        let names: Vec<&str> = tera.get_template_names().collect();
        assert!(names.contains(&"chat.html"));
        assert!(names.contains(&"infection.html"));
    }

    #[test]
    fn build_info_names_version() {
        assert!(get_build_info().starts_with("Version "));
    }
}
