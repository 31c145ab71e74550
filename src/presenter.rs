//! Lays model replies out into page rows and columns.
//!
//! Replies are rendered from markdown to HTML here; templates only place
//! the resulting fragments.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::chat::ChatPage;
use crate::conversation::Role;
use crate::gemini::{GeminiClientTrait, InlineImage};
use crate::infection::ImageSlot;
use crate::parser::{parse, ParsedResponse, LEADING_SECTION};
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::translation::{translate, Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Home,
    Feeding,
    Infection,
    Nutrition,
    Umbilical,
}

impl Page {
    /// Navigation order.
    pub const ALL: [Page; 5] = [
        Page::Home,
        Page::Feeding,
        Page::Infection,
        Page::Nutrition,
        Page::Umbilical,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Feeding => "Feeding",
            Page::Infection => "Infection",
            Page::Nutrition => "Nutrition",
            Page::Umbilical => "Umbilical",
        }
    }

    pub fn route(&self) -> &'static str {
        match self {
            Page::Home => "/",
            Page::Feeding => "/feeding",
            Page::Infection => "/infection",
            Page::Nutrition => "/nutrition",
            Page::Umbilical => "/umbilical",
        }
    }

    pub fn needs_model(&self) -> bool {
        !matches!(self, Page::Home)
    }
}

impl From<ChatPage> for Page {
    fn from(page: ChatPage) -> Self {
        match page {
            ChatPage::Feeding => Page::Feeding,
            ChatPage::Nutrition => Page::Nutrition,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NavLink {
    pub title: &'static str,
    pub route: &'static str,
    pub active: bool,
}

pub fn nav_links(current: Page) -> Vec<NavLink> {
    Page::ALL
        .iter()
        .map(|page| NavLink {
            title: page.title(),
            route: page.route(),
            active: *page == current,
        })
        .collect()
}

/// One column; `width` is a percentage of the row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub width: u8,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub columns: Vec<Column>,
}

impl Row {
    fn full(html: String) -> Self {
        Row {
            columns: vec![Column { width: 100, html }],
        }
    }

    fn split(left: (u8, String), right: (u8, String)) -> Self {
        Row {
            columns: vec![
                Column {
                    width: left.0,
                    html: left.1,
                },
                Column {
                    width: right.0,
                    html: right.1,
                },
            ],
        }
    }
}

/// Markdown with GitHub tables; raw HTML in the source is escaped.
pub fn markdown_html(text: &str) -> String {
    markdown::to_html_with_options(text, &markdown::Options::gfm())
        .unwrap_or_else(|_| markdown::to_html(text))
}

fn section_html(parsed: &ParsedResponse, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| parsed.section(name))
        .map(markdown_html)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Arranges a structured chat reply. Unparsed replies are one full-width
/// block.
pub fn arrange_chat_reply(page: ChatPage, text: &str) -> Vec<Row> {
    let parsed = parse(text, page.layout());
    if let ParsedResponse::Unparsed { raw } = &parsed {
        return vec![Row::full(markdown_html(raw))];
    }

    let mut rows = Vec::new();
    let leading = section_html(&parsed, &[LEADING_SECTION]);
    if !leading.trim().is_empty() {
        rows.push(Row::full(leading));
    }

    match page {
        ChatPage::Feeding => {
            rows.push(Row::split(
                (60, section_html(&parsed, &["feeding_plan", "resources"])),
                (40, section_html(&parsed, &["troubleshooting"])),
            ));
        }
        ChatPage::Nutrition => {
            rows.push(Row::split(
                (65, section_html(&parsed, &["nutrition_guide"])),
                (35, section_html(&parsed, &["resources"])),
            ));
            let care_plan = section_html(&parsed, &["care_plan"]);
            if !care_plan.trim().is_empty() {
                rows.push(Row::full(care_plan));
            }
        }
    }
    rows
}

fn figure_html(image: &InlineImage, caption: &str) -> String {
    format!(
        "<figure><img src=\"{}\" alt=\"{}\"><figcaption>{}</figcaption></figure>",
        image.data_uri(),
        caption,
        caption
    )
}

pub fn arrange_infection(
    analysis: &str,
    images: &BTreeMap<ImageSlot, InlineImage>,
) -> Vec<Row> {
    let gallery = if images.is_empty() {
        "<p class=\"muted\">No images were provided.</p>".to_string()
    } else {
        images
            .iter()
            .map(|(slot, image)| figure_html(image, slot.label()))
            .collect::<Vec<_>>()
            .join("\n")
    };
    vec![Row::split((60, markdown_html(analysis)), (40, gallery))]
}

pub fn arrange_umbilical(image: &InlineImage, analysis: &str) -> Vec<Row> {
    vec![Row::split(
        (50, figure_html(image, "Uploaded Umbilical Cord Image")),
        (50, markdown_html(analysis)),
    )]
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub role: &'static str,
    pub rows: Vec<Row>,
}

/// Renders a chat page's history in the session language.
///
/// Assistant messages are translated once per language and cached on the
/// conversation. A failed translation shows the original text and leaves
/// a `Translation error` notice on the session.
pub async fn render_chat(
    session: &mut Session,
    page: ChatPage,
    client: &dyn GeminiClientTrait,
    policy: &RetryPolicy,
) -> Vec<MessageView> {
    let language = session.language;
    let mut failures = Vec::new();
    let conversation = match page {
        ChatPage::Feeding => &mut session.feeding.conversation,
        ChatPage::Nutrition => &mut session.nutrition.conversation,
    };

    let mut views = Vec::with_capacity(conversation.len());
    for index in 0..conversation.len() {
        let message = &conversation.messages()[index];
        let role = message.role;
        if role == Role::User {
            views.push(MessageView {
                role: role.as_str(),
                rows: vec![Row::full(markdown_html(&message.content))],
            });
            continue;
        }

        let text = if language == Language::default() {
            message.content.clone()
        } else if let Some(cached) =
            conversation.cached_translation(index, language)
        {
            cached.to_string()
        } else {
            let original = message.content.clone();
            match translate(client, &original, language, policy).await {
                Ok(translated) => {
                    conversation.cache_translation(
                        index,
                        language,
                        translated.clone(),
                    );
                    translated
                }
                Err(e) => {
                    warn!("Translation failed: {}", e);
                    failures.push(format!("Translation error: {}", e));
                    original
                }
            }
        };

        views.push(MessageView {
            role: role.as_str(),
            rows: arrange_chat_reply(page, &text),
        });
    }

    for failure in failures {
        session.error(failure);
    }
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::fake::FakeGeminiClient;
    use crate::gemini::GeminiError;
    use pretty_assertions::assert_eq;

    const FEEDING_REPLY: &str = "### Your Breastfeeding Snapshot\nAll good.\n\
[START_FEEDING_PLAN]\n- Feed on demand\n[END_FEEDING_PLAN]\n\
[START_TROUBLESHOOTING]\n| Common Challenge | Suggested Technique |\n|---|---|\n| Sore nipples | Check latch |\n[END_TROUBLESHOOTING]\n\
[START_RESOURCES]\n- La Leche League\n[END_RESOURCES]\n";

    fn widths(rows: &[Row]) -> Vec<Vec<u8>> {
        rows.iter()
            .map(|row| row.columns.iter().map(|c| c.width).collect())
            .collect()
    }

    #[test]
    fn feeding_reply_uses_sixty_forty_columns() {
        let rows = arrange_chat_reply(ChatPage::Feeding, FEEDING_REPLY);

        assert_eq!(widths(&rows), vec![vec![100], vec![60, 40]]);
        assert!(rows[0].columns[0].html.contains("Your Breastfeeding Snapshot"));
        let left = &rows[1].columns[0].html;
        assert!(left.contains("Feed on demand"));
        assert!(left.contains("La Leche League"));
        let right = &rows[1].columns[1].html;
        assert!(right.contains("<table>"));
        assert!(right.contains("Common Challenge"));
    }

    #[test]
    fn nutrition_reply_adds_full_width_care_plan() {
        let reply = "Snapshot\n[START_NUTRITION_GUIDE]guide[END_NUTRITION_GUIDE]\n\
[START_RESOURCES]links[END_RESOURCES]\n### Care Plan\n- rest";
        let rows = arrange_chat_reply(ChatPage::Nutrition, reply);

        assert_eq!(widths(&rows), vec![vec![100], vec![65, 35], vec![100]]);
        assert!(rows[2].columns[0].html.contains("Care Plan"));
    }

    #[test]
    fn unparsed_reply_is_one_block() {
        let rows = arrange_chat_reply(ChatPage::Feeding, "Just some advice.");
        assert_eq!(widths(&rows), vec![vec![100]]);
        assert!(rows[0].columns[0].html.starts_with("<p>Just some advice.</p>"));
    }

    #[test]
    fn raw_html_in_replies_is_escaped() {
        let html = markdown_html("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn infection_puts_images_on_the_right() {
        let mut images = BTreeMap::new();
        images.insert(ImageSlot::Skin, InlineImage::new("image/png", vec![1]));

        let rows = arrange_infection("**High Risk**", &images);

        assert_eq!(widths(&rows), vec![vec![60, 40]]);
        assert!(rows[0].columns[0].html.contains("<strong>High Risk</strong>"));
        assert!(rows[0].columns[1].html.contains("data:image/png;base64,AQ=="));
        assert!(rows[0].columns[1].html.contains(ImageSlot::Skin.label()));
    }

    #[test]
    fn umbilical_is_even_split() {
        let image = InlineImage::new("image/jpeg", vec![1]);
        let rows = arrange_umbilical(&image, "Low Risk");
        assert_eq!(widths(&rows), vec![vec![50, 50]]);
        assert!(rows[0].columns[1].html.contains("Low Risk"));
    }

    #[tokio::test]
    async fn english_render_makes_no_calls() {
        let client = FakeGeminiClient::new();
        let mut session = Session::default();
        session.feeding.conversation.push_user("hi");
        session.feeding.conversation.push_assistant(FEEDING_REPLY);

        let views = render_chat(
            &mut session,
            ChatPage::Feeding,
            &client,
            &RetryPolicy::no_retry(),
        )
        .await;

        assert_eq!(views.len(), 3);
        assert_eq!(views[1].role, "user");
        assert_eq!(widths(&views[2].rows), vec![vec![100], vec![60, 40]]);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn translations_are_cached_between_renders() {
        let client = FakeGeminiClient::new()
            .with_responses(vec!["स्वागत", FEEDING_REPLY]);
        let mut session = Session::default();
        session.language = Language::Hindi;
        session.feeding.conversation.push_assistant(FEEDING_REPLY);

        let first = render_chat(
            &mut session,
            ChatPage::Feeding,
            &client,
            &RetryPolicy::no_retry(),
        )
        .await;
        let second = render_chat(
            &mut session,
            ChatPage::Feeding,
            &client,
            &RetryPolicy::no_retry(),
        )
        .await;

        assert_eq!(client.request_count(), 2);
        assert_eq!(widths(&first[1].rows), vec![vec![100], vec![60, 40]]);
        assert_eq!(first[1].rows, second[1].rows);
    }

    #[tokio::test]
    async fn translation_failure_shows_original_with_notice() {
        let client = FakeGeminiClient::new().with_failure(GeminiError::Status {
            status: 400,
            body: "bad request".into(),
        });
        let mut session = Session::default();
        session.language = Language::Hindi;

        let views = render_chat(
            &mut session,
            ChatPage::Nutrition,
            &client,
            &RetryPolicy::no_retry(),
        )
        .await;

        assert!(views[0].rows[0].columns[0].html.contains("Welcome!"));
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.starts_with("Translation error: "));
    }

    #[test]
    fn nav_marks_current_page() {
        let links = nav_links(Page::Infection);
        assert_eq!(links.len(), 5);
        assert!(links[2].active);
        assert_eq!(links[2].route, "/infection");
        assert!(!Page::Home.needs_model());
    }
}
