//! Splits structured model replies on literal bracketed markers.
//!
//! A page's [`ResponseLayout`] lists marker pairs in the order the page's
//! template asks the model to emit them. A reply is only split when every
//! marker is present and each end marker follows its start marker;
//! otherwise the whole reply is kept as one raw block.
//!
//! When a marker occurs more than once only its first occurrence is used,
//! so content after a repeated marker can be cut short.

use serde::Serialize;

/// Name of the text before the first start marker.
pub const LEADING_SECTION: &str = "leading";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPair {
    pub name: &'static str,
    pub start: &'static str,
    pub end: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseLayout {
    pub pairs: &'static [MarkerPair],
    /// Name given to the text after the last end marker, if the page keeps it.
    pub trailing: Option<&'static str>,
}

pub const FEEDING_PLAN: MarkerPair = MarkerPair {
    name: "feeding_plan",
    start: "[START_FEEDING_PLAN]",
    end: "[END_FEEDING_PLAN]",
};

pub const TROUBLESHOOTING: MarkerPair = MarkerPair {
    name: "troubleshooting",
    start: "[START_TROUBLESHOOTING]",
    end: "[END_TROUBLESHOOTING]",
};

pub const RESOURCES: MarkerPair = MarkerPair {
    name: "resources",
    start: "[START_RESOURCES]",
    end: "[END_RESOURCES]",
};

pub const NUTRITION_GUIDE: MarkerPair = MarkerPair {
    name: "nutrition_guide",
    start: "[START_NUTRITION_GUIDE]",
    end: "[END_NUTRITION_GUIDE]",
};

pub const FEEDING_LAYOUT: ResponseLayout = ResponseLayout {
    pairs: &[FEEDING_PLAN, TROUBLESHOOTING, RESOURCES],
    trailing: None,
};

pub const NUTRITION_LAYOUT: ResponseLayout = ResponseLayout {
    pairs: &[NUTRITION_GUIDE, RESOURCES],
    trailing: Some("care_plan"),
};

/// Infection and umbilical replies carry no markers.
pub const UNSTRUCTURED_LAYOUT: ResponseLayout = ResponseLayout {
    pairs: &[],
    trailing: None,
};

impl ResponseLayout {
    pub fn markers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().flat_map(|pair| [pair.start, pair.end])
    }

    pub fn is_structured(&self) -> bool {
        !self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedResponse {
    /// Leading text, one section per marker pair in layout order, then the
    /// trailing section if the layout names one.
    Parsed { sections: Vec<Section> },
    Unparsed { raw: String },
}

impl ParsedResponse {
    pub fn section(&self, name: &str) -> Option<&str> {
        match self {
            ParsedResponse::Parsed { sections } => sections
                .iter()
                .find(|section| section.name == name)
                .map(|section| section.text.as_str()),
            ParsedResponse::Unparsed { .. } => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParsedResponse::Parsed { .. })
    }
}

/// Text after the first `start` and before the first `end` that follows it.
fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let after_start = &text[text.find(start)? + start.len()..];
    let end_at = after_start.find(end)?;
    Some(&after_start[..end_at])
}

pub fn parse(text: &str, layout: &ResponseLayout) -> ParsedResponse {
    let unparsed = || ParsedResponse::Unparsed {
        raw: text.to_string(),
    };

    let Some(first) = layout.pairs.first() else {
        return unparsed();
    };
    if !layout.markers().all(|marker| text.contains(marker)) {
        return unparsed();
    }

    let mut sections = Vec::with_capacity(layout.pairs.len() + 2);
    // Guarded by the containment check above.
    let leading_end = text.find(first.start).unwrap_or(0);
    sections.push(Section {
        name: LEADING_SECTION,
        text: text[..leading_end].to_string(),
    });

    for pair in layout.pairs {
        match between(text, pair.start, pair.end) {
            Some(body) => sections.push(Section {
                name: pair.name,
                text: body.to_string(),
            }),
            None => return unparsed(),
        }
    }

    if let (Some(name), Some(last)) = (layout.trailing, layout.pairs.last()) {
        let trailing = text
            .find(last.end)
            .map(|at| &text[at + last.end.len()..])
            .unwrap_or_default();
        sections.push(Section {
            name,
            text: trailing.to_string(),
        });
    }

    ParsedResponse::Parsed { sections }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FEEDING_REPLY: &str = "### Snapshot\nBaby latches well.\n\n\
[START_FEEDING_PLAN]\n- Feed on demand\n[END_FEEDING_PLAN]\n\n\
[START_TROUBLESHOOTING]\n| Common Challenge | Suggested Technique |\n[END_TROUBLESHOOTING]\n\n\
[START_RESOURCES]\n- WHO\n[END_RESOURCES]\n";

    const NUTRITION_REPLY: &str = "Snapshot\n\
[START_NUTRITION_GUIDE]\n| Nutrient | Recommended Amount |\n[END_NUTRITION_GUIDE]\n\
[START_RESOURCES]\n- CDC milestones\n[END_RESOURCES]\n\
### Your Gentle Feeding & Care Plan\n- Step one\n";

    #[test]
    fn feeding_reply_splits_into_named_sections() {
        let parsed = parse(FEEDING_REPLY, &FEEDING_LAYOUT);

        let names: Vec<&str> = match &parsed {
            ParsedResponse::Parsed { sections } => {
                sections.iter().map(|s| s.name).collect()
            }
            other => panic!("expected parsed, got {:?}", other),
        };
        assert_eq!(
            names,
            vec!["leading", "feeding_plan", "troubleshooting", "resources"]
        );
        assert_eq!(
            parsed.section("leading"),
            Some("### Snapshot\nBaby latches well.\n\n")
        );
        assert_eq!(parsed.section("feeding_plan"), Some("\n- Feed on demand\n"));
        assert_eq!(
            parsed.section("troubleshooting"),
            Some("\n| Common Challenge | Suggested Technique |\n")
        );
        assert_eq!(parsed.section("resources"), Some("\n- WHO\n"));
    }

    #[test]
    fn nutrition_reply_keeps_trailing_care_plan() {
        let parsed = parse(NUTRITION_REPLY, &NUTRITION_LAYOUT);
        assert_eq!(parsed.section("leading"), Some("Snapshot\n"));
        assert_eq!(
            parsed.section("nutrition_guide"),
            Some("\n| Nutrient | Recommended Amount |\n")
        );
        assert_eq!(parsed.section("resources"), Some("\n- CDC milestones\n"));
        assert_eq!(
            parsed.section("care_plan"),
            Some("\n### Your Gentle Feeding & Care Plan\n- Step one\n")
        );
    }

    #[test]
    fn sections_reconstruct_the_reply_without_markers() {
        // Nothing between an end marker and the next start marker, so the
        // slices cover the whole reply.
        let reply = "lead[START_NUTRITION_GUIDE]guide[END_NUTRITION_GUIDE]\
[START_RESOURCES]links[END_RESOURCES]tail";
        let parsed = parse(reply, &NUTRITION_LAYOUT);

        let rebuilt: String = match &parsed {
            ParsedResponse::Parsed { sections } => {
                sections.iter().map(|s| s.text.as_str()).collect()
            }
            other => panic!("expected parsed, got {:?}", other),
        };
        let stripped = NUTRITION_LAYOUT
            .markers()
            .fold(reply.to_string(), |acc, marker| acc.replace(marker, ""));
        assert_eq!(rebuilt, stripped);
    }

    #[test]
    fn missing_marker_returns_whole_text() {
        let reply = FEEDING_REPLY.replace("[END_RESOURCES]", "");
        let parsed = parse(&reply, &FEEDING_LAYOUT);
        assert_eq!(parsed, ParsedResponse::Unparsed { raw: reply.clone() });
    }

    #[test]
    fn fallback_is_idempotent() {
        let reply = "no markers here at all";
        let once = parse(reply, &FEEDING_LAYOUT);
        let raw = match &once {
            ParsedResponse::Unparsed { raw } => raw.clone(),
            other => panic!("expected unparsed, got {:?}", other),
        };
        assert_eq!(parse(&raw, &FEEDING_LAYOUT), once);
    }

    #[test]
    fn end_before_start_falls_back() {
        let reply = "x[END_FEEDING_PLAN][START_FEEDING_PLAN]plan\
[START_TROUBLESHOOTING]t[END_TROUBLESHOOTING][START_RESOURCES]r[END_RESOURCES]";
        assert!(!parse(reply, &FEEDING_LAYOUT).is_parsed());
    }

    #[test]
    fn repeated_marker_uses_first_occurrence() {
        let reply = "lead[START_FEEDING_PLAN]one[END_FEEDING_PLAN]more[END_FEEDING_PLAN]\
[START_TROUBLESHOOTING]t[END_TROUBLESHOOTING][START_RESOURCES]r[END_RESOURCES]";
        let parsed = parse(reply, &FEEDING_LAYOUT);
        // "more" is silently lost.
        assert_eq!(parsed.section("feeding_plan"), Some("one"));
    }

    #[test]
    fn unstructured_layout_never_splits() {
        let parsed = parse(FEEDING_REPLY, &UNSTRUCTURED_LAYOUT);
        assert!(!parsed.is_parsed());
        assert!(!UNSTRUCTURED_LAYOUT.is_structured());
    }
}
