//! Portfolio page rendering.
//!
//! A static HTML template marks each bindable region with a pair of
//! comments:
//!
//! ```text
//! <!-- folio:projects -->static fallback<!-- /folio:projects -->
//! ```
//!
//! Rendering replaces the content between the markers with markup built
//! from the parsed document. A section that is missing from the document
//! leaves its fallback in place; a marker pair that is missing from the
//! template is reported in [`RenderedPage::missing_anchors`]. Neither stops
//! the other sections from binding.
//!
//! Document values are inserted as HTML, so entries such as descriptions
//! may carry inline markup. Plain-text slots (the title pill and footer)
//! are escaped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::links::apply_auto_links;
use crate::rank::{chart_markup, AxisMode, ChartSpec, RankFeed, RankSummary};

const HERO_SPAN_STYLE: &str = "background:linear-gradient(135deg,var(--accent),var(--accent-2)); \
     -webkit-background-clip:text; background-clip:text; color:transparent";

/// Title text shown when the document could not be fetched or parsed.
pub const ERROR_PILL: &str = "Error loading portfolio data. Please check the console for details.";

/// The parsed portfolio document. Read-only after parse.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioDocument {
    root: Value,
}

impl PortfolioDocument {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.root.get(name).filter(|v| !v.is_null())
    }

    /// `auto_links` entries in document order. Non-string URLs are skipped.
    pub fn auto_links(&self) -> Vec<(&str, &str)> {
        self.section("auto_links")
            .and_then(Value::as_object)
            .map(|links| {
                links
                    .iter()
                    .filter_map(|(phrase, url)| url.as_str().map(|u| (phrase.as_str(), u)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Fallback text for fields a document entry leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub project_title: String,
    pub description: String,
    pub link_text: String,
    pub link: String,
    pub category: String,
    pub highlight_title: String,
    pub no_items: String,
    pub company: String,
    pub role: String,
    pub period: String,
    pub location: String,
    pub email: String,
    pub phone: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            project_title: "Untitled Project".into(),
            description: "No description available".into(),
            link_text: "View →".into(),
            link: "#".into(),
            category: "Unknown Category".into(),
            highlight_title: "Untitled Highlight".into(),
            no_items: "No items available".into(),
            company: "Unknown Company".into(),
            role: "Unknown Role".into(),
            period: "Unknown Period".into(),
            location: "Unknown Location".into(),
            email: "No email".into(),
            phone: "No phone".into(),
        }
    }
}

/// Named regions of the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    Title,
    Hero,
    Description,
    QuickFacts,
    SkillsTags,
    Projects,
    Skills,
    Highlights,
    Experience,
    Contact,
    FooterName,
    FooterMessage,
    RankChart,
    CurrentRank,
    BestRank,
    DaysTracked,
}

impl Anchor {
    pub const ALL: [Anchor; 16] = [
        Anchor::Title,
        Anchor::Hero,
        Anchor::Description,
        Anchor::QuickFacts,
        Anchor::SkillsTags,
        Anchor::Projects,
        Anchor::Skills,
        Anchor::Highlights,
        Anchor::Experience,
        Anchor::Contact,
        Anchor::FooterName,
        Anchor::FooterMessage,
        Anchor::RankChart,
        Anchor::CurrentRank,
        Anchor::BestRank,
        Anchor::DaysTracked,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Anchor::Title => "title",
            Anchor::Hero => "hero",
            Anchor::Description => "description",
            Anchor::QuickFacts => "quick-facts",
            Anchor::SkillsTags => "skills-tags",
            Anchor::Projects => "projects",
            Anchor::Skills => "skills",
            Anchor::Highlights => "highlights",
            Anchor::Experience => "experience",
            Anchor::Contact => "contact",
            Anchor::FooterName => "footer-name",
            Anchor::FooterMessage => "footer-message",
            Anchor::RankChart => "rank-chart",
            Anchor::CurrentRank => "current-rank",
            Anchor::BestRank => "best-rank",
            Anchor::DaysTracked => "days-tracked",
        }
    }

    fn open_marker(self) -> String {
        format!("<!-- folio:{} -->", self.name())
    }

    fn close_marker(self) -> String {
        format!("<!-- /folio:{} -->", self.name())
    }
}

/// Replace the content of every `anchor` marker pair. `None` when the
/// template has no complete pair.
pub fn replace_anchor(html: &str, anchor: Anchor, content: &str) -> Option<String> {
    let open = anchor.open_marker();
    let close = anchor.close_marker();
    let mut out = String::with_capacity(html.len() + content.len());
    let mut rest = html;
    let mut replaced = false;

    while let Some(start) = rest.find(&open) {
        let body_start = start + open.len();
        let Some(body_len) = rest[body_start..].find(&close) else {
            break;
        };
        out.push_str(&rest[..body_start]);
        out.push_str(content);
        out.push_str(&close);
        rest = &rest[body_start + body_len + close.len()..];
        replaced = true;
    }

    if !replaced {
        return None;
    }
    out.push_str(rest);
    Some(out)
}

/// Chart and summary derived from the rank feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankChart {
    pub spec: ChartSpec,
    pub summary: RankSummary,
}

impl RankChart {
    /// `None` when the feed has no usable samples.
    pub fn from_feed(feed: &RankFeed, axis: AxisMode) -> Option<Self> {
        let daily = feed.daily_best();
        let summary = RankSummary::from_daily(&daily)?;
        Some(Self {
            spec: ChartSpec::new(&daily, axis),
            summary,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub html: String,
    pub bound: Vec<Anchor>,
    pub missing_anchors: Vec<Anchor>,
}

struct Binder {
    html: String,
    bound: Vec<Anchor>,
    missing: Vec<Anchor>,
}

impl Binder {
    fn new(template: &str) -> Self {
        Self {
            html: template.to_string(),
            bound: Vec::new(),
            missing: Vec::new(),
        }
    }

    fn bind(&mut self, anchor: Anchor, content: &str) {
        match replace_anchor(&self.html, anchor, content) {
            Some(html) => {
                self.html = html;
                self.bound.push(anchor);
            }
            None => {
                warn!(anchor = anchor.name(), "template has no anchor");
                self.missing.push(anchor);
            }
        }
    }

    fn finish(self) -> RenderedPage {
        RenderedPage {
            html: self.html,
            bound: self.bound,
            missing_anchors: self.missing,
        }
    }
}

pub fn render_page(
    template: &str,
    doc: &PortfolioDocument,
    rank: Option<&RankChart>,
    defaults: &Defaults,
) -> RenderedPage {
    let mut binder = Binder::new(template);
    populate_personal(&mut binder, doc);
    populate_projects(&mut binder, doc, defaults);
    populate_skills(&mut binder, doc, defaults);
    populate_highlights(&mut binder, doc, defaults);
    populate_experience(&mut binder, doc, defaults);
    populate_contact(&mut binder, doc, defaults);
    populate_footer(&mut binder, doc);
    match rank {
        Some(chart) => populate_rank(&mut binder, chart),
        None => debug!("no rank data, chart left as is"),
    }
    binder.finish()
}

/// The page shown when the document could not be loaded.
pub fn render_error_page(template: &str, message: &str) -> RenderedPage {
    warn!(error = message, "rendering error page");
    let mut binder = Binder::new(template);
    binder.bind(Anchor::Title, &escape_text(ERROR_PILL));
    binder.bind(Anchor::Hero, &format!("{}.", hero("Error")));
    binder.finish()
}

fn hero(name: &str) -> String {
    format!("Hi, I'm <span style=\"{}\">{}</span>", HERO_SPAN_STYLE, name)
}

/// Escape text for a slot that shows plain text.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// A field's display text. Empty strings, `false`, `null`, and nested
/// values count as absent.
fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn list(value: &Value, key: &str) -> Option<Vec<String>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|v| scalar(v).unwrap_or_default()).collect())
}

fn wrap_each(items: &[String], open: &str, close: &str, sep: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}{}", open, item, close))
        .collect::<Vec<_>>()
        .join(sep)
}

fn section_array<'a>(doc: &'a PortfolioDocument, name: &str) -> Option<&'a Vec<Value>> {
    match doc.section(name) {
        Some(Value::Array(entries)) => Some(entries),
        Some(_) => {
            warn!(section = name, "section is not a list, skipping");
            None
        }
        None => {
            warn!(section = name, "no section found, skipping");
            None
        }
    }
}

fn section_object<'a>(doc: &'a PortfolioDocument, name: &str) -> Option<&'a Value> {
    match doc.section(name) {
        Some(value) if value.is_object() => Some(value),
        Some(_) => {
            warn!(section = name, "section is not a mapping, skipping");
            None
        }
        None => {
            warn!(section = name, "no section found, skipping");
            None
        }
    }
}

fn populate_personal(binder: &mut Binder, doc: &PortfolioDocument) {
    let Some(personal) = section_object(doc, "personal") else {
        return;
    };
    if let Some(title) = text(personal, "title") {
        binder.bind(Anchor::Title, &escape_text(&title));
    }
    if let Some(name) = text(personal, "name") {
        binder.bind(Anchor::Hero, &hero(&name));
    }
    if let Some(description) = text(personal, "description") {
        binder.bind(
            Anchor::Description,
            &apply_auto_links(&description, doc.auto_links()),
        );
    }
    if let Some(facts) = list(personal, "quick_facts") {
        binder.bind(Anchor::QuickFacts, &wrap_each(&facts, "<li>", "</li>", ""));
    }
    if let Some(tags) = list(personal, "skills_tags") {
        binder.bind(
            Anchor::SkillsTags,
            &wrap_each(&tags, "<span class=\"tag\">", "</span>", ""),
        );
    }
}

fn populate_projects(binder: &mut Binder, doc: &PortfolioDocument, d: &Defaults) {
    let Some(projects) = section_array(doc, "projects") else {
        return;
    };
    let cards: String = projects
        .iter()
        .map(|p| {
            let tags = list(p, "tags")
                .map(|tags| wrap_each(&tags, "<span class=\"tag\">", "</span>", " "))
                .unwrap_or_default();
            format!(
                "\n      <article class=\"card project\">\n        <h3>{}</h3>\n        \
                 <p class=\"muted\">{}</p>\n        <p>{}</p>\n        \
                 <a class=\"btn ghost\" href=\"{}\">{}</a>\n      </article>\n    ",
                text(p, "title").unwrap_or_else(|| d.project_title.clone()),
                text(p, "description").unwrap_or_else(|| d.description.clone()),
                tags,
                text(p, "link").unwrap_or_else(|| d.link.clone()),
                text(p, "link_text").unwrap_or_else(|| d.link_text.clone()),
            )
        })
        .collect();
    binder.bind(Anchor::Projects, &cards);
}

fn populate_skills(binder: &mut Binder, doc: &PortfolioDocument, d: &Defaults) {
    let Some(skills) = section_array(doc, "skills") else {
        return;
    };
    let cards: String = skills
        .iter()
        .map(|s| {
            let body = match list(s, "items") {
                Some(items) => format!(
                    "<ul class=\"muted\">{}</ul>",
                    wrap_each(&items, "<li>", "</li>", "")
                ),
                None => format!(
                    "<p class=\"muted\">{}</p>",
                    text(s, "description").unwrap_or_else(|| d.description.clone())
                ),
            };
            format!(
                "\n      <div class=\"card\">\n        <h3>{}</h3>\n        {}\n      </div>\n    ",
                text(s, "category").unwrap_or_else(|| d.category.clone()),
                body
            )
        })
        .collect();
    binder.bind(Anchor::Skills, &cards);
}

fn populate_highlights(binder: &mut Binder, doc: &PortfolioDocument, d: &Defaults) {
    let Some(highlights) = section_array(doc, "highlights") else {
        return;
    };
    let cards: String = highlights
        .iter()
        .map(|h| {
            let items = match list(h, "items") {
                Some(items) => wrap_each(&items, "<li>", "</li>", ""),
                None => format!("<li>{}</li>", d.no_items),
            };
            format!(
                "\n      <div class=\"card\">\n        <h3>{}</h3>\n        \
                 <ul class=\"muted\">\n          {}\n        </ul>\n      </div>\n    ",
                text(h, "title").unwrap_or_else(|| d.highlight_title.clone()),
                items
            )
        })
        .collect();
    binder.bind(Anchor::Highlights, &cards);
}

fn populate_experience(binder: &mut Binder, doc: &PortfolioDocument, d: &Defaults) {
    let Some(experience) = section_array(doc, "experience") else {
        return;
    };
    let entries: String = experience
        .iter()
        .map(|e| {
            let description = text(e, "description")
                .map(|desc| format!("<p class=\"muted\">{}</p>", desc))
                .unwrap_or_default();
            let items = list(e, "items")
                .map(|items| {
                    format!(
                        "<ul class=\"muted\">{}</ul>",
                        wrap_each(&items, "<li>", "</li>", "")
                    )
                })
                .unwrap_or_default();
            let additional = text(e, "additional_period")
                .map(|period| {
                    format!(
                        "\n          <p class=\"muted\">{} · {} — {}</p>\n        ",
                        period,
                        text(e, "additional_location").unwrap_or_default(),
                        text(e, "additional_description").unwrap_or_default()
                    )
                })
                .unwrap_or_default();
            format!(
                "\n      <div class=\"tl-item\">\n        <h3>{} — {}</h3>\n        \
                 <p class=\"muted\">{} · {}</p>\n        {}\n        {}\n        {}\n      </div>\n    ",
                text(e, "company").unwrap_or_else(|| d.company.clone()),
                text(e, "role").unwrap_or_else(|| d.role.clone()),
                text(e, "period").unwrap_or_else(|| d.period.clone()),
                text(e, "location").unwrap_or_else(|| d.location.clone()),
                description,
                items,
                additional
            )
        })
        .collect();
    binder.bind(Anchor::Experience, &entries);
}

fn populate_contact(binder: &mut Binder, doc: &PortfolioDocument, d: &Defaults) {
    let Some(contact) = section_object(doc, "contact") else {
        return;
    };
    let headline = text(contact, "headline")
        .map(|h| format!("\n      <p>{}</p>", h))
        .unwrap_or_default();
    let email = text(contact, "email");
    let phone = text(contact, "phone_primary");
    let html = format!(
        "{}\n      <p>🔗 <a href=\"{}\">LinkedIn</a> · 💻 <a href=\"{}\">HackerRank</a></p>\n      \
         <p>✉️ <a href=\"mailto:{}\">{}</a></p>\n      \
         <p>📞 <a href=\"tel:{}\">{}</a></p>\n    ",
        headline,
        text(contact, "linkedin").unwrap_or_else(|| d.link.clone()),
        text(contact, "hackerrank").unwrap_or_else(|| d.link.clone()),
        email.clone().unwrap_or_default(),
        email.unwrap_or_else(|| d.email.clone()),
        phone.clone().unwrap_or_default(),
        phone.unwrap_or_else(|| d.phone.clone()),
    );
    binder.bind(Anchor::Contact, &html);
}

fn populate_footer(binder: &mut Binder, doc: &PortfolioDocument) {
    let Some(footer) = section_object(doc, "footer") else {
        return;
    };
    if let Some(name) = text(footer, "name") {
        binder.bind(Anchor::FooterName, &escape_text(&name));
    }
    if let Some(message) = text(footer, "message") {
        binder.bind(Anchor::FooterMessage, &escape_text(&message));
    }
}

fn populate_rank(binder: &mut Binder, chart: &RankChart) {
    binder.bind(Anchor::RankChart, &chart_markup(&chart.spec));
    binder.bind(Anchor::CurrentRank, &chart.summary.current_display());
    binder.bind(Anchor::BestRank, &chart.summary.best_display());
    binder.bind(Anchor::DaysTracked, &chart.summary.days_tracked.to_string());
}
