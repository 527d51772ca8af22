//! Adaptive card layout for notifications.

use serde::Serialize;

use crate::domain::entities::NotificationContent;

const SCHEMA_URL: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardSettings {
    pub header_image_url: Option<String>,
    pub footer_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdaptiveCard {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub version: &'static str,
    pub body: Vec<CardElement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<CardAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CardElement {
    TextBlock {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        weight: Option<&'static str>,
        #[serde(
            rename = "horizontalAlignment",
            skip_serializing_if = "Option::is_none"
        )]
        horizontal_alignment: Option<&'static str>,
        wrap: bool,
    },
    Image {
        url: String,
        size: &'static str,
        spacing: &'static str,
        #[serde(rename = "altText")]
        alt_text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub url: String,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn image(url: &str) -> CardElement {
    CardElement::Image {
        url: url.to_string(),
        size: "Stretch",
        spacing: "Default",
        alt_text: String::new(),
    }
}

fn text(text: &str, size: Option<&'static str>, weight: Option<&'static str>) -> CardElement {
    CardElement::TextBlock {
        text: text.to_string(),
        size,
        weight,
        horizontal_alignment: None,
        wrap: true,
    }
}

/// Render the card: optional header image, centered title, optional image, summary, and
/// author, then the optional footer image. The button appears only with both a title and a link.
pub fn render_card(content: &NotificationContent, settings: &CardSettings) -> AdaptiveCard {
    let mut body = Vec::new();

    if let Some(url) = present(&settings.header_image_url) {
        body.push(image(url));
    }

    body.push(CardElement::TextBlock {
        text: content.title.clone(),
        size: Some("ExtraLarge"),
        weight: Some("Bolder"),
        horizontal_alignment: Some("Center"),
        wrap: true,
    });

    if let Some(url) = present(&content.image_link) {
        body.push(image(url));
    }
    if let Some(summary) = present(&content.summary) {
        body.push(text(summary, None, None));
    }
    if let Some(author) = present(&content.author) {
        body.push(text(author, Some("Small"), Some("Lighter")));
    }
    if let Some(url) = present(&settings.footer_image_url) {
        body.push(image(url));
    }

    let actions = match (present(&content.button_title), present(&content.button_link)) {
        (Some(title), Some(url)) => vec![CardAction {
            kind: "Action.OpenUrl",
            title: title.to_string(),
            url: url.to_string(),
        }],
        _ => Vec::new(),
    };

    AdaptiveCard {
        kind: "AdaptiveCard",
        schema: SCHEMA_URL,
        version: SCHEMA_VERSION,
        body,
        actions,
    }
}
