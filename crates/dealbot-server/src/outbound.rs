//! Structured replies. The conversation layer builds these; a
//! [`MessageSink`] turns them into wire requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealbot_core::{local_offset, Category, Deal, Reminder, ReminderDelay};

use crate::error::ServerError;

/// WhatsApp's limit on reply-button titles.
pub const MAX_BUTTON_TITLE: usize = 20;
/// WhatsApp's limit on buttons per interactive message.
pub const MAX_BUTTONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub id: String,
    pub title: String,
}

impl Button {
    pub fn new(id: impl Into<String>, title: &str) -> Self {
        Self {
            id: id.into(),
            title: title.chars().take(MAX_BUTTON_TITLE).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Buttons {
        body: String,
        buttons: Vec<Button>,
    },
    List {
        body: String,
        button_label: String,
        rows: Vec<ListRow>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        name: String,
        address: String,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        OutboundMessage::Text(body.into())
    }

    /// Extra buttons beyond [`MAX_BUTTONS`] are dropped.
    pub fn buttons(body: impl Into<String>, mut buttons: Vec<Button>) -> Self {
        buttons.truncate(MAX_BUTTONS);
        OutboundMessage::Buttons {
            body: body.into(),
            buttons,
        }
    }
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, to: &str, message: &OutboundMessage) -> Result<(), ServerError>;
}

pub fn welcome() -> OutboundMessage {
    OutboundMessage::text(
        "Hi! I find deals near you. Share your location using the attachment \
         button and pick what you're looking for.",
    )
}

pub fn ask_location() -> OutboundMessage {
    OutboundMessage::text("Please share your location so I can look for deals nearby.")
}

pub fn category_menu(area: &str) -> OutboundMessage {
    OutboundMessage::List {
        body: format!("Got it, you're near {area}. What kind of deals are you after?"),
        button_label: "Categories".to_string(),
        rows: Category::ALL
            .iter()
            .map(|c| ListRow {
                id: format!("category_{}", c.as_str()),
                title: c.label().to_string(),
                description: None,
            })
            .collect(),
    }
}

pub fn describe_deal(index: usize, deal: &Deal) -> String {
    format!(
        "*{}. {}*\n{}",
        index + 1,
        deal.business_name,
        deal_details(deal)
    )
}

/// Offer and whichever optional fields are present, one per line.
fn deal_details(deal: &Deal) -> String {
    let mut lines = vec![deal.offer.clone()];
    if !deal.address.is_empty() {
        lines.push(format!("Address: {}", deal.address));
    }
    if let Some(price) = &deal.price {
        lines.push(format!("Price: {price}"));
    }
    if let Some(validity) = &deal.validity {
        lines.push(format!("Valid: {validity}"));
    }
    if let Some(contact) = &deal.contact {
        lines.push(format!("Contact: {contact}"));
    }
    if !deal.verified {
        lines.push("_Unverified_".to_string());
    }
    lines.join("\n")
}

/// One message per deal with its action buttons, then the follow-up menu.
pub fn deal_list(deals: &[Deal]) -> Vec<OutboundMessage> {
    let mut out: Vec<OutboundMessage> = deals
        .iter()
        .enumerate()
        .map(|(i, deal)| {
            OutboundMessage::buttons(
                describe_deal(i, deal),
                vec![
                    Button::new(format!("get_directions_{i}"), "Directions"),
                    Button::new(format!("set_reminder_{i}"), "Remind me"),
                    Button::new(format!("share_deal_{i}"), "Share"),
                ],
            )
        })
        .collect();
    out.push(follow_up_menu("Want to see more?"));
    out
}

pub fn follow_up_menu(body: &str) -> OutboundMessage {
    OutboundMessage::buttons(
        body,
        vec![
            Button::new("more_deals", "More deals"),
            Button::new("share_all", "Share all"),
            Button::new("new_search", "New search"),
        ],
    )
}

pub fn no_deals() -> OutboundMessage {
    OutboundMessage::buttons(
        "Sorry, I couldn't find any deals there right now.",
        vec![Button::new("new_search", "New search")],
    )
}

pub fn reminder_options(deal: &Deal) -> OutboundMessage {
    let delays = [
        (ReminderDelay::OneHour, "In 1 hour"),
        (ReminderDelay::TwoHours, "In 2 hours"),
        (ReminderDelay::FourHours, "In 4 hours"),
    ];
    OutboundMessage::buttons(
        format!(
            "When should I remind you about {}? Pick one or type a time like \"in 3 hours\" or \"at 8 pm\".",
            deal.business_name
        ),
        delays
            .into_iter()
            .map(|(d, title)| Button::new(d.button_id(), title))
            .collect(),
    )
}

/// `18 Oct, 8:00 PM` in Singapore time.
pub fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&local_offset())
        .format("%-d %b, %-I:%M %p")
        .to_string()
}

pub fn reminder_set(deal: &Deal, at: DateTime<Utc>) -> OutboundMessage {
    OutboundMessage::text(format!(
        "Done! I'll remind you about {} at {}.",
        deal.business_name,
        local_time(at)
    ))
}

pub fn reminder_due(reminder: &Reminder) -> OutboundMessage {
    OutboundMessage::text(format!(
        "Reminder: {}\n\n{}",
        reminder.deal_snapshot.business_name,
        deal_details(&reminder.deal_snapshot)
    ))
}

/// Plain-text card a user can forward.
pub fn share_text(deals: &[Deal]) -> OutboundMessage {
    let body = deals
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let mut line = format!("{}. {}: {}", i + 1, d.business_name, d.offer);
            if !d.address.is_empty() {
                line.push_str(&format!(" ({})", d.address));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");
    OutboundMessage::text(format!("Deals I found:\n{body}"))
}

pub fn directions(deal: &Deal) -> OutboundMessage {
    match (deal.latitude, deal.longitude) {
        (Some(latitude), Some(longitude)) => OutboundMessage::Location {
            latitude,
            longitude,
            name: deal.business_name.clone(),
            address: deal.address.clone(),
        },
        _ => {
            let query = format!("{} {}", deal.business_name, deal.address);
            let mut url = reqwest::Url::parse("https://www.google.com/maps/search/")
                .expect("static maps URL parses");
            url.query_pairs_mut()
                .append_pair("api", "1")
                .append_pair("query", query.trim());
            OutboundMessage::text(format!("{}\n{}\n{url}", deal.business_name, deal.address))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn deal() -> Deal {
        let mut d = Deal::new(
            "google_cse",
            Category::Food,
            "Kopi Corner",
            "1-for-1 kopi",
            "530349",
            Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
        );
        d.address = "349 Hougang Ave 7".to_string();
        d
    }

    #[test]
    fn button_titles_are_truncated() {
        let b = Button::new("x", "A title that is far too long");
        assert_eq!(b.title.chars().count(), MAX_BUTTON_TITLE);
    }

    #[test]
    fn deal_list_indexes_buttons_by_position() {
        let deals = vec![deal(), deal()];
        let messages = deal_list(&deals);
        assert_eq!(messages.len(), 3);
        let OutboundMessage::Buttons { body, buttons } = &messages[1] else {
            panic!("expected buttons");
        };
        assert!(body.starts_with("*2. Kopi Corner*"));
        assert!(body.contains("_Unverified_"));
        let ids: Vec<&str> = buttons.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["get_directions_1", "set_reminder_1", "share_deal_1"]);
    }

    #[test]
    fn category_menu_uses_category_ids() {
        let OutboundMessage::List { rows, .. } = category_menu("Hougang") else {
            panic!("expected list");
        };
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].id, "category_food");
    }

    #[test]
    fn directions_without_coordinates_link_to_maps() {
        let OutboundMessage::Text(body) = directions(&deal()) else {
            panic!("expected text");
        };
        assert!(body.contains("https://www.google.com/maps/search/?api=1&query=Kopi+Corner+349+Hougang+Ave+7"));
    }

    #[test]
    fn local_time_is_singapore() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        assert_eq!(local_time(at), "18 Oct, 8:00 PM");
    }
}
