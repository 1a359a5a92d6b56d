use serde::Serialize;

use super::PendingAlerts;

const DIGEST_COLOR: u32 = 16711680; // Red
const MAX_FIELDS_PER_EMBED: usize = 25;
const MAX_EMBEDS_PER_MESSAGE: usize = 10;
const MAX_FIELD_VALUE_CHARS: usize = 1024;
const MAX_MESSAGE_CHARS: usize = 6000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn chars(&self) -> usize {
        self.name.chars().count() + self.value.chars().count()
    }
}

/// One webhook message of a digest and the number of alerts it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestPart {
    pub message: Message,
    pub alerts: usize,
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let mut out: String = value.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

struct PartBuilder<'a> {
    title: &'a str,
    embeds: Vec<Embed>,
    chars: usize,
    alerts: usize,
}

impl<'a> PartBuilder<'a> {
    fn new(title: &'a str) -> Self {
        Self {
            title,
            embeds: Vec::new(),
            chars: 0,
            alerts: 0,
        }
    }

    fn needs_new_embed(&self) -> bool {
        self.embeds
            .last()
            .is_none_or(|embed| embed.fields.len() >= MAX_FIELDS_PER_EMBED)
    }

    fn fits(&self, field: &EmbedField) -> bool {
        if self.alerts == 0 {
            return true;
        }
        let mut needed = field.chars();
        if self.needs_new_embed() {
            if self.embeds.len() >= MAX_EMBEDS_PER_MESSAGE {
                return false;
            }
            needed += self.title.chars().count();
        }
        self.chars + needed <= MAX_MESSAGE_CHARS
    }

    fn describe(&mut self, description: String) {
        self.chars += description.chars().count();
        self.open_embed();
        if let Some(embed) = self.embeds.last_mut() {
            embed.description = Some(description);
        }
    }

    fn open_embed(&mut self) {
        self.chars += self.title.chars().count();
        self.embeds.push(Embed {
            title: Some(self.title.to_owned()),
            description: None,
            color: Some(DIGEST_COLOR),
            fields: Vec::new(),
        });
    }

    fn push(&mut self, field: EmbedField) {
        if self.needs_new_embed() {
            self.open_embed();
        }
        self.chars += field.chars();
        self.alerts += 1;
        if let Some(embed) = self.embeds.last_mut() {
            embed.fields.push(field);
        }
    }

    fn finish(self) -> DigestPart {
        DigestPart {
            message: Message {
                content: None,
                embeds: self.embeds,
            },
            alerts: self.alerts,
        }
    }
}

/// Builds the webhook messages for one digest.
///
/// Alerts are numbered in queue order. A digest that exceeds the webhook
/// limits (25 fields per embed, 10 embeds or 6000 characters per message) is
/// split into several messages that must be sent in order.
pub fn build_digest(host_id: &str, pending: &PendingAlerts) -> Vec<DigestPart> {
    let title = format!("Worker Alerts: {host_id}");
    let mut parts = Vec::new();
    let mut builder = PartBuilder::new(&title);
    if pending.dropped > 0 {
        builder.describe(format!(
            "{} older alert(s) were dropped because the alert queue was full.",
            pending.dropped
        ));
    }

    for (i, alert) in pending.alerts.iter().enumerate() {
        let field = EmbedField {
            name: format!("Alert #{}", i + 1),
            value: truncate(alert, MAX_FIELD_VALUE_CHARS),
            inline: false,
        };
        if !builder.fits(&field) {
            parts.push(builder.finish());
            builder = PartBuilder::new(&title);
        }
        builder.push(field);
    }
    if builder.alerts > 0 || !builder.embeds.is_empty() {
        parts.push(builder.finish());
    }

    parts
}
