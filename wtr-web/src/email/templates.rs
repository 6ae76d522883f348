//! Email rendering
//!
//! Sequence steps are static copy with `{first_name}`, `{code}` and
//! `{percent}` placeholders, rendered against current lead data at send time.
//! Lead-supplied text is HTML-escaped.

use wtr_common::config::SiteConfig;
use wtr_common::models::{Lead, Order};
use wtr_common::pricing::{format_usd, lookup_promo};

use super::EmailContent;

/// Values available to a sequence template
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub first_name: &'a str,
    pub base_url: &'a str,
    pub unsubscribe_url: String,
}

impl<'a> TemplateContext<'a> {
    pub fn for_lead(lead: &'a Lead, site: &'a SiteConfig) -> Self {
        let base_url = site.base_url.trim_end_matches('/');
        Self {
            first_name: lead.display_name(),
            base_url,
            unsubscribe_url: unsubscribe_url(base_url, &lead.id),
        }
    }
}

pub fn unsubscribe_url(base_url: &str, lead_id: &str) -> String {
    format!(
        "{}/api/leads/{}/unsubscribe",
        base_url.trim_end_matches('/'),
        lead_id
    )
}

/// One sequence email
#[derive(Debug, Clone, Copy)]
pub struct StepTemplate {
    pub subject: &'static str,
    pub heading: &'static str,
    pub paragraphs: &'static [&'static str],
    pub cta_label: &'static str,
    /// Site-relative link target
    pub cta_path: &'static str,
    pub promo_code: Option<&'static str>,
}

impl StepTemplate {
    pub fn render(&self, ctx: &TemplateContext<'_>) -> EmailContent {
        let code = self.promo_code.unwrap_or("");
        let percent = self
            .promo_code
            .and_then(lookup_promo)
            .map(|promo| promo.percent_off.to_string())
            .unwrap_or_default();

        let fill = |text: &str, name: &str| {
            text.replace("{first_name}", name)
                .replace("{code}", code)
                .replace("{percent}", &percent)
        };

        let escaped_name = escape_html(ctx.first_name);
        let cta_label = fill(self.cta_label, ctx.first_name);
        let cta_url = format!("{}{}", ctx.base_url, self.cta_path);

        let html_paragraphs: Vec<String> = self
            .paragraphs
            .iter()
            .map(|p| fill(p, &escaped_name))
            .collect();
        let text_paragraphs: Vec<String> = self
            .paragraphs
            .iter()
            .map(|p| fill(p, ctx.first_name))
            .collect();

        EmailContent {
            subject: fill(self.subject, ctx.first_name),
            html: layout_html(
                &fill(self.heading, &escaped_name),
                &html_paragraphs,
                Some((cta_label.as_str(), cta_url.as_str())),
                Some(ctx.unsubscribe_url.as_str()),
            ),
            text: layout_text(
                &fill(self.heading, ctx.first_name),
                &text_paragraphs,
                Some((cta_label.as_str(), cta_url.as_str())),
                Some(ctx.unsubscribe_url.as_str()),
            ),
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `paragraphs` must already be escaped
fn layout_html(
    heading: &str,
    paragraphs: &[String],
    cta: Option<(&str, &str)>,
    unsubscribe: Option<&str>,
) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><body style=\"font-family:Arial,sans-serif;color:#1f2933;max-width:600px;margin:0 auto;padding:24px\">",
    );
    html.push_str(&format!("<h1 style=\"font-size:22px\">{}</h1>", heading));
    for paragraph in paragraphs {
        html.push_str(&format!("<p style=\"line-height:1.5\">{}</p>", paragraph));
    }
    if let Some((label, url)) = cta {
        html.push_str(&format!(
            "<p><a href=\"{}\" style=\"background:#2563eb;color:#fff;padding:12px 20px;border-radius:6px;text-decoration:none\">{}</a></p>",
            escape_html(url),
            escape_html(label)
        ));
    }
    html.push_str(
        "<hr style=\"margin-top:32px\"><p style=\"font-size:12px;color:#6b7280\">WipeThatRecord helps Californians clear eligible convictions. This is not legal advice.</p>",
    );
    if let Some(url) = unsubscribe {
        html.push_str(&format!(
            "<p style=\"font-size:12px\"><a href=\"{}\">Unsubscribe</a></p>",
            escape_html(url)
        ));
    }
    html.push_str("</body></html>");
    html
}

fn layout_text(
    heading: &str,
    paragraphs: &[String],
    cta: Option<(&str, &str)>,
    unsubscribe: Option<&str>,
) -> String {
    let mut text = format!("{}\n\n", heading);
    for paragraph in paragraphs {
        text.push_str(paragraph);
        text.push_str("\n\n");
    }
    if let Some((label, url)) = cta {
        text.push_str(&format!("{}: {}\n\n", label, url));
    }
    text.push_str("--\nWipeThatRecord helps Californians clear eligible convictions. This is not legal advice.\n");
    if let Some(url) = unsubscribe {
        text.push_str(&format!("Unsubscribe: {}\n", url));
    }
    text
}

/// Receipt sent to the customer after checkout
pub fn order_confirmation(order: &Order, base_url: &str) -> EmailContent {
    let name = order
        .customer
        .name
        .split_whitespace()
        .next()
        .unwrap_or("there");

    let lines: Vec<String> = order
        .items
        .iter()
        .map(|item| {
            format!(
                "{} × {}: {}",
                item.quantity,
                item.product_name,
                format_usd(item.total_cents)
            )
        })
        .collect();

    let mut summary = vec![format!("Subtotal: {}", format_usd(order.subtotal_cents))];
    if order.discount_cents > 0 {
        summary.push(format!(
            "Discount ({}): -{}",
            order.promo_code.as_deref().unwrap_or("promo"),
            format_usd(order.discount_cents)
        ));
    }
    if order.tax_cents > 0 {
        summary.push(format!("Tax: {}", format_usd(order.tax_cents)));
    }
    summary.push(format!("Total: {}", format_usd(order.total_cents)));

    let intro = format!(
        "Thanks {}, we received order {}. We will email you as soon as work on your petition starts.",
        name, order.order_number
    );
    let order_url = format!("{}/account/orders", base_url.trim_end_matches('/'));

    let mut html_paragraphs = vec![escape_html(&intro)];
    html_paragraphs.push(
        lines
            .iter()
            .map(|l| escape_html(l))
            .collect::<Vec<_>>()
            .join("<br>"),
    );
    html_paragraphs.push(summary.join("<br>"));

    let mut text_paragraphs = vec![intro];
    text_paragraphs.push(lines.join("\n"));
    text_paragraphs.push(summary.join("\n"));

    EmailContent {
        subject: format!("Order {} confirmed", order.order_number),
        html: layout_html(
            "Your order is confirmed",
            &html_paragraphs,
            Some(("View your order", order_url.as_str())),
            None,
        ),
        text: layout_text(
            "Your order is confirmed",
            &text_paragraphs,
            Some(("View your order", order_url.as_str())),
            None,
        ),
    }
}

/// Operations inbox alert for a newly captured lead
pub fn new_lead_notification(lead: &Lead, base_url: &str) -> EmailContent {
    let field = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    let rows = vec![
        format!("Name: {} {}", lead.first_name, lead.last_name),
        format!("Email: {}", lead.email),
        format!("Phone: {}", field(lead.phone.clone())),
        format!("County: {}", field(lead.county.clone())),
        format!(
            "Conviction: {} ({})",
            field(lead.conviction_type.map(|c| c.to_string())),
            field(lead.conviction_year.map(|y| y.to_string()))
        ),
        format!("Urgency: {}", field(lead.urgency.map(|u| u.to_string()))),
        format!("Score: {} ({})", lead.lead_score, lead.lead_segment),
        format!("Source: {}", field(lead.source.clone())),
    ];

    let admin_url = format!(
        "{}/admin/leads/{}",
        base_url.trim_end_matches('/'),
        lead.id
    );
    let html_rows = rows
        .iter()
        .map(|r| escape_html(r))
        .collect::<Vec<_>>()
        .join("<br>");

    EmailContent {
        subject: format!(
            "New {} lead: {} (score {})",
            lead.lead_segment, lead.email, lead.lead_score
        ),
        html: layout_html(
            "New lead",
            &[html_rows],
            Some(("Open in admin", admin_url.as_str())),
            None,
        ),
        text: layout_text(
            "New lead",
            &[rows.join("\n")],
            Some(("Open in admin", admin_url.as_str())),
            None,
        ),
    }
}
