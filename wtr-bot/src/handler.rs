//! Message handling: commands, metric prompts, reply splitting

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};
use wtr_common::db::stats::{load_stats, StoreStats};
use wtr_common::pricing::format_usd;
use wtr_common::time;

use crate::error::{BotError, Result};
use crate::llm::{ChatCompletion, ChatMessage};

pub const USAGE: &str = "WipeThatRecord operations bot\n\n\
/stats - current lead, order and product numbers\n\
/help - this message\n\n\
Anything else is answered from the live store metrics.";

pub const APOLOGY: &str =
    "Sorry, I couldn't answer that right now. Please try again in a minute.";

const SYSTEM_PROMPT: &str = "You are the operations assistant for WipeThatRecord, a California \
record expungement service selling DIY kits, document review upgrades and full-service \
filings. Answer questions from the team using only the store metrics provided as JSON. \
Money values ending in _cents are US cents; report them in dollars. Product revenue is \
gross, before promo discounts; order revenue is what customers paid. Be concise. If the \
metrics cannot answer the question, say so.";

/// Answers operator messages from one allow-listed set of chats
pub struct Bot {
    db: SqlitePool,
    llm: Arc<dyn ChatCompletion>,
    allowed_chats: HashSet<i64>,
}

impl Bot {
    pub fn new(db: SqlitePool, llm: Arc<dyn ChatCompletion>, allowed_chats: &[i64]) -> Self {
        Self {
            db,
            llm,
            allowed_chats: allowed_chats.iter().copied().collect(),
        }
    }

    pub fn is_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chats.contains(&chat_id)
    }

    /// Reply for `text` from `chat_id`
    ///
    /// None for chats outside the allow-list. Failures become [`APOLOGY`].
    pub async fn respond(&self, chat_id: i64, text: &str) -> Option<String> {
        if !self.is_allowed(chat_id) {
            warn!(chat_id, "Ignoring message from chat outside allow-list");
            return None;
        }

        let text = text.trim();
        let command = text
            .split_whitespace()
            .next()
            .map(|word| word.split('@').next().unwrap_or(word));

        let reply = match command {
            Some("/start") | Some("/help") => Ok(USAGE.to_string()),
            Some("/stats") => load_stats(&self.db, time::now())
                .await
                .map(|stats| format_stats(&stats))
                .map_err(BotError::from),
            None => Ok(USAGE.to_string()),
            Some(_) => self.answer(text).await,
        };

        Some(reply.unwrap_or_else(|e| {
            warn!(chat_id, "Failed to answer message: {}", e);
            APOLOGY.to_string()
        }))
    }

    async fn answer(&self, question: &str) -> Result<String> {
        let stats = load_stats(&self.db, time::now()).await?;
        let messages = build_prompt(&stats, question)?;
        let answer = self.llm.complete(&messages).await?;
        info!(question_chars = question.len(), answer_chars = answer.len(), "Answered question");
        Ok(answer)
    }
}

/// System instructions, then the metrics and the question as one user turn
pub fn build_prompt(stats: &StoreStats, question: &str) -> Result<Vec<ChatMessage>> {
    let metrics = serde_json::to_string_pretty(stats)
        .map_err(|e| BotError::Parse(e.to_string()))?;

    Ok(vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Store metrics:\n```json\n{}\n```\n\nQuestion: {}",
            metrics, question
        )),
    ])
}

pub fn format_stats(stats: &StoreStats) -> String {
    let leads = &stats.leads;
    let orders = &stats.orders;
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "Store stats ({})", stats.generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Leads: {} total, {} new this week",
        leads.total, leads.new_last_7_days
    );
    let _ = writeln!(
        out,
        "  hot {} / warm {} / cold {}",
        leads.hot, leads.warm, leads.cold
    );
    let _ = writeln!(
        out,
        "  paid {} (DIY {}, upgraded {}, full service {}), unsubscribed {}",
        leads.paid, leads.diy_purchased, leads.upgraded, leads.full_service, leads.unsubscribed
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Orders: {} total, {} paid, {} pending, {} processing",
        orders.total, orders.paid, orders.pending, orders.processing
    );
    let _ = writeln!(
        out,
        "Revenue: {} all time, {} last 30 days, avg {}",
        format_usd(orders.revenue_cents),
        format_usd(orders.revenue_last_30_days_cents),
        format_usd(orders.average_order_cents())
    );

    if !stats.top_products.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Top products:");
        for product in &stats.top_products {
            let _ = writeln!(
                out,
                "  {}: {} sold, {} gross ({:.1}% of views)",
                product.name,
                product.sales,
                format_usd(product.revenue_cents),
                product.conversion_rate()
            );
        }
    }

    if !stats.email_jobs.is_empty() {
        let jobs: Vec<String> = stats
            .email_jobs
            .iter()
            .map(|c| format!("{} {}", c.status, c.count))
            .collect();
        let _ = writeln!(out);
        let _ = writeln!(out, "Email jobs: {}", jobs.join(", "));
    }

    out.trim_end().to_string()
}

/// Split `text` into chunks of at most `limit` characters
///
/// Breaks at the last newline inside the window when there is one.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        let (chunk, next) = match window.rfind('\n') {
            Some(nl) if nl > 0 => (&rest[..nl], &rest[nl + 1..]),
            _ => (window, &rest[window_end..]),
        };
        chunks.push(chunk.to_string());
        rest = next;
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_one_chunk() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
        assert_eq!(split_message("", 4096), vec![""]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 10), vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_split_hard_breaks_long_lines() {
        let text = "x".repeat(10_000);
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4096));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_counts_characters_not_bytes() {
        let text = "é".repeat(5);
        let chunks = split_message(&text, 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }
}
