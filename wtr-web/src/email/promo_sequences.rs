//! Promotional campaigns
//!
//! Broadcast to every subscribed lead that has not bought full service (see
//! `POST /api/admin/promos/:campaign/send`). Each campaign carries one promo
//! code, shown through the `{code}`/`{percent}` placeholders.

use wtr_common::models::ConversionStage;

use super::sequences::{Delay, Sequence, SequenceStep, StopCondition};
use super::templates::StepTemplate;

pub const CLEAN_SLATE_SALE: Sequence = Sequence {
    name: "clean_slate_sale",
    stop_when: StopCondition::StageAtLeast(ConversionStage::FullService),
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(0),
            template: StepTemplate {
                subject: "Clean Slate Sale: {percent}% off every package",
                heading: "Start fresh for less, {first_name}",
                paragraphs: &[
                    "For a limited time, every WipeThatRecord package is {percent}% off with code {code}.",
                    "DIY kit, document review or full service: the discount applies to your whole order.",
                ],
                cta_label: "Shop the sale",
                cta_path: "/pricing",
                promo_code: Some("CLEANSLATE25"),
            },
        },
        SequenceStep {
            delay: Delay::Days(2),
            template: StepTemplate {
                subject: "Halfway through the Clean Slate Sale",
                heading: "Still time to save {percent}%",
                paragraphs: &[
                    "The Clean Slate Sale is halfway done. Code {code} still takes {percent}% off any package.",
                ],
                cta_label: "Use my code",
                cta_path: "/pricing",
                promo_code: Some("CLEANSLATE25"),
            },
        },
        SequenceStep {
            delay: Delay::Days(4),
            template: StepTemplate {
                subject: "Last chance: {percent}% off ends tonight",
                heading: "Final hours, {first_name}",
                paragraphs: &[
                    "The Clean Slate Sale ends at midnight. Use {code} before then for {percent}% off.",
                ],
                cta_label: "Get started now",
                cta_path: "/pricing",
                promo_code: Some("CLEANSLATE25"),
            },
        },
    ],
};

pub const SECOND_CHANCE_MONTH: Sequence = Sequence {
    name: "second_chance_month",
    stop_when: StopCondition::StageAtLeast(ConversionStage::FullService),
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(0),
            template: StepTemplate {
                subject: "April is Second Chance Month",
                heading: "Everyone deserves a second chance",
                paragraphs: &[
                    "Second Chance Month recognises the millions of Americans rebuilding their lives after a conviction.",
                    "To celebrate, take {percent}% off any package with code {code}.",
                ],
                cta_label: "Claim {percent}% off",
                cta_path: "/pricing",
                promo_code: Some("SECONDCHANCE15"),
            },
        },
        SequenceStep {
            delay: Delay::Days(7),
            template: StepTemplate {
                subject: "{first_name}, your Second Chance discount is waiting",
                heading: "Your code is still active",
                paragraphs: &[
                    "Code {code} is good for {percent}% off through the end of the month.",
                ],
                cta_label: "Start my petition",
                cta_path: "/pricing",
                promo_code: Some("SECONDCHANCE15"),
            },
        },
    ],
};

pub const NEW_YEAR_FRESH_START: Sequence = Sequence {
    name: "new_year_fresh_start",
    stop_when: StopCondition::StageAtLeast(ConversionStage::FullService),
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(0),
            template: StepTemplate {
                subject: "New year, clean record: {percent}% off",
                heading: "Make this your fresh start year",
                paragraphs: &[
                    "Start the year by clearing your record. Use code {code} for {percent}% off any package.",
                ],
                cta_label: "Start fresh",
                cta_path: "/pricing",
                promo_code: Some("FRESHSTART20"),
            },
        },
        SequenceStep {
            delay: Delay::Days(3),
            template: StepTemplate {
                subject: "Your fresh start resolution, made easy",
                heading: "Keep your resolution, {first_name}",
                paragraphs: &[
                    "Most petitions take one afternoon to prepare. Code {code} still takes {percent}% off.",
                ],
                cta_label: "Get started",
                cta_path: "/pricing",
                promo_code: Some("FRESHSTART20"),
            },
        },
    ],
};

pub const PROMO_SEQUENCES: &[Sequence] =
    &[CLEAN_SLATE_SALE, SECOND_CHANCE_MONTH, NEW_YEAR_FRESH_START];

pub fn find_campaign(name: &str) -> Option<&'static Sequence> {
    PROMO_SEQUENCES.iter().find(|campaign| campaign.name == name)
}
