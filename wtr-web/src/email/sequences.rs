//! Behavioral email sequences
//!
//! A sequence is an ordered list of steps, each sent a fixed delay after
//! enrollment. Steps are scheduled as durable jobs (see [`crate::scheduler`]).

use chrono::{DateTime, Duration, Utc};
use wtr_common::models::{ConversionStage, Lead};

use super::promo_sequences::PROMO_SEQUENCES;
use super::templates::StepTemplate;

/// Delay from enrollment to a step's send time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    Minutes(i64),
    Days(i64),
}

impl Delay {
    pub fn as_duration(&self) -> Duration {
        match *self {
            Delay::Minutes(n) => Duration::minutes(n),
            Delay::Days(n) => Duration::days(n),
        }
    }

    /// Send time for a lead enrolled at `enrolled_at`
    pub fn due_at(&self, enrolled_at: DateTime<Utc>) -> DateTime<Utc> {
        enrolled_at + self.as_duration()
    }
}

/// When remaining steps stop being relevant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Lead has made any purchase
    HasPaid,
    /// Lead reached at least this funnel stage
    StageAtLeast(ConversionStage),
}

impl StopCondition {
    pub fn holds_for(&self, lead: &Lead) -> bool {
        match *self {
            StopCondition::HasPaid => lead.has_paid,
            StopCondition::StageAtLeast(stage) => lead.conversion_stage >= stage,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SequenceStep {
    pub delay: Delay,
    pub template: StepTemplate,
}

#[derive(Debug, Clone, Copy)]
pub struct Sequence {
    pub name: &'static str,
    pub steps: &'static [SequenceStep],
    pub stop_when: StopCondition,
}

impl Sequence {
    /// True when no further step should go to `lead`
    pub fn should_stop(&self, lead: &Lead) -> bool {
        lead.unsubscribed || self.stop_when.holds_for(lead)
    }

    pub fn step(&self, index: i64) -> Option<&'static SequenceStep> {
        usize::try_from(index).ok().and_then(|i| self.steps.get(i))
    }
}

pub const WELCOME: Sequence = Sequence {
    name: "welcome",
    stop_when: StopCondition::HasPaid,
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(0),
            template: StepTemplate {
                subject: "Welcome, {first_name}: your path to a clean record",
                heading: "Welcome, {first_name}",
                paragraphs: &[
                    "Thanks for checking your eligibility. Most California convictions that did not lead to state prison can be dismissed under Penal Code 1203.4.",
                    "Over the next few days we will walk you through how dismissal works and what it can do for your job and housing applications.",
                ],
                cta_label: "See your options",
                cta_path: "/pricing",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(1),
            template: StepTemplate {
                subject: "What an expungement actually changes",
                heading: "What changes after a dismissal",
                paragraphs: &[
                    "Once your case is dismissed, most private employers can no longer consider it, and you can legally answer that you have not been convicted on most job applications.",
                    "Our DIY kit includes every court form, filled-in examples and step-by-step filing instructions for your county.",
                ],
                cta_label: "Browse the DIY kit",
                cta_path: "/products/diy-expungement-kit",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(3),
            template: StepTemplate {
                subject: "{first_name}, here is 10% off to get started",
                heading: "Ready when you are",
                paragraphs: &[
                    "Filing takes most people a single afternoon. To help you get started this week, use code WELCOME10 for 10% off any package.",
                ],
                cta_label: "Get started",
                cta_path: "/pricing",
                promo_code: None,
            },
        },
    ],
};

pub const ABANDONED_CART: Sequence = Sequence {
    name: "abandoned_cart",
    stop_when: StopCondition::HasPaid,
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(60),
            template: StepTemplate {
                subject: "You left something in your cart",
                heading: "Still thinking it over, {first_name}?",
                paragraphs: &[
                    "Your order is saved. Pick up where you left off whenever you are ready.",
                ],
                cta_label: "Return to checkout",
                cta_path: "/checkout",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(1),
            template: StepTemplate {
                subject: "Questions about your petition?",
                heading: "We are here to help",
                paragraphs: &[
                    "Most people pause at checkout because they are not sure they qualify. Reply to this email and a case specialist will check your eligibility for free.",
                ],
                cta_label: "Finish your order",
                cta_path: "/checkout",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(3),
            template: StepTemplate {
                subject: "{percent}% off your cart, this week only",
                heading: "A little help to get you moving",
                paragraphs: &[
                    "Use code {code} at checkout for {percent}% off your order.",
                ],
                cta_label: "Claim your discount",
                cta_path: "/checkout",
                promo_code: Some("CLEANSLATE25"),
            },
        },
    ],
};

pub const DIY_UPGRADE: Sequence = Sequence {
    name: "diy_upgrade",
    stop_when: StopCondition::StageAtLeast(ConversionStage::Upgraded),
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(0),
            template: StepTemplate {
                subject: "How is your filing going, {first_name}?",
                heading: "Need a hand with the paperwork?",
                paragraphs: &[
                    "A few days in, many DIY filers get stuck on the declaration or the court fee waiver. Our document review upgrade has an expert check every form before you file.",
                ],
                cta_label: "Add document review",
                cta_path: "/products/document-review",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(2),
            template: StepTemplate {
                subject: "Avoid the most common rejection reasons",
                heading: "Get it right the first time",
                paragraphs: &[
                    "Courts reject petitions for missing case numbers, wrong forms and unsigned declarations. A review costs far less than refiling.",
                ],
                cta_label: "Upgrade my kit",
                cta_path: "/products/document-review",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(5),
            template: StepTemplate {
                subject: "Let us file it for you",
                heading: "Hand it off to us",
                paragraphs: &[
                    "If the court process is taking more time than you have, our full-service team can prepare and file everything on your behalf.",
                ],
                cta_label: "See full service",
                cta_path: "/products/full-service",
                promo_code: None,
            },
        },
    ],
};

pub const HOT_LEAD: Sequence = Sequence {
    name: "hot_lead",
    stop_when: StopCondition::HasPaid,
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(5),
            template: StepTemplate {
                subject: "{first_name}, you look like a strong candidate",
                heading: "Good news about your eligibility",
                paragraphs: &[
                    "Based on what you told us, your case looks like a strong fit for dismissal. Many people in your situation are done in a few weeks.",
                ],
                cta_label: "Start my petition",
                cta_path: "/pricing",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(1),
            template: StepTemplate {
                subject: "Want us to handle everything?",
                heading: "Skip the paperwork",
                paragraphs: &[
                    "With full service we prepare, file and track your petition, and keep you updated until the judge signs the order.",
                ],
                cta_label: "Talk to a specialist",
                cta_path: "/products/full-service",
                promo_code: None,
            },
        },
    ],
};

pub const PRICING_FOLLOW_UP: Sequence = Sequence {
    name: "pricing_follow_up",
    stop_when: StopCondition::HasPaid,
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(30),
            template: StepTemplate {
                subject: "Which package is right for you?",
                heading: "Choosing a package",
                paragraphs: &[
                    "The DIY kit suits people comfortable with forms. Document review adds an expert check. Full service means we do it all.",
                ],
                cta_label: "Compare packages",
                cta_path: "/pricing",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(2),
            template: StepTemplate {
                subject: "The cost of waiting",
                heading: "Every application counts",
                paragraphs: &[
                    "Each background check that shows your old case is a missed opportunity. Getting started today means a cleaner record sooner.",
                ],
                cta_label: "Get started",
                cta_path: "/pricing",
                promo_code: None,
            },
        },
    ],
};

pub const ENGAGED_NURTURE: Sequence = Sequence {
    name: "engaged_nurture",
    stop_when: StopCondition::HasPaid,
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(0),
            template: StepTemplate {
                subject: "Real stories from people who cleared their record",
                heading: "You are not alone, {first_name}",
                paragraphs: &[
                    "Thousands of Californians clear old convictions every year. Read how others landed jobs and apartments after their dismissal.",
                ],
                cta_label: "Read their stories",
                cta_path: "/stories",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(4),
            template: StepTemplate {
                subject: "Your eligibility questions, answered",
                heading: "Frequently asked questions",
                paragraphs: &[
                    "Does a dismissal remove the case from the DOJ database? Can I own a firearm afterwards? We answer the questions people ask most.",
                ],
                cta_label: "Read the FAQ",
                cta_path: "/faq",
                promo_code: None,
            },
        },
    ],
};

pub const RE_ENGAGEMENT: Sequence = Sequence {
    name: "re_engagement",
    stop_when: StopCondition::HasPaid,
    steps: &[
        SequenceStep {
            delay: Delay::Minutes(0),
            template: StepTemplate {
                subject: "Still want a fresh start, {first_name}?",
                heading: "We saved your spot",
                paragraphs: &[
                    "It has been a while since we heard from you. Your eligibility results are still here whenever you are ready.",
                ],
                cta_label: "Pick up where I left off",
                cta_path: "/pricing",
                promo_code: None,
            },
        },
        SequenceStep {
            delay: Delay::Days(7),
            template: StepTemplate {
                subject: "One last note from WipeThatRecord",
                heading: "Here if you need us",
                paragraphs: &[
                    "We will stop sending reminders after this one. If you ever want help clearing your record, we are one click away.",
                ],
                cta_label: "Visit WipeThatRecord",
                cta_path: "/",
                promo_code: None,
            },
        },
    ],
};

/// Sequences reachable from trigger rules
pub const BEHAVIORAL_SEQUENCES: &[Sequence] = &[
    WELCOME,
    ABANDONED_CART,
    DIY_UPGRADE,
    HOT_LEAD,
    PRICING_FOLLOW_UP,
    ENGAGED_NURTURE,
    RE_ENGAGEMENT,
];

/// Look up any sequence (behavioral or promotional) by name
pub fn find_sequence(name: &str) -> Option<&'static Sequence> {
    BEHAVIORAL_SEQUENCES
        .iter()
        .chain(PROMO_SEQUENCES.iter())
        .find(|sequence| sequence.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delays(sequence: &Sequence) -> Vec<Delay> {
        sequence.steps.iter().map(|step| step.delay).collect()
    }

    #[test]
    fn test_step_schedules() {
        use Delay::*;
        assert_eq!(delays(&WELCOME), vec![Minutes(0), Days(1), Days(3)]);
        assert_eq!(delays(&ABANDONED_CART), vec![Minutes(60), Days(1), Days(3)]);
        assert_eq!(delays(&DIY_UPGRADE), vec![Minutes(0), Days(2), Days(5)]);
        assert_eq!(delays(&HOT_LEAD), vec![Minutes(5), Days(1)]);
        assert_eq!(delays(&PRICING_FOLLOW_UP), vec![Minutes(30), Days(2)]);
        assert_eq!(delays(&ENGAGED_NURTURE), vec![Minutes(0), Days(4)]);
        assert_eq!(delays(&RE_ENGAGEMENT), vec![Minutes(0), Days(7)]);
    }

    #[test]
    fn test_abandoned_cart_last_step_carries_promo() {
        let last = ABANDONED_CART.steps.last().unwrap();
        assert_eq!(last.template.promo_code, Some("CLEANSLATE25"));
        assert!(ABANDONED_CART.steps[..2]
            .iter()
            .all(|step| step.template.promo_code.is_none()));
    }

    #[test]
    fn test_sequence_names_unique() {
        let mut names: Vec<_> = BEHAVIORAL_SEQUENCES
            .iter()
            .chain(PROMO_SEQUENCES.iter())
            .map(|s| s.name)
            .collect();
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_find_sequence() {
        assert_eq!(find_sequence("hot_lead").unwrap().steps.len(), 2);
        assert!(find_sequence("clean_slate_sale").is_some());
        assert!(find_sequence("nope").is_none());
        assert!(WELCOME.step(2).is_some());
        assert!(WELCOME.step(3).is_none());
        assert!(WELCOME.step(-1).is_none());
    }

    #[test]
    fn test_delay_due_at() {
        let start = Utc::now();
        assert_eq!(Delay::Minutes(60).due_at(start), start + Duration::hours(1));
        assert_eq!(Delay::Days(3).due_at(start), start + Duration::days(3));
    }
}
