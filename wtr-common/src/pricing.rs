//! Order pricing and promo codes
//!
//! All amounts are integer cents. The invariant checked everywhere:
//! `total = Σ line totals + tax − discount`.

use crate::{Error, Result};
use serde::Serialize;

/// A published promo code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromoCode {
    pub code: &'static str,
    pub percent_off: u32,
    pub description: &'static str,
}

/// Every code the storefront honours
pub const PROMO_CODES: &[PromoCode] = &[
    PromoCode {
        code: "WELCOME10",
        percent_off: 10,
        description: "Welcome discount for new leads",
    },
    PromoCode {
        code: "SECONDCHANCE15",
        percent_off: 15,
        description: "Second Chance Month campaign",
    },
    PromoCode {
        code: "FRESHSTART20",
        percent_off: 20,
        description: "New Year Fresh Start campaign",
    },
    PromoCode {
        code: "CLEANSLATE25",
        percent_off: 25,
        description: "Clean Slate sale and abandoned-cart recovery",
    },
];

/// Case-insensitive promo lookup
pub fn lookup_promo(code: &str) -> Option<&'static PromoCode> {
    let wanted = code.trim();
    PROMO_CODES
        .iter()
        .find(|promo| promo.code.eq_ignore_ascii_case(wanted))
}

/// Computed order amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Price of one line
pub fn line_total(unit_price_cents: i64, quantity: i64) -> Result<i64> {
    if quantity < 1 {
        return Err(Error::InvalidInput(format!(
            "Quantity must be at least 1 (got {})",
            quantity
        )));
    }
    if unit_price_cents < 0 {
        return Err(Error::InvalidInput(format!(
            "Negative unit price: {}",
            unit_price_cents
        )));
    }
    unit_price_cents
        .checked_mul(quantity)
        .ok_or_else(|| Error::InvalidInput("Line total overflows".to_string()))
}

/// Combine line totals into order totals
///
/// Discount is `percent_off` of the subtotal, rounded down. Tax applies to
/// the discounted subtotal at `tax_rate_bps` basis points, rounded half up.
/// Amounts that do not fit in `i64` cents are rejected.
pub fn compute_totals(
    line_totals: &[i64],
    percent_off: u32,
    tax_rate_bps: u32,
) -> Result<OrderTotals> {
    let overflow = || Error::InvalidInput("Order total is too large".to_string());

    let subtotal_cents = line_totals
        .iter()
        .try_fold(0_i64, |acc, line| acc.checked_add(*line))
        .ok_or_else(overflow)?;

    let percent = i128::from(percent_off.min(100));
    let discount = i128::from(subtotal_cents) * percent / 100;
    let taxable = i128::from(subtotal_cents) - discount;
    let tax = (taxable * i128::from(tax_rate_bps) + 5_000) / 10_000;
    let total = taxable + tax;

    Ok(OrderTotals {
        subtotal_cents,
        discount_cents: i64::try_from(discount).map_err(|_| overflow())?,
        tax_cents: i64::try_from(tax).map_err(|_| overflow())?,
        total_cents: i64::try_from(total).map_err(|_| overflow())?,
    })
}

/// Format cents as dollars for email copy, e.g. `$1,249.00`
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, c) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_promo_codes() {
        assert_eq!(lookup_promo("WELCOME10").unwrap().percent_off, 10);
        assert_eq!(lookup_promo("SECONDCHANCE15").unwrap().percent_off, 15);
        assert_eq!(lookup_promo("FRESHSTART20").unwrap().percent_off, 20);
        assert_eq!(lookup_promo("CLEANSLATE25").unwrap().percent_off, 25);
    }

    #[test]
    fn test_promo_lookup_is_case_insensitive() {
        assert_eq!(lookup_promo(" cleanslate25 ").unwrap().code, "CLEANSLATE25");
        assert!(lookup_promo("FREEBIE100").is_none());
        assert!(lookup_promo("").is_none());
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(9_900, 2).unwrap(), 19_800);
        assert!(line_total(9_900, 0).is_err());
        assert!(line_total(-1, 1).is_err());
        assert!(line_total(i64::MAX, 2).is_err());
    }

    #[test]
    fn test_totals_without_discount_or_tax() {
        let totals = compute_totals(&[9_900, 4_900], 0, 0).unwrap();
        assert_eq!(totals.subtotal_cents, 14_800);
        assert_eq!(totals.discount_cents, 0);
        assert_eq!(totals.tax_cents, 0);
        assert_eq!(totals.total_cents, 14_800);
    }

    #[test]
    fn test_totals_with_discount_and_tax() {
        // 25% off 29,900 = 7,475; tax 7.25% on 22,425 = 1,625.8 -> 1,626
        let totals = compute_totals(&[29_900], 25, 725).unwrap();
        assert_eq!(totals.discount_cents, 7_475);
        assert_eq!(totals.tax_cents, 1_626);
        assert_eq!(totals.total_cents, 29_900 + 1_626 - 7_475);
    }

    #[test]
    fn test_total_identity_over_varied_items() {
        let carts: [&[i64]; 4] = [&[], &[1], &[9_999, 1, 250_000], &[333, 333, 334]];
        for items in carts {
            for percent in [0, 10, 15, 20, 25] {
                for bps in [0, 725, 1_025] {
                    let t = compute_totals(items, percent, bps).unwrap();
                    assert_eq!(t.subtotal_cents, items.iter().sum::<i64>());
                    assert_eq!(t.total_cents, t.subtotal_cents + t.tax_cents - t.discount_cents);
                    assert!(t.discount_cents <= t.subtotal_cents);
                }
            }
        }
    }

    #[test]
    fn test_discount_rounds_down() {
        // 10% of 999 = 99.9 -> 99
        assert_eq!(compute_totals(&[999], 10, 0).unwrap().discount_cents, 99);
    }

    #[test]
    fn test_oversized_totals_are_rejected() {
        // Each line fits, the sum does not
        assert!(compute_totals(&[i64::MAX / 2, i64::MAX / 2, 2], 0, 0).is_err());
        // Subtotal fits, tax pushes the total over
        let line = line_total(10_000, 900_000_000_000_000).unwrap();
        assert!(compute_totals(&[line], 0, 725).is_err());
        // Same cart with a discount large enough to keep the total in range
        let t = compute_totals(&[line], 25, 725).unwrap();
        assert_eq!(t.total_cents, t.subtotal_cents + t.tax_cents - t.discount_cents);
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(0), "$0.00");
        assert_eq!(format_usd(5), "$0.05");
        assert_eq!(format_usd(9_900), "$99.00");
        assert_eq!(format_usd(124_900), "$1,249.00");
        assert_eq!(format_usd(123_456_789), "$1,234,567.89");
        assert_eq!(format_usd(-2_500), "-$25.00");
    }
}
