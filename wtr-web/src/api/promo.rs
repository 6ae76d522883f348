//! Promo code lookup

use axum::Json;
use serde::{Deserialize, Serialize};
use wtr_common::pricing::{compute_totals, lookup_promo};

use crate::extract::JsonBody;

#[derive(Debug, Deserialize)]
pub struct PromoValidateRequest {
    pub code: String,
    /// Cart subtotal, to preview the discount
    #[serde(default)]
    pub subtotal_cents: Option<i64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PromoValidateResponse {
    pub valid: bool,
    pub code: String,
    pub percent_off: Option<u32>,
    pub description: Option<&'static str>,
    pub discount_cents: Option<i64>,
}

/// POST /api/promo/validate
///
/// Unknown codes are not an error here: the response says `valid: false`.
pub async fn validate_promo(
    JsonBody(request): JsonBody<PromoValidateRequest>,
) -> Json<PromoValidateResponse> {
    Json(check_code(&request))
}

fn check_code(request: &PromoValidateRequest) -> PromoValidateResponse {
    match lookup_promo(&request.code) {
        Some(promo) => PromoValidateResponse {
            valid: true,
            code: promo.code.to_string(),
            percent_off: Some(promo.percent_off),
            description: Some(promo.description),
            discount_cents: request
                .subtotal_cents
                .filter(|subtotal| *subtotal >= 0)
                .and_then(|subtotal| compute_totals(&[subtotal], promo.percent_off, 0).ok())
                .map(|totals| totals.discount_cents),
        },
        None => PromoValidateResponse {
            valid: false,
            code: request.code.trim().to_string(),
            percent_off: None,
            description: None,
            discount_cents: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_code_case_insensitive() {
        let response = check_code(&PromoValidateRequest {
            code: " freshstart20 ".into(),
            subtotal_cents: Some(19_900),
        });
        assert!(response.valid);
        assert_eq!(response.code, "FRESHSTART20");
        assert_eq!(response.percent_off, Some(20));
        assert_eq!(response.discount_cents, Some(3_980));
    }

    #[test]
    fn test_unknown_code() {
        let response = check_code(&PromoValidateRequest {
            code: "FREEBIE".into(),
            subtotal_cents: None,
        });
        assert!(!response.valid);
        assert!(response.percent_off.is_none());
    }
}
