//! Shop classification
//!
//! Each supported retailer issues cards with a characteristic digit count,
//! so a locked code classifies by length alone. ALDI and LIDL share the
//! same 20-digit card-number space and can never be told apart here; the
//! caller has to ask the user.
//!
//! Some cards additionally double-encode their number: the barcode carries
//! 38 digits of which only the trailing 20 are the card number. That trim,
//! and the EDEKA 32-digit splice, are deterministic corrections, never
//! heuristics.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A supported retailer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Shop {
    Rewe,
    Dm,
    Aldi,
    Lidl,
    Edeka,
}

impl Shop {
    pub const ALL: [Shop; 5] = [Shop::Rewe, Shop::Dm, Shop::Aldi, Shop::Lidl, Shop::Edeka];

    /// Display name of the retailer
    pub fn name(self) -> &'static str {
        match self {
            Shop::Rewe => "REWE",
            Shop::Dm => "DM",
            Shop::Aldi => "ALDI",
            Shop::Lidl => "LIDL",
            Shop::Edeka => "EDEKA",
        }
    }
}

impl fmt::Display for Shop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Digit-count rules for one retailer
#[derive(Debug, Clone, Copy)]
pub struct ShopProfile {
    pub shop: Shop,
    /// Digit counts that classify a fresh lock as this shop
    pub detect_lengths: &'static [usize],
    /// Digit counts accepted (after correction) when this shop is chosen
    pub accepted_lengths: &'static [usize],
}

/// The static shop registry
pub fn registry() -> &'static [ShopProfile] {
    static REGISTRY: [ShopProfile; 5] = [
        ShopProfile {
            shop: Shop::Rewe,
            detect_lengths: &[13],
            accepted_lengths: &[13],
        },
        ShopProfile {
            shop: Shop::Dm,
            detect_lengths: &[24],
            accepted_lengths: &[24],
        },
        ShopProfile {
            shop: Shop::Aldi,
            detect_lengths: &[20, 38],
            accepted_lengths: &[20, 38],
        },
        ShopProfile {
            shop: Shop::Lidl,
            detect_lengths: &[20, 38],
            accepted_lengths: &[20, 38],
        },
        ShopProfile {
            shop: Shop::Edeka,
            detect_lengths: &[16],
            accepted_lengths: &[19, 32],
        },
    ];
    &REGISTRY
}

/// Outcome of classifying a locked code by digit count
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No shop issues cards with this digit count
    NoMatch { digit_count: usize },
    /// Exactly one shop matches; safe to auto-select
    Unambiguous(Shop),
    /// Several shops match; the caller must resolve the choice
    Ambiguous(Vec<Shop>),
}

impl Classification {
    /// All matching shops, in registry order
    pub fn candidates(&self) -> &[Shop] {
        match self {
            Classification::NoMatch { .. } => &[],
            Classification::Unambiguous(shop) => std::slice::from_ref(shop),
            Classification::Ambiguous(shops) => shops,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Classification::Ambiguous(_))
    }
}

/// Map a digit count to the set of shops that could have issued the card.
pub fn classify(digit_count: usize) -> Classification {
    let candidates: Vec<Shop> = registry()
        .iter()
        .filter(|profile| profile.detect_lengths.contains(&digit_count))
        .map(|profile| profile.shop)
        .collect();

    match candidates.len() {
        0 => Classification::NoMatch { digit_count },
        1 => Classification::Unambiguous(candidates[0]),
        _ => Classification::Ambiguous(candidates),
    }
}

/// Reduce arbitrary decoded text to its digit characters
pub fn digits_of(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Drop the 18-digit prefix of a 38-digit dual-encoded reading.
///
/// Only fires at exactly 38 digits, so applying it to an already-corrected
/// 20-digit string is a no-op.
pub fn trim_dual_encoding(digits: &str) -> String {
    if digits.len() == 38 {
        digits[18..].to_string()
    } else {
        digits.to_string()
    }
}

/// A digit string that no accepted length of the chosen shop explains
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{shop}: expected {expected:?} digits, got {observed}")]
pub struct ValidationError {
    pub shop: Shop,
    pub expected: &'static [usize],
    pub observed: usize,
}

/// Validate (and where defined, correct) a digit string for an explicitly
/// chosen shop.
///
/// Corrections: ALDI/LIDL accept a 38-digit reading as its trailing 20
/// digits; EDEKA accepts a 32-digit reading as digit positions
/// `[11..16] + [18..]`. Anything outside a shop's accepted lengths is
/// rejected with the observed count.
pub fn validate_for_shop(shop: Shop, digits: &str) -> Result<String, ValidationError> {
    let n = digits.len();
    let reject = || {
        let profile = registry()
            .iter()
            .find(|p| p.shop == shop)
            .expect("every shop has a profile");
        Err(ValidationError {
            shop,
            expected: profile.accepted_lengths,
            observed: n,
        })
    };

    match shop {
        Shop::Rewe => {
            if n == 13 {
                Ok(digits.to_string())
            } else {
                reject()
            }
        }
        Shop::Dm => {
            if n == 24 {
                Ok(digits.to_string())
            } else {
                reject()
            }
        }
        Shop::Aldi | Shop::Lidl => match n {
            20 => Ok(digits.to_string()),
            38 => Ok(trim_dual_encoding(digits)),
            _ => reject(),
        },
        Shop::Edeka => match n {
            32 => Ok(format!("{}{}", &digits[11..16], &digits[18..])),
            19 => Ok(digits.to_string()),
            _ => reject(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit_string(len: usize) -> String {
        ('0'..='9').cycle().take(len).collect()
    }

    #[test]
    fn test_classify_unique_lengths() {
        assert_eq!(classify(13), Classification::Unambiguous(Shop::Rewe));
        assert_eq!(classify(24), Classification::Unambiguous(Shop::Dm));
        assert_eq!(classify(16), Classification::Unambiguous(Shop::Edeka));
    }

    #[test]
    fn test_classify_shared_card_space_is_ambiguous() {
        for count in [20, 38] {
            let classification = classify(count);
            assert!(classification.is_ambiguous());
            assert_eq!(classification.candidates(), &[Shop::Aldi, Shop::Lidl]);
        }
    }

    #[test]
    fn test_classify_unknown_lengths() {
        for count in [0, 1, 12, 14, 19, 21, 25, 32, 37, 39, 100] {
            assert_eq!(
                classify(count),
                Classification::NoMatch { digit_count: count }
            );
        }
    }

    #[test]
    fn test_candidates_accessor() {
        assert!(classify(7).candidates().is_empty());
        assert_eq!(classify(13).candidates(), &[Shop::Rewe]);
        assert_eq!(classify(20).candidates().len(), 2);
    }

    #[test]
    fn test_trim_dual_encoding_only_fires_at_38() {
        let long = digit_string(38);
        let trimmed = trim_dual_encoding(&long);
        assert_eq!(trimmed.len(), 20);
        assert_eq!(trimmed, &long[18..]);

        // Stable under repeated application.
        assert_eq!(trim_dual_encoding(&trimmed), trimmed);

        for len in [13, 19, 20, 24, 37, 39] {
            let s = digit_string(len);
            assert_eq!(trim_dual_encoding(&s), s);
        }
    }

    #[test]
    fn test_digits_of_strips_noise() {
        assert_eq!(digits_of("4049-3371 23x45"), "404933712345");
        assert_eq!(digits_of("no digits"), "");
    }

    #[test]
    fn test_validate_rewe_and_dm_exact_lengths() {
        assert!(validate_for_shop(Shop::Rewe, &digit_string(13)).is_ok());
        assert!(validate_for_shop(Shop::Rewe, &digit_string(14)).is_err());
        assert!(validate_for_shop(Shop::Dm, &digit_string(24)).is_ok());
        assert!(validate_for_shop(Shop::Dm, &digit_string(23)).is_err());
    }

    #[test]
    fn test_validate_aldi_lidl_corrects_38() {
        let long = digit_string(38);
        for shop in [Shop::Aldi, Shop::Lidl] {
            assert_eq!(
                validate_for_shop(shop, &digit_string(20)).unwrap(),
                digit_string(20)
            );
            assert_eq!(validate_for_shop(shop, &long).unwrap(), &long[18..]);
            assert!(validate_for_shop(shop, &digit_string(21)).is_err());
        }
    }

    #[test]
    fn test_validate_edeka_splices_32() {
        let raw = digit_string(32);
        let corrected = validate_for_shop(Shop::Edeka, &raw).unwrap();
        assert_eq!(corrected.len(), 19);
        assert_eq!(corrected, format!("{}{}", &raw[11..16], &raw[18..]));

        assert!(validate_for_shop(Shop::Edeka, &digit_string(19)).is_ok());
        assert!(validate_for_shop(Shop::Edeka, &digit_string(16)).is_err());
    }

    #[test]
    fn test_validation_error_reports_counts() {
        let err = validate_for_shop(Shop::Rewe, &digit_string(10)).unwrap_err();
        assert_eq!(err.observed, 10);
        assert_eq!(err.expected, &[13]);
        assert!(err.to_string().contains("REWE"));
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_registry_covers_all_shops() {
        let shops: Vec<Shop> = registry().iter().map(|p| p.shop).collect();
        assert_eq!(shops, Shop::ALL);
    }
}
