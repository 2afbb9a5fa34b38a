//! Referral codes and reward bookkeeping

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REFERRAL_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const DEFAULT_CODE_LENGTH: usize = 8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReferralError {
    #[error("User has already been referred")]
    AlreadyReferred,
    #[error("You cannot refer yourself")]
    SelfReferral,
}

/// Random code drawn from `REFERRAL_CODE_ALPHABET`
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..REFERRAL_CODE_ALPHABET.len());
            REFERRAL_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Referral fields carried on every user record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferralState {
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub referred_by: Option<String>,
    #[serde(default)]
    pub referrals: Vec<String>,
    #[serde(default)]
    pub referral_count: u64,
    #[serde(default)]
    pub rewards_earned: Decimal,
}

impl ReferralState {
    pub fn info(&self) -> ReferralInfo {
        ReferralInfo {
            referral_code: self.referral_code.clone(),
            referral_count: self.referral_count,
            rewards_earned: self.rewards_earned,
        }
    }
}

/// Link `referred` under `referrer`. Both checks run before either side changes.
pub fn link(
    referrer_id: &str,
    referrer: &mut ReferralState,
    referred_id: &str,
    referred: &mut ReferralState,
    reward: Decimal,
) -> Result<(), ReferralError> {
    if referred.referred_by.is_some() {
        return Err(ReferralError::AlreadyReferred);
    }
    if referrer_id == referred_id {
        return Err(ReferralError::SelfReferral);
    }

    referrer.referrals.push(referred_id.to_string());
    referrer.referral_count += 1;
    referrer.rewards_earned += reward;
    referred.referred_by = Some(referrer_id.to_string());
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralInfo {
    pub referral_code: Option<String>,
    pub referral_count: u64,
    pub rewards_earned: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use regex::Regex;
    use rust_decimal_macros::dec;

    #[test]
    fn test_generate_code_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let pattern = Regex::new(r"^[A-Z0-9]{8}$").unwrap();
        for _ in 0..50 {
            let code = generate_code(&mut rng, DEFAULT_CODE_LENGTH);
            assert!(pattern.is_match(&code), "bad code {}", code);
        }
    }

    #[test]
    fn test_link_updates_both_sides() {
        let mut referrer = ReferralState::default();
        let mut referred = ReferralState::default();
        link("alice", &mut referrer, "bob", &mut referred, dec!(10)).unwrap();

        assert_eq!(referrer.referrals, vec!["bob".to_string()]);
        assert_eq!(referrer.referral_count, 1);
        assert_eq!(referrer.rewards_earned, dec!(10));
        assert_eq!(referred.referred_by.as_deref(), Some("alice"));
    }

    #[test]
    fn test_second_link_rejected() {
        let mut referrer = ReferralState::default();
        let mut referred = ReferralState::default();
        link("alice", &mut referrer, "bob", &mut referred, dec!(10)).unwrap();

        let err = link("alice", &mut referrer, "bob", &mut referred, dec!(10)).unwrap_err();
        assert_eq!(err, ReferralError::AlreadyReferred);
        assert!(err.to_string().contains("already been referred"));
        assert_eq!(referrer.referral_count, 1);
        assert_eq!(referrer.rewards_earned, dec!(10));
    }

    #[test]
    fn test_self_referral_rejected() {
        let mut state = ReferralState::default();
        let mut other = ReferralState::default();
        assert_eq!(
            link("alice", &mut state, "alice", &mut other, dec!(10)),
            Err(ReferralError::SelfReferral)
        );
        assert_eq!(state, ReferralState::default());
    }

    #[test]
    fn test_info_serializes_camel_case() {
        let state = ReferralState {
            referral_code: Some("ABCD1234".to_string()),
            referral_count: 2,
            rewards_earned: dec!(20),
            ..Default::default()
        };
        let json = serde_json::to_value(state.info()).unwrap();
        assert_eq!(json["referralCode"], "ABCD1234");
        assert_eq!(json["referralCount"], 2);
        assert_eq!(json["rewardsEarned"], "20");
    }
}
