//! One-time codes that confirm a pending booking.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CODE_LENGTH: usize = 6;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OtpError {
    #[error("OTP has expired. Please request a new one.")]
    Expired,
    #[error("Invalid OTP. {remaining} attempts remaining.")]
    Mismatch { remaining: i32 },
    #[error("Too many failed attempts. Please request a new OTP.")]
    TooManyAttempts,
}

/// A code issued for one pending booking, with its expiry and the number of
/// wrong guesses made against it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OtpChallenge {
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: i32,
}

impl OtpChallenge {
    pub fn issue(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self::with_code(generate_code(&mut rand::thread_rng()), now, ttl)
    }

    pub fn with_code(code: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            code,
            issued_at: now,
            expires_at: now + ttl,
            attempts: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Checks `candidate` once this attempt has been counted in `attempts`,
    /// which the store does atomically before the comparison.
    pub fn check(
        &self,
        candidate: &str,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<(), OtpError> {
        if self.attempts > max_attempts {
            return Err(OtpError::TooManyAttempts);
        }
        if self.is_expired(now) {
            return Err(OtpError::Expired);
        }
        if candidate.trim() != self.code {
            return Err(OtpError::Mismatch {
                remaining: (max_attempts - self.attempts).max(0),
            });
        }
        Ok(())
    }
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:0width$}", rng.gen_range(0..1_000_000u32), width = CODE_LENGTH)
}

/// Exactly six ASCII digits.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn challenge(now: DateTime<Utc>) -> OtpChallenge {
        OtpChallenge::with_code("042917".into(), now, Duration::minutes(10))
    }

    #[test]
    fn generated_codes_are_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_code(&mut rng);
            assert!(is_well_formed(&code), "bad code {code}");
        }
    }

    #[test]
    fn well_formed_rejects_letters_and_lengths() {
        assert!(is_well_formed("000000"));
        assert!(!is_well_formed("12345"));
        assert!(!is_well_formed("1234567"));
        assert!(!is_well_formed("12a456"));
    }

    #[test]
    fn correct_code_verifies() {
        let now = Utc::now();
        let mut otp = challenge(now);
        otp.attempts = 1;
        assert_eq!(otp.check(" 042917 ", now + Duration::minutes(1), 5), Ok(()));
    }

    #[test]
    fn remaining_attempts_follow_the_counter() {
        let now = Utc::now();
        let mut otp = challenge(now);
        for (attempts, remaining) in [(1, 2), (2, 1), (3, 0)] {
            otp.attempts = attempts;
            assert_eq!(otp.check("111111", now, 3), Err(OtpError::Mismatch { remaining }));
        }
        otp.attempts = 4;
        assert_eq!(otp.check("042917", now, 3), Err(OtpError::TooManyAttempts));
    }

    #[test]
    fn expired_code_is_rejected() {
        let now = Utc::now();
        let mut otp = challenge(now);
        otp.attempts = 1;
        assert_eq!(
            otp.check("042917", now + Duration::minutes(11), 5),
            Err(OtpError::Expired)
        );
    }
}
