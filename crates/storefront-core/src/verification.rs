//! Simulated Verification
//!
//! The presale pages walk users through an OTP step. This is a mock with a
//! fixed code: it gates navigation in the demo and is not a security control.

use serde::{Deserialize, Serialize};

/// Code every simulated OTP accepts
pub const SIMULATED_OTP_CODE: &str = "123456";

/// Check that a phone number is 8-15 digits once separators are removed
pub fn validate_phone(phone: &str) -> std::result::Result<(), &'static str> {
    let mut digits = 0usize;
    for c in phone.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '(' | ')' | '+' => {}
            _ => return Err("phone may only contain digits"),
        }
    }
    if (8..=15).contains(&digits) {
        Ok(())
    } else {
        Err("phone must have 8 to 15 digits")
    }
}

/// Outcome of submitting a code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpOutcome {
    Verified,
    WrongCode { attempts_left: u8 },
    Locked,
    NotSent,
}

/// One-time-password exchange with a fixed code
#[derive(Clone, Debug)]
pub struct SimulatedOtp {
    phone: Option<String>,
    attempts_left: u8,
    verified: bool,
}

impl Default for SimulatedOtp {
    fn default() -> Self {
        Self::new(3)
    }
}

impl SimulatedOtp {
    pub const fn new(max_attempts: u8) -> Self {
        Self {
            phone: None,
            attempts_left: max_attempts,
            verified: false,
        }
    }

    /// "Send" a code to `phone`; nothing leaves the process
    pub fn send(&mut self, phone: &str) -> std::result::Result<(), &'static str> {
        validate_phone(phone)?;
        tracing::info!(phone_suffix = %phone.chars().rev().take(4).collect::<String>(), "Simulated OTP sent");
        self.phone = Some(phone.to_string());
        Ok(())
    }

    pub fn submit(&mut self, code: &str) -> OtpOutcome {
        if self.phone.is_none() {
            return OtpOutcome::NotSent;
        }
        if self.verified {
            return OtpOutcome::Verified;
        }
        if self.attempts_left == 0 {
            return OtpOutcome::Locked;
        }

        if code.trim() == SIMULATED_OTP_CODE {
            self.verified = true;
            OtpOutcome::Verified
        } else {
            self.attempts_left -= 1;
            if self.attempts_left == 0 {
                OtpOutcome::Locked
            } else {
                OtpOutcome::WrongCode {
                    attempts_left: self.attempts_left,
                }
            }
        }
    }

    pub const fn is_verified(&self) -> bool {
        self.verified
    }
}
