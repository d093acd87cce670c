//! Fee policy — integer-percentage rate with truncating fee math
//!
//! The rate is a whole percentage (0–100 inclusive, no fractional basis
//! points). Fees truncate toward zero: `fee = floor(primary * rate / 100)`.
//! Authorization for rate changes is enforced by the engine, not here.

use rust_decimal::Decimal;

use crate::errors::EngineError;

/// Current fee rate and fee computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    /// Whole percentage, 0–100 inclusive
    rate: u32,
}

impl FeePolicy {
    /// Create a fee policy. Fails if the rate exceeds 100.
    pub fn new(rate: u32) -> Result<Self, EngineError> {
        if rate > 100 {
            return Err(EngineError::FeeRateOutOfRange { rate });
        }
        Ok(Self { rate })
    }

    /// Current rate as a whole percentage.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Replace the rate. Fails if the new rate exceeds 100.
    pub fn set_rate(&mut self, new_rate: u32) -> Result<(), EngineError> {
        if new_rate > 100 {
            return Err(EngineError::FeeRateOutOfRange { rate: new_rate });
        }
        self.rate = new_rate;
        Ok(())
    }

    /// Compute the fee on a primary amount: `floor(primary * rate / 100)`.
    pub fn compute_fee(&self, primary: Decimal) -> Result<Decimal, EngineError> {
        let scaled = primary
            .checked_mul(Decimal::from(self.rate))
            .ok_or(EngineError::Overflow)?;
        Ok((scaled / Decimal::from(100)).floor())
    }
}
