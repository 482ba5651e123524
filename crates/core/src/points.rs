//! # Points Module
//!
//! Quy đổi số tiền giao dịch sang điểm.
//!
//! Credit và debit dùng hai tỉ lệ khác nhau: mặc định credit = 1% số tiền,
//! debit = 1 điểm cho mỗi đơn vị tiền. Cả hai đều là config, không hard-code.

use crate::error::{CoreError, CoreResult};
use crate::transaction::OperationKind;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Tỉ lệ quy đổi tiền -> điểm cho mỗi loại operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsPolicy {
    /// Điểm được cộng trên mỗi đơn vị tiền (0.01 = 1%)
    pub credit_rate: Decimal,
    /// Điểm bị trừ trên mỗi đơn vị tiền
    pub debit_rate: Decimal,
}

impl Default for PointsPolicy {
    fn default() -> Self {
        Self {
            credit_rate: Decimal::new(1, 2),
            debit_rate: Decimal::ONE,
        }
    }
}

impl PointsPolicy {
    pub fn new(credit_rate: Decimal, debit_rate: Decimal) -> CoreResult<Self> {
        if credit_rate <= Decimal::ZERO || debit_rate <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "points rates must be positive: credit {}, debit {}",
                credit_rate, debit_rate
            )));
        }
        Ok(Self {
            credit_rate,
            debit_rate,
        })
    }

    /// Tỉ lệ cho operation kind
    pub fn rate_for(&self, kind: OperationKind) -> Decimal {
        match kind {
            OperationKind::Credit => self.credit_rate,
            OperationKind::Debit => self.debit_rate,
        }
    }

    /// Tính số điểm: `floor(amount * rate)`.
    ///
    /// Amount phải > 0 và kết quả phải >= 1 điểm, vì mỗi transaction phải có
    /// đúng một trong `added`/`deducted` khác 0.
    pub fn points_for(&self, kind: OperationKind, amount: Decimal) -> CoreResult<i64> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "amount must be positive: {}",
                amount
            )));
        }

        let points = amount
            .checked_mul(self.rate_for(kind))
            .ok_or(CoreError::BalanceOverflow)?
            .floor()
            .to_i64()
            .ok_or(CoreError::BalanceOverflow)?;

        if points < 1 {
            return Err(CoreError::InvalidAmount(format!(
                "amount {} is worth no points for {}",
                amount, kind
            )));
        }

        Ok(points)
    }
}

/// Parse số tiền do người dùng nhập.
///
/// Chấp nhận số thập phân dương (trim khoảng trắng); từ chối chuỗi không
/// parse được, số âm và 0.
pub fn parse_amount(input: &str) -> CoreResult<Decimal> {
    let trimmed = input.trim();
    let amount = Decimal::from_str(trimmed)
        .map_err(|_| CoreError::InvalidAmount(format!("not a number: {:?}", input)))?;

    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "amount must be positive: {}",
            amount
        )));
    }

    Ok(amount)
}
