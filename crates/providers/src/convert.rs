//! Shapes Akahu transactions for each target ledger: New Zealand local
//! dates, each ledger's integer money unit, and the source transaction id
//! carried through as the dedup key.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Pacific::Auckland;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::actual::NewActualTransaction;
use crate::akahu::AkahuTransaction;
use crate::ynab::NewYnabTransaction;

/// Merchant name when Akahu recognized one, otherwise the raw bank
/// description.
pub fn payee_name(txn: &AkahuTransaction) -> String {
    match &txn.merchant {
        Some(merchant) => merchant.name.clone(),
        None => txn.description.clone(),
    }
}

/// The calendar date the transaction happened on in New Zealand. Akahu
/// timestamps are UTC; booking under the UTC date would shift evening
/// transactions to the previous day.
pub fn nz_local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Auckland).date_naive()
}

pub fn to_ynab(txn: &AkahuTransaction, account_id: &str) -> NewYnabTransaction {
    NewYnabTransaction {
        account_id: account_id.to_string(),
        date: nz_local_date(txn.date),
        amount: to_unit(txn.amount, 3),
        payee_name: payee_name(txn),
        memo: txn.description.clone(),
        cleared: "cleared",
        import_id: txn.id.clone(),
        flag_color: "red",
    }
}

pub fn to_actual(txn: &AkahuTransaction) -> NewActualTransaction {
    NewActualTransaction {
        date: nz_local_date(txn.date),
        amount: to_unit(txn.amount, 2),
        payee_name: payee_name(txn),
        notes: format!("Akahu transaction: {}", txn.description),
        imported_id: txn.id.clone(),
        cleared: true,
    }
}

/// Dollars to the ledger's integer unit (milliunits or cents), rounding
/// half-up the way banks present amounts.
fn to_unit(amount: Decimal, scale: u32) -> i64 {
    (amount * Decimal::from(10i64.pow(scale)))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::akahu::Merchant;

    fn txn(amount: &str, date: &str) -> AkahuTransaction {
        AkahuTransaction {
            id: "trans_1".to_string(),
            date: date.parse().unwrap(),
            description: "POS W/D COUNTDOWN".to_string(),
            amount: amount.parse().unwrap(),
            merchant: Some(Merchant {
                name: "Countdown".to_string(),
            }),
        }
    }

    #[test]
    fn merchant_name_wins_over_description() {
        let with = txn("-10.00", "2024-06-01T03:15:00Z");
        assert_eq!(payee_name(&with), "Countdown");

        let mut without = with.clone();
        without.merchant = None;
        assert_eq!(payee_name(&without), "POS W/D COUNTDOWN");
    }

    #[test]
    fn utc_evening_lands_on_the_next_nz_day() {
        // 11:30 UTC on 1 Jan is 00:30 on 2 Jan in Auckland (NZDT, +13).
        let at: DateTime<Utc> = "2024-01-01T11:30:00Z".parse().unwrap();
        assert_eq!(nz_local_date(at), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        // Midday UTC stays on the same NZ day in winter (NZST, +12).
        let at: DateTime<Utc> = "2024-06-15T01:00:00Z".parse().unwrap();
        assert_eq!(nz_local_date(at), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
    }

    #[test]
    fn ynab_amounts_are_milliunits() {
        let converted = to_ynab(&txn("-42.50", "2024-06-01T03:15:00Z"), "y1");
        assert_eq!(converted.amount, -42_500);
        assert_eq!(converted.import_id, "trans_1");
        assert_eq!(converted.memo, "POS W/D COUNTDOWN");
        assert_eq!(converted.flag_color, "red");
    }

    #[test]
    fn actual_amounts_are_cents() {
        let converted = to_actual(&txn("1234.56", "2024-06-01T03:15:00Z"));
        assert_eq!(converted.amount, 123_456);
        assert_eq!(converted.imported_id, "trans_1");
        assert_eq!(converted.notes, "Akahu transaction: POS W/D COUNTDOWN");
        assert!(converted.cleared);
    }

    #[test]
    fn fractional_cents_round_half_up() {
        let converted = to_actual(&txn("0.005", "2024-06-01T03:15:00Z"));
        assert_eq!(converted.amount, 1);
    }
}
