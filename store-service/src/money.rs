//! Monetary arithmetic and display formatting.
//!
//! All stored and displayed amounts are rounded to two decimal places,
//! midpoint away from zero.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

pub const CURRENCY_SUFFIX: &str = "VND";

pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest amount a `NUMERIC(14, 2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

/// Callers must have checked the product with [`checked_line_total`].
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    round2(Decimal::from(quantity) * unit_price)
}

/// Line total, or `None` when it overflows or exceeds [`MAX_AMOUNT`].
pub fn checked_line_total(quantity: i32, unit_price: Decimal) -> Option<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .map(round2)
        .filter(|total| *total <= MAX_AMOUNT)
}

/// Sum of `amounts`, or `None` when it exceeds [`MAX_AMOUNT`].
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .filter(|total| *total <= MAX_AMOUNT)
}

pub fn discount_amount(subtotal: Decimal, percent_off: i32) -> Decimal {
    round2(subtotal * Decimal::from(percent_off) / Decimal::ONE_HUNDRED)
}

/// Formats with `.` thousands separators and a `,` decimal part when the
/// amount is not whole: `1234567.5` becomes `1.234.567,50 VND`.
pub fn format_currency(amount: Decimal) -> String {
    format!("{} {}", format_number(amount), CURRENCY_SUFFIX)
}

/// Same grouping as [`format_currency`] without the suffix.
pub fn format_number(amount: Decimal) -> String {
    let rounded = round2(amount);
    let abs = rounded.abs();
    let whole = abs.trunc();
    let cents = ((abs - whole) * Decimal::ONE_HUNDRED)
        .round()
        .to_u32()
        .unwrap_or_default();

    let digits = whole.to_u128().unwrap_or_default().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    if cents > 0 {
        format!("{}{},{:02}", sign, grouped, cents)
    } else {
        format!("{}{}", sign, grouped)
    }
}

/// Day/month/year, as printed on invoices.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn formats_whole_amounts_with_dot_grouping() {
        assert_eq!(format_currency(dec!(850000)), "850.000 VND");
        assert_eq!(format_currency(dec!(1250000)), "1.250.000 VND");
        assert_eq!(format_currency(dec!(999)), "999 VND");
        assert_eq!(format_currency(Decimal::ZERO), "0 VND");
    }

    #[test]
    fn formats_fractional_amounts_with_two_places() {
        assert_eq!(format_currency(dec!(1234.5)), "1.234,50 VND");
        assert_eq!(format_currency(dec!(0.005)), "0,01 VND");
    }

    #[test]
    fn formats_negative_amounts() {
        assert_eq!(format_number(dec!(-85000)), "-85.000");
    }

    #[test]
    fn formats_dates_day_first() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert_eq!(format_date(date), "10/06/2024");
    }

    #[test]
    fn max_amount_matches_column_precision() {
        assert_eq!(MAX_AMOUNT, dec!(999999999999.99));
    }

    #[test]
    fn oversized_line_totals_are_refused() {
        assert_eq!(checked_line_total(100, dec!(10000000000000000000000000000)), None);
        assert_eq!(checked_line_total(2, dec!(600000000000)), None);
        assert_eq!(checked_line_total(2, dec!(250000)), Some(dec!(500000)));
    }

    #[test]
    fn sums_past_the_column_limit_are_refused() {
        assert_eq!(checked_sum([dec!(500000), dec!(350000)]), Some(dec!(850000)));
        assert_eq!(checked_sum([MAX_AMOUNT, dec!(0.01)]), None);
        assert_eq!(checked_sum(Vec::new()), Some(Decimal::ZERO));
    }

    #[test]
    fn ten_percent_of_scenario_subtotal() {
        assert_eq!(discount_amount(dec!(850000), 10), dec!(85000));
        assert_eq!(discount_amount(dec!(350000), 10), dec!(35000));
    }

    #[test]
    fn discount_rounds_half_away_from_zero() {
        // 0.45 * 5% = 0.0225
        assert_eq!(discount_amount(dec!(0.45), 5), dec!(0.02));
        // 0.9 * 5% = 0.045
        assert_eq!(discount_amount(dec!(0.9), 5), dec!(0.05));
    }

    proptest! {
        #[test]
        fn discount_never_exceeds_subtotal(cents in 0i64..10_000_000_000, percent in 0i32..=100) {
            let subtotal = Decimal::new(cents, 2);
            let discount = discount_amount(subtotal, percent);
            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= subtotal);
            prop_assert_eq!(discount, round2(discount));
        }

        #[test]
        fn line_total_is_exact_for_cent_prices(quantity in 0i32..10_000, cents in 0i64..100_000_000) {
            let price = Decimal::new(cents, 2);
            prop_assert_eq!(line_total(quantity, price), Decimal::from(quantity) * price);
        }
    }
}
