//! Fixed-point handling of monetary amounts.
//!
//! MMEX stores amounts as floating point numbers. To keep sums exact, every
//! amount is scaled to an integer number of hundredths inside the SQL query
//! and only turned into a [Decimal] on the Rust side.

use rust_decimal::Decimal;

/// The number of decimal places kept for amounts.
pub const AMOUNT_SCALE: u32 = 2;

/// Wrap a numeric SQL expression so that the store returns it as an integer
/// number of hundredths.
pub(crate) fn scaled_sql(expression: &str) -> String {
    format!("CAST(ROUND(COALESCE({expression}, 0) * 100) AS INTEGER)")
}

/// Convert a scaled integer read from the store into an amount.
pub(crate) fn from_scaled(value: i64) -> Decimal {
    Decimal::new(value, AMOUNT_SCALE)
}

/// Format an amount as currency, e.g. `$1,234.50` or `-$20.00`.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp(AMOUNT_SCALE).abs();
    let text = format!("{rounded:.2}");
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    format!("{sign}${grouped}.{fraction}")
}
