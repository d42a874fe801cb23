//! Export & Formatting
//!
//! Copy-out text for the net crypto amount, the spreadsheet formulas that
//! reproduce the conversion, and display formatting for amounts and rates.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Market crypto for the target fiat
pub const MARKET_CRYPTO_FORMULA: &str = "=(A1/B1)/C1";

/// Net crypto after the premium
pub const NET_CRYPTO_FORMULA: &str = "=((A1/B1)/C1)*(1-(D1/100))";

/// Spreadsheet cell meaning
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CellLegend {
    pub cell: &'static str,
    pub meaning: &'static str,
}

pub const FORMULA_LEGEND: [CellLegend; 4] = [
    CellLegend { cell: "A1", meaning: "Target fiat amount" },
    CellLegend { cell: "B1", meaning: "Exchange rate (local per reference)" },
    CellLegend { cell: "C1", meaning: "Crypto price (reference currency)" },
    CellLegend { cell: "D1", meaning: "Premium %" },
];

/// Both formulas with their legend
#[derive(Clone, Debug, Serialize)]
pub struct FormulaSheet {
    pub legend: [CellLegend; 4],
    pub market_crypto: &'static str,
    pub net_crypto: &'static str,
}

pub const fn formula_sheet() -> FormulaSheet {
    FormulaSheet {
        legend: FORMULA_LEGEND,
        market_crypto: MARKET_CRYPTO_FORMULA,
        net_crypto: NET_CRYPTO_FORMULA,
    }
}

/// Clipboard text for the net crypto box; an empty box copies as `"0"`.
pub fn net_crypto_text(amount: Option<Decimal>) -> String {
    amount.map_or_else(|| "0".to_string(), format_crypto)
}

/// Eight decimal places
pub fn format_crypto(amount: Decimal) -> String {
    fixed(amount, 8)
}

/// Two decimal places
pub fn format_rate(rate: Decimal) -> String {
    fixed(rate, 2)
}

/// Whole units with digit grouping and the currency symbol.
///
/// INR uses lakh/crore grouping (`₹35,00,000`), everything else groups by
/// thousands.
pub fn format_fiat(amount: Decimal, currency: &str) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();

    let grouped = if currency.eq_ignore_ascii_case("INR") {
        group_digits(&digits, 2)
    } else {
        group_digits(&digits, 3)
    };

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    format!("{sign}{}{grouped}", currency_symbol(currency))
}

fn fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.prec$}", prec = dp as usize)
}

fn currency_symbol(currency: &str) -> String {
    match currency.to_ascii_uppercase().as_str() {
        "INR" => "₹".into(),
        "USD" => "$".into(),
        "EUR" => "€".into(),
        "GBP" => "£".into(),
        other => format!("{other} "),
    }
}

/// Last three digits, then groups of `width`
fn group_digits(digits: &str, width: usize) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (mut head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = vec![tail];
    while head.len() > width {
        let (rest, group) = head.split_at(head.len() - width);
        groups.push(group);
        head = rest;
    }
    groups.push(head);
    groups.reverse();
    groups.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_net_crypto_text() {
        assert_eq!(net_crypto_text(Some(dec!(0.0068172690763))), "0.00681727");
        assert_eq!(net_crypto_text(Some(dec!(0.01))), "0.01000000");
        assert_eq!(net_crypto_text(None), "0");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(dec!(83)), "83.00");
        assert_eq!(format_rate(dec!(83.125)), "83.13");
    }

    #[test]
    fn test_format_fiat_indian_grouping() {
        assert_eq!(format_fiat(dec!(35000), "INR"), "₹35,000");
        assert_eq!(format_fiat(dec!(3500000), "INR"), "₹35,00,000");
        assert_eq!(format_fiat(dec!(52421.05), "INR"), "₹52,421");
        assert_eq!(format_fiat(dec!(999.5), "INR"), "₹1,000");
    }

    #[test]
    fn test_format_fiat_thousands_grouping() {
        assert_eq!(format_fiat(dec!(1234567), "USD"), "$1,234,567");
        assert_eq!(format_fiat(dec!(-1500.4), "usd"), "-$1,500");
        assert_eq!(format_fiat(dec!(12), "CHF"), "CHF 12");
        assert_eq!(format_fiat(dec!(-0.2), "USD"), "$0");
    }

    #[test]
    fn test_formula_sheet() {
        let sheet = formula_sheet();
        assert_eq!(sheet.market_crypto, "=(A1/B1)/C1");
        assert_eq!(sheet.net_crypto, "=((A1/B1)/C1)*(1-(D1/100))");
        assert_eq!(sheet.legend[3].cell, "D1");
    }
}
