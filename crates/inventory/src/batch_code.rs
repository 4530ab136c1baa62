//! Internal batch codes: `PREFIX-YYYYMM-NNN`.
//!
//! PREFIX is the first five alphanumeric characters of the product name,
//! upper-cased; `YYYYMM` is the receipt month; `NNN` is a per-prefix sequence.

use chrono::NaiveDate;

const PREFIX_LEN: usize = 5;

/// `"Dolo 650 (Paracetamol)"` received in Feb 2024 → `"DOLO6-202402"`.
pub fn batch_code_prefix(product_name: &str, received_on: NaiveDate) -> String {
    let name: String = product_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(PREFIX_LEN)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{name}-{}", received_on.format("%Y%m"))
}

/// Next free code for the prefix, given the codes already in use.
///
/// Codes that share the prefix but carry a non-numeric suffix are ignored.
pub fn next_batch_code<'a>(
    product_name: &str,
    received_on: NaiveDate,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    let prefix = batch_code_prefix(product_name, received_on);
    let max_seq = existing
        .into_iter()
        .filter_map(|code| code.strip_prefix(prefix.as_str()))
        .filter_map(|rest| rest.strip_prefix('-'))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{prefix}-{:03}", max_seq + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feb_2024() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()
    }

    #[test]
    fn prefix_strips_punctuation_and_uppercases() {
        assert_eq!(batch_code_prefix("Dolo 650 (Paracetamol)", feb_2024()), "DOLO6-202402");
        assert_eq!(batch_code_prefix("Zi", feb_2024()), "ZI-202402");
    }

    #[test]
    fn first_code_starts_at_one() {
        let code = next_batch_code("Vicks VapoRub", feb_2024(), []);
        assert_eq!(code, "VICKS-202402-001");
    }

    #[test]
    fn sequence_continues_from_highest_existing() {
        let existing = [
            "VICKS-202402-001",
            "VICKS-202402-007",
            "VICKS-202401-050",
            "VICKS-202402-XYZ",
            "OTHER-202402-099",
        ];
        let code = next_batch_code("Vicks VapoRub", feb_2024(), existing);
        assert_eq!(code, "VICKS-202402-008");
    }

    #[test]
    fn sequence_widens_past_three_digits() {
        let code = next_batch_code("Vicks", feb_2024(), ["VICKS-202402-999"]);
        assert_eq!(code, "VICKS-202402-1000");
    }
}
