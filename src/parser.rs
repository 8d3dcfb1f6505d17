//! Tolerant extraction of PSAP records from assistant answers.
//!
//! The assistant is asked to answer with `PSAP:`, `PSAP Website:`, `Phone:`
//! and `Jurisdiction:` lines, but nothing enforces it. Lines that do not
//! carry one of those prefixes are skipped and missing fields stay empty.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{PhoneNumber, PsapRecord};

const NAME_PREFIX: &str = "PSAP:";
const WEBSITE_PREFIX: &str = "PSAP Website:";
const PHONE_PREFIX: &str = "Phone:";
const JURISDICTION_PREFIX: &str = "Jurisdiction:";

static SECTION_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("section break pattern is valid"));

/// Parses an answer describing a single PSAP. `raw_text` keeps the input verbatim.
pub fn parse_single(text: &str) -> PsapRecord {
    let mut record = PsapRecord {
        raw_text: text.to_string(),
        ..PsapRecord::default()
    };
    apply_lines(&mut record, text);
    record
}

/// Parses an answer listing several PSAPs separated by blank lines.
///
/// Sections without a `PSAP:` name are dropped; order is preserved, so the
/// first record is the primary PSAP when the assistant followed the request.
pub fn parse_multiple(text: &str) -> Vec<PsapRecord> {
    SECTION_BREAK
        .split(text)
        .map(str::trim)
        .filter(|section| !section.is_empty())
        .map(|section| {
            let mut record = PsapRecord {
                raw_text: section.to_string(),
                ..PsapRecord::default()
            };
            apply_lines(&mut record, section);
            record
        })
        .filter(|record| !record.name.is_empty())
        .collect()
}

fn apply_lines(record: &mut PsapRecord, text: &str) {
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(value) = line.strip_prefix(NAME_PREFIX) {
            record.name = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix(WEBSITE_PREFIX) {
            record.website = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix(PHONE_PREFIX) {
            record.phone_numbers.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .map(PhoneNumber::emergency),
            );
        } else if let Some(value) = line.strip_prefix(JURISDICTION_PREFIX) {
            record.jurisdiction = value.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NYC_ANSWER: &str = "PSAP: NYPD Communications Division\n\
        PSAP Website: https://www.nyc.gov/site/nypd\n\
        Phone: 911, 646-610-5000\n\
        Jurisdiction: New York City, NY";

    #[test]
    fn test_single_fields() {
        let record = parse_single("PSAP: X\nPhone: 555-1111, 555-2222\nJurisdiction: City");
        assert_eq!(record.name, "X");
        assert_eq!(record.website, "");
        assert_eq!(
            record.phone_numbers,
            vec![
                PhoneNumber::emergency("555-1111"),
                PhoneNumber::emergency("555-2222"),
            ]
        );
        assert_eq!(record.jurisdiction, "City");
    }

    #[test]
    fn test_single_keeps_raw_text_and_website() {
        let record = parse_single(NYC_ANSWER);
        assert_eq!(record.raw_text, NYC_ANSWER);
        assert_eq!(record.name, "NYPD Communications Division");
        assert_eq!(record.website, "https://www.nyc.gov/site/nypd");
        assert_eq!(record.phone_numbers.len(), 2);
        assert_eq!(record.phone_numbers[0].kind, "Emergency");
        assert_eq!(record.jurisdiction, "New York City, NY");
    }

    #[test]
    fn test_single_tolerates_prose() {
        let text = "Here is the PSAP for those coordinates:\n\n  PSAP:   County 911  \n\
            Note: call volume is high\nphone: 123\nPhone: 555-0000\n";
        let record = parse_single(text);
        assert_eq!(record.name, "County 911");
        assert_eq!(record.phone_numbers, vec![PhoneNumber::emergency("555-0000")]);
        assert_eq!(record.jurisdiction, "");
    }

    #[test]
    fn test_duplicate_numbers_preserved() {
        let record = parse_single("Phone: 911, 911\nPhone: 911");
        assert_eq!(record.phone_numbers.len(), 3);
        assert!(record.phone_numbers.iter().all(|p| p.number == "911"));
    }

    #[test]
    fn test_blank_phone_pieces_kept_in_place() {
        let record = parse_single("Phone: 911, \nPhone:\nPhone: ,555-0100");
        let numbers: Vec<_> = record.phone_numbers.iter().map(|p| p.number.as_str()).collect();
        assert_eq!(numbers, ["911", "", "", "", "555-0100"]);
        assert!(record.phone_numbers.iter().all(|p| p.kind == "Emergency"));
    }

    #[test]
    fn test_single_empty_input() {
        let record = parse_single("");
        assert_eq!(record, PsapRecord::default());
    }

    #[test]
    fn test_single_is_repeatable() {
        assert_eq!(parse_single(NYC_ANSWER), parse_single(NYC_ANSWER));
    }

    #[test]
    fn test_multiple_drops_unnamed_sections() {
        let text = format!("{NYC_ANSWER}\n\nPhone: 555-9999\nJurisdiction: Nowhere");
        let records = parse_multiple(&text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "NYPD Communications Division");
        assert_eq!(records[0].raw_text, NYC_ANSWER);
    }

    #[test]
    fn test_multiple_preserves_order_across_blank_runs() {
        let text = "Nearby options:\n\nPSAP: Primary\nPhone: 911\n\n\n  \nPSAP: Backup A\n\
            Jurisdiction: North\r\n\r\nPSAP: Backup B\nPhone: 555-2000, 555-2001\n";
        let records = parse_multiple(text);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Primary", "Backup A", "Backup B"]);
        assert_eq!(records[1].jurisdiction, "North");
        assert_eq!(records[2].phone_numbers.len(), 2);
    }

    #[test]
    fn test_multiple_without_any_psap() {
        assert!(parse_multiple("I could not determine a PSAP.").is_empty());
        assert!(parse_multiple("").is_empty());
    }
}
