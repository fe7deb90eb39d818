use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::{Code, Finding, Rule, RuleInput, Subject};

static NID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("NID pattern is valid"));

const CREDATE: &str = "credate";
const REVDATE: &str = "revdate";

fn property(subject: &Subject, index: usize, key: &str) -> Option<String> {
    let value = match subject {
        Subject::Lines(network) => network.layer.features[index].property_str(key),
        Subject::Points(layer) => layer.features[index].property_str(key),
    }?;
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

pub struct NidFormat;

impl Rule for NidFormat {
    fn code(&self) -> Code {
        Code::E401
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let subject = &input.subject;
        let flagged = (0..subject.len())
            .filter(|&i| !NID_PATTERN.is_match(subject.id(i)))
            .collect();
        Some(Finding::new(self.code(), flagged))
    }
}

pub struct UniqueIds;

impl Rule for UniqueIds {
    fn code(&self) -> Code {
        Code::E402
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let subject = &input.subject;
        let mut by_id: HashMap<&str, Vec<usize>> = HashMap::new();
        for i in 0..subject.len() {
            by_id.entry(subject.id(i)).or_default().push(i);
        }
        let flagged = by_id
            .into_values()
            .filter(|members| members.len() > 1)
            .flatten()
            .collect();
        Some(Finding::new(self.code(), flagged))
    }
}

pub struct Dates;

impl Rule for Dates {
    fn code(&self) -> Code {
        Code::E403
    }

    fn evaluate(&self, input: &RuleInput) -> Option<Finding> {
        let subject = &input.subject;
        let earliest = NaiveDate::from_ymd_opt(input.thresholds().min_year, 1, 1)?;
        let today = input.context.today;
        let in_range = |date: &NaiveDate| *date >= earliest && *date <= today;

        let flagged = (0..subject.len())
            .filter(|&i| {
                let credate = property(subject, i, CREDATE).map(|v| parse_partial_date(&v));
                let revdate = property(subject, i, REVDATE).map(|v| parse_partial_date(&v));

                let bad = |date: &Option<Option<NaiveDate>>| match date {
                    None => false,
                    Some(None) => true,
                    Some(Some(d)) => !in_range(d),
                };
                let out_of_order = matches!(
                    (credate, revdate),
                    (Some(Some(created)), Some(Some(revised))) if revised < created
                );
                bad(&credate) || bad(&revdate) || out_of_order
            })
            .collect();
        Some(Finding::new(self.code(), flagged))
    }
}

/// `YYYY`, `YYYYMM` or `YYYYMMDD`; missing parts default to the first
/// month or day.
pub fn parse_partial_date(value: &str) -> Option<NaiveDate> {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let part = |range: std::ops::Range<usize>| value[range].parse::<u32>().ok();
    let (year, month, day) = match value.len() {
        4 => (part(0..4)?, 1, 1),
        6 => (part(0..4)?, part(4..6)?, 1),
        8 => (part(0..4)?, part(4..6)?, part(6..8)?),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}
