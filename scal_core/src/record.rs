//! This module groups scraped collection dates into calendar records.
//!
//! Collections on the same day become one record, so a calendar shows a single
//! entry per bin day. Uids only depend on labels and dates; assembling the same
//! fragments again yields the same uids.

use std::{collections::HashMap, sync::OnceLock};

use chrono::{DateTime, Datelike, Local, Utc};
use regex::Regex;

use crate::moment::{parse_moment_in_year, ParsedMoment, UnparseableDate};

static UID_DOMAIN: &str = "brent.gov.uk";
static GROUP_UID_TOKEN: &str = "collections";
static LAST_TOKEN: &str = "(last)";
pub static CATEGORY: &str = "Waste Collection";

/// One scraped `(label, date text)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment {
    pub label: String,
    pub text: String,
}

impl RawFragment {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// How a service label takes part in grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceClass {
    /// A collection which shares a record with other collections on the same day.
    Regular,
    /// A subscription renewal, always a record of its own.
    Renewal,
}

impl ServiceClass {
    pub fn of(label: &str) -> Self {
        if renewal_regex().is_match(label) {
            ServiceClass::Renewal
        } else {
            ServiceClass::Regular
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub label: String,
    pub moment: ParsedMoment,
    pub original_text: String,
}

/// Members sharing one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventGroup {
    pub date_key: String,
    pub moment: ParsedMoment,
    pub members: Vec<GroupMember>,
}

impl EventGroup {
    fn new(member: GroupMember) -> Self {
        Self {
            date_key: member.moment.date_key(),
            moment: ParsedMoment::all_day(member.moment.date),
            members: vec![member],
        }
    }

    pub fn has_explicit_time(&self) -> bool {
        self.members
            .iter()
            .any(|member| member.moment.has_explicit_time())
    }
}

/// The unit handed to the calendar serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRecord {
    pub uid: String,
    pub start: ParsedMoment,
    pub summary: String,
    pub description: String,
    pub category: Option<String>,
    /// When the record was assembled, not derived from the input.
    pub stamp: DateTime<Utc>,
}

/// What happened to a single fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOutcome {
    Grouped { date_key: String },
    Renewal { date_key: String },
    Duplicate,
    Unparseable(UnparseableDate),
}

/// The records of one fetch cycle together with the outcome of every fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assembly {
    pub records: Vec<CalendarRecord>,
    /// Indexed like the input fragments.
    pub outcomes: Vec<FragmentOutcome>,
}

impl Assembly {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn unparseable(&self) -> impl Iterator<Item = &UnparseableDate> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FragmentOutcome::Unparseable(error) => Some(error),
            _ => None,
        })
    }
}

/// Entries keep the position where their first member appeared.
enum Entry {
    Group(EventGroup),
    Renewal(GroupMember),
}

/// Assembles records relative to a fixed year and generation time.
#[derive(Debug, Clone, Copy)]
pub struct Assembler {
    year: i32,
    stamp: DateTime<Utc>,
}

impl Assembler {
    pub fn new(year: i32, stamp: DateTime<Utc>) -> Self {
        Self { year, stamp }
    }

    pub fn now() -> Self {
        Self::new(Local::now().year(), Utc::now())
    }

    pub fn assemble(&self, fragments: &[RawFragment]) -> Assembly {
        let mut entries: Vec<Entry> = vec![];
        let mut group_index: HashMap<String, usize> = HashMap::new();
        let mut outcomes = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let moment = match parse_moment_in_year(&fragment.text, self.year) {
                Ok(moment) => moment,
                Err(error) => {
                    outcomes.push(FragmentOutcome::Unparseable(error));
                    continue;
                }
            };
            let member = GroupMember {
                label: fragment.label.clone(),
                moment,
                original_text: fragment.text.clone(),
            };
            let date_key = moment.date_key();
            let outcome = match ServiceClass::of(&fragment.label) {
                ServiceClass::Renewal => {
                    let duplicate = entries.iter().any(|entry| {
                        matches!(entry, Entry::Renewal(other) if is_same_day(other, &member))
                    });
                    if duplicate {
                        FragmentOutcome::Duplicate
                    } else {
                        entries.push(Entry::Renewal(member));
                        FragmentOutcome::Renewal { date_key }
                    }
                }
                ServiceClass::Regular => match group_index.get(&date_key) {
                    Some(&index) => {
                        let Entry::Group(group) = &mut entries[index] else {
                            unreachable!("group index only points at groups");
                        };
                        if group.members.iter().any(|other| is_same(other, &member)) {
                            FragmentOutcome::Duplicate
                        } else {
                            group.members.push(member);
                            FragmentOutcome::Grouped { date_key }
                        }
                    }
                    None => {
                        group_index.insert(date_key.clone(), entries.len());
                        entries.push(Entry::Group(EventGroup::new(member)));
                        FragmentOutcome::Grouped { date_key }
                    }
                },
            };
            outcomes.push(outcome);
        }
        let records = entries
            .iter()
            .map(|entry| match entry {
                Entry::Group(group) => self.group_record(group),
                Entry::Renewal(member) => self.renewal_record(member),
            })
            .collect();
        Assembly { records, outcomes }
    }

    fn group_record(&self, group: &EventGroup) -> CalendarRecord {
        if let [member] = group.members.as_slice() {
            let summary = clean_label(&member.label);
            return self.record(
                uid(&member.label, &group.date_key),
                member.moment,
                format!("Waste collection: {summary}"),
                summary,
            );
        }
        let labels: Vec<String> = group
            .members
            .iter()
            .map(|member| clean_label(&member.label))
            .collect();
        let summary = labels.join(", ");
        let description = if group.has_explicit_time() {
            group
                .members
                .iter()
                .zip(&labels)
                .map(|(member, label)| match member.moment.date_time() {
                    Some(date_time) => format!("{label} at {}", date_time.format("%-I:%M%P")),
                    None => label.clone(),
                })
                .collect::<Vec<String>>()
                .join("\n")
        } else {
            format!("Waste collection: {summary}")
        };
        self.record(
            uid(GROUP_UID_TOKEN, &group.date_key),
            group.moment,
            description,
            summary,
        )
    }

    fn renewal_record(&self, member: &GroupMember) -> CalendarRecord {
        let summary = format!("{} Renewal", clean_label(&remove_renewal_marker(&member.label)));
        self.record(
            uid(&member.label, &member.moment.date_key()),
            member.moment,
            format!("Waste collection: {summary}"),
            summary,
        )
    }

    fn record(
        &self,
        uid: String,
        start: ParsedMoment,
        description: String,
        summary: String,
    ) -> CalendarRecord {
        CalendarRecord {
            uid,
            start,
            summary,
            description,
            category: Some(String::from(CATEGORY)),
            stamp: self.stamp,
        }
    }
}

fn is_same(a: &GroupMember, b: &GroupMember) -> bool {
    a.label == b.label && a.moment == b.moment
}

/// Renewal uids don't carry a time, one renewal per label and day.
fn is_same_day(a: &GroupMember, b: &GroupMember) -> bool {
    a.label == b.label && a.moment.date == b.moment.date
}

fn renewal_regex() -> &'static Regex {
    static RENEWAL: OnceLock<Regex> = OnceLock::new();
    RENEWAL.get_or_init(|| Regex::new(r"(?i)\brenewals?\b").expect("renewal regex is valid"))
}

fn whitespace_regex() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex is valid"))
}

/// Strip category words and the `(last)` token from a service label.
pub fn clean_label(label: &str) -> String {
    static CATEGORY_WORDS: OnceLock<Regex> = OnceLock::new();
    let category_words = CATEGORY_WORDS.get_or_init(|| {
        Regex::new(r"(?i)\bcollections?\b").expect("category words regex is valid")
    });
    let label = label.replace(LAST_TOKEN, " ");
    let label = category_words.replace_all(&label, " ");
    whitespace_regex().replace_all(label.trim(), " ").into_owned()
}

fn remove_renewal_marker(label: &str) -> String {
    renewal_regex().replace_all(label, " ").into_owned()
}

/// Get a unique id for a label on a specific day.
///
/// Changing this function is a breaking change!
fn uid(label: &str, date_key: &str) -> String {
    let label = whitespace_regex().replace_all(label.trim(), "_");
    format!("{label}_{date_key}@{UID_DOMAIN}")
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    use crate::{
        moment::ParsedMoment,
        record::{clean_label, Assembler, FragmentOutcome, RawFragment, ServiceClass, CATEGORY},
    };

    fn assembler() -> Assembler {
        Assembler::new(2025, Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap())
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let assembly = assembler().assemble(&[]);
        assert!(assembly.is_empty());
        assert!(assembly.outcomes.is_empty());
    }

    #[test]
    fn test_single_member() {
        let assembly = assembler().assemble(&[RawFragment::new(
            "Food waste collection",
            "Tuesday, 15th July",
        )]);
        assert_eq!(assembly.records.len(), 1);
        let record = &assembly.records[0];
        assert_eq!(record.uid, "Food_waste_collection_20250715@brent.gov.uk");
        assert_eq!(record.start, ParsedMoment::all_day(date(7, 15)));
        assert_eq!(record.summary, "Food waste");
        assert_eq!(record.description, "Waste collection: Food waste");
        assert_eq!(record.category.as_deref(), Some(CATEGORY));
        assert_eq!(record.stamp, Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_single_member_keeps_its_time() {
        let assembly =
            assembler().assemble(&[RawFragment::new("Recycling", "15th July at 11:10am")]);
        let record = &assembly.records[0];
        assert_eq!(
            record.start,
            ParsedMoment::at(date(7, 15), NaiveTime::from_hms_opt(11, 10, 0).unwrap())
        );
    }

    #[test]
    fn test_same_day_is_consolidated() {
        let assembly = assembler().assemble(&[
            RawFragment::new("Rubbish", "Tuesday, 15th July"),
            RawFragment::new("Food waste", "Friday, 18th July"),
            RawFragment::new("Recycling collection", "15 July 2025"),
        ]);
        assert_eq!(assembly.records.len(), 2);
        let group = &assembly.records[0];
        assert_eq!(group.uid, "collections_20250715@brent.gov.uk");
        assert_eq!(group.summary, "Rubbish, Recycling");
        assert_eq!(group.description, "Waste collection: Rubbish, Recycling");
        assert_eq!(group.start, ParsedMoment::all_day(date(7, 15)));
        assert_eq!(assembly.records[1].uid, "Food_waste_20250718@brent.gov.uk");
    }

    #[test]
    fn test_group_with_times_lists_members() {
        let assembly = assembler().assemble(&[
            RawFragment::new("Rubbish", "Tuesday, 15th July at 7:05am"),
            RawFragment::new("Garden waste", "Tuesday, 15th July"),
            RawFragment::new("Recycling", "Tuesday, 15th July at 13:30"),
        ]);
        assert_eq!(assembly.records.len(), 1);
        let group = &assembly.records[0];
        assert_eq!(group.start, ParsedMoment::all_day(date(7, 15)));
        assert_eq!(
            group.description,
            "Rubbish at 7:05am\nGarden waste\nRecycling at 1:30pm"
        );
    }

    #[test]
    fn test_renewal_never_merges() {
        let assembly = assembler().assemble(&[
            RawFragment::new("Rubbish", "Tuesday, 15th July"),
            RawFragment::new("Garden waste renewal", "Tuesday, 15th July"),
            RawFragment::new("Recycling", "Tuesday, 15th July"),
        ]);
        assert_eq!(assembly.records.len(), 2);
        assert_eq!(assembly.records[0].uid, "collections_20250715@brent.gov.uk");
        assert_eq!(assembly.records[0].summary, "Rubbish, Recycling");
        let renewal = &assembly.records[1];
        assert_eq!(renewal.uid, "Garden_waste_renewal_20250715@brent.gov.uk");
        assert_eq!(renewal.summary, "Garden waste Renewal");
        assert_eq!(
            assembly.outcomes[1],
            FragmentOutcome::Renewal {
                date_key: String::from("20250715")
            }
        );
    }

    #[test]
    fn test_renewal_once_per_day() {
        let assembly = assembler().assemble(&[
            RawFragment::new("Garden waste renewal", "Friday, 1st August"),
            RawFragment::new("Garden waste renewal", "Friday, 1st August at 9:00am"),
        ]);
        assert_eq!(assembly.records.len(), 1);
        assert_eq!(
            assembly.records[0].uid,
            "Garden_waste_renewal_20250801@brent.gov.uk"
        );
        assert_eq!(assembly.records[0].start, ParsedMoment::all_day(date(8, 1)));
        assert_eq!(assembly.outcomes[1], FragmentOutcome::Duplicate);
    }

    #[test]
    fn test_renewal_marker_is_replaced() {
        let assembly = assembler().assemble(&[RawFragment::new(
            "Garden waste renewals",
            "Friday, 1st August",
        )]);
        assert_eq!(assembly.records[0].summary, "Garden waste Renewal");
        assert_eq!(
            assembly.outcomes[0],
            FragmentOutcome::Renewal {
                date_key: String::from("20250801")
            }
        );
    }

    #[test]
    fn test_unparseable_fragments_are_skipped() {
        let assembly = assembler().assemble(&[
            RawFragment::new("Rubbish", "Loading your bin days..."),
            RawFragment::new("Recycling", "Tuesday, 15th July"),
        ]);
        assert_eq!(assembly.records.len(), 1);
        assert_eq!(assembly.records[0].summary, "Recycling");
        assert_eq!(assembly.unparseable().count(), 1);
        assert!(matches!(assembly.outcomes[0], FragmentOutcome::Unparseable(_)));
    }

    #[test]
    fn test_duplicates_collapse() {
        let assembly = assembler().assemble(&[
            RawFragment::new("Rubbish", "Tuesday, 15th July"),
            RawFragment::new("Rubbish", "15 July 2025"),
        ]);
        assert_eq!(assembly.records.len(), 1);
        assert_eq!(assembly.records[0].uid, "Rubbish_20250715@brent.gov.uk");
        assert_eq!(assembly.outcomes[1], FragmentOutcome::Duplicate);
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let fragments = [
            RawFragment::new("Rubbish", "Tuesday, 15th July"),
            RawFragment::new("Recycling", "Tuesday, 15th July at 8:00am"),
            RawFragment::new("Food waste", "Friday, 18th July"),
            RawFragment::new("Garden waste renewal", "1 August 2025"),
        ];
        let first = assembler().assemble(&fragments);
        let second = Assembler::new(2025, Utc::now()).assemble(&fragments);
        let uids = |records: &[crate::record::CalendarRecord]| {
            records
                .iter()
                .map(|record| record.uid.clone())
                .collect::<Vec<String>>()
        };
        assert_eq!(uids(&first.records), uids(&second.records));
        assert_eq!(first.outcomes, second.outcomes);
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("Food waste\n   collection"), "Food waste");
        assert_eq!(clean_label("Rubbish (last)"), "Rubbish");
        assert_eq!(clean_label("Collections  of  Paper"), "of Paper");
        assert_eq!(clean_label("Recycling"), "Recycling");
    }

    #[test]
    fn test_service_class() {
        assert_eq!(ServiceClass::of("Garden Waste Renewal"), ServiceClass::Renewal);
        assert_eq!(ServiceClass::of("Garden waste renewals"), ServiceClass::Renewal);
        assert_eq!(ServiceClass::of("Garden waste"), ServiceClass::Regular);
        assert_eq!(ServiceClass::of("Renewables"), ServiceClass::Regular);
    }
}
