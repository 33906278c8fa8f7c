//! Numbers the views show, computed from loaded rows and a clock reading.
//! Nothing here touches the network or the store.

use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use duo_types::models::{BucketItem, ImportantDate, MoodEntry};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// A non-negative span broken into display units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Elapsed {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Elapsed {
    /// Negative spans clamp to zero.
    pub fn from_seconds(total: i64) -> Self {
        let total = total.max(0);
        Self {
            days: total / SECONDS_PER_DAY,
            hours: (total % SECONDS_PER_DAY) / SECONDS_PER_HOUR,
            minutes: (total % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE,
            seconds: total % SECONDS_PER_MINUTE,
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.days * SECONDS_PER_DAY + self.hours * SECONDS_PER_HOUR + self.minutes * SECONDS_PER_MINUTE + self.seconds
    }
}

/// Time together since local midnight of the anniversary. An anniversary
/// in the future reads as zero.
pub fn elapsed_since(anniversary: NaiveDate, now: NaiveDateTime) -> Elapsed {
    let start = anniversary.and_time(NaiveTime::MIN);
    Elapsed::from_seconds((now - start).num_seconds())
}

/// Whole calendar days from `today` to `date`; negative once it has passed.
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Time left until local midnight of `date`, or `None` once it has begun.
pub fn countdown_to(date: NaiveDate, now: NaiveDateTime) -> Option<Elapsed> {
    let target = date.and_time(NaiveTime::MIN);
    let remaining = (target - now).num_seconds();
    (remaining > 0).then(|| Elapsed::from_seconds(remaining))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLabel {
    Today,
    Tomorrow,
    InDays(i64),
    InWeeks(i64),
    InMonths(i64),
    DaysAgo(i64),
}

/// Up to two weeks reads in days, up to a month in weeks, then in
/// 30-day months.
pub fn date_label(days: i64) -> DateLabel {
    match days {
        0 => DateLabel::Today,
        1 => DateLabel::Tomorrow,
        d if d < 0 => DateLabel::DaysAgo(-d),
        d if d < 14 => DateLabel::InDays(d),
        d if d <= 30 => DateLabel::InWeeks(d / 7),
        d => DateLabel::InMonths(d / 30),
    }
}

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn plural(n: i64, unit: &str) -> String {
            if n == 1 { format!("1 {}", unit) } else { format!("{} {}s", n, unit) }
        }

        match *self {
            DateLabel::Today => write!(f, "today"),
            DateLabel::Tomorrow => write!(f, "tomorrow"),
            DateLabel::InDays(n) => write!(f, "in {}", plural(n, "day")),
            DateLabel::InWeeks(n) => write!(f, "in {}", plural(n, "week")),
            DateLabel::InMonths(n) => write!(f, "in {}", plural(n, "month")),
            DateLabel::DaysAgo(n) => write!(f, "{} ago", plural(n, "day")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// 0.0 to 100.0; an empty list is 0.
    pub percent: f64,
}

pub fn progress(items: &[BucketItem]) -> Progress {
    let total = items.len();
    let completed = items.iter().filter(|item| item.completed).count();
    let percent = if total == 0 {
        0.0
    } else {
        completed as f64 * 100.0 / total as f64
    };
    Progress {
        completed,
        total,
        percent,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BucketFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl BucketFilter {
    pub fn matches(&self, item: &BucketItem) -> bool {
        match self {
            BucketFilter::All => true,
            BucketFilter::Active => !item.completed,
            BucketFilter::Completed => item.completed,
        }
    }
}

pub fn filter_bucket(items: &[BucketItem], filter: BucketFilter) -> Vec<BucketItem> {
    items.iter().filter(|item| filter.matches(item)).cloned().collect()
}

/// Latest entry per partner name. Equal timestamps go to whichever entry
/// comes later in `entries`.
pub fn current_moods(entries: &[MoodEntry]) -> HashMap<String, MoodEntry> {
    let mut latest: HashMap<String, MoodEntry> = HashMap::new();
    for entry in entries {
        let newer = latest
            .get(&entry.partner_name)
            .is_none_or(|current| entry.created_at >= current.created_at);
        if newer {
            latest.insert(entry.partner_name.clone(), entry.clone());
        }
    }
    latest
}

/// Nearest first, whether the date is ahead or behind.
pub fn sort_by_proximity(dates: &mut [ImportantDate], today: NaiveDate) {
    dates.sort_by_key(|d| days_until(d.date, today).abs());
}

/// Dates from `today` on, soonest first.
pub fn upcoming(dates: &[ImportantDate], today: NaiveDate) -> Vec<ImportantDate> {
    let mut ahead: Vec<ImportantDate> = dates
        .iter()
        .filter(|d| days_until(d.date, today) >= 0)
        .cloned()
        .collect();
    ahead.sort_by_key(|d| d.date);
    ahead
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use duo_types::models::{Category, DateKind, Mood, Priority};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(s: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_730_000_000 + s, 0).unwrap()
    }

    fn mood(name: &str, mood: Mood, created_at: DateTime<Utc>) -> MoodEntry {
        MoodEntry {
            id: Uuid::new_v4(),
            couple_id: Uuid::nil(),
            partner_name: name.to_string(),
            mood,
            note: None,
            created_at,
        }
    }

    fn bucket(completed: bool) -> BucketItem {
        BucketItem {
            id: Uuid::new_v4(),
            couple_id: Uuid::nil(),
            title: "Paris".into(),
            category: Category::Travel,
            priority: Priority::High,
            completed,
            notes: None,
            created_at: at(0),
            updated_at: at(0),
            completed_at: completed.then(|| at(1)),
        }
    }

    fn important(title: &str, date: NaiveDate) -> ImportantDate {
        ImportantDate {
            id: Uuid::new_v4(),
            couple_id: Uuid::nil(),
            title: title.into(),
            date,
            kind: DateKind::Special,
            icon: "📅".into(),
            description: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    #[test]
    fn elapsed_counts_from_local_midnight() {
        let now = day(2024, 11, 15).and_hms_opt(0, 0, 0).unwrap();
        let elapsed = elapsed_since(day(2024, 11, 13), now);
        assert_eq!(elapsed, Elapsed { days: 2, hours: 0, minutes: 0, seconds: 0 });

        let later = now + Duration::seconds(3 * 3600 + 25 * 60 + 7);
        let elapsed = elapsed_since(day(2024, 11, 13), later);
        assert_eq!((elapsed.days, elapsed.hours, elapsed.minutes, elapsed.seconds), (2, 3, 25, 7));
    }

    #[test]
    fn future_anniversary_reads_as_zero() {
        let now = day(2024, 1, 1).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(elapsed_since(day(2025, 1, 1), now), Elapsed::default());
    }

    #[test]
    fn elapsed_never_decreases() {
        let start = day(2024, 11, 13);
        let mut now = day(2024, 11, 20).and_hms_opt(8, 0, 0).unwrap();
        let mut previous = elapsed_since(start, now).total_seconds();
        for _ in 0..100 {
            now += Duration::seconds(37);
            let current = elapsed_since(start, now).total_seconds();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn labels_bucket_by_distance() {
        assert_eq!(date_label(0).to_string(), "today");
        assert_eq!(date_label(1).to_string(), "tomorrow");
        assert_eq!(date_label(5).to_string(), "in 5 days");
        assert_eq!(date_label(10).to_string(), "in 10 days");
        assert_eq!(date_label(21).to_string(), "in 3 weeks");
        assert_eq!(date_label(45).to_string(), "in 1 month");
        assert_eq!(date_label(95).to_string(), "in 3 months");
        assert_eq!(date_label(-1).to_string(), "1 day ago");
        assert_eq!(date_label(-4).to_string(), "4 days ago");
    }

    #[test]
    fn days_until_is_signed() {
        let today = day(2025, 2, 1);
        assert_eq!(days_until(day(2025, 2, 11), today), 10);
        assert_eq!(days_until(day(2025, 1, 30), today), -2);
    }

    #[test]
    fn countdown_stops_at_the_date() {
        let now = day(2025, 2, 13).and_hms_opt(18, 30, 0).unwrap();
        let left = countdown_to(day(2025, 2, 14), now).unwrap();
        assert_eq!((left.days, left.hours, left.minutes), (0, 5, 30));
        assert_eq!(countdown_to(day(2025, 2, 13), now), None);
    }

    #[test]
    fn progress_of_empty_list_is_zero() {
        let p = progress(&[]);
        assert_eq!((p.completed, p.total), (0, 0));
        assert_eq!(p.percent, 0.0);
    }

    #[test]
    fn progress_counts_completed() {
        let items = vec![bucket(true), bucket(false), bucket(false), bucket(true)];
        let p = progress(&items);
        assert_eq!((p.completed, p.total), (2, 4));
        assert!((p.percent - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bucket_filters() {
        let items = vec![bucket(true), bucket(false), bucket(false)];
        assert_eq!(filter_bucket(&items, BucketFilter::All).len(), 3);
        assert_eq!(filter_bucket(&items, BucketFilter::Active).len(), 2);
        assert_eq!(filter_bucket(&items, BucketFilter::Completed).len(), 1);
    }

    #[test]
    fn latest_mood_per_partner() {
        let entries = vec![
            mood("A", Mood::Sad, at(1)),
            mood("B", Mood::Happy, at(2)),
            mood("A", Mood::Happy, at(3)),
        ];
        let current = current_moods(&entries);
        assert_eq!(current.len(), 2);
        assert_eq!(current["A"].mood, Mood::Happy);
        assert_eq!(current["B"].mood, Mood::Happy);
    }

    #[test]
    fn mood_ties_go_to_the_later_entry() {
        let entries = vec![mood("A", Mood::Happy, at(5)), mood("A", Mood::Okay, at(5))];
        assert_eq!(current_moods(&entries)["A"].mood, Mood::Okay);

        // Input order doesn't matter when timestamps differ.
        let entries = vec![mood("A", Mood::Amazing, at(9)), mood("A", Mood::Sad, at(4))];
        assert_eq!(current_moods(&entries)["A"].mood, Mood::Amazing);
    }

    #[test]
    fn upcoming_skips_the_past() {
        let today = day(2025, 3, 1);
        let dates = vec![
            important("later", day(2025, 6, 1)),
            important("past", day(2025, 2, 1)),
            important("today", day(2025, 3, 1)),
        ];
        let titles: Vec<_> = upcoming(&dates, today).into_iter().map(|d| d.title).collect();
        assert_eq!(titles, ["today", "later"]);
    }

    #[test]
    fn proximity_ignores_direction() {
        let today = day(2025, 3, 1);
        let mut dates = vec![
            important("far", day(2025, 9, 1)),
            important("yesterday", day(2025, 2, 28)),
            important("next week", day(2025, 3, 8)),
        ];
        sort_by_proximity(&mut dates, today);
        let titles: Vec<_> = dates.into_iter().map(|d| d.title).collect();
        assert_eq!(titles, ["yesterday", "next week", "far"]);
    }
}
