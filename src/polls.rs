use chrono::{DateTime, Duration, Utc};

/// WHERE fragment selecting live questions: published and not yet ended.
/// Every query that cares about liveness (index, trending, search, vote
/// eligibility) must splice this exact predicate with `now` bound as `$1`
/// so the rule cannot drift between endpoints.
pub const LIVE_WHERE: &str = "pub_date <= $1 AND (end_date IS NULL OR end_date >= $1)";

pub fn is_published(pub_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    pub_date <= now
}

/// A question accepts choice votes while it is published and not ended.
/// This is the in-process twin of [`LIVE_WHERE`].
pub fn can_vote(pub_date: DateTime<Utc>, end_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match end_date {
        None => pub_date <= now,
        Some(end) => pub_date <= now && now <= end,
    }
}

/// Published within the last day and not in the future.
pub fn was_published_recently(pub_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - Duration::days(1) <= pub_date && pub_date <= now
}

/// Ranking score snapshotted on question creation: a recency base that steps
/// down at 3, 7 and 30 days of TOTAL elapsed time, plus a sentiment
/// adjustment of 20 points per up/down vote. Deliberately unclamped.
pub fn trending_score(
    pub_date: DateTime<Utc>,
    now: DateTime<Utc>,
    up_count: i64,
    down_count: i64,
) -> f64 {
    let elapsed = (now - pub_date).num_seconds();
    let base = if elapsed < 259_200 {
        100.0
    } else if elapsed < 604_800 {
        75.0
    } else if elapsed < 2_592_000 {
        50.0
    } else {
        25.0
    };
    base + ((up_count as f64 / 5.0) - (down_count as f64 / 5.0)) * 100.0
}

/// How a submission lands in a one-row-per-(user, question) ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerWrite {
    Created,
    Updated,
    Unchanged,
}

/// Choice votes keep a single row per user per question: the first vote
/// creates it, any later vote moves it to the submitted choice.
pub fn vote_write(existing: Option<i32>) -> LedgerWrite {
    match existing {
        None => LedgerWrite::Created,
        Some(_) => LedgerWrite::Updated,
    }
}

/// Sentiment keeps a single row per user per question. Repeating the
/// recorded direction leaves the row alone; the opposite direction flips it.
pub fn sentiment_write(existing: Option<bool>, direction: bool) -> LedgerWrite {
    match existing {
        None => LedgerWrite::Created,
        Some(current) if current == direction => LedgerWrite::Unchanged,
        Some(_) => LedgerWrite::Updated,
    }
}

/// Integer percentages of up and down sentiment. (0, 0) when nobody has
/// sentiment-voted yet.
pub fn vote_percentages(up_count: i64, down_count: i64) -> (i64, i64) {
    let total = up_count + down_count;
    if total == 0 {
        return (0, 0);
    }
    (up_count * 100 / total, down_count * 100 / total)
}

/// Human-readable time until the poll closes, largest non-zero unit only.
/// Open-ended polls report "No end date"; already-ended polls report an
/// empty string.
pub fn time_left(end_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(end) = end_date else {
        return "No end date".to_string();
    };
    let total = (end - now).num_seconds();
    let days = total / 86_400;
    let rem = total % 86_400;
    let hours = rem / 3_600;
    let rem = rem % 3_600;
    let minutes = rem / 60;
    let seconds = rem % 60;

    if days > 0 {
        format!("{days} Days")
    } else if hours > 0 {
        format!("{hours} Hours")
    } else if minutes > 0 {
        format!("{minutes} Mins")
    } else if seconds > 0 {
        format!("{seconds} Sec")
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn published_question_is_published() {
        let now = at(0);
        assert!(is_published(now - Duration::days(1), now));
        assert!(is_published(now, now));
        assert!(!is_published(now + Duration::days(30), now));
    }

    #[test]
    fn can_vote_without_end_date() {
        let now = at(0);
        assert!(can_vote(now - Duration::hours(1), None, now));
        assert!(!can_vote(now + Duration::hours(1), None, now));
    }

    #[test]
    fn can_vote_before_end_date() {
        let now = at(0);
        assert!(can_vote(
            now - Duration::hours(1),
            Some(now + Duration::hours(2)),
            now
        ));
    }

    #[test]
    fn cannot_vote_after_end_date() {
        let now = at(0);
        assert!(!can_vote(
            now - Duration::hours(2),
            Some(now - Duration::hours(1)),
            now
        ));
    }

    #[test]
    fn recently_published_window_is_one_day() {
        let now = at(0);
        assert!(was_published_recently(
            now - Duration::hours(23) - Duration::minutes(59) - Duration::seconds(59),
            now
        ));
        assert!(!was_published_recently(
            now - Duration::days(1) - Duration::seconds(1),
            now
        ));
        assert!(!was_published_recently(now + Duration::days(30), now));
    }

    #[test]
    fn fresh_question_scores_base_100() {
        let now = at(0);
        assert_eq!(trending_score(now - Duration::hours(1), now, 0, 0), 100.0);
    }

    #[test]
    fn recency_buckets_step_down_at_exact_boundaries() {
        let now = at(0);
        let score = |elapsed: i64| trending_score(now - Duration::seconds(elapsed), now, 0, 0);
        assert_eq!(score(259_199), 100.0);
        assert_eq!(score(259_200), 75.0);
        assert_eq!(score(604_799), 75.0);
        assert_eq!(score(604_800), 50.0);
        assert_eq!(score(2_591_999), 50.0);
        assert_eq!(score(2_592_000), 25.0);
    }

    #[test]
    fn score_never_increases_with_age() {
        let now = at(0);
        let mut last = f64::INFINITY;
        for elapsed in [0, 259_200, 604_800, 2_592_000, 10_000_000] {
            let score = trending_score(now - Duration::seconds(elapsed), now, 3, 2);
            assert!(score <= last);
            last = score;
        }
    }

    #[test]
    fn score_strictly_increases_with_upvotes() {
        let now = at(0);
        let pub_date = now - Duration::days(10);
        let mut last = f64::NEG_INFINITY;
        for up in 0..5 {
            let score = trending_score(pub_date, now, up, 2);
            assert!(score > last);
            last = score;
        }
    }

    #[test]
    fn score_is_not_clamped() {
        let now = at(0);
        let old = now - Duration::days(40);
        // 25 - (10/5)*100 = -175
        assert_eq!(trending_score(old, now, 0, 10), -175.0);
        // 100 + (10/5)*100 = 300
        assert_eq!(trending_score(now, now, 10, 0), 300.0);
    }

    #[test]
    fn revote_moves_the_single_row_to_the_latest_choice() {
        use std::collections::HashMap;

        let mut votes: HashMap<(i32, i32), i32> = HashMap::new();
        let mut cast = |user: i32, question: i32, choice: i32| -> LedgerWrite {
            let write = vote_write(votes.get(&(user, question)).copied());
            votes.insert((user, question), choice);
            write
        };

        assert_eq!(cast(1, 10, 101), LedgerWrite::Created);
        assert_eq!(cast(1, 10, 102), LedgerWrite::Updated);
        assert_eq!(cast(1, 10, 102), LedgerWrite::Updated);

        assert_eq!(votes.len(), 1);
        assert_eq!(votes[&(1, 10)], 102);
    }

    #[test]
    fn repeated_sentiment_in_same_direction_is_a_no_op() {
        use std::collections::HashMap;

        let mut ledger: HashMap<(i32, i32), bool> = HashMap::new();
        let key = (1, 10);

        assert_eq!(
            sentiment_write(ledger.get(&key).copied(), true),
            LedgerWrite::Created
        );
        ledger.insert(key, true);

        assert_eq!(
            sentiment_write(ledger.get(&key).copied(), true),
            LedgerWrite::Unchanged
        );
        assert_eq!(ledger.len(), 1);
        assert!(ledger[&key]);
    }

    #[test]
    fn opposite_sentiment_flips_the_recorded_direction() {
        use std::collections::HashMap;

        let counts = |ledger: &HashMap<(i32, i32), bool>| -> (usize, usize) {
            let up = ledger.values().filter(|&&up| up).count();
            (up, ledger.len() - up)
        };

        let mut ledger: HashMap<(i32, i32), bool> = HashMap::new();
        ledger.insert((1, 10), true);
        assert_eq!(counts(&ledger), (1, 0));
        assert_eq!(
            sentiment_write(ledger.get(&(1, 10)).copied(), false),
            LedgerWrite::Updated
        );
        ledger.insert((1, 10), false);
        assert_eq!(counts(&ledger), (0, 1));

        assert_eq!(
            sentiment_write(ledger.get(&(1, 10)).copied(), true),
            LedgerWrite::Updated
        );
        ledger.insert((1, 10), true);
        assert_eq!(counts(&ledger), (1, 0));
    }

    #[test]
    fn sentiment_tally_counts_one_entry_per_user() {
        use std::collections::HashMap;

        let mut ledger: HashMap<(i32, i32), bool> = HashMap::new();
        for (user, direction) in [(1, true), (2, true), (3, false), (1, true), (2, false)] {
            let write = sentiment_write(ledger.get(&(user, 10)).copied(), direction);
            if write != LedgerWrite::Unchanged {
                ledger.insert((user, 10), direction);
            }
        }

        let up = ledger.values().filter(|&&up| up).count();
        let down = ledger.len() - up;
        assert_eq!(ledger.len(), 3);
        assert_eq!((up, down), (1, 2));
    }

    #[test]
    fn percentages_truncate_and_handle_zero() {
        assert_eq!(vote_percentages(0, 0), (0, 0));
        assert_eq!(vote_percentages(1, 2), (33, 66));
        assert_eq!(vote_percentages(3, 1), (75, 25));
    }

    #[test]
    fn time_left_reports_largest_unit() {
        let now = at(0);
        assert_eq!(time_left(None, now), "No end date");
        assert_eq!(time_left(Some(now + Duration::days(3)), now), "3 Days");
        assert_eq!(
            time_left(Some(now + Duration::hours(5) + Duration::minutes(12)), now),
            "5 Hours"
        );
        assert_eq!(time_left(Some(now + Duration::minutes(45)), now), "45 Mins");
        assert_eq!(time_left(Some(now + Duration::seconds(30)), now), "30 Sec");
        assert_eq!(time_left(Some(now - Duration::hours(1)), now), "");
    }
}
