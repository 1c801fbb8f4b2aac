use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::{DailySummary, DaySummary, FoodEntry, FoodEntryView, WeeklySummary};

/// Calendar date of a timestamp in the tracker's timezone.
pub fn local_date(timestamp: DateTime<Utc>, tz: Tz) -> NaiveDate {
    timestamp.with_timezone(&tz).date_naive()
}

/// Monday and Sunday of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (start, start + Duration::days(6))
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::default());
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// UTC window wide enough to hold every entry dated `first..=last` locally.
///
/// Callers still filter by [`local_date`]; the extra day on each side covers
/// DST gaps at midnight.
pub fn query_window(first: NaiveDate, last: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = local_midnight(first, tz) - Duration::days(1);
    let to = local_midnight(last + Duration::days(1), tz) + Duration::days(1);
    (from, to)
}

fn day_summary(date: NaiveDate, entries: &[&FoodEntry], goal: i64) -> DaySummary {
    let calories: i64 = entries.iter().map(|e| i64::from(e.calories)).sum();
    let protein: f64 = entries.iter().map(|e| e.protein).sum();

    DaySummary {
        date,
        calories,
        protein,
        over_goal: calories - goal,
        is_over_goal: calories > goal,
    }
}

fn entries_on<'a>(entries: &'a [FoodEntry], date: NaiveDate, tz: Tz) -> Vec<&'a FoodEntry> {
    entries
        .iter()
        .filter(|e| local_date(e.eaten_at, tz) == date)
        .collect()
}

pub fn daily_summary(date: NaiveDate, entries: &[FoodEntry], tz: Tz, goal: i64) -> DailySummary {
    let mut todays = entries_on(entries, date, tz);
    todays.sort_by(|a, b| b.eaten_at.cmp(&a.eaten_at));

    let day = day_summary(date, &todays, goal);
    let percentage = if goal > 0 {
        (day.calories as f64 / goal as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    DailySummary {
        date,
        calories: day.calories,
        protein: day.protein,
        goal,
        percentage,
        entries: todays.into_iter().map(FoodEntryView::from).collect(),
    }
}

pub fn weekly_summary(date: NaiveDate, entries: &[FoodEntry], tz: Tz, goal: i64) -> WeeklySummary {
    let (week_start, week_end) = week_bounds(date);

    let days: Vec<DaySummary> = (0..7)
        .map(|offset| {
            let day = week_start + Duration::days(offset);
            day_summary(day, &entries_on(entries, day, tz), goal)
        })
        .collect();

    let total_calories: i64 = days.iter().map(|d| d.calories).sum();
    let total_protein: f64 = days.iter().map(|d| d.protein).sum();
    let days_over_goal = days.iter().filter(|d| d.is_over_goal).count();
    let days_under_goal = days
        .iter()
        .filter(|d| !d.is_over_goal && d.calories > 0)
        .count();

    // Earliest day wins ties
    let mut highest_day = days[0].clone();
    for day in &days[1..] {
        if day.calories > highest_day.calories {
            highest_day = day.clone();
        }
    }

    WeeklySummary {
        week_start,
        week_end,
        total_calories,
        total_protein,
        weekly_goal: goal * 7,
        avg_daily_calories: total_calories as f64 / 7.0,
        days,
        days_over_goal,
        days_under_goal,
        highest_day,
    }
}
