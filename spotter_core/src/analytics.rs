//! Derived analytics over simplified workouts.
//!
//! Pure functions: a 53-week activity heatmap with weekday insights, and a
//! 12-month training volume series. Both take `today` explicitly.

use crate::SimplifiedWorkout;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashMap;

/// Width of the heatmap window in weeks
pub const HEATMAP_WEEKS: usize = 53;

/// Length of the volume series in months
pub const VOLUME_MONTHS: usize = 12;

/// Workouts needed before a busiest weekday is named
pub const BUSIEST_DAY_MIN_WORKOUTS: usize = 6;

/// Weekday order used for frequency tie-breaks
pub const WEEKDAYS_SUNDAY_FIRST: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Map total daily minutes to an intensity level in 0..=4
pub fn intensity_level(minutes: u32) -> u8 {
    match minutes {
        0 => 0,
        1..=20 => 1,
        21..=40 => 2,
        41..=70 => 3,
        _ => 4,
    }
}

/// One cell of the heatmap
#[derive(Clone, Debug, PartialEq)]
pub struct HeatmapDay {
    pub date: NaiveDate,
    pub minutes: u32,
    pub level: u8,
}

/// One Monday-start column of the heatmap
#[derive(Clone, Debug, PartialEq)]
pub struct HeatmapWeek {
    pub monday: NaiveDate,
    pub days: Vec<HeatmapDay>,
}

/// Month label anchored at the first week starting in that month
#[derive(Clone, Debug, PartialEq)]
pub struct MonthLabel {
    pub label: String,
    pub week_index: usize,
}

/// How many sessions fell on a weekday
#[derive(Clone, Debug, PartialEq)]
pub struct WeekdayShare {
    pub weekday: Weekday,
    pub count: usize,
    /// Rounded percentage of all sessions, 0 when there are none
    pub percent: u32,
}

/// Summary statistics shown next to the heatmap
#[derive(Clone, Debug, PartialEq)]
pub struct HeatmapInsights {
    /// `None` until there are at least [`BUSIEST_DAY_MIN_WORKOUTS`] workouts
    pub busiest_day: Option<WeekdayShare>,
    pub quietest_day: WeekdayShare,
    pub total_workouts: usize,
    pub avg_workouts_per_week: f64,
    pub total_minutes: u64,
    pub avg_minutes_per_workout: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Heatmap {
    pub weeks: Vec<HeatmapWeek>,
    pub month_labels: Vec<MonthLabel>,
    pub insights: HeatmapInsights,
}

/// Build the trailing 53-week heatmap ending with the week containing `today`
pub fn build_heatmap(workouts: &[SimplifiedWorkout], today: NaiveDate) -> Heatmap {
    let mut daily_minutes: HashMap<NaiveDate, u32> = HashMap::new();
    for workout in workouts {
        if let Some(day) = workout.day() {
            *daily_minutes.entry(day).or_insert(0) += workout.duration_minutes;
        }
    }

    let current_monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let start_monday = current_monday - Duration::weeks(HEATMAP_WEEKS as i64 - 1);

    let mut weeks = Vec::with_capacity(HEATMAP_WEEKS);
    let mut month_labels: Vec<MonthLabel> = Vec::new();

    for week_index in 0..HEATMAP_WEEKS {
        let monday = start_monday + Duration::weeks(week_index as i64);

        let label = monday.format("%b").to_string();
        if month_labels.last().map(|m| &m.label) != Some(&label) {
            month_labels.push(MonthLabel { label, week_index });
        }

        let days = (0..7)
            .map(|offset| {
                let date = monday + Duration::days(offset);
                let minutes = daily_minutes.get(&date).copied().unwrap_or(0);
                HeatmapDay {
                    date,
                    minutes,
                    level: intensity_level(minutes),
                }
            })
            .collect();

        weeks.push(HeatmapWeek { monday, days });
    }

    Heatmap {
        weeks,
        month_labels,
        insights: compute_insights(workouts),
    }
}

fn compute_insights(workouts: &[SimplifiedWorkout]) -> HeatmapInsights {
    let mut weekday_counts = [0usize; 7];
    for day in workouts.iter().filter_map(SimplifiedWorkout::day) {
        weekday_counts[day.weekday().num_days_from_sunday() as usize] += 1;
    }

    let total_workouts = workouts.len();
    let total_minutes: u64 = workouts.iter().map(|w| u64::from(w.duration_minutes)).sum();

    let share = |index: usize| WeekdayShare {
        weekday: WEEKDAYS_SUNDAY_FIRST[index],
        count: weekday_counts[index],
        percent: percent_of(weekday_counts[index], total_workouts),
    };

    // First index wins ties in both directions
    let busiest = (0..7).fold(0, |best, i| {
        if weekday_counts[i] > weekday_counts[best] {
            i
        } else {
            best
        }
    });
    let quietest = (0..7).fold(0, |best, i| {
        if weekday_counts[i] < weekday_counts[best] {
            i
        } else {
            best
        }
    });

    let avg_minutes_per_workout = if total_workouts == 0 {
        0
    } else {
        (total_minutes as f64 / total_workouts as f64).round() as u32
    };

    HeatmapInsights {
        busiest_day: (total_workouts >= BUSIEST_DAY_MIN_WORKOUTS).then(|| share(busiest)),
        quietest_day: share(quietest),
        total_workouts,
        avg_workouts_per_week: total_workouts as f64 / HEATMAP_WEEKS as f64,
        total_minutes,
        avg_minutes_per_workout,
    }
}

fn percent_of(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

/// Training volume for one calendar month
#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyVolume {
    pub year: i32,
    pub month: u32,
    /// Sum of weight times reps, in kg
    pub volume: f64,
}

impl MonthlyVolume {
    /// `YYYY-MM` key
    pub fn key(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

fn month_ordinal(year: i32, month: u32) -> i64 {
    i64::from(year) * 12 + i64::from(month) - 1
}

fn from_month_ordinal(ordinal: i64) -> (i32, u32) {
    (ordinal.div_euclid(12) as i32, ordinal.rem_euclid(12) as u32 + 1)
}

/// Monthly volume for the 12 months ending with the month of `today`
///
/// Oldest month first; months without workouts are zero.
pub fn monthly_volume(workouts: &[SimplifiedWorkout], today: NaiveDate) -> Vec<MonthlyVolume> {
    let current = month_ordinal(today.year(), today.month());
    let first = current - (VOLUME_MONTHS as i64 - 1);

    let mut series: Vec<MonthlyVolume> = (first..=current)
        .map(|ordinal| {
            let (year, month) = from_month_ordinal(ordinal);
            MonthlyVolume {
                year,
                month,
                volume: 0.0,
            }
        })
        .collect();

    for workout in workouts {
        let Some(day) = workout.day() else {
            continue;
        };
        let ordinal = month_ordinal(day.year(), day.month());
        if (first..=current).contains(&ordinal) {
            series[(ordinal - first) as usize].volume += workout.volume();
        }
    }

    series
}
