//! Raw workout to simplified workout conversion.

use crate::{RawWorkout, SetSummary, SimplifiedExercise, SimplifiedWorkout};
use chrono::DateTime;

/// Convert raw workouts into display-ready workouts, preserving order
pub fn transform(raw_workouts: &[RawWorkout]) -> Vec<SimplifiedWorkout> {
    raw_workouts.iter().map(transform_one).collect()
}

fn transform_one(workout: &RawWorkout) -> SimplifiedWorkout {
    SimplifiedWorkout {
        date: calendar_day(&workout.start_time),
        start_time: workout.start_time.clone(),
        title: workout.title.clone(),
        duration_minutes: duration_minutes(&workout.start_time, &workout.end_time),
        exercises: workout
            .exercises
            .iter()
            .map(|exercise| SimplifiedExercise {
                name: exercise.title.clone(),
                sets: exercise.sets.iter().map(SetSummary::from_raw).collect(),
            })
            .collect(),
    }
}

/// Day portion of the timestamp, in the timestamp's own calendar
fn calendar_day(start_time: &str) -> String {
    start_time.get(..10).unwrap_or(start_time).to_string()
}

/// Whole minutes between start and end, clamped at zero
///
/// Unparseable timestamps yield zero.
pub fn duration_minutes(start_time: &str, end_time: &str) -> u32 {
    let (Ok(start), Ok(end)) = (
        DateTime::parse_from_rfc3339(start_time),
        DateTime::parse_from_rfc3339(end_time),
    ) else {
        tracing::debug!(
            "Unparseable workout timestamps {:?} / {:?}, duration clamped to 0",
            start_time,
            end_time
        );
        return 0;
    };

    let seconds = (end - start).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    let minutes = (seconds as f64 / 60.0).round();
    minutes.min(f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawExercise, RawSet};

    fn raw_workout(id: &str, start: &str, end: &str) -> RawWorkout {
        RawWorkout {
            id: id.into(),
            title: format!("Workout {}", id),
            description: None,
            start_time: start.into(),
            end_time: end.into(),
            exercises: vec![RawExercise {
                title: "Squat".into(),
                notes: None,
                sets: vec![
                    RawSet {
                        weight_kg: Some(100.0),
                        reps: Some(5),
                        rpe: Some(8.0),
                        ..RawSet::default()
                    },
                    RawSet {
                        reps: Some(12),
                        ..RawSet::default()
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_transform_basic_fields() {
        let raw = raw_workout("a", "2024-03-05T18:00:00+01:00", "2024-03-05T19:02:40+01:00");
        let out = transform(&[raw]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].date, "2024-03-05");
        assert_eq!(out[0].start_time, "2024-03-05T18:00:00+01:00");
        assert_eq!(out[0].title, "Workout a");
        assert_eq!(out[0].duration_minutes, 63);
        assert_eq!(out[0].exercises[0].name, "Squat");
        assert_eq!(out[0].exercises[0].sets[0].to_string(), "100kg x 5 reps x @RPE8");
        assert_eq!(out[0].exercises[0].sets[1].to_string(), "12 reps");
    }

    #[test]
    fn test_date_uses_source_calendar_not_utc() {
        // 23:30 at -05:00 is already the next day in UTC
        let raw = raw_workout("late", "2024-03-05T23:30:00-05:00", "2024-03-06T00:30:00-05:00");
        assert_eq!(transform(&[raw])[0].date, "2024-03-05");
    }

    #[test]
    fn test_duration_never_negative() {
        let raw = raw_workout("rev", "2024-03-05T19:00:00Z", "2024-03-05T18:00:00Z");
        assert_eq!(transform(&[raw])[0].duration_minutes, 0);
    }

    #[test]
    fn test_malformed_timestamps_clamp_to_zero() {
        let raw = raw_workout("bad", "not a date", "also not a date");
        let out = transform(&[raw]);
        assert_eq!(out[0].duration_minutes, 0);
        assert_eq!(out[0].date, "not a date");
        assert!(out[0].day().is_none());
    }

    #[test]
    fn test_transform_preserves_order() {
        let raws: Vec<_> = (0..5)
            .map(|i| {
                raw_workout(
                    &i.to_string(),
                    &format!("2024-01-0{}T10:00:00Z", i + 1),
                    &format!("2024-01-0{}T11:00:00Z", i + 1),
                )
            })
            .collect();

        let out = transform(&raws);
        for (i, workout) in out.iter().enumerate() {
            assert_eq!(workout.title, format!("Workout {}", i));
        }
    }

    #[test]
    fn test_duration_rounds_to_nearest_minute() {
        assert_eq!(duration_minutes("2024-01-01T10:00:00Z", "2024-01-01T10:00:29Z"), 0);
        assert_eq!(duration_minutes("2024-01-01T10:00:00Z", "2024-01-01T10:00:30Z"), 1);
        assert_eq!(duration_minutes("2024-01-01T10:00:00Z", "2024-01-01T10:45:00Z"), 45);
    }
}
