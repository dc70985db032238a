//! Core domain types for Spotter.
//!
//! This module defines the fundamental types used throughout the system:
//! - Raw workout records as returned by the workout source API
//! - Simplified, display-ready workouts and their cache envelope
//! - Coaching analysis results
//! - Exercise catalog entries, routine folders and generated routines

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================================================
// Raw Workout Types (workout source API)
// ============================================================================

/// A single logged set, every measurement optional
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawSet {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(rename = "type", default)]
    pub set_type: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub rpe: Option<f64>,
}

/// An exercise within a logged workout
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawExercise {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub sets: Vec<RawSet>,
}

/// A workout as returned by the workout source API
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawWorkout {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub exercises: Vec<RawExercise>,
}

/// One page of the paginated workouts endpoint
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WorkoutsPage {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub workouts: Vec<RawWorkout>,
}

// ============================================================================
// Simplified Workout Types
// ============================================================================

/// Structured summary of one set
///
/// Keeps the numeric fields so volume can be computed directly; the
/// `Display` impl renders the textual form ("80kg x 8 reps") for output.
/// Deserializes from either the structured form or a previously rendered
/// string, which is parsed best-effort.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "StoredSet")]
pub struct SetSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe: Option<f64>,
}

/// Separator between rendered set parts
pub const SET_PART_SEPARATOR: &str = " x ";

impl SetSummary {
    /// Build a summary from a raw set, keeping only present non-zero fields
    pub fn from_raw(set: &RawSet) -> Self {
        Self {
            weight_kg: set.weight_kg.filter(|w| *w != 0.0),
            reps: set.reps.filter(|r| *r != 0),
            distance_meters: set.distance_meters.filter(|d| *d != 0.0),
            duration_seconds: set.duration_seconds.filter(|d| *d != 0),
            rpe: set.rpe.filter(|r| *r != 0.0),
        }
    }

    /// Best-effort parse of a rendered set string
    ///
    /// Only the leading "Nkg x M reps" pair is recovered. Anything that does
    /// not fit yields an empty summary, which carries zero volume.
    pub fn parse_rendered(text: &str) -> Self {
        let parts: Vec<&str> = text.split(SET_PART_SEPARATOR).collect();
        if parts.len() < 2 {
            return Self::default();
        }

        let weight = parts[0].replace("kg", "").trim().parse::<f64>().ok();
        let reps = parts[1].replace(" reps", "").trim().parse::<u32>().ok();

        match (weight, reps) {
            (Some(weight_kg), Some(reps)) => Self {
                weight_kg: Some(weight_kg),
                reps: Some(reps),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    /// Weight times reps, zero when either is missing
    pub fn volume(&self) -> f64 {
        match (self.weight_kg, self.reps) {
            (Some(weight), Some(reps)) => weight * f64::from(reps),
            _ => 0.0,
        }
    }
}

impl fmt::Display for SetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(5);
        if let Some(weight) = self.weight_kg {
            parts.push(format!("{}kg", weight));
        }
        if let Some(reps) = self.reps {
            parts.push(format!("{} reps", reps));
        }
        if let Some(distance) = self.distance_meters {
            parts.push(format!("{}m", distance));
        }
        if let Some(duration) = self.duration_seconds {
            parts.push(format!("{}s", duration));
        }
        if let Some(rpe) = self.rpe {
            parts.push(format!("@RPE{}", rpe));
        }
        f.write_str(&parts.join(SET_PART_SEPARATOR))
    }
}

/// Stored representation of a set: structured, or a legacy rendered string
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSet {
    Structured {
        #[serde(default)]
        weight_kg: Option<f64>,
        #[serde(default)]
        reps: Option<u32>,
        #[serde(default)]
        distance_meters: Option<f64>,
        #[serde(default)]
        duration_seconds: Option<u32>,
        #[serde(default)]
        rpe: Option<f64>,
    },
    Rendered(String),
}

impl From<StoredSet> for SetSummary {
    fn from(stored: StoredSet) -> Self {
        match stored {
            StoredSet::Structured {
                weight_kg,
                reps,
                distance_meters,
                duration_seconds,
                rpe,
            } => SetSummary {
                weight_kg,
                reps,
                distance_meters,
                duration_seconds,
                rpe,
            },
            StoredSet::Rendered(text) => SetSummary::parse_rendered(&text),
        }
    }
}

/// An exercise in a simplified workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SimplifiedExercise {
    pub name: String,
    pub sets: Vec<SetSummary>,
}

/// Display-ready workout derived from a [`RawWorkout`]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedWorkout {
    /// Calendar day (`YYYY-MM-DD`) truncated from the start timestamp
    pub date: String,
    /// Original start timestamp, verbatim
    pub start_time: String,
    pub title: String,
    pub duration_minutes: u32,
    pub exercises: Vec<SimplifiedExercise>,
}

impl SimplifiedWorkout {
    /// Parse the calendar day, if well-formed
    pub fn day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }

    /// Total weight times reps across every set
    pub fn volume(&self) -> f64 {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .map(SetSummary::volume)
            .sum()
    }
}

// ============================================================================
// Cache Types
// ============================================================================

/// Cached workout dataset with the instant it was written
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub workouts: Vec<SimplifiedWorkout>,
}

impl CacheEntry {
    pub fn new(timestamp: DateTime<Utc>, workouts: Vec<SimplifiedWorkout>) -> Self {
        Self {
            timestamp,
            workouts,
        }
    }

    /// Age of the entry relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// An entry is fresh while its age is below the window
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.age(now) < window
    }
}

// ============================================================================
// Coaching Types
// ============================================================================

/// Structured coaching analysis returned by the inference API
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub summary: String,
    pub trends: Vec<String>,
    pub neglect: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Exercise catalog entry from the workout source API
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseTemplate {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub exercise_type: String,
    #[serde(default)]
    pub primary_muscle_group: Option<String>,
}

/// One page of the exercise catalog endpoint
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExerciseTemplatesPage {
    #[serde(default)]
    pub exercise_templates: Vec<ExerciseTemplate>,
}

/// A folder grouping routines in the workout source API
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RoutineFolder {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub index: Option<i64>,
}

/// Kind of a routine set
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    Warmup,
    Failure,
    Dropset,
    #[default]
    #[serde(other)]
    Normal,
}

/// Target set in a generated routine
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneratedSet {
    #[serde(rename = "type", default, deserialize_with = "de_set_type")]
    pub set_type: SetType,
    #[serde(
        default,
        deserialize_with = "de_lenient_weight",
        skip_serializing_if = "Option::is_none"
    )]
    pub weight_kg: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de_lenient_reps",
        skip_serializing_if = "Option::is_none"
    )]
    pub reps: Option<u32>,
}

impl GeneratedSet {
    /// A plain working set of the given rep count
    pub fn normal_reps(reps: u32) -> Self {
        Self {
            set_type: SetType::Normal,
            weight_kg: None,
            reps: Some(reps),
        }
    }
}

/// Exercise in a generated routine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeneratedExercise {
    /// Absent when the reply omits it or gives a non-string value
    #[serde(
        default,
        deserialize_with = "de_lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub exercise_template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_name: Option<String>,
    #[serde(default)]
    pub sets: Vec<GeneratedSet>,
}

/// Routine proposed by the inference API
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeneratedRoutine {
    pub title: String,
    #[serde(default)]
    pub exercises: Vec<GeneratedExercise>,
}

/// Exercise entry submitted to the routines endpoint
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RoutineExercise {
    pub exercise_template_id: String,
    pub sets: Vec<GeneratedSet>,
}

/// Routine body submitted to the workout source API
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewRoutine {
    pub title: String,
    pub folder_id: Option<i64>,
    pub exercises: Vec<RoutineExercise>,
}

// ============================================================================
// Lenient number parsing for inference replies
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Leading numeric prefix of a string ("12.5kg" -> 12.5)
fn leading_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let end = trimmed
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse::<f64>().ok()
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match value {
        Some(NumberOrText::Number(n)) => Some(n),
        Some(NumberOrText::Text(s)) => leading_number(&s),
        None => None,
    }
    .filter(|n| n.is_finite() && *n != 0.0))
}

fn de_lenient_weight<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer)
}

fn de_lenient_reps<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|n| *n >= 1.0)
        .map(|n| n.trunc() as u32))
}

fn de_lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<serde_json::Value>::deserialize(deserializer)?.and_then(|value| {
        value
            .as_str()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }))
}

fn de_set_type<'de, D>(deserializer: D) -> std::result::Result<SetType, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<SetType>::deserialize(deserializer)?.unwrap_or_default())
}
