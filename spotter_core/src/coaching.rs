//! Coaching request pipeline.
//!
//! Two stages, each aborting on the first failure:
//!
//! 1. **Analysis**: pick the most recent sessions, ask the inference API for
//!    a structured analysis, persist it.
//! 2. **Routine generation**: fetch the exercise catalog, ask for a routine,
//!    keep only exercises the catalog knows, pad set counts, then file the
//!    routine in the "AI" folder (creating the folder if needed).
//!
//! Side effects already performed (e.g. a created folder) are not rolled
//! back when a later step fails.

use crate::hevy::{fetch_top_exercise_templates, WorkoutSource};
use crate::inference::{InferenceBackend, JsonCompletion};
use crate::prompts::{self, CoachPersona};
use crate::store::CacheSlot;
use crate::{
    AnalysisResult, Error, ExerciseTemplate, GeneratedExercise, GeneratedRoutine, GeneratedSet,
    NewRoutine, Result, RoutineExercise, RoutineFolder, SimplifiedWorkout,
};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Folder that receives generated routines
pub const ROUTINE_FOLDER_TITLE: &str = "AI";

/// Minimum sets per generated exercise
pub const MIN_SETS: usize = 3;

/// Reps used when the generator returns no sets at all
pub const DEFAULT_REPS: u32 = 10;

/// How many recent sessions to analyze
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionWindow {
    Last3,
    #[default]
    Last5,
    Last10,
    Last20,
}

impl SessionWindow {
    pub fn count(self) -> usize {
        match self {
            SessionWindow::Last3 => 3,
            SessionWindow::Last5 => 5,
            SessionWindow::Last10 => 10,
            SessionWindow::Last20 => 20,
        }
    }
}

impl TryFrom<usize> for SessionWindow {
    type Error = Error;

    fn try_from(count: usize) -> Result<Self> {
        match count {
            3 => Ok(SessionWindow::Last3),
            5 => Ok(SessionWindow::Last5),
            10 => Ok(SessionWindow::Last10),
            20 => Ok(SessionWindow::Last20),
            other => Err(Error::Validation(format!(
                "Session window must be 3, 5, 10 or 20, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SessionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "last {} sessions", self.count())
    }
}

fn parse_reply<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        warn!("Inference reply for {} did not match expected shape: {}", what, e);
        Error::Parse(format!("Failed to parse AI {}: {}", what, e))
    })
}

/// Ask the inference API for a coaching analysis of `workouts`
pub async fn request_coaching_analysis(
    backend: &dyn InferenceBackend,
    workouts: &[SimplifiedWorkout],
    philosophy: Option<&str>,
    coach: &CoachPersona,
    max_tokens: Option<u32>,
) -> Result<AnalysisResult> {
    let request = JsonCompletion {
        system: prompts::analysis_system_prompt(coach),
        user: prompts::analysis_prompt(workouts, philosophy),
        max_tokens,
    };
    let reply = backend.complete_json(&request).await?;
    parse_reply(&reply, "analysis")
}

/// Ask the inference API for a routine built from `catalog`
pub async fn request_generated_routine(
    backend: &dyn InferenceBackend,
    analysis: &AnalysisResult,
    catalog: &[ExerciseTemplate],
    philosophy: Option<&str>,
) -> Result<GeneratedRoutine> {
    let request = JsonCompletion {
        system: prompts::generator_system_prompt().to_string(),
        user: prompts::routine_prompt(analysis, catalog, philosophy),
        max_tokens: None,
    };
    let reply = backend.complete_json(&request).await?;
    parse_reply(&reply, "workout")
}

/// Pad a set list to at least [`MIN_SETS`]
///
/// One or two sets are padded by repeating the last; an empty list becomes
/// three plain sets of [`DEFAULT_REPS`]. Longer lists are left alone.
pub fn normalize_sets(mut sets: Vec<GeneratedSet>) -> Vec<GeneratedSet> {
    match sets.last().cloned() {
        None => vec![GeneratedSet::normal_reps(DEFAULT_REPS); MIN_SETS],
        Some(last) => {
            while sets.len() < MIN_SETS {
                sets.push(last.clone());
            }
            sets
        }
    }
}

/// Keep generated exercises whose template id the catalog knows
///
/// Returns the kept exercises with their sets as generated, plus a label for
/// each dropped one (its id, or its name when the id is missing). Fails when
/// nothing valid remains.
pub fn retain_catalog_exercises(
    exercises: Vec<GeneratedExercise>,
    catalog: &[ExerciseTemplate],
) -> Result<(Vec<RoutineExercise>, Vec<String>)> {
    let known: HashSet<&str> = catalog.iter().map(|t| t.id.as_str()).collect();
    let mut valid = Vec::new();
    let mut dropped = Vec::new();

    for exercise in exercises {
        match exercise.exercise_template_id {
            Some(id) if known.contains(id.as_str()) => valid.push(RoutineExercise {
                exercise_template_id: id,
                sets: exercise.sets,
            }),
            Some(id) => {
                warn!("Skipping invalid exercise ID: {}", id);
                dropped.push(id);
            }
            None => {
                let label = match exercise.exercise_name {
                    Some(name) => format!("{} (no id)", name),
                    None => "(no id)".to_string(),
                };
                warn!("Skipping exercise without a template ID: {}", label);
                dropped.push(label);
            }
        }
    }

    if valid.is_empty() {
        return Err(Error::Validation(
            "No valid exercises found in generated workout".into(),
        ));
    }
    Ok((valid, dropped))
}

/// Result of a successful routine generation
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedRoutineOutcome {
    pub routine: NewRoutine,
    pub folder: RoutineFolder,
    /// Generated exercises that were not in the catalog or had no id
    pub dropped_exercise_ids: Vec<String>,
}

/// Knobs for the pipeline
#[derive(Clone, Debug)]
pub struct CoachingOptions {
    pub analysis_max_tokens: Option<u32>,
    pub catalog_pages: u32,
    pub catalog_page_size: u32,
}

impl Default for CoachingOptions {
    fn default() -> Self {
        Self {
            analysis_max_tokens: Some(1000),
            catalog_pages: 3,
            catalog_page_size: 100,
        }
    }
}

/// Orchestrates analysis and routine generation
pub struct CoachingPipeline {
    inference: Option<Arc<dyn InferenceBackend>>,
    source: Option<Arc<dyn WorkoutSource>>,
    analysis_cache: CacheSlot<AnalysisResult>,
    options: CoachingOptions,
}

impl CoachingPipeline {
    pub fn new(
        inference: Option<Arc<dyn InferenceBackend>>,
        source: Option<Arc<dyn WorkoutSource>>,
        analysis_cache: CacheSlot<AnalysisResult>,
        options: CoachingOptions,
    ) -> Self {
        Self {
            inference,
            source,
            analysis_cache,
            options,
        }
    }

    /// Last persisted analysis, if any
    pub fn cached_analysis(&self) -> Option<AnalysisResult> {
        self.analysis_cache.read()
    }

    /// Forget the persisted analysis
    pub fn clear_analysis(&self) -> Result<()> {
        self.analysis_cache.clear()
    }

    fn inference(&self) -> Result<&dyn InferenceBackend> {
        self.inference
            .as_deref()
            .ok_or_else(|| Error::Auth("OpenAI API key missing. Please check settings.".into()))
    }

    fn source(&self) -> Result<&dyn WorkoutSource> {
        self.source
            .as_deref()
            .ok_or_else(|| Error::Auth("Hevy API key missing. Please check settings.".into()))
    }

    /// Analyze the most recent sessions and persist the result
    ///
    /// `workouts` is expected newest first, as the workout source returns it.
    pub async fn analyze(
        &self,
        workouts: &[SimplifiedWorkout],
        window: SessionWindow,
        philosophy: Option<&str>,
        coach: &CoachPersona,
    ) -> Result<AnalysisResult> {
        let backend = self.inference()?;
        if workouts.is_empty() {
            return Err(Error::Validation("No workouts to analyze".into()));
        }

        let recent = &workouts[..workouts.len().min(window.count())];
        info!("Analyzing {} with coach {:?}", window, coach.id);

        let analysis = request_coaching_analysis(
            backend,
            recent,
            philosophy,
            coach,
            self.options.analysis_max_tokens,
        )
        .await?;

        if let Err(e) = self.analysis_cache.write(&analysis) {
            warn!("Failed to persist analysis: {}", e);
        }
        Ok(analysis)
    }

    /// Generate a routine from `analysis` and file it remotely
    pub async fn generate_routine(
        &self,
        analysis: &AnalysisResult,
        philosophy: Option<&str>,
    ) -> Result<GeneratedRoutineOutcome> {
        let backend = self.inference()?;
        let source = self.source()?;

        info!("Fetching exercise catalog");
        let catalog = fetch_top_exercise_templates(
            source,
            self.options.catalog_pages,
            self.options.catalog_page_size,
        )
        .await;

        info!("Designing workout from {} catalog entries", catalog.len());
        let generated = request_generated_routine(backend, analysis, &catalog, philosophy).await?;
        let (exercises, dropped_exercise_ids) =
            retain_catalog_exercises(generated.exercises, &catalog)?;

        let folder = self.find_or_create_folder(source).await?;

        let routine = NewRoutine {
            title: generated.title,
            folder_id: Some(folder.id),
            exercises: exercises
                .into_iter()
                .map(|e| RoutineExercise {
                    sets: normalize_sets(e.sets),
                    ..e
                })
                .collect(),
        };

        source.create_routine(&routine).await?;
        info!(
            "Created routine {:?} with {} exercises in folder {:?}",
            routine.title,
            routine.exercises.len(),
            folder.title
        );

        Ok(GeneratedRoutineOutcome {
            routine,
            folder,
            dropped_exercise_ids,
        })
    }

    async fn find_or_create_folder(&self, source: &dyn WorkoutSource) -> Result<RoutineFolder> {
        let folders = source.list_routine_folders().await?;
        if let Some(existing) = folders.into_iter().find(|f| f.title == ROUTINE_FOLDER_TITLE) {
            return Ok(existing);
        }
        source.create_routine_folder(ROUTINE_FOLDER_TITLE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hevy::tests::{template, FakeSource};
    use crate::inference::tests::ScriptedBackend;
    use crate::store::{KeyValueStore, MemoryStore, ANALYSIS_CACHE_KEY};
    use crate::SetType;

    fn workout(title: &str) -> SimplifiedWorkout {
        SimplifiedWorkout {
            date: "2024-05-01".into(),
            start_time: "2024-05-01T10:00:00Z".into(),
            title: title.into(),
            duration_minutes: 40,
            exercises: vec![],
        }
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            summary: "Upper body dominant.".into(),
            trends: vec!["Bench 80 -> 85kg".into()],
            neglect: vec!["Hamstrings".into()],
            recommendations: vec!["Romanian Deadlift 3x10".into()],
        }
    }

    const ANALYSIS_JSON: &str = r#"{
        "summary": "Upper body dominant.",
        "trends": ["Bench 80 -> 85kg"],
        "neglect": ["Hamstrings"],
        "recommendations": ["Romanian Deadlift 3x10"]
    }"#;

    fn set(reps: u32, weight: f64) -> GeneratedSet {
        GeneratedSet {
            set_type: SetType::Normal,
            weight_kg: Some(weight),
            reps: Some(reps),
        }
    }

    fn pipeline(
        backend: Option<Arc<ScriptedBackend>>,
        source: Option<Arc<FakeSource>>,
        store: &Arc<MemoryStore>,
    ) -> CoachingPipeline {
        let inference = backend.map(|b| -> Arc<dyn InferenceBackend> { b });
        let source = source.map(|s| -> Arc<dyn WorkoutSource> { s });
        let kv: Arc<dyn KeyValueStore> = store.clone();
        CoachingPipeline::new(
            inference,
            source,
            CacheSlot::new(kv, ANALYSIS_CACHE_KEY),
            CoachingOptions::default(),
        )
    }

    fn catalog_source() -> Arc<FakeSource> {
        Arc::new(FakeSource {
            templates: vec![template("A1"), template("B2")],
            ..FakeSource::default()
        })
    }

    #[test]
    fn test_normalize_one_set_becomes_three_identical() {
        let sets = normalize_sets(vec![set(8, 60.0)]);
        assert_eq!(sets, vec![set(8, 60.0); 3]);
    }

    #[test]
    fn test_normalize_two_sets_repeats_last() {
        let sets = normalize_sets(vec![set(12, 40.0), set(8, 60.0)]);
        assert_eq!(sets, vec![set(12, 40.0), set(8, 60.0), set(8, 60.0)]);
    }

    #[test]
    fn test_normalize_zero_sets_uses_default() {
        let sets = normalize_sets(vec![]);
        assert_eq!(sets.len(), 3);
        assert!(sets
            .iter()
            .all(|s| s.set_type == SetType::Normal && s.reps == Some(10) && s.weight_kg.is_none()));
    }

    #[test]
    fn test_normalize_five_sets_untouched() {
        let original: Vec<_> = (1..=5).map(|i| set(i, 20.0)).collect();
        assert_eq!(normalize_sets(original.clone()), original);
    }

    #[test]
    fn test_session_window_values() {
        assert_eq!(SessionWindow::try_from(10).unwrap(), SessionWindow::Last10);
        assert!(matches!(SessionWindow::try_from(7), Err(Error::Validation(_))));
        assert_eq!(SessionWindow::default().count(), 5);
    }

    #[tokio::test]
    async fn test_analyze_truncates_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(ANALYSIS_JSON.into())]));
        let pipeline = pipeline(Some(backend.clone()), None, &store);

        let workouts: Vec<_> = (0..8).map(|i| workout(&format!("Session {}", i))).collect();
        let result = pipeline
            .analyze(&workouts, SessionWindow::Last3, Some("Upper/Lower"), prompts::coach("scientist"))
            .await
            .unwrap();

        assert_eq!(result, analysis());
        assert_eq!(pipeline.cached_analysis(), Some(analysis()));

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].user.contains("last 3 sessions"));
        assert!(requests[0].user.contains("Session 2"));
        assert!(!requests[0].user.contains("Session 3"));
        assert!(requests[0].user.contains("Upper/Lower"));
        assert!(requests[0].system.starts_with("You are an evidence-based"));
        assert_eq!(requests[0].max_tokens, Some(1000));
    }

    #[tokio::test]
    async fn test_analyze_requires_key_and_workouts() {
        let store = Arc::new(MemoryStore::new());
        let no_key = pipeline(None, None, &store);
        assert!(matches!(
            no_key
                .analyze(&[workout("x")], SessionWindow::Last5, None, prompts::coach("drill-sergeant"))
                .await,
            Err(Error::Auth(_))
        ));

        let backend = Arc::new(ScriptedBackend::default());
        let with_key = pipeline(Some(backend.clone()), None, &store);
        assert!(matches!(
            with_key
                .analyze(&[], SessionWindow::Last5, None, prompts::coach("drill-sergeant"))
                .await,
            Err(Error::Validation(_))
        ));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_bad_json_is_parse_error_and_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(
            r#"{"summary": "missing lists"}"#.into(),
        )]));
        let pipeline = pipeline(Some(backend), None, &store);

        let result = pipeline
            .analyze(&[workout("x")], SessionWindow::Last5, None, prompts::coach("hype-man"))
            .await;
        assert!(matches!(result, Err(Error::Parse(_))));
        assert!(pipeline.cached_analysis().is_none());
    }

    #[tokio::test]
    async fn test_clear_analysis() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(ANALYSIS_JSON.into())]));
        let pipeline = pipeline(Some(backend), None, &store);
        pipeline
            .analyze(&[workout("x")], SessionWindow::Last5, None, prompts::coach("hype-man"))
            .await
            .unwrap();

        pipeline.clear_analysis().unwrap();
        assert!(pipeline.cached_analysis().is_none());
    }

    #[tokio::test]
    async fn test_generate_keeps_only_catalog_exercises() {
        let store = Arc::new(MemoryStore::new());
        let reply = r#"{
            "title": "Posterior Chain AI",
            "exercises": [
                {"exercise_template_id": "A1", "exercise_name": "Exercise A1",
                 "sets": [{"type": "normal", "reps": 10, "weight_kg": 60}]},
                {"exercise_template_id": "ZZZ", "sets": []},
                {"exercise_template_id": "B2", "sets": []}
            ]
        }"#;
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(reply.into())]));
        let source = catalog_source();
        let pipeline = pipeline(Some(backend.clone()), Some(source.clone()), &store);

        let outcome = pipeline.generate_routine(&analysis(), None).await.unwrap();

        assert_eq!(outcome.dropped_exercise_ids, vec!["ZZZ".to_string()]);
        assert_eq!(outcome.folder.title, "AI");

        let created = source.created_routines.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        let routine = &created[0];
        assert_eq!(routine.title, "Posterior Chain AI");
        assert_eq!(routine.folder_id, Some(outcome.folder.id));
        let ids: Vec<_> = routine.exercises.iter().map(|e| e.exercise_template_id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "B2"]);
        assert!(routine.exercises.iter().all(|e| e.sets.len() == 3));
        assert_eq!(routine.exercises[1].sets[0], GeneratedSet::normal_reps(10));

        // Catalog ids were offered to the model
        assert!(backend.requests()[0].user.contains("\"A1\""));
    }

    #[tokio::test]
    async fn test_generate_skips_exercises_without_id() {
        let store = Arc::new(MemoryStore::new());
        let reply = r#"{
            "title": "Leg Day",
            "exercises": [
                {"exercise_template_id": "A1", "exercise_name": "Exercise A1",
                 "sets": [{"type": "normal", "reps": 8}]},
                {"exercise_name": "Made up", "sets": []},
                {"exercise_template_id": 7, "sets": []}
            ]
        }"#;
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(reply.into())]));
        let source = catalog_source();
        let pipeline = pipeline(Some(backend), Some(source.clone()), &store);

        let outcome = pipeline.generate_routine(&analysis(), None).await.unwrap();

        let ids: Vec<_> = outcome
            .routine
            .exercises
            .iter()
            .map(|e| e.exercise_template_id.as_str())
            .collect();
        assert_eq!(ids, vec!["A1"]);
        assert_eq!(
            outcome.dropped_exercise_ids,
            vec!["Made up (no id)".to_string(), "(no id)".to_string()]
        );
        assert_eq!(source.created_routines.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_all_invalid_fails_before_writes() {
        let store = Arc::new(MemoryStore::new());
        let reply = r#"{"title": "Nope", "exercises": [{"exercise_template_id": "X", "sets": []}]}"#;
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(reply.into())]));
        let source = catalog_source();
        let pipeline = pipeline(Some(backend), Some(source.clone()), &store);

        let result = pipeline.generate_routine(&analysis(), None).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(source.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_reuses_existing_folder() {
        let store = Arc::new(MemoryStore::new());
        let reply = r#"{"title": "Reuse", "exercises": [{"exercise_template_id": "A1", "sets": []}]}"#;
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(reply.into())]));
        let source = Arc::new(FakeSource {
            templates: vec![template("A1")],
            folders: std::sync::Mutex::new(vec![
                RoutineFolder {
                    id: 1,
                    title: "Push".into(),
                    index: Some(0),
                },
                RoutineFolder {
                    id: 42,
                    title: "AI".into(),
                    index: Some(1),
                },
            ]),
            ..FakeSource::default()
        });
        let pipeline = pipeline(Some(backend), Some(source.clone()), &store);

        let outcome = pipeline.generate_routine(&analysis(), None).await.unwrap();
        assert_eq!(outcome.folder.id, 42);
        assert_eq!(*source.folder_creations.lock().unwrap(), 0);
        assert_eq!(outcome.routine.folder_id, Some(42));
    }

    #[tokio::test]
    async fn test_generate_requires_both_keys() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(ScriptedBackend::default());
        let pipeline = pipeline(Some(backend.clone()), None, &store);

        assert!(matches!(
            pipeline.generate_routine(&analysis(), None).await,
            Err(Error::Auth(_))
        ));
        assert!(backend.requests().is_empty());
    }
}
