//! Coach personas and prompt templates for the inference API.

use crate::{AnalysisResult, ExerciseTemplate, SimplifiedWorkout};
use once_cell::sync::Lazy;
use serde::Serialize;

/// Most recent workouts included in an analysis prompt
pub const ANALYSIS_WORKOUT_LIMIT: usize = 20;

/// Most catalog entries offered to the routine generator
pub const GENERATOR_CATALOG_LIMIT: usize = 300;

/// Persona used when none (or an unknown one) is selected
pub const DEFAULT_COACH_ID: &str = "drill-sergeant";

/// Suffix appended to every analysis system prompt
const JSON_DIRECTIVE: &str = " You must return valid JSON.";

const GENERATOR_SYSTEM_PROMPT: &str = "You are an expert workout programmer. Return JSON only.";

/// A coaching persona
#[derive(Clone, Debug, PartialEq)]
pub struct CoachPersona {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub system_prompt: &'static str,
}

static COACHES: Lazy<Vec<CoachPersona>> = Lazy::new(|| {
    vec![
        CoachPersona {
            id: "drill-sergeant",
            name: "The Drill Sergeant",
            description: "Brutal honesty. No excuses. Focuses on consistency and effort.",
            system_prompt: "You are an intense, no-nonsense military-style strength coach.
- Your tone is strict, direct, and commanding.
- Do not sugarcoat failures. Call out missed sessions or lack of intensity.
- Focus on discipline, consistency, and hard work.
- Verify they are hitting their main lifts hard.",
        },
        CoachPersona {
            id: "scientist",
            name: "The Scientist",
            description: "Data-driven. Optimizes for volume, frequency, and biomechanics.",
            system_prompt: "You are an evidence-based exercise scientist and biomechanics expert.
- Your tone is analytical, precise, and educational.
- Focus on volume landmarks (MEV/MRV), training frequency, and progressive overload metrics.
- Reference RPE and split efficiency where the data supports it.
- Stick to the literature.",
        },
        CoachPersona {
            id: "hype-man",
            name: "The Hype Man",
            description: "Pure energy. Focuses on wins, PRs, and getting you excited to train.",
            system_prompt: "You are the ultimate hype man and supportive gym partner.
- Your tone is high-energy, enthusiastic, and relentlessly positive.
- Celebrate every workout as a win.
- Focus on PRs, momentum, and consistency streaks.
- Even when critiquing, frame it as an opportunity for growth.",
        },
    ]
});

/// All built-in personas
pub fn coaches() -> &'static [CoachPersona] {
    &COACHES
}

/// Look up a persona, falling back to the default for unknown ids
pub fn coach(id: &str) -> &'static CoachPersona {
    COACHES
        .iter()
        .find(|c| c.id == id)
        .or_else(|| COACHES.iter().find(|c| c.id == DEFAULT_COACH_ID))
        .unwrap_or(&COACHES[0])
}

/// System message for an analysis request
pub fn analysis_system_prompt(persona: &CoachPersona) -> String {
    format!("{}{}", persona.system_prompt, JSON_DIRECTIVE)
}

/// System message for a routine generation request
pub fn generator_system_prompt() -> &'static str {
    GENERATOR_SYSTEM_PROMPT
}

/// Workout as shown to the model, with sets rendered as text
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptWorkout<'a> {
    date: &'a str,
    title: &'a str,
    duration_minutes: u32,
    exercises: Vec<PromptExercise<'a>>,
}

#[derive(Serialize)]
struct PromptExercise<'a> {
    name: &'a str,
    sets: Vec<String>,
}

impl<'a> From<&'a SimplifiedWorkout> for PromptWorkout<'a> {
    fn from(workout: &'a SimplifiedWorkout) -> Self {
        Self {
            date: &workout.date,
            title: &workout.title,
            duration_minutes: workout.duration_minutes,
            exercises: workout
                .exercises
                .iter()
                .map(|e| PromptExercise {
                    name: &e.name,
                    sets: e.sets.iter().map(ToString::to_string).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct CatalogOption<'a> {
    id: &'a str,
    name: &'a str,
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    // Plain structs of strings and numbers always serialize
    rendered.unwrap_or_default()
}

/// User message for an analysis request
///
/// Deterministic for a given input; only the first
/// [`ANALYSIS_WORKOUT_LIMIT`] workouts are included.
pub fn analysis_prompt(workouts: &[SimplifiedWorkout], philosophy: Option<&str>) -> String {
    let included: Vec<PromptWorkout<'_>> = workouts
        .iter()
        .take(ANALYSIS_WORKOUT_LIMIT)
        .map(PromptWorkout::from)
        .collect();

    let philosophy_block = philosophy
        .map(|text| {
            format!(
                "\nTRAINING CONTEXT / PHILOSOPHY:\n\
                 The user is following this specific plan or philosophy. Evaluate progress against these principles:\n\
                 \"{}\"\n",
                text
            )
        })
        .unwrap_or_default();

    format!(
        "Analyze the following recent workout history (last {count} sessions).\n\
         \n\
         Data Format:\n\
         List of workouts with date, title, duration and exercises (name + sets).\n\
         {philosophy_block}\n\
         Your Goal:\n\
         Act as the coach described in the system prompt. Provide specific, actionable, data-backed analysis.\n\
         \n\
         Output Format:\n\
         Return strictly a JSON object with this schema:\n\
         {{\n\
         \x20 \"summary\": \"A 1-2 sentence summary of recent performance in the persona's tone.\",\n\
         \x20 \"trends\": [\"2-3 progressive overload observations citing exact numbers.\"],\n\
         \x20 \"neglect\": [\"2-3 specific muscle groups or movement patterns that are missing.\"],\n\
         \x20 \"recommendations\": [\"2-3 actionable tips, each with a suggested set/rep range.\"]\n\
         }}\n\
         \n\
         Rules:\n\
         1. Be specific: name exercises, never body regions alone.\n\
         2. When citing trends, quote the numbers from the history.\n\
         3. Do not invent history that is not in the data.\n\
         4. If a philosophy is given above, frame every recommendation within it.\n\
         \n\
         Do NOT include markdown formatting. Just the raw JSON.\n\
         \n\
         Workouts:\n\
         {workouts}\n",
        count = workouts.len(),
        philosophy_block = philosophy_block,
        workouts = to_json(&included, true),
    )
}

/// User message for a routine generation request
///
/// Offers at most [`GENERATOR_CATALOG_LIMIT`] catalog entries.
pub fn routine_prompt(
    analysis: &AnalysisResult,
    catalog: &[ExerciseTemplate],
    philosophy: Option<&str>,
) -> String {
    let options: Vec<CatalogOption<'_>> = catalog
        .iter()
        .take(GENERATOR_CATALOG_LIMIT)
        .map(|t| CatalogOption {
            id: &t.id,
            name: &t.title,
        })
        .collect();

    let philosophy_line = philosophy
        .map(|text| format!("USER CONTEXT / PHILOSOPHY: \"{}\"\n", text))
        .unwrap_or_default();

    format!(
        "Based on the following training analysis, design a complete structured workout routine.\n\
         \n\
         ANALYSIS SUMMARY: \"{summary}\"\n\
         NEGLECTED AREAS: {neglect}\n\
         RECOMMENDATIONS: {recommendations}\n\
         {philosophy_line}\
         \n\
         Constraints:\n\
         1. Only use exercises from the AVAILABLE EXERCISES list below. Do not invent exercises.\n\
         2. If the user context names a style, match it; otherwise use 3-4 sets of 8-12 reps.\n\
         3. The 'sets' array must contain one object per set (three sets means three objects).\n\
         4. Give the workout a short, descriptive title.\n\
         \n\
         AVAILABLE EXERCISES:\n\
         {options}\n\
         \n\
         Output Format (JSON):\n\
         {{\n\
         \x20 \"title\": \"Workout Title\",\n\
         \x20 \"exercises\": [\n\
         \x20   {{\n\
         \x20     \"exercise_template_id\": \"id from the available list\",\n\
         \x20     \"exercise_name\": \"name from the available list\",\n\
         \x20     \"sets\": [{{ \"type\": \"normal\", \"reps\": 10, \"weight_kg\": 20 }}]\n\
         \x20   }}\n\
         \x20 ]\n\
         }}\n",
        summary = analysis.summary,
        neglect = to_json(&analysis.neglect, false),
        recommendations = to_json(&analysis.recommendations, false),
        philosophy_line = philosophy_line,
        options = to_json(&options, false),
    )
}
