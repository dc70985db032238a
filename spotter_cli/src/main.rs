use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use spotter_core::analytics::{Heatmap, MonthlyVolume, HEATMAP_WEEKS};
use spotter_core::hevy::{HevyClient, WorkoutSource};
use spotter_core::inference::{InferenceBackend, OpenAiClient};
use spotter_core::prompts;
use spotter_core::store::{ANALYSIS_CACHE_KEY, WORKOUT_CACHE_KEY};
use spotter_core::*;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "spotter")]
#[command(about = "Hevy workout sync, analytics and AI coaching", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use a specific config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load workouts (cache first) and show sync status (default)
    Status,

    /// Refetch all workouts, ignoring the cache age
    Sync,

    /// Show the 53-week activity heatmap
    Heatmap,

    /// Show training volume for the last 12 months
    Volume,

    /// Ask the coach to analyze recent sessions
    Analyze {
        /// Number of recent sessions (3, 5, 10 or 20)
        #[arg(long, default_value = "5", value_parser = parse_window)]
        sessions: SessionWindow,

        /// Training philosophy for this run, overriding the saved one
        #[arg(long)]
        philosophy: Option<String>,
    },

    /// Show or clear the saved analysis
    Analysis {
        #[command(subcommand)]
        action: AnalysisAction,
    },

    /// Generate a routine from the saved analysis and add it to the "AI" folder
    Generate {
        /// Training philosophy for this run, overriding the saved one
        #[arg(long)]
        philosophy: Option<String>,
    },

    /// Manage API keys and coaching preferences
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// List available coach personas
    Coaches,
}

#[derive(Subcommand)]
enum AnalysisAction {
    Show,
    Clear,
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    SetHevyKey { key: String },
    SetOpenaiKey { key: String },
    SetPhilosophy { text: String },
    ClearPhilosophy,
    SetCoach { id: String },
}

fn parse_window(value: &str) -> std::result::Result<SessionWindow, String> {
    let count: usize = value
        .parse()
        .map_err(|_| format!("not a number: {}", value))?;
    SessionWindow::try_from(count).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    spotter_core::logging::init_for_verbosity(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let mut app = App::open(config, data_dir)?;

    let result = match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => cmd_status(&app).await,
        Commands::Sync => cmd_sync(&app).await,
        Commands::Heatmap => cmd_heatmap(&app).await,
        Commands::Volume => cmd_volume(&app).await,
        Commands::Analyze {
            sessions,
            philosophy,
        } => cmd_analyze(&app, sessions, philosophy).await,
        Commands::Analysis { action } => cmd_analysis(&app, action),
        Commands::Generate { philosophy } => cmd_generate(&app, philosophy).await,
        Commands::Settings { action } => cmd_settings(&mut app, action),
        Commands::Coaches => {
            cmd_coaches(&app);
            Ok(())
        }
    };

    if let Err(e) = &result {
        if e.is_user_actionable() {
            eprintln!("Hint: check your API keys with `spotter settings show`.");
        }
    }
    result
}

/// Everything a command needs: config, the store and the current settings
struct App {
    config: Config,
    store: Arc<dyn KeyValueStore>,
    settings: SettingsStore,
}

impl App {
    fn open(config: Config, data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(data_dir));
        let settings = SettingsStore::load(store.clone());
        Ok(Self {
            config,
            store,
            settings,
        })
    }

    fn workout_source(&self) -> Result<Option<Arc<dyn WorkoutSource>>> {
        match self.settings.get().hevy_key() {
            Some(key) => {
                let client: Arc<dyn WorkoutSource> =
                    Arc::new(HevyClient::new(&self.config.hevy, key)?);
                Ok(Some(client))
            }
            None => Ok(None),
        }
    }

    fn inference(&self) -> Result<Option<Arc<dyn InferenceBackend>>> {
        match self.settings.get().openai_key() {
            Some(key) => {
                let client: Arc<dyn InferenceBackend> =
                    Arc::new(OpenAiClient::new(&self.config.inference, key)?);
                Ok(Some(client))
            }
            None => Ok(None),
        }
    }

    fn coordinator(&self) -> Result<SyncCoordinator> {
        let options = SyncOptions {
            page_size: self.config.hevy.page_size,
            freshness: self.config.cache.freshness_window()?,
        };
        Ok(SyncCoordinator::new(
            self.workout_source()?,
            CacheSlot::new(self.store.clone(), WORKOUT_CACHE_KEY),
            options,
        ))
    }

    fn pipeline(&self) -> Result<CoachingPipeline> {
        let options = CoachingOptions {
            analysis_max_tokens: Some(self.config.inference.analysis_max_tokens),
            catalog_pages: self.config.hevy.catalog_pages,
            catalog_page_size: self.config.hevy.catalog_page_size,
        };
        Ok(CoachingPipeline::new(
            self.inference()?,
            self.workout_source()?,
            CacheSlot::new(self.store.clone(), ANALYSIS_CACHE_KEY),
            options,
        ))
    }

    fn philosophy(&self, override_text: Option<String>) -> Option<String> {
        override_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| self.settings.get().philosophy().map(str::to_string))
    }
}

/// Mount the coordinator and return what it has on display
///
/// A failed fetch is fatal only when there is nothing cached to fall back on.
async fn mounted(coordinator: &SyncCoordinator) -> Result<SyncSnapshot> {
    if let Err(e) = coordinator.mount().await {
        if !coordinator.snapshot().has_data() {
            eprintln!("Sync failed: {}", e);
            return Err(e);
        }
        eprintln!("Sync failed, showing cached workouts: {}", e);
    }
    Ok(coordinator.snapshot())
}

fn print_no_data_hint(coordinator: &SyncCoordinator) {
    if !coordinator.has_credential() {
        eprintln!("No data. Set a Hevy API key with `spotter settings set-hevy-key <KEY>`.");
    }
}

async fn cmd_status(app: &App) -> Result<()> {
    let coordinator = app.coordinator()?;
    let snapshot = mounted(&coordinator).await?;

    if !snapshot.has_data() {
        println!("No data.");
        print_no_data_hint(&coordinator);
        return Ok(());
    }

    let status = match snapshot.status {
        SyncStatus::Idle => "idle",
        SyncStatus::Syncing => "syncing",
        SyncStatus::Errored => "error",
    };
    println!("Status: {}", status);
    println!("Workouts: {}", snapshot.workouts().len());
    if let Some(synced_at) = snapshot.synced_at {
        let age = Utc::now() - synced_at;
        println!(
            "Last synced: {} ({} min ago)",
            synced_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            age.num_minutes().max(0)
        );
    }
    if let Some(latest) = snapshot.workouts().first() {
        println!("Latest: {} on {} ({} min)", latest.title, latest.date, latest.duration_minutes);
    }
    if let Some(error) = &snapshot.last_error {
        println!("Last error: {}", error);
    }
    Ok(())
}

async fn cmd_sync(app: &App) -> Result<()> {
    let coordinator = app.coordinator()?;
    match coordinator.sync().await {
        Ok(workouts) => {
            println!("✓ Sync complete: {} workouts", workouts.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("Sync failed: {}", e);
            Err(e)
        }
    }
}

async fn cmd_heatmap(app: &App) -> Result<()> {
    let coordinator = app.coordinator()?;
    let snapshot = mounted(&coordinator).await?;
    if !snapshot.has_data() {
        print_no_data_hint(&coordinator);
    }

    let today = Local::now().date_naive();
    display_heatmap(&build_heatmap(snapshot.workouts(), today), today);
    Ok(())
}

async fn cmd_volume(app: &App) -> Result<()> {
    let coordinator = app.coordinator()?;
    let snapshot = mounted(&coordinator).await?;
    if !snapshot.has_data() {
        print_no_data_hint(&coordinator);
    }

    let today = Local::now().date_naive();
    display_volume(&monthly_volume(snapshot.workouts(), today));
    Ok(())
}

async fn cmd_analyze(app: &App, window: SessionWindow, philosophy: Option<String>) -> Result<()> {
    // Credentials first, so a missing key never costs a workout sync
    if app.settings.get().openai_key().is_none() {
        return Err(Error::Auth(
            "OpenAI API key missing. Please check settings.".into(),
        ));
    }
    let pipeline = app.pipeline()?;
    let coordinator = app.coordinator()?;
    let snapshot = mounted(&coordinator).await?;

    let coach = prompts::coach(&app.settings.get().selected_coach_id);
    let philosophy = app.philosophy(philosophy);

    println!("Analyzing {} with {}...", window, coach.name);
    let analysis = pipeline
        .analyze(snapshot.workouts(), window, philosophy.as_deref(), coach)
        .await?;

    display_analysis(&analysis);
    Ok(())
}

fn cmd_analysis(app: &App, action: AnalysisAction) -> Result<()> {
    let pipeline = app.pipeline()?;
    match action {
        AnalysisAction::Show => match pipeline.cached_analysis() {
            Some(analysis) => display_analysis(&analysis),
            None => println!("No saved analysis. Run `spotter analyze` first."),
        },
        AnalysisAction::Clear => {
            pipeline.clear_analysis()?;
            println!("✓ Analysis cleared");
        }
    }
    Ok(())
}

async fn cmd_generate(app: &App, philosophy: Option<String>) -> Result<()> {
    let pipeline = app.pipeline()?;
    let analysis = pipeline.cached_analysis().ok_or_else(|| {
        Error::Validation("No saved analysis. Run `spotter analyze` first.".into())
    })?;
    let philosophy = app.philosophy(philosophy);

    println!("Designing workout...");
    let outcome = pipeline
        .generate_routine(&analysis, philosophy.as_deref())
        .await?;

    println!(
        "\n✓ Created routine \"{}\" in folder \"{}\"",
        outcome.routine.title, outcome.folder.title
    );
    for exercise in &outcome.routine.exercises {
        println!("  → {} ({} sets)", exercise.exercise_template_id, exercise.sets.len());
    }
    if !outcome.dropped_exercise_ids.is_empty() {
        println!(
            "  Skipped unknown exercises: {}",
            outcome.dropped_exercise_ids.join(", ")
        );
    }
    Ok(())
}

fn mask(key: Option<&str>) -> String {
    match key {
        Some(k) if k.chars().count() > 4 => {
            let tail: String = k.chars().skip(k.chars().count() - 4).collect();
            format!("set (…{})", tail)
        }
        Some(_) => "set".into(),
        None => "not set".into(),
    }
}

fn cmd_settings(app: &mut App, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let settings = app.settings.get();
            println!("Hevy API key:   {}", mask(settings.hevy_key()));
            println!("OpenAI API key: {}", mask(settings.openai_key()));
            println!("Coach:          {}", prompts::coach(&settings.selected_coach_id).name);
            println!(
                "Philosophy:     {}",
                settings.philosophy().unwrap_or("(none)")
            );
        }
        SettingsAction::SetHevyKey { key } => {
            app.settings
                .update(|s| s.hevy_api_key = Some(key.trim().to_string()))?;
            println!("✓ Hevy API key saved");
        }
        SettingsAction::SetOpenaiKey { key } => {
            app.settings
                .update(|s| s.openai_api_key = Some(key.trim().to_string()))?;
            println!("✓ OpenAI API key saved");
        }
        SettingsAction::SetPhilosophy { text } => {
            app.settings
                .update(|s| s.training_philosophy = Some(text))?;
            println!("✓ Training philosophy saved");
        }
        SettingsAction::ClearPhilosophy => {
            app.settings.update(|s| s.training_philosophy = None)?;
            println!("✓ Training philosophy cleared");
        }
        SettingsAction::SetCoach { id } => {
            if !prompts::coaches().iter().any(|c| c.id == id) {
                return Err(Error::Validation(format!("Unknown coach: {}", id)));
            }
            let name = prompts::coach(&id).name;
            app.settings.update(|s| s.selected_coach_id = id)?;
            println!("✓ Coach set to {}", name);
        }
    }
    Ok(())
}

fn cmd_coaches(app: &App) {
    let selected = prompts::coach(&app.settings.get().selected_coach_id).id;
    for coach in prompts::coaches() {
        let marker = if coach.id == selected { "*" } else { " " };
        println!("{} {:<15} {}", marker, coach.id, coach.name);
        println!("  {:<15} {}", "", coach.description);
    }
}

const LEVEL_GLYPHS: [char; 5] = ['·', '░', '▒', '▓', '█'];
const ROW_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const LABEL_WIDTH: usize = 4;

fn display_heatmap(heatmap: &Heatmap, today: NaiveDate) {
    let mut header = vec![' '; LABEL_WIDTH + HEATMAP_WEEKS + 3];
    let mut next_free = 0;
    for label in &heatmap.month_labels {
        let start = LABEL_WIDTH + label.week_index;
        if start < next_free {
            continue;
        }
        for (offset, ch) in label.label.chars().enumerate() {
            if let Some(slot) = header.get_mut(start + offset) {
                *slot = ch;
            }
        }
        next_free = start + label.label.chars().count() + 1;
    }
    println!("{}", header.into_iter().collect::<String>().trim_end());

    for (row, name) in ROW_LABELS.iter().enumerate() {
        let cells: String = heatmap
            .weeks
            .iter()
            .map(|week| {
                let day = &week.days[row];
                if day.date > today {
                    ' '
                } else {
                    LEVEL_GLYPHS[usize::from(day.level).min(LEVEL_GLYPHS.len() - 1)]
                }
            })
            .collect();
        println!("{:<width$}{}", name, cells.trim_end(), width = LABEL_WIDTH);
    }

    let insights = &heatmap.insights;
    println!();
    match &insights.busiest_day {
        Some(busiest) => println!(
            "Busiest day:  {} ({} workouts, {}%)",
            busiest.weekday, busiest.count, busiest.percent
        ),
        None => println!("Getting started: log more workouts to unlock insights."),
    }
    println!(
        "Quietest day: {} ({} workouts, {}%)",
        insights.quietest_day.weekday, insights.quietest_day.count, insights.quietest_day.percent
    );
    println!(
        "Workouts:     {} ({:.1} per week)",
        insights.total_workouts, insights.avg_workouts_per_week
    );
    println!(
        "Time:         {} min ({} min per workout)",
        insights.total_minutes, insights.avg_minutes_per_workout
    );
}

const VOLUME_BAR_WIDTH: f64 = 40.0;

fn display_volume(series: &[MonthlyVolume]) {
    let max = series.iter().map(|m| m.volume).fold(0.0, f64::max);
    for month in series {
        let bar_len = if max > 0.0 {
            (month.volume / max * VOLUME_BAR_WIDTH).round() as usize
        } else {
            0
        };
        println!(
            "{}  {:>10.0} kg  {}",
            month.key(),
            month.volume,
            "█".repeat(bar_len)
        );
    }
}

fn display_analysis(analysis: &AnalysisResult) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  COACH ANALYSIS");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {}", analysis.summary);

    let sections = [
        ("Trends", &analysis.trends),
        ("Neglected", &analysis.neglect),
        ("Recommendations", &analysis.recommendations),
    ];
    for (title, items) in sections {
        println!();
        println!("  {}", title);
        for item in items {
            println!("  → {}", item);
        }
    }
    println!();
}
