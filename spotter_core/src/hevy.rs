//! Workout source API client.
//!
//! [`WorkoutSource`] is the seam the sync coordinator and coaching pipeline
//! talk to; [`HevyClient`] implements it over HTTP. The multi-page helpers
//! ([`fetch_all_workouts`], [`fetch_top_exercise_templates`]) are written
//! against the trait.

use crate::config::HevyConfig;
use crate::{
    Error, ExerciseTemplate, ExerciseTemplatesPage, NewRoutine, RawWorkout, Result,
    RoutineFolder, WorkoutsPage,
};
use async_trait::async_trait;
use futures_util::future;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Service name used in error messages
pub const SERVICE_NAME: &str = "Hevy";

/// Map a non-2xx response to the error taxonomy
///
/// 401 is always a credential problem; everything else carries the body.
pub fn classify_failure(service: &'static str, status: StatusCode, body: String) -> Error {
    if status == StatusCode::UNAUTHORIZED {
        Error::Auth(format!("Invalid {} API key", service))
    } else {
        Error::Remote {
            service,
            status: status.as_u16(),
            body,
        }
    }
}

/// Operations against the workout source API
#[async_trait]
pub trait WorkoutSource: Send + Sync {
    /// One page of workouts, newest first
    async fn fetch_workouts_page(&self, page: u32, page_size: u32) -> Result<Vec<RawWorkout>>;

    /// One page of the exercise catalog
    async fn fetch_exercise_templates_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ExerciseTemplate>>;

    async fn list_routine_folders(&self) -> Result<Vec<RoutineFolder>>;

    async fn create_routine_folder(&self, title: &str) -> Result<RoutineFolder>;

    async fn create_routine(&self, routine: &NewRoutine) -> Result<()>;
}

/// Fetch every workout by walking pages from 1 until a short page
///
/// Pages are requested strictly one after another. The first failing page
/// aborts the whole call and discards what was already fetched.
pub async fn fetch_all_workouts(
    source: &dyn WorkoutSource,
    page_size: u32,
) -> Result<Vec<RawWorkout>> {
    if page_size == 0 {
        return Err(Error::Validation("page size must be at least 1".into()));
    }

    let mut all = Vec::new();
    let mut page = 1;

    loop {
        let workouts = source.fetch_workouts_page(page, page_size).await.map_err(|e| {
            warn!("Workout sync failed on page {}: {}", page, e);
            e
        })?;
        let count = workouts.len();
        all.extend(workouts);

        if count < page_size as usize {
            break;
        }
        page += 1;
    }

    info!("Fetched {} workouts across {} pages", all.len(), page);
    Ok(all)
}

/// Fetch the first `pages` catalog pages concurrently
///
/// A failing page contributes nothing instead of failing the call.
pub async fn fetch_top_exercise_templates(
    source: &dyn WorkoutSource,
    pages: u32,
    page_size: u32,
) -> Vec<ExerciseTemplate> {
    let requests = (1..=pages).map(|page| async move {
        match source.fetch_exercise_templates_page(page, page_size).await {
            Ok(templates) => templates,
            Err(e) => {
                warn!("Failed to fetch exercise page {}: {}", page, e);
                Vec::new()
            }
        }
    });

    let templates: Vec<ExerciseTemplate> =
        future::join_all(requests).await.into_iter().flatten().collect();
    debug!("Fetched {} exercise templates", templates.len());
    templates
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Debug, Serialize)]
struct FolderRequest<'a> {
    routine_folder: FolderTitle<'a>,
}

#[derive(Debug, Serialize)]
struct FolderTitle<'a> {
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct FolderResponse {
    routine_folder: RoutineFolder,
}

#[derive(Debug, Default, Deserialize)]
struct FoldersPage {
    #[serde(default)]
    routine_folders: Vec<RoutineFolder>,
}

#[derive(Debug, Serialize)]
struct RoutineRequest<'a> {
    routine: &'a NewRoutine,
}

/// HTTP client for the workout source API, bound to one API key
pub struct HevyClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HevyClient {
    /// Create a client for the configured base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &HevyConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("spotter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Send an authenticated request and decode a JSON body
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.header("api-key", &self.api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Hevy API request failed with status {}: {}", status, body);
            return Err(classify_failure(SERVICE_NAME, status, body));
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Parse(format!("Unexpected Hevy API response: {}", e)))
    }
}

#[async_trait]
impl WorkoutSource for HevyClient {
    async fn fetch_workouts_page(&self, page: u32, page_size: u32) -> Result<Vec<RawWorkout>> {
        debug!("Fetching workouts page {} with page size {}", page, page_size);
        let request = self
            .client
            .get(self.url("workouts"))
            .query(&[("page", page), ("pageSize", page_size)]);
        let body: WorkoutsPage = self.send(request).await?;
        Ok(body.workouts)
    }

    async fn fetch_exercise_templates_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ExerciseTemplate>> {
        let request = self
            .client
            .get(self.url("exercise_templates"))
            .query(&[("page", page), ("pageSize", page_size)]);
        let body: ExerciseTemplatesPage = self.send(request).await?;
        Ok(body.exercise_templates)
    }

    async fn list_routine_folders(&self) -> Result<Vec<RoutineFolder>> {
        let body: FoldersPage = self.send(self.client.get(self.url("routine_folders"))).await?;
        Ok(body.routine_folders)
    }

    async fn create_routine_folder(&self, title: &str) -> Result<RoutineFolder> {
        let request = self
            .client
            .post(self.url("routine_folders"))
            .json(&FolderRequest {
                routine_folder: FolderTitle { title },
            });
        let body: FolderResponse = self.send(request).await?;
        info!("Created routine folder {:?} ({})", body.routine_folder.title, body.routine_folder.id);
        Ok(body.routine_folder)
    }

    async fn create_routine(&self, routine: &NewRoutine) -> Result<()> {
        let request = self
            .client
            .post(self.url("routines"))
            .json(&RoutineRequest { routine });
        let _: serde_json::Value = self.send(request).await?;
        info!("Created routine {:?}", routine.title);
        Ok(())
    }
}
