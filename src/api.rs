use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::autosave::Debouncer;
use crate::catalog::{Catalog, CatalogLayers};
use crate::coefficients::{
    clamp_coefficient, importance_label, pillar_preset, question_preset, Importance,
    PillarCoefficients, PillarPreset, QuestionCoefficients, QuestionPreset, PILLAR_PRESETS,
    QUESTION_PRESETS,
};
use crate::config::AppConfig;
use crate::journal::{blank_day, parse_date_key, today_key, DayResponses, Journal};
use crate::metrics::set_catalog_size;
use crate::pillars;
use crate::remote::{build_mirror, DynMirror};
use crate::scoring::{DayScores, ScoreContext, ScoreStrategy};
use crate::storage::{FileStore, MemoryStore, StoragePort, WellnessStore};
use crate::sync::{SaveOutcome, SyncService};
use crate::trends::{
    insights, recommendations, score_series, simulate_impact, summarize, Impact, Insight,
    Recommendation, SeriesPoint, TrendSummary,
};

pub type SharedStore = Arc<dyn StoragePort>;

/// In-memory working copy of everything the handlers read.
struct Model {
    layers: CatalogLayers,
    catalog: Catalog,
    question_coefficients: QuestionCoefficients,
    pillar_coefficients: PillarCoefficients,
    journal: Journal,
}

impl Model {
    fn load(store: &WellnessStore<SharedStore>) -> Result<Self> {
        let layers = store.catalog_layers()?;
        let catalog = layers.resolve();
        Ok(Self {
            catalog,
            layers,
            question_coefficients: store.question_coefficients()?,
            pillar_coefficients: store.pillar_coefficients()?,
            journal: store.journal()?,
        })
    }

    fn ctx(&self) -> ScoreContext<'_> {
        ScoreContext::new(
            &self.catalog,
            &self.question_coefficients,
            &self.pillar_coefficients,
        )
    }

    fn refresh_catalog(&mut self) {
        self.catalog = self.layers.resolve();
        set_catalog_size(self.catalog.total_questions());
    }
}

#[derive(Clone)]
pub struct AppState {
    sync: Arc<SyncService<SharedStore>>,
    model: Arc<RwLock<Model>>,
    autosave: Arc<Debouncer>,
    /// Serialises persist-then-install sequences.
    writes: Arc<tokio::sync::Mutex<()>>,
    default_strategy: ScoreStrategy,
    history_days: u32,
}

impl AppState {
    pub fn new(store: SharedStore, mirror: DynMirror, cfg: &AppConfig) -> Result<Self> {
        let store = WellnessStore::new(store);
        let model = Model::load(&store)?;
        set_catalog_size(model.catalog.total_questions());
        tracing::info!(
            pillars = model.catalog.len(),
            days = model.journal.len(),
            mirror = mirror.name(),
            "wellness state loaded"
        );
        Ok(Self {
            sync: Arc::new(SyncService::new(store, mirror, cfg.remote.user_id.clone())),
            model: Arc::new(RwLock::new(model)),
            autosave: Arc::new(Debouncer::from_millis(cfg.autosave.delay_ms)),
            writes: Arc::new(tokio::sync::Mutex::new(())),
            default_strategy: cfg.scoring.default_strategy,
            history_days: cfg.scoring.history_days,
        })
    }

    /// File store under `storage.data_dir`, mirror per `remote`.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let store: SharedStore = Arc::new(FileStore::open(&cfg.storage.data_dir)?);
        let mirror = build_mirror(&cfg.remote)?;
        Self::new(store, mirror, cfg)
    }

    /// Ephemeral state with default config and no mirror.
    pub fn in_memory() -> Result<Self> {
        let cfg = AppConfig::default();
        let mirror = build_mirror(&cfg.remote)?;
        Self::new(Arc::new(MemoryStore::new()), mirror, &cfg)
    }

    pub fn sync(&self) -> &SyncService<SharedStore> {
        &self.sync
    }

    fn strategy(&self, q: &HashMap<String, String>) -> Result<ScoreStrategy, ApiError> {
        match q.get("strategy") {
            None => Ok(self.default_strategy),
            Some(s) => ScoreStrategy::parse(s)
                .ok_or_else(|| ApiError::bad_request(format!("unknown strategy '{s}'"))),
        }
    }

    fn days(&self, q: &HashMap<String, String>) -> Result<u32, ApiError> {
        match q.get("days") {
            None => Ok(self.history_days),
            Some(d) => match d.parse::<u32>() {
                Ok(n) if (1..=366).contains(&n) => Ok(n),
                _ => Err(ApiError::bad_request(format!("days must be 1..=366, got '{d}'"))),
            },
        }
    }

    fn layers(&self) -> CatalogLayers {
        self.model.read().expect("rwlock poisoned").layers.clone()
    }

    fn question_coefficients(&self) -> QuestionCoefficients {
        let m = self.model.read().expect("rwlock poisoned");
        m.question_coefficients.clone()
    }

    fn pillar_coefficients(&self) -> PillarCoefficients {
        let m = self.model.read().expect("rwlock poisoned");
        m.pillar_coefficients.clone()
    }

    /// Persist `layers` with the current question coefficients, then install
    /// them. The working copy only changes once the local write succeeded.
    async fn commit_layers(&self, layers: CatalogLayers) -> Result<SaveOutcome, ApiError> {
        let coefficients = self.question_coefficients();
        let outcome = self.sync.save_settings(&layers, &coefficients).await?;
        let mut m = self.model.write().expect("rwlock poisoned");
        m.layers = layers;
        m.refresh_catalog();
        Ok(outcome)
    }

    async fn commit_question_coefficients(
        &self,
        coefficients: QuestionCoefficients,
    ) -> Result<SaveOutcome, ApiError> {
        let layers = self.layers();
        let outcome = self.sync.save_settings(&layers, &coefficients).await?;
        self.model.write().expect("rwlock poisoned").question_coefficients = coefficients;
        Ok(outcome)
    }

    fn commit_pillar_coefficients(&self, coefficients: PillarCoefficients) -> Result<(), ApiError> {
        self.sync.store().save_pillar_coefficients(&coefficients)?;
        self.model.write().expect("rwlock poisoned").pillar_coefficients = coefficients;
        Ok(())
    }

    /// The day every reader should see. A pending edit of today wins.
    /// Otherwise the synced copy is used, and a remote copy that differs from
    /// the working copy is kept locally and installed.
    async fn resolve_day(&self, date: &str) -> Result<Option<DayResponses>, ApiError> {
        if date == today_key() && self.autosave.is_pending() {
            let m = self.model.read().expect("rwlock poisoned");
            return Ok(m.journal.day(date).cloned());
        }
        let _w = self.writes.lock().await;
        let loaded = self.sync.load_day(date).await?;
        let current = self
            .model
            .read()
            .expect("rwlock poisoned")
            .journal
            .day(date)
            .cloned();
        let Some(day) = loaded else {
            return Ok(current);
        };
        if current.as_ref() != Some(&day) {
            match self.sync.store().save_day(date, &day) {
                Ok(()) => {
                    let mut m = self.model.write().expect("rwlock poisoned");
                    m.journal.record(date, day.clone());
                    tracing::debug!(date, "remote day installed");
                }
                Err(e) => tracing::warn!(error = ?e, date, "could not keep remote day locally"),
            }
        }
        Ok(Some(day))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/catalog", get(get_catalog))
        .route("/pillars/names", get(get_pillar_names))
        .route("/journal/today", put(put_today_response))
        .route("/journal/{date}", get(get_journal_day).put(put_journal_day))
        .route("/scores/{date}", get(get_scores))
        .route("/history", get(get_history))
        .route("/insights", get(get_insights))
        .route(
            "/coefficients/questions",
            get(get_question_coefficients)
                .put(put_question_coefficients)
                .delete(reset_question_coefficients),
        )
        .route(
            "/coefficients/questions/preset/{id}",
            post(apply_question_preset),
        )
        .route(
            "/coefficients/pillars",
            get(get_pillar_coefficients).put(put_pillar_coefficients),
        )
        .route("/coefficients/pillars/preset/{id}", post(apply_pillar_preset))
        .route("/coefficients/pillars/simulate", post(simulate_pillar_coefficients))
        .route("/coefficients/presets", get(list_presets))
        .route("/pillars", post(add_pillar))
        .route("/pillars/{id}", put(rename_pillar).delete(delete_pillar))
        .route("/questions", post(add_question))
        .route("/questions/{id}", put(edit_question).delete(delete_question))
        .route(
            "/overrides/{pillar}",
            put(put_override).delete(clear_override),
        )
        .route("/sync/migrate", post(migrate))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---- errors ----

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!(error = ?e, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{e:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

fn check_date(date: &str) -> Result<(), ApiError> {
    parse_date_key(date)
        .map(|_| ())
        .ok_or_else(|| ApiError::bad_request(format!("invalid date '{date}', expected YYYY-MM-DD")))
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ---- catalog ----

#[derive(Serialize)]
struct CatalogOut {
    pillar: String,
    name: String,
    questions: Vec<String>,
    importance: f64,
    importance_label: Importance,
}

async fn get_catalog(State(state): State<AppState>) -> Json<Vec<CatalogOut>> {
    let m = state.model.read().expect("rwlock poisoned");
    let names = m.layers.display_names();
    let out = m
        .catalog
        .entries()
        .iter()
        .map(|e| {
            let importance = m.question_coefficients.pillar_importance(&m.catalog, &e.pillar);
            CatalogOut {
                pillar: e.pillar.clone(),
                name: names.display_name_for(&e.pillar),
                questions: e.questions.clone(),
                importance,
                importance_label: importance_label(importance),
            }
        })
        .collect();
    Json(out)
}

async fn get_pillar_names(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    let m = state.model.read().expect("rwlock poisoned");
    let names = m.layers.display_names();
    Json(names.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

#[derive(Deserialize)]
struct NewPillar {
    name: String,
    #[serde(default, alias = "emoji")]
    glyph: String,
}

#[derive(Serialize)]
struct Created {
    id: String,
    sync: SaveOutcome,
}

async fn add_pillar(
    State(state): State<AppState>,
    Json(body): Json<NewPillar>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let _w = state.writes.lock().await;
    let mut layers = state.layers();
    let id = layers
        .add_custom_pillar(&body.name, &body.glyph, now_ms())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let sync = state.commit_layers(layers).await?;
    tracing::info!(pillar = %id, "custom pillar added");
    Ok((StatusCode::CREATED, Json(Created { id, sync })))
}

async fn rename_pillar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NewPillar>,
) -> Result<Json<SaveOutcome>, ApiError> {
    let _w = state.writes.lock().await;
    let mut layers = state.layers();
    layers
        .rename_custom_pillar(&id, &body.name, &body.glyph)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(state.commit_layers(layers).await?))
}

#[derive(Serialize)]
struct Deleted {
    removed_questions: usize,
    sync: SaveOutcome,
}

async fn delete_pillar(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    if pillars::is_builtin(&id) {
        return Err(ApiError::conflict(format!(
            "built-in pillar '{id}' cannot be deleted"
        )));
    }
    let _w = state.writes.lock().await;
    let mut layers = state.layers();
    let removed_questions = layers
        .delete_custom_pillar(&id)
        .map_err(|e| ApiError::not_found(e.to_string()))?;
    let sync = state.commit_layers(layers).await?;
    tracing::info!(pillar = %id, removed_questions, "custom pillar deleted");
    Ok(Json(Deleted {
        removed_questions,
        sync,
    }))
}

#[derive(Deserialize)]
struct NewQuestion {
    pillar: String,
    question: String,
}

async fn add_question(
    State(state): State<AppState>,
    Json(body): Json<NewQuestion>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let _w = state.writes.lock().await;
    let mut layers = state.layers();
    let id = layers
        .add_custom_question(&body.pillar, &body.question, now_ms())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let sync = state.commit_layers(layers).await?;
    Ok((StatusCode::CREATED, Json(Created { id, sync })))
}

async fn edit_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NewQuestion>,
) -> Result<Json<SaveOutcome>, ApiError> {
    let _w = state.writes.lock().await;
    let mut layers = state.layers();
    layers
        .edit_custom_question(&id, &body.pillar, &body.question)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(state.commit_layers(layers).await?))
}

async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaveOutcome>, ApiError> {
    let _w = state.writes.lock().await;
    let mut layers = state.layers();
    layers
        .delete_custom_question(&id)
        .map_err(|e| ApiError::not_found(e.to_string()))?;
    Ok(Json(state.commit_layers(layers).await?))
}

#[derive(Deserialize)]
struct OverrideBody {
    questions: Vec<String>,
}

async fn put_override(
    State(state): State<AppState>,
    Path(pillar): Path<String>,
    Json(body): Json<OverrideBody>,
) -> Result<Json<SaveOutcome>, ApiError> {
    let _w = state.writes.lock().await;
    let mut layers = state.layers();
    layers
        .set_default_override(&pillar, body.questions)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(state.commit_layers(layers).await?))
}

async fn clear_override(
    State(state): State<AppState>,
    Path(pillar): Path<String>,
) -> Result<Json<SaveOutcome>, ApiError> {
    let _w = state.writes.lock().await;
    let mut layers = state.layers();
    if !layers.clear_default_override(&pillar) {
        return Err(ApiError::not_found(format!("no override for '{pillar}'")));
    }
    Ok(Json(state.commit_layers(layers).await?))
}

// ---- journal ----

#[derive(Serialize)]
struct DayOut {
    date: String,
    recorded: bool,
    responses: DayResponses,
}

async fn get_journal_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DayOut>, ApiError> {
    let date = if date == "today" { today_key() } else { date };
    check_date(&date)?;
    let day = state.resolve_day(&date).await?;
    let m = state.model.read().expect("rwlock poisoned");
    Ok(Json(DayOut {
        recorded: day.is_some(),
        responses: day.unwrap_or_else(|| blank_day(&m.catalog)),
        date,
    }))
}

/// Replace one day. Ratings are clamped to `[0, 100]` while decoding.
async fn put_journal_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Json(day): Json<DayResponses>,
) -> Result<Json<SaveOutcome>, ApiError> {
    check_date(&date)?;
    let _w = state.writes.lock().await;
    let outcome = state.sync.save_day(&date, &day).await?;
    state
        .model
        .write()
        .expect("rwlock poisoned")
        .journal
        .record(date, day);
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct ResponseEdit {
    pillar: String,
    index: usize,
    value: f64,
}

#[derive(Serialize)]
struct PendingDay {
    date: String,
    responses: DayResponses,
    autosave_ms: u64,
}

/// One slider edit for today. The edit is a draft in the working copy until
/// the autosave quiet period elapses.
async fn put_today_response(
    State(state): State<AppState>,
    Json(edit): Json<ResponseEdit>,
) -> Result<Json<PendingDay>, ApiError> {
    let date = today_key();
    let responses = {
        let mut m = state.model.write().expect("rwlock poisoned");
        if m.catalog.question_count(&edit.pillar).is_none() {
            return Err(ApiError::not_found(format!("unknown pillar '{}'", edit.pillar)));
        }
        let mut day = m
            .journal
            .day(&date)
            .cloned()
            .unwrap_or_else(|| blank_day(&m.catalog));
        day.set_response(&m.catalog, &edit.pillar, edit.index, edit.value)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        m.journal.record(date.clone(), day.clone());
        day
    };

    let job_state = state.clone();
    let job_date = date.clone();
    state.autosave.schedule(move || async move {
        let _w = job_state.writes.lock().await;
        let day = {
            let m = job_state.model.read().expect("rwlock poisoned");
            m.journal.day(&job_date).cloned()
        };
        let Some(day) = day else { return };
        match job_state.sync.save_day(&job_date, &day).await {
            Ok(outcome) => tracing::debug!(date = %job_date, ?outcome, "autosave done"),
            Err(e) => tracing::error!(error = ?e, date = %job_date, "autosave failed"),
        }
    });

    Ok(Json(PendingDay {
        date,
        responses,
        autosave_ms: state.autosave.delay().as_millis() as u64,
    }))
}

// ---- scores & trends ----

async fn get_scores(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<DayScores>, ApiError> {
    check_date(&date)?;
    let strategy = state.strategy(&q)?;
    let day = state.resolve_day(&date).await?;
    let m = state.model.read().expect("rwlock poisoned");
    Ok(Json(m.ctx().score_day(strategy, day.as_ref())))
}

#[derive(Serialize)]
struct HistoryOut {
    strategy: ScoreStrategy,
    series: Vec<SeriesPoint>,
    summary: TrendSummary,
}

async fn get_history(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<HistoryOut>, ApiError> {
    let strategy = state.strategy(&q)?;
    let days = state.days(&q)?;
    let end = Local::now().date_naive();
    let m = state.model.read().expect("rwlock poisoned");
    let series = score_series(&m.journal, &m.ctx(), end, days, strategy);
    let summary = summarize(&series);
    Ok(Json(HistoryOut {
        strategy,
        series,
        summary,
    }))
}

#[derive(Serialize)]
struct InsightsOut {
    insights: Vec<Insight>,
    recommendations: Vec<Recommendation>,
}

async fn get_insights(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<InsightsOut>, ApiError> {
    let strategy = state.strategy(&q)?;
    let days = state.days(&q)?;
    let end = Local::now().date_naive();
    let today = today_key();
    let m = state.model.read().expect("rwlock poisoned");
    let ctx = m.ctx();
    let series = score_series(&m.journal, &ctx, end, days, strategy);
    Ok(Json(InsightsOut {
        insights: insights(&series),
        recommendations: recommendations(m.journal.day(&today), &ctx),
    }))
}

// ---- coefficients ----

fn clamp_all(edits: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    edits
        .into_iter()
        .map(|(k, v)| (k, clamp_coefficient(v)))
        .collect()
}

async fn get_question_coefficients(
    State(state): State<AppState>,
) -> Json<QuestionCoefficients> {
    let m = state.model.read().expect("rwlock poisoned");
    Json(m.question_coefficients.clone())
}

async fn put_question_coefficients(
    State(state): State<AppState>,
    Json(edits): Json<BTreeMap<String, f64>>,
) -> Result<Json<QuestionCoefficients>, ApiError> {
    let _w = state.writes.lock().await;
    let mut updated = state.question_coefficients();
    updated.merge(clamp_all(edits));
    state.commit_question_coefficients(updated.clone()).await?;
    Ok(Json(updated))
}

async fn reset_question_coefficients(
    State(state): State<AppState>,
) -> Result<Json<QuestionCoefficients>, ApiError> {
    let _w = state.writes.lock().await;
    let mut updated = state.question_coefficients();
    updated.reset_all();
    state.commit_question_coefficients(updated.clone()).await?;
    Ok(Json(updated))
}

async fn apply_question_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuestionCoefficients>, ApiError> {
    let preset =
        question_preset(&id).ok_or_else(|| ApiError::not_found(format!("unknown preset '{id}'")))?;
    let _w = state.writes.lock().await;
    let updated = {
        let m = state.model.read().expect("rwlock poisoned");
        let mut updated = m.question_coefficients.clone();
        updated.apply_preset(&m.catalog, preset);
        updated
    };
    state.commit_question_coefficients(updated.clone()).await?;
    tracing::info!(preset = %id, "question preset applied");
    Ok(Json(updated))
}

async fn get_pillar_coefficients(State(state): State<AppState>) -> Json<PillarCoefficients> {
    let m = state.model.read().expect("rwlock poisoned");
    Json(m.pillar_coefficients.clone())
}

async fn put_pillar_coefficients(
    State(state): State<AppState>,
    Json(edits): Json<BTreeMap<String, f64>>,
) -> Result<Json<PillarCoefficients>, ApiError> {
    let _w = state.writes.lock().await;
    let mut updated = state.pillar_coefficients();
    updated.merge(clamp_all(edits));
    state.commit_pillar_coefficients(updated.clone())?;
    Ok(Json(updated))
}

async fn apply_pillar_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PillarCoefficients>, ApiError> {
    let preset =
        pillar_preset(&id).ok_or_else(|| ApiError::not_found(format!("unknown preset '{id}'")))?;
    let _w = state.writes.lock().await;
    let mut updated = state.pillar_coefficients();
    updated.apply_preset(preset);
    state.commit_pillar_coefficients(updated.clone())?;
    Ok(Json(updated))
}

#[derive(Serialize)]
struct PresetsOut {
    questions: &'static [QuestionPreset],
    pillars: &'static [PillarPreset],
}

async fn list_presets() -> Json<PresetsOut> {
    Json(PresetsOut {
        questions: &QUESTION_PRESETS,
        pillars: &PILLAR_PRESETS,
    })
}

/// Today's pillar-weighted global score with and without the proposed edits.
async fn simulate_pillar_coefficients(
    State(state): State<AppState>,
    Json(edits): Json<BTreeMap<String, f64>>,
) -> Json<Impact> {
    let today = today_key();
    let m = state.model.read().expect("rwlock poisoned");
    Json(simulate_impact(
        m.journal.day(&today),
        &m.ctx(),
        &clamp_all(edits),
    ))
}

// ---- sync ----

async fn migrate(
    State(state): State<AppState>,
) -> Result<Json<crate::sync::MigrationReport>, ApiError> {
    Ok(Json(state.sync.migrate_local_to_remote().await?))
}
