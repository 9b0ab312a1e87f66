use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::batch::{self, PREDICTIONS_FILE_NAME, SAMPLE_FILE_NAME};
use crate::display::RoundingPolicy;
use crate::error::ServiceError;
use crate::features::{EncodedRecord, FeatureEncoder, RawRecord};
use crate::predictor::{ModelInfo, Predictor};

/// Shared, read-only request context.
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<dyn Predictor>,
    pub encoder: FeatureEncoder,
    pub rounding: RoundingPolicy,
}

/// Build the Axum router for the form page and the prediction API.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/model", get(model_handler))
        .route("/api/predict", post(predict_handler))
        .route("/api/predict/batch", post(batch_handler))
        .route("/api/sample.csv", get(sample_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// A form value that may arrive as text, a number, or a checkbox flag.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl FormValue {
    fn into_text(self) -> String {
        match self {
            FormValue::Text(s) => s,
            FormValue::Number(n) => n.to_string(),
            FormValue::Flag(true) => "1".to_string(),
            FormValue::Flag(false) => "0".to_string(),
        }
    }
}

/// Body of `POST /api/predict`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
    pub date: Option<String>,
    pub innings: Option<String>,
    pub captain: Option<String>,
    pub country: Option<String>,
    pub versus: Option<String>,
    pub balls_faced: Option<FormValue>,
    pub sena: Option<FormValue>,
}

impl From<PredictRequest> for RawRecord {
    fn from(req: PredictRequest) -> Self {
        RawRecord {
            date: req.date,
            innings: req.innings,
            captain: req.captain,
            country: req.country,
            versus: req.versus,
            balls_faced: req.balls_faced.map(FormValue::into_text),
            sena: req.sena.map(FormValue::into_text),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_runs: f64,
    pub raw_prediction: f64,
    pub rounding: RoundingPolicy,
    pub encoded: EncodedRecord,
}

#[derive(Debug, Serialize)]
pub struct ModelOverview {
    pub model: ModelInfo,
    pub required_columns: &'static [&'static str],
    pub strict_names: bool,
    pub rounding: RoundingPolicy,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    row: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing: Vec<String>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Predictor(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Request(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        if status.is_server_error() {
            error!("Prediction failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let mut body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            field: None,
            reason: None,
            row: None,
            missing: Vec::new(),
        };
        match self {
            ServiceError::Encoding { row, source } => {
                body.field = Some(source.field);
                body.reason = Some(source.reason.as_str());
                body.row = row;
            }
            ServiceError::Schema(schema) => body.missing = schema.missing,
            ServiceError::Csv(_) | ServiceError::Request(_) | ServiceError::Predictor(_) => {}
        }
        (status, Json(body)).into_response()
    }
}

/// Serve the form page, injecting the active variant.
async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let html = FORM_HTML.replace(
        "<body>",
        &format!(r#"<body data-variant="{}">"#, state.encoder.variant()),
    );
    Html(html)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// GET /api/model
async fn model_handler(State(state): State<Arc<AppState>>) -> Json<ModelOverview> {
    Json(ModelOverview {
        model: state.predictor.info(),
        required_columns: state.encoder.variant().required_columns(),
        strict_names: state.encoder.strict_names(),
        rounding: state.rounding,
    })
}

/// POST /api/predict
async fn predict_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ServiceError> {
    let Json(req) = payload.map_err(|rejection| ServiceError::Request(rejection.body_text()))?;
    let raw = RawRecord::from(req);
    let encoded = state.encoder.encode(&raw)?;
    let raw_prediction = state
        .predictor
        .predict(&encoded.features(state.encoder.variant())?)?;
    debug!("Single prediction {:.3} for {:?}", raw_prediction, encoded);

    Ok(Json(PredictResponse {
        predicted_runs: state.rounding.apply(raw_prediction),
        raw_prediction,
        rounding: state.rounding,
        encoded,
    }))
}

/// POST /api/predict/batch with a CSV body; responds with the scored CSV.
async fn batch_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let text = std::str::from_utf8(&body)
        .map_err(|e| ServiceError::Csv(format!("upload is not valid UTF-8: {e}")))?;
    let mut out = Vec::new();
    batch::predict_csv(
        text.as_bytes(),
        &mut out,
        &state.encoder,
        state.predictor.as_ref(),
        state.rounding,
    )?;
    Ok(csv_attachment(PREDICTIONS_FILE_NAME, out))
}

/// GET /api/sample.csv
async fn sample_handler(State(state): State<Arc<AppState>>) -> Result<Response, ServiceError> {
    let sample = batch::sample_csv(state.encoder.variant())?;
    Ok(csv_attachment(SAMPLE_FILE_NAME, sample.into_bytes()))
}

fn csv_attachment(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(r#"attachment; filename="{file_name}""#),
            ),
        ],
        Body::from(bytes),
    )
        .into_response()
}

/// Embedded single-file form page (HTML + CSS + JS)
const FORM_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>ODI Runs Predictor</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #6c63ff;
    --green: #00c896;
    --red: #ff4f6a;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; font-weight: 700; }
  .badge { padding: .2rem .6rem; border-radius: 4px; font-size: .75rem; font-weight: 700; text-transform: uppercase; background: var(--accent); color: #fff; }
  main { padding: 1.5rem 2rem; display: grid; gap: 1.5rem; max-width: 960px; margin: 0 auto; }
  .notice { color: var(--muted); font-size: .85rem; }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  .panel-header { padding: .9rem 1.2rem; border-bottom: 1px solid var(--border); font-weight: 600; display: flex; justify-content: space-between; align-items: center; }
  .panel-body { padding: 1.2rem; }
  form.grid { display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; }
  @media (max-width: 768px) { form.grid { grid-template-columns: 1fr; } }
  label { display: grid; gap: .35rem; font-size: .8rem; color: var(--muted); text-transform: uppercase; letter-spacing: .06em; }
  input, select { background: var(--bg); color: var(--text); border: 1px solid var(--border); border-radius: 6px; padding: .5rem .6rem; font-size: .95rem; }
  .btn { background: var(--accent); border: none; color: #fff; padding: .55rem 1.1rem; border-radius: 6px; cursor: pointer; font-weight: 600; }
  .btn.ghost { background: none; border: 1px solid var(--border); color: var(--muted); }
  .btn.ghost:hover { border-color: var(--accent); color: var(--accent); }
  .result { margin-top: 1rem; font-size: 1.1rem; }
  .result.ok { color: var(--green); }
  .result.err { color: var(--red); }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .7rem 1rem; text-align: left; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .65rem 1rem; font-size: .88rem; border-bottom: 1px solid #1e2130; }
  tr:last-child td { border-bottom: none; }
  .empty { color: var(--muted); text-align: center; padding: 2rem; font-size: .9rem; }
  .row { display: flex; gap: .8rem; align-items: center; flex-wrap: wrap; }
  ul.overview { padding-left: 1.2rem; line-height: 1.6; font-size: .9rem; }
</style>
</head>
<body>
<header>
  <h1>🏏 Virat Kohli · ODI Runs Prediction</h1>
  <span class="badge" id="variant-badge">…</span>
</header>

<main>
  <p class="notice">Predicts runs scored in an ODI innings from match context. Demo application: no data is stored.</p>

  <div class="panel">
    <div class="panel-header">Model Overview</div>
    <div class="panel-body"><ul class="overview" id="overview"><li>Loading…</li></ul></div>
  </div>

  <div class="panel">
    <div class="panel-header">Single Match Prediction</div>
    <div class="panel-body">
      <form class="grid" id="single-form">
        <label>Match Date (MM/DD/YYYY)<input name="date" value="01/15/2023"></label>
        <label>Match Country<input name="country" value="India"></label>
        <label>Innings
          <select name="innings" id="innings">
            <option>1st</option><option>2nd</option><option id="no-result">N/A - No Result</option>
          </select>
        </label>
        <label>Opponent<input name="versus" value="Australia"></label>
        <label>Captain?<select name="captain"><option>Yes</option><option>No</option></select></label>
        <label id="bf-field">Balls Faced (B/F)<input name="balls_faced" type="number" min="0" step="1" value="60"></label>
        <div class="row"><button class="btn" type="submit">Predict Runs</button></div>
      </form>
      <div class="result" id="single-result"></div>
    </div>
  </div>

  <div class="panel">
    <div class="panel-header">Batch Prediction (CSV Upload)
      <a class="btn ghost" href="/api/sample.csv">⬇ Sample CSV</a>
    </div>
    <div class="panel-body">
      <p class="notice">Upload a CSV with the columns <code id="required-columns">…</code> to predict runs for multiple matches. SENA is derived from the match country.</p>
      <div class="row" style="margin-top:1rem;">
        <input type="file" id="csv-file" accept=".csv,text/csv">
        <button class="btn" id="batch-btn">Predict Batch</button>
        <a class="btn ghost" id="download-link" style="display:none;">⬇ Download Predictions</a>
      </div>
      <div class="result" id="batch-result"></div>
    </div>
    <table>
      <thead id="batch-thead"></thead>
      <tbody id="batch-tbody"><tr><td class="empty">No batch scored yet</td></tr></tbody>
    </table>
  </div>
</main>

<script>
const variant = document.body.dataset.variant;

async function readError(r) {
  try { return await r.json(); } catch (_) { return { error: r.status + ' ' + r.statusText }; }
}

function describeError(e) {
  if (e.kind === 'schema' && e.missing) return 'Missing columns: ' + e.missing.join(', ');
  if (e.kind === 'encoding') return (e.row ? 'Row ' + e.row + ': ' : '') + e.field + ' (' + e.reason + ')';
  return e.error || 'Prediction failed';
}

async function loadOverview() {
  const r = await fetch('/api/model');
  if (!r.ok) return;
  const m = await r.json();
  document.getElementById('variant-badge').textContent = m.model.variant;
  document.getElementById('required-columns').textContent = m.required_columns.join(',');
  document.getElementById('overview').innerHTML = [
    'Model: ' + m.model.name + ' (' + m.model.kind.replace(/_/g, ' ') + ')',
    'Features: ' + m.model.columns.join(', '),
    'Date feature engineering: Month, Year',
    'Rounding: ' + m.rounding.replace(/-/g, ' '),
  ].map(t => '<li>' + t + '</li>').join('');
}

document.getElementById('single-form').addEventListener('submit', async ev => {
  ev.preventDefault();
  const data = Object.fromEntries(new FormData(ev.target).entries());
  if (variant !== 'full') delete data.balls_faced;
  const out = document.getElementById('single-result');
  const r = await fetch('/api/predict', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(data),
  });
  const body = r.ok ? await r.json() : await readError(r);
  if (r.ok) {
    out.className = 'result ok';
    out.textContent = '🏏 Predicted Runs: ' + body.predicted_runs;
  } else {
    out.className = 'result err';
    out.textContent = '❌ ' + describeError(body);
  }
});

// RFC 4180 records: quoted cells may hold commas, doubled quotes and newlines.
function parseCsv(text) {
  const rows = [];
  let row = [], cell = '', quoted = false;
  for (let i = 0; i < text.length; i++) {
    const ch = text[i];
    if (quoted) {
      if (ch === '"' && text[i + 1] === '"') { cell += '"'; i++; }
      else if (ch === '"') quoted = false;
      else cell += ch;
    } else if (ch === '"') quoted = true;
    else if (ch === ',') { row.push(cell); cell = ''; }
    else if (ch === '\n' || ch === '\r') {
      if (ch === '\r' && text[i + 1] === '\n') i++;
      row.push(cell); rows.push(row); row = []; cell = '';
    } else cell += ch;
  }
  if (cell !== '' || row.length) { row.push(cell); rows.push(row); }
  return rows;
}

function tableRow(cells, tag) {
  const tr = document.createElement('tr');
  for (const c of cells) {
    const el = document.createElement(tag);
    el.textContent = c;
    tr.appendChild(el);
  }
  return tr;
}

function renderTable(records) {
  const thead = document.getElementById('batch-thead');
  const tbody = document.getElementById('batch-tbody');
  thead.replaceChildren(tableRow(records[0] || [], 'th'));
  const rows = records.slice(1, 51);
  if (!rows.length) {
    const empty = tableRow(['No rows'], 'td');
    empty.firstChild.className = 'empty';
    tbody.replaceChildren(empty);
    return;
  }
  tbody.replaceChildren(...rows.map(r => tableRow(r, 'td')));
}

document.getElementById('batch-btn').addEventListener('click', async () => {
  const file = document.getElementById('csv-file').files[0];
  const out = document.getElementById('batch-result');
  const link = document.getElementById('download-link');
  link.style.display = 'none';
  if (!file) { out.className = 'result err'; out.textContent = 'Choose a CSV file first'; return; }
  const r = await fetch('/api/predict/batch', {
    method: 'POST',
    headers: { 'Content-Type': 'text/csv' },
    body: await file.text(),
  });
  if (!r.ok) {
    out.className = 'result err';
    out.textContent = '❌ Batch prediction failed: ' + describeError(await readError(r));
    return;
  }
  const text = await r.text();
  const records = parseCsv(text);
  renderTable(records);
  link.href = URL.createObjectURL(new Blob([text], { type: 'text/csv' }));
  link.download = 'kohli_odi_predictions.csv';
  link.style.display = '';
  out.className = 'result ok';
  out.textContent = 'Scored ' + Math.max(records.length - 1, 0) + ' rows';
});

document.addEventListener('DOMContentLoaded', () => {
  if (variant !== 'full') {
    document.getElementById('bf-field').style.display = 'none';
    document.getElementById('no-result').remove();
  }
  loadOverview();
});
</script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ModelVariant;
    use crate::predictor::linear::tests::full_pipeline;

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            predictor: Arc::new(full_pipeline()),
            encoder: FeatureEncoder::new(ModelVariant::Full, false),
            rounding: RoundingPolicy::OneDecimal,
        })
    }

    fn request() -> PredictRequest {
        serde_json::from_str(
            r#"{"date":"01/15/2023","innings":"1st","captain":"Yes","country":"India",
                "versus":"Australia","balls_faced":60,"sena":0}"#,
        )
        .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn single_prediction_returns_rounded_and_encoded() {
        let Json(resp) = predict_handler(State(state()), Ok(Json(request())))
            .await
            .unwrap();
        assert_eq!(resp.predicted_runs, 39.0);
        assert_eq!(resp.encoded.month, 1);
        assert_eq!(resp.encoded.year, 2023);
        assert_eq!(resp.encoded.balls_faced, Some(60));
    }

    #[tokio::test]
    async fn form_values_accept_text_numbers() {
        let mut req = request();
        req.balls_faced = Some(FormValue::Text("60".into()));
        req.sena = Some(FormValue::Flag(false));
        assert!(predict_handler(State(state()), Ok(Json(req))).await.is_ok());
    }

    #[tokio::test]
    async fn single_and_batch_paths_agree() {
        let Json(single) = predict_handler(State(state()), Ok(Json(request())))
            .await
            .unwrap();
        let csv = "Date,M/Inns,Captain,Country,Versus,B/F,SENA\n\
                   01/15/2023,1st,Yes,India,Australia,60,0\n";
        let response = batch_handler(State(state()), Bytes::from(csv)).await.unwrap();
        let text = body_text(response).await;
        let last = text.lines().nth(1).unwrap().rsplit(',').next().unwrap();
        assert_eq!(last.parse::<f64>().unwrap(), single.predicted_runs);
    }

    #[tokio::test]
    async fn bad_date_is_422_naming_the_field() {
        let mut req = request();
        req.date = Some("2023-15-01".into());
        let err = predict_handler(State(state()), Ok(Json(req))).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["field"], "Date");
        assert_eq!(body["reason"], "unparseable");
    }

    #[tokio::test]
    async fn batch_missing_column_lists_it() {
        let csv = "Date,M/Inns,Captain,Country,B/F,SENA\n01/15/2023,1st,Yes,India,60,0\n";
        let err = batch_handler(State(state()), Bytes::from(csv))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["kind"], "schema");
        assert_eq!(body["missing"], serde_json::json!(["Versus"]));
    }

    #[tokio::test]
    async fn batch_response_is_csv_attachment() {
        let response = batch_handler(
            State(state()),
            Bytes::from(batch::sample_csv(ModelVariant::Full).unwrap()),
        )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains(PREDICTIONS_FILE_NAME));
        assert!(body_text(response).await.contains("Predicted_Runs"));
    }

    #[tokio::test]
    async fn form_submission_without_sena_derives_it() {
        // The page posts exactly these fields; SENA is never sent.
        let req: PredictRequest = serde_json::from_str(
            r#"{"date":"01/15/2023","country":"India","innings":"1st",
                "versus":"Australia","captain":"Yes","balls_faced":"60"}"#,
        )
        .unwrap();
        let Json(resp) = predict_handler(State(state()), Ok(Json(req))).await.unwrap();
        assert_eq!(resp.predicted_runs, 39.0);
        assert_eq!(resp.encoded.sena, 0);
    }

    #[tokio::test]
    async fn blank_sena_is_derived_from_country() {
        let mut req = request();
        req.country = Some("England".into());
        req.sena = Some(FormValue::Text(String::new()));
        let Json(resp) = predict_handler(State(state()), Ok(Json(req))).await.unwrap();
        assert_eq!(resp.encoded.sena, 1);
        // 1 + 2 + 3 - 2 - 1 + 30 - 2
        assert_eq!(resp.predicted_runs, 31.0);
    }

    #[tokio::test]
    async fn malformed_json_is_400_with_json_body() {
        use axum::extract::{FromRequest, Request};

        let request = Request::builder()
            .method("POST")
            .uri("/api/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"date\": "))
            .unwrap();
        let rejection = Json::<PredictRequest>::from_request(request, &())
            .await
            .unwrap_err();
        let err = predict_handler(State(state()), Err(rejection))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["kind"], "request");
        assert!(body["error"].as_str().unwrap().starts_with("invalid request"));
    }

    #[tokio::test]
    async fn non_utf8_upload_is_csv_error_with_json_body() {
        let upload = Bytes::from_static(b"Date,M/Inns,Captain,Country,Versus,B/F,SENA
\xFF\xFE,1st
");
        let err = batch_handler(State(state()), upload).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["kind"], "csv");
        assert!(body["error"].as_str().unwrap().contains("UTF-8"));
    }

    #[test]
    fn form_page_builds_table_cells_as_text() {
        assert!(FORM_HTML.contains("el.textContent = c"));
        assert!(FORM_HTML.contains("function parseCsv"));
        assert!(!FORM_HTML.contains("'<td>' +"));
    }

    #[tokio::test]
    async fn model_overview_lists_columns() {
        let Json(overview) = model_handler(State(state())).await;
        assert_eq!(overview.model.columns.len(), 8);
        assert_eq!(overview.required_columns.len(), 7);
    }

    #[tokio::test]
    async fn index_page_carries_variant() {
        let html = index_handler(State(state())).await.into_response();
        assert!(body_text(html).await.contains(r#"data-variant="full""#));
    }
}
