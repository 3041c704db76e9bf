//! Route handlers for the gateway.

use super::server::{ApiError, SharedState, parse_json};
use crate::license;
use crate::store::lineage::{DEFAULT_DEPTH, MAX_DEPTH};
use crate::store::{
    Artifact, ArtifactData, ArtifactMetadata, ArtifactQuery, Direction, EDGE_DERIVED_FROM,
    model_node_id, parent_models,
};
use crate::types::ScoreRecord;
use crate::url::{ArtifactKind, github_owner_repo};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Cost assumed when no weight sizes are known.
const DEFAULT_COST_MB: f64 = 500.0;
const NODE_PREFIX: &str = "hf:model/";

type ApiResult<T> = Result<T, ApiError>;

fn parse_kind(raw: &str) -> ApiResult<ArtifactKind> {
    ArtifactKind::parse(raw).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Invalid artifact type '{raw}'. Must be one of: model, dataset, code"
        ))
    })
}

fn require_model(raw: &str) -> ApiResult<()> {
    match parse_kind(raw)? {
        ArtifactKind::Model => Ok(()),
        _ => Err(ApiError::bad_request("Only model artifacts support this operation")),
    }
}

fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub(super) async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime_secs(),
        "metrics": state.orchestrator.registry().len(),
    }))
}

pub(super) async fn rate(
    State(state): State<SharedState>,
    body: Bytes,
) -> ApiResult<Json<ScoreRecord>> {
    let body: Value = parse_json(&body)?;
    let url = str_field(&body, "url")
        .or_else(|| str_field(&body, "model_url"))
        .ok_or_else(|| ApiError::bad_request("Missing 'url'"))?;
    let classifier = state.orchestrator.classifier();
    classifier
        .validate_model_url(url)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let record = state
        .orchestrator
        .score(url, str_field(&body, "code_url"), str_field(&body, "dataset_url"))
        .await
        .ok_or_else(|| ApiError::bad_request(format!("Not a model URL: {url}")))?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

pub(super) async fn ingest(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&headers)?;
    let req: IngestRequest = parse_json(&body)?;
    let url = req
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing 'url'"))?;
    let classifier = state.orchestrator.classifier();
    classifier
        .validate_model_url(url)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let kind = match req.kind.as_deref() {
        Some(raw) => parse_kind(raw)?,
        None => classifier.artifact_kind(url),
    };

    if state.store.find_by_url(kind, url).await?.is_some() {
        return Ok((
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": format!("Artifact already exists: {url}"),
            })),
        ));
    }

    let artifact = state.store.create(kind, url, req.name.as_deref()).await?;
    let lineage_edges = if kind == ArtifactKind::Model {
        record_parents(&state, url).await
    } else {
        0
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": format!("Artifact ingested: {url}"),
            "id": artifact.metadata.id,
            "artifact": artifact.metadata,
            "metadata": artifact.metadata,
            "data": artifact.data,
            "lineage_edges": lineage_edges,
        })),
    ))
}

/// Store `DERIVED_FROM` edges from a model to the parents named in its config.json.
async fn record_parents(state: &SharedState, url: &str) -> usize {
    let repo = state.orchestrator.classifier().to_repo_id(url).repo_id;
    let config = match state.hub.config_json(&repo).await {
        Ok(Some(config)) => config,
        Ok(None) => return 0,
        Err(e) => {
            warn!(repo = %repo, error = %e, "Could not read config.json for lineage");
            return 0;
        }
    };
    let child = model_node_id(&repo);
    let mut stored = 0;
    for parent in parent_models(&config, &repo) {
        match state
            .store
            .put_edge(&child, &model_node_id(&parent), EDGE_DERIVED_FROM)
            .await
        {
            Ok(()) => stored += 1,
            Err(e) => warn!(repo = %repo, parent = %parent, error = %e, "Failed to store lineage edge"),
        }
    }
    info!(repo = %repo, edges = stored, "Recorded model lineage");
    stored
}

pub(super) async fn reset(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.authorize(&headers)?;
    state.store.reset().await?;
    state.orchestrator.context().clear();
    info!("Registry reset");
    Ok(Json(json!({ "message": "reset" })))
}

pub(super) async fn authenticate(
    State(state): State<SharedState>,
    body: Bytes,
) -> ApiResult<Json<String>> {
    let body: Value = parse_json(&body)?;
    let name = body.pointer("/user/name").and_then(Value::as_str).unwrap_or("");
    let password = body.pointer("/secret/password").and_then(Value::as_str);
    let Some(password) = password.filter(|_| !name.trim().is_empty()) else {
        return Err(ApiError::bad_request(
            "Missing required fields: user.name, secret.password",
        ));
    };
    let token = state
        .auth
        .issue(password)
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Invalid credentials"))?;
    debug!(user = %name, "Issued access token");
    Ok(Json(format!("bearer {token}")))
}

pub(super) async fn create_artifact(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&headers)?;
    let kind = parse_kind(&kind)?;
    let body: Value = parse_json(&body)?;
    let url = str_field(&body, "url").ok_or_else(|| ApiError::bad_request("Missing 'url'"))?;
    state
        .orchestrator
        .classifier()
        .validate_model_url(url)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let artifact = state.store.create(kind, url, str_field(&body, "name")).await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

pub(super) async fn get_artifact(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Json<Artifact>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.store.get(kind, &id).await?))
}

#[derive(Debug, Deserialize)]
struct ArtifactBody {
    metadata: ArtifactMetadata,
    data: ArtifactData,
}

pub(super) async fn update_artifact(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Artifact>> {
    state.authorize(&headers)?;
    let kind = parse_kind(&kind)?;
    let body: ArtifactBody = parse_json(&body)?;
    Ok(Json(
        state
            .store
            .update(kind, &id, &body.metadata, &body.data)
            .await?,
    ))
}

pub(super) async fn delete_artifact(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    state.authorize(&headers)?;
    let kind = parse_kind(&kind)?;
    state.store.delete(kind, &id).await?;
    Ok(Json(json!({ "message": "Artifact deleted", "id": id })))
}

pub(super) async fn list_artifacts(
    State(state): State<SharedState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let body: Value = parse_json(&body)?;
    let items = body
        .as_array()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::bad_request("Body must be a non-empty array of queries"))?;
    if items.iter().any(|q| q.get("name").and_then(Value::as_str).is_none()) {
        return Err(ApiError::bad_request("Every query needs a 'name'"));
    }
    let queries: Vec<ArtifactQuery> = serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid query: {e}")))?;
    let found = state.store.list_by_queries(queries).await?;
    Ok(([("offset", "0")], Json(found)))
}

pub(super) async fn by_name(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<ArtifactMetadata>>> {
    let found = state.store.list_by_name(&name).await?;
    if found.is_empty() {
        return Err(ApiError::not_found(format!("No artifact named '{name}'")));
    }
    Ok(Json(found))
}

pub(super) async fn by_regex(
    State(state): State<SharedState>,
    body: Bytes,
) -> ApiResult<Json<Vec<ArtifactMetadata>>> {
    let body: Value = parse_json(&body)?;
    let pattern = body
        .get("regex")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing 'regex'"))?;
    let found = state.store.list_by_regex(pattern).await?;
    if found.is_empty() {
        return Err(ApiError::not_found("No artifact matches the pattern"));
    }
    Ok(Json(found))
}

pub(super) async fn rate_artifact(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Json<ScoreRecord>> {
    require_model(&kind)?;
    let artifact = state.store.get(ArtifactKind::Model, &id).await?;
    let record = state
        .orchestrator
        .score(&artifact.data.url, None, None)
        .await
        .ok_or_else(|| {
            ApiError::bad_request(format!("Not a model URL: {}", artifact.data.url))
        })?;
    Ok(Json(record))
}

/// Download size of a hub model in MB, or the default when unknown.
async fn model_mb(state: &SharedState, repo: &str) -> f64 {
    match state.hub.model_info(repo).await {
        Ok(info) if info.weight_bytes() > 0 => info.weight_bytes() as f64 / 1_000_000.0,
        Ok(_) => DEFAULT_COST_MB,
        Err(e) => {
            debug!(repo = %repo, error = %e, "Using default cost");
            DEFAULT_COST_MB
        }
    }
}

/// Stored artifact id for a lineage node, falling back to the node id.
async fn node_artifact(state: &SharedState, node: &str) -> ApiResult<(String, String, bool)> {
    let repo = node.strip_prefix(NODE_PREFIX).unwrap_or(node);
    Ok(match state.store.find_model_by_repo(repo).await? {
        Some(a) => (a.metadata.id, a.metadata.name, true),
        None => (node.to_string(), repo.to_string(), false),
    })
}

pub(super) async fn cost(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let kind = parse_kind(&kind)?;
    let with_deps = params
        .get("dependency")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let artifact = state.store.get(kind, &id).await?;

    let repo = state.orchestrator.classifier().to_repo_id(&artifact.data.url).repo_id;
    let standalone = match kind {
        ArtifactKind::Model => model_mb(&state, &repo).await,
        _ => DEFAULT_COST_MB,
    };

    let mut out = Map::new();
    if !with_deps {
        out.insert(id, json!({ "total_cost": round2(standalone) }));
        return Ok(Json(Value::Object(out)));
    }

    let mut total = standalone;
    if kind == ArtifactKind::Model {
        let graph = state
            .store
            .lineage(&model_node_id(&repo), Direction::Downstream, MAX_DEPTH)
            .await?;
        for node in graph.nodes.iter().skip(1) {
            let dep_repo = node.id.strip_prefix(NODE_PREFIX).unwrap_or(&node.id);
            let dep_cost = model_mb(&state, dep_repo).await;
            let (key, _, _) = node_artifact(&state, &node.id).await?;
            total += dep_cost;
            out.insert(
                key,
                json!({ "standalone_cost": round2(dep_cost), "total_cost": round2(dep_cost) }),
            );
        }
    }
    out.insert(
        id,
        json!({ "standalone_cost": round2(standalone), "total_cost": round2(total) }),
    );
    Ok(Json(Value::Object(out)))
}

pub(super) async fn license_check(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<bool>> {
    require_model(&kind)?;
    let body: Value = parse_json(&body)?;
    let github_url = str_field(&body, "github_url")
        .ok_or_else(|| ApiError::bad_request("Missing required field: github_url"))?;
    let (owner, repo_name) = github_owner_repo(github_url)
        .ok_or_else(|| ApiError::bad_request("Invalid GitHub URL format"))?;

    let artifact = state.store.get(ArtifactKind::Model, &id).await?;
    let repo = state.orchestrator.classifier().to_repo_id(&artifact.data.url).repo_id;
    let info = state.hub.model_info(&repo).await?;
    let model_license = info
        .card_str("license")
        .map(str::to_string)
        .or_else(|| {
            info.tags
                .iter()
                .find_map(|t| t.strip_prefix("license:").map(str::to_string))
        })
        .unwrap_or_default();

    let code_license = state
        .github
        .repo(&owner, &repo_name)
        .await?
        .license_id()
        .unwrap_or_default();

    let compatible = license::is_compatible(&model_license, &code_license);
    debug!(
        model = %repo,
        model_license = %model_license,
        code_license = %code_license,
        compatible,
        "License check"
    );
    Ok(Json(compatible))
}

pub(super) async fn artifact_lineage(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    require_model(&kind)?;
    let artifact = state.store.get(ArtifactKind::Model, &id).await?;
    let repo = state.orchestrator.classifier().to_repo_id(&artifact.data.url).repo_id;
    let root = model_node_id(&repo);
    let graph = state
        .store
        .lineage(&root, Direction::Downstream, MAX_DEPTH)
        .await?;

    let mut keys: HashMap<String, String> = HashMap::new();
    keys.insert(root.clone(), artifact.metadata.id.clone());
    let mut nodes = vec![json!({
        "artifact_id": artifact.metadata.id,
        "name": artifact.metadata.name,
        "source": "artifact_store",
    })];
    for node in graph.nodes.iter().skip(1) {
        let (key, name, stored) = node_artifact(&state, &node.id).await?;
        nodes.push(json!({
            "artifact_id": key,
            "name": name,
            "source": if stored { "artifact_store" } else { "config_json" },
        }));
        keys.insert(node.id.clone(), key);
    }

    // Edges point from a model to its base; the graph lists base -> derived.
    let edges: Vec<Value> = graph
        .edges
        .iter()
        .map(|e| {
            let key = |n: &String| keys.get(n).cloned().unwrap_or_else(|| n.clone());
            json!({
                "from_node_artifact_id": key(&e.to),
                "to_node_artifact_id": key(&e.from),
                "relationship": "base_model",
            })
        })
        .collect();

    Ok(Json(json!({ "nodes": nodes, "edges": edges })))
}

fn entity_param(params: &HashMap<String, String>) -> ApiResult<String> {
    params
        .get("entityId")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Missing 'entityId'"))
}

pub(super) async fn lineage(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let entity = entity_param(&params)?;
    let direction = match params.get("direction") {
        Some(raw) => Direction::parse(raw)
            .ok_or_else(|| ApiError::bad_request("direction must be 'upstream' or 'downstream'"))?,
        None => Direction::default(),
    };
    let depth = match params.get("depth") {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|d| (1..=MAX_DEPTH).contains(d))
            .ok_or_else(|| {
                ApiError::bad_request(format!("depth must be an integer in 1..={MAX_DEPTH}"))
            })?,
        None => DEFAULT_DEPTH,
    };
    let graph = state.store.lineage(&entity, direction, depth).await?;
    Ok(Json(json!(graph)))
}

pub(super) async fn adjacency(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let entity = entity_param(&params)?;
    let adjacency = state.store.adjacency(&entity).await?;
    Ok(Json(json!(adjacency)))
}
