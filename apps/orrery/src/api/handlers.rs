//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Every handler resolves its effective access mode from the request
//! extension set by [`super::auth::access_mode_middleware`]. Read
//! endpoints accept a `?mode=` preview narrowed via
//! [`AccessMode::effective`]; owner endpoints answer 401 with the
//! standard envelope unless the mode is private.

use super::{
    AppState,
    types::{
        BatchVerifyRequest, BatchVerifyResponse, ClusterListResponse, EdgeUpsertRequest,
        ExportResponse, GapListResponse, GapUpdateRequest, GapUpdateResponse, HealthResponse,
        InsertResponse, ModeQuery, NodeDetailResponse, NodeUpsertRequest, OpportunityListResponse,
        OpportunityModerateRequest, OpportunityResponse, OutreachRequest, OutreachResponse,
        QueueResponse, StatsResponse, VerifyRequest, VerifyResponse,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use orrery_core::{
    AccessMode, EntityKind, GapId, GapStatus, ModerationAction, NodeId, Opportunity, OpportunityId,
    OpportunityStatus, OrreryError,
    export::{canonical_checksum, canonical_crypto_hash},
    parse_outreach,
};
use std::collections::BTreeMap;

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Map a core error to its HTTP status.
fn error_status(error: &OrreryError) -> StatusCode {
    match error {
        OrreryError::NotFound(_) => StatusCode::NOT_FOUND,
        OrreryError::InvalidTransition(_) => StatusCode::CONFLICT,
        OrreryError::Validation(_) => StatusCode::BAD_REQUEST,
        OrreryError::Generation(_) => StatusCode::BAD_GATEWAY,
        OrreryError::Unauthorized => StatusCode::UNAUTHORIZED,
        OrreryError::SerializationError(_)
        | OrreryError::DeserializationError(_)
        | OrreryError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint. Exempt from auth and rate limiting.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// NODE DETAIL HANDLER
// =============================================================================

/// Get one node with its edges, cluster, and mode-dependent context.
///
/// Unknown ids and nodes hidden by the effective mode answer the same
/// 404, so the public surface does not reveal what exists.
pub async fn node_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Path(id): Path<String>,
    Query(query): Query<ModeQuery>,
) -> impl IntoResponse {
    let mode = mode.effective(query.mode);
    let universe = state.universe.read().await;
    match universe.node_detail(&NodeId::new(&id), mode) {
        Ok(detail) => (StatusCode::OK, Json(NodeDetailResponse::success(detail))),
        Err(e) => (
            error_status(&e),
            Json(NodeDetailResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// CLUSTER AND STATS HANDLERS
// =============================================================================

/// List clusters with derived level, score, and velocity, ordered by
/// level then velocity descending. Private mode adds the score
/// component breakdown and formula.
pub async fn clusters_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Query(query): Query<ModeQuery>,
) -> impl IntoResponse {
    let mode = mode.effective(query.mode);
    let universe = state.universe.read().await;
    let clusters = universe.cluster_views(mode);
    (StatusCode::OK, Json(ClusterListResponse::success(clusters)))
}

/// Universe totals. Private mode adds pending moderation counts.
pub async fn stats_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Query(query): Query<ModeQuery>,
) -> impl IntoResponse {
    let mode = mode.effective(query.mode);
    let universe = state.universe.read().await;
    let stats = universe.stats(mode);
    (StatusCode::OK, Json(StatsResponse::success(stats)))
}

// =============================================================================
// LEARNING GAP HANDLERS
// =============================================================================

/// List learning gaps, re-running detection first so the listing
/// reflects the current graph. Ordered by priority then ROI descending.
pub async fn gaps_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(GapListResponse::error("Unauthorized")),
        );
    }

    let mut universe = state.universe.write().await;
    let refresh = match universe.refresh_gaps() {
        Ok(outcome) => outcome,
        Err(e) => return (error_status(&e), Json(GapListResponse::error(e.to_string()))),
    };
    let gaps = universe.gap_views();
    (StatusCode::OK, Json(GapListResponse::success(gaps, refresh)))
}

/// Update one gap's open/closed status.
pub async fn gap_update_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Path(id): Path<String>,
    Json(request): Json<GapUpdateRequest>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(GapUpdateResponse::error("Unauthorized")),
        );
    }

    let status: GapStatus = match request.status.parse() {
        Ok(status) => status,
        Err(e) => {
            return (
                error_status(&e),
                Json(GapUpdateResponse::error(e.to_string())),
            );
        }
    };

    let mut universe = state.universe.write().await;
    match universe.update_gap_status(&GapId::new(&id), status) {
        Ok(gap) => (StatusCode::OK, Json(GapUpdateResponse::success(gap))),
        Err(e) => (
            error_status(&e),
            Json(GapUpdateResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// OPPORTUNITY HANDLERS
// =============================================================================

/// List opportunities, regenerating graph patterns first and merging
/// generator drafts when a generator is configured.
///
/// Generator trouble (unreachable, bad drafts) degrades to the
/// graph-only result: logged, never surfaced as an error.
pub async fn opportunities_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(OpportunityListResponse::error("Unauthorized")),
        );
    }

    let merge = {
        let mut universe = state.universe.write().await;
        match universe.regenerate_opportunities() {
            Ok(outcome) => outcome,
            Err(e) => {
                return (
                    error_status(&e),
                    Json(OpportunityListResponse::error(e.to_string())),
                );
            }
        }
    };

    if state.generator.is_enabled() {
        // The prompt is built and the generator called without holding
        // the lock; a slow generator must not block other requests.
        let prompt = {
            let universe = state.universe.read().await;
            universe.opportunity_prompt()
        };
        match state.generator.generate(&prompt).await {
            Ok(raw) => {
                let mut universe = state.universe.write().await;
                match universe.ingest_opportunity_drafts(&raw) {
                    Ok(outcome) => {
                        tracing::debug!(
                            inserted = outcome.inserted,
                            updated = outcome.updated,
                            "Generator drafts merged"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Generator drafts discarded");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    backend = state.generator.backend_name(),
                    "Generator unavailable, serving graph patterns only"
                );
            }
        }
    }

    let universe = state.universe.read().await;
    let mut opportunities: Vec<Opportunity> = universe
        .opportunities()
        .filter(|o| o.status != OpportunityStatus::Rejected)
        .cloned()
        .collect();
    opportunities.sort_by(|a, b| {
        let left = u32::from(a.confidence) * u32::from(a.novelty);
        let right = u32::from(b.confidence) * u32::from(b.novelty);
        right.cmp(&left).then_with(|| a.id.cmp(&b.id))
    });

    let mut counts_by_kind: BTreeMap<String, usize> = BTreeMap::new();
    for opportunity in &opportunities {
        *counts_by_kind
            .entry(opportunity.kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    (
        StatusCode::OK,
        Json(OpportunityListResponse::success(
            opportunities,
            counts_by_kind,
            merge,
        )),
    )
}

/// Approve or reject one suggested opportunity.
pub async fn opportunity_moderate_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Path(id): Path<String>,
    Json(request): Json<OpportunityModerateRequest>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(OpportunityResponse::error("Unauthorized")),
        );
    }

    let action: ModerationAction = match request.action.parse() {
        Ok(action) => action,
        Err(e) => {
            return (
                error_status(&e),
                Json(OpportunityResponse::error(e.to_string())),
            );
        }
    };

    let mut universe = state.universe.write().await;
    match universe.moderate_opportunity(&OpportunityId::new(&id), action) {
        Ok(opportunity) => (
            StatusCode::OK,
            Json(OpportunityResponse::success(opportunity)),
        ),
        Err(e) => (
            error_status(&e),
            Json(OpportunityResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// VERIFICATION HANDLERS
// =============================================================================

/// The moderation queue: pending nodes, pending edges with confidence
/// breakdowns, and queue stats.
pub async fn queue_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(QueueResponse::error("Unauthorized")),
        );
    }

    let universe = state.universe.read().await;
    let queue = universe.verification_queue();
    (StatusCode::OK, Json(QueueResponse::success(queue)))
}

/// Apply a moderation action to one node or edge.
pub async fn verify_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Json(request): Json<VerifyRequest>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(VerifyResponse::error("Unauthorized")),
        );
    }

    let entity_kind: EntityKind = match request.entity_type.parse() {
        Ok(kind) => kind,
        Err(e) => return (error_status(&e), Json(VerifyResponse::error(e.to_string()))),
    };
    let action: ModerationAction = match request.action.parse() {
        Ok(action) => action,
        Err(e) => return (error_status(&e), Json(VerifyResponse::error(e.to_string()))),
    };

    let mut universe = state.universe.write().await;
    match universe.verify(
        entity_kind,
        &request.entity_id,
        action,
        request.reason.as_deref(),
        "api",
    ) {
        Ok(outcome) => (StatusCode::OK, Json(VerifyResponse::success(&outcome))),
        Err(e) => (error_status(&e), Json(VerifyResponse::error(e.to_string()))),
    }
}

/// Apply one moderation action to a batch of entities.
pub async fn verify_batch_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Json(request): Json<BatchVerifyRequest>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(BatchVerifyResponse::error("Unauthorized")),
        );
    }

    let action: ModerationAction = match request.action.parse() {
        Ok(action) => action,
        Err(e) => {
            return (
                error_status(&e),
                Json(BatchVerifyResponse::error(e.to_string())),
            );
        }
    };
    let mut items = Vec::with_capacity(request.items.len());
    for entry in &request.items {
        match entry.to_item() {
            Ok(item) => items.push(item),
            Err(e) => {
                return (
                    error_status(&e),
                    Json(BatchVerifyResponse::error(e.to_string())),
                );
            }
        }
    }

    let mut universe = state.universe.write().await;
    match universe.verify_batch(&items, action, request.reason.as_deref(), "api") {
        Ok(outcome) => (StatusCode::OK, Json(BatchVerifyResponse::success(outcome))),
        Err(e) => (
            error_status(&e),
            Json(BatchVerifyResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// INSERT HANDLERS
// =============================================================================

/// Insert or replace a node.
pub async fn node_insert_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Json(request): Json<NodeUpsertRequest>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(InsertResponse::error("Unauthorized")),
        );
    }

    let node = match request.into_node(Utc::now()) {
        Ok(node) => node,
        Err(e) => return (error_status(&e), Json(InsertResponse::error(e.to_string()))),
    };
    let id = node.id.to_string();

    let mut universe = state.universe.write().await;
    match universe.insert_node(node) {
        Ok(()) => (StatusCode::OK, Json(InsertResponse::success(id, true))),
        Err(e) => (error_status(&e), Json(InsertResponse::error(e.to_string()))),
    }
}

/// Insert or replace an edge.
///
/// A dangling or self-loop edge is dropped without error and reported
/// as `inserted: false`.
pub async fn edge_insert_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Json(request): Json<EdgeUpsertRequest>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(InsertResponse::error("Unauthorized")),
        );
    }

    let edge = match request.into_edge(Utc::now()) {
        Ok(edge) => edge,
        Err(e) => return (error_status(&e), Json(InsertResponse::error(e.to_string()))),
    };
    let id = edge.id.to_string();

    let mut universe = state.universe.write().await;
    match universe.insert_edge(edge) {
        Ok(inserted) => (StatusCode::OK, Json(InsertResponse::success(id, inserted))),
        Err(e) => (error_status(&e), Json(InsertResponse::error(e.to_string()))),
    }
}

// =============================================================================
// OUTREACH HANDLER
// =============================================================================

/// Draft an outreach message for a person node.
///
/// The graph builds the prompt; the generator writes the message. A
/// generator failure here is surfaced (502), unlike the opportunity
/// listing, because the draft is the whole point of the call.
pub async fn outreach_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
    Json(request): Json<OutreachRequest>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(OutreachResponse::error("Unauthorized")),
        );
    }

    let prompt = {
        let universe = state.universe.read().await;
        match universe.outreach_prompt(
            &NodeId::new(&request.node_id),
            request.context.as_deref(),
            request.specific_ask.as_deref(),
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                return (
                    error_status(&e),
                    Json(OutreachResponse::error(e.to_string())),
                );
            }
        }
    };

    let raw = match state.generator.generate(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(
                error = %e,
                backend = state.generator.backend_name(),
                "Outreach generation failed"
            );
            let error = OrreryError::Generation(e.to_string());
            return (
                error_status(&error),
                Json(OutreachResponse::error(error.to_string())),
            );
        }
    };

    match parse_outreach(&raw) {
        Ok(message) => (StatusCode::OK, Json(OutreachResponse::success(message))),
        Err(e) => (
            error_status(&e),
            Json(OutreachResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export the canonical snapshot with its checksum and content hash.
pub async fn export_handler(
    State(state): State<AppState>,
    Extension(mode): Extension<AccessMode>,
) -> impl IntoResponse {
    if !mode.sees_private() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ExportResponse::error("Unauthorized")),
        );
    }

    let universe = state.universe.read().await;
    let data = match universe.export_canonical() {
        Ok(data) => data,
        Err(e) => return (error_status(&e), Json(ExportResponse::error(e.to_string()))),
    };
    let checksum = match canonical_checksum(universe.graph()) {
        Ok(checksum) => checksum,
        Err(e) => return (error_status(&e), Json(ExportResponse::error(e.to_string()))),
    };
    let hash = match canonical_crypto_hash(universe.graph()) {
        Ok(hash) => hash,
        Err(e) => return (error_status(&e), Json(ExportResponse::error(e.to_string()))),
    };

    (
        StatusCode::OK,
        Json(ExportResponse::success(&data, checksum, hash)),
    )
}
