//! Artifact records: models, datasets and code repositories.

use super::ArtifactStore;
use crate::error::StoreError;
use crate::url::{ArtifactKind, infer_name};
use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

const DOWNLOAD_BASE: &str = "https://example.com/download";
const COLUMNS: &str = "id, name, kind, url, download_url, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactData {
    pub url: String,
    #[serde(default)]
    pub download_url: String,
}

/// A stored artifact as returned by the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub metadata: ArtifactMetadata,
    pub data: ArtifactData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a `/artifacts` query. `*` matches every name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactQuery {
    pub name: String,
    #[serde(default)]
    pub types: Option<Vec<ArtifactKind>>,
}

impl ArtifactQuery {
    fn matches(&self, meta: &ArtifactMetadata) -> bool {
        (self.name == "*" || self.name == meta.name)
            && self
                .types
                .as_ref()
                .is_none_or(|t| t.is_empty() || t.contains(&meta.kind))
    }
}

/// Ten-digit numeric id drawn from a v4 UUID.
pub fn new_artifact_id() -> String {
    format!("{:010}", uuid::Uuid::new_v4().as_u128() % 10_000_000_000)
}

fn download_url(id: &str) -> String {
    format!("{DOWNLOAD_BASE}/{id}")
}

fn parse_time(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Artifact> {
    let kind: String = row.get(2)?;
    Ok(Artifact {
        metadata: ArtifactMetadata {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: ArtifactKind::parse(&kind).unwrap_or(ArtifactKind::Model),
        },
        data: ArtifactData {
            url: row.get(3)?,
            download_url: row.get(4)?,
        },
        created_at: parse_time(row.get(5)?),
        updated_at: parse_time(row.get(6)?),
    })
}

fn all_rows(conn: &rusqlite::Connection) -> Result<Vec<Artifact>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM artifacts ORDER BY created_at, id"
    ))?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

impl ArtifactStore {
    /// Insert a new artifact. Fails with `Duplicate` when `(kind, url)` already exists.
    pub async fn create(
        &self,
        kind: ArtifactKind,
        url: &str,
        name: Option<&str>,
    ) -> Result<Artifact, StoreError> {
        let url = url.trim().to_string();
        if url.is_empty() {
            return Err(StoreError::Invalid {
                message: "url is required".to_string(),
            });
        }
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| infer_name(&url));

        let artifact = self
            .with_conn(move |conn| {
                let exists: Option<String> = conn
                    .query_row(
                        "SELECT id FROM artifacts WHERE kind = ?1 AND url = ?2",
                        params![kind.as_str(), url],
                        |r| r.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    return Err(StoreError::Duplicate {
                        kind: kind.to_string(),
                        url,
                    });
                }
                let id = new_artifact_id();
                let now = Utc::now();
                let artifact = Artifact {
                    metadata: ArtifactMetadata {
                        name,
                        id: id.clone(),
                        kind,
                    },
                    data: ArtifactData {
                        url,
                        download_url: download_url(&id),
                    },
                    created_at: now,
                    updated_at: now,
                };
                conn.execute(
                    &format!("INSERT INTO artifacts ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                    params![
                        artifact.metadata.id,
                        artifact.metadata.name,
                        kind.as_str(),
                        artifact.data.url,
                        artifact.data.download_url,
                        now.to_rfc3339(),
                        now.to_rfc3339(),
                    ],
                )?;
                Ok(artifact)
            })
            .await?;
        info!(
            id = %artifact.metadata.id,
            kind = %artifact.metadata.kind,
            url = %artifact.data.url,
            "Created artifact"
        );
        Ok(artifact)
    }

    pub async fn get(&self, kind: ArtifactKind, id: &str) -> Result<Artifact, StoreError> {
        match self.get_any(id).await? {
            Some(a) if a.metadata.kind == kind => Ok(a),
            _ => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    /// Look up by id regardless of kind.
    pub async fn get_any(&self, id: &str) -> Result<Option<Artifact>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM artifacts WHERE id = ?1"),
                    params![id],
                    from_row,
                )
                .optional()?)
        })
        .await
    }

    pub async fn find_by_url(
        &self,
        kind: ArtifactKind,
        url: &str,
    ) -> Result<Option<Artifact>, StoreError> {
        let url = url.trim().to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM artifacts WHERE kind = ?1 AND url = ?2"),
                    params![kind.as_str(), url],
                    from_row,
                )
                .optional()?)
        })
        .await
    }

    /// Replace name and URL of an existing artifact.
    ///
    /// The body's id and kind must match the path; name and url must be non-empty.
    pub async fn update(
        &self,
        kind: ArtifactKind,
        id: &str,
        metadata: &ArtifactMetadata,
        data: &ArtifactData,
    ) -> Result<Artifact, StoreError> {
        if metadata.id != id || metadata.kind != kind {
            return Err(StoreError::Invalid {
                message: "metadata id and type must match the path".to_string(),
            });
        }
        if metadata.name.trim().is_empty() || data.url.trim().is_empty() {
            return Err(StoreError::Invalid {
                message: "name and url are required".to_string(),
            });
        }
        let existing = self.get(kind, id).await?;
        let name = metadata.name.trim().to_string();
        let url = data.url.trim().to_string();
        let now = Utc::now();
        let id_owned = id.to_string();
        let (name_c, url_c) = (name.clone(), url.clone());
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE artifacts SET name = ?1, url = ?2, updated_at = ?3 WHERE id = ?4",
                params![name_c, url_c, now.to_rfc3339(), id_owned],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(f, _)
                    if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::Duplicate {
                        kind: kind.to_string(),
                        url: url_c.clone(),
                    }
                }
                other => StoreError::Sqlite(other),
            })?;
            Ok(())
        })
        .await?;
        Ok(Artifact {
            metadata: ArtifactMetadata {
                name,
                ..existing.metadata
            },
            data: ArtifactData {
                url,
                download_url: existing.data.download_url,
            },
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    pub async fn delete(&self, kind: ArtifactKind, id: &str) -> Result<(), StoreError> {
        let id_owned = id.to_string();
        let removed = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM artifacts WHERE id = ?1 AND kind = ?2",
                    params![id_owned, kind.as_str()],
                )?)
            })
            .await?;
        if removed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        info!(id = %id, kind = %kind, "Deleted artifact");
        Ok(())
    }

    /// Metadata of every artifact matching any query, deduplicated, in creation order.
    pub async fn list_by_queries(
        &self,
        queries: Vec<ArtifactQuery>,
    ) -> Result<Vec<ArtifactMetadata>, StoreError> {
        let rows = self.with_conn(|conn| all_rows(conn)).await?;
        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .map(|a| a.metadata)
            .filter(|m| queries.iter().any(|q| q.matches(m)))
            .filter(|m| seen.insert(m.id.clone()))
            .collect())
    }

    pub async fn list_by_name(&self, name: &str) -> Result<Vec<ArtifactMetadata>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM artifacts WHERE name = ?1 ORDER BY created_at, id"
            ))?;
            let rows = stmt
                .query_map(params![name], from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows.into_iter().map(|a| a.metadata).collect())
        })
        .await
    }

    /// Case-insensitive regex search over names and URLs.
    pub async fn list_by_regex(&self, pattern: &str) -> Result<Vec<ArtifactMetadata>, StoreError> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(1 << 20)
            .build()
            .map_err(|e| StoreError::Invalid {
                message: format!("invalid regex: {e}"),
            })?;
        let rows = self.with_conn(|conn| all_rows(conn)).await?;
        Ok(rows
            .into_iter()
            .filter(|a| re.is_match(&a.metadata.name) || re.is_match(&a.data.url))
            .map(|a| a.metadata)
            .collect())
    }

    /// First stored model whose URL ends with the given repository id.
    pub async fn find_model_by_repo(&self, repo_id: &str) -> Result<Option<Artifact>, StoreError> {
        let suffix = format!("/{}", repo_id.trim_matches('/'));
        let rows = self.with_conn(|conn| all_rows(conn)).await?;
        Ok(rows.into_iter().find(|a| {
            a.metadata.kind == ArtifactKind::Model
                && a.data.url.trim_end_matches('/').ends_with(&suffix)
        }))
    }
}
