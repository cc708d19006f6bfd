//! Analysis cache
//!
//! Keyed store of accumulated, annotated reviews per scope key
//! (subject, filter, language). [`AnalysisCache::ensure`] is the only write
//! path: it populates a missing key, extends a key whose record is too
//! small, or serves a record that already covers the request.
//!
//! **Per-key lifecycle:**
//! ```text
//! Absent ──ensure──▶ Populating ──ok──▶ Ready ──ensure(larger)──▶ Extending
//!    ▲                   │                ▲                          │
//!    └──── nothing ◀─────┘                └──── ok / rollback ◀──────┘
//! ```
//!
//! A first population that runs out of retries part-way commits the pages
//! it got and still reports failure; any other populate error commits
//! nothing.
//!
//! **Concurrency:** every key owns a write gate. Writers queue on it and
//! re-check coverage once they hold it, so a request that waited behind an
//! identical one is served from that one's commit. Readers never touch the
//! gate; they clone the last committed `Arc<AnalysisRecord>`.
//!
//! **Eviction:** records older than the TTL are purged on access, and the
//! oldest commits are evicted past the capacity limit. Slots still
//! referenced by an in-flight operation are never evicted.

use crate::error::{AnalysisError, FetchError};
use crate::services::aggregator::{aggregate, Aggregation};
use crate::services::annotator::annotate_all;
use crate::services::fetch_client::FetchClient;
use crate::services::review_source::INITIAL_CURSOR;
use chrono::{DateTime, Utc};
use hourglass_common::api::{AnalysisNote, NoteCode};
use hourglass_common::config::CacheConfig;
use hourglass_common::{AnnotatedReview, ScopeKey};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::Instrument;
use uuid::Uuid;

/// One committed analysis
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub key: ScopeKey,
    /// Annotated reviews in upstream order; only ever appended to
    pub reviews: Vec<AnnotatedReview>,
    pub review_ids: HashSet<String>,
    /// Cursor for the first page not yet consumed
    pub next_cursor: String,
    pub total_upstream: Option<u64>,
    /// Upstream has nothing further for this scope
    pub source_exhausted: bool,
    /// Aggregation over all of `reviews`
    pub aggregation: Aggregation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub committed_at: Instant,
}

impl AnalysisRecord {
    pub fn reviews_analyzed(&self) -> usize {
        self.reviews.len()
    }

    /// First `min(count, held)` reviews
    pub fn view(&self, count: usize) -> &[AnnotatedReview] {
        &self.reviews[..count.min(self.reviews.len())]
    }

    /// Whether a request for `requested` reviews needs no upstream call
    pub fn covers(&self, requested: usize) -> bool {
        self.reviews.len() >= requested || self.source_exhausted
    }

    pub fn age(&self) -> Duration {
        self.committed_at.elapsed()
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}

/// Outcome of [`AnalysisCache::ensure`]
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub record: Arc<AnalysisRecord>,
    pub requested: usize,
    /// Reviews fetched from upstream while serving this request
    pub fetched_now: usize,
    /// Served without any upstream call
    pub cache_hit: bool,
    pub notes: Vec<AnalysisNote>,
}

impl AnalysisResult {
    /// Result served from an already committed record
    pub fn cached(record: Arc<AnalysisRecord>, requested: usize) -> Self {
        let notes = shortfall_note(&record, requested).into_iter().collect();
        Self {
            record,
            requested,
            fetched_now: 0,
            cache_hit: true,
            notes,
        }
    }

    /// First population that stopped at `err` after committing some pages
    pub fn interrupted(record: Arc<AnalysisRecord>, requested: usize, err: &FetchError) -> Self {
        let note = incomplete_note(&record, requested, err);
        Self {
            fetched_now: record.reviews_analyzed(),
            record,
            requested,
            cache_hit: false,
            notes: vec![note],
        }
    }

    /// Reviews this request analyzed: the first `min(requested, held)`
    pub fn view(&self) -> &[AnnotatedReview] {
        self.record.view(self.requested)
    }

    /// Aggregation over [`Self::view`]
    pub fn aggregation(&self) -> Cow<'_, Aggregation> {
        let view = self.view();
        if view.len() == self.record.reviews.len() {
            Cow::Borrowed(&self.record.aggregation)
        } else {
            Cow::Owned(aggregate(view))
        }
    }
}

/// Result of a read-only lookup
#[derive(Debug, Clone)]
pub enum Lookup {
    Ready(Arc<AnalysisRecord>),
    /// A record existed but outlived the TTL
    Expired,
    Missing,
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Keys with a committed record
    pub analyses: usize,
    /// Reviews across all committed records
    pub reviews_held: usize,
    /// Keys with a populate or extend running
    pub in_flight: usize,
}

#[derive(Default)]
struct CacheSlot {
    write_gate: Mutex<()>,
    committed: RwLock<Option<Arc<AnalysisRecord>>>,
}

pub struct AnalysisCache {
    fetcher: FetchClient,
    slots: RwLock<HashMap<ScopeKey, Arc<CacheSlot>>>,
    ttl: Duration,
    max_entries: usize,
}

impl AnalysisCache {
    pub fn new(fetcher: FetchClient, config: &CacheConfig) -> Self {
        Self {
            fetcher,
            slots: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries.max(1),
        }
    }

    /// Make sure `key` holds at least `requested` reviews, or as many as exist
    ///
    /// Fetches only what is missing. On extension failure the previous
    /// record stays committed and is returned inside the error.
    pub async fn ensure(
        &self,
        key: ScopeKey,
        requested: usize,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.purge_expired().await;
        let slot = self.slot_for(&key).await;

        if let Some(record) = self.committed_fresh(&slot).await {
            if record.covers(requested) {
                return Ok(AnalysisResult::cached(record, requested));
            }
        }

        let _gate = slot.write_gate.lock().await;

        // Another writer may have committed while this one queued
        let prior = self.committed_fresh(&slot).await;
        if let Some(record) = &prior {
            if record.covers(requested) {
                tracing::debug!(scope = %key, requested, "Joined result of earlier analysis");
                return Ok(AnalysisResult::cached(record.clone(), requested));
            }
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("analysis", scope = %key, run_id = %run_id);

        let result = match prior {
            Some(prior) => {
                self.extend(&slot, prior, requested)
                    .instrument(span)
                    .await
            }
            None => self.populate(&slot, &key, requested).instrument(span).await,
        };

        let committed = matches!(
            &result,
            Ok(_) | Err(AnalysisError::PopulateFailed { partial: Some(_), .. })
        );
        if committed {
            self.enforce_capacity().await;
        }
        result
    }

    /// Read-only lookup; never fetches
    pub async fn get(&self, key: &ScopeKey) -> Lookup {
        let slot = match self.slots.read().await.get(key) {
            Some(slot) => slot.clone(),
            None => return Lookup::Missing,
        };
        let committed = slot.committed.read().await.clone();
        drop(slot);

        match committed {
            Some(record) if record.is_expired(self.ttl) => {
                self.purge_expired().await;
                Lookup::Expired
            }
            Some(record) => Lookup::Ready(record),
            None => Lookup::Missing,
        }
    }

    /// Number of keys with a committed record
    pub async fn len(&self) -> usize {
        let slots: Vec<Arc<CacheSlot>> = self.slots.read().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.committed.read().await.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn stats(&self) -> CacheStats {
        let slots: Vec<Arc<CacheSlot>> = self.slots.read().await.values().cloned().collect();
        let mut stats = CacheStats::default();
        for slot in slots {
            if slot.write_gate.try_lock().is_err() {
                stats.in_flight += 1;
            }
            if let Some(record) = slot.committed.read().await.as_ref() {
                stats.analyses += 1;
                stats.reviews_held += record.reviews_analyzed();
            }
        }
        stats
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired records and empty slots that no operation is using
    pub async fn purge_expired(&self) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();

        slots.retain(|key, slot| {
            if Arc::strong_count(slot) > 1 {
                return true; // in use
            }
            let Ok(committed) = slot.committed.try_read() else {
                return true;
            };
            match committed.as_ref() {
                Some(record) if record.is_expired(self.ttl) => {
                    tracing::info!(scope = %key, age_secs = record.age().as_secs(), "Expired analysis purged");
                    false
                }
                Some(_) => true,
                None => false,
            }
        });

        before - slots.len()
    }

    async fn slot_for(&self, key: &ScopeKey) -> Arc<CacheSlot> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }

    async fn committed_fresh(&self, slot: &CacheSlot) -> Option<Arc<AnalysisRecord>> {
        slot.committed
            .read()
            .await
            .as_ref()
            .filter(|record| !record.is_expired(self.ttl))
            .cloned()
    }

    async fn populate(
        &self,
        slot: &CacheSlot,
        key: &ScopeKey,
        requested: usize,
    ) -> Result<AnalysisResult, AnalysisError> {
        tracing::info!(requested, "Populating analysis");

        let outcome = self
            .fetcher
            .fetch(key, requested, INITIAL_CURSOR, &HashSet::new())
            .await;

        if let Some(err) = &outcome.error {
            let resumable =
                matches!(err, FetchError::FetchExhausted { .. }) && !outcome.reviews.is_empty();
            if !resumable {
                tracing::error!(
                    error = %err,
                    discarded = outcome.reviews.len(),
                    "Analysis failed; nothing committed"
                );
                return Err(AnalysisError::PopulateFailed {
                    source: err.clone(),
                    partial: None,
                });
            }
            tracing::warn!(
                error = %err,
                fetched = outcome.reviews.len(),
                "Retry budget exhausted; committing fetched pages for a later resume"
            );
        }

        let fetched_now = outcome.reviews.len();
        let review_ids = outcome.reviews.iter().map(|r| r.id.clone()).collect();
        let reviews = annotate_all(outcome.reviews);
        let now = Utc::now();

        let record = Arc::new(AnalysisRecord {
            key: key.clone(),
            aggregation: aggregate(&reviews),
            reviews,
            review_ids,
            next_cursor: outcome.next_cursor,
            total_upstream: outcome.total_hint,
            source_exhausted: outcome.source_exhausted,
            created_at: now,
            updated_at: now,
            committed_at: Instant::now(),
        });

        *slot.committed.write().await = Some(record.clone());

        tracing::info!(
            reviews = record.reviews_analyzed(),
            themed = record.aggregation.total_themed,
            pages = outcome.pages_fetched,
            source_exhausted = record.source_exhausted,
            "Analysis committed"
        );

        if let Some(err) = outcome.error {
            return Err(AnalysisError::PopulateFailed {
                source: err,
                partial: Some(record),
            });
        }

        let notes = shortfall_note(&record, requested).into_iter().collect();
        Ok(AnalysisResult {
            record,
            requested,
            fetched_now,
            cache_hit: false,
            notes,
        })
    }

    async fn extend(
        &self,
        slot: &CacheSlot,
        prior: Arc<AnalysisRecord>,
        requested: usize,
    ) -> Result<AnalysisResult, AnalysisError> {
        let held = prior.reviews_analyzed();
        tracing::info!(held, requested, cursor = %prior.next_cursor, "Extending analysis");

        let outcome = self
            .fetcher
            .fetch(&prior.key, requested - held, &prior.next_cursor, &prior.review_ids)
            .await;

        if let Some(err) = outcome.error {
            tracing::error!(
                error = %err,
                discarded = outcome.reviews.len(),
                held,
                "Extension failed; keeping previous analysis"
            );
            return Err(AnalysisError::ExtensionFailed {
                source: err,
                fallback: prior,
            });
        }

        let fetched_now = outcome.reviews.len();
        let mut record = AnalysisRecord::clone(&prior);
        record
            .review_ids
            .extend(outcome.reviews.iter().map(|r| r.id.clone()));
        record.reviews.extend(annotate_all(outcome.reviews));
        record.aggregation = aggregate(&record.reviews);
        record.next_cursor = outcome.next_cursor;
        record.total_upstream = outcome.total_hint.or(prior.total_upstream);
        record.source_exhausted = outcome.source_exhausted;
        record.updated_at = Utc::now();
        record.committed_at = Instant::now();

        let record = Arc::new(record);
        *slot.committed.write().await = Some(record.clone());

        tracing::info!(
            added = fetched_now,
            reviews = record.reviews_analyzed(),
            source_exhausted = record.source_exhausted,
            "Extended analysis committed"
        );

        let notes = shortfall_note(&record, requested).into_iter().collect();
        Ok(AnalysisResult {
            record,
            requested,
            fetched_now,
            cache_hit: false,
            notes,
        })
    }

    /// Evict the oldest unused records past `max_entries`
    async fn enforce_capacity(&self) {
        let mut slots = self.slots.write().await;
        if slots.len() <= self.max_entries {
            return;
        }

        let mut candidates: Vec<(ScopeKey, Option<Instant>)> = slots
            .iter()
            .filter(|(_, slot)| Arc::strong_count(slot) == 1)
            .filter_map(|(key, slot)| {
                let committed = slot.committed.try_read().ok()?;
                Some((key.clone(), committed.as_ref().map(|r| r.committed_at)))
            })
            .collect();
        // Empty slots first, then oldest commit
        candidates.sort_by_key(|(_, committed_at)| *committed_at);

        let excess = slots.len() - self.max_entries;
        for (key, _) in candidates.into_iter().take(excess) {
            slots.remove(&key);
            tracing::info!(scope = %key, "Analysis evicted (capacity)");
        }
    }
}

fn shortfall_note(record: &AnalysisRecord, requested: usize) -> Option<AnalysisNote> {
    let held = record.reviews_analyzed();
    if !record.source_exhausted || held >= requested {
        return None;
    }
    Some(AnalysisNote {
        code: NoteCode::Shortfall,
        message: format!(
            "Only {} reviews are available for this filter and language; {} were requested.",
            held, requested
        ),
    })
}

fn incomplete_note(record: &AnalysisRecord, requested: usize, err: &FetchError) -> AnalysisNote {
    AnalysisNote {
        code: NoteCode::Incomplete,
        message: format!(
            "Fetching stopped after {} of {} reviews: {}. Request again to resume.",
            record.reviews_analyzed(),
            requested,
            err
        ),
    }
}
