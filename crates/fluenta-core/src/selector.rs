//! Maximum-information item selection with exposure control and content
//! blueprints.
//!
//! Selection order: filter to eligible items (skill, not administered,
//! exposure under quota), narrow to unmet blueprint categories, then take
//! the item with maximum Fisher information at the current θ. Ties break
//! by lower exposure, then smaller |b - θ|, then a session-seeded
//! deterministic pseudo-random choice.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::error::EngineError;
use crate::irt;
use crate::model::{Item, Skill, SkillConfig};

/// Shared, atomically mutated exposure counters keyed by item id.
///
/// One store per item bank, shared across all concurrent sessions.
#[derive(Debug)]
pub struct ExposureStore {
    counters: HashMap<String, AtomicU64>,
}

impl ExposureStore {
    pub fn new<'a>(item_ids: impl IntoIterator<Item = &'a str>) -> Self {
        let counters = item_ids
            .into_iter()
            .map(|id| (id.to_string(), AtomicU64::new(0)))
            .collect();
        Self { counters }
    }

    /// Current exposure count for an item; 0 for unknown ids.
    pub fn count(&self, item_id: &str) -> u64 {
        self.counters
            .get(item_id)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Atomically increment an item's exposure counter.
    pub fn increment(&self, item_id: &str) {
        if let Some(c) = self.counters.get(item_id) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Inputs for one selection step.
#[derive(Debug)]
pub struct SelectionContext<'a> {
    /// Current ability estimate.
    pub theta: f64,
    /// Skill being administered.
    pub skill: Skill,
    /// Item ids already administered this session.
    pub administered: &'a HashSet<String>,
    /// Items administered so far per content-domain tag.
    pub domain_counts: &'a BTreeMap<String, u32>,
    /// Session id, half of the tie-break seed.
    pub session_id: Uuid,
    /// Zero-based selection step, the other half of the seed.
    pub step_index: u32,
}

/// Returns `true` once every blueprint category has met its minimum.
pub fn blueprint_satisfied(
    blueprint: &BTreeMap<String, u32>,
    domain_counts: &BTreeMap<String, u32>,
) -> bool {
    blueprint
        .iter()
        .all(|(tag, min)| domain_counts.get(tag).copied().unwrap_or(0) >= *min)
}

/// Choose exactly one eligible item. Exposure counters are read for
/// eligibility and ranking but never mutated here; the caller increments
/// only once the selection has been durably committed.
pub fn select_item(
    items: &[Item],
    exposure: &ExposureStore,
    config: &SkillConfig,
    ctx: &SelectionContext<'_>,
) -> Result<Item, EngineError> {
    let pool: Vec<&Item> = items
        .iter()
        .filter(|i| i.skill == ctx.skill && !ctx.administered.contains(&i.id))
        .collect();
    if pool.is_empty() {
        return Err(EngineError::NoEligibleItems(ctx.skill));
    }

    // Exposure quota, relaxed for this selection only if it would empty
    // the pool.
    let under_quota: Vec<&Item> = pool
        .iter()
        .copied()
        .filter(|i| exposure.count(&i.id) < config.exposure_quota)
        .collect();
    let pool = if under_quota.is_empty() {
        tracing::warn!(
            skill = %ctx.skill,
            session = %ctx.session_id,
            "exposure quota exhausted for all remaining items, relaxing for this selection"
        );
        pool
    } else {
        under_quota
    };

    // Steer toward blueprint categories that still need items, unless no
    // candidate carries an unmet tag.
    let unmet: Vec<&String> = config
        .blueprint
        .iter()
        .filter(|(tag, min)| ctx.domain_counts.get(*tag).copied().unwrap_or(0) < **min)
        .map(|(tag, _)| tag)
        .collect();
    let pool = if unmet.is_empty() {
        pool
    } else {
        let steered: Vec<&Item> = pool
            .iter()
            .copied()
            .filter(|i| i.tags.iter().any(|t| unmet.contains(&t)))
            .collect();
        if steered.is_empty() { pool } else { steered }
    };

    let chosen = pool
        .into_iter()
        .min_by(|a, b| selection_rank(a, exposure, ctx).total_cmp_key(&selection_rank(b, exposure, ctx)))
        .ok_or(EngineError::NoEligibleItems(ctx.skill))?;

    Ok(chosen.clone())
}

/// Composite ranking key: maximize information, then the tie-break chain.
struct Rank {
    neg_information: f64,
    exposure: u64,
    difficulty_gap: f64,
    jitter: u64,
}

impl Rank {
    fn total_cmp_key(&self, other: &Rank) -> std::cmp::Ordering {
        self.neg_information
            .total_cmp(&other.neg_information)
            .then(self.exposure.cmp(&other.exposure))
            .then(self.difficulty_gap.total_cmp(&other.difficulty_gap))
            .then(self.jitter.cmp(&other.jitter))
    }
}

fn selection_rank(item: &Item, exposure: &ExposureStore, ctx: &SelectionContext<'_>) -> Rank {
    let info = irt::information(ctx.theta, item.discrimination, item.difficulty, item.guessing);
    Rank {
        neg_information: -info,
        exposure: exposure.count(&item.id),
        difficulty_gap: (item.difficulty - ctx.theta).abs(),
        jitter: tie_break_hash(ctx.session_id, ctx.step_index, &item.id),
    }
}

/// Deterministic pseudo-random tie-break, reproducible from
/// (session id, step index, item id).
fn tie_break_hash(session_id: Uuid, step_index: u32, item_id: &str) -> u64 {
    let mut x = (session_id.as_u128() as u64) ^ u64::from(step_index).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    for byte in item_id.as_bytes() {
        x = x.wrapping_add(u64::from(*byte)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    }
    // splitmix64 finalizer
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
