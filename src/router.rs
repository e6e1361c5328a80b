//! Deterministic item-to-shard routing.
//!
//! Routing is a pure function of an item's stable hash and the shard count.
//! Two strategies exist: a bit mask for power-of-two shard counts and a
//! general modulo otherwise. The strategy is fixed at construction time from
//! the shard count alone; asking for the mask with a non-power-of-two count
//! is a construction error, never a routing-time one.

use ahash::RandomState;
use anyhow::{Result, bail};

/// Stable hash source for routable items.
///
/// Equal items must hash equally across calls and across runs; shard
/// assignment has to be reproducible. Uniformity is desirable but not
/// required.
pub trait ShardKey {
    /// A stable signed hash for this item.
    fn shard_hash(&self) -> i64;
}

macro_rules! identity_shard_key {
    ($($t:ty),*) => {
        $(impl ShardKey for $t {
            fn shard_hash(&self) -> i64 {
                *self as i64
            }
        })*
    };
}

identity_shard_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Hash bytes with fixed seeds so routing survives process restarts.
fn stable_bytes_hash(bytes: &[u8]) -> i64 {
    const STATE: (u64, u64, u64, u64) = (
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    );
    let state = RandomState::with_seeds(STATE.0, STATE.1, STATE.2, STATE.3);
    state.hash_one(bytes) as i64
}

impl ShardKey for [u8] {
    fn shard_hash(&self) -> i64 {
        stable_bytes_hash(self)
    }
}

impl ShardKey for Vec<u8> {
    fn shard_hash(&self) -> i64 {
        stable_bytes_hash(self)
    }
}

impl ShardKey for str {
    fn shard_hash(&self) -> i64 {
        stable_bytes_hash(self.as_bytes())
    }
}

impl ShardKey for String {
    fn shard_hash(&self) -> i64 {
        stable_bytes_hash(self.as_bytes())
    }
}

impl<T: ShardKey + ?Sized> ShardKey for &T {
    fn shard_hash(&self) -> i64 {
        (**self).shard_hash()
    }
}

/// A pure mapping from items to shard indexes in `[0, shards)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShardRouter {
    /// `hash & (shards - 1)`; only valid for power-of-two shard counts.
    Mask { mask: u32 },
    /// `abs(hash % shards)`.
    Modulo { shards: u32 },
    /// Position within a group of `group` shards, derived from the global
    /// shard index over `total`: `global(hash) % group`. Used for the
    /// second level of two-level queue/shard routing.
    WithinGroup { total: u32, group: u32 },
}

impl ShardRouter {
    /// Pick the mask strategy when `shards` is a power of two, modulo
    /// otherwise.
    ///
    /// # Errors
    /// Fails if `shards` is zero.
    pub fn for_shards(shards: u32) -> Result<Self> {
        if shards == 0 {
            bail!("shard count must be positive");
        }
        Ok(if shards.is_power_of_two() {
            Self::Mask { mask: shards - 1 }
        } else {
            Self::Modulo { shards }
        })
    }

    /// Force the bit-mask strategy.
    ///
    /// # Errors
    /// Fails unless `shards` is a power of two.
    pub fn power_of_two(shards: u32) -> Result<Self> {
        if shards == 0 || !shards.is_power_of_two() {
            bail!("mask routing requires a power-of-two shard count, got {shards}");
        }
        Ok(Self::Mask { mask: shards - 1 })
    }

    /// Force the general modulo strategy.
    ///
    /// # Errors
    /// Fails if `shards` is zero.
    pub fn modulo(shards: u32) -> Result<Self> {
        if shards == 0 {
            bail!("shard count must be positive");
        }
        Ok(Self::Modulo { shards })
    }

    /// Second-level router: global index over `total` shards, reduced to a
    /// position within a group of `group`.
    ///
    /// # Errors
    /// Fails if either count is zero or `group` exceeds `total`.
    pub fn within_group(total: u32, group: u32) -> Result<Self> {
        if total == 0 || group == 0 {
            bail!("shard and group counts must be positive");
        }
        if group > total {
            bail!("group size {group} exceeds total shard count {total}");
        }
        Ok(Self::WithinGroup { total, group })
    }

    /// Number of distinct indexes this router can produce.
    #[must_use]
    pub fn shards(&self) -> u32 {
        match *self {
            Self::Mask { mask } => mask + 1,
            Self::Modulo { shards } => shards,
            Self::WithinGroup { group, .. } => group,
        }
    }

    /// Route an item to a shard index.
    pub fn route(&self, item: &impl ShardKey) -> u32 {
        self.route_hash(item.shard_hash())
    }

    /// Route a precomputed hash to a shard index.
    #[must_use]
    pub fn route_hash(&self, hash: i64) -> u32 {
        match *self {
            Self::Mask { mask } => (hash as u64 & u64::from(mask)) as u32,
            Self::Modulo { shards } => ((hash % i64::from(shards)).unsigned_abs()) as u32,
            Self::WithinGroup { total, group } => {
                let global = if total.is_power_of_two() {
                    (hash as u64 & u64::from(total - 1)) as u32
                } else {
                    ((hash % i64::from(total)).unsigned_abs()) as u32
                };
                global % group
            }
        }
    }
}
