//! Overflow-safe level arithmetic.
//!
//! Every level change in the crate funnels through the three functions here,
//! so both mesh representations degrade identically when values get close to
//! the edge of `i64`.
//!
//! # Invariants
//!
//! - **Total**: no function in this module panics, for any input.
//! - **Exact when representable**: the fast path uses `i64::checked_*`; the
//!   result only differs from exact integer arithmetic when it cannot be
//!   represented at all.
//! - **Saturating**: an unrepresentable result is clamped to `i64::MAX`,
//!   whichever direction the overflow went.

use tracing::warn;

/// Share of `amount` that lands on each of `size` members.
///
/// Integer division truncating toward zero, so remainders are dropped:
/// `spread(1, 2) == 0`. A `size` of zero is treated as one.
///
/// ```text
/// spread(20, 2)  == 10
/// spread(-7, 2)  == -3
/// spread(1, 2)   == 0
/// ```
pub fn spread(amount: i64, size: u64) -> i64 {
    let size = i128::from(size.max(1));
    // |amount| <= 2^63 and size >= 1, so the quotient always fits.
    (i128::from(amount) / size) as i64
}

/// Add `delta` to `level`, saturating at `i64::MAX` instead of wrapping.
///
/// Negative overflow saturates at `i64::MAX` too: an overflowed level is
/// reported as "full", never as a wrapped or clamped negative value.
///
/// ```text
/// add_level(i64::MAX - 1, 10)  == i64::MAX
/// add_level(i64::MIN + 1, -10) == i64::MAX
/// ```
pub fn add_level(level: i64, delta: i64) -> i64 {
    level.checked_add(delta).unwrap_or_else(|| {
        warn!(level, delta, "level overflow, saturating at i64::MAX");
        i64::MAX
    })
}

/// Size-weighted average of two levels, rounded toward negative infinity.
///
/// Computes `floor((level_a * size_a + level_b * size_b) / (size_a + size_b))`.
/// When the `i64` products or their sum overflow, the computation is redone
/// in `i128`. The result is kept between the two input levels (it can only
/// stray when `size_a + size_b` saturates), so narrowing back to `i64` never
/// has to fall back to `i64::MAX` in practice.
///
/// ```text
/// weighted_merge(10, 1, 20, 1) == 15
/// weighted_merge(15, 2, 12, 1) == 14
/// weighted_merge(-1, 1, 0, 1)  == -1
/// ```
pub fn weighted_merge(level_a: i64, size_a: u64, level_b: i64, size_b: u64) -> i64 {
    let total = size_a.saturating_add(size_b).max(1);
    narrow_merge(level_a, size_a, level_b, size_b, total)
        .unwrap_or_else(|| wide_merge(level_a, size_a, level_b, size_b, total))
}

fn narrow_merge(level_a: i64, size_a: u64, level_b: i64, size_b: u64, total: u64) -> Option<i64> {
    let size_a = i64::try_from(size_a).ok()?;
    let size_b = i64::try_from(size_b).ok()?;
    let total = i64::try_from(total).ok()?;
    let sum = level_a
        .checked_mul(size_a)?
        .checked_add(level_b.checked_mul(size_b)?)?;
    Some(sum.div_euclid(total))
}

fn wide_merge(level_a: i64, size_a: u64, level_b: i64, size_b: u64, total: u64) -> i64 {
    // i64 * u64 always fits in i128; only the sum can still overflow.
    let weighted_a = i128::from(level_a) * i128::from(size_a);
    let weighted_b = i128::from(level_b) * i128::from(size_b);
    let total = i128::from(total);
    let quotient = match weighted_a.checked_add(weighted_b) {
        Some(sum) => sum.div_euclid(total),
        None => {
            // floor((a + b) / t) = floor(a / t) + floor(b / t) + floor((a % t + b % t) / t)
            let remainders = weighted_a.rem_euclid(total) + weighted_b.rem_euclid(total);
            weighted_a.div_euclid(total)
                + weighted_b.div_euclid(total)
                + remainders.div_euclid(total)
        }
    };
    // A saturated `total` is the only way the quotient leaves the input range.
    let quotient = quotient.clamp(
        i128::from(level_a.min(level_b)),
        i128::from(level_a.max(level_b)),
    );
    i64::try_from(quotient).unwrap_or_else(|_| {
        warn!(level_a, size_a, level_b, size_b, "merged level out of range, saturating");
        i64::MAX
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────
