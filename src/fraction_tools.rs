//! Tools for reading fractions as written musical durations.

use fraction::Fraction;

use crate::Duration;

/// True if `num` can serve as the numerator of a written note:
/// its binary form is a run of ones followed by zeros
/// (1, 2, 3, 4, 6, 7, 8, 12, 14, 15...).
fn is_assignable_integer(num: u64) -> bool {
    if num == 0 {
        return false;
    }
    let stripped = num >> num.trailing_zeros();
    stripped & (stripped + 1) == 0
}

/// True if the duration can be notated as a single, possibly dotted,
/// notehead.
///
/// # Example
/// ```
/// # use fraction::Fraction;
/// # use metrum::fraction_tools::is_assignable;
/// assert!(is_assignable(Fraction::new(3u64, 8u64)));
/// assert!(is_assignable(Fraction::new(7u64, 16u64)));
/// assert!(!is_assignable(Fraction::new(5u64, 8u64)));
/// assert!(!is_assignable(Fraction::new(1u64, 5u64)));
/// ```
pub fn is_assignable(duration: Duration) -> bool {
    if duration.is_sign_negative() {
        return false;
    }
    let (num, den) = match (duration.numer(), duration.denom()) {
        (Some(num), Some(den)) => (*num, *den),
        _ => return false,
    };
    num != 0 && num < den * 16 && den.is_power_of_two() && is_assignable_integer(num)
}

/// Count of augmentation dots on the written note.
///
/// # Returns
/// None for durations which can not be written as one notehead.
///
/// # Example
/// ```
/// # use fraction::Fraction;
/// # use metrum::fraction_tools::dot_count;
/// assert_eq!(dot_count(Fraction::new(1u64, 4u64)), Some(0));
/// assert_eq!(dot_count(Fraction::new(3u64, 8u64)), Some(1));
/// assert_eq!(dot_count(Fraction::new(7u64, 8u64)), Some(2));
/// assert_eq!(dot_count(Fraction::new(5u64, 8u64)), None);
/// ```
pub fn dot_count(duration: Duration) -> Option<u32> {
    if !is_assignable(duration) {
        return None;
    }
    let num = *duration.numer()?;
    Some((num >> num.trailing_zeros()).count_ones() - 1)
}

/// Number of flags (or beams) the written duration carries:
/// 0 down to a quarter, 1 for an eighth, 3 for a thirty-second.
pub fn flag_count(duration: Duration) -> u32 {
    assert!(
        Fraction::from(0.0) < duration,
        "flag count is defined for positive durations only, got {duration}"
    );
    let half = Fraction::new(1u64, 2u64);
    let mut bound = Fraction::new(1u64, 4u64);
    let mut count = 0;
    while duration < bound {
        count += 1;
        bound = bound * half;
    }
    count
}

/// Prime factors in ascending order. 1 yields an empty list.
pub fn prime_factors(mut num: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    let mut prime = 2;
    while prime * prime <= num {
        while num % prime == 0 {
            factors.push(prime);
            num /= prime;
        }
        prime += 1;
    }
    if num > 1 {
        factors.push(num);
    }
    factors
}

/// Factor list driving meter subdivision: prime factors, with a leading
/// pair of 2s merged into a single 4.
pub fn meter_factors(num: u64) -> Vec<u64> {
    let mut factors = prime_factors(num);
    if factors.len() > 1 && factors[0] == 2 && factors[1] == 2 {
        factors.splice(0..2, [4]);
    }
    factors
}

/// Decompose a prime larger than 3 into a 3 and as many 2s as needed:
/// descending by default (7 gives [3, 2, 2]), ascending when
/// `increase_monotonic` is set ([2, 2, 3]).
pub fn prime_parts(factor: u64, increase_monotonic: bool) -> Vec<u64> {
    let mut parts = vec![3];
    let mut total = 3;
    while total < factor {
        if increase_monotonic {
            parts.insert(0, 2);
        } else {
            parts.push(2);
        }
        total += 2;
    }
    parts
}
