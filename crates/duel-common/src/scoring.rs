pub const BASE_POINTS: u32 = 1000;
pub const MAX_SPEED_BONUS: u32 = 100;
/// Streak length that earns the one-shot level-up signal.
pub const LEVEL_UP_STREAK: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub points_earned: u32,
    pub new_streak: u32,
    pub level_up: bool,
}

/// `floor(remaining / limit * 100)`, clamped to the limit.
pub fn speed_bonus(time_remaining_secs: u32, time_limit_secs: u32) -> u32 {
    if time_limit_secs == 0 {
        return 0;
    }
    let remaining = time_remaining_secs.min(time_limit_secs);
    remaining * MAX_SPEED_BONUS / time_limit_secs
}

/// Score one answer. A timeout is scored as `is_correct = false`.
///
/// The streak multiplier `1 + streak * 0.1` is applied in tenths so the
/// floor is exact: `floor((1000 + bonus) * (10 + streak) / 10)`.
pub fn score_answer(
    time_remaining_secs: u32,
    time_limit_secs: u32,
    prior_streak: u32,
    is_correct: bool,
) -> ScoreOutcome {
    if !is_correct {
        return ScoreOutcome {
            points_earned: 0,
            new_streak: 0,
            level_up: false,
        };
    }

    let new_streak = prior_streak.saturating_add(1);
    let base = u64::from(BASE_POINTS + speed_bonus(time_remaining_secs, time_limit_secs));
    let points = base * (10 + u64::from(new_streak)) / 10;

    ScoreOutcome {
        points_earned: u32::try_from(points).unwrap_or(u32::MAX),
        new_streak,
        level_up: new_streak == LEVEL_UP_STREAK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_incorrect_resets_streak() {
        let out = score_answer(10, 15, 7, false);
        assert_eq!(out.points_earned, 0);
        assert_eq!(out.new_streak, 0);
        assert!(!out.level_up);
    }

    #[test]
    fn test_full_time_third_in_a_row() {
        let out = score_answer(15, 15, 2, true);
        assert_eq!(speed_bonus(15, 15), 100);
        assert_eq!(out.new_streak, 3);
        assert_eq!(out.points_earned, 1430);
        assert!(out.level_up);
    }

    #[test]
    fn test_first_correct_answer() {
        // bonus floor(7/15*100) = 46, multiplier 1.1
        let out = score_answer(7, 15, 0, true);
        assert_eq!(out.points_earned, 1150);
        assert_eq!(out.new_streak, 1);
        assert!(!out.level_up);
    }

    #[test]
    fn test_no_time_left_still_scores_base() {
        let out = score_answer(0, 15, 0, true);
        assert_eq!(out.points_earned, 1100);
    }

    #[test]
    fn test_level_up_only_on_crossing() {
        let mut streak = 0;
        let mut level_ups = 0;
        for _ in 0..6 {
            let out = score_answer(10, 15, streak, true);
            streak = out.new_streak;
            if out.level_up {
                level_ups += 1;
            }
        }
        assert_eq!(streak, 6);
        assert_eq!(level_ups, 1);

        // Reset and climb again: a fresh crossing fires again.
        let reset = score_answer(10, 15, streak, false);
        assert_eq!(reset.new_streak, 0);
        let mut streak = reset.new_streak;
        let mut fired = false;
        for _ in 0..3 {
            let out = score_answer(10, 15, streak, true);
            streak = out.new_streak;
            fired |= out.level_up;
        }
        assert!(fired);
    }

    #[test]
    fn test_speed_bonus_edge_cases() {
        assert_eq!(speed_bonus(20, 15), 100);
        assert_eq!(speed_bonus(5, 0), 0);
        assert_eq!(speed_bonus(1, 3), 33);
    }

    proptest! {
        #[test]
        fn prop_points_monotonic_in_time_remaining(
            limit in 1u32..120,
            a in 0u32..120,
            b in 0u32..120,
            streak in 0u32..50,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let p_lo = score_answer(lo, limit, streak, true).points_earned;
            let p_hi = score_answer(hi, limit, streak, true).points_earned;
            prop_assert!(p_lo <= p_hi);
        }

        #[test]
        fn prop_points_monotonic_in_streak(
            limit in 1u32..120,
            remaining in 0u32..120,
            s1 in 0u32..100,
            s2 in 0u32..100,
        ) {
            let (lo, hi) = if s1 <= s2 { (s1, s2) } else { (s2, s1) };
            let p_lo = score_answer(remaining, limit, lo, true).points_earned;
            let p_hi = score_answer(remaining, limit, hi, true).points_earned;
            prop_assert!(p_lo <= p_hi);
        }

        #[test]
        fn prop_scoring_is_deterministic(
            limit in 1u32..120,
            remaining in 0u32..120,
            streak in 0u32..100,
            correct in any::<bool>(),
        ) {
            prop_assert_eq!(
                score_answer(remaining, limit, streak, correct),
                score_answer(remaining, limit, streak, correct)
            );
        }
    }
}
