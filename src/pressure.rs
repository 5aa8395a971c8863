//! Load curves.
//!
//! A [`Pressure`] answers one question: how much load is wanted `elapsed`
//! after the run started. Under the concurrency discipline the quantity is
//! the number of requests kept in flight; under throughput it is the number
//! of requests issued per tick.

use std::{sync::Arc, time::Duration};

use snafu::ensure;

use crate::config::{ConfigError, InvalidPressureSnafu};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pressure {
    /// Ramps linearly from 0 to `quantity` over `ramp_up`, then stays flat
    /// until `duration` has elapsed.
    Fixed {
        quantity: usize,
        duration: Duration,
        ramp_up: Duration,
    },
    /// Starts at `initial` and moves toward `last` by `increment_per_step`
    /// every step. Once reached, `last` is held for one step.
    Gradient {
        initial: usize,
        last: usize,
        increment_per_step: usize,
        duration_per_step: Duration,
    },
    /// Step `i` holds `quantities[i]`.
    Custom {
        quantities: Arc<[usize]>,
        duration_per_step: Duration,
    },
}

impl Pressure {
    pub fn fixed(quantity: usize, duration: Duration) -> Result<Self, ConfigError> {
        Self::fixed_with_ramp_up(quantity, duration, Duration::ZERO)
    }

    pub fn fixed_with_ramp_up(
        quantity: usize,
        duration: Duration,
        ramp_up: Duration,
    ) -> Result<Self, ConfigError> {
        ensure!(
            !duration.is_zero(),
            InvalidPressureSnafu {
                details: "duration must be positive"
            }
        );
        ensure!(
            ramp_up <= duration,
            InvalidPressureSnafu {
                details: format!(
                    "ramp-up ({}s) exceeds duration ({}s)",
                    ramp_up.as_secs_f64(),
                    duration.as_secs_f64()
                )
            }
        );
        Ok(Pressure::Fixed {
            quantity,
            duration,
            ramp_up,
        })
    }

    pub fn gradient(
        initial: usize,
        last: usize,
        increment_per_step: usize,
        duration_per_step: Duration,
    ) -> Result<Self, ConfigError> {
        ensure!(
            increment_per_step > 0,
            InvalidPressureSnafu {
                details: "increment per step must be positive"
            }
        );
        ensure!(
            !duration_per_step.is_zero(),
            InvalidPressureSnafu {
                details: "duration per step must be positive"
            }
        );
        let steps = initial
            .abs_diff(last)
            .div_ceil(increment_per_step)
            .checked_add(1);
        ensure!(
            steps.is_some_and(|steps| u32::try_from(steps).is_ok()),
            InvalidPressureSnafu {
                details: format!(
                    "{initial} to {last} by {increment_per_step} needs more than {} steps",
                    u32::MAX
                )
            }
        );
        Ok(Pressure::Gradient {
            initial,
            last,
            increment_per_step,
            duration_per_step,
        })
    }

    pub fn custom(
        quantities: impl Into<Arc<[usize]>>,
        duration_per_step: Duration,
    ) -> Result<Self, ConfigError> {
        let quantities = quantities.into();
        ensure!(
            !quantities.is_empty(),
            InvalidPressureSnafu {
                details: "at least one quantity is required"
            }
        );
        ensure!(
            u32::try_from(quantities.len()).is_ok(),
            InvalidPressureSnafu {
                details: format!("at most {} quantities are supported", u32::MAX)
            }
        );
        ensure!(
            !duration_per_step.is_zero(),
            InvalidPressureSnafu {
                details: "duration per step must be positive"
            }
        );
        Ok(Pressure::Custom {
            quantities,
            duration_per_step,
        })
    }

    /// Wanted load at `elapsed`; 0 once [`Pressure::total_duration`] has passed.
    pub fn current_quantity(&self, elapsed: Duration) -> usize {
        match self {
            Pressure::Fixed {
                quantity,
                duration,
                ramp_up,
            } => {
                if elapsed >= *duration {
                    0
                } else if elapsed < *ramp_up {
                    (*quantity as u128 * elapsed.as_nanos() / ramp_up.as_nanos()) as usize
                } else {
                    *quantity
                }
            }
            Pressure::Gradient {
                initial,
                last,
                increment_per_step,
                duration_per_step,
            } => {
                let step = step_index(elapsed, *duration_per_step);
                if step >= self.step_count() {
                    return 0;
                }
                let moved = increment_per_step.saturating_mul(step);
                if last >= initial {
                    initial.saturating_add(moved).min(*last)
                } else {
                    initial.saturating_sub(moved).max(*last)
                }
            }
            Pressure::Custom {
                quantities,
                duration_per_step,
            } => quantities
                .get(step_index(elapsed, *duration_per_step))
                .copied()
                .unwrap_or(0),
        }
    }

    pub fn total_duration(&self) -> Duration {
        match self {
            Pressure::Fixed { duration, .. } => *duration,
            Pressure::Gradient {
                duration_per_step, ..
            }
            | Pressure::Custom {
                duration_per_step, ..
            } => duration_per_step
                .saturating_mul(u32::try_from(self.step_count()).unwrap_or(u32::MAX)),
        }
    }

    fn step_count(&self) -> usize {
        match self {
            Pressure::Fixed { .. } => 1,
            Pressure::Gradient {
                initial,
                last,
                increment_per_step,
                ..
            } => initial
                .abs_diff(*last)
                .div_ceil((*increment_per_step).max(1))
                .saturating_add(1),
            Pressure::Custom { quantities, .. } => quantities.len(),
        }
    }
}

fn step_index(elapsed: Duration, step: Duration) -> usize {
    elapsed
        .as_nanos()
        .checked_div(step.as_nanos())
        .and_then(|index| usize::try_from(index).ok())
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn fixed_ramps_up_then_holds_then_stops() {
        let pressure = Pressure::fixed_with_ramp_up(10, secs(10), secs(5)).unwrap();
        let observed: Vec<_> = (0..12)
            .map(|t| pressure.current_quantity(secs(t)))
            .collect();
        assert_eq!(observed, [0, 2, 4, 6, 8, 10, 10, 10, 10, 10, 0, 0]);
        assert_eq!(pressure.total_duration(), secs(10));
    }

    #[test]
    fn fixed_without_ramp_up_starts_at_full_quantity() {
        let pressure = Pressure::fixed(3, secs(2)).unwrap();
        assert_eq!(pressure.current_quantity(Duration::ZERO), 3);
        assert_eq!(pressure.current_quantity(Duration::from_millis(1999)), 3);
        assert_eq!(pressure.current_quantity(secs(2)), 0);
    }

    #[test]
    fn gradient_climbs_and_holds_the_last_quantity_one_step() {
        let pressure = Pressure::gradient(10, 25, 10, secs(2)).unwrap();
        let observed: Vec<_> = (0..10)
            .map(|t| pressure.current_quantity(secs(t)))
            .collect();
        assert_eq!(observed, [10, 10, 20, 20, 25, 25, 0, 0, 0, 0]);
        assert_eq!(pressure.total_duration(), secs(6));
    }

    #[test]
    fn gradient_may_descend() {
        let pressure = Pressure::gradient(5, 1, 2, secs(1)).unwrap();
        let observed: Vec<_> = (0..5)
            .map(|t| pressure.current_quantity(secs(t)))
            .collect();
        assert_eq!(observed, [5, 3, 1, 0, 0]);
    }

    #[test]
    fn custom_follows_each_step_then_stops() {
        let pressure = Pressure::custom(vec![1usize, 4, 2], secs(1)).unwrap();
        let observed: Vec<_> = (0..5)
            .map(|t| pressure.current_quantity(secs(t)))
            .collect();
        assert_eq!(observed, [1, 4, 2, 0, 0]);
        assert_eq!(pressure.total_duration(), secs(3));
    }

    #[test]
    fn gradients_too_long_to_schedule_are_rejected() {
        for last in [usize::MAX, 1 << 32] {
            assert!(
                matches!(
                    Pressure::gradient(0, last, 1, secs(1)),
                    Err(ConfigError::InvalidPressure { .. })
                ),
                "{last}"
            );
        }

        let widest = Pressure::gradient(0, u32::MAX as usize - 1, 1, secs(1)).unwrap();
        assert_eq!(widest.total_duration(), secs(u32::MAX as u64));
    }

    #[test]
    fn directly_built_gradients_do_not_overflow() {
        let pressure = Pressure::Gradient {
            initial: 0,
            last: usize::MAX,
            increment_per_step: 0,
            duration_per_step: Duration::ZERO,
        };
        assert_eq!(pressure.total_duration(), Duration::ZERO);
        assert_eq!(pressure.current_quantity(secs(1)), 0);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let cases = [
            Pressure::fixed(1, Duration::ZERO),
            Pressure::fixed_with_ramp_up(1, secs(1), secs(2)),
            Pressure::gradient(1, 5, 0, secs(1)),
            Pressure::gradient(1, 5, 1, Duration::ZERO),
            Pressure::custom(Vec::<usize>::new(), secs(1)),
            Pressure::custom(vec![1usize], Duration::ZERO),
        ];
        for case in cases {
            assert!(
                matches!(case, Err(ConfigError::InvalidPressure { .. })),
                "{case:?}"
            );
        }
    }
}
