/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::time::Duration;

/// Evaluate the given expression while a wall clock runs, returning `(elapsed, value)`.
///
/// The expression is evaluated exactly once, in place, so `?` and early returns inside it
/// behave as they would without the macro. If the expression returns early, no time is
/// reported.
///
/// ```rust
/// let (elapsed, value) = hnswbench_runner::timed!(2 + 2);
/// assert_eq!(value, 4);
/// assert!(elapsed.as_secs_f64() >= 0.0);
/// ```
#[macro_export]
macro_rules! timed {
    ($($exprs:tt)*) => {{
        let start = ::std::time::Instant::now();
        let result = $($exprs)*;
        let elapsed: ::std::time::Duration = start.elapsed();
        (elapsed, result)
    }}
}

/// Conversion to fractional seconds, the unit every persisted timing uses.
pub trait AsSeconds {
    fn as_seconds(&self) -> f64;
}

impl AsSeconds for Duration {
    fn as_seconds(&self) -> f64 {
        self.as_secs_f64()
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    fn fallible(fail: bool) -> Result<u32, &'static str> {
        if fail {
            Err("failed")
        } else {
            Ok(7)
        }
    }

    fn propagate(fail: bool) -> Result<(Duration, u32), &'static str> {
        let (elapsed, value) = timed!(fallible(fail)?);
        Ok((elapsed, value))
    }

    #[test]
    fn test_timed_macro() {
        let (elapsed, value) = timed!({
            std::thread::sleep(Duration::from_millis(2));
            "done"
        });
        assert_eq!(value, "done");
        assert!(elapsed >= Duration::from_millis(2));

        // `?` inside the timed expression propagates to the enclosing function.
        assert_eq!(propagate(false).unwrap().1, 7);
        assert_eq!(propagate(true).unwrap_err(), "failed");
    }

    #[test]
    fn test_as_seconds() {
        assert_eq!(Duration::from_micros(1_500_000).as_seconds(), 1.5);
        assert_eq!(Duration::ZERO.as_seconds(), 0.0);
    }
}
