use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::{RawSample, TouchSurface};

/// Poll cadence while waiting on the panel.
const POLL_INTERVAL_MS: u32 = 10;

/// Collapses a physical press-and-release into one discrete reading.
///
/// The panel is polled until pressed, a single sample is taken, and the
/// sampler then waits for the release before handing the sample back.
/// One gesture therefore yields exactly one reading no matter how long
/// the finger stays down, and the surface is guaranteed released when
/// the caller resumes.
pub struct TouchSampler<T>
where
    T: TouchSurface,
{
    surface: T,
}

impl<T> TouchSampler<T>
where
    T: TouchSurface,
{
    pub fn new(surface: T) -> Self {
        Self { surface }
    }

    /// Raw access for callers that want to watch the panel without the
    /// press/release latch (e.g. a live coordinate echo).
    pub fn surface_mut(&mut self) -> &mut T {
        &mut self.surface
    }

    /// Waits for one tap and returns its raw reading.
    ///
    /// `Ok(None)` means no press arrived within `timeout`. The timeout
    /// only bounds the wait for the press; once a finger is down, the
    /// release wait is unbounded. A second call has no memory of an
    /// already-released press and waits for the next rising edge.
    pub fn wait_for_tap<D>(
        &mut self,
        delay: &mut D,
        timeout: Option<Duration>,
    ) -> Result<Option<RawSample>, T::Error>
    where
        D: DelayNs,
    {
        let mut polls_left = timeout.map(|t| t.as_millis() as u32 / POLL_INTERVAL_MS);

        while !self.surface.is_pressed()? {
            if let Some(left) = polls_left.as_mut() {
                if *left == 0 {
                    return Ok(None);
                }
                *left -= 1;
            }
            delay.delay_ms(POLL_INTERVAL_MS);
        }

        let sample = self.surface.read_raw()?;

        // Latch until release so rapid re-presses cannot smear into
        // this gesture.
        while self.surface.is_pressed()? {
            delay.delay_ms(POLL_INTERVAL_MS);
        }

        Ok(Some(sample))
    }

    /// Waits for a tap and discards the reading ("Tap to Start").
    pub fn wait_for_any<D>(&mut self, delay: &mut D) -> Result<(), T::Error>
    where
        D: DelayNs,
    {
        self.wait_for_tap(delay, None).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopDelay;

    impl DelayNs for NoopDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    /// Replays a fixed pressed/released waveform; every `read_raw`
    /// consumes the next scripted sample.
    struct ScriptedSurface {
        presses: &'static [bool],
        samples: &'static [RawSample],
        press_cursor: usize,
        sample_cursor: usize,
    }

    impl ScriptedSurface {
        fn new(presses: &'static [bool], samples: &'static [RawSample]) -> Self {
            Self {
                presses,
                samples,
                press_cursor: 0,
                sample_cursor: 0,
            }
        }
    }

    impl TouchSurface for ScriptedSurface {
        type Error = core::convert::Infallible;

        fn is_pressed(&mut self) -> Result<bool, Self::Error> {
            let pressed = self.presses.get(self.press_cursor).copied().unwrap_or(false);
            self.press_cursor += 1;
            Ok(pressed)
        }

        fn read_raw(&mut self) -> Result<RawSample, Self::Error> {
            let sample = self.samples[self.sample_cursor];
            self.sample_cursor += 1;
            Ok(sample)
        }
    }

    const SAMPLE_A: RawSample = RawSample {
        x: 1000,
        y: 2000,
        pressure: 900,
    };
    const SAMPLE_B: RawSample = RawSample {
        x: 3000,
        y: 500,
        pressure: 700,
    };

    #[test]
    fn one_gesture_yields_one_sample() {
        // Held for three polls: still a single reading, taken at the
        // rising edge.
        let surface = ScriptedSurface::new(&[false, true, true, true, false], &[SAMPLE_A]);
        let mut sampler = TouchSampler::new(surface);

        let got = sampler.wait_for_tap(&mut NoopDelay, None).unwrap();
        assert_eq!(got, Some(SAMPLE_A));
        // The wait consumed the whole press, including the release.
        assert_eq!(sampler.surface.press_cursor, 5);
        assert_eq!(sampler.surface.sample_cursor, 1);
    }

    #[test]
    fn consecutive_taps_need_fresh_rising_edges() {
        let surface = ScriptedSurface::new(
            &[true, false, false, true, false],
            &[SAMPLE_A, SAMPLE_B],
        );
        let mut sampler = TouchSampler::new(surface);

        assert_eq!(
            sampler.wait_for_tap(&mut NoopDelay, None).unwrap(),
            Some(SAMPLE_A)
        );
        // The second call skips the idle gap and picks up the next tap.
        assert_eq!(
            sampler.wait_for_tap(&mut NoopDelay, None).unwrap(),
            Some(SAMPLE_B)
        );
    }

    #[test]
    fn times_out_when_nothing_is_pressed() {
        let surface = ScriptedSurface::new(&[], &[]);
        let mut sampler = TouchSampler::new(surface);

        let got = sampler
            .wait_for_tap(&mut NoopDelay, Some(Duration::from_millis(50)))
            .unwrap();
        assert_eq!(got, None);
        // 50 ms at a 10 ms cadence: five idle polls, then one more
        // check that exhausts the budget.
        assert_eq!(sampler.surface.press_cursor, 6);
    }

    #[test]
    fn timeout_does_not_cut_a_press_short() {
        // Press arrives on the last allowed poll; the held phase may
        // outlive the timeout freely.
        let surface = ScriptedSurface::new(&[false, true, true, true, false], &[SAMPLE_A]);
        let mut sampler = TouchSampler::new(surface);

        let got = sampler
            .wait_for_tap(&mut NoopDelay, Some(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(got, Some(SAMPLE_A));
    }
}
