//! Character reveal simulator
//!
//! Discloses already-produced content at a configurable rate. The
//! simulator owns only its cursor; the play flag, the rate and the current
//! generation token are read through `watch` receivers written by the
//! session driver. Each tick re-validates the token, so a loop whose task
//! was force-completed elsewhere exits without emitting anything.

use crate::token::{CurrentToken, GenerationToken};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Characters emitted per tick: `max(1, floor(rate / ticks_per_second))`
#[must_use]
pub fn chars_per_tick(rate_cps: u32, tick: Duration) -> usize {
    let per_tick = u128::from(rate_cps) * tick.as_millis() / 1000;
    usize::try_from(per_tick).unwrap_or(usize::MAX).max(1)
}

/// Next slice of revealed content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealChunk {
    /// Token the chunk was produced under
    pub token: GenerationToken,
    /// Characters disclosed by this tick
    pub text: String,
    /// Cursor after the chunk, in chars
    pub cursor: usize,
    /// Total source length, in chars
    pub len: usize,
}

impl RevealChunk {
    /// Progress after this chunk, 0-100
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.len == 0 {
            100.0
        } else {
            self.cursor as f64 / self.len as f64 * 100.0
        }
    }
}

/// Why a reveal loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealExit {
    /// Cursor reached the end of the content
    Finished,
    /// Token no longer current; nothing was mutated
    Stale,
    /// Cancelled or the receiver went away
    Cancelled,
}

/// Shared, read-only control inputs of a reveal loop
#[derive(Debug, Clone)]
pub struct RevealControl {
    token: GenerationToken,
    current: CurrentToken,
    playing: watch::Receiver<bool>,
    rate: watch::Receiver<u32>,
    cancel: CancellationToken,
}

impl RevealControl {
    /// Bundle control inputs for the loop owning `token`
    #[must_use]
    pub fn new(
        token: GenerationToken,
        current: CurrentToken,
        playing: watch::Receiver<bool>,
        rate: watch::Receiver<u32>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            token,
            current,
            playing,
            rate,
            cancel,
        }
    }

    /// Token owned by the loop
    #[inline]
    #[must_use]
    pub fn token(&self) -> GenerationToken {
        self.token
    }

    fn is_current(&self) -> bool {
        self.current.is_current(self.token)
    }

    fn is_playing(&self) -> bool {
        *self.playing.borrow()
    }

    fn rate(&self) -> u32 {
        *self.rate.borrow()
    }
}

/// Cursor over one task's content
#[derive(Debug, Clone)]
pub struct RevealSimulator {
    source: Vec<char>,
    cursor: usize,
    tick: Duration,
    poll: Duration,
}

impl RevealSimulator {
    /// Create simulator over `source`
    #[must_use]
    pub fn new(source: &str, tick: Duration, poll: Duration) -> Self {
        Self {
            source: source.chars().collect(),
            cursor: 0,
            tick,
            poll,
        }
    }

    /// Chars revealed so far
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Source length in chars
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Whether the source is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Whether the cursor reached the end
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.source.len()
    }

    /// Take up to `n` chars from the cursor and advance it
    pub fn advance(&mut self, n: usize) -> (String, usize) {
        let end = self.cursor.saturating_add(n).min(self.source.len());
        let text: String = self.source[self.cursor..end].iter().collect();
        self.cursor = end;
        (text, end)
    }

    /// Run until finished, stale or cancelled
    ///
    /// `emit` receives each chunk and returns `false` when nobody is
    /// listening any more. While paused the loop polls at the poll
    /// interval and resumes from the saved cursor.
    pub async fn run<F>(&mut self, ctl: &RevealControl, mut emit: F) -> RevealExit
    where
        F: FnMut(RevealChunk) -> bool,
    {
        loop {
            if ctl.cancel.is_cancelled() {
                return RevealExit::Cancelled;
            }
            if !ctl.is_current() {
                tracing::debug!(token = %ctl.token, cursor = self.cursor, "reveal stale");
                return RevealExit::Stale;
            }
            if self.is_finished() {
                return RevealExit::Finished;
            }

            let wait = if ctl.is_playing() { self.tick } else { self.poll };
            tokio::select! {
                () = ctl.cancel.cancelled() => return RevealExit::Cancelled,
                () = tokio::time::sleep(wait) => {}
            }

            if !ctl.is_current() {
                tracing::debug!(token = %ctl.token, cursor = self.cursor, "reveal stale after wait");
                return RevealExit::Stale;
            }
            if !ctl.is_playing() {
                continue;
            }

            let (text, cursor) = self.advance(chars_per_tick(ctl.rate(), self.tick));
            let chunk = RevealChunk {
                token: ctl.token,
                text,
                cursor,
                len: self.source.len(),
            };
            if !emit(chunk) {
                return RevealExit::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenCell;
    use tokio::time::Instant;

    struct Rig {
        cell: TokenCell,
        playing: watch::Sender<bool>,
        rate: watch::Sender<u32>,
        cancel: CancellationToken,
    }

    impl Rig {
        fn new(rate: u32) -> Self {
            Self {
                cell: TokenCell::new(),
                playing: watch::channel(true).0,
                rate: watch::channel(rate).0,
                cancel: CancellationToken::new(),
            }
        }

        fn control(&mut self) -> RevealControl {
            let token = self.cell.activate();
            RevealControl::new(
                token,
                self.cell.reader(),
                self.playing.subscribe(),
                self.rate.subscribe(),
                self.cancel.child_token(),
            )
        }
    }

    fn simulator(text: &str) -> RevealSimulator {
        RevealSimulator::new(text, Duration::from_millis(50), Duration::from_millis(250))
    }

    #[test]
    fn chars_per_tick_floors_with_minimum_one() {
        let tick = Duration::from_millis(50);
        assert_eq!(chars_per_tick(40, tick), 2);
        assert_eq!(chars_per_tick(45, tick), 2);
        assert_eq!(chars_per_tick(1, tick), 1);
        assert_eq!(chars_per_tick(1000, tick), 50);
    }

    #[test]
    fn advance_clamps_at_end() {
        let mut sim = simulator("abcde");
        assert_eq!(sim.advance(3), ("abc".to_string(), 3));
        assert_eq!(sim.advance(3), ("de".to_string(), 5));
        assert!(sim.is_finished());
        assert_eq!(sim.advance(3), (String::new(), 5));
    }

    #[tokio::test(start_paused = true)]
    async fn reveals_at_configured_rate() {
        let mut rig = Rig::new(40);
        let ctl = rig.control();
        let text = "x".repeat(200);
        let mut sim = simulator(&text);
        let mut revealed = String::new();
        let started = Instant::now();

        let exit = sim
            .run(&ctl, |chunk| {
                revealed.push_str(&chunk.text);
                true
            })
            .await;

        assert_eq!(exit, RevealExit::Finished);
        assert_eq!(revealed, text);
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_secs(5) && elapsed < Duration::from_millis(5050),
            "took {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_token_stops_without_emitting() {
        let mut rig = Rig::new(40);
        let ctl = rig.control();
        rig.cell.activate();
        let mut sim = simulator("abcdef");
        let mut emitted = 0;

        let exit = sim
            .run(&ctl, |_| {
                emitted += 1;
                true
            })
            .await;

        assert_eq!(exit, RevealExit::Stale);
        assert_eq!(emitted, 0);
        assert_eq!(sim.cursor(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_loop_emits_nothing_until_resumed() {
        let mut rig = Rig::new(40);
        let ctl = rig.control();
        rig.playing.send_replace(false);
        let playing = rig.playing;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            playing.send_replace(true);
        });

        let mut sim = simulator("abcd");
        let mut first_emit = None;
        let started = Instant::now();
        let exit = sim
            .run(&ctl, |_| {
                if first_emit.is_none() {
                    first_emit = Some(started.elapsed());
                }
                true
            })
            .await;

        assert_eq!(exit, RevealExit::Finished);
        let first = first_emit.unwrap();
        assert!(first >= Duration::from_secs(3), "emitted while paused at {first:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_and_closed_receiver_stop_the_loop() {
        let mut rig = Rig::new(40);
        let ctl = rig.control();
        rig.cancel.cancel();
        assert_eq!(simulator("abc").run(&ctl, |_| true).await, RevealExit::Cancelled);

        let mut rig = Rig::new(40);
        let ctl = rig.control();
        let mut sim = simulator("abcdef");
        assert_eq!(sim.run(&ctl, |_| false).await, RevealExit::Cancelled);
        assert_eq!(sim.cursor(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_source_finishes_immediately() {
        let mut rig = Rig::new(40);
        let ctl = rig.control();
        let exit = simulator("").run(&ctl, |_| panic!("nothing to emit")).await;
        assert_eq!(exit, RevealExit::Finished);
    }
}
