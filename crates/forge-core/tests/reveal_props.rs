//! Property tests for reveal ordering and token issuance.

use forge_core::{
    chars_per_tick, ContentBuffer, RevealControl, RevealExit, RevealSimulator, TokenCell,
    TokenIssuer,
};
use proptest::prelude::*;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

fn run_reveal(source: &str, rate: u32, tick_ms: u64) -> (Vec<(String, usize)>, RevealExit) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async {
        let mut cell = TokenCell::new();
        let token = cell.activate();
        let (_playing_tx, playing) = watch::channel(true);
        let (_rate_tx, rate_rx) = watch::channel(rate);
        let ctl = RevealControl::new(token, cell.reader(), playing, rate_rx, CancellationToken::new());

        let mut simulator = RevealSimulator::new(
            source,
            Duration::from_millis(tick_ms),
            Duration::from_millis(250),
        );
        let mut chunks = Vec::new();
        let exit = simulator
            .run(&ctl, |chunk| {
                chunks.push((chunk.text, chunk.cursor));
                true
            })
            .await;
        (chunks, exit)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reveal_is_an_exact_prefix_at_every_tick(
        source in "\\PC{0,300}",
        rate in 1u32..800,
        tick_ms in 10u64..200,
    ) {
        let (chunks, exit) = run_reveal(&source, rate, tick_ms);
        prop_assert_eq!(exit, RevealExit::Finished);

        let per_tick = chars_per_tick(rate, Duration::from_millis(tick_ms));
        let mut buffer = ContentBuffer::new();
        buffer.set_generated(source.clone(), source.clone()).unwrap();

        for (text, cursor) in &chunks {
            let len = text.chars().count();
            prop_assert!(len >= 1 && len <= per_tick);
            prop_assert!(buffer.append_reveal(text, *cursor).is_ok());
            prop_assert!(source.starts_with(buffer.revealed()));
        }
        prop_assert_eq!(buffer.revealed(), source.as_str());
    }

    #[test]
    fn issued_tokens_strictly_increase(count in 1usize..200) {
        let mut issuer = TokenIssuer::new();
        let tokens: Vec<_> = (0..count).map(|_| issuer.issue()).collect();
        prop_assert!(tokens.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn only_the_latest_activation_is_current(activations in 1usize..50) {
        let mut cell = TokenCell::new();
        let reader = cell.reader();
        let tokens: Vec<_> = (0..activations).map(|_| cell.activate()).collect();
        let (last, earlier) = tokens.split_last().unwrap();
        prop_assert!(reader.is_current(*last));
        prop_assert!(earlier.iter().all(|token| !reader.is_current(*token)));
    }
}
