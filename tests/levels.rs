// Catalog invariants for the built-in levels.
// Native-friendly: no wasm/browser APIs are touched.

use std::collections::HashSet;

use noor_tiles::levels::{self, LEAD_IN, LEVEL1_WORDS, LEVEL2_WORDS, LEVEL3_WORDS};

#[test]
fn catalog_ids_are_contiguous_from_one() {
    let ids: Vec<u32> = levels::levels().iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    for id in ids {
        assert_eq!(levels::level(id).map(|l| l.id), Some(id));
    }
    assert!(levels::level(0).is_none());
    assert!(levels::level(4).is_none());
}

#[test]
fn levels_get_harder_as_ids_increase() {
    let all = levels::levels();
    for pair in all.windows(2) {
        assert!(pair[1].interval < pair[0].interval, "{} is not denser", pair[1].name);
        assert!(pair[1].speed > pair[0].speed, "{} is not faster", pair[1].name);
        assert!(pair[1].total_tiles > pair[0].total_tiles);
    }
}

#[test]
fn descriptors_are_complete_and_unique() {
    let mut names = HashSet::new();
    let mut tracks = HashSet::new();
    for l in levels::levels() {
        assert!(names.insert(l.name), "duplicate level name {}", l.name);
        assert!(tracks.insert(l.audio), "duplicate audio for {}", l.name);
        assert!(!l.track.is_empty() && !l.tempo.is_empty());
        assert!(l.audio.starts_with("/nasheeds/") && l.audio.ends_with(".mp3"));
        assert!(l.interval > 0.0 && l.speed > 0.0);
    }
}

#[test]
fn word_lists_are_unique_and_non_empty() {
    for words in [&LEVEL1_WORDS[..], &LEVEL2_WORDS[..], &LEVEL3_WORDS[..]] {
        assert!(!words.is_empty());
        let mut seen = HashSet::new();
        for w in words {
            assert!(!w.trim().is_empty(), "blank word");
            assert!(seen.insert(*w), "duplicate word '{w}'");
        }
    }
}

#[test]
fn generated_charts_fit_the_playfield() {
    for l in levels::levels() {
        for seed in [0u64, 1, 0xDEAD_BEEF] {
            let chart = l.chart(seed, 4);
            assert_eq!(chart.len(), l.total_tiles);
            assert!(chart.max_lane().is_some_and(|m| m < 4));
            assert!(chart.events()[0].time >= LEAD_IN);
            let times: Vec<f64> = chart.events().iter().map(|e| e.time).collect();
            assert!(times.windows(2).all(|w| w[0] <= w[1]), "unsorted chart for {}", l.name);
        }
    }
}
