// Level 1 definition: slow, wide spacing for first-time players.
use super::LevelDesc;

pub static LEVEL1_WORDS: [&str; 8] = [
    "Sabr", "Shukr", "Noor", "Salam", "Rahma", "Huda", "Iman", "Ihsan",
];

static LEVEL1: LevelDesc = LevelDesc {
    id: 1,
    name: "Moonlight Minarets",
    tempo: "Chill",
    track: "Sabr & Shukr",
    interval: 0.5,
    speed: 0.85,
    total_tiles: 40,
    audio: "/nasheeds/elheva.mp3",
    words: &LEVEL1_WORDS,
};

pub fn level1() -> &'static LevelDesc {
    &LEVEL1
}
