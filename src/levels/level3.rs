// Level 3 definition: fastest spacing, unlocked by three stars on level 2.
use super::LevelDesc;

pub static LEVEL3_WORDS: [&str; 10] = [
    "Ar-Rahman", "Ar-Rahim", "Al-Malik", "Al-Quddus", "As-Salam", "Al-Mu'min", "Al-Aziz",
    "Al-Wadud", "An-Nur", "Al-Hadi",
];

static LEVEL3: LevelDesc = LevelDesc {
    id: 3,
    name: "Star Caravan",
    tempo: "Fast",
    track: "Barakah Breeze",
    interval: 0.36,
    speed: 1.05,
    total_tiles: 60,
    audio: "/nasheeds/elsekat.mp3",
    words: &LEVEL3_WORDS,
};

pub fn level3() -> &'static LevelDesc {
    &LEVEL3
}
