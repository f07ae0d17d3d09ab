// Level 2 definition.
use super::LevelDesc;

pub static LEVEL2_WORDS: [&str; 8] = [
    "Bismillah", "Alhamdulillah", "SubhanAllah", "Allahu Akbar", "Barakah", "Tawakkul",
    "Taqwa", "Dhikr",
];

static LEVEL2: LevelDesc = LevelDesc {
    id: 2,
    name: "Golden Horizon",
    tempo: "Bright",
    track: "Light of Noor",
    interval: 0.42,
    speed: 0.95,
    total_tiles: 50,
    audio: "/nasheeds/elrahed.mp3",
    words: &LEVEL2_WORDS,
};

pub fn level2() -> &'static LevelDesc {
    &LEVEL2
}
