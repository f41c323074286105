//! Static articulation reference for the Mandarin phoneme inventory.

use serde::Serialize;
use speakflow_schema::{Difficulty, ExpectedSound};

/// Retroflex initials. A problem with any of these triggers the tongue-curl reminder.
pub const RETROFLEX: [&str; 4] = ["zh", "ch", "sh", "r"];

/// Rounded front vowel marker shared by `ü`, `üan` and friends.
pub const ROUNDED_FRONT_VOWEL: char = 'ü';

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideEntry {
    pub symbol: &'static str,
    pub name: &'static str,
    pub common_mistakes: &'static [&'static str],
    pub tip: &'static str,
    pub difficulty: Difficulty,
    pub similar: &'static str,
}

impl GuideEntry {
    pub fn is_common_mistake(&self, produced: &str) -> bool {
        self.common_mistakes.contains(&produced)
    }

    pub fn to_expected_sound(&self) -> ExpectedSound {
        ExpectedSound {
            name: self.name.to_string(),
            common_mistakes: self
                .common_mistakes
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tip: self.tip.to_string(),
            difficulty: self.difficulty,
            similar: self.similar.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToneEntry {
    pub number: u8,
    pub name: &'static str,
    pub symbol: &'static str,
    pub tip: &'static str,
}

static PHONEME_GUIDE: [GuideEntry; 20] = [
    // Initials
    GuideEntry {
        symbol: "zh",
        name: "zh (like \"j\" in \"jump\")",
        common_mistakes: &["z", "j", "ch"],
        tip: "Curl your tongue back and touch the roof of your mouth. It's a retroflex sound.",
        difficulty: Difficulty::Hard,
        similar: "Similar to English \"j\" in \"jerk\" but with tongue curled back",
    },
    GuideEntry {
        symbol: "ch",
        name: "ch (like \"ch\" in \"church\")",
        common_mistakes: &["c", "q", "sh"],
        tip: "Curl your tongue back, similar to zh but with more air.",
        difficulty: Difficulty::Hard,
        similar: "Like English \"ch\" in \"church\" but tongue curled back",
    },
    GuideEntry {
        symbol: "sh",
        name: "sh (like \"sh\" in \"ship\")",
        common_mistakes: &["s", "x"],
        tip: "Curl your tongue back, let air flow smoothly.",
        difficulty: Difficulty::Medium,
        similar: "Like English \"sh\" but with tongue curled back",
    },
    GuideEntry {
        symbol: "r",
        name: "r (buzzing sound)",
        common_mistakes: &["l", "y"],
        tip: "Curl tongue back and vibrate/buzz while saying it. It's NOT like English \"r\".",
        difficulty: Difficulty::VeryHard,
        similar: "NOT like English \"r\" - more like buzzing with tongue curled back",
    },
    GuideEntry {
        symbol: "z",
        name: "z (like \"ds\" in \"reads\")",
        common_mistakes: &["zh", "s"],
        tip: "Tongue flat, teeth together, vibrate air through.",
        difficulty: Difficulty::Easy,
        similar: "Like English \"ds\" in \"reads\"",
    },
    GuideEntry {
        symbol: "c",
        name: "c (like \"ts\" in \"cats\")",
        common_mistakes: &["ch", "s"],
        tip: "Tongue flat, make a sharp \"ts\" sound.",
        difficulty: Difficulty::Easy,
        similar: "Like English \"ts\" in \"cats\"",
    },
    GuideEntry {
        symbol: "s",
        name: "s (like \"s\" in \"sun\")",
        common_mistakes: &["sh", "x"],
        tip: "Tongue flat, teeth close, hiss.",
        difficulty: Difficulty::Easy,
        similar: "Like English \"s\" in \"sun\"",
    },
    GuideEntry {
        symbol: "x",
        name: "x (like \"sh\" in \"sheep\")",
        common_mistakes: &["s", "sh"],
        tip: "Tongue forward, lips spread, whisper \"sh\".",
        difficulty: Difficulty::Medium,
        similar: "Between English \"sh\" and \"s\", lips spread wide",
    },
    GuideEntry {
        symbol: "q",
        name: "q (like \"ch\" in \"cheese\")",
        common_mistakes: &["ch", "j"],
        tip: "Tongue forward, make sharp \"ch\" with lips spread.",
        difficulty: Difficulty::Medium,
        similar: "Like English \"ch\" in \"cheese\" but sharper, lips spread",
    },
    GuideEntry {
        symbol: "j",
        name: "j (like \"j\" in \"jeep\")",
        common_mistakes: &["zh", "z"],
        tip: "Tongue forward, soft \"j\" sound with lips spread.",
        difficulty: Difficulty::Medium,
        similar: "Like English \"j\" in \"jeep\" but softer, lips spread",
    },
    // Finals
    GuideEntry {
        symbol: "ü",
        name: "ü (like German ü)",
        common_mistakes: &["u", "i"],
        tip: "Say \"ee\" but round your lips like \"oo\".",
        difficulty: Difficulty::Hard,
        similar: "Like French \"u\" or German \"ü\" - say \"ee\" with rounded lips",
    },
    GuideEntry {
        symbol: "uan",
        name: "uan",
        common_mistakes: &["an", "uang"],
        tip: "Say \"oo-ah-n\" smoothly in one syllable.",
        difficulty: Difficulty::Medium,
        similar: "Combine \"oo\" + \"ah\" + \"n\" quickly",
    },
    GuideEntry {
        symbol: "üan",
        name: "üan",
        common_mistakes: &["uan", "yan"],
        tip: "Say \"yoo-ah-n\" with rounded lips.",
        difficulty: Difficulty::Hard,
        similar: "Like uan but start with rounded \"ü\" sound",
    },
    GuideEntry {
        symbol: "er",
        name: "er (retroflex)",
        common_mistakes: &["e", "r"],
        tip: "Curl tongue back while saying \"er\".",
        difficulty: Difficulty::VeryHard,
        similar: "English \"er\" in \"her\" but tongue curled way back",
    },
    GuideEntry {
        symbol: "eng",
        name: "eng",
        common_mistakes: &["en", "ing"],
        tip: "Say \"uh\" then \"ng\" (from back of throat).",
        difficulty: Difficulty::Medium,
        similar: "Like \"ung\" in \"sung\" but with \"e\" sound",
    },
    GuideEntry {
        symbol: "ong",
        name: "ong",
        common_mistakes: &["eng", "ang"],
        tip: "Round lips, say \"oong\" from back of throat.",
        difficulty: Difficulty::Medium,
        similar: "Like \"own\" + \"ng\" sound",
    },
    GuideEntry {
        symbol: "ian",
        name: "ian",
        common_mistakes: &["an", "in"],
        tip: "Say \"ee-ah-n\" quickly.",
        difficulty: Difficulty::Easy,
        similar: "Like \"yen\" but longer",
    },
    GuideEntry {
        symbol: "iang",
        name: "iang",
        common_mistakes: &["ang", "ian"],
        tip: "Say \"ee-ah-ng\" quickly.",
        difficulty: Difficulty::Medium,
        similar: "Like \"yang\" in English",
    },
    GuideEntry {
        symbol: "uang",
        name: "uang",
        common_mistakes: &["ang", "uan"],
        tip: "Say \"oo-ah-ng\" smoothly.",
        difficulty: Difficulty::Medium,
        similar: "Like \"wang\" but start with clear \"oo\"",
    },
    GuideEntry {
        symbol: "iong",
        name: "iong",
        common_mistakes: &["ong", "ing"],
        tip: "Say \"ee-oong\" with rounded lips.",
        difficulty: Difficulty::Hard,
        similar: "Combine \"yoong\" in one syllable",
    },
];

static TONE_GUIDE: [ToneEntry; 5] = [
    ToneEntry {
        number: 1,
        name: "First tone (flat high)",
        symbol: "ˉ",
        tip: "Stay high and level, like singing a high note",
    },
    ToneEntry {
        number: 2,
        name: "Second tone (rising)",
        symbol: "ˊ",
        tip: "Rise from middle to high, like asking \"what?\"",
    },
    ToneEntry {
        number: 3,
        name: "Third tone (dip)",
        symbol: "ˇ",
        tip: "Start low, dip lower, rise slightly. Like saying \"oh...\" in surprise",
    },
    ToneEntry {
        number: 4,
        name: "Fourth tone (falling)",
        symbol: "ˋ",
        tip: "Fall sharply from high to low, like saying \"no!\" firmly",
    },
    ToneEntry {
        number: 5,
        name: "Neutral tone",
        symbol: "·",
        tip: "Short and light, no particular pitch",
    },
];

pub fn lookup(symbol: &str) -> Option<&'static GuideEntry> {
    PHONEME_GUIDE.iter().find(|entry| entry.symbol == symbol)
}

pub fn entries() -> &'static [GuideEntry] {
    &PHONEME_GUIDE
}

/// Tones are numbered 1..=4, with 5 for the neutral tone.
pub fn tone_guide(number: u8) -> Option<&'static ToneEntry> {
    TONE_GUIDE.iter().find(|tone| tone.number == number)
}

pub fn tones() -> &'static [ToneEntry] {
    &TONE_GUIDE
}

pub fn is_retroflex(symbol: &str) -> bool {
    RETROFLEX.contains(&symbol)
}

pub fn has_rounded_front_vowel(symbol: &str) -> bool {
    symbol.contains(ROUNDED_FRONT_VOWEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn lookup_finds_retroflex_initial() {
        let entry = lookup("zh").unwrap();
        assert_eq!(entry.difficulty, Difficulty::Hard);
        assert!(entry.is_common_mistake("z"));
        assert!(!entry.is_common_mistake("zh"));
    }

    #[test]
    fn lookup_unknown_symbol_is_none() {
        assert!(lookup("th").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn symbols_are_unique() {
        let symbols: HashSet<_> = entries().iter().map(|e| e.symbol).collect();
        assert_eq!(symbols.len(), entries().len());
    }

    #[test]
    fn tone_guide_covers_one_through_five() {
        for n in 1..=5 {
            assert_eq!(tone_guide(n).unwrap().number, n);
        }
        assert!(tone_guide(0).is_none());
        assert!(tone_guide(6).is_none());
    }

    #[test]
    fn rounded_front_vowel_detection() {
        assert!(has_rounded_front_vowel("üan"));
        assert!(!has_rounded_front_vowel("uan"));
        assert!(is_retroflex("r"));
        assert!(!is_retroflex("z"));
    }

    #[test]
    fn expected_sound_copies_entry() {
        let sound = lookup("er").unwrap().to_expected_sound();
        assert_eq!(sound.common_mistakes, vec!["e", "r"]);
        assert_eq!(sound.difficulty, Difficulty::VeryHard);
    }
}
