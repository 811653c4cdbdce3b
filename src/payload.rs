//! The slip payload serialized into the `message` column.
//!
//! The store itself never looks inside `message`; this codec is for the
//! collaborators that compose and render slips.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

// Ref: https://en.wikipedia.org/wiki/O-mikuji (ordered by the extent of fortune)
// Great blessing (大吉, dai-kichi)
// Middle blessing (中吉, chū-kichi)
// Small blessing (小吉, shō-kichi)
// Blessing (吉, kichi)
// Half-blessing (半吉, han-kichi)
// Future blessing (末吉, sue-kichi)
// Future small blessing (末小吉, sue-shō-kichi)
// Curse (凶, kyō)
// Small curse (小凶, shō-kyō)
// Half-curse (半凶, han-kyō)
// Future curse (末凶, sue-kyō)
// Great curse (大凶, dai-kyō)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
pub enum OmikujiClass {
    GreatBlessing,
    MiddleBlessing,
    SmallBlessing,
    Blessing,
    HalfBlessing,
    FutureBlessing,
    FutureSmallBlessing,
    Curse,
    SmallCurse,
    HalfCurse,
    FutureCurse,
    GreatCurse,
    Other,
}

// Ref: https://en.wikipedia.org/wiki/O-mikuji (only selected part of the more relevant ones)
// hōgaku (方角) - auspicious/inauspicious directions (see feng shui)
// negaigoto (願事) – one's wish or desire
// machibito (待人) – a person being waited for
// usemono (失せ物) – lost article(s)
// tabidachi (旅立ち) – travel
// akinai (商い) – business dealings
// gakumon (学問) – studies or learning
// arasoigoto (争事) – disputes
// ren'ai (恋愛) – romantic relationships
// byōki (病気) – illness
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
pub enum OmikujiSection {
    FortuneDirection,
    Desire,
    PersonWaitedFor,
    LostArticle,
    Travel,
    Business,
    Study,
    Dispute,
    Love,
    Illness,
    Other,
}

/// A slip under composition or decoded from storage. Every field is optional
/// until the collaborator finishes composing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OmikujiMessage {
    pub class: Option<OmikujiClass>,
    pub description: Option<String>,
    pub sections: Vec<(OmikujiSection, String)>,
}

impl OmikujiMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl fmt::Display for OmikujiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = String::new();
        if let Some(class) = &self.class {
            text += format!("*{}*\n", class).as_str();
        }
        if let Some(description) = &self.description {
            text += format!("{}\n", description).as_str();
        }
        for (section_name, description) in &self.sections {
            text += format!("\n*{}*: {}", section_name, description).as_str();
        }
        write!(f, "{}", text)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn json_round_trip() {
        let slip = OmikujiMessage {
            class: Some(OmikujiClass::SmallBlessing),
            description: Some("A quiet week ahead".into()),
            sections: vec![
                (OmikujiSection::Travel, "Stay close to home".into()),
                (OmikujiSection::Study, "A good time to start".into()),
            ],
        };
        let encoded = slip.to_json().unwrap();
        assert_eq!(OmikujiMessage::from_json(&encoded).unwrap(), slip);
    }

    #[test]
    fn class_and_section_names_round_trip() {
        for class in OmikujiClass::iter() {
            assert_eq!(
                OmikujiClass::from_str(&class.to_string()).unwrap(),
                class
            );
        }
        assert_eq!(
            OmikujiSection::from_str("Travel").unwrap(),
            OmikujiSection::Travel
        );
        assert!(OmikujiSection::from_str("NoSuchSection").is_err());
    }

    #[test]
    fn renders_markdown_summary() {
        let slip = OmikujiMessage {
            class: Some(OmikujiClass::GreatBlessing),
            description: Some("Everything aligns".into()),
            sections: vec![(OmikujiSection::Love, "An old friend writes".into())],
        };
        let rendered = slip.to_string();
        assert!(rendered.starts_with("*GreatBlessing*\n"));
        assert!(rendered.contains("Everything aligns"));
        assert!(rendered.contains("*Love*: An old friend writes"));
    }

    #[test]
    fn empty_slip_renders_empty() {
        assert_eq!(OmikujiMessage::default().to_string(), "");
    }
}
