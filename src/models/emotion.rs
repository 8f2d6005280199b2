use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

/// Number of emotion axes in an item profile
pub const EMOTION_DIMS: usize = 8;

/// Per-item emotion profile, indexed by `EmotionTag::index`
pub type EmotionVector = [f64; EMOTION_DIMS];

/// The eight Plutchik emotion axes, in table column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTag {
    Anger,
    Anticipation,
    Disgust,
    Fear,
    Joy,
    Sadness,
    Surprise,
    Trust,
}

impl EmotionTag {
    pub const ALL: [EmotionTag; EMOTION_DIMS] = [
        EmotionTag::Anger,
        EmotionTag::Anticipation,
        EmotionTag::Disgust,
        EmotionTag::Fear,
        EmotionTag::Joy,
        EmotionTag::Sadness,
        EmotionTag::Surprise,
        EmotionTag::Trust,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionTag::Anger => "anger",
            EmotionTag::Anticipation => "anticipation",
            EmotionTag::Disgust => "disgust",
            EmotionTag::Fear => "fear",
            EmotionTag::Joy => "joy",
            EmotionTag::Sadness => "sadness",
            EmotionTag::Surprise => "surprise",
            EmotionTag::Trust => "trust",
        }
    }
}

impl Display for EmotionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EmotionTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        EmotionTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == lowered)
            .ok_or_else(|| format!("unknown emotion tag '{}'", s))
    }
}

/// Qualitative weight for a discrete emotion input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLevel {
    Low,
    High,
    Ignore,
    Diverse,
}

/// Emotion input as submitted by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "weights", rename_all = "lowercase")]
pub enum EmotionTarget {
    Discrete(BTreeMap<EmotionTag, EmotionLevel>),
    Continuous(BTreeMap<EmotionTag, f64>),
}

/// Emotion input reduced to the axes that drive ranking and those left for diversification
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedEmotionTarget {
    pub specified: Vec<EmotionTag>,
    /// Target value per specified tag, same order as `specified`
    pub values: Vec<f64>,
    pub unspecified: Vec<EmotionTag>,
}

impl EmotionTarget {
    /// Splits the input into specified/unspecified axes in canonical tag order.
    ///
    /// Discrete `low`/`high` map to `low`/`high`; `ignore`, `diverse` and missing tags
    /// are unspecified. Continuous weights of zero (or missing) are unspecified.
    pub fn normalize(&self, low: f64, high: f64) -> NormalizedEmotionTarget {
        let mut normalized = NormalizedEmotionTarget::default();

        for tag in EmotionTag::ALL {
            let value = match self {
                EmotionTarget::Discrete(levels) => match levels.get(&tag) {
                    Some(EmotionLevel::Low) => Some(low),
                    Some(EmotionLevel::High) => Some(high),
                    Some(EmotionLevel::Ignore) | Some(EmotionLevel::Diverse) | None => None,
                },
                EmotionTarget::Continuous(weights) => {
                    weights.get(&tag).copied().filter(|w| *w != 0.0)
                }
            };

            match value {
                Some(v) => {
                    normalized.specified.push(tag);
                    normalized.values.push(v);
                }
                None => normalized.unspecified.push(tag),
            }
        }

        normalized
    }
}

impl NormalizedEmotionTarget {
    pub fn is_unspecified(&self) -> bool {
        self.specified.is_empty()
    }

    /// Projects a full profile onto the given tags
    pub fn project(profile: &EmotionVector, tags: &[EmotionTag]) -> Vec<f64> {
        tags.iter().map(|tag| profile[tag.index()]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_index_matches_column_order() {
        for (i, tag) in EmotionTag::ALL.iter().enumerate() {
            assert_eq!(tag.index(), i);
        }
        assert_eq!("Joy".parse::<EmotionTag>().unwrap(), EmotionTag::Joy);
        assert!("boredom".parse::<EmotionTag>().is_err());
    }

    #[test]
    fn test_discrete_normalization() {
        let mut levels = BTreeMap::new();
        levels.insert(EmotionTag::Joy, EmotionLevel::High);
        levels.insert(EmotionTag::Fear, EmotionLevel::Low);
        levels.insert(EmotionTag::Anger, EmotionLevel::Diverse);
        levels.insert(EmotionTag::Trust, EmotionLevel::Ignore);

        let normalized = EmotionTarget::Discrete(levels).normalize(0.3, 0.8);

        assert_eq!(normalized.specified, vec![EmotionTag::Fear, EmotionTag::Joy]);
        assert_eq!(normalized.values, vec![0.3, 0.8]);
        assert_eq!(normalized.unspecified.len(), 6);
        assert!(normalized.unspecified.contains(&EmotionTag::Anger));
        assert!(normalized.unspecified.contains(&EmotionTag::Trust));
    }

    #[test]
    fn test_continuous_zero_is_unspecified() {
        let mut weights = BTreeMap::new();
        weights.insert(EmotionTag::Sadness, 0.0);
        weights.insert(EmotionTag::Surprise, -0.4);

        let normalized = EmotionTarget::Continuous(weights).normalize(0.3, 0.8);

        assert_eq!(normalized.specified, vec![EmotionTag::Surprise]);
        assert_eq!(normalized.values, vec![-0.4]);
        assert!(normalized.unspecified.contains(&EmotionTag::Sadness));
    }

    #[test]
    fn test_target_serde_shape() {
        let json = r#"{"type":"discrete","weights":{"joy":"high","fear":"ignore"}}"#;
        let target: EmotionTarget = serde_json::from_str(json).unwrap();
        let normalized = target.normalize(0.3, 0.8);
        assert_eq!(normalized.specified, vec![EmotionTag::Joy]);
    }
}
