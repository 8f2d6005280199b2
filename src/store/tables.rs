use std::{
    collections::{HashMap, HashSet},
    path::Path,
    str::FromStr,
};

use crate::error::{RecommenderError, RecommenderResult};
use crate::models::{AverageItemScore, EmotionTag, EmotionVector, ItemId, ItemPopularity};

/// Header-addressed rows of a comma-separated table
struct CsvRows {
    columns: HashMap<String, usize>,
    rows: Vec<(usize, Vec<String>)>,
}

impl CsvRows {
    fn parse(text: &str, required: &[&str]) -> RecommenderResult<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| RecommenderError::InvalidInput("empty table".to_string()))?;

        let columns: HashMap<String, usize> = header
            .split(',')
            .enumerate()
            .map(|(i, name)| (name.trim().trim_matches('"').to_lowercase(), i))
            .collect();

        for name in required {
            if !columns.contains_key(*name) {
                return Err(RecommenderError::InvalidInput(format!(
                    "missing column '{}'",
                    name
                )));
            }
        }

        let rows = lines
            .map(|(line_no, line)| {
                let fields = line
                    .split(',')
                    .map(|f| f.trim().trim_matches('"').to_string())
                    .collect();
                (line_no + 1, fields)
            })
            .collect();

        Ok(Self { columns, rows })
    }

    fn field<T: FromStr>(&self, line: usize, fields: &[String], name: &str) -> RecommenderResult<T> {
        let raw = self
            .columns
            .get(name)
            .and_then(|&idx| fields.get(idx))
            .ok_or_else(|| {
                RecommenderError::InvalidInput(format!("line {}: missing '{}' value", line, name))
            })?;
        raw.parse::<T>().map_err(|_| {
            RecommenderError::InvalidInput(format!(
                "line {}: invalid '{}' value '{}'",
                line, name, raw
            ))
        })
    }

    /// Item ids exported through float columns arrive as `"42.0"`
    fn item_id(&self, line: usize, fields: &[String]) -> RecommenderResult<ItemId> {
        if let Ok(id) = self.field::<ItemId>(line, fields, "item") {
            return Ok(id);
        }
        let value: f64 = self.field(line, fields, "item")?;
        if value >= 0.0 && value.fract() == 0.0 {
            Ok(value as ItemId)
        } else {
            Err(RecommenderError::InvalidInput(format!(
                "line {}: invalid item id {}",
                line, value
            )))
        }
    }
}

fn read_table(path: &Path) -> RecommenderResult<String> {
    Ok(std::fs::read_to_string(path)?)
}

fn check_duplicate(seen: &mut HashSet<ItemId>, item: ItemId) -> RecommenderResult<()> {
    if seen.insert(item) {
        Ok(())
    } else {
        Err(RecommenderError::InvalidInput(format!(
            "duplicate item {}",
            item
        )))
    }
}

/// Item popularity counts and dense ranks (`item,count,rank`)
#[derive(Debug, Clone, Default)]
pub struct PopularityTable {
    entries: HashMap<ItemId, ItemPopularity>,
    max_count: u64,
}

impl PopularityTable {
    pub fn load(path: &Path) -> RecommenderResult<Self> {
        Self::parse(&read_table(path)?)
    }

    pub fn parse(text: &str) -> RecommenderResult<Self> {
        let csv = CsvRows::parse(text, &["item", "count"])?;
        let has_rank = csv.columns.contains_key("rank");

        let mut counts = Vec::with_capacity(csv.rows.len());
        let mut ranks = Vec::with_capacity(csv.rows.len());
        for (line, fields) in &csv.rows {
            let item = csv.item_id(*line, fields)?;
            counts.push((item, csv.field::<u64>(*line, fields, "count")?));
            if has_rank {
                ranks.push(csv.field::<u64>(*line, fields, "rank")?);
            }
        }

        if !has_rank {
            return Self::from_counts(counts);
        }

        let entries = counts
            .into_iter()
            .zip(ranks)
            .map(|((item_id, count), rank)| ItemPopularity {
                item_id,
                count,
                rank,
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<ItemPopularity>) -> RecommenderResult<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut table = Self::default();
        for entry in entries {
            check_duplicate(&mut seen, entry.item_id)?;
            table.max_count = table.max_count.max(entry.count);
            table.entries.insert(entry.item_id, entry);
        }
        Ok(table)
    }

    /// Builds the table from raw counts, assigning dense ranks by descending count
    pub fn from_counts<I>(counts: I) -> RecommenderResult<Self>
    where
        I: IntoIterator<Item = (ItemId, u64)>,
    {
        let mut counts: Vec<(ItemId, u64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let mut entries = Vec::with_capacity(counts.len());
        let mut rank = 0;
        let mut previous = None;
        for (item_id, count) in counts {
            if previous != Some(count) {
                rank += 1;
                previous = Some(count);
            }
            entries.push(ItemPopularity {
                item_id,
                count,
                rank,
            });
        }
        Self::from_entries(entries)
    }

    pub fn get(&self, item: ItemId) -> Option<&ItemPopularity> {
        self.entries.get(&item)
    }

    pub fn max_count(&self) -> u64 {
        self.max_count
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Precomputed population-average scores (`item,ave_score,ave_discounted_score`)
#[derive(Debug, Clone, Default)]
pub struct AverageScoreTable {
    entries: HashMap<ItemId, AverageItemScore>,
}

impl AverageScoreTable {
    pub fn load(path: &Path) -> RecommenderResult<Self> {
        Self::parse(&read_table(path)?)
    }

    pub fn parse(text: &str) -> RecommenderResult<Self> {
        let csv = CsvRows::parse(text, &["item", "ave_score", "ave_discounted_score"])?;
        let mut entries = Vec::with_capacity(csv.rows.len());
        for (line, fields) in &csv.rows {
            entries.push(AverageItemScore {
                item_id: csv.item_id(*line, fields)?,
                ave_score: csv.field(*line, fields, "ave_score")?,
                ave_discounted_score: csv.field(*line, fields, "ave_discounted_score")?,
            });
        }
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<AverageItemScore>) -> RecommenderResult<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut table = Self::default();
        for entry in entries {
            check_duplicate(&mut seen, entry.item_id)?;
            table.entries.insert(entry.item_id, entry);
        }
        Ok(table)
    }

    pub fn get(&self, item: ItemId) -> Option<&AverageItemScore> {
        self.entries.get(&item)
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-item emotion profiles (`item` plus one column per emotion tag, values in [0, 1])
#[derive(Debug, Clone, Default)]
pub struct EmotionTable {
    entries: HashMap<ItemId, EmotionVector>,
}

impl EmotionTable {
    pub fn load(path: &Path) -> RecommenderResult<Self> {
        Self::parse(&read_table(path)?)
    }

    pub fn parse(text: &str) -> RecommenderResult<Self> {
        let mut required = vec!["item"];
        required.extend(EmotionTag::ALL.iter().map(|tag| tag.as_str()));
        let csv = CsvRows::parse(text, &required)?;

        let mut entries = Vec::with_capacity(csv.rows.len());
        for (line, fields) in &csv.rows {
            let item = csv.item_id(*line, fields)?;
            let mut profile = [0.0; 8];
            for tag in EmotionTag::ALL {
                profile[tag.index()] = csv.field(*line, fields, tag.as_str())?;
            }
            entries.push((item, profile));
        }
        Self::from_entries(entries)
    }

    pub fn from_entries<I>(entries: I) -> RecommenderResult<Self>
    where
        I: IntoIterator<Item = (ItemId, EmotionVector)>,
    {
        let mut table = Self::default();
        let mut seen = HashSet::new();
        for (item, profile) in entries {
            check_duplicate(&mut seen, item)?;
            if let Some(bad) = profile.iter().position(|v| !(0.0..=1.0).contains(v)) {
                return Err(RecommenderError::InvalidInput(format!(
                    "item {}: {} value {} outside [0, 1]",
                    item,
                    EmotionTag::ALL[bad],
                    profile[bad]
                )));
            }
            table.entries.insert(item, profile);
        }
        Ok(table)
    }

    pub fn get(&self, item: ItemId) -> Option<&EmotionVector> {
        self.entries.get(&item)
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
