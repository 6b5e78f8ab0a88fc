use crate::types::{ClassCode, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Semantic meaning of a quality class code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassCategory {
    /// Snow-free land
    Land,
    Snow,
    Cloud,
    Missing,
    /// Lake or inland water (including lake ice)
    InlandWater,
    Ocean,
    NoDecision,
    Night,
    /// Detector saturated
    Saturated,
    Fill,
}

impl ClassCategory {
    pub fn verdict(self) -> Verdict {
        match self {
            ClassCategory::Snow => Verdict::SnowValid,
            ClassCategory::Land => Verdict::LandValid,
            _ => Verdict::Invalid,
        }
    }
}

/// Injectable mapping from numeric class codes to categories.
///
/// The numbering differs between product collections, so nothing in the
/// engine hard-codes it. Codes missing from the table classify as invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTable {
    entries: BTreeMap<ClassCode, ClassCategory>,
}

impl ClassTable {
    /// Empty table; every code classifies as invalid
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ClassCode, ClassCategory)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Map a single code, returning the category it replaced
    pub fn insert(&mut self, code: ClassCode, category: ClassCategory) -> Option<ClassCategory> {
        self.entries.insert(code, category)
    }

    pub fn with_code(mut self, code: ClassCode, category: ClassCategory) -> Self {
        self.entries.insert(code, category);
        self
    }

    pub fn with_range(mut self, codes: RangeInclusive<ClassCode>, category: ClassCategory) -> Self {
        for code in codes {
            self.entries.insert(code, category);
        }
        self
    }

    pub fn category(&self, code: ClassCode) -> Option<ClassCategory> {
        self.entries.get(&code).copied()
    }

    /// All codes mapped to `category`, ascending
    pub fn codes_for(&self, category: ClassCategory) -> Vec<ClassCode> {
        self.entries
            .iter()
            .filter(|(_, c)| **c == category)
            .map(|(code, _)| *code)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// MODIS Collection 6 `NDSI_Snow_Cover` codes (MOD10A1 / MYD10A1).
    ///
    /// 0 is snow-free land, 1-100 carry an NDSI snow fraction and the
    /// 200-range codes are the product's flag values.
    pub fn modis_c6() -> Self {
        Self::new()
            .with_code(0, ClassCategory::Land)
            .with_range(1..=100, ClassCategory::Snow)
            .with_code(200, ClassCategory::Missing)
            .with_code(201, ClassCategory::NoDecision)
            .with_code(211, ClassCategory::Night)
            .with_code(237, ClassCategory::InlandWater)
            .with_code(239, ClassCategory::Ocean)
            .with_code(250, ClassCategory::Cloud)
            .with_code(254, ClassCategory::Saturated)
            .with_code(255, ClassCategory::Fill)
    }

    /// MODIS Collection 5 `Snow_Cover_Daily_Tile` codes
    pub fn modis_c5() -> Self {
        Self::new()
            .with_code(0, ClassCategory::Missing)
            .with_code(1, ClassCategory::NoDecision)
            .with_code(11, ClassCategory::Night)
            .with_code(25, ClassCategory::Land)
            .with_code(37, ClassCategory::InlandWater)
            .with_code(39, ClassCategory::Ocean)
            .with_code(50, ClassCategory::Cloud)
            .with_code(100, ClassCategory::InlandWater) // lake ice
            .with_code(200, ClassCategory::Snow)
            .with_code(254, ClassCategory::Saturated)
            .with_code(255, ClassCategory::Fill)
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::modis_c6()
    }
}

/// Maps class codes to verdicts through a precomputed lookup table
#[derive(Debug, Clone)]
pub struct QualityClassifier {
    lookup: [Verdict; 256],
}

impl QualityClassifier {
    pub fn new(table: &ClassTable) -> Self {
        let mut lookup = [Verdict::Invalid; 256];
        for (code, category) in &table.entries {
            lookup[*code as usize] = category.verdict();
        }

        let snow = lookup.iter().filter(|v| **v == Verdict::SnowValid).count();
        let land = lookup.iter().filter(|v| **v == Verdict::LandValid).count();
        log::debug!(
            "Quality classifier: {} snow codes, {} land codes, {} flagged codes",
            snow,
            land,
            table.len() - snow - land
        );

        Self { lookup }
    }

    #[inline]
    pub fn classify(&self, code: ClassCode) -> Verdict {
        self.lookup[code as usize]
    }

    /// Classify a code read from a wider integer raster; codes outside the
    /// table's 0..=255 range are `Invalid`
    #[inline]
    pub fn classify_wide(&self, code: i64) -> Verdict {
        ClassCode::try_from(code).map_or(Verdict::Invalid, |code| self.classify(code))
    }

    /// Lowest code that classifies as `Invalid`, if the table leaves one
    pub fn invalid_code(&self) -> Option<ClassCode> {
        (0..=ClassCode::MAX).find(|code| self.classify(*code) == Verdict::Invalid)
    }
}

impl Default for QualityClassifier {
    fn default() -> Self {
        Self::new(&ClassTable::default())
    }
}
