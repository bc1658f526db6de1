//! Statistical table presets: which e-Stat table to query for an analysis
//! and how to parameterize the request.

use crate::error::{NowcastError, Result};
use crate::period::{Granularity, PeriodRange};
use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePreset {
    /// Filled from the catalog key
    #[serde(default)]
    pub id: String,
    pub label: String,
    /// e-Stat `statsDataId`
    pub stats_data_id: String,
    pub granularity: Granularity,
    /// Fixed query parameters (e.g. `cdTab`)
    #[serde(default)]
    pub default_params: BTreeMap<String, String>,
    /// Parameter that carries the classification code (e.g. `cdCat01`)
    #[serde(default)]
    pub classification_param: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl TablePreset {
    /// Query parameters for one request; the API key is added by the client.
    pub fn query_params(
        &self,
        code: &str,
        region: &Region,
        range: &PeriodRange,
    ) -> BTreeMap<String, String> {
        let mut params = self.default_params.clone();
        params.insert("statsDataId".to_string(), self.stats_data_id.clone());
        params.insert("cdArea".to_string(), region.code.clone());

        let (from, to) = range.estat_bounds(self.granularity);
        params.insert("cdTimeFrom".to_string(), from);
        params.insert("cdTimeTo".to_string(), to);

        if let Some(param) = &self.classification_param {
            params.insert(param.clone(), code.to_string());
        }
        params
    }
}

#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
    presets: BTreeMap<String, TablePreset>,
}

impl PresetCatalog {
    /// Parse a JSON object keyed by preset id.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, TablePreset> = serde_json::from_str(json)?;
        let presets = raw
            .into_iter()
            .map(|(id, mut preset)| {
                preset.id = id.clone();
                (id, preset)
            })
            .collect();
        Ok(Self { presets })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            NowcastError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn insert(&mut self, preset: TablePreset) {
        self.presets.insert(preset.id.clone(), preset);
    }

    pub fn get(&self, id: &str) -> Result<&TablePreset> {
        self.presets
            .get(id)
            .ok_or_else(|| NowcastError::UnknownPreset(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}
