//! Configuration of an analysis.

use crate::error::*;
use serde::{Deserialize, Serialize};

/// How heap allocations are grouped into abstract objects.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum HeapMergePolicy {
    /// Each allocation site has its own recent object and summary.
    PerSite,
    /// Every allocation site shares one recent object and one summary.
    Global,
}

/// How struct fields are laid out.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Packing {
    /// Fields follow each other with no padding.
    Compact,
    /// Fields are placed at their natural alignment, and aggregates are
    /// padded to a multiple of their largest alignment.
    Aligned,
}

/// Widths of the integer and pointer types.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum DataModel {
    /// 64-bit `long` and pointers.
    Lp64,
    /// 32-bit `int`, `long` and pointers.
    Ilp32,
}

/// Bounds and modelling choices for an analysis.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    max_call_depth: usize,
    step_fuel: usize,
    max_stores_per_point: usize,
    heap_merge_policy: HeapMergePolicy,
    packing: Packing,
    data_model: DataModel,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_call_depth: 64,
            step_fuel: 1_000_000,
            max_stores_per_point: 8,
            heap_merge_policy: HeapMergePolicy::PerSite,
            packing: Packing::Compact,
            data_model: DataModel::Lp64,
        }
    }
}

impl Config {
    /// Read a `Config` from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Config, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// The deepest call stack explored before a call returns `Top`.
    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// The number of machine steps an analysis may take.
    pub fn step_fuel(&self) -> usize {
        self.step_fuel
    }

    /// How many incomparable stores are kept apart at one program point
    /// before they are joined.
    pub fn max_stores_per_point(&self) -> usize {
        self.max_stores_per_point
    }

    pub fn heap_merge_policy(&self) -> HeapMergePolicy {
        self.heap_merge_policy
    }

    pub fn packing(&self) -> Packing {
        self.packing
    }

    pub fn data_model(&self) -> DataModel {
        self.data_model
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Config {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn with_step_fuel(mut self, step_fuel: usize) -> Config {
        self.step_fuel = step_fuel;
        self
    }

    pub fn with_max_stores_per_point(mut self, max_stores_per_point: usize) -> Config {
        self.max_stores_per_point = max_stores_per_point;
        self
    }

    pub fn with_heap_merge_policy(mut self, heap_merge_policy: HeapMergePolicy) -> Config {
        self.heap_merge_policy = heap_merge_policy;
        self
    }

    pub fn with_packing(mut self, packing: Packing) -> Config {
        self.packing = packing;
        self
    }

    pub fn with_data_model(mut self, data_model: DataModel) -> Config {
        self.data_model = data_model;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json() {
        let config = Config::from_json(r#"{"step_fuel": 10, "packing": "Aligned"}"#).unwrap();
        assert_eq!(config.step_fuel(), 10);
        assert_eq!(config.packing(), Packing::Aligned);
        assert_eq!(config.max_call_depth(), Config::default().max_call_depth());
        assert_eq!(
            config.max_stores_per_point(),
            Config::default().max_stores_per_point()
        );
    }

    #[test]
    fn bad_json() {
        assert!(Config::from_json(r#"{"packing": "Loose"}"#).is_err());
    }
}
