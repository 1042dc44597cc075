use core::result::Result;
use std::time::Duration;

use bevy::asset::io::Reader;
use bevy::asset::{AssetLoader, LoadContext};
use bevy::prelude::*;
use bevy::reflect::TypePath;
use bevy::tasks::ConditionalSendFuture;
use grammar_growth::prelude::{CostFunction, Generator, Schedule, SosmcConfig, SosmcRun};
use serde::{Deserialize, Serialize};

/// Asset describing the search parameters of a growth run.
///
/// Grammars and cost functions are code; this asset carries the tunable numbers
/// around them so they can be adjusted without recompiling.
#[derive(Asset, TypePath, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthSettingsAsset {
    pub start_rule: String,
    pub generations: usize,
    pub sample_count: Schedule,
    #[serde(default = "zero_schedule")]
    pub heuristic_scale: Schedule,
    #[serde(default = "default_burst_budget_ms")]
    pub burst_budget_ms: f64,
    #[serde(default)]
    pub seed: u64,
}

fn zero_schedule() -> Schedule {
    Schedule::Constant(0.0)
}

fn default_burst_budget_ms() -> f64 {
    8.0
}

impl GrowthSettingsAsset {
    /// Builds the run configuration; call [`SosmcConfig::validate`] before use.
    pub fn config(&self) -> SosmcConfig {
        let budget = Duration::try_from_secs_f64(self.burst_budget_ms.max(0.0) / 1000.0)
            .unwrap_or(Duration::ZERO);
        SosmcConfig::new(self.generations)
            .with_sample_count(self.sample_count.clone())
            .with_heuristic_scale(self.heuristic_scale.clone())
            .with_burst_budget(budget)
    }

    /// Prepares a run of `generator` from `start_rule`, seeded with `seed`.
    ///
    /// Fails when the start rule is unknown or the settings do not validate.
    pub fn sosmc_run<N, C>(
        &self,
        generator: &Generator<N>,
        cost_fn: C,
    ) -> grammar_growth::error::Result<SosmcRun<N>>
    where
        N: Clone + 'static,
        C: CostFunction<N> + Send + 'static,
    {
        generator.sosmc_run(&self.start_rule, self.config(), cost_fn, self.seed)
    }
}

/// Asset loader for [`GrowthSettingsAsset`] using RON files with `.growth.ron` extension.
#[derive(TypePath)]
pub struct GrowthSettingsAssetLoader;

impl AssetLoader for GrowthSettingsAssetLoader {
    type Asset = GrowthSettingsAsset;
    type Settings = ();
    type Error = anyhow::Error;

    fn extensions(&self) -> &[&str] {
        &["growth.ron"]
    }

    fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _context: &mut LoadContext,
    ) -> impl ConditionalSendFuture<Output = Result<Self::Asset, Self::Error>> {
        Box::pin(async move {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes).await?;
            let asset: GrowthSettingsAsset =
                ron::de::from_bytes(&bytes).map_err(|e| anyhow::anyhow!(e))?;
            Ok(asset)
        })
    }
}

impl FromWorld for GrowthSettingsAssetLoader {
    fn from_world(_: &mut World) -> Self {
        GrowthSettingsAssetLoader
    }
}
