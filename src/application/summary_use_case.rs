// ============================================================
// Layer 2: SummaryUseCase
// ============================================================
// Prints the layer table for a configuration without allocating
// any tensors.

use anyhow::Result;

use crate::application::train_use_case::TrainConfig;

pub struct SummaryUseCase {
    config: TrainConfig,
}

impl SummaryUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn render(&self) -> Result<String> {
        Ok(self.config.plan()?.render_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::architecture::BlockStyle;

    #[test]
    fn test_summary_for_bottleneck_style() {
        let cfg = TrainConfig { stacks: 2, block_style: BlockStyle::Bottleneck, ..TrainConfig::default() };
        let table = SummaryUseCase::new(cfg).render().unwrap();
        assert_eq!(table.matches("bottleneck").count(), 6);
        assert!(table.contains("256 -> 10"));
    }

    #[test]
    fn test_summary_rejects_bad_plan() {
        let cfg = TrainConfig { filters: [16, 0, 64], ..TrainConfig::default() };
        assert!(SummaryUseCase::new(cfg).render().is_err());
    }
}
