// ============================================================
// Layer 4 — Data Loader Wiring
// ============================================================
// Connects a dataset and a collator to Burn's DataLoader:
//
//   Dataset<Sequence>
//       │
//       ▼
//   ShardedDataset   → this rank's slice when ddp is on
//       │               (rank, rank + world, rank + 2·world, ...)
//       ▼
//   PartialDataset   → cut to whole batches when drop_last is set
//       │
//       ▼
//   DataLoaderBuilder (batch_size, seeded shuffle, workers)
//
// Without drop_last the shard is padded by wrapping around to the
// start, so every rank sees the same number of samples.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::sync::Arc;

use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::{transform::PartialDataset, Dataset},
    },
    tensor::backend::Backend,
};

use crate::data::batcher::{CollatedBatch, Collator};
use crate::domain::options::TrainOptions;
use crate::domain::sequence::Sequence;

/// Strided view of one rank's share of a dataset.
pub struct ShardedDataset<D> {
    inner: D,
    rank: usize,
    world_size: usize,
    drop_last: bool,
}

impl<D: Dataset<Sequence>> ShardedDataset<D> {
    pub fn new(inner: D, rank: usize, world_size: usize, drop_last: bool) -> Self {
        Self { inner, rank, world_size: world_size.max(1), drop_last }
    }
}

impl<D: Dataset<Sequence>> Dataset<Sequence> for ShardedDataset<D> {
    fn get(&self, index: usize) -> Option<Sequence> {
        if index >= self.len() {
            return None;
        }
        let total = self.inner.len();
        self.inner.get((index * self.world_size + self.rank) % total)
    }

    fn len(&self) -> usize {
        let total = self.inner.len();
        if self.drop_last {
            total / self.world_size
        } else {
            total.div_ceil(self.world_size)
        }
    }
}

/// Build a loader over `dataset`. `shuffle` and `drop_last` mirror the
/// usual training/evaluation switches; sharding follows `options.ddp`.
pub fn build_data_loader<B, D>(
    dataset: D,
    collator: Collator<B>,
    options: &TrainOptions,
    shuffle: bool,
    drop_last: bool,
) -> Arc<dyn DataLoader<CollatedBatch<B>>>
where
    B: Backend,
    D: Dataset<Sequence> + 'static,
{
    let (rank, world_size) = if options.ddp { (options.rank, options.world_size) } else { (0, 1) };
    let sharded = ShardedDataset::new(dataset, rank, world_size, drop_last);

    let batch_size = options.batch_size.max(1);
    let usable = if drop_last {
        sharded.len() / batch_size * batch_size
    } else {
        sharded.len()
    };
    tracing::debug!(
        "Data loader: rank {}/{}, {} samples, batch size {}",
        rank,
        world_size,
        usable,
        batch_size
    );

    let mut builder = DataLoaderBuilder::new(collator)
        .batch_size(batch_size)
        .num_workers(options.num_workers.max(1));
    if shuffle {
        builder = builder.shuffle(options.seed);
    }
    builder.build(PartialDataset::new(sharded, 0, usable))
}
