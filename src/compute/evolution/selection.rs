//! Survivor selection and offspring creation.
//!
//! The top K ranked models of a generation each receive `N / K` offspring
//! slots in rank order; the last survivor also takes the `N % K` leftover
//! slots, so the next generation always has exactly N slots.

use std::fs;
use std::io;

use log::{debug, info, warn};

use super::genome::{Mutator, NetworkRng, offspring_of};
use crate::schema::{ModelConfig, ModelRecord, MutationConfig};
use crate::storage::{StorageLayout, load_model_config, model_name, save_model_config};

/// Survivor rank index for each of `n` offspring slots, given `k` survivors.
pub fn apportion(n: usize, k: usize) -> Vec<usize> {
    let k = k.min(n);
    if k == 0 {
        return Vec::new();
    }
    let copies = n / k;
    (0..n).map(|slot| (slot / copies).min(k - 1)).collect()
}

/// Number of slots each survivor receives, indexed by rank.
pub fn copy_counts(n: usize, k: usize) -> Vec<usize> {
    let mut counts = vec![0; k.min(n)];
    for rank in apportion(n, k) {
        counts[rank] += 1;
    }
    counts
}

/// One offspring written to the next generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offspring {
    /// 1-based population slot.
    pub slot: usize,
    /// Identifier assigned to the offspring.
    pub model_id: String,
    /// Identifier of the survivor it was copied from.
    pub parent: String,
}

/// Outcome of populating a generation.
#[derive(Debug, Clone, Default)]
pub struct OffspringReport {
    /// Offspring successfully persisted.
    pub produced: Vec<Offspring>,
    /// Slots skipped because their survivor could not be loaded.
    pub skipped: Vec<usize>,
    /// Slots whose offspring could not be persisted.
    pub failed: Vec<usize>,
    /// Slots left untouched because a model was already present.
    pub kept: Vec<usize>,
}

impl OffspringReport {
    /// Offspring count per parent identifier, in first-seen order.
    pub fn counts_by_parent(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for child in &self.produced {
            match counts.iter_mut().find(|(p, _)| *p == child.parent) {
                Some((_, n)) => *n += 1,
                None => counts.push((child.parent.clone(), 1)),
            }
        }
        counts
    }
}

/// Copy-and-mutate policy that turns one ranked generation into the next.
#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    /// Slots in the next generation (N).
    pub population: usize,
    /// Survivors kept (K).
    pub retention: usize,
    /// Parameters handed to the mutator.
    pub mutation: MutationConfig,
}

impl SelectionPolicy {
    /// Populate generation `generation + 1` from the ranked records of `generation`.
    ///
    /// Survivor and offspring failures are logged and reported per slot; they
    /// never abort the remaining slots.
    pub fn populate_next_generation<C: ModelConfig>(
        &self,
        ranked: &[ModelRecord],
        layout: &StorageLayout,
        generation: usize,
        mutator: &dyn Mutator<C>,
        rng: &mut NetworkRng,
    ) -> OffspringReport {
        self.populate(ranked, layout, generation, mutator, rng, false)
    }

    /// Like [`populate_next_generation`](Self::populate_next_generation), but
    /// slots that already hold a model are left as they are.
    ///
    /// The random stream is consumed exactly as a full population would
    /// consume it, so the missing slots receive the same offspring an
    /// uninterrupted run writes.
    pub fn fill_next_generation<C: ModelConfig>(
        &self,
        ranked: &[ModelRecord],
        layout: &StorageLayout,
        generation: usize,
        mutator: &dyn Mutator<C>,
        rng: &mut NetworkRng,
    ) -> OffspringReport {
        self.populate(ranked, layout, generation, mutator, rng, true)
    }

    fn populate<C: ModelConfig>(
        &self,
        ranked: &[ModelRecord],
        layout: &StorageLayout,
        generation: usize,
        mutator: &dyn Mutator<C>,
        rng: &mut NetworkRng,
        keep_existing: bool,
    ) -> OffspringReport {
        let survivors = &ranked[..self.retention.min(ranked.len())];
        let next = generation + 1;

        // Each survivor is read once; every slot clones from this copy.
        let parents: Vec<Option<C>> = survivors
            .iter()
            .map(|record| {
                let path = layout.model_path(generation, &record.model_name);
                match load_model_config::<C>(&path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        warn!(
                            "Survivor {} could not be loaded, its slots are skipped: {}",
                            record.model_name, e
                        );
                        None
                    }
                }
            })
            .collect();

        let mut report = OffspringReport::default();
        for (index, rank) in apportion(self.population, survivors.len())
            .into_iter()
            .enumerate()
        {
            let slot = index + 1;
            let model_id = model_name(slot);
            let path = layout.model_path(next, &model_id);
            let exists = keep_existing && path.exists();

            let Some(parent) = &parents[rank] else {
                if exists {
                    report.kept.push(slot);
                    continue;
                }
                // A leftover file from an earlier attempt must not be evaluated.
                if let Err(e) = fs::remove_file(&path)
                    && e.kind() != io::ErrorKind::NotFound
                {
                    warn!("Stale offspring {} could not be removed: {}", path.display(), e);
                }
                report.skipped.push(slot);
                continue;
            };

            let mut child = offspring_of(parent, model_id.clone());
            mutator.mutate(
                &mut child,
                self.mutation.learning_rate,
                self.mutation.mutation_rate,
                rng,
            );
            if exists {
                report.kept.push(slot);
                continue;
            }

            match save_model_config(&child, &path) {
                Ok(()) => {
                    debug!(
                        "Offspring {} of {} saved to {}",
                        model_id,
                        parent.model_id(),
                        path.display()
                    );
                    report.produced.push(Offspring {
                        slot,
                        model_id,
                        parent: survivors[rank].model_name.clone(),
                    });
                }
                Err(e) => {
                    warn!("Offspring {} could not be saved: {}", model_id, e);
                    report.failed.push(slot);
                }
            }
        }

        info!(
            "Generation {} populated from {} survivors: {} offspring, {} kept, {} skipped, {} failed",
            next,
            survivors.len(),
            report.produced.len(),
            report.kept.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::genome::{ConfigFactory, DenseFactory, GaussianMutator};
    use crate::schema::{Activation, NetworkConfig, NetworkShape};
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_apportion_with_remainder() {
        // Remainder goes to the last retained survivor.
        assert_eq!(copy_counts(100, 3), vec![33, 33, 34]);
        let slots = apportion(100, 3);
        assert_eq!(slots[0], 0);
        assert_eq!(slots[32], 0);
        assert_eq!(slots[33], 1);
        assert_eq!(slots[66], 2);
        assert_eq!(slots[99], 2);
    }

    #[test]
    fn test_apportion_even() {
        assert_eq!(copy_counts(50, 5), vec![10; 5]);
        assert_eq!(copy_counts(10, 2), vec![5, 5]);
        assert_eq!(copy_counts(7, 7), vec![1; 7]);
        assert_eq!(copy_counts(7, 1), vec![7]);
    }

    #[test]
    fn test_apportion_degenerate() {
        assert!(apportion(0, 3).is_empty());
        assert!(apportion(5, 0).is_empty());
        // More survivors than slots: only the first n can reproduce.
        assert_eq!(copy_counts(2, 5), vec![1, 1]);
    }

    proptest! {
        #[test]
        fn prop_apportion_fills_every_slot(n in 1usize..500, k in 1usize..50) {
            let slots = apportion(n, k);
            prop_assert_eq!(slots.len(), n);
            // Non-decreasing rank order.
            prop_assert!(slots.windows(2).all(|w| w[0] <= w[1]));

            let k = k.min(n);
            let counts = copy_counts(n, k);
            prop_assert_eq!(counts.iter().sum::<usize>(), n);
            for &c in &counts[..k - 1] {
                prop_assert_eq!(c, n / k);
            }
            prop_assert_eq!(counts[k - 1], n / k + n % k);
        }
    }

    fn setup(population: usize) -> (tempfile::TempDir, StorageLayout, Vec<ModelRecord>) {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path(), "proj");
        layout.ensure_generation(0).unwrap();
        layout.ensure_generation(1).unwrap();

        let shape = NetworkShape {
            input_size: 4,
            output_size: 2,
            output_activations: vec![Activation::Softmax],
            hidden_layers: vec![3],
        };
        let mut rng = NetworkRng::new(1);
        let mut records = Vec::new();
        for slot in 1..=population {
            let id = model_name(slot);
            let net: NetworkConfig = DenseFactory.create_random(&shape, &id, "proj", &mut rng);
            save_model_config(&net, &layout.model_path(0, &id)).unwrap();
            records.push(ModelRecord::new(id, slot as f64 / 100.0));
        }
        records.reverse(); // best (highest slot) first
        (dir, layout, records)
    }

    fn policy(population: usize, retention: usize) -> SelectionPolicy {
        SelectionPolicy {
            population,
            retention,
            mutation: MutationConfig {
                learning_rate: 0.5,
                mutation_rate: 100.0,
            },
        }
    }

    #[test]
    fn test_populate_assigns_slots() {
        let (_dir, layout, ranked) = setup(10);
        let mut rng = NetworkRng::new(2);
        let report = policy(10, 2).populate_next_generation::<NetworkConfig>(
            &ranked,
            &layout,
            0,
            &GaussianMutator,
            &mut rng,
        );

        assert_eq!(report.produced.len(), 10);
        assert!(report.skipped.is_empty());
        assert_eq!(
            report.counts_by_parent(),
            vec![("model-10".to_string(), 5), ("model-9".to_string(), 5)]
        );
        for slot in 1..=10 {
            let child: NetworkConfig =
                load_model_config(&layout.model_path(1, &model_name(slot))).unwrap();
            assert_eq!(child.model_id(), model_name(slot));
        }
    }

    #[test]
    fn test_survivor_bytes_unchanged() {
        let (_dir, layout, ranked) = setup(4);
        let survivor_path = layout.model_path(0, &ranked[0].model_name);
        let before = fs::read(&survivor_path).unwrap();

        let mut rng = NetworkRng::new(3);
        let report = policy(4, 1).populate_next_generation::<NetworkConfig>(
            &ranked,
            &layout,
            0,
            &GaussianMutator,
            &mut rng,
        );
        assert_eq!(report.produced.len(), 4);

        assert_eq!(fs::read(&survivor_path).unwrap(), before);

        // Siblings are mutated independently.
        let a: NetworkConfig = load_model_config(&layout.model_path(1, "model-1")).unwrap();
        let b: NetworkConfig = load_model_config(&layout.model_path(1, "model-2")).unwrap();
        assert_ne!(a.layers, b.layers);
    }

    #[test]
    fn test_missing_survivor_skips_its_slots() {
        let (_dir, layout, ranked) = setup(6);
        fs::remove_file(layout.model_path(0, &ranked[1].model_name)).unwrap();

        let mut rng = NetworkRng::new(4);
        let report = policy(6, 3).populate_next_generation::<NetworkConfig>(
            &ranked,
            &layout,
            0,
            &GaussianMutator,
            &mut rng,
        );

        assert_eq!(report.skipped, vec![3, 4]);
        assert_eq!(report.produced.len(), 4);
        assert!(!layout.model_path(1, "model-3").exists());
        assert!(layout.model_path(1, "model-5").exists());
    }

    #[test]
    fn test_fill_matches_full_population() {
        let (_dir, layout, ranked) = setup(6);
        policy(6, 2).populate_next_generation::<NetworkConfig>(
            &ranked,
            &layout,
            0,
            &GaussianMutator,
            &mut NetworkRng::new(6),
        );
        let expected: Vec<Vec<u8>> = (1..=6)
            .map(|slot| fs::read(layout.model_path(1, &model_name(slot))).unwrap())
            .collect();

        // Slots 4..=6 lost, 1..=3 kept with a marker that must survive.
        for slot in 4..=6 {
            fs::remove_file(layout.model_path(1, &model_name(slot))).unwrap();
        }
        let mut first: NetworkConfig = load_model_config(&layout.model_path(1, "model-1")).unwrap();
        first.metadata.project_name = "marker".to_string();
        save_model_config(&first, &layout.model_path(1, "model-1")).unwrap();

        let report = policy(6, 2).fill_next_generation::<NetworkConfig>(
            &ranked,
            &layout,
            0,
            &GaussianMutator,
            &mut NetworkRng::new(6),
        );
        assert_eq!(report.kept, vec![1, 2, 3]);
        assert_eq!(report.produced.len(), 3);
        for slot in 4..=6 {
            let bytes = fs::read(layout.model_path(1, &model_name(slot))).unwrap();
            assert_eq!(bytes, expected[slot - 1]);
        }
        let kept: NetworkConfig = load_model_config(&layout.model_path(1, "model-1")).unwrap();
        assert_eq!(kept.metadata.project_name, "marker");
    }

    #[test]
    fn test_unwritable_namespace_reports_failures() {
        let (_dir, layout, ranked) = setup(3);
        fs::remove_dir_all(layout.generation_dir(1)).unwrap();

        let mut rng = NetworkRng::new(5);
        let report = policy(3, 1).populate_next_generation::<NetworkConfig>(
            &ranked,
            &layout,
            0,
            &GaussianMutator,
            &mut rng,
        );
        assert_eq!(report.failed, vec![1, 2, 3]);
        assert!(report.produced.is_empty());
    }
}
