use crate::common::*;

/// The (sequence, subject, task) identifier triple naming one recorded run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombinationKey {
    pub sequence: u32,
    pub subject: u32,
    pub task: String,
}

impl CombinationKey {
    pub fn new(sequence: u32, subject: u32, task: impl Into<String>) -> Self {
        Self {
            sequence,
            subject,
            task: task.into(),
        }
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.sequence, self.subject, self.task)
    }
}

/// The configuration of a metadata index.
///
/// The identifier lists give the candidate values per axis,
/// `valid_combinations` is the reference set of runs that actually exist, and
/// `query_frame_offsets` selects the frames queried within each sequence
/// timeline. All fields are mandatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub sequence_ids: Vec<u32>,
    pub subject_ids: Vec<u32>,
    pub task_ids: Vec<String>,
    pub valid_combinations: Vec<CombinationKey>,
    pub query_frame_offsets: Vec<i64>,
}

impl MetadataConfig {
    /// Checks the identifier lists for duplicates and the offset list for
    /// strict monotonicity.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.sequence_ids.iter().all_unique(),
            "sequence_ids must not contain duplicates"
        );
        ensure!(
            self.subject_ids.iter().all_unique(),
            "subject_ids must not contain duplicates"
        );
        ensure!(
            self.task_ids.iter().all_unique(),
            "task_ids must not contain duplicates"
        );
        ensure!(
            self.query_frame_offsets
                .windows(2)
                .all(|pair| pair[0] < pair[1]),
            "query_frame_offsets must be strictly increasing"
        );
        Ok(())
    }

    /// The ordered list of valid triples drawn from the configured
    /// identifiers.
    pub fn filtered_combinations(&self) -> Vec<CombinationKey> {
        let valid: HashSet<_> = self.valid_combinations.iter().cloned().collect();
        filter_combinations(
            &self.sequence_ids,
            &self.subject_ids,
            &self.task_ids,
            &valid,
        )
    }
}

/// One indexable item of the single-frame gaze dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameEntry {
    pub key: CombinationKey,
    pub offset: i64,
}

/// One indexable item of the pairwise gaze dataset.
///
/// `next_offset` is the successor of `offset` in the configured offset list,
/// not necessarily `offset + 1` in absolute frame units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairedEntry {
    pub key: CombinationKey,
    pub offset: i64,
    pub next_offset: i64,
}

/// Computes the ordered list of valid (sequence, subject, task) triples.
///
/// The cross product iterates sequences in the outer loop and tasks in the
/// inner loop. Triples absent from `valid` are dropped while the order of the
/// remainder is preserved. An empty result is not an error.
pub fn filter_combinations(
    sequences: &[u32],
    subjects: &[u32],
    tasks: &[String],
    valid: &HashSet<CombinationKey>,
) -> Vec<CombinationKey> {
    iproduct!(sequences, subjects, tasks)
        .map(|(&sequence, &subject, task)| CombinationKey {
            sequence,
            subject,
            task: task.clone(),
        })
        .filter(|key| valid.contains(key))
        .collect()
}

/// Expands each triple into one entry per query frame offset.
///
/// The output iterates triples in the outer loop and offsets in the inner
/// loop; its length is `combinations.len() * offsets.len()`.
pub fn expand_single(combinations: &[CombinationKey], offsets: &[i64]) -> Vec<FrameEntry> {
    iproduct!(combinations, offsets)
        .map(|(key, &offset)| FrameEntry {
            key: key.clone(),
            offset,
        })
        .collect()
}

/// Expands each triple into one entry per adjacent offset pair.
///
/// The final offset of the list has no successor within the list and never
/// leads a pair; an offset list with fewer than two entries yields no output.
/// The output length is `combinations.len() * (offsets.len() - 1)`.
pub fn expand_pairwise(combinations: &[CombinationKey], offsets: &[i64]) -> Vec<PairedEntry> {
    combinations
        .iter()
        .flat_map(|key| {
            offsets.windows(2).map(move |pair| PairedEntry {
                key: key.clone(),
                offset: pair[0],
                next_offset: pair[1],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_list(tasks: &[&str]) -> Vec<String> {
        tasks.iter().map(|task| task.to_string()).collect()
    }

    fn valid_set(keys: &[CombinationKey]) -> HashSet<CombinationKey> {
        keys.iter().cloned().collect()
    }

    #[test]
    fn filter_preserves_cross_product_order() {
        let sequences = vec![6, 35];
        let subjects = vec![1, 2];
        let tasks = task_list(&["roadonly", "blurred"]);
        let valid = valid_set(&[
            CombinationKey::new(35, 1, "roadonly"),
            CombinationKey::new(6, 2, "blurred"),
            CombinationKey::new(6, 1, "roadonly"),
            // not in the candidate lists, must never appear
            CombinationKey::new(53, 1, "roadonly"),
        ]);

        let filtered = filter_combinations(&sequences, &subjects, &tasks, &valid);

        assert_eq!(
            filtered,
            vec![
                CombinationKey::new(6, 1, "roadonly"),
                CombinationKey::new(6, 2, "blurred"),
                CombinationKey::new(35, 1, "roadonly"),
            ]
        );
    }

    #[test]
    fn filter_of_disjoint_sets_is_empty() {
        let filtered = filter_combinations(
            &[1],
            &[1],
            &task_list(&["roadonly"]),
            &valid_set(&[CombinationKey::new(2, 2, "blurred")]),
        );
        assert!(filtered.is_empty());
    }

    #[test]
    fn single_expansion_is_triple_major() {
        let combinations = vec![
            CombinationKey::new(6, 1, "roadonly"),
            CombinationKey::new(35, 2, "blurred"),
        ];
        let offsets = vec![5, 10, 15];

        let entries = expand_single(&combinations, &offsets);

        assert_eq!(entries.len(), 6);
        assert_eq!(
            entries[0],
            FrameEntry {
                key: combinations[0].clone(),
                offset: 5
            }
        );
        assert_eq!(
            entries[5],
            FrameEntry {
                key: combinations[1].clone(),
                offset: 15
            }
        );
    }

    #[test]
    fn pairwise_expansion_pairs_adjacent_offsets() {
        let combinations = vec![CombinationKey::new(6, 1, "roadonly")];
        let offsets = vec![5, 10, 15];

        let entries = expand_pairwise(&combinations, &offsets);

        assert_eq!(
            entries,
            vec![
                PairedEntry {
                    key: combinations[0].clone(),
                    offset: 5,
                    next_offset: 10
                },
                PairedEntry {
                    key: combinations[0].clone(),
                    offset: 10,
                    next_offset: 15
                },
            ]
        );
        // the final offset never leads a pair
        assert!(entries.iter().all(|entry| entry.offset != 15));
    }

    #[test]
    fn pairwise_expansion_of_short_offset_list_is_empty() {
        let combinations = vec![
            CombinationKey::new(6, 1, "roadonly"),
            CombinationKey::new(35, 2, "blurred"),
        ];
        assert!(expand_pairwise(&combinations, &[]).is_empty());
        assert!(expand_pairwise(&combinations, &[5]).is_empty());
    }

    #[test]
    fn expansion_is_deterministic() {
        let config = MetadataConfig {
            sequence_ids: vec![6, 11, 35],
            subject_ids: vec![1, 2, 3],
            task_ids: task_list(&["roadonly", "blurred", "flipped"]),
            valid_combinations: vec![
                CombinationKey::new(11, 3, "flipped"),
                CombinationKey::new(6, 1, "roadonly"),
                CombinationKey::new(35, 2, "blurred"),
            ],
            query_frame_offsets: vec![15, 45, 75],
        };

        let first = expand_single(&config.filtered_combinations(), &config.query_frame_offsets);
        let second = expand_single(&config.filtered_combinations(), &config.query_frame_offsets);
        assert_eq!(first, second);

        let first = expand_pairwise(&config.filtered_combinations(), &config.query_frame_offsets);
        let second =
            expand_pairwise(&config.filtered_combinations(), &config.query_frame_offsets);
        assert_eq!(first, second);
    }

    #[test]
    fn validation_rejects_bad_config() {
        let config = MetadataConfig {
            sequence_ids: vec![6, 6],
            subject_ids: vec![1],
            task_ids: task_list(&["roadonly"]),
            valid_combinations: vec![],
            query_frame_offsets: vec![5, 10],
        };
        assert!(config.validate().is_err());

        let config = MetadataConfig {
            sequence_ids: vec![6],
            subject_ids: vec![1],
            task_ids: task_list(&["roadonly"]),
            valid_combinations: vec![],
            query_frame_offsets: vec![10, 10, 15],
        };
        assert!(config.validate().is_err());

        let config = MetadataConfig {
            sequence_ids: vec![6],
            subject_ids: vec![1],
            task_ids: task_list(&["roadonly"]),
            valid_combinations: vec![],
            query_frame_offsets: vec![5, 10, 15],
        };
        assert!(config.validate().is_ok());
    }
}
