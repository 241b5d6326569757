/// Duplicate file detection from names and sizes only.
///
/// No file content is ever read, so matching is a ladder of metadata
/// heuristics, each with a fixed confidence:
///
/// | Tier | Criterion | Confidence |
/// |---|---|---|
/// | `NameAndSize` | same name after copy-marker stripping, same size | 90 |
/// | `NormalizedName` | same case-folded, copy-stripped stem and extension | 70 |
/// | `SimilarName` | same size and extension, stem similarity ≥ threshold | 60 |
/// | `SizeOnly` | same size, neither name carries any signal | 40 |
///
/// Every matching pair becomes an edge; connected components of two or
/// more files are reported as groups, labelled with the strongest tier
/// among their edges. Zero-byte files never match on size alone.
use super::names::{canonical_name, has_name_signal, loose_stem, similarity, split_name};
use crate::model::{Item, ItemId, ItemStore};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Default minimum stem similarity for [`MatchTier::SimilarName`].
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Which heuristic matched a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MatchTier {
    NameAndSize,
    NormalizedName,
    SimilarName,
    SizeOnly,
}

impl MatchTier {
    /// Fixed confidence, in percent.
    pub fn confidence(self) -> u8 {
        match self {
            Self::NameAndSize => 90,
            Self::NormalizedName => 70,
            Self::SimilarName => 60,
            Self::SizeOnly => 40,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NameAndSize => "Name + Size",
            Self::NormalizedName => "Similar Names",
            Self::SimilarName => "Size + Similar Name",
            Self::SizeOnly => "Same Size",
        }
    }

    fn stronger(self, other: Self) -> Self {
        if other.confidence() > self.confidence() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Files believed to hold the same content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    /// Member ids, sorted. Always at least two.
    pub members: Vec<ItemId>,
    pub method: MatchTier,
    /// Percent, fixed by `method`.
    pub confidence: u8,
    /// The copy worth keeping: most recently modified, then largest,
    /// then smallest id.
    pub retained: ItemId,
    /// Total size of every member except `retained`.
    pub wasted_bytes: u64,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members other than the retained one.
    pub fn redundant(&self) -> impl Iterator<Item = &ItemId> + '_ {
        self.members.iter().filter(move |id| **id != self.retained)
    }
}

/// Multi-tier duplicate matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateDetector {
    similarity_threshold: f64,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Per-file keys computed once up front.
struct Candidate<'a> {
    item: &'a Item,
    size: u64,
    canonical: String,
    loose: String,
    /// Lowercased canonical name with its extension, for edit distance.
    folded: String,
    ext: String,
    signal: bool,
}

impl<'a> Candidate<'a> {
    fn new(item: &'a Item) -> Self {
        let (stem, ext) = split_name(&item.name);
        Self {
            item,
            size: item.size(),
            canonical: canonical_name(&item.name),
            loose: loose_stem(stem),
            folded: canonical_name(&item.name).to_lowercase(),
            ext: ext.to_lowercase(),
            signal: has_name_signal(stem),
        }
    }
}

type Edge = (usize, usize, MatchTier);

impl DuplicateDetector {
    /// A detector with a custom similarity threshold, clamped to `(0, 1]`.
    pub fn new(similarity_threshold: f64) -> Self {
        let threshold = if similarity_threshold.is_finite() && similarity_threshold > 0.0 {
            similarity_threshold.min(1.0)
        } else {
            DEFAULT_SIMILARITY_THRESHOLD
        };
        Self {
            similarity_threshold: threshold,
        }
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// Find duplicate groups among the store's files.
    ///
    /// Output is ordered by confidence, then wasted bytes (both
    /// descending), then first member id, and is identical across runs.
    pub fn detect(&self, store: &ItemStore) -> Vec<DuplicateGroup> {
        let candidates: Vec<Candidate<'_>> = store.files().map(Candidate::new).collect();
        if candidates.len() < 2 {
            return Vec::new();
        }

        let mut edges: Vec<Edge> = Vec::new();
        edges.extend(chain_buckets(&candidates, MatchTier::NameAndSize, |c| {
            Some((c.canonical.clone(), c.size))
        }));
        edges.extend(chain_buckets(&candidates, MatchTier::NormalizedName, |c| {
            Some((c.loose.clone(), c.ext.clone()))
        }));
        edges.extend(self.similar_name_edges(&candidates));
        edges.extend(chain_buckets(&candidates, MatchTier::SizeOnly, |c| {
            (c.size > 0 && !c.signal).then_some(c.size)
        }));
        debug!("Duplicate matching produced {} edges", edges.len());

        let mut sets = DisjointSet::new(candidates.len());
        for &(a, b, tier) in &edges {
            sets.union(a, b, tier);
        }

        let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..candidates.len() {
            components.entry(sets.find(i)).or_default().push(i);
        }

        let mut groups: Vec<DuplicateGroup> = components
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .filter_map(|(root, members)| {
                let tier = sets.tier(root)?;
                Some(build_group(&candidates, &members, tier))
            })
            .collect();

        groups.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| b.wasted_bytes.cmp(&a.wasted_bytes))
                .then_with(|| a.members[0].cmp(&b.members[0]))
        });
        debug!("Found {} duplicate groups", groups.len());
        groups
    }

    /// Pairwise name similarity within each size bucket. Extensions take
    /// part in the distance, so "report.doc" can meet "report.docx".
    fn similar_name_edges(&self, candidates: &[Candidate<'_>]) -> Vec<Edge> {
        let mut buckets: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (i, c) in candidates.iter().enumerate() {
            if c.size > 0 {
                buckets.entry(c.size).or_default().push(i);
            }
        }

        let buckets: Vec<Vec<usize>> = buckets
            .into_values()
            .filter(|members| members.len() >= 2)
            .collect();

        let threshold = self.similarity_threshold;
        buckets
            .par_iter()
            .flat_map_iter(|members| {
                let mut edges = Vec::new();
                for (pos, &a) in members.iter().enumerate() {
                    for &b in &members[pos + 1..] {
                        if similarity(&candidates[a].folded, &candidates[b].folded) >= threshold {
                            edges.push((a, b, MatchTier::SimilarName));
                        }
                    }
                }
                edges
            })
            .collect()
    }
}

/// Find duplicate groups with the default threshold.
pub fn find_duplicates(store: &ItemStore) -> Vec<DuplicateGroup> {
    DuplicateDetector::default().detect(store)
}

/// Bucket candidates by `key` and link each bucket into a chain. A chain
/// is enough: only connectivity matters for grouping.
fn chain_buckets<K, F>(candidates: &[Candidate<'_>], tier: MatchTier, key: F) -> Vec<Edge>
where
    K: Ord,
    F: Fn(&Candidate<'_>) -> Option<K>,
{
    let mut buckets: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (i, c) in candidates.iter().enumerate() {
        if let Some(k) = key(c) {
            buckets.entry(k).or_default().push(i);
        }
    }
    buckets
        .into_values()
        .flat_map(|members| {
            members
                .windows(2)
                .map(|pair| (pair[0], pair[1], tier))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn build_group(candidates: &[Candidate<'_>], members: &[usize], tier: MatchTier) -> DuplicateGroup {
    let retained = members
        .iter()
        .map(|&i| candidates[i].item)
        .max_by(|a, b| retention_order(a, b))
        .map(|item| item.id.clone())
        .unwrap_or_else(|| candidates[members[0]].item.id.clone());

    let wasted_bytes = members
        .iter()
        .map(|&i| candidates[i].item)
        .filter(|item| item.id != retained)
        .map(Item::size)
        .sum();

    let mut ids: Vec<ItemId> = members.iter().map(|&i| candidates[i].item.id.clone()).collect();
    ids.sort();

    DuplicateGroup {
        members: ids,
        method: tier,
        confidence: tier.confidence(),
        retained,
        wasted_bytes,
    }
}

/// `Greater` means `a` is the better copy to keep.
fn retention_order(a: &Item, b: &Item) -> Ordering {
    a.modified_at
        .cmp(&b.modified_at)
        .then_with(|| a.size().cmp(&b.size()))
        .then_with(|| b.id.cmp(&a.id))
}

/// Union-find that remembers the strongest tier seen per component.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
    tier: Vec<Option<MatchTier>>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
            tier: vec![None; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize, tier: MatchTier) {
        let (ra, rb) = (self.find(a), self.find(b));
        let best = [self.tier[ra], self.tier[rb]]
            .into_iter()
            .flatten()
            .fold(tier, MatchTier::stronger);

        let root = if ra == rb {
            ra
        } else {
            match self.rank[ra].cmp(&self.rank[rb]) {
                Ordering::Less => {
                    self.parent[ra] = rb;
                    rb
                }
                Ordering::Greater => {
                    self.parent[rb] = ra;
                    ra
                }
                Ordering::Equal => {
                    self.parent[rb] = ra;
                    self.rank[ra] += 1;
                    ra
                }
            }
        };
        self.tier[root] = Some(best);
    }

    fn tier(&self, root: usize) -> Option<MatchTier> {
        self.tier[root]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScopeId;
    use chrono::{TimeDelta, Utc};

    const KB: u64 = 1024;

    fn store(items: Vec<Item>) -> ItemStore {
        ItemStore::build(ScopeId::entire_drive(), items).unwrap()
    }

    fn ids(group: &DuplicateGroup) -> Vec<&str> {
        group.members.iter().map(ItemId::as_str).collect()
    }

    #[test]
    fn copy_suffix_with_same_size_is_tier_one() {
        let now = Utc::now();
        let s = store(vec![
            Item::file("old", "report.docx", 500 * KB, None).modified(now - TimeDelta::days(1)),
            Item::file("new", "report(1).docx", 500 * KB, None).modified(now),
        ]);

        let groups = find_duplicates(&s);

        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.method, MatchTier::NameAndSize);
        assert_eq!(g.confidence, 90);
        assert_eq!(g.retained.as_str(), "new");
        assert_eq!(g.wasted_bytes, 500 * KB);
        assert_eq!(g.redundant().map(ItemId::as_str).collect::<Vec<_>>(), vec!["old"]);
    }

    #[test]
    fn distinct_names_with_signal_are_not_grouped() {
        let s = store(vec![
            Item::file("a", "budget.xlsx", 10 * KB, None),
            Item::file("b", "Budget_2023.xlsx", 10 * KB, None),
        ]);
        assert!(find_duplicates(&s).is_empty());
    }

    #[test]
    fn same_size_without_name_signal_is_tier_four() {
        let s = store(vec![
            Item::file("a", "IMG_0042.jpg", 10 * KB, None),
            Item::file("b", "DSC_1234.jpg", 10 * KB, None),
        ]);

        let groups = find_duplicates(&s);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].method, MatchTier::SizeOnly);
        assert_eq!(groups[0].confidence, 40);
    }

    #[test]
    fn case_and_suffix_variants_match_regardless_of_size() {
        let s = store(vec![
            Item::file("a", "Annual Report.pdf", 100, None),
            Item::file("b", "annual report - Copy.PDF", 900, None),
        ]);

        let groups = find_duplicates(&s);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].method, MatchTier::NormalizedName);
        assert_eq!(groups[0].confidence, 70);
    }

    #[test]
    fn similar_names_need_same_size() {
        let s = store(vec![
            Item::file("a", "vacation_photos.zip", 4_000, None),
            Item::file("b", "vacation_photo.zip", 4_000, None),
            Item::file("c", "vacation_phot.zip", 5_000, None),
        ]);

        let groups = find_duplicates(&s);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].method, MatchTier::SimilarName);
        assert_eq!(ids(&groups[0]), vec!["a", "b"]);
    }

    #[test]
    fn similar_names_may_differ_in_extension() {
        let s = store(vec![
            Item::file("a", "report.doc", 6_000, None),
            Item::file("b", "report.docx", 6_000, None),
            Item::file("c", "report.pdf", 6_000, None),
        ]);

        let groups = find_duplicates(&s);
        assert_eq!(groups.len(), 1, "{groups:?}");
        assert_eq!(groups[0].method, MatchTier::SimilarName);
        assert_eq!(ids(&groups[0]), vec!["a", "b"]);
    }

    #[test]
    fn dated_siblings_are_not_name_matches() {
        let s = store(vec![
            Item::file("a", "invoice_2024_01_15.pdf", 4_000, None),
            Item::file("b", "invoice_2024_03_20.pdf", 4_100, None),
            Item::file("c", "invoice_2024_05_02.pdf", 9_999, None),
        ]);
        assert!(find_duplicates(&s).is_empty());

        // Same size, so only the similar-name tier can join them.
        let s = store(vec![
            Item::file("a", "invoice_2024_01_15.pdf", 4_000, None),
            Item::file("b", "invoice_2024_03_20.pdf", 4_000, None),
            Item::file("c", "invoice_2024_05_02.pdf", 9_999, None),
        ]);
        let groups = find_duplicates(&s);
        assert_eq!(groups.len(), 1, "{groups:?}");
        assert_eq!(groups[0].method, MatchTier::SimilarName);
        assert_eq!(groups[0].confidence, 60);
        assert_eq!(ids(&groups[0]), vec!["a", "b"]);
        assert_eq!(groups[0].wasted_bytes, 4_000);
    }

    #[test]
    fn matches_are_transitive() {
        // a~b by name, b~c and a~c by size alone; d shares a's stem but
        // neither its size nor its extension.
        let s = store(vec![
            Item::file("a", "IMG_0001.jpg", 3_000, None),
            Item::file("b", "IMG_0001 (1).jpg", 3_000, None),
            Item::file("c", "DSC_7777.jpg", 3_000, None),
            Item::file("d", "img_0001.png", 10, None),
        ]);
        let groups = find_duplicates(&s);
        assert_eq!(groups.len(), 1, "{groups:?}");
        let g = &groups[0];
        assert_eq!(ids(g), vec!["a", "b", "c"]);
        assert_eq!(g.method, MatchTier::NameAndSize, "strongest edge labels the group");
    }

    #[test]
    fn chained_pairs_form_one_group() {
        // a~b by normalized name, b~c by size and similar name; a and c
        // share neither size nor stem.
        let s = store(vec![
            Item::file("a", "holiday.mov", 2_000, None),
            Item::file("b", "Holiday (1).mov", 5_000, None),
            Item::file("c", "holidays.mov", 5_000, None),
        ]);

        let groups = find_duplicates(&s);
        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[0]), vec!["a", "b", "c"]);
        assert_eq!(groups[0].method, MatchTier::NormalizedName);
    }

    #[test]
    fn zero_byte_files_never_match_on_size_alone() {
        let s = store(vec![
            Item::file("a", "IMG_0001.jpg", 0, None),
            Item::file("b", "DSC_0002.jpg", 0, None),
        ]);
        assert!(find_duplicates(&s).is_empty());
    }

    #[test]
    fn zero_byte_files_still_match_by_name() {
        let s = store(vec![
            Item::folder("f1", "a", None),
            Item::folder("f2", "b", None),
            Item::file("x", "__init__.py", 0, Some("f1")),
            Item::file("y", "__init__.py", 0, Some("f2")),
        ]);
        let groups = find_duplicates(&s);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].wasted_bytes, 0);
    }

    #[test]
    fn folders_are_ignored() {
        let s = store(vec![
            Item::folder("f1", "Photos", None),
            Item::folder("f2", "Photos", None),
        ]);
        assert!(find_duplicates(&s).is_empty());
    }

    #[test]
    fn retention_prefers_recent_then_larger_then_smaller_id() {
        let t = Utc::now();
        let s = store(vec![
            Item::file("b", "notes.txt", 10, None).modified(t),
            Item::file("a", "notes (1).txt", 10, None).modified(t),
        ]);
        let g = &find_duplicates(&s)[0];
        assert_eq!(g.retained.as_str(), "a", "tie on time and size keeps smaller id");

        let s = store(vec![
            Item::file("a", "notes.txt", 10, None),
            Item::file("b", "Notes.TXT", 30, None),
        ]);
        let g = &find_duplicates(&s)[0];
        assert_eq!(g.retained.as_str(), "b", "no timestamps: larger wins");
        assert_eq!(g.wasted_bytes, 10);

        let s = store(vec![
            Item::file("a", "notes.txt", 10, None),
            Item::file("b", "notes (2).txt", 10, None).modified(t),
        ]);
        let g = &find_duplicates(&s)[0];
        assert_eq!(g.retained.as_str(), "b", "a timestamp beats none");
    }

    #[test]
    fn groups_are_ordered_by_confidence_then_waste() {
        let s = store(vec![
            Item::file("s1", "IMG_1.jpg", 9_000, None),
            Item::file("s2", "DSC_2.jpg", 9_000, None),
            Item::file("n1", "small.txt", 10, None),
            Item::file("n2", "small (1).txt", 10, None),
            Item::file("m1", "big.bin", 5_000, None),
            Item::file("m2", "big_copy.bin", 5_000, None),
        ]);

        let groups = find_duplicates(&s);
        let order: Vec<(u8, u64)> = groups.iter().map(|g| (g.confidence, g.wasted_bytes)).collect();
        assert_eq!(order, vec![(90, 5_000), (90, 10), (40, 9_000)]);
    }

    #[test]
    fn detection_is_deterministic() {
        let items: Vec<Item> = (0..40)
            .map(|i| Item::file(format!("id{i:02}"), format!("file {} (1).dat", i % 7), 100 + (i % 3), None))
            .collect();
        let s = store(items);
        let first = find_duplicates(&s);
        let second = find_duplicates(&s);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn threshold_is_clamped() {
        assert_eq!(DuplicateDetector::new(f64::NAN).similarity_threshold(), 0.8);
        assert_eq!(DuplicateDetector::new(0.0).similarity_threshold(), 0.8);
        assert_eq!(DuplicateDetector::new(3.0).similarity_threshold(), 1.0);
        assert_eq!(DuplicateDetector::new(0.5).similarity_threshold(), 0.5);
    }
}
