use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::models::{ItemId, PreferenceVizItem, ScoredItem, VizAlgorithm, VizMode};
use crate::services::ranking::cmp_desc;
use crate::store::AverageScoreTable;

/// An item placed in the (user score, community score) plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VizCandidate {
    pub item_id: ItemId,
    pub user_score: f64,
    pub community_score: f64,
    pub count: u64,
}

impl VizCandidate {
    fn manhattan(&self, x: f64, y: f64) -> f64 {
        (self.user_score - x).abs() + (self.community_score - y).abs()
    }
}

/// Population-wide community axis: each item's average discounted score
pub fn global_community_scores(averages: &AverageScoreTable) -> HashMap<ItemId, f64> {
    averages
        .item_ids()
        .filter_map(|&item| {
            averages
                .get(item)
                .map(|average| (item, average.ave_discounted_score))
        })
        .collect()
}

/// Unrated items rated at least `min_rating_count` times in training, with both scores known
pub fn viz_candidates(
    items: &[ScoredItem],
    community: &HashMap<ItemId, f64>,
    rated: &HashSet<ItemId>,
    min_rating_count: u64,
) -> Vec<VizCandidate> {
    items
        .iter()
        .filter(|item| item.popularity_count >= min_rating_count && !rated.contains(&item.item_id))
        .filter_map(|item| {
            let candidate = VizCandidate {
                item_id: item.item_id,
                user_score: item.discounted_score,
                community_score: *community.get(&item.item_id)?,
                count: item.popularity_count,
            };
            (candidate.user_score.is_finite() && candidate.community_score.is_finite())
                .then_some(candidate)
        })
        .collect()
}

/// Produces preference-visualization records from a candidate pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterVisualizer {
    pub mode: VizMode,
    pub algo: VizAlgorithm,
    pub randomize: bool,
    pub init_sample_size: usize,
}

impl ClusterVisualizer {
    pub fn visualize(
        &self,
        candidates: &[VizCandidate],
        num_rec: usize,
        seed: u64,
    ) -> Vec<PreferenceVizItem> {
        let mut rng = StdRng::seed_from_u64(seed);

        let selected: Vec<(VizCandidate, Option<usize>)> = match self.mode {
            VizMode::Baseline => baseline(candidates, num_rec)
                .into_iter()
                .map(|c| (c, None))
                .collect(),
            VizMode::Diverse => match self.algo {
                VizAlgorithm::Fishnet => fishnet(candidates, num_rec)
                    .into_iter()
                    .map(|c| (c, None))
                    .collect(),
                VizAlgorithm::SingleLinkage => {
                    let sample = stratified_sample(candidates, self.init_sample_size);
                    single_linkage(&sample, num_rec)
                }
                VizAlgorithm::FishnetSingleLinkage => {
                    let net = fishnet(candidates, self.init_sample_size);
                    single_linkage(&net, num_rec)
                }
                VizAlgorithm::Random => candidates
                    .choose_multiple(&mut rng, num_rec.min(candidates.len()))
                    .map(|c| (*c, None))
                    .collect(),
                VizAlgorithm::ConvexHull => {
                    let mut hull = convex_hull(candidates);
                    hull.truncate(num_rec);
                    hull.into_iter().map(|c| (c, None)).collect()
                }
            },
        };

        let mut records = label(&selected);
        if self.randomize {
            records.shuffle(&mut rng);
        }

        tracing::debug!(
            candidates = candidates.len(),
            selected = records.len(),
            algo = ?self.algo,
            mode = ?self.mode,
            "Built preference visualization"
        );
        records
    }
}

/// Top items by user score interleaved with top items by community score
pub fn baseline(candidates: &[VizCandidate], num_rec: usize) -> Vec<VizCandidate> {
    let mut by_user = candidates.to_vec();
    by_user.sort_by(|a, b| cmp_desc(a.user_score, b.user_score));
    let mut by_community = candidates.to_vec();
    by_community.sort_by(|a, b| cmp_desc(a.community_score, b.community_score));

    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(num_rec);
    for (u, c) in by_user.iter().zip(by_community.iter()) {
        for candidate in [u, c] {
            if selected.len() < num_rec && seen.insert(candidate.item_id) {
                selected.push(*candidate);
            }
        }
        if selected.len() >= num_rec {
            break;
        }
    }
    selected
}

/// Grid sampling over the candidates' bounding box: each grid point takes its nearest
/// unselected candidate (Manhattan) until `n` items are chosen
pub fn fishnet(candidates: &[VizCandidate], n: usize) -> Vec<VizCandidate> {
    if candidates.is_empty() || n == 0 {
        return Vec::new();
    }

    let (lo, hi) = candidates.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
        (
            lo.min(c.user_score).min(c.community_score),
            hi.max(c.user_score).max(c.community_score),
        )
    });

    let divisions = ((n as f64).sqrt().floor() as usize).max(1);
    let step = (hi - lo) / divisions as f64;
    let ticks: Vec<f64> = (0..=divisions).map(|i| lo + step * i as f64).collect();

    let mut taken = vec![false; candidates.len()];
    let mut selected = Vec::with_capacity(n);
    'grid: for &x in &ticks {
        for &y in &ticks {
            let nearest = candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| !taken[*i])
                .min_by(|(_, a), (_, b)| {
                    a.manhattan(x, y)
                        .partial_cmp(&b.manhattan(x, y))
                        .unwrap_or(Ordering::Equal)
                });
            match nearest {
                Some((i, candidate)) => {
                    taken[i] = true;
                    selected.push(*candidate);
                    if selected.len() >= n {
                        break 'grid;
                    }
                }
                None => break 'grid,
            }
        }
    }
    selected
}

/// Top, middle and bottom slices by user score, each of `min(init, len / 3)` items
pub fn stratified_sample(candidates: &[VizCandidate], init_sample_size: usize) -> Vec<VizCandidate> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| cmp_desc(a.user_score, b.user_score));

    let len = sorted.len();
    let size = init_sample_size.min(len / 3);
    if size == 0 {
        return sorted;
    }

    let mid_start = (len / 2).saturating_sub(size / 2);
    let slices = [
        &sorted[..size],
        &sorted[len - size..],
        &sorted[mid_start..(mid_start + size).min(len)],
    ];

    let mut seen = HashSet::new();
    slices
        .iter()
        .flat_map(|slice| slice.iter())
        .filter(|c| seen.insert(c.item_id))
        .copied()
        .collect()
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent[rb] = ra;
        true
    }
}

/// Single-linkage clustering (city-block) into `num_clusters` clusters, returning for each
/// cluster the member closest to the cluster mean, tagged with its cluster id
pub fn single_linkage(
    candidates: &[VizCandidate],
    num_clusters: usize,
) -> Vec<(VizCandidate, Option<usize>)> {
    let n = candidates.len();
    if n == 0 || num_clusters == 0 {
        return Vec::new();
    }

    let mut edges: Vec<(f64, usize, usize)> = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in i + 1..n {
            let d = candidates[i].manhattan(candidates[j].user_score, candidates[j].community_score);
            edges.push((d, i, j));
        }
    }
    edges.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut sets = DisjointSet::new(n);
    let mut components = n;
    for &(_, i, j) in &edges {
        if components <= num_clusters {
            break;
        }
        if sets.union(i, j) {
            components -= 1;
        }
    }

    // cluster ids follow first appearance in the candidate order
    let mut cluster_of_root: HashMap<usize, usize> = HashMap::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        let root = sets.find(i);
        let id = *cluster_of_root.entry(root).or_insert_with(|| {
            members.push(Vec::new());
            members.len() - 1
        });
        members[id].push(i);
    }

    members
        .iter()
        .enumerate()
        .filter_map(|(id, group)| {
            let size = group.len() as f64;
            let mean_user = group.iter().map(|&i| candidates[i].user_score).sum::<f64>() / size;
            let mean_community =
                group.iter().map(|&i| candidates[i].community_score).sum::<f64>() / size;
            group
                .iter()
                .map(|&i| candidates[i])
                .min_by(|a, b| {
                    a.manhattan(mean_user, mean_community)
                        .partial_cmp(&b.manhattan(mean_user, mean_community))
                        .unwrap_or(Ordering::Equal)
                })
                .map(|representative| (representative, Some(id)))
        })
        .collect()
}

fn cross(o: &VizCandidate, a: &VizCandidate, b: &VizCandidate) -> f64 {
    (a.user_score - o.user_score) * (b.community_score - o.community_score)
        - (a.community_score - o.community_score) * (b.user_score - o.user_score)
}

/// Extreme items on the convex hull of the score plane (monotone chain, counter-clockwise)
pub fn convex_hull(candidates: &[VizCandidate]) -> Vec<VizCandidate> {
    if candidates.len() < 3 {
        return candidates.to_vec();
    }

    let mut points = candidates.to_vec();
    points.sort_by(|a, b| {
        a.user_score
            .partial_cmp(&b.user_score)
            .unwrap_or(Ordering::Equal)
            .then(
                a.community_score
                    .partial_cmp(&b.community_score)
                    .unwrap_or(Ordering::Equal),
            )
    });

    let mut lower: Vec<VizCandidate> = Vec::new();
    for p in &points {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<VizCandidate> = Vec::new();
    for p in points.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Labels each score 1 when it reaches the mean of the two axis medians, else 0
pub fn label(selected: &[(VizCandidate, Option<usize>)]) -> Vec<PreferenceVizItem> {
    let mut community: Vec<f64> = selected.iter().map(|(c, _)| c.community_score).collect();
    let mut user: Vec<f64> = selected.iter().map(|(c, _)| c.user_score).collect();
    let threshold = (median(&mut community) + median(&mut user)) / 2.0;

    selected
        .iter()
        .map(|(c, cluster_id)| PreferenceVizItem {
            item_id: c.item_id,
            community_score: c.community_score,
            user_score: c.user_score,
            community_label: u8::from(c.community_score >= threshold),
            user_label: u8::from(c.user_score >= threshold),
            cluster_id: *cluster_id,
        })
        .collect()
}
