//! Grouping of accepted windows into object hypotheses.

use serde::{Deserialize, Serialize};
use tld_core::{mean_rect, Rect};

/// A window accepted by every cascade stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub window_index: usize,
    pub rect: Rect,
    /// NN relative similarity.
    pub confidence: f32,
}

/// Merged detections of one object instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub rect: Rect,
    /// Mean member confidence.
    pub confidence: f32,
    /// Window indices of the members, ascending.
    pub members: Vec<usize>,
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Single-linkage clustering: detections overlapping by at least
/// `min_overlap` end up in the same cluster, transitively.
///
/// `detections` are expected in window order; clusters are returned ordered
/// by their first member.
pub fn cluster_detections(detections: &[Detection], min_overlap: f32) -> Vec<Cluster> {
    let n = detections.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        for j in i + 1..n {
            if detections[i].rect.overlap(&detections[j].rect) >= min_overlap {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(i),
            None => groups.push((root, vec![i])),
        }
    }

    groups
        .into_iter()
        .filter_map(|(_, members)| {
            let rect = mean_rect(members.iter().map(|&m| (&detections[m].rect, 1.0)))?;
            let confidence = members
                .iter()
                .map(|&m| detections[m].confidence)
                .sum::<f32>()
                / members.len() as f32;
            Some(Cluster {
                rect,
                confidence,
                members: members.iter().map(|&m| detections[m].window_index).collect(),
            })
        })
        .collect()
}
