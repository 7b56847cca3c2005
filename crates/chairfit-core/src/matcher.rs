//! Brute-force Hamming matching with mutual nearest-neighbour cross-check.
use crate::orb::Descriptor;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// A correspondence between a template descriptor and a query descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Index into the template descriptor set.
    pub template_idx: usize,
    /// Index into the query descriptor set.
    pub query_idx: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}

/// Nearest neighbour of every descriptor in `from` among `to`.
///
/// Ties on distance resolve to the lowest index in `to`. Returns `None` for
/// every entry when `to` is empty.
pub fn nearest_neighbours(from: &[Descriptor], to: &[Descriptor]) -> Vec<Option<(usize, u32)>> {
    let best = |d: &Descriptor| -> Option<(usize, u32)> {
        let mut best: Option<(usize, u32)> = None;
        for (j, other) in to.iter().enumerate() {
            let dist = d.hamming(other);
            match best {
                Some((_, b)) if dist >= b => {}
                _ => best = Some((j, dist)),
            }
        }
        best
    };

    #[cfg(feature = "rayon")]
    let out = from.par_iter().map(best).collect();

    #[cfg(not(feature = "rayon"))]
    let out = from.iter().map(best).collect();

    out
}

/// Cross-checked matches, ordered by template index.
///
/// A pair `(t, q)` is kept only if `q` is the nearest query descriptor of
/// `t` and `t` is the nearest template descriptor of `q`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(template = template.len(), query = query.len()))
)]
pub fn match_cross_check(template: &[Descriptor], query: &[Descriptor]) -> Vec<Match> {
    if template.is_empty() || query.is_empty() {
        return Vec::new();
    }

    let forward = nearest_neighbours(template, query);
    let backward = nearest_neighbours(query, template);

    forward
        .into_iter()
        .enumerate()
        .filter_map(|(t, nn)| {
            let (q, distance) = nn?;
            match backward[q] {
                Some((back, _)) if back == t => Some(Match {
                    template_idx: t,
                    query_idx: q,
                    distance,
                }),
                _ => None,
            }
        })
        .collect()
}

/// Matches whose distance does not exceed `max_distance`.
pub fn good_matches(matches: &[Match], max_distance: u32) -> Vec<Match> {
    matches
        .iter()
        .copied()
        .filter(|m| m.distance <= max_distance)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(bits: u64) -> Descriptor {
        Descriptor([bits, 0, 0, 0])
    }

    #[test]
    fn empty_sets_have_no_matches() {
        assert!(match_cross_check(&[], &[d(1)]).is_empty());
        assert!(match_cross_check(&[d(1)], &[]).is_empty());
    }

    #[test]
    fn cross_check_rejects_many_to_one() {
        // both template descriptors are closest to query 0, but only
        // template 0 is query 0's closest.
        let template = [d(0b0000), d(0b0011)];
        let query = [d(0b0001), d(0xFFFF_0000)];
        let matches = match_cross_check(&template, &query);
        assert_eq!(
            matches,
            vec![Match {
                template_idx: 0,
                query_idx: 0,
                distance: 1
            }]
        );
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let nn = nearest_neighbours(&[d(0)], &[d(0b01), d(0b10)]);
        assert_eq!(nn, vec![Some((0, 1))]);
    }

    #[test]
    fn identical_sets_match_with_zero_distance() {
        let set = [d(0x0F), d(0xF0_00), d(0xFF_0000_0000)];
        let matches = match_cross_check(&set, &set);
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|m| m.distance == 0 && m.template_idx == m.query_idx));
    }

    #[test]
    fn good_matches_grow_with_threshold() {
        let matches: Vec<Match> = (0..10)
            .map(|i| Match {
                template_idx: i,
                query_idx: i,
                distance: (i * 10) as u32,
            })
            .collect();
        let mut prev = 0;
        for thr in [0, 15, 40, 70, 200] {
            let n = good_matches(&matches, thr).len();
            assert!(n >= prev);
            prev = n;
        }
        assert_eq!(good_matches(&matches, 70).len(), 8);
    }
}
