//! Cut insertion, removal, and end-to-end path merging.

use tracing::debug;

use crate::cut::{AlignMode, Cut};
use crate::error::{Result, TopologyError};
use crate::math::Point3;

use super::{point_segment_distance, Path, Stage};

impl Path {
    /// Mean distance between consecutive ring centers, or `None` for a
    /// single-cut path.
    #[must_use]
    pub fn average_spacing(&self) -> Option<f64> {
        if self.cuts.len() < 2 {
            return None;
        }
        let total: f64 = self
            .cuts
            .windows(2)
            .map(|win| (win[1].plane_com() - win[0].plane_com()).norm())
            .sum();
        Some(total / (self.cuts.len() - 1) as f64)
    }

    /// Offers a freshly clicked cut to this path. The cut joins when its
    /// ring center lies within `search_factor` times the local cut
    /// spacing of the chain; otherwise `Ok(false)` is returned and the
    /// caller starts a new path with it.
    ///
    /// A joining cut is resampled to this path's ring count, spliced at
    /// the chain position nearest its center, and seam-aligned to its new
    /// neighbors.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist; propagates resampling failures.
    pub fn insert_cut(&mut self, mut cut: Cut, search_factor: f64) -> Result<bool> {
        self.require(Stage::CutsDerived)?;
        let com = *cut.plane_com();

        // Single-ring paths have no spacing yet; the ring's own radius
        // stands in for it.
        let spacing = self
            .average_spacing()
            .unwrap_or_else(|| ring_radius(&self.cuts[0]));
        let nearest = self
            .cuts
            .iter()
            .map(|c| (com - c.plane_com()).norm())
            .fold(f64::MAX, f64::min);
        if nearest > search_factor * spacing {
            return Ok(false);
        }

        let index = self.insertion_index(&com);
        cut.set_ring_segments(self.ring_segments)?;
        self.cuts.insert(index, cut);
        self.segments = self.cuts.len() - 1;
        self.seg_lock = true;
        self.invalidate_connection();
        self.align_cut(index, AlignMode::Between, true)?;
        debug!(index, "cut spliced into path");
        Ok(true)
    }

    /// Chain position for a new ring center: before the first center,
    /// after the last, or after the nearest interior segment.
    fn insertion_index(&self, com: &Point3) -> usize {
        let coms: Vec<Point3> = self.cuts.iter().map(|c| *c.plane_com()).collect();
        let n = coms.len();
        if n == 1 {
            let side = self.cuts[0].plane().signed_distance(com);
            return usize::from(side >= 0.0);
        }
        if (com - coms[0]).dot(&(coms[1] - coms[0])) < 0.0 {
            return 0;
        }
        if (com - coms[n - 1]).dot(&(coms[n - 1] - coms[n - 2])) > 0.0 {
            return n;
        }

        let mut best = 0;
        let mut best_dist = f64::MAX;
        for i in 0..n - 1 {
            let d = point_segment_distance(com, &coms[i], &coms[i + 1]);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best + 1
    }

    /// Removes one cut from the chain and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::LastCut`] when only one cut remains and
    /// `EntityNotFound` for an out-of-range index.
    pub fn remove_cut(&mut self, index: usize) -> Result<Cut> {
        self.require(Stage::CutsDerived)?;
        if index >= self.cuts.len() {
            return Err(TopologyError::EntityNotFound("cut").into());
        }
        if self.cuts.len() <= 1 {
            return Err(TopologyError::LastCut.into());
        }
        let cut = self.cuts.remove(index);
        self.segments = self.cuts.len() - 1;
        self.invalidate_connection();
        Ok(cut)
    }

    /// Ring centers of the first and last cut, once cuts exist.
    #[must_use]
    pub fn endpoint_coms(&self) -> Option<(Point3, Point3)> {
        let first = self.cuts.first()?;
        let last = self.cuts.last()?;
        Some((*first.plane_com(), *last.plane_com()))
    }

    /// Absorbs another path end to end. Both chains are oriented so the
    /// closest pair of endpoints meet, the donor's cuts are resampled to
    /// this path's ring count, and the combined chain is re-aligned.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::RingMismatch`] when the donor is locked
    /// at a different ring count, and [`TopologyError::PathLocked`] when
    /// the joining ends carry attached boundaries.
    pub fn merge_from(&mut self, mut donor: Path) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        donor.require(Stage::CutsDerived)?;
        if donor.locked() && donor.ring_segments != self.ring_segments {
            return Err(TopologyError::RingMismatch {
                left: self.ring_segments,
                right: donor.ring_segments,
            }
            .into());
        }

        let (self_head, self_tail) = self
            .endpoint_coms()
            .ok_or(TopologyError::EntityNotFound("cut"))?;
        let (donor_head, donor_tail) = donor
            .endpoint_coms()
            .ok_or(TopologyError::EntityNotFound("cut"))?;

        // Junction is always self.tail -- donor.head; reverse either
        // chain to make the closest endpoint pair meet there.
        let combos = [
            ((self_tail - donor_head).norm(), false, false),
            ((self_tail - donor_tail).norm(), false, true),
            ((self_head - donor_head).norm(), true, false),
            ((self_head - donor_tail).norm(), true, true),
        ];
        let (_, reverse_self, reverse_donor) = combos
            .iter()
            .copied()
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or((0.0, false, false));

        // Check the joining ends before touching either chain, so a
        // rejected merge leaves both paths exactly as they were.
        let self_join_attached = if reverse_self {
            self.existing_head.is_some()
        } else {
            self.existing_tail.is_some()
        };
        let donor_join_attached = if reverse_donor {
            donor.existing_tail.is_some()
        } else {
            donor.existing_head.is_some()
        };
        if self_join_attached || donor_join_attached {
            return Err(TopologyError::PathLocked(
                "joining ends carry attached boundaries",
            )
            .into());
        }

        if reverse_self {
            self.reverse_chain();
        }
        if reverse_donor {
            donor.reverse_chain();
        }

        for cut in &mut donor.cuts {
            cut.set_ring_segments(self.ring_segments)?;
        }
        self.cuts.append(&mut donor.cuts);
        self.existing_tail = donor.existing_tail.take();
        self.segments = self.cuts.len() - 1;
        self.seg_lock = self.seg_lock || donor.seg_lock;
        self.rebuild_backbone();
        self.align_cuts(true)?;
        debug!(cuts = self.cuts.len(), "paths merged");
        Ok(())
    }

    fn reverse_chain(&mut self) {
        self.cuts.reverse();
        std::mem::swap(&mut self.existing_head, &mut self.existing_tail);
    }

    /// Reconstructs the stroke-derived arrays from the cut chain after a
    /// structural edit invalidated them.
    fn rebuild_backbone(&mut self) {
        self.world_path = self.cuts.iter().map(|c| *c.plane_com()).collect();
        self.knots = if self.world_path.len() > 1 {
            vec![0, self.world_path.len() - 1]
        } else {
            vec![0]
        };
        self.cut_nodes = self.world_path.clone();
        self.cut_normals = self.cuts.iter().map(|c| *c.plane().normal()).collect();
        self.bridges.clear();
        self.stage = Stage::CutsDerived;
    }
}

fn ring_radius(cut: &Cut) -> f64 {
    let com = cut.plane_com();
    let sum: f64 = cut.verts_simple().iter().map(|v| (v - com).norm()).sum();
    sum / cut.ring_segments().max(1) as f64
}
