//! The retopology session: owned surface, path table, and undo history.
//!
//! Every mutating operation is transactional: a failure restores the
//! path table to its pre-operation state, and successes record a labeled
//! undo snapshot first.

pub mod modal;
pub mod snapshot;

use slotmap::{new_key_type, SlotMap};
use tracing::{debug, info, warn};

use crate::bridge::Face;
use crate::config::SessionConfig;
use crate::cut::{AlignMode, Cut, ExistingLoop};
use crate::error::{Result, TopologyError};
use crate::geometry::{ScreenProjector, Stroke};
use crate::math::{Point2, Point3};
use crate::path::{Path, Stage};
use crate::surface::{Fingerprint, TriMesh};

pub use modal::{transition, ModalEffect, ModalEvent, ModalState};
pub use snapshot::{SnapshotLabel, UndoStack};

new_key_type! {
    /// Stable handle of a path within a session.
    pub struct PathId;
}

/// Everything an undo step restores: the path table plus the operator
/// state riding alongside it.
#[derive(Debug, Clone)]
struct OpState {
    paths: SlotMap<PathId, Path>,
    selected: Option<PathId>,
}

/// One interactive retopology run over a cached surface.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    surface: TriMesh,
    fingerprint: Fingerprint,
    paths: SlotMap<PathId, Path>,
    selected: Option<PathId>,
    undo: UndoStack<OpState>,
}

impl Session {
    #[must_use]
    pub fn new(surface: TriMesh, config: SessionConfig) -> Self {
        let fingerprint = surface.fingerprint();
        let undo = UndoStack::new(config.undo_depth);
        Self {
            config,
            surface,
            fingerprint,
            paths: SlotMap::with_key(),
            selected: None,
            undo,
        }
    }

    /// The highlighted path, if it still exists. Undo can retire the
    /// selected id; a stale selection reads as none.
    #[must_use]
    pub fn selected(&self) -> Option<PathId> {
        self.selected.filter(|id| self.paths.contains_key(*id))
    }

    /// # Errors
    ///
    /// Returns `EntityNotFound` for a stale id.
    pub fn select_path(&mut self, id: PathId) -> Result<()> {
        if !self.paths.contains_key(id) {
            return Err(TopologyError::EntityNotFound("path").into());
        }
        self.selected = Some(id);
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn surface(&self) -> &TriMesh {
        &self.surface
    }

    #[must_use]
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn path_ids(&self) -> impl Iterator<Item = PathId> + '_ {
        self.paths.keys()
    }

    /// # Errors
    ///
    /// Returns `EntityNotFound` for a stale id.
    pub fn path(&self, id: PathId) -> Result<&Path> {
        self.paths
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("path").into())
    }

    #[must_use]
    pub fn undo_available(&self) -> usize {
        self.undo.len()
    }

    /// Runs a mutating operation transactionally: the path table and
    /// selection are restored on failure and snapshotted on success.
    fn edit<R>(
        &mut self,
        label: SnapshotLabel,
        op: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let before = OpState {
            paths: self.paths.clone(),
            selected: self.selected,
        };
        match op(self) {
            Ok(out) => {
                self.undo.push(label, before);
                Ok(out)
            }
            Err(err) => {
                self.paths = before.paths;
                self.selected = before.selected;
                Err(err)
            }
        }
    }

    /// Derives a path from a drawn guide stroke. Unless `force_new` is
    /// set, a stroke ending within the merge threshold of an existing
    /// path's end is absorbed into that path; the returned id is the
    /// surviving path either way.
    ///
    /// # Errors
    ///
    /// Propagates stroke projection and cut derivation failures.
    pub fn draw_path(
        &mut self,
        stroke: &Stroke,
        projector: &dyn ScreenProjector,
        force_new: bool,
    ) -> Result<PathId> {
        let path = Path::from_stroke(stroke, projector, &self.surface, &self.config)?;
        let id = self.edit(SnapshotLabel::PathCreated, move |s| {
            if !force_new {
                if let Some(id) = s.snap_target(&path) {
                    s.paths[id].merge_from(path)?;
                    info!(?id, "stroke merged into existing path");
                    return Ok(id);
                }
            }
            Ok(s.paths.insert(path))
        })?;
        self.selected = Some(id);
        Ok(id)
    }

    fn snap_target(&self, path: &Path) -> Option<PathId> {
        let (head, tail) = path.endpoint_coms()?;
        let threshold = self.config.merge_threshold;
        self.paths.iter().find_map(|(id, existing)| {
            let (other_head, other_tail) = existing.endpoint_coms()?;
            let near = [head, tail].iter().any(|p| {
                (*p - other_head).norm() < threshold || (*p - other_tail).norm() < threshold
            });
            near.then_some(id)
        })
    }

    /// Builds a cut from a two-point screen gesture and offers it to
    /// every path in turn; a path accepts when the cut lands within its
    /// search radius. Unless `force_new` is set, a declined cut starts a
    /// new single-ring path.
    ///
    /// # Errors
    ///
    /// Propagates cut construction and splice failures.
    pub fn place_cut(
        &mut self,
        head: Point2,
        tail: Point2,
        projector: &dyn ScreenProjector,
        force_new: bool,
    ) -> Result<PathId> {
        let cut = Cut::from_screen_line(
            head,
            tail,
            projector,
            &self.surface,
            self.config.vertex_count,
        )?;
        let search = self.config.search_factor;
        let id = self.edit(SnapshotLabel::CutInserted, move |s| {
            if !force_new {
                let ids: Vec<PathId> = s.paths.keys().collect();
                for id in ids {
                    if s.paths[id].insert_cut(cut.clone(), search)? {
                        return Ok(id);
                    }
                }
            }
            Ok(s.paths.insert(Path::from_single_cut(cut, &s.config)))
        })?;
        self.selected = Some(id);
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `EntityNotFound` for a stale id.
    pub fn remove_path(&mut self, id: PathId) -> Result<Path> {
        self.edit(SnapshotLabel::PathRemoved, |s| {
            s.paths
                .remove(id)
                .ok_or_else(|| TopologyError::EntityNotFound("path").into())
        })
    }

    /// # Errors
    ///
    /// Fails for a stale id, an out-of-range index, or the last cut of a
    /// path.
    pub fn remove_cut(&mut self, id: PathId, index: usize) -> Result<()> {
        self.edit(SnapshotLabel::CutRemoved, |s| {
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            path.remove_cut(index)?;
            Ok(())
        })
    }

    /// Merges `donor` into `anchor` end to end; the donor id is retired.
    ///
    /// # Errors
    ///
    /// Fails for stale or identical ids, or when the chains cannot join.
    pub fn merge_paths(&mut self, anchor: PathId, donor: PathId) -> Result<()> {
        if anchor == donor
            || !self.paths.contains_key(anchor)
            || !self.paths.contains_key(donor)
        {
            return Err(TopologyError::EntityNotFound("two distinct paths").into());
        }
        self.edit(SnapshotLabel::PathsMerged, |s| {
            let donor_path = s
                .paths
                .remove(donor)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            let anchor_path = s
                .paths
                .get_mut(anchor)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            anchor_path.merge_from(donor_path)
        })
    }

    /// Attaches a pre-existing boundary loop to one end of a path,
    /// locking the path's ring count to the loop.
    ///
    /// # Errors
    ///
    /// Fails for a stale id or a ring-count conflict.
    pub fn attach_boundary(
        &mut self,
        id: PathId,
        boundary: ExistingLoop,
        at_head: bool,
    ) -> Result<()> {
        self.edit(SnapshotLabel::BoundaryAttached, move |s| {
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            if at_head {
                path.attach_head(boundary)
            } else {
                path.attach_tail(boundary)
            }
        })
    }

    /// # Errors
    ///
    /// Fails for a stale id; propagates re-derivation failures.
    pub fn set_segments(&mut self, id: PathId, segments: usize) -> Result<()> {
        self.edit(SnapshotLabel::PathSegments, |s| {
            let surface = &s.surface;
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            path.set_segments(segments, surface)
        })
    }

    /// # Errors
    ///
    /// Fails for a stale id or a locked path.
    pub fn set_ring_segments(&mut self, id: PathId, count: usize) -> Result<()> {
        self.edit(SnapshotLabel::LoopSegments, |s| {
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            path.set_ring_segments(count)
        })
    }

    /// # Errors
    ///
    /// Fails for a stale id or an out-of-range index.
    pub fn shift_cut(&mut self, id: PathId, index: usize, shift: f64) -> Result<()> {
        self.edit(SnapshotLabel::LoopShift, |s| {
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            path.shift_cut(index, shift)
        })
    }

    /// # Errors
    ///
    /// Fails for a stale id.
    pub fn shift_path(&mut self, id: PathId, delta: f64) -> Result<()> {
        self.edit(SnapshotLabel::PathShift, |s| {
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            path.shift_all(delta)
        })
    }

    /// # Errors
    ///
    /// Fails for a stale id or an out-of-range index.
    pub fn align_cut(
        &mut self,
        id: PathId,
        index: usize,
        mode: AlignMode,
        fine_grain: bool,
    ) -> Result<f64> {
        self.edit(SnapshotLabel::Alignment, |s| {
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            path.align_cut(index, mode, fine_grain)
        })
    }

    /// # Errors
    ///
    /// Fails for a stale id.
    pub fn align_path(&mut self, id: PathId, fine_grain: bool) -> Result<()> {
        self.edit(SnapshotLabel::Alignment, |s| {
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            path.align_cuts(fine_grain)
        })
    }

    /// # Errors
    ///
    /// Fails for a stale id; propagates re-cut failures.
    pub fn smooth_path_cuts(&mut self, id: PathId, passes: usize) -> Result<()> {
        self.edit(SnapshotLabel::Smoothing, |s| {
            let surface = &s.surface;
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            path.smooth_cuts(surface, passes)
        })
    }

    /// Slides one cutting plane along its normal.
    ///
    /// # Errors
    ///
    /// Fails for a stale id, an out-of-range index, or when the moved
    /// plane leaves the surface.
    pub fn translate_cut(&mut self, id: PathId, index: usize, distance: f64) -> Result<()> {
        self.edit(SnapshotLabel::CutMoved, |s| {
            let surface = &s.surface;
            let path = s
                .paths
                .get_mut(id)
                .ok_or(TopologyError::EntityNotFound("path"))?;
            path.translate_cut(index, distance, surface)
        })
    }

    /// Recomputes per-vertex occlusion for every path from the given
    /// view. Never snapshotted; visibility is derived data.
    ///
    /// # Errors
    ///
    /// Propagates per-path failures.
    pub fn update_visibility(&mut self, projector: &dyn ScreenProjector) -> Result<()> {
        let surface = &self.surface;
        for path in self.paths.values_mut() {
            path.update_visibility(surface, projector)?;
        }
        Ok(())
    }

    /// Reverts the last snapshotted edit, restoring both the path table
    /// and the selection of that moment. Returns `false` when the history
    /// is empty.
    pub fn undo(&mut self) -> bool {
        match self.undo.pop() {
            Some((label, state)) => {
                debug!(?label, "undo");
                self.paths = state.paths;
                self.selected = state.selected;
                true
            }
            None => false,
        }
    }

    /// Swaps in a new surface when its fingerprint differs, re-cutting
    /// every path against it. Paths whose cuts no longer intersect the
    /// new surface are dropped with a warning. The undo history is
    /// cleared since its states refer to the old surface. Returns whether
    /// anything changed.
    pub fn replace_surface(&mut self, surface: TriMesh) -> bool {
        let fingerprint = surface.fingerprint();
        if fingerprint == self.fingerprint {
            return false;
        }
        self.surface = surface;
        self.fingerprint = fingerprint;
        self.undo.clear();

        let ids: Vec<PathId> = self.paths.keys().collect();
        for id in ids {
            let surface = &self.surface;
            let Some(path) = self.paths.get_mut(id) else {
                continue;
            };
            if let Err(err) = path.recut_cuts(surface) {
                warn!(%err, "path dropped after surface change");
                self.paths.remove(id);
            }
        }
        true
    }

    /// Connects every path and emits one merged vertex and face buffer
    /// with session-global indices.
    ///
    /// # Errors
    ///
    /// Propagates connection failures; no partial output is returned.
    pub fn finalize(&mut self) -> Result<(Vec<Point3>, Vec<Face>)> {
        let mut verts = Vec::new();
        let mut faces = Vec::new();
        let ids: Vec<PathId> = self.paths.keys().collect();
        for id in ids {
            let Some(path) = self.paths.get_mut(id) else {
                continue;
            };
            if path.stage() < Stage::Connected {
                path.connect()?;
            }
            let (chunk_verts, chunk_faces) = path.mesh_chunk()?;
            let base = verts.len() as u32;
            faces.extend(chunk_faces.iter().map(|f| f.map_indices(|i| i + base)));
            verts.extend(chunk_verts);
        }
        info!(verts = verts.len(), faces = faces.len(), "session finalized");
        Ok((verts, faces))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::geometry::stroke::OrthoProjector;
    use crate::math::Vector3;
    use crate::surface::test_meshes;

    use super::*;

    fn tube() -> TriMesh {
        test_meshes::cylinder(5.0, -4.0, 4.0, 64, 4)
    }

    fn side_projector() -> OrthoProjector {
        OrthoProjector::looking(Point3::new(0.0, 30.0, 0.0), -Vector3::y(), 100.0)
    }

    // Screen X maps to world Z from the side view.
    fn z_stroke(from: f64, to: f64) -> Stroke {
        let step = (to - from) / 12.0;
        Stroke::new(
            (0..=12)
                .map(|i| Point2::new(from + i as f64 * step, 0.0))
                .collect(),
        )
    }

    fn session() -> Session {
        let config = SessionConfig {
            ring_count: 4,
            vertex_count: 8,
            cull_factor: 2,
            ..SessionConfig::default()
        };
        Session::new(tube(), config)
    }

    #[test]
    fn draw_and_finalize() {
        let mut session = session();
        let id = session
            .draw_path(&z_stroke(-3.5, 3.5), &side_projector(), false)
            .unwrap();
        assert_eq!(session.path(id).unwrap().cuts().len(), 5);

        let (verts, faces) = session.finalize().unwrap();
        assert_eq!(verts.len(), 40);
        assert_eq!(faces.len(), 32);
        for face in &faces {
            for &i in face.indices() {
                assert!((i as usize) < verts.len());
            }
        }
    }

    #[test]
    fn disjoint_paths_get_global_indices() {
        let mut session = session();
        session
            .draw_path(&z_stroke(-3.5, -1.0), &side_projector(), false)
            .unwrap();
        session
            .draw_path(&z_stroke(1.0, 3.5), &side_projector(), false)
            .unwrap();
        assert_eq!(session.path_count(), 2);

        let (verts, faces) = session.finalize().unwrap();
        assert_eq!(verts.len(), 80);
        assert_eq!(faces.len(), 64);
        let high_faces = faces
            .iter()
            .filter(|f| f.indices().iter().all(|&i| i >= 40))
            .count();
        assert_eq!(high_faces, 32, "second path must index its own chunk");
    }

    #[test]
    fn close_strokes_merge_into_one_path() {
        let mut session = session();
        let first = session
            .draw_path(&z_stroke(-3.5, -0.2), &side_projector(), false)
            .unwrap();
        let second = session
            .draw_path(&z_stroke(0.2, 3.5), &side_projector(), false)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(session.path_count(), 1);
        assert_eq!(session.path(first).unwrap().cuts().len(), 10);
    }

    #[test]
    fn force_new_keeps_paths_apart() {
        let mut session = session();
        let first = session
            .draw_path(&z_stroke(-3.5, -0.2), &side_projector(), false)
            .unwrap();
        let second = session
            .draw_path(&z_stroke(0.2, 3.5), &side_projector(), true)
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(session.path_count(), 2);
    }

    #[test]
    fn placed_cut_joins_nearby_path() {
        let mut session = session();
        let id = session
            .draw_path(&z_stroke(-3.5, 3.5), &side_projector(), false)
            .unwrap();
        let joined = session
            .place_cut(
                Point2::new(0.9, -8.0),
                Point2::new(0.9, 8.0),
                &side_projector(),
                false,
            )
            .unwrap();
        assert_eq!(joined, id);
        assert_eq!(session.path(id).unwrap().cuts().len(), 6);
    }

    #[test]
    fn far_cut_starts_a_new_path() {
        let mut session = session();
        let id = session
            .draw_path(&z_stroke(-3.5, -1.0), &side_projector(), false)
            .unwrap();
        let other = session
            .place_cut(
                Point2::new(3.4, -8.0),
                Point2::new(3.4, 8.0),
                &side_projector(),
                false,
            )
            .unwrap();
        assert_ne!(other, id);
        assert_eq!(session.path_count(), 2);
        assert_eq!(session.path(other).unwrap().cuts().len(), 1);
    }

    #[test]
    fn undo_steps_back_through_edits() {
        let mut session = session();
        session
            .draw_path(&z_stroke(-3.5, -1.0), &side_projector(), false)
            .unwrap();
        session
            .place_cut(
                Point2::new(3.4, -8.0),
                Point2::new(3.4, 8.0),
                &side_projector(),
                false,
            )
            .unwrap();
        assert_eq!(session.path_count(), 2);

        assert!(session.undo());
        assert_eq!(session.path_count(), 1);
        assert!(session.undo());
        assert_eq!(session.path_count(), 0);
        assert!(!session.undo());
    }

    #[test]
    fn scrubbed_shifts_undo_as_one_step() {
        let mut session = session();
        let id = session
            .draw_path(&z_stroke(-3.5, 3.5), &side_projector(), false)
            .unwrap();
        let before = session.path(id).unwrap().cuts()[2].shift();

        session.shift_cut(id, 2, before + 0.5).unwrap();
        session.shift_cut(id, 2, before + 1.0).unwrap();
        session.shift_cut(id, 2, before + 1.5).unwrap();
        assert_eq!(session.undo_available(), 2);

        assert!(session.undo());
        let restored = session.path(id).unwrap().cuts()[2].shift();
        assert!((restored - before).abs() < 1e-12);
    }

    #[test]
    fn failed_edit_leaves_state_and_history_untouched() {
        let mut session = session();
        let id = session
            .draw_path(&z_stroke(-3.5, 3.5), &side_projector(), false)
            .unwrap();
        let history = session.undo_available();

        assert!(session.shift_cut(id, 99, 1.0).is_err());
        assert_eq!(session.undo_available(), history);
        assert_eq!(session.path(id).unwrap().cuts().len(), 5);
    }

    #[test]
    fn selection_follows_edits_and_stale_ids_read_as_none() {
        let mut session = session();
        assert_eq!(session.selected(), None);

        let id = session
            .draw_path(&z_stroke(-3.5, -1.0), &side_projector(), false)
            .unwrap();
        assert_eq!(session.selected(), Some(id));

        let other = session
            .draw_path(&z_stroke(1.0, 3.5), &side_projector(), true)
            .unwrap();
        assert_eq!(session.selected(), Some(other));

        // Removal leaves the selection pointing at a retired id
        session.remove_path(other).unwrap();
        assert_eq!(session.selected(), None);
        session.select_path(id).unwrap();
        assert_eq!(session.selected(), Some(id));
    }

    #[test]
    fn undo_restores_selection() {
        let mut session = session();
        let first = session
            .draw_path(&z_stroke(-3.5, -1.0), &side_projector(), false)
            .unwrap();
        assert_eq!(session.selected(), Some(first));

        let second = session
            .draw_path(&z_stroke(1.0, 3.5), &side_projector(), true)
            .unwrap();
        assert_eq!(session.selected(), Some(second));

        // Undo revives the pre-edit selection along with the graph
        assert!(session.undo());
        assert_eq!(session.path_count(), 1);
        assert_eq!(session.selected(), Some(first));

        assert!(session.undo());
        assert_eq!(session.path_count(), 0);
        assert_eq!(session.selected(), None);
    }

    #[test]
    fn merge_paths_retires_the_donor() {
        let mut session = session();
        let low = session
            .draw_path(&z_stroke(-3.5, -1.0), &side_projector(), false)
            .unwrap();
        let high = session
            .draw_path(&z_stroke(1.0, 3.5), &side_projector(), false)
            .unwrap();

        session.merge_paths(low, high).unwrap();
        assert_eq!(session.path_count(), 1);
        assert_eq!(session.path(low).unwrap().cuts().len(), 10);
        assert!(session.path(high).is_err());
        assert!(session.merge_paths(low, high).is_err());
    }

    #[test]
    fn surface_swap_is_fingerprint_gated() {
        let mut session = session();
        session
            .draw_path(&z_stroke(-3.5, 3.5), &side_projector(), false)
            .unwrap();

        assert!(!session.replace_surface(tube()));

        // A wider tube moves every ring outward on recut
        let wide = test_meshes::cylinder(6.0, -4.0, 4.0, 64, 4);
        assert!(session.replace_surface(wide));
        assert_eq!(session.undo_available(), 0);

        let id = session.path_ids().next().unwrap();
        for cut in session.path(id).unwrap().cuts() {
            for v in cut.verts_simple() {
                let r = (v.x * v.x + v.y * v.y).sqrt();
                assert!((r - 6.0).abs() < 0.2, "radius = {r}");
            }
        }
    }
}
