//! Registry of mounted surfaces
use crate::batch::BatchMountItem;
use crate::errors::Result;
use crate::surface::SurfaceMountingManager;
use crate::types::SurfaceId;
use log::debug;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Default)]
pub struct MountingManager {
    surfaces: HashMap<SurfaceId, SurfaceMountingManager>,
}

impl MountingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a surface, replacing any previous surface with the same id.
    pub fn start_surface(&mut self, surface_id: SurfaceId) -> &mut SurfaceMountingManager {
        debug!("MountingManager: starting surface [{}]", surface_id);
        let surface = SurfaceMountingManager::new(surface_id);
        match self.surfaces.entry(surface_id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().stop();
                entry.insert(surface);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(surface),
        }
    }

    /// Stops and forgets a surface. Batches that arrive for it afterwards are skipped.
    pub fn stop_surface(&mut self, surface_id: SurfaceId) -> bool {
        match self.surfaces.remove(&surface_id) {
            Some(mut surface) => {
                surface.stop();
                true
            }
            None => false,
        }
    }

    pub fn surface(&self, surface_id: SurfaceId) -> Option<&SurfaceMountingManager> {
        self.surfaces.get(&surface_id)
    }

    pub fn surface_mut(&mut self, surface_id: SurfaceId) -> Option<&mut SurfaceMountingManager> {
        self.surfaces.get_mut(&surface_id)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn execute(&mut self, batch: &BatchMountItem) -> Result<()> {
        batch.execute(self)
    }
}
