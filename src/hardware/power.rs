// Motor keep-alive held for the duration of a whole scan or recovery run.

use super::{FluxCodec, FluxDevice};
use crate::adapter::SectorFluxAdapter;
use crate::FluxResult;
use std::ops::{Deref, DerefMut};

/// Spins the drive motor up on acquire and down when dropped, on every exit
/// path. Derefs to the adapter so the run performs all I/O through it.
pub struct PowerGuard<'a, D: FluxDevice, C: FluxCodec> {
    adapter: &'a mut SectorFluxAdapter<D, C>,
}

impl<'a, D: FluxDevice, C: FluxCodec> PowerGuard<'a, D, C> {
    pub fn acquire(adapter: &'a mut SectorFluxAdapter<D, C>) -> FluxResult<Self> {
        adapter.device_mut().motor_on()?;
        tracing::debug!("Drive motor on");
        Ok(Self { adapter })
    }
}

impl<D: FluxDevice, C: FluxCodec> Deref for PowerGuard<'_, D, C> {
    type Target = SectorFluxAdapter<D, C>;

    fn deref(&self) -> &Self::Target {
        self.adapter
    }
}

impl<D: FluxDevice, C: FluxCodec> DerefMut for PowerGuard<'_, D, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.adapter
    }
}

impl<D: FluxDevice, C: FluxCodec> Drop for PowerGuard<'_, D, C> {
    fn drop(&mut self) {
        match self.adapter.device_mut().motor_off() {
            Ok(()) => tracing::debug!("Drive motor off"),
            Err(e) => tracing::warn!(error = %e, "Failed to stop drive motor"),
        }
    }
}
