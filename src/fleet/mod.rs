//! Fleet-wide control of managed camera handles.
//!
//! Every batch operation visits members one at a time in membership order.
//! A member that fails is recorded and the batch moves on, so one stuck
//! camera never blocks control of the rest.

mod report;

pub use report::{BatchReport, DeviceFailure, FleetError};

use serde::Serialize;
use tracing::debug;

use crate::device::{DeviceHandle, DeviceId, RunState};
use crate::error::{PfError, Result};

/// Run states captured before a pause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetSnapshot {
    pub states: Vec<(DeviceId, RunState)>,
}

impl FleetSnapshot {
    pub fn get(&self, device: DeviceId) -> Option<RunState> {
        self.states
            .iter()
            .find(|(id, _)| *id == device)
            .map(|(_, state)| *state)
    }
}

/// Result of [`FleetManager::pause_all`].
#[derive(Debug, Clone)]
pub struct PauseOutcome {
    /// Pass to [`FleetManager::resume_all`] to restore.
    pub snapshot: FleetSnapshot,
    pub report: BatchReport,
}

/// Owns every constructed handle and the ordered list of managed members.
#[derive(Debug)]
pub struct FleetManager {
    handles: Vec<DeviceHandle>,
    members: Vec<DeviceId>,
}

impl FleetManager {
    /// Build a fleet; every member must have a handle.
    pub fn new(handles: Vec<DeviceHandle>, members: Vec<DeviceId>) -> Result<Self> {
        if let Some(device) = members
            .iter()
            .copied()
            .find(|id| !handles.iter().any(|h| h.id() == *id))
        {
            return Err(PfError::NotAMember { device });
        }
        debug!(
            handles = handles.len(),
            members = members.len(),
            "Fleet assembled"
        );
        Ok(Self { handles, members })
    }

    /// Managed identities in iteration order.
    pub fn member_ids(&self) -> &[DeviceId] {
        &self.members
    }

    /// Managed handles in iteration order.
    pub fn members(&self) -> impl Iterator<Item = &DeviceHandle> {
        self.members
            .iter()
            .filter_map(|id| self.handles.iter().find(|h| h.id() == *id))
    }

    /// Every constructed handle, managed or not.
    pub fn handles(&self) -> &[DeviceHandle] {
        &self.handles
    }

    pub fn handle(&self, device: DeviceId) -> Option<&DeviceHandle> {
        self.handles.iter().find(|h| h.id() == device)
    }

    pub fn handle_mut(&mut self, device: DeviceId) -> Option<&mut DeviceHandle> {
        self.handles.iter_mut().find(|h| h.id() == device)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Apply `op` to every member, sequentially, without stopping on failure.
    pub fn for_each_member<F>(&mut self, operation: &'static str, op: F) -> BatchReport
    where
        F: FnMut(&mut DeviceHandle) -> Result<()>,
    {
        let all = self.members.clone();
        self.apply_to(&all, operation, op)
    }

    /// Apply `op` to the listed members, in membership order.
    ///
    /// Identities that are not members are ignored.
    pub fn apply_to<F>(&mut self, devices: &[DeviceId], operation: &'static str, mut op: F) -> BatchReport
    where
        F: FnMut(&mut DeviceHandle) -> Result<()>,
    {
        let mut report = BatchReport::new();
        for id in self.members.iter().copied().filter(|id| devices.contains(id)) {
            let Some(handle) = self.handles.iter_mut().find(|h| h.id() == id) else {
                continue;
            };
            debug!(device = %id, operation, "Applying fleet operation");
            match op(handle) {
                Ok(()) => report.record_success(id),
                Err(err) => {
                    debug!(device = %id, slot = handle.slot(), operation, error = %err, "Fleet operation failed");
                    report.record_failure(id, handle.slot(), operation, &err);
                }
            }
        }
        report
    }

    /// Current run state of every member.
    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            states: self.members().map(|h| (h.id(), h.run_state())).collect(),
        }
    }

    /// Stop every member: frame grabber first, then program.
    ///
    /// A member whose frame grabber refuses to stop keeps its program
    /// running; the program must never see a half-stopped capture stream.
    pub fn pause_all(&mut self) -> PauseOutcome {
        let snapshot = self.snapshot();
        let report = self.for_each_member("pause", |h| {
            h.stop_frame_grabber()?;
            h.stop_program()
        });
        PauseOutcome { snapshot, report }
    }

    /// Restart members to their pre-pause state: program first, then frame
    /// grabber.
    ///
    /// Subsystems known to be stopped before the pause stay stopped; running
    /// or unknown ones are started.
    pub fn resume_all(&mut self, snapshot: &FleetSnapshot) -> BatchReport {
        self.for_each_member("resume", |h| {
            let before = snapshot.get(h.id()).unwrap_or_default();
            if before.program != Some(false) {
                h.start_program()?;
            }
            if before.frame_grabber != Some(false) {
                h.start_frame_grabber()?;
            }
            Ok(())
        })
    }

    /// Start program then frame grabber on every member.
    pub fn start_all(&mut self) -> BatchReport {
        self.for_each_member("start", |h| {
            h.start_program()?;
            h.start_frame_grabber()
        })
    }

    /// Stop frame grabber then program on every member.
    pub fn stop_all(&mut self) -> BatchReport {
        self.for_each_member("stop", |h| {
            h.stop_frame_grabber()?;
            h.stop_program()
        })
    }

    /// Forget the cached state of every handle (after re-enumeration).
    pub fn forget_state(&mut self) {
        for handle in &mut self.handles {
            handle.forget_state();
        }
    }
}
