//! Simulated Festo drive for integration tests.
//!
//! The simulator answers register reads and writes the way an FHPP drive
//! does, advancing a motion task by one step each time it reports status:
//! acknowledged, moving, complete.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use festo_fhpp::frame::{DirectRequest, DirectStatus, RecordSelectStatus, FRAME_WORDS};
use festo_fhpp::{
    Ccon, Cpos, Drive, FhppError, RegisterTransport, Result, Scon, Sdir, Spos, Tuning,
};
use parking_lot::Mutex;

/// Drive units per record number when a record is started.
pub const RECORD_STEP: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Idle,
    Acknowledged,
    Moving,
    Halted,
}

#[derive(Debug)]
struct State {
    connected: bool,
    ccon: Ccon,
    cpos: Cpos,
    speed: u8,
    setpoint: i32,
    record: u8,
    fault: bool,
    persistent_fault: bool,
    warning: bool,
    externally_locked: bool,
    referenced: bool,
    never_complete: bool,
    position: i32,
    target: i32,
    homing: bool,
    motion: Motion,
    reads: u32,
    writes: u32,
    write_reads: u32,
    control: Vec<[u16; FRAME_WORDS]>,
}

impl State {
    fn drive_enabled(&self) -> bool {
        self.ccon.contains(Ccon::DRIVE_ENABLE) && !self.externally_locked
    }

    fn operation_enabled(&self) -> bool {
        self.drive_enabled() && self.ccon.contains(Ccon::OPERATION_ENABLE) && !self.fault
    }

    fn halt_released(&self) -> bool {
        self.operation_enabled() && self.cpos.contains(Cpos::HALT_RELEASED)
    }

    fn direct(&self) -> bool {
        self.ccon.contains(Ccon::DIRECT_MODE)
    }

    fn apply(&mut self, words: &[u16]) {
        let mut frame = [0u16; FRAME_WORDS];
        frame.copy_from_slice(words);
        self.control.push(frame);

        let request = DirectRequest::from_words(words).expect("control frame has 4 words");
        let rising_ccon = request.ccon & !self.ccon;
        let rising_cpos = request.cpos & !self.cpos;

        self.ccon = request.ccon;
        self.cpos = request.cpos;
        self.record = request.cdir.bits();
        self.speed = request.speed;
        self.setpoint = request.setpoint;

        if rising_ccon.contains(Ccon::FAULT_RESET) && !self.persistent_fault {
            self.fault = false;
            self.warning = false;
        }

        if !self.operation_enabled() {
            self.motion = Motion::Idle;
            return;
        }

        if !self.halt_released() {
            if matches!(self.motion, Motion::Acknowledged | Motion::Moving) {
                self.motion = Motion::Halted;
            }
            if rising_cpos.contains(Cpos::CLEAR_TASK) && self.motion == Motion::Halted {
                self.motion = Motion::Idle;
            }
            return;
        }

        if rising_cpos.contains(Cpos::START) {
            self.homing = false;
            self.target = if self.direct() {
                self.setpoint
            } else {
                i32::from(self.record) * RECORD_STEP
            };
            self.motion = Motion::Acknowledged;
        } else if rising_cpos.contains(Cpos::HOME) {
            self.homing = true;
            self.target = 0;
            self.motion = Motion::Acknowledged;
        }
    }

    fn report(&mut self) -> Vec<u16> {
        let mut scon = Scon::LOAD_VOLTAGE;
        scon.set(Scon::DRIVE_ENABLED, self.drive_enabled());
        scon.set(Scon::OPERATION_ENABLED, self.operation_enabled());
        scon.set(Scon::FAULT, self.fault);
        scon.set(Scon::WARNING, self.warning);
        scon.set(Scon::EXTERNALLY_LOCKED, self.externally_locked);
        scon.set(Scon::DIRECT_MODE, self.direct());

        let mut spos = Spos::empty();
        spos.set(Spos::HALT_RELEASED, self.halt_released());
        spos.set(Spos::ACK, self.motion == Motion::Acknowledged);
        spos.set(Spos::MOTION_COMPLETE, self.motion == Motion::Idle);
        spos.set(Spos::MOVING, self.motion == Motion::Moving);
        spos.set(Spos::REFERENCED, self.referenced);

        let words = if self.direct() {
            DirectStatus {
                scon,
                spos,
                sdir: Sdir::empty(),
                speed: self.speed,
                position: self.position,
            }
            .to_words()
        } else {
            RecordSelectStatus {
                scon,
                spos,
                record_status: self.record,
            }
            .to_words()
        };
        self.advance();
        words.to_vec()
    }

    fn advance(&mut self) {
        match self.motion {
            Motion::Acknowledged => {
                self.motion = Motion::Moving;
                self.position += (self.target - self.position) / 2;
            }
            Motion::Moving if !self.never_complete => {
                self.motion = Motion::Idle;
                self.position = self.target;
                if self.homing {
                    self.referenced = true;
                    self.homing = false;
                }
            }
            _ => {}
        }
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(FhppError::NotConnected)
        }
    }
}

/// A simulated FHPP drive. Clones share the same drive.
#[derive(Debug, Clone)]
pub struct SimulatedDrive {
    state: Arc<Mutex<State>>,
}

impl Default for SimulatedDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDrive {
    /// A powered, disabled, unreferenced drive at position 0.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                connected: false,
                ccon: Ccon::empty(),
                cpos: Cpos::empty(),
                speed: 0,
                setpoint: 0,
                record: 0,
                fault: false,
                persistent_fault: false,
                warning: false,
                externally_locked: false,
                referenced: false,
                never_complete: false,
                position: 0,
                target: 0,
                homing: false,
                motion: Motion::Idle,
                reads: 0,
                writes: 0,
                write_reads: 0,
                control: Vec::new(),
            })),
        }
    }

    /// Raises a fault. A persistent fault survives fault resets.
    pub fn set_fault(&self, persistent: bool) {
        let mut state = self.state.lock();
        state.fault = true;
        state.persistent_fault = persistent;
    }

    pub fn set_warning(&self) {
        self.state.lock().warning = true;
    }

    pub fn set_externally_locked(&self, locked: bool) {
        self.state.lock().externally_locked = locked;
    }

    /// Keeps started tasks moving forever.
    pub fn set_never_complete(&self) {
        self.state.lock().never_complete = true;
    }

    pub fn set_referenced(&self, position: i32) {
        let mut state = self.state.lock();
        state.referenced = true;
        state.position = position;
    }

    pub fn position(&self) -> i32 {
        self.state.lock().position
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Number of plain status reads.
    pub fn reads(&self) -> u32 {
        self.state.lock().reads
    }

    /// Number of plain writes.
    pub fn writes(&self) -> u32 {
        self.state.lock().writes
    }

    /// Number of write-and-read transactions.
    pub fn write_reads(&self) -> u32 {
        self.state.lock().write_reads
    }

    /// Every control frame written, in order.
    pub fn control_frames(&self) -> Vec<[u16; FRAME_WORDS]> {
        self.state.lock().control.clone()
    }

    pub fn last_control(&self) -> Option<DirectRequest> {
        let state = self.state.lock();
        state
            .control
            .last()
            .map(|words| DirectRequest::from_words(words).expect("control frame has 4 words"))
    }
}

impl RegisterTransport for SimulatedDrive {
    fn connect(&self) -> Result<()> {
        self.state.lock().connected = true;
        Ok(())
    }

    fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    fn read_registers(&self, _address: u16, count: u16) -> Result<Vec<u16>> {
        let mut state = self.state.lock();
        state.check_connected()?;
        assert_eq!(usize::from(count), FRAME_WORDS);
        state.reads += 1;
        Ok(state.report())
    }

    fn write_registers(&self, _address: u16, words: &[u16]) -> Result<()> {
        let mut state = self.state.lock();
        state.check_connected()?;
        state.writes += 1;
        state.apply(words);
        Ok(())
    }

    fn write_and_read_registers(
        &self,
        _write_address: u16,
        words: &[u16],
        _read_address: u16,
        read_count: u16,
    ) -> Result<Vec<u16>> {
        let mut state = self.state.lock();
        state.check_connected()?;
        assert_eq!(usize::from(read_count), FRAME_WORDS);
        state.write_reads += 1;
        state.apply(words);
        Ok(state.report())
    }
}

/// Tuning with short intervals so tests run quickly.
pub fn fast_tuning() -> Tuning {
    Tuning::default()
        .with_poll_interval(Duration::from_millis(2))
        .with_homing_interval(Duration::from_millis(2))
}

/// A connected engine over a fresh simulated drive.
pub fn connected_drive() -> (SimulatedDrive, Drive<SimulatedDrive>) {
    let sim = SimulatedDrive::new();
    let drive = Drive::with_transport(sim.clone(), fast_tuning());
    drive.connect().expect("simulated connect");
    (sim, drive)
}
