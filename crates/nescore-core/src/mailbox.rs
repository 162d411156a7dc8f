//! Lock-free mailboxes connecting the emulation core to its surrounding threads.
//!
//! The core itself never reaches across these: an [`crate::Console`] is driven
//! synchronously by whichever thread owns it. These types exist so that thread,
//! the render thread, and the main/coordinator thread can hand data across
//! without a lock on the hot path, per the concurrency model described in the
//! crate-level documentation.
//!
//! - Latest-value-wins data (controller state, status) uses
//!   [`crossbeam_utils::atomic::AtomicCell`].
//! - FIFO command/event streams use bounded [`crossbeam_channel`] queues.
//! - The frame buffer uses a dedicated double-buffer swap, since a 256x240
//!   RGBA frame is too large to push through an `AtomicCell` by value.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use crossbeam_utils::atomic::AtomicCell;

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::screen;

/// Latest-value-wins mailbox for a single controller's button byte.
///
/// The main thread posts the most recently decoded button state; the
/// emulation thread reads whatever was posted last at the start of each
/// controller-strobe sequence. There is no queueing: an unread value is
/// simply overwritten by the next `post`.
#[derive(Debug)]
pub struct ControllerInputMailbox {
    controller1: AtomicCell<u8>,
    controller2: AtomicCell<u8>,
}

impl ControllerInputMailbox {
    /// Create a mailbox with both controllers reporting no buttons pressed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            controller1: AtomicCell::new(0),
            controller2: AtomicCell::new(0),
        }
    }

    /// Post the latest controller 1 byte (main/input thread side).
    pub fn post_controller1(&self, buttons: u8) {
        self.controller1.store(buttons);
    }

    /// Post the latest controller 2 byte (main/input thread side).
    pub fn post_controller2(&self, buttons: u8) {
        self.controller2.store(buttons);
    }

    /// Read the latest controller 1 byte (emulation thread side).
    #[must_use]
    pub fn read_controller1(&self) -> u8 {
        self.controller1.load()
    }

    /// Read the latest controller 2 byte (emulation thread side).
    #[must_use]
    pub fn read_controller2(&self) -> u8 {
        self.controller2.load()
    }
}

impl Default for ControllerInputMailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Emulation speed mode, carried by `EmulationCommand::SetSpeed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedMode {
    /// Run at the region's native frame rate.
    Realtime,
    /// Run at `n` times native speed, skipping the frame pacing sleep.
    FastForward(u32),
    /// Run at `1/n` of native speed.
    SlowMo(u32),
    /// Do not advance frames until resumed.
    Paused,
    /// Advance exactly one unit (instruction or frame) per `Step` command.
    Stepping,
}

/// Commands the main thread posts to control overall emulation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulationCommand {
    /// Cold-boot the loaded cartridge.
    PowerOn,
    /// Run the CPU reset sequence.
    Reset,
    /// Stop advancing frames.
    Pause,
    /// Resume advancing frames.
    Resume,
    /// Change the pacing mode.
    SetSpeed(SpeedMode),
}

/// FIFO mailbox of [`EmulationCommand`]s, main thread to emulation thread.
pub struct EmulationCommandMailbox {
    tx: Sender<EmulationCommand>,
    rx: Receiver<EmulationCommand>,
}

impl EmulationCommandMailbox {
    /// Create a mailbox with the given fixed capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Post a command (main thread side). Drops the command and reports
    /// failure if the mailbox is full rather than blocking the caller.
    ///
    /// # Errors
    ///
    /// Returns the command back if the mailbox is full or disconnected.
    pub fn post(&self, command: EmulationCommand) -> Result<(), EmulationCommand> {
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(c) | TrySendError::Disconnected(c)) => Err(c),
        }
    }

    /// Drain every pending command (emulation thread side). Called between
    /// frames, never mid-frame.
    pub fn drain(&self) -> impl Iterator<Item = EmulationCommand> + '_ {
        self.rx.try_iter()
    }
}

/// A breakpoint or watchpoint address, carried by [`DebugCommand`].
pub type WatchAddress = u16;

/// Commands the main thread posts to the debugger front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCommand {
    /// Arm a breakpoint at a CPU address.
    AddBreakpoint(WatchAddress),
    /// Arm a watchpoint at a bus address.
    AddWatchpoint(WatchAddress),
    /// Disarm a previously added breakpoint.
    RemoveBreakpoint(WatchAddress),
    /// Disarm a previously added watchpoint.
    RemoveWatchpoint(WatchAddress),
    /// Advance exactly one CPU instruction.
    StepInstruction,
    /// Advance exactly one video frame.
    StepFrame,
    /// Request an inspection snapshot be posted to the event mailbox.
    Inspect,
    /// Clear every armed breakpoint and watchpoint.
    Clear,
}

/// FIFO mailbox of [`DebugCommand`]s, main thread to emulation thread.
pub struct DebugCommandMailbox {
    tx: Sender<DebugCommand>,
    rx: Receiver<DebugCommand>,
}

impl DebugCommandMailbox {
    /// Create a mailbox with the given fixed capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Post a command (main thread side).
    ///
    /// # Errors
    ///
    /// Returns the command back if the mailbox is full or disconnected.
    pub fn post(&self, command: DebugCommand) -> Result<(), DebugCommand> {
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(c) | TrySendError::Disconnected(c)) => Err(c),
        }
    }

    /// Drain every pending command (emulation thread side).
    pub fn drain(&self) -> impl Iterator<Item = DebugCommand> + '_ {
        self.rx.try_iter()
    }
}

/// Immutable CPU register snapshot attached to a debug event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSnapshot {
    /// Accumulator.
    pub a: u8,
    /// X index register.
    pub x: u8,
    /// Y index register.
    pub y: u8,
    /// Stack pointer.
    pub sp: u8,
    /// Program counter.
    pub pc: u16,
    /// Status flags.
    pub p: u8,
    /// Master cycle count at the time of the event.
    pub cycle: u64,
    /// Frame count at the time of the event.
    pub frame: u64,
}

/// Fixed-size reason buffer for a debug event, avoiding an allocation on the
/// hot path. Unused trailing bytes are zero.
pub const DEBUG_REASON_LEN: usize = 128;

/// One breakpoint/watchpoint hit, carrying an immutable CPU snapshot.
#[derive(Debug, Clone, Copy)]
pub struct DebugEvent {
    /// Register state at the moment of the hit.
    pub snapshot: CpuSnapshot,
    /// Human-readable reason, e.g. "breakpoint @ $C000".
    pub reason: [u8; DEBUG_REASON_LEN],
    /// Length of the meaningful prefix of `reason`.
    pub reason_len: u8,
}

impl DebugEvent {
    /// Build an event from a snapshot and a reason string, truncating the
    /// reason to fit the fixed buffer.
    #[must_use]
    pub fn new(snapshot: CpuSnapshot, reason: &str) -> Self {
        let mut buf = [0u8; DEBUG_REASON_LEN];
        let bytes = reason.as_bytes();
        let len = bytes.len().min(DEBUG_REASON_LEN);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self {
            snapshot,
            reason: buf,
            reason_len: len as u8,
        }
    }

    /// Borrow the reason as a string slice.
    #[must_use]
    pub fn reason_str(&self) -> &str {
        core::str::from_utf8(&self.reason[..self.reason_len as usize]).unwrap_or("")
    }
}

/// FIFO mailbox of [`DebugEvent`]s, emulation thread to main thread.
pub struct DebugEventMailbox {
    tx: Sender<DebugEvent>,
    rx: Receiver<DebugEvent>,
}

impl DebugEventMailbox {
    /// Create a mailbox with the given fixed capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Post an event (emulation thread side).
    ///
    /// # Errors
    ///
    /// Returns the event back if the mailbox is full or disconnected.
    pub fn post(&self, event: DebugEvent) -> Result<(), DebugEvent> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(e) | TrySendError::Disconnected(e)) => Err(e),
        }
    }

    /// Drain every pending event (main thread side).
    pub fn drain(&self) -> impl Iterator<Item = DebugEvent> + '_ {
        self.rx.try_iter()
    }
}

/// Current FPS and cycle counters, posted by the emulation thread.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Status {
    /// Frames rendered per second, smoothed by the emulation thread.
    pub fps: f32,
    /// Total master cycles since power-on.
    pub master_cycles: u64,
    /// Total frames completed since power-on.
    pub frame_count: u64,
}

/// Latest-value-wins mailbox for emulation status, emulation thread to main.
#[derive(Debug, Default)]
pub struct StatusMailbox {
    latest: AtomicCell<Status>,
}

impl StatusMailbox {
    /// Create a mailbox with a zeroed status.
    #[must_use]
    pub fn new() -> Self {
        Self {
            latest: AtomicCell::new(Status::default()),
        }
    }

    /// Post the latest status (emulation thread side).
    pub fn post(&self, status: Status) {
        self.latest.store(status);
    }

    /// Read the latest status (main thread side).
    #[must_use]
    pub fn read(&self) -> Status {
        self.latest.load()
    }
}

/// A window-system event posted by the render thread to the main thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The window was resized to the given pixel dimensions.
    Resized(u32, u32),
    /// The user requested the window be closed.
    CloseRequested,
    /// The window gained or lost input focus.
    FocusChanged(bool),
}

/// FIFO mailbox of [`WindowEvent`]s, render thread to main thread.
pub struct WindowEventMailbox {
    tx: Sender<WindowEvent>,
    rx: Receiver<WindowEvent>,
}

impl WindowEventMailbox {
    /// Create a mailbox with the given fixed capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Post an event (render thread side).
    ///
    /// # Errors
    ///
    /// Returns the event back if the mailbox is full or disconnected.
    pub fn post(&self, event: WindowEvent) -> Result<(), WindowEvent> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(e) | TrySendError::Disconnected(e)) => Err(e),
        }
    }

    /// Drain every pending event (main thread side).
    pub fn drain(&self) -> impl Iterator<Item = WindowEvent> + '_ {
        self.rx.try_iter()
    }
}

/// A raw key press/release, carrying an opaque platform keysym.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// A key was pressed, identified by an opaque keysym integer.
    KeyDown(u32),
    /// A key was released, identified by an opaque keysym integer.
    KeyUp(u32),
}

/// FIFO mailbox of raw [`InputEvent`]s, render thread to main thread.
///
/// The main/coordinator thread decodes these into a controller byte before
/// they cross into [`ControllerInputMailbox`]; the core never sees a keysym.
pub struct InputEventMailbox {
    tx: Sender<InputEvent>,
    rx: Receiver<InputEvent>,
}

impl InputEventMailbox {
    /// Create a mailbox with the given fixed capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Post an event (render thread side).
    ///
    /// # Errors
    ///
    /// Returns the event back if the mailbox is full or disconnected.
    pub fn post(&self, event: InputEvent) -> Result<(), InputEvent> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(e) | TrySendError::Disconnected(e)) => Err(e),
        }
    }

    /// Drain every pending event (main thread side).
    pub fn drain(&self) -> impl Iterator<Item = InputEvent> + '_ {
        self.rx.try_iter()
    }
}

/// Double-buffered 256x240 RGBA frame mailbox, emulation thread to render.
///
/// The emulation thread writes into whichever buffer the render thread is
/// *not* currently holding, then swaps and raises `has_new_frame`. The swap
/// is the only synchronization point; the render thread never blocks the
/// emulation thread and may simply miss a frame if it falls behind
/// (latest-wins).
pub struct FrameMailbox {
    buffers: [Vec<AtomicCell<u8>>; 2],
    write_index: AtomicCell<usize>,
    has_new_frame: AtomicCell<bool>,
}

impl FrameMailbox {
    /// Create a mailbox with both buffers zeroed (opaque black).
    #[must_use]
    pub fn new() -> Self {
        let make_buffer = || {
            (0..screen::FRAMEBUFFER_SIZE)
                .map(|_| AtomicCell::new(0u8))
                .collect::<Vec<_>>()
        };
        Self {
            buffers: [make_buffer(), make_buffer()],
            write_index: AtomicCell::new(0),
            has_new_frame: AtomicCell::new(false),
        }
    }

    /// Publish a completed frame (emulation thread side). `frame` must be
    /// exactly [`screen::FRAMEBUFFER_SIZE`] bytes of row-major BGRA pixels.
    pub fn publish(&self, frame: &[u8]) {
        debug_assert_eq!(frame.len(), screen::FRAMEBUFFER_SIZE);
        let idx = self.write_index.load();
        let target = &self.buffers[idx];
        for (slot, &byte) in target.iter().zip(frame) {
            slot.store(byte);
        }
        self.write_index.store(1 - idx);
        self.has_new_frame.store(true);
    }

    /// Returns true if a frame has been published since the last `consume`.
    #[must_use]
    pub fn has_new_frame(&self) -> bool {
        self.has_new_frame.load()
    }

    /// Copy the most recently published frame into `out` (render thread
    /// side) and clear the new-frame flag. `out` must be exactly
    /// [`screen::FRAMEBUFFER_SIZE`] bytes.
    pub fn consume(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), screen::FRAMEBUFFER_SIZE);
        // The stable buffer is the one the emulation thread is NOT writing.
        let stable = 1 - self.write_index.load();
        let source = &self.buffers[stable];
        for (slot, out_byte) in source.iter().zip(out.iter_mut()) {
            *out_byte = slot.load();
        }
        self.has_new_frame.store(false);
    }
}

impl Default for FrameMailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "std"))]
    use alloc::vec;

    #[test]
    fn controller_mailbox_latest_value_wins() {
        let mailbox = ControllerInputMailbox::new();
        mailbox.post_controller1(0x01);
        mailbox.post_controller1(0x09);
        assert_eq!(mailbox.read_controller1(), 0x09);
        assert_eq!(mailbox.read_controller2(), 0);
    }

    #[test]
    fn emulation_command_mailbox_fifo_order() {
        let mailbox = EmulationCommandMailbox::with_capacity(4);
        mailbox.post(EmulationCommand::PowerOn).unwrap();
        mailbox.post(EmulationCommand::Reset).unwrap();
        let drained: Vec<_> = mailbox.drain().collect();
        assert_eq!(
            drained,
            vec![EmulationCommand::PowerOn, EmulationCommand::Reset]
        );
    }

    #[test]
    fn emulation_command_mailbox_reports_full() {
        let mailbox = EmulationCommandMailbox::with_capacity(1);
        mailbox.post(EmulationCommand::PowerOn).unwrap();
        let err = mailbox.post(EmulationCommand::Reset);
        assert_eq!(err, Err(EmulationCommand::Reset));
    }

    #[test]
    fn debug_event_reason_truncates_to_fixed_buffer() {
        let snapshot = CpuSnapshot {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0x8000,
            p: 0x24,
            cycle: 0,
            frame: 0,
        };
        let long_reason = "x".repeat(DEBUG_REASON_LEN + 16);
        let event = DebugEvent::new(snapshot, &long_reason);
        assert_eq!(event.reason_len as usize, DEBUG_REASON_LEN);
        assert_eq!(event.reason_str().len(), DEBUG_REASON_LEN);
    }

    #[test]
    fn status_mailbox_overwrites_latest() {
        let mailbox = StatusMailbox::new();
        mailbox.post(Status {
            fps: 60.0,
            master_cycles: 100,
            frame_count: 1,
        });
        mailbox.post(Status {
            fps: 59.8,
            master_cycles: 200,
            frame_count: 2,
        });
        let status = mailbox.read();
        assert_eq!(status.frame_count, 2);
        assert!((status.fps - 59.8).abs() < f32::EPSILON);
    }

    #[test]
    fn frame_mailbox_publish_and_consume_roundtrip() {
        let mailbox = FrameMailbox::new();
        assert!(!mailbox.has_new_frame());

        let mut frame = vec![0u8; screen::FRAMEBUFFER_SIZE];
        frame[0] = 0xAB;
        frame[screen::FRAMEBUFFER_SIZE - 1] = 0xCD;
        mailbox.publish(&frame);
        assert!(mailbox.has_new_frame());

        let mut out = vec![0u8; screen::FRAMEBUFFER_SIZE];
        mailbox.consume(&mut out);
        assert_eq!(out[0], 0xAB);
        assert_eq!(out[screen::FRAMEBUFFER_SIZE - 1], 0xCD);
        assert!(!mailbox.has_new_frame());
    }

    #[test]
    fn frame_mailbox_latest_wins_on_dropped_frame() {
        let mailbox = FrameMailbox::new();
        let mut frame_a = vec![0u8; screen::FRAMEBUFFER_SIZE];
        frame_a[0] = 1;
        let mut frame_b = vec![0u8; screen::FRAMEBUFFER_SIZE];
        frame_b[0] = 2;

        mailbox.publish(&frame_a);
        mailbox.publish(&frame_b);

        let mut out = vec![0u8; screen::FRAMEBUFFER_SIZE];
        mailbox.consume(&mut out);
        assert_eq!(out[0], 2);
    }

    #[test]
    fn window_and_input_event_mailboxes_drain_in_order() {
        let windows = WindowEventMailbox::with_capacity(4);
        windows.post(WindowEvent::Resized(640, 480)).unwrap();
        windows.post(WindowEvent::FocusChanged(true)).unwrap();
        let events: Vec<_> = windows.drain().collect();
        assert_eq!(
            events,
            vec![
                WindowEvent::Resized(640, 480),
                WindowEvent::FocusChanged(true)
            ]
        );

        let inputs = InputEventMailbox::with_capacity(4);
        inputs.post(InputEvent::KeyDown(0x41)).unwrap();
        inputs.post(InputEvent::KeyUp(0x41)).unwrap();
        let events: Vec<_> = inputs.drain().collect();
        assert_eq!(
            events,
            vec![InputEvent::KeyDown(0x41), InputEvent::KeyUp(0x41)]
        );
    }
}
