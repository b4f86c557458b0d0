//! Virtual keyboard backed by the kernel's uinput interface.
//!
//! Setup sequence, per `linux/uinput.h`:
//!
//! 1. Open `/dev/uinput` write-only.
//! 2. `UI_SET_EVBIT(EV_KEY)` to enable key events, then one
//!    `UI_SET_KEYBIT` per keycode the device may ever emit.
//! 3. `UI_DEV_SETUP` with the device identity, then `UI_DEV_CREATE`.
//!
//! After creation the kernel exposes a new input device node and every
//! `input_event` written to the fd is delivered to the input subsystem
//! exactly as if a physical keyboard had produced it.  A key event
//! takes effect only after a following `EV_SYN`/`SYN_REPORT`, so
//! [`UinputKeyboard::inject`] always writes the pair, under a lock so
//! concurrent sessions cannot interleave their pairs.
//!
//! Creating the device requires root or an appropriate udev rule on
//! `/dev/uinput`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info, warn};

use webkey_core::keymap;
use webkey_core::KeyAction;

use crate::application::KeyboardSink;
use crate::domain::DeviceIdentity;

const UINPUT_PATH: &str = "/dev/uinput";

// ioctl request numbers from linux/uinput.h.
const UI_SET_EVBIT: libc::c_ulong = 0x4004_5564; // _IOW('U', 100, int)
const UI_SET_KEYBIT: libc::c_ulong = 0x4004_5565; // _IOW('U', 101, int)
const UI_DEV_SETUP: libc::c_ulong = 0x405c_5503; // _IOW('U', 3, struct uinput_setup)
const UI_DEV_CREATE: libc::c_ulong = 0x0000_5501; // _IO('U', 1)
const UI_DEV_DESTROY: libc::c_ulong = 0x0000_5502; // _IO('U', 2)

// Event types and codes from linux/input-event-codes.h.
const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const SYN_REPORT: u16 = 0;

const BUS_VIRTUAL: u16 = 0x06;

/// `UINPUT_MAX_NAME_SIZE` from linux/uinput.h.
const MAX_NAME_SIZE: usize = 80;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open {UINPUT_PATH} (is uinput loaded, and are we root?)")]
    Open(#[source] io::Error),

    #[error("ioctl {name} failed")]
    Ioctl {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

// ── Kernel ABI structs ────────────────────────────────────────────────────────

/// `struct input_event` from linux/input.h.
#[repr(C)]
struct InputEvent {
    time: libc::timeval,
    kind: u16,
    code: u16,
    value: i32,
}

impl InputEvent {
    /// The kernel fills in the timestamp on write; zero is fine.
    fn new(kind: u16, code: u16, value: i32) -> Self {
        Self {
            time: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            kind,
            code,
            value,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        // Plain-old-data repr(C) struct; safe to view as bytes.
        unsafe {
            std::slice::from_raw_parts(
                (self as *const Self).cast::<u8>(),
                std::mem::size_of::<Self>(),
            )
        }
    }
}

/// `struct input_id` from linux/input.h.
#[repr(C)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

/// `struct uinput_setup` from linux/uinput.h.
#[repr(C)]
struct UinputSetup {
    id: InputId,
    name: [u8; MAX_NAME_SIZE],
    ff_effects_max: u32,
}

impl UinputSetup {
    fn new(identity: &DeviceIdentity) -> Self {
        let mut name = [0u8; MAX_NAME_SIZE];
        // Truncate to 79 bytes so the buffer stays NUL-terminated.
        let bytes = identity.name.as_bytes();
        let len = bytes.len().min(MAX_NAME_SIZE - 1);
        name[..len].copy_from_slice(&bytes[..len]);

        Self {
            id: InputId {
                bustype: BUS_VIRTUAL,
                vendor: identity.vendor,
                product: identity.product,
                version: identity.version,
            },
            name,
            ff_effects_max: 0,
        }
    }
}

// ── Event pair writer ─────────────────────────────────────────────────────────

/// Writes (key event, report sync) pairs to a byte sink.
///
/// The lock is held across both writes of a pair: a key event only
/// takes effect at the following `SYN_REPORT`, so another session's
/// event landing between the two would be merged into the wrong
/// report.  Generic over the sink so tests can observe the exact
/// write sequence without a kernel device.
struct EventWriter<W> {
    dst: Mutex<W>,
}

impl<W: Write> EventWriter<W> {
    fn new(dst: W) -> Self {
        Self {
            dst: Mutex::new(dst),
        }
    }

    fn write_pair(&self, code: u16, action: KeyAction) -> io::Result<()> {
        let key = InputEvent::new(EV_KEY, code, action.value());
        let syn = InputEvent::new(EV_SYN, SYN_REPORT, 0);

        let mut dst = self.dst.lock().unwrap_or_else(|e| e.into_inner());
        dst.write_all(key.as_bytes())?;
        dst.write_all(syn.as_bytes())?;
        Ok(())
    }
}

// ── Device handle ─────────────────────────────────────────────────────────────

/// A registered uinput keyboard.  Destroyed on drop.
pub struct UinputKeyboard {
    events: EventWriter<File>,
}

impl UinputKeyboard {
    /// Opens `/dev/uinput`, declares the capability set from the
    /// symbol table, and registers the device.
    ///
    /// # Errors
    ///
    /// [`DeviceError`] if the device node cannot be opened or any setup
    /// ioctl fails.  The daemon treats this as fatal at startup.
    pub fn create(identity: &DeviceIdentity) -> Result<Self, DeviceError> {
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(UINPUT_PATH)
            .map_err(DeviceError::Open)?;
        let fd = file.as_raw_fd();

        ioctl_int(fd, UI_SET_EVBIT, "UI_SET_EVBIT", EV_KEY as libc::c_int)?;

        // Declare exactly the keys the symbol table can produce.  The
        // kernel rejects writes for undeclared codes, which is what we
        // want for anything outside the table.
        let mut declared = 0usize;
        for code in keymap::mapped_codes() {
            ioctl_int(fd, UI_SET_KEYBIT, "UI_SET_KEYBIT", code as libc::c_int)?;
            declared += 1;
        }
        debug!("declared {declared} key capabilities");

        let setup = UinputSetup::new(identity);
        ioctl_ptr(fd, UI_DEV_SETUP, "UI_DEV_SETUP", &setup)?;
        ioctl_bare(fd, UI_DEV_CREATE, "UI_DEV_CREATE")?;

        info!(
            "virtual keyboard \"{}\" registered (vendor={:#06x}, product={:#06x})",
            identity.name, identity.vendor, identity.product
        );

        Ok(Self {
            events: EventWriter::new(file),
        })
    }
}

impl KeyboardSink for UinputKeyboard {
    fn inject(&self, code: u16, action: KeyAction) -> io::Result<()> {
        self.events.write_pair(code, action)
    }
}

impl Drop for UinputKeyboard {
    fn drop(&mut self) {
        let file = self.events.dst.lock().unwrap_or_else(|e| e.into_inner());
        // Closing the fd would destroy the device anyway; the explicit
        // ioctl makes teardown visible in strace and logs.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), UI_DEV_DESTROY as _) };
        if rc < 0 {
            warn!(
                "UI_DEV_DESTROY failed: {}",
                io::Error::last_os_error()
            );
        } else {
            info!("virtual keyboard destroyed");
        }
    }
}

// ── ioctl helpers ─────────────────────────────────────────────────────────────

fn ioctl_int(
    fd: libc::c_int,
    request: libc::c_ulong,
    name: &'static str,
    arg: libc::c_int,
) -> Result<(), DeviceError> {
    let rc = unsafe { libc::ioctl(fd, request as _, arg) };
    check_ioctl(rc, name)
}

fn ioctl_ptr<T>(
    fd: libc::c_int,
    request: libc::c_ulong,
    name: &'static str,
    arg: &T,
) -> Result<(), DeviceError> {
    let rc = unsafe { libc::ioctl(fd, request as _, arg as *const T) };
    check_ioctl(rc, name)
}

fn ioctl_bare(fd: libc::c_int, request: libc::c_ulong, name: &'static str) -> Result<(), DeviceError> {
    let rc = unsafe { libc::ioctl(fd, request as _) };
    check_ioctl(rc, name)
}

fn check_ioctl(rc: libc::c_int, name: &'static str) -> Result<(), DeviceError> {
    if rc < 0 {
        return Err(DeviceError::Ioctl {
            name,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
