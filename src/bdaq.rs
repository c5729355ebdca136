//! Provides a minimal rust wrapper for parts of the Advantech BioDAQ C library.
//!
//! ## Overview
//!
//! Each `Instant*Ctrl` struct below encapsulates a handle to one vendor
//! instant-I/O control object and exposes the thin surface the worker loops
//! need: `write`, `read` and disposal. Handles are created from a
//! [`DeviceDescription`] and released through the `Drop` trait, so the
//! device is disposed on every exit path of the owning worker, not only the
//! happy one.
//!
//! ## Safety and Error Handling
//!
//! All driver calls cross into C and are wrapped in unsafe blocks. The
//! driver reports an `ErrorCode` per call; zero is success. Calls on the
//! realtime path (`write`/`read`) hand the raw code back as a [`BioStatus`]
//! so the loops can log and continue; setup calls translate a failure into
//! [`Error::Device`] instead.
//!
//! This module is only compiled with the `bdaq_sdk` feature and links
//! against the proprietary `biodaq` library, which must be installed with
//! the vendor's device driver.

use libc;

use crate::device::{AiPort, AoPort, BioStatus, DiPort, DoPort};
use crate::error::{Error, Result};
use crate::utils::DeviceDescription;

type CInt32 = libc::c_int;
type CUint8 = libc::c_uchar;
type CFloat64 = libc::c_double;
type CWideChar = libc::wchar_t;
pub type CtrlHandle = *mut libc::c_void;

const DESCRIPTION_LEN: usize = 64;
const MODE_WRITE_WITH_RESET: CInt32 = 0;

/// Mirror of the driver's `DeviceInformation` argument.
#[repr(C)]
struct DeviceInformation {
    device_number: CInt32,
    device_mode: CInt32,
    module_index: CInt32,
    description: [CWideChar; DESCRIPTION_LEN],
}

#[link(name = "biodaq")]
extern "C" {
    fn AdxInstantDoCtrlCreate() -> CtrlHandle;
    fn InstantDoCtrl_setSelectedDevice(handle: CtrlHandle, info: *const DeviceInformation)
        -> CInt32;
    fn InstantDoCtrl_WriteAny(
        handle: CtrlHandle,
        port_start: CInt32,
        port_count: CInt32,
        data: *const CUint8,
    ) -> CInt32;
    fn InstantDoCtrl_Dispose(handle: CtrlHandle);

    fn AdxInstantDiCtrlCreate() -> CtrlHandle;
    fn InstantDiCtrl_setSelectedDevice(handle: CtrlHandle, info: *const DeviceInformation)
        -> CInt32;
    fn InstantDiCtrl_ReadAny(
        handle: CtrlHandle,
        port_start: CInt32,
        port_count: CInt32,
        data: *mut CUint8,
    ) -> CInt32;
    fn InstantDiCtrl_Dispose(handle: CtrlHandle);

    fn AdxInstantAiCtrlCreate() -> CtrlHandle;
    fn InstantAiCtrl_setSelectedDevice(handle: CtrlHandle, info: *const DeviceInformation)
        -> CInt32;
    fn InstantAiCtrl_ReadAny(
        handle: CtrlHandle,
        channel_start: CInt32,
        channel_count: CInt32,
        data: *mut CFloat64,
    ) -> CInt32;
    fn InstantAiCtrl_Dispose(handle: CtrlHandle);

    fn AdxInstantAoCtrlCreate() -> CtrlHandle;
    fn InstantAoCtrl_setSelectedDevice(handle: CtrlHandle, info: *const DeviceInformation)
        -> CInt32;
    fn InstantAoCtrl_WriteAny(
        handle: CtrlHandle,
        channel_start: CInt32,
        channel_count: CInt32,
        data: *const CFloat64,
    ) -> CInt32;
    fn InstantAoCtrl_Dispose(handle: CtrlHandle);
}

fn device_information(descr: &DeviceDescription) -> DeviceInformation {
    let mut description = [0 as CWideChar; DESCRIPTION_LEN];
    for (slot, ch) in description
        .iter_mut()
        .zip(descr.to_string().chars().take(DESCRIPTION_LEN - 1))
    {
        *slot = ch as CWideChar;
    }
    DeviceInformation {
        device_number: -1,
        device_mode: MODE_WRITE_WITH_RESET,
        module_index: 0,
        description,
    }
}

fn setup_call<F: FnOnce() -> CInt32>(func: F) -> Result<()> {
    let code = func();
    if code != 0 {
        return Err(Error::Device(BioStatus(code)));
    }
    Ok(())
}

/// Instant digital-output control bound to one device.
pub struct InstantDoCtrl {
    handle: CtrlHandle,
}

// The handle is only ever used from the worker thread that owns the struct.
unsafe impl Send for InstantDoCtrl {}

impl InstantDoCtrl {
    pub fn new(descr: &DeviceDescription) -> Result<Self> {
        let handle = unsafe { AdxInstantDoCtrlCreate() };
        let info = device_information(descr);
        setup_call(|| unsafe { InstantDoCtrl_setSelectedDevice(handle, &info) })?;
        Ok(Self { handle })
    }
}

impl DoPort for InstantDoCtrl {
    fn write(&mut self, start_port: usize, buf: &[u8]) -> BioStatus {
        let code = unsafe {
            InstantDoCtrl_WriteAny(
                self.handle,
                start_port as CInt32,
                buf.len() as CInt32,
                buf.as_ptr(),
            )
        };
        BioStatus(code)
    }
}

impl Drop for InstantDoCtrl {
    fn drop(&mut self) {
        unsafe { InstantDoCtrl_Dispose(self.handle) }
    }
}

/// Instant digital-input control bound to one device.
pub struct InstantDiCtrl {
    handle: CtrlHandle,
}

unsafe impl Send for InstantDiCtrl {}

impl InstantDiCtrl {
    pub fn new(descr: &DeviceDescription) -> Result<Self> {
        let handle = unsafe { AdxInstantDiCtrlCreate() };
        let info = device_information(descr);
        setup_call(|| unsafe { InstantDiCtrl_setSelectedDevice(handle, &info) })?;
        Ok(Self { handle })
    }
}

impl DiPort for InstantDiCtrl {
    fn read(&mut self, start_port: usize, count: usize) -> (BioStatus, Vec<u8>) {
        let mut data = vec![0u8; count];
        let code = unsafe {
            InstantDiCtrl_ReadAny(
                self.handle,
                start_port as CInt32,
                count as CInt32,
                data.as_mut_ptr(),
            )
        };
        if code != 0 {
            return (BioStatus(code), Vec::new());
        }
        (BioStatus::SUCCESS, data)
    }
}

impl Drop for InstantDiCtrl {
    fn drop(&mut self) {
        unsafe { InstantDiCtrl_Dispose(self.handle) }
    }
}

/// Instant analog-input control bound to one device.
pub struct InstantAiCtrl {
    handle: CtrlHandle,
}

unsafe impl Send for InstantAiCtrl {}

impl InstantAiCtrl {
    pub fn new(descr: &DeviceDescription) -> Result<Self> {
        let handle = unsafe { AdxInstantAiCtrlCreate() };
        let info = device_information(descr);
        setup_call(|| unsafe { InstantAiCtrl_setSelectedDevice(handle, &info) })?;
        Ok(Self { handle })
    }
}

impl AiPort for InstantAiCtrl {
    fn read(&mut self, start_channel: usize, count: usize) -> (BioStatus, Vec<f64>) {
        let mut data = vec![0f64; count];
        let code = unsafe {
            InstantAiCtrl_ReadAny(
                self.handle,
                start_channel as CInt32,
                count as CInt32,
                data.as_mut_ptr(),
            )
        };
        if code != 0 {
            return (BioStatus(code), Vec::new());
        }
        (BioStatus::SUCCESS, data)
    }
}

impl Drop for InstantAiCtrl {
    fn drop(&mut self) {
        unsafe { InstantAiCtrl_Dispose(self.handle) }
    }
}

/// Instant analog-output control bound to one device.
pub struct InstantAoCtrl {
    handle: CtrlHandle,
}

unsafe impl Send for InstantAoCtrl {}

impl InstantAoCtrl {
    pub fn new(descr: &DeviceDescription) -> Result<Self> {
        let handle = unsafe { AdxInstantAoCtrlCreate() };
        let info = device_information(descr);
        setup_call(|| unsafe { InstantAoCtrl_setSelectedDevice(handle, &info) })?;
        Ok(Self { handle })
    }
}

impl AoPort for InstantAoCtrl {
    fn write(&mut self, start_channel: usize, values: &[f64]) -> BioStatus {
        let code = unsafe {
            InstantAoCtrl_WriteAny(
                self.handle,
                start_channel as CInt32,
                values.len() as CInt32,
                values.as_ptr(),
            )
        };
        BioStatus(code)
    }
}

impl Drop for InstantAoCtrl {
    fn drop(&mut self) {
        unsafe { InstantAoCtrl_Dispose(self.handle) }
    }
}
