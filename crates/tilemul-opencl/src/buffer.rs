//! Padded matrix operands, host- or device-resident.
//!
//! An [`OperandBuffer`] is one matrix padded out to block-aligned extents.
//! Storage lives in exactly one of two modes, chosen at construction and
//! never changed afterwards: a zero-initialized host vector, or a device
//! buffer of the same padded element count. Transfers between the two are
//! explicit, blocking, and whole-buffer. Two buffers never share memory.

use opencl3::memory::{
    Buffer, ClMem, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY,
};
use opencl3::types::{cl_mem, CL_BLOCKING};

use crate::element::ClElement;
use crate::error::{OpenClError, Result};
use crate::session::DeviceSession;

/// How the device is allowed to touch a device-resident operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// The backend memory flags for an access mode.
pub(crate) fn access_flags(mode: AccessMode) -> u64 {
    match mode {
        AccessMode::ReadOnly => CL_MEM_READ_ONLY,
        AccessMode::WriteOnly => CL_MEM_WRITE_ONLY,
        AccessMode::ReadWrite => CL_MEM_READ_WRITE,
    }
}

#[derive(Debug)]
enum Storage<T: ClElement> {
    Host(Vec<T>),
    Device(Buffer<T>),
}

/// One padded matrix operand.
#[derive(Debug)]
pub struct OperandBuffer<T: ClElement> {
    rows: usize,
    row_padding: usize,
    cols: usize,
    col_padding: usize,
    storage: Storage<T>,
}

impl<T: ClElement> OperandBuffer<T> {
    /// Allocate a zero-filled host-resident operand.
    pub fn host(
        rows: usize,
        row_padding: usize,
        cols: usize,
        col_padding: usize,
    ) -> Result<Self> {
        let (len, _) = padded_extent::<T>(rows, row_padding, cols, col_padding)?;
        Ok(Self {
            rows,
            row_padding,
            cols,
            col_padding,
            storage: Storage::Host(vec![T::default(); len]),
        })
    }

    /// Allocate an uninitialized device-resident operand on the session's
    /// context. Zero-sized extents are rejected host-side so the failure
    /// does not depend on which backend is installed.
    pub fn device(
        session: &DeviceSession,
        rows: usize,
        row_padding: usize,
        cols: usize,
        col_padding: usize,
        mode: AccessMode,
    ) -> Result<Self> {
        let (len, size_bytes) = padded_extent::<T>(rows, row_padding, cols, col_padding)?;
        if len == 0 {
            return Err(OpenClError::Allocation {
                size_bytes: 0,
                reason: "device buffers must have a non-zero extent".into(),
            });
        }

        let buffer = unsafe {
            Buffer::<T>::create(
                session.context(),
                access_flags(mode),
                len,
                std::ptr::null_mut(),
            )
            .map_err(|e| OpenClError::Allocation { size_bytes, reason: e.to_string() })?
        };

        Ok(Self { rows, row_padding, cols, col_padding, storage: Storage::Device(buffer) })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn padded_rows(&self) -> usize {
        self.rows + self.row_padding
    }

    pub fn padded_cols(&self) -> usize {
        self.cols + self.col_padding
    }

    /// Padded element count.
    pub fn len(&self) -> usize {
        self.padded_rows() * self.padded_cols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major index into the padded layout.
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.padded_cols() + col
    }

    /// The padded host contents.
    pub fn as_slice(&self) -> Result<&[T]> {
        match &self.storage {
            Storage::Host(data) => Ok(data),
            Storage::Device(_) => {
                Err(OpenClError::StorageMismatch { op: "as_slice", needs: "host" })
            }
        }
    }

    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        match &mut self.storage {
            Storage::Host(data) => Ok(data),
            Storage::Device(_) => {
                Err(OpenClError::StorageMismatch { op: "as_mut_slice", needs: "host" })
            }
        }
    }

    /// The raw device memory handle, for kernel argument binding.
    pub fn mem(&self) -> Result<cl_mem> {
        match &self.storage {
            Storage::Device(buffer) => Ok(buffer.get()),
            Storage::Host(_) => Err(OpenClError::StorageMismatch { op: "mem", needs: "device" }),
        }
    }

    /// Blocking upload of a full padded image into a device-resident
    /// operand.
    pub fn write_from(&mut self, session: &DeviceSession, data: &[T]) -> Result<()> {
        let len = self.len();
        if data.len() != len {
            return Err(OpenClError::Transfer {
                reason: format!("source holds {} elements, buffer expects {len}", data.len()),
            });
        }
        match &mut self.storage {
            Storage::Device(buffer) => {
                unsafe {
                    session
                        .queue()
                        .enqueue_write_buffer(buffer, CL_BLOCKING, 0, data, &[])
                        .map_err(|e| OpenClError::Transfer { reason: e.to_string() })?;
                }
                Ok(())
            }
            Storage::Host(_) => {
                Err(OpenClError::StorageMismatch { op: "write_from", needs: "device" })
            }
        }
    }

    /// Blocking download of a full padded image from a device-resident
    /// operand.
    pub fn read_into(&self, session: &DeviceSession, out: &mut [T]) -> Result<()> {
        let len = self.len();
        if out.len() != len {
            return Err(OpenClError::Transfer {
                reason: format!("destination holds {} elements, buffer expects {len}", out.len()),
            });
        }
        match &self.storage {
            Storage::Device(buffer) => {
                unsafe {
                    session
                        .queue()
                        .enqueue_read_buffer(buffer, CL_BLOCKING, 0, out, &[])
                        .map_err(|e| OpenClError::Transfer { reason: e.to_string() })?;
                }
                Ok(())
            }
            Storage::Host(_) => {
                Err(OpenClError::StorageMismatch { op: "read_into", needs: "device" })
            }
        }
    }
}

/// Padded element count and byte size, with checked arithmetic.
fn padded_extent<T: ClElement>(
    rows: usize,
    row_padding: usize,
    cols: usize,
    col_padding: usize,
) -> Result<(usize, usize)> {
    let overflow = || OpenClError::Allocation {
        size_bytes: usize::MAX,
        reason: "padded extent overflows the address space".into(),
    };
    let len = rows
        .checked_add(row_padding)
        .zip(cols.checked_add(col_padding))
        .and_then(|(r, c)| r.checked_mul(c))
        .ok_or_else(overflow)?;
    let size_bytes = len.checked_mul(std::mem::size_of::<T>()).ok_or_else(overflow)?;
    Ok((len, size_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilemul_core::DeviceClass;

    #[test]
    fn host_buffer_is_zero_filled_at_padded_size() {
        let buf = OperandBuffer::<f32>::host(2, 1, 3, 1).unwrap();
        assert_eq!(buf.padded_rows(), 3);
        assert_eq!(buf.padded_cols(), 4);
        assert_eq!(buf.len(), 12);
        assert!(buf.as_slice().unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn index_uses_the_padded_leading_dimension() {
        let buf = OperandBuffer::<f32>::host(2, 1, 3, 1).unwrap();
        assert_eq!(buf.index(0, 0), 0);
        assert_eq!(buf.index(1, 2), 6);
    }

    #[test]
    fn host_writes_are_visible() {
        let mut buf = OperandBuffer::<f64>::host(2, 0, 2, 0).unwrap();
        let idx = buf.index(1, 1);
        buf.as_mut_slice().unwrap()[idx] = 2.5;
        assert_eq!(buf.as_slice().unwrap()[idx], 2.5);
    }

    #[test]
    fn zero_extent_host_buffer_is_empty() {
        let buf = OperandBuffer::<f32>::host(0, 0, 5, 0).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.as_slice().unwrap().len(), 0);
    }

    #[test]
    fn overflowing_extent_is_rejected() {
        let err = OperandBuffer::<f32>::host(usize::MAX, 1, 1, 0).unwrap_err();
        assert!(matches!(err, OpenClError::Allocation { .. }));
    }

    #[test]
    fn overflowing_area_is_rejected() {
        let err = OperandBuffer::<f32>::host(usize::MAX / 2, 0, 3, 0).unwrap_err();
        assert!(matches!(err, OpenClError::Allocation { .. }));
    }

    #[test]
    fn host_buffer_has_no_device_handle() {
        let buf = OperandBuffer::<f32>::host(1, 0, 1, 0).unwrap();
        match buf.mem() {
            Err(OpenClError::StorageMismatch { op, needs }) => {
                assert_eq!(op, "mem");
                assert_eq!(needs, "device");
            }
            other => panic!("expected StorageMismatch, got {other:?}"),
        }
    }

    #[test]
    fn access_modes_map_to_distinct_flags() {
        let flags = [
            access_flags(AccessMode::ReadOnly),
            access_flags(AccessMode::WriteOnly),
            access_flags(AccessMode::ReadWrite),
        ];
        assert_eq!(flags[0], CL_MEM_READ_ONLY);
        assert_eq!(flags[1], CL_MEM_WRITE_ONLY);
        assert_eq!(flags[2], CL_MEM_READ_WRITE);
        assert_ne!(flags[0], flags[1]);
        assert_ne!(flags[1], flags[2]);
    }

    // Hardware paths run only where an OpenCL runtime is installed.

    #[test]
    fn device_round_trip_preserves_contents() {
        let Ok(session) = DeviceSession::from_class(DeviceClass::Default) else { return };
        let mut buf = OperandBuffer::<f32>::device(&session, 4, 0, 4, 0, AccessMode::ReadWrite)
            .unwrap();
        let sent: Vec<f32> = (0..16).map(|i| i as f32).collect();
        buf.write_from(&session, &sent).unwrap();
        let mut got = vec![0.0f32; 16];
        buf.read_into(&session, &mut got).unwrap();
        assert_eq!(sent, got);
    }

    #[test]
    fn zero_extent_device_buffer_is_rejected_host_side() {
        let Ok(session) = DeviceSession::from_class(DeviceClass::Default) else { return };
        let err = OperandBuffer::<f32>::device(&session, 0, 0, 4, 0, AccessMode::ReadOnly)
            .unwrap_err();
        match err {
            OpenClError::Allocation { size_bytes, .. } => assert_eq!(size_bytes, 0),
            other => panic!("expected Allocation, got {other:?}"),
        }
    }

    #[test]
    fn transfer_length_is_checked() {
        let Ok(session) = DeviceSession::from_class(DeviceClass::Default) else { return };
        let mut buf = OperandBuffer::<f32>::device(&session, 4, 0, 4, 0, AccessMode::ReadWrite)
            .unwrap();
        let short = vec![0.0f32; 8];
        assert!(matches!(
            buf.write_from(&session, &short),
            Err(OpenClError::Transfer { .. })
        ));
    }
}
