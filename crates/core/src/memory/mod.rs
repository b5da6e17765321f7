use crate::{ControlError, ControlResult, Register};
use pushlab_config::REGISTER_SIZE;
#[cfg(unix)]
use std::path::Path;

enum Backing {
    /// Heap storage standing in for device registers.
    Simulated(Box<[Register]>),
    /// Live mapping of a device file (normally `/dev/mem`).
    #[cfg(unix)]
    Mapped(memmap2::MmapMut),
}

/// An owned window onto a region of physical address space.
///
/// Every checked access is bounds- and alignment-checked against the window
/// span and performed as a single volatile 32-bit load or store. The base
/// pointer of the backing storage never leaves this type.
///
/// A `MemoryWindow` that exists is valid: the mapping is established by the
/// constructor and released when the window is dropped.
pub struct MemoryWindow {
    base: u64,
    span: usize,
    backing: Backing,
}

impl std::fmt::Debug for MemoryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.backing {
            Backing::Simulated(_) => "simulated",
            #[cfg(unix)]
            Backing::Mapped(_) => "mapped",
        };
        f.debug_struct("MemoryWindow")
            .field("base", &format_args!("{:#x}", self.base))
            .field("span", &format_args!("{:#x}", self.span))
            .field("backing", &kind)
            .finish()
    }
}

impl MemoryWindow {
    /// Creates a zero-filled window of `span` bytes that pretends to live at
    /// physical address `base`.
    pub fn simulated(base: u64, span: usize) -> Self {
        let words = span.div_ceil(REGISTER_SIZE);
        Self {
            base,
            span,
            backing: Backing::Simulated(vec![0; words].into_boxed_slice()),
        }
    }

    /// Maps `span` bytes of physical memory starting at `base` through `/dev/mem`.
    #[cfg(unix)]
    pub fn map_physical(base: u64, span: usize) -> ControlResult<Self> {
        Self::map_device("/dev/mem", base, span)
    }

    /// Maps `span` bytes of `path` starting at byte offset `base`.
    ///
    /// `base` must be page aligned; the kernel rejects anything else and the
    /// error is surfaced as [`ControlError::MappingFailure`].
    #[cfg(unix)]
    pub fn map_device<P: AsRef<Path>>(path: P, base: u64, span: usize) -> ControlResult<Self> {
        let mapping_failure = |source| ControlError::MappingFailure { base, span, source };

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .map_err(mapping_failure)?;

        // SAFETY: the mapping is owned by the window and only accessed through
        // volatile register reads and writes. Another process modifying the
        // same device memory is exactly what register I/O expects.
        let map = unsafe {
            memmap2::MmapOptions::new()
                .offset(base)
                .len(span)
                .map_mut(&file)
        }
        .map_err(mapping_failure)?;

        tracing::debug!(
            "Mapped {:#x} bytes of {:?} at physical {:#x}",
            span,
            path.as_ref(),
            base
        );

        // The file descriptor can be closed once the mapping exists.
        Ok(Self {
            base,
            span,
            backing: Backing::Mapped(map),
        })
    }

    /// Physical address the window starts at. Diagnostic only.
    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn read(&self, offset: usize) -> ControlResult<Register> {
        self.check(offset)?;
        // SAFETY: `check` guarantees the access is in bounds and aligned.
        Ok(unsafe { self.read_unchecked(offset) })
    }

    pub fn write(&mut self, offset: usize, value: Register) -> ControlResult<()> {
        self.check(offset)?;
        // SAFETY: `check` guarantees the access is in bounds and aligned.
        unsafe { self.write_unchecked(offset, value) };
        Ok(())
    }

    /// Reads the register at `offset` without any validation.
    ///
    /// # Safety
    ///
    /// `offset + 4` must not exceed [`span`](Self::span) and `offset` must be a
    /// multiple of 4.
    pub unsafe fn read_unchecked(&self, offset: usize) -> Register {
        let ptr = self.as_ptr().add(offset) as *const Register;
        std::ptr::read_volatile(ptr)
    }

    /// Writes the register at `offset` without any validation.
    ///
    /// # Safety
    ///
    /// Same contract as [`read_unchecked`](Self::read_unchecked).
    pub unsafe fn write_unchecked(&mut self, offset: usize, value: Register) {
        let ptr = self.as_mut_ptr().add(offset) as *mut Register;
        std::ptr::write_volatile(ptr, value);
    }

    fn check(&self, offset: usize) -> ControlResult<()> {
        match offset.checked_add(REGISTER_SIZE) {
            Some(end) if end <= self.span => {}
            _ => {
                return Err(ControlError::OutOfRange {
                    offset,
                    size: REGISTER_SIZE,
                    span: self.span,
                })
            }
        }
        if offset % REGISTER_SIZE != 0 {
            return Err(ControlError::MisalignedAccess { offset });
        }
        Ok(())
    }

    fn as_ptr(&self) -> *const u8 {
        match &self.backing {
            Backing::Simulated(words) => words.as_ptr() as *const u8,
            #[cfg(unix)]
            Backing::Mapped(map) => map.as_ptr(),
        }
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        match &mut self.backing {
            Backing::Simulated(words) => words.as_mut_ptr() as *mut u8,
            #[cfg(unix)]
            Backing::Mapped(map) => map.as_mut_ptr(),
        }
    }
}
