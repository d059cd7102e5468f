use std::ptr;

use crate::error::JitError;

/// The executable code cache backing store.
///
/// One anonymous mapping per JIT instance. The buffer is either writable
/// or executable at any given moment, never assumed both across a publish
/// point: emission and patching flip to RW, publishing flips back to RX.
pub struct CodeBuffer {
    base: *mut u8,
    capacity: usize,
    cursor: usize,
    writable: bool,
}

impl CodeBuffer {
    pub fn new(capacity: usize) -> Result<Self, JitError> {
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                capacity,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(JitError::CodeBufferAllocation {
                size: capacity,
                errno: std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
            });
        }
        Ok(Self {
            base: base as *mut u8,
            capacity,
            cursor: 0,
            writable: true,
        })
    }

    pub fn base_addr(&self) -> usize {
        self.base as usize
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current write position (bytes emitted so far).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn space_remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    /// Rewind the write pointer; used by full invalidation to drop all
    /// emitted blocks while keeping earlier content (the prelude) intact.
    pub fn rewind_to(&mut self, cursor: usize) {
        assert!(cursor <= self.cursor);
        self.cursor = cursor;
    }

    fn protect(&mut self, prot: libc::c_int) {
        let rc = unsafe { libc::mprotect(self.base as *mut libc::c_void, self.capacity, prot) };
        assert_eq!(rc, 0, "mprotect failed on the code buffer");
    }

    /// Run `f` with the buffer writable, then republish it executable.
    pub fn with_writable<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_writable = self.writable;
        if !was_writable {
            self.protect(libc::PROT_READ | libc::PROT_WRITE);
            self.writable = true;
        }
        let result = f(self);
        self.protect(libc::PROT_READ | libc::PROT_EXEC);
        self.writable = false;
        result
    }

    /// Append bytes at the cursor. The buffer must currently be writable.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        assert!(self.writable, "append on an executable buffer");
        assert!(bytes.len() <= self.space_remaining(), "code buffer exhausted");
        let offset = self.cursor;
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.add(offset), bytes.len());
        }
        self.cursor += bytes.len();
        offset
    }

    /// Overwrite bytes at an absolute offset (patching). The buffer must
    /// currently be writable.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        assert!(self.writable, "write_at on an executable buffer");
        assert!(offset + bytes.len() <= self.cursor);
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.add(offset), bytes.len());
        }
    }

    /// Read back emitted bytes (debugging, disassembly).
    pub fn read_at(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset + len <= self.cursor);
        unsafe { std::slice::from_raw_parts(self.base.add(offset), len) }
    }
}

impl Drop for CodeBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let mut buf = CodeBuffer::new(4096).unwrap();
        let off = buf.append(&[0xC3]);
        assert_eq!(off, 0);
        assert_eq!(buf.cursor(), 1);
        assert_eq!(buf.read_at(0, 1), &[0xC3]);
    }

    #[test]
    fn test_wx_flip_and_patch() {
        let mut buf = CodeBuffer::new(4096).unwrap();
        buf.append(&[0x90, 0x90, 0x90, 0x90]);
        buf.with_writable(|_b| {}); // publish executable
        assert!(!buf.writable);
        buf.with_writable(|b| b.write_at(1, &[0xCC]));
        assert_eq!(buf.read_at(0, 3), &[0x90, 0xCC, 0x90]);
    }

    #[test]
    fn test_rewind() {
        let mut buf = CodeBuffer::new(4096).unwrap();
        buf.append(&[1, 2, 3, 4]);
        buf.rewind_to(2);
        assert_eq!(buf.cursor(), 2);
        assert_eq!(buf.space_remaining(), 4094);
    }
}
