//! Linux provider backed by `libnuma`.
//!
//! The library is bound with `dlopen` when [`LibNuma::load`] is called, so
//! the crate builds and links on machines without libnuma installed; only
//! opening the native provider fails there.

use std::ffi::{CStr, CString};
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};

use libc::{c_char, c_int, c_longlong, c_uint, c_void, pid_t};

use crate::error::{Error, Result};
use crate::provider::{Pid, Provider};

/// libnuma's `struct bitmask`; only ever handled by pointer.
#[repr(C)]
pub struct NumaBitmask {
    _opaque: [u8; 0],
}

/// An owned `struct bitmask *` returned by libnuma.
pub struct RawMask(NonNull<NumaBitmask>);

impl RawMask {
    /// The underlying pointer, for passing to other libnuma calls.
    #[inline]
    pub fn as_ptr(&self) -> *mut NumaBitmask {
        self.0.as_ptr()
    }
}

impl fmt::Debug for RawMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawMask({:p})", self.0)
    }
}

macro_rules! numa_symbols {
    ($( fn $name:ident($($arg:ty),*) $(-> $ret:ty)?; )*) => {
        struct Symbols {
            $( $name: unsafe extern "C" fn($($arg),*) $(-> $ret)?, )*
        }

        impl Symbols {
            /// Resolve every entry point in `handle`.
            ///
            /// # Safety
            ///
            /// `handle` must be a live handle returned by `dlopen` for a
            /// library exporting these symbols with the declared signatures.
            unsafe fn resolve(handle: *mut c_void) -> Result<Symbols> {
                Ok(Symbols {
                    $( $name: {
                        let name = concat!(stringify!($name), "\0");
                        let sym = libc::dlsym(handle, name.as_ptr() as *const c_char);
                        if sym.is_null() {
                            return Err(Error::MissingSymbol(stringify!($name)));
                        }
                        mem::transmute::<*mut c_void, unsafe extern "C" fn($($arg),*) $(-> $ret)?>(sym)
                    }, )*
                })
            }
        }
    };
}

numa_symbols! {
    fn numa_available() -> c_int;
    fn numa_max_node() -> c_int;
    fn numa_max_possible_node() -> c_int;
    fn numa_num_possible_nodes() -> c_int;
    fn numa_num_configured_nodes() -> c_int;
    fn numa_num_configured_cpus() -> c_int;
    fn numa_num_task_cpus() -> c_int;
    fn numa_num_task_nodes() -> c_int;
    fn numa_preferred() -> c_int;
    fn numa_set_preferred(c_int);
    fn numa_node_size64(c_int, *mut c_longlong) -> c_longlong;
    fn numa_node_of_cpu(c_int) -> c_int;
    fn numa_distance(c_int, c_int) -> c_int;
    fn numa_allocate_cpumask() -> *mut NumaBitmask;
    fn numa_parse_nodestring(*const c_char) -> *mut NumaBitmask;
    fn numa_parse_cpustring(*const c_char) -> *mut NumaBitmask;
    fn numa_bitmask_isbitset(*const NumaBitmask, c_uint) -> c_int;
    fn numa_bitmask_setbit(*mut NumaBitmask, c_uint) -> *mut NumaBitmask;
    fn numa_bitmask_free(*mut NumaBitmask);
    fn numa_bind(*mut NumaBitmask);
    fn numa_set_membind(*mut NumaBitmask);
    fn numa_run_on_node(c_int) -> c_int;
    fn numa_set_localalloc();
    fn numa_sched_setaffinity(pid_t, *mut NumaBitmask) -> c_int;
    fn numa_sched_getaffinity(pid_t, *mut NumaBitmask) -> c_int;
}

/// The native provider: `libnuma` loaded into the process.
pub struct LibNuma {
    handle: NonNull<c_void>,
    sym: Symbols,
}

// libnuma keeps its topology tables read-only after initialisation and every
// placement call used here is a single syscall on the calling task.
unsafe impl Send for LibNuma {}
unsafe impl Sync for LibNuma {}

impl LibNuma {
    /// Load `library` (for example `"libnuma.so.1"`) and resolve its symbols.
    pub fn load(library: &str) -> Result<LibNuma> {
        let name = CString::new(library)
            .map_err(|_| Error::Unavailable(format!("invalid library name {:?}", library)))?;

        let handle = unsafe { libc::dlopen(name.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        let handle = match NonNull::new(handle) {
            Some(handle) => handle,
            None => return Err(Error::Unavailable(dlerror_message())),
        };

        match unsafe { Symbols::resolve(handle.as_ptr()) } {
            Ok(sym) => {
                log::debug!("loaded {}", library);
                Ok(LibNuma { handle, sym })
            }
            Err(err) => {
                unsafe { libc::dlclose(handle.as_ptr()) };
                Err(err)
            }
        }
    }
}

impl Drop for LibNuma {
    fn drop(&mut self) {
        unsafe { libc::dlclose(self.handle.as_ptr()) };
    }
}

impl fmt::Debug for LibNuma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibNuma").field("handle", &self.handle).finish()
    }
}

impl Provider for LibNuma {
    type Mask = RawMask;

    fn available(&self) -> bool {
        unsafe { (self.sym.numa_available)() != -1 }
    }

    fn max_node(&self) -> usize {
        count(unsafe { (self.sym.numa_max_node)() })
    }

    fn max_possible_node(&self) -> usize {
        count(unsafe { (self.sym.numa_max_possible_node)() })
    }

    fn num_possible_nodes(&self) -> usize {
        count(unsafe { (self.sym.numa_num_possible_nodes)() })
    }

    fn num_configured_nodes(&self) -> usize {
        count(unsafe { (self.sym.numa_num_configured_nodes)() })
    }

    fn num_configured_cpus(&self) -> usize {
        count(unsafe { (self.sym.numa_num_configured_cpus)() })
    }

    fn num_task_cpus(&self) -> usize {
        count(unsafe { (self.sym.numa_num_task_cpus)() })
    }

    fn num_task_nodes(&self) -> usize {
        count(unsafe { (self.sym.numa_num_task_nodes)() })
    }

    fn preferred(&self) -> usize {
        count(unsafe { (self.sym.numa_preferred)() })
    }

    fn set_preferred(&self, node: usize) {
        unsafe { (self.sym.numa_set_preferred)(native_id(node)) }
    }

    fn node_size(&self, node: usize, free: Option<&mut u64>) -> Result<u64> {
        let mut free_bytes: c_longlong = 0;
        let freep = if free.is_some() {
            &mut free_bytes as *mut c_longlong
        } else {
            ptr::null_mut()
        };

        let size = unsafe { (self.sym.numa_node_size64)(native_id(node), freep) };
        if size < 0 {
            return Err(Error::last_os_error("numa_node_size64"));
        }
        if let Some(slot) = free {
            *slot = free_bytes.max(0) as u64;
        }
        Ok(size as u64)
    }

    fn node_of_cpu(&self, cpu: usize) -> Result<usize> {
        let node = unsafe { (self.sym.numa_node_of_cpu)(native_id(cpu)) };
        if node < 0 {
            return Err(Error::last_os_error("numa_node_of_cpu"));
        }
        Ok(node as usize)
    }

    fn distance(&self, node1: usize, node2: usize) -> Result<u32> {
        let distance = unsafe { (self.sym.numa_distance)(native_id(node1), native_id(node2)) };
        // libnuma reports 0 when the distance table cannot be read
        if distance <= 0 {
            return Err(Error::provider("numa_distance", "no distance information"));
        }
        Ok(distance as u32)
    }

    fn allocate_cpumask(&self) -> Result<RawMask> {
        let mask = unsafe { (self.sym.numa_allocate_cpumask)() };
        NonNull::new(mask)
            .map(RawMask)
            .ok_or_else(|| Error::last_os_error("numa_allocate_cpumask"))
    }

    fn parse_nodestring(&self, spec: &str) -> Option<RawMask> {
        let spec = CString::new(spec).ok()?;
        NonNull::new(unsafe { (self.sym.numa_parse_nodestring)(spec.as_ptr()) }).map(RawMask)
    }

    fn parse_cpustring(&self, spec: &str) -> Option<RawMask> {
        let spec = CString::new(spec).ok()?;
        NonNull::new(unsafe { (self.sym.numa_parse_cpustring)(spec.as_ptr()) }).map(RawMask)
    }

    fn bitmask_isbitset(&self, mask: &RawMask, bit: usize) -> bool {
        let Ok(bit) = c_uint::try_from(bit) else {
            return false;
        };
        unsafe { (self.sym.numa_bitmask_isbitset)(mask.as_ptr(), bit) != 0 }
    }

    fn bitmask_setbit(&self, mask: &mut RawMask, bit: usize) {
        if let Ok(bit) = c_uint::try_from(bit) {
            unsafe { (self.sym.numa_bitmask_setbit)(mask.as_ptr(), bit) };
        }
    }

    fn bitmask_free(&self, mask: RawMask) {
        unsafe { (self.sym.numa_bitmask_free)(mask.as_ptr()) }
    }

    fn bind(&self, nodes: &RawMask) -> Result<()> {
        unsafe { (self.sym.numa_bind)(nodes.as_ptr()) };
        Ok(())
    }

    fn set_membind(&self, nodes: &RawMask) -> Result<()> {
        unsafe { (self.sym.numa_set_membind)(nodes.as_ptr()) };
        Ok(())
    }

    fn run_on_node(&self, node: usize) -> Result<()> {
        if unsafe { (self.sym.numa_run_on_node)(native_id(node)) } < 0 {
            return Err(Error::last_os_error("numa_run_on_node"));
        }
        Ok(())
    }

    fn set_localalloc(&self) {
        unsafe { (self.sym.numa_set_localalloc)() }
    }

    fn sched_setaffinity(&self, pid: Pid, cpus: &RawMask) -> Result<()> {
        if unsafe { (self.sym.numa_sched_setaffinity)(pid, cpus.as_ptr()) } < 0 {
            return Err(Error::last_os_error("numa_sched_setaffinity"));
        }
        Ok(())
    }

    fn sched_getaffinity(&self, pid: Pid, cpus: &mut RawMask) -> Result<()> {
        if unsafe { (self.sym.numa_sched_getaffinity)(pid, cpus.as_ptr()) } < 0 {
            return Err(Error::last_os_error("numa_sched_getaffinity"));
        }
        Ok(())
    }
}

/// Clamp a native count or id to `usize`.
#[inline]
fn count(value: c_int) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Convert a validated id to the native `int`.
#[inline]
fn native_id(id: usize) -> c_int {
    c_int::try_from(id).unwrap_or(c_int::MAX)
}

fn dlerror_message() -> String {
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        "dlopen failed".to_string()
    } else {
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
    }
}
