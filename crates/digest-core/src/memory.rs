//! Process and system memory inspection and allocator heap trimming.
//!
//! The working-set estimate adds the kernel page cache and buffers to the
//! process RSS, which is what container memory accounting charges.

use serde::Serialize;
use tracing::trace;

/// Resident and virtual size of the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessMemory {
    pub rss_bytes: u64,
    pub vms_bytes: u64,
}

impl ProcessMemory {
    /// Resident size in MiB.
    pub fn rss_mb(&self) -> f64 {
        bytes_to_mb(self.rss_bytes)
    }

    /// Virtual size in MiB.
    pub fn vms_mb(&self) -> f64 {
        bytes_to_mb(self.vms_bytes)
    }
}

/// Converts bytes to MiB rounded to two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}

/// Reads the process memory footprint, or `None` where unsupported.
#[cfg(target_os = "linux")]
pub fn process_memory() -> Option<ProcessMemory> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_status(&status)
}

#[cfg(not(target_os = "linux"))]
pub fn process_memory() -> Option<ProcessMemory> {
    None
}

fn parse_status(status: &str) -> Option<ProcessMemory> {
    let mut rss = None;
    let mut vms = None;
    for line in status.lines() {
        if let Some(val) = line.strip_prefix("VmRSS:") {
            rss = parse_kb_value(val);
        } else if let Some(val) = line.strip_prefix("VmSize:") {
            vms = parse_kb_value(val);
        }
    }
    Some(ProcessMemory {
        rss_bytes: rss? * 1024,
        vms_bytes: vms.unwrap_or(0) * 1024,
    })
}

// Format: "   12345 kB"
fn parse_kb_value(val: &str) -> Option<u64> {
    val.split_whitespace().next()?.parse().ok()
}

/// System-wide counters from `/proc/meminfo`, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemMemory {
    pub total_bytes: Option<u64>,
    pub free_bytes: Option<u64>,
    pub available_bytes: Option<u64>,
    pub cached_bytes: Option<u64>,
    pub buffers_bytes: Option<u64>,
    pub active_bytes: Option<u64>,
    pub inactive_bytes: Option<u64>,
    pub slab_bytes: Option<u64>,
}

/// Process RSS plus page cache and buffers, in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorkingSetEstimate {
    pub process_rss_mb: f64,
    pub page_cache_mb: f64,
    pub buffers_mb: f64,
    pub total_mb: f64,
}

impl WorkingSetEstimate {
    /// Combines process and system counters. Missing counters count as zero.
    pub fn new(process: Option<&ProcessMemory>, system: &SystemMemory) -> Self {
        let rss = process.map_or(0, |p| p.rss_bytes);
        let cached = system.cached_bytes.unwrap_or(0);
        let buffers = system.buffers_bytes.unwrap_or(0);
        Self {
            process_rss_mb: bytes_to_mb(rss),
            page_cache_mb: bytes_to_mb(cached),
            buffers_mb: bytes_to_mb(buffers),
            total_mb: bytes_to_mb(rss + cached + buffers),
        }
    }
}

/// Reads system memory counters, or `None` where unsupported.
#[cfg(target_os = "linux")]
pub fn system_memory() -> Option<SystemMemory> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    Some(parse_meminfo(&meminfo))
}

#[cfg(not(target_os = "linux"))]
pub fn system_memory() -> Option<SystemMemory> {
    None
}

fn parse_meminfo(meminfo: &str) -> SystemMemory {
    let mut mem = SystemMemory::default();
    for line in meminfo.lines() {
        let Some((key, val)) = line.split_once(':') else { continue };
        let slot = match key.trim() {
            "MemTotal" => &mut mem.total_bytes,
            "MemFree" => &mut mem.free_bytes,
            "MemAvailable" => &mut mem.available_bytes,
            "Cached" => &mut mem.cached_bytes,
            "Buffers" => &mut mem.buffers_bytes,
            "Active" => &mut mem.active_bytes,
            "Inactive" => &mut mem.inactive_bytes,
            "Slab" => &mut mem.slab_bytes,
            _ => continue,
        };
        *slot = parse_kb_value(val).map(|kb| kb * 1024);
    }
    mem
}

/// Returns freed allocator memory to the OS.
///
/// Only glibc exposes `malloc_trim`; elsewhere this is a no-op returning
/// `false`.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub fn trim_heap() -> bool {
    // SAFETY: malloc_trim has no preconditions and only touches allocator state.
    let released = unsafe { libc::malloc_trim(0) };
    trace!(released, "malloc_trim");
    released != 0
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
pub fn trim_heap() -> bool {
    trace!("heap trim unsupported on this platform");
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        let status = "Name:\tdigest\nVmSize:\t  204800 kB\nVmRSS:\t   51200 kB\nThreads:\t8\n";
        let mem = parse_status(status).unwrap();
        assert_eq!(mem.rss_bytes, 51200 * 1024);
        assert_eq!(mem.vms_bytes, 204800 * 1024);
        assert_eq!(mem.rss_mb(), 50.0);
        assert_eq!(mem.vms_mb(), 200.0);
    }

    #[test]
    fn test_parse_status_without_rss() {
        assert!(parse_status("Name:\tdigest\n").is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_memory_available_on_linux() {
        let mem = process_memory().unwrap();
        assert!(mem.rss_bytes > 0);
    }

    #[test]
    fn test_parse_meminfo() {
        let meminfo = "MemTotal:        8048576 kB\n\
                       MemFree:         1024000 kB\n\
                       MemAvailable:    4096000 kB\n\
                       Buffers:           10240 kB\n\
                       Cached:          2048000 kB\n\
                       SwapCached:            0 kB\n\
                       Active(anon):     512000 kB\n\
                       Slab:             204800 kB\n\
                       HugePages_Total:       0\n";
        let mem = parse_meminfo(meminfo);
        assert_eq!(mem.total_bytes, Some(8048576 * 1024));
        assert_eq!(mem.available_bytes, Some(4096000 * 1024));
        assert_eq!(mem.cached_bytes, Some(2048000 * 1024));
        assert_eq!(mem.buffers_bytes, Some(10240 * 1024));
        assert_eq!(mem.slab_bytes, Some(204800 * 1024));
        // Only the exact "Active" key counts
        assert_eq!(mem.active_bytes, None);
    }

    #[test]
    fn test_working_set_estimate() {
        let process = ProcessMemory {
            rss_bytes: 100 * 1024 * 1024,
            vms_bytes: 0,
        };
        let system = SystemMemory {
            cached_bytes: Some(50 * 1024 * 1024),
            buffers_bytes: Some(2 * 1024 * 1024),
            ..SystemMemory::default()
        };

        let estimate = WorkingSetEstimate::new(Some(&process), &system);
        assert_eq!(estimate.process_rss_mb, 100.0);
        assert_eq!(estimate.page_cache_mb, 50.0);
        assert_eq!(estimate.buffers_mb, 2.0);
        assert_eq!(estimate.total_mb, 152.0);

        let without_process = WorkingSetEstimate::new(None, &SystemMemory::default());
        assert_eq!(without_process.total_mb, 0.0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_memory_available_on_linux() {
        let mem = system_memory().unwrap();
        assert!(mem.total_bytes.unwrap_or(0) > 0);
    }

    #[test]
    fn test_trim_heap_does_not_panic() {
        let _ = trim_heap();
    }
}
