use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::probe::constants::CPU_SAMPLE_WINDOW;
use crate::registry::constants::PROC_STAT;
use crate::registry::Syscall;

/// Runs `call` on the blocking pool and renders its result as text for the parser
pub(crate) async fn run(label: &str, call: Syscall) -> Result<String> {
    let probe = label.to_string();
    tokio::task::spawn_blocking(move || match call {
        Syscall::LoadAverage => load_average(&probe),
        Syscall::CpuUsage => cpu_usage(&probe, CPU_SAMPLE_WINDOW),
        Syscall::DiskUsage { path } => disk_usage(&probe, &path),
        Syscall::Hostname => hostname(&probe),
    })
    .await
    .map_err(|e| Error::probe_failed(label, format!("blocking task failed: {e}")))?
}

fn load_average(probe: &str) -> Result<String> {
    let mut loads = [0f64; 3];
    // SAFETY: the buffer holds exactly the three entries requested
    let filled = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
    if filled < 1 {
        return Err(Error::probe_failed(probe, "getloadavg returned no samples"));
    }
    Ok(format!("{:.2} {:.2} {:.2}", loads[0], loads[1], loads[2]))
}

fn disk_usage(probe: &str, path: &Path) -> Result<String> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::probe_failed(probe, "path contains a NUL byte"))?;
    // SAFETY: statvfs is plain old data and fully written on success
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) } != 0 {
        return Err(Error::probe_failed(probe, std::io::Error::last_os_error().to_string()));
    }

    // Same definition as df: reserved blocks count as neither used nor available
    let used = stat.f_blocks as f64 - stat.f_bfree as f64;
    let usable = used + stat.f_bavail as f64;
    if usable <= 0.0 {
        return Err(Error::probe_failed(probe, "filesystem reports no blocks"));
    }
    Ok(format!("{:.2}", used / usable * 100.0))
}

fn hostname(probe: &str) -> Result<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the length passed never exceeds the buffer
    if unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) } != 0 {
        return Err(Error::probe_failed(probe, std::io::Error::last_os_error().to_string()));
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Busy percentage over `window`, from two reads of the aggregate `cpu` line
fn cpu_usage(probe: &str, window: Duration) -> Result<String> {
    let read = || -> Result<(f64, f64)> {
        let stat = std::fs::read_to_string(PROC_STAT).map_err(|e| Error::probe_failed(probe, e.to_string()))?;
        cpu_times(&stat).ok_or_else(|| Error::probe_failed(probe, "no aggregate cpu line"))
    };

    let (idle_before, total_before) = read()?;
    std::thread::sleep(window);
    let (idle_after, total_after) = read()?;

    let total = total_after - total_before;
    if total <= 0.0 {
        return Err(Error::probe_failed(probe, "cpu counters did not advance"));
    }
    let busy = total - (idle_after - idle_before);
    Ok(format!("{:.2}", (busy / total * 100.0).clamp(0.0, 100.0)))
}

/// `(idle + iowait, total)` jiffies from `/proc/stat`
pub(crate) fn cpu_times(stat: &str) -> Option<(f64, f64)> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<f64> = line.split_whitespace().skip(1).filter_map(|f| f.parse().ok()).collect();
    if fields.len() < 4 {
        return None;
    }
    // guest time is already folded into user and nice
    let total: f64 = fields.iter().take(8).sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0.0);
    Some((idle, total))
}
