use std::time::Duration;

/// Gap between the two `/proc/stat` reads of the CPU usage syscall
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(250);

/// Characters of stderr kept in a failed command's error
pub const STDERR_EXCERPT: usize = 200;
