use std::time::Duration;

// Default probe timeouts per cost class
pub const CHEAP_TIMEOUT: Duration = Duration::from_secs(5);
pub const MODERATE_TIMEOUT: Duration = Duration::from_secs(7);
pub const EXPENSIVE_TIMEOUT: Duration = Duration::from_secs(10);

// Default freshness windows per cost class
pub const CHEAP_TTL: Duration = Duration::from_secs(2);
pub const MODERATE_TTL: Duration = Duration::from_secs(10);
pub const EXPENSIVE_TTL: Duration = Duration::from_secs(30);

// Kernel interfaces
pub const PROC_LOADAVG: &str = "/proc/loadavg";
pub const PROC_MEMINFO: &str = "/proc/meminfo";
pub const PROC_NET_DEV: &str = "/proc/net/dev";
pub const PROC_UPTIME: &str = "/proc/uptime";
pub const PROC_STAT: &str = "/proc/stat";
pub const ETC_HOSTNAME: &str = "/etc/hostname";
pub const THERMAL_ZONE0_TEMP: &str = "/sys/class/thermal/thermal_zone0/temp";
pub const HWMON0_TEMP1: &str = "/sys/class/hwmon/hwmon0/temp1_input";
pub const CPU0_SCALING_CUR_FREQ: &str = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq";

// Board firmware tool (Raspberry Pi and derivatives)
pub const VCGENCMD: &str = "vcgencmd";
